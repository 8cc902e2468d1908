//! Session and remote record types.

use std::collections::BTreeSet;

use serde::{Deserialize, Serialize};

/// Canonical base URL of the Altary service.
pub const DEFAULT_API_BASE_URL: &str = "https://altary.web-ts.dev";

/// An opaque bearer token.
///
/// Never empty. `Debug` is redacted so a token cannot leak through logs; use
/// [`Token::masked`] for display and [`Token::expose`] only where the raw
/// value is sent over the wire or persisted.
#[derive(Clone, PartialEq, Eq)]
pub struct Token(String);

impl Token {
    /// Wrap a token string. Returns `None` for an empty or all-whitespace value.
    pub fn new(value: impl Into<String>) -> Option<Self> {
        let value = value.into();
        if value.trim().is_empty() {
            None
        } else {
            Some(Self(value))
        }
    }

    /// The raw token value.
    pub fn expose(&self) -> &str {
        &self.0
    }

    /// A display form that keeps only the first 8 and last 4 characters.
    ///
    /// Tokens of 12 characters or fewer are fully hidden.
    pub fn masked(&self) -> String {
        let chars: Vec<char> = self.0.chars().collect();
        if chars.len() > 12 {
            let head: String = chars[..8].iter().collect();
            let tail: String = chars[chars.len() - 4..].iter().collect();
            format!("{head}...{tail}")
        } else {
            "***".to_string()
        }
    }
}

impl std::fmt::Debug for Token {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str("Token([REDACTED])")
    }
}

/// The single local session: where to talk to, with which token, and which
/// project to use when none is named.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Session {
    /// Base URL of the remote service. Always present.
    pub api_base_url: String,
    /// Bearer token, absent while unauthenticated.
    pub token: Option<Token>,
    /// Project used by calls that do not name one.
    pub default_project_id: Option<String>,
}

impl Session {
    /// A fresh, unauthenticated session pointing at `api_base_url`.
    pub fn with_base_url(api_base_url: impl Into<String>) -> Self {
        Self {
            api_base_url: api_base_url.into(),
            token: None,
            default_project_id: None,
        }
    }

    /// Whether a token is stored.
    pub fn is_authenticated(&self) -> bool {
        self.token.is_some()
    }

    /// Whether both a token and a default project are stored.
    pub fn is_configured(&self) -> bool {
        self.token.is_some() && self.default_project_id.is_some()
    }
}

impl Default for Session {
    fn default() -> Self {
        Self::with_base_url(DEFAULT_API_BASE_URL)
    }
}

/// A project visible to the authenticated user.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Project {
    /// Project identifier, as accepted by the error endpoints.
    pub id: String,
    /// Display name. Empty when the service sent none.
    pub name: String,
}

/// One tracked error in a project.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ErrorRecord {
    /// Error identifier, as accepted by the completion endpoint.
    pub id: String,
    /// Source file the error was reported from.
    pub file: String,
    /// Line number, when the service knows it.
    pub line: Option<i64>,
    /// Error message.
    pub message: String,
    /// Service-generated summary, passed through verbatim.
    pub ai_summary: Option<String>,
    /// Service-generated fix suggestion, passed through verbatim.
    pub ai_suggestion: Option<String>,
}

/// A related error the service completed together with the target.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct SimilarCompletion {
    /// Identifier of the completed error, when reported.
    pub id: Option<String>,
    /// Similarity score in `0.0..=1.0`, when reported.
    pub similarity: Option<f64>,
    /// Message of the completed error, when reported.
    pub message: Option<String>,
}

/// Result of completing an error.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct CompletionOutcome {
    /// The error the completion was requested for, as echoed by the service.
    pub target_id: String,
    /// Every identifier the service reports as completed.
    pub completed_ids: BTreeSet<String>,
    /// Per-error detail for the related errors, when the service sends it.
    pub similar: Vec<SimilarCompletion>,
}

impl CompletionOutcome {
    /// Number of completed errors other than the target.
    pub fn similar_count(&self) -> usize {
        self.completed_ids
            .iter()
            .filter(|id| **id != self.target_id)
            .count()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn token_rejects_empty() {
        assert!(Token::new("").is_none());
        assert!(Token::new("   ").is_none());
        assert!(Token::new("t").is_some());
    }

    #[test]
    fn token_debug_is_redacted() {
        let token = Token::new("secret-token-value").unwrap();
        let debug = format!("{token:?}");
        assert!(debug.contains("[REDACTED]"));
        assert!(!debug.contains("secret"));
    }

    #[test]
    fn session_debug_does_not_leak_token() {
        let session = Session {
            token: Token::new("super-secret"),
            ..Session::default()
        };
        assert!(!format!("{session:?}").contains("super-secret"));
    }

    #[test]
    fn masked_keeps_head_and_tail() {
        let token = Token::new("abcdefgh12345678wxyz").unwrap();
        assert_eq!(token.masked(), "abcdefgh...wxyz");
    }

    #[test]
    fn masked_hides_short_tokens() {
        assert_eq!(Token::new("abcdefghijkl").unwrap().masked(), "***");
    }

    #[test]
    fn default_session_is_unauthenticated() {
        let session = Session::default();
        assert_eq!(session.api_base_url, DEFAULT_API_BASE_URL);
        assert!(!session.is_authenticated());
        assert!(!session.is_configured());
    }

    #[test]
    fn configured_requires_token_and_project() {
        let mut session = Session::default();
        session.default_project_id = Some("ALTR-1".into());
        assert!(!session.is_configured());
        session.token = Token::new("tok");
        assert!(session.is_configured());
    }

    #[test]
    fn similar_count_excludes_target() {
        let outcome = CompletionOutcome {
            target_id: "E1".into(),
            completed_ids: ["E1", "E2", "E3"].into_iter().map(String::from).collect(),
            similar: vec![],
        };
        assert_eq!(outcome.similar_count(), 2);
    }
}
