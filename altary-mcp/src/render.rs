//! Text rendering of tool results and failures.
//!
//! Pure functions: every string the assistant reads is built here, so the
//! core crates stay free of presentation.

use std::fmt::Write as _;
use std::path::Path;

use altary_auth::{AuthReport, AuthState, auth_page_url};
use altary_types::{AltaryError, CompletionOutcome, ErrorKind, ErrorRecord, Project, Session};

/// Errors shown with a letter, `A` through `Z`.
pub const MAX_LETTERED_ERRORS: usize = 26;

const ERROR_MESSAGE_LIMIT: usize = 100;
const SIMILAR_MESSAGE_LIMIT: usize = 50;

/// Keep at most `max` characters of `text`.
pub fn truncate(text: &str, max: usize) -> &str {
    match text.char_indices().nth(max) {
        Some((idx, _)) => &text[..idx],
        None => text,
    }
}

/// Project list, marking the default project.
pub fn projects(projects: &[Project], default_project: Option<&str>) -> String {
    if projects.is_empty() {
        return "No projects found for this account.".to_string();
    }

    let mut out = String::from("**Available projects:**\n\n");
    for (i, project) in projects.iter().enumerate() {
        let name = if project.name.is_empty() {
            "Untitled project"
        } else {
            &project.name
        };
        let mark = if default_project == Some(project.id.as_str()) {
            " **(default)**"
        } else {
            ""
        };
        let _ = writeln!(out, "{}. **{name}**{mark}", i + 1);
        let _ = writeln!(out, "   ID: `{}`\n", project.id);
    }
    out
}

/// Lettered error list for `project_id`.
pub fn errors(project_id: &str, errors: &[ErrorRecord]) -> String {
    if errors.is_empty() {
        return format!("No open errors in project `{project_id}`.");
    }

    let mut out = format!(
        "**Errors in `{project_id}`** (total: {})\n\n",
        errors.len()
    );
    for (letter, error) in ('A'..='Z').zip(errors) {
        let line = error
            .line
            .map_or_else(|| "?".to_string(), |line| line.to_string());
        let file = if error.file.is_empty() {
            "unknown file"
        } else {
            &error.file
        };
        let _ = writeln!(out, "**{letter}. {file}:{line}**");
        let _ = writeln!(
            out,
            "   Message: {}",
            truncate(&error.message, ERROR_MESSAGE_LIMIT)
        );
        let _ = writeln!(out, "   ID: `{}`", error.id);
        if let Some(summary) = error.ai_summary.as_deref().filter(|s| !s.is_empty()) {
            let _ = writeln!(out, "   AI summary: {summary}");
        }
        if let Some(suggestion) = error.ai_suggestion.as_deref().filter(|s| !s.is_empty()) {
            let _ = writeln!(out, "   AI suggestion: {suggestion}");
        }
        out.push('\n');
    }

    if errors.len() > MAX_LETTERED_ERRORS {
        let _ = writeln!(
            out,
            "... {} more errors not shown.",
            errors.len() - MAX_LETTERED_ERRORS
        );
    }
    out
}

/// Summary of a completion, with the related errors the service closed.
pub fn completion(outcome: &CompletionOutcome) -> String {
    let mut out = String::from("**Error completed**\n\n");
    let _ = writeln!(out, "Target error: `{}`", outcome.target_id);
    let _ = writeln!(
        out,
        "Similar errors completed: **{}**\n",
        outcome.similar_count()
    );

    if !outcome.similar.is_empty() {
        out.push_str("**Completed errors:**\n");
        for (i, similar) in outcome.similar.iter().enumerate() {
            let message = similar.message.as_deref().unwrap_or("unknown");
            let _ = writeln!(
                out,
                "{}. similarity {:.2}: {}...",
                i + 1,
                similar.similarity.unwrap_or(0.0),
                truncate(message, SIMILAR_MESSAGE_LIMIT)
            );
        }
    }
    out
}

/// Outcome of `setup_auth`, with the next step.
pub fn auth_report(report: &AuthReport) -> String {
    let base_url = &report.session.api_base_url;
    match report.state {
        AuthState::Succeeded => {
            let mut out = String::from("Authentication succeeded. The token has been saved.\n\n");
            if !report.projects.is_empty() {
                let _ = writeln!(
                    out,
                    "{} project(s) are available.",
                    report.projects.len()
                );
            }
            out.push_str("Next, run `set_default_project` to choose a default project.");
            out
        }
        AuthState::Expired => {
            let mut out = String::from(
                "Browser sign-in timed out before a token was issued. \
                 The saved configuration was not changed.\n\n",
            );
            if let Some(url) = &report.auth_url {
                let _ = writeln!(out, "Sign-in URL used: {url}");
            }
            let _ = write!(
                out,
                "Run `setup_auth` again, or copy a token from {} \
                 and pass it as the `token` parameter.",
                auth_page_url(base_url)
            );
            out
        }
        AuthState::Failed => {
            let reason = report.reason.as_deref().unwrap_or("unknown reason");
            if report.auth_url.is_some() {
                format!(
                    "Browser sign-in failed: {reason}\n\nRun `setup_auth` again to retry."
                )
            } else {
                format!(
                    "Invalid token: {reason}\n\nCheck the token, or get a new one at {}.",
                    auth_page_url(base_url)
                )
            }
        }
        AuthState::Idle | AuthState::BrowserLaunched | AuthState::Polling => {
            format!("Authentication did not finish (state: {}).", report.state)
        }
    }
}

/// Confirmation of a new default project.
pub fn default_project_set(project: &Project) -> String {
    let label = if project.name.is_empty() {
        String::new()
    } else {
        format!(" ({})", project.name)
    };
    format!(
        "Default project set to `{}`{label}.\n\nYou can now run `get_errors` to list its errors.",
        project.id
    )
}

/// The project id was not among the user's projects.
pub fn unknown_project(project_id: &str, projects: &[Project]) -> String {
    let mut out = format!("Project not found: `{project_id}`\n\n");
    if projects.is_empty() {
        out.push_str("This account has no projects.");
    } else {
        out.push_str("Available project IDs:\n");
        for project in projects {
            let _ = writeln!(out, "- `{}` {}", project.id, project.name);
        }
        out.push_str("\nRun `get_user_projects` for details.");
    }
    out
}

/// Current configuration with the token masked.
pub fn config(session: &Session, path: &Path) -> String {
    let mut out = String::from("**Current configuration**\n\n");
    match &session.token {
        Some(token) => {
            let _ = writeln!(out, "Token: `{}`", token.masked());
        }
        None => out.push_str("Token: not set\n"),
    }
    match &session.default_project_id {
        Some(project) => {
            let _ = writeln!(out, "Default project: `{project}`");
        }
        None => out.push_str("Default project: not set\n"),
    }
    let _ = writeln!(out, "API base URL: `{}`", session.api_base_url);
    let _ = writeln!(out, "Config file: `{}`\n", path.display());

    if session.is_configured() {
        out.push_str("**Configured**: all tools are available.");
    } else if session.is_authenticated() {
        out.push_str("**Incomplete**: run `set_default_project`.");
    } else {
        out.push_str("**Incomplete**: run `setup_auth` and `set_default_project`.");
    }
    out
}

/// Confirmation of `clear_config`.
pub fn cleared() -> String {
    "Configuration cleared.\n\nRun `setup_auth` to start again.".to_string()
}

/// A failure, with guidance on what to do next.
pub fn error(err: &AltaryError, api_base_url: &str) -> String {
    match err.kind() {
        ErrorKind::Unauthenticated => {
            if err.status().is_some() {
                format!(
                    "The saved token was rejected by Altary ({err}).\n\n\
                     Run `setup_auth` to authenticate again, or get a new token at {}.",
                    auth_page_url(api_base_url)
                )
            } else {
                "No token is configured. Run `setup_auth` first.".to_string()
            }
        }
        ErrorKind::NoProjectSelected => {
            "No project selected. Pass `project_id`, or run `set_default_project` \
             (see `get_user_projects` for IDs)."
                .to_string()
        }
        ErrorKind::NotFound => {
            format!("{err}\n\nCheck the ID with `get_user_projects` or `get_errors`.")
        }
        ErrorKind::Transport => {
            let cause = if err.is_timeout() {
                "The request to Altary timed out"
            } else {
                "Could not reach Altary"
            };
            format!("{cause} at {api_base_url}.\n\nThis may be temporary; try again.")
        }
        ErrorKind::ConfigIo => {
            format!(
                "Could not save the configuration: {err}\n\n\
                 Check that the config directory is writable."
            )
        }
        ErrorKind::InvalidInput => format!("Invalid input: {err}"),
        _ => format!("Altary request failed: {err}"),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use altary_types::{SimilarCompletion, Token};

    fn record(id: &str, message: &str) -> ErrorRecord {
        ErrorRecord {
            id: id.into(),
            file: "src/app.ts".into(),
            line: Some(42),
            message: message.into(),
            ai_summary: None,
            ai_suggestion: None,
        }
    }

    #[test]
    fn truncate_counts_characters() {
        assert_eq!(truncate("hello", 10), "hello");
        assert_eq!(truncate("hello", 3), "hel");
        assert_eq!(truncate("日本語テキスト", 3), "日本語");
    }

    #[test]
    fn projects_mark_default() {
        let list = vec![
            Project { id: "ALTR-1".into(), name: "Web".into() },
            Project { id: "ALTR-2".into(), name: String::new() },
        ];
        let text = projects(&list, Some("ALTR-2"));
        assert!(text.contains("1. **Web**\n"));
        assert!(text.contains("2. **Untitled project** **(default)**"));
        assert!(text.contains("`ALTR-2`"));
    }

    #[test]
    fn empty_projects() {
        assert_eq!(projects(&[], None), "No projects found for this account.");
    }

    #[test]
    fn errors_are_lettered_and_capped() {
        let list: Vec<ErrorRecord> = (0..30).map(|i| record(&format!("E{i}"), "boom")).collect();
        let text = errors("ALTR-1", &list);
        assert!(text.contains("(total: 30)"));
        assert!(text.contains("**A. src/app.ts:42**"));
        assert!(text.contains("**Z. src/app.ts:42**"));
        assert!(text.contains("`E25`"));
        assert!(!text.contains("`E26`"));
        assert!(text.contains("... 4 more errors not shown."));
    }

    #[test]
    fn error_message_is_truncated_to_100_chars() {
        let long = "x".repeat(150);
        let text = errors("ALTR-1", &[record("E1", &long)]);
        assert!(text.contains(&format!("Message: {}\n", "x".repeat(100))));
    }

    #[test]
    fn error_annotations_shown_when_present() {
        let mut rec = record("E1", "boom");
        rec.line = None;
        rec.ai_summary = Some("null deref".into());
        rec.ai_suggestion = Some(String::new());
        let text = errors("ALTR-1", &[rec]);
        assert!(text.contains("src/app.ts:?"));
        assert!(text.contains("AI summary: null deref"));
        assert!(!text.contains("AI suggestion"));
    }

    #[test]
    fn no_errors() {
        assert_eq!(errors("ALTR-1", &[]), "No open errors in project `ALTR-1`.");
    }

    #[test]
    fn completion_lists_similar_with_two_decimals() {
        let outcome = CompletionOutcome {
            target_id: "E1".into(),
            completed_ids: ["E1", "E2"].into_iter().map(String::from).collect(),
            similar: vec![SimilarCompletion {
                id: Some("E2".into()),
                similarity: Some(0.9166),
                message: Some("y".repeat(80)),
            }],
        };
        let text = completion(&outcome);
        assert!(text.contains("Target error: `E1`"));
        assert!(text.contains("Similar errors completed: **1**"));
        assert!(text.contains(&format!("1. similarity 0.92: {}...", "y".repeat(50))));
    }

    #[test]
    fn config_masks_token() {
        let session = Session {
            api_base_url: "https://altary.web-ts.dev".into(),
            token: Token::new("abcdefgh12345678wxyz"),
            default_project_id: None,
        };
        let text = config(&session, Path::new("/home/u/.altary/config.json"));
        assert!(text.contains("Token: `abcdefgh...wxyz`"));
        assert!(!text.contains("abcdefgh12345678wxyz"));
        assert!(text.contains("Default project: not set"));
        assert!(text.contains("**Incomplete**: run `set_default_project`."));
        assert!(!text.contains("`setup_auth`"));
    }

    #[test]
    fn config_without_token_points_to_setup() {
        let session = Session::with_base_url("https://altary.web-ts.dev");
        let text = config(&session, Path::new("config.json"));
        assert!(text.contains("Token: not set"));
        assert!(text.contains("run `setup_auth` and `set_default_project`"));
    }

    #[test]
    fn config_complete() {
        let session = Session {
            api_base_url: "https://altary.web-ts.dev".into(),
            token: Token::new("short"),
            default_project_id: Some("ALTR-1".into()),
        };
        let text = config(&session, Path::new("config.json"));
        assert!(text.contains("Token: `***`"));
        assert!(text.contains("**Configured**"));
    }

    #[test]
    fn missing_token_guidance() {
        let text = error(&AltaryError::missing_token(), "https://altary.web-ts.dev");
        assert!(text.contains("Run `setup_auth` first"));
    }

    #[test]
    fn rejected_token_guidance_links_auth_page() {
        let err = AltaryError::Unauthenticated {
            status: Some(401),
            message: "expired".into(),
        };
        let text = error(&err, "https://altary.web-ts.dev");
        assert!(text.contains("https://altary.web-ts.dev/users/claude-auth"));
    }

    #[test]
    fn no_project_guidance() {
        let text = error(&AltaryError::NoProjectSelected, "https://altary.web-ts.dev");
        assert!(text.contains("set_default_project"));
    }

    #[test]
    fn timeout_guidance() {
        let err = AltaryError::Transport(Box::new(std::io::Error::new(
            std::io::ErrorKind::TimedOut,
            "timed out",
        )));
        let text = error(&err, "https://altary.web-ts.dev");
        assert!(text.starts_with("The request to Altary timed out"));
    }
}
