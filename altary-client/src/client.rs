//! Altary API client struct and builder.

use std::sync::Arc;
use std::time::Duration;

use altary_session::SessionStore;
use altary_types::{AltaryError, CompletionOutcome, ErrorRecord, Project, Token};
use reqwest::{Method, Url};

use crate::error::{map_http_status, map_reqwest_error};
use crate::mapping::{parse_completion, parse_errors, parse_projects};

/// Default upper bound for a single request, connect to last byte.
pub const DEFAULT_TIMEOUT: Duration = Duration::from_secs(30);

/// Header carrying the bearer token.
const TOKEN_HEADER: &str = "X-Claude-Token";

const USER_AGENT: &str = concat!("Altary-MCP-Server/", env!("CARGO_PKG_VERSION"));

/// Client for the Altary API.
///
/// Reads the token and base URL from the [`SessionStore`] on every call, so a
/// token stored by the auth flow is picked up without rebuilding the client.
///
/// # Example
///
/// ```no_run
/// use std::sync::Arc;
/// use altary_client::RemoteClient;
/// use altary_session::SessionStore;
///
/// # async fn run() -> Result<(), altary_client::AltaryError> {
/// let store = Arc::new(SessionStore::from_env());
/// let client = RemoteClient::new(store);
/// for error in client.list_errors(None).await? {
///     println!("{} {}:{:?}", error.id, error.file, error.line);
/// }
/// # Ok(())
/// # }
/// ```
#[derive(Debug, Clone)]
pub struct RemoteClient {
    /// Source of the token, default project and base URL.
    store: Arc<SessionStore>,
    /// Per-request timeout.
    timeout: Duration,
    /// Shared HTTP client.
    http: reqwest::Client,
}

impl RemoteClient {
    /// Create a client over the given session store with the default timeout.
    #[must_use]
    pub fn new(store: Arc<SessionStore>) -> Self {
        Self {
            store,
            timeout: DEFAULT_TIMEOUT,
            http: reqwest::Client::new(),
        }
    }

    /// Override the per-request timeout.
    #[must_use]
    pub fn with_timeout(mut self, timeout: Duration) -> Self {
        self.timeout = timeout;
        self
    }

    /// The session store this client reads from.
    pub fn store(&self) -> &Arc<SessionStore> {
        &self.store
    }

    /// List the projects visible to the stored token.
    ///
    /// # Errors
    ///
    /// [`AltaryError::Unauthenticated`] without a stored token (no request is
    /// made) or when the service rejects it, [`AltaryError::Transport`] on
    /// network failure or timeout, [`AltaryError::Remote`] otherwise.
    pub async fn list_projects(&self) -> Result<Vec<Project>, AltaryError> {
        let session = self.store.load().await;
        let token = session.token.ok_or_else(AltaryError::missing_token)?;
        self.fetch_projects(&session.api_base_url, &token).await
    }

    /// List projects using `token` instead of the stored one.
    ///
    /// Used to validate a token before it is persisted; the store is not
    /// touched.
    ///
    /// # Errors
    ///
    /// Same as [`list_projects`](Self::list_projects).
    pub async fn list_projects_with(&self, token: &Token) -> Result<Vec<Project>, AltaryError> {
        let session = self.store.load().await;
        self.fetch_projects(&session.api_base_url, token).await
    }

    /// List the errors of `project_id`, or of the default project when `None`.
    ///
    /// # Errors
    ///
    /// [`AltaryError::NoProjectSelected`] when no project is given or stored,
    /// [`AltaryError::Unauthenticated`] without a usable token,
    /// [`AltaryError::NotFound`] for an unknown project, and the transport and
    /// remote errors of [`list_projects`](Self::list_projects).
    pub async fn list_errors(
        &self,
        project_id: Option<&str>,
    ) -> Result<Vec<ErrorRecord>, AltaryError> {
        let session = self.store.load().await;
        let project_id = match project_id.filter(|id| !id.trim().is_empty()) {
            Some(id) => id.to_string(),
            None => session
                .default_project_id
                .ok_or(AltaryError::NoProjectSelected)?,
        };
        let token = session.token.ok_or_else(AltaryError::missing_token)?;

        let url = endpoint(&session.api_base_url, &["issues", "getError", &project_id])?;
        let (json, status) = self
            .send(Method::GET, url, &token, Some(&project_id))
            .await?;
        parse_errors(&json, status)
    }

    /// Complete `error_id`; the service may complete similar errors with it.
    ///
    /// # Errors
    ///
    /// [`AltaryError::InvalidInput`] for an empty id,
    /// [`AltaryError::NotFound`] for an unknown error, and the token,
    /// transport and remote errors of [`list_projects`](Self::list_projects).
    pub async fn complete_error(&self, error_id: &str) -> Result<CompletionOutcome, AltaryError> {
        if error_id.trim().is_empty() {
            return Err(AltaryError::InvalidInput("error id must not be empty".into()));
        }
        let session = self.store.load().await;
        let token = session.token.ok_or_else(AltaryError::missing_token)?;

        let url = endpoint(
            &session.api_base_url,
            &["issues", "completeErrorWithSimilar", error_id],
        )?;
        let (json, status) = self.send(Method::POST, url, &token, Some(error_id)).await?;
        let outcome = parse_completion(&json, status, error_id)?;
        tracing::info!(
            error_id,
            completed = outcome.completed_ids.len(),
            "error completed"
        );
        Ok(outcome)
    }

    async fn fetch_projects(
        &self,
        base_url: &str,
        token: &Token,
    ) -> Result<Vec<Project>, AltaryError> {
        let url = endpoint(base_url, &["users", "getUserProjects"])?;
        let (json, status) = self.send(Method::GET, url, token, None).await?;
        parse_projects(&json, status)
    }

    /// Issue one authenticated request and decode a successful JSON body.
    async fn send(
        &self,
        method: Method,
        url: Url,
        token: &Token,
        resource: Option<&str>,
    ) -> Result<(serde_json::Value, u16), AltaryError> {
        tracing::debug!(method = %method, url = %url, "sending request");

        let response = self
            .http
            .request(method, url)
            .timeout(self.timeout)
            .header(TOKEN_HEADER, token.expose())
            .header(reqwest::header::CONTENT_TYPE, "application/json")
            .header(reqwest::header::USER_AGENT, USER_AGENT)
            .send()
            .await
            .map_err(map_reqwest_error)?;

        let status = response.status();
        let body = response.text().await.map_err(map_reqwest_error)?;

        if !status.is_success() {
            tracing::debug!(status = status.as_u16(), "request rejected");
            return Err(map_http_status(status, &body, resource));
        }

        let json = serde_json::from_str(&body).map_err(|e| AltaryError::Remote {
            status: status.as_u16(),
            message: format!("invalid JSON response: {e}"),
        })?;
        Ok((json, status.as_u16()))
    }
}

/// Join path segments onto the base URL, percent-encoding each segment.
fn endpoint(base_url: &str, segments: &[&str]) -> Result<Url, AltaryError> {
    let invalid = |detail: String| {
        AltaryError::InvalidInput(format!("invalid API base URL {base_url:?}: {detail}"))
    };
    let mut url = Url::parse(base_url).map_err(|e| invalid(e.to_string()))?;
    url.path_segments_mut()
        .map_err(|()| invalid("cannot be a base".into()))?
        .pop_if_empty()
        .extend(segments);
    Ok(url)
}

#[cfg(test)]
mod tests {
    use super::*;

    fn client() -> RemoteClient {
        RemoteClient::new(Arc::new(SessionStore::new("/nonexistent/altary/config.json")))
    }

    #[test]
    fn default_timeout_is_set() {
        assert_eq!(client().timeout, DEFAULT_TIMEOUT);
    }

    #[test]
    fn builder_overrides_timeout() {
        let client = client().with_timeout(Duration::from_millis(250));
        assert_eq!(client.timeout, Duration::from_millis(250));
    }

    #[test]
    fn endpoint_joins_segments() {
        let url = endpoint("https://altary.web-ts.dev", &["users", "getUserProjects"]).unwrap();
        assert_eq!(url.as_str(), "https://altary.web-ts.dev/users/getUserProjects");
    }

    #[test]
    fn endpoint_keeps_base_path() {
        let url =
            endpoint("http://localhost:8080/api/", &["issues", "getError", "ALTR-1"]).unwrap();
        assert_eq!(url.as_str(), "http://localhost:8080/api/issues/getError/ALTR-1");
    }

    #[test]
    fn endpoint_encodes_segments() {
        let url = endpoint("http://localhost", &["issues", "getError", "a/b c"]).unwrap();
        assert_eq!(url.path(), "/issues/getError/a%2Fb%20c");
    }

    #[test]
    fn endpoint_rejects_garbage_base() {
        let err = endpoint("not a url", &["x"]).unwrap_err();
        assert!(matches!(err, AltaryError::InvalidInput(_)));
    }

    #[test]
    fn user_agent_names_the_server() {
        assert!(USER_AGENT.starts_with("Altary-MCP-Server/"));
    }
}
