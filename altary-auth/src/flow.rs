//! The authentication state machine.

use std::sync::Arc;
use std::time::Duration;

use altary_client::RemoteClient;
use altary_session::SessionStore;
use altary_types::{AltaryError, Project, Session, Token};
use tokio::time::Instant;

use crate::attempt::{AuthAttempt, AuthState};
use crate::browser::{BrowserLauncher, SystemBrowser};
use crate::exchange::{ExchangeStatus, LoopbackExchange, TokenExchange};

/// Delay between two polls of a browser sign-in.
pub const DEFAULT_POLL_INTERVAL: Duration = Duration::from_secs(1);

/// How long a browser sign-in may take before it expires.
pub const DEFAULT_AUTH_TIMEOUT: Duration = Duration::from_secs(300);

/// Longest wait for the browser launcher before polling starts anyway.
const BROWSER_LAUNCH_TIMEOUT: Duration = Duration::from_secs(10);

/// The page where a user can sign in and copy a token by hand.
pub fn auth_page_url(api_base_url: &str) -> String {
    format!("{}/users/claude-auth", api_base_url.trim_end_matches('/'))
}

/// Outcome of one authentication call.
#[derive(Debug, Clone)]
pub struct AuthReport {
    /// Terminal state of the attempt.
    pub state: AuthState,
    /// The sign-in URL, for the browser path.
    pub auth_url: Option<String>,
    /// The session after the attempt. Unchanged unless `state` is `Succeeded`.
    pub session: Session,
    /// Why the attempt failed, when it did.
    pub reason: Option<String>,
    /// Projects visible to a directly supplied token, fetched while validating it.
    pub projects: Vec<Project>,
    /// Timing and state of the attempt.
    pub attempt: AuthAttempt,
}

impl AuthReport {
    /// Whether a token was obtained and stored.
    pub fn succeeded(&self) -> bool {
        self.state == AuthState::Succeeded
    }
}

/// Obtains a token and stores it in the session store.
///
/// At most one attempt runs per call; nothing survives the call except what
/// was written to the store.
pub struct AuthFlow {
    store: Arc<SessionStore>,
    client: RemoteClient,
    exchange: Arc<dyn TokenExchange>,
    browser: Arc<dyn BrowserLauncher>,
    poll_interval: Duration,
    timeout: Duration,
}

impl std::fmt::Debug for AuthFlow {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("AuthFlow")
            .field("store", &self.store)
            .field("poll_interval", &self.poll_interval)
            .field("timeout", &self.timeout)
            .finish_non_exhaustive()
    }
}

impl AuthFlow {
    /// A flow that validates through `client` and stores into its session
    /// store, using the loopback exchange and the system browser.
    pub fn new(client: RemoteClient) -> Self {
        Self {
            store: Arc::clone(client.store()),
            client,
            exchange: Arc::new(LoopbackExchange::new()),
            browser: Arc::new(SystemBrowser),
            poll_interval: DEFAULT_POLL_INTERVAL,
            timeout: DEFAULT_AUTH_TIMEOUT,
        }
    }

    /// Replace the token exchange.
    #[must_use]
    pub fn with_exchange(mut self, exchange: Arc<dyn TokenExchange>) -> Self {
        self.exchange = exchange;
        self
    }

    /// Replace the browser launcher.
    #[must_use]
    pub fn with_browser(mut self, browser: Arc<dyn BrowserLauncher>) -> Self {
        self.browser = browser;
        self
    }

    /// Override the delay between polls.
    #[must_use]
    pub fn with_poll_interval(mut self, poll_interval: Duration) -> Self {
        self.poll_interval = poll_interval;
        self
    }

    /// Override the browser sign-in deadline.
    #[must_use]
    pub fn with_timeout(mut self, timeout: Duration) -> Self {
        self.timeout = timeout;
        self
    }

    /// Validate `token` against the service and store it if accepted.
    ///
    /// A rejected token yields a `Failed` report and leaves the store as it
    /// was.
    ///
    /// # Errors
    ///
    /// [`AltaryError::InvalidInput`] for an empty token,
    /// [`AltaryError::Transport`] when the service cannot be reached (the
    /// token is neither accepted nor rejected), any other remote error
    /// untranslated, and [`AltaryError::ConfigIo`] if storing fails.
    pub async fn authenticate_with_token(&self, token: &str) -> Result<AuthReport, AltaryError> {
        let token = Token::new(token)
            .ok_or_else(|| AltaryError::InvalidInput("token must not be empty".into()))?;
        let mut attempt = AuthAttempt::start(self.timeout);

        match self.client.list_projects_with(&token).await {
            Ok(projects) => {
                let session = self.store.set_token(token.expose()).await?;
                attempt.advance(AuthState::Succeeded);
                tracing::info!(projects = projects.len(), "token accepted");
                Ok(AuthReport {
                    state: attempt.state(),
                    auth_url: None,
                    session,
                    reason: None,
                    projects,
                    attempt,
                })
            }
            Err(AltaryError::Unauthenticated { status, message }) => {
                attempt.advance(AuthState::Failed);
                tracing::info!(?status, "token rejected");
                Ok(AuthReport {
                    state: attempt.state(),
                    auth_url: None,
                    session: self.store.load().await,
                    reason: Some(message),
                    projects: Vec::new(),
                    attempt,
                })
            }
            Err(e) => Err(e),
        }
    }

    /// Sign in through the browser and store the issued token.
    ///
    /// Polls until the exchange reports a token or a refusal, or the
    /// deadline passes. An expired or refused attempt leaves the store as it
    /// was.
    ///
    /// # Errors
    ///
    /// [`AltaryError::Transport`] when the exchange cannot be set up or
    /// observed, and [`AltaryError::ConfigIo`] if storing the token fails.
    pub async fn authenticate_interactive(&self) -> Result<AuthReport, AltaryError> {
        let mut attempt = AuthAttempt::start(self.timeout);
        let base_url = self.store.load().await.api_base_url;

        let mut pending = self.exchange.begin(&base_url).await?;
        let auth_url = pending.auth_url().to_string();
        attempt.advance(AuthState::BrowserLaunched);
        tracing::debug!(
            started_at = ?attempt.started_at(),
            timeout = ?self.timeout,
            "browser sign-in started"
        );
        tracing::info!(url = %auth_url, "open this URL to sign in to Altary");

        let launch_wait = BROWSER_LAUNCH_TIMEOUT.min(attempt.remaining());
        match tokio::time::timeout(launch_wait, self.browser.open(&auth_url)).await {
            Ok(Ok(())) => {}
            Ok(Err(e)) => tracing::warn!(
                error = %e,
                url = %auth_url,
                "could not open a browser, open the URL manually"
            ),
            Err(_) => tracing::warn!(
                url = %auth_url,
                "browser launcher did not return, open the URL manually"
            ),
        }
        attempt.advance(AuthState::Polling);

        let mut polls: u32 = 0;
        let reason = loop {
            polls += 1;
            match pending.poll().await? {
                ExchangeStatus::Ready(token) => {
                    let session = self.store.set_token(token.expose()).await?;
                    attempt.advance(AuthState::Succeeded);
                    tracing::info!(polls, "browser sign-in succeeded");
                    return Ok(AuthReport {
                        state: attempt.state(),
                        auth_url: Some(auth_url),
                        session,
                        reason: None,
                        projects: Vec::new(),
                        attempt,
                    });
                }
                ExchangeStatus::Rejected(reason) => {
                    attempt.advance(AuthState::Failed);
                    tracing::info!(polls, reason = %reason, "browser sign-in refused");
                    break Some(reason);
                }
                ExchangeStatus::Pending => {}
            }

            if attempt.is_past_deadline() {
                attempt.advance(AuthState::Expired);
                tracing::info!(polls, "browser sign-in expired");
                break None;
            }
            let next_poll = (Instant::now() + self.poll_interval).min(attempt.deadline());
            tokio::time::sleep_until(next_poll).await;
        };

        Ok(AuthReport {
            state: attempt.state(),
            auth_url: Some(auth_url),
            session: self.store.load().await,
            reason,
            projects: Vec::new(),
            attempt,
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn auth_page_url_strips_trailing_slash() {
        assert_eq!(
            auth_page_url("https://altary.web-ts.dev/"),
            "https://altary.web-ts.dev/users/claude-auth"
        );
        assert_eq!(
            auth_page_url("http://localhost:3000"),
            "http://localhost:3000/users/claude-auth"
        );
    }

    #[test]
    fn defaults_match_five_minutes_of_one_second_polls() {
        assert_eq!(DEFAULT_POLL_INTERVAL, Duration::from_secs(1));
        assert_eq!(DEFAULT_AUTH_TIMEOUT.as_secs() / DEFAULT_POLL_INTERVAL.as_secs(), 300);
    }
}
