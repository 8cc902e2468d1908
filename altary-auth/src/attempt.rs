//! State of a single authentication attempt.

use std::time::{Duration, SystemTime};

use tokio::time::Instant;

/// Where an authentication attempt stands.
///
/// ```text
/// Idle ──► BrowserLaunched ──► Polling ──► Succeeded | Expired | Failed
///   └──────────────────────────────────────► Succeeded | Failed   (direct token)
/// ```
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum AuthState {
    /// Nothing has happened yet.
    Idle,
    /// The sign-in URL has been handed to the user.
    BrowserLaunched,
    /// Waiting for the service to issue a token.
    Polling,
    /// A token was obtained and stored.
    Succeeded,
    /// The deadline passed before a token was issued.
    Expired,
    /// The token was rejected, or the sign-in was refused.
    Failed,
}

impl AuthState {
    /// Whether the attempt is over.
    pub fn is_terminal(self) -> bool {
        matches!(self, Self::Succeeded | Self::Expired | Self::Failed)
    }

    /// Whether `next` is a legal successor of `self`.
    pub fn can_advance_to(self, next: AuthState) -> bool {
        use AuthState::*;
        matches!(
            (self, next),
            (Idle, BrowserLaunched)
                | (Idle, Succeeded)
                | (Idle, Failed)
                | (BrowserLaunched, Polling)
                | (BrowserLaunched, Failed)
                | (Polling, Succeeded)
                | (Polling, Expired)
                | (Polling, Failed)
        )
    }
}

impl std::fmt::Display for AuthState {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        let name = match self {
            Self::Idle => "idle",
            Self::BrowserLaunched => "browser launched",
            Self::Polling => "polling",
            Self::Succeeded => "succeeded",
            Self::Expired => "expired",
            Self::Failed => "failed",
        };
        f.write_str(name)
    }
}

/// One authentication attempt. Lives only for the duration of a call.
#[derive(Debug, Clone)]
pub struct AuthAttempt {
    state: AuthState,
    started_at: SystemTime,
    started: Instant,
    deadline: Instant,
}

impl AuthAttempt {
    /// Start an attempt that expires `timeout` from now.
    pub fn start(timeout: Duration) -> Self {
        let started = Instant::now();
        Self {
            state: AuthState::Idle,
            started_at: SystemTime::now(),
            started,
            deadline: started + timeout,
        }
    }

    /// Current state.
    pub fn state(&self) -> AuthState {
        self.state
    }

    /// Wall-clock time the attempt started.
    pub fn started_at(&self) -> SystemTime {
        self.started_at
    }

    /// Monotonic deadline of the attempt.
    pub fn deadline(&self) -> Instant {
        self.deadline
    }

    /// Time spent so far.
    pub fn elapsed(&self) -> Duration {
        self.started.elapsed()
    }

    /// Time left before the deadline, zero once it has passed.
    pub fn remaining(&self) -> Duration {
        self.deadline.saturating_duration_since(Instant::now())
    }

    /// Whether the deadline has passed.
    pub fn is_past_deadline(&self) -> bool {
        Instant::now() >= self.deadline
    }

    /// Move to `next`. Illegal moves are ignored and logged.
    ///
    /// Returns whether the state changed.
    pub(crate) fn advance(&mut self, next: AuthState) -> bool {
        if !self.state.can_advance_to(next) {
            tracing::warn!(from = %self.state, to = %next, "ignoring illegal auth transition");
            return false;
        }
        tracing::debug!(from = %self.state, to = %next, "auth transition");
        self.state = next;
        true
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn browser_path_transitions() {
        let mut attempt = AuthAttempt::start(Duration::from_secs(60));
        assert_eq!(attempt.state(), AuthState::Idle);
        assert!(attempt.advance(AuthState::BrowserLaunched));
        assert!(attempt.advance(AuthState::Polling));
        assert!(attempt.advance(AuthState::Expired));
        assert!(attempt.state().is_terminal());
    }

    #[test]
    fn direct_path_skips_polling() {
        let mut attempt = AuthAttempt::start(Duration::from_secs(60));
        assert!(attempt.advance(AuthState::Succeeded));
    }

    #[test]
    fn terminal_states_do_not_move() {
        let mut attempt = AuthAttempt::start(Duration::from_secs(60));
        attempt.advance(AuthState::Failed);
        assert!(!attempt.advance(AuthState::Succeeded));
        assert_eq!(attempt.state(), AuthState::Failed);
    }

    #[test]
    fn cannot_expire_before_polling() {
        assert!(!AuthState::Idle.can_advance_to(AuthState::Expired));
        assert!(!AuthState::BrowserLaunched.can_advance_to(AuthState::Expired));
    }

    #[test]
    fn zero_timeout_is_immediately_past_deadline() {
        let attempt = AuthAttempt::start(Duration::ZERO);
        assert!(attempt.is_past_deadline());
        assert_eq!(attempt.remaining(), Duration::ZERO);
    }

    #[test]
    fn fresh_attempt_has_time_left() {
        let attempt = AuthAttempt::start(Duration::from_secs(300));
        assert!(!attempt.is_past_deadline());
        assert!(attempt.remaining() > Duration::from_secs(290));
    }
}
