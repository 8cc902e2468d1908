//! Error taxonomy shared by the session store, remote client and auth flow.

/// Errors from Altary operations.
///
/// Each variant carries enough structure (status code, message, addressed
/// resource) for the boundary layer to render actionable guidance without
/// parsing strings.
#[non_exhaustive]
#[derive(Debug, thiserror::Error)]
pub enum AltaryError {
    // Retryable errors
    /// Network-level failure or request timeout.
    #[error("transport error: {0}")]
    Transport(#[source] Box<dyn std::error::Error + Send + Sync>),

    // Terminal errors
    /// No token is stored locally, or the remote service rejected it.
    #[error("unauthenticated: {message}")]
    Unauthenticated {
        /// HTTP status returned by the service, `None` when no request was made.
        status: Option<u16>,
        /// Service-provided or locally generated detail.
        message: String,
    },
    /// No project id was given and no default project is stored.
    #[error("no project selected")]
    NoProjectSelected,
    /// The service does not know the addressed project or error.
    #[error("not found: {resource}")]
    NotFound {
        /// The project or error id that was addressed.
        resource: String,
        /// Response body from the service.
        message: String,
    },
    /// Unexpected non-success response or unusable payload.
    #[error("remote error (HTTP {status}): {message}")]
    Remote {
        /// HTTP status code of the response.
        status: u16,
        /// Service-provided message or a description of the bad payload.
        message: String,
    },
    /// Writing the local configuration record failed.
    #[error("config io error: {0}")]
    ConfigIo(#[source] std::io::Error),
    /// A required argument was empty.
    #[error("invalid input: {0}")]
    InvalidInput(String),
}

/// Stable discriminant of [`AltaryError`], for callers that branch on the
/// kind of failure rather than its payload.
#[non_exhaustive]
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum ErrorKind {
    /// See [`AltaryError::Transport`].
    Transport,
    /// See [`AltaryError::Unauthenticated`].
    Unauthenticated,
    /// See [`AltaryError::NoProjectSelected`].
    NoProjectSelected,
    /// See [`AltaryError::NotFound`].
    NotFound,
    /// See [`AltaryError::Remote`].
    Remote,
    /// See [`AltaryError::ConfigIo`].
    ConfigIo,
    /// See [`AltaryError::InvalidInput`].
    InvalidInput,
}

impl AltaryError {
    /// Local "no token" failure, raised before any request is made.
    pub fn missing_token() -> Self {
        Self::Unauthenticated {
            status: None,
            message: "no token configured".into(),
        }
    }

    /// Whether the same call may succeed if simply issued again.
    #[must_use]
    pub fn is_retryable(&self) -> bool {
        matches!(self, Self::Transport(_))
    }

    /// Whether this is a transport failure caused by the request timeout.
    ///
    /// Timeouts are carried as an [`std::io::Error`] of kind `TimedOut`.
    #[must_use]
    pub fn is_timeout(&self) -> bool {
        match self {
            Self::Transport(source) => source
                .downcast_ref::<std::io::Error>()
                .is_some_and(|e| e.kind() == std::io::ErrorKind::TimedOut),
            _ => false,
        }
    }

    /// The stable kind of this error.
    #[must_use]
    pub fn kind(&self) -> ErrorKind {
        match self {
            Self::Transport(_) => ErrorKind::Transport,
            Self::Unauthenticated { .. } => ErrorKind::Unauthenticated,
            Self::NoProjectSelected => ErrorKind::NoProjectSelected,
            Self::NotFound { .. } => ErrorKind::NotFound,
            Self::Remote { .. } => ErrorKind::Remote,
            Self::ConfigIo(_) => ErrorKind::ConfigIo,
            Self::InvalidInput(_) => ErrorKind::InvalidInput,
        }
    }

    /// HTTP status associated with this error, when a response was received.
    #[must_use]
    pub fn status(&self) -> Option<u16> {
        match self {
            Self::Unauthenticated { status, .. } => *status,
            Self::NotFound { .. } => Some(404),
            Self::Remote { status, .. } => Some(*status),
            _ => None,
        }
    }
}
