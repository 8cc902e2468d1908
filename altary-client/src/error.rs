//! Internal error helpers for mapping HTTP/reqwest errors to [`AltaryError`].

use altary_types::AltaryError;

/// Longest service message carried into an error.
const MAX_MESSAGE_LEN: usize = 300;

/// Map a non-success HTTP status to an [`AltaryError`].
///
/// `resource` is the project or error id addressed by the request; a 404 is
/// only reported as [`AltaryError::NotFound`] when one was addressed.
pub(crate) fn map_http_status(
    status: reqwest::StatusCode,
    body: &str,
    resource: Option<&str>,
) -> AltaryError {
    let message = error_message(status, body);
    match (status.as_u16(), resource) {
        (401 | 403, _) => AltaryError::Unauthenticated {
            status: Some(status.as_u16()),
            message,
        },
        (404, Some(resource)) => AltaryError::NotFound {
            resource: resource.to_string(),
            message,
        },
        (code, _) => AltaryError::Remote {
            status: code,
            message,
        },
    }
}

/// Map a [`reqwest::Error`] to [`AltaryError::Transport`].
pub(crate) fn map_reqwest_error(err: reqwest::Error) -> AltaryError {
    if err.is_timeout() {
        tracing::debug!(error = %err, "request timed out");
        return AltaryError::Transport(Box::new(std::io::Error::new(
            std::io::ErrorKind::TimedOut,
            err,
        )));
    }
    tracing::debug!(error = %err, "request failed");
    AltaryError::Transport(Box::new(err))
}

/// Best-effort human message from an error body.
///
/// Prefers a JSON `message` or `error` string, then the raw body, then the
/// status line.
pub(crate) fn error_message(status: reqwest::StatusCode, body: &str) -> String {
    if let Ok(json) = serde_json::from_str::<serde_json::Value>(body) {
        for key in ["message", "error"] {
            if let Some(text) = json.get(key).and_then(|v| v.as_str()) {
                return truncate(text);
            }
        }
    }
    let trimmed = body.trim();
    if trimmed.is_empty() {
        format!("HTTP {status}")
    } else {
        truncate(trimmed)
    }
}

fn truncate(text: &str) -> String {
    if text.len() <= MAX_MESSAGE_LEN {
        return text.to_string();
    }
    let mut end = MAX_MESSAGE_LEN;
    while !text.is_char_boundary(end) {
        end -= 1;
    }
    format!("{}...", &text[..end])
}
