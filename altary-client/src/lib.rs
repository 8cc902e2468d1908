#![deny(missing_docs)]
//! Typed HTTP client for the Altary error-management API.
//!
//! [`RemoteClient`] wraps the three endpoints the integration needs (list
//! projects, list a project's errors, complete an error together with its
//! similar errors). It reads the token and base URL from a shared
//! [`SessionStore`](altary_session::SessionStore), bounds every request with a
//! timeout, and reports failures as [`AltaryError`](altary_types::AltaryError).
//! It never retries on its own.

pub mod client;
pub(crate) mod error;
pub(crate) mod mapping;

pub use client::{DEFAULT_TIMEOUT, RemoteClient};

// Re-export altary-types for convenience
pub use altary_types::{AltaryError, CompletionOutcome, ErrorRecord, Project};
