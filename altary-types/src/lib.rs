#![deny(missing_docs)]
//! Shared vocabulary for the Altary MCP crates.
//!
//! Everything here is plain data: the persisted [`Session`], the records
//! returned by the remote service ([`Project`], [`ErrorRecord`],
//! [`CompletionOutcome`]) and the failure taxonomy [`AltaryError`] that the
//! session store, the remote client and the auth flow all return. Rendering
//! these into user-facing text is left to the boundary crate.

pub mod error;
pub mod types;

pub use error::*;
pub use types::*;
