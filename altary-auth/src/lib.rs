#![deny(missing_docs)]
//! Authentication flows for the Altary MCP server.
//!
//! [`AuthFlow`] turns either a token supplied directly or a browser sign-in
//! into a token stored in the [`SessionStore`](altary_session::SessionStore).
//!
//! ## Separation of Concerns
//!
//! The flow owns the state machine ([`AuthAttempt`]) and the decision of what
//! gets persisted. Obtaining a token from the browser is delegated to a
//! [`TokenExchange`], and opening the URL to a [`BrowserLauncher`]. Both are
//! trait objects so the flow can be driven by scripted fakes in tests and by
//! [`LoopbackExchange`] / [`SystemBrowser`] in production.

pub mod attempt;
pub mod browser;
pub mod exchange;
pub mod flow;

pub use attempt::{AuthAttempt, AuthState};
pub use browser::{BrowserLauncher, NoBrowser, SystemBrowser};
pub use exchange::{ExchangeStatus, LoopbackExchange, PendingExchange, TokenExchange};
pub use flow::{AuthFlow, AuthReport, DEFAULT_AUTH_TIMEOUT, DEFAULT_POLL_INTERVAL, auth_page_url};
