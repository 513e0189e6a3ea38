//! # sangyan-session
//!
//! Session and authenticated gateway for the Sangyan client: credential
//! persistence, token decoding, the authenticated HTTP transport, the session
//! state machine, and the Paras Stones ledger calls that depend on it.
//!
//! [`Gateway`] is the entry point for applications. The pieces under it are
//! public so other API clients can share the same [`net::Transport`].

pub mod config;
pub mod error;
pub mod gateway;
pub mod net;
pub mod notify;
pub mod services;
pub mod state;
pub mod storage;
pub mod token;

#[cfg(test)]
pub(crate) mod test_helpers;

pub use config::GatewayConfig;
pub use error::{ErrorCode, FailureKind};
pub use gateway::Gateway;
pub use notify::{ConsoleNotifier, Notice, NoticeLevel, Notifier, TracingNotifier};
pub use services::ledger::{Ledger, LedgerError};
pub use services::session::{ProfileUpdate, RegistrationData, SessionError, SessionMachine};
pub use state::{AuthUser, SessionState, SessionSubscription, SessionUser};
