//! Session-dependent services.
//!
//! ARCHITECTURE
//! ============
//! `session` owns the authentication lifecycle and is the only writer of
//! `SessionState`. `ledger` borrows the session's credential for its calls
//! and hands back to the session's refresh once the server confirms.

pub mod ledger;
pub mod session;
