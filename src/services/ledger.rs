//! Paras Stones ledger: credit and debit against the server balance.
//!
//! Both operations are fully pessimistic. The local balance only changes
//! through the profile refresh that follows the server's confirmation.

use std::sync::Arc;

use crate::config::{CREDIT_PATH, SPEND_PATH};
use crate::error::{ErrorCode, FailureKind};
use crate::net::ApiRequest;
use crate::services::session::{SessionError, SessionMachine};
use crate::state::SessionUser;

#[derive(Debug, thiserror::Error)]
pub enum LedgerError {
    /// The spend endpoint refused the debit for lack of funds.
    #[error("insufficient balance: {message}")]
    InsufficientBalance { message: String },

    #[error(transparent)]
    Session(#[from] SessionError),
}

impl LedgerError {
    #[must_use]
    pub fn server_message(&self) -> Option<&str> {
        match self {
            Self::InsufficientBalance { message } => Some(message),
            Self::Session(e) => e.server_message(),
        }
    }
}

impl ErrorCode for LedgerError {
    fn error_code(&self) -> &'static str {
        match self {
            Self::InsufficientBalance { .. } => "E_INSUFFICIENT_BALANCE",
            Self::Session(e) => e.error_code(),
        }
    }

    fn failure_kind(&self) -> FailureKind {
        match self {
            Self::InsufficientBalance { .. } => FailureKind::Domain,
            Self::Session(e) => e.failure_kind(),
        }
    }

    fn retryable(&self) -> bool {
        match self {
            Self::InsufficientBalance { .. } => false,
            Self::Session(e) => e.retryable(),
        }
    }
}

#[derive(Clone)]
pub struct Ledger {
    session: Arc<SessionMachine>,
}

impl Ledger {
    #[must_use]
    pub fn new(session: Arc<SessionMachine>) -> Self {
        Self { session }
    }

    /// Add `amount` to the balance, then refresh the profile.
    ///
    /// # Errors
    ///
    /// [`SessionError::NotAuthenticated`] without a session; otherwise the
    /// server rejection or the refresh failure.
    pub async fn credit(&self, amount: u64, reason: &str) -> Result<SessionUser, LedgerError> {
        self.post(CREDIT_PATH, amount, reason).await.inspect_err(|e| {
            tracing::warn!(amount, reason, error = %e, "credit failed");
        })?;
        tracing::info!(amount, reason, "paras credited");
        Ok(self.session.refresh().await?)
    }

    /// Take `amount` from the balance, then refresh the profile.
    ///
    /// # Errors
    ///
    /// [`LedgerError::InsufficientBalance`] when the server reports the
    /// balance is too low; otherwise as [`Ledger::credit`].
    pub async fn debit(&self, amount: u64, reason: &str) -> Result<SessionUser, LedgerError> {
        self.post(SPEND_PATH, amount, reason).await.inspect_err(|e| {
            tracing::warn!(amount, reason, error = %e, "debit failed");
        })?;
        tracing::info!(amount, reason, "paras spent");
        Ok(self.session.refresh().await?)
    }

    async fn post(&self, path: &str, amount: u64, reason: &str) -> Result<(), LedgerError> {
        let request = ApiRequest::post(path).json(serde_json::json!({ "amount": amount, "reason": reason }));
        match self.session.authorized_send(request).await {
            Ok(_) => Ok(()),
            Err(e) => Err(classify(e)),
        }
    }
}

/// A 400 whose message mentions "insufficient" is a balance refusal.
fn classify(error: SessionError) -> LedgerError {
    let insufficient = error.status() == Some(400)
        && error.server_message().is_some_and(|m| m.to_lowercase().contains("insufficient"));
    match error.server_message() {
        Some(message) if insufficient => LedgerError::InsufficientBalance { message: message.to_string() },
        _ => LedgerError::Session(error),
    }
}

#[cfg(test)]
#[path = "ledger_test.rs"]
mod tests;
