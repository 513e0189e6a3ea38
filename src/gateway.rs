//! Application-facing session gateway.
//!
//! DESIGN
//! ======
//! The services return `Result`s; the gateway is where those outcomes turn
//! into what a UI needs: booleans and options, plus exactly one user-facing
//! notice per transition. Failures are always logged by the services, so the
//! gateway only decides the wording.

use std::sync::Arc;

use crate::config::GatewayConfig;
use crate::error::{ErrorCode, FailureKind};
use crate::net::{Transport, TransportError};
use crate::notify::{Notice, Notifier};
use crate::services::ledger::{Ledger, LedgerError};
use crate::services::session::{ProfileUpdate, RegistrationData, SessionError, SessionMachine};
use crate::state::{AuthUser, SessionState, SessionSubscription, SessionUser};
use crate::storage::FileStorage;
use crate::storage::credentials::CredentialStore;

pub const LOGOUT_MESSAGE: &str = "Signed out successfully";
pub const NO_SESSION_MESSAGE: &str = "No user logged in.";
pub const INSUFFICIENT_BALANCE_MESSAGE: &str = "Insufficient Paras Stones!";
pub const REGISTERED_MESSAGE: &str = "Account created successfully!";
pub const PROFILE_UPDATED_MESSAGE: &str = "Profile updated successfully";

pub struct Gateway {
    session: Arc<SessionMachine>,
    ledger: Ledger,
    notifier: Arc<dyn Notifier>,
}

impl Gateway {
    #[must_use]
    pub fn new(transport: Arc<Transport>, credentials: CredentialStore, notifier: Arc<dyn Notifier>) -> Self {
        let session = SessionMachine::new(transport, credentials);
        let ledger = Ledger::new(session.clone());
        Self { session, ledger, notifier }
    }

    /// Gateway over `reqwest` with the credential persisted to the
    /// configured file.
    ///
    /// # Errors
    ///
    /// Returns [`TransportError::Build`] if the HTTP client cannot be built.
    pub fn from_config(config: &GatewayConfig, notifier: Arc<dyn Notifier>) -> Result<Self, TransportError> {
        let transport = Arc::new(Transport::from_config(config, notifier.clone())?);
        let storage = Arc::new(FileStorage::new(config.credentials_path.clone()));
        Ok(Self::new(transport, CredentialStore::new(storage), notifier))
    }

    // -------------------------------------------------------------------------
    // read side
    // -------------------------------------------------------------------------

    #[must_use]
    pub fn subscribe(&self) -> SessionSubscription {
        self.session.subscribe()
    }

    #[must_use]
    pub fn state(&self) -> SessionState {
        self.session.state()
    }

    #[must_use]
    pub fn is_authenticated(&self) -> bool {
        self.session.is_authenticated()
    }

    #[must_use]
    pub fn is_loading(&self) -> bool {
        self.session.state().is_loading()
    }

    #[must_use]
    pub fn current_user(&self) -> Option<SessionUser> {
        self.session.current_user()
    }

    #[must_use]
    pub fn auth_user(&self) -> Option<AuthUser> {
        self.session.current_user().map(|u| u.identity())
    }

    /// Access token for collaborators that build their own requests.
    #[must_use]
    pub fn auth_token(&self) -> Option<String> {
        self.session.auth_token()
    }

    /// The shared transport; route other API calls through it so they get
    /// the same credential and expiry handling.
    #[must_use]
    pub fn transport(&self) -> &Arc<Transport> {
        self.session.transport()
    }

    #[must_use]
    pub fn session(&self) -> &Arc<SessionMachine> {
        &self.session
    }

    #[must_use]
    pub fn ledger(&self) -> &Ledger {
        &self.ledger
    }

    // -------------------------------------------------------------------------
    // transitions
    // -------------------------------------------------------------------------

    /// Restore a stored session. Silent: a rejected credential just leaves
    /// the session anonymous.
    pub async fn initialize(&self) -> Option<SessionUser> {
        self.session.initialize().await.ok().flatten()
    }

    pub async fn login(&self, email: &str, password: &str) -> bool {
        match self.session.login(email, password).await {
            Ok(user) => {
                let message = match user.display_name() {
                    Some(name) => format!("Welcome back, {name}!"),
                    None => "Welcome back!".to_string(),
                };
                self.notifier.notify(Notice::success(message));
                true
            }
            Err(SessionError::Superseded) => false,
            Err(e) => {
                self.notifier.notify(Notice::error(login_failure_message(&e)));
                false
            }
        }
    }

    pub async fn register(&self, data: &RegistrationData) -> bool {
        match self.session.register(data).await {
            Ok(_) => {
                self.notifier.notify(Notice::success(REGISTERED_MESSAGE));
                true
            }
            Err(SessionError::Superseded) => false,
            Err(e) => {
                let message = e.server_message().unwrap_or("Registration failed. Please try again.");
                self.notifier.notify(Notice::error(message));
                false
            }
        }
    }

    /// Sign out, telling the server first on a best-effort basis.
    pub async fn logout(&self) -> bool {
        let ended = self.session.logout(true).await;
        if ended {
            self.notifier.notify(Notice::success(LOGOUT_MESSAGE));
        }
        ended
    }

    pub async fn refresh(&self) -> Option<SessionUser> {
        self.session.refresh().await.ok()
    }

    /// # Errors
    ///
    /// Returns the rejection after notifying it.
    pub async fn update_profile(&self, update: &ProfileUpdate) -> Result<SessionUser, SessionError> {
        match self.session.update_profile(update).await {
            Ok(user) => {
                self.notifier.notify(Notice::success(PROFILE_UPDATED_MESSAGE));
                Ok(user)
            }
            Err(e) => {
                let reason = e.server_message().map_or_else(|| e.to_string(), str::to_string);
                self.notifier.notify(Notice::error(format!("Failed to update profile: {reason}")));
                Err(e)
            }
        }
    }

    pub async fn credit(&self, amount: u64, reason: &str) -> bool {
        match self.ledger.credit(amount, reason).await {
            Ok(_) => {
                self.notifier
                    .notify(Notice::success(format!("You earned {amount} Paras Stones! {reason}")));
                true
            }
            Err(e) => {
                self.notifier.notify(Notice::error(ledger_failure_message(&e, "Failed to add Paras Stones")));
                false
            }
        }
    }

    pub async fn debit(&self, amount: u64, reason: &str) -> bool {
        match self.ledger.debit(amount, reason).await {
            Ok(_) => {
                self.notifier
                    .notify(Notice::success(format!("You spent {amount} Paras Stones on {reason}")));
                true
            }
            Err(e) => {
                self.notifier.notify(Notice::error(ledger_failure_message(&e, "Failed to spend Paras Stones")));
                false
            }
        }
    }
}

fn login_failure_message(error: &SessionError) -> String {
    let server = error.server_message();
    let text = match error.status() {
        Some(401) => server.unwrap_or("Invalid email or password."),
        Some(400) => server.unwrap_or("Login failed due to missing information."),
        _ if error.failure_kind() == FailureKind::Network => "Failed to connect to the server. Please try again.",
        _ => server.unwrap_or("Login failed. Please try again."),
    };
    text.to_string()
}

fn ledger_failure_message(error: &LedgerError, fallback: &str) -> String {
    match error {
        LedgerError::InsufficientBalance { .. } => INSUFFICIENT_BALANCE_MESSAGE.to_string(),
        LedgerError::Session(SessionError::NotAuthenticated) => NO_SESSION_MESSAGE.to_string(),
        _ => error.server_message().unwrap_or(fallback).to_string(),
    }
}

#[cfg(test)]
#[path = "gateway_test.rs"]
mod tests;
