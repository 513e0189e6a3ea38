//! Session state machine: login, logout, initialize, refresh, profile update.
//!
//! ARCHITECTURE
//! ============
//! The machine is the only writer of `SessionState`. Every transition does
//! its network work first and publishes as its last step, through
//! `commit`, which compares the epoch captured when the transition started
//! with the current one. Login, initialize and every session end advance the
//! epoch, so a slower transition that resolves after one of them is
//! discarded with [`SessionError::Superseded`] instead of resurrecting a
//! stale state.
//!
//! Ending a session (explicit logout, inbound 401, failed login/refresh) goes
//! through one idempotent step: clear the credential store, drop the
//! transport's default token, publish `Anonymous`. It reports whether a live
//! session was actually ended so callers can notify exactly once. A session
//! is live once it is authenticated or while a stored credential is being
//! restored; a login still waiting on its profile is not.
//!
//! TRADE-OFFS
//! ==========
//! The inner mutex is only held for synchronous bookkeeping (epoch, the
//! in-memory credential, a storage write) and never across an await.

use std::fmt;
use std::sync::{Arc, Mutex, MutexGuard, PoisonError};

use serde::{Deserialize, Serialize};
use serde_json::Value as JsonValue;
use tokio::sync::watch;

use crate::config::{self, LOGOUT_PATH, REGISTER_PATH, TOKEN_PATH};
use crate::error::{ErrorCode, FailureKind};
use crate::net::{ApiRequest, ApiResponse, ExpiryHook, Transport, TransportError};
use crate::state::{SessionState, SessionSubscription, SessionUser};
use crate::storage::StorageError;
use crate::storage::credentials::{Credential, CredentialStore};
use crate::token;

// =============================================================================
// ERROR TYPE
// =============================================================================

#[derive(Debug, thiserror::Error)]
pub enum SessionError {
    #[error(transparent)]
    Transport(#[from] TransportError),

    #[error("credential storage failed: {0}")]
    Storage(#[from] StorageError),

    /// The token endpoint answered without a usable token or user id.
    #[error("token response missing {0}")]
    IncompleteCredential(&'static str),

    #[error("no authenticated session")]
    NotAuthenticated,

    /// A newer transition moved the session on before this one finished.
    #[error("superseded by a newer session transition")]
    Superseded,
}

impl SessionError {
    /// The server's message, if the failure came with one.
    #[must_use]
    pub fn server_message(&self) -> Option<&str> {
        match self {
            Self::Transport(e) => e.server_message(),
            _ => None,
        }
    }

    #[must_use]
    pub fn status(&self) -> Option<u16> {
        match self {
            Self::Transport(e) => e.status(),
            _ => None,
        }
    }
}

impl ErrorCode for SessionError {
    fn error_code(&self) -> &'static str {
        match self {
            Self::Transport(e) => e.error_code(),
            Self::Storage(e) => e.error_code(),
            Self::IncompleteCredential(_) => "E_INCOMPLETE_CREDENTIAL",
            Self::NotAuthenticated => "E_NOT_AUTHENTICATED",
            Self::Superseded => "E_SUPERSEDED",
        }
    }

    fn failure_kind(&self) -> FailureKind {
        match self {
            Self::Transport(e) => e.failure_kind(),
            Self::NotAuthenticated => FailureKind::Authentication,
            Self::Storage(_) | Self::IncompleteCredential(_) | Self::Superseded => FailureKind::Internal,
        }
    }

    fn retryable(&self) -> bool {
        match self {
            Self::Transport(e) => e.retryable(),
            _ => false,
        }
    }
}

// =============================================================================
// WIRE TYPES
// =============================================================================

/// Partial profile update. Absent fields are left untouched by the server.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct ProfileUpdate {
    pub display_name: String,
    #[serde(rename = "photoURL", skip_serializing_if = "Option::is_none")]
    pub photo_url: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub institute: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub course: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub bio: Option<String>,
}

impl ProfileUpdate {
    #[must_use]
    pub fn new(display_name: impl Into<String>) -> Self {
        Self { display_name: display_name.into(), ..Self::default() }
    }
}

/// New account payload for `POST users/`.
#[derive(Clone, Default, Serialize)]
pub struct RegistrationData {
    pub email: String,
    pub username: String,
    pub password: String,
    pub first_name: String,
    pub last_name: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub institute: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub course: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub bio: Option<String>,
}

impl fmt::Debug for RegistrationData {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("RegistrationData")
            .field("email", &self.email)
            .field("username", &self.username)
            .field("password", &"<redacted>")
            .field("first_name", &self.first_name)
            .field("last_name", &self.last_name)
            .finish_non_exhaustive()
    }
}

#[derive(Deserialize)]
struct TokenResponse {
    #[serde(default, rename = "accessToken", alias = "access", alias = "access_token")]
    access_token: Option<String>,
    #[serde(default, rename = "userId", alias = "user_id", alias = "uid")]
    user_id: Option<JsonValue>,
}

impl TokenResponse {
    /// The server's user id wins; the token claim is only a fallback.
    fn into_credential(self) -> Result<Credential, SessionError> {
        let access_token = self
            .access_token
            .filter(|t| !t.is_empty())
            .ok_or(SessionError::IncompleteCredential("access token"))?;
        let user_id = match self.user_id {
            Some(JsonValue::String(s)) if !s.is_empty() => Some(s),
            Some(JsonValue::Number(n)) => Some(n.to_string()),
            _ => token::decode_user_id(&access_token),
        }
        .ok_or(SessionError::IncompleteCredential("user id"))?;
        Ok(Credential { access_token, user_id })
    }
}

// =============================================================================
// MACHINE
// =============================================================================

struct Inner {
    epoch: u64,
    credential: Option<Credential>,
    live: bool,
}

pub struct SessionMachine {
    transport: Arc<Transport>,
    credentials: CredentialStore,
    inner: Mutex<Inner>,
    state: watch::Sender<SessionState>,
}

impl SessionMachine {
    /// Build the machine and register it as the transport's expiry hook.
    #[must_use]
    pub fn new(transport: Arc<Transport>, credentials: CredentialStore) -> Arc<Self> {
        let (state, _) = watch::channel(SessionState::Uninitialized);
        let machine = Arc::new(Self {
            transport,
            credentials,
            inner: Mutex::new(Inner { epoch: 0, credential: None, live: false }),
            state,
        });
        let hook: Arc<dyn ExpiryHook> = machine.clone();
        machine.transport.set_expiry_hook(Arc::downgrade(&hook));
        machine
    }

    #[must_use]
    pub fn transport(&self) -> &Arc<Transport> {
        &self.transport
    }

    #[must_use]
    pub fn subscribe(&self) -> SessionSubscription {
        SessionSubscription::new(self.state.subscribe())
    }

    #[must_use]
    pub fn state(&self) -> SessionState {
        self.state.borrow().clone()
    }

    #[must_use]
    pub fn is_authenticated(&self) -> bool {
        self.state.borrow().is_authenticated()
    }

    #[must_use]
    pub fn current_user(&self) -> Option<SessionUser> {
        self.state.borrow().user().cloned()
    }

    /// The in-memory access token, if a credential is installed.
    #[must_use]
    pub fn auth_token(&self) -> Option<String> {
        self.lock().credential.as_ref().map(|c| c.access_token.clone())
    }

    // -------------------------------------------------------------------------
    // transitions
    // -------------------------------------------------------------------------

    /// Restore a persisted session. `Ok(None)` when nothing was stored.
    ///
    /// # Errors
    ///
    /// Returns the profile fetch failure; the session is anonymous and the
    /// store cleared in that case.
    pub async fn initialize(&self) -> Result<Option<SessionUser>, SessionError> {
        let Some(credential) = self.credentials.load() else {
            self.end_session();
            return Ok(None);
        };

        let user_id = credential.user_id.clone();
        let epoch = self.begin(Some(credential));
        match self.fetch_profile(&user_id).await {
            Ok(user) => {
                self.commit(epoch, SessionState::Authenticated(user.clone()))?;
                tracing::info!(user_id = %user_id, "session restored");
                Ok(Some(user))
            }
            Err(e) => {
                tracing::warn!(user_id = %user_id, error = %e, "stored credential rejected");
                self.end_session_if_current(epoch);
                Err(e.into())
            }
        }
    }

    /// Exchange email/password for a credential and load the profile.
    ///
    /// # Errors
    ///
    /// Any failure leaves the session anonymous with nothing persisted,
    /// unless a newer transition superseded this one.
    pub async fn login(&self, email: &str, password: &str) -> Result<SessionUser, SessionError> {
        let epoch = self.begin(None);
        let result = self.establish(epoch, email, password).await;
        match &result {
            Ok(user) => tracing::info!(user_id = %user.uid, "login succeeded"),
            Err(SessionError::Superseded) => tracing::debug!("login superseded"),
            Err(e) => {
                tracing::warn!(error = %e, "login failed");
                self.end_session_if_current(epoch);
            }
        }
        result
    }

    async fn establish(&self, epoch: u64, email: &str, password: &str) -> Result<SessionUser, SessionError> {
        let request = ApiRequest::post(TOKEN_PATH).json(serde_json::json!({ "email": email, "password": password }));
        let issued: TokenResponse = self.transport.send_json(request).await?;
        let credential = issued.into_credential()?;
        let user_id = credential.user_id.clone();

        self.install(epoch, credential)?;
        let user = self.fetch_profile(&user_id).await?;
        self.commit(epoch, SessionState::Authenticated(user.clone()))?;
        Ok(user)
    }

    /// Create an account, then log in with the same email and password.
    ///
    /// # Errors
    ///
    /// Returns the registration rejection (field errors in the server
    /// message) or the subsequent login failure.
    pub async fn register(&self, data: &RegistrationData) -> Result<SessionUser, SessionError> {
        let body = serde_json::to_value(data).map_err(|e| TransportError::Build(e.to_string()))?;
        let request = ApiRequest::post(REGISTER_PATH).json(body).without_expiry_check();
        self.transport.send(request).await.inspect_err(|e| {
            tracing::warn!(error = %e, "registration rejected");
        })?;
        tracing::info!(email = %data.email, "account created");
        self.login(&data.email, &data.password).await
    }

    /// End the session. With `notify_server`, first attempt a best-effort
    /// server-side invalidation whose outcome never blocks the local logout.
    ///
    /// Returns `true` if a live session was ended by this call.
    pub async fn logout(&self, notify_server: bool) -> bool {
        if notify_server && self.auth_token().is_some() {
            let request = ApiRequest::post(LOGOUT_PATH).without_expiry_check();
            if let Err(e) = self.transport.send(request).await {
                tracing::warn!(error = %e, "server-side logout failed, ending session locally");
            }
        }
        self.end_session()
    }

    /// Re-fetch the profile for the current credential.
    ///
    /// # Errors
    ///
    /// 401/403 end the session. Other failures leave the state untouched.
    pub async fn refresh(&self) -> Result<SessionUser, SessionError> {
        let (epoch, credential) = self.authenticated_credential()?;
        match self.fetch_profile(&credential.user_id).await {
            Ok(user) => {
                self.commit(epoch, SessionState::Authenticated(user.clone()))?;
                Ok(user)
            }
            Err(e) => {
                tracing::warn!(user_id = %credential.user_id, error = %e, "profile refresh failed");
                if e.is_auth_failure() {
                    self.end_session_if_current(epoch);
                }
                Err(e.into())
            }
        }
    }

    /// Send a partial profile update, then refresh from the server's record.
    ///
    /// # Errors
    ///
    /// Returns the rejection so a form can tell "saved" from "not saved".
    pub async fn update_profile(&self, update: &ProfileUpdate) -> Result<SessionUser, SessionError> {
        let (_, credential) = self.authenticated_credential()?;
        let body = serde_json::to_value(update).map_err(|e| TransportError::Build(e.to_string()))?;
        let request = ApiRequest::patch(config::profile_path(&credential.user_id)).json(body);
        self.authorized_send(request).await.inspect_err(|e| {
            tracing::warn!(user_id = %credential.user_id, error = %e, "profile update rejected");
        })?;
        self.refresh().await
    }

    /// Send a call on behalf of the authenticated user. 401/403 end the
    /// session (if it is still the one the call was made for).
    pub(crate) async fn authorized_send(&self, request: ApiRequest) -> Result<ApiResponse, SessionError> {
        let (epoch, _) = self.authenticated_credential()?;
        match self.transport.send(request).await {
            Ok(response) => Ok(response),
            Err(e) => {
                if e.is_auth_failure() {
                    self.end_session_if_current(epoch);
                }
                Err(e.into())
            }
        }
    }

    // -------------------------------------------------------------------------
    // bookkeeping
    // -------------------------------------------------------------------------

    fn lock(&self) -> MutexGuard<'_, Inner> {
        self.inner.lock().unwrap_or_else(PoisonError::into_inner)
    }

    async fn fetch_profile(&self, user_id: &str) -> Result<SessionUser, TransportError> {
        self.transport.send_json(ApiRequest::get(config::profile_path(user_id))).await
    }

    fn authenticated_credential(&self) -> Result<(u64, Credential), SessionError> {
        let inner = self.lock();
        if !self.state.borrow().is_authenticated() {
            return Err(SessionError::NotAuthenticated);
        }
        let credential = inner.credential.clone().ok_or(SessionError::NotAuthenticated)?;
        Ok((inner.epoch, credential))
    }

    /// Start an identity-changing transition: new epoch, `Loading`. Only a
    /// restore (which starts from a stored credential) counts as live.
    fn begin(&self, credential: Option<Credential>) -> u64 {
        let mut inner = self.lock();
        inner.epoch += 1;
        inner.live = credential.is_some();
        match &credential {
            Some(c) => self.transport.set_auth_token(c.access_token.clone()),
            None => self.transport.clear_auth_token(),
        }
        inner.credential = credential;
        self.publish(SessionState::Loading);
        inner.epoch
    }

    /// Persist and activate a freshly issued credential.
    fn install(&self, epoch: u64, credential: Credential) -> Result<(), SessionError> {
        let mut inner = self.lock();
        if inner.epoch != epoch {
            return Err(SessionError::Superseded);
        }
        self.credentials.save(&credential)?;
        self.transport.set_auth_token(credential.access_token.clone());
        inner.credential = Some(credential);
        Ok(())
    }

    fn commit(&self, epoch: u64, next: SessionState) -> Result<(), SessionError> {
        let mut inner = self.lock();
        if inner.epoch != epoch {
            return Err(SessionError::Superseded);
        }
        inner.live |= next.is_authenticated();
        self.publish(next);
        Ok(())
    }

    fn end_session(&self) -> bool {
        let mut inner = self.lock();
        self.end_locked(&mut inner)
    }

    fn end_session_if_current(&self, epoch: u64) -> bool {
        let mut inner = self.lock();
        inner.epoch == epoch && self.end_locked(&mut inner)
    }

    fn end_locked(&self, inner: &mut Inner) -> bool {
        let was_live = std::mem::take(&mut inner.live);
        inner.epoch += 1;
        inner.credential = None;
        if let Err(e) = self.credentials.clear() {
            tracing::error!(error = %e, "failed to clear stored credential");
        }
        self.transport.clear_auth_token();
        self.publish(SessionState::Anonymous);
        was_live
    }

    /// Replace the state, waking subscribers only on an actual change.
    fn publish(&self, next: SessionState) {
        self.state.send_if_modified(|current| {
            if *current == next {
                return false;
            }
            *current = next;
            true
        });
    }
}

impl ExpiryHook for SessionMachine {
    fn session_expired(&self) -> bool {
        self.end_session()
    }
}

#[cfg(test)]
#[path = "session_test.rs"]
mod tests;
