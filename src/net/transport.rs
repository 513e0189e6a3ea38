//! Shared authenticated transport.
//!
//! ARCHITECTURE
//! ============
//! One `Transport` is built at startup and handed to the session machine and
//! to every API-calling collaborator. Each call passes two stages:
//!
//! - outbound: attach `Bearer <token>` from the in-memory credential unless
//!   the call already carries an `Authorization` header;
//! - inbound: a 401 on anything but the token endpoints ends the session
//!   through the registered [`ExpiryHook`] and raises one "session expired"
//!   notice.
//!
//! TRADE-OFFS
//! ==========
//! The hook is held weakly so the session machine (which owns an `Arc` of
//! this transport) is not kept alive by a cycle. A 401 for a request that was
//! sent with a credential that has since been replaced is ignored: it says
//! nothing about the current session.

use std::sync::{Arc, RwLock, Weak};

use reqwest::header::{AUTHORIZATION, HeaderValue};
use serde::de::DeserializeOwned;

use super::backend::{HttpBackend, ReqwestBackend};
use super::types::{ApiRequest, ApiResponse, OutboundRequest, TransportError};
use crate::config::{self, GatewayConfig};
use crate::notify::{Notice, Notifier};

pub const SESSION_EXPIRED_MESSAGE: &str = "Session expired. Please log in again.";

/// Receiver of the inbound-401 signal.
pub trait ExpiryHook: Send + Sync {
    /// Drop the local session without contacting the server. Returns `true`
    /// only if this call ended a live session.
    fn session_expired(&self) -> bool;
}

pub struct Transport {
    base_url: String,
    backend: Arc<dyn HttpBackend>,
    notifier: Arc<dyn Notifier>,
    default_token: RwLock<Option<String>>,
    expiry_hook: RwLock<Option<Weak<dyn ExpiryHook>>>,
}

impl Transport {
    #[must_use]
    pub fn new(base_url: impl Into<String>, backend: Arc<dyn HttpBackend>, notifier: Arc<dyn Notifier>) -> Self {
        let base_url = base_url.into().trim_end_matches('/').to_string();
        Self {
            base_url,
            backend,
            notifier,
            default_token: RwLock::new(None),
            expiry_hook: RwLock::new(None),
        }
    }

    /// Transport backed by `reqwest` with the configured timeouts.
    ///
    /// # Errors
    ///
    /// Returns [`TransportError::Build`] if the HTTP client cannot be built.
    pub fn from_config(config: &GatewayConfig, notifier: Arc<dyn Notifier>) -> Result<Self, TransportError> {
        let backend = ReqwestBackend::new(config.timeouts)?;
        Ok(Self::new(config.base_url.clone(), Arc::new(backend), notifier))
    }

    #[must_use]
    pub fn base_url(&self) -> &str {
        &self.base_url
    }

    /// The token attached to outgoing calls by default.
    #[must_use]
    pub fn auth_token(&self) -> Option<String> {
        self.default_token.read().ok().and_then(|t| t.clone())
    }

    pub fn set_auth_token(&self, token: impl Into<String>) {
        if let Ok(mut slot) = self.default_token.write() {
            *slot = Some(token.into());
        }
    }

    pub fn clear_auth_token(&self) {
        if let Ok(mut slot) = self.default_token.write() {
            *slot = None;
        }
    }

    pub fn set_expiry_hook(&self, hook: Weak<dyn ExpiryHook>) {
        if let Ok(mut slot) = self.expiry_hook.write() {
            *slot = Some(hook);
        }
    }

    /// Send a request through both interceptor stages.
    ///
    /// # Errors
    ///
    /// Returns [`TransportError::Network`] when no response arrived and
    /// [`TransportError::Status`] for any non-2xx status.
    pub async fn send(&self, request: ApiRequest) -> Result<ApiResponse, TransportError> {
        let path = request.path.clone();
        let expiry_check = request.expiry_check;
        let (outbound, attached_default) = self.prepare(request)?;
        let method = outbound.method.clone();

        let response = self
            .backend
            .execute(outbound)
            .await
            .inspect_err(|e| tracing::warn!(%method, path = %path, error = %e, "request failed"))?;

        if response.is_success() {
            return Ok(response);
        }

        tracing::debug!(%method, path = %path, status = response.status, "request rejected");
        if response.status == 401 && expiry_check && !config::is_token_path(&path) {
            self.handle_unauthorized(&path, attached_default.as_deref());
        }
        Err(TransportError::Status { status: response.status, body: response.error_body() })
    }

    /// Send and deserialize a successful body.
    ///
    /// # Errors
    ///
    /// Same as [`Transport::send`], plus [`TransportError::Parse`].
    pub async fn send_json<T: DeserializeOwned>(&self, request: ApiRequest) -> Result<T, TransportError> {
        self.send(request).await?.json()
    }

    // -------------------------------------------------------------------------
    // outbound stage
    // -------------------------------------------------------------------------

    fn prepare(&self, request: ApiRequest) -> Result<(OutboundRequest, Option<String>), TransportError> {
        let ApiRequest { method, path, mut headers, body, .. } = request;

        let mut attached = None;
        if !headers.contains_key(AUTHORIZATION) {
            if let Some(token) = self.auth_token() {
                headers.insert(AUTHORIZATION, bearer_value(&token)?);
                attached = Some(token);
            }
        }

        let url = format!("{}/{}", self.base_url, path.trim_start_matches('/'));
        Ok((OutboundRequest { method, url, headers, body }, attached))
    }

    // -------------------------------------------------------------------------
    // inbound stage
    // -------------------------------------------------------------------------

    fn handle_unauthorized(&self, path: &str, attached_default: Option<&str>) {
        if attached_default.is_some() && attached_default != self.auth_token().as_deref() {
            tracing::debug!(path, "401 for a replaced credential, ignoring");
            return;
        }

        let hook = self.expiry_hook.read().ok().and_then(|slot| slot.as_ref().and_then(Weak::upgrade));
        let Some(hook) = hook else {
            tracing::warn!(path, "401 received with no session attached");
            return;
        };

        if hook.session_expired() {
            tracing::warn!(path, "credential rejected, session ended");
            self.notifier.notify(Notice::error(SESSION_EXPIRED_MESSAGE));
        }
    }
}

/// `Authorization` value for a bearer token.
///
/// # Errors
///
/// Returns [`TransportError::Build`] if the token contains bytes not allowed
/// in a header.
pub fn bearer_value(token: &str) -> Result<HeaderValue, TransportError> {
    let mut value = HeaderValue::from_str(&format!("Bearer {token}"))
        .map_err(|e| TransportError::Build(format!("invalid token header: {e}")))?;
    value.set_sensitive(true);
    Ok(value)
}

#[cfg(test)]
#[path = "transport_test.rs"]
mod tests;
