//! Session state and the profile it carries.
//!
//! DESIGN
//! ======
//! `SessionState` is the single source of truth for authentication status.
//! `is_authenticated` is derived from the variant, never stored, so the
//! "authenticated without a user" combination cannot be represented.
//! Readers hold a [`SessionSubscription`]; only the session machine writes.

use serde::{Deserialize, Deserializer, Serialize};
use tokio::sync::watch;

// =============================================================================
// PROFILE
// =============================================================================

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "UPPERCASE")]
pub enum UserRole {
    Student,
    Teacher,
    Admin,
    #[serde(other)]
    Unknown,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum MembershipStatus {
    Pending,
    Approved,
    Rejected,
    #[serde(other)]
    Unknown,
}

/// One entry of the append-only points history.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ParasTransaction {
    pub amount: i64,
    pub transaction_type: String,
    #[serde(default)]
    pub reason: Option<String>,
    pub timestamp: String,
}

/// The authenticated user's profile as served by `GET users/{id}/`.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct SessionUser {
    #[serde(deserialize_with = "deserialize_id")]
    pub uid: String,
    pub email: String,
    #[serde(default)]
    pub display_name: Option<String>,
    #[serde(default, rename = "photoURL")]
    pub photo_url: Option<String>,
    pub role: UserRole,
    #[serde(default)]
    pub membership_status: Option<MembershipStatus>,
    #[serde(default)]
    pub created_at: Option<String>,
    #[serde(default)]
    pub institute: Option<String>,
    #[serde(default)]
    pub course: Option<String>,
    #[serde(default)]
    pub bio: Option<String>,
    #[serde(default)]
    pub paras_stones: i64,
    #[serde(default)]
    pub coins: i64,
    #[serde(default, deserialize_with = "deserialize_history")]
    pub paras_history: Vec<ParasTransaction>,
}

impl SessionUser {
    /// Lightweight identity projection.
    #[must_use]
    pub fn identity(&self) -> AuthUser {
        AuthUser { uid: self.uid.clone(), email: self.email.clone() }
    }

    /// Display name if set and non-blank.
    #[must_use]
    pub fn display_name(&self) -> Option<&str> {
        self.display_name.as_deref().map(str::trim).filter(|n| !n.is_empty())
    }
}

/// `{ uid, email }` of the signed-in user.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct AuthUser {
    pub uid: String,
    pub email: String,
}

// Ids arrive as strings or integers depending on the backend model.
fn deserialize_id<'de, D: Deserializer<'de>>(deserializer: D) -> Result<String, D::Error> {
    #[derive(Deserialize)]
    #[serde(untagged)]
    enum RawId {
        Text(String),
        Number(i64),
    }
    Ok(match RawId::deserialize(deserializer)? {
        RawId::Text(s) => s,
        RawId::Number(n) => n.to_string(),
    })
}

fn deserialize_history<'de, D: Deserializer<'de>>(deserializer: D) -> Result<Vec<ParasTransaction>, D::Error> {
    Ok(Option::<Vec<ParasTransaction>>::deserialize(deserializer)?.unwrap_or_default())
}

// =============================================================================
// SESSION STATE
// =============================================================================

#[derive(Debug, Clone, PartialEq, Eq, Default)]
pub enum SessionState {
    /// Before the first load attempt.
    #[default]
    Uninitialized,
    /// An initialize or login is in flight.
    Loading,
    Authenticated(SessionUser),
    /// No valid credential.
    Anonymous,
}

impl SessionState {
    #[must_use]
    pub fn is_authenticated(&self) -> bool {
        matches!(self, Self::Authenticated(_))
    }

    /// `true` until the first initialize or login resolves. Consumers must
    /// not treat the absence of a user as final while this holds.
    #[must_use]
    pub fn is_loading(&self) -> bool {
        matches!(self, Self::Uninitialized | Self::Loading)
    }

    #[must_use]
    pub fn user(&self) -> Option<&SessionUser> {
        match self {
            Self::Authenticated(user) => Some(user),
            _ => None,
        }
    }
}

// =============================================================================
// SUBSCRIPTION
// =============================================================================

/// Read handle on the session state.
#[derive(Debug, Clone)]
pub struct SessionSubscription {
    rx: watch::Receiver<SessionState>,
}

impl SessionSubscription {
    pub(crate) fn new(rx: watch::Receiver<SessionState>) -> Self {
        Self { rx }
    }

    #[must_use]
    pub fn current(&self) -> SessionState {
        self.rx.borrow().clone()
    }

    #[must_use]
    pub fn is_authenticated(&self) -> bool {
        self.rx.borrow().is_authenticated()
    }

    #[must_use]
    pub fn is_loading(&self) -> bool {
        self.rx.borrow().is_loading()
    }

    #[must_use]
    pub fn current_user(&self) -> Option<SessionUser> {
        self.rx.borrow().user().cloned()
    }

    /// Wait for the next state change. `None` once the session is gone.
    pub async fn changed(&mut self) -> Option<SessionState> {
        self.rx.changed().await.ok()?;
        Some(self.rx.borrow_and_update().clone())
    }

    /// Wait until the state is no longer loading and return it.
    pub async fn resolved(&mut self) -> Option<SessionState> {
        let state = self.rx.wait_for(|s| !s.is_loading()).await.ok()?;
        Some(state.clone())
    }
}

#[cfg(test)]
#[path = "state_test.rs"]
mod tests;
