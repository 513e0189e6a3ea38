//! Credential persistence: the access token and user id pair.
//!
//! Both keys are written together and removed together. A store holding
//! only one of them (left behind by an interrupted writer from an older
//! client) loads as absent.

use std::fmt;
use std::sync::Arc;

use super::{KeyValueStorage, StorageError};

pub const TOKEN_KEY: &str = "authToken";
pub const USER_ID_KEY: &str = "userId";

/// Access token plus the id of the user it was issued to.
#[derive(Clone, PartialEq, Eq)]
pub struct Credential {
    pub access_token: String,
    pub user_id: String,
}

impl Credential {
    #[must_use]
    pub fn new(access_token: impl Into<String>, user_id: impl Into<String>) -> Self {
        Self { access_token: access_token.into(), user_id: user_id.into() }
    }
}

// Tokens never go to logs.
impl fmt::Debug for Credential {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Credential")
            .field("access_token", &"<redacted>")
            .field("user_id", &self.user_id)
            .finish()
    }
}

#[derive(Clone)]
pub struct CredentialStore {
    storage: Arc<dyn KeyValueStorage>,
}

impl CredentialStore {
    #[must_use]
    pub fn new(storage: Arc<dyn KeyValueStorage>) -> Self {
        Self { storage }
    }

    /// Persist both fields in one write.
    ///
    /// # Errors
    ///
    /// Returns the storage error; nothing is persisted in that case.
    pub fn save(&self, credential: &Credential) -> Result<(), StorageError> {
        self.storage.set_items(&[
            (TOKEN_KEY, credential.access_token.as_str()),
            (USER_ID_KEY, credential.user_id.as_str()),
        ])
    }

    /// Load the stored credential, or `None` if either half is missing or
    /// empty. Read failures are logged and treated as absent.
    #[must_use]
    pub fn load(&self) -> Option<Credential> {
        let read = |key: &str| match self.storage.get_item(key) {
            Ok(value) => value.filter(|v| !v.is_empty()),
            Err(e) => {
                tracing::warn!(error = %e, key, "credential read failed");
                None
            }
        };
        let access_token = read(TOKEN_KEY)?;
        let user_id = read(USER_ID_KEY)?;
        Some(Credential { access_token, user_id })
    }

    /// Remove both keys. Safe to call on an empty store.
    ///
    /// # Errors
    ///
    /// Returns the storage error if the removal could not be written.
    pub fn clear(&self) -> Result<(), StorageError> {
        self.storage.remove_items(&[TOKEN_KEY, USER_ID_KEY])
    }
}

#[cfg(test)]
#[path = "credentials_test.rs"]
mod tests;
