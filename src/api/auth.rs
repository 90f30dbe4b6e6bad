//! Bearer token lookup for authenticated identities.
//!
//! The adapter never reaches for a global token store: a [`CredentialProvider`]
//! is injected into each filesystem instance. [`KeyringCredentials`] keeps
//! tokens in the OS keychain; [`StaticCredentials`] is an in-memory map.

use std::collections::HashMap;
use std::sync::RwLock;

use keyring::Entry;
use thiserror::Error;

/// Default keychain service name for stored access tokens.
const SERVICE_NAME: &str = "drivefs.oauth";

/// Source of OAuth access tokens keyed by user identity.
pub trait CredentialProvider: Send + Sync {
    /// Current access token for `user`, or `None` if the user never authenticated.
    fn access_token(&self, user: &str) -> Option<String>;
}

#[derive(Debug, Error)]
pub enum KeychainError {
    #[error("Keychain operation failed: {0}")]
    OperationFailed(String),
}

impl From<keyring::Error> for KeychainError {
    fn from(err: keyring::Error) -> Self {
        KeychainError::OperationFailed(err.to_string())
    }
}

/// Access tokens stored in the OS keychain, one entry per user.
pub struct KeyringCredentials {
    service: String,
}

impl KeyringCredentials {
    pub fn new() -> Self {
        Self::with_service(SERVICE_NAME)
    }

    pub fn with_service(service: impl Into<String>) -> Self {
        Self {
            service: service.into(),
        }
    }

    /// Store the access token for `user`.
    pub fn store_token(&self, user: &str, token: &str) -> Result<(), KeychainError> {
        let entry = Entry::new(&self.service, user)?;
        entry.set_password(token)?;
        Ok(())
    }

    /// Retrieve the access token for `user`.
    ///
    /// Returns `None` if no entry exists.
    pub fn get_token(&self, user: &str) -> Result<Option<String>, KeychainError> {
        let entry = Entry::new(&self.service, user)?;
        match entry.get_password() {
            Ok(token) => Ok(Some(token)),
            Err(keyring::Error::NoEntry) => Ok(None),
            Err(e) => Err(KeychainError::from(e)),
        }
    }

    /// Delete the access token for `user`. Missing entries are not an error.
    pub fn delete_token(&self, user: &str) -> Result<(), KeychainError> {
        let entry = Entry::new(&self.service, user)?;
        match entry.delete_credential() {
            Ok(()) => Ok(()),
            Err(keyring::Error::NoEntry) => Ok(()),
            Err(e) => Err(KeychainError::from(e)),
        }
    }
}

impl Default for KeyringCredentials {
    fn default() -> Self {
        Self::new()
    }
}

impl CredentialProvider for KeyringCredentials {
    fn access_token(&self, user: &str) -> Option<String> {
        match self.get_token(user) {
            Ok(token) => token,
            Err(e) => {
                log::warn!("Keychain lookup failed for {}: {}", user, e);
                None
            }
        }
    }
}

/// In-memory token map, for hosts that manage tokens themselves.
#[derive(Default)]
pub struct StaticCredentials {
    tokens: RwLock<HashMap<String, String>>,
}

impl StaticCredentials {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with_token(self, user: &str, token: &str) -> Self {
        self.set_token(user, token);
        self
    }

    pub fn set_token(&self, user: &str, token: &str) {
        if let Ok(mut tokens) = self.tokens.write() {
            tokens.insert(user.to_string(), token.to_string());
        }
    }

    pub fn revoke(&self, user: &str) {
        if let Ok(mut tokens) = self.tokens.write() {
            tokens.remove(user);
        }
    }
}

impl CredentialProvider for StaticCredentials {
    fn access_token(&self, user: &str) -> Option<String> {
        self.tokens.read().ok()?.get(user).cloned()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_static_credentials() {
        let creds = StaticCredentials::new().with_token("alice", "tok-a");
        assert_eq!(creds.access_token("alice").as_deref(), Some("tok-a"));
        assert_eq!(creds.access_token("bob"), None);

        creds.set_token("alice", "tok-b");
        assert_eq!(creds.access_token("alice").as_deref(), Some("tok-b"));

        creds.revoke("alice");
        assert_eq!(creds.access_token("alice"), None);
    }
}
