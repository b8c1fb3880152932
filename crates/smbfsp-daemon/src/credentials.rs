//! Credential store
//!
//! Mount credentials are keyed by `host$$$share`, where host is the server
//! IP when known and the server name otherwise. The remote client asks for
//! credentials through [`AuthProvider`] whenever it first authenticates to a
//! (server, share) pair; the lookup key is built the same way from the
//! arguments it passes.

use std::collections::HashMap;
use std::fmt;
use std::sync::Arc;

use parking_lot::RwLock;
use tracing::{debug, warn};

use smbfsp_core::MountInfo;

/// Separator between host and share in a credential key
pub const KEY_SEPARATOR: &str = "$$$";

/// Credentials for one (host, share) pair
#[derive(Clone, Default, PartialEq, Eq)]
pub struct AuthData {
    pub domain: String,
    pub user: String,
    pub password: String,
}

impl AuthData {
    pub fn new(
        domain: impl Into<String>,
        user: impl Into<String>,
        password: impl Into<String>,
    ) -> Self {
        Self {
            domain: domain.into(),
            user: user.into(),
            password: password.into(),
        }
    }
}

impl fmt::Debug for AuthData {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("AuthData")
            .field("domain", &self.domain)
            .field("user", &self.user)
            .field("password", &"<redacted>")
            .finish()
    }
}

/// Callback the remote client uses to obtain credentials.
///
/// An unknown pair yields empty credentials, which the server treats as an
/// anonymous login.
pub trait AuthProvider: Send + Sync {
    fn auth_data(&self, server: &str, share: &str) -> AuthData;
}

/// Shared `host$$$share` → credentials map
#[derive(Clone, Default)]
pub struct CredentialStore {
    entries: Arc<RwLock<HashMap<String, AuthData>>>,
}

impl CredentialStore {
    pub fn new() -> Self {
        Self::default()
    }

    /// Lookup key for a host and share
    pub fn lookup_key(host: &str, share: &str) -> String {
        format!("{}{}{}", host, KEY_SEPARATOR, share)
    }

    /// Lookup key for a mount: the server IP is preferred over the server name
    pub fn key_for(info: &MountInfo) -> String {
        let host = if info.server_ip.is_empty() {
            &info.server
        } else {
            &info.server_ip
        };
        Self::lookup_key(host, &info.share)
    }

    /// Store the credentials of a mount, replacing any previous entry
    pub fn save(&self, info: &MountInfo) -> String {
        let key = Self::key_for(info);
        debug!(key = %key, user = %info.user, "saving credentials");
        self.entries.write().insert(
            key.clone(),
            AuthData::new(&info.domain, &info.user, &info.password),
        );
        key
    }

    /// Put back an entry previously read with [`CredentialStore::get`]
    pub fn restore(&self, key: &str, data: AuthData) {
        debug!(key = %key, "restoring credentials");
        self.entries.write().insert(key.to_string(), data);
    }

    /// Remove credentials by key; returns whether an entry existed
    pub fn remove(&self, key: &str) -> bool {
        let removed = self.entries.write().remove(key).is_some();
        if !removed {
            warn!(key = %key, "no credentials to remove");
        }
        removed
    }

    pub fn get(&self, key: &str) -> Option<AuthData> {
        self.entries.read().get(key).cloned()
    }

    pub fn len(&self) -> usize {
        self.entries.read().len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.read().is_empty()
    }
}

impl AuthProvider for CredentialStore {
    fn auth_data(&self, server: &str, share: &str) -> AuthData {
        let key = Self::lookup_key(server, share);
        match self.get(&key) {
            Some(data) => data,
            None => {
                debug!(key = %key, "no credentials stored, using anonymous");
                AuthData::default()
            }
        }
    }
}
