//! Mount table
//!
//! One [`MountSession`] per `fileSystemId`. Sessions hold the share root
//! every relative path of that file system is appended to.

use std::collections::HashMap;

use smbfsp_core::{path, MountInfo, MountOptions};

use crate::credentials::CredentialStore;
use crate::error::{ProviderError, ProviderResult};

#[derive(Debug, Clone)]
pub struct MountSession {
    pub file_system_id: String,
    /// Share URL without a trailing separator
    pub share_root: String,
    pub display_name: String,
    pub writable: bool,
    /// Zero means unlimited
    pub open_limit: usize,
    /// Credential store key saved at mount time
    pub credential_key: String,
}

impl MountSession {
    pub fn new(options: &MountOptions, info: &MountInfo) -> Self {
        Self {
            file_system_id: options.file_system_id.clone(),
            share_root: path::strip_trailing_separator(&info.share_path).to_string(),
            display_name: options.display_name.clone(),
            writable: options.writable,
            open_limit: options.open_limit(),
            credential_key: CredentialStore::key_for(info),
        }
    }
}

#[derive(Debug, Default)]
pub struct MountTable {
    sessions: HashMap<String, MountSession>,
}

impl MountTable {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn contains(&self, file_system_id: &str) -> bool {
        self.sessions.contains_key(file_system_id)
    }

    pub fn insert(&mut self, session: MountSession) {
        self.sessions
            .insert(session.file_system_id.clone(), session);
    }

    pub fn remove(&mut self, file_system_id: &str) -> Option<MountSession> {
        self.sessions.remove(file_system_id)
    }

    pub fn get(&self, file_system_id: &str) -> ProviderResult<&MountSession> {
        self.sessions
            .get(file_system_id)
            .ok_or_else(|| ProviderError::UnknownFileSystem(file_system_id.to_string()))
    }

    /// Full remote path of `relative` inside a mounted file system
    pub fn resolve(&self, file_system_id: &str, relative: &str) -> ProviderResult<String> {
        let session = self.get(file_system_id)?;
        path::validate_relative(relative)?;
        Ok(path::join(&session.share_root, relative))
    }

    pub fn iter(&self) -> impl Iterator<Item = &MountSession> {
        self.sessions.values()
    }

    pub fn len(&self) -> usize {
        self.sessions.len()
    }

    pub fn is_empty(&self) -> bool {
        self.sessions.is_empty()
    }
}
