//! Open-file handle table
//!
//! Handles are keyed by the `requestId` of the openFile call that created
//! them. Each handle remembers where the remote file position was left so
//! sequential reads and writes can skip the seek.

use std::collections::HashMap;

use smbfsp_core::{OpenMode, RequestId};

use crate::error::{ProviderError, ProviderResult};
use crate::remote::RemoteFd;

#[derive(Debug, Clone)]
pub struct OpenFileHandle {
    pub file_system_id: String,
    pub fd: RemoteFd,
    pub path: String,
    pub mode: OpenMode,
    /// File size captured right after open; reads never go past it
    pub length_at_open: u64,
    /// Last known remote position, `None` when it cannot be trusted
    pub cursor: Option<u64>,
}

impl OpenFileHandle {
    pub fn new(
        file_system_id: impl Into<String>,
        fd: RemoteFd,
        path: impl Into<String>,
        mode: OpenMode,
        length_at_open: u64,
    ) -> Self {
        Self {
            file_system_id: file_system_id.into(),
            fd,
            path: path.into(),
            mode,
            length_at_open,
            cursor: Some(0),
        }
    }

    pub fn needs_seek(&self, offset: u64) -> bool {
        self.cursor != Some(offset)
    }

    pub fn advance(&mut self, bytes: u64) {
        if let Some(cursor) = self.cursor.as_mut() {
            *cursor += bytes;
        }
    }

    pub fn invalidate(&mut self) {
        self.cursor = None;
    }
}

#[derive(Debug, Default)]
pub struct HandleTable {
    handles: HashMap<RequestId, OpenFileHandle>,
}

impl HandleTable {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn contains(&self, request_id: RequestId) -> bool {
        self.handles.contains_key(&request_id)
    }

    pub fn insert(&mut self, request_id: RequestId, handle: OpenFileHandle) {
        self.handles.insert(request_id, handle);
    }

    pub fn get_mut(&mut self, request_id: RequestId) -> ProviderResult<&mut OpenFileHandle> {
        self.handles
            .get_mut(&request_id)
            .ok_or(ProviderError::UnknownHandle(request_id))
    }

    pub fn remove(&mut self, request_id: RequestId) -> Option<OpenFileHandle> {
        self.handles.remove(&request_id)
    }

    /// Open handles belonging to one file system
    pub fn count_for(&self, file_system_id: &str) -> usize {
        self.handles
            .values()
            .filter(|h| h.file_system_id == file_system_id)
            .count()
    }

    /// Remove and return every handle of one file system
    pub fn drain_for(&mut self, file_system_id: &str) -> Vec<(RequestId, OpenFileHandle)> {
        let ids: Vec<RequestId> = self
            .handles
            .iter()
            .filter(|(_, h)| h.file_system_id == file_system_id)
            .map(|(id, _)| *id)
            .collect();
        ids.into_iter()
            .filter_map(|id| self.handles.remove(&id).map(|h| (id, h)))
            .collect()
    }

    pub fn len(&self) -> usize {
        self.handles.len()
    }

    pub fn is_empty(&self) -> bool {
        self.handles.is_empty()
    }
}
