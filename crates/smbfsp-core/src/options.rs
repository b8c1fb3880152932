//! Per-operation option documents
//!
//! Each operation has its own flat struct decoded from `args[0]` of the
//! request envelope. Fields shared by every tracked operation live in
//! [`TrackedOptions`], embedded with `#[serde(flatten)]`.

use std::collections::BTreeMap;

use serde::{Deserialize, Serialize};

use crate::types::{FieldMask, OpenMode, RequestId, UNKNOWN};

fn unknown_id() -> RequestId {
    UNKNOWN
}

/// Fields carried by every tracked operation
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct TrackedOptions {
    pub file_system_id: String,
    #[serde(default = "unknown_id")]
    pub request_id: RequestId,
}

#[derive(Clone, Debug, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct MountOptions {
    pub file_system_id: String,
    #[serde(default)]
    pub display_name: String,
    #[serde(default)]
    pub writable: bool,
    /// Zero or absent means unlimited
    #[serde(default)]
    pub opened_files_limit: Option<u32>,
}

impl MountOptions {
    pub fn open_limit(&self) -> usize {
        self.opened_files_limit.unwrap_or(0) as usize
    }
}

/// Provider-specific mount payload (`args[1]` of a mount request)
#[derive(Clone, Default, Serialize, Deserialize)]
#[serde(rename_all = "camelCase", default)]
pub struct MountInfo {
    /// Full remote URL of the share, e.g. `smb://server/share`
    pub share_path: String,
    pub domain: String,
    pub user: String,
    pub password: String,
    pub server: String,
    #[serde(rename = "serverIP")]
    pub server_ip: String,
    pub path: String,
    pub share: String,
}

impl std::fmt::Debug for MountInfo {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("MountInfo")
            .field("share_path", &self.share_path)
            .field("domain", &self.domain)
            .field("user", &self.user)
            .field("password", &"***")
            .field("server", &self.server)
            .field("server_ip", &self.server_ip)
            .field("path", &self.path)
            .field("share", &self.share)
            .finish()
    }
}

#[derive(Clone, Debug, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct UnmountOptions {
    pub file_system_id: String,
}

#[derive(Clone, Debug, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct GetMetadataOptions {
    #[serde(flatten)]
    pub tracked: TrackedOptions,
    pub entry_path: String,
    #[serde(default)]
    pub field_mask: FieldMask,
}

#[derive(Clone, Debug, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct BatchGetMetadataOptions {
    #[serde(flatten)]
    pub tracked: TrackedOptions,
    pub entries: Vec<String>,
    #[serde(default)]
    pub field_mask: FieldMask,
}

#[derive(Clone, Debug, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ReadDirectoryOptions {
    #[serde(flatten)]
    pub tracked: TrackedOptions,
    pub directory_path: String,
    #[serde(default)]
    pub field_mask: FieldMask,
}

#[derive(Clone, Debug, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct CreateDirectoryOptions {
    #[serde(flatten)]
    pub tracked: TrackedOptions,
    pub directory_path: String,
    #[serde(default)]
    pub recursive: bool,
}

#[derive(Clone, Debug, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct OpenFileOptions {
    #[serde(flatten)]
    pub tracked: TrackedOptions,
    pub file_path: String,
    #[serde(rename = "fileMode", alias = "mode")]
    pub mode: OpenMode,
}

#[derive(Clone, Debug, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct CreateFileOptions {
    #[serde(flatten)]
    pub tracked: TrackedOptions,
    pub file_path: String,
}

#[derive(Clone, Debug, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct CloseFileOptions {
    #[serde(flatten)]
    pub tracked: TrackedOptions,
    pub open_request_id: RequestId,
}

#[derive(Clone, Debug, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ReadFileOptions {
    #[serde(flatten)]
    pub tracked: TrackedOptions,
    pub open_request_id: RequestId,
    pub offset: u64,
    pub length: u64,
}

#[derive(Clone, Debug, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct WriteFileOptions {
    #[serde(flatten)]
    pub tracked: TrackedOptions,
    pub open_request_id: RequestId,
    pub offset: u64,
    #[serde(default)]
    pub data: Vec<u8>,
}

#[derive(Clone, Debug, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct DeleteEntryOptions {
    #[serde(flatten)]
    pub tracked: TrackedOptions,
    pub entry_path: String,
    #[serde(default)]
    pub recursive: bool,
}

#[derive(Clone, Debug, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct MoveEntryOptions {
    #[serde(flatten)]
    pub tracked: TrackedOptions,
    pub source_path: String,
    pub target_path: String,
}

#[derive(Clone, Debug, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct CopyEntryOptions {
    #[serde(flatten)]
    pub tracked: TrackedOptions,
    pub source_path: String,
    pub target_path: String,
}

#[derive(Clone, Debug, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct TruncateOptions {
    #[serde(flatten)]
    pub tracked: TrackedOptions,
    pub file_path: String,
    pub length: u64,
}

/// Host name -> resolved IP (may be missing) for `custom_enumerateFileShares`
pub type HostMap = BTreeMap<String, Option<String>>;
