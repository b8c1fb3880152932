//! Core type definitions for smbfsp
//!
//! These types are shared by the dispatcher and the operation engine and
//! define what a filesystem entry looks like on the wire.

use serde::{Deserialize, Serialize};

/// Caller-supplied correlation id of an envelope
pub type MessageId = i64;

/// Caller-supplied id of a tracked operation; also names an open handle
pub type RequestId = i64;

/// Sentinel for "not yet known" sizes, times, and ids
pub const UNKNOWN: i64 = -1;

/// Bitset of metadata attributes the caller requires
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(transparent)]
pub struct FieldMask(pub u32);

impl FieldMask {
    pub const NAME: u32 = 1;
    pub const IS_DIRECTORY: u32 = 2;
    pub const SIZE: u32 = 4;
    pub const MODIFICATION_TIME: u32 = 8;
    pub const THUMBNAIL: u32 = 16;
    pub const MIME_TYPE: u32 = 32;

    /// Every attribute this provider can fill in
    pub const fn all() -> Self {
        Self(Self::NAME | Self::IS_DIRECTORY | Self::SIZE | Self::MODIFICATION_TIME)
    }

    pub const fn contains(self, bits: u32) -> bool {
        self.0 & bits == bits
    }

    /// A stat pass is required iff both size and modification time are requested
    pub const fn needs_stat(self) -> bool {
        self.contains(Self::SIZE | Self::MODIFICATION_TIME)
    }
}

/// Access mode of an open file
#[derive(Clone, Copy, Debug, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "UPPERCASE")]
pub enum OpenMode {
    Read,
    Write,
}

impl OpenMode {
    pub fn is_writable(self) -> bool {
        self == OpenMode::Write
    }
}

/// One filesystem entry as reported to the caller
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct EntryMetadata {
    pub name: String,
    /// Remote absolute path; only kept when a scan needs it for recursion or stat
    #[serde(skip)]
    pub full_path: Option<String>,
    pub is_directory: bool,
    /// Byte length, `UNKNOWN` until a stat pass ran
    pub size: i64,
    /// Epoch seconds, `UNKNOWN` until a stat pass ran
    pub modification_time: i64,
}

impl EntryMetadata {
    /// Entry whose size and time are not yet known
    pub fn unstated(name: impl Into<String>, is_directory: bool) -> Self {
        Self {
            name: name.into(),
            full_path: None,
            is_directory,
            size: UNKNOWN,
            modification_time: UNKNOWN,
        }
    }

    /// Synthetic entry for the share root; needs no remote call
    pub fn root() -> Self {
        Self {
            name: String::new(),
            full_path: None,
            is_directory: true,
            size: 0,
            modification_time: 0,
        }
    }

    pub fn with_full_path(mut self, full_path: impl Into<String>) -> Self {
        self.full_path = Some(full_path.into());
        self
    }

    /// Record stat results. Size is only meaningful for files.
    pub fn set_stat(&mut self, is_directory: bool, size: u64, modification_time: i64) {
        self.is_directory = is_directory;
        self.size = if is_directory { 0 } else { size as i64 };
        self.modification_time = modification_time;
    }

    pub fn has_stat_info(&self) -> bool {
        self.size >= 0
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_needs_stat_requires_both_bits() {
        assert!(!FieldMask(FieldMask::NAME | FieldMask::IS_DIRECTORY).needs_stat());
        assert!(!FieldMask(FieldMask::SIZE).needs_stat());
        assert!(!FieldMask(FieldMask::MODIFICATION_TIME).needs_stat());
        assert!(FieldMask(FieldMask::SIZE | FieldMask::MODIFICATION_TIME).needs_stat());
        assert!(FieldMask::all().needs_stat());
    }

    #[test]
    fn test_entry_serialization_skips_full_path() {
        let entry = EntryMetadata::unstated("a.txt", false).with_full_path("smb://h/s/a.txt");
        let json = serde_json::to_value(&entry).unwrap();
        assert_eq!(json["name"], "a.txt");
        assert_eq!(json["isDirectory"], false);
        assert_eq!(json["size"], -1);
        assert_eq!(json["modificationTime"], -1);
        assert!(json.get("fullPath").is_none());
    }

    #[test]
    fn test_set_stat_zeroes_directory_size() {
        let mut entry = EntryMetadata::unstated("dir", true);
        assert!(!entry.has_stat_info());
        entry.set_stat(true, 4096, 1_400_000_000);
        assert_eq!(entry.size, 0);
        assert_eq!(entry.modification_time, 1_400_000_000);
        assert!(entry.has_stat_info());
    }

    #[test]
    fn test_open_mode_wire_names() {
        let mode: OpenMode = serde_json::from_str("\"READ\"").unwrap();
        assert_eq!(mode, OpenMode::Read);
        let mode: OpenMode = serde_json::from_str("\"WRITE\"").unwrap();
        assert!(mode.is_writable());
    }
}
