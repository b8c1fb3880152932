//! smbfsp core - shared types, envelopes, and option documents
//!
//! This crate contains the foundational types used by the provider bridge:
//! the wire error taxonomy, request/response envelopes, per-operation option
//! structs, entry metadata, configuration, and remote-path helpers.
//! It has no dependencies on networking or filesystem code.

pub mod config;
pub mod error;
pub mod options;
pub mod path;
pub mod protocol;
pub mod types;

pub use config::{Config, LocalConfig, ProviderConfig, TransportConfig};
pub use error::*;
pub use options::*;
pub use protocol::*;
pub use types::*;

/// Read chunk size in bytes (32 KB); each chunk is its own response envelope
pub const READ_CHUNK_SIZE: usize = 32 * 1024;

/// Write chunk size in bytes (32 KB)
pub const WRITE_CHUNK_SIZE: usize = 32 * 1024;

/// Batch size used for the first entries of a stat-populated directory listing
pub const INITIAL_BATCH_SIZE: usize = 16;

/// Index below which the initial batch size applies
pub const INITIAL_BATCH_LIMIT: usize = 64;

/// Batch size used once the initial batches have been sent
pub const BATCH_SIZE: usize = 64;

/// Permission bits passed to create and mkdir
pub const DEFAULT_CREATE_MODE: u32 = 0o755;

/// Maximum relative path length in bytes
pub const MAX_PATH_LEN: usize = 4096;

/// Maximum filename length in bytes
pub const MAX_FILENAME_LEN: usize = 255;

/// Function-name prefix routed to the custom-message extension point
pub const CUSTOM_PREFIX: &str = "custom_";
