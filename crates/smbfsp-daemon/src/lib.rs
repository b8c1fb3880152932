//! smbfsp daemon - request dispatcher and remote file-system engine
//!
//! This crate provides:
//! - A dispatcher that routes provider requests to operations
//! - Mount and open-file tables
//! - Chunked reads and writes, batched directory listings, recursive delete
//! - Two remote backends: a local export directory and an in-memory share tree
//!
//! # Architecture
//!
//! The transport is async; every remote call blocks. Requests cross a bounded
//! queue to a single worker that owns all provider state:
//!
//! ```text
//! ┌─────────────────────────────────────────────────────────────┐
//! │                  Tokio Runtime (async)                      │
//! │  stdin lines → Request          Response → stdout lines     │
//! └─────────────────────────────┬───────────────────────────────┘
//!                               │ crossbeam-channel
//!                               │ (bounded, backpressure)
//!                               ▼
//! ┌─────────────────────────────────────────────────────────────┐
//! │                  Worker Thread (sync)                       │
//! │  Dispatcher → Provider → MountTable / HandleTable           │
//! │                        → dyn RemoteFs (blocking calls)      │
//! └─────────────────────────────────────────────────────────────┘
//! ```
//!
//! Streamed operations (readFile, readDirectory) send intermediate envelopes
//! with `hasMore = true` before the final one.

pub mod bridge;
pub mod credentials;
pub mod dispatcher;
pub mod error;
pub mod file_io;
pub mod handles;
pub mod metadata;
pub mod mounts;
pub mod provider;
pub mod remote;
pub mod reply;

pub use bridge::{serve, ProviderBridge};
pub use credentials::{AuthData, AuthProvider, CredentialStore};
pub use dispatcher::Dispatcher;
pub use error::{ProviderError, ProviderResult};
pub use provider::Provider;
pub use remote::{Errno, LocalFs, MemoryFs, RemoteFs};
