//! Provider errors and their wire mapping
//!
//! Every failure inside the engine is a [`ProviderError`]. The dispatcher
//! turns it into exactly one [`ErrorKind`] on the wire.

use tracing::error;

use smbfsp_core::{ErrorKind, ProtocolError, RequestId};

use crate::remote::Errno;

#[derive(Debug, thiserror::Error)]
pub enum ProviderError {
    /// A remote primitive failed
    #[error("{op}: {errno}")]
    Remote { op: &'static str, errno: Errno },

    #[error("unknown file system: {0}")]
    UnknownFileSystem(String),

    #[error("file system already mounted: {0}")]
    AlreadyMounted(String),

    #[error("unknown open request id: {0}")]
    UnknownHandle(RequestId),

    #[error("open request id already in use: {0}")]
    HandleInUse(RequestId),

    #[error("opened files limit reached ({limit})")]
    OpenLimit { limit: usize },

    #[error("seek landed at {actual}, expected {expected}")]
    SeekMismatch { expected: u64, actual: u64 },

    #[error("short read: requested {requested}, got {got}")]
    ShortRead { requested: usize, got: usize },

    #[error("short write: requested {requested}, wrote {wrote}")]
    ShortWrite { requested: usize, wrote: usize },

    #[error("neither file nor directory: {0}")]
    UnsupportedEntry(String),

    #[error("{0} is not implemented")]
    NotImplemented(&'static str),

    #[error("unknown custom message: {0}")]
    UnknownCustom(String),

    #[error(transparent)]
    Protocol(#[from] ProtocolError),
}

impl ProviderError {
    /// Wire error kind for this failure
    pub fn kind(&self) -> ErrorKind {
        match self {
            ProviderError::Remote { errno, .. } => errno.kind(),
            ProviderError::UnknownFileSystem(_)
            | ProviderError::AlreadyMounted(_)
            | ProviderError::UnknownHandle(_)
            | ProviderError::HandleInUse(_)
            | ProviderError::UnknownCustom(_) => ErrorKind::InvalidOperation,
            ProviderError::OpenLimit { .. } => ErrorKind::TooManyOpened,
            ProviderError::Protocol(e) => ErrorKind::from(e),
            ProviderError::SeekMismatch { .. }
            | ProviderError::ShortRead { .. }
            | ProviderError::ShortWrite { .. }
            | ProviderError::UnsupportedEntry(_)
            | ProviderError::NotImplemented(_) => ErrorKind::Failed,
        }
    }
}

pub type ProviderResult<T> = Result<T, ProviderError>;

/// Tag a remote failure with the operation that issued it
pub trait RemoteContext<T> {
    fn op(self, op: &'static str) -> ProviderResult<T>;
}

impl<T> RemoteContext<T> for Result<T, Errno> {
    fn op(self, op: &'static str) -> ProviderResult<T> {
        self.map_err(|errno| {
            error!(op, errno = errno.code(), "{}: {}", op, errno);
            ProviderError::Remote { op, errno }
        })
    }
}
