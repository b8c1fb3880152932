//! Remote FS Client seam
//!
//! The operation engine never talks to the network itself. Everything goes
//! through [`RemoteFs`], a synchronous, POSIX-like surface modelled on the
//! SMB client library: every primitive either succeeds or returns the
//! OS-style error number of the failure.
//!
//! Two backends ship with the daemon:
//! - [`MemoryFs`]: an in-memory share tree with call counters and fault
//!   injection, used by the tests
//! - [`LocalFs`]: serves subdirectories of a local export root as shares

mod local;
mod memory;

pub use local::LocalFs;
pub use memory::MemoryFs;

use std::fmt;

use smbfsp_core::ErrorKind;

/// URL scheme of remote paths
pub const SMB_SCHEME: &str = "smb://";

/// OS-style error number returned by a failed remote primitive
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash)]
pub struct Errno(pub i32);

impl Errno {
    pub fn code(self) -> i32 {
        self.0
    }

    /// Wire error kind for this error number
    pub fn kind(self) -> ErrorKind {
        ErrorKind::from_errno(self.0)
    }
}

impl fmt::Display for Errno {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(
            f,
            "errno={} errtxt={}",
            self.0,
            std::io::Error::from_raw_os_error(self.0)
        )
    }
}

impl std::error::Error for Errno {}

impl From<std::io::Error> for Errno {
    fn from(e: std::io::Error) -> Self {
        if let Some(code) = e.raw_os_error() {
            return Errno(code);
        }
        Errno(match e.kind() {
            std::io::ErrorKind::NotFound => libc::ENOENT,
            std::io::ErrorKind::PermissionDenied => libc::EACCES,
            std::io::ErrorKind::AlreadyExists => libc::EEXIST,
            std::io::ErrorKind::InvalidInput => libc::EINVAL,
            std::io::ErrorKind::TimedOut => libc::ETIMEDOUT,
            std::io::ErrorKind::ConnectionReset => libc::ECONNRESET,
            std::io::ErrorKind::ConnectionAborted => libc::ECONNABORTED,
            _ => libc::EIO,
        })
    }
}

pub type RemoteResult<T> = Result<T, Errno>;

/// Handle of an open remote file
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash)]
pub struct RemoteFd(pub u64);

/// Handle of an open remote directory enumeration
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash)]
pub struct RemoteDir(pub u64);

/// Access requested when opening an existing file
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum AccessMode {
    ReadOnly,
    ReadWrite,
}

/// Type bits of a stat result
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum FileKind {
    File,
    Directory,
    Other,
}

/// Subset of `struct stat` the engine consumes
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub struct RemoteStat {
    pub kind: FileKind,
    pub size: u64,
    /// Modification time, epoch seconds
    pub mtime: i64,
}

impl RemoteStat {
    pub fn is_dir(&self) -> bool {
        self.kind == FileKind::Directory
    }

    pub fn is_file(&self) -> bool {
        self.kind == FileKind::File
    }
}

/// Type of a directory entry as reported by the enumerate primitive
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash)]
pub enum DirentType {
    Workgroup,
    Server,
    FileShare,
    PrinterShare,
    CommsShare,
    IpcShare,
    Dir,
    File,
    Link,
    Unknown,
}

impl DirentType {
    pub fn as_str(self) -> &'static str {
        match self {
            DirentType::Workgroup => "WORKGROUP",
            DirentType::Server => "SERVER",
            DirentType::FileShare => "FILE_SHARE",
            DirentType::PrinterShare => "PRINTER_SHARE",
            DirentType::CommsShare => "COMMS_SHARE",
            DirentType::IpcShare => "IPC_SHARE",
            DirentType::Dir => "DIR",
            DirentType::File => "FILE",
            DirentType::Link => "LINK",
            DirentType::Unknown => "UNKNOWN",
        }
    }
}

/// One raw directory entry
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct Dirent {
    pub name: String,
    pub kind: DirentType,
}

impl Dirent {
    pub fn new(name: impl Into<String>, kind: DirentType) -> Self {
        Self {
            name: name.into(),
            kind,
        }
    }

    /// The synthetic `.` and `..` entries
    pub fn is_dot(&self) -> bool {
        self.name == "." || self.name == ".."
    }
}

/// Synchronous remote filesystem primitives.
///
/// Implementations authenticate lazily: the first time a (server, share)
/// pair is touched they consult the [`AuthProvider`](crate::credentials::AuthProvider)
/// they were built with.
pub trait RemoteFs: Send + Sync {
    fn open(&self, path: &str, access: AccessMode) -> RemoteResult<RemoteFd>;

    /// Create (or truncate) a file and open it read-write
    fn create(&self, path: &str, mode: u32) -> RemoteResult<RemoteFd>;

    fn read(&self, fd: RemoteFd, buf: &mut [u8]) -> RemoteResult<usize>;

    fn write(&self, fd: RemoteFd, data: &[u8]) -> RemoteResult<usize>;

    /// Absolute seek; returns the resulting position
    fn lseek(&self, fd: RemoteFd, offset: u64) -> RemoteResult<u64>;

    fn ftruncate(&self, fd: RemoteFd, length: u64) -> RemoteResult<()>;

    fn close(&self, fd: RemoteFd) -> RemoteResult<()>;

    fn stat(&self, path: &str) -> RemoteResult<RemoteStat>;

    fn fstat(&self, fd: RemoteFd) -> RemoteResult<RemoteStat>;

    fn mkdir(&self, path: &str, mode: u32) -> RemoteResult<()>;

    fn rmdir(&self, path: &str) -> RemoteResult<()>;

    fn unlink(&self, path: &str) -> RemoteResult<()>;

    fn rename(&self, from: &str, to: &str) -> RemoteResult<()>;

    fn opendir(&self, path: &str) -> RemoteResult<RemoteDir>;

    /// Next batch of entries; an empty batch means the enumeration is done
    fn getdents(&self, dir: RemoteDir) -> RemoteResult<Vec<Dirent>>;

    fn closedir(&self, dir: RemoteDir) -> RemoteResult<()>;
}

/// Components of an `smb://server/share/path` URL
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub struct SmbPath<'a> {
    pub server: &'a str,
    /// `None` for the server root, which enumerates shares
    pub share: Option<&'a str>,
    /// Path below the share, empty or beginning with `/`
    pub rest: &'a str,
}

impl<'a> SmbPath<'a> {
    pub fn parse(path: &'a str) -> RemoteResult<Self> {
        let body = path.strip_prefix(SMB_SCHEME).ok_or(Errno(libc::EINVAL))?;
        let body = body.trim_end_matches('/');

        let (server, after_server) = match body.find('/') {
            Some(idx) => (&body[..idx], &body[idx + 1..]),
            None => (body, ""),
        };
        if server.is_empty() {
            return Err(Errno(libc::EINVAL));
        }

        if after_server.is_empty() {
            return Ok(Self {
                server,
                share: None,
                rest: "",
            });
        }

        let (share, rest) = match after_server.find('/') {
            Some(idx) => (&after_server[..idx], &after_server[idx..]),
            None => (after_server, ""),
        };

        Ok(Self {
            server,
            share: Some(share),
            rest,
        })
    }

    /// Two paths on the same share (rename cannot cross shares)
    pub fn same_share(&self, other: &SmbPath<'_>) -> bool {
        self.server == other.server && self.share == other.share
    }
}
