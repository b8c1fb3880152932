//! In-memory remote filesystem
//!
//! Holds a tree of `smb://server/share/...` nodes behind one mutex. Every
//! primitive is counted, mutating primitives are journaled in call order,
//! and individual calls can be made to fail with a chosen error number.

use std::collections::{BTreeMap, HashMap, HashSet};
use std::sync::Arc;

use parking_lot::Mutex;
use tracing::trace;

use super::{
    AccessMode, Dirent, DirentType, Errno, FileKind, RemoteDir, RemoteFd, RemoteFs, RemoteResult,
    RemoteStat, SmbPath,
};
use crate::credentials::{AuthData, AuthProvider, CredentialStore};

/// Entries returned per getdents call
const DENTS_PER_CALL: usize = 8;

/// Starting value of the modification clock (epoch seconds)
const CLOCK_START: i64 = 1_400_000_000;

/// Node key of a path; share and directory URLs may carry a trailing separator
fn normalize(path: &str) -> &str {
    path.trim_end_matches('/')
}

#[derive(Clone, Debug)]
enum Node {
    File { data: Vec<u8>, mtime: i64 },
    Dir { mtime: i64 },
}

impl Node {
    fn stat(&self) -> RemoteStat {
        match self {
            Node::File { data, mtime } => RemoteStat {
                kind: FileKind::File,
                size: data.len() as u64,
                mtime: *mtime,
            },
            Node::Dir { mtime } => RemoteStat {
                kind: FileKind::Directory,
                size: 0,
                mtime: *mtime,
            },
        }
    }
}

struct OpenFile {
    path: String,
    pos: u64,
    writable: bool,
}

struct DirCursor {
    entries: Vec<Dirent>,
    pos: usize,
}

#[derive(Default)]
struct Inner {
    nodes: BTreeMap<String, Node>,
    /// Non-disk shares listed at a server root: server → (name, type)
    special_shares: HashMap<String, Vec<(String, DirentType)>>,
    files: HashMap<u64, OpenFile>,
    dirs: HashMap<u64, DirCursor>,
    next_handle: u64,
    clock: i64,

    calls: HashMap<&'static str, usize>,
    journal: Vec<String>,
    faults: HashMap<(&'static str, String), i32>,
    read_caps: HashMap<String, usize>,
    write_caps: HashMap<String, usize>,
    skewed_seeks: HashSet<String>,
    max_open_files: Option<usize>,

    required_credentials: HashMap<String, AuthData>,
    authenticated: HashSet<String>,
    auth_lookups: usize,
}

impl Inner {
    fn tick(&mut self) -> i64 {
        self.clock += 1;
        self.clock
    }

    fn handle(&mut self) -> u64 {
        self.next_handle += 1;
        self.next_handle
    }

    fn check_fault(&self, op: &'static str, path: &str) -> RemoteResult<()> {
        match self.faults.get(&(op, path.to_string())) {
            Some(&errno) => Err(Errno(errno)),
            None => Ok(()),
        }
    }

    fn file(&self, fd: RemoteFd) -> RemoteResult<&OpenFile> {
        self.files.get(&fd.0).ok_or(Errno(libc::EBADF))
    }

    fn parent_is_dir(&self, path: &str) -> RemoteResult<()> {
        let parent = match path.rfind('/') {
            Some(idx) => &path[..idx],
            None => return Err(Errno(libc::EINVAL)),
        };
        match self.nodes.get(parent) {
            Some(Node::Dir { .. }) => Ok(()),
            Some(Node::File { .. }) => Err(Errno(libc::ENOTDIR)),
            None => Err(Errno(libc::ENOENT)),
        }
    }

    fn has_children(&self, dir: &str) -> bool {
        let prefix = format!("{}/", dir);
        self.nodes
            .range(prefix.clone()..)
            .next()
            .map(|(key, _)| key.starts_with(&prefix))
            .unwrap_or(false)
    }

    fn children(&self, dir: &str) -> Vec<Dirent> {
        let prefix = format!("{}/", dir);
        self.nodes
            .range(prefix.clone()..)
            .take_while(|(key, _)| key.starts_with(&prefix))
            .filter_map(|(key, node)| {
                let name = &key[prefix.len()..];
                if name.contains('/') {
                    return None;
                }
                let kind = match node {
                    Node::File { .. } => DirentType::File,
                    Node::Dir { .. } => DirentType::Dir,
                };
                Some(Dirent::new(name, kind))
            })
            .collect()
    }

    fn shares(&self, server: &str) -> Vec<Dirent> {
        let mut shares: Vec<Dirent> = self
            .children(&format!("smb://{}", server))
            .into_iter()
            .map(|d| Dirent::new(d.name, DirentType::FileShare))
            .collect();
        if let Some(special) = self.special_shares.get(server) {
            shares.extend(special.iter().map(|(name, kind)| Dirent::new(name.clone(), *kind)));
        }
        shares
    }
}

/// In-memory [`RemoteFs`] with call counters and fault injection
pub struct MemoryFs {
    inner: Mutex<Inner>,
    auth: Option<Arc<dyn AuthProvider>>,
}

impl Default for MemoryFs {
    fn default() -> Self {
        Self::new()
    }
}

impl MemoryFs {
    pub fn new() -> Self {
        Self {
            inner: Mutex::new(Inner {
                clock: CLOCK_START,
                ..Default::default()
            }),
            auth: None,
        }
    }

    /// Consult `auth` before the first access to each share
    pub fn with_auth(auth: Arc<dyn AuthProvider>) -> Self {
        Self {
            auth: Some(auth),
            ..Self::new()
        }
    }

    /// Shorthand for [`with_auth`](Self::with_auth) over a credential store
    pub fn with_credentials(store: CredentialStore) -> Self {
        Self::with_auth(Arc::new(store))
    }

    // === Tree setup ===

    pub fn add_share(&self, server: &str, share: &str) {
        let mut inner = self.inner.lock();
        let mtime = inner.tick();
        inner
            .nodes
            .insert(format!("smb://{}/{}", server, share), Node::Dir { mtime });
    }

    /// List a non-disk share (printer, IPC, ...) at the server root
    pub fn add_special_share(&self, server: &str, name: &str, kind: DirentType) {
        self.inner
            .lock()
            .special_shares
            .entry(server.to_string())
            .or_default()
            .push((name.to_string(), kind));
    }

    pub fn add_dir(&self, path: &str) {
        let mut inner = self.inner.lock();
        let mtime = inner.tick();
        inner.nodes.insert(path.to_string(), Node::Dir { mtime });
    }

    pub fn add_file(&self, path: &str, data: &[u8]) {
        let mut inner = self.inner.lock();
        let mtime = inner.tick();
        inner.nodes.insert(
            path.to_string(),
            Node::File {
                data: data.to_vec(),
                mtime,
            },
        );
    }

    /// Contents of a file, if it exists
    pub fn contents(&self, path: &str) -> Option<Vec<u8>> {
        match self.inner.lock().nodes.get(path) {
            Some(Node::File { data, .. }) => Some(data.clone()),
            _ => None,
        }
    }

    pub fn exists(&self, path: &str) -> bool {
        self.inner.lock().nodes.contains_key(path)
    }

    // === Observation ===

    /// Number of times primitive `op` was called
    pub fn calls(&self, op: &str) -> usize {
        self.inner.lock().calls.get(op).copied().unwrap_or(0)
    }

    /// Mutating primitives in call order, e.g. `"unlink smb://h/s/a"`
    pub fn journal(&self) -> Vec<String> {
        self.inner.lock().journal.clone()
    }

    /// Remote file handles currently open
    pub fn open_file_count(&self) -> usize {
        self.inner.lock().files.len()
    }

    /// Number of credential callback invocations
    pub fn auth_lookups(&self) -> usize {
        self.inner.lock().auth_lookups
    }

    // === Fault injection ===

    /// Make primitive `op` on `path` fail with `errno` until cleared
    pub fn fail_on(&self, op: &'static str, path: &str, errno: i32) {
        self.inner
            .lock()
            .faults
            .insert((op, path.to_string()), errno);
    }

    pub fn clear_faults(&self) {
        self.inner.lock().faults.clear();
    }

    /// Return at most `max` bytes per read call on `path`
    pub fn truncate_reads(&self, path: &str, max: usize) {
        self.inner.lock().read_caps.insert(path.to_string(), max);
    }

    /// Accept at most `max` bytes per write call on `path`
    pub fn truncate_writes(&self, path: &str, max: usize) {
        self.inner.lock().write_caps.insert(path.to_string(), max);
    }

    /// Make seeks on `path` land one byte past the requested offset
    pub fn skew_seeks(&self, path: &str) {
        self.inner.lock().skewed_seeks.insert(path.to_string());
    }

    /// Fail open and create with EMFILE once `max` files are open
    pub fn set_max_open_files(&self, max: usize) {
        self.inner.lock().max_open_files = Some(max);
    }

    /// Reject access to a share unless the auth callback returns these credentials
    pub fn require_credentials(&self, server: &str, share: &str, user: &str, password: &str) {
        let mut inner = self.inner.lock();
        let key = CredentialStore::lookup_key(server, share);
        inner.authenticated.remove(&key);
        inner
            .required_credentials
            .insert(key, AuthData::new("", user, password));
    }

    // === Internals ===

    fn enter(&self, op: &'static str, path: &str) -> RemoteResult<parking_lot::MutexGuard<'_, Inner>> {
        let mut inner = self.inner.lock();
        *inner.calls.entry(op).or_insert(0) += 1;
        trace!(op, path, "memory fs call");
        inner.check_fault(op, path)?;
        self.authenticate(&mut inner, path)?;
        Ok(inner)
    }

    fn enter_fd(&self, op: &'static str, fd: RemoteFd) -> RemoteResult<parking_lot::MutexGuard<'_, Inner>> {
        let mut inner = self.inner.lock();
        *inner.calls.entry(op).or_insert(0) += 1;
        let path = inner.file(fd)?.path.clone();
        inner.check_fault(op, &path)?;
        Ok(inner)
    }

    fn authenticate(&self, inner: &mut Inner, path: &str) -> RemoteResult<()> {
        let parsed = SmbPath::parse(path)?;
        let share = match parsed.share {
            Some(share) => share,
            None => return Ok(()),
        };
        let key = CredentialStore::lookup_key(parsed.server, share);
        let required = match inner.required_credentials.get(&key) {
            Some(required) => required.clone(),
            None => return Ok(()),
        };
        if inner.authenticated.contains(&key) {
            return Ok(());
        }

        inner.auth_lookups += 1;
        let offered = match &self.auth {
            Some(auth) => auth.auth_data(parsed.server, share),
            None => AuthData::default(),
        };
        if offered.user == required.user && offered.password == required.password {
            inner.authenticated.insert(key);
            Ok(())
        } else {
            Err(Errno(libc::EACCES))
        }
    }

    fn check_open_limit(inner: &Inner) -> RemoteResult<()> {
        match inner.max_open_files {
            Some(max) if inner.files.len() >= max => Err(Errno(libc::EMFILE)),
            _ => Ok(()),
        }
    }
}

impl RemoteFs for MemoryFs {
    fn open(&self, path: &str, access: AccessMode) -> RemoteResult<RemoteFd> {
        let mut inner = self.enter("open", path)?;
        match inner.nodes.get(path) {
            Some(Node::File { .. }) => {}
            Some(Node::Dir { .. }) => return Err(Errno(libc::EISDIR)),
            None => return Err(Errno(libc::ENOENT)),
        }
        Self::check_open_limit(&inner)?;
        let id = inner.handle();
        inner.files.insert(
            id,
            OpenFile {
                path: path.to_string(),
                pos: 0,
                writable: access == AccessMode::ReadWrite,
            },
        );
        Ok(RemoteFd(id))
    }

    fn create(&self, path: &str, _mode: u32) -> RemoteResult<RemoteFd> {
        let mut inner = self.enter("create", path)?;
        if let Some(Node::Dir { .. }) = inner.nodes.get(path) {
            return Err(Errno(libc::EISDIR));
        }
        inner.parent_is_dir(path)?;
        Self::check_open_limit(&inner)?;

        let mtime = inner.tick();
        inner.nodes.insert(
            path.to_string(),
            Node::File {
                data: Vec::new(),
                mtime,
            },
        );
        inner.journal.push(format!("create {}", path));
        let id = inner.handle();
        inner.files.insert(
            id,
            OpenFile {
                path: path.to_string(),
                pos: 0,
                writable: true,
            },
        );
        Ok(RemoteFd(id))
    }

    fn read(&self, fd: RemoteFd, buf: &mut [u8]) -> RemoteResult<usize> {
        let mut inner = self.enter_fd("read", fd)?;
        let (path, pos) = {
            let file = inner.file(fd)?;
            (file.path.clone(), file.pos)
        };
        let cap = inner.read_caps.get(&path).copied().unwrap_or(usize::MAX);
        let n = match inner.nodes.get(&path) {
            Some(Node::File { data, .. }) => {
                let start = (pos as usize).min(data.len());
                let n = (data.len() - start).min(buf.len()).min(cap);
                buf[..n].copy_from_slice(&data[start..start + n]);
                n
            }
            _ => return Err(Errno(libc::ESTALE)),
        };
        if let Some(file) = inner.files.get_mut(&fd.0) {
            file.pos += n as u64;
        }
        Ok(n)
    }

    fn write(&self, fd: RemoteFd, data: &[u8]) -> RemoteResult<usize> {
        let mut inner = self.enter_fd("write", fd)?;
        let (path, pos, writable) = {
            let file = inner.file(fd)?;
            (file.path.clone(), file.pos, file.writable)
        };
        if !writable {
            return Err(Errno(libc::EBADF));
        }
        let cap = inner.write_caps.get(&path).copied().unwrap_or(usize::MAX);
        let data = &data[..data.len().min(cap)];
        let mtime = inner.tick();
        match inner.nodes.get_mut(&path) {
            Some(Node::File {
                data: contents,
                mtime: node_mtime,
            }) => {
                let start = pos as usize;
                let end = start + data.len();
                if contents.len() < end {
                    contents.resize(end, 0);
                }
                contents[start..end].copy_from_slice(data);
                *node_mtime = mtime;
            }
            _ => return Err(Errno(libc::ESTALE)),
        }
        if let Some(file) = inner.files.get_mut(&fd.0) {
            file.pos += data.len() as u64;
        }
        Ok(data.len())
    }

    fn lseek(&self, fd: RemoteFd, offset: u64) -> RemoteResult<u64> {
        let mut inner = self.enter_fd("lseek", fd)?;
        let path = inner.file(fd)?.path.clone();
        let landed = if inner.skewed_seeks.contains(&path) {
            offset + 1
        } else {
            offset
        };
        if let Some(file) = inner.files.get_mut(&fd.0) {
            file.pos = landed;
        }
        Ok(landed)
    }

    fn ftruncate(&self, fd: RemoteFd, length: u64) -> RemoteResult<()> {
        let mut inner = self.enter_fd("ftruncate", fd)?;
        let (path, writable) = {
            let file = inner.file(fd)?;
            (file.path.clone(), file.writable)
        };
        if !writable {
            return Err(Errno(libc::EBADF));
        }
        let mtime = inner.tick();
        match inner.nodes.get_mut(&path) {
            Some(Node::File {
                data,
                mtime: node_mtime,
            }) => {
                data.resize(length as usize, 0);
                *node_mtime = mtime;
                Ok(())
            }
            _ => Err(Errno(libc::ESTALE)),
        }
    }

    fn close(&self, fd: RemoteFd) -> RemoteResult<()> {
        let mut inner = self.enter_fd("close", fd)?;
        inner.files.remove(&fd.0);
        Ok(())
    }

    fn stat(&self, path: &str) -> RemoteResult<RemoteStat> {
        let inner = self.enter("stat", path)?;
        let path = normalize(path);
        inner
            .nodes
            .get(path)
            .map(Node::stat)
            .ok_or(Errno(libc::ENOENT))
    }

    fn fstat(&self, fd: RemoteFd) -> RemoteResult<RemoteStat> {
        let inner = self.enter_fd("fstat", fd)?;
        let path = &inner.file(fd)?.path;
        inner
            .nodes
            .get(path)
            .map(Node::stat)
            .ok_or(Errno(libc::ESTALE))
    }

    fn mkdir(&self, path: &str, _mode: u32) -> RemoteResult<()> {
        let mut inner = self.enter("mkdir", path)?;
        if inner.nodes.contains_key(path) {
            return Err(Errno(libc::EEXIST));
        }
        inner.parent_is_dir(path)?;
        let mtime = inner.tick();
        inner.nodes.insert(path.to_string(), Node::Dir { mtime });
        inner.journal.push(format!("mkdir {}", path));
        Ok(())
    }

    fn rmdir(&self, path: &str) -> RemoteResult<()> {
        let mut inner = self.enter("rmdir", path)?;
        match inner.nodes.get(path) {
            Some(Node::Dir { .. }) => {}
            Some(Node::File { .. }) => return Err(Errno(libc::ENOTDIR)),
            None => return Err(Errno(libc::ENOENT)),
        }
        if inner.has_children(path) {
            return Err(Errno(libc::ENOTEMPTY));
        }
        inner.nodes.remove(path);
        inner.journal.push(format!("rmdir {}", path));
        Ok(())
    }

    fn unlink(&self, path: &str) -> RemoteResult<()> {
        let mut inner = self.enter("unlink", path)?;
        match inner.nodes.get(path) {
            Some(Node::File { .. }) => {}
            Some(Node::Dir { .. }) => return Err(Errno(libc::EISDIR)),
            None => return Err(Errno(libc::ENOENT)),
        }
        inner.nodes.remove(path);
        inner.journal.push(format!("unlink {}", path));
        Ok(())
    }

    fn rename(&self, from: &str, to: &str) -> RemoteResult<()> {
        let mut inner = self.enter("rename", from)?;
        self.authenticate(&mut inner, to)?;
        if !SmbPath::parse(from)?.same_share(&SmbPath::parse(to)?) {
            return Err(Errno(libc::EXDEV));
        }
        if !inner.nodes.contains_key(from) {
            return Err(Errno(libc::ENOENT));
        }
        if inner.nodes.contains_key(to) {
            return Err(Errno(libc::EEXIST));
        }
        inner.parent_is_dir(to)?;

        // Move the node and everything below it
        let prefix = format!("{}/", from);
        let moved: Vec<String> = inner
            .nodes
            .keys()
            .filter(|key| key.as_str() == from || key.starts_with(&prefix))
            .cloned()
            .collect();
        for key in moved {
            if let Some(node) = inner.nodes.remove(&key) {
                let new_key = format!("{}{}", to, &key[from.len()..]);
                inner.nodes.insert(new_key, node);
            }
        }
        inner.journal.push(format!("rename {} -> {}", from, to));
        Ok(())
    }

    fn opendir(&self, path: &str) -> RemoteResult<RemoteDir> {
        let mut inner = self.enter("opendir", path)?;
        let parsed = SmbPath::parse(path)?;
        let path = normalize(path);
        let listing = if parsed.share.is_none() {
            let shares = inner.shares(parsed.server);
            if shares.is_empty() {
                return Err(Errno(libc::EHOSTUNREACH));
            }
            shares
        } else {
            match inner.nodes.get(path) {
                Some(Node::Dir { .. }) => inner.children(path),
                Some(Node::File { .. }) => return Err(Errno(libc::ENOTDIR)),
                None => return Err(Errno(libc::ENOENT)),
            }
        };

        let mut entries = vec![
            Dirent::new(".", DirentType::Dir),
            Dirent::new("..", DirentType::Dir),
        ];
        entries.extend(listing);

        let id = inner.handle();
        inner.dirs.insert(id, DirCursor { entries, pos: 0 });
        Ok(RemoteDir(id))
    }

    fn getdents(&self, dir: RemoteDir) -> RemoteResult<Vec<Dirent>> {
        let mut inner = self.inner.lock();
        *inner.calls.entry("getdents").or_insert(0) += 1;
        let cursor = inner.dirs.get_mut(&dir.0).ok_or(Errno(libc::EBADF))?;
        let end = (cursor.pos + DENTS_PER_CALL).min(cursor.entries.len());
        let batch = cursor.entries[cursor.pos..end].to_vec();
        cursor.pos = end;
        Ok(batch)
    }

    fn closedir(&self, dir: RemoteDir) -> RemoteResult<()> {
        let mut inner = self.inner.lock();
        *inner.calls.entry("closedir").or_insert(0) += 1;
        inner
            .dirs
            .remove(&dir.0)
            .map(|_| ())
            .ok_or(Errno(libc::EBADF))
    }
}
