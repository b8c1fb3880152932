//! Local-directory remote filesystem
//!
//! Serves each subdirectory of an export root as a share of every server:
//! `smb://server/share/a/b` maps to `<export_root>/share/a/b`, and the
//! server root `smb://server` enumerates the subdirectories as file shares.
//!
//! Access control is left to the local filesystem: the authentication
//! callback is consulted once per share and logged, and any credentials are
//! accepted.

use std::fs::{self, File, OpenOptions};
use std::io::{Read, Seek, SeekFrom, Write};
use std::path::{Component, Path, PathBuf};
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::Arc;
use std::time::UNIX_EPOCH;

use dashmap::{DashMap, DashSet};
use tracing::{debug, info};

use super::{
    AccessMode, Dirent, DirentType, Errno, FileKind, RemoteDir, RemoteFd, RemoteFs, RemoteResult,
    RemoteStat, SmbPath,
};
use crate::credentials::{AuthProvider, CredentialStore};

/// Entries returned per getdents call
const DENTS_PER_CALL: usize = 32;

struct LocalDir {
    entries: Vec<Dirent>,
    pos: usize,
}

/// [`RemoteFs`] backed by a local export directory
pub struct LocalFs {
    export_root: PathBuf,
    files: DashMap<u64, File>,
    dirs: DashMap<u64, LocalDir>,
    next_handle: AtomicU64,
    auth: Option<Arc<dyn AuthProvider>>,
    authenticated: DashSet<String>,
}

impl LocalFs {
    pub fn new(export_root: impl Into<PathBuf>) -> Self {
        let export_root = export_root.into();
        info!("Serving shares from {:?}", export_root);
        Self {
            export_root,
            files: DashMap::new(),
            dirs: DashMap::new(),
            next_handle: AtomicU64::new(1),
            auth: None,
            authenticated: DashSet::new(),
        }
    }

    /// Consult `auth` on first access to each share
    pub fn with_auth(mut self, auth: Arc<dyn AuthProvider>) -> Self {
        self.auth = Some(auth);
        self
    }

    pub fn export_root(&self) -> &Path {
        &self.export_root
    }

    fn handle(&self) -> u64 {
        self.next_handle.fetch_add(1, Ordering::Relaxed)
    }

    /// Map a remote path to a local one; `None` share means the server root
    fn resolve(&self, path: &str) -> RemoteResult<(PathBuf, bool)> {
        let parsed = SmbPath::parse(path)?;
        let share = match parsed.share {
            Some(share) => share,
            None => return Ok((self.export_root.clone(), true)),
        };
        if !is_share_name(share) {
            return Err(Errno(libc::EACCES));
        }
        self.authenticate(parsed.server, share);

        let mut local = self.export_root.join(share);
        for component in Path::new(parsed.rest.trim_start_matches('/')).components() {
            match component {
                Component::Normal(part) => local.push(part),
                Component::CurDir => {}
                _ => return Err(Errno(libc::EACCES)),
            }
        }
        Ok((local, false))
    }

    fn resolve_file(&self, path: &str) -> RemoteResult<PathBuf> {
        match self.resolve(path)? {
            (_, true) => Err(Errno(libc::EISDIR)),
            (local, false) => Ok(local),
        }
    }

    fn authenticate(&self, server: &str, share: &str) {
        let key = CredentialStore::lookup_key(server, share);
        if self.authenticated.contains(&key) {
            return;
        }
        if let Some(auth) = &self.auth {
            let data = auth.auth_data(server, share);
            debug!(key = %key, user = %data.user, "local share accessed");
        }
        self.authenticated.insert(key);
    }

    fn register(&self, file: File) -> RemoteFd {
        let id = self.handle();
        self.files.insert(id, file);
        RemoteFd(id)
    }

    fn with_file<T>(&self, fd: RemoteFd, f: impl FnOnce(&File) -> std::io::Result<T>) -> RemoteResult<T> {
        let file = self.files.get(&fd.0).ok_or(Errno(libc::EBADF))?;
        f(file.value()).map_err(Errno::from)
    }
}

/// A share must name exactly one directory directly below the export root
fn is_share_name(share: &str) -> bool {
    let mut components = Path::new(share).components();
    matches!(
        (components.next(), components.next()),
        (Some(Component::Normal(part)), None) if part == share
    )
}

fn to_stat(meta: &fs::Metadata) -> RemoteStat {
    let kind = if meta.is_dir() {
        FileKind::Directory
    } else if meta.is_file() {
        FileKind::File
    } else {
        FileKind::Other
    };
    let mtime = meta
        .modified()
        .ok()
        .and_then(|t| t.duration_since(UNIX_EPOCH).ok())
        .map(|d| d.as_secs() as i64)
        .unwrap_or(0);
    RemoteStat {
        kind,
        size: meta.len(),
        mtime,
    }
}

fn dirent_type(file_type: fs::FileType, share_level: bool) -> DirentType {
    if file_type.is_dir() {
        if share_level {
            DirentType::FileShare
        } else {
            DirentType::Dir
        }
    } else if file_type.is_file() {
        DirentType::File
    } else if file_type.is_symlink() {
        DirentType::Link
    } else {
        DirentType::Unknown
    }
}

impl RemoteFs for LocalFs {
    fn open(&self, path: &str, access: AccessMode) -> RemoteResult<RemoteFd> {
        let local = self.resolve_file(path)?;
        if local.is_dir() {
            return Err(Errno(libc::EISDIR));
        }
        let file = OpenOptions::new()
            .read(true)
            .write(access == AccessMode::ReadWrite)
            .open(&local)?;
        Ok(self.register(file))
    }

    fn create(&self, path: &str, mode: u32) -> RemoteResult<RemoteFd> {
        let local = self.resolve_file(path)?;
        let mut options = OpenOptions::new();
        options.read(true).write(true).create(true).truncate(true);
        #[cfg(unix)]
        {
            use std::os::unix::fs::OpenOptionsExt;
            options.mode(mode);
        }
        #[cfg(not(unix))]
        let _ = mode;
        let file = options.open(&local)?;
        Ok(self.register(file))
    }

    fn read(&self, fd: RemoteFd, buf: &mut [u8]) -> RemoteResult<usize> {
        self.with_file(fd, |mut file| {
            let mut filled = 0;
            while filled < buf.len() {
                match file.read(&mut buf[filled..])? {
                    0 => break,
                    n => filled += n,
                }
            }
            Ok(filled)
        })
    }

    fn write(&self, fd: RemoteFd, data: &[u8]) -> RemoteResult<usize> {
        self.with_file(fd, |mut file| file.write(data))
    }

    fn lseek(&self, fd: RemoteFd, offset: u64) -> RemoteResult<u64> {
        self.with_file(fd, |mut file| file.seek(SeekFrom::Start(offset)))
    }

    fn ftruncate(&self, fd: RemoteFd, length: u64) -> RemoteResult<()> {
        self.with_file(fd, |file| file.set_len(length))
    }

    fn close(&self, fd: RemoteFd) -> RemoteResult<()> {
        self.files
            .remove(&fd.0)
            .map(|_| ())
            .ok_or(Errno(libc::EBADF))
    }

    fn stat(&self, path: &str) -> RemoteResult<RemoteStat> {
        let (local, _) = self.resolve(path)?;
        let meta = fs::metadata(&local)?;
        Ok(to_stat(&meta))
    }

    fn fstat(&self, fd: RemoteFd) -> RemoteResult<RemoteStat> {
        self.with_file(fd, |file| file.metadata().map(|m| to_stat(&m)))
    }

    fn mkdir(&self, path: &str, mode: u32) -> RemoteResult<()> {
        let local = self.resolve_file(path)?;
        let mut builder = fs::DirBuilder::new();
        #[cfg(unix)]
        {
            use std::os::unix::fs::DirBuilderExt;
            builder.mode(mode);
        }
        #[cfg(not(unix))]
        let _ = mode;
        builder.create(&local)?;
        Ok(())
    }

    fn rmdir(&self, path: &str) -> RemoteResult<()> {
        let local = self.resolve_file(path)?;
        fs::remove_dir(&local)?;
        Ok(())
    }

    fn unlink(&self, path: &str) -> RemoteResult<()> {
        let local = self.resolve_file(path)?;
        if local.is_dir() {
            return Err(Errno(libc::EISDIR));
        }
        fs::remove_file(&local)?;
        Ok(())
    }

    fn rename(&self, from: &str, to: &str) -> RemoteResult<()> {
        if !SmbPath::parse(from)?.same_share(&SmbPath::parse(to)?) {
            return Err(Errno(libc::EXDEV));
        }
        let source = self.resolve_file(from)?;
        let target = self.resolve_file(to)?;
        if target.exists() {
            return Err(Errno(libc::EEXIST));
        }
        fs::rename(&source, &target)?;
        Ok(())
    }

    fn opendir(&self, path: &str) -> RemoteResult<RemoteDir> {
        let (local, share_level) = self.resolve(path)?;
        let mut entries = vec![
            Dirent::new(".", DirentType::Dir),
            Dirent::new("..", DirentType::Dir),
        ];
        let mut listed = Vec::new();
        for entry in fs::read_dir(&local)? {
            let entry = entry?;
            let file_type = entry.file_type()?;
            let name = entry.file_name().to_string_lossy().into_owned();
            listed.push(Dirent::new(name, dirent_type(file_type, share_level)));
        }
        listed.sort_by(|a, b| a.name.cmp(&b.name));
        entries.extend(listed);

        let id = self.handle();
        self.dirs.insert(id, LocalDir { entries, pos: 0 });
        Ok(RemoteDir(id))
    }

    fn getdents(&self, dir: RemoteDir) -> RemoteResult<Vec<Dirent>> {
        let mut cursor = self.dirs.get_mut(&dir.0).ok_or(Errno(libc::EBADF))?;
        let end = (cursor.pos + DENTS_PER_CALL).min(cursor.entries.len());
        let batch = cursor.entries[cursor.pos..end].to_vec();
        cursor.pos = end;
        Ok(batch)
    }

    fn closedir(&self, dir: RemoteDir) -> RemoteResult<()> {
        self.dirs
            .remove(&dir.0)
            .map(|_| ())
            .ok_or(Errno(libc::EBADF))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use tempfile::TempDir;

    fn fixture() -> (TempDir, LocalFs) {
        let dir = TempDir::new().unwrap();
        fs::create_dir_all(dir.path().join("docs/sub")).unwrap();
        fs::write(dir.path().join("docs/readme.txt"), b"local data").unwrap();
        fs::create_dir(dir.path().join("music")).unwrap();
        let local = LocalFs::new(dir.path());
        (dir, local)
    }

    fn drain(fs: &LocalFs, dir: RemoteDir) -> Vec<Dirent> {
        let mut all = Vec::new();
        loop {
            let batch = fs.getdents(dir).unwrap();
            if batch.is_empty() {
                break;
            }
            all.extend(batch);
        }
        all
    }

    #[test]
    fn test_server_root_lists_shares() {
        let (_dir, fs) = fixture();
        let dir = fs.opendir("smb://localhost").unwrap();
        let shares: Vec<_> = drain(&fs, dir)
            .into_iter()
            .filter(|d| d.kind == DirentType::FileShare)
            .map(|d| d.name)
            .collect();
        fs.closedir(dir).unwrap();
        assert_eq!(shares, vec!["docs", "music"]);
    }

    #[test]
    fn test_stat_and_read() {
        let (_dir, fs) = fixture();
        let stat = fs.stat("smb://localhost/docs/readme.txt").unwrap();
        assert_eq!(stat.kind, FileKind::File);
        assert_eq!(stat.size, 10);
        assert!(fs.stat("smb://localhost/docs/sub").unwrap().is_dir());

        let fd = fs
            .open("smb://localhost/docs/readme.txt", AccessMode::ReadOnly)
            .unwrap();
        assert_eq!(fs.lseek(fd, 6).unwrap(), 6);
        let mut buf = [0u8; 16];
        let n = fs.read(fd, &mut buf).unwrap();
        assert_eq!(&buf[..n], b"data");
        fs.close(fd).unwrap();
        assert_eq!(fs.close(fd), Err(Errno(libc::EBADF)));
    }

    #[test]
    fn test_create_write_truncate() {
        let (dir, fs) = fixture();
        let fd = fs.create("smb://localhost/docs/new.bin", 0o644).unwrap();
        assert_eq!(fs.write(fd, b"abcdef").unwrap(), 6);
        fs.ftruncate(fd, 3).unwrap();
        assert_eq!(fs.fstat(fd).unwrap().size, 3);
        fs.close(fd).unwrap();
        assert_eq!(fs::read(dir.path().join("docs/new.bin")).unwrap(), b"abc");
    }

    #[test]
    fn test_missing_entry_is_enoent() {
        let (_dir, fs) = fixture();
        assert_eq!(
            fs.stat("smb://localhost/docs/nope"),
            Err(Errno(libc::ENOENT))
        );
    }

    #[test]
    fn test_parent_components_rejected() {
        let (_dir, fs) = fixture();
        assert_eq!(
            fs.stat("smb://localhost/docs/../music"),
            Err(Errno(libc::EACCES))
        );
    }

    #[test]
    fn test_share_outside_export_root_rejected() {
        let (dir, fs) = fixture();
        std::fs::write(dir.path().join("top.txt"), b"x").unwrap();
        let shared = LocalFs::new(dir.path().join("docs"));

        assert_eq!(shared.opendir("smb://h/.."), Err(Errno(libc::EACCES)));
        assert_eq!(shared.stat("smb://h/../top.txt"), Err(Errno(libc::EACCES)));
        assert_eq!(fs.stat("smb://h/."), Err(Errno(libc::EACCES)));
        assert_eq!(fs.stat("smb://h//docs"), Err(Errno(libc::EACCES)));
        assert!(fs.stat("smb://h/docs").unwrap().is_dir());
    }

    #[test]
    fn test_rename_across_shares_fails() {
        let (_dir, fs) = fixture();
        assert_eq!(
            fs.rename("smb://localhost/docs/readme.txt", "smb://localhost/music/readme.txt"),
            Err(Errno(libc::EXDEV))
        );
        fs.rename("smb://localhost/docs/readme.txt", "smb://localhost/docs/sub/readme.txt")
            .unwrap();
        assert!(fs.stat("smb://localhost/docs/sub/readme.txt").is_ok());
    }

    #[test]
    fn test_mkdir_and_rmdir() {
        let (_dir, fs) = fixture();
        fs.mkdir("smb://localhost/music/jazz", 0o755).unwrap();
        assert_eq!(
            fs.mkdir("smb://localhost/music/jazz", 0o755),
            Err(Errno(libc::EEXIST))
        );
        fs.rmdir("smb://localhost/music/jazz").unwrap();
    }
}
