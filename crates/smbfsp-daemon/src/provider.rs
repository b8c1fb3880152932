//! Filesystem operations
//!
//! [`Provider`] owns the mount table and the open-handle table and runs
//! every operation to completion against the remote client. It is driven by
//! a single worker, so the tables need no locking.

use std::collections::BTreeMap;
use std::sync::Arc;

use serde_json::Value;
use tracing::{debug, error, info, warn};

use smbfsp_core::{
    path, BatchGetMetadataOptions, CloseFileOptions, CopyEntryOptions, CreateDirectoryOptions,
    CreateFileOptions, DeleteEntryOptions, EntryMetadata, GetMetadataOptions, HostMap, MountInfo,
    MountOptions, MoveEntryOptions, OpenFileOptions, OpenMode, ProviderConfig,
    ReadDirectoryOptions, ReadFileOptions, TruncateOptions, UnmountOptions, WriteFileOptions,
};

use crate::credentials::CredentialStore;
use crate::error::{ProviderError, ProviderResult, RemoteContext};
use crate::file_io::FileIo;
use crate::handles::{HandleTable, OpenFileHandle};
use crate::metadata::MetadataEngine;
use crate::mounts::{MountSession, MountTable};
use crate::remote::{AccessMode, RemoteFs, SMB_SCHEME};
use crate::reply::Responder;

pub struct Provider {
    fs: Arc<dyn RemoteFs>,
    credentials: CredentialStore,
    mounts: MountTable,
    handles: HandleTable,
    config: ProviderConfig,
}

impl Provider {
    /// `credentials` must be the store the remote client authenticates with
    pub fn new(fs: Arc<dyn RemoteFs>, credentials: CredentialStore, config: ProviderConfig) -> Self {
        Self {
            fs,
            credentials,
            mounts: MountTable::new(),
            handles: HandleTable::new(),
            config,
        }
    }

    pub fn mounts(&self) -> &MountTable {
        &self.mounts
    }

    pub fn handles(&self) -> &HandleTable {
        &self.handles
    }

    pub fn credentials(&self) -> &CredentialStore {
        &self.credentials
    }

    fn metadata(&self) -> MetadataEngine<'_> {
        MetadataEngine::new(self.fs.as_ref(), &self.config)
    }

    // === Sessions ===

    pub fn mount(&mut self, options: &MountOptions, info: &MountInfo) -> ProviderResult<()> {
        info!(
            fs = %options.file_system_id,
            share = %info.share_path,
            display_name = %options.display_name,
            writable = options.writable,
            "mount"
        );
        if self.mounts.contains(&options.file_system_id) {
            return Err(ProviderError::AlreadyMounted(
                options.file_system_id.clone(),
            ));
        }

        let previous = self.credentials.get(&CredentialStore::key_for(info));
        let key = self.credentials.save(info);

        let probe = self
            .fs
            .opendir(&info.share_path)
            .and_then(|dir| self.fs.closedir(dir))
            .op("mount:opendir");
        if let Err(e) = probe {
            match previous {
                Some(data) if self.mounts_with_key(&key).next().is_some() => {
                    self.credentials.restore(&key, data)
                }
                _ => {
                    self.credentials.remove(&key);
                }
            }
            return Err(e);
        }

        let session = MountSession::new(options, info);
        debug!(fs = %session.file_system_id, root = %session.share_root, "mounted");
        self.mounts.insert(session);
        Ok(())
    }

    pub fn unmount(&mut self, options: &UnmountOptions) -> ProviderResult<()> {
        info!(fs = %options.file_system_id, "unmount");
        let session = match self.mounts.remove(&options.file_system_id) {
            Some(session) => session,
            None => {
                debug!(fs = %options.file_system_id, "unmount of unknown file system ignored");
                return Ok(());
            }
        };

        for (request_id, handle) in self.handles.drain_for(&session.file_system_id) {
            if let Err(errno) = self.fs.close(handle.fd) {
                warn!(request_id, errno = errno.code(), "close on unmount failed: {}", errno);
            }
        }

        let key_in_use = self
            .mounts_with_key(&session.credential_key)
            .next()
            .is_some();
        if !key_in_use {
            self.credentials.remove(&session.credential_key);
        }
        Ok(())
    }

    fn mounts_with_key<'a>(&'a self, key: &'a str) -> impl Iterator<Item = &'a MountSession> + 'a {
        self.mounts.iter().filter(move |s| s.credential_key == key)
    }

    // === Metadata ===

    pub fn get_metadata(&self, options: &GetMetadataOptions) -> ProviderResult<EntryMetadata> {
        info!(fs = %options.tracked.file_system_id, path = %options.entry_path, "getMetadata");
        let full_path = self
            .mounts
            .resolve(&options.tracked.file_system_id, &options.entry_path)?;
        self.metadata().get_metadata(&full_path, &options.entry_path)
    }

    pub fn batch_get_metadata(
        &self,
        options: &BatchGetMetadataOptions,
    ) -> ProviderResult<Vec<EntryMetadata>> {
        let fs_id = &options.tracked.file_system_id;
        info!(fs = %fs_id, count = options.entries.len(), "batchGetMetadata");
        let entries = options
            .entries
            .iter()
            .map(|relative| {
                self.mounts
                    .resolve(fs_id, relative)
                    .map(|full| (full, relative.clone()))
            })
            .collect::<ProviderResult<Vec<_>>>()?;
        self.metadata().batch_get_metadata(&entries)
    }

    pub fn read_directory(
        &self,
        options: &ReadDirectoryOptions,
        responder: &mut Responder<'_>,
    ) -> ProviderResult<Value> {
        info!(fs = %options.tracked.file_system_id, path = %options.directory_path, "readDirectory");
        let full_path = self
            .mounts
            .resolve(&options.tracked.file_system_id, &options.directory_path)?;
        self.metadata()
            .read_directory(&full_path, options.field_mask, responder)
    }

    /// Shares of every host, best effort: a host that cannot be enumerated
    /// reports no shares
    pub fn enumerate_file_shares(&self, hosts: &HostMap) -> BTreeMap<String, Vec<EntryMetadata>> {
        let engine = self.metadata();
        hosts
            .iter()
            .map(|(name, ip)| {
                let host = match ip.as_deref() {
                    Some(ip) if !ip.is_empty() => ip,
                    _ => name.as_str(),
                };
                let root = format!("{}{}", SMB_SCHEME, host);
                let shares = engine.read_file_shares(&root).unwrap_or_else(|e| {
                    warn!(host = %name, "share enumeration failed: {}", e);
                    Vec::new()
                });
                (name.clone(), shares)
            })
            .collect()
    }

    // === Namespace changes ===

    pub fn create_directory(&self, options: &CreateDirectoryOptions) -> ProviderResult<()> {
        let fs_id = &options.tracked.file_system_id;
        info!(fs = %fs_id, path = %options.directory_path, recursive = options.recursive, "createDirectory");
        let full_path = self.mounts.resolve(fs_id, &options.directory_path)?;

        if options.recursive {
            for ancestor in path::ancestors(&options.directory_path) {
                let ancestor_path = self.mounts.resolve(fs_id, ancestor)?;
                match self.fs.mkdir(&ancestor_path, self.config.mkdir_mode) {
                    Ok(()) => debug!(path = %ancestor_path, "created ancestor"),
                    Err(errno) if errno.code() == libc::EEXIST => {}
                    Err(errno) => return Err::<(), _>(errno).op("createDirectory:mkdir"),
                }
            }
        }

        self.fs
            .mkdir(&full_path, self.config.mkdir_mode)
            .op("createDirectory:mkdir")
    }

    pub fn delete_entry(&self, options: &DeleteEntryOptions) -> ProviderResult<()> {
        info!(fs = %options.tracked.file_system_id, path = %options.entry_path, recursive = options.recursive, "deleteEntry");
        let full_path = self
            .mounts
            .resolve(&options.tracked.file_system_id, &options.entry_path)?;
        self.metadata().delete_entry(&full_path, options.recursive)
    }

    pub fn move_entry(&self, options: &MoveEntryOptions) -> ProviderResult<()> {
        let fs_id = &options.tracked.file_system_id;
        info!(fs = %fs_id, from = %options.source_path, to = %options.target_path, "moveEntry");
        let source = self.mounts.resolve(fs_id, &options.source_path)?;
        let target = self.mounts.resolve(fs_id, &options.target_path)?;
        self.fs.rename(&source, &target).op("moveEntry:rename")
    }

    pub fn copy_entry(&self, options: &CopyEntryOptions) -> ProviderResult<()> {
        info!(fs = %options.tracked.file_system_id, from = %options.source_path, to = %options.target_path, "copyEntry");
        Err(ProviderError::NotImplemented("copyEntry"))
    }

    pub fn create_file(&self, options: &CreateFileOptions) -> ProviderResult<()> {
        info!(fs = %options.tracked.file_system_id, path = %options.file_path, "createFile");
        let full_path = self
            .mounts
            .resolve(&options.tracked.file_system_id, &options.file_path)?;
        let fd = self
            .fs
            .create(&full_path, self.config.create_mode)
            .op("createFile:create")?;
        if let Err(errno) = self.fs.close(fd) {
            warn!(path = %full_path, errno = errno.code(), "close after create failed: {}", errno);
        }
        Ok(())
    }

    pub fn truncate(&self, options: &TruncateOptions) -> ProviderResult<()> {
        info!(fs = %options.tracked.file_system_id, path = %options.file_path, length = options.length, "truncate");
        let full_path = self
            .mounts
            .resolve(&options.tracked.file_system_id, &options.file_path)?;
        let fd = self
            .fs
            .open(&full_path, AccessMode::ReadWrite)
            .op("truncate:open")?;
        let result = self.fs.ftruncate(fd, options.length).op("truncate:ftruncate");
        if let Err(errno) = self.fs.close(fd) {
            warn!(path = %full_path, errno = errno.code(), "close after truncate failed: {}", errno);
        }
        result
    }

    // === Open handles ===

    pub fn open_file(&mut self, options: &OpenFileOptions) -> ProviderResult<()> {
        let fs_id = &options.tracked.file_system_id;
        let request_id = options.tracked.request_id;
        info!(fs = %fs_id, path = %options.file_path, mode = ?options.mode, request_id, "openFile");

        let full_path = self.mounts.resolve(fs_id, &options.file_path)?;
        if self.handles.contains(request_id) {
            return Err(ProviderError::HandleInUse(request_id));
        }
        let limit = self.mounts.get(fs_id)?.open_limit;
        if limit > 0 && self.handles.count_for(fs_id) >= limit {
            warn!(fs = %fs_id, limit, "opened files limit reached");
            return Err(ProviderError::OpenLimit { limit });
        }

        let access = match options.mode {
            OpenMode::Read => AccessMode::ReadOnly,
            OpenMode::Write => AccessMode::ReadWrite,
        };
        let fd = self.fs.open(&full_path, access).op("openFile:open")?;
        let stat = match self.fs.fstat(fd).op("openFile:fstat") {
            Ok(stat) => stat,
            Err(e) => {
                if let Err(errno) = self.fs.close(fd) {
                    error!(errno = errno.code(), "close after failed fstat: {}", errno);
                }
                return Err(e);
            }
        };

        debug!(request_id, size = stat.size, "size at open");
        self.handles.insert(
            request_id,
            OpenFileHandle::new(fs_id.clone(), fd, full_path, options.mode, stat.size),
        );
        Ok(())
    }

    pub fn read_file(
        &mut self,
        options: &ReadFileOptions,
        responder: &mut Responder<'_>,
    ) -> ProviderResult<Value> {
        info!(
            request_id = options.open_request_id,
            offset = options.offset,
            length = options.length,
            "readFile"
        );
        let io = FileIo::new(self.fs.as_ref(), &self.config);
        let handle = self.handles.get_mut(options.open_request_id)?;
        io.read(handle, options.offset, options.length, responder)
    }

    pub fn write_file(&mut self, options: &WriteFileOptions) -> ProviderResult<()> {
        info!(
            request_id = options.open_request_id,
            offset = options.offset,
            length = options.data.len(),
            "writeFile"
        );
        let io = FileIo::new(self.fs.as_ref(), &self.config);
        let handle = self.handles.get_mut(options.open_request_id)?;
        io.write(handle, options.offset, &options.data)
    }

    /// Close failures are logged, never reported; an unknown id is a no-op
    pub fn close_file(&mut self, options: &CloseFileOptions) -> ProviderResult<()> {
        info!(request_id = options.open_request_id, "closeFile");
        match self.handles.remove(options.open_request_id) {
            Some(handle) => {
                if let Err(errno) = self.fs.close(handle.fd) {
                    error!(
                        request_id = options.open_request_id,
                        errno = errno.code(),
                        "closeFile: error closing fd: {}",
                        errno
                    );
                }
            }
            None => warn!(
                request_id = options.open_request_id,
                "closeFile: tried to close an unopened request id"
            ),
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::remote::MemoryFs;
    use smbfsp_core::{ErrorKind, FieldMask, Response, TrackedOptions};

    const FS: &str = "fs1";

    fn tracked(request_id: i64) -> TrackedOptions {
        TrackedOptions {
            file_system_id: FS.into(),
            request_id,
        }
    }

    fn mount_options(id: &str, limit: Option<u32>) -> MountOptions {
        MountOptions {
            file_system_id: id.into(),
            display_name: "Media".into(),
            writable: true,
            opened_files_limit: limit,
        }
    }

    fn mount_info() -> MountInfo {
        MountInfo {
            share_path: "smb://nas/media/".into(),
            domain: "WORKGROUP".into(),
            user: "alice".into(),
            password: "pw".into(),
            server: "nas".into(),
            server_ip: String::new(),
            path: String::new(),
            share: "media".into(),
        }
    }

    fn setup_with_limit(limit: Option<u32>) -> (Arc<MemoryFs>, Provider) {
        let credentials = CredentialStore::new();
        let fs = Arc::new(MemoryFs::with_credentials(credentials.clone()));
        fs.add_share("nas", "media");
        fs.add_file("smb://nas/media/song.mp3", b"0123456789");
        fs.require_credentials("nas", "media", "alice", "pw");

        let mut provider = Provider::new(fs.clone(), credentials, ProviderConfig::default());
        provider
            .mount(&mount_options(FS, limit), &mount_info())
            .unwrap();
        (fs, provider)
    }

    fn setup() -> (Arc<MemoryFs>, Provider) {
        setup_with_limit(None)
    }

    fn open(provider: &mut Provider, request_id: i64, path: &str) -> ProviderResult<()> {
        provider.open_file(&OpenFileOptions {
            tracked: tracked(request_id),
            file_path: path.into(),
            mode: OpenMode::Read,
        })
    }

    fn get(provider: &Provider, path: &str) -> ProviderResult<EntryMetadata> {
        provider.get_metadata(&GetMetadataOptions {
            tracked: tracked(0),
            entry_path: path.into(),
            field_mask: FieldMask::all(),
        })
    }

    #[test]
    fn test_mount_records_session_and_credentials() {
        let (fs, provider) = setup();
        let session = provider.mounts().get(FS).unwrap();
        assert_eq!(session.share_root, "smb://nas/media");
        assert_eq!(provider.credentials().len(), 1);
        assert_eq!(fs.calls("opendir"), 1);
        assert_eq!(fs.calls("closedir"), 1);
    }

    #[test]
    fn test_failed_mount_removes_credentials() {
        let credentials = CredentialStore::new();
        let fs = Arc::new(MemoryFs::with_credentials(credentials.clone()));
        fs.add_share("nas", "media");
        fs.require_credentials("nas", "media", "alice", "right");
        let mut provider = Provider::new(fs, credentials, ProviderConfig::default());

        let mut info = mount_info();
        info.password = "wrong".into();
        let err = provider.mount(&mount_options(FS, None), &info).unwrap_err();
        assert_eq!(err.kind(), ErrorKind::AccessDenied);
        assert!(provider.credentials().is_empty());
        assert!(provider.mounts().is_empty());
    }

    #[test]
    fn test_duplicate_mount_rejected() {
        let (_fs, mut provider) = setup();
        let err = provider
            .mount(&mount_options(FS, None), &mount_info())
            .unwrap_err();
        assert_eq!(err.kind(), ErrorKind::InvalidOperation);
        assert_eq!(provider.mounts().len(), 1);
    }

    #[test]
    fn test_root_metadata_without_stat() {
        let (fs, provider) = setup();
        let root = get(&provider, "/").unwrap();
        assert!(root.is_directory);
        assert_eq!(root.size, 0);
        assert_eq!(fs.calls("stat"), 0);
    }

    #[test]
    fn test_unmount_then_operations_fail() {
        let (fs, mut provider) = setup();
        open(&mut provider, 5, "/song.mp3").unwrap();
        assert_eq!(fs.open_file_count(), 1);

        let unmount = UnmountOptions {
            file_system_id: FS.into(),
        };
        provider.unmount(&unmount).unwrap();
        assert_eq!(fs.open_file_count(), 0);
        assert!(provider.handles().is_empty());
        assert!(provider.credentials().is_empty());

        assert_eq!(
            get(&provider, "/song.mp3").unwrap_err().kind(),
            ErrorKind::InvalidOperation
        );
        assert_eq!(
            open(&mut provider, 6, "/song.mp3").unwrap_err().kind(),
            ErrorKind::InvalidOperation
        );

        // Unknown id is a no-op
        provider.unmount(&unmount).unwrap();
    }

    #[test]
    fn test_unmount_keeps_credentials_shared_with_other_session() {
        let (_fs, mut provider) = setup();
        provider
            .mount(&mount_options("fs2", None), &mount_info())
            .unwrap();
        provider
            .unmount(&UnmountOptions {
                file_system_id: FS.into(),
            })
            .unwrap();
        assert_eq!(provider.credentials().len(), 1);
    }

    #[test]
    fn test_failed_mount_keeps_credentials_of_live_session() {
        let (_fs, mut provider) = setup();
        let info = MountInfo {
            share_path: "smb://nas/media/missing".into(),
            user: "mallory".into(),
            password: "other".into(),
            ..mount_info()
        };
        let err = provider
            .mount(&mount_options("fs2", None), &info)
            .unwrap_err();
        assert_eq!(err.kind(), ErrorKind::NotFound);

        assert!(provider.mounts().contains(FS));
        assert!(!provider.mounts().contains("fs2"));
        let kept = provider.credentials().get("nas$$$media").unwrap();
        assert_eq!(kept.user, "alice");
        assert_eq!(kept.password, "pw");
        assert!(get(&provider, "/song.mp3").is_ok());
    }

    #[test]
    fn test_create_file_then_metadata() {
        let (_fs, provider) = setup();
        provider
            .create_file(&CreateFileOptions {
                tracked: tracked(1),
                file_path: "/new.txt".into(),
            })
            .unwrap();
        let entry = get(&provider, "/new.txt").unwrap();
        assert!(!entry.is_directory);
        assert_eq!(entry.size, 0);
        assert_eq!(entry.name, "new.txt");
        assert!(provider.handles().is_empty());
    }

    #[test]
    fn test_open_requires_stat_and_unique_id() {
        let (fs, mut provider) = setup();
        open(&mut provider, 1, "/song.mp3").unwrap();
        assert_eq!(
            open(&mut provider, 1, "/song.mp3").unwrap_err().kind(),
            ErrorKind::InvalidOperation
        );
        assert_eq!(fs.open_file_count(), 1);

        fs.fail_on("fstat", "smb://nas/media/song.mp3", libc::EIO);
        assert_eq!(
            open(&mut provider, 2, "/song.mp3").unwrap_err().kind(),
            ErrorKind::Failed
        );
        assert_eq!(fs.open_file_count(), 1);
        assert!(!provider.handles().contains(2));

        assert_eq!(
            open(&mut provider, 3, "/missing").unwrap_err().kind(),
            ErrorKind::NotFound
        );
    }

    #[test]
    fn test_opened_files_limit() {
        let (_fs, mut provider) = setup_with_limit(Some(1));
        open(&mut provider, 1, "/song.mp3").unwrap();
        assert_eq!(
            open(&mut provider, 2, "/song.mp3").unwrap_err().kind(),
            ErrorKind::TooManyOpened
        );
        provider
            .close_file(&CloseFileOptions {
                tracked: tracked(3),
                open_request_id: 1,
            })
            .unwrap();
        open(&mut provider, 2, "/song.mp3").unwrap();
    }

    #[test]
    fn test_open_read_close() {
        let (fs, mut provider) = setup();
        open(&mut provider, 1, "/song.mp3").unwrap();

        let mut sent: Vec<Response> = Vec::new();
        let mut responder = Responder::new("readFile", 10, &mut sent);
        let value = provider
            .read_file(
                &ReadFileOptions {
                    tracked: tracked(2),
                    open_request_id: 1,
                    offset: 0,
                    length: 4,
                },
                &mut responder,
            )
            .unwrap();
        drop(responder);
        assert_eq!(value, serde_json::json!([48, 49, 50, 51]));

        let close = CloseFileOptions {
            tracked: tracked(3),
            open_request_id: 1,
        };
        provider.close_file(&close).unwrap();
        assert_eq!(fs.open_file_count(), 0);
        // Closing again is a logged no-op
        provider.close_file(&close).unwrap();
    }

    #[test]
    fn test_read_unknown_handle() {
        let (_fs, mut provider) = setup();
        let mut sent: Vec<Response> = Vec::new();
        let mut responder = Responder::new("readFile", 1, &mut sent);
        let err = provider
            .read_file(
                &ReadFileOptions {
                    tracked: tracked(2),
                    open_request_id: 42,
                    offset: 0,
                    length: 4,
                },
                &mut responder,
            )
            .unwrap_err();
        assert_eq!(err.kind(), ErrorKind::InvalidOperation);
    }

    #[test]
    fn test_write_then_truncate() {
        let (fs, mut provider) = setup();
        provider
            .open_file(&OpenFileOptions {
                tracked: tracked(1),
                file_path: "/song.mp3".into(),
                mode: OpenMode::Write,
            })
            .unwrap();
        provider
            .write_file(&WriteFileOptions {
                tracked: tracked(2),
                open_request_id: 1,
                offset: 10,
                data: b"ab".to_vec(),
            })
            .unwrap();
        assert_eq!(fs.contents("smb://nas/media/song.mp3").unwrap(), b"0123456789ab");

        provider
            .truncate(&TruncateOptions {
                tracked: tracked(3),
                file_path: "/song.mp3".into(),
                length: 3,
            })
            .unwrap();
        assert_eq!(fs.contents("smb://nas/media/song.mp3").unwrap(), b"012");
        assert_eq!(fs.open_file_count(), 1);
    }

    #[test]
    fn test_write_on_read_handle_fails() {
        let (_fs, mut provider) = setup();
        open(&mut provider, 1, "/song.mp3").unwrap();
        let err = provider
            .write_file(&WriteFileOptions {
                tracked: tracked(2),
                open_request_id: 1,
                offset: 0,
                data: b"x".to_vec(),
            })
            .unwrap_err();
        assert_eq!(err.kind(), ErrorKind::Failed);
    }

    #[test]
    fn test_create_directory_recursive() {
        let (fs, provider) = setup();
        let options = CreateDirectoryOptions {
            tracked: tracked(1),
            directory_path: "/a/b/c".into(),
            recursive: false,
        };
        assert_eq!(
            provider.create_directory(&options).unwrap_err().kind(),
            ErrorKind::NotFound
        );

        fs.add_dir("smb://nas/media/a");
        let options = CreateDirectoryOptions {
            recursive: true,
            ..options
        };
        provider.create_directory(&options).unwrap();
        assert!(fs.exists("smb://nas/media/a/b/c"));

        assert_eq!(
            provider.create_directory(&options).unwrap_err().kind(),
            ErrorKind::Failed
        );
    }

    #[test]
    fn test_move_and_copy() {
        let (fs, provider) = setup();
        provider
            .move_entry(&MoveEntryOptions {
                tracked: tracked(1),
                source_path: "/song.mp3".into(),
                target_path: "/track.mp3".into(),
            })
            .unwrap();
        assert!(fs.exists("smb://nas/media/track.mp3"));

        let err = provider
            .copy_entry(&CopyEntryOptions {
                tracked: tracked(2),
                source_path: "/track.mp3".into(),
                target_path: "/copy.mp3".into(),
            })
            .unwrap_err();
        assert_eq!(err.kind(), ErrorKind::Failed);
        assert!(!fs.exists("smb://nas/media/copy.mp3"));
    }

    #[test]
    fn test_delete_entry() {
        let (fs, provider) = setup();
        provider
            .delete_entry(&DeleteEntryOptions {
                tracked: tracked(1),
                entry_path: "/song.mp3".into(),
                recursive: false,
            })
            .unwrap();
        assert!(!fs.exists("smb://nas/media/song.mp3"));
    }

    #[test]
    fn test_batch_get_metadata_rejects_traversal() {
        let (fs, provider) = setup();
        let err = provider
            .batch_get_metadata(&BatchGetMetadataOptions {
                tracked: tracked(1),
                entries: vec!["/song.mp3".into(), "/../etc".into()],
                field_mask: FieldMask::all(),
            })
            .unwrap_err();
        assert_eq!(err.kind(), ErrorKind::AccessDenied);
        assert_eq!(fs.calls("stat"), 0);
    }

    #[test]
    fn test_enumerate_file_shares_best_effort() {
        let (fs, provider) = setup();
        fs.add_share("10.0.0.9", "backup");

        let mut hosts = HostMap::new();
        hosts.insert("nas".into(), None);
        hosts.insert("vault".into(), Some("10.0.0.9".into()));
        hosts.insert("offline".into(), Some(String::new()));

        let shares = provider.enumerate_file_shares(&hosts);
        assert_eq!(shares["nas"][0].name, "media");
        assert_eq!(shares["vault"][0].name, "backup");
        assert!(shares["offline"].is_empty());
    }
}
