//! Metadata engine
//!
//! Stat-backed lookups, directory listings, and recursive delete.
//!
//! Listings that need size and modification time are streamed in batches:
//!
//! ```text
//! entry index   0 ......... 63 | 64 ............ 127 | 128 ...
//! batch size    16 16 16 16    | 64                  | 64  ...
//! ```
//!
//! Every batch costs one stat per entry and one envelope. The last batch is
//! the final envelope of the request.

use serde_json::Value;
use tracing::{debug, info, warn};

use smbfsp_core::{path, EntryMetadata, FieldMask, ProviderConfig};

use crate::error::{ProviderError, ProviderResult, RemoteContext};
use crate::remote::{Dirent, DirentType, RemoteFs};
use crate::reply::{payload, Responder};

pub struct MetadataEngine<'a> {
    fs: &'a dyn RemoteFs,
    config: &'a ProviderConfig,
}

impl<'a> MetadataEngine<'a> {
    pub fn new(fs: &'a dyn RemoteFs, config: &'a ProviderConfig) -> Self {
        Self { fs, config }
    }

    /// Metadata of one entry; the share root is answered without a remote call
    pub fn get_metadata(&self, full_path: &str, relative: &str) -> ProviderResult<EntryMetadata> {
        if relative == path::ROOT_MARKER {
            return Ok(EntryMetadata::root());
        }
        self.stat_entry(full_path, path::leaf_name(relative), "getMetadata:stat")
    }

    /// Metadata of several entries, all or nothing
    pub fn batch_get_metadata(
        &self,
        entries: &[(String, String)],
    ) -> ProviderResult<Vec<EntryMetadata>> {
        entries
            .iter()
            .map(|(full_path, relative)| {
                if relative == path::ROOT_MARKER {
                    Ok(EntryMetadata::root())
                } else {
                    self.stat_entry(full_path, path::leaf_name(relative), "batchGetMetadata:stat")
                }
            })
            .collect()
    }

    fn stat_entry(
        &self,
        full_path: &str,
        name: &str,
        op: &'static str,
    ) -> ProviderResult<EntryMetadata> {
        let stat = self.fs.stat(full_path).op(op)?;
        let mut entry = EntryMetadata::unstated(name, stat.is_dir());
        entry.set_stat(stat.is_dir(), stat.size, stat.mtime);
        Ok(entry)
    }

    /// Raw entries of a directory, without `.` and `..`
    fn enumerate(&self, dir: &str, op: &'static str) -> ProviderResult<Vec<Dirent>> {
        let handle = self.fs.opendir(dir).op(op)?;
        let mut entries = Vec::new();
        let result = loop {
            match self.fs.getdents(handle) {
                Ok(batch) if batch.is_empty() => break Ok(()),
                Ok(batch) => entries.extend(batch.into_iter().filter(|d| !d.is_dot())),
                Err(errno) => break Err(errno),
            }
        };
        if let Err(errno) = self.fs.closedir(handle) {
            warn!(dir, errno = errno.code(), "closedir failed: {}", errno);
        }
        result.op(op)?;
        Ok(entries)
    }

    /// Files and directories of `dir`, unstated, with full paths attached
    pub fn list_directory(&self, dir: &str) -> ProviderResult<Vec<EntryMetadata>> {
        let entries = self
            .enumerate(dir, "readDirectory:opendir")?
            .into_iter()
            .filter_map(|d| match d.kind {
                DirentType::Dir | DirentType::File => {
                    let full_path = path::child(dir, &d.name);
                    let is_dir = d.kind == DirentType::Dir;
                    Some(EntryMetadata::unstated(d.name, is_dir).with_full_path(full_path))
                }
                other => {
                    debug!(name = %d.name, kind = other.as_str(), "skipping entry");
                    None
                }
            })
            .collect();
        Ok(entries)
    }

    /// Stream a directory listing; returns the payload of the final envelope
    pub fn read_directory(
        &self,
        dir: &str,
        field_mask: FieldMask,
        responder: &mut Responder<'_>,
    ) -> ProviderResult<Value> {
        let mut entries = self.list_directory(dir)?;
        info!(dir, count = entries.len(), "readDirectory listed");

        if !field_mask.needs_stat() {
            return Ok(payload(&entries));
        }

        let total = entries.len();
        let mut start = 0;
        loop {
            let end = (start + self.config.batch_size_at(start)).min(total);
            for entry in &mut entries[start..end] {
                self.populate(entry);
            }
            if end >= total {
                return Ok(payload(&entries[start..end]));
            }
            debug!(dir, start, end, "sending batch");
            responder.send_part(&entries[start..end]);
            start = end;
        }
    }

    /// Fill size and time; a failed stat leaves the entry unstated
    fn populate(&self, entry: &mut EntryMetadata) {
        let full_path = match entry.full_path.clone() {
            Some(p) => p,
            None => return,
        };
        match self.fs.stat(&full_path) {
            Ok(stat) => {
                let is_dir = stat.is_dir();
                entry.set_stat(is_dir, stat.size, stat.mtime);
            }
            Err(errno) => {
                warn!(
                    path = %full_path,
                    errno = errno.code(),
                    "stat failed, entry left unstated: {}",
                    errno
                );
            }
        }
    }

    /// File shares of a server, each reported as a directory
    pub fn read_file_shares(&self, host_root: &str) -> ProviderResult<Vec<EntryMetadata>> {
        let shares = self
            .enumerate(host_root, "readFileShares:opendir")?
            .into_iter()
            .filter(|d| d.kind == DirentType::FileShare)
            .map(|d| EntryMetadata::unstated(d.name, true))
            .collect();
        Ok(shares)
    }

    /// Delete a file, or a directory (with its contents when `recursive`)
    pub fn delete_entry(&self, full_path: &str, recursive: bool) -> ProviderResult<()> {
        let stat = self.fs.stat(full_path).op("deleteEntry:stat")?;
        if stat.is_file() {
            self.delete_file(full_path)
        } else if stat.is_dir() {
            if recursive {
                self.delete_contents(full_path)?;
            }
            self.delete_empty_dir(full_path)
        } else {
            warn!(path = full_path, "deleteEntry: neither file nor directory");
            Err(ProviderError::UnsupportedEntry(full_path.to_string()))
        }
    }

    /// Post-order delete of everything below `dir`
    fn delete_contents(&self, dir: &str) -> ProviderResult<()> {
        for entry in self.list_directory(dir)? {
            let full_path = entry
                .full_path
                .unwrap_or_else(|| path::child(dir, &entry.name));
            if entry.is_directory {
                self.delete_contents(&full_path)?;
                self.delete_empty_dir(&full_path)?;
            } else {
                self.delete_file(&full_path)?;
            }
        }
        Ok(())
    }

    fn delete_file(&self, full_path: &str) -> ProviderResult<()> {
        debug!(path = full_path, "deleteEntry: file");
        self.fs.unlink(full_path).op("deleteEntry:unlink")
    }

    fn delete_empty_dir(&self, full_path: &str) -> ProviderResult<()> {
        debug!(path = full_path, "deleteEntry: directory");
        self.fs.rmdir(full_path).op("deleteEntry:rmdir")
    }
}
