//! Chunked read/write over open handles
//!
//! Both directions share the seek-avoidance rule: the remote position is
//! only moved when the handle's cursor is unknown or differs from the
//! requested offset. Any failure leaves the cursor unknown so the next call
//! seeks again.

use serde_json::Value;
use tracing::{debug, error};

use smbfsp_core::ProviderConfig;

use crate::error::{ProviderError, ProviderResult, RemoteContext};
use crate::handles::OpenFileHandle;
use crate::remote::RemoteFs;
use crate::reply::Responder;

pub struct FileIo<'a> {
    fs: &'a dyn RemoteFs,
    config: &'a ProviderConfig,
}

impl<'a> FileIo<'a> {
    pub fn new(fs: &'a dyn RemoteFs, config: &'a ProviderConfig) -> Self {
        Self { fs, config }
    }

    fn seek_if_needed(
        &self,
        handle: &mut OpenFileHandle,
        offset: u64,
        op: &'static str,
    ) -> ProviderResult<()> {
        if !handle.needs_seek(offset) {
            debug!(offset, "skipped redundant seek");
            return Ok(());
        }

        let landed = match self.fs.lseek(handle.fd, offset).op(op) {
            Ok(landed) => landed,
            Err(e) => {
                handle.invalidate();
                return Err(e);
            }
        };
        if landed != offset {
            handle.invalidate();
            error!(expected = offset, actual = landed, "seek landed at the wrong offset");
            return Err(ProviderError::SeekMismatch {
                expected: offset,
                actual: landed,
            });
        }
        handle.cursor = Some(offset);
        Ok(())
    }

    /// Read up to `length` bytes at `offset`, one part per chunk.
    ///
    /// Returns the payload of the final envelope: the last chunk, or an
    /// empty array when nothing is left to read.
    pub fn read(
        &self,
        handle: &mut OpenFileHandle,
        offset: u64,
        length: u64,
        responder: &mut Responder<'_>,
    ) -> ProviderResult<Value> {
        self.seek_if_needed(handle, offset, "readFile:lseek")?;

        let remaining = handle.length_at_open.saturating_sub(offset);
        let mut to_read = length.min(remaining) as usize;
        debug!(
            requested = length,
            reading = to_read,
            length_at_open = handle.length_at_open,
            "readFile"
        );

        let chunk_size = self.config.read_chunk_size.max(1);
        let mut buf = vec![0u8; chunk_size.min(to_read)];
        let mut last: Vec<u8> = Vec::new();

        while to_read > 0 {
            let want = chunk_size.min(to_read);
            let got = match self.fs.read(handle.fd, &mut buf[..want]).op("readFile:read") {
                Ok(got) => got,
                Err(e) => {
                    handle.invalidate();
                    return Err(e);
                }
            };
            if got != want {
                handle.invalidate();
                error!(requested = want, got, "read mismatch");
                return Err(ProviderError::ShortRead {
                    requested: want,
                    got,
                });
            }

            handle.advance(got as u64);
            to_read -= got;

            if to_read > 0 {
                responder.send_part(&buf[..got]);
            } else {
                last = buf[..got].to_vec();
            }
        }

        Ok(Value::from(last))
    }

    /// Write `data` at `offset` in chunks; empty data is a no-op
    pub fn write(
        &self,
        handle: &mut OpenFileHandle,
        offset: u64,
        data: &[u8],
    ) -> ProviderResult<()> {
        self.seek_if_needed(handle, offset, "writeFile:lseek")?;

        if data.is_empty() {
            debug!("zero-length write skipped");
            return Ok(());
        }

        for chunk in data.chunks(self.config.write_chunk_size.max(1)) {
            let wrote = match self.fs.write(handle.fd, chunk).op("writeFile:write") {
                Ok(wrote) => wrote,
                Err(e) => {
                    handle.invalidate();
                    return Err(e);
                }
            };
            if wrote != chunk.len() {
                handle.invalidate();
                error!(requested = chunk.len(), wrote, "write mismatch");
                return Err(ProviderError::ShortWrite {
                    requested: chunk.len(),
                    wrote,
                });
            }
            handle.advance(wrote as u64);
        }
        Ok(())
    }
}
