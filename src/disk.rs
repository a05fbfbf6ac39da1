//! Disk I/O: read/write a page's bytes at the right offset of the right
//! backing file (§4.6). One `DiskManager` per backing file; the manager
//! keeps a small registry keyed by path so distinct tables (and the temp
//! file) each get their own open handle.

use std::fs::{File, OpenOptions};
use std::io::{Read, Seek, SeekFrom, Write};
use std::path::{Path, PathBuf};

use log::{debug, warn};

pub(crate) struct DiskManager {
    file: File,
    path: PathBuf,
}

impl DiskManager {
    /// Opens the backing file, creating it if absent.
    pub fn open(path: &Path) -> std::io::Result<Self> {
        let file = OpenOptions::new()
            .read(true)
            .write(true)
            .open(path)
            .or_else(|_| {
                OpenOptions::new()
                    .create(true)
                    .read(true)
                    .write(true)
                    .open(path)
            })?;
        Ok(Self {
            file,
            path: path.to_path_buf(),
        })
    }

    /// Fills `buf` (exactly `page_size` bytes) from `index * page_size`.
    /// A short or missing file zero-fills the tail rather than erroring.
    pub fn read_page(&mut self, index: i64, page_size: usize, buf: &mut [u8]) {
        debug_assert_eq!(buf.len(), page_size);
        let offset = index as u64 * page_size as u64;
        let file_len = self.file.metadata().map(|m| m.len()).unwrap_or(0);
        if offset >= file_len || self.file.seek(SeekFrom::Start(offset)).is_err() {
            buf.fill(0);
            return;
        }
        let read = self.file.read(buf).unwrap_or(0);
        if read < buf.len() {
            debug!(
                "short read for page {} of {:?}: {} of {} bytes, zero-filling tail",
                index,
                self.path,
                read,
                buf.len()
            );
            buf[read..].fill(0);
        }
    }

    /// Writes exactly `page_size` bytes at `index * page_size`, durably.
    /// A write failure is logged and otherwise silently ignored (spec.md
    /// §7: "Disk-write-failure ... Silently proceed").
    pub fn write_page(&mut self, index: i64, page_size: usize, data: &[u8]) {
        debug_assert_eq!(data.len(), page_size);
        let offset = index as u64 * page_size as u64;
        if self.file.seek(SeekFrom::Start(offset)).is_err() {
            warn!("failed to seek to page {} of {:?}", index, self.path);
            return;
        }
        if let Err(e) = self.file.write_all(data) {
            warn!("failed to write page {} of {:?}: {}", index, self.path, e);
            return;
        }
        if let Err(e) = self.file.sync_data() {
            warn!(
                "failed to sync page {} of {:?} to disk: {}",
                index, self.path, e
            );
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use tempdir::TempDir;

    #[test]
    fn read_write_round_trip() {
        let dir = TempDir::new("disk_manager_test").unwrap();
        let path = dir.path().join("t.db");
        let mut dm = DiskManager::open(&path).unwrap();

        let mut buf = [0u8; 16];
        dm.read_page(0, 16, &mut buf); // tolerate empty read
        assert_eq!(buf, [0u8; 16]);

        let data = *b"0123456789abcdef";
        dm.write_page(0, 16, &data);
        dm.read_page(0, 16, &mut buf);
        assert_eq!(buf, data);
    }

    #[test]
    fn short_file_zero_fills_tail() {
        let dir = TempDir::new("disk_manager_test").unwrap();
        let path = dir.path().join("t.db");
        let mut dm = DiskManager::open(&path).unwrap();

        dm.write_page(0, 16, &[7u8; 16]);
        let mut buf = [0xAAu8; 16];
        dm.read_page(5, 16, &mut buf);
        assert_eq!(buf, [0u8; 16]);
    }
}
