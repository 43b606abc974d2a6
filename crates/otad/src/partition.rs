//! File-backed firmware writer.
//!
//! Stages the incoming image next to the active one and swaps it in on
//! finalize, keeping the previous image around for rollback. Devices
//! with a real A/B flash layout replace this with their own
//! `FirmwareWriter`; the session does not care which it gets.

use ota_common::{FirmwareWriter, StorageError};
use std::fs::{self, File};
use std::io::Write;
use std::path::PathBuf;
use tracing::{debug, warn};

pub struct FilePartitionWriter {
    image_path: PathBuf,
    capacity: u64,
    staging: Option<Staging>,
    finalized_with_rollback: bool,
}

struct Staging {
    file: File,
    path: PathBuf,
    expected: u64,
    written: u64,
}

impl FilePartitionWriter {
    pub fn new(image_path: impl Into<PathBuf>, capacity: u64) -> Self {
        Self {
            image_path: image_path.into(),
            capacity,
            staging: None,
            finalized_with_rollback: false,
        }
    }

    fn staging_path(&self) -> PathBuf {
        let mut p = self.image_path.clone().into_os_string();
        p.push(".new");
        PathBuf::from(p)
    }

    fn rollback_path(&self) -> PathBuf {
        let mut p = self.image_path.clone().into_os_string();
        p.push(".prev");
        PathBuf::from(p)
    }
}

impl FirmwareWriter for FilePartitionWriter {
    fn begin(&mut self, total: u64) -> Result<(), StorageError> {
        if total > self.capacity {
            return Err(StorageError::ImageTooLarge { requested: total });
        }
        if let Some(parent) = self.image_path.parent() {
            fs::create_dir_all(parent)
                .map_err(|e| StorageError::Unavailable {
                    code: e.raw_os_error().unwrap_or(-1),
                })?;
        }
        let path = self.staging_path();
        let file = File::create(&path).map_err(|e| StorageError::Unavailable {
            code: e.raw_os_error().unwrap_or(-1),
        })?;
        debug!("staging image at {} ({} bytes expected)", path.display(), total);
        self.staging = Some(Staging {
            file,
            path,
            expected: total,
            written: 0,
        });
        self.finalized_with_rollback = false;
        Ok(())
    }

    fn write(&mut self, chunk: &[u8]) -> Result<usize, StorageError> {
        let staging = self.staging.as_mut().ok_or(StorageError::NotStarted)?;
        staging
            .file
            .write_all(chunk)
            .map_err(|e| StorageError::Write {
                code: e.raw_os_error().unwrap_or(-1),
            })?;
        staging.written += chunk.len() as u64;
        Ok(chunk.len())
    }

    fn finalize(&mut self) -> Result<(), StorageError> {
        let staging = self.staging.take().ok_or(StorageError::NotStarted)?;

        let io_code = |e: &std::io::Error| e.raw_os_error().unwrap_or(-1);

        if staging.written != staging.expected {
            let _ = fs::remove_file(&staging.path);
            return Err(StorageError::Finalize { code: -1 });
        }
        staging
            .file
            .sync_all()
            .map_err(|e| StorageError::Finalize { code: io_code(&e) })?;
        drop(staging.file);

        // Keep the running image for rollback, then swap the new one in.
        let mut rollback_available = false;
        if self.image_path.exists() {
            fs::copy(&self.image_path, self.rollback_path())
                .map_err(|e| StorageError::Finalize { code: io_code(&e) })?;
            rollback_available = true;
        }
        fs::rename(&staging.path, &self.image_path)
            .map_err(|e| StorageError::Finalize { code: io_code(&e) })?;

        self.finalized_with_rollback = rollback_available;
        Ok(())
    }

    fn abort(&mut self) {
        if let Some(staging) = self.staging.take() {
            warn!(
                "aborting update, discarding {} staged bytes",
                staging.written
            );
            drop(staging.file);
            let _ = fs::remove_file(&staging.path);
        }
        self.finalized_with_rollback = false;
    }

    fn is_bootable_and_rollback_capable(&self) -> bool {
        self.finalized_with_rollback && self.image_path.exists()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn writer_in(dir: &std::path::Path, capacity: u64) -> FilePartitionWriter {
        FilePartitionWriter::new(dir.join("firmware.img"), capacity)
    }

    #[test]
    fn rejects_image_over_capacity() {
        let dir = tempfile::tempdir().unwrap();
        let mut w = writer_in(dir.path(), 10);
        assert_eq!(
            w.begin(11),
            Err(StorageError::ImageTooLarge { requested: 11 })
        );
    }

    #[test]
    fn write_without_begin_fails() {
        let dir = tempfile::tempdir().unwrap();
        let mut w = writer_in(dir.path(), 1024);
        assert_eq!(w.write(b"data"), Err(StorageError::NotStarted));
    }

    #[test]
    fn full_write_then_finalize_swaps_image_in() {
        let dir = tempfile::tempdir().unwrap();
        let image = dir.path().join("firmware.img");
        fs::write(&image, b"old firmware").unwrap();

        let mut w = writer_in(dir.path(), 1024);
        w.begin(12).unwrap();
        assert_eq!(w.write(b"new ").unwrap(), 4);
        assert_eq!(w.write(b"firmware").unwrap(), 8);
        w.finalize().unwrap();

        assert!(w.is_bootable_and_rollback_capable());
        assert_eq!(fs::read(&image).unwrap(), b"new firmware");
        assert_eq!(
            fs::read(dir.path().join("firmware.img.prev")).unwrap(),
            b"old firmware"
        );
    }

    #[test]
    fn finalize_short_of_expected_fails_and_discards() {
        let dir = tempfile::tempdir().unwrap();
        let mut w = writer_in(dir.path(), 1024);
        w.begin(100).unwrap();
        w.write(b"short").unwrap();
        assert!(matches!(w.finalize(), Err(StorageError::Finalize { .. })));
        assert!(!w.is_bootable_and_rollback_capable());
        assert!(!dir.path().join("firmware.img.new").exists());
    }

    #[test]
    fn no_previous_image_means_no_rollback() {
        let dir = tempfile::tempdir().unwrap();
        let mut w = writer_in(dir.path(), 1024);
        w.begin(4).unwrap();
        w.write(b"data").unwrap();
        w.finalize().unwrap();
        // First flash ever: nothing to roll back to.
        assert!(!w.is_bootable_and_rollback_capable());
    }

    #[test]
    fn abort_discards_staging() {
        let dir = tempfile::tempdir().unwrap();
        let mut w = writer_in(dir.path(), 1024);
        w.begin(100).unwrap();
        w.write(b"partial").unwrap();
        w.abort();
        assert!(!dir.path().join("firmware.img.new").exists());
        // Abort with no active session is harmless.
        w.abort();
    }
}
