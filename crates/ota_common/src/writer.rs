//! Firmware storage collaborator contract.
//!
//! The agent streams an image through this trait; the implementation
//! owns the physical partition (flash driver, A/B slot manager, loop
//! device on a dev box). The partition is exclusively the active
//! session's from a successful `begin` until `finalize` or `abort`.

use crate::error::StorageError;

/// Sink for a firmware image being streamed into persistent storage.
///
/// Lifecycle: `begin(total)` acquires the partition, then any number of
/// `write` calls, then exactly one of `finalize` (commit) or `abort`
/// (release, contents undefined). Callers must release on every exit
/// path once `begin` has succeeded.
pub trait FirmwareWriter: Send {
    /// Prepare the partition for an image of exactly `total` bytes.
    /// Fails when the image does not fit or storage is unavailable.
    fn begin(&mut self, total: u64) -> Result<(), StorageError>;

    /// Append a chunk. Returns the number of bytes accepted; a short
    /// accept or an error means the partition is no longer trustworthy
    /// and the session must abort.
    fn write(&mut self, chunk: &[u8]) -> Result<usize, StorageError>;

    /// Validate and commit the written image. Consumes the session
    /// begun by `begin`; on error the image is not committed.
    fn finalize(&mut self) -> Result<(), StorageError>;

    /// Discard a partially written image and release the partition.
    /// Safe to call when no session is active.
    fn abort(&mut self);

    /// Whether the freshly finalized image is marked bootable and the
    /// previous image remains available for rollback. A `false` here
    /// blocks the restart: the old firmware keeps running.
    fn is_bootable_and_rollback_capable(&self) -> bool;
}
