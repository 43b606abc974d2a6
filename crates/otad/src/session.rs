//! One check-then-download-then-apply cycle.
//!
//! `UpdateSession` drives a single pass through the state machine:
//!
//! ```text
//! Idle -> CheckingVersion -> (NoUpdateNeeded | Downloading)
//!      -> Writing -> (Committing | Aborted) -> Idle
//! ```
//!
//! Exactly one session exists at a time; the outer loop runs each one
//! to completion before starting the next, which is what makes the
//! writer's exclusive claim on the partition enforceable.

use crate::platform::Restart;
use crate::transport::{FirmwareStream, UpdateTransport};
use ota_common::version::{compare, ComparisonResult};
use ota_common::{DeviceId, FirmwareWriter, OtaConfig, OtaError, StorageError};
use tracing::{info, warn};

/// Bytes forwarded to the writer per call. Chunks arriving from the
/// transport are re-sliced to this bound.
const WRITE_CHUNK: usize = 4096;

/// Progress of an active download; owned by the session, discarded
/// with it.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct DownloadProgress {
    pub expected_total: u64,
    pub bytes_written: u64,
}

/// Where the session currently is.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum SessionPhase {
    Idle,
    CheckingVersion,
    NoUpdateNeeded,
    Downloading,
    Writing(DownloadProgress),
    Committing,
    Aborted,
}

impl SessionPhase {
    pub fn describe(&self) -> String {
        match self {
            SessionPhase::Idle => "idle".to_string(),
            SessionPhase::CheckingVersion => "checking version".to_string(),
            SessionPhase::NoUpdateNeeded => "no update needed".to_string(),
            SessionPhase::Downloading => "downloading".to_string(),
            SessionPhase::Writing(p) => {
                format!("writing {}/{} bytes", p.bytes_written, p.expected_total)
            }
            SessionPhase::Committing => "committing".to_string(),
            SessionPhase::Aborted => "aborted".to_string(),
        }
    }
}

/// Terminal outcome of a cycle that did not error.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum CycleOutcome {
    /// Remote version is not newer than ours.
    UpToDate { latest: String },
    /// Remote build has our version numbers but a different hash; not
    /// an upgrade, but worth surfacing.
    DivergentBuild { latest: String },
    /// New firmware committed and a restart requested.
    Updated { version: String },
}

pub struct UpdateSession<'a> {
    config: &'a OtaConfig,
    device_id: &'a DeviceId,
    transport: &'a dyn UpdateTransport,
    writer: &'a mut dyn FirmwareWriter,
    restart: &'a dyn Restart,
    phase: SessionPhase,
}

impl<'a> UpdateSession<'a> {
    pub fn new(
        config: &'a OtaConfig,
        device_id: &'a DeviceId,
        transport: &'a dyn UpdateTransport,
        writer: &'a mut dyn FirmwareWriter,
        restart: &'a dyn Restart,
    ) -> Self {
        Self {
            config,
            device_id,
            transport,
            writer,
            restart,
            phase: SessionPhase::Idle,
        }
    }

    pub fn phase(&self) -> &SessionPhase {
        &self.phase
    }

    /// Run the whole cycle: check, and if the server has something
    /// newer, download, commit and request a restart.
    pub async fn run(&mut self) -> Result<CycleOutcome, OtaError> {
        self.phase = SessionPhase::CheckingVersion;

        let check_url = self.bounded_url(format!(
            "{}/{}",
            self.config.ota_base_url, self.device_id
        ))?;
        info!("checking latest firmware version: {}", check_url);

        let payload = self.transport.fetch_latest_version(&check_url).await?;
        let latest = bounded_version(&payload, self.config.max_version_len);
        info!("latest firmware version: {}", latest);

        match compare(&self.config.current_version, &latest)? {
            ComparisonResult::Newer => {
                info!(
                    "newer than current firmware ({}), starting download",
                    self.config.current_version
                );
                self.download_and_apply(&latest).await?;
                Ok(CycleOutcome::Updated { version: latest })
            }
            ComparisonResult::EqualDivergentHash => {
                warn!(
                    "remote build {} diverges from ours ({}) without being newer, not updating",
                    latest, self.config.current_version
                );
                self.phase = SessionPhase::NoUpdateNeeded;
                Ok(CycleOutcome::DivergentBuild { latest })
            }
            ComparisonResult::Older | ComparisonResult::EqualIdentical => {
                info!("using latest firmware, no update needed");
                self.phase = SessionPhase::NoUpdateNeeded;
                Ok(CycleOutcome::UpToDate { latest })
            }
        }
    }

    async fn download_and_apply(&mut self, version: &str) -> Result<(), OtaError> {
        self.phase = SessionPhase::Downloading;

        let firmware_url = self.bounded_url(format!(
            "{}/{}/{}",
            self.config.firmware_base_url, self.config.project_name, version
        ))?;
        info!("downloading firmware from {}", firmware_url);

        let mut stream = self.transport.open_firmware_stream(&firmware_url).await?;
        let expected_total = stream.content_length();
        info!("update is {} bytes", expected_total);

        // Nothing is acquired until begin succeeds, so a failure here
        // needs no abort.
        self.writer.begin(expected_total)?;

        match self.stream_into_writer(stream.as_mut(), expected_total).await {
            Ok(()) => {}
            Err(e) => {
                // begin succeeded, so the partition must be released on
                // this and every other early exit.
                self.writer.abort();
                self.phase = SessionPhase::Aborted;
                return Err(e);
            }
        }

        self.phase = SessionPhase::Committing;
        if let Err(e) = self.writer.finalize() {
            warn!("finalize failed, firmware not committed: {}", e);
            self.phase = SessionPhase::Aborted;
            return Err(e.into());
        }
        info!("update complete, downloaded {} bytes", expected_total);

        if !self.writer.is_bootable_and_rollback_capable() {
            warn!("image finalized but not bootable with rollback, not restarting");
            self.phase = SessionPhase::Aborted;
            return Err(OtaError::PostWriteIntegrityDoubt);
        }

        info!(
            "rebooting in {}s to apply new firmware",
            self.config.settle_delay_seconds
        );
        tokio::time::sleep(self.config.settle_delay()).await;
        self.restart
            .request_restart()
            .map_err(|e| OtaError::Restart(e.to_string()))?;
        Ok(())
    }

    /// Stream chunks into the writer until the byte count equals the
    /// expected total. Equality is the sole completion trigger: a
    /// stream that closes short, errors, or overruns the advertised
    /// length never reaches it and the image is never finalized.
    async fn stream_into_writer(
        &mut self,
        stream: &mut dyn FirmwareStream,
        expected_total: u64,
    ) -> Result<(), OtaError> {
        let mut bytes_written: u64 = 0;
        self.phase = SessionPhase::Writing(DownloadProgress {
            expected_total,
            bytes_written,
        });

        while let Some(chunk) = stream.next_chunk().await? {
            for part in chunk.chunks(WRITE_CHUNK) {
                let accepted = self.writer.write(part)?;
                if accepted != part.len() {
                    return Err(StorageError::Write { code: -1 }.into());
                }
                bytes_written += accepted as u64;
                self.phase = SessionPhase::Writing(DownloadProgress {
                    expected_total,
                    bytes_written,
                });

                if bytes_written == expected_total {
                    return Ok(());
                }
            }
        }

        // Transport disconnected without the count ever matching.
        Err(OtaError::IncompleteDownload {
            expected: expected_total,
            received: bytes_written,
        })
    }

    fn bounded_url(&self, url: String) -> Result<String, OtaError> {
        if url.len() > self.config.max_url_len {
            return Err(OtaError::UrlTooLong {
                url,
                limit: self.config.max_url_len,
            });
        }
        Ok(url)
    }
}

/// Trim surrounding whitespace and bound the version payload to the
/// configured maximum length.
fn bounded_version(payload: &str, max_len: usize) -> String {
    let trimmed = payload.trim();
    match trimmed.char_indices().nth(max_len) {
        Some((idx, _)) => trimmed[..idx].to_string(),
        None => trimmed.to_string(),
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn version_payload_is_trimmed_and_bounded() {
        assert_eq!(bounded_version("  v1.2.3\n", 32), "v1.2.3");
        assert_eq!(bounded_version("v1.2.3-12-abcd563", 6), "v1.2.3");
        assert_eq!(bounded_version("", 32), "");
    }

    #[test]
    fn phase_describes_progress() {
        let phase = SessionPhase::Writing(DownloadProgress {
            expected_total: 1000,
            bytes_written: 128,
        });
        assert_eq!(phase.describe(), "writing 128/1000 bytes");
        assert_eq!(SessionPhase::Idle.describe(), "idle");
    }
}
