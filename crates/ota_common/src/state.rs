//! Persisted update state.
//!
//! A small JSON file recording what the last check did, so the state
//! survives restarts and an operator can see at a glance whether the
//! device is keeping itself current. Observability only: scheduling is
//! the loop's fixed polling interval, never derived from this file.

use serde::{Deserialize, Serialize};
use std::fs;
use std::io;
use std::path::Path;
use std::time::{SystemTime, UNIX_EPOCH};

/// What the last completed check cycle concluded.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize, Default)]
#[serde(rename_all = "snake_case")]
pub enum LastOutcome {
    #[default]
    Pending,
    UpToDate,
    /// Remote build shares our version numbers but not our hash.
    DivergentBuild,
    /// An update was downloaded and committed; a restart follows.
    Updated,
    Failed,
}

impl LastOutcome {
    pub fn as_str(&self) -> &'static str {
        match self {
            LastOutcome::Pending => "pending",
            LastOutcome::UpToDate => "up to date",
            LastOutcome::DivergentBuild => "divergent build",
            LastOutcome::Updated => "updated",
            LastOutcome::Failed => "failed",
        }
    }
}

/// Update state snapshot, persisted after every cycle.
#[derive(Debug, Clone, Serialize, Deserialize, Default)]
pub struct UpdateState {
    /// Last check timestamp (unix epoch seconds), 0 = never.
    pub last_check_epoch: u64,
    #[serde(default)]
    pub last_outcome: LastOutcome,
    /// Failure reason of the last cycle, if it failed.
    pub last_failure_reason: Option<String>,
    /// Consecutive failed cycles.
    #[serde(default)]
    pub consecutive_failures: u32,
    /// Version the device was running at the last check.
    pub current_version: String,
    /// Latest version the server advertised, if a check succeeded.
    pub latest_version: Option<String>,
}

impl UpdateState {
    pub fn load(path: &Path) -> Self {
        if path.exists() {
            if let Ok(content) = fs::read_to_string(path) {
                if let Ok(state) = serde_json::from_str(&content) {
                    return state;
                }
            }
        }
        Self::default()
    }

    pub fn save(&self, path: &Path) -> io::Result<()> {
        if let Some(parent) = path.parent() {
            fs::create_dir_all(parent)?;
        }
        let content = serde_json::to_string_pretty(self)
            .map_err(|e| io::Error::new(io::ErrorKind::InvalidData, e))?;
        atomic_write(path, &content)
    }

    pub fn now_epoch() -> u64 {
        SystemTime::now()
            .duration_since(UNIX_EPOCH)
            .unwrap_or_default()
            .as_secs()
    }

    /// Record a cycle that completed without error.
    pub fn record_success(&mut self, outcome: LastOutcome, latest: Option<String>) {
        self.last_check_epoch = Self::now_epoch();
        self.last_outcome = outcome;
        self.last_failure_reason = None;
        self.consecutive_failures = 0;
        self.latest_version = latest;
    }

    /// Record a failed cycle.
    pub fn record_failure(&mut self, reason: &str) {
        self.last_check_epoch = Self::now_epoch();
        self.last_outcome = LastOutcome::Failed;
        self.last_failure_reason = Some(reason.to_string());
        self.consecutive_failures += 1;
    }

    /// Last check time for display.
    pub fn format_last_check(&self) -> String {
        if self.last_check_epoch == 0 {
            return "never".to_string();
        }
        chrono::DateTime::<chrono::Utc>::from_timestamp(self.last_check_epoch as i64, 0)
            .map(|dt| dt.to_rfc3339())
            .unwrap_or_else(|| "invalid".to_string())
    }
}

/// Write via a temp file in the same directory plus rename, so readers
/// never observe a half-written state file.
fn atomic_write(path: &Path, content: &str) -> io::Result<()> {
    let tmp = path.with_extension("tmp");
    fs::write(&tmp, content)?;
    fs::rename(&tmp, path)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn missing_file_loads_default() {
        let dir = tempfile::tempdir().unwrap();
        let state = UpdateState::load(&dir.path().join("state.json"));
        assert_eq!(state.last_outcome, LastOutcome::Pending);
        assert_eq!(state.last_check_epoch, 0);
    }

    #[test]
    fn save_and_reload_round_trip() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("nested/state.json");

        let mut state = UpdateState {
            current_version: "v1.2.56".to_string(),
            ..Default::default()
        };
        state.record_success(LastOutcome::UpToDate, Some("v1.2.56".to_string()));
        state.save(&path).unwrap();

        let loaded = UpdateState::load(&path);
        assert_eq!(loaded.last_outcome, LastOutcome::UpToDate);
        assert_eq!(loaded.latest_version.as_deref(), Some("v1.2.56"));
        assert_eq!(loaded.consecutive_failures, 0);
        assert!(loaded.last_check_epoch > 0);
    }

    #[test]
    fn failure_streak_counts_and_success_resets() {
        let mut state = UpdateState::default();
        state.record_failure("transport error");
        state.record_failure("transport error");
        assert_eq!(state.consecutive_failures, 2);
        assert_eq!(state.last_outcome, LastOutcome::Failed);
        assert!(state.last_failure_reason.is_some());

        state.record_success(LastOutcome::UpToDate, None);
        assert_eq!(state.consecutive_failures, 0);
        assert_eq!(state.last_failure_reason, None);
    }

    #[test]
    fn last_check_formats_for_display() {
        let mut state = UpdateState::default();
        assert_eq!(state.format_last_check(), "never");
        state.record_success(LastOutcome::UpToDate, None);
        assert!(state.format_last_check().contains('T'));
    }

    #[test]
    fn corrupt_file_loads_default() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("state.json");
        fs::write(&path, "{ not json").unwrap();
        let state = UpdateState::load(&path);
        assert_eq!(state.last_outcome, LastOutcome::Pending);
    }
}
