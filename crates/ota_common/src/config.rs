//! Agent configuration.
//!
//! Loaded from a TOML file (default `/etc/otad/config.toml`); a missing
//! file yields the compiled-in defaults so a bare device still polls.

use anyhow::{Context, Result};
use serde::{Deserialize, Serialize};
use std::fs;
use std::path::Path;
use std::time::Duration;
use tracing::debug;

/// Default config file location.
pub const CONFIG_PATH: &str = "/etc/otad/config.toml";

/// Agent configuration.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct OtaConfig {
    /// Base URL for version-check requests; the device id is appended
    /// as the final path segment.
    #[serde(default = "default_ota_base_url")]
    pub ota_base_url: String,

    /// Base URL for firmware downloads; project name and the target
    /// version string are appended as path segments.
    #[serde(default = "default_firmware_base_url")]
    pub firmware_base_url: String,

    /// Project name used in the firmware download path.
    #[serde(default = "default_project_name")]
    pub project_name: String,

    /// Seconds between update checks.
    #[serde(default = "default_check_interval_seconds")]
    pub check_interval_seconds: u64,

    /// Seconds to settle (flush logs, finish writes) between a
    /// successful commit and the restart.
    #[serde(default = "default_settle_delay_seconds")]
    pub settle_delay_seconds: u64,

    /// Per-request transport timeout.
    #[serde(default = "default_request_timeout_seconds")]
    pub request_timeout_seconds: u64,

    /// Longest version string accepted from the server.
    #[serde(default = "default_max_version_len")]
    pub max_version_len: usize,

    /// Longest URL the agent will build.
    #[serde(default = "default_max_url_len")]
    pub max_url_len: usize,

    /// Version of the running firmware. Defaults to the build's own
    /// package version; devices flashed from the release pipeline
    /// override this with the full `git describe` string.
    #[serde(default = "default_current_version")]
    pub current_version: String,

    /// Network interface whose link state gates the update loop.
    #[serde(default = "default_interface")]
    pub interface: String,

    /// Where the persisted update state lives.
    #[serde(default = "default_state_path")]
    pub state_path: String,

    /// Path the staged firmware image is written to.
    #[serde(default = "default_image_path")]
    pub image_path: String,

    /// Capacity of the update partition; larger images are rejected
    /// before any bytes are written.
    #[serde(default = "default_image_capacity_bytes")]
    pub image_capacity_bytes: u64,
}

fn default_ota_base_url() -> String {
    "https://ota.example.com/latest".to_string()
}

fn default_firmware_base_url() -> String {
    "https://ota.example.com/firmware".to_string()
}

fn default_project_name() -> String {
    "otad".to_string()
}

fn default_check_interval_seconds() -> u64 {
    3600 // 1 hour
}

fn default_settle_delay_seconds() -> u64 {
    5
}

fn default_request_timeout_seconds() -> u64 {
    30
}

fn default_max_version_len() -> usize {
    32
}

fn default_max_url_len() -> usize {
    256
}

fn default_current_version() -> String {
    format!("v{}", env!("CARGO_PKG_VERSION"))
}

fn default_interface() -> String {
    "wlan0".to_string()
}

fn default_state_path() -> String {
    "/var/lib/otad/state.json".to_string()
}

fn default_image_path() -> String {
    "/var/lib/otad/firmware.img".to_string()
}

fn default_image_capacity_bytes() -> u64 {
    16 * 1024 * 1024
}

impl Default for OtaConfig {
    fn default() -> Self {
        Self {
            ota_base_url: default_ota_base_url(),
            firmware_base_url: default_firmware_base_url(),
            project_name: default_project_name(),
            check_interval_seconds: default_check_interval_seconds(),
            settle_delay_seconds: default_settle_delay_seconds(),
            request_timeout_seconds: default_request_timeout_seconds(),
            max_version_len: default_max_version_len(),
            max_url_len: default_max_url_len(),
            current_version: default_current_version(),
            interface: default_interface(),
            state_path: default_state_path(),
            image_path: default_image_path(),
            image_capacity_bytes: default_image_capacity_bytes(),
        }
    }
}

impl OtaConfig {
    /// Load configuration from `path`, falling back to defaults when
    /// the file does not exist.
    pub fn load(path: &Path) -> Result<Self> {
        if !path.exists() {
            debug!("no config at {}, using defaults", path.display());
            return Ok(Self::default());
        }
        let content = fs::read_to_string(path)
            .with_context(|| format!("failed to read config {}", path.display()))?;
        toml::from_str(&content)
            .with_context(|| format!("failed to parse config {}", path.display()))
    }

    pub fn check_interval(&self) -> Duration {
        Duration::from_secs(self.check_interval_seconds)
    }

    pub fn settle_delay(&self) -> Duration {
        Duration::from_secs(self.settle_delay_seconds)
    }

    pub fn request_timeout(&self) -> Duration {
        Duration::from_secs(self.request_timeout_seconds)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn defaults_are_sane() {
        let c = OtaConfig::default();
        assert_eq!(c.check_interval_seconds, 3600);
        assert_eq!(c.max_version_len, 32);
        assert_eq!(c.max_url_len, 256);
        assert!(c.current_version.starts_with('v'));
    }

    #[test]
    fn missing_file_yields_defaults() {
        let dir = tempfile::tempdir().unwrap();
        let c = OtaConfig::load(&dir.path().join("nope.toml")).unwrap();
        assert_eq!(c.project_name, "otad");
    }

    #[test]
    fn partial_toml_fills_in_defaults() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("config.toml");
        fs::write(
            &path,
            r#"
ota_base_url = "https://updates.local/check"
project_name = "sensor-node"
check_interval_seconds = 120
current_version = "v1.4.0-7-deadbee"
"#,
        )
        .unwrap();

        let c = OtaConfig::load(&path).unwrap();
        assert_eq!(c.ota_base_url, "https://updates.local/check");
        assert_eq!(c.project_name, "sensor-node");
        assert_eq!(c.check_interval_seconds, 120);
        assert_eq!(c.current_version, "v1.4.0-7-deadbee");
        // Unspecified fields keep their defaults.
        assert_eq!(c.settle_delay_seconds, 5);
        assert_eq!(c.interface, "wlan0");
    }

    #[test]
    fn bad_toml_is_an_error() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("config.toml");
        fs::write(&path, "not = [valid").unwrap();
        assert!(OtaConfig::load(&path).is_err());
    }
}
