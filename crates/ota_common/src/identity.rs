//! Device identity.
//!
//! A fixed-length textual chip id derived from the hardware MAC
//! address, computed once at startup and passed explicitly to whoever
//! needs it (the version-check URL template, log lines).

use anyhow::{bail, Context, Result};
use std::fmt;
use std::fs;
use std::path::Path;

/// 12 lowercase hex characters, the MAC with separators stripped.
pub const DEVICE_ID_LEN: usize = 12;

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct DeviceId(String);

impl DeviceId {
    /// Derive the device id from the first non-loopback interface that
    /// exposes a MAC under `/sys/class/net`.
    pub fn detect() -> Result<Self> {
        Self::detect_in(Path::new("/sys/class/net"))
    }

    /// As [`detect`](Self::detect), with the sysfs root injectable for
    /// tests.
    pub fn detect_in(net_dir: &Path) -> Result<Self> {
        let mut entries: Vec<_> = fs::read_dir(net_dir)
            .with_context(|| format!("failed to list {}", net_dir.display()))?
            .filter_map(|e| e.ok())
            .collect();
        // Deterministic pick across boots.
        entries.sort_by_key(|e| e.file_name());

        for entry in entries {
            if entry.file_name() == "lo" {
                continue;
            }
            let address = entry.path().join("address");
            if let Ok(mac) = fs::read_to_string(&address) {
                if let Ok(id) = Self::from_mac(mac.trim()) {
                    return Ok(id);
                }
            }
        }
        bail!("no interface with a usable MAC address found");
    }

    /// Build a device id from a textual MAC like `aa:bb:cc:dd:ee:ff`.
    pub fn from_mac(mac: &str) -> Result<Self> {
        let id: String = mac
            .chars()
            .filter(|c| *c != ':' && *c != '-')
            .map(|c| c.to_ascii_lowercase())
            .collect();
        if id.len() != DEVICE_ID_LEN || !id.chars().all(|c| c.is_ascii_hexdigit()) {
            bail!("not a usable MAC address: {:?}", mac);
        }
        if id.chars().all(|c| c == '0') {
            bail!("all-zero MAC address");
        }
        Ok(Self(id))
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl fmt::Display for DeviceId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn from_mac_strips_separators_and_lowercases() {
        let id = DeviceId::from_mac("AA:BB:CC:11:22:33").unwrap();
        assert_eq!(id.as_str(), "aabbcc112233");
        assert_eq!(id.as_str().len(), DEVICE_ID_LEN);

        let dashed = DeviceId::from_mac("aa-bb-cc-11-22-33").unwrap();
        assert_eq!(dashed, id);
    }

    #[test]
    fn bad_macs_rejected() {
        assert!(DeviceId::from_mac("").is_err());
        assert!(DeviceId::from_mac("aa:bb:cc").is_err());
        assert!(DeviceId::from_mac("00:00:00:00:00:00").is_err());
        assert!(DeviceId::from_mac("zz:bb:cc:11:22:33").is_err());
    }

    #[test]
    fn detect_skips_loopback_and_picks_first_usable() {
        let dir = tempfile::tempdir().unwrap();
        for (iface, mac) in [
            ("lo", "00:00:00:00:00:00"),
            ("eth0", "de:ad:be:ef:00:01\n"),
            ("wlan0", "de:ad:be:ef:00:02\n"),
        ] {
            let iface_dir = dir.path().join(iface);
            fs::create_dir_all(&iface_dir).unwrap();
            fs::write(iface_dir.join("address"), mac).unwrap();
        }

        let id = DeviceId::detect_in(dir.path()).unwrap();
        assert_eq!(id.as_str(), "deadbeef0001");
    }

    #[test]
    fn detect_fails_with_no_usable_interface() {
        let dir = tempfile::tempdir().unwrap();
        let lo = dir.path().join("lo");
        fs::create_dir_all(&lo).unwrap();
        fs::write(lo.join("address"), "00:00:00:00:00:00").unwrap();
        assert!(DeviceId::detect_in(dir.path()).is_err());
    }
}
