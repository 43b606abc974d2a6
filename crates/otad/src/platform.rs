//! Device platform collaborators: restart and connectivity.

use std::io;
use std::path::PathBuf;
use std::process::Command;
use tracing::info;

/// The one "restart the device now" capability. Invoked exactly once
/// per successful commit, never otherwise.
pub trait Restart: Send + Sync {
    fn request_restart(&self) -> io::Result<()>;
}

/// Restarts via systemd. On an embedded image `systemctl reboot` is the
/// sanctioned path into the new firmware.
pub struct SystemdRestart;

impl Restart for SystemdRestart {
    fn request_restart(&self) -> io::Result<()> {
        info!("requesting device restart");
        let status = Command::new("systemctl").arg("reboot").status()?;
        if !status.success() {
            return Err(io::Error::new(
                io::ErrorKind::Other,
                format!("systemctl reboot exited with {}", status),
            ));
        }
        Ok(())
    }
}

/// Link-state gate for the outer loop. The loop polls this; it never
/// establishes connectivity itself.
pub trait Connectivity: Send + Sync {
    fn is_online(&self) -> bool;
}

/// Reads the interface operstate from sysfs.
pub struct SysfsLink {
    operstate: PathBuf,
}

impl SysfsLink {
    pub fn new(interface: &str) -> Self {
        Self {
            operstate: PathBuf::from(format!("/sys/class/net/{}/operstate", interface)),
        }
    }
}

impl Connectivity for SysfsLink {
    fn is_online(&self) -> bool {
        std::fs::read_to_string(&self.operstate)
            .map(|s| s.trim() == "up")
            .unwrap_or(false)
    }
}
