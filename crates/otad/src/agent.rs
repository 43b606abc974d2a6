//! Outer update loop.
//!
//! Wait for connectivity, run one session to completion, persist the
//! outcome, sleep, repeat. The loop is the agent's only retry
//! mechanism and its single-session guarantee: a new check never
//! starts while a cycle is in flight.

use crate::platform::{Connectivity, Restart};
use crate::session::{CycleOutcome, UpdateSession};
use crate::transport::UpdateTransport;
use ota_common::{DeviceId, FirmwareWriter, LastOutcome, OtaConfig, UpdateState};
use std::path::PathBuf;
use std::time::Duration;
use tokio::time::sleep;
use tracing::{info, warn};

const CONNECTIVITY_POLL: Duration = Duration::from_secs(1);

pub struct OtaAgent {
    config: OtaConfig,
    device_id: DeviceId,
    transport: Box<dyn UpdateTransport>,
    writer: Box<dyn FirmwareWriter>,
    restart: Box<dyn Restart>,
    connectivity: Box<dyn Connectivity>,
    state: UpdateState,
    state_path: PathBuf,
}

impl OtaAgent {
    pub fn new(
        config: OtaConfig,
        device_id: DeviceId,
        transport: Box<dyn UpdateTransport>,
        writer: Box<dyn FirmwareWriter>,
        restart: Box<dyn Restart>,
        connectivity: Box<dyn Connectivity>,
    ) -> Self {
        let state_path = PathBuf::from(&config.state_path);
        let mut state = UpdateState::load(&state_path);
        state.current_version = config.current_version.clone();
        Self {
            config,
            device_id,
            transport,
            writer,
            restart,
            connectivity,
            state,
            state_path,
        }
    }

    /// Run forever. Every failure is absorbed into the persisted state
    /// and retried at the next interval; only a committed update ends
    /// the process, by restarting the device.
    pub async fn run(&mut self) {
        info!(
            "update loop started (device {}, current firmware {})",
            self.device_id, self.config.current_version
        );
        loop {
            self.wait_for_connectivity().await;
            self.run_cycle().await;
            sleep(self.config.check_interval()).await;
        }
    }

    /// One full check/update cycle, with the outcome recorded.
    pub async fn run_cycle(&mut self) {
        let mut session = UpdateSession::new(
            &self.config,
            &self.device_id,
            self.transport.as_ref(),
            self.writer.as_mut(),
            self.restart.as_ref(),
        );

        match session.run().await {
            Ok(CycleOutcome::UpToDate { latest }) => {
                self.state.record_success(LastOutcome::UpToDate, Some(latest));
            }
            Ok(CycleOutcome::DivergentBuild { latest }) => {
                self.state
                    .record_success(LastOutcome::DivergentBuild, Some(latest));
            }
            Ok(CycleOutcome::Updated { version }) => {
                info!("firmware updated to {}", version);
                self.state.record_success(LastOutcome::Updated, Some(version));
            }
            Err(e) => {
                warn!("update cycle failed: {}", e);
                self.state.record_failure(&e.to_string());
            }
        }

        if let Err(e) = self.state.save(&self.state_path) {
            warn!("failed to persist update state: {}", e);
        }
    }

    pub fn state(&self) -> &UpdateState {
        &self.state
    }

    async fn wait_for_connectivity(&self) {
        if self.connectivity.is_online() {
            return;
        }
        info!("waiting for connectivity on {}", self.config.interface);
        while !self.connectivity.is_online() {
            sleep(CONNECTIVITY_POLL).await;
        }
        info!("connectivity established");
    }
}
