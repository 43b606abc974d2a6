//! OTA update agent daemon.
//!
//! Polls the update server, downloads newer firmware into the staging
//! partition and restarts the device once an image is committed.

use anyhow::Result;
use clap::Parser;
use otad::agent::OtaAgent;
use otad::partition::FilePartitionWriter;
use otad::platform::{SysfsLink, SystemdRestart};
use otad::transport::HttpTransport;
use ota_common::{config, DeviceId, OtaConfig};
use std::path::PathBuf;
use tracing::info;
use tracing_subscriber::EnvFilter;

#[derive(Parser, Debug)]
#[command(name = "otad", version, about = "OTA firmware update agent")]
struct Args {
    /// Config file path
    #[arg(long, default_value = config::CONFIG_PATH)]
    config: PathBuf,

    /// Run a single check/update cycle and exit
    #[arg(long)]
    once: bool,
}

#[tokio::main]
async fn main() -> Result<()> {
    tracing_subscriber::fmt()
        .with_env_filter(
            EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info")),
        )
        .init();

    let args = Args::parse();
    let config = OtaConfig::load(&args.config)?;
    let device_id = DeviceId::detect()?;

    info!(
        "otad v{} starting (device {}, firmware {})",
        env!("CARGO_PKG_VERSION"),
        device_id,
        config.current_version
    );

    let transport = HttpTransport::new(&config);
    let writer =
        FilePartitionWriter::new(config.image_path.as_str(), config.image_capacity_bytes);
    let connectivity = SysfsLink::new(&config.interface);

    let mut agent = OtaAgent::new(
        config,
        device_id,
        Box::new(transport),
        Box::new(writer),
        Box::new(SystemdRestart),
        Box::new(connectivity),
    );

    if args.once {
        agent.run_cycle().await;
        info!(
            "single cycle complete at {}: {}",
            agent.state().format_last_check(),
            agent.state().last_outcome.as_str()
        );
        return Ok(());
    }

    agent.run().await;
    Ok(())
}
