// SPDX-License-Identifier: GPL-3.0-only

//! volmgr - removable-volume lifecycle controller daemon.
//!
//! Wires the Linux collaborators, builds the volume manager from the TOML
//! config and serves the command interface on the system bus. Controller
//! broadcasts are forwarded to a D-Bus signal by a background task.

use std::path::PathBuf;
use std::sync::Arc;

use anyhow::{Context, Result};
use clap::Parser;
use tokio::sync::{Mutex, broadcast};
use tracing::{info, warn};
use tracing_subscriber::{EnvFilter, fmt};
use zbus::connection::Builder as ConnectionBuilder;

use volmgr_service::broadcast::ChannelBroadcaster;
use volmgr_service::handlers::VolumeHandler;
use volmgr_service::{Collaborators, VolumeManager, config::ServiceConfig};

const SERVICE_NAME: &str = "org.volmgr.Service";
const SERVICE_PATH: &str = "/org/volmgr/Service";

#[derive(Debug, Parser)]
#[command(name = "volmgr-service", about = "Removable-volume lifecycle controller")]
struct Args {
    /// Path to the service configuration.
    #[arg(long, default_value = "/etc/volmgr/config.toml")]
    config: PathBuf,

    /// Log at debug level regardless of the environment filter.
    #[arg(long)]
    debug: bool,
}

#[tokio::main]
async fn main() -> Result<()> {
    let args = Args::parse();

    let default_filter = if args.debug {
        "volmgr=debug,info"
    } else {
        "volmgr=info,warn"
    };
    fmt()
        .with_env_filter(
            EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(default_filter)),
        )
        .with_writer(std::io::stderr)
        .init();

    info!("starting volmgr-service v{}", env!("CARGO_PKG_VERSION"));

    if unsafe { libc::geteuid() } != 0 {
        anyhow::bail!("volmgr-service must run as root");
    }

    let config = ServiceConfig::load(&args.config)?;
    prepare_directories(&config)?;

    let connection = ConnectionBuilder::system()?
        .name(SERVICE_NAME)?
        .build()
        .await
        .context("connecting to the system bus")?;

    let broadcaster = Arc::new(ChannelBroadcaster::new(64));
    let mut events = broadcaster.subscribe();

    let deps = Collaborators::build_linux(connection.clone(), &config.state_file, broadcaster)?;
    let mut manager = VolumeManager::from_config(config, deps);
    manager.start();
    let manager = Arc::new(Mutex::new(manager));

    connection
        .object_server()
        .at(SERVICE_PATH, VolumeHandler::new(manager))
        .await?;
    let iface = connection
        .object_server()
        .interface::<_, VolumeHandler>(SERVICE_PATH)
        .await?;

    tokio::spawn(async move {
        loop {
            match events.recv().await {
                Ok(event) => {
                    if let Err(err) = VolumeHandler::volume_event(
                        iface.signal_emitter(),
                        event.code.code(),
                        event.message,
                    )
                    .await
                    {
                        warn!(%err, "failed to emit volume event signal");
                    }
                }
                Err(broadcast::error::RecvError::Lagged(missed)) => {
                    warn!(missed, "dropped controller broadcasts");
                }
                Err(broadcast::error::RecvError::Closed) => break,
            }
        }
    });

    info!("service registered at {SERVICE_NAME} {SERVICE_PATH}");

    tokio::signal::ctrl_c().await?;
    info!("shutting down");
    Ok(())
}

fn prepare_directories(config: &ServiceConfig) -> Result<()> {
    for dir in [
        &config.layout.staging_dir,
        &config.layout.secure_bind_dir,
        &config.layout.device_dir,
        &config.layout.aux_mount_root,
    ] {
        std::fs::create_dir_all(dir).with_context(|| format!("creating {}", dir.display()))?;
    }
    for volume in &config.volumes {
        std::fs::create_dir_all(&volume.mount_point)
            .with_context(|| format!("creating {}", volume.mount_point.display()))?;
    }
    if let Some(parent) = config.state_file.parent() {
        std::fs::create_dir_all(parent).with_context(|| format!("creating {}", parent.display()))?;
    }
    Ok(())
}
