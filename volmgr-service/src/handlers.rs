// SPDX-License-Identifier: GPL-3.0-only

//! D-Bus command interface.
//!
//! One interface carries the operator commands (mount/unmount/format/list),
//! the entry point through which the external hot-plug layer feeds block
//! events, and the signal onto which the daemon forwards controller
//! broadcasts.

use std::sync::Arc;

use tokio::sync::Mutex;
use tracing::info;
use zbus::object_server::SignalEmitter;
use zbus::{fdo, interface};

use volmgr_types::BlockEvent;

use crate::error::ServiceError;
use crate::manager::VolumeManager;

pub struct VolumeHandler {
    manager: Arc<Mutex<VolumeManager>>,
}

impl VolumeHandler {
    pub fn new(manager: Arc<Mutex<VolumeManager>>) -> Self {
        Self { manager }
    }
}

#[interface(name = "org.volmgr.Service1")]
impl VolumeHandler {
    /// List managed volumes as a JSON array of volume snapshots.
    async fn list(&self) -> fdo::Result<String> {
        let manager = self.manager.lock().await;
        serde_json::to_string(&manager.list())
            .map_err(|e| ServiceError::InvalidArgument(e.to_string()).into())
    }

    async fn mount(&self, label: &str) -> fdo::Result<()> {
        info!(label, "mount requested");
        let mut manager = self.manager.lock().await;
        manager
            .mount_volume(label)
            .await
            .map_err(|e| ServiceError::from(e).into())
    }

    async fn unmount(&self, label: &str, force: bool, revert: bool) -> fdo::Result<()> {
        info!(label, force, revert, "unmount requested");
        let mut manager = self.manager.lock().await;
        manager
            .unmount_volume(label, force, revert)
            .await
            .map_err(|e| ServiceError::from(e).into())
    }

    async fn format(&self, label: &str) -> fdo::Result<()> {
        info!(label, "format requested");
        let mut manager = self.manager.lock().await;
        manager
            .format_volume(label)
            .await
            .map_err(|e| ServiceError::from(e).into())
    }

    /// Feed one block event, encoded as JSON, from the hot-plug layer.
    async fn notify_block_event(&self, event: &str) -> fdo::Result<()> {
        let event: BlockEvent = serde_json::from_str(event)
            .map_err(|e| ServiceError::InvalidArgument(format!("bad block event: {e}")))?;
        let mut manager = self.manager.lock().await;
        manager
            .dispatch_block_event(&event)
            .await
            .map_err(|e| ServiceError::from(e).into())
    }

    /// Controller broadcast, forwarded from the internal channel.
    #[zbus(signal)]
    pub async fn volume_event(
        emitter: &SignalEmitter<'_>,
        code: u16,
        message: String,
    ) -> zbus::Result<()>;
}
