// SPDX-License-Identifier: GPL-3.0-only

//! Volume manager.
//!
//! Owns the configured volumes, the extra-partition pool and the
//! collaborator registry, and drives the state machines from one serialized
//! stream of operator commands and block events. The daemon keeps the
//! manager behind a single async mutex, so the operations themselves take no
//! internal locks beyond the pool's allocation guard.

use std::path::PathBuf;

use tracing::{info, warn};

use enumflags2::BitFlags;

use volmgr_contracts::{BlockEventOutcome, VolumeError};
use volmgr_types::{
    BlockEvent, BroadcastCode, StorageLayout, VolumeFlag, VolumeInfo, VolumeState,
};

use crate::collaborators::Collaborators;
use crate::config::ServiceConfig;
use crate::source::PartitionSource;
use crate::volume::pool::ExtraPartitionPool;
use crate::volume::{Volume, VolumeContext};

pub struct VolumeManager {
    deps: Collaborators,
    layout: StorageLayout,
    pool: ExtraPartitionPool,
    volumes: Vec<Volume>,
}

impl VolumeManager {
    pub fn from_config(config: ServiceConfig, deps: Collaborators) -> Self {
        let primary: Option<&PathBuf> = config.primary_mount_point.as_ref();

        let volumes = config
            .volumes
            .iter()
            .map(|entry| {
                let mut flags = BitFlags::empty();
                if entry.encryptable {
                    flags |= VolumeFlag::Encryptable;
                }
                if entry.nonremovable {
                    flags |= VolumeFlag::NonRemovable;
                }
                let source = PartitionSource::new(entry.sys_path.clone(), entry.partition);
                Volume::new(
                    entry.label.clone(),
                    entry.mount_point.clone(),
                    flags,
                    entry.partition,
                    primary == Some(&entry.mount_point),
                    entry.debug,
                    Box::new(source),
                )
            })
            .collect();

        Self {
            deps,
            layout: config.layout,
            pool: ExtraPartitionPool::new(),
            volumes,
        }
    }

    /// Move every volume out of its construction state.
    pub fn start(&mut self) {
        for volume in &mut self.volumes {
            volume.set_state(VolumeState::NoMedia, self.deps.broadcaster.as_ref());
        }
        info!(volumes = self.volumes.len(), "volume manager started");
    }

    pub fn list(&self) -> Vec<VolumeInfo> {
        self.volumes.iter().map(Volume::info).collect()
    }

    pub async fn mount_volume(&mut self, label: &str) -> Result<(), VolumeError> {
        let Self {
            deps,
            layout,
            pool,
            volumes,
        } = self;
        let ctx = VolumeContext {
            deps: &*deps,
            layout: &*layout,
            pool: &*pool,
        };
        let volume = find_volume(volumes, label)?;
        volume.mount_vol(&ctx).await
    }

    pub async fn unmount_volume(
        &mut self,
        label: &str,
        force: bool,
        revert: bool,
    ) -> Result<(), VolumeError> {
        let Self {
            deps,
            layout,
            pool,
            volumes,
        } = self;
        let ctx = VolumeContext {
            deps: &*deps,
            layout: &*layout,
            pool: &*pool,
        };
        let volume = find_volume(volumes, label)?;
        volume.unmount_vol(&ctx, force, revert).await
    }

    pub async fn format_volume(&mut self, label: &str) -> Result<(), VolumeError> {
        let Self {
            deps,
            layout,
            pool,
            volumes,
        } = self;
        let ctx = VolumeContext {
            deps: &*deps,
            layout: &*layout,
            pool: &*pool,
        };
        let volume = find_volume(volumes, label)?;
        volume.format_vol(&ctx).await
    }

    /// Route a block event to the volume whose device it names and react to
    /// what the event meant.
    pub async fn dispatch_block_event(&mut self, event: &BlockEvent) -> Result<(), VolumeError> {
        let Self {
            deps,
            layout,
            pool,
            volumes,
        } = self;
        let ctx = VolumeContext {
            deps: &*deps,
            layout: &*layout,
            pool: &*pool,
        };

        let volume = volumes
            .iter_mut()
            .find(|v| v.matches(&event.sys_path))
            .ok_or(VolumeError::UnsupportedEvent)?;

        match volume.handle_block_event(event)? {
            BlockEventOutcome::MediaInserted { ready } => {
                let message = format!(
                    "Volume {} {} disk inserted ({})",
                    volume.label(),
                    volume.mount_point().display(),
                    event.device
                );
                ctx.deps.broadcaster
                    .broadcast(BroadcastCode::VolumeDiskInserted, &message, false);

                if ready {
                    volume.set_state(VolumeState::Idle, ctx.deps.broadcaster.as_ref());
                    retry_latched_mount(volume, &ctx).await;
                } else {
                    volume.set_state(VolumeState::Pending, ctx.deps.broadcaster.as_ref());
                }
            }
            BlockEventOutcome::PartitionsReady => {
                volume.set_state(VolumeState::Idle, ctx.deps.broadcaster.as_ref());
                retry_latched_mount(volume, &ctx).await;
            }
            BlockEventOutcome::MediaRemoved => {
                let message = format!(
                    "Volume {} {} disk removed ({})",
                    volume.label(),
                    volume.mount_point().display(),
                    event.device
                );
                ctx.deps.broadcaster
                    .broadcast(BroadcastCode::VolumeDiskRemoved, &message, false);

                let released = ctx.pool.release_disk(ctx.deps, event.device.major).await;
                if released > 0 {
                    info!(released, "released extra partition slots");
                }

                if volume.state() == VolumeState::Mounted {
                    let message = format!(
                        "Volume {} {} bad removal ({})",
                        volume.label(),
                        volume.mount_point().display(),
                        event.device
                    );
                    ctx.deps.broadcaster
                        .broadcast(BroadcastCode::VolumeBadRemoval, &message, false);
                    if let Err(err) = volume.unmount_vol(&ctx, true, false).await {
                        warn!(%err, "forced unmount after bad removal failed");
                    }
                }
                volume.set_state(VolumeState::NoMedia, ctx.deps.broadcaster.as_ref());
            }
            BlockEventOutcome::Ignored => {}
        }
        Ok(())
    }
}

fn find_volume<'a>(volumes: &'a mut [Volume], label: &str) -> Result<&'a mut Volume, VolumeError> {
    volumes
        .iter_mut()
        .find(|v| v.label() == label)
        .ok_or_else(|| VolumeError::UnknownVolume(label.to_string()))
}

/// Re-attempt a mount that was requested while the volume was busy.
async fn retry_latched_mount(volume: &mut Volume, ctx: &VolumeContext<'_>) {
    if !volume.take_retry_pending() {
        return;
    }
    info!(volume = %volume.label(), "retrying deferred mount");
    if let Err(err) = volume.mount_vol(ctx).await {
        warn!(volume = %volume.label(), %err, "deferred mount failed");
    }
}
