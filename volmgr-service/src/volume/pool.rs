// SPDX-License-Identifier: GPL-3.0-only

//! Fixed-capacity pool of auxiliary-volume slots.
//!
//! When a base volume mounts, later partitions enumerated on the same disk
//! are opportunistically mounted into free slots here. One mutex guards the
//! whole table; slots are claimed first-free, and only after the check and
//! mount both succeeded. A failed attempt leaves the slot free and is not
//! retried.

use std::path::PathBuf;

use tokio::sync::Mutex;
use tracing::{info, warn};

use volmgr_contracts::{FsCheck, MountOwner, VolumeError};
use volmgr_sys::retry;
use volmgr_types::{BroadcastCode, DeviceId, StorageLayout, VolumeState};

use crate::collaborators::Collaborators;

pub const EXTRA_PARTITION_SLOTS: usize = 8;

#[derive(Debug, Clone)]
struct Slot {
    device: DeviceId,
    mount_path: PathBuf,
}

#[derive(Default)]
pub struct ExtraPartitionPool {
    slots: Mutex<[Option<Slot>; EXTRA_PARTITION_SLOTS]>,
}

impl ExtraPartitionPool {
    pub fn new() -> Self {
        Self::default()
    }

    /// Check and mount `device` into the first free slot.
    ///
    /// The slot is claimed only once the mount succeeded; any failure leaves
    /// the table untouched.
    pub async fn mount_extra(
        &self,
        deps: &Collaborators,
        layout: &StorageLayout,
        device: DeviceId,
    ) -> Result<PathBuf, VolumeError> {
        let mut slots = self.slots.lock().await;
        let index = slots
            .iter()
            .position(Option::is_none)
            .ok_or(VolumeError::PoolExhausted)?;

        let label = format!("aux{index}");
        let mount_path = layout.aux_mount_path(index);
        let device_path = layout.device_node_path(device);

        broadcast_aux_state(deps, &label, &mount_path, VolumeState::Idle, VolumeState::Checking);

        match deps.fs.check(&device_path).await {
            Ok(FsCheck::Clean) => {}
            Ok(FsCheck::NoFilesystem) => {
                broadcast_aux_state(deps, &label, &mount_path, VolumeState::Checking, VolumeState::Idle);
                return Err(VolumeError::NoSuitableDevice);
            }
            Err(err) => {
                broadcast_aux_state(deps, &label, &mount_path, VolumeState::Checking, VolumeState::Idle);
                return Err(err);
            }
        }

        tokio::fs::create_dir_all(&mount_path).await?;

        let owner = MountOwner {
            uid: layout.owner_uid,
            gid: layout.secondary_gid,
            mode: layout.mount_mode,
        };
        if let Err(err) = deps.fs.mount(&device_path, &mount_path, owner).await {
            broadcast_aux_state(deps, &label, &mount_path, VolumeState::Checking, VolumeState::Idle);
            return Err(err);
        }

        slots[index] = Some(Slot {
            device,
            mount_path: mount_path.clone(),
        });
        broadcast_aux_state(deps, &label, &mount_path, VolumeState::Checking, VolumeState::Mounted);
        info!(device = %device, slot = index, path = %mount_path.display(), "extra partition mounted");

        Ok(mount_path)
    }

    /// Force-unmount and free every slot backed by the disk with `major`.
    /// Used when the media disappears under the pool. Returns the number of
    /// slots released.
    pub async fn release_disk(&self, deps: &Collaborators, major: u32) -> usize {
        let mut slots = self.slots.lock().await;
        let mut released = 0;

        for slot in slots.iter_mut() {
            let Some(data) = slot else { continue };
            if data.device.major != major {
                continue;
            }
            if let Err(err) = retry::unmount(
                deps.mounts.as_ref(),
                deps.procs.as_ref(),
                &data.mount_path,
                true,
            )
            .await
            {
                warn!(%err, "failed to unmount extra partition at {}", data.mount_path.display());
            }
            *slot = None;
            released += 1;
        }
        released
    }

    /// Number of claimed slots.
    pub async fn active(&self) -> usize {
        self.slots.lock().await.iter().filter(|s| s.is_some()).count()
    }
}

fn broadcast_aux_state(
    deps: &Collaborators,
    label: &str,
    mount_path: &std::path::Path,
    old: VolumeState,
    new: VolumeState,
) {
    let message = format!(
        "Volume {} {} state changed from {} ({}) to {} ({})",
        label,
        mount_path.display(),
        old.code(),
        old,
        new.code(),
        new
    );
    deps.broadcaster
        .broadcast(BroadcastCode::VolumeStateChange, &message, false);
}
