// SPDX-License-Identifier: GPL-3.0-only

//! Volume entity and lifecycle state machine.
//!
//! A [`Volume`] is created once per configured mount point and lives for the
//! controller's lifetime, cycling between Idle and Mounted. All state
//! transitions go through [`Volume::set_state`], which broadcasts the change;
//! the three operations (`mount_vol`, `unmount_vol`, `format_vol`) never
//! leave a transient state (Checking, Formatting, Unmounting) visible after
//! they return.

pub mod pool;
pub mod securedir;

use std::path::{Path, PathBuf};
use std::time::Duration;

use enumflags2::BitFlags;
use tracing::{error, info, warn};

use volmgr_contracts::{
    BlockEventOutcome, Broadcaster, DeviceSource, FsCheck, KillLevel, MountError, MountOwner,
    VolumeError,
};
use volmgr_sys::retry;
use volmgr_types::{
    BlockEvent, BroadcastCode, DeviceId, StorageLayout, VolumeFlag, VolumeInfo, VolumeState, keys,
};

use crate::collaborators::Collaborators;
use pool::ExtraPartitionPool;

/// Time given to consumers of the mount to react to the Unmounting
/// transition before teardown begins.
const SETTLE_DELAY: Duration = Duration::from_secs(1);

/// Shared collaborators and policy handed to every volume operation.
///
/// The manager owns these; volumes never hold a back-reference to it.
pub struct VolumeContext<'a> {
    pub deps: &'a Collaborators,
    pub layout: &'a StorageLayout,
    pub pool: &'a ExtraPartitionPool,
}

/// Which teardown step failed, selecting the recovery to attempt.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum TeardownStage {
    /// Removing the root-only bind mount of the secure container directory.
    RemoveBind,
    /// Unmounting the obscuring tmpfs over the secure directory.
    RemoveObscure,
    /// Unmounting the public mount point itself.
    Unpublish,
}

pub struct Volume {
    label: String,
    mount_point: PathBuf,
    state: VolumeState,
    mounted_device: Option<DeviceId>,
    /// Partition to format; `None` means the whole device.
    partition_index: Option<u32>,
    /// A mount arrived while Pending and should be retried on idle.
    retry_pending: bool,
    debug: bool,
    /// Whether this volume is the default external storage.
    primary: bool,
    flags: BitFlags<VolumeFlag>,
    source: Box<dyn DeviceSource>,
}

impl Volume {
    pub fn new(
        label: impl Into<String>,
        mount_point: impl Into<PathBuf>,
        flags: BitFlags<VolumeFlag>,
        partition_index: Option<u32>,
        primary: bool,
        debug: bool,
        source: Box<dyn DeviceSource>,
    ) -> Self {
        Self {
            label: label.into(),
            mount_point: mount_point.into(),
            state: VolumeState::Init,
            mounted_device: None,
            partition_index,
            retry_pending: false,
            debug,
            primary,
            flags,
            source,
        }
    }

    pub fn label(&self) -> &str {
        &self.label
    }

    pub fn mount_point(&self) -> &Path {
        &self.mount_point
    }

    pub fn state(&self) -> VolumeState {
        self.state
    }

    pub fn mounted_device(&self) -> Option<DeviceId> {
        self.mounted_device
    }

    pub fn is_primary(&self) -> bool {
        self.primary
    }

    /// Consume the retry latch.
    pub fn take_retry_pending(&mut self) -> bool {
        std::mem::take(&mut self.retry_pending)
    }

    pub fn info(&self) -> VolumeInfo {
        VolumeInfo {
            label: self.label.clone(),
            mount_point: self.mount_point.clone(),
            state: self.state,
            mounted_device: self.mounted_device,
        }
    }

    /// Whether a block event at `sys_path` belongs to this volume.
    pub fn matches(&self, sys_path: &str) -> bool {
        self.source.matches(sys_path)
    }

    pub fn disk_device(&self) -> Option<DeviceId> {
        self.source.disk_device()
    }

    pub fn handle_block_event(
        &mut self,
        event: &BlockEvent,
    ) -> Result<BlockEventOutcome, VolumeError> {
        self.source.handle_block_event(event)
    }

    /// The only place `state` changes.
    ///
    /// A duplicate transition is a warned no-op with no notification. Leaving
    /// Pending for anything but Idle drops the retry latch, and entering
    /// NoMedia clears the mounted-device identity.
    pub fn set_state(&mut self, new: VolumeState, broadcaster: &dyn Broadcaster) {
        if new == self.state {
            warn!(volume = %self.label, state = %new, "duplicate state transition ignored");
            return;
        }
        if self.state == VolumeState::Pending && new != VolumeState::Idle {
            self.retry_pending = false;
        }
        let old = self.state;
        self.state = new;
        if new == VolumeState::NoMedia {
            self.mounted_device = None;
        }

        info!(volume = %self.label, from = %old, to = %new, "state changed");
        let message = format!(
            "Volume {} {} state changed from {} ({}) to {} ({})",
            self.label,
            self.mount_point.display(),
            old.code(),
            old,
            new.code(),
            new
        );
        broadcaster.broadcast(BroadcastCode::VolumeStateChange, &message, false);
    }

    /// Validate, check and mount the volume's media at its public mount
    /// point, trying each enumerated candidate node in order.
    pub async fn mount_vol(&mut self, ctx: &VolumeContext<'_>) -> Result<(), VolumeError> {
        let deps = ctx.deps;

        // Primary storage stays unavailable while the disk password prompt
        // is up or an in-place encryption pass is running.
        let crypto_blocked = self.primary
            && (deps.system.read(keys::DECRYPT) == "1"
                || !deps.system.read(keys::ENCRYPT_PROGRESS).is_empty());
        if self.state == VolumeState::NoMedia || crypto_blocked {
            let message = format!(
                "Volume {} {} mount failed - no media",
                self.label,
                self.mount_point.display()
            );
            deps.broadcaster
                .broadcast(BroadcastCode::VolumeMountFailedNoMedia, &message, false);
            return Err(VolumeError::NoMedia);
        }
        if self.state != VolumeState::Idle {
            if self.state == VolumeState::Pending {
                self.retry_pending = true;
            }
            return Err(VolumeError::Busy);
        }

        if deps.mount_table.is_path_mounted(&self.mount_point) {
            // Adopting a live mount needs a device identity to record;
            // with nothing enumerated we fall through to the no-device error.
            if let Some(&node) = self.source.device_nodes().first() {
                warn!(volume = %self.label, "volume is idle but appears to be mounted, fixing");
                self.mounted_device = Some(node);
                self.set_state(VolumeState::Mounted, deps.broadcaster.as_ref());
                return Ok(());
            }
        }

        let mut nodes = self.source.device_nodes();
        if nodes.is_empty() {
            error!(volume = %self.label, "no device nodes enumerated");
            return Err(VolumeError::NoSuitableDevice);
        }

        if self.needs_crypto_remap(ctx) {
            if nodes.len() != 1 {
                error!(
                    volume = %self.label,
                    nodes = nodes.len(),
                    "expected exactly one device node for encrypted volume"
                );
                return Err(VolumeError::AmbiguousEncryptedDevice(nodes.len()));
            }
            let mapping = deps.crypto.setup_mapping(&self.label, nodes[0]).await?;
            let node_path = ctx.layout.device_node_path(mapping.device);
            if let Err(err) = deps.nodes.create_node(&node_path, mapping.device).await {
                error!(%err, "failed to create device node {}", node_path.display());
            }
            self.source.update_device_info(mapping.device);

            nodes = self.source.device_nodes();
            if nodes.is_empty() {
                error!(volume = %self.label, "no device nodes after crypto remap");
                return Err(VolumeError::NoSuitableDevice);
            }
        }

        let owner = MountOwner {
            uid: ctx.layout.owner_uid,
            gid: if self.primary {
                ctx.layout.primary_gid
            } else {
                ctx.layout.secondary_gid
            },
            mode: ctx.layout.mount_mode,
        };

        for (index, node) in nodes.iter().copied().enumerate() {
            if node.is_whole_disk_alias() {
                continue;
            }
            let device_path = ctx.layout.device_node_path(node);
            if self.debug {
                info!(volume = %self.label, device = %node, "considering device for mounting");
            }

            self.set_state(VolumeState::Checking, deps.broadcaster.as_ref());

            match deps.fs.check(&device_path).await {
                Ok(FsCheck::Clean) => {}
                Ok(FsCheck::NoFilesystem) => {
                    warn!(device = %node, "no recognizable filesystem");
                    continue;
                }
                Err(err) => {
                    error!(device = %node, %err, "filesystem check failed");
                    continue;
                }
            }

            if let Err(err) = deps
                .fs
                .mount(&device_path, &ctx.layout.staging_dir, owner)
                .await
            {
                error!(device = %node, %err, "failed to mount at staging");
                continue;
            }

            self.defeat_autorun(ctx).await;

            if self.primary {
                if let Err(err) = securedir::prepare(deps, ctx.layout).await {
                    error!(%err, "failed to prepare secure container directory");
                    self.unmount_staging(ctx).await;
                    continue;
                }
            }

            if let Err(err) = retry::move_mount(
                deps.mounts.as_ref(),
                deps.procs.as_ref(),
                &ctx.layout.staging_dir,
                &self.mount_point,
                false,
            )
            .await
            {
                error!(%err, "failed to publish mount at {}", self.mount_point.display());
                self.unmount_staging(ctx).await;
                continue;
            }

            self.mounted_device = Some(node);
            self.set_state(VolumeState::Mounted, deps.broadcaster.as_ref());

            for extra in nodes.iter().copied().skip(index + 1) {
                if extra.is_whole_disk_alias() {
                    continue;
                }
                match ctx.pool.mount_extra(deps, ctx.layout, extra).await {
                    Ok(path) => {
                        info!(device = %extra, path = %path.display(), "mounted extra partition");
                    }
                    Err(err) => {
                        warn!(device = %extra, %err, "failed to mount extra partition");
                    }
                }
            }
            return Ok(());
        }

        error!(volume = %self.label, "found no suitable devices for mounting");
        self.set_state(VolumeState::Idle, deps.broadcaster.as_ref());
        Err(VolumeError::NoSuitableDevice)
    }

    fn needs_crypto_remap(&self, ctx: &VolumeContext<'_>) -> bool {
        self.primary
            && self
                .flags
                .contains(VolumeFlag::NonRemovable | VolumeFlag::Encryptable)
            && ctx.deps.system.read(keys::CRYPTO_STATE) == "encrypted"
            && !self.source.is_decrypted()
    }

    /// Tear down the mount in reverse setup order, rolling back to a
    /// consistent state when a step fails.
    pub async fn unmount_vol(
        &mut self,
        ctx: &VolumeContext<'_>,
        force: bool,
        revert: bool,
    ) -> Result<(), VolumeError> {
        if self.state != VolumeState::Mounted {
            return Err(VolumeError::NotMounted);
        }
        let deps = ctx.deps;

        self.set_state(VolumeState::Unmounting, deps.broadcaster.as_ref());
        tokio::time::sleep(SETTLE_DELAY).await;

        match self.teardown(ctx, force).await {
            Ok(()) => {
                info!(volume = %self.label, "{} unmounted", self.mount_point.display());
                if revert && self.source.is_decrypted() {
                    if let Err(err) = deps.crypto.revert_mapping(&self.label).await {
                        warn!(%err, "failed to revert crypto mapping for {}", self.label);
                    }
                    self.source.revert_device_info();
                    info!(volume = %self.label, "encrypted volume reverted");
                }
                self.mounted_device = None;
                self.set_state(VolumeState::Idle, deps.broadcaster.as_ref());
                Ok(())
            }
            Err((stage, cause)) => self.recover(ctx, stage, cause).await,
        }
    }

    async fn teardown(
        &mut self,
        ctx: &VolumeContext<'_>,
        force: bool,
    ) -> Result<(), (TeardownStage, MountError)> {
        let deps = ctx.deps;
        if self.primary {
            retry::unmount(
                deps.mounts.as_ref(),
                deps.procs.as_ref(),
                &ctx.layout.secure_bind_dir,
                force,
            )
            .await
            .map_err(|err| (TeardownStage::RemoveBind, err))?;

            let hidden = ctx.layout.container_dir_under(&self.mount_point);
            retry::unmount(deps.mounts.as_ref(), deps.procs.as_ref(), &hidden, force)
                .await
                .map_err(|err| (TeardownStage::RemoveObscure, err))?;
        }

        retry::unmount(
            deps.mounts.as_ref(),
            deps.procs.as_ref(),
            &self.mount_point,
            force,
        )
        .await
        .map_err(|err| (TeardownStage::Unpublish, err))
    }

    /// Restore the pre-teardown mounts for the stage that failed. Full
    /// restoration returns to Mounted and reports the teardown failure;
    /// anything less forces NoMedia, after which the storage is offline.
    async fn recover(
        &mut self,
        ctx: &VolumeContext<'_>,
        stage: TeardownStage,
        cause: MountError,
    ) -> Result<(), VolumeError> {
        let deps = ctx.deps;
        let hidden = ctx.layout.container_dir_under(&self.mount_point);
        let failed_path = match stage {
            TeardownStage::RemoveBind => ctx.layout.secure_bind_dir.clone(),
            TeardownStage::RemoveObscure => hidden.clone(),
            TeardownStage::Unpublish => self.mount_point.clone(),
        };
        error!(
            volume = %self.label,
            path = %failed_path.display(),
            %cause,
            ?stage,
            "teardown failed, attempting rollback"
        );

        let restored = match stage {
            TeardownStage::RemoveBind => false,
            TeardownStage::RemoveObscure => self.restore_obscure(deps, &hidden).await,
            TeardownStage::Unpublish => {
                if self.primary {
                    self.restore_bind(ctx, &hidden).await && self.restore_obscure(deps, &hidden).await
                } else {
                    true
                }
            }
        };

        if restored {
            self.set_state(VolumeState::Mounted, deps.broadcaster.as_ref());
            Err(VolumeError::Unmount {
                path: failed_path,
                source: cause,
            })
        } else {
            error!(volume = %self.label, "rollback failed, storage will appear offline");
            self.set_state(VolumeState::NoMedia, deps.broadcaster.as_ref());
            Err(VolumeError::Offline)
        }
    }

    async fn restore_bind(&self, ctx: &VolumeContext<'_>, hidden: &Path) -> bool {
        match ctx
            .deps
            .mounts
            .bind_mount(hidden, &ctx.layout.secure_bind_dir)
            .await
        {
            Ok(()) => true,
            Err(err) => {
                error!(%err, "failed to restore bind mount at {}", ctx.layout.secure_bind_dir.display());
                false
            }
        }
    }

    async fn restore_obscure(&self, deps: &Collaborators, hidden: &Path) -> bool {
        match deps.mounts.obscure_tmpfs(hidden).await {
            Ok(()) => true,
            Err(err) => {
                error!(%err, "failed to restore obscuring tmpfs at {}", hidden.display());
                false
            }
        }
    }

    /// Rewrite the volume's filesystem. Formatting the whole device first
    /// lays down a fresh single-partition table on the base disk. Always
    /// ends back in Idle.
    pub async fn format_vol(&mut self, ctx: &VolumeContext<'_>) -> Result<(), VolumeError> {
        let deps = ctx.deps;

        if self.state == VolumeState::NoMedia {
            return Err(VolumeError::NoMedia);
        }
        if self.state != VolumeState::Idle {
            return Err(VolumeError::Busy);
        }
        if deps.mount_table.is_path_mounted(&self.mount_point) {
            if let Some(&node) = self.source.device_nodes().first() {
                warn!(volume = %self.label, "volume is idle but appears to be mounted, fixing");
                self.mounted_device = Some(node);
                self.set_state(VolumeState::Mounted, deps.broadcaster.as_ref());
            }
            return Err(VolumeError::Busy);
        }

        let disk = self.source.disk_device().ok_or(VolumeError::NoMedia)?;

        self.set_state(VolumeState::Formatting, deps.broadcaster.as_ref());
        let result = self.do_format(ctx, disk).await;
        self.set_state(VolumeState::Idle, deps.broadcaster.as_ref());
        result
    }

    async fn do_format(
        &self,
        ctx: &VolumeContext<'_>,
        disk: DeviceId,
    ) -> Result<(), VolumeError> {
        let deps = ctx.deps;
        let whole_device = self.partition_index.is_none();

        if whole_device {
            let disk_path = ctx.layout.device_node_path(disk);
            deps.partitions.write_partition_table(&disk_path).await?;
        }

        let part = DeviceId::new(disk.major, self.partition_index.unwrap_or(1));
        let part_path = ctx.layout.device_node_path(part);
        if self.debug {
            info!(volume = %self.label, device = %part_path.display(), "formatting");
        }
        deps.fs.format(&part_path).await
    }

    /// Neutralize an autorun marker on freshly mounted media: normalize its
    /// name, kill anything holding it open and delete it.
    async fn defeat_autorun(&self, ctx: &VolumeContext<'_>) {
        let staging = &ctx.layout.staging_dir;
        let mut entries = match tokio::fs::read_dir(staging).await {
            Ok(entries) => entries,
            Err(err) => {
                warn!(%err, "failed to scan staging at {}", staging.display());
                return;
            }
        };

        loop {
            let entry = match entries.next_entry().await {
                Ok(Some(entry)) => entry,
                Ok(None) => break,
                Err(err) => {
                    warn!(%err, "failed to scan staging at {}", staging.display());
                    break;
                }
            };
            let name = entry.file_name();
            if !name.to_string_lossy().eq_ignore_ascii_case("autorun.inf") {
                continue;
            }

            warn!(volume = %self.label, "media carries an autorun marker, removing");
            let target = staging.join("autorun.inf");
            if entry.path() != target {
                if let Err(err) = tokio::fs::rename(entry.path(), &target).await {
                    error!(%err, "failed to rename {}", entry.path().display());
                    continue;
                }
            }
            if let Err(err) = ctx.deps.procs.kill_holders(&target, KillLevel::Kill).await {
                warn!(%err, "failed to kill holders of {}", target.display());
            }
            if let Err(err) = tokio::fs::remove_file(&target).await {
                error!(%err, "failed to remove {}", target.display());
            }
        }
    }

    async fn unmount_staging(&self, ctx: &VolumeContext<'_>) {
        if let Err(err) = ctx.deps.mounts.unmount(&ctx.layout.staging_dir).await {
            warn!(%err, "failed to unmount staging at {}", ctx.layout.staging_dir.display());
        }
    }
}
