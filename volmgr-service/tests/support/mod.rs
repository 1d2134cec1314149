// SPDX-License-Identifier: GPL-3.0-only

//! Mock collaborators for driving the controller without a kernel.

#![allow(dead_code)]

use std::collections::{HashMap, HashSet};
use std::path::{Path, PathBuf};
use std::sync::{Arc, Mutex};

use async_trait::async_trait;
use enumflags2::BitFlags;

use volmgr_contracts::{
    Broadcaster, CryptoMapper, CryptoMapping, DeviceNodeOps, FilesystemOps, FsCheck, KillLevel,
    MountError, MountOps, MountOwner, MountTable, PartitionOps, ProcessOps, SystemState,
    VolumeError,
};
use volmgr_service::source::PartitionSource;
use volmgr_service::volume::pool::ExtraPartitionPool;
use volmgr_service::{Collaborators, Volume};
use volmgr_types::{
    BlockAction, BlockDeviceKind, BlockEvent, BroadcastCode, DeviceId, StorageLayout, VolumeFlag,
};

#[derive(Default)]
pub struct MockFs {
    /// Per-device check outcome; unlisted devices check clean.
    pub check_results: Mutex<HashMap<PathBuf, FsCheck>>,
    pub fail_mount: Mutex<HashSet<PathBuf>>,
    pub check_calls: Mutex<Vec<PathBuf>>,
    pub mount_calls: Mutex<Vec<(PathBuf, PathBuf)>>,
    pub format_calls: Mutex<Vec<PathBuf>>,
}

impl MockFs {
    pub fn set_check(&self, device: &Path, result: FsCheck) {
        self.check_results
            .lock()
            .unwrap()
            .insert(device.to_path_buf(), result);
    }
}

#[async_trait]
impl FilesystemOps for MockFs {
    async fn check(&self, device: &Path) -> Result<FsCheck, VolumeError> {
        self.check_calls.lock().unwrap().push(device.to_path_buf());
        Ok(self
            .check_results
            .lock()
            .unwrap()
            .get(device)
            .copied()
            .unwrap_or(FsCheck::Clean))
    }

    async fn mount(
        &self,
        device: &Path,
        target: &Path,
        _owner: MountOwner,
    ) -> Result<(), VolumeError> {
        self.mount_calls
            .lock()
            .unwrap()
            .push((device.to_path_buf(), target.to_path_buf()));
        if self.fail_mount.lock().unwrap().contains(device) {
            return Err(VolumeError::Mount(MountError::Other("mock mount".into())));
        }
        Ok(())
    }

    async fn format(&self, device: &Path) -> Result<(), VolumeError> {
        self.format_calls.lock().unwrap().push(device.to_path_buf());
        Ok(())
    }
}

#[derive(Default)]
pub struct MockMounts {
    /// Scripted move outcomes, consumed front to back; empty means success.
    pub move_script: Mutex<Vec<Result<(), MountError>>>,
    /// Paths whose unmount always fails with the given error.
    pub unmount_errors: Mutex<HashMap<PathBuf, MountError>>,
    pub fail_bind: Mutex<bool>,
    pub fail_obscure: Mutex<bool>,
    pub move_calls: Mutex<Vec<(PathBuf, PathBuf)>>,
    pub unmount_calls: Mutex<Vec<PathBuf>>,
    pub bind_calls: Mutex<Vec<(PathBuf, PathBuf)>>,
    pub obscure_calls: Mutex<Vec<PathBuf>>,
}

impl MockMounts {
    pub fn fail_unmount(&self, path: &Path, err: MountError) {
        self.unmount_errors
            .lock()
            .unwrap()
            .insert(path.to_path_buf(), err);
    }

    pub fn unmounts_of(&self, path: &Path) -> usize {
        self.unmount_calls
            .lock()
            .unwrap()
            .iter()
            .filter(|p| p.as_path() == path)
            .count()
    }
}

#[async_trait]
impl MountOps for MockMounts {
    async fn move_mount(&self, src: &Path, dst: &Path) -> Result<(), MountError> {
        self.move_calls
            .lock()
            .unwrap()
            .push((src.to_path_buf(), dst.to_path_buf()));
        let mut script = self.move_script.lock().unwrap();
        if script.is_empty() {
            Ok(())
        } else {
            script.remove(0)
        }
    }

    async fn unmount(&self, path: &Path) -> Result<(), MountError> {
        self.unmount_calls.lock().unwrap().push(path.to_path_buf());
        match self.unmount_errors.lock().unwrap().get(path) {
            Some(err) => Err(err.clone()),
            None => Ok(()),
        }
    }

    async fn bind_mount(&self, src: &Path, dst: &Path) -> Result<(), MountError> {
        self.bind_calls
            .lock()
            .unwrap()
            .push((src.to_path_buf(), dst.to_path_buf()));
        if *self.fail_bind.lock().unwrap() {
            return Err(MountError::Other("mock bind".into()));
        }
        Ok(())
    }

    async fn obscure_tmpfs(&self, path: &Path) -> Result<(), MountError> {
        self.obscure_calls.lock().unwrap().push(path.to_path_buf());
        if *self.fail_obscure.lock().unwrap() {
            return Err(MountError::Other("mock tmpfs".into()));
        }
        Ok(())
    }
}

#[derive(Default)]
pub struct MockProcs {
    pub calls: Mutex<Vec<(PathBuf, KillLevel)>>,
}

impl MockProcs {
    /// Signals actually delivered, in order.
    pub fn signals(&self) -> Vec<KillLevel> {
        self.calls
            .lock()
            .unwrap()
            .iter()
            .map(|(_, level)| *level)
            .filter(|level| *level != KillLevel::None)
            .collect()
    }
}

#[async_trait]
impl ProcessOps for MockProcs {
    async fn kill_holders(&self, path: &Path, level: KillLevel) -> Result<usize, VolumeError> {
        self.calls.lock().unwrap().push((path.to_path_buf(), level));
        Ok(0)
    }
}

pub struct MockCrypto {
    pub mapped: DeviceId,
    pub setup_calls: Mutex<Vec<(String, DeviceId)>>,
    pub revert_calls: Mutex<Vec<String>>,
}

impl Default for MockCrypto {
    fn default() -> Self {
        Self {
            mapped: DeviceId::new(254, 0),
            setup_calls: Mutex::new(Vec::new()),
            revert_calls: Mutex::new(Vec::new()),
        }
    }
}

#[async_trait]
impl CryptoMapper for MockCrypto {
    async fn setup_mapping(
        &self,
        label: &str,
        raw: DeviceId,
    ) -> Result<CryptoMapping, VolumeError> {
        self.setup_calls
            .lock()
            .unwrap()
            .push((label.to_string(), raw));
        Ok(CryptoMapping {
            device: self.mapped,
            sys_path: PathBuf::from("/devices/virtual/block/dm-0"),
        })
    }

    async fn revert_mapping(&self, label: &str) -> Result<(), VolumeError> {
        self.revert_calls.lock().unwrap().push(label.to_string());
        Ok(())
    }
}

#[derive(Default)]
pub struct MockNodes {
    pub calls: Mutex<Vec<(PathBuf, DeviceId)>>,
}

#[async_trait]
impl DeviceNodeOps for MockNodes {
    async fn create_node(&self, path: &Path, device: DeviceId) -> Result<(), VolumeError> {
        self.calls
            .lock()
            .unwrap()
            .push((path.to_path_buf(), device));
        Ok(())
    }
}

#[derive(Default)]
pub struct MockPartitions {
    pub calls: Mutex<Vec<PathBuf>>,
}

#[async_trait]
impl PartitionOps for MockPartitions {
    async fn write_partition_table(&self, device: &Path) -> Result<(), VolumeError> {
        self.calls.lock().unwrap().push(device.to_path_buf());
        Ok(())
    }
}

#[derive(Default)]
pub struct MockSystem {
    pub values: Mutex<HashMap<String, String>>,
}

impl MockSystem {
    pub fn set(&self, key: &str, value: &str) {
        self.values
            .lock()
            .unwrap()
            .insert(key.to_string(), value.to_string());
    }
}

impl SystemState for MockSystem {
    fn read(&self, key: &str) -> String {
        self.values
            .lock()
            .unwrap()
            .get(key)
            .cloned()
            .unwrap_or_default()
    }
}

#[derive(Default)]
pub struct MockMountTable {
    pub mounted: Mutex<HashSet<PathBuf>>,
}

impl MockMountTable {
    pub fn set_mounted(&self, path: &Path) {
        self.mounted.lock().unwrap().insert(path.to_path_buf());
    }
}

impl MountTable for MockMountTable {
    fn is_path_mounted(&self, path: &Path) -> bool {
        self.mounted.lock().unwrap().contains(path)
    }
}

#[derive(Default)]
pub struct CountingBroadcaster {
    pub events: Mutex<Vec<(BroadcastCode, String, bool)>>,
}

impl CountingBroadcaster {
    pub fn count(&self) -> usize {
        self.events.lock().unwrap().len()
    }

    pub fn count_code(&self, code: BroadcastCode) -> usize {
        self.events
            .lock()
            .unwrap()
            .iter()
            .filter(|(c, _, _)| *c == code)
            .count()
    }
}

impl Broadcaster for CountingBroadcaster {
    fn broadcast(&self, code: BroadcastCode, message: &str, sticky: bool) {
        self.events
            .lock()
            .unwrap()
            .push((code, message.to_string(), sticky));
    }
}

/// One full mock collaborator set plus the policy the context needs.
pub struct TestEnv {
    pub fs: Arc<MockFs>,
    pub mounts: Arc<MockMounts>,
    pub procs: Arc<MockProcs>,
    pub crypto: Arc<MockCrypto>,
    pub nodes: Arc<MockNodes>,
    pub partitions: Arc<MockPartitions>,
    pub system: Arc<MockSystem>,
    pub mount_table: Arc<MockMountTable>,
    pub broadcaster: Arc<CountingBroadcaster>,
    pub layout: StorageLayout,
    pub pool: ExtraPartitionPool,
}

impl TestEnv {
    pub fn new() -> Self {
        Self::with_layout(StorageLayout::default())
    }

    pub fn with_layout(layout: StorageLayout) -> Self {
        Self {
            fs: Arc::new(MockFs::default()),
            mounts: Arc::new(MockMounts::default()),
            procs: Arc::new(MockProcs::default()),
            crypto: Arc::new(MockCrypto::default()),
            nodes: Arc::new(MockNodes::default()),
            partitions: Arc::new(MockPartitions::default()),
            system: Arc::new(MockSystem::default()),
            mount_table: Arc::new(MockMountTable::default()),
            broadcaster: Arc::new(CountingBroadcaster::default()),
            layout,
            pool: ExtraPartitionPool::new(),
        }
    }

    pub fn deps(&self) -> Collaborators {
        Collaborators {
            fs: self.fs.clone(),
            mounts: self.mounts.clone(),
            nodes: self.nodes.clone(),
            procs: self.procs.clone(),
            crypto: self.crypto.clone(),
            partitions: self.partitions.clone(),
            system: self.system.clone(),
            mount_table: self.mount_table.clone(),
            broadcaster: self.broadcaster.clone(),
        }
    }
}

pub fn sys_prefix(label: &str) -> String {
    format!("/devices/test/{label}")
}

pub fn test_volume(
    label: &str,
    mount_point: &str,
    primary: bool,
    flags: BitFlags<VolumeFlag>,
    partition: Option<u32>,
) -> Volume {
    let source = PartitionSource::new(sys_prefix(label), partition);
    Volume::new(
        label,
        mount_point,
        flags,
        partition,
        primary,
        false,
        Box::new(source),
    )
}

pub fn disk_added(label: &str, device: DeviceId, partitions: u32) -> BlockEvent {
    BlockEvent {
        action: BlockAction::Add,
        kind: BlockDeviceKind::Disk,
        sys_path: sys_prefix(label),
        device,
        partition_index: None,
        partition_count: Some(partitions),
    }
}

pub fn partition_added(label: &str, device: DeviceId, index: u32) -> BlockEvent {
    BlockEvent {
        action: BlockAction::Add,
        kind: BlockDeviceKind::Partition,
        sys_path: format!("{}/part", sys_prefix(label)),
        device,
        partition_index: Some(index),
        partition_count: None,
    }
}

pub fn disk_removed(label: &str, device: DeviceId) -> BlockEvent {
    BlockEvent {
        action: BlockAction::Remove,
        kind: BlockDeviceKind::Disk,
        sys_path: sys_prefix(label),
        device,
        partition_index: None,
        partition_count: None,
    }
}

/// Attach media to a volume and park it in Idle, without polluting the
/// environment's broadcast counters.
pub fn attach_media(volume: &mut Volume, disk: DeviceId, partitions: &[(u32, DeviceId)]) {
    let setup = CountingBroadcaster::default();
    let label = volume.label().to_string();

    volume
        .handle_block_event(&disk_added(&label, disk, partitions.len() as u32))
        .expect("disk event");
    for (index, device) in partitions {
        volume
            .handle_block_event(&partition_added(&label, *device, *index))
            .expect("partition event");
    }
    volume.set_state(volmgr_types::VolumeState::Idle, &setup);
}
