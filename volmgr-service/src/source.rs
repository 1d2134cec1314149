// SPDX-License-Identifier: GPL-3.0-only

//! Partition-backed device source.
//!
//! Interprets block events for one physical disk identified by a sysfs path
//! prefix: tracks the base disk node and its partitions, holds the volume in
//! Pending until every announced partition has arrived, and carries the
//! decrypted-remap identity swap for encryptable volumes.

use tracing::{debug, warn};

use volmgr_contracts::{BlockEventOutcome, DeviceSource, VolumeError};
use volmgr_types::{BlockAction, BlockDeviceKind, BlockEvent, DeviceId};

pub struct PartitionSource {
    sys_prefix: String,
    /// Partition to expose, when the volume is pinned to one; otherwise all
    /// discovered partitions are candidates, in discovery order.
    partition_index: Option<u32>,

    disk: Option<DeviceId>,
    partitions: Vec<(Option<u32>, DeviceId)>,
    /// Partitions still expected before the volume may leave Pending.
    awaiting: Option<u32>,

    /// Decrypted remapping, when active, and the identity saved for revert.
    mapped: Option<DeviceId>,
    saved: Option<SavedIdentity>,
}

struct SavedIdentity {
    disk: Option<DeviceId>,
    partitions: Vec<(Option<u32>, DeviceId)>,
}

impl PartitionSource {
    pub fn new(sys_prefix: impl Into<String>, partition_index: Option<u32>) -> Self {
        Self {
            sys_prefix: sys_prefix.into(),
            partition_index,
            disk: None,
            partitions: Vec::new(),
            awaiting: None,
            mapped: None,
            saved: None,
        }
    }

    fn handle_disk_added(&mut self, event: &BlockEvent) -> BlockEventOutcome {
        self.disk = Some(event.device);
        self.partitions.clear();
        self.mapped = None;
        self.saved = None;

        let announced = event.partition_count.unwrap_or(0);
        if announced == 0 {
            self.awaiting = None;
            BlockEventOutcome::MediaInserted { ready: true }
        } else {
            self.awaiting = Some(announced);
            BlockEventOutcome::MediaInserted { ready: false }
        }
    }

    fn handle_partition_added(&mut self, event: &BlockEvent) -> BlockEventOutcome {
        if self.partitions.iter().any(|(_, d)| *d == event.device) {
            debug!(device = %event.device, "duplicate partition event ignored");
            return BlockEventOutcome::Ignored;
        }
        self.partitions.push((event.partition_index, event.device));

        if let Some(expected) = self.awaiting {
            if self.partitions.len() as u32 >= expected {
                self.awaiting = None;
                return BlockEventOutcome::PartitionsReady;
            }
        }
        BlockEventOutcome::Ignored
    }
}

impl DeviceSource for PartitionSource {
    fn matches(&self, sys_path: &str) -> bool {
        sys_path.starts_with(&self.sys_prefix)
    }

    fn disk_device(&self) -> Option<DeviceId> {
        self.disk
    }

    fn device_nodes(&self) -> Vec<DeviceId> {
        if let Some(mapped) = self.mapped {
            return vec![mapped];
        }
        if let Some(wanted) = self.partition_index {
            return self
                .partitions
                .iter()
                .filter(|(index, _)| *index == Some(wanted))
                .map(|(_, device)| *device)
                .collect();
        }
        if self.partitions.is_empty() {
            return self.disk.into_iter().collect();
        }
        self.partitions.iter().map(|(_, device)| *device).collect()
    }

    fn is_decrypted(&self) -> bool {
        self.mapped.is_some()
    }

    fn update_device_info(&mut self, mapped: DeviceId) {
        self.saved = Some(SavedIdentity {
            disk: self.disk,
            partitions: std::mem::take(&mut self.partitions),
        });
        self.disk = Some(mapped);
        self.mapped = Some(mapped);
    }

    fn revert_device_info(&mut self) {
        match self.saved.take() {
            Some(saved) => {
                self.disk = saved.disk;
                self.partitions = saved.partitions;
                self.mapped = None;
            }
            None => warn!("revert requested without a saved device identity"),
        }
    }

    fn handle_block_event(
        &mut self,
        event: &BlockEvent,
    ) -> Result<BlockEventOutcome, VolumeError> {
        if !self.matches(&event.sys_path) {
            return Err(VolumeError::UnsupportedEvent);
        }

        Ok(match (event.action, event.kind) {
            (BlockAction::Add, BlockDeviceKind::Disk) => self.handle_disk_added(event),
            (BlockAction::Add, BlockDeviceKind::Partition) => self.handle_partition_added(event),
            (BlockAction::Remove, BlockDeviceKind::Disk) => {
                self.disk = None;
                self.partitions.clear();
                self.awaiting = None;
                self.mapped = None;
                self.saved = None;
                BlockEventOutcome::MediaRemoved
            }
            (BlockAction::Remove, BlockDeviceKind::Partition) => {
                self.partitions.retain(|(_, d)| *d != event.device);
                BlockEventOutcome::Ignored
            }
            (BlockAction::Change, _) => BlockEventOutcome::Ignored,
        })
    }
}
