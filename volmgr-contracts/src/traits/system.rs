// SPDX-License-Identifier: GPL-3.0-only

use std::path::Path;

use async_trait::async_trait;

use volmgr_types::BroadcastCode;

use crate::error::VolumeError;

/// Global key-value state reads (decrypt prompt, encryption progress,
/// crypto state).
pub trait SystemState: Send + Sync {
    /// Value for `key`, or the empty string when unset.
    fn read(&self, key: &str) -> String;
}

/// Live mount-table probe.
pub trait MountTable: Send + Sync {
    fn is_path_mounted(&self, path: &Path) -> bool;
}

/// Partition-table writing on a base device.
#[async_trait]
pub trait PartitionOps: Send + Sync {
    /// Write a fresh single-partition table covering the whole device.
    async fn write_partition_table(&self, device: &Path) -> Result<(), VolumeError>;
}

/// Event-broadcast transport.
pub trait Broadcaster: Send + Sync {
    fn broadcast(&self, code: BroadcastCode, message: &str, sticky: bool);
}
