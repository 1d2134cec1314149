// SPDX-License-Identifier: GPL-3.0-only

use serde::{Deserialize, Serialize};

use crate::device::DeviceId;

/// Hot-plug action reported by the external block-event layer.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum BlockAction {
    Add,
    Remove,
    Change,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum BlockDeviceKind {
    Disk,
    Partition,
}

/// One block-device hot-plug event.
///
/// Event delivery (udev/netlink) is outside this controller; whatever layer
/// receives kernel events translates them into this shape and hands them to
/// the manager, which routes them to the matching volume's device source.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct BlockEvent {
    pub action: BlockAction,
    pub kind: BlockDeviceKind,
    /// Kernel sysfs path of the device the event names.
    pub sys_path: String,
    pub device: DeviceId,
    /// Partition number, for partition events.
    #[serde(default)]
    pub partition_index: Option<u32>,
    /// Number of partitions announced on the disk, for disk add events.
    #[serde(default)]
    pub partition_count: Option<u32>,
}
