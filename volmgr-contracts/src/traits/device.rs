// SPDX-License-Identifier: GPL-3.0-only

use volmgr_types::{BlockEvent, DeviceId};

use crate::error::VolumeError;

/// What a block event meant for the volume that consumed it.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum BlockEventOutcome {
    /// Media appeared. `ready` is false while partitions are still being
    /// announced; the volume holds in Pending until they all arrive.
    MediaInserted { ready: bool },
    /// The last announced partition arrived; a Pending volume becomes Idle.
    PartitionsReady,
    /// The backing disk disappeared.
    MediaRemoved,
    /// Nothing the state machine cares about.
    Ignored,
}

/// Device-specific half of a volume.
///
/// The state machine is generic over how candidate nodes are discovered;
/// concrete sources interpret block events for their kind of device and
/// answer enumeration queries. This is the hook through which the manager
/// feeds hot-plug events into the state machine.
pub trait DeviceSource: Send + Sync {
    /// Whether a block event at `sys_path` belongs to this volume.
    fn matches(&self, sys_path: &str) -> bool;

    /// Identity of the base disk, once media is present.
    fn disk_device(&self) -> Option<DeviceId>;

    /// Candidate device nodes, in mount-preference order.
    fn device_nodes(&self) -> Vec<DeviceId>;

    /// Whether the volume currently points at a decrypted remapping.
    fn is_decrypted(&self) -> bool;

    /// Point the volume at the decrypted device, saving the raw identity for
    /// a later revert.
    fn update_device_info(&mut self, mapped: DeviceId);

    /// Restore the pre-remap device identity.
    fn revert_device_info(&mut self);

    /// Interpret a block event naming this volume's underlying device.
    fn handle_block_event(&mut self, event: &BlockEvent)
    -> Result<BlockEventOutcome, VolumeError>;
}
