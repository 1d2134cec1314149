// SPDX-License-Identifier: GPL-3.0-only

use std::path::PathBuf;

use enumflags2::bitflags;
use serde::{Deserialize, Serialize};

use crate::device::DeviceId;
use crate::state::VolumeState;

/// Behavior flags configured per volume.
#[bitflags]
#[repr(u8)]
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum VolumeFlag {
    /// The backing device cannot be removed at runtime.
    NonRemovable,
    /// The volume participates in transparent block encryption.
    Encryptable,
}

/// Snapshot of one managed volume, as reported to clients.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct VolumeInfo {
    pub label: String,
    pub mount_point: PathBuf,
    pub state: VolumeState,
    pub mounted_device: Option<DeviceId>,
}
