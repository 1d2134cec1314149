// SPDX-License-Identifier: GPL-3.0-only

use std::path::{Path, PathBuf};

use serde::{Deserialize, Serialize};

use crate::device::DeviceId;

/// Filesystem layout and ownership policy used by the controller.
///
/// Every path the state machine touches is derived from here, so tests can
/// point the whole controller at a scratch directory.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct StorageLayout {
    /// Private root-only location where media is prepared before it is
    /// exposed publicly.
    pub staging_dir: PathBuf,

    /// Root-only bind target that keeps the secure container directory
    /// reachable for privileged code after it is obscured.
    pub secure_bind_dir: PathBuf,

    /// Name of the hidden secure container directory on the media.
    pub container_dir_name: String,

    /// Pre-migration name of the secure container directory.
    pub legacy_container_dir_name: String,

    /// Directory holding the controller's own block device nodes.
    pub device_dir: PathBuf,

    /// Root under which extra-partition slots are mounted.
    pub aux_mount_root: PathBuf,

    /// Owner uid applied when mounting media.
    pub owner_uid: u32,

    /// Group granted write access on primary external storage.
    pub primary_gid: u32,

    /// Group used for secondary storage and extra partitions.
    pub secondary_gid: u32,

    /// Permission mask applied when mounting media.
    pub mount_mode: u32,
}

impl Default for StorageLayout {
    fn default() -> Self {
        Self {
            staging_dir: PathBuf::from("/mnt/secure/staging"),
            secure_bind_dir: PathBuf::from("/mnt/secure/containers"),
            container_dir_name: ".containers".to_string(),
            legacy_container_dir_name: "containers".to_string(),
            device_dir: PathBuf::from("/dev/volmgr"),
            aux_mount_root: PathBuf::from("/storage"),
            owner_uid: 1000,
            primary_gid: 1015,
            secondary_gid: 1023,
            mount_mode: 0o702,
        }
    }
}

impl StorageLayout {
    /// Path of the managed device node for `device`.
    pub fn device_node_path(&self, device: DeviceId) -> PathBuf {
        self.device_dir.join(device.node_name())
    }

    /// Hidden secure container directory on the staging mount.
    pub fn staging_container_dir(&self) -> PathBuf {
        self.staging_dir.join(&self.container_dir_name)
    }

    /// Legacy-named secure container directory on the staging mount.
    pub fn legacy_container_dir(&self) -> PathBuf {
        self.staging_dir.join(&self.legacy_container_dir_name)
    }

    /// Hidden secure container directory as seen under a public mount point
    /// (after the staging tree has been moved there).
    pub fn container_dir_under(&self, mount_point: &Path) -> PathBuf {
        mount_point.join(&self.container_dir_name)
    }

    /// Mount path assigned to extra-partition slot `index`.
    pub fn aux_mount_path(&self, index: usize) -> PathBuf {
        self.aux_mount_root.join(format!("aux{index}"))
    }
}
