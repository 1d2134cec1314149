// SPDX-License-Identifier: GPL-3.0-only

//! Raw mount-table operations and device-node creation via nix.

use std::path::Path;

use async_trait::async_trait;
use nix::errno::Errno;
use nix::mount::{mount, umount, MsFlags};
use nix::sys::stat::{makedev, mknod, Mode, SFlag};

use volmgr_contracts::{DeviceNodeOps, MountError, MountOps, VolumeError};
use volmgr_types::DeviceId;

/// Options applied to the obscuring tmpfs: zero size, no permissions,
/// root-owned. Unprivileged listers of the covered directory see nothing.
const OBSCURE_TMPFS_OPTS: &str = "size=0,mode=000,uid=0,gid=0";

pub struct LinuxMountOps;

fn classify_mount(errno: Errno) -> MountError {
    match errno {
        Errno::EBUSY => MountError::Busy,
        other => MountError::Other(other.desc().to_string()),
    }
}

/// Unmount errno classification. EINVAL, ENOENT and EIO mean the target is
/// already gone or the driver reports an odd error on a vanished device;
/// callers treat `Gone` as idempotent success.
fn classify_unmount(errno: Errno) -> MountError {
    match errno {
        Errno::EBUSY => MountError::Busy,
        Errno::EINVAL | Errno::ENOENT | Errno::EIO => MountError::Gone,
        other => MountError::Other(other.desc().to_string()),
    }
}

#[async_trait]
impl MountOps for LinuxMountOps {
    async fn move_mount(&self, src: &Path, dst: &Path) -> Result<(), MountError> {
        mount(Some(src), dst, None::<&str>, MsFlags::MS_MOVE, None::<&str>)
            .map_err(classify_mount)
    }

    async fn unmount(&self, path: &Path) -> Result<(), MountError> {
        umount(path).map_err(classify_unmount)
    }

    async fn bind_mount(&self, src: &Path, dst: &Path) -> Result<(), MountError> {
        mount(Some(src), dst, None::<&str>, MsFlags::MS_BIND, None::<&str>)
            .map_err(classify_mount)
    }

    async fn obscure_tmpfs(&self, path: &Path) -> Result<(), MountError> {
        mount(
            Some("tmpfs"),
            path,
            Some("tmpfs"),
            MsFlags::MS_RDONLY,
            Some(OBSCURE_TMPFS_OPTS),
        )
        .map_err(classify_mount)
    }
}

pub struct LinuxDeviceNodeOps;

#[async_trait]
impl DeviceNodeOps for LinuxDeviceNodeOps {
    async fn create_node(&self, path: &Path, device: DeviceId) -> Result<(), VolumeError> {
        let dev = makedev(device.major as u64, device.minor as u64);
        match mknod(path, SFlag::S_IFBLK, Mode::from_bits_truncate(0o660), dev) {
            Ok(()) | Err(Errno::EEXIST) => Ok(()),
            Err(errno) => Err(VolumeError::Io(std::io::Error::from_raw_os_error(
                errno as i32,
            ))),
        }
    }
}
