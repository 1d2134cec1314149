// SPDX-License-Identifier: GPL-3.0-only

//! FAT filesystem check, mount and format.
//!
//! Checking and formatting shell out to dosfstools; mounting is a direct
//! vfat mount with ownership baked into the mount options, since FAT has no
//! on-disk ownership of its own.

use std::path::{Path, PathBuf};

use async_trait::async_trait;
use nix::errno::Errno;
use nix::mount::{mount, MsFlags};
use tokio::process::Command;
use tracing::{debug, warn};

use volmgr_contracts::{FilesystemOps, FsCheck, MountOwner, VolumeError};

/// Exit code dosfstools uses when the device carries no FAT filesystem.
const FSCK_NO_FILESYSTEM: i32 = 8;

pub struct FatFilesystem {
    fsck: PathBuf,
    mkfs: PathBuf,
}

impl FatFilesystem {
    pub fn new() -> Result<Self, VolumeError> {
        let fsck = which::which("fsck.fat")
            .or_else(|_| which::which("fsck.vfat"))
            .map_err(|e| VolumeError::Check(format!("fsck.fat not found: {e}")))?;
        let mkfs = which::which("mkfs.fat")
            .or_else(|_| which::which("mkfs.vfat"))
            .map_err(|e| VolumeError::Format(format!("mkfs.fat not found: {e}")))?;
        Ok(Self { fsck, mkfs })
    }
}

#[async_trait]
impl FilesystemOps for FatFilesystem {
    async fn check(&self, device: &Path) -> Result<FsCheck, VolumeError> {
        debug!(device = %device.display(), "checking filesystem");
        let status = Command::new(&self.fsck)
            .arg("-a")
            .arg(device)
            .status()
            .await
            .map_err(|e| VolumeError::Check(e.to_string()))?;

        match status.code() {
            // 0: clean, 1: errors were corrected
            Some(0) | Some(1) => Ok(FsCheck::Clean),
            Some(FSCK_NO_FILESYSTEM) => Ok(FsCheck::NoFilesystem),
            Some(code) => Err(VolumeError::Check(format!(
                "{} exited with status {code}",
                self.fsck.display()
            ))),
            None => Err(VolumeError::Check(format!(
                "{} terminated by signal",
                self.fsck.display()
            ))),
        }
    }

    async fn mount(
        &self,
        device: &Path,
        target: &Path,
        owner: MountOwner,
    ) -> Result<(), VolumeError> {
        let flags = MsFlags::MS_NODEV
            | MsFlags::MS_NOSUID
            | MsFlags::MS_NOEXEC
            | MsFlags::MS_NOATIME
            | MsFlags::MS_DIRSYNC;
        let data = format!(
            "utf8,uid={},gid={},fmask={:o},dmask={:o},shortname=mixed",
            owner.uid, owner.gid, owner.mode, owner.mode
        );

        mount(
            Some(device),
            target,
            Some("vfat"),
            flags,
            Some(data.as_str()),
        )
        .map_err(|errno: Errno| {
            warn!(
                device = %device.display(),
                target = %target.display(),
                %errno,
                "vfat mount failed"
            );
            VolumeError::Io(std::io::Error::from_raw_os_error(errno as i32))
        })
    }

    async fn format(&self, device: &Path) -> Result<(), VolumeError> {
        let status = Command::new(&self.mkfs)
            .args(["-F", "32"])
            .arg(device)
            .status()
            .await
            .map_err(|e| VolumeError::Format(e.to_string()))?;

        if status.success() {
            Ok(())
        } else {
            Err(VolumeError::Format(format!(
                "{} exited with {status}",
                self.mkfs.display()
            )))
        }
    }
}
