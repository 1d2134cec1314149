// SPDX-License-Identifier: GPL-3.0-only

use std::path::Path;

use async_trait::async_trait;

use crate::error::VolumeError;

/// Result of a filesystem check on one candidate device node.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum FsCheck {
    /// The node carries a usable filesystem.
    Clean,
    /// No recognizable filesystem on the node. A soft miss: the mount loop
    /// advances to the next candidate.
    NoFilesystem,
}

/// Ownership applied when mounting media.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct MountOwner {
    pub uid: u32,
    pub gid: u32,
    pub mode: u32,
}

/// Filesystem check/mount/format primitives.
#[async_trait]
pub trait FilesystemOps: Send + Sync {
    async fn check(&self, device: &Path) -> Result<FsCheck, VolumeError>;

    async fn mount(
        &self,
        device: &Path,
        target: &Path,
        owner: MountOwner,
    ) -> Result<(), VolumeError>;

    async fn format(&self, device: &Path) -> Result<(), VolumeError>;
}
