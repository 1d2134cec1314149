// SPDX-License-Identifier: GPL-3.0-only

use std::path::Path;

use async_trait::async_trait;

use volmgr_types::DeviceId;

use crate::error::{MountError, VolumeError};

/// Raw mount-table operations.
///
/// These are single attempts; all retrying lives in the retry primitives
/// that wrap them. Implementations classify errno into `MountError` so the
/// primitives can tell retryable busy conditions from fatal ones.
#[async_trait]
pub trait MountOps: Send + Sync {
    /// Atomically relocate an existing mount from `src` to `dst`.
    async fn move_mount(&self, src: &Path, dst: &Path) -> Result<(), MountError>;

    /// Detach the mount at `path`.
    async fn unmount(&self, path: &Path) -> Result<(), MountError>;

    /// Bind-mount `src` onto `dst`.
    async fn bind_mount(&self, src: &Path, dst: &Path) -> Result<(), MountError>;

    /// Mount a read-only, zero-size, no-permission tmpfs over `path` so
    /// unprivileged listers see nothing there.
    async fn obscure_tmpfs(&self, path: &Path) -> Result<(), MountError>;
}

/// Creation of the controller's own block device nodes.
#[async_trait]
pub trait DeviceNodeOps: Send + Sync {
    /// Create the node at `path` for `device`. Idempotent: an existing node
    /// is success.
    async fn create_node(&self, path: &Path, device: DeviceId) -> Result<(), VolumeError>;
}
