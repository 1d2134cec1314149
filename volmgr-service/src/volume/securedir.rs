// SPDX-License-Identifier: GPL-3.0-only

//! Bind-mount guard for the secure container directory.
//!
//! Primary storage carries a directory whose raw contents must stay hidden
//! from unprivileged users while remaining reachable by privileged code.
//! [`prepare`] builds that arrangement on the staging mount, in order:
//! legacy-name migration, directory creation, bind mount to the root-only
//! path, then an obscuring tmpfs over the original path. The obscuring mount
//! must come last; its failure handler tears the bind mount back down.

use std::os::unix::fs::PermissionsExt;

use tracing::{error, info};

use volmgr_contracts::VolumeError;
use volmgr_types::StorageLayout;

use crate::collaborators::Collaborators;

pub async fn prepare(deps: &Collaborators, layout: &StorageLayout) -> Result<(), VolumeError> {
    let hidden = layout.staging_container_dir();
    let legacy = layout.legacy_container_dir();

    if path_exists(&legacy).await && !path_exists(&hidden).await {
        info!(
            from = %legacy.display(),
            to = %hidden.display(),
            "migrating legacy secure container directory"
        );
        tokio::fs::rename(&legacy, &hidden).await?;
    }

    match tokio::fs::metadata(&hidden).await {
        Ok(meta) if meta.is_dir() => {}
        Ok(_) => return Err(VolumeError::NotADirectory(hidden)),
        Err(err) if err.kind() == std::io::ErrorKind::NotFound => {
            tokio::fs::create_dir(&hidden).await?;
            tokio::fs::set_permissions(&hidden, std::fs::Permissions::from_mode(0o777)).await?;
        }
        Err(err) => return Err(err.into()),
    }

    deps.mounts
        .bind_mount(&hidden, &layout.secure_bind_dir)
        .await
        .map_err(VolumeError::Mount)?;

    if let Err(err) = deps.mounts.obscure_tmpfs(&hidden).await {
        if let Err(undo) = deps.mounts.unmount(&layout.secure_bind_dir).await {
            error!(%undo, "failed to undo bind mount at {}", layout.secure_bind_dir.display());
        }
        return Err(VolumeError::Mount(err));
    }

    Ok(())
}

async fn path_exists(path: &std::path::Path) -> bool {
    tokio::fs::metadata(path).await.is_ok()
}
