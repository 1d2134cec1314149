// SPDX-License-Identifier: GPL-3.0-only

//! Bounded-retry wrappers around the raw mount-table operations.
//!
//! These are the only places retries occur in the controller. Both wrappers
//! escalate force against holders of open files: nothing for the early
//! retries, a hang-up before the second-to-last attempt, a kill before the
//! last attempt (only when `force` is set). Holders are enumerated on every
//! failed attempt so the log shows who is pinning the mount.

use std::path::Path;
use std::time::Duration;

use tracing::{debug, error, warn};

use volmgr_contracts::{KillLevel, MountError, MountOps, ProcessOps};

const MOVE_MOUNT_ATTEMPTS: u32 = 5;
const MOVE_MOUNT_BACKOFF: Duration = Duration::from_millis(250);

const UNMOUNT_ATTEMPTS: u32 = 10;
const UNMOUNT_BACKOFF: Duration = Duration::from_secs(1);

fn escalation(remaining: u32, force: bool) -> KillLevel {
    if !force {
        return KillLevel::None;
    }
    match remaining {
        2 => KillLevel::HangUp,
        1 => KillLevel::Kill,
        _ => KillLevel::None,
    }
}

/// Atomically relocate a mount, retrying on busy with escalating force.
///
/// Any error other than "resource busy" is immediately fatal. Exhausting
/// the retries reports busy.
pub async fn move_mount(
    mounts: &dyn MountOps,
    procs: &dyn ProcessOps,
    src: &Path,
    dst: &Path,
    force: bool,
) -> Result<(), MountError> {
    for remaining in (0..MOVE_MOUNT_ATTEMPTS).rev() {
        match mounts.move_mount(src, dst).await {
            Ok(()) => {
                debug!(src = %src.display(), dst = %dst.display(), "moved mount");
                return Ok(());
            }
            Err(MountError::Busy) => {}
            Err(err) => {
                error!(src = %src.display(), dst = %dst.display(), %err, "failed to move mount");
                return Err(err);
            }
        }

        let level = escalation(remaining, force);
        warn!(
            src = %src.display(),
            dst = %dst.display(),
            remaining,
            ?level,
            "mount move busy, retrying"
        );
        if let Err(err) = procs.kill_holders(src, level).await {
            warn!(%err, "failed to act on holders of {}", src.display());
        }
        tokio::time::sleep(MOVE_MOUNT_BACKOFF).await;
    }

    error!(src = %src.display(), dst = %dst.display(), "giving up on mount move");
    Err(MountError::Busy)
}

/// Detach a mount, retrying on any failure with escalating force.
///
/// A target that is already gone (invalid argument, no such entity, I/O
/// error on a vanished device) counts as success.
pub async fn unmount(
    mounts: &dyn MountOps,
    procs: &dyn ProcessOps,
    path: &Path,
    force: bool,
) -> Result<(), MountError> {
    for remaining in (0..UNMOUNT_ATTEMPTS).rev() {
        match mounts.unmount(path).await {
            Ok(()) => {
                debug!(path = %path.display(), "unmounted");
                return Ok(());
            }
            Err(MountError::Gone) => {
                debug!(path = %path.display(), "target already detached");
                return Ok(());
            }
            Err(err) => {
                let level = escalation(remaining, force);
                warn!(path = %path.display(), %err, remaining, ?level, "unmount failed, retrying");
                if let Err(err) = procs.kill_holders(path, level).await {
                    warn!(%err, "failed to act on holders of {}", path.display());
                }
            }
        }
        tokio::time::sleep(UNMOUNT_BACKOFF).await;
    }

    error!(path = %path.display(), "giving up on unmount");
    Err(MountError::Busy)
}
