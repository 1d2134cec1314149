// SPDX-License-Identifier: GPL-3.0-only

use std::path::Path;

use async_trait::async_trait;

use crate::error::VolumeError;

/// Escalation applied to processes holding files open under a path.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum KillLevel {
    /// Only enumerate and log the holders.
    None,
    /// Ask holders to release the resource (SIGHUP-equivalent).
    HangUp,
    /// Forcibly terminate holders (SIGKILL-equivalent).
    Kill,
}

/// Termination of processes holding open files.
#[async_trait]
pub trait ProcessOps: Send + Sync {
    /// Find processes with open files, working directory or executable under
    /// `path` and apply `level` to them. Returns the number of holders found.
    async fn kill_holders(&self, path: &Path, level: KillLevel) -> Result<usize, VolumeError>;
}
