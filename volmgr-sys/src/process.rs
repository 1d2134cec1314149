// SPDX-License-Identifier: GPL-3.0-only

//! Enumeration and termination of processes holding files open under a path.

use std::path::Path;

use async_trait::async_trait;
use nix::sys::signal::{kill, Signal};
use nix::unistd::Pid;
use procfs::process::FDTarget;
use tracing::{info, warn};

use volmgr_contracts::{KillLevel, ProcessOps, VolumeError};

pub struct LinuxProcessOps;

impl LinuxProcessOps {
    /// Whether `process` has an open fd, cwd or executable under `path`.
    fn holds(process: &procfs::process::Process, path: &Path) -> bool {
        if let Ok(fds) = process.fd() {
            for fd in fds.flatten() {
                if let FDTarget::Path(target) = fd.target {
                    if target.starts_with(path) {
                        return true;
                    }
                }
            }
        }
        if let Ok(cwd) = process.cwd() {
            if cwd.starts_with(path) {
                return true;
            }
        }
        if let Ok(exe) = process.exe() {
            if exe.starts_with(path) {
                return true;
            }
        }
        false
    }
}

#[async_trait]
impl ProcessOps for LinuxProcessOps {
    async fn kill_holders(&self, path: &Path, level: KillLevel) -> Result<usize, VolumeError> {
        let own_pid = std::process::id() as i32;
        let processes =
            procfs::process::all_processes().map_err(|e| VolumeError::Process(e.to_string()))?;

        let mut holders = 0;
        for process in processes.flatten() {
            let pid = process.pid;
            if pid == own_pid || !Self::holds(&process, path) {
                continue;
            }
            holders += 1;

            let signal = match level {
                KillLevel::None => {
                    info!(pid, path = %path.display(), "process holds open files");
                    continue;
                }
                KillLevel::HangUp => Signal::SIGHUP,
                KillLevel::Kill => Signal::SIGKILL,
            };

            info!(pid, ?signal, path = %path.display(), "signalling holder");
            if let Err(err) = kill(Pid::from_raw(pid), signal) {
                warn!(pid, %err, "failed to signal holder");
            }
        }

        Ok(holders)
    }
}
