// SPDX-License-Identifier: GPL-3.0-only

//! Partition-table writing via sfdisk.

use std::path::{Path, PathBuf};
use std::process::Stdio;

use async_trait::async_trait;
use tokio::io::AsyncWriteExt;
use tokio::process::Command;
use tracing::info;

use volmgr_contracts::{PartitionOps, VolumeError};

/// One active FAT32-LBA partition spanning the whole device, 1 MiB aligned.
const SINGLE_PARTITION_SCRIPT: &str = "label: dos\nstart=2048, type=c, bootable\n";

pub struct SfdiskPartitionOps {
    sfdisk: PathBuf,
}

impl SfdiskPartitionOps {
    pub fn new() -> Result<Self, VolumeError> {
        let sfdisk = which::which("sfdisk")
            .map_err(|e| VolumeError::PartitionTable(format!("sfdisk not found: {e}")))?;
        Ok(Self { sfdisk })
    }
}

#[async_trait]
impl PartitionOps for SfdiskPartitionOps {
    async fn write_partition_table(&self, device: &Path) -> Result<(), VolumeError> {
        info!(device = %device.display(), "writing single-partition table");

        let mut child = Command::new(&self.sfdisk)
            .arg(device)
            .stdin(Stdio::piped())
            .stdout(Stdio::null())
            .spawn()
            .map_err(|e| VolumeError::PartitionTable(e.to_string()))?;

        if let Some(mut stdin) = child.stdin.take() {
            stdin
                .write_all(SINGLE_PARTITION_SCRIPT.as_bytes())
                .await
                .map_err(|e| VolumeError::PartitionTable(e.to_string()))?;
        }

        let status = child
            .wait()
            .await
            .map_err(|e| VolumeError::PartitionTable(e.to_string()))?;
        if status.success() {
            Ok(())
        } else {
            Err(VolumeError::PartitionTable(format!(
                "sfdisk exited with {status}"
            )))
        }
    }
}
