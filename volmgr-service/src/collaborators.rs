// SPDX-License-Identifier: GPL-3.0-only

//! Collaborator wiring.
//!
//! The state machine consumes every side effect through the contracts in
//! `volmgr-contracts`; this module bundles one implementation of each into
//! a registry the manager hands to every operation. The daemon builds the
//! Linux set; tests build the same struct from mocks.

use std::path::Path;
use std::sync::Arc;

use async_trait::async_trait;

use volmgr_contracts::{
    Broadcaster, CryptoMapper, CryptoMapping, DeviceNodeOps, FilesystemOps, MountOps, MountTable,
    PartitionOps, ProcessOps, SystemState, VolumeError,
};
use volmgr_sys::{
    FatFilesystem, LinuxDeviceNodeOps, LinuxMountOps, LinuxProcessOps, ProcMountTable,
    PropertyFile, SfdiskPartitionOps,
};
use volmgr_types::DeviceId;

pub struct Collaborators {
    pub fs: Arc<dyn FilesystemOps>,
    pub mounts: Arc<dyn MountOps>,
    pub nodes: Arc<dyn DeviceNodeOps>,
    pub procs: Arc<dyn ProcessOps>,
    pub crypto: Arc<dyn CryptoMapper>,
    pub partitions: Arc<dyn PartitionOps>,
    pub system: Arc<dyn SystemState>,
    pub mount_table: Arc<dyn MountTable>,
    pub broadcaster: Arc<dyn Broadcaster>,
}

impl Collaborators {
    /// Wire the Linux implementations.
    pub fn build_linux(
        connection: zbus::Connection,
        state_file: &Path,
        broadcaster: Arc<dyn Broadcaster>,
    ) -> Result<Self, VolumeError> {
        Ok(Self {
            fs: Arc::new(FatFilesystem::new()?),
            mounts: Arc::new(LinuxMountOps),
            nodes: Arc::new(LinuxDeviceNodeOps),
            procs: Arc::new(LinuxProcessOps),
            crypto: Arc::new(CryptoServiceProxy::new(connection)),
            partitions: Arc::new(SfdiskPartitionOps::new()?),
            system: Arc::new(PropertyFile::new(state_file)),
            mount_table: Arc::new(ProcMountTable),
            broadcaster,
        })
    }
}

/// D-Bus client for the external block remapping service.
///
/// The decryption service owns the dm-crypt tables; this controller only
/// asks it to map or revert a device and consumes the resulting identity.
pub struct CryptoServiceProxy {
    connection: zbus::Connection,
}

const CRYPTO_DESTINATION: &str = "org.volmgr.Crypto";
const CRYPTO_PATH: &str = "/org/volmgr/Crypto";
const CRYPTO_INTERFACE: &str = "org.volmgr.Crypto1";

impl CryptoServiceProxy {
    pub fn new(connection: zbus::Connection) -> Self {
        Self { connection }
    }

    async fn proxy(&self) -> Result<zbus::Proxy<'_>, VolumeError> {
        zbus::Proxy::new(
            &self.connection,
            CRYPTO_DESTINATION,
            CRYPTO_PATH,
            CRYPTO_INTERFACE,
        )
        .await
        .map_err(|e| VolumeError::Crypto(e.to_string()))
    }
}

#[async_trait]
impl CryptoMapper for CryptoServiceProxy {
    async fn setup_mapping(
        &self,
        label: &str,
        raw: DeviceId,
    ) -> Result<CryptoMapping, VolumeError> {
        let proxy = self.proxy().await?;
        let (major, minor, sys_path): (u32, u32, String) = proxy
            .call("SetupMapping", &(label, raw.major, raw.minor))
            .await
            .map_err(|e| VolumeError::Crypto(e.to_string()))?;

        Ok(CryptoMapping {
            device: DeviceId::new(major, minor),
            sys_path: sys_path.into(),
        })
    }

    async fn revert_mapping(&self, label: &str) -> Result<(), VolumeError> {
        let proxy = self.proxy().await?;
        proxy
            .call("RevertMapping", &(label,))
            .await
            .map_err(|e| VolumeError::Crypto(e.to_string()))
    }
}
