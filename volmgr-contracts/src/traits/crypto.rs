// SPDX-License-Identifier: GPL-3.0-only

use std::path::PathBuf;

use async_trait::async_trait;

use volmgr_types::DeviceId;

use crate::error::VolumeError;

/// A decrypted block remapping established for one volume.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct CryptoMapping {
    /// Identity of the new, transparently decrypted device.
    pub device: DeviceId,
    /// Kernel sysfs path of the mapped device.
    pub sys_path: PathBuf,
}

/// The external dm-crypt-style block remapping service.
#[async_trait]
pub trait CryptoMapper: Send + Sync {
    /// Map the encrypted device `raw` for `label` and return the identity of
    /// the decrypted device.
    async fn setup_mapping(
        &self,
        label: &str,
        raw: DeviceId,
    ) -> Result<CryptoMapping, VolumeError>;

    /// Tear down the mapping previously established for `label`.
    async fn revert_mapping(&self, label: &str) -> Result<(), VolumeError>;
}
