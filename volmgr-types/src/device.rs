// SPDX-License-Identifier: GPL-3.0-only

use serde::{Deserialize, Serialize};

/// Identity of a block device node as a (major, minor) pair.
///
/// Multiple identities may map to the same physical disk: the base device
/// plus one identity per partition.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct DeviceId {
    pub major: u32,
    pub minor: u32,
}

impl DeviceId {
    /// Minor number reserved as a "whole disk" alias by some drivers.
    /// Nodes carrying it are never mount candidates.
    pub const WHOLE_DISK_MINOR: u32 = 255;

    pub fn new(major: u32, minor: u32) -> Self {
        Self { major, minor }
    }

    pub fn is_whole_disk_alias(self) -> bool {
        self.minor == Self::WHOLE_DISK_MINOR
    }

    /// File name of the managed device node for this identity.
    pub fn node_name(self) -> String {
        format!("{}:{}", self.major, self.minor)
    }
}

impl std::fmt::Display for DeviceId {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}:{}", self.major, self.minor)
    }
}

#[cfg(test)]
mod tests {
    use super::DeviceId;

    #[test]
    fn whole_disk_alias_is_detected() {
        assert!(DeviceId::new(8, 255).is_whole_disk_alias());
        assert!(!DeviceId::new(8, 1).is_whole_disk_alias());
    }

    #[test]
    fn node_name_is_major_colon_minor() {
        assert_eq!(DeviceId::new(179, 3).node_name(), "179:3");
    }
}
