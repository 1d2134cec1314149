// SPDX-License-Identifier: GPL-3.0-only

use serde::{Deserialize, Serialize};

/// Numeric codes attached to controller broadcasts.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[repr(u16)]
pub enum BroadcastCode {
    VolumeStateChange = 605,
    VolumeMountFailedNoMedia = 606,
    VolumeDiskInserted = 630,
    VolumeDiskRemoved = 631,
    VolumeBadRemoval = 632,
}

impl BroadcastCode {
    pub fn code(self) -> u16 {
        self as u16
    }
}
