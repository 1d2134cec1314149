// SPDX-License-Identifier: GPL-3.0-only

use serde::{Deserialize, Serialize};

/// Lifecycle state of a managed volume.
///
/// `Init` is the construction-time state; there is no terminal state. A
/// volume cycles between `Idle` and `Mounted` for the controller's life, and
/// only ever changes state through `Volume::set_state`.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum VolumeState {
    Init,
    NoMedia,
    Idle,
    Pending,
    Checking,
    Mounted,
    Unmounting,
    Formatting,
    Shared,
    SharedMnt,
}

impl VolumeState {
    /// Numeric code carried in state-change broadcasts.
    pub fn code(self) -> i32 {
        match self {
            Self::Init => -1,
            Self::NoMedia => 0,
            Self::Idle => 1,
            Self::Pending => 2,
            Self::Checking => 3,
            Self::Mounted => 4,
            Self::Unmounting => 5,
            Self::Formatting => 6,
            Self::Shared => 7,
            Self::SharedMnt => 8,
        }
    }

    pub fn as_str(self) -> &'static str {
        match self {
            Self::Init => "Initializing",
            Self::NoMedia => "No-Media",
            Self::Idle => "Idle-Unmounted",
            Self::Pending => "Pending",
            Self::Checking => "Checking",
            Self::Mounted => "Mounted",
            Self::Unmounting => "Unmounting",
            Self::Formatting => "Formatting",
            Self::Shared => "Shared-Unmounted",
            Self::SharedMnt => "Shared-Mounted",
        }
    }
}

impl std::fmt::Display for VolumeState {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

#[cfg(test)]
mod tests {
    use super::VolumeState;

    #[test]
    fn display_matches_broadcast_strings() {
        assert_eq!(VolumeState::NoMedia.to_string(), "No-Media");
        assert_eq!(VolumeState::Idle.to_string(), "Idle-Unmounted");
        assert_eq!(VolumeState::Mounted.to_string(), "Mounted");
    }

    #[test]
    fn codes_are_stable() {
        assert_eq!(VolumeState::Init.code(), -1);
        assert_eq!(VolumeState::Idle.code(), 1);
        assert_eq!(VolumeState::SharedMnt.code(), 8);
    }
}
