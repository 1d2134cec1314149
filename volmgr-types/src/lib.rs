// SPDX-License-Identifier: GPL-3.0-only

//! Shared data types for the volmgr removable-volume lifecycle controller.
//!
//! These types are consumed by the collaborator contracts, the low-level
//! system layer and the controller daemon itself. They carry no behavior
//! beyond formatting and simple derivations.

pub mod broadcast;
pub mod device;
pub mod event;
pub mod layout;
pub mod state;
pub mod volume;

pub use broadcast::BroadcastCode;
pub use device::DeviceId;
pub use event::{BlockAction, BlockDeviceKind, BlockEvent};
pub use layout::StorageLayout;
pub use state::VolumeState;
pub use volume::{VolumeFlag, VolumeInfo};

/// Keys read from the global key-value state store.
pub mod keys {
    /// "1" while the disk-decryption password prompt has not been answered.
    pub const DECRYPT: &str = "volmgr.decrypt";

    /// Non-empty while an in-place encryption pass is running.
    pub const ENCRYPT_PROGRESS: &str = "volmgr.encrypt_progress";

    /// "encrypted" when the device holds an encrypted primary volume.
    pub const CRYPTO_STATE: &str = "crypto.state";
}
