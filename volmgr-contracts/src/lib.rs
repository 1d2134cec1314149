// SPDX-License-Identifier: GPL-3.0-only

//! Contracts between the volume lifecycle controller and its collaborators.
//!
//! The controller consumes every side effect through these traits: syscall
//! wrappers, the crypto remapping service, the global key-value store and
//! the broadcast transport. The daemon wires the Linux implementations from
//! `volmgr-sys`; tests substitute recording mocks.

pub mod error;
pub mod traits;

pub use error::{MountError, VolumeError};
pub use traits::{
    BlockEventOutcome, Broadcaster, CryptoMapper, CryptoMapping, DeviceNodeOps, DeviceSource,
    FilesystemOps, FsCheck, KillLevel, MountOps, MountOwner, MountTable, PartitionOps, ProcessOps,
    SystemState,
};
