// SPDX-License-Identifier: GPL-3.0-only

mod crypto;
mod device;
mod filesystem;
mod mounts;
mod process;
mod system;

pub use crypto::{CryptoMapper, CryptoMapping};
pub use device::{BlockEventOutcome, DeviceSource};
pub use filesystem::{FilesystemOps, FsCheck, MountOwner};
pub use mounts::{DeviceNodeOps, MountOps};
pub use process::{KillLevel, ProcessOps};
pub use system::{Broadcaster, MountTable, PartitionOps, SystemState};
