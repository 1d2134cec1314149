// SPDX-License-Identifier: GPL-3.0-only

//! Low-level system operations for the volume lifecycle controller.
//!
//! This crate holds the Linux implementations of the collaborator contracts
//! (mount syscalls, device nodes, holder termination, mount-table probing,
//! filesystem tooling) and the bounded retry primitives that wrap the raw
//! mount operations with escalating force.
//!
//! Everything here requires elevated privileges and is only wired up by the
//! controller daemon.

pub mod fat;
pub mod mount;
pub mod mounts;
pub mod partition;
pub mod process;
pub mod retry;
pub mod system;

pub use fat::FatFilesystem;
pub use mount::{LinuxDeviceNodeOps, LinuxMountOps};
pub use mounts::ProcMountTable;
pub use partition::SfdiskPartitionOps;
pub use process::LinuxProcessOps;
pub use system::PropertyFile;
