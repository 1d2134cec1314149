// SPDX-License-Identifier: GPL-3.0-only

//! Removable-volume lifecycle controller.
//!
//! Takes detected block devices, validates and mounts their filesystems
//! into publicly visible locations, tears them down safely and reformats
//! them, tolerating busy resources, concurrent holders of open files and an
//! optional transparent-encryption layer.
//!
//! The daemon binary wires the Linux collaborators from `volmgr-sys` and
//! serves the controller over D-Bus; everything in this library is also
//! driven directly by the integration tests with mock collaborators.

pub mod broadcast;
pub mod collaborators;
pub mod config;
pub mod error;
pub mod handlers;
pub mod manager;
pub mod source;
pub mod volume;

pub use collaborators::Collaborators;
pub use manager::VolumeManager;
pub use volume::{Volume, VolumeContext};
