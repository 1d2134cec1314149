// SPDX-License-Identifier: GPL-3.0-only

use std::path::PathBuf;

use thiserror::Error;

/// Outcome classification for the raw mount-table operations.
///
/// The retry primitives key their behavior off these variants: `Busy` is the
/// only retryable error, and `Gone` means the target already vanished, which
/// an unmount treats as idempotent success.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum MountError {
    #[error("resource busy")]
    Busy,

    #[error("target already detached")]
    Gone,

    #[error("{0}")]
    Other(String),
}

/// Error taxonomy of the volume state machine.
///
/// Variants map one-to-one onto the distinguishable failure classes: no
/// media, busy, not mounted, structural invariant violations, exhausted
/// retries and the unrecoverable offline condition. Per-candidate soft
/// misses never surface here; they are absorbed by the mount loop.
#[derive(Debug, Error)]
pub enum VolumeError {
    /// The volume has no backing device, or the primary storage mount is
    /// blocked by a pending decryption prompt or encryption pass.
    #[error("no media available")]
    NoMedia,

    /// The volume is in the wrong state for the requested operation.
    #[error("volume is busy")]
    Busy,

    /// Unmount was requested while the volume is not mounted.
    #[error("volume is not mounted")]
    NotMounted,

    /// No enumerated candidate node could be mounted.
    #[error("no suitable devices for mounting")]
    NoSuitableDevice,

    /// More than one raw node was enumerated for an encryptable,
    /// non-removable primary volume. Structural, never retried.
    #[error("expected one device node for encrypted volume, found {0}")]
    AmbiguousEncryptedDevice(usize),

    #[error("{0} exists but is not a directory")]
    NotADirectory(PathBuf),

    #[error("crypto mapping failed: {0}")]
    Crypto(String),

    #[error("partition table write failed: {0}")]
    PartitionTable(String),

    #[error("filesystem check failed: {0}")]
    Check(String),

    #[error("format failed: {0}")]
    Format(String),

    #[error("mount operation failed: {0}")]
    Mount(MountError),

    /// Teardown failed but rollback restored the mounted state.
    #[error("failed to unmount {path}: {source}")]
    Unmount { path: PathBuf, source: MountError },

    /// Teardown failed and rollback failed too; the volume was forced to
    /// NoMedia and needs operator intervention.
    #[error("storage is offline after failed unmount recovery")]
    Offline,

    #[error("extra partition pool is exhausted")]
    PoolExhausted,

    #[error("unknown volume {0}")]
    UnknownVolume(String),

    #[error("unsupported block event")]
    UnsupportedEvent,

    #[error("process operation failed: {0}")]
    Process(String),

    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),
}
