// SPDX-License-Identifier: GPL-3.0-only

use thiserror::Error;
use zbus::fdo;

use volmgr_contracts::VolumeError;

/// Errors surfaced over the D-Bus command interface.
#[derive(Debug, Error)]
pub enum ServiceError {
    #[error(transparent)]
    Volume(#[from] VolumeError),

    #[error("Invalid argument: {0}")]
    InvalidArgument(String),

    #[error("D-Bus error: {0}")]
    DBus(String),
}

impl From<ServiceError> for fdo::Error {
    fn from(err: ServiceError) -> Self {
        match err {
            ServiceError::Volume(VolumeError::UnknownVolume(label)) => {
                fdo::Error::Failed(format!("Unknown volume: {label}"))
            }
            ServiceError::Volume(VolumeError::NotMounted) => {
                fdo::Error::Failed("Volume is not mounted".to_string())
            }
            ServiceError::InvalidArgument(msg) => fdo::Error::InvalidArgs(msg),
            _ => fdo::Error::Failed(err.to_string()),
        }
    }
}

impl From<zbus::Error> for ServiceError {
    fn from(err: zbus::Error) -> Self {
        ServiceError::DBus(err.to_string())
    }
}

pub type Result<T> = std::result::Result<T, ServiceError>;
