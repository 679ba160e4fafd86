//! Driver error types.

use mgmt_controller::RegistryError;
use mgmt_wire::{Opcode, WireError};
use std::io;
use thiserror::Error;

/// Driver errors
#[derive(Error, Debug)]
pub enum MgmtError {
    /// Malformed packet or payload
    #[error("wire error: {0}")]
    Wire(#[from] WireError),

    /// Event or request for a controller index that is not registered
    #[error(transparent)]
    Registry(#[from] RegistryError),

    /// Kernel speaks a management version older than required
    #[error("management version {found} not supported, version {required} or later needed")]
    ProtocolVersion {
        /// Version reported, 0 when the reply was too short to tell
        found: u8,
        /// Minimum version accepted
        required: u8,
    },

    /// Writing a command to the socket failed
    #[error("failed to write {opcode} command: {source}")]
    TransportWrite {
        /// Command being written
        opcode: Opcode,
        /// Underlying I/O error
        #[source]
        source: io::Error,
    },

    /// Reading from the socket failed
    #[error("unable to read from management socket: {0}")]
    TransportRead(#[source] io::Error),

    /// Controller lacks a required feature; nothing was sent
    #[error("{operation} not supported on controller {index}")]
    UnsupportedOperation {
        /// Controller index
        index: u16,
        /// Operation requested
        operation: &'static str,
    },

    /// Caller passed parameters the protocol cannot carry
    #[error("invalid parameters: {0}")]
    InvalidParams(String),

    /// The driver task is gone
    #[error("driver closed")]
    DriverClosed,
}

impl MgmtError {
    /// Whether this error must stop the driver
    pub fn is_fatal(&self) -> bool {
        matches!(self, MgmtError::ProtocolVersion { .. })
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_only_version_errors_are_fatal() {
        assert!(MgmtError::ProtocolVersion {
            found: 0,
            required: 1
        }
        .is_fatal());
        assert!(!MgmtError::from(WireError::HeaderTooShort(2)).is_fatal());
        assert!(!MgmtError::from(RegistryError::UnknownController(4)).is_fatal());
        assert!(!MgmtError::TransportRead(io::Error::from(io::ErrorKind::BrokenPipe)).is_fatal());
    }

    #[test]
    fn test_error_messages() {
        let err = MgmtError::TransportWrite {
            opcode: Opcode::SetPowered,
            source: io::Error::from(io::ErrorKind::BrokenPipe),
        };
        assert!(err.to_string().starts_with("failed to write Set Powered command"));
        assert_eq!(
            MgmtError::from(RegistryError::UnknownController(4)).to_string(),
            "unknown controller index 4"
        );
    }
}
