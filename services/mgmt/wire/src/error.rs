//! Wire protocol error types.

use thiserror::Error;

/// Wire protocol errors
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum WireError {
    /// Fewer bytes than a management header
    #[error("packet too short for header: {0} bytes")]
    HeaderTooShort(usize),

    /// Header payload length disagrees with the received byte count
    #[error("packet length mismatch: header declares {declared} payload bytes, received {actual}")]
    LengthMismatch {
        /// Payload length declared in the header
        declared: usize,
        /// Payload bytes actually present
        actual: usize,
    },

    /// Payload smaller than the message kind requires
    #[error("too small {kind} payload ({actual} < {required})")]
    ShortPayload {
        /// Message kind being decoded
        kind: &'static str,
        /// Bytes required
        required: usize,
        /// Bytes present
        actual: usize,
    },

    /// Payload not exactly the size the message kind requires
    #[error("{kind} payload size mismatch ({actual} != {expected})")]
    PayloadSize {
        /// Message kind being decoded
        kind: &'static str,
        /// Exact size expected
        expected: usize,
        /// Bytes present
        actual: usize,
    },

    /// Payload longer than the header length field can declare
    #[error("payload of {0} bytes does not fit a management packet")]
    PayloadTooLarge(usize),

    /// Unknown command opcode
    #[error("unknown opcode 0x{0:04x}")]
    UnknownOpcode(u16),

    /// Unknown event code
    #[error("unknown event 0x{0:04x}")]
    UnknownEvent(u16),

    /// Unknown address type
    #[error("unknown address type {0}")]
    AddressType(u8),

    /// Address text could not be parsed
    #[error("invalid address: {0}")]
    InvalidAddress(String),
}

impl WireError {
    /// Whether this error concerns the packet framing rather than the payload
    pub fn is_frame_error(&self) -> bool {
        matches!(
            self,
            WireError::HeaderTooShort(_) | WireError::LengthMismatch { .. }
        )
    }
}
