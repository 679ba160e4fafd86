//! Framing, command encoding and event decoding for the Bluetooth
//! management control channel.
//!
//! This crate is stateless: it turns typed commands into packets and
//! received packets into typed events, enforcing the exact length rules of
//! every message kind.
//!
//! ## Wire Format
//!
//! ```text
//! +----------------------+-------------------------------------+
//! | u16 opcode / event   | little-endian                       |
//! +----------------------+-------------------------------------+
//! | u16 controller index | 0xFFFF when no controller applies   |
//! +----------------------+-------------------------------------+
//! | u16 payload length   | must match the bytes that follow    |
//! +----------------------+-------------------------------------+
//! | payload              | packed, per opcode / event layout   |
//! +----------------------+-------------------------------------+
//! ```

#![warn(missing_docs)]
#![warn(clippy::all)]

pub mod address;
pub mod command;
pub mod eir;
pub mod error;
pub mod event;
pub mod header;
pub mod opcode;
pub mod reply;

// Re-export main types
pub use address::{Address, AddressType, PeerAddress, ADDRESS_INFO_SIZE, ADDRESS_SIZE};
pub use command::{
    encode_command, is_16bit_uuid, uuid16, Command, LinkKeyInfo, LongTermKeyInfo,
    LINK_KEY_INFO_SIZE, LONG_TERM_KEY_INFO_SIZE, MAX_NAME_LENGTH, MAX_PIN_LENGTH,
};
pub use eir::{BasicEirParser, EirData, EirParser};
pub use error::WireError;
pub use event::{decode_event, Event};
pub use header::{encode_packet, parse_packet, MgmtHeader, HEADER_SIZE, INDEX_NONE};
pub use opcode::{
    DeviceFoundFlags, DisconnectReason, DiscoveryTypes, EventCode, Opcode, Settings, Status,
};
pub use reply::{ControllerInfo, LocalName, OobData, VersionInfo};
