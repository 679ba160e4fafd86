//! Inbound event decoding.

use crate::address::{PeerAddress, ADDRESS_INFO_SIZE};
use crate::command::{
    LinkKeyInfo, LongTermKeyInfo, LINK_KEY_INFO_SIZE, LONG_TERM_KEY_INFO_SIZE, MAX_NAME_LENGTH,
    MAX_SHORT_NAME_LENGTH,
};
use crate::error::WireError;
use crate::opcode::{DeviceFoundFlags, DisconnectReason, DiscoveryTypes, EventCode, Settings, Status};
use bytes::{Buf, Bytes};

/// Fixed part of a command-complete payload (opcode + status)
pub const COMMAND_COMPLETE_SIZE: usize = 3;

/// Size of a command-status payload
pub const COMMAND_STATUS_SIZE: usize = 3;

/// Size of a class-of-device value
pub const DEV_CLASS_SIZE: usize = 3;

/// Size of a local name block (name + short name)
pub const LOCAL_NAME_SIZE: usize = MAX_NAME_LENGTH + MAX_SHORT_NAME_LENGTH;

/// Fixed prefix of the device-connected event
pub const DEVICE_CONNECTED_SIZE: usize = ADDRESS_INFO_SIZE + 4 + 2;

/// Fixed prefix of the device-found event
pub const DEVICE_FOUND_SIZE: usize = ADDRESS_INFO_SIZE + 1 + 4 + 2;

const NEW_LINK_KEY_SIZE: usize = 1 + LINK_KEY_INFO_SIZE;
const NEW_LONG_TERM_KEY_SIZE: usize = 1 + LONG_TERM_KEY_INFO_SIZE;

/// Decoded management event
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Event {
    /// A command finished; `data` is the reply body
    CommandComplete {
        /// Raw opcode of the completed command
        opcode: u16,
        /// Completion status
        status: Status,
        /// Reply body
        data: Bytes,
    },
    /// A command was accepted or rejected without a reply body
    CommandStatus {
        /// Raw opcode of the command
        opcode: u16,
        /// Status
        status: Status,
    },
    /// Controller reported a hardware error
    ControllerError(u8),
    /// A controller appeared
    IndexAdded,
    /// A controller went away
    IndexRemoved,
    /// Full settings bitmask changed
    NewSettings(Settings),
    /// Class of device changed
    ClassOfDevChanged([u8; DEV_CLASS_SIZE]),
    /// Local name changed
    LocalNameChanged {
        /// Complete name
        name: String,
        /// Short name
        short_name: String,
    },
    /// A link key was created
    NewLinkKey {
        /// Key should be persisted
        store_hint: bool,
        /// Key material
        key: LinkKeyInfo,
    },
    /// A long term key was created
    NewLongTermKey {
        /// Key should be persisted
        store_hint: bool,
        /// Key material
        key: LongTermKeyInfo,
    },
    /// A peer connected
    DeviceConnected {
        /// Peer address
        peer: PeerAddress,
        /// Connection flags
        flags: u32,
        /// Embedded advertising data
        eir: Bytes,
    },
    /// A peer disconnected
    DeviceDisconnected {
        /// Peer address
        peer: PeerAddress,
        /// Disconnect reason, unknown when absent
        reason: DisconnectReason,
    },
    /// An outgoing connection failed
    ConnectFailed {
        /// Peer address
        peer: PeerAddress,
        /// Failure status
        status: Status,
    },
    /// Peer requests a PIN code
    PinCodeRequest {
        /// Peer address
        peer: PeerAddress,
        /// A 16 digit PIN is required
        secure: bool,
    },
    /// Peer requests numeric comparison
    UserConfirmRequest {
        /// Peer address
        peer: PeerAddress,
        /// Only a yes/no confirmation is needed
        confirm_hint: bool,
        /// Value to compare
        value: u32,
    },
    /// Peer requests a passkey
    UserPasskeyRequest(PeerAddress),
    /// Authentication failed
    AuthFailed {
        /// Peer address
        peer: PeerAddress,
        /// Failure status
        status: Status,
    },
    /// A device was found during discovery
    DeviceFound {
        /// Peer address
        peer: PeerAddress,
        /// Signal strength
        rssi: i8,
        /// Event flags
        flags: DeviceFoundFlags,
        /// Embedded advertising data
        eir: Bytes,
    },
    /// Discovery started or stopped
    Discovering {
        /// Address types being discovered
        types: DiscoveryTypes,
        /// Discovery is active
        discovering: bool,
    },
    /// A peer was blocked
    DeviceBlocked(PeerAddress),
    /// A peer was unblocked
    DeviceUnblocked(PeerAddress),
    /// A peer's pairing was removed
    DeviceUnpaired(PeerAddress),
    /// Passkey to display to the user
    PasskeyNotify {
        /// Peer address
        peer: PeerAddress,
        /// Passkey
        passkey: u32,
        /// Digits entered so far on the remote side
        entered: u8,
    },
}

fn require(kind: &'static str, payload: &[u8], required: usize) -> Result<(), WireError> {
    if payload.len() < required {
        return Err(WireError::ShortPayload {
            kind,
            required,
            actual: payload.len(),
        });
    }
    Ok(())
}

fn exact(kind: &'static str, payload: &[u8], expected: usize) -> Result<(), WireError> {
    if payload.len() != expected {
        return Err(WireError::PayloadSize {
            kind,
            expected,
            actual: payload.len(),
        });
    }
    Ok(())
}

/// Validate a fixed prefix followed by a blob whose length is in the prefix.
fn trailing_blob(
    kind: &'static str,
    payload: &[u8],
    prefix: usize,
    blob_len: usize,
) -> Result<(), WireError> {
    let expected = prefix + blob_len;
    if payload.len() < expected {
        return Err(WireError::ShortPayload {
            kind,
            required: expected,
            actual: payload.len(),
        });
    }
    exact(kind, payload, expected)
}

/// Read a NUL terminated string out of a fixed-size field.
pub(crate) fn c_string(field: &[u8]) -> String {
    let end = field.iter().position(|b| *b == 0).unwrap_or(field.len());
    String::from_utf8_lossy(&field[..end]).into_owned()
}

/// Decode an event payload by event code.
pub fn decode_event(code: u16, payload: &[u8]) -> Result<Event, WireError> {
    let code = EventCode::try_from(code)?;
    let mut buf = payload;

    let event = match code {
        EventCode::CommandComplete => {
            require("command complete", payload, COMMAND_COMPLETE_SIZE)?;
            let opcode = buf.get_u16_le();
            let status = Status::from(buf.get_u8());
            Event::CommandComplete {
                opcode,
                status,
                data: Bytes::copy_from_slice(buf),
            }
        }

        EventCode::CommandStatus => {
            require("command status", payload, COMMAND_STATUS_SIZE)?;
            Event::CommandStatus {
                opcode: buf.get_u16_le(),
                status: Status::from(buf.get_u8()),
            }
        }

        EventCode::ControllerError => {
            require("controller error", payload, 1)?;
            Event::ControllerError(buf.get_u8())
        }

        EventCode::IndexAdded => Event::IndexAdded,
        EventCode::IndexRemoved => Event::IndexRemoved,

        EventCode::NewSettings => {
            require("new settings", payload, 4)?;
            Event::NewSettings(Settings::from_raw(buf.get_u32_le()))
        }

        EventCode::ClassOfDevChanged => {
            require("class of device", payload, DEV_CLASS_SIZE)?;
            let mut class = [0u8; DEV_CLASS_SIZE];
            buf.copy_to_slice(&mut class);
            Event::ClassOfDevChanged(class)
        }

        EventCode::LocalNameChanged => {
            require("local name changed", payload, LOCAL_NAME_SIZE)?;
            Event::LocalNameChanged {
                name: c_string(&payload[..MAX_NAME_LENGTH]),
                short_name: c_string(&payload[MAX_NAME_LENGTH..LOCAL_NAME_SIZE]),
            }
        }

        EventCode::NewLinkKey => {
            exact("new link key", payload, NEW_LINK_KEY_SIZE)?;
            let store_hint = buf.get_u8() != 0;
            let key = LinkKeyInfo::decode(&mut buf)?;
            Event::NewLinkKey { store_hint, key }
        }

        EventCode::NewLongTermKey => {
            exact("new long term key", payload, NEW_LONG_TERM_KEY_SIZE)?;
            let store_hint = buf.get_u8() != 0;
            let key = LongTermKeyInfo::decode(&mut buf)?;
            Event::NewLongTermKey { store_hint, key }
        }

        EventCode::DeviceConnected => {
            require("device connected", payload, DEVICE_CONNECTED_SIZE)?;
            let peer = PeerAddress::decode(&mut buf)?;
            let flags = buf.get_u32_le();
            let eir_len = buf.get_u16_le() as usize;
            trailing_blob("device connected", payload, DEVICE_CONNECTED_SIZE, eir_len)?;
            Event::DeviceConnected {
                peer,
                flags,
                eir: Bytes::copy_from_slice(buf),
            }
        }

        EventCode::DeviceDisconnected => {
            require("device disconnected", payload, ADDRESS_INFO_SIZE)?;
            let peer = PeerAddress::decode(&mut buf)?;
            let reason = if buf.has_remaining() {
                DisconnectReason::from(buf.get_u8())
            } else {
                DisconnectReason::Unknown
            };
            Event::DeviceDisconnected { peer, reason }
        }

        EventCode::ConnectFailed => {
            require("connect failed", payload, ADDRESS_INFO_SIZE + 1)?;
            Event::ConnectFailed {
                peer: PeerAddress::decode(&mut buf)?,
                status: Status::from(buf.get_u8()),
            }
        }

        EventCode::PinCodeRequest => {
            require("pin code request", payload, ADDRESS_INFO_SIZE + 1)?;
            Event::PinCodeRequest {
                peer: PeerAddress::decode(&mut buf)?,
                secure: buf.get_u8() != 0,
            }
        }

        EventCode::UserConfirmRequest => {
            require("user confirm request", payload, ADDRESS_INFO_SIZE + 5)?;
            Event::UserConfirmRequest {
                peer: PeerAddress::decode(&mut buf)?,
                confirm_hint: buf.get_u8() != 0,
                value: buf.get_u32_le(),
            }
        }

        EventCode::UserPasskeyRequest => {
            require("passkey request", payload, ADDRESS_INFO_SIZE)?;
            Event::UserPasskeyRequest(PeerAddress::decode(&mut buf)?)
        }

        EventCode::AuthFailed => {
            require("auth failed", payload, ADDRESS_INFO_SIZE + 1)?;
            Event::AuthFailed {
                peer: PeerAddress::decode(&mut buf)?,
                status: Status::from(buf.get_u8()),
            }
        }

        EventCode::DeviceFound => {
            require("device found", payload, DEVICE_FOUND_SIZE)?;
            let peer = PeerAddress::decode(&mut buf)?;
            let rssi = buf.get_i8();
            let flags = DeviceFoundFlags::from_bits_retain(buf.get_u32_le());
            let eir_len = buf.get_u16_le() as usize;
            trailing_blob("device found", payload, DEVICE_FOUND_SIZE, eir_len)?;
            Event::DeviceFound {
                peer,
                rssi,
                flags,
                eir: Bytes::copy_from_slice(buf),
            }
        }

        EventCode::Discovering => {
            require("discovering", payload, 2)?;
            Event::Discovering {
                types: DiscoveryTypes::from_bits_retain(buf.get_u8()),
                discovering: buf.get_u8() != 0,
            }
        }

        EventCode::DeviceBlocked => {
            require("device blocked", payload, ADDRESS_INFO_SIZE)?;
            Event::DeviceBlocked(PeerAddress::decode(&mut buf)?)
        }

        EventCode::DeviceUnblocked => {
            require("device unblocked", payload, ADDRESS_INFO_SIZE)?;
            Event::DeviceUnblocked(PeerAddress::decode(&mut buf)?)
        }

        EventCode::DeviceUnpaired => {
            require("device unpaired", payload, ADDRESS_INFO_SIZE)?;
            Event::DeviceUnpaired(PeerAddress::decode(&mut buf)?)
        }

        EventCode::PasskeyNotify => {
            require("passkey notify", payload, ADDRESS_INFO_SIZE + 5)?;
            Event::PasskeyNotify {
                peer: PeerAddress::decode(&mut buf)?,
                passkey: buf.get_u32_le(),
                entered: buf.get_u8(),
            }
        }
    };

    Ok(event)
}
