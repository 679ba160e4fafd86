//! Outbound command encoding.
//!
//! Each [`Command`] knows its opcode and packed little-endian payload
//! layout. Payload semantics are not validated here; callers are expected
//! to pass structurally valid values.

use crate::address::PeerAddress;
use crate::error::WireError;
use crate::header::encode_packet;
use crate::opcode::{DiscoveryTypes, Opcode};
use bytes::{Buf, BufMut, Bytes, BytesMut};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

/// Size of the local name field, including the terminating NUL
pub const MAX_NAME_LENGTH: usize = 249;

/// Size of the short name field, including the terminating NUL
pub const MAX_SHORT_NAME_LENGTH: usize = 11;

/// Maximum PIN code length
pub const MAX_PIN_LENGTH: usize = 16;

/// Wire size of one link key entry
pub const LINK_KEY_INFO_SIZE: usize = 25;

/// Wire size of one long term key entry
pub const LONG_TERM_KEY_INFO_SIZE: usize = 36;

/// Bluetooth base UUID (`00000000-0000-1000-8000-00805F9B34FB`)
const BASE_UUID: u128 = 0x0000_0000_0000_1000_8000_0080_5F9B_34FB;

const BASE_UUID_MASK: u128 = (1 << 96) - 1;

/// Build a service UUID from its 16-bit short form.
pub fn uuid16(short: u16) -> Uuid {
    Uuid::from_u128(BASE_UUID | ((short as u128) << 96))
}

/// Whether a service UUID can be registered with the controller.
///
/// The nil UUID (used to clear registrations) and UUIDs derived from the
/// base UUID with a 16-bit short form qualify.
pub fn is_16bit_uuid(uuid: &Uuid) -> bool {
    if uuid.is_nil() {
        return true;
    }

    let value = uuid.as_u128();
    value & BASE_UUID_MASK == BASE_UUID && value >> 112 == 0
}

fn encode_uuid(uuid: &Uuid, buf: &mut BytesMut) {
    buf.put_slice(&uuid.as_u128().to_le_bytes());
}

/// BR/EDR link key, as loaded into and reported by the controller
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct LinkKeyInfo {
    /// Peer the key belongs to
    pub peer: PeerAddress,
    /// Link key type
    pub key_type: u8,
    /// Key value
    pub value: [u8; 16],
    /// Length of the PIN used to create the key
    pub pin_len: u8,
}

impl LinkKeyInfo {
    /// Encode into buffer
    pub fn encode(&self, buf: &mut BytesMut) {
        self.peer.encode(buf);
        buf.put_u8(self.key_type);
        buf.put_slice(&self.value);
        buf.put_u8(self.pin_len);
    }

    pub(crate) fn decode(buf: &mut &[u8]) -> Result<Self, WireError> {
        let peer = PeerAddress::decode(buf)?;
        let key_type = buf.get_u8();
        let mut value = [0u8; 16];
        buf.copy_to_slice(&mut value);
        let pin_len = buf.get_u8();
        Ok(Self {
            peer,
            key_type,
            value,
            pin_len,
        })
    }
}

/// LE long term key
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct LongTermKeyInfo {
    /// Peer the key belongs to
    pub peer: PeerAddress,
    /// Key was created with MITM protection
    pub authenticated: bool,
    /// Key is used when the local side is master
    pub master: bool,
    /// Encryption key size
    pub enc_size: u8,
    /// Encrypted diversifier
    pub ediv: u16,
    /// Random number
    pub rand: [u8; 8],
    /// Key value
    pub value: [u8; 16],
}

impl LongTermKeyInfo {
    /// Encode into buffer
    pub fn encode(&self, buf: &mut BytesMut) {
        self.peer.encode(buf);
        buf.put_u8(self.authenticated as u8);
        buf.put_u8(self.master as u8);
        buf.put_u8(self.enc_size);
        buf.put_u16_le(self.ediv);
        buf.put_slice(&self.rand);
        buf.put_slice(&self.value);
    }

    pub(crate) fn decode(buf: &mut &[u8]) -> Result<Self, WireError> {
        let peer = PeerAddress::decode(buf)?;
        let authenticated = buf.get_u8() != 0;
        let master = buf.get_u8() != 0;
        let enc_size = buf.get_u8();
        let ediv = buf.get_u16_le();
        let mut rand = [0u8; 8];
        buf.copy_to_slice(&mut rand);
        let mut value = [0u8; 16];
        buf.copy_to_slice(&mut value);
        Ok(Self {
            peer,
            authenticated,
            master,
            enc_size,
            ediv,
            rand,
            value,
        })
    }
}

/// Outbound management command
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Command {
    /// Read the management protocol version
    ReadVersion,
    /// Enumerate controller indices
    ReadIndexList,
    /// Read controller information
    ReadInfo,
    /// Power the controller on or off
    SetPowered(bool),
    /// Toggle discoverable mode
    SetDiscoverable {
        /// Discoverable
        enabled: bool,
        /// Timeout in seconds, 0 for none
        timeout: u16,
    },
    /// Toggle connectable mode
    SetConnectable(bool),
    /// Toggle fast connectable page scan
    SetFastConnectable(bool),
    /// Toggle pairable mode
    SetPairable(bool),
    /// Toggle secure simple pairing
    SetSsp(bool),
    /// Toggle low energy
    SetLe(bool),
    /// Set major/minor device class
    SetDevClass {
        /// Major class
        major: u8,
        /// Minor class
        minor: u8,
    },
    /// Set the local name
    SetLocalName(String),
    /// Register a service UUID
    AddUuid {
        /// Service UUID
        uuid: Uuid,
        /// Service class hint bits
        svc_hint: u8,
    },
    /// Unregister a service UUID
    RemoveUuid(Uuid),
    /// Replace the controller's link key list
    LoadLinkKeys {
        /// Accept debug keys
        debug_keys: bool,
        /// Keys to load
        keys: Vec<LinkKeyInfo>,
    },
    /// Replace the controller's long term key list
    LoadLongTermKeys(Vec<LongTermKeyInfo>),
    /// Disconnect a peer
    Disconnect(PeerAddress),
    /// Fetch the current connection list
    GetConnections,
    /// Answer a PIN code request
    PinCodeReply {
        /// Peer that requested the PIN
        peer: PeerAddress,
        /// PIN bytes, at most 16
        pin: Vec<u8>,
    },
    /// Reject a PIN code request
    PinCodeNegReply(PeerAddress),
    /// Set local IO capability
    SetIoCapability(u8),
    /// Start pairing with a peer
    PairDevice {
        /// Peer to pair with
        peer: PeerAddress,
        /// IO capability for this pairing
        io_cap: u8,
    },
    /// Cancel an ongoing pairing
    CancelPairDevice(PeerAddress),
    /// Remove pairing information
    UnpairDevice {
        /// Peer to unpair
        peer: PeerAddress,
        /// Also terminate the connection
        disconnect: bool,
    },
    /// Accept a numeric comparison
    UserConfirmReply(PeerAddress),
    /// Reject a numeric comparison
    UserConfirmNegReply(PeerAddress),
    /// Answer a passkey request
    UserPasskeyReply {
        /// Peer that requested the passkey
        peer: PeerAddress,
        /// Passkey value
        passkey: u32,
    },
    /// Reject a passkey request
    UserPasskeyNegReply(PeerAddress),
    /// Read local out-of-band pairing data
    ReadLocalOobData,
    /// Provide out-of-band pairing data for a peer
    AddRemoteOobData {
        /// Peer the data belongs to
        peer: PeerAddress,
        /// Hash C
        hash: [u8; 16],
        /// Randomizer R
        randomizer: [u8; 16],
    },
    /// Forget out-of-band pairing data for a peer
    RemoveRemoteOobData(PeerAddress),
    /// Start device discovery
    StartDiscovery(DiscoveryTypes),
    /// Stop device discovery
    StopDiscovery(DiscoveryTypes),
    /// Tell the controller whether a found device's name is known
    ConfirmName {
        /// Found peer
        peer: PeerAddress,
        /// Name already known, skip resolution
        name_known: bool,
    },
    /// Block a peer
    BlockDevice(PeerAddress),
    /// Unblock a peer
    UnblockDevice(PeerAddress),
    /// Set the device ID record
    SetDeviceId {
        /// Vendor ID source
        source: u16,
        /// Vendor ID
        vendor: u16,
        /// Product ID
        product: u16,
        /// Product version
        version: u16,
    },
}

impl Command {
    /// Opcode of this command
    pub fn opcode(&self) -> Opcode {
        match self {
            Command::ReadVersion => Opcode::ReadVersion,
            Command::ReadIndexList => Opcode::ReadIndexList,
            Command::ReadInfo => Opcode::ReadInfo,
            Command::SetPowered(_) => Opcode::SetPowered,
            Command::SetDiscoverable { .. } => Opcode::SetDiscoverable,
            Command::SetConnectable(_) => Opcode::SetConnectable,
            Command::SetFastConnectable(_) => Opcode::SetFastConnectable,
            Command::SetPairable(_) => Opcode::SetPairable,
            Command::SetSsp(_) => Opcode::SetSsp,
            Command::SetLe(_) => Opcode::SetLe,
            Command::SetDevClass { .. } => Opcode::SetDevClass,
            Command::SetLocalName(_) => Opcode::SetLocalName,
            Command::AddUuid { .. } => Opcode::AddUuid,
            Command::RemoveUuid(_) => Opcode::RemoveUuid,
            Command::LoadLinkKeys { .. } => Opcode::LoadLinkKeys,
            Command::LoadLongTermKeys(_) => Opcode::LoadLongTermKeys,
            Command::Disconnect(_) => Opcode::Disconnect,
            Command::GetConnections => Opcode::GetConnections,
            Command::PinCodeReply { .. } => Opcode::PinCodeReply,
            Command::PinCodeNegReply(_) => Opcode::PinCodeNegReply,
            Command::SetIoCapability(_) => Opcode::SetIoCapability,
            Command::PairDevice { .. } => Opcode::PairDevice,
            Command::CancelPairDevice(_) => Opcode::CancelPairDevice,
            Command::UnpairDevice { .. } => Opcode::UnpairDevice,
            Command::UserConfirmReply(_) => Opcode::UserConfirmReply,
            Command::UserConfirmNegReply(_) => Opcode::UserConfirmNegReply,
            Command::UserPasskeyReply { .. } => Opcode::UserPasskeyReply,
            Command::UserPasskeyNegReply(_) => Opcode::UserPasskeyNegReply,
            Command::ReadLocalOobData => Opcode::ReadLocalOobData,
            Command::AddRemoteOobData { .. } => Opcode::AddRemoteOobData,
            Command::RemoveRemoteOobData(_) => Opcode::RemoveRemoteOobData,
            Command::StartDiscovery(_) => Opcode::StartDiscovery,
            Command::StopDiscovery(_) => Opcode::StopDiscovery,
            Command::ConfirmName { .. } => Opcode::ConfirmName,
            Command::BlockDevice(_) => Opcode::BlockDevice,
            Command::UnblockDevice(_) => Opcode::UnblockDevice,
            Command::SetDeviceId { .. } => Opcode::SetDeviceId,
        }
    }

    /// Encode the payload (without header) into buffer
    pub fn encode_payload(&self, buf: &mut BytesMut) {
        match self {
            Command::ReadVersion
            | Command::ReadIndexList
            | Command::ReadInfo
            | Command::GetConnections
            | Command::ReadLocalOobData => {}

            Command::SetPowered(on)
            | Command::SetConnectable(on)
            | Command::SetFastConnectable(on)
            | Command::SetPairable(on)
            | Command::SetSsp(on)
            | Command::SetLe(on) => buf.put_u8(*on as u8),

            Command::SetDiscoverable { enabled, timeout } => {
                buf.put_u8(*enabled as u8);
                buf.put_u16_le(*timeout);
            }

            Command::SetDevClass { major, minor } => {
                buf.put_u8(*major);
                buf.put_u8(*minor);
            }

            Command::SetLocalName(name) => {
                let name = truncate_name(name, MAX_NAME_LENGTH - 1);
                buf.put_slice(name.as_bytes());
                buf.put_bytes(0, MAX_NAME_LENGTH - name.len());
                buf.put_bytes(0, MAX_SHORT_NAME_LENGTH);
            }

            Command::AddUuid { uuid, svc_hint } => {
                encode_uuid(uuid, buf);
                buf.put_u8(*svc_hint);
            }

            Command::RemoveUuid(uuid) => encode_uuid(uuid, buf),

            Command::LoadLinkKeys { debug_keys, keys } => {
                buf.put_u8(*debug_keys as u8);
                buf.put_u16_le(key_count(keys.len()));
                for key in keys {
                    key.encode(buf);
                }
            }

            Command::LoadLongTermKeys(keys) => {
                buf.put_u16_le(key_count(keys.len()));
                for key in keys {
                    key.encode(buf);
                }
            }

            Command::Disconnect(peer)
            | Command::PinCodeNegReply(peer)
            | Command::CancelPairDevice(peer)
            | Command::UserConfirmReply(peer)
            | Command::UserConfirmNegReply(peer)
            | Command::UserPasskeyNegReply(peer)
            | Command::RemoveRemoteOobData(peer)
            | Command::BlockDevice(peer)
            | Command::UnblockDevice(peer) => peer.encode(buf),

            Command::PinCodeReply { peer, pin } => {
                let len = pin.len().min(MAX_PIN_LENGTH);
                peer.encode(buf);
                buf.put_u8(len as u8);
                buf.put_slice(&pin[..len]);
                buf.put_bytes(0, MAX_PIN_LENGTH - len);
            }

            Command::SetIoCapability(io_cap) => buf.put_u8(*io_cap),

            Command::PairDevice { peer, io_cap } => {
                peer.encode(buf);
                buf.put_u8(*io_cap);
            }

            Command::UnpairDevice { peer, disconnect } => {
                peer.encode(buf);
                buf.put_u8(*disconnect as u8);
            }

            Command::UserPasskeyReply { peer, passkey } => {
                peer.encode(buf);
                buf.put_u32_le(*passkey);
            }

            Command::AddRemoteOobData {
                peer,
                hash,
                randomizer,
            } => {
                peer.encode(buf);
                buf.put_slice(hash);
                buf.put_slice(randomizer);
            }

            Command::StartDiscovery(types) | Command::StopDiscovery(types) => {
                buf.put_u8(types.bits())
            }

            Command::ConfirmName { peer, name_known } => {
                peer.encode(buf);
                buf.put_u8(*name_known as u8);
            }

            Command::SetDeviceId {
                source,
                vendor,
                product,
                version,
            } => {
                buf.put_u16_le(*source);
                buf.put_u16_le(*vendor);
                buf.put_u16_le(*product);
                buf.put_u16_le(*version);
            }
        }
    }

    /// Encode the full packet addressed to a controller index
    pub fn encode(&self, index: u16) -> Result<Bytes, WireError> {
        let mut payload = BytesMut::new();
        self.encode_payload(&mut payload);
        encode_command(self.opcode(), index, &payload)
    }
}

/// Frame an already packed command payload.
pub fn encode_command(opcode: Opcode, index: u16, payload: &[u8]) -> Result<Bytes, WireError> {
    encode_packet(opcode as u16, index, payload)
}

// Saturates; such a list never fits a packet and framing rejects it.
fn key_count(len: usize) -> u16 {
    u16::try_from(len).unwrap_or(u16::MAX)
}

fn truncate_name(name: &str, max: usize) -> &str {
    if name.len() <= max {
        return name;
    }

    let mut end = max;
    while !name.is_char_boundary(end) {
        end -= 1;
    }
    &name[..end]
}
