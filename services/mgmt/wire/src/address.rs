//! Bluetooth device addresses as carried by the management protocol.

use crate::error::WireError;
use bytes::{Buf, BufMut};
use serde::{Deserialize, Serialize};
use std::fmt;
use std::str::FromStr;

/// Size of a device address on the wire
pub const ADDRESS_SIZE: usize = 6;

/// Size of an address-info block (address + type) on the wire
pub const ADDRESS_INFO_SIZE: usize = 7;

/// 48-bit device address, stored in wire (little-endian) order
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
pub struct Address(pub [u8; ADDRESS_SIZE]);

impl Address {
    /// The all-zero address
    pub const ANY: Address = Address([0; ADDRESS_SIZE]);

    /// Build an address from its wire bytes
    pub fn from_wire(bytes: [u8; ADDRESS_SIZE]) -> Self {
        Self(bytes)
    }

    /// Whether this is the all-zero address
    pub fn is_any(&self) -> bool {
        *self == Self::ANY
    }

    pub(crate) fn decode(buf: &mut &[u8]) -> Self {
        let mut bytes = [0u8; ADDRESS_SIZE];
        buf.copy_to_slice(&mut bytes);
        Self(bytes)
    }

    pub(crate) fn encode<B: BufMut>(&self, buf: &mut B) {
        buf.put_slice(&self.0);
    }
}

impl fmt::Display for Address {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let b = &self.0;
        write!(
            f,
            "{:02X}:{:02X}:{:02X}:{:02X}:{:02X}:{:02X}",
            b[5], b[4], b[3], b[2], b[1], b[0]
        )
    }
}

impl FromStr for Address {
    type Err = WireError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        let mut bytes = [0u8; ADDRESS_SIZE];
        let mut parts = s.split(':');

        for slot in bytes.iter_mut().rev() {
            let part = parts
                .next()
                .ok_or_else(|| WireError::InvalidAddress(s.to_string()))?;
            if part.len() != 2 {
                return Err(WireError::InvalidAddress(s.to_string()));
            }
            *slot = u8::from_str_radix(part, 16)
                .map_err(|_| WireError::InvalidAddress(s.to_string()))?;
        }

        if parts.next().is_some() {
            return Err(WireError::InvalidAddress(s.to_string()));
        }

        Ok(Self(bytes))
    }
}

/// Address type of a peer
#[repr(u8)]
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
pub enum AddressType {
    /// BR/EDR (classic)
    #[default]
    BrEdr = 0x00,
    /// LE public
    LePublic = 0x01,
    /// LE random
    LeRandom = 0x02,
}

impl TryFrom<u8> for AddressType {
    type Error = WireError;

    fn try_from(value: u8) -> Result<Self, Self::Error> {
        match value {
            0x00 => Ok(AddressType::BrEdr),
            0x01 => Ok(AddressType::LePublic),
            0x02 => Ok(AddressType::LeRandom),
            _ => Err(WireError::AddressType(value)),
        }
    }
}

/// Peer address with its address type (the `addr_info` block)
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
pub struct PeerAddress {
    /// Device address
    pub address: Address,
    /// Address type
    pub kind: AddressType,
}

impl PeerAddress {
    /// Create a peer address
    pub fn new(address: Address, kind: AddressType) -> Self {
        Self { address, kind }
    }

    /// Classic (BR/EDR) peer address
    pub fn bredr(address: Address) -> Self {
        Self::new(address, AddressType::BrEdr)
    }

    pub(crate) fn decode(buf: &mut &[u8]) -> Result<Self, WireError> {
        let address = Address::decode(buf);
        let kind = AddressType::try_from(buf.get_u8())?;
        Ok(Self { address, kind })
    }

    pub(crate) fn encode<B: BufMut>(&self, buf: &mut B) {
        self.address.encode(buf);
        buf.put_u8(self.kind as u8);
    }
}

impl fmt::Display for PeerAddress {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{} ({:?})", self.address, self.kind)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_address_display_is_reversed_wire_order() {
        let addr = Address([0x66, 0x55, 0x44, 0x33, 0x22, 0x11]);
        assert_eq!(addr.to_string(), "11:22:33:44:55:66");
    }

    #[test]
    fn test_address_parse() {
        let addr: Address = "11:22:33:44:55:66".parse().unwrap();
        assert_eq!(addr.0, [0x66, 0x55, 0x44, 0x33, 0x22, 0x11]);

        assert!("11:22:33:44:55".parse::<Address>().is_err());
        assert!("11:22:33:44:55:66:77".parse::<Address>().is_err());
        assert!("11:22:33:44:55:GG".parse::<Address>().is_err());
    }

    #[test]
    fn test_address_type_conversion() {
        assert_eq!(AddressType::try_from(0x02).unwrap(), AddressType::LeRandom);
        assert!(AddressType::try_from(0x03).is_err());
    }

    #[test]
    fn test_peer_address_decode() {
        let raw = [1u8, 2, 3, 4, 5, 6, 1];
        let mut buf = &raw[..];
        let peer = PeerAddress::decode(&mut buf).unwrap();
        assert_eq!(peer.address.0, [1, 2, 3, 4, 5, 6]);
        assert_eq!(peer.kind, AddressType::LePublic);
        assert!(buf.is_empty());
    }
}
