//! Decoders for command-complete reply bodies.

use crate::address::{Address, PeerAddress, ADDRESS_INFO_SIZE, ADDRESS_SIZE};
use crate::command::{MAX_NAME_LENGTH, MAX_SHORT_NAME_LENGTH};
use crate::error::WireError;
use crate::event::{c_string, DEV_CLASS_SIZE, LOCAL_NAME_SIZE};
use crate::opcode::{DiscoveryTypes, Settings};
use bytes::Buf;
use serde::{Deserialize, Serialize};

/// Size of the read-info reply
pub const READ_INFO_SIZE: usize =
    ADDRESS_SIZE + 1 + 2 + 4 + 4 + DEV_CLASS_SIZE + MAX_NAME_LENGTH + MAX_SHORT_NAME_LENGTH;

/// Size of the read-local-oob-data reply
pub const LOCAL_OOB_DATA_SIZE: usize = 32;

fn require(kind: &'static str, data: &[u8], required: usize) -> Result<(), WireError> {
    if data.len() < required {
        return Err(WireError::ShortPayload {
            kind,
            required,
            actual: data.len(),
        });
    }
    Ok(())
}

fn exact(kind: &'static str, data: &[u8], expected: usize) -> Result<(), WireError> {
    if data.len() != expected {
        return Err(WireError::PayloadSize {
            kind,
            expected,
            actual: data.len(),
        });
    }
    Ok(())
}

/// Management protocol version
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct VersionInfo {
    /// Major version
    pub version: u8,
    /// Revision
    pub revision: u16,
}

/// Controller information block
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ControllerInfo {
    /// Identity address
    pub address: Address,
    /// HCI version
    pub version: u8,
    /// Manufacturer ID
    pub manufacturer: u16,
    /// Settings the controller supports
    pub supported_settings: Settings,
    /// Settings currently active
    pub current_settings: Settings,
    /// Class of device
    pub dev_class: [u8; DEV_CLASS_SIZE],
    /// Local name
    pub name: String,
    /// Short local name
    pub short_name: String,
}

/// Local name as set or reported
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct LocalName {
    /// Complete name
    pub name: String,
    /// Short name
    pub short_name: String,
}

/// Out-of-band pairing data
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct OobData {
    /// Hash C
    pub hash: [u8; 16],
    /// Randomizer R
    pub randomizer: [u8; 16],
}

/// Decode a read-version reply
pub fn read_version(data: &[u8]) -> Result<VersionInfo, WireError> {
    require("read version reply", data, 3)?;
    let mut buf = data;
    Ok(VersionInfo {
        version: buf.get_u8(),
        revision: buf.get_u16_le(),
    })
}

/// Decode a read-index-list reply
pub fn read_index_list(data: &[u8]) -> Result<Vec<u16>, WireError> {
    require("index list reply", data, 2)?;
    let mut buf = data;
    let count = buf.get_u16_le() as usize;
    exact("index list reply", data, 2 + count * 2)?;
    Ok((0..count).map(|_| buf.get_u16_le()).collect())
}

/// Decode a read-info reply
pub fn read_info(data: &[u8]) -> Result<ControllerInfo, WireError> {
    require("read info reply", data, READ_INFO_SIZE)?;
    let mut buf = data;

    let address = Address::decode(&mut buf);
    let version = buf.get_u8();
    let manufacturer = buf.get_u16_le();
    let supported_settings = Settings::from_raw(buf.get_u32_le());
    let current_settings = Settings::from_raw(buf.get_u32_le());
    let mut dev_class = [0u8; DEV_CLASS_SIZE];
    buf.copy_to_slice(&mut dev_class);

    let LocalName { name, short_name } = local_name(buf)?;

    Ok(ControllerInfo {
        address,
        version,
        manufacturer,
        supported_settings,
        current_settings,
        dev_class,
        name,
        short_name,
    })
}

/// Decode a settings reply (the set-mode commands)
pub fn settings(data: &[u8]) -> Result<Settings, WireError> {
    require("settings reply", data, 4)?;
    let mut buf = data;
    Ok(Settings::from_raw(buf.get_u32_le()))
}

/// Decode a class-of-device reply
pub fn class_of_device(data: &[u8]) -> Result<[u8; DEV_CLASS_SIZE], WireError> {
    require("class of device reply", data, DEV_CLASS_SIZE)?;
    let mut class = [0u8; DEV_CLASS_SIZE];
    class.copy_from_slice(&data[..DEV_CLASS_SIZE]);
    Ok(class)
}

/// Decode a local name block
pub fn local_name(data: &[u8]) -> Result<LocalName, WireError> {
    require("local name", data, LOCAL_NAME_SIZE)?;
    Ok(LocalName {
        name: c_string(&data[..MAX_NAME_LENGTH]),
        short_name: c_string(&data[MAX_NAME_LENGTH..LOCAL_NAME_SIZE]),
    })
}

/// Decode a reply consisting of a peer address (disconnect, pair device)
pub fn address_info(data: &[u8]) -> Result<PeerAddress, WireError> {
    require("address reply", data, ADDRESS_INFO_SIZE)?;
    let mut buf = data;
    PeerAddress::decode(&mut buf)
}

/// Decode a get-connections reply
pub fn connection_list(data: &[u8]) -> Result<Vec<PeerAddress>, WireError> {
    require("connection list reply", data, 2)?;
    let mut buf = data;
    let count = buf.get_u16_le() as usize;
    exact("connection list reply", data, 2 + count * ADDRESS_INFO_SIZE)?;
    (0..count).map(|_| PeerAddress::decode(&mut buf)).collect()
}

/// Decode a read-local-oob-data reply
pub fn local_oob_data(data: &[u8]) -> Result<OobData, WireError> {
    exact("local oob data reply", data, LOCAL_OOB_DATA_SIZE)?;
    let mut hash = [0u8; 16];
    let mut randomizer = [0u8; 16];
    hash.copy_from_slice(&data[..16]);
    randomizer.copy_from_slice(&data[16..]);
    Ok(OobData { hash, randomizer })
}

/// Decode a start-discovery reply
pub fn discovery_type(data: &[u8]) -> Result<DiscoveryTypes, WireError> {
    exact("discovery reply", data, 1)?;
    Ok(DiscoveryTypes::from_bits_retain(data[0]))
}
