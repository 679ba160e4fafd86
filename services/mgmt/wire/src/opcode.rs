//! Opcode, event code, status and bitmask tables of the management ABI.

use crate::error::WireError;
use bitflags::bitflags;
use serde::{Deserialize, Serialize};
use std::fmt;

/// Command opcodes
#[repr(u16)]
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum Opcode {
    /// Read management version
    ReadVersion = 0x0001,
    /// Read supported commands
    ReadCommands = 0x0002,
    /// Read controller index list
    ReadIndexList = 0x0003,
    /// Read controller information
    ReadInfo = 0x0004,
    /// Set powered
    SetPowered = 0x0005,
    /// Set discoverable
    SetDiscoverable = 0x0006,
    /// Set connectable
    SetConnectable = 0x0007,
    /// Set fast connectable
    SetFastConnectable = 0x0008,
    /// Set pairable
    SetPairable = 0x0009,
    /// Set link security
    SetLinkSecurity = 0x000A,
    /// Set secure simple pairing
    SetSsp = 0x000B,
    /// Set high speed
    SetHs = 0x000C,
    /// Set low energy
    SetLe = 0x000D,
    /// Set device class
    SetDevClass = 0x000E,
    /// Set local name
    SetLocalName = 0x000F,
    /// Add service UUID
    AddUuid = 0x0010,
    /// Remove service UUID
    RemoveUuid = 0x0011,
    /// Load link keys
    LoadLinkKeys = 0x0012,
    /// Load long term keys
    LoadLongTermKeys = 0x0013,
    /// Disconnect
    Disconnect = 0x0014,
    /// Get connections
    GetConnections = 0x0015,
    /// PIN code reply
    PinCodeReply = 0x0016,
    /// PIN code negative reply
    PinCodeNegReply = 0x0017,
    /// Set IO capability
    SetIoCapability = 0x0018,
    /// Pair device
    PairDevice = 0x0019,
    /// Cancel pair device
    CancelPairDevice = 0x001A,
    /// Unpair device
    UnpairDevice = 0x001B,
    /// User confirmation reply
    UserConfirmReply = 0x001C,
    /// User confirmation negative reply
    UserConfirmNegReply = 0x001D,
    /// User passkey reply
    UserPasskeyReply = 0x001E,
    /// User passkey negative reply
    UserPasskeyNegReply = 0x001F,
    /// Read local out-of-band data
    ReadLocalOobData = 0x0020,
    /// Add remote out-of-band data
    AddRemoteOobData = 0x0021,
    /// Remove remote out-of-band data
    RemoveRemoteOobData = 0x0022,
    /// Start discovery
    StartDiscovery = 0x0023,
    /// Stop discovery
    StopDiscovery = 0x0024,
    /// Confirm name
    ConfirmName = 0x0025,
    /// Block device
    BlockDevice = 0x0026,
    /// Unblock device
    UnblockDevice = 0x0027,
    /// Set device ID
    SetDeviceId = 0x0028,
}

impl Opcode {
    /// Human readable command name
    pub fn name(self) -> &'static str {
        match self {
            Opcode::ReadVersion => "Read Version",
            Opcode::ReadCommands => "Read Commands",
            Opcode::ReadIndexList => "Read Index List",
            Opcode::ReadInfo => "Read Controller Info",
            Opcode::SetPowered => "Set Powered",
            Opcode::SetDiscoverable => "Set Discoverable",
            Opcode::SetConnectable => "Set Connectable",
            Opcode::SetFastConnectable => "Set Fast Connectable",
            Opcode::SetPairable => "Set Pairable",
            Opcode::SetLinkSecurity => "Set Link Security",
            Opcode::SetSsp => "Set Secure Simple Pairing",
            Opcode::SetHs => "Set High Speed",
            Opcode::SetLe => "Set Low Energy",
            Opcode::SetDevClass => "Set Dev Class",
            Opcode::SetLocalName => "Set Local Name",
            Opcode::AddUuid => "Add UUID",
            Opcode::RemoveUuid => "Remove UUID",
            Opcode::LoadLinkKeys => "Load Link Keys",
            Opcode::LoadLongTermKeys => "Load Long Term Keys",
            Opcode::Disconnect => "Disconnect",
            Opcode::GetConnections => "Get Connections",
            Opcode::PinCodeReply => "PIN Code Reply",
            Opcode::PinCodeNegReply => "PIN Code Neg Reply",
            Opcode::SetIoCapability => "Set IO Capability",
            Opcode::PairDevice => "Pair Device",
            Opcode::CancelPairDevice => "Cancel Pair Device",
            Opcode::UnpairDevice => "Unpair Device",
            Opcode::UserConfirmReply => "User Confirm Reply",
            Opcode::UserConfirmNegReply => "User Confirm Neg Reply",
            Opcode::UserPasskeyReply => "User Passkey Reply",
            Opcode::UserPasskeyNegReply => "User Passkey Neg Reply",
            Opcode::ReadLocalOobData => "Read Local OOB Data",
            Opcode::AddRemoteOobData => "Add Remote OOB Data",
            Opcode::RemoveRemoteOobData => "Remove Remote OOB Data",
            Opcode::StartDiscovery => "Start Discovery",
            Opcode::StopDiscovery => "Stop Discovery",
            Opcode::ConfirmName => "Confirm Name",
            Opcode::BlockDevice => "Block Device",
            Opcode::UnblockDevice => "Unblock Device",
            Opcode::SetDeviceId => "Set Device ID",
        }
    }
}

impl fmt::Display for Opcode {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.name())
    }
}

impl TryFrom<u16> for Opcode {
    type Error = WireError;

    fn try_from(value: u16) -> Result<Self, Self::Error> {
        let opcode = match value {
            0x0001 => Opcode::ReadVersion,
            0x0002 => Opcode::ReadCommands,
            0x0003 => Opcode::ReadIndexList,
            0x0004 => Opcode::ReadInfo,
            0x0005 => Opcode::SetPowered,
            0x0006 => Opcode::SetDiscoverable,
            0x0007 => Opcode::SetConnectable,
            0x0008 => Opcode::SetFastConnectable,
            0x0009 => Opcode::SetPairable,
            0x000A => Opcode::SetLinkSecurity,
            0x000B => Opcode::SetSsp,
            0x000C => Opcode::SetHs,
            0x000D => Opcode::SetLe,
            0x000E => Opcode::SetDevClass,
            0x000F => Opcode::SetLocalName,
            0x0010 => Opcode::AddUuid,
            0x0011 => Opcode::RemoveUuid,
            0x0012 => Opcode::LoadLinkKeys,
            0x0013 => Opcode::LoadLongTermKeys,
            0x0014 => Opcode::Disconnect,
            0x0015 => Opcode::GetConnections,
            0x0016 => Opcode::PinCodeReply,
            0x0017 => Opcode::PinCodeNegReply,
            0x0018 => Opcode::SetIoCapability,
            0x0019 => Opcode::PairDevice,
            0x001A => Opcode::CancelPairDevice,
            0x001B => Opcode::UnpairDevice,
            0x001C => Opcode::UserConfirmReply,
            0x001D => Opcode::UserConfirmNegReply,
            0x001E => Opcode::UserPasskeyReply,
            0x001F => Opcode::UserPasskeyNegReply,
            0x0020 => Opcode::ReadLocalOobData,
            0x0021 => Opcode::AddRemoteOobData,
            0x0022 => Opcode::RemoveRemoteOobData,
            0x0023 => Opcode::StartDiscovery,
            0x0024 => Opcode::StopDiscovery,
            0x0025 => Opcode::ConfirmName,
            0x0026 => Opcode::BlockDevice,
            0x0027 => Opcode::UnblockDevice,
            0x0028 => Opcode::SetDeviceId,
            _ => return Err(WireError::UnknownOpcode(value)),
        };
        Ok(opcode)
    }
}

/// Event codes
#[repr(u16)]
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum EventCode {
    /// Command complete
    CommandComplete = 0x0001,
    /// Command status
    CommandStatus = 0x0002,
    /// Controller error
    ControllerError = 0x0003,
    /// Index added
    IndexAdded = 0x0004,
    /// Index removed
    IndexRemoved = 0x0005,
    /// New settings
    NewSettings = 0x0006,
    /// Class of device changed
    ClassOfDevChanged = 0x0007,
    /// Local name changed
    LocalNameChanged = 0x0008,
    /// New link key
    NewLinkKey = 0x0009,
    /// New long term key
    NewLongTermKey = 0x000A,
    /// Device connected
    DeviceConnected = 0x000B,
    /// Device disconnected
    DeviceDisconnected = 0x000C,
    /// Connect failed
    ConnectFailed = 0x000D,
    /// PIN code request
    PinCodeRequest = 0x000E,
    /// User confirmation request
    UserConfirmRequest = 0x000F,
    /// User passkey request
    UserPasskeyRequest = 0x0010,
    /// Authentication failed
    AuthFailed = 0x0011,
    /// Device found
    DeviceFound = 0x0012,
    /// Discovering
    Discovering = 0x0013,
    /// Device blocked
    DeviceBlocked = 0x0014,
    /// Device unblocked
    DeviceUnblocked = 0x0015,
    /// Device unpaired
    DeviceUnpaired = 0x0016,
    /// Passkey notify
    PasskeyNotify = 0x0017,
}

impl TryFrom<u16> for EventCode {
    type Error = WireError;

    fn try_from(value: u16) -> Result<Self, Self::Error> {
        let code = match value {
            0x0001 => EventCode::CommandComplete,
            0x0002 => EventCode::CommandStatus,
            0x0003 => EventCode::ControllerError,
            0x0004 => EventCode::IndexAdded,
            0x0005 => EventCode::IndexRemoved,
            0x0006 => EventCode::NewSettings,
            0x0007 => EventCode::ClassOfDevChanged,
            0x0008 => EventCode::LocalNameChanged,
            0x0009 => EventCode::NewLinkKey,
            0x000A => EventCode::NewLongTermKey,
            0x000B => EventCode::DeviceConnected,
            0x000C => EventCode::DeviceDisconnected,
            0x000D => EventCode::ConnectFailed,
            0x000E => EventCode::PinCodeRequest,
            0x000F => EventCode::UserConfirmRequest,
            0x0010 => EventCode::UserPasskeyRequest,
            0x0011 => EventCode::AuthFailed,
            0x0012 => EventCode::DeviceFound,
            0x0013 => EventCode::Discovering,
            0x0014 => EventCode::DeviceBlocked,
            0x0015 => EventCode::DeviceUnblocked,
            0x0016 => EventCode::DeviceUnpaired,
            0x0017 => EventCode::PasskeyNotify,
            _ => return Err(WireError::UnknownEvent(value)),
        };
        Ok(code)
    }
}

/// Command status codes
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum Status {
    /// Success
    Success,
    /// Unknown command
    UnknownCommand,
    /// Not connected
    NotConnected,
    /// Failed
    Failed,
    /// Connect failed
    ConnectFailed,
    /// Authentication failed
    AuthFailed,
    /// Not paired
    NotPaired,
    /// No resources
    NoResources,
    /// Timeout
    Timeout,
    /// Already connected
    AlreadyConnected,
    /// Busy
    Busy,
    /// Rejected
    Rejected,
    /// Not supported
    NotSupported,
    /// Invalid parameters
    InvalidParams,
    /// Disconnected
    Disconnected,
    /// Not powered
    NotPowered,
    /// Cancelled
    Cancelled,
    /// Invalid index
    InvalidIndex,
    /// Code outside the known table
    Other(u8),
}

impl Status {
    /// Raw status byte
    pub fn code(self) -> u8 {
        match self {
            Status::Success => 0x00,
            Status::UnknownCommand => 0x01,
            Status::NotConnected => 0x02,
            Status::Failed => 0x03,
            Status::ConnectFailed => 0x04,
            Status::AuthFailed => 0x05,
            Status::NotPaired => 0x06,
            Status::NoResources => 0x07,
            Status::Timeout => 0x08,
            Status::AlreadyConnected => 0x09,
            Status::Busy => 0x0A,
            Status::Rejected => 0x0B,
            Status::NotSupported => 0x0C,
            Status::InvalidParams => 0x0D,
            Status::Disconnected => 0x0E,
            Status::NotPowered => 0x0F,
            Status::Cancelled => 0x10,
            Status::InvalidIndex => 0x11,
            Status::Other(code) => code,
        }
    }

    /// Whether this status reports success
    pub fn is_success(self) -> bool {
        self == Status::Success
    }

    /// Human readable status text
    pub fn description(self) -> &'static str {
        match self {
            Status::Success => "Success",
            Status::UnknownCommand => "Unknown Command",
            Status::NotConnected => "Not Connected",
            Status::Failed => "Failed",
            Status::ConnectFailed => "Connect Failed",
            Status::AuthFailed => "Authentication Failed",
            Status::NotPaired => "Not Paired",
            Status::NoResources => "No Resources",
            Status::Timeout => "Timeout",
            Status::AlreadyConnected => "Already Connected",
            Status::Busy => "Busy",
            Status::Rejected => "Rejected",
            Status::NotSupported => "Not Supported",
            Status::InvalidParams => "Invalid Parameters",
            Status::Disconnected => "Disconnected",
            Status::NotPowered => "Not Powered",
            Status::Cancelled => "Cancelled",
            Status::InvalidIndex => "Invalid Index",
            Status::Other(_) => "Unknown Status",
        }
    }
}

impl From<u8> for Status {
    fn from(value: u8) -> Self {
        match value {
            0x00 => Status::Success,
            0x01 => Status::UnknownCommand,
            0x02 => Status::NotConnected,
            0x03 => Status::Failed,
            0x04 => Status::ConnectFailed,
            0x05 => Status::AuthFailed,
            0x06 => Status::NotPaired,
            0x07 => Status::NoResources,
            0x08 => Status::Timeout,
            0x09 => Status::AlreadyConnected,
            0x0A => Status::Busy,
            0x0B => Status::Rejected,
            0x0C => Status::NotSupported,
            0x0D => Status::InvalidParams,
            0x0E => Status::Disconnected,
            0x0F => Status::NotPowered,
            0x10 => Status::Cancelled,
            0x11 => Status::InvalidIndex,
            other => Status::Other(other),
        }
    }
}

impl fmt::Display for Status {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{} (0x{:02x})", self.description(), self.code())
    }
}

bitflags! {
    /// Controller settings bitmask
    #[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Hash, Serialize, Deserialize)]
    pub struct Settings: u32 {
        /// Controller is powered
        const POWERED = 1 << 0;
        /// Page scan enabled
        const CONNECTABLE = 1 << 1;
        /// Fast connectable page scan parameters
        const FAST_CONNECTABLE = 1 << 2;
        /// Inquiry scan enabled
        const DISCOVERABLE = 1 << 3;
        /// Incoming pairing accepted
        const PAIRABLE = 1 << 4;
        /// Link level security
        const LINK_SECURITY = 1 << 5;
        /// Secure simple pairing
        const SSP = 1 << 6;
        /// Classic radio
        const BREDR = 1 << 7;
        /// High speed
        const HS = 1 << 8;
        /// Low energy
        const LE = 1 << 9;
    }
}

impl Settings {
    /// Decode a raw bitmask, keeping bits this table does not name
    pub fn from_raw(bits: u32) -> Self {
        Self::from_bits_retain(bits)
    }

    /// Whether the powered bit is set
    pub fn powered(self) -> bool {
        self.contains(Settings::POWERED)
    }
}

bitflags! {
    /// Flags carried by the device-found event
    #[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
    pub struct DeviceFoundFlags: u32 {
        /// Remote name resolution should be confirmed
        const CONFIRM_NAME = 1 << 0;
        /// Remote uses legacy pairing
        const LEGACY_PAIRING = 1 << 1;
    }
}

bitflags! {
    /// Address types selected for a discovery session
    #[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
    pub struct DiscoveryTypes: u8 {
        /// BR/EDR inquiry
        const BREDR = 1 << 0;
        /// LE public scanning
        const LE_PUBLIC = 1 << 1;
        /// LE random scanning
        const LE_RANDOM = 1 << 2;
    }
}

impl DiscoveryTypes {
    /// Both LE address types
    pub const LE: DiscoveryTypes = DiscoveryTypes::LE_PUBLIC.union(DiscoveryTypes::LE_RANDOM);

    /// Discovery types usable with the given controller settings
    pub fn for_settings(settings: Settings) -> Self {
        let mut types = DiscoveryTypes::empty();
        if settings.contains(Settings::BREDR) {
            types |= DiscoveryTypes::BREDR;
        }
        if settings.contains(Settings::LE) {
            types |= DiscoveryTypes::LE;
        }
        types
    }
}

/// Reason codes of the device-disconnected event
#[repr(u8)]
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum DisconnectReason {
    /// Unspecified
    Unknown = 0x00,
    /// Link supervision timeout
    Timeout = 0x01,
    /// Terminated by the local host
    LocalHost = 0x02,
    /// Terminated by the remote side
    Remote = 0x03,
}

impl From<u8> for DisconnectReason {
    fn from(value: u8) -> Self {
        match value {
            0x01 => DisconnectReason::Timeout,
            0x02 => DisconnectReason::LocalHost,
            0x03 => DisconnectReason::Remote,
            _ => DisconnectReason::Unknown,
        }
    }
}
