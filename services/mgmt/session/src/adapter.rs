//! Interface to the adapter/device model the driver reports to.
//!
//! Adapters are identified by their controller identity address, devices
//! by the adapter plus the peer address. The driver never holds references
//! into the model; every call names what it is about.

use mgmt_wire::{
    Address, DisconnectReason, EirData, LinkKeyInfo, LongTermKeyInfo, OobData, PeerAddress,
    Settings, Status,
};
use serde::{Deserialize, Serialize};
use std::fmt::Debug;

/// Mode bits pushed to the adapter after every settings change
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct AppliedSettings {
    /// Page scan enabled
    pub connectable: bool,
    /// Inquiry scan enabled
    pub discoverable: bool,
    /// Incoming pairing accepted
    pub pairable: bool,
}

impl From<Settings> for AppliedSettings {
    fn from(settings: Settings) -> Self {
        Self {
            connectable: settings.contains(Settings::CONNECTABLE),
            discoverable: settings.contains(Settings::DISCOVERABLE),
            pairable: settings.contains(Settings::PAIRABLE),
        }
    }
}

/// PIN configured for a peer
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct PinCode {
    /// PIN digits
    pub pin: String,
    /// Show the PIN to the user instead of answering directly
    pub display: bool,
}

/// A device reported by discovery
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct DeviceFound {
    /// Peer address and type
    pub peer: PeerAddress,
    /// Signal strength
    pub rssi: i8,
    /// Controller asks whether the name is already known
    pub confirm_name: bool,
    /// Peer uses legacy pairing
    pub legacy_pairing: bool,
    /// Parsed advertising data, empty when none was carried
    pub eir: EirData,
}

/// Adapter/device model consumed by the driver
pub trait AdapterManager: Send + Sync + Debug {
    /// Register a controller; returns `false` if the model refused it
    fn register_adapter(&self, index: u16, address: &Address, powered: bool) -> bool;
    /// A controller went away
    fn unregister_adapter(&self, index: u16);
    /// Whether an adapter with this identity is registered
    fn has_adapter(&self, adapter: &Address) -> bool;
    /// Adapter powered on (start) or off (stop)
    fn notify_power(&self, adapter: &Address, powered: bool);
    /// Connectable/discoverable/pairable changed
    fn notify_settings(&self, adapter: &Address, settings: AppliedSettings);
    /// Locally configured name, if any
    fn configured_name(&self, adapter: &Address) -> Option<String>;
    /// Locally configured (major, minor) device class
    fn configured_class(&self, adapter: &Address) -> (u8, u8);
    /// Controller name changed
    fn notify_name_changed(&self, adapter: &Address, name: &str);
    /// Controller class of device changed
    fn notify_class_changed(&self, adapter: &Address, class: [u8; 3]);
    /// Discovery started or stopped
    fn notify_discovering(&self, adapter: &Address, discovering: bool);
    /// Local out-of-band data read, `None` when unavailable
    fn notify_local_oob_data(&self, adapter: &Address, data: Option<&OobData>);
    /// A device was found during discovery
    fn notify_device_found(&self, adapter: &Address, found: &DeviceFound);
    /// Remember a resolved remote name
    fn store_cached_name(&self, adapter: &Address, peer: &Address, name: &str);
    /// Pairing with a peer finished
    fn notify_bonding_result(&self, adapter: &Address, peer: &PeerAddress, status: Status);

    /// Look up a device, creating it if needed; `false` if that failed
    fn find_or_create_device(&self, adapter: &Address, peer: &PeerAddress) -> bool;
    /// Whether a device exists
    fn find_device(&self, adapter: &Address, peer: &PeerAddress) -> bool;
    /// Device class learned from advertising data
    fn set_device_class(&self, adapter: &Address, peer: &PeerAddress, class: u32);
    /// Device name learned from advertising data
    fn notify_device_name(&self, adapter: &Address, peer: &PeerAddress, name: &str);
    /// Device connected
    fn notify_connected(&self, adapter: &Address, peer: &PeerAddress);
    /// Device disconnected
    fn notify_disconnected(&self, adapter: &Address, peer: &PeerAddress, reason: DisconnectReason);
    /// Connecting to an existing device failed
    fn notify_connect_failed(&self, adapter: &Address, peer: &PeerAddress, status: Status);
    /// Device blocked or unblocked
    fn notify_blocked(&self, adapter: &Address, peer: &PeerAddress, blocked: bool);
    /// Device pairing removed by the controller
    fn notify_unpaired(&self, adapter: &Address, peer: &PeerAddress);
    /// Device now has persistent keys
    fn notify_bonded(&self, adapter: &Address, peer: &PeerAddress);

    /// PIN configured for this peer, if any
    fn get_configured_pin(&self, adapter: &Address, peer: &PeerAddress) -> Option<PinCode>;
    /// Whether a locally initiated pairing with this peer is in progress
    fn device_is_bonding(&self, adapter: &Address, peer: &PeerAddress) -> bool;
    /// Display a PIN to the user
    fn notify_pin(
        &self,
        adapter: &Address,
        peer: &PeerAddress,
        secure: bool,
        pin: &str,
    ) -> anyhow::Result<()>;
    /// Ask the user for a PIN; the answer comes back through `pincode_reply`
    fn request_pin(&self, adapter: &Address, peer: &PeerAddress, secure: bool)
        -> anyhow::Result<()>;
    /// Ask the user for a passkey; the answer comes back through `passkey_reply`
    fn request_passkey(&self, adapter: &Address, peer: &PeerAddress) -> anyhow::Result<()>;
    /// Display a passkey to the user
    fn notify_passkey(
        &self,
        adapter: &Address,
        peer: &PeerAddress,
        passkey: u32,
        entered: u8,
    ) -> anyhow::Result<()>;
    /// Ask the user to confirm a value; the answer comes back through `confirm_reply`
    fn confirm_passkey(
        &self,
        adapter: &Address,
        peer: &PeerAddress,
        value: u32,
        confirm_hint: bool,
    ) -> anyhow::Result<()>;

    /// Persist a link key
    fn store_link_key(&self, adapter: &Address, key: &LinkKeyInfo);
    /// Persist a long term key
    fn store_long_term_key(&self, adapter: &Address, key: &LongTermKeyInfo);
}
