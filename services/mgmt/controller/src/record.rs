//! Per-controller protocol state.

use crate::pending::PendingOps;
use mgmt_wire::{Address, ControllerInfo, DiscoveryTypes, PeerAddress, Settings};
use std::collections::BTreeSet;

/// Settings before and after a settings-changed signal
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct SettingsTransition {
    /// Settings before the change
    pub old: Settings,
    /// Settings after the change
    pub new: Settings,
}

impl SettingsTransition {
    /// Whether the powered bit flipped
    pub fn power_changed(&self) -> bool {
        self.old.powered() != self.new.powered()
    }

    /// Powered bit went from off to on
    pub fn powered_on(&self) -> bool {
        !self.old.powered() && self.new.powered()
    }

    /// Powered bit went from on to off
    pub fn powered_off(&self) -> bool {
        self.old.powered() && !self.new.powered()
    }
}

/// State of one hardware controller
#[derive(Debug, Clone, Default)]
pub struct ControllerRecord {
    index: u16,
    address: Option<Address>,
    supported_settings: Settings,
    current_settings: Settings,
    connections: BTreeSet<PeerAddress>,
    discovery_types: DiscoveryTypes,
    pending: PendingOps,
}

impl ControllerRecord {
    /// Create a zeroed record
    pub fn new(index: u16) -> Self {
        Self {
            index,
            ..Default::default()
        }
    }

    /// Controller index
    pub fn index(&self) -> u16 {
        self.index
    }

    /// Identity address, all-zero until the info block was read
    pub fn address(&self) -> Address {
        self.address.unwrap_or(Address::ANY)
    }

    /// Whether the info block was read
    pub fn has_info(&self) -> bool {
        self.address.is_some()
    }

    /// Apply a read-info reply.
    ///
    /// Identity and supported settings are taken from the first reply only;
    /// current settings are replaced every time. Returns `true` for the
    /// first reply.
    pub fn apply_info(&mut self, info: &ControllerInfo) -> bool {
        self.current_settings = info.current_settings;

        if self.address.is_some() {
            return false;
        }

        self.address = Some(info.address);
        self.supported_settings = info.supported_settings;
        true
    }

    /// Settings the controller supports
    pub fn supported_settings(&self) -> Settings {
        self.supported_settings
    }

    /// Settings currently active
    pub fn current_settings(&self) -> Settings {
        self.current_settings
    }

    /// Whether a setting is supported
    pub fn supports(&self, setting: Settings) -> bool {
        self.supported_settings.contains(setting)
    }

    /// Whether a setting is currently active
    pub fn is_set(&self, setting: Settings) -> bool {
        self.current_settings.contains(setting)
    }

    /// Replace the settings bitmask as a unit
    pub fn replace_settings(&mut self, new: Settings) -> SettingsTransition {
        let old = std::mem::replace(&mut self.current_settings, new);
        SettingsTransition { old, new }
    }

    /// Open connections
    pub fn connections(&self) -> impl Iterator<Item = &PeerAddress> {
        self.connections.iter()
    }

    /// Track a new connection, returning `false` if already known
    pub fn add_connection(&mut self, peer: PeerAddress) -> bool {
        self.connections.insert(peer)
    }

    /// Forget a connection, returning `false` if it was not known
    pub fn remove_connection(&mut self, peer: &PeerAddress) -> bool {
        self.connections.remove(peer)
    }

    /// Replace the connection set with a fresh snapshot
    pub fn replace_connections<I>(&mut self, peers: I)
    where
        I: IntoIterator<Item = PeerAddress>,
    {
        self.connections = peers.into_iter().collect();
    }

    /// Address types used by the last discovery request
    pub fn discovery_types(&self) -> DiscoveryTypes {
        self.discovery_types
    }

    /// Remember the address types of a discovery request
    pub fn set_discovery_types(&mut self, types: DiscoveryTypes) {
        self.discovery_types = types;
    }

    /// Pending-operation state
    pub fn pending(&self) -> &PendingOps {
        &self.pending
    }

    /// Mutable pending-operation state
    pub fn pending_mut(&mut self) -> &mut PendingOps {
        &mut self.pending
    }
}
