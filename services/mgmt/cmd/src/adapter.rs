//! Default adapter model for the standalone daemon.
//!
//! Keeps the registered adapters and known devices in memory, answers
//! configuration lookups from [`MgmtConfig`] and logs every notification.
//! There is no user agent, so interactive pairing requests are refused.

use crate::config::MgmtConfig;
use crate::{component_debug, component_info, component_warn};
use anyhow::{bail, Result};
use mgmt_session::{AdapterManager, AppliedSettings, DeviceFound, PinCode};
use mgmt_wire::{
    Address, DisconnectReason, LinkKeyInfo, LongTermKeyInfo, OobData, PeerAddress, Status,
};
use std::collections::{HashMap, HashSet};
use std::sync::Mutex;
use tokio::sync::mpsc;

const COMPONENT: &str = "adapter";

#[derive(Debug, Default)]
struct Model {
    adapters: HashMap<u16, Address>,
    devices: HashSet<(Address, PeerAddress)>,
}

/// In-memory adapter model that logs what the driver reports
#[derive(Debug)]
pub struct LoggingAdapterManager {
    local_name: Option<String>,
    class: (u8, u8),
    pin: Option<String>,
    registered: mpsc::UnboundedSender<u16>,
    model: Mutex<Model>,
}

impl LoggingAdapterManager {
    /// Create the model; indices of newly registered adapters are sent on
    /// `registered`
    pub fn new(config: &MgmtConfig, registered: mpsc::UnboundedSender<u16>) -> Self {
        Self {
            local_name: config.local_name.clone(),
            class: (config.class_major, config.class_minor),
            pin: config.default_pin.clone(),
            registered,
            model: Mutex::new(Model::default()),
        }
    }

    fn with_model<R>(&self, f: impl FnOnce(&mut Model) -> R) -> R {
        let mut model = match self.model.lock() {
            Ok(model) => model,
            Err(poisoned) => poisoned.into_inner(),
        };
        f(&mut model)
    }
}

impl AdapterManager for LoggingAdapterManager {
    fn register_adapter(&self, index: u16, address: &Address, powered: bool) -> bool {
        let duplicate = self.with_model(|m| {
            let taken = m
                .adapters
                .iter()
                .any(|(i, a)| *i != index && a == address);
            if !taken {
                m.adapters.insert(index, *address);
            }
            taken
        });

        if duplicate {
            component_warn!(COMPONENT, hci = index, "{} already registered", address);
            return false;
        }

        component_info!(
            COMPONENT,
            hci = index,
            "adapter {} registered ({})",
            address,
            if powered { "powered" } else { "off" }
        );
        if self.registered.send(index).is_err() {
            component_debug!(COMPONENT, hci = index, "Nobody waiting for the registration");
        }
        true
    }

    fn unregister_adapter(&self, index: u16) {
        if let Some(address) = self.with_model(|m| {
            let address = m.adapters.remove(&index)?;
            m.devices.retain(|(adapter, _)| *adapter != address);
            Some(address)
        }) {
            component_info!(COMPONENT, hci = index, "adapter {} removed", address);
        }
    }

    fn has_adapter(&self, adapter: &Address) -> bool {
        self.with_model(|m| m.adapters.values().any(|a| a == adapter))
    }

    fn notify_power(&self, adapter: &Address, powered: bool) {
        component_info!(COMPONENT, "{} powered {}", adapter, if powered { "on" } else { "off" });
    }

    fn notify_settings(&self, adapter: &Address, settings: AppliedSettings) {
        component_debug!(
            COMPONENT,
            "{} connectable {} discoverable {} pairable {}",
            adapter,
            settings.connectable,
            settings.discoverable,
            settings.pairable
        );
    }

    fn configured_name(&self, _adapter: &Address) -> Option<String> {
        self.local_name.clone()
    }

    fn configured_class(&self, _adapter: &Address) -> (u8, u8) {
        self.class
    }

    fn notify_name_changed(&self, adapter: &Address, name: &str) {
        component_info!(COMPONENT, "{} name is now {:?}", adapter, name);
    }

    fn notify_class_changed(&self, adapter: &Address, class: [u8; 3]) {
        component_debug!(
            COMPONENT,
            "{} class 0x{:02x}{:02x}{:02x}",
            adapter,
            class[2],
            class[1],
            class[0]
        );
    }

    fn notify_discovering(&self, adapter: &Address, discovering: bool) {
        component_info!(COMPONENT, "{} discovering {}", adapter, discovering);
    }

    fn notify_local_oob_data(&self, adapter: &Address, data: Option<&OobData>) {
        match data {
            Some(_) => component_info!(COMPONENT, "{} local OOB data read", adapter),
            None => component_warn!(COMPONENT, "{} local OOB data unavailable", adapter),
        }
    }

    fn notify_device_found(&self, adapter: &Address, found: &DeviceFound) {
        component_info!(
            COMPONENT,
            "{} found {} rssi {} name {:?}",
            adapter,
            found.peer,
            found.rssi,
            found.eir.name
        );
    }

    fn store_cached_name(&self, adapter: &Address, peer: &Address, name: &str) {
        component_debug!(COMPONENT, "{} caching name {:?} for {}", adapter, name, peer);
    }

    fn notify_bonding_result(&self, adapter: &Address, peer: &PeerAddress, status: Status) {
        if status.is_success() {
            component_info!(COMPONENT, "{} bonded with {}", adapter, peer);
        } else {
            component_warn!(COMPONENT, "{} bonding with {} failed: {}", adapter, peer, status);
        }
    }

    fn find_or_create_device(&self, adapter: &Address, peer: &PeerAddress) -> bool {
        if !self.has_adapter(adapter) {
            return false;
        }
        if self.with_model(|m| m.devices.insert((*adapter, *peer))) {
            component_debug!(COMPONENT, "{} new device {}", adapter, peer);
        }
        true
    }

    fn find_device(&self, adapter: &Address, peer: &PeerAddress) -> bool {
        self.with_model(|m| m.devices.contains(&(*adapter, *peer)))
    }

    fn set_device_class(&self, adapter: &Address, peer: &PeerAddress, class: u32) {
        component_debug!(COMPONENT, "{} {} class 0x{:06x}", adapter, peer, class);
    }

    fn notify_device_name(&self, adapter: &Address, peer: &PeerAddress, name: &str) {
        component_debug!(COMPONENT, "{} {} name {:?}", adapter, peer, name);
    }

    fn notify_connected(&self, adapter: &Address, peer: &PeerAddress) {
        component_info!(COMPONENT, "{} connected to {}", adapter, peer);
    }

    fn notify_disconnected(&self, adapter: &Address, peer: &PeerAddress, reason: DisconnectReason) {
        component_info!(COMPONENT, "{} disconnected from {} ({:?})", adapter, peer, reason);
    }

    fn notify_connect_failed(&self, adapter: &Address, peer: &PeerAddress, status: Status) {
        component_warn!(COMPONENT, "{} connecting to {} failed: {}", adapter, peer, status);
    }

    fn notify_blocked(&self, adapter: &Address, peer: &PeerAddress, blocked: bool) {
        component_info!(COMPONENT, "{} {} blocked {}", adapter, peer, blocked);
    }

    fn notify_unpaired(&self, adapter: &Address, peer: &PeerAddress) {
        component_info!(COMPONENT, "{} {} unpaired", adapter, peer);
    }

    fn notify_bonded(&self, adapter: &Address, peer: &PeerAddress) {
        component_debug!(COMPONENT, "{} {} has stored keys", adapter, peer);
    }

    fn get_configured_pin(&self, _adapter: &Address, _peer: &PeerAddress) -> Option<PinCode> {
        self.pin.as_ref().map(|pin| PinCode {
            pin: pin.clone(),
            display: false,
        })
    }

    fn device_is_bonding(&self, _adapter: &Address, _peer: &PeerAddress) -> bool {
        false
    }

    fn notify_pin(
        &self,
        adapter: &Address,
        peer: &PeerAddress,
        _secure: bool,
        pin: &str,
    ) -> Result<()> {
        component_info!(COMPONENT, "{} PIN for {}: {}", adapter, peer, pin);
        Ok(())
    }

    fn request_pin(&self, adapter: &Address, peer: &PeerAddress, _secure: bool) -> Result<()> {
        bail!("no agent to ask for a PIN ({} / {})", adapter, peer)
    }

    fn request_passkey(&self, adapter: &Address, peer: &PeerAddress) -> Result<()> {
        bail!("no agent to ask for a passkey ({} / {})", adapter, peer)
    }

    fn notify_passkey(
        &self,
        adapter: &Address,
        peer: &PeerAddress,
        passkey: u32,
        entered: u8,
    ) -> Result<()> {
        component_info!(
            COMPONENT,
            "{} passkey for {}: {:06} ({} entered)",
            adapter,
            peer,
            passkey,
            entered
        );
        Ok(())
    }

    fn confirm_passkey(
        &self,
        adapter: &Address,
        peer: &PeerAddress,
        value: u32,
        _confirm_hint: bool,
    ) -> Result<()> {
        bail!("no agent to confirm {:06} ({} / {})", value, adapter, peer)
    }

    fn store_link_key(&self, adapter: &Address, key: &LinkKeyInfo) {
        component_info!(
            COMPONENT,
            "{} link key type {} for {}",
            adapter,
            key.key_type,
            key.peer
        );
    }

    fn store_long_term_key(&self, adapter: &Address, key: &LongTermKeyInfo) {
        component_info!(
            COMPONENT,
            "{} long term key for {} (master {})",
            adapter,
            key.peer,
            key.master
        );
    }
}
