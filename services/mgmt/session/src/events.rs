//! Unsolicited event handling.

use crate::adapter::{AppliedSettings, DeviceFound};
use crate::driver::Driver;
use crate::error::MgmtError;
use mgmt_wire::{
    Command, DeviceFoundFlags, DisconnectReason, DiscoveryTypes, EirData, LinkKeyInfo,
    LongTermKeyInfo, PeerAddress, Settings, Status, MAX_PIN_LENGTH,
};
use tracing::{debug, error, info, warn};

impl Driver {
    /// A controller index appeared; start describing it
    pub(crate) fn add_controller(&mut self, index: u16) {
        self.registry.register(index);
        info!("Added controller {}", index);
        self.send_logged(index, &Command::ReadInfo);
    }

    /// A controller index went away
    pub(crate) fn remove_controller(&mut self, index: u16) {
        let Some(mut record) = self.registry.unregister(index) else {
            debug!("hci{} removal of unknown controller ignored", index);
            return;
        };

        self.manager.unregister_adapter(index);

        let dropped = record.pending_mut().reset();
        if dropped > 0 {
            warn!("hci{} removed with {} queued UUID operations", index, dropped);
        }
        info!("Removed controller {}", index);
    }

    pub(crate) fn controller_error(&self, index: u16, code: u8) -> Result<(), MgmtError> {
        self.record(index)?;
        error!("hci{} controller error 0x{:02x}", index, code);
        Ok(())
    }

    /// Apply a full settings bitmask, from an event or a mode reply
    pub(crate) fn new_settings(&mut self, index: u16, settings: Settings) -> Result<(), MgmtError> {
        debug!("hci{} new settings {:?}", index, settings);

        let record = self.record_mut(index)?;
        let transition = record.replace_settings(settings);

        if transition.powered_off() {
            let dropped = record.pending_mut().reset();
            if dropped > 0 {
                debug!("hci{} power off dropped {} queued UUID operations", index, dropped);
            }
        }

        let Some(adapter) = self.adapter_address(index)? else {
            return Ok(());
        };

        if transition.power_changed() {
            self.manager.notify_power(&adapter, transition.new.powered());
        }
        self.manager
            .notify_settings(&adapter, AppliedSettings::from(settings));
        Ok(())
    }

    pub(crate) fn class_changed(&mut self, index: u16, class: [u8; 3]) -> Result<(), MgmtError> {
        debug!("hci{} class of device changed", index);

        if self.record_mut(index)?.pending_mut().take_busy_retry() {
            debug!("hci{} retrying UUID queue after busy add", index);
            self.drain_pending(index)?;
        }

        self.update_class(index, class)
    }

    /// Tell the adapter about a class of device reported by the controller
    pub(crate) fn update_class(&self, index: u16, class: [u8; 3]) -> Result<(), MgmtError> {
        if let Some(adapter) = self.adapter_address(index)? {
            self.manager.notify_class_changed(&adapter, class);
        }
        Ok(())
    }

    pub(crate) fn local_name_changed(&self, index: u16, name: &str) -> Result<(), MgmtError> {
        debug!("hci{} local name changed: {}", index, name);
        if let Some(adapter) = self.adapter_address(index)? {
            self.manager.notify_name_changed(&adapter, name);
        }
        Ok(())
    }

    pub(crate) fn new_link_key(
        &self,
        index: u16,
        store_hint: bool,
        key: &LinkKeyInfo,
    ) -> Result<(), MgmtError> {
        debug!(
            "hci{} new key of type {} pin_len {}",
            index, key.key_type, key.pin_len
        );
        self.record(index)?;

        if key.pin_len as usize > MAX_PIN_LENGTH {
            return Err(MgmtError::InvalidParams(format!(
                "PIN length {} in new link key",
                key.pin_len
            )));
        }

        let Some((adapter, _)) = self.adapter_and_device(index, &key.peer, true)? else {
            return Ok(());
        };

        if store_hint {
            self.manager.store_link_key(&adapter, key);
            self.manager.notify_bonded(&adapter, &key.peer);
        }

        self.manager
            .notify_bonding_result(&adapter, &key.peer, Status::Success);
        Ok(())
    }

    pub(crate) fn new_long_term_key(
        &self,
        index: u16,
        store_hint: bool,
        key: &LongTermKeyInfo,
    ) -> Result<(), MgmtError> {
        debug!(
            "hci{} new LTK authenticated {} enc_size {}",
            index, key.authenticated, key.enc_size
        );

        let Some((adapter, _)) = self.adapter_and_device(index, &key.peer, true)? else {
            return Ok(());
        };

        if store_hint {
            self.manager.store_long_term_key(&adapter, key);
            self.manager.notify_bonded(&adapter, &key.peer);
        }

        if key.master {
            self.manager
                .notify_bonding_result(&adapter, &key.peer, Status::Success);
        }
        Ok(())
    }

    fn parse_eir(&self, eir: &[u8]) -> EirData {
        if eir.is_empty() {
            return EirData::default();
        }
        self.eir_parser.parse(eir)
    }

    pub(crate) fn device_connected(
        &mut self,
        index: u16,
        peer: &PeerAddress,
        eir: &[u8],
    ) -> Result<(), MgmtError> {
        debug!("hci{} device {} connected eir_len {}", index, peer, eir.len());

        let Some((adapter, _)) = self.adapter_and_device(index, peer, true)? else {
            return Ok(());
        };

        let eir = self.parse_eir(eir);
        if eir.class != 0 {
            self.manager.set_device_class(&adapter, peer, eir.class);
        }

        self.record_mut(index)?.add_connection(*peer);
        self.manager.notify_connected(&adapter, peer);

        if let Some(name) = &eir.name {
            self.manager.store_cached_name(&adapter, &peer.address, name);
            self.manager.notify_device_name(&adapter, peer, name);
        }
        Ok(())
    }

    pub(crate) fn device_disconnected(
        &mut self,
        index: u16,
        peer: &PeerAddress,
        reason: DisconnectReason,
    ) -> Result<(), MgmtError> {
        debug!("hci{} device {} disconnected reason {:?}", index, peer, reason);

        self.record_mut(index)?.remove_connection(peer);

        if let Some((adapter, true)) = self.adapter_and_device(index, peer, false)? {
            self.manager.notify_disconnected(&adapter, peer, reason);
        }
        Ok(())
    }

    pub(crate) fn connect_failed(
        &self,
        index: u16,
        peer: &PeerAddress,
        status: Status,
    ) -> Result<(), MgmtError> {
        debug!("hci{} {} connect failed: {}", index, peer, status);

        let Some((adapter, exists)) = self.adapter_and_device(index, peer, false)? else {
            return Ok(());
        };

        if exists {
            self.manager.notify_connect_failed(&adapter, peer, status);
        }

        // Security mode 3 peers fail the connection instead of the pairing
        self.manager.notify_bonding_result(&adapter, peer, status);
        Ok(())
    }

    pub(crate) fn pin_code_request(
        &self,
        index: u16,
        peer: &PeerAddress,
        secure: bool,
    ) -> Result<(), MgmtError> {
        debug!("hci{} {} pin code request, secure {}", index, peer, secure);

        let Some((adapter, _)) = self.adapter_and_device(index, peer, true)? else {
            return Ok(());
        };

        let configured = self
            .manager
            .get_configured_pin(&adapter, peer)
            .filter(|pin| !pin.pin.is_empty() && (!secure || pin.pin.len() == MAX_PIN_LENGTH));

        if let Some(pin) = configured {
            if pin.display && self.manager.device_is_bonding(&adapter, peer) {
                if let Err(e) = self.manager.notify_pin(&adapter, peer, secure, &pin.pin) {
                    error!("hci{} unable to display PIN for {}: {:#}", index, peer, e);
                    self.pincode_reply(index, &peer.address, None)?;
                }
            } else {
                self.pincode_reply(index, &peer.address, Some(&pin.pin))?;
            }
            return Ok(());
        }

        if let Err(e) = self.manager.request_pin(&adapter, peer, secure) {
            error!("hci{} PIN request for {} failed: {:#}", index, peer, e);
            self.pincode_reply(index, &peer.address, None)?;
        }
        Ok(())
    }

    pub(crate) fn user_confirm_request(
        &self,
        index: u16,
        peer: &PeerAddress,
        confirm_hint: bool,
        value: u32,
    ) -> Result<(), MgmtError> {
        debug!("hci{} {} confirm_hint {}", index, peer, confirm_hint);

        let Some((adapter, _)) = self.adapter_and_device(index, peer, true)? else {
            return Ok(());
        };

        if let Err(e) = self
            .manager
            .confirm_passkey(&adapter, peer, value, confirm_hint)
        {
            error!("hci{} confirmation request for {} failed: {:#}", index, peer, e);
            self.confirm_reply(index, peer, false)?;
        }
        Ok(())
    }

    pub(crate) fn passkey_request(&self, index: u16, peer: &PeerAddress) -> Result<(), MgmtError> {
        debug!("hci{} {} passkey request", index, peer);

        let Some((adapter, _)) = self.adapter_and_device(index, peer, true)? else {
            return Ok(());
        };

        if let Err(e) = self.manager.request_passkey(&adapter, peer) {
            error!("hci{} passkey request for {} failed: {:#}", index, peer, e);
            self.passkey_reply(index, peer, None)?;
        }
        Ok(())
    }

    pub(crate) fn passkey_notify(
        &self,
        index: u16,
        peer: &PeerAddress,
        passkey: u32,
        entered: u8,
    ) -> Result<(), MgmtError> {
        debug!("hci{} {} passkey {:06} entered {}", index, peer, passkey, entered);

        let Some((adapter, _)) = self.adapter_and_device(index, peer, true)? else {
            return Ok(());
        };

        if let Err(e) = self.manager.notify_passkey(&adapter, peer, passkey, entered) {
            error!("hci{} unable to display passkey for {}: {:#}", index, peer, e);
        }
        Ok(())
    }

    pub(crate) fn device_found(
        &self,
        index: u16,
        peer: &PeerAddress,
        rssi: i8,
        flags: DeviceFoundFlags,
        eir: &[u8],
    ) -> Result<(), MgmtError> {
        let Some(adapter) = self.adapter_address(index)? else {
            return Ok(());
        };

        debug!(
            "hci{} addr {}, rssi {} flags 0x{:04x} eir_len {}",
            index,
            peer,
            rssi,
            flags.bits(),
            eir.len()
        );

        let eir = self.parse_eir(eir);
        if let Some(name) = &eir.name {
            self.manager.store_cached_name(&adapter, &peer.address, name);
        }

        let found = DeviceFound {
            peer: *peer,
            rssi,
            confirm_name: flags.contains(DeviceFoundFlags::CONFIRM_NAME),
            legacy_pairing: flags.contains(DeviceFoundFlags::LEGACY_PAIRING),
            eir,
        };
        self.manager.notify_device_found(&adapter, &found);
        Ok(())
    }

    pub(crate) fn discovering(
        &self,
        index: u16,
        types: DiscoveryTypes,
        discovering: bool,
    ) -> Result<(), MgmtError> {
        debug!("hci{} type {:?} discovering {}", index, types, discovering);
        if let Some(adapter) = self.adapter_address(index)? {
            self.manager.notify_discovering(&adapter, discovering);
        }
        Ok(())
    }

    pub(crate) fn device_blocked(
        &self,
        index: u16,
        peer: &PeerAddress,
        blocked: bool,
    ) -> Result<(), MgmtError> {
        debug!("hci{} {} blocked {}", index, peer, blocked);
        if let Some((adapter, true)) = self.adapter_and_device(index, peer, false)? {
            self.manager.notify_blocked(&adapter, peer, blocked);
        }
        Ok(())
    }

    pub(crate) fn device_unpaired(&self, index: u16, peer: &PeerAddress) -> Result<(), MgmtError> {
        debug!("hci{} {} unpaired", index, peer);
        if let Some((adapter, true)) = self.adapter_and_device(index, peer, false)? {
            self.manager.notify_unpaired(&adapter, peer);
        }
        Ok(())
    }
}
