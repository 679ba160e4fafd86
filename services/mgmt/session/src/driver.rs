//! The protocol engine: framing, dispatch and shared helpers.
//!
//! A [`Driver`] owns the controller registry and is driven from a single
//! task. Each received datagram is framed, decoded and dispatched to a
//! handler in arrival order; outbound commands are fire-and-forget writes
//! correlated with their completions by opcode and controller index only.

use crate::adapter::AdapterManager;
use crate::error::MgmtError;
use crate::transport::MgmtSocket;
use mgmt_controller::{ControllerRecord, ControllerRegistry};
use mgmt_wire::{
    decode_event, parse_packet, Address, BasicEirParser, Command, EirParser, Event, PeerAddress,
    Status, VersionInfo, INDEX_NONE,
};
use std::sync::Arc;
use tracing::{debug, error, info};

/// Driver configuration
#[derive(Clone, Debug)]
pub struct DriverConfig {
    /// Oldest management protocol version accepted
    pub min_version: u8,
    /// Receive buffer size for one datagram
    pub recv_buffer_size: usize,
}

impl Default for DriverConfig {
    fn default() -> Self {
        Self {
            min_version: 1,
            recv_buffer_size: 1024,
        }
    }
}

/// Management channel driver
#[derive(Debug)]
pub struct Driver {
    pub(crate) config: DriverConfig,
    pub(crate) socket: Arc<dyn MgmtSocket>,
    pub(crate) manager: Arc<dyn AdapterManager>,
    pub(crate) eir_parser: Arc<dyn EirParser>,
    pub(crate) registry: ControllerRegistry,
    pub(crate) version: Option<VersionInfo>,
}

impl Driver {
    /// Create a driver writing to `socket` and reporting to `manager`
    pub fn new(
        config: DriverConfig,
        socket: Arc<dyn MgmtSocket>,
        manager: Arc<dyn AdapterManager>,
    ) -> Self {
        Self {
            config,
            socket,
            manager,
            eir_parser: Arc::new(BasicEirParser),
            registry: ControllerRegistry::new(),
            version: None,
        }
    }

    /// Replace the advertising data parser
    pub fn with_eir_parser(mut self, parser: Arc<dyn EirParser>) -> Self {
        self.eir_parser = parser;
        self
    }

    /// Driver configuration
    pub fn config(&self) -> &DriverConfig {
        &self.config
    }

    /// Negotiated protocol version, once known
    pub fn version(&self) -> Option<VersionInfo> {
        self.version
    }

    /// Controller registry
    pub fn registry(&self) -> &ControllerRegistry {
        &self.registry
    }

    /// Kick off version negotiation; everything else follows from replies
    pub fn start(&self) -> Result<(), MgmtError> {
        info!("Starting management driver");
        self.send(INDEX_NONE, &Command::ReadVersion)
    }

    /// Handle one received datagram.
    ///
    /// Per-message failures are logged and the message dropped; only a
    /// fatal error is returned.
    pub fn process(&mut self, datagram: &[u8]) -> Result<(), MgmtError> {
        match self.handle_packet(datagram) {
            Ok(()) => Ok(()),
            Err(e) if e.is_fatal() => {
                error!("Fatal management error: {}", e);
                Err(e)
            }
            Err(e) => {
                error!("Dropping management packet: {}", e);
                Ok(())
            }
        }
    }

    /// Handle one received datagram, returning any per-message error
    pub fn handle_packet(&mut self, datagram: &[u8]) -> Result<(), MgmtError> {
        debug!("Received {} bytes from management socket", datagram.len());

        let (header, payload) = parse_packet(datagram)?;
        let event = decode_event(header.code, payload)?;

        self.dispatch(header.index, event)
    }

    fn dispatch(&mut self, index: u16, event: Event) -> Result<(), MgmtError> {
        match event {
            Event::CommandComplete {
                opcode,
                status,
                data,
            } => self.command_complete(index, opcode, status, &data),
            Event::CommandStatus { opcode, status } => self.command_status(index, opcode, status),
            Event::ControllerError(code) => self.controller_error(index, code),
            Event::IndexAdded => {
                self.add_controller(index);
                Ok(())
            }
            Event::IndexRemoved => {
                self.remove_controller(index);
                Ok(())
            }
            Event::NewSettings(settings) => self.new_settings(index, settings),
            Event::ClassOfDevChanged(class) => self.class_changed(index, class),
            Event::LocalNameChanged { name, .. } => self.local_name_changed(index, &name),
            Event::NewLinkKey { store_hint, key } => self.new_link_key(index, store_hint, &key),
            Event::NewLongTermKey { store_hint, key } => {
                self.new_long_term_key(index, store_hint, &key)
            }
            Event::DeviceConnected { peer, eir, .. } => self.device_connected(index, &peer, &eir),
            Event::DeviceDisconnected { peer, reason } => {
                self.device_disconnected(index, &peer, reason)
            }
            Event::ConnectFailed { peer, status } => self.connect_failed(index, &peer, status),
            Event::PinCodeRequest { peer, secure } => self.pin_code_request(index, &peer, secure),
            Event::UserConfirmRequest {
                peer,
                confirm_hint,
                value,
            } => self.user_confirm_request(index, &peer, confirm_hint, value),
            Event::UserPasskeyRequest(peer) => self.passkey_request(index, &peer),
            Event::PasskeyNotify {
                peer,
                passkey,
                entered,
            } => self.passkey_notify(index, &peer, passkey, entered),
            Event::AuthFailed { peer, status } => {
                debug!("hci{} auth failed status {}", index, status);
                self.record(index)?;
                self.bonding_complete(index, &peer, status)
            }
            Event::DeviceFound {
                peer,
                rssi,
                flags,
                eir,
            } => self.device_found(index, &peer, rssi, flags, &eir),
            Event::Discovering { types, discovering } => {
                self.discovering(index, types, discovering)
            }
            Event::DeviceBlocked(peer) => self.device_blocked(index, &peer, true),
            Event::DeviceUnblocked(peer) => self.device_blocked(index, &peer, false),
            Event::DeviceUnpaired(peer) => self.device_unpaired(index, &peer),
        }
    }

    /// Write a command addressed to `index`
    pub(crate) fn send(&self, index: u16, command: &Command) -> Result<(), MgmtError> {
        let opcode = command.opcode();
        debug!("hci{} sending {}", index, opcode);

        let packet = command.encode(index)?;
        self.socket
            .send(&packet)
            .map_err(|source| MgmtError::TransportWrite { opcode, source })
    }

    /// Write a command, logging a failure instead of returning it
    pub(crate) fn send_logged(&self, index: u16, command: &Command) {
        if let Err(e) = self.send(index, command) {
            error!("hci{}: {}", index, e);
        }
    }

    pub(crate) fn record(&self, index: u16) -> Result<&ControllerRecord, MgmtError> {
        Ok(self.registry.get(index)?)
    }

    pub(crate) fn record_mut(&mut self, index: u16) -> Result<&mut ControllerRecord, MgmtError> {
        Ok(self.registry.get_mut(index)?)
    }

    /// Report a pairing outcome for a peer of this controller
    pub(crate) fn bonding_complete(
        &self,
        index: u16,
        peer: &PeerAddress,
        status: Status,
    ) -> Result<(), MgmtError> {
        if let Some(adapter) = self.adapter_address(index)? {
            self.manager.notify_bonding_result(&adapter, peer, status);
        }
        Ok(())
    }

    /// Identity of the adapter registered for `index`, if the model knows it
    pub(crate) fn adapter_address(&self, index: u16) -> Result<Option<Address>, MgmtError> {
        let address = self.record(index)?.address();
        if !self.manager.has_adapter(&address) {
            debug!("hci{}: adapter not found", index);
            return Ok(None);
        }
        Ok(Some(address))
    }

    /// Resolve adapter and device for a peer.
    ///
    /// With `create` the device is created on demand and `None` is returned
    /// if that fails. Without it the flag reports whether the device exists.
    pub(crate) fn adapter_and_device(
        &self,
        index: u16,
        peer: &PeerAddress,
        create: bool,
    ) -> Result<Option<(Address, bool)>, MgmtError> {
        let Some(adapter) = self.adapter_address(index)? else {
            error!("hci{}: unable to find matching adapter", index);
            return Ok(None);
        };

        if !create {
            return Ok(Some((adapter, self.manager.find_device(&adapter, peer))));
        }

        if !self.manager.find_or_create_device(&adapter, peer) {
            error!("hci{}: unable to get device object for {}", index, peer);
            return Ok(None);
        }
        Ok(Some((adapter, true)))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::testing::*;
    use mgmt_wire::{Opcode, WireError};

    #[test]
    fn test_start_sends_read_version() {
        let (driver, socket, _) = driver();
        driver.start().unwrap();
        assert_eq!(
            socket.take(),
            vec![(Opcode::ReadVersion as u16, INDEX_NONE, vec![])]
        );
    }

    #[test]
    fn test_frame_errors_are_dropped() {
        let (mut driver, socket, manager) = driver();

        let err = driver.handle_packet(&[0x01, 0x00, 0x00]).unwrap_err();
        assert!(matches!(err, MgmtError::Wire(WireError::HeaderTooShort(3))));

        // Declared length 4, one byte present
        let short = [0x06, 0x00, 0x00, 0x00, 0x04, 0x00, 0x01];
        assert!(matches!(
            driver.handle_packet(&short),
            Err(MgmtError::Wire(WireError::LengthMismatch { .. }))
        ));
        assert!(driver.process(&short).is_ok());

        assert!(socket.take().is_empty());
        assert!(manager.calls().is_empty());
    }

    #[test]
    fn test_unknown_event_is_dropped() {
        let (mut driver, _, manager) = driver();
        let packet = event(0x0042, 0, &[]);
        assert!(matches!(
            driver.handle_packet(&packet),
            Err(MgmtError::Wire(WireError::UnknownEvent(0x0042)))
        ));
        assert!(driver.process(&packet).is_ok());
        assert!(manager.calls().is_empty());
    }

    #[test]
    fn test_write_failure_surfaces() {
        let (driver, socket, _) = driver();
        socket.fail_writes(true);
        assert!(matches!(
            driver.start(),
            Err(MgmtError::TransportWrite {
                opcode: Opcode::ReadVersion,
                ..
            })
        ));
    }
}
