//! Command-complete and command-status handling.
//!
//! Completions are matched to the command that caused them by opcode and
//! controller index only.

use crate::driver::Driver;
use crate::error::MgmtError;
use mgmt_controller::IdentifierOp;
use mgmt_wire::{
    reply, Command, ControllerInfo, DisconnectReason, Opcode, Settings, Status, INDEX_NONE,
};
use tracing::{debug, error, info};
use uuid::Uuid;

impl Driver {
    pub(crate) fn command_complete(
        &mut self,
        index: u16,
        opcode: u16,
        status: Status,
        data: &[u8],
    ) -> Result<(), MgmtError> {
        let opcode = Opcode::try_from(opcode)?;

        match opcode {
            Opcode::ReadVersion => self.read_version_complete(data),
            Opcode::ReadIndexList => self.read_index_list_complete(data),
            Opcode::ReadInfo => self.read_info_complete(index, data),

            Opcode::SetPowered
            | Opcode::SetDiscoverable
            | Opcode::SetConnectable
            | Opcode::SetPairable
            | Opcode::SetSsp
            | Opcode::SetLe => {
                let settings = reply::settings(data)?;
                self.new_settings(index, settings)
            }

            Opcode::AddUuid | Opcode::RemoveUuid => {
                debug!("hci{} {} complete", index, opcode);
                self.record(index)?;
                match reply::class_of_device(data) {
                    Ok(class) => self.update_class(index, class)?,
                    Err(e) => error!("hci{}: {}", index, e),
                }
                self.drain_pending(index)
            }

            Opcode::SetDevClass => {
                debug!("hci{} set_dev_class complete", index);
                let class = reply::class_of_device(data)?;
                self.update_class(index, class)
            }

            Opcode::Disconnect => self.disconnect_complete(index, status, data),
            Opcode::GetConnections => self.get_connections_complete(index, data),

            Opcode::PairDevice => {
                let peer = reply::address_info(data)?;
                debug!("hci{} {} pairing complete status {}", index, peer, status);
                self.record(index)?;
                self.bonding_complete(index, &peer, status)
            }

            Opcode::SetLocalName => {
                let name = reply::local_name(data)?;
                debug!("hci{} name {}", index, name.name);
                if let Some(adapter) = self.adapter_address(index)? {
                    self.manager.notify_name_changed(&adapter, &name.name);
                }
                Ok(())
            }

            Opcode::ReadLocalOobData => {
                let oob = reply::local_oob_data(data)?;
                debug!("hci{} local oob data read", index);
                if let Some(adapter) = self.adapter_address(index)? {
                    self.manager.notify_local_oob_data(&adapter, Some(&oob));
                }
                Ok(())
            }

            Opcode::StartDiscovery => {
                let types = reply::discovery_type(data)?;
                debug!("hci{} type {:?} status {}", index, types, status);
                self.record(index)?;
                if status.is_success() {
                    return Ok(());
                }
                if let Some(adapter) = self.adapter_address(index)? {
                    self.manager.notify_discovering(&adapter, false);
                }
                Ok(())
            }

            Opcode::LoadLinkKeys
            | Opcode::LoadLongTermKeys
            | Opcode::CancelPairDevice
            | Opcode::UnpairDevice
            | Opcode::PinCodeReply
            | Opcode::PinCodeNegReply
            | Opcode::SetIoCapability
            | Opcode::UserConfirmReply
            | Opcode::UserConfirmNegReply
            | Opcode::UserPasskeyReply
            | Opcode::UserPasskeyNegReply
            | Opcode::AddRemoteOobData
            | Opcode::RemoveRemoteOobData
            | Opcode::BlockDevice
            | Opcode::UnblockDevice
            | Opcode::SetFastConnectable
            | Opcode::StopDiscovery
            | Opcode::ConfirmName
            | Opcode::SetDeviceId => {
                debug!("hci{} {} complete, status {}", index, opcode, status);
                Ok(())
            }

            Opcode::ReadCommands | Opcode::SetLinkSecurity | Opcode::SetHs => {
                error!("Unknown command complete for opcode {}", opcode as u16);
                Ok(())
            }
        }
    }

    pub(crate) fn command_status(
        &mut self,
        index: u16,
        opcode: u16,
        status: Status,
    ) -> Result<(), MgmtError> {
        let opcode = Opcode::try_from(opcode)?;

        if status.is_success() {
            debug!("{} (0x{:04x}) cmd_status {}", opcode, opcode as u16, status);
            return Ok(());
        }

        match opcode {
            Opcode::ReadLocalOobData => {
                if let Some(adapter) = self.adapter_address(index)? {
                    self.manager.notify_local_oob_data(&adapter, None);
                }
            }
            Opcode::AddUuid if status == Status::Busy => {
                debug!("hci{} add_uuid busy, waiting for class change", index);
                self.record_mut(index)?.pending_mut().mark_busy();
                return Ok(());
            }
            Opcode::AddUuid | Opcode::RemoveUuid => {
                error!(
                    "hci{}: {} (0x{:04x}) failed: {}",
                    index, opcode, opcode as u16, status
                );
                return self.drain_pending(index);
            }
            _ => {}
        }

        error!(
            "hci{}: {} (0x{:04x}) failed: {}",
            index, opcode, opcode as u16, status
        );
        Ok(())
    }

    fn read_version_complete(&mut self, data: &[u8]) -> Result<(), MgmtError> {
        let required = self.config.min_version;
        let version = reply::read_version(data).map_err(|e| {
            error!("Too small read version reply (probably an old kernel): {}", e);
            MgmtError::ProtocolVersion { found: 0, required }
        })?;

        info!(
            "Bluetooth Management version {}, revision {}",
            version.version, version.revision
        );

        if version.version < required {
            return Err(MgmtError::ProtocolVersion {
                found: version.version,
                required,
            });
        }

        self.version = Some(version);
        self.send_logged(INDEX_NONE, &Command::ReadIndexList);
        Ok(())
    }

    fn read_index_list_complete(&mut self, data: &[u8]) -> Result<(), MgmtError> {
        let indices = reply::read_index_list(data)?;
        debug!("Found {} controllers", indices.len());

        for index in indices {
            self.add_controller(index);
        }
        Ok(())
    }

    fn read_info_complete(&mut self, index: u16, data: &[u8]) -> Result<(), MgmtError> {
        let info = reply::read_info(data)?;
        let first = self.record_mut(index)?.apply_info(&info);

        debug!(
            "hci{} addr {} version {} manufacturer {} class 0x{:02x}{:02x}{:02x}",
            index,
            info.address,
            info.version,
            info.manufacturer,
            info.dev_class[2],
            info.dev_class[1],
            info.dev_class[0]
        );
        debug!("hci{} name {} short name {}", index, info.name, info.short_name);

        if !first {
            debug!("hci{} controller info refreshed", index);
            return Ok(());
        }

        self.bring_up(index, &info)
    }

    /// Bring a newly described controller in line with local configuration
    fn bring_up(&mut self, index: u16, info: &ControllerInfo) -> Result<(), MgmtError> {
        // Remove every registered service; the adapter re-adds its own
        if let Err(e) = self.submit_identifier(index, IdentifierOp::Remove { uuid: Uuid::nil() }) {
            error!("hci{}: unable to clear service UUIDs: {}", index, e);
        }

        let record = self.record(index)?;
        let supported = record.supported_settings();
        let current = record.current_settings();
        let address = info.address;

        if !self
            .manager
            .register_adapter(index, &address, current.powered())
        {
            error!("hci{}: unable to register adapter", index);
            return Ok(());
        }

        self.manager.notify_settings(&address, current.into());

        match self.manager.configured_name(&address) {
            Some(name) => self.send_logged(index, &Command::SetLocalName(name)),
            None => self.manager.notify_name_changed(&address, &info.name),
        }

        let (major, minor) = self.manager.configured_class(&address);
        if let Err(e) = self.set_dev_class(index, major, minor) {
            error!("hci{}: {}", index, e);
        }

        let missing = |flag: Settings| supported.contains(flag) && !current.contains(flag);
        if missing(Settings::PAIRABLE) {
            self.send_logged(index, &Command::SetPairable(true));
        }
        if missing(Settings::SSP) {
            self.send_logged(index, &Command::SetSsp(true));
        }
        if missing(Settings::LE) {
            self.send_logged(index, &Command::SetLe(true));
        }

        if current.powered() {
            self.send_logged(index, &Command::GetConnections);
            self.manager.notify_power(&address, true);
        }

        info!("hci{} controller {} ready", index, address);
        Ok(())
    }

    fn disconnect_complete(
        &mut self,
        index: u16,
        status: Status,
        data: &[u8],
    ) -> Result<(), MgmtError> {
        let peer = reply::address_info(data)?;

        if !status.is_success() {
            error!("Disconnecting {} failed with status {}", peer, status);
            return Ok(());
        }

        debug!("hci{} {} disconnected", index, peer);
        self.record_mut(index)?.remove_connection(&peer);

        let Some((adapter, exists)) = self.adapter_and_device(index, &peer, false)? else {
            return Ok(());
        };

        if exists {
            self.manager
                .notify_disconnected(&adapter, &peer, DisconnectReason::LocalHost);
        }
        self.manager
            .notify_bonding_result(&adapter, &peer, Status::Disconnected);
        Ok(())
    }

    fn get_connections_complete(&mut self, index: u16, data: &[u8]) -> Result<(), MgmtError> {
        let peers = reply::connection_list(data)?;
        debug!("hci{} {} open connections", index, peers.len());
        self.record_mut(index)?.replace_connections(peers);
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use crate::adapter::AppliedSettings;
    use crate::error::MgmtError;
    use crate::testing::*;
    use mgmt_wire::{
        uuid16, Address, AddressType, DisconnectReason, Opcode, PeerAddress, Settings, Status,
        INDEX_NONE,
    };

    #[test]
    fn test_version_negotiation() {
        let (mut driver, socket, _) = driver();

        driver
            .handle_packet(&complete(INDEX_NONE, Opcode::ReadVersion, 0, &[1, 0, 0]))
            .unwrap();
        assert_eq!(driver.version().map(|v| v.version), Some(1));
        assert_eq!(
            socket.opcodes(),
            vec![(Opcode::ReadIndexList as u16, INDEX_NONE)]
        );
    }

    #[test]
    fn test_old_version_is_fatal() {
        let (mut driver, socket, _) = driver();

        let err = driver
            .process(&complete(INDEX_NONE, Opcode::ReadVersion, 0, &[0, 1, 0]))
            .unwrap_err();
        assert!(matches!(
            err,
            MgmtError::ProtocolVersion {
                found: 0,
                required: 1
            }
        ));
        assert!(err.is_fatal());
        assert!(socket.take().is_empty());

        let err = driver
            .process(&complete(INDEX_NONE, Opcode::ReadVersion, 0, &[1]))
            .unwrap_err();
        assert!(err.is_fatal());
    }

    #[test]
    fn test_index_list_registers_controllers() {
        let (mut driver, socket, _) = driver();

        driver
            .handle_packet(&complete(
                INDEX_NONE,
                Opcode::ReadIndexList,
                0,
                &[2, 0, 0, 0, 3, 0],
            ))
            .unwrap();

        assert_eq!(driver.registry().indices().collect::<Vec<_>>(), vec![0, 3]);
        assert_eq!(
            socket.opcodes(),
            vec![
                (Opcode::ReadInfo as u16, 0),
                (Opcode::ReadInfo as u16, 3)
            ]
        );
    }

    #[test]
    fn test_index_list_size_must_match() {
        let (mut driver, socket, _) = driver();
        assert!(driver
            .handle_packet(&complete(INDEX_NONE, Opcode::ReadIndexList, 0, &[2, 0, 0, 0]))
            .is_err());
        assert!(driver.registry().is_empty());
        assert!(socket.take().is_empty());
    }

    #[test]
    fn test_bring_up_sequence() {
        let (mut driver, socket, manager) = driver();
        manager.set_name(Some("workbench"));
        manager.set_class(1, 4);

        driver.handle_packet(&event(EV_INDEX_ADDED, 0, &[])).unwrap();
        socket.take();

        let supported = Settings::POWERED | Settings::PAIRABLE | Settings::SSP | Settings::LE;
        driver
            .handle_packet(&complete(
                0,
                Opcode::ReadInfo,
                0,
                &read_info_reply(ADAPTER, supported, Settings::POWERED, "hw-name"),
            ))
            .unwrap();

        assert_eq!(
            socket.opcodes(),
            vec![
                (Opcode::RemoveUuid as u16, 0),
                (Opcode::SetLocalName as u16, 0),
                (Opcode::SetPairable as u16, 0),
                (Opcode::SetSsp as u16, 0),
                (Opcode::SetLe as u16, 0),
                (Opcode::GetConnections as u16, 0),
            ]
        );

        let adapter = Address(ADAPTER);
        assert_eq!(
            manager.calls(),
            vec![
                Call::Register(0, adapter, true),
                Call::Settings(adapter, Default::default()),
                Call::Power(adapter, true),
            ]
        );

        // Class is held back until the UUID clear completes
        let record = driver.registry().get(0).unwrap();
        assert!(record.pending().in_flight());
        assert_eq!(record.pending().deferred_class(), Some((1, 4)));

        driver
            .handle_packet(&complete(0, Opcode::RemoveUuid, 0, &[0, 0, 0]))
            .unwrap();
        assert_eq!(
            socket.take(),
            vec![(Opcode::SetDevClass as u16, 0, vec![1, 4])]
        );
        assert!(!driver.registry().get(0).unwrap().pending().in_flight());
    }

    #[test]
    fn test_bring_up_adopts_hardware_name() {
        let (mut driver, socket, manager) = driver();
        register_controller(&mut driver, 0, Settings::empty());

        assert!(manager
            .calls()
            .contains(&Call::NameChanged(Address(ADAPTER), "hw-name".to_string())));
        assert!(!socket
            .opcodes()
            .contains(&(Opcode::SetLocalName as u16, 0)));
    }

    #[test]
    fn test_second_read_info_is_refresh_only() {
        let (mut driver, socket, manager) = driver();
        register_controller(&mut driver, 0, Settings::empty());
        socket.take();
        manager.clear();

        driver
            .handle_packet(&complete(
                0,
                Opcode::ReadInfo,
                0,
                &read_info_reply([9; 6], Settings::all(), Settings::POWERED, "other"),
            ))
            .unwrap();

        let record = driver.registry().get(0).unwrap();
        assert_eq!(record.address(), Address(ADAPTER));
        assert!(record.current_settings().powered());
        assert!(socket.take().is_empty());
        assert!(manager.calls().is_empty());
    }

    #[test]
    fn test_set_mode_completion_updates_settings() {
        let (mut driver, _, manager) = driver();
        register_controller(&mut driver, 0, Settings::empty());
        manager.clear();

        let bits = (Settings::POWERED | Settings::CONNECTABLE).bits();
        driver
            .handle_packet(&complete(0, Opcode::SetPowered, 0, &bits.to_le_bytes()))
            .unwrap();

        let adapter = Address(ADAPTER);
        assert_eq!(
            manager.calls(),
            vec![
                Call::Power(adapter, true),
                Call::Settings(
                    adapter,
                    AppliedSettings {
                        connectable: true,
                        discoverable: false,
                        pairable: false,
                    }
                ),
            ]
        );
    }

    #[test]
    fn test_busy_add_resumes_on_class_change() {
        let (mut driver, socket, _) = driver();
        register_controller(&mut driver, 0, Settings::empty());
        settle(&mut driver);
        socket.take();

        driver.add_uuid(0, uuid16(0x110A), 0x08).unwrap();
        driver.add_uuid(0, uuid16(0x110B), 0x08).unwrap();
        assert_eq!(socket.opcodes(), vec![(Opcode::AddUuid as u16, 0)]);

        driver
            .handle_packet(&status(0, Opcode::AddUuid, Status::Busy))
            .unwrap();
        assert!(socket.take().is_empty());
        assert!(driver.registry().get(0).unwrap().pending().in_flight());

        driver
            .handle_packet(&event(EV_CLASS_OF_DEV_CHANGED, 0, &[0x0C, 0x01, 0x08]))
            .unwrap();
        assert_eq!(socket.opcodes(), vec![(Opcode::AddUuid as u16, 0)]);
    }

    #[test]
    fn test_busy_on_remove_is_a_failure() {
        let (mut driver, socket, _) = driver();
        register_controller(&mut driver, 0, Settings::empty());
        socket.take();

        // The bring-up clear is in flight; a busy status completes it
        driver
            .handle_packet(&status(0, Opcode::RemoveUuid, Status::Busy))
            .unwrap();
        let record = driver.registry().get(0).unwrap();
        assert!(!record.pending().in_flight());
        assert_eq!(socket.opcodes(), vec![(Opcode::SetDevClass as u16, 0)]);
    }

    #[test]
    fn test_oob_status_failure_reports_unavailable() {
        let (mut driver, _, manager) = driver();
        register_controller(&mut driver, 0, Settings::empty());
        manager.clear();

        driver
            .handle_packet(&status(0, Opcode::ReadLocalOobData, Status::NotPowered))
            .unwrap();
        assert_eq!(manager.calls(), vec![Call::LocalOob(Address(ADAPTER), None)]);
    }

    #[test]
    fn test_oob_reply_must_be_exact() {
        let (mut driver, _, manager) = driver();
        register_controller(&mut driver, 0, Settings::empty());
        manager.clear();

        assert!(driver
            .handle_packet(&complete(0, Opcode::ReadLocalOobData, 0, &[0; 31]))
            .is_err());
        assert!(manager.calls().is_empty());

        let mut data = vec![0xAA; 16];
        data.extend_from_slice(&[0xBB; 16]);
        driver
            .handle_packet(&complete(0, Opcode::ReadLocalOobData, 0, &data))
            .unwrap();
        assert_eq!(manager.calls().len(), 1);
    }

    #[test]
    fn test_disconnect_complete() {
        let (mut driver, _, manager) = driver();
        register_controller(&mut driver, 0, Settings::POWERED);
        let peer = PeerAddress::new(Address(PEER), AddressType::BrEdr);
        manager.add_device(peer);
        driver
            .handle_packet(&complete(0, Opcode::GetConnections, 0, &connections(&[peer])))
            .unwrap();
        manager.clear();

        // Failure leaves everything alone
        driver
            .handle_packet(&complete(0, Opcode::Disconnect, 0x02, &peer_bytes(&peer)))
            .unwrap();
        assert!(manager.calls().is_empty());
        assert_eq!(driver.registry().get(0).unwrap().connections().count(), 1);

        driver
            .handle_packet(&complete(0, Opcode::Disconnect, 0, &peer_bytes(&peer)))
            .unwrap();
        let adapter = Address(ADAPTER);
        assert_eq!(
            manager.calls(),
            vec![
                Call::Disconnected(adapter, peer, DisconnectReason::LocalHost),
                Call::Bonding(adapter, peer, Status::Disconnected),
            ]
        );
        assert_eq!(driver.registry().get(0).unwrap().connections().count(), 0);
    }

    #[test]
    fn test_connection_snapshot_replaces() {
        let (mut driver, _, _) = driver();
        register_controller(&mut driver, 0, Settings::POWERED);
        let a = PeerAddress::new(Address([1; 6]), AddressType::BrEdr);
        let b = PeerAddress::new(Address([2; 6]), AddressType::LePublic);

        driver
            .handle_packet(&complete(0, Opcode::GetConnections, 0, &connections(&[a, b])))
            .unwrap();
        driver
            .handle_packet(&complete(0, Opcode::GetConnections, 0, &connections(&[b])))
            .unwrap();
        assert_eq!(driver.get_conn_list(0).unwrap(), vec![b]);

        // Count says two, one present
        let mut short = connections(&[a]);
        short[0] = 2;
        assert!(driver
            .handle_packet(&complete(0, Opcode::GetConnections, 0, &short))
            .is_err());
        assert_eq!(driver.get_conn_list(0).unwrap(), vec![b]);
    }

    #[test]
    fn test_start_discovery_failure() {
        let (mut driver, _, manager) = driver();
        register_controller(&mut driver, 0, Settings::empty());
        manager.clear();

        driver
            .handle_packet(&complete(0, Opcode::StartDiscovery, 0, &[0x01]))
            .unwrap();
        assert!(manager.calls().is_empty());

        driver
            .handle_packet(&complete(0, Opcode::StartDiscovery, 0x0F, &[0x01]))
            .unwrap();
        assert_eq!(
            manager.calls(),
            vec![Call::Discovering(Address(ADAPTER), false)]
        );

        assert!(driver
            .handle_packet(&complete(0, Opcode::StartDiscovery, 0x0F, &[0x01, 0x00]))
            .is_err());
    }

    #[test]
    fn test_pair_device_complete_reports_bonding() {
        let (mut driver, _, manager) = driver();
        register_controller(&mut driver, 0, Settings::POWERED);
        manager.clear();
        let peer = PeerAddress::new(Address(PEER), AddressType::LeRandom);

        driver
            .handle_packet(&complete(0, Opcode::PairDevice, 0x05, &peer_bytes(&peer)))
            .unwrap();
        assert_eq!(
            manager.calls(),
            vec![Call::Bonding(Address(ADAPTER), peer, Status::AuthFailed)]
        );
    }

    #[test]
    fn test_log_only_and_unknown_completions() {
        let (mut driver, socket, manager) = driver();
        register_controller(&mut driver, 0, Settings::empty());
        socket.take();
        manager.clear();

        driver
            .handle_packet(&complete(0, Opcode::LoadLinkKeys, 0, &[]))
            .unwrap();
        driver
            .handle_packet(&complete(0, Opcode::SetHs, 0, &[]))
            .unwrap();
        assert!(driver
            .handle_packet(&complete_raw(0, 0x00FE, 0, &[]))
            .is_err());

        assert!(socket.take().is_empty());
        assert!(manager.calls().is_empty());
    }

    #[test]
    fn test_completion_for_unknown_index() {
        let (mut driver, socket, manager) = driver();

        assert!(driver
            .process(&complete(5, Opcode::AddUuid, 0, &[0, 0, 0]))
            .is_ok());
        assert!(driver
            .handle_packet(&complete(5, Opcode::SetPowered, 0, &[1, 0, 0, 0]))
            .is_err());
        assert!(socket.take().is_empty());
        assert!(manager.calls().is_empty());
    }
}
