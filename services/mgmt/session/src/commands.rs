//! Operations offered to the adapter layer.
//!
//! Every operation names the controller index it targets and fails with
//! [`MgmtError::Registry`] when that index is not registered. A returned
//! `Ok` means the command was written (or queued), never that the
//! controller accepted it; outcomes arrive later as events.

use crate::driver::Driver;
use crate::error::MgmtError;
use mgmt_controller::{Drain, IdentifierOp};
use mgmt_wire::{
    is_16bit_uuid, Address, Command, DiscoveryTypes, LinkKeyInfo, LongTermKeyInfo, PeerAddress,
    Settings, LINK_KEY_INFO_SIZE, LONG_TERM_KEY_INFO_SIZE, MAX_PIN_LENGTH,
};
use tracing::{debug, error, warn};
use uuid::Uuid;

impl Driver {
    /// Power a controller on or off.
    ///
    /// Powering on while a UUID command is outstanding is deferred until
    /// the UUID queue drains; powering off cancels such a deferral.
    pub fn set_powered(&mut self, index: u16, powered: bool) -> Result<(), MgmtError> {
        let pending = self.record_mut(index)?.pending_mut();
        debug!(
            "hci{} powered {} uuid in flight {}",
            index,
            powered,
            pending.in_flight()
        );

        if powered {
            if pending.defer_power_on() {
                return Ok(());
            }
        } else {
            pending.cancel_power_on();
        }

        self.send(index, &Command::SetPowered(powered))
    }

    /// Toggle connectable mode
    pub fn set_connectable(&mut self, index: u16, connectable: bool) -> Result<(), MgmtError> {
        self.set_mode(index, Command::SetConnectable(connectable))
    }

    /// Toggle discoverable mode, `timeout` in seconds (0 for none)
    pub fn set_discoverable(
        &mut self,
        index: u16,
        discoverable: bool,
        timeout: u16,
    ) -> Result<(), MgmtError> {
        self.set_mode(
            index,
            Command::SetDiscoverable {
                enabled: discoverable,
                timeout,
            },
        )
    }

    /// Toggle pairable mode
    pub fn set_pairable(&mut self, index: u16, pairable: bool) -> Result<(), MgmtError> {
        self.set_mode(index, Command::SetPairable(pairable))
    }

    /// Toggle fast connectable page scanning
    pub fn set_fast_connectable(&mut self, index: u16, enable: bool) -> Result<(), MgmtError> {
        self.set_mode(index, Command::SetFastConnectable(enable))
    }

    fn set_mode(&self, index: u16, command: Command) -> Result<(), MgmtError> {
        self.record(index)?;
        debug!("hci{} {:?}", index, command);
        self.send(index, &command)
    }

    /// Set the local name; longer names are cut at 248 bytes
    pub fn set_name(&mut self, index: u16, name: &str) -> Result<(), MgmtError> {
        self.record(index)?;
        debug!("hci{} name {}", index, name);
        self.send(index, &Command::SetLocalName(name.to_string()))
    }

    /// Set the major/minor device class.
    ///
    /// Deferred while a UUID command is outstanding, since the controller
    /// recomputes the class after each UUID change.
    pub fn set_dev_class(&mut self, index: u16, major: u8, minor: u8) -> Result<(), MgmtError> {
        debug!("hci{} major {} minor {}", index, major, minor);

        if self
            .record_mut(index)?
            .pending_mut()
            .defer_class(major, minor)
        {
            return Ok(());
        }

        self.send(index, &Command::SetDevClass { major, minor })
    }

    /// Register a service UUID; only 16-bit UUIDs are passed on
    pub fn add_uuid(&mut self, index: u16, uuid: Uuid, svc_hint: u8) -> Result<(), MgmtError> {
        self.record(index)?;
        if !is_16bit_uuid(&uuid) {
            warn!("hci{} ignoring non-16-bit UUID {}", index, uuid);
            return Ok(());
        }
        self.submit_identifier(index, IdentifierOp::Add { uuid, svc_hint })
    }

    /// Unregister a service UUID; only 16-bit UUIDs are passed on
    pub fn remove_uuid(&mut self, index: u16, uuid: Uuid) -> Result<(), MgmtError> {
        self.record(index)?;
        if !is_16bit_uuid(&uuid) {
            warn!("hci{} ignoring non-16-bit UUID {}", index, uuid);
            return Ok(());
        }
        self.submit_identifier(index, IdentifierOp::Remove { uuid })
    }

    /// Send a UUID operation now, or queue it behind the outstanding one
    pub(crate) fn submit_identifier(
        &mut self,
        index: u16,
        op: IdentifierOp,
    ) -> Result<(), MgmtError> {
        let Some(op) = self.record_mut(index)?.pending_mut().submit(op) else {
            debug!("hci{} UUID operation queued", index);
            return Ok(());
        };

        self.send_identifier(index, &op)?;
        self.record_mut(index)?.pending_mut().mark_in_flight();
        Ok(())
    }

    fn send_identifier(&self, index: u16, op: &IdentifierOp) -> Result<(), MgmtError> {
        let command = match op {
            IdentifierOp::Add { uuid, svc_hint } => Command::AddUuid {
                uuid: *uuid,
                svc_hint: *svc_hint,
            },
            IdentifierOp::Remove { uuid } => Command::RemoveUuid(*uuid),
        };
        self.send(index, &command)
    }

    /// The outstanding UUID command finished; send the next queued one or
    /// flush what was deferred behind the queue
    pub(crate) fn drain_pending(&mut self, index: u16) -> Result<(), MgmtError> {
        loop {
            match self.record_mut(index)?.pending_mut().complete() {
                Drain::Send(op) => match self.send_identifier(index, &op) {
                    Ok(()) => return Ok(()),
                    Err(e) => error!("hci{} dropping queued UUID {}: {}", index, op.uuid(), e),
                },
                Drain::Flush { class, power_on } => {
                    if let Some((major, minor)) = class {
                        self.send_logged(index, &Command::SetDevClass { major, minor });
                    }
                    if power_on {
                        self.send_logged(index, &Command::SetPowered(true));
                    }
                    return Ok(());
                }
            }
        }
    }

    /// Discover with every address type the controller has enabled
    pub fn start_discovery(&mut self, index: u16) -> Result<(), MgmtError> {
        let record = self.record_mut(index)?;
        let types = DiscoveryTypes::for_settings(record.current_settings());
        record.set_discovery_types(types);

        debug!("hci{} start discovery {:?}", index, types);
        self.send(index, &Command::StartDiscovery(types))
    }

    /// Discover LE devices only
    pub fn start_le_scanning(&mut self, index: u16) -> Result<(), MgmtError> {
        let record = self.record_mut(index)?;
        if !record.is_set(Settings::LE) {
            error!("hci{} scanning failed: Low Energy not enabled/supported", index);
            return Err(MgmtError::UnsupportedOperation {
                index,
                operation: "LE scanning",
            });
        }
        record.set_discovery_types(DiscoveryTypes::LE);

        self.send(index, &Command::StartDiscovery(DiscoveryTypes::LE))
    }

    /// Stop the discovery started last
    pub fn stop_discovery(&mut self, index: u16) -> Result<(), MgmtError> {
        let types = self.record(index)?.discovery_types();
        debug!("hci{} stop discovery {:?}", index, types);
        self.send(index, &Command::StopDiscovery(types))
    }

    /// Controller identity address, all-zero until its info was read
    pub fn read_bdaddr(&self, index: u16) -> Result<Address, MgmtError> {
        Ok(self.record(index)?.address())
    }

    /// Whether secure simple pairing is currently enabled
    pub fn ssp_enabled(&self, index: u16) -> Result<bool, MgmtError> {
        Ok(self.record(index)?.is_set(Settings::SSP))
    }

    /// Snapshot of the open connections
    pub fn get_conn_list(&self, index: u16) -> Result<Vec<PeerAddress>, MgmtError> {
        Ok(self.record(index)?.connections().copied().collect())
    }

    /// Block a peer
    pub fn block_device(&mut self, index: u16, peer: &PeerAddress) -> Result<(), MgmtError> {
        self.peer_command(index, Command::BlockDevice(*peer))
    }

    /// Unblock a peer
    pub fn unblock_device(&mut self, index: u16, peer: &PeerAddress) -> Result<(), MgmtError> {
        self.peer_command(index, Command::UnblockDevice(*peer))
    }

    /// Disconnect a peer
    pub fn disconnect(&mut self, index: u16, peer: &PeerAddress) -> Result<(), MgmtError> {
        self.peer_command(index, Command::Disconnect(*peer))
    }

    /// Remove pairing with a peer, dropping its connection too
    pub fn unpair_device(&mut self, index: u16, peer: &PeerAddress) -> Result<(), MgmtError> {
        self.peer_command(
            index,
            Command::UnpairDevice {
                peer: *peer,
                disconnect: true,
            },
        )
    }

    /// Start pairing with a peer
    pub fn create_bonding(
        &mut self,
        index: u16,
        peer: &PeerAddress,
        io_cap: u8,
    ) -> Result<(), MgmtError> {
        self.peer_command(index, Command::PairDevice { peer: *peer, io_cap })
    }

    /// Cancel pairing with a BR/EDR peer
    pub fn cancel_bonding(&mut self, index: u16, address: &Address) -> Result<(), MgmtError> {
        self.peer_command(index, Command::CancelPairDevice(PeerAddress::bredr(*address)))
    }

    /// Tell the controller whether a found device's name is already known
    pub fn confirm_name(
        &mut self,
        index: u16,
        peer: &PeerAddress,
        name_known: bool,
    ) -> Result<(), MgmtError> {
        self.peer_command(
            index,
            Command::ConfirmName {
                peer: *peer,
                name_known,
            },
        )
    }

    fn peer_command(&self, index: u16, command: Command) -> Result<(), MgmtError> {
        self.record(index)?;
        debug!("hci{} {:?}", index, command);
        self.send(index, &command)
    }

    /// Set the device ID record
    pub fn set_did(
        &mut self,
        index: u16,
        vendor: u16,
        product: u16,
        version: u16,
        source: u16,
    ) -> Result<(), MgmtError> {
        self.record(index)?;
        debug!(
            "hci{} source {:x} vendor {:x} product {:x} version {:x}",
            index, source, vendor, product, version
        );
        self.send(
            index,
            &Command::SetDeviceId {
                source,
                vendor,
                product,
                version,
            },
        )
    }

    /// Replace the controller's link keys; keys are always BR/EDR
    pub fn load_link_keys(
        &mut self,
        index: u16,
        keys: &[LinkKeyInfo],
        debug_keys: bool,
    ) -> Result<(), MgmtError> {
        self.record(index)?;
        debug!("hci{} keys {} debug_keys {}", index, keys.len(), debug_keys);
        check_key_list(3, keys.len(), LINK_KEY_INFO_SIZE)?;

        let keys = keys
            .iter()
            .map(|key| LinkKeyInfo {
                peer: PeerAddress::bredr(key.peer.address),
                ..*key
            })
            .collect();
        self.send(index, &Command::LoadLinkKeys { debug_keys, keys })
    }

    /// Replace the controller's long term keys
    pub fn load_long_term_keys(
        &mut self,
        index: u16,
        keys: &[LongTermKeyInfo],
    ) -> Result<(), MgmtError> {
        self.record(index)?;
        debug!("hci{} keys {}", index, keys.len());
        check_key_list(2, keys.len(), LONG_TERM_KEY_INFO_SIZE)?;
        self.send(index, &Command::LoadLongTermKeys(keys.to_vec()))
    }

    /// Set the IO capability used for pairing
    pub fn set_io_capability(&mut self, index: u16, io_capability: u8) -> Result<(), MgmtError> {
        self.record(index)?;
        debug!("hci{} io_capability 0x{:02x}", index, io_capability);
        self.send(index, &Command::SetIoCapability(io_capability))
    }

    /// Request local out-of-band data; the result arrives as an event
    pub fn read_local_oob_data(&mut self, index: u16) -> Result<(), MgmtError> {
        self.record(index)?;
        self.send(index, &Command::ReadLocalOobData)
    }

    /// Provide out-of-band data for a BR/EDR peer
    pub fn add_remote_oob_data(
        &mut self,
        index: u16,
        address: &Address,
        hash: [u8; 16],
        randomizer: Option<[u8; 16]>,
    ) -> Result<(), MgmtError> {
        self.record(index)?;
        debug!("hci{} remote oob data for {}", index, address);
        self.send(
            index,
            &Command::AddRemoteOobData {
                peer: PeerAddress::bredr(*address),
                hash,
                randomizer: randomizer.unwrap_or_default(),
            },
        )
    }

    /// Forget out-of-band data for a BR/EDR peer
    pub fn remove_remote_oob_data(&mut self, index: u16, address: &Address) -> Result<(), MgmtError> {
        self.record(index)?;
        self.send(
            index,
            &Command::RemoveRemoteOobData(PeerAddress::bredr(*address)),
        )
    }

    /// Answer a PIN request; `None` rejects it
    pub fn pincode_reply(
        &self,
        index: u16,
        address: &Address,
        pin: Option<&str>,
    ) -> Result<(), MgmtError> {
        self.record(index)?;
        let peer = PeerAddress::bredr(*address);

        let command = match pin {
            None => Command::PinCodeNegReply(peer),
            Some(pin) if pin.len() > MAX_PIN_LENGTH => {
                return Err(MgmtError::InvalidParams(format!(
                    "PIN of {} bytes, at most {} allowed",
                    pin.len(),
                    MAX_PIN_LENGTH
                )));
            }
            Some(pin) => Command::PinCodeReply {
                peer,
                pin: pin.as_bytes().to_vec(),
            },
        };

        debug!("hci{} {} pin reply, pin_len {}", index, address, pin.map_or(0, str::len));
        self.send(index, &command)
    }

    /// Accept or reject a numeric comparison
    pub fn confirm_reply(
        &self,
        index: u16,
        peer: &PeerAddress,
        success: bool,
    ) -> Result<(), MgmtError> {
        self.record(index)?;
        debug!("hci{} {} confirm success {}", index, peer, success);

        let command = if success {
            Command::UserConfirmReply(*peer)
        } else {
            Command::UserConfirmNegReply(*peer)
        };
        self.send(index, &command)
    }

    /// Answer a passkey request; `None` rejects it
    pub fn passkey_reply(
        &self,
        index: u16,
        peer: &PeerAddress,
        passkey: Option<u32>,
    ) -> Result<(), MgmtError> {
        self.record(index)?;

        let command = match passkey {
            Some(passkey) => {
                debug!("hci{} {} passkey {:06}", index, peer, passkey);
                Command::UserPasskeyReply {
                    peer: *peer,
                    passkey,
                }
            }
            None => {
                debug!("hci{} {} passkey rejected", index, peer);
                Command::UserPasskeyNegReply(*peer)
            }
        };
        self.send(index, &command)
    }
}

/// A key list must fit one packet behind its fixed fields
fn check_key_list(fixed: usize, count: usize, entry_size: usize) -> Result<(), MgmtError> {
    let size = fixed + count * entry_size;
    if u16::try_from(size).is_err() {
        return Err(MgmtError::InvalidParams(format!(
            "{} keys need {} payload bytes, at most {} fit",
            count,
            size,
            u16::MAX
        )));
    }
    Ok(())
}
