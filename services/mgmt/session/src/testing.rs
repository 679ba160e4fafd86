//! Recording doubles and packet builders shared by the driver tests.

use crate::adapter::{AdapterManager, AppliedSettings, DeviceFound, PinCode};
use crate::driver::{Driver, DriverConfig};
use crate::transport::MgmtSocket;
use bytes::{BufMut, Bytes, BytesMut};
use mgmt_wire::{
    encode_packet, parse_packet, Address, Command, DisconnectReason, LinkKeyInfo,
    LongTermKeyInfo, OobData, Opcode, PeerAddress, Settings, Status, MAX_NAME_LENGTH,
};
use std::collections::{HashMap, HashSet};
use std::io;
use std::sync::{Arc, Mutex};

/// Identity address every test controller reports
pub const ADAPTER: [u8; 6] = [0x01, 0x02, 0x03, 0x04, 0x05, 0x06];
/// Address of the remote peer used throughout
pub const PEER: [u8; 6] = [0xA1, 0xA2, 0xA3, 0xA4, 0xA5, 0xA6];

pub const EV_COMMAND_COMPLETE: u16 = 0x0001;
pub const EV_COMMAND_STATUS: u16 = 0x0002;
pub const EV_CONTROLLER_ERROR: u16 = 0x0003;
pub const EV_INDEX_ADDED: u16 = 0x0004;
pub const EV_INDEX_REMOVED: u16 = 0x0005;
pub const EV_NEW_SETTINGS: u16 = 0x0006;
pub const EV_CLASS_OF_DEV_CHANGED: u16 = 0x0007;
pub const EV_LOCAL_NAME_CHANGED: u16 = 0x0008;
pub const EV_NEW_LINK_KEY: u16 = 0x0009;
pub const EV_NEW_LONG_TERM_KEY: u16 = 0x000A;
pub const EV_DEVICE_CONNECTED: u16 = 0x000B;
pub const EV_DEVICE_DISCONNECTED: u16 = 0x000C;
pub const EV_CONNECT_FAILED: u16 = 0x000D;
pub const EV_PIN_CODE_REQUEST: u16 = 0x000E;
pub const EV_USER_CONFIRM_REQUEST: u16 = 0x000F;
pub const EV_USER_PASSKEY_REQUEST: u16 = 0x0010;
pub const EV_AUTH_FAILED: u16 = 0x0011;
pub const EV_DEVICE_FOUND: u16 = 0x0012;
pub const EV_DISCOVERING: u16 = 0x0013;
pub const EV_DEVICE_BLOCKED: u16 = 0x0014;
pub const EV_DEVICE_UNBLOCKED: u16 = 0x0015;
pub const EV_DEVICE_UNPAIRED: u16 = 0x0016;
pub const EV_PASSKEY_NOTIFY: u16 = 0x0017;

/// Socket double keeping every written packet
#[derive(Debug, Default)]
pub struct RecordingSocket {
    sent: Mutex<Vec<Bytes>>,
    fail: Mutex<bool>,
    fail_next: Mutex<usize>,
}

impl RecordingSocket {
    /// Drain written packets as (opcode, index, payload)
    pub fn take(&self) -> Vec<(u16, u16, Vec<u8>)> {
        let sent = std::mem::take(&mut *self.sent.lock().unwrap());
        sent.iter()
            .map(|packet| {
                let (header, payload) = parse_packet(packet).unwrap();
                (header.code, header.index, payload.to_vec())
            })
            .collect()
    }

    /// Drain written packets as (opcode, index)
    pub fn opcodes(&self) -> Vec<(u16, u16)> {
        self.take()
            .into_iter()
            .map(|(opcode, index, _)| (opcode, index))
            .collect()
    }

    pub fn fail_writes(&self, fail: bool) {
        *self.fail.lock().unwrap() = fail;
    }

    /// Fail only the next `count` writes
    pub fn fail_next(&self, count: usize) {
        *self.fail_next.lock().unwrap() = count;
    }
}

impl MgmtSocket for RecordingSocket {
    fn send(&self, packet: &[u8]) -> io::Result<()> {
        let mut fail_next = self.fail_next.lock().unwrap();
        if *self.fail.lock().unwrap() || *fail_next > 0 {
            *fail_next = fail_next.saturating_sub(1);
            return Err(io::Error::from(io::ErrorKind::BrokenPipe));
        }
        drop(fail_next);
        self.sent.lock().unwrap().push(Bytes::copy_from_slice(packet));
        Ok(())
    }
}

/// Adapter model call, queries excluded
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Call {
    Register(u16, Address, bool),
    Unregister(u16),
    Power(Address, bool),
    Settings(Address, AppliedSettings),
    NameChanged(Address, String),
    ClassChanged(Address, [u8; 3]),
    Discovering(Address, bool),
    LocalOob(Address, Option<OobData>),
    Found(Address, DeviceFound),
    CachedName(Address, Address, String),
    Bonding(Address, PeerAddress, Status),
    Created(Address, PeerAddress),
    DeviceClass(Address, PeerAddress, u32),
    DeviceName(Address, PeerAddress, String),
    Connected(Address, PeerAddress),
    Disconnected(Address, PeerAddress, DisconnectReason),
    ConnectFailed(Address, PeerAddress, Status),
    Blocked(Address, PeerAddress, bool),
    Unpaired(Address, PeerAddress),
    Bonded(Address, PeerAddress),
    NotifyPin(Address, PeerAddress, String),
    RequestPin(Address, PeerAddress, bool),
    RequestPasskey(Address, PeerAddress),
    NotifyPasskey(Address, PeerAddress, u32, u8),
    ConfirmPasskey(Address, PeerAddress, u32, bool),
    LinkKey(Address, LinkKeyInfo),
    LongTermKey(Address, LongTermKeyInfo),
}

#[derive(Debug, Default)]
struct ModelState {
    calls: Vec<Call>,
    adapters: HashMap<u16, Address>,
    devices: HashSet<PeerAddress>,
    name: Option<String>,
    class: (u8, u8),
    pin: Option<PinCode>,
    bonding: bool,
    agent_fails: bool,
}

/// Adapter model double recording every notification
#[derive(Debug, Default)]
pub struct RecordingAdapter {
    state: Mutex<ModelState>,
}

impl RecordingAdapter {
    pub fn calls(&self) -> Vec<Call> {
        self.state.lock().unwrap().calls.clone()
    }

    pub fn clear(&self) {
        self.state.lock().unwrap().calls.clear();
    }

    pub fn set_name(&self, name: Option<&str>) {
        self.state.lock().unwrap().name = name.map(str::to_string);
    }

    pub fn set_class(&self, major: u8, minor: u8) {
        self.state.lock().unwrap().class = (major, minor);
    }

    pub fn set_pin(&self, pin: Option<PinCode>) {
        self.state.lock().unwrap().pin = pin;
    }

    pub fn set_bonding(&self, bonding: bool) {
        self.state.lock().unwrap().bonding = bonding;
    }

    pub fn fail_agent(&self, fail: bool) {
        self.state.lock().unwrap().agent_fails = fail;
    }

    pub fn add_device(&self, peer: PeerAddress) {
        self.state.lock().unwrap().devices.insert(peer);
    }

    fn record(&self, call: Call) {
        self.state.lock().unwrap().calls.push(call);
    }

    fn agent(&self, call: Call) -> anyhow::Result<()> {
        let mut state = self.state.lock().unwrap();
        state.calls.push(call);
        if state.agent_fails {
            anyhow::bail!("no agent registered");
        }
        Ok(())
    }
}

impl AdapterManager for RecordingAdapter {
    fn register_adapter(&self, index: u16, address: &Address, powered: bool) -> bool {
        let mut state = self.state.lock().unwrap();
        state.adapters.insert(index, *address);
        state.calls.push(Call::Register(index, *address, powered));
        true
    }

    fn unregister_adapter(&self, index: u16) {
        let mut state = self.state.lock().unwrap();
        state.adapters.remove(&index);
        state.calls.push(Call::Unregister(index));
    }

    fn has_adapter(&self, adapter: &Address) -> bool {
        self.state
            .lock()
            .unwrap()
            .adapters
            .values()
            .any(|a| a == adapter)
    }

    fn notify_power(&self, adapter: &Address, powered: bool) {
        self.record(Call::Power(*adapter, powered));
    }

    fn notify_settings(&self, adapter: &Address, settings: AppliedSettings) {
        self.record(Call::Settings(*adapter, settings));
    }

    fn configured_name(&self, _adapter: &Address) -> Option<String> {
        self.state.lock().unwrap().name.clone()
    }

    fn configured_class(&self, _adapter: &Address) -> (u8, u8) {
        self.state.lock().unwrap().class
    }

    fn notify_name_changed(&self, adapter: &Address, name: &str) {
        self.record(Call::NameChanged(*adapter, name.to_string()));
    }

    fn notify_class_changed(&self, adapter: &Address, class: [u8; 3]) {
        self.record(Call::ClassChanged(*adapter, class));
    }

    fn notify_discovering(&self, adapter: &Address, discovering: bool) {
        self.record(Call::Discovering(*adapter, discovering));
    }

    fn notify_local_oob_data(&self, adapter: &Address, data: Option<&OobData>) {
        self.record(Call::LocalOob(*adapter, data.copied()));
    }

    fn notify_device_found(&self, adapter: &Address, found: &DeviceFound) {
        self.record(Call::Found(*adapter, found.clone()));
    }

    fn store_cached_name(&self, adapter: &Address, peer: &Address, name: &str) {
        self.record(Call::CachedName(*adapter, *peer, name.to_string()));
    }

    fn notify_bonding_result(&self, adapter: &Address, peer: &PeerAddress, status: Status) {
        self.record(Call::Bonding(*adapter, *peer, status));
    }

    fn find_or_create_device(&self, adapter: &Address, peer: &PeerAddress) -> bool {
        let mut state = self.state.lock().unwrap();
        if state.devices.insert(*peer) {
            state.calls.push(Call::Created(*adapter, *peer));
        }
        true
    }

    fn find_device(&self, _adapter: &Address, peer: &PeerAddress) -> bool {
        self.state.lock().unwrap().devices.contains(peer)
    }

    fn set_device_class(&self, adapter: &Address, peer: &PeerAddress, class: u32) {
        self.record(Call::DeviceClass(*adapter, *peer, class));
    }

    fn notify_device_name(&self, adapter: &Address, peer: &PeerAddress, name: &str) {
        self.record(Call::DeviceName(*adapter, *peer, name.to_string()));
    }

    fn notify_connected(&self, adapter: &Address, peer: &PeerAddress) {
        self.record(Call::Connected(*adapter, *peer));
    }

    fn notify_disconnected(&self, adapter: &Address, peer: &PeerAddress, reason: DisconnectReason) {
        self.record(Call::Disconnected(*adapter, *peer, reason));
    }

    fn notify_connect_failed(&self, adapter: &Address, peer: &PeerAddress, status: Status) {
        self.record(Call::ConnectFailed(*adapter, *peer, status));
    }

    fn notify_blocked(&self, adapter: &Address, peer: &PeerAddress, blocked: bool) {
        self.record(Call::Blocked(*adapter, *peer, blocked));
    }

    fn notify_unpaired(&self, adapter: &Address, peer: &PeerAddress) {
        self.record(Call::Unpaired(*adapter, *peer));
    }

    fn notify_bonded(&self, adapter: &Address, peer: &PeerAddress) {
        self.record(Call::Bonded(*adapter, *peer));
    }

    fn get_configured_pin(&self, _adapter: &Address, _peer: &PeerAddress) -> Option<PinCode> {
        self.state.lock().unwrap().pin.clone()
    }

    fn device_is_bonding(&self, _adapter: &Address, _peer: &PeerAddress) -> bool {
        self.state.lock().unwrap().bonding
    }

    fn notify_pin(
        &self,
        adapter: &Address,
        peer: &PeerAddress,
        _secure: bool,
        pin: &str,
    ) -> anyhow::Result<()> {
        self.agent(Call::NotifyPin(*adapter, *peer, pin.to_string()))
    }

    fn request_pin(
        &self,
        adapter: &Address,
        peer: &PeerAddress,
        secure: bool,
    ) -> anyhow::Result<()> {
        self.agent(Call::RequestPin(*adapter, *peer, secure))
    }

    fn request_passkey(&self, adapter: &Address, peer: &PeerAddress) -> anyhow::Result<()> {
        self.agent(Call::RequestPasskey(*adapter, *peer))
    }

    fn notify_passkey(
        &self,
        adapter: &Address,
        peer: &PeerAddress,
        passkey: u32,
        entered: u8,
    ) -> anyhow::Result<()> {
        self.agent(Call::NotifyPasskey(*adapter, *peer, passkey, entered))
    }

    fn confirm_passkey(
        &self,
        adapter: &Address,
        peer: &PeerAddress,
        value: u32,
        confirm_hint: bool,
    ) -> anyhow::Result<()> {
        self.agent(Call::ConfirmPasskey(*adapter, *peer, value, confirm_hint))
    }

    fn store_link_key(&self, adapter: &Address, key: &LinkKeyInfo) {
        self.record(Call::LinkKey(*adapter, *key));
    }

    fn store_long_term_key(&self, adapter: &Address, key: &LongTermKeyInfo) {
        self.record(Call::LongTermKey(*adapter, *key));
    }
}

/// Fresh driver wired to recording doubles
pub fn driver() -> (Driver, Arc<RecordingSocket>, Arc<RecordingAdapter>) {
    let socket = Arc::new(RecordingSocket::default());
    let manager = Arc::new(RecordingAdapter::default());
    let driver = Driver::new(DriverConfig::default(), socket.clone(), manager.clone());
    (driver, socket, manager)
}

/// Event packet
pub fn event(code: u16, index: u16, payload: &[u8]) -> Vec<u8> {
    encode_packet(code, index, payload).unwrap().to_vec()
}

/// Command-complete event for a known opcode
pub fn complete(index: u16, opcode: Opcode, status: u8, data: &[u8]) -> Vec<u8> {
    complete_raw(index, opcode as u16, status, data)
}

/// Command-complete event for any opcode value
pub fn complete_raw(index: u16, opcode: u16, status: u8, data: &[u8]) -> Vec<u8> {
    let mut payload = BytesMut::new();
    payload.put_u16_le(opcode);
    payload.put_u8(status);
    payload.put_slice(data);
    event(EV_COMMAND_COMPLETE, index, &payload)
}

/// Command-status event
pub fn status(index: u16, opcode: Opcode, status: Status) -> Vec<u8> {
    let mut payload = BytesMut::new();
    payload.put_u16_le(opcode as u16);
    payload.put_u8(status.code());
    event(EV_COMMAND_STATUS, index, &payload)
}

/// Payload a command encodes to
pub fn payload(command: &Command) -> Vec<u8> {
    let mut buf = BytesMut::new();
    command.encode_payload(&mut buf);
    buf.to_vec()
}

/// Read-info reply body
pub fn read_info_reply(
    address: [u8; 6],
    supported: Settings,
    current: Settings,
    name: &str,
) -> Vec<u8> {
    let mut buf = BytesMut::new();
    buf.put_slice(&address);
    buf.put_u8(0x06);
    buf.put_u16_le(0x000F);
    buf.put_u32_le(supported.bits());
    buf.put_u32_le(current.bits());
    buf.put_slice(&[0x0C, 0x01, 0x00]);
    buf.put_slice(name.as_bytes());
    buf.put_bytes(0, MAX_NAME_LENGTH - name.len());
    buf.put_bytes(0, 11);
    buf.to_vec()
}

/// Address info block of a peer
pub fn peer_bytes(peer: &PeerAddress) -> Vec<u8> {
    let mut bytes = peer.address.0.to_vec();
    bytes.push(peer.kind as u8);
    bytes
}

/// Get-connections reply body
pub fn connections(peers: &[PeerAddress]) -> Vec<u8> {
    let mut bytes = (peers.len() as u16).to_le_bytes().to_vec();
    for peer in peers {
        bytes.extend(peer_bytes(peer));
    }
    bytes
}

/// Device-found event body; the EIR length sits at offset 12
pub fn device_found(peer: &PeerAddress, rssi: i8, flags: u32, eir: &[u8]) -> Vec<u8> {
    let mut buf = BytesMut::from(peer_bytes(peer).as_slice());
    buf.put_i8(rssi);
    buf.put_u32_le(flags);
    buf.put_u16_le(eir.len() as u16);
    buf.put_slice(eir);
    buf.to_vec()
}

/// Device-connected event body
pub fn device_connected(peer: &PeerAddress, eir: &[u8]) -> Vec<u8> {
    let mut buf = BytesMut::from(peer_bytes(peer).as_slice());
    buf.put_u32_le(0);
    buf.put_u16_le(eir.len() as u16);
    buf.put_slice(eir);
    buf.to_vec()
}

/// New-link-key event body
pub fn new_link_key(peer: &PeerAddress, store_hint: bool, pin_len: u8) -> Vec<u8> {
    let mut buf = BytesMut::new();
    buf.put_u8(store_hint as u8);
    buf.put_slice(&peer_bytes(peer));
    buf.put_u8(0x04);
    buf.put_bytes(0x5C, 16);
    buf.put_u8(pin_len);
    buf.to_vec()
}

/// New-long-term-key event body
pub fn new_ltk(peer: &PeerAddress, store_hint: bool, master: bool) -> Vec<u8> {
    let mut buf = BytesMut::new();
    buf.put_u8(store_hint as u8);
    buf.put_slice(&peer_bytes(peer));
    buf.put_u8(1);
    buf.put_u8(master as u8);
    buf.put_u8(16);
    buf.put_u16_le(0x1234);
    buf.put_bytes(0x77, 8);
    buf.put_bytes(0x3E, 16);
    buf.to_vec()
}

/// Add controller `index` and answer its read-info
pub fn register_controller(driver: &mut Driver, index: u16, current: Settings) {
    driver
        .handle_packet(&event(EV_INDEX_ADDED, index, &[]))
        .unwrap();
    driver
        .handle_packet(&complete(
            index,
            Opcode::ReadInfo,
            0,
            &read_info_reply(ADAPTER, Settings::all(), current, "hw-name"),
        ))
        .unwrap();
}

/// Complete the UUID clear issued during bring-up of controller 0
pub fn settle(driver: &mut Driver) {
    driver
        .handle_packet(&complete(0, Opcode::RemoveUuid, 0, &[0, 0, 0]))
        .unwrap();
}
