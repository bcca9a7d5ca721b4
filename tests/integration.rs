//! Integration tests for the split central host-testable logic.
//!
//! A simulated stack answers discovery from an attribute table, the way
//! the SoftDevice runtime does, and the session is driven end to end.

use std::collections::VecDeque;

use split_central::ble::attribute_table::AttributeTable;
use split_central::ble::discovery::DiscoveryRequest;
use split_central::ble::subscription::SubscribeRequest;
use split_central::ble::{
    Address, AddressKind, AdvType, ConnHandle, ConnParams, GattUuid, Phy, ScanReport,
    SecurityLevel,
};
use split_central::config::{
    CCC_DESCRIPTOR_UUID, POSITION_STATE_CHAR_UUID, SPLIT_SERVICE_UUID,
};
use split_central::{
    BleHost, Central, Error, HostError, KeyPositionSnapshot, LinkState, PositionChangeEvent,
};

const PEER: Address = Address::new(AddressKind::RandomStatic, [0x10, 0x20, 0x30, 0x40, 0x50, 0xC0]);
const CONN: ConnHandle = ConnHandle(1);
const VALUE_HANDLE: u16 = 0x0022;

fn init_logging() {
    let _ = env_logger::builder().is_test(true).try_init();
}

/// Stack stand-in: requests are queued and answered by [`SimulatedStack::pump`].
#[derive(Default)]
struct SimulatedStack {
    table: AttributeTable<8>,
    scanning: bool,
    connecting: Option<Address>,
    discoveries: VecDeque<(ConnHandle, DiscoveryRequest)>,
    subscribed: Option<SubscribeRequest>,
    security: Option<SecurityLevel>,
}

impl SimulatedStack {
    fn with_split_service() -> Self {
        let mut stack = Self::default();
        let ccc = GattUuid::Uuid16(CCC_DESCRIPTOR_UUID);
        // GAP service first, with a CCC of its own.
        stack.table.insert_service(GattUuid::Uuid16(0x1800), 0x0001, 0x0009).unwrap();
        stack
            .table
            .insert_characteristic(GattUuid::Uuid16(0x2A05), 0x0002, 0x0003)
            .unwrap();
        stack.table.insert_descriptor(ccc, 0x0004).unwrap();
        stack
            .table
            .insert_service(GattUuid::Uuid128(SPLIT_SERVICE_UUID), 0x0020, 0x0024)
            .unwrap();
        stack
            .table
            .insert_characteristic(GattUuid::Uuid128(POSITION_STATE_CHAR_UUID), 0x0021, VALUE_HANDLE)
            .unwrap();
        stack.table.insert_descriptor(ccc, 0x0023).unwrap();
        stack
    }

    /// Answer queued discovery requests until none are left.
    fn pump(&mut self, central: &mut Central) {
        while let Some((conn, request)) = self.discoveries.pop_front() {
            let attr = self.table.lookup(&request);
            let _ = central.on_discovery(self, conn, request.generation, attr);
        }
    }
}

impl BleHost for SimulatedStack {
    fn start_scan(&mut self) -> Result<(), HostError> {
        self.scanning = true;
        Ok(())
    }

    fn stop_scan(&mut self) -> Result<(), HostError> {
        self.scanning = false;
        Ok(())
    }

    fn find_connection(&self, _peer: &Address) -> Option<ConnHandle> {
        None
    }

    fn connect(&mut self, peer: &Address, _params: &ConnParams) -> Result<(), HostError> {
        self.connecting = Some(*peer);
        Ok(())
    }

    fn disconnect(&mut self, _conn: ConnHandle) -> Result<(), HostError> {
        Ok(())
    }

    fn update_phy(&mut self, _peer: &Address, _phy: Phy) -> Result<(), HostError> {
        Ok(())
    }

    fn set_security(&mut self, _conn: ConnHandle, level: SecurityLevel) -> Result<(), HostError> {
        self.security = Some(level);
        Ok(())
    }

    fn discover(&mut self, conn: ConnHandle, request: &DiscoveryRequest) -> Result<(), HostError> {
        self.discoveries.push_back((conn, *request));
        Ok(())
    }

    fn subscribe(&mut self, _conn: ConnHandle, request: &SubscribeRequest) -> Result<(), HostError> {
        self.subscribed = Some(*request);
        Ok(())
    }
}

fn advertisement() -> Vec<u8> {
    let mut data = vec![0x02, 0x01, 0x06];
    // Complete list with two UUIDs, ours second.
    data.extend_from_slice(&[0x21, 0x07]);
    data.extend_from_slice(POSITION_STATE_CHAR_UUID.as_bytes());
    data.extend_from_slice(SPLIT_SERVICE_UUID.as_bytes());
    data
}

fn link_up(stack: &mut SimulatedStack, central: &mut Central) {
    central.start(stack).unwrap();
    let adv = advertisement();
    let report = ScanReport {
        address: PEER,
        rssi: -52,
        adv_type: AdvType::Ind,
        data: &adv,
    };
    central.on_scan_report(stack, &report).unwrap();
    assert!(!stack.scanning);

    let peer = stack.connecting.take().unwrap();
    central.on_connected(stack, peer, Ok(CONN)).unwrap();
    stack.pump(central);
}

#[test]
fn advertisement_to_subscription() {
    init_logging();
    let mut stack = SimulatedStack::with_split_service();
    let mut central = Central::new();

    link_up(&mut stack, &mut central);

    assert_eq!(stack.security, Some(SecurityLevel::Encrypted));
    assert_eq!(stack.subscribed, Some(SubscribeRequest::notify(VALUE_HANDLE, 0x0023)));
    assert_eq!(central.state(), LinkState::Connected);
    assert!(central.link().unwrap().is_subscribed());
}

#[test]
fn notifications_become_position_events() {
    init_logging();
    let mut stack = SimulatedStack::with_split_service();
    let mut central = Central::new();
    link_up(&mut stack, &mut central);

    let mut events = Vec::new();
    let mut sink = |event: PositionChangeEvent| events.push(event);

    let chord = KeyPositionSnapshot::from_positions(&[0, 1, 64]).unwrap();
    central
        .on_notification(&mut sink, CONN, VALUE_HANDLE, Some(chord.as_bytes()))
        .unwrap();
    let release = KeyPositionSnapshot::from_positions(&[64]).unwrap();
    central
        .on_notification(&mut sink, CONN, VALUE_HANDLE, Some(release.as_bytes()))
        .unwrap();

    assert_eq!(
        events,
        vec![
            PositionChangeEvent::new(0, true),
            PositionChangeEvent::new(1, true),
            PositionChangeEvent::new(64, true),
            PositionChangeEvent::new(0, false),
            PositionChangeEvent::new(1, false),
        ]
    );
}

#[test]
fn peripheral_without_split_service_stays_unsubscribed() {
    init_logging();
    let mut stack = SimulatedStack::default();
    let mut central = Central::new();

    link_up(&mut stack, &mut central);

    assert!(stack.subscribed.is_none());
    assert_eq!(central.state(), LinkState::Connected);
    assert!(central.link().unwrap().is_stalled());
}

#[test]
fn link_loss_rescans_and_recovers() {
    init_logging();
    let mut stack = SimulatedStack::with_split_service();
    let mut central = Central::new();
    link_up(&mut stack, &mut central);

    central.on_disconnected(&mut stack, CONN, 0x08).unwrap();
    assert!(stack.scanning);
    assert_eq!(central.state(), LinkState::Scanning);

    // Old handle is gone.
    let mut events = Vec::new();
    let mut sink = |event: PositionChangeEvent| events.push(event);
    let result = central.on_notification(&mut sink, CONN, VALUE_HANDLE, Some(&[0xFF; 16][..]));
    assert_eq!(result, Err(Error::Stale(CONN)));
    assert!(events.is_empty());

    stack.subscribed = None;
    let adv = advertisement();
    let report = ScanReport {
        address: PEER,
        rssi: -60,
        adv_type: AdvType::Ind,
        data: &adv,
    };
    central.on_scan_report(&mut stack, &report).unwrap();
    let peer = stack.connecting.take().unwrap();
    central.on_connected(&mut stack, peer, Ok(ConnHandle(2))).unwrap();
    stack.pump(&mut central);

    assert!(stack.subscribed.is_some());
    assert_eq!(central.link().unwrap().conn, ConnHandle(2));
}
