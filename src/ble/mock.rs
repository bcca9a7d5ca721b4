//! Recording BLE host for tests.
//!
//! Every request is logged in order and can be made to fail, so tests can
//! drive the session through callbacks and assert on what it asked the
//! stack to do.

use crate::ble::discovery::DiscoveryRequest;
use crate::ble::host::{BleHost, EventSink};
use crate::ble::subscription::SubscribeRequest;
use crate::ble::{Address, ConnHandle, ConnParams, Phy, SecurityLevel};
use crate::error::HostError;
use crate::event::PositionChangeEvent;

/// One request the session made.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum HostCall {
    StartScan,
    StopScan,
    Connect(Address, ConnParams),
    Disconnect(ConnHandle),
    UpdatePhy(Address, Phy),
    SetSecurity(ConnHandle, SecurityLevel),
    Discover(ConnHandle, DiscoveryRequest),
    Subscribe(ConnHandle, SubscribeRequest),
}

#[derive(Default)]
pub struct MockHost {
    calls: Vec<HostCall>,
    connections: Vec<(Address, ConnHandle)>,
    pub fail_start_scan: Option<HostError>,
    pub fail_stop_scan: Option<HostError>,
    pub fail_connect: Option<HostError>,
    pub fail_update_phy: Option<HostError>,
    pub fail_security: Option<HostError>,
    pub fail_discover: Option<HostError>,
    pub fail_subscribe: Option<HostError>,
}

impl MockHost {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn calls(&self) -> &[HostCall] {
        &self.calls
    }

    pub fn clear(&mut self) {
        self.calls.clear();
    }

    /// Make `peer` look already connected, for the existing-connection path.
    pub fn add_connection(&mut self, peer: Address, conn: ConnHandle) {
        self.connections.push((peer, conn));
    }

    pub fn last_discovery(&self) -> Option<DiscoveryRequest> {
        self.calls.iter().rev().find_map(|call| match call {
            HostCall::Discover(_, request) => Some(*request),
            _ => None,
        })
    }

    pub fn discover_count(&self) -> usize {
        self.calls
            .iter()
            .filter(|call| matches!(call, HostCall::Discover(..)))
            .count()
    }

    fn record(&mut self, call: HostCall, fail: Option<HostError>) -> Result<(), HostError> {
        self.calls.push(call);
        match fail {
            Some(e) => Err(e),
            None => Ok(()),
        }
    }
}

impl BleHost for MockHost {
    fn start_scan(&mut self) -> Result<(), HostError> {
        self.record(HostCall::StartScan, self.fail_start_scan)
    }

    fn stop_scan(&mut self) -> Result<(), HostError> {
        self.record(HostCall::StopScan, self.fail_stop_scan)
    }

    fn find_connection(&self, peer: &Address) -> Option<ConnHandle> {
        self.connections
            .iter()
            .find_map(|(addr, conn)| (addr == peer).then_some(*conn))
    }

    fn connect(&mut self, peer: &Address, params: &ConnParams) -> Result<(), HostError> {
        self.record(HostCall::Connect(*peer, *params), self.fail_connect)
    }

    fn disconnect(&mut self, conn: ConnHandle) -> Result<(), HostError> {
        self.record(HostCall::Disconnect(conn), None)
    }

    fn update_phy(&mut self, peer: &Address, phy: Phy) -> Result<(), HostError> {
        self.record(HostCall::UpdatePhy(*peer, phy), self.fail_update_phy)
    }

    fn set_security(&mut self, conn: ConnHandle, level: SecurityLevel) -> Result<(), HostError> {
        self.record(HostCall::SetSecurity(conn, level), self.fail_security)
    }

    fn discover(&mut self, conn: ConnHandle, request: &DiscoveryRequest) -> Result<(), HostError> {
        self.record(HostCall::Discover(conn, *request), self.fail_discover)
    }

    fn subscribe(&mut self, conn: ConnHandle, request: &SubscribeRequest) -> Result<(), HostError> {
        self.record(HostCall::Subscribe(conn, *request), self.fail_subscribe)
    }
}

/// Event bus stand-in that keeps everything published.
#[derive(Default)]
pub struct RecordingSink {
    pub events: Vec<PositionChangeEvent>,
}

impl EventSink for RecordingSink {
    fn publish(&mut self, event: PositionChangeEvent) {
        self.events.push(event);
    }
}
