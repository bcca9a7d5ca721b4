//! [`BleHost`] backed by the Nordic SoftDevice.
//!
//! SoftDevice operations are async, while the session issues requests from
//! inside its callbacks. Requests are therefore queued here and executed
//! by the central task once the callback has returned.

use defmt::{debug, warn};
use heapless::Deque;
use nrf_softdevice::ble::{Address as SdAddress, AddressType};
use nrf_softdevice::raw;

use split_central::ble::discovery::DiscoveryRequest;
use split_central::ble::host::BleHost;
use split_central::ble::subscription::SubscribeRequest;
use split_central::ble::{
    Address, AddressKind, AdvType, ConnHandle, ConnParams, Phy, SecurityLevel,
};
use split_central::config::HOST_COMMAND_QUEUE_LEN;
use split_central::error::HostError;

/// A request waiting for the central task.
#[derive(Clone, Copy, Debug, PartialEq, Eq, defmt::Format)]
pub enum Command {
    StartScan,
    Connect(Address, ConnParams),
    SetSecurity(ConnHandle, SecurityLevel),
    Discover(ConnHandle, DiscoveryRequest),
    Subscribe(ConnHandle, SubscribeRequest),
}

pub struct SoftdeviceHost {
    queue: Deque<Command, HOST_COMMAND_QUEUE_LEN>,
    scanning: bool,
    stop_requested: bool,
    /// PHY to request once the connection to that peer is up.
    pending_phy: Option<(Address, Phy)>,
    connection: Option<(Address, ConnHandle)>,
}

impl SoftdeviceHost {
    pub const fn new() -> Self {
        Self {
            queue: Deque::new(),
            scanning: false,
            stop_requested: false,
            pending_phy: None,
            connection: None,
        }
    }

    pub fn pop(&mut self) -> Option<Command> {
        self.queue.pop_front()
    }

    fn push(&mut self, command: Command) -> Result<(), HostError> {
        self.queue.push_back(command).map_err(|command| {
            warn!("host queue full, dropping {}", command);
            HostError::Busy
        })
    }

    fn is_queued(&self, command: &Command) -> bool {
        self.queue.iter().any(|queued| queued == command)
    }

    /// Drop queued commands matching `f`.
    fn discard(&mut self, f: impl Fn(&Command) -> bool) {
        for _ in 0..self.queue.len() {
            if let Some(command) = self.queue.pop_front() {
                if f(&command) {
                    debug!("discarding {}", command);
                } else {
                    // Cannot fail: one slot was just freed.
                    let _ = self.queue.push_back(command);
                }
            }
        }
    }

    /// Put back a command that cannot run yet; it goes first.
    pub fn requeue(&mut self, command: Command) {
        if self.queue.push_front(command).is_err() {
            warn!("host queue full, dropping {}", command);
        }
    }

    pub fn scan_started(&mut self) {
        self.scanning = true;
        self.stop_requested = false;
    }

    pub fn scan_stopped(&mut self) {
        self.scanning = false;
        self.stop_requested = false;
    }

    /// True once the session asked the running scan to end.
    pub fn stop_requested(&self) -> bool {
        self.stop_requested
    }

    pub fn set_connection(&mut self, connection: Option<(Address, ConnHandle)>) {
        self.connection = connection;
        if connection.is_none() {
            self.discard(|command| {
                matches!(
                    command,
                    Command::SetSecurity(..) | Command::Discover(..) | Command::Subscribe(..)
                )
            });
        }
    }

    pub fn take_phy_request(&mut self, peer: &Address) -> Option<Phy> {
        match self.pending_phy {
            Some((addr, phy)) if addr == *peer => {
                self.pending_phy = None;
                Some(phy)
            }
            _ => None,
        }
    }
}

impl BleHost for SoftdeviceHost {
    fn start_scan(&mut self) -> Result<(), HostError> {
        if (self.scanning && !self.stop_requested) || self.is_queued(&Command::StartScan) {
            return Ok(());
        }
        self.push(Command::StartScan)
    }

    fn stop_scan(&mut self) -> Result<(), HostError> {
        self.discard(|command| matches!(command, Command::StartScan));
        if self.scanning {
            self.stop_requested = true;
        }
        Ok(())
    }

    fn find_connection(&self, peer: &Address) -> Option<ConnHandle> {
        self.connection
            .and_then(|(addr, conn)| (addr == *peer).then_some(conn))
    }

    fn connect(&mut self, peer: &Address, params: &ConnParams) -> Result<(), HostError> {
        self.push(Command::Connect(*peer, *params))
    }

    fn disconnect(&mut self, conn: ConnHandle) -> Result<(), HostError> {
        let reason = raw::BLE_HCI_REMOTE_USER_TERMINATED_CONNECTION as u8;
        let ret = unsafe { raw::sd_ble_gap_disconnect(conn.0, reason) };
        if ret != raw::NRF_SUCCESS {
            return Err(HostError::Rejected(ret));
        }
        Ok(())
    }

    fn update_phy(&mut self, peer: &Address, phy: Phy) -> Result<(), HostError> {
        self.pending_phy = Some((*peer, phy));
        Ok(())
    }

    fn set_security(&mut self, conn: ConnHandle, level: SecurityLevel) -> Result<(), HostError> {
        self.require_connection(conn)?;
        self.push(Command::SetSecurity(conn, level))
    }

    fn discover(&mut self, conn: ConnHandle, request: &DiscoveryRequest) -> Result<(), HostError> {
        self.require_connection(conn)?;
        self.push(Command::Discover(conn, *request))
    }

    fn subscribe(&mut self, conn: ConnHandle, request: &SubscribeRequest) -> Result<(), HostError> {
        self.require_connection(conn)?;
        self.push(Command::Subscribe(conn, *request))
    }
}

impl SoftdeviceHost {
    fn require_connection(&self, conn: ConnHandle) -> Result<(), HostError> {
        match self.connection {
            Some((_, current)) if current == conn => Ok(()),
            _ => Err(HostError::NotConnected),
        }
    }
}

// SoftDevice type conversions

pub fn address_from_raw(raw: raw::ble_gap_addr_t) -> Address {
    let addr = SdAddress::from_raw(raw);
    let kind = match addr.address_type() {
        AddressType::Public => AddressKind::Public,
        AddressType::RandomStatic => AddressKind::RandomStatic,
        AddressType::RandomPrivateResolvable => AddressKind::RandomPrivateResolvable,
        AddressType::RandomPrivateNonResolvable => AddressKind::RandomPrivateNonResolvable,
        AddressType::Anonymous => AddressKind::Anonymous,
    };
    Address::new(kind, addr.bytes())
}

pub fn to_sd_address(addr: &Address) -> SdAddress {
    let kind = match addr.kind {
        AddressKind::Public => AddressType::Public,
        AddressKind::RandomStatic => AddressType::RandomStatic,
        AddressKind::RandomPrivateResolvable => AddressType::RandomPrivateResolvable,
        AddressKind::RandomPrivateNonResolvable => AddressType::RandomPrivateNonResolvable,
        AddressKind::Anonymous => AddressType::Anonymous,
    };
    SdAddress::new(kind, addr.bytes)
}

pub fn adv_type_from_raw(report_type: &raw::ble_gap_adv_report_type_t) -> AdvType {
    if report_type.scan_response() != 0 {
        AdvType::ScanRsp
    } else if report_type.connectable() != 0 && report_type.directed() != 0 {
        AdvType::DirectInd
    } else if report_type.connectable() != 0 {
        AdvType::Ind
    } else if report_type.scannable() != 0 {
        AdvType::ScanInd
    } else {
        AdvType::NonConnInd
    }
}

pub fn phy_to_raw(phy: Phy) -> u8 {
    let mode = match phy {
        Phy::Le1M => raw::BLE_GAP_PHY_1MBPS,
        Phy::Le2M => raw::BLE_GAP_PHY_2MBPS,
        Phy::LeCoded => raw::BLE_GAP_PHY_CODED,
    };
    mode as u8
}

pub fn phy_from_raw(mode: u8) -> Phy {
    match u32::from(mode) {
        raw::BLE_GAP_PHY_2MBPS => Phy::Le2M,
        raw::BLE_GAP_PHY_CODED => Phy::LeCoded,
        _ => Phy::Le1M,
    }
}
