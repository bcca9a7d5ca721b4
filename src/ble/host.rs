//! Seams towards the BLE stack and the firmware event bus.
//!
//! Every [`BleHost`] request is non-blocking: the return value only says
//! whether the stack accepted it. The outcome arrives later through one of
//! the [`Central`](crate::central::Central) callbacks.

use crate::ble::discovery::DiscoveryRequest;
use crate::ble::subscription::SubscribeRequest;
use crate::ble::{Address, ConnHandle, ConnParams, Phy, SecurityLevel};
use crate::error::HostError;
use crate::event::PositionChangeEvent;

/// Outbound requests to the platform BLE stack.
pub trait BleHost {
    /// Start a passive scan. Results arrive through `on_scan_report`.
    fn start_scan(&mut self) -> Result<(), HostError>;

    /// Stop the running scan.
    fn stop_scan(&mut self) -> Result<(), HostError>;

    /// Look up an already established connection to `peer`.
    fn find_connection(&self, peer: &Address) -> Option<ConnHandle>;

    /// Create a connection. Completion arrives through `on_connected`.
    fn connect(&mut self, peer: &Address, params: &ConnParams) -> Result<(), HostError>;

    /// Drop the connection `conn`.
    fn disconnect(&mut self, conn: ConnHandle) -> Result<(), HostError>;

    /// Ask for a PHY change on the (pending or established) connection
    /// to `peer`.
    fn update_phy(&mut self, peer: &Address, phy: Phy) -> Result<(), HostError>;

    /// Ask for the link to be raised to `level`.
    fn set_security(&mut self, conn: ConnHandle, level: SecurityLevel) -> Result<(), HostError>;

    /// Look for the first attribute matching `request`. The response
    /// arrives through `on_discovery`, tagged with the request's generation.
    fn discover(&mut self, conn: ConnHandle, request: &DiscoveryRequest) -> Result<(), HostError>;

    /// Enable notifications. They arrive through `on_notification`.
    fn subscribe(&mut self, conn: ConnHandle, request: &SubscribeRequest) -> Result<(), HostError>;
}

/// Destination for decoded position changes (the firmware event bus).
pub trait EventSink {
    fn publish(&mut self, event: PositionChangeEvent);
}

impl<F: FnMut(PositionChangeEvent)> EventSink for F {
    fn publish(&mut self, event: PositionChangeEvent) {
        self(event)
    }
}
