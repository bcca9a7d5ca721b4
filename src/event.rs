//! Events published to the rest of the firmware, and link updates the BLE
//! stack reports without being asked.

use crate::ble::{ConnHandle, Phy, SecurityLevel};

/// A key position on the peripheral half changed state.
///
/// Positions are indices into the peripheral's position-state bitmap
/// (`byte * 8 + bit`), not key codes; mapping them to keys happens
/// further down the event bus.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
#[cfg_attr(feature = "defmt", derive(defmt::Format))]
pub struct PositionChangeEvent {
    pub position: u8,
    pub pressed: bool,
}

impl PositionChangeEvent {
    pub const fn new(position: u8, pressed: bool) -> Self {
        Self { position, pressed }
    }
}

/// Link-layer change reported by the BLE stack outside of any request.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
#[cfg_attr(feature = "defmt", derive(defmt::Format))]
pub enum LinkEvent {
    /// PHY update procedure completed; `phy` is the PHY now in use.
    PhyUpdated { conn: ConnHandle, phy: Phy },
    /// Encryption state of the link changed.
    SecurityChanged { conn: ConnHandle, level: SecurityLevel },
    /// Connection parameters in effect (at connect or after an update).
    ParamsUpdated {
        conn: ConnHandle,
        interval: u16,
        latency: u16,
        supervision_timeout: u16,
    },
    /// The connection dropped with HCI `reason`.
    Disconnected { conn: ConnHandle, reason: u8 },
}
