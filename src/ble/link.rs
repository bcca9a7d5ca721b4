//! The peripheral link and the controller state around it.

use crate::ble::discovery::DiscoveryCursor;
use crate::ble::subscription::SubscriptionState;
use crate::ble::{Address, ConnHandle, Generation, Phy, SecurityLevel};

/// Link lifecycle controller state.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
#[cfg_attr(feature = "defmt", derive(defmt::Format))]
pub enum LinkState {
    /// Nothing running yet, or a scan restart was refused.
    Idle,
    /// Passive scan running, waiting for the split service.
    Scanning,
    /// Connect issued to `peer`, waiting for completion.
    Connecting { peer: Address },
    /// A link is established.
    Connected,
    /// The link just dropped; a rescan is being requested.
    Disconnected,
}

/// GATT progress on the active link.
///
/// A discovery cursor and a subscription can never coexist, and neither
/// can outlive the link that owns them.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
#[cfg_attr(feature = "defmt", derive(defmt::Format))]
pub enum GattState {
    /// Connected but no discovery started (not the peer we scanned for).
    Unsubscribed,
    Discovering(DiscoveryCursor),
    Subscribed(SubscriptionState),
    /// Discovery or subscription gave up; nothing is retried until the
    /// link drops.
    Stalled,
}

/// The single active connection to the peripheral half.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
#[cfg_attr(feature = "defmt", derive(defmt::Format))]
pub struct PeripheralLink {
    pub conn: ConnHandle,
    pub peer: Address,
    pub generation: Generation,
    pub security: SecurityLevel,
    pub phy: Phy,
    /// Connection interval (1.25 ms units), once reported.
    pub interval: Option<u16>,
    /// Peripheral latency, once reported.
    pub latency: Option<u16>,
    /// Supervision timeout (10 ms units), once reported.
    pub supervision_timeout: Option<u16>,
    pub gatt: GattState,
}

impl PeripheralLink {
    pub fn new(conn: ConnHandle, peer: Address, generation: Generation) -> Self {
        Self {
            conn,
            peer,
            generation,
            security: SecurityLevel::Open,
            phy: Phy::Le1M,
            interval: None,
            latency: None,
            supervision_timeout: None,
            gatt: GattState::Unsubscribed,
        }
    }

    pub fn cursor_mut(&mut self) -> Option<&mut DiscoveryCursor> {
        match &mut self.gatt {
            GattState::Discovering(cursor) => Some(cursor),
            _ => None,
        }
    }

    pub fn subscription(&self) -> Option<&SubscriptionState> {
        match &self.gatt {
            GattState::Subscribed(sub) => Some(sub),
            _ => None,
        }
    }

    pub fn subscription_mut(&mut self) -> Option<&mut SubscriptionState> {
        match &mut self.gatt {
            GattState::Subscribed(sub) => Some(sub),
            _ => None,
        }
    }

    pub fn is_discovering(&self) -> bool {
        matches!(self.gatt, GattState::Discovering(_))
    }

    pub fn is_subscribed(&self) -> bool {
        self.subscription().is_some_and(|sub| sub.is_bound())
    }

    pub fn is_stalled(&self) -> bool {
        matches!(self.gatt, GattState::Stalled)
    }
}
