//! Application-wide constants and compile-time configuration.
//!
//! All protocol identifiers, link parameters and buffer sizes live here
//! so they can be tuned in one place.

use crate::ble::{ConnParams, Phy, SecurityLevel, Uuid128};

// Split service identifiers

/// Split service UUID `00000000-0096-7107-c967-c5cfb1c2482a`.
///
/// Must byte-match what the peripheral half advertises.
pub const SPLIT_SERVICE_UUID: Uuid128 =
    Uuid128::from_u128(0x00000000_0096_7107_c967_c5cfb1c2482a);

/// Key-position-state characteristic UUID `00000001-0096-7107-c967-c5cfb1c2482a`.
pub const POSITION_STATE_CHAR_UUID: Uuid128 =
    Uuid128::from_u128(0x00000001_0096_7107_c967_c5cfb1c2482a);

/// Client Characteristic Configuration descriptor (notification control).
pub const CCC_DESCRIPTOR_UUID: u16 = 0x2902;

// Key position state

/// Length of a position-state notification payload (bytes).
pub const POSITION_STATE_DATA_LEN: usize = 16;

/// Highest number of key positions the bitmap can represent.
pub const MAX_POSITIONS: usize = POSITION_STATE_DATA_LEN * 8;

// BLE link

/// BLE connection interval range (in 1.25 ms units).
/// 6 = 7.5 ms (lowest latency for key events).
pub const BLE_CONN_INTERVAL_MIN: u16 = 6;
pub const BLE_CONN_INTERVAL_MAX: u16 = 6;

/// BLE peripheral latency (number of connection events the peripheral can skip).
pub const BLE_PERIPHERAL_LATENCY: u16 = 30;

/// BLE supervision timeout (in 10 ms units). 400 = 4 s.
pub const BLE_SUP_TIMEOUT: u16 = 400;

/// Connection parameters requested when connecting to the peripheral half.
pub const SPLIT_CONN_PARAMS: ConnParams = ConnParams {
    interval_min: BLE_CONN_INTERVAL_MIN,
    interval_max: BLE_CONN_INTERVAL_MAX,
    latency: BLE_PERIPHERAL_LATENCY,
    supervision_timeout: BLE_SUP_TIMEOUT,
};

/// Radio mode requested right after issuing the connect.
pub const SPLIT_PREFERRED_PHY: Phy = Phy::Le2M;

/// Security level requested once connected.
pub const SPLIT_SECURITY_LEVEL: SecurityLevel = SecurityLevel::Encrypted;

/// Passive scan interval (0.625 ms units). 0x60 = 60 ms.
pub const SCAN_INTERVAL: u16 = 0x0060;

/// Passive scan window (0.625 ms units). 0x30 = 30 ms.
pub const SCAN_WINDOW: u16 = 0x0030;

// Runtime (embedded only)

/// ATT MTU used on the split link. The default is enough for a 16-byte
/// position-state notification.
pub const ATT_MTU: u16 = 23;

/// Largest notification payload that fits the ATT MTU.
pub const NOTIFY_MAX_LEN: usize = ATT_MTU as usize - 3;

/// Depth of the position event channel towards the keymap.
pub const POSITION_EVENT_QUEUE_LEN: usize = 32;

/// Depth of the queue of requests pending execution on the SoftDevice.
pub const HOST_COMMAND_QUEUE_LEN: usize = 8;

/// Depth of the link update queue between the SoftDevice and central tasks.
pub const LINK_EVENT_QUEUE_LEN: usize = 8;

/// Maximum number of attributes kept from one service discovery.
pub const ATTRIBUTE_TABLE_CAPACITY: usize = 8;

/// Delay before re-arming a scan the SoftDevice aborted (ms).
pub const SCAN_RETRY_DELAY_MS: u64 = 1000;
