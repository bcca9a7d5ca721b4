//! Unified error type for split_central.
//!
//! We avoid `alloc` - all error variants carry only fixed-size data.
//! Implements `defmt::Format` for efficient on-target logging.

use core::fmt;

use crate::ble::ConnHandle;

/// Top-level error type returned by the session callbacks.
///
/// Only [`Error::FatalInit`] is meant to leave the BLE task; everything
/// else has already been logged and contained by the time it is returned.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
#[cfg_attr(feature = "defmt", derive(defmt::Format))]
pub enum Error {
    /// Scanning could not be started at boot.
    FatalInit(HostError),

    /// The BLE stack rejected a scan/connect/discover/subscribe request.
    Transient(Request, HostError),

    /// Malformed advertisement record or notification payload.
    ProtocolMismatch(DecodeError),

    /// Callback refers to a connection that is no longer the active link.
    Stale(ConnHandle),
}

impl Error {
    pub fn is_fatal(&self) -> bool {
        matches!(self, Error::FatalInit(_))
    }
}

/// Outbound request kind, used to tag transient failures.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
#[cfg_attr(feature = "defmt", derive(defmt::Format))]
pub enum Request {
    StartScan,
    StopScan,
    Connect,
    PhyUpdate,
    Discover,
    Subscribe,
}

/// Immediate rejection of a request by the BLE stack.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
#[cfg_attr(feature = "defmt", derive(defmt::Format))]
pub enum HostError {
    /// Radio or request queue busy.
    Busy,
    /// Notifications are already enabled for this characteristic.
    AlreadySubscribed,
    /// The connection the request refers to does not exist.
    NotConnected,
    /// Raw error code from the stack.
    Rejected(u32),
}

/// Payload or record that does not have the expected shape.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
#[cfg_attr(feature = "defmt", derive(defmt::Format))]
pub enum DecodeError {
    /// Notification payload is not exactly the position-state length.
    WrongLength { expected: usize, actual: usize },
    /// 128-bit UUID list whose length is not a multiple of 16.
    MalformedUuidList { len: usize },
    /// Position does not fit in the position-state bitmap.
    PositionOutOfRange(usize),
}

impl fmt::Display for Error {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Error::FatalInit(e) => write!(f, "scan failed to start: {}", e),
            Error::Transient(req, e) => write!(f, "{:?} request rejected: {}", req, e),
            Error::ProtocolMismatch(e) => write!(f, "protocol mismatch: {}", e),
            Error::Stale(conn) => write!(f, "stale event for connection {}", conn.0),
        }
    }
}

impl fmt::Display for HostError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            HostError::Busy => write!(f, "busy"),
            HostError::AlreadySubscribed => write!(f, "already subscribed"),
            HostError::NotConnected => write!(f, "not connected"),
            HostError::Rejected(code) => write!(f, "rejected (err {})", code),
        }
    }
}

impl fmt::Display for DecodeError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            DecodeError::WrongLength { expected, actual } => {
                write!(f, "payload is {} bytes, expected {}", actual, expected)
            }
            DecodeError::MalformedUuidList { len } => {
                write!(f, "128-bit UUID list of {} bytes", len)
            }
            DecodeError::PositionOutOfRange(p) => write!(f, "position {} out of range", p),
        }
    }
}

// Convenience conversions

impl From<DecodeError> for Error {
    fn from(e: DecodeError) -> Self {
        Error::ProtocolMismatch(e)
    }
}
