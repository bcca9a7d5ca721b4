//! Central-side link manager for a split keyboard.
//!
//! The central half scans for the peripheral half, connects, finds the
//! key-position-state characteristic and turns its notifications into
//! press/release events for the keymap.
//!
//! Everything here is platform independent and runs on the host:
//!
//! Usage: `cargo test` (logging via `RUST_LOG=debug`)
//!
//! Note: The embedded binary uses main.rs with #![no_std] and #![no_main]
//! and drives [`central::Central`] from the Nordic SoftDevice.

#![cfg_attr(not(test), no_std)]

// Must come first so the logging macros are visible to every module.
#[macro_use]
mod fmt;

pub mod ble;
pub mod central;
pub mod config;
pub mod error;
pub mod event;

pub use ble::decoder::KeyPositionSnapshot;
pub use ble::host::{BleHost, EventSink};
pub use ble::link::{GattState, LinkState};
pub use central::Central;
pub use error::{DecodeError, Error, HostError, Request};
pub use event::{LinkEvent, PositionChangeEvent};
