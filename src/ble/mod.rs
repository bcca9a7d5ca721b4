//! Bluetooth Low Energy link to the peripheral half.
//!
//! This module holds the platform-independent pieces of the **Central**
//! role:
//!
//! 1. **Advertisement filter** - recognises the split service in scan
//!    reports and decides when to connect.
//! 2. **Link** - the single peripheral connection and its GATT progress.
//! 3. **Discovery** - the three-phase search for the position-state
//!    characteristic and its CCC descriptor.
//! 4. **Subscription** - enabling notifications on that characteristic.
//! 5. **Decoder** - turning position-state snapshots into press/release
//!    events.
//!
//! The radio itself is reached only through [`host::BleHost`]; the session
//! that ties everything together is [`crate::central::Central`].

pub mod adv_filter;
pub mod attribute_table;
pub mod decoder;
pub mod discovery;
pub mod host;
pub mod link;
pub mod subscription;

#[cfg(test)]
pub mod mock;

/// BLE device address type, as reported by the controller.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
#[cfg_attr(feature = "defmt", derive(defmt::Format))]
pub enum AddressKind {
    Public,
    RandomStatic,
    RandomPrivateResolvable,
    RandomPrivateNonResolvable,
    Anonymous,
}

/// BLE device address (little-endian bytes, as on the air).
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
#[cfg_attr(feature = "defmt", derive(defmt::Format))]
pub struct Address {
    pub kind: AddressKind,
    pub bytes: [u8; 6],
}

impl Address {
    pub const fn new(kind: AddressKind, bytes: [u8; 6]) -> Self {
        Self { kind, bytes }
    }
}

/// Connection handle assigned by the BLE stack.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
#[cfg_attr(feature = "defmt", derive(defmt::Format))]
pub struct ConnHandle(pub u16);

/// Link generation. Bumped for every connection the session accepts, so
/// completions belonging to an earlier connection can be told apart even
/// when the stack reuses a handle.
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq, PartialOrd, Ord)]
#[cfg_attr(feature = "defmt", derive(defmt::Format))]
pub struct Generation(pub u32);

impl Generation {
    pub fn next(self) -> Self {
        Generation(self.0.wrapping_add(1))
    }
}

/// 128-bit UUID stored little-endian, the order used in advertising data
/// and ATT PDUs.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
#[cfg_attr(feature = "defmt", derive(defmt::Format))]
pub struct Uuid128(pub [u8; 16]);

impl Uuid128 {
    /// Build from the canonical big-endian textual value, e.g.
    /// `0x00000000_0096_7107_c967_c5cfb1c2482a`.
    pub const fn from_u128(value: u128) -> Self {
        Self(value.to_le_bytes())
    }

    /// Build from 16 little-endian bytes taken from the air.
    pub fn from_le_slice(bytes: &[u8]) -> Option<Self> {
        let raw: [u8; 16] = bytes.try_into().ok()?;
        Some(Self(raw))
    }

    pub const fn as_bytes(&self) -> &[u8; 16] {
        &self.0
    }
}

/// Attribute type identifier used as a discovery target.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
#[cfg_attr(feature = "defmt", derive(defmt::Format))]
pub enum GattUuid {
    Uuid16(u16),
    Uuid128(Uuid128),
}

/// Advertising PDU type of a scan report.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
#[cfg_attr(feature = "defmt", derive(defmt::Format))]
pub enum AdvType {
    /// Connectable undirected (`ADV_IND`).
    Ind,
    /// Connectable directed (`ADV_DIRECT_IND`).
    DirectInd,
    /// Scannable undirected (`ADV_SCAN_IND`).
    ScanInd,
    /// Non-connectable undirected (`ADV_NONCONN_IND`).
    NonConnInd,
    /// Scan response (`SCAN_RSP`).
    ScanRsp,
}

impl AdvType {
    /// Only connectable advertisements are worth inspecting.
    pub fn is_connectable(self) -> bool {
        matches!(self, AdvType::Ind | AdvType::DirectInd)
    }
}

/// One advertisement seen while scanning.
#[derive(Clone, Copy, Debug)]
pub struct ScanReport<'a> {
    pub address: Address,
    pub rssi: i8,
    pub adv_type: AdvType,
    /// Raw advertising data (sequence of `[len][type][data]` structures).
    pub data: &'a [u8],
}

/// LE connection parameters, in radio units.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
#[cfg_attr(feature = "defmt", derive(defmt::Format))]
pub struct ConnParams {
    /// Minimum connection interval (1.25 ms units).
    pub interval_min: u16,
    /// Maximum connection interval (1.25 ms units).
    pub interval_max: u16,
    /// Peripheral latency (connection events).
    pub latency: u16,
    /// Supervision timeout (10 ms units).
    pub supervision_timeout: u16,
}

/// LE radio physical layer.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
#[cfg_attr(feature = "defmt", derive(defmt::Format))]
pub enum Phy {
    Le1M,
    Le2M,
    LeCoded,
}

/// LE security level, following the usual numbering (1 = open).
#[derive(Clone, Copy, Debug, PartialEq, Eq, PartialOrd, Ord)]
#[cfg_attr(feature = "defmt", derive(defmt::Format))]
pub enum SecurityLevel {
    /// Level 1: no encryption.
    Open,
    /// Level 2: encryption without MITM protection.
    Encrypted,
    /// Level 3: encryption with MITM protection.
    Authenticated,
    /// Level 4: LE Secure Connections with MITM protection.
    SecureConnections,
}

/// What a discovery request is looking for.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
#[cfg_attr(feature = "defmt", derive(defmt::Format))]
pub enum DiscoveryKind {
    PrimaryService,
    Characteristic,
    Descriptor,
}

/// Attribute returned by a discovery response.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
#[cfg_attr(feature = "defmt", derive(defmt::Format))]
pub struct Attribute {
    /// Handle of the declaration (service, characteristic) or of the
    /// descriptor itself.
    pub handle: u16,
    pub kind: AttributeKind,
}

#[derive(Clone, Copy, Debug, PartialEq, Eq)]
#[cfg_attr(feature = "defmt", derive(defmt::Format))]
pub enum AttributeKind {
    PrimaryService { end_handle: u16 },
    Characteristic { value_handle: u16 },
    Descriptor,
}

impl AttributeKind {
    pub fn matches(&self, kind: DiscoveryKind) -> bool {
        matches!(
            (self, kind),
            (AttributeKind::PrimaryService { .. }, DiscoveryKind::PrimaryService)
                | (AttributeKind::Characteristic { .. }, DiscoveryKind::Characteristic)
                | (AttributeKind::Descriptor, DiscoveryKind::Descriptor)
        )
    }
}
