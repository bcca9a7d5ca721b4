//! Attribute discovery sequencer.
//!
//! The stack's discovery primitive reports one matching attribute per
//! request, so finding the position-state characteristic takes three
//! chained requests:
//!
//! 1. the split **service** anywhere in the handle space,
//! 2. the position-state **characteristic** after the service declaration,
//! 3. its **CCC descriptor** after the characteristic value.
//!
//! Each phase is a fresh, immutable [`DiscoveryRequest`]; the
//! [`DiscoveryCursor`] only remembers where it is and what it has found.

use crate::ble::subscription::SubscribeRequest;
use crate::ble::{Attribute, AttributeKind, DiscoveryKind, Generation, GattUuid};
use crate::config::{CCC_DESCRIPTOR_UUID, POSITION_STATE_CHAR_UUID, SPLIT_SERVICE_UUID};

/// First valid attribute handle.
pub const FIRST_HANDLE: u16 = 0x0001;
/// Last valid attribute handle.
pub const LAST_HANDLE: u16 = 0xFFFF;

#[derive(Clone, Copy, Debug, PartialEq, Eq)]
#[cfg_attr(feature = "defmt", derive(defmt::Format))]
pub enum DiscoveryPhase {
    ServiceLookup,
    CharacteristicLookup,
    DescriptorLookup,
}

impl DiscoveryPhase {
    pub fn target(self) -> GattUuid {
        match self {
            DiscoveryPhase::ServiceLookup => GattUuid::Uuid128(SPLIT_SERVICE_UUID),
            DiscoveryPhase::CharacteristicLookup => GattUuid::Uuid128(POSITION_STATE_CHAR_UUID),
            DiscoveryPhase::DescriptorLookup => GattUuid::Uuid16(CCC_DESCRIPTOR_UUID),
        }
    }

    pub fn kind(self) -> DiscoveryKind {
        match self {
            DiscoveryPhase::ServiceLookup => DiscoveryKind::PrimaryService,
            DiscoveryPhase::CharacteristicLookup => DiscoveryKind::Characteristic,
            DiscoveryPhase::DescriptorLookup => DiscoveryKind::Descriptor,
        }
    }
}

/// One discovery request: find the first `kind` attribute of type `uuid`
/// in `start_handle..=end_handle`.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
#[cfg_attr(feature = "defmt", derive(defmt::Format))]
pub struct DiscoveryRequest {
    pub uuid: GattUuid,
    pub start_handle: u16,
    pub end_handle: u16,
    pub kind: DiscoveryKind,
    /// Link generation the request belongs to; echoed in the response.
    pub generation: Generation,
}

/// What the sequencer wants next after an attribute came back.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
#[cfg_attr(feature = "defmt", derive(defmt::Format))]
pub enum DiscoveryStep {
    /// Re-arm discovery with this request.
    Next(DiscoveryRequest),
    /// All handles known; enable notifications.
    Complete(SubscribeRequest),
    /// Attribute did not fit the current phase; keep waiting.
    Ignored,
}

/// Progress of one discovery sequence on one link.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
#[cfg_attr(feature = "defmt", derive(defmt::Format))]
pub struct DiscoveryCursor {
    phase: DiscoveryPhase,
    start_handle: u16,
    generation: Generation,
    value_handle: Option<u16>,
}

impl DiscoveryCursor {
    /// Begin at the service lookup over the whole handle space.
    pub fn new(generation: Generation) -> Self {
        Self {
            phase: DiscoveryPhase::ServiceLookup,
            start_handle: FIRST_HANDLE,
            generation,
            value_handle: None,
        }
    }

    pub fn phase(&self) -> DiscoveryPhase {
        self.phase
    }

    /// Value handle of the position-state characteristic, once found.
    pub fn value_handle(&self) -> Option<u16> {
        self.value_handle
    }

    /// Request for the current phase.
    pub fn request(&self) -> DiscoveryRequest {
        DiscoveryRequest {
            uuid: self.phase.target(),
            start_handle: self.start_handle,
            end_handle: LAST_HANDLE,
            kind: self.phase.kind(),
            generation: self.generation,
        }
    }

    /// Feed the attribute returned for the current request.
    pub fn advance(&mut self, attr: &Attribute) -> DiscoveryStep {
        debug!("[ATTRIBUTE] handle {}", attr.handle);

        if !attr.kind.matches(self.phase.kind()) || attr.handle < self.start_handle {
            warn!(
                "Unexpected attribute {:?} during {:?}",
                attr.kind,
                self.phase
            );
            return DiscoveryStep::Ignored;
        }

        match (self.phase, attr.kind) {
            (DiscoveryPhase::ServiceLookup, AttributeKind::PrimaryService { .. }) => {
                self.phase = DiscoveryPhase::CharacteristicLookup;
                self.start_handle = attr.handle.saturating_add(1);
                DiscoveryStep::Next(self.request())
            }
            (DiscoveryPhase::CharacteristicLookup, AttributeKind::Characteristic { value_handle }) => {
                self.phase = DiscoveryPhase::DescriptorLookup;
                self.start_handle = attr.handle.saturating_add(2);
                self.value_handle = Some(value_handle);
                DiscoveryStep::Next(self.request())
            }
            (DiscoveryPhase::DescriptorLookup, AttributeKind::Descriptor) => {
                match self.value_handle {
                    Some(value_handle) => {
                        DiscoveryStep::Complete(SubscribeRequest::notify(value_handle, attr.handle))
                    }
                    None => DiscoveryStep::Ignored,
                }
            }
            _ => DiscoveryStep::Ignored,
        }
    }
}
