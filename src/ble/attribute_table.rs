//! Fixed-capacity attribute table.
//!
//! Some stacks discover a whole service in one go. Keeping the result here
//! lets such a stack still answer the sequencer one request at a time:
//! [`AttributeTable::lookup`] returns the first attribute matching a
//! [`DiscoveryRequest`], exactly like a per-attribute discovery primitive.

use heapless::Vec;

use crate::ble::discovery::DiscoveryRequest;
use crate::ble::{Attribute, AttributeKind, GattUuid};

#[derive(Clone, Copy, Debug, PartialEq, Eq)]
#[cfg_attr(feature = "defmt", derive(defmt::Format))]
struct Entry {
    uuid: GattUuid,
    attribute: Attribute,
}

#[derive(Debug, Default)]
pub struct AttributeTable<const N: usize> {
    entries: Vec<Entry, N>,
}

impl<const N: usize> AttributeTable<N> {
    pub const fn new() -> Self {
        Self {
            entries: Vec::new(),
        }
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    /// Record an attribute. Gives it back if the table is full.
    pub fn insert(&mut self, uuid: GattUuid, attribute: Attribute) -> Result<(), Attribute> {
        self.entries
            .push(Entry { uuid, attribute })
            .map_err(|entry| entry.attribute)
    }

    pub fn insert_service(&mut self, uuid: GattUuid, handle: u16, end_handle: u16) -> Result<(), Attribute> {
        self.insert(
            uuid,
            Attribute {
                handle,
                kind: AttributeKind::PrimaryService { end_handle },
            },
        )
    }

    pub fn insert_characteristic(
        &mut self,
        uuid: GattUuid,
        decl_handle: u16,
        value_handle: u16,
    ) -> Result<(), Attribute> {
        self.insert(
            uuid,
            Attribute {
                handle: decl_handle,
                kind: AttributeKind::Characteristic { value_handle },
            },
        )
    }

    pub fn insert_descriptor(&mut self, uuid: GattUuid, handle: u16) -> Result<(), Attribute> {
        self.insert(
            uuid,
            Attribute {
                handle,
                kind: AttributeKind::Descriptor,
            },
        )
    }

    /// First attribute (lowest handle) matching `request`.
    pub fn lookup(&self, request: &DiscoveryRequest) -> Option<Attribute> {
        self.entries
            .iter()
            .filter(|e| e.uuid == request.uuid)
            .filter(|e| e.attribute.kind.matches(request.kind))
            .filter(|e| (request.start_handle..=request.end_handle).contains(&e.attribute.handle))
            .map(|e| e.attribute)
            .min_by_key(|attr| attr.handle)
    }
}
