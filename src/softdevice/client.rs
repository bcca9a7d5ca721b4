//! GATT client for the split service.
//!
//! The SoftDevice discovers a whole service in one pass. The results are
//! kept in an [`AttributeTable`] so the central task can answer the
//! session's per-phase discovery requests from it.

use defmt::{debug, warn};
use heapless::Vec;
use nrf_softdevice::ble::gatt_client::{self, Characteristic, Descriptor, DiscoverError, HvxType};
use nrf_softdevice::ble::{Connection, Uuid};

use split_central::ble::attribute_table::AttributeTable;
use split_central::ble::discovery::{DiscoveryRequest, LAST_HANDLE};
use split_central::ble::{Attribute, GattUuid};
use split_central::config::{
    ATTRIBUTE_TABLE_CAPACITY, CCC_DESCRIPTOR_UUID, NOTIFY_MAX_LEN, POSITION_STATE_CHAR_UUID,
    SPLIT_SERVICE_UUID,
};

pub enum SplitClientEvent {
    Notification {
        value_handle: u16,
        data: Vec<u8, NOTIFY_MAX_LEN>,
    },
}

pub struct SplitClient {
    table: AttributeTable<ATTRIBUTE_TABLE_CAPACITY>,
    first_decl: Option<u16>,
}

impl SplitClient {
    pub fn lookup(&self, request: &DiscoveryRequest) -> Option<Attribute> {
        self.table.lookup(request)
    }

    fn record(&mut self, result: Result<(), Attribute>) {
        if let Err(attr) = result {
            warn!("attribute table full, dropping handle {}", attr.handle);
        }
    }
}

/// Only the attributes the session asks for are kept.
fn known_uuid(uuid: Uuid) -> Option<GattUuid> {
    if uuid == Uuid::new_128(POSITION_STATE_CHAR_UUID.as_bytes()) {
        Some(GattUuid::Uuid128(POSITION_STATE_CHAR_UUID))
    } else if uuid == Uuid::new_16(CCC_DESCRIPTOR_UUID) {
        Some(GattUuid::Uuid16(CCC_DESCRIPTOR_UUID))
    } else {
        None
    }
}

impl gatt_client::Client for SplitClient {
    type Event = SplitClientEvent;

    fn uuid() -> Uuid {
        Uuid::new_128(SPLIT_SERVICE_UUID.as_bytes())
    }

    fn new_undiscovered(_conn: Connection) -> Self {
        Self {
            table: AttributeTable::new(),
            first_decl: None,
        }
    }

    fn discovered_characteristic(
        &mut self,
        characteristic: &Characteristic,
        descriptors: &[Descriptor],
    ) {
        let decl = characteristic.handle_decl;
        self.first_decl = Some(self.first_decl.map_or(decl, |first| first.min(decl)));

        let Some(uuid) = characteristic.uuid.and_then(known_uuid) else {
            return;
        };
        let result =
            self.table
                .insert_characteristic(uuid, decl, characteristic.handle_value);
        self.record(result);

        for descriptor in descriptors {
            if let Some(uuid) = descriptor.uuid.and_then(known_uuid) {
                let result = self.table.insert_descriptor(uuid, descriptor.handle);
                self.record(result);
            }
        }
    }

    fn discovery_complete(&mut self) -> Result<(), DiscoverError> {
        if self.table.is_empty() {
            warn!("split service has no position state characteristic");
        }
        // The service declaration directly precedes its first characteristic.
        if let Some(decl) = self.first_decl {
            let result = self.table.insert_service(
                GattUuid::Uuid128(SPLIT_SERVICE_UUID),
                decl.saturating_sub(1),
                LAST_HANDLE,
            );
            self.record(result);
        }
        debug!("split service: {} attributes kept", self.table.len());
        Ok(())
    }

    fn on_hvx(
        &self,
        _conn: &Connection,
        type_: HvxType,
        handle: u16,
        data: &[u8],
    ) -> Option<Self::Event> {
        if !matches!(type_, HvxType::Notification) {
            return None;
        }
        match Vec::from_slice(data) {
            Ok(data) => Some(SplitClientEvent::Notification {
                value_handle: handle,
                data,
            }),
            Err(()) => {
                warn!("notification of {} bytes does not fit", data.len());
                None
            }
        }
    }
}
