//! Link updates picked off the SoftDevice event stream.
//!
//! The SoftDevice wrapper consumes PHY, parameter and disconnect events
//! itself. The SoftDevice task copies them here as [`LinkEvent`]s and the
//! central task replays them into the session.

use defmt::warn;
use embassy_sync::blocking_mutex::raw::CriticalSectionRawMutex;
use embassy_sync::channel::Channel;
use nrf_softdevice::raw;

use split_central::ble::ConnHandle;
use split_central::config::LINK_EVENT_QUEUE_LEN;
use split_central::event::LinkEvent;

use super::host::phy_from_raw;

pub static LINK_EVENTS: Channel<CriticalSectionRawMutex, LinkEvent, LINK_EVENT_QUEUE_LEN> =
    Channel::new();

pub fn post(event: LinkEvent) {
    if LINK_EVENTS.try_send(event).is_err() {
        warn!("link event queue full - dropping {}", event);
    }
}

/// Hook for `Softdevice::run_with_callback`, called for every BLE event.
pub fn on_ble_event(evt: *const raw::ble_evt_t) {
    // SAFETY: the SoftDevice hands out a valid event for the duration of
    // the call; union fields are only read for the matching event id.
    let evt = unsafe { &*evt };
    let gap = unsafe { &evt.evt.gap_evt };
    let conn = ConnHandle(gap.conn_handle);

    let event = match u32::from(evt.header.evt_id) {
        raw::BLE_GAP_EVTS_BLE_GAP_EVT_CONNECTED => {
            params_in_effect(conn, unsafe { &gap.params.connected.conn_params })
        }
        raw::BLE_GAP_EVTS_BLE_GAP_EVT_CONN_PARAM_UPDATE => {
            params_in_effect(conn, unsafe { &gap.params.conn_param_update.conn_params })
        }
        raw::BLE_GAP_EVTS_BLE_GAP_EVT_PHY_UPDATE => {
            let update = unsafe { &gap.params.phy_update };
            if u32::from(update.status) != raw::BLE_HCI_STATUS_CODE_SUCCESS {
                warn!("PHY update finished with status {}", update.status);
            }
            LinkEvent::PhyUpdated {
                conn,
                phy: phy_from_raw(update.tx_phy),
            }
        }
        raw::BLE_GAP_EVTS_BLE_GAP_EVT_DISCONNECTED => LinkEvent::Disconnected {
            conn,
            reason: unsafe { gap.params.disconnected.reason },
        },
        _ => return,
    };
    post(event);
}

fn params_in_effect(conn: ConnHandle, params: &raw::ble_gap_conn_params_t) -> LinkEvent {
    // Once connected, min and max both hold the interval in use.
    LinkEvent::ParamsUpdated {
        conn,
        interval: params.max_conn_interval,
        latency: params.slave_latency,
        supervision_timeout: params.conn_sup_timeout,
    }
}
