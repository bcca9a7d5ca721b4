//! SoftDevice runtime for the split session.
//!
//! One task owns the [`Central`] session and a [`SoftdeviceHost`]. It runs
//! whatever the session queued (scan, connect, discovery, subscription) and
//! feeds every outcome back into the matching `on_*` callback. PHY,
//! security, parameter and disconnect updates come in through
//! [`events::LINK_EVENTS`].

mod bonder;
mod client;
mod events;
mod host;

pub use events::on_ble_event;

use core::cell::RefCell;
use core::future::pending;

use defmt::{debug, error, info, warn};
use embassy_futures::select::select;
use embassy_sync::blocking_mutex::raw::CriticalSectionRawMutex;
use embassy_sync::channel::Sender;
use embassy_time::{Duration, Timer};
use heapless::Vec;
use nrf_softdevice::ble::gatt_client::{self, Client};
use nrf_softdevice::ble::{central, Connection, EncryptError};
use nrf_softdevice::{raw, Softdevice};

use split_central::ble::host::EventSink;
use split_central::ble::link::LinkState;
use split_central::ble::{Address, ConnHandle, ConnParams, Phy, ScanReport, SecurityLevel};
use split_central::central::Central;
use split_central::config::{
    HOST_COMMAND_QUEUE_LEN, POSITION_EVENT_QUEUE_LEN, SCAN_INTERVAL, SCAN_RETRY_DELAY_MS,
    SCAN_WINDOW,
};
use split_central::error::HostError;
use split_central::event::PositionChangeEvent;

use bonder::{bonder, SplitBonder};
use client::{SplitClient, SplitClientEvent};
use events::LINK_EVENTS;
use host::{adv_type_from_raw, address_from_raw, phy_to_raw, to_sd_address, Command, SoftdeviceHost};

/// HCI "connection failed to be established".
const CONNECT_FAILED_STATUS: u8 = 0x3E;
/// Used when the disconnect event was lost to a full queue.
const DISCONNECT_REASON_UNKNOWN: u8 = 0x00;
/// ATT "unlikely error", for a CCC write that failed without a status.
const ATT_UNLIKELY_ERROR: u32 = 0x0E;

pub type PositionSender =
    Sender<'static, CriticalSectionRawMutex, PositionChangeEvent, POSITION_EVENT_QUEUE_LEN>;

/// Event bus towards the keymap.
struct ChannelSink {
    tx: PositionSender,
}

impl EventSink for ChannelSink {
    fn publish(&mut self, event: PositionChangeEvent) {
        // try_send avoids blocking the radio; if the keymap is behind, we drop.
        if self.tx.try_send(event).is_err() {
            warn!("position channel full - dropping {}", event);
        }
    }
}

pub async fn central_task(sd: &'static Softdevice, tx: PositionSender) -> ! {
    let mut session = Central::new();
    let mut host = SoftdeviceHost::new();
    let mut sink = ChannelSink { tx };
    let bonder = bonder();

    if let Err(e) = session.start(&mut host) {
        if e.is_fatal() {
            error!("split central failed to start: {}", e);
            loop {
                pending::<()>().await;
            }
        }
        warn!("split central start: {}", e);
    }

    loop {
        match host.pop() {
            Some(Command::StartScan) => scan(sd, &mut session, &mut host).await,
            Some(Command::Connect(peer, params)) => {
                connect_and_run(sd, bonder, &mut session, &mut host, &mut sink, peer, params)
                    .await
            }
            Some(command) => warn!("no connection for {}", command),
            None => {
                Timer::after(Duration::from_millis(SCAN_RETRY_DELAY_MS)).await;
                if session.state() == LinkState::Idle {
                    info!("retrying scan");
                    if let Err(e) = session.start(&mut host) {
                        warn!("scan still refused: {}", e);
                    }
                }
            }
        }
    }
}

async fn scan(sd: &'static Softdevice, session: &mut Central, host: &mut SoftdeviceHost) {
    let config = central::ScanConfig {
        active: false,
        interval: u32::from(SCAN_INTERVAL),
        window: u32::from(SCAN_WINDOW),
        ..Default::default()
    };

    host.scan_started();
    let result = central::scan(sd, &config, |params| {
        let data =
            unsafe { core::slice::from_raw_parts(params.data.p_data, params.data.len as usize) };
        let report = ScanReport {
            address: address_from_raw(params.peer_addr),
            rssi: params.rssi,
            adv_type: adv_type_from_raw(&params.type_),
            data,
        };
        let _ = session.on_scan_report(host, &report);

        // Return None to keep scanning, Some(()) to stop.
        host.stop_requested().then_some(())
    })
    .await;
    host.scan_stopped();

    if let Err(e) = result {
        warn!("BLE scan ended with error: {}", e);
        Timer::after(Duration::from_millis(SCAN_RETRY_DELAY_MS)).await;
        let _ = session.start(host);
    }
}

async fn connect_and_run(
    sd: &'static Softdevice,
    bonder: &'static SplitBonder,
    session: &mut Central,
    host: &mut SoftdeviceHost,
    sink: &mut ChannelSink,
    peer: Address,
    params: ConnParams,
) {
    let sd_peer = to_sd_address(&peer);
    let whitelist = [&sd_peer];
    let conn_cfg = central::ConnectConfig {
        scan_config: central::ScanConfig {
            whitelist: Some(&whitelist),
            ..Default::default()
        },
        conn_params: raw::ble_gap_conn_params_t {
            min_conn_interval: params.interval_min,
            max_conn_interval: params.interval_max,
            slave_latency: params.latency,
            conn_sup_timeout: params.supervision_timeout,
        },
        ..Default::default()
    };

    bonder.expect_peer(peer);
    let conn = match central::connect_with_security(sd, &conn_cfg, bonder).await {
        Ok(conn) => conn,
        Err(e) => {
            warn!("connect to {} failed: {}", peer, e);
            let _ = session.on_connected(host, peer, Err(CONNECT_FAILED_STATUS));
            return;
        }
    };
    let Some(handle) = conn.handle().map(ConnHandle) else {
        let _ = session.on_connected(host, peer, Err(CONNECT_FAILED_STATUS));
        return;
    };

    host.set_connection(Some((peer, handle)));
    let _ = session.on_connected(host, peer, Ok(handle));
    if let Some(phy) = host.take_phy_request(&peer) {
        request_phy(session, host, handle, phy);
    }
    replay_link_events(session, host);

    let client = run_gatt_requests(&conn, session, host).await;

    {
        let shared = RefCell::new(&mut *session);
        let notifications = gatt_client::run(&conn, &client, |event| match event {
            SplitClientEvent::Notification { value_handle, data } => {
                let _ = shared.borrow_mut().on_notification(
                    &mut *sink,
                    handle,
                    value_handle,
                    Some(data.as_slice()),
                );
            }
        });
        let updates = async {
            loop {
                let event = LINK_EVENTS.receive().await;
                let _ = shared.borrow_mut().on_link_event(&mut *host, event);
            }
        };
        select(notifications, updates).await;
    }

    info!("split link closed");
    host.set_connection(None);
    replay_link_events(session, host);
    if session.link().is_some_and(|link| link.conn == handle) {
        let _ = session.on_disconnected(host, handle, DISCONNECT_REASON_UNKNOWN);
    }
}

/// Feed queued link updates into the session.
fn replay_link_events(session: &mut Central, host: &mut SoftdeviceHost) {
    while let Ok(event) = LINK_EVENTS.try_receive() {
        let _ = session.on_link_event(host, event);
    }
}

/// Execute the security, discovery and subscription requests the session
/// queued for this connection.
async fn run_gatt_requests(
    conn: &Connection,
    session: &mut Central,
    host: &mut SoftdeviceHost,
) -> SplitClient {
    let mut client: Option<SplitClient> = None;
    let mut deferred: Vec<Command, HOST_COMMAND_QUEUE_LEN> = Vec::new();

    while let Some(command) = host.pop() {
        replay_link_events(session, host);
        match command {
            Command::SetSecurity(_, level) => request_security(conn, level),
            Command::Discover(handle, request) => {
                if client.is_none() {
                    client = Some(discover(conn).await);
                }
                let attr = client.as_ref().and_then(|c| c.lookup(&request));
                let _ = session.on_discovery(host, handle, request.generation, attr);
            }
            Command::Subscribe(handle, request) => {
                match gatt_client::write(conn, request.ccc_handle, &request.value_bytes()).await {
                    Ok(()) => info!("Subscribed to position state notifications"),
                    Err(e) => {
                        error!("CCC write failed: {}", e);
                        let generation =
                            session.link().map(|link| link.generation).unwrap_or_default();
                        let _ = session.on_subscribe_failed(
                            handle,
                            generation,
                            request.ccc_handle,
                            HostError::Rejected(ATT_UNLIKELY_ERROR),
                        );
                    }
                }
            }
            Command::StartScan | Command::Connect(..) => {
                debug!("deferring {} until the link closes", command);
                if deferred.push(command).is_err() {
                    warn!("dropping {}", command);
                }
            }
        }
    }

    for command in deferred.into_iter().rev() {
        host.requeue(command);
    }
    client.unwrap_or_else(|| SplitClient::new_undiscovered(conn.clone()))
}

async fn discover(conn: &Connection) -> SplitClient {
    info!("Discovering split service...");
    match gatt_client::discover::<SplitClient>(conn).await {
        Ok(client) => client,
        Err(e) => {
            warn!("split service discovery failed: {}", e);
            SplitClient::new_undiscovered(conn.clone())
        }
    }
}

fn request_security(conn: &Connection, level: SecurityLevel) {
    debug!("requesting security {}", level);
    match conn.encrypt() {
        Ok(()) => {}
        Err(EncryptError::PeerKeysNotFound) => {
            if conn.request_pairing().is_err() {
                warn!("Failed to request pairing");
            }
        }
        Err(e) => warn!("Failed to set security: {}", e),
    }
}

/// Ask for `phy`; the PHY in use is reported by the PHY update event.
fn request_phy(session: &mut Central, host: &mut SoftdeviceHost, handle: ConnHandle, phy: Phy) {
    let mode = phy_to_raw(phy);
    let phys = raw::ble_gap_phys_t {
        tx_phys: mode,
        rx_phys: mode,
    };
    let ret = unsafe { raw::sd_ble_gap_phy_update(handle.0, &phys) };
    if ret == raw::NRF_SUCCESS {
        debug!("PHY update to {} requested", phy);
    } else {
        let _ = session.on_phy_update_failed(host, handle, HostError::Rejected(ret));
    }
}
