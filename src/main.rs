//! Split keyboard central firmware for nRF52840 + S140 SoftDevice.
//!
//! Tasks:
//! - `softdevice_task`: runs the SoftDevice event loop.
//! - `central_task`: scans for the peripheral half and keeps the split
//!   link subscribed.
//! - `position_task`: consumes key position events.

#![no_std]
#![no_main]

mod softdevice;

use defmt::info;
use defmt_rtt as _;
use embassy_executor::Spawner;
use embassy_nrf::interrupt::Priority;
use embassy_sync::blocking_mutex::raw::CriticalSectionRawMutex;
use embassy_sync::channel::{Channel, Receiver};
use nrf_softdevice::{raw, Softdevice};
use panic_probe as _;

use split_central::config::{ATT_MTU, POSITION_EVENT_QUEUE_LEN};
use split_central::event::PositionChangeEvent;

static POSITION_EVENTS: Channel<CriticalSectionRawMutex, PositionChangeEvent, POSITION_EVENT_QUEUE_LEN> =
    Channel::new();

#[embassy_executor::task]
async fn softdevice_task(sd: &'static Softdevice) -> ! {
    sd.run_with_callback(softdevice::on_ble_event).await
}

#[embassy_executor::task]
async fn central_task(sd: &'static Softdevice) -> ! {
    softdevice::central_task(sd, POSITION_EVENTS.sender()).await
}

/// Stand-in for the keymap: position events end up here.
#[embassy_executor::task]
async fn position_task(
    rx: Receiver<'static, CriticalSectionRawMutex, PositionChangeEvent, POSITION_EVENT_QUEUE_LEN>,
) -> ! {
    loop {
        let event = rx.receive().await;
        if event.pressed {
            info!("position {} pressed", event.position);
        } else {
            info!("position {} released", event.position);
        }
    }
}

fn softdevice_config() -> nrf_softdevice::Config {
    nrf_softdevice::Config {
        clock: Some(raw::nrf_clock_lf_cfg_t {
            source: raw::NRF_CLOCK_LF_SRC_RC as u8,
            rc_ctiv: 16,
            rc_temp_ctiv: 2,
            accuracy: raw::NRF_CLOCK_LF_ACCURACY_500_PPM as u8,
        }),
        conn_gap: Some(raw::ble_gap_conn_cfg_t {
            conn_count: 1,
            event_length: 24,
        }),
        conn_gatt: Some(raw::ble_gatt_conn_cfg_t { att_mtu: ATT_MTU }),
        gap_role_count: Some(raw::ble_gap_cfg_role_count_t {
            adv_set_count: 0,
            periph_role_count: 0,
            central_role_count: 1,
            central_sec_count: 1,
            _bitfield_1: raw::ble_gap_cfg_role_count_t::new_bitfield_1(0),
        }),
        ..Default::default()
    }
}

#[embassy_executor::main]
async fn main(spawner: Spawner) {
    info!("split central starting");

    // The SoftDevice reserves interrupt priorities 0, 1 and 4.
    let mut config = embassy_nrf::config::Config::default();
    config.gpiote_interrupt_priority = Priority::P2;
    config.time_interrupt_priority = Priority::P2;
    let _p = embassy_nrf::init(config);

    let sd = Softdevice::enable(&softdevice_config());

    spawner.must_spawn(softdevice_task(sd));
    spawner.must_spawn(central_task(sd));
    spawner.must_spawn(position_task(POSITION_EVENTS.receiver()));
}
