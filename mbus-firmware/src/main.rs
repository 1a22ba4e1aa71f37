//! M-BUS CD-changer emulator firmware
//!
//! Main firmware binary for RP2040-based M-BUS adapters. Listens to the
//! head unit on the single-wire bus and answers like an Alpine CD changer.

#![no_std]
#![no_main]

use defmt::*;
use embassy_executor::Spawner;
use static_cell::StaticCell;
use {defmt_rtt as _, panic_probe as _};

use mbus_core::BusLink;
use mbus_hal_rp2040::{BusInput, InputPolarity, Rp2040Bus, Rp2040FlashStorage};

use crate::channels::SharedLink;

mod channels;
mod config;
mod tasks;

/// Bus input sits behind an inverting transistor on the reference adapter
const INPUT_POLARITY: InputPolarity = InputPolarity::Inverted;

static LINK: StaticCell<SharedLink> = StaticCell::new();

/// Main entry point
#[embassy_executor::main]
async fn main(spawner: Spawner) {
    info!("M-BUS adapter starting...");

    let p = embassy_rp::init(Default::default());
    info!("Peripherals initialized");

    // Load bus timings from flash (or the factory defaults)
    let mut flash = Rp2040FlashStorage::new(p.FLASH, p.DMA_CH0);
    let timing = config::load_timing(&mut flash).await;

    // Bus pins are board-specific (reference adapter: OUT=GPIO15, IN=GPIO14)
    let bus = Rp2040Bus::new(p.PIN_15);
    let input = BusInput::new(p.PIN_14, INPUT_POLARITY);
    let link: &'static SharedLink = LINK.init(SharedLink::new(BusLink::new(bus, timing)));

    info!("Bus link initialized");

    spawner.spawn(tasks::tick_task()).unwrap();
    spawner.spawn(tasks::bus_task(link, input)).unwrap();
    spawner.spawn(tasks::controller_task(link)).unwrap();

    info!("All tasks spawned, firmware running");

    loop {
        embassy_time::Timer::after_secs(60).await;
        trace!("Main loop heartbeat");
    }
}
