//! Bus task
//!
//! Stands in for the interrupt handlers: waits for whichever comes first of
//! the armed input edge, the receive timeout and the next transmit tick,
//! and feeds it to the link. Each event is handled inside one short
//! critical section.

use core::future::pending;

use defmt::*;
use embassy_futures::select::{select4, Either4};
use embassy_time::{Instant, Timer};

use mbus_core::timing::TickEvent;
use mbus_core::{LinkAccess, ReceiveOutcome};
use mbus_hal_rp2040::BusInput;

use crate::channels::{SharedLink, BUS_WAKE, FRAME_READY};

async fn wait_until(deadline: Option<Instant>) {
    match deadline {
        Some(at) => Timer::at(at).await,
        None => pending().await,
    }
}

/// Bus task - bit-level receive and transmit
#[embassy_executor::task]
pub async fn bus_task(link: &'static SharedLink, mut input: BusInput<'static>) {
    info!("Bus task started");

    link.with_link(|l| l.start());

    loop {
        let (capture, rx_deadline, tx_deadline) = link.with_link(|l| {
            let bus = l.driver();
            (bus.capture(), bus.rx_deadline(), bus.tx_deadline())
        });

        let edge = async {
            match capture {
                Some(edge) => {
                    input.wait_for(edge).await;
                    edge
                }
                None => pending().await,
            }
        };

        match select4(
            edge,
            wait_until(rx_deadline),
            wait_until(tx_deadline),
            BUS_WAKE.wait(),
        )
        .await
        {
            Either4::First(edge) => {
                link.with_link(|l| l.on_edge(edge));
            }
            Either4::Second(()) => {
                let outcome = link.with_link(|l| {
                    l.driver_mut().clear_rx_deadline();
                    l.on_receive_timeout()
                });
                match outcome {
                    ReceiveOutcome::FrameReady => FRAME_READY.signal(()),
                    ReceiveOutcome::Dropped(fault) => debug!("Frame dropped: {:?}", fault),
                    ReceiveOutcome::Idle => {}
                }
            }
            Either4::Third(()) => {
                let event = link.with_link(|l| {
                    l.driver_mut().clear_tx_deadline();
                    l.on_transmit_tick()
                });
                if event == TickEvent::Finished {
                    trace!("Frame sent");
                }
            }
            Either4::Fourth(()) => {}
        }
    }
}
