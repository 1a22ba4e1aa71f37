//! Main controller task
//!
//! The foreground loop: decodes received frames, runs the changer and
//! queues replies, sends the now-playing heartbeat, and logs what happened.

use defmt::*;
use embassy_futures::select::{select, Either};

use mbus_core::coordinator::FrameOutcome;
use mbus_core::{Activity, Coordinator, LinkAccess, ReplyStatus, StatusSummary};
use mbus_protocol::frame::without_terminator;

use crate::channels::{SharedLink, BUS_WAKE, FRAME_READY};
use crate::tasks::tick::TICK_SIGNAL;

/// How often link counters are logged
const STATS_INTERVAL_MS: u64 = 60_000;

/// Controller task - main coordination loop
#[embassy_executor::task]
pub async fn controller_task(link: &'static SharedLink) {
    info!("Controller task started");

    let mut coordinator = Coordinator::new();
    let mut shown: Option<StatusSummary> = None;
    let mut last_stats_ms = 0u64;

    loop {
        match select(FRAME_READY.wait(), TICK_SIGNAL.wait()).await {
            Either::First(()) => {
                let activity = coordinator.submit_received_frame(link);
                log_activity(&activity);
            }
            Either::Second(now_ms) => {
                if let ReplyStatus::EncodeFailed(command, e) = coordinator.poll_heartbeat(now_ms, link)
                {
                    warn!("Heartbeat {:?} not encodable: {:?}", command, e);
                }

                coordinator.service_transmit(link);

                if now_ms.saturating_sub(last_stats_ms) >= STATS_INTERVAL_MS {
                    last_stats_ms = now_ms;
                    let link_stats = link.with_link(|l| l.stats());
                    debug!("Link: {:?}", link_stats);
                    debug!("Protocol: {:?}", coordinator.stats());
                }
            }
        }

        if link.with_link(|l| l.is_transmitting()) {
            BUS_WAKE.signal(());
        }

        let summary = coordinator.summary();
        if shown != Some(summary) {
            shown = Some(summary);
            info!("{}", Display2Format(&summary));
        }
    }
}

/// Log a processed frame as text with its description and source tag
fn log_activity(activity: &Activity) {
    let Activity::Frame { raw, outcome } = activity else {
        return;
    };
    let text = core::str::from_utf8(without_terminator(raw)).unwrap_or("?");

    match outcome {
        FrameOutcome::Handled { packet, reply } => {
            info!(
                "{=str} {=str} {=str} -> {:?}",
                packet.source.tag(),
                text,
                packet.description(),
                reply
            );
            if let ReplyStatus::EncodeFailed(command, e) = reply {
                warn!("Reply {:?} not encodable: {:?}", command, e);
            }
        }
        FrameOutcome::Dropped(reason) => {
            debug!("{=str} dropped: {:?}", text, reason);
        }
    }
}
