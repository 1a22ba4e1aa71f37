//! Foreground coordinator
//!
//! Glue between the interrupt-side link and the changer: takes received
//! frames, decodes them, runs the state machine and queues the encoded
//! reply. Also drives the periodic now-playing heartbeat and the elapsed
//! time clock.
//!
//! ```text
//!   link.take_frame ──► decode ──► machine.handle ──► encode ──► link.queue_frame
//!                                                                     │
//!   poll_heartbeat (500 ms, Playing) ─────────────────────────────────┤
//!                                                                     ▼
//!                                                       link.try_start_transmit
//! ```
//!
//! Decoding runs outside the critical section; only the buffer hand-offs
//! lock the link.

use mbus_protocol::hex::{checksum, hex_to_nibble, nibble_to_hex};
use mbus_protocol::{
    decode, encode, Command, DecodeError, EncodeError, Packet, RawFrame, Source, FRAME_END,
    MAX_FRAME_LEN,
};

use crate::changer::{CommandStateMachine, DeviceStatus, Response, StatusSummary};
use crate::link::LinkAccess;

/// Now-playing status repeat interval
pub const HEARTBEAT_INTERVAL_MS: u64 = 500;

/// Elapsed time resolution
pub const CLOCK_INTERVAL_MS: u64 = 1000;

/// Why a received frame produced nothing
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
#[cfg_attr(feature = "defmt", derive(defmt::Format))]
pub enum DropReason {
    Decode(DecodeError),
    /// Decoded, but neither head unit nor changer sent it
    UnknownSource,
}

/// What happened to the reply for a handled packet
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
#[cfg_attr(feature = "defmt", derive(defmt::Format))]
pub enum ReplyStatus {
    /// Nothing to send
    Silent,
    /// Reply encoded and queued
    Queued(Command),
    /// Left to the heartbeat
    Heartbeat,
    /// Reply could not be encoded
    EncodeFailed(Command, EncodeError),
}

/// Result of processing one frame
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
#[cfg_attr(feature = "defmt", derive(defmt::Format))]
pub enum FrameOutcome {
    Dropped(DropReason),
    Handled { packet: Packet, reply: ReplyStatus },
}

/// Foreground activity for one poll
#[derive(Debug, Clone, PartialEq, Eq)]
#[cfg_attr(feature = "defmt", derive(defmt::Format))]
pub enum Activity {
    /// No frame was waiting
    Idle,
    /// A frame was taken and processed
    Frame { raw: RawFrame, outcome: FrameOutcome },
}

/// Protocol-level counters
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
#[cfg_attr(feature = "defmt", derive(defmt::Format))]
pub struct ProtocolStats {
    pub decoded: u32,
    pub checksum_errors: u32,
    pub unmatched: u32,
    pub too_short: u32,
    pub unknown_source: u32,
    pub replies: u32,
    pub heartbeats: u32,
    pub encode_failures: u32,
}

/// Owns the changer state and everything the foreground loop needs
#[derive(Debug, Clone, Default)]
pub struct Coordinator {
    machine: CommandStateMachine,
    last_heartbeat_ms: u64,
    last_clock_ms: u64,
    stats: ProtocolStats,
}

impl Coordinator {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn status(&self) -> &DeviceStatus {
        self.machine.status()
    }

    pub fn summary(&self) -> StatusSummary {
        self.machine.status().summary()
    }

    pub fn machine(&self) -> &CommandStateMachine {
        &self.machine
    }

    pub fn stats(&self) -> ProtocolStats {
        self.stats
    }

    /// Decode a raw frame and run it through the state machine
    ///
    /// Returns the outcome and the encoded reply, if there is one to send.
    pub fn process_frame(&mut self, raw: &[u8]) -> (FrameOutcome, Option<RawFrame>) {
        let packet = match decode(raw) {
            Ok(packet) => packet,
            Err(e) => {
                let counter = match e {
                    DecodeError::FrameTooShort => &mut self.stats.too_short,
                    DecodeError::ChecksumMismatch => &mut self.stats.checksum_errors,
                    DecodeError::TemplateNotMatched => &mut self.stats.unmatched,
                };
                *counter = counter.wrapping_add(1);
                return (FrameOutcome::Dropped(DropReason::Decode(e)), None);
            }
        };
        self.stats.decoded = self.stats.decoded.wrapping_add(1);

        if packet.source == Source::Unknown {
            self.stats.unknown_source = self.stats.unknown_source.wrapping_add(1);
            return (FrameOutcome::Dropped(DropReason::UnknownSource), None);
        }

        let (reply, outgoing) = match self.machine.handle(&packet) {
            Response::None => (ReplyStatus::Silent, None),
            Response::Play(_) => (ReplyStatus::Heartbeat, None),
            Response::Reply(response) => match encode(&response) {
                Ok(frame) => {
                    self.stats.replies = self.stats.replies.wrapping_add(1);
                    (ReplyStatus::Queued(response.command), Some(frame))
                }
                Err(e) => {
                    self.stats.encode_failures = self.stats.encode_failures.wrapping_add(1);
                    (ReplyStatus::EncodeFailed(response.command, e), None)
                }
            },
        };

        (FrameOutcome::Handled { packet, reply }, outgoing)
    }

    /// Handle the received frame, if one is ready, and arm the reply
    pub fn submit_received_frame<L: LinkAccess>(&mut self, link: &L) -> Activity {
        let Some(raw) = link.with_link(|l| l.take_frame()) else {
            return Activity::Idle;
        };

        let (outcome, outgoing) = self.process_frame(&raw);
        if let Some(frame) = outgoing {
            link.with_link(|l| {
                l.queue_frame(frame);
                l.try_start_transmit();
            });
        }

        Activity::Frame { raw, outcome }
    }

    /// Start a pending transmission if the bus is free
    pub fn service_transmit<L: LinkAccess>(&mut self, link: &L) -> bool {
        link.with_link(|l| l.try_start_transmit())
    }

    /// Advance the clock and send the now-playing heartbeat when due
    ///
    /// `now_ms` is a monotonic millisecond timestamp.
    pub fn poll_heartbeat<L: LinkAccess>(&mut self, now_ms: u64, link: &L) -> ReplyStatus {
        while now_ms.saturating_sub(self.last_clock_ms) >= CLOCK_INTERVAL_MS {
            self.last_clock_ms += CLOCK_INTERVAL_MS;
            if self.machine.status().is_playing() {
                self.machine.status_mut().tick_second();
            }
        }

        if now_ms.saturating_sub(self.last_heartbeat_ms) < HEARTBEAT_INTERVAL_MS {
            return ReplyStatus::Silent;
        }

        let status = self.machine.status();
        if !status.is_playing() {
            self.last_heartbeat_ms = now_ms;
            return ReplyStatus::Silent;
        }

        // One outgoing buffer; a reply still waiting for the bus wins and
        // the heartbeat stays due for the next poll.
        if link.with_link(|l| l.send_pending() || l.is_transmitting()) {
            return ReplyStatus::Silent;
        }
        self.last_heartbeat_ms = now_ms;

        match encode(&status.packet()) {
            Ok(frame) => {
                self.stats.heartbeats = self.stats.heartbeats.wrapping_add(1);
                link.with_link(|l| {
                    l.queue_frame(frame);
                    l.try_start_transmit();
                });
                ReplyStatus::Queued(Command::Playing)
            }
            Err(e) => {
                self.stats.encode_failures = self.stats.encode_failures.wrapping_add(1);
                ReplyStatus::EncodeFailed(Command::Playing, e)
            }
        }
    }

    /// Queue an arbitrary hex frame, bypassing the codec
    ///
    /// Non-hex characters are skipped and a CR ends the input early. With
    /// `append_checksum` the checksum digit is computed and added.
    pub fn send_raw<L: LinkAccess>(
        &mut self,
        text: &[u8],
        append_checksum: bool,
        link: &L,
    ) -> Result<(), EncodeError> {
        let frame = raw_frame(text, append_checksum)?;
        link.with_link(|l| {
            l.queue_frame(frame);
            l.try_start_transmit();
        });
        Ok(())
    }
}

/// Build a terminated frame from loosely formatted hex text
fn raw_frame(text: &[u8], append_checksum: bool) -> Result<RawFrame, EncodeError> {
    let mut frame = RawFrame::new();
    for &c in text.iter().take_while(|&&c| c != FRAME_END) {
        if let Some(nibble) = hex_to_nibble(c) {
            // Keep room for checksum and terminator
            if frame.len() >= MAX_FRAME_LEN - 2 {
                return Err(EncodeError::FrameTooLong);
            }
            frame
                .push(nibble_to_hex(nibble))
                .map_err(|_| EncodeError::FrameTooLong)?;
        }
    }

    if frame.is_empty() {
        return Err(EncodeError::CommandNotEncodable);
    }

    if append_checksum {
        let sum = checksum(&frame).ok_or(EncodeError::CommandNotEncodable)?;
        frame
            .push(nibble_to_hex(sum))
            .map_err(|_| EncodeError::FrameTooLong)?;
    }
    frame
        .push(FRAME_END)
        .map_err(|_| EncodeError::FrameTooLong)?;
    Ok(frame)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::changer::flags;
    use crate::config::TimingConfig;
    use crate::link::BusLink;
    use crate::test_support::{LineOp, MockBus};
    use core::cell::RefCell;
    use mbus_protocol::{encode_command, Fields};
    use proptest::prelude::*;

    fn shared_link() -> RefCell<BusLink<MockBus>> {
        let mut link = BusLink::new(MockBus::new(), TimingConfig::default());
        link.start();
        RefCell::new(link)
    }

    fn radio_frame(command: Command, fields: Fields) -> RawFrame {
        let mut packet = Packet::with_fields(command, fields);
        packet.source = Source::Radio;
        encode(&packet).unwrap()
    }

    /// Run the transmitter to completion
    fn drain_transmit(link: &RefCell<BusLink<MockBus>>) {
        let mut ticks = 0;
        while link.with_link(|l| l.is_transmitting()) {
            link.with_link(|l| l.on_transmit_tick());
            ticks += 1;
            assert!(ticks < 1000);
        }
    }

    #[test]
    fn test_ping_gets_ping_ok() {
        let mut coordinator = Coordinator::new();
        let (outcome, outgoing) = coordinator.process_frame(b"18A\r");

        match outcome {
            FrameOutcome::Handled { packet, reply } => {
                assert_eq!(packet.command, Command::Ping);
                assert_eq!(packet.source, Source::Radio);
                assert_eq!(reply, ReplyStatus::Queued(Command::PingOk));
            }
            other => panic!("unexpected {:?}", other),
        }
        assert_eq!(outgoing.unwrap(), encode_command(Command::PingOk).unwrap());
    }

    #[test]
    fn test_corrupt_frame_dropped() {
        let mut coordinator = Coordinator::new();
        let (outcome, outgoing) = coordinator.process_frame(b"18B\r");
        assert_eq!(
            outcome,
            FrameOutcome::Dropped(DropReason::Decode(DecodeError::ChecksumMismatch))
        );
        assert!(outgoing.is_none());
        assert_eq!(coordinator.stats().checksum_errors, 1);
    }

    #[test]
    fn test_glitched_frame_dropped() {
        let mut coordinator = Coordinator::new();
        let (outcome, _) = coordinator.process_frame(b"1XA\r");
        assert_eq!(
            outcome,
            FrameOutcome::Dropped(DropReason::Decode(DecodeError::ChecksumMismatch))
        );
    }

    #[test]
    fn test_unmatched_frame_dropped() {
        let mut coordinator = Coordinator::new();
        // Valid checksum, but no template starts with 0
        let (outcome, outgoing) = coordinator.process_frame(b"089\r");
        assert_eq!(
            outcome,
            FrameOutcome::Dropped(DropReason::Decode(DecodeError::TemplateNotMatched))
        );
        assert!(outgoing.is_none());
    }

    /// Clock a frame into the link as the head unit would
    fn receive(link: &RefCell<BusLink<MockBus>>, digits: &[u8]) {
        link.with_link(|l| {
            for &c in digits {
                let nibble = hex_to_nibble(c).unwrap();
                for i in (0..4).rev() {
                    let width = if nibble & (1 << i) != 0 { 112 } else { 38 };
                    l.on_edge(mbus_hal::Edge::Falling);
                    l.driver_mut().now += width;
                    l.on_edge(mbus_hal::Edge::Rising);
                    l.driver_mut().now += 187 - width;
                }
            }
            l.on_receive_timeout();
        });
    }

    #[test]
    fn test_submit_queues_and_starts_reply() {
        let link = shared_link();
        let mut coordinator = Coordinator::new();
        assert_eq!(coordinator.submit_received_frame(&link), Activity::Idle);

        receive(&link, b"18A");
        match coordinator.submit_received_frame(&link) {
            Activity::Frame { raw, outcome } => {
                assert_eq!(raw.as_slice(), b"18A\r");
                assert!(matches!(
                    outcome,
                    FrameOutcome::Handled {
                        reply: ReplyStatus::Queued(Command::PingOk),
                        ..
                    }
                ));
            }
            Activity::Idle => panic!("frame not taken"),
        }

        assert!(link.with_link(|l| l.is_transmitting()));
        assert!(!coordinator.service_transmit(&link));
        assert_eq!(coordinator.submit_received_frame(&link), Activity::Idle);
    }

    #[test]
    fn test_reply_waits_for_bus() {
        let link = shared_link();
        let mut coordinator = Coordinator::new();
        receive(&link, b"18A");

        // Head unit starts another frame before the reply goes out
        link.with_link(|l| l.on_edge(mbus_hal::Edge::Falling));
        coordinator.submit_received_frame(&link);
        assert!(!link.with_link(|l| l.is_transmitting()));
        assert!(!coordinator.service_transmit(&link));

        link.with_link(|l| l.on_receive_timeout());
        assert!(coordinator.service_transmit(&link));
    }

    #[test]
    fn test_play_starts_heartbeat() {
        let link = shared_link();
        let mut coordinator = Coordinator::new();

        assert_eq!(coordinator.poll_heartbeat(600, &link), ReplyStatus::Silent);

        coordinator.process_frame(&radio_frame(Command::Play, Fields::default()));
        assert!(coordinator.status().is_playing());

        assert_eq!(
            coordinator.poll_heartbeat(1200, &link),
            ReplyStatus::Queued(Command::Playing)
        );
        assert!(link.with_link(|l| l.is_transmitting()));

        // Not due again until 500 ms later
        assert_eq!(coordinator.poll_heartbeat(1400, &link), ReplyStatus::Silent);
        drain_transmit(&link);
        assert_eq!(
            coordinator.poll_heartbeat(1700, &link),
            ReplyStatus::Queued(Command::Playing)
        );
        assert_eq!(coordinator.stats().heartbeats, 2);
    }

    #[test]
    fn test_heartbeat_does_not_replace_pending_reply() {
        let link = shared_link();
        let mut coordinator = Coordinator::new();
        coordinator.process_frame(&radio_frame(Command::Play, Fields::default()));

        // Ping arrives, then the head unit starts another frame so the
        // PingOk reply has to wait
        receive(&link, b"18A");
        link.with_link(|l| l.on_edge(mbus_hal::Edge::Falling));
        coordinator.submit_received_frame(&link);
        assert!(link.with_link(|l| l.send_pending()));

        assert_eq!(coordinator.poll_heartbeat(600, &link), ReplyStatus::Silent);

        link.with_link(|l| {
            l.on_receive_timeout();
            l.driver_mut().ops.clear();
        });
        assert!(coordinator.service_transmit(&link));
        drain_transmit(&link);

        // "982" is twelve bits
        let asserted = link.with_link(|l| {
            l.driver()
                .ops
                .iter()
                .filter(|op| matches!(op, LineOp::Assert(_)))
                .count()
        });
        assert_eq!(asserted, 12);

        // The deferred heartbeat goes out once the bus is free
        assert_eq!(
            coordinator.poll_heartbeat(700, &link),
            ReplyStatus::Queued(Command::Playing)
        );
    }

    #[test]
    fn test_heartbeat_deferred_while_transmitting() {
        let link = shared_link();
        let mut coordinator = Coordinator::new();
        coordinator.process_frame(&radio_frame(Command::Play, Fields::default()));

        coordinator.send_raw(b"982", false, &link).unwrap();
        assert!(link.with_link(|l| l.is_transmitting()));
        assert_eq!(coordinator.poll_heartbeat(600, &link), ReplyStatus::Silent);
        assert_eq!(coordinator.stats().heartbeats, 0);

        drain_transmit(&link);
        assert_eq!(
            coordinator.poll_heartbeat(610, &link),
            ReplyStatus::Queued(Command::Playing)
        );
    }

    #[test]
    fn test_clock_advances_while_playing() {
        let link = shared_link();
        let mut coordinator = Coordinator::new();

        coordinator.poll_heartbeat(3000, &link);
        assert_eq!(coordinator.status().fields.seconds, 0);

        coordinator.process_frame(&radio_frame(Command::Play, Fields::default()));
        coordinator.poll_heartbeat(13_000, &link);
        assert_eq!(coordinator.status().fields.seconds, 0x10);
        assert_eq!(format!("{}", coordinator.summary()), "D:1 T:01 00:10");
    }

    #[test]
    fn test_playing_echo_left_to_heartbeat() {
        let mut coordinator = Coordinator::new();
        let (_, outgoing) = coordinator.process_frame(&radio_frame(Command::Play, Fields::default()));
        let echo = outgoing.unwrap();

        let (outcome, outgoing) = coordinator.process_frame(&echo);
        match outcome {
            FrameOutcome::Handled { packet, reply } => {
                assert_eq!(packet.source, Source::Changer);
                assert_eq!(reply, ReplyStatus::Heartbeat);
            }
            other => panic!("unexpected {:?}", other),
        }
        assert!(outgoing.is_none());
    }

    #[test]
    fn test_select_exchange_over_the_wire() {
        let mut coordinator = Coordinator::new();
        let request = Fields {
            disk: 3,
            track: 0x01,
            flags: 0x01,
            ..Fields::default()
        };

        let (_, changing) = coordinator.process_frame(&radio_frame(Command::Select, request));
        let changing = changing.unwrap();
        let decoded = decode(&changing).unwrap();
        assert_eq!(decoded.command, Command::Changing);
        assert_eq!(decoded.fields.disk, 3);
        assert_eq!(decoded.fields.track, 1);
        assert_eq!(decoded.fields.flags, flags::CHANGE_BUSY);

        let (_, ack) = coordinator.process_frame(&changing);
        let ack = ack.unwrap();
        assert_eq!(decode(&ack).unwrap().command, Command::Ack);

        let (_, after) = coordinator.process_frame(&ack);
        assert!(after.is_none());
        assert!(coordinator.status().is_playing());
    }

    #[test]
    fn test_send_raw() {
        let link = shared_link();
        let mut coordinator = Coordinator::new();

        coordinator.send_raw(b"1 8\r99", true, &link).unwrap();
        assert!(link.with_link(|l| l.is_transmitting()));
        assert_eq!(raw_frame(b"1 8\r99", true).unwrap().as_slice(), b"18A\r");
        assert_eq!(raw_frame(b"9f0000", false).unwrap().as_slice(), b"9F0000\r");
    }

    #[test]
    fn test_send_raw_rejects_bad_input() {
        assert_eq!(raw_frame(b"\r", true), Err(EncodeError::CommandNotEncodable));
        assert_eq!(raw_frame(&[b'1'; 40], true), Err(EncodeError::FrameTooLong));
    }

    proptest! {
        #[test]
        fn prop_arbitrary_frames_never_panic(bytes in prop::collection::vec(any::<u8>(), 0..40)) {
            let mut coordinator = Coordinator::new();
            let (outcome, outgoing) = coordinator.process_frame(&bytes);
            if outgoing.is_some() {
                let handled = matches!(outcome, FrameOutcome::Handled { .. });
                prop_assert!(handled);
            }
        }

        #[test]
        fn prop_replies_are_decodable_changer_frames(
            index in 0usize..mbus_protocol::CODE_TABLE.len(),
            disk in 0u32..16,
            track in 0u32..0x100,
        ) {
            let entry = &mbus_protocol::CODE_TABLE[index];
            let fields = Fields { disk, track, ..Fields::default() };
            let mut packet = Packet::with_fields(entry.command, fields);
            packet.source = Source::Radio;
            let Ok(frame) = encode(&packet) else {
                return Ok(());
            };

            let mut coordinator = Coordinator::new();
            let (_, outgoing) = coordinator.process_frame(&frame);
            if let Some(reply) = outgoing {
                let decoded = decode(&reply);
                prop_assert!(decoded.is_ok());
                prop_assert_eq!(decoded.unwrap().source, Source::Changer);
            }
        }
    }
}
