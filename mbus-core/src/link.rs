//! Interrupt-side bus link
//!
//! [`BusLink`] owns everything the interrupt handlers touch: the driver,
//! receiver, transmitter and frame buffers. It has three interrupt entry
//! points (edge, receive timeout, transmit tick) and a handful of
//! foreground calls. The foreground reaches it only through
//! [`LinkAccess`], which on the target holds a critical section for the
//! duration of the closure.

use core::cell::RefCell;

use mbus_hal::{BusDriver, Edge};
use mbus_protocol::RawFrame;

use crate::assembler::{PacketAssembler, ReceiveFault};
use crate::config::TimingConfig;
use crate::timing::{
    BitSample, EdgeEvent, ReceivePhase, Receiver, TickEvent, TimeoutEvent, Transmitter,
};

/// What a receive timeout produced
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
#[cfg_attr(feature = "defmt", derive(defmt::Format))]
pub enum ReceiveOutcome {
    /// Nothing was being received
    Idle,
    /// A frame is waiting for [`BusLink::take_frame`]
    FrameReady,
    /// The frame was thrown away
    Dropped(ReceiveFault),
}

/// Counters for the bit layer
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
#[cfg_attr(feature = "defmt", derive(defmt::Format))]
pub struct LinkStats {
    pub frames_received: u32,
    pub frames_sent: u32,
    pub glitches: u32,
    pub framing_incomplete: u32,
    pub runts: u32,
    pub overruns: u32,
}

/// Bus link shared between interrupt handlers and the foreground
pub struct BusLink<D: BusDriver> {
    driver: D,
    timing: TimingConfig,
    receiver: Receiver,
    transmitter: Transmitter,
    assembler: PacketAssembler,
    stats: LinkStats,
}

impl<D: BusDriver> BusLink<D> {
    pub fn new(driver: D, timing: TimingConfig) -> Self {
        Self {
            driver,
            timing,
            receiver: Receiver::new(),
            transmitter: Transmitter::new(),
            assembler: PacketAssembler::new(),
            stats: LinkStats::default(),
        }
    }

    /// Arm edge capture for the first frame
    pub fn start(&mut self) {
        self.driver.start_receive_capture(self.receiver.expected_edge());
    }

    // --- Interrupt entry points ---

    /// Edge capture interrupt
    pub fn on_edge(&mut self, edge: Edge) {
        let now = self.driver.now_ticks();

        match self.receiver.on_edge(edge, now, &self.timing) {
            EdgeEvent::Ignored => {}
            EdgeEvent::PulseStarted { frame_start } => {
                if frame_start {
                    self.assembler.begin_frame();
                }
                self.driver.schedule_timeout(self.timing.bit_timeout);
            }
            EdgeEvent::PulseEnded { sample, digit } => {
                if let BitSample::Glitch(_) = sample {
                    self.stats.glitches = self.stats.glitches.wrapping_add(1);
                }
                if let Some(digit) = digit {
                    if self.assembler.push_digit(digit).is_err() {
                        self.stats.overruns = self.stats.overruns.wrapping_add(1);
                    }
                }
            }
        }

        self.driver.start_receive_capture(self.receiver.expected_edge());
    }

    /// Receive timeout interrupt
    pub fn on_receive_timeout(&mut self) -> ReceiveOutcome {
        let outcome = match self.receiver.on_timeout() {
            TimeoutEvent::Idle => ReceiveOutcome::Idle,
            TimeoutEvent::FramingIncomplete => {
                self.assembler.discard_frame();
                ReceiveOutcome::Dropped(ReceiveFault::FramingIncomplete)
            }
            TimeoutEvent::FrameEnded => match self.assembler.finish_frame() {
                Ok(()) => ReceiveOutcome::FrameReady,
                Err(fault) => ReceiveOutcome::Dropped(fault),
            },
        };

        match outcome {
            ReceiveOutcome::FrameReady => {
                self.stats.frames_received = self.stats.frames_received.wrapping_add(1);
            }
            ReceiveOutcome::Dropped(ReceiveFault::FramingIncomplete) => {
                self.stats.framing_incomplete = self.stats.framing_incomplete.wrapping_add(1);
            }
            ReceiveOutcome::Dropped(ReceiveFault::Runt) => {
                self.stats.runts = self.stats.runts.wrapping_add(1);
            }
            ReceiveOutcome::Dropped(ReceiveFault::Overrun) => {
                self.stats.overruns = self.stats.overruns.wrapping_add(1);
            }
            ReceiveOutcome::Dropped(ReceiveFault::BitGlitch(_)) | ReceiveOutcome::Idle => {}
        }

        self.driver.start_receive_capture(self.receiver.expected_edge());
        outcome
    }

    /// Transmit tick interrupt
    pub fn on_transmit_tick(&mut self) -> TickEvent {
        let event = self.transmitter.on_tick(&mut self.driver, &self.timing);
        if event == TickEvent::Finished {
            self.stats.frames_sent = self.stats.frames_sent.wrapping_add(1);
        }
        event
    }

    // --- Foreground calls ---

    /// Take a received frame for decoding
    pub fn take_frame(&mut self) -> Option<RawFrame> {
        self.assembler.take_frame()
    }

    /// Queue a frame for transmission
    pub fn queue_frame(&mut self, frame: RawFrame) {
        self.assembler.load_outgoing(frame);
    }

    /// Start sending the pending frame if the bus allows it
    ///
    /// Only starts when no transmission is running, the receiver is idle
    /// and a frame is pending. Returns whether a transmission started.
    pub fn try_start_transmit(&mut self) -> bool {
        if self.transmitter.is_active()
            || self.receiver.phase() != ReceivePhase::Wait
            || !self.assembler.send_pending()
        {
            return false;
        }

        let Some(frame) = self.assembler.take_outgoing() else {
            return false;
        };
        self.transmitter.start(frame);
        // Leading guard before the first pulse; its tick starts the bit train
        self.driver.release_line_for(self.timing.send_space);
        true
    }

    pub fn receive_phase(&self) -> ReceivePhase {
        self.receiver.phase()
    }

    pub fn is_transmitting(&self) -> bool {
        self.transmitter.is_active()
    }

    pub fn send_pending(&self) -> bool {
        self.assembler.send_pending()
    }

    pub fn frame_ready(&self) -> bool {
        self.assembler.frame_ready()
    }

    pub fn stats(&self) -> LinkStats {
        self.stats
    }

    pub fn timing(&self) -> &TimingConfig {
        &self.timing
    }

    /// Replace the timing tolerances
    pub fn set_timing(&mut self, timing: TimingConfig) {
        self.timing = timing;
    }

    pub fn driver(&self) -> &D {
        &self.driver
    }

    pub fn driver_mut(&mut self) -> &mut D {
        &mut self.driver
    }
}

/// Exclusive access to a link shared with interrupt handlers
pub trait LinkAccess {
    type Driver: BusDriver;

    /// Run `f` with the link locked
    fn with_link<R>(&self, f: impl FnOnce(&mut BusLink<Self::Driver>) -> R) -> R;
}

/// Single-context access, for hosts and tests
impl<D: BusDriver> LinkAccess for RefCell<BusLink<D>> {
    type Driver = D;

    fn with_link<R>(&self, f: impl FnOnce(&mut BusLink<D>) -> R) -> R {
        f(&mut self.borrow_mut())
    }
}
