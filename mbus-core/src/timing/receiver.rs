//! Pulse-width receiver
//!
//! A frame is a train of low pulses. The receiver times each pulse from its
//! falling to its rising edge, groups four bits into one MSB-first nibble
//! and reports the hex character. A receive timeout (no new pulse within
//! `bit_timeout` of the last pulse start) ends the frame.

use mbus_hal::{Edge, Ticks};
use mbus_protocol::hex::{nibble_to_hex, INVALID_DIGIT};

use super::{classify, BitSample};
use crate::config::TimingConfig;

/// Receiver phase
///
/// Named after the level of the adapter's input pin, which sits behind an
/// inverting transistor: `High` while the bus is held low.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
#[cfg_attr(feature = "defmt", derive(defmt::Format))]
pub enum ReceivePhase {
    /// Idle, waiting for the first pulse of a frame
    Wait,
    /// A pulse is being timed
    High,
    /// Between pulses of a frame
    Low,
}

/// Result of feeding an edge to the receiver
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
#[cfg_attr(feature = "defmt", derive(defmt::Format))]
pub enum EdgeEvent {
    /// Edge did not fit the current phase
    Ignored,
    /// A pulse began; `frame_start` is set for the first pulse of a frame
    PulseStarted { frame_start: bool },
    /// A pulse ended; `digit` carries the hex character once a nibble is complete
    PulseEnded { sample: BitSample, digit: Option<u8> },
}

/// Result of a receive timeout
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
#[cfg_attr(feature = "defmt", derive(defmt::Format))]
pub enum TimeoutEvent {
    /// Receiver was already idle
    Idle,
    /// Frame ended on a nibble boundary
    FrameEnded,
    /// Frame ended with a partial nibble
    FramingIncomplete,
}

/// Receive state machine
#[derive(Debug, Clone)]
pub struct Receiver {
    phase: ReceivePhase,
    pulse_start: Ticks,
    slots: [BitSample; 4],
    bits: u16,
}

impl Default for Receiver {
    fn default() -> Self {
        Self::new()
    }
}

impl Receiver {
    pub const fn new() -> Self {
        Self {
            phase: ReceivePhase::Wait,
            pulse_start: 0,
            slots: [BitSample::Zero; 4],
            bits: 0,
        }
    }

    pub fn phase(&self) -> ReceivePhase {
        self.phase
    }

    /// Bits received in the current frame
    pub fn bits(&self) -> u16 {
        self.bits
    }

    /// Edge the receiver expects next
    pub fn expected_edge(&self) -> Edge {
        match self.phase {
            ReceivePhase::Wait | ReceivePhase::Low => Edge::Falling,
            ReceivePhase::High => Edge::Rising,
        }
    }

    /// Feed a captured edge
    pub fn on_edge(&mut self, edge: Edge, now: Ticks, timing: &TimingConfig) -> EdgeEvent {
        match (self.phase, edge) {
            (ReceivePhase::Wait, Edge::Falling) => {
                self.bits = 0;
                self.pulse_start = now;
                self.phase = ReceivePhase::High;
                EdgeEvent::PulseStarted { frame_start: true }
            }
            (ReceivePhase::Low, Edge::Falling) => {
                self.pulse_start = now;
                self.phase = ReceivePhase::High;
                EdgeEvent::PulseStarted { frame_start: false }
            }
            (ReceivePhase::High, Edge::Rising) => {
                self.phase = ReceivePhase::Low;

                let width = now.wrapping_sub(self.pulse_start);
                let sample = classify(width, timing);
                self.slots[(self.bits % 4) as usize] = sample;
                self.bits = self.bits.wrapping_add(1);

                let digit = (self.bits % 4 == 0).then(|| self.assemble_digit());
                EdgeEvent::PulseEnded { sample, digit }
            }
            _ => EdgeEvent::Ignored,
        }
    }

    /// Handle expiry of the receive timeout
    pub fn on_timeout(&mut self) -> TimeoutEvent {
        if self.phase == ReceivePhase::Wait {
            return TimeoutEvent::Idle;
        }

        self.phase = ReceivePhase::Wait;
        let complete = self.bits % 4 == 0;
        self.bits = 0;

        if complete {
            TimeoutEvent::FrameEnded
        } else {
            TimeoutEvent::FramingIncomplete
        }
    }

    /// Hex character for the four buffered bits, `X` if any was a glitch
    fn assemble_digit(&self) -> u8 {
        let mut nibble = 0u8;
        for sample in self.slots {
            match sample.value() {
                Some(bit) => nibble = (nibble << 1) | bit,
                None => return INVALID_DIGIT,
            }
        }
        nibble_to_hex(nibble)
    }
}
