//! Pulse-width transmitter
//!
//! Tick driven: each transmit tick performs one line change and asks the
//! driver for the next tick after the appropriate delay. A bit is a low
//! pulse of `send_zero` or `send_one` followed by the rest of the
//! `send_bit` cell released. After the terminator the line stays released
//! for `send_space`, then the tick source is halted.

use mbus_hal::BusDriver;
use mbus_protocol::hex::hex_to_nibble;
use mbus_protocol::{RawFrame, FRAME_END};

use crate::config::TimingConfig;

/// Transmitter phase
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
#[cfg_attr(feature = "defmt", derive(defmt::Format))]
pub enum TransmitPhase {
    /// Start of a bit cell (or of the inter-frame space)
    Start,
    /// Line held low for a 0
    Low0,
    /// Line held low for a 1
    Low1,
    /// Inter-frame space elapsing
    End,
}

/// Result of one transmit tick
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
#[cfg_attr(feature = "defmt", derive(defmt::Format))]
pub enum TickEvent {
    /// Not transmitting; tick ignored
    Idle,
    /// More ticks needed
    Continue,
    /// Frame and trailing space are complete
    Finished,
}

/// Transmit state machine
#[derive(Debug, Clone)]
pub struct Transmitter {
    phase: TransmitPhase,
    active: bool,
    frame: RawFrame,
    cursor: usize,
    nibble: u8,
    bits: u16,
}

impl Default for Transmitter {
    fn default() -> Self {
        Self::new()
    }
}

impl Transmitter {
    pub const fn new() -> Self {
        Self {
            phase: TransmitPhase::Start,
            active: false,
            frame: RawFrame::new(),
            cursor: 0,
            nibble: 0,
            bits: 0,
        }
    }

    pub fn phase(&self) -> TransmitPhase {
        self.phase
    }

    /// Whether a frame is being sent
    pub fn is_active(&self) -> bool {
        self.active
    }

    /// Bits sent so far in the current frame
    pub fn bits(&self) -> u16 {
        self.bits
    }

    /// Take ownership of a frame and begin at the first digit
    ///
    /// The caller must arrange for the first tick.
    pub fn start(&mut self, frame: RawFrame) {
        self.frame = frame;
        self.cursor = 0;
        self.bits = 0;
        self.nibble = 0;
        self.phase = TransmitPhase::Start;
        self.active = true;
    }

    /// Advance by one tick
    pub fn on_tick<D: BusDriver>(&mut self, driver: &mut D, timing: &TimingConfig) -> TickEvent {
        if !self.active {
            return TickEvent::Idle;
        }

        match self.phase {
            TransmitPhase::Start => {
                if self.bits % 4 == 0 {
                    match self.next_nibble() {
                        Some(nibble) => self.nibble = nibble,
                        None => {
                            driver.release_line_for(timing.send_space);
                            self.phase = TransmitPhase::End;
                            return TickEvent::Continue;
                        }
                    }
                }

                let bit = (self.nibble >> (3 - self.bits % 4)) & 1;
                if bit == 1 {
                    driver.assert_line_for(timing.send_one);
                    self.phase = TransmitPhase::Low1;
                } else {
                    driver.assert_line_for(timing.send_zero);
                    self.phase = TransmitPhase::Low0;
                }
                self.bits = self.bits.wrapping_add(1);
                TickEvent::Continue
            }
            TransmitPhase::Low0 => {
                driver.release_line_for(timing.send_bit.saturating_sub(timing.send_zero));
                self.phase = TransmitPhase::Start;
                TickEvent::Continue
            }
            TransmitPhase::Low1 => {
                driver.release_line_for(timing.send_bit.saturating_sub(timing.send_one));
                self.phase = TransmitPhase::Start;
                TickEvent::Continue
            }
            TransmitPhase::End => {
                driver.halt_transmit();
                self.phase = TransmitPhase::Start;
                self.bits = 0;
                self.cursor = 0;
                self.active = false;
                TickEvent::Finished
            }
        }
    }

    /// Next hex digit of the frame, skipping anything that is not hex
    ///
    /// `None` at the terminator or the end of the buffer.
    fn next_nibble(&mut self) -> Option<u8> {
        while let Some(&c) = self.frame.get(self.cursor) {
            self.cursor += 1;
            if c == FRAME_END {
                return None;
            }
            if let Some(nibble) = hex_to_nibble(c) {
                return Some(nibble);
            }
        }
        None
    }
}
