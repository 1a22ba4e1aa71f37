//! Bit-level timing
//!
//! Turns measured pulse widths into bits and bits into hex characters on
//! the receive side, and hex characters into timed pulses on the send side.
//! Nothing here touches hardware directly; edges and timer expiries are fed
//! in by the link and line changes go out through [`mbus_hal::BusDriver`].

pub mod receiver;
pub mod transmitter;

pub use receiver::{EdgeEvent, ReceivePhase, Receiver, TimeoutEvent};
pub use transmitter::{TickEvent, TransmitPhase, Transmitter};

use mbus_hal::Ticks;

use crate::config::TimingConfig;

/// Why a pulse could not be classified
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
#[cfg_attr(feature = "defmt", derive(defmt::Format))]
pub enum GlitchKind {
    /// Shorter than any valid 0
    TooShort,
    /// Between the 0 and 1 ranges
    Ambiguous,
    /// Longer than any valid 1
    TooLong,
}

/// Classified low pulse
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
#[cfg_attr(feature = "defmt", derive(defmt::Format))]
pub enum BitSample {
    Zero,
    One,
    Glitch(GlitchKind),
}

impl BitSample {
    /// Bit value, if the pulse was valid
    pub fn value(self) -> Option<u8> {
        match self {
            BitSample::Zero => Some(0),
            BitSample::One => Some(1),
            BitSample::Glitch(_) => None,
        }
    }
}

/// Classify the width of one low pulse
///
/// Ranges are inclusive on both ends. Widths between the 0 and 1 ranges are
/// tagged as ambiguous rather than dropped; the frame checksum rejects them
/// later.
pub fn classify(width: Ticks, timing: &TimingConfig) -> BitSample {
    if width < timing.min_zero {
        BitSample::Glitch(GlitchKind::TooShort)
    } else if width <= timing.max_zero {
        BitSample::Zero
    } else if width < timing.min_one {
        BitSample::Glitch(GlitchKind::Ambiguous)
    } else if width <= timing.max_one {
        BitSample::One
    } else {
        BitSample::Glitch(GlitchKind::TooLong)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_classify_boundaries() {
        let timing = TimingConfig::default();
        assert_eq!(classify(0, &timing), BitSample::Glitch(GlitchKind::TooShort));
        assert_eq!(classify(32, &timing), BitSample::Glitch(GlitchKind::TooShort));
        assert_eq!(classify(33, &timing), BitSample::Zero);
        assert_eq!(classify(38, &timing), BitSample::Zero);
        assert_eq!(classify(43, &timing), BitSample::Zero);
        assert_eq!(classify(44, &timing), BitSample::Glitch(GlitchKind::Ambiguous));
        assert_eq!(classify(106, &timing), BitSample::Glitch(GlitchKind::Ambiguous));
        assert_eq!(classify(107, &timing), BitSample::One);
        assert_eq!(classify(117, &timing), BitSample::One);
        assert_eq!(classify(118, &timing), BitSample::Glitch(GlitchKind::TooLong));
    }

    #[test]
    fn test_sample_value() {
        assert_eq!(BitSample::Zero.value(), Some(0));
        assert_eq!(BitSample::One.value(), Some(1));
        assert_eq!(BitSample::Glitch(GlitchKind::TooLong).value(), None);
    }
}
