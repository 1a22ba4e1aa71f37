//! Bus timing configuration
//!
//! All values are in bus ticks of 16 µs. Receive thresholds classify the
//! width of each low pulse; send values shape the pulses we generate.

#[cfg(feature = "serde")]
use serde::{Deserialize, Serialize};

use mbus_hal::{FlashError, Ticks};

/// Nominal low time of a 0 bit (≈0.6 ms)
pub const DEFAULT_ZERO_TIME: Ticks = 38;
/// Nominal low time of a 1 bit (≈1.8 ms)
pub const DEFAULT_ONE_TIME: Ticks = 112;
/// Nominal bit cell (≈3 ms)
pub const DEFAULT_BIT_TIME: Ticks = 187;
/// Accepted deviation around the nominal pulse widths
pub const DEFAULT_TOLERANCE: Ticks = 5;
/// Idle time past a bit cell that ends a frame
pub const DEFAULT_MIN_PAUSE: Ticks = 38;
/// Gap kept after each frame we send
pub const DEFAULT_SPACE: Ticks = 50;

/// Magic number to identify valid timing data
pub const TIMING_MAGIC: u32 = 0x4D42_5553; // "MBUS"

/// Current timing data version
pub const TIMING_VERSION: u8 = 1;

/// Errors from loading, storing or validating timing data
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
#[cfg_attr(feature = "defmt", derive(defmt::Format))]
pub enum TimingError {
    /// Flash operation failed
    Flash(FlashError),
    /// Deserialization failed
    Deserialize,
    /// Serialization failed
    Serialize,
    /// CRC check failed
    CrcMismatch,
    /// Invalid magic or version
    InvalidFormat,
    /// Thresholds overlap or are zero
    OutOfOrder,
}

impl From<FlashError> for TimingError {
    fn from(e: FlashError) -> Self {
        TimingError::Flash(e)
    }
}

/// Pulse classification and generation timings
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
#[cfg_attr(feature = "defmt", derive(defmt::Format))]
#[cfg_attr(feature = "serde", derive(Serialize, Deserialize))]
pub struct TimingConfig {
    /// Shortest pulse accepted as 0
    pub min_zero: Ticks,
    /// Longest pulse accepted as 0
    pub max_zero: Ticks,
    /// Shortest pulse accepted as 1
    pub min_one: Ticks,
    /// Longest pulse accepted as 1
    pub max_one: Ticks,
    /// Time after a pulse start without a new pulse that ends the frame
    pub bit_timeout: Ticks,
    /// Low time we generate for 0
    pub send_zero: Ticks,
    /// Low time we generate for 1
    pub send_one: Ticks,
    /// Bit cell we generate
    pub send_bit: Ticks,
    /// Gap after a frame we send
    pub send_space: Ticks,
}

impl Default for TimingConfig {
    fn default() -> Self {
        Self::DEFAULT
    }
}

impl TimingConfig {
    /// Factory timings derived from the nominal pulse widths
    pub const DEFAULT: TimingConfig = TimingConfig {
        min_zero: DEFAULT_ZERO_TIME - DEFAULT_TOLERANCE,
        max_zero: DEFAULT_ZERO_TIME + DEFAULT_TOLERANCE,
        min_one: DEFAULT_ONE_TIME - DEFAULT_TOLERANCE,
        max_one: DEFAULT_ONE_TIME + DEFAULT_TOLERANCE,
        bit_timeout: DEFAULT_BIT_TIME + DEFAULT_MIN_PAUSE,
        send_zero: DEFAULT_ZERO_TIME,
        send_one: DEFAULT_ONE_TIME,
        send_bit: DEFAULT_BIT_TIME,
        send_space: DEFAULT_SPACE,
    };

    /// Check that the thresholds describe disjoint, ordered ranges
    ///
    /// `min_zero <= max_zero < min_one <= max_one < bit_timeout` and
    /// `send_zero < send_one < send_bit`, none of them zero.
    pub fn validate(&self) -> Result<(), TimingError> {
        let receive_ok = self.min_zero > 0
            && self.min_zero <= self.max_zero
            && self.max_zero < self.min_one
            && self.min_one <= self.max_one
            && self.max_one < self.bit_timeout;
        let send_ok = self.send_zero > 0
            && self.send_zero < self.send_one
            && self.send_one < self.send_bit
            && self.send_space > 0;

        if receive_ok && send_ok {
            Ok(())
        } else {
            Err(TimingError::OutOfOrder)
        }
    }

    fn update_crc(&self, crc: u32) -> u32 {
        [
            self.min_zero,
            self.max_zero,
            self.min_one,
            self.max_one,
            self.bit_timeout,
            self.send_zero,
            self.send_one,
            self.send_bit,
            self.send_space,
        ]
        .iter()
        .fold(crc, |crc, value| crc32_update(crc, &value.to_le_bytes()))
    }
}

/// Timing data as stored in flash
///
/// Header and CRC guard against reading a stale or foreign record.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
#[cfg_attr(feature = "defmt", derive(defmt::Format))]
#[cfg_attr(feature = "serde", derive(Serialize, Deserialize))]
pub struct TimingRecord {
    /// Magic number for validation
    pub magic: u32,
    /// Data format version
    pub version: u8,
    /// Stored timings
    pub timing: TimingConfig,
    /// CRC32 checksum (calculated over magic..timing)
    pub crc: u32,
}

impl TimingRecord {
    /// Wrap timings in a sealed record
    pub fn new(timing: TimingConfig) -> Self {
        let mut record = Self {
            magic: TIMING_MAGIC,
            version: TIMING_VERSION,
            timing,
            crc: 0,
        };
        record.update_crc();
        record
    }

    /// Check if the header matches
    pub fn is_valid(&self) -> bool {
        self.magic == TIMING_MAGIC && self.version == TIMING_VERSION
    }

    /// Calculate CRC32 for the record (excluding the crc field itself)
    pub fn calculate_crc(&self) -> u32 {
        let mut crc: u32 = 0xFFFF_FFFF;
        crc = crc32_update(crc, &self.magic.to_le_bytes());
        crc = crc32_update(crc, &[self.version]);
        crc = self.timing.update_crc(crc);
        !crc
    }

    /// Update the CRC field
    pub fn update_crc(&mut self) {
        self.crc = self.calculate_crc();
    }

    /// Verify the CRC is correct
    pub fn verify_crc(&self) -> bool {
        self.crc == self.calculate_crc()
    }

    /// Validate header, CRC and threshold ordering, yielding the timings
    pub fn into_timing(self) -> Result<TimingConfig, TimingError> {
        if !self.is_valid() {
            return Err(TimingError::InvalidFormat);
        }
        if !self.verify_crc() {
            return Err(TimingError::CrcMismatch);
        }
        self.timing.validate()?;
        Ok(self.timing)
    }
}

/// CRC32 update (IEEE 802.3 polynomial, reflected)
fn crc32_update(crc: u32, data: &[u8]) -> u32 {
    const POLY: u32 = 0xEDB8_8320;
    let mut crc = crc;

    for &byte in data {
        crc ^= byte as u32;
        for _ in 0..8 {
            if crc & 1 != 0 {
                crc = (crc >> 1) ^ POLY;
            } else {
                crc >>= 1;
            }
        }
    }

    crc
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_default_values() {
        let timing = TimingConfig::default();
        assert_eq!(timing.min_zero, 33);
        assert_eq!(timing.max_zero, 43);
        assert_eq!(timing.min_one, 107);
        assert_eq!(timing.max_one, 117);
        assert_eq!(timing.bit_timeout, 225);
        assert_eq!(timing.send_zero, 38);
        assert_eq!(timing.send_one, 112);
        assert_eq!(timing.send_bit, 187);
        assert_eq!(timing.send_space, 50);
        assert_eq!(timing.validate(), Ok(()));
    }

    #[test]
    fn test_overlapping_ranges_rejected() {
        let timing = TimingConfig {
            max_zero: 110,
            ..TimingConfig::default()
        };
        assert_eq!(timing.validate(), Err(TimingError::OutOfOrder));
    }

    #[test]
    fn test_send_order_rejected() {
        let timing = TimingConfig {
            send_one: 200,
            ..TimingConfig::default()
        };
        assert_eq!(timing.validate(), Err(TimingError::OutOfOrder));
    }

    #[test]
    fn test_timeout_must_exceed_one() {
        let timing = TimingConfig {
            bit_timeout: 117,
            ..TimingConfig::default()
        };
        assert_eq!(timing.validate(), Err(TimingError::OutOfOrder));
    }

    #[test]
    fn test_crc_consistency() {
        let mut record = TimingRecord::new(TimingConfig::default());
        assert!(record.verify_crc());

        // Modify data without updating CRC
        record.timing.max_one = 120;
        assert!(!record.verify_crc());
        assert_eq!(record.into_timing(), Err(TimingError::CrcMismatch));
    }

    #[test]
    fn test_record_header() {
        let mut record = TimingRecord::new(TimingConfig::default());
        assert!(record.is_valid());
        record.version = TIMING_VERSION + 1;
        record.update_crc();
        assert_eq!(record.into_timing(), Err(TimingError::InvalidFormat));
    }

    #[test]
    fn test_sealed_invalid_timing_rejected() {
        let record = TimingRecord::new(TimingConfig {
            min_zero: 0,
            ..TimingConfig::default()
        });
        assert_eq!(record.into_timing(), Err(TimingError::OutOfOrder));
    }

    #[test]
    fn test_crc32_known_value() {
        // Standard check value for "123456789"
        assert_eq!(!crc32_update(0xFFFF_FFFF, b"123456789"), 0xCBF4_3926);
    }
}
