//! Emulated changer status

use core::fmt;

use mbus_protocol::{Command, Fields, Packet, Source};

use super::flags;

/// What the changer reports about itself
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
#[cfg_attr(feature = "defmt", derive(defmt::Format))]
pub struct DeviceStatus {
    /// Current mode, as the command the changer would report
    pub command: Command,
    /// Disk, track, elapsed time (BCD) and flags
    pub fields: Fields,
}

impl Default for DeviceStatus {
    fn default() -> Self {
        Self {
            command: Command::Invalid,
            fields: Fields {
                disk: 1,
                track: 1,
                index: 1,
                ..Fields::default()
            },
        }
    }
}

impl DeviceStatus {
    /// Changer-sourced packet carrying this status under `command`
    pub fn to_packet(&self, command: Command) -> Packet {
        let mut packet = Packet::with_fields(command, self.fields);
        packet.source = Source::Changer;
        packet
    }

    /// Changer-sourced packet carrying this status under its own command
    pub fn packet(&self) -> Packet {
        self.to_packet(self.command)
    }

    /// Set the play/pause/stop bits to exactly `state`
    pub fn set_play_state(&mut self, state: u32) {
        self.fields.flags &= !flags::PLAY_STATE_MASK;
        self.fields.flags |= state;
    }

    /// Set the repeat/scan/mix bits to exactly `mode`
    pub fn set_mode(&mut self, mode: u32) {
        self.fields.flags &= !flags::MODE_MASK;
        self.fields.flags |= mode;
    }

    pub fn is_playing(&self) -> bool {
        self.command == Command::Playing
    }

    /// Restart the elapsed time
    pub fn reset_clock(&mut self) {
        self.fields.minutes = 0;
        self.fields.seconds = 0;
    }

    /// Advance the elapsed time by one second
    ///
    /// Minutes and seconds are BCD; minutes wrap after 99.
    pub fn tick_second(&mut self) {
        self.fields.seconds = bcd_increment(self.fields.seconds);
        if self.fields.seconds >= 0x60 {
            self.fields.seconds = 0;
            self.fields.minutes = bcd_increment(self.fields.minutes);
            if self.fields.minutes > 0x99 {
                self.fields.minutes = 0;
            }
        }
    }

    pub fn summary(&self) -> StatusSummary {
        StatusSummary {
            disk: self.fields.disk,
            track: self.fields.track,
            minutes: self.fields.minutes,
            seconds: self.fields.seconds,
            flags: self.fields.flags,
        }
    }
}

/// Increment a two-digit BCD value
fn bcd_increment(value: u32) -> u32 {
    let value = value + 1;
    if value & 0x0F > 9 {
        (value & !0x0F) + 0x10
    } else {
        value
    }
}

/// One-line view of the status for display and logs
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
#[cfg_attr(feature = "defmt", derive(defmt::Format))]
pub struct StatusSummary {
    pub disk: u32,
    /// BCD
    pub track: u32,
    /// BCD
    pub minutes: u32,
    /// BCD
    pub seconds: u32,
    pub flags: u32,
}

impl fmt::Display for StatusSummary {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        // BCD values print as decimal when shown in hex
        write!(
            f,
            "D:{} T:{:02X} {:02X}:{:02X}",
            self.disk, self.track, self.minutes, self.seconds
        )
    }
}
