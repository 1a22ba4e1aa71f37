//! Structured packet representation

use crate::codetable::Command;

/// Originator of a frame, taken from its first digit
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
#[cfg_attr(feature = "defmt", derive(defmt::Format))]
pub enum Source {
    #[default]
    Unknown,
    /// Head unit (digit `1`)
    Radio,
    /// CD changer (digit `9`), including our own echoed replies
    Changer,
}

impl Source {
    /// Map a source digit to a source
    pub fn from_nibble(nibble: u8) -> Self {
        match nibble {
            1 => Source::Radio,
            9 => Source::Changer,
            _ => Source::Unknown,
        }
    }

    /// Short tag used when logging frames
    pub fn tag(self) -> &'static str {
        match self {
            Source::Unknown => "?",
            Source::Radio => "R",
            Source::Changer => "C",
        }
    }
}

/// Packed changer attribute addressed by a template placeholder
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
#[cfg_attr(feature = "defmt", derive(defmt::Format))]
pub enum FieldKind {
    Disk,
    Track,
    Index,
    Minute,
    Second,
    Flags,
}

impl FieldKind {
    /// All field kinds, in mask bit order
    pub const ALL: [FieldKind; 6] = [
        FieldKind::Disk,
        FieldKind::Track,
        FieldKind::Index,
        FieldKind::Minute,
        FieldKind::Second,
        FieldKind::Flags,
    ];

    /// Field addressed by a lowercase template letter
    pub const fn from_placeholder(c: u8) -> Option<Self> {
        match c {
            b'd' => Some(FieldKind::Disk),
            b't' => Some(FieldKind::Track),
            b'i' => Some(FieldKind::Index),
            b'm' => Some(FieldKind::Minute),
            b's' => Some(FieldKind::Second),
            b'f' => Some(FieldKind::Flags),
            _ => None,
        }
    }

    /// Template letter for this field
    pub const fn placeholder(self) -> u8 {
        match self {
            FieldKind::Disk => b'd',
            FieldKind::Track => b't',
            FieldKind::Index => b'i',
            FieldKind::Minute => b'm',
            FieldKind::Second => b's',
            FieldKind::Flags => b'f',
        }
    }

    /// Mask bit recorded when this field is decoded
    pub const fn mask(self) -> FieldMask {
        match self {
            FieldKind::Disk => FieldMask::DISK,
            FieldKind::Track => FieldMask::TRACK,
            FieldKind::Index => FieldMask::INDEX,
            FieldKind::Minute => FieldMask::MINUTE,
            FieldKind::Second => FieldMask::SECOND,
            FieldKind::Flags => FieldMask::FLAGS,
        }
    }
}

/// Set of fields populated by a decoded frame
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
#[cfg_attr(feature = "defmt", derive(defmt::Format))]
pub struct FieldMask(u8);

impl FieldMask {
    pub const EMPTY: FieldMask = FieldMask(0);
    pub const DISK: FieldMask = FieldMask(0x01);
    pub const TRACK: FieldMask = FieldMask(0x02);
    pub const INDEX: FieldMask = FieldMask(0x04);
    pub const MINUTE: FieldMask = FieldMask(0x08);
    pub const SECOND: FieldMask = FieldMask(0x10);
    pub const FLAGS: FieldMask = FieldMask(0x20);

    /// Raw bit pattern
    pub const fn bits(self) -> u8 {
        self.0
    }

    pub const fn contains(self, other: FieldMask) -> bool {
        self.0 & other.0 == other.0
    }

    pub fn insert(&mut self, other: FieldMask) {
        self.0 |= other.0;
    }

    pub const fn is_empty(self) -> bool {
        self.0 == 0
    }
}

/// Numeric changer attributes
///
/// Values hold the digits exactly as they appear on the wire, so track and
/// time fields are BCD.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
#[cfg_attr(feature = "defmt", derive(defmt::Format))]
pub struct Fields {
    pub disk: u32,
    pub track: u32,
    pub index: u32,
    pub minutes: u32,
    pub seconds: u32,
    pub flags: u32,
}

impl Fields {
    pub fn get(&self, kind: FieldKind) -> u32 {
        match kind {
            FieldKind::Disk => self.disk,
            FieldKind::Track => self.track,
            FieldKind::Index => self.index,
            FieldKind::Minute => self.minutes,
            FieldKind::Second => self.seconds,
            FieldKind::Flags => self.flags,
        }
    }

    pub fn get_mut(&mut self, kind: FieldKind) -> &mut u32 {
        match kind {
            FieldKind::Disk => &mut self.disk,
            FieldKind::Track => &mut self.track,
            FieldKind::Index => &mut self.index,
            FieldKind::Minute => &mut self.minutes,
            FieldKind::Second => &mut self.seconds,
            FieldKind::Flags => &mut self.flags,
        }
    }
}

/// A decoded frame, or a reply waiting to be encoded
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
#[cfg_attr(feature = "defmt", derive(defmt::Format))]
pub struct Packet {
    /// Originator from the first digit
    pub source: Source,
    /// Checksum digit carried by the frame (verified on decode)
    pub checksum: u8,
    /// Matched command, `Invalid` if nothing matched
    pub command: Command,
    /// Field values
    pub fields: Fields,
    /// Fields populated by decode
    pub present: FieldMask,
    /// Number of flag digits in the matched template
    pub flag_digits: u8,
}

impl Packet {
    /// A packet with the given command and no field data
    pub const fn new(command: Command) -> Self {
        Self {
            source: Source::Unknown,
            checksum: 0,
            command,
            fields: Fields {
                disk: 0,
                track: 0,
                index: 0,
                minutes: 0,
                seconds: 0,
                flags: 0,
            },
            present: FieldMask::EMPTY,
            flag_digits: 0,
        }
    }

    /// A packet carrying the given field values
    pub const fn with_fields(command: Command, fields: Fields) -> Self {
        let mut packet = Self::new(command);
        packet.fields = fields;
        packet
    }

    /// Human readable name of the command
    pub fn description(&self) -> &'static str {
        self.command.description()
    }
}

impl Default for Packet {
    fn default() -> Self {
        Self::new(Command::Invalid)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_source_digits() {
        assert_eq!(Source::from_nibble(1), Source::Radio);
        assert_eq!(Source::from_nibble(9), Source::Changer);
        assert_eq!(Source::from_nibble(0), Source::Unknown);
        assert_eq!(Source::from_nibble(5), Source::Unknown);
    }

    #[test]
    fn test_placeholder_roundtrip() {
        for kind in FieldKind::ALL {
            assert_eq!(FieldKind::from_placeholder(kind.placeholder()), Some(kind));
        }
        assert_eq!(FieldKind::from_placeholder(b'x'), None);
        assert_eq!(FieldKind::from_placeholder(b'D'), None);
    }

    #[test]
    fn test_field_mask() {
        let mut mask = FieldMask::EMPTY;
        assert!(mask.is_empty());
        mask.insert(FieldKind::Track.mask());
        mask.insert(FieldKind::Flags.mask());
        assert_eq!(mask.bits(), 0x22);
        assert!(mask.contains(FieldMask::TRACK));
        assert!(!mask.contains(FieldMask::DISK));
    }

    #[test]
    fn test_fields_accessors() {
        let mut fields = Fields::default();
        *fields.get_mut(FieldKind::Second) = 0x42;
        assert_eq!(fields.seconds, 0x42);
        assert_eq!(fields.get(FieldKind::Second), 0x42);
    }
}
