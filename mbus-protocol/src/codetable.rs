//! Command code table
//!
//! Every known frame is described by a fixed width template. Templates are
//! parsed into token lists at compile time; decode and encode then walk
//! the tokens instead of re-reading the template text.
//!
//! Table order matters: decode takes the first entry that matches, so an
//! entry with more literal digits must precede a looser entry of the same
//! length that would also match it.

use crate::packet::FieldKind;

/// Longest template in the table
pub const MAX_TEMPLATE_LEN: usize = 16;

/// Bus commands, both directions
///
/// Head unit commands are listed first, changer replies after them.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
#[cfg_attr(feature = "defmt", derive(defmt::Format))]
pub enum Command {
    #[default]
    Invalid,

    // Head unit to changer
    Ping,
    Play,
    Pause,
    Stop,
    ScanStop,
    PlayFastForward,
    PlayFastReverse,
    PauseFastForward,
    PauseFastReverse,
    Resume,
    ResumePaused,
    NextMix,
    PrevMix,
    RepeatOff,
    RepeatOne,
    RepeatAll,
    Scan,
    Mix,
    Select,
    Status,

    // Changer to head unit
    PingOk,
    Ack,
    Preparing,
    Stopped,
    Paused,
    Playing,
    Spinup,
    Forwarding,
    Reversing,
    PowerUp,
    LastInfo,
    Changing4,
    Changing,
    NoMagazine,
    Changing2,
    Changing3,
    Changing1,
    DiskStatus,
    Status1,
    Status2,
}

impl Command {
    /// Table entry describing this command's wire form
    pub fn entry(self) -> Option<&'static CodeTableEntry> {
        CODE_TABLE.iter().find(|entry| entry.command == self)
    }

    /// Template used to encode this command
    pub fn template(self) -> Option<&'static Template> {
        self.entry().map(|entry| &entry.template)
    }

    /// Human readable name
    pub fn description(self) -> &'static str {
        match self.entry() {
            Some(entry) => entry.description,
            None => "Invalid",
        }
    }
}

/// One element of a parsed template
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
#[cfg_attr(feature = "defmt", derive(defmt::Format))]
pub enum Token {
    /// A fixed digit that must appear as-is
    Literal(u8),
    /// One digit of a packed field, most significant first
    Field(FieldKind),
}

/// Parsed fixed width template
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Template {
    tokens: [Token; MAX_TEMPLATE_LEN],
    len: usize,
}

impl Template {
    /// Parse template text
    ///
    /// Evaluated at compile time for the code table, where an invalid
    /// template is a build error.
    pub const fn parse(mask: &str) -> Self {
        let bytes = mask.as_bytes();
        assert!(bytes.len() <= MAX_TEMPLATE_LEN, "template too long");

        let mut tokens = [Token::Literal(0); MAX_TEMPLATE_LEN];
        let mut i = 0;
        while i < bytes.len() {
            let c = bytes[i];
            tokens[i] = match FieldKind::from_placeholder(c) {
                Some(kind) => Token::Field(kind),
                None => match c {
                    b'0'..=b'9' => Token::Literal(c - b'0'),
                    b'A'..=b'F' => Token::Literal(c - b'A' + 10),
                    _ => panic!("invalid template character"),
                },
            };
            i += 1;
        }

        Self {
            tokens,
            len: bytes.len(),
        }
    }

    pub fn tokens(&self) -> &[Token] {
        &self.tokens[..self.len]
    }

    /// Number of digits in a matching frame body
    pub const fn len(&self) -> usize {
        self.len
    }

    pub const fn is_empty(&self) -> bool {
        self.len == 0
    }

    /// Whether a frame body (checksum and terminator removed) fits this template
    ///
    /// Lengths must be equal and every literal digit must match; placeholder
    /// positions accept any digit.
    pub fn matches(&self, body: &[u8]) -> bool {
        body.len() == self.len
            && self.tokens().iter().zip(body).all(|(token, &c)| match token {
                Token::Literal(digit) => crate::hex::hex_to_nibble(c) == Some(*digit),
                Token::Field(_) => true,
            })
    }

    /// Number of digits the template reserves for a field
    pub fn field_digits(&self, kind: FieldKind) -> u8 {
        self.tokens()
            .iter()
            .filter(|token| **token == Token::Field(kind))
            .count() as u8
    }
}

/// One row of the code table
#[derive(Debug, Clone, Copy)]
pub struct CodeTableEntry {
    pub command: Command,
    pub template: Template,
    pub description: &'static str,
}

impl CodeTableEntry {
    const fn new(command: Command, mask: &str, description: &'static str) -> Self {
        Self {
            command,
            template: Template::parse(mask),
            description,
        }
    }
}

/// Find the first table entry matching a frame body
pub fn match_body(body: &[u8]) -> Option<&'static CodeTableEntry> {
    CODE_TABLE.iter().find(|entry| entry.template.matches(body))
}

/// All known frames, in match priority order
pub static CODE_TABLE: [CodeTableEntry; 40] = [
    CodeTableEntry::new(Command::Ping, "18", "Ping"),
    CodeTableEntry::new(Command::PingOk, "98", "Ping OK"),
    // f: 0, 1, 6, 7 or 9
    CodeTableEntry::new(Command::Ack, "9F0000f", "Ack/Wait"),
    CodeTableEntry::new(Command::Status, "19", "some info?"),
    // flag digits: repeat mode, mix/scan, unused, play/pause/stop
    CodeTableEntry::new(Command::Preparing, "991ttiimmssff0f", "Preparing"),
    CodeTableEntry::new(Command::Stopped, "992ttiimmssff0f", "Stopped"),
    CodeTableEntry::new(Command::Paused, "993ttiimmssff0f", "Paused"),
    CodeTableEntry::new(Command::Playing, "994ttiimmssff0f", "Playing"),
    CodeTableEntry::new(Command::Spinup, "995ttiimmssff0f", "Spinup"),
    CodeTableEntry::new(Command::Forwarding, "996ttiimmssff0f", "FF"),
    CodeTableEntry::new(Command::Reversing, "997ttiimmssff0f", "FR"),
    CodeTableEntry::new(Command::Play, "11101", "Play"),
    CodeTableEntry::new(Command::Pause, "11102", "Pause"),
    CodeTableEntry::new(Command::Stop, "11140", "Stop"),
    CodeTableEntry::new(Command::ScanStop, "11150", "ScanStop"),
    CodeTableEntry::new(Command::PlayFastForward, "11105", "Play FF start"),
    CodeTableEntry::new(Command::PlayFastReverse, "11109", "Play FR start"),
    CodeTableEntry::new(Command::PauseFastForward, "11106", "Pause FF start"),
    CodeTableEntry::new(Command::PauseFastReverse, "1110A", "Pause FR start"),
    CodeTableEntry::new(Command::Resume, "11181", "Play fr curr. pos."),
    CodeTableEntry::new(Command::ResumePaused, "11182", "Pause fr curr. pos."),
    // Must precede Select, which matches the same digits
    CodeTableEntry::new(Command::NextMix, "1130A314", "next random"),
    CodeTableEntry::new(Command::PrevMix, "1130B314", "previous random"),
    // f0: 1 playing, 2 paused; f1: 4 random
    CodeTableEntry::new(Command::Select, "113dttff", "Select"),
    CodeTableEntry::new(Command::RepeatOff, "11400000", "Repeat Off"),
    CodeTableEntry::new(Command::RepeatOne, "11440000", "Repeat One"),
    CodeTableEntry::new(Command::RepeatAll, "11480000", "Repeat All"),
    CodeTableEntry::new(Command::Scan, "11408000", "Scan"),
    CodeTableEntry::new(Command::Mix, "11402000", "Mix"),
    CodeTableEntry::new(Command::PowerUp, "9A0000000000", "some powerup?"),
    // f0: 0 done, 1 busy, 8 eject
    CodeTableEntry::new(Command::LastInfo, "9B0dttfff0f", "last played"),
    CodeTableEntry::new(Command::Changing4, "9B8d00fff0f", "Changing Phase 4"),
    CodeTableEntry::new(Command::Changing, "9B9dttfff0f", "Changing"),
    CodeTableEntry::new(Command::NoMagazine, "9BAd00f00ff", "No Magazin"),
    CodeTableEntry::new(Command::Changing2, "9BBd00fff0f", "Changing Phase 2"),
    CodeTableEntry::new(Command::Changing3, "9BCd00fff0f", "Changing Phase 3"),
    CodeTableEntry::new(Command::Changing1, "9BDd00fff0f", "Changing Phase 1"),
    CodeTableEntry::new(Command::DiskStatus, "9Cd01ttmmssf", "Disk Status"),
    CodeTableEntry::new(Command::Status1, "9D000fffff", "some status?"),
    CodeTableEntry::new(Command::Status2, "9E0000000", "some more status?"),
];
