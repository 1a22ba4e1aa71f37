//! Frame decode and encode
//!
//! Both directions interpret the token list of a code table entry:
//! decode accumulates placeholder digits into fields left to right, encode
//! consumes field nibbles right to left so multi-digit values land with
//! their least significant digit last.

use crate::codetable::{self, Command, Token};
use crate::frame::{self, RawFrame, FRAME_END};
use crate::hex::{checksum, hex_to_nibble, nibble_to_hex};
use crate::packet::{FieldKind, FieldMask, Fields, Packet, Source};

/// Errors that can occur while decoding a raw frame
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
#[cfg_attr(feature = "defmt", derive(defmt::Format))]
pub enum DecodeError {
    /// Fewer than three characters
    FrameTooShort,
    /// Checksum digit wrong, or a digit was not hex
    ChecksumMismatch,
    /// Checksum fine but no template matches the body
    TemplateNotMatched,
}

/// Errors that can occur while encoding a packet
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
#[cfg_attr(feature = "defmt", derive(defmt::Format))]
pub enum EncodeError {
    /// The command has no template
    CommandNotEncodable,
    /// Encoded frame exceeds the raw buffer
    FrameTooLong,
}

/// Decode a raw frame
///
/// The frame is the text received from the bus: hex digits, checksum digit,
/// optionally followed by the CR terminator.
pub fn decode(raw: &[u8]) -> Result<Packet, DecodeError> {
    if raw.len() < 3 {
        return Err(DecodeError::FrameTooShort);
    }

    let digits = frame::without_terminator(raw);
    let Some((&sum_digit, body)) = digits.split_last() else {
        return Err(DecodeError::FrameTooShort);
    };
    if body.is_empty() {
        return Err(DecodeError::FrameTooShort);
    }

    let expected = checksum(body).ok_or(DecodeError::ChecksumMismatch)?;
    let carried = hex_to_nibble(sum_digit).ok_or(DecodeError::ChecksumMismatch)?;
    if expected != carried {
        return Err(DecodeError::ChecksumMismatch);
    }

    let entry = codetable::match_body(body).ok_or(DecodeError::TemplateNotMatched)?;

    let mut fields = Fields::default();
    let mut present = FieldMask::EMPTY;
    let mut flag_digits = 0u8;

    for (token, &c) in entry.template.tokens().iter().zip(body) {
        if let Token::Field(kind) = *token {
            // Checksum already proved every digit is hex
            let digit = hex_to_nibble(c).unwrap_or(0);
            let field = fields.get_mut(kind);
            *field = (*field << 4) | u32::from(digit);
            present.insert(kind.mask());
            if kind == FieldKind::Flags {
                flag_digits += 1;
            }
        }
    }

    Ok(Packet {
        source: Source::from_nibble(hex_to_nibble(body[0]).unwrap_or(0)),
        checksum: carried,
        command: entry.command,
        fields,
        present,
        flag_digits,
    })
}

/// Encode a packet into a terminated raw frame
///
/// Fields wider than their placeholders are truncated to the low digits.
pub fn encode(packet: &Packet) -> Result<RawFrame, EncodeError> {
    let template = packet
        .command
        .template()
        .ok_or(EncodeError::CommandNotEncodable)?;
    let tokens = template.tokens();

    let mut body = [0u8; codetable::MAX_TEMPLATE_LEN];
    let mut remaining = packet.fields;

    for (slot, token) in body[..tokens.len()].iter_mut().zip(tokens).rev() {
        *slot = match *token {
            Token::Literal(digit) => nibble_to_hex(digit),
            Token::Field(kind) => {
                let field = remaining.get_mut(kind);
                let digit = (*field & 0x0F) as u8;
                *field >>= 4;
                nibble_to_hex(digit)
            }
        };
    }

    let body = &body[..tokens.len()];
    let sum = checksum(body).ok_or(EncodeError::CommandNotEncodable)?;

    let mut raw = RawFrame::new();
    raw.extend_from_slice(body)
        .map_err(|_| EncodeError::FrameTooLong)?;
    raw.push(nibble_to_hex(sum))
        .map_err(|_| EncodeError::FrameTooLong)?;
    raw.push(FRAME_END).map_err(|_| EncodeError::FrameTooLong)?;
    Ok(raw)
}

/// Encode a command that carries no field data
pub fn encode_command(command: Command) -> Result<RawFrame, EncodeError> {
    encode(&Packet::new(command))
}

#[cfg(test)]
mod tests {
    use super::*;
    use proptest::prelude::*;

    #[test]
    fn test_decode_ping() {
        let packet = decode(b"18A\r").unwrap();
        assert_eq!(packet.command, Command::Ping);
        assert_eq!(packet.source, Source::Radio);
        assert_eq!(packet.checksum, 0xA);
        assert!(packet.present.is_empty());
    }

    #[test]
    fn test_decode_without_terminator() {
        let packet = decode(b"18A").unwrap();
        assert_eq!(packet.command, Command::Ping);
    }

    #[test]
    fn test_decode_too_short() {
        assert_eq!(decode(b""), Err(DecodeError::FrameTooShort));
        assert_eq!(decode(b"1\r"), Err(DecodeError::FrameTooShort));
        assert_eq!(decode(b"1A"), Err(DecodeError::FrameTooShort));
    }

    #[test]
    fn test_decode_bad_checksum() {
        assert_eq!(decode(b"18B\r"), Err(DecodeError::ChecksumMismatch));
    }

    #[test]
    fn test_decode_glitched_digit() {
        assert_eq!(decode(b"1XA\r"), Err(DecodeError::ChecksumMismatch));
        assert_eq!(decode(b"18X\r"), Err(DecodeError::ChecksumMismatch));
    }

    #[test]
    fn test_decode_unknown_template() {
        // "12" sums to (1 ^ 2) + 1 = 4
        assert_eq!(decode(b"124\r"), Err(DecodeError::TemplateNotMatched));
    }

    #[test]
    fn test_decode_select_fields() {
        let body = b"11325301";
        let mut raw = RawFrame::new();
        raw.extend_from_slice(body).unwrap();
        raw.push(nibble_to_hex(checksum(body).unwrap())).unwrap();
        raw.push(FRAME_END).unwrap();

        let packet = decode(&raw).unwrap();
        assert_eq!(packet.command, Command::Select);
        assert_eq!(packet.fields.disk, 2);
        assert_eq!(packet.fields.track, 0x53);
        assert_eq!(packet.fields.flags, 0x01);
        assert_eq!(packet.flag_digits, 2);
        assert!(packet.present.contains(FieldMask::DISK));
        assert!(packet.present.contains(FieldMask::TRACK));
        assert!(packet.present.contains(FieldMask::FLAGS));
        assert!(!packet.present.contains(FieldMask::MINUTE));
    }

    #[test]
    fn test_encode_ping_ok() {
        let raw = encode_command(Command::PingOk).unwrap();
        // 9 ^ 8 = 1, + 1 = 2
        assert_eq!(raw.as_slice(), b"982\r");
    }

    #[test]
    fn test_encode_playing() {
        let packet = Packet::with_fields(
            Command::Playing,
            Fields {
                disk: 1,
                track: 0x12,
                index: 0x01,
                minutes: 0x03,
                seconds: 0x45,
                flags: 0x801,
            },
        );
        let raw = encode(&packet).unwrap();
        assert_eq!(&raw[..15], b"994120103458001");
        assert_eq!(raw[15], nibble_to_hex(checksum(&raw[..15]).unwrap()));
        assert_eq!(raw[16], FRAME_END);
    }

    #[test]
    fn test_encode_truncates_wide_fields() {
        let packet = Packet::with_fields(
            Command::Changing,
            Fields {
                disk: 0x13,
                track: 0x123,
                flags: 0x1001,
                ..Fields::default()
            },
        );
        let raw = encode(&packet).unwrap();
        assert_eq!(&raw[..10], b"9B93231000");
    }

    #[test]
    fn test_encode_invalid() {
        assert_eq!(
            encode_command(Command::Invalid),
            Err(EncodeError::CommandNotEncodable)
        );
    }

    fn encodable_command() -> impl Strategy<Value = Command> {
        (0..codetable::CODE_TABLE.len()).prop_map(|i| codetable::CODE_TABLE[i].command)
    }

    fn table_index(command: Command) -> usize {
        codetable::CODE_TABLE
            .iter()
            .position(|entry| entry.command == command)
            .unwrap()
    }

    fn mask_to_digits(value: u32, digits: u8) -> u32 {
        if digits >= 8 {
            value
        } else {
            value & ((1u32 << (4 * digits as u32)) - 1)
        }
    }

    proptest! {
        #[test]
        fn prop_roundtrip(
            command in encodable_command(),
            disk in any::<u32>(),
            track in any::<u32>(),
            index in any::<u32>(),
            minutes in any::<u32>(),
            seconds in any::<u32>(),
            flags in any::<u32>(),
        ) {
            let fields = Fields { disk, track, index, minutes, seconds, flags };
            let raw = encode(&Packet::with_fields(command, fields)).unwrap();
            let decoded = decode(&raw).unwrap();

            if decoded.command != command {
                // Shadowed by an earlier, stricter entry
                prop_assert!(table_index(decoded.command) < table_index(command));
            } else {
                let template = command.template().unwrap();
                for kind in FieldKind::ALL {
                    let digits = template.field_digits(kind);
                    prop_assert_eq!(
                        decoded.fields.get(kind),
                        mask_to_digits(fields.get(kind), digits)
                    );
                    prop_assert_eq!(decoded.present.contains(kind.mask()), digits > 0);
                }
                prop_assert_eq!(decoded.flag_digits, template.field_digits(FieldKind::Flags));
            }
        }

        #[test]
        fn prop_single_nibble_flip_is_detected(
            command in encodable_command(),
            flags in any::<u32>(),
            track in any::<u32>(),
            position in any::<prop::sample::Index>(),
            flip in 1u8..16,
        ) {
            let fields = Fields { track, flags, ..Fields::default() };
            let mut raw = encode(&Packet::with_fields(command, fields)).unwrap();
            let body_len = raw.len() - 2;
            let i = position.index(body_len);
            let nibble = hex_to_nibble(raw[i]).unwrap();
            raw[i] = nibble_to_hex(nibble ^ flip);

            prop_assert_eq!(decode(&raw), Err(DecodeError::ChecksumMismatch));
        }
    }
}
