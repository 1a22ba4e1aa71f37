//! Hex digit helpers and the frame checksum

/// Character emitted for a nibble that could not be decoded
pub const INVALID_DIGIT: u8 = b'X';

/// Convert a nibble to its uppercase hex character
///
/// Values above 15 map to [`INVALID_DIGIT`].
pub const fn nibble_to_hex(nibble: u8) -> u8 {
    match nibble {
        0..=9 => b'0' + nibble,
        10..=15 => b'A' + nibble - 10,
        _ => INVALID_DIGIT,
    }
}

/// Convert a hex character (either case) to its value
pub const fn hex_to_nibble(c: u8) -> Option<u8> {
    match c {
        b'0'..=b'9' => Some(c - b'0'),
        b'A'..=b'F' => Some(c - b'A' + 10),
        b'a'..=b'f' => Some(c - b'a' + 10),
        _ => None,
    }
}

/// Checksum over a run of hex characters
///
/// `(XOR of all nibbles + 1) mod 16`. Returns `None` if any character is
/// not a hex digit, so a glitched nibble can never produce a valid sum.
pub fn checksum(digits: &[u8]) -> Option<u8> {
    let mut sum = 0u8;
    for &c in digits {
        sum ^= hex_to_nibble(c)?;
    }
    Some((sum + 1) % 16)
}
