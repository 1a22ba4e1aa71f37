//! Raw frame buffer
//!
//! A raw frame is the text form of one bus message: ASCII hex digits, the
//! last of which is the checksum, terminated by a carriage return.

use heapless::Vec;

/// Frame terminator appended after the checksum digit
pub const FRAME_END: u8 = b'\r';

/// Capacity of a raw frame buffer, terminator included
pub const MAX_FRAME_LEN: usize = 32;

/// Longest body that still leaves room for checksum and terminator
pub const MAX_BODY_LEN: usize = MAX_FRAME_LEN - 2;

/// Bounded raw frame text
pub type RawFrame = Vec<u8, MAX_FRAME_LEN>;

/// Strip the terminator, if present
pub fn without_terminator(raw: &[u8]) -> &[u8] {
    match raw.split_last() {
        Some((&FRAME_END, rest)) => rest,
        _ => raw,
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_without_terminator() {
        assert_eq!(without_terminator(b"18A\r"), b"18A");
        assert_eq!(without_terminator(b"18A"), b"18A");
        assert_eq!(without_terminator(b""), b"");
    }
}
