//! Frame buffers between the bit layer and the codec
//!
//! The receive buffer has a single writer (the edge handler) and a single
//! reader (the decode step). Once a frame is terminated it is frozen until
//! taken; nothing received in the meantime can overwrite it.

use mbus_protocol::{RawFrame, FRAME_END, MAX_FRAME_LEN};

/// Fewest digits a frame needs to be worth decoding
pub const MIN_FRAME_DIGITS: usize = 3;

/// Receive-side faults, reported but never fatal
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
#[cfg_attr(feature = "defmt", derive(defmt::Format))]
pub enum ReceiveFault {
    /// A pulse outside every valid range (tagged inline as `X`)
    BitGlitch(crate::timing::GlitchKind),
    /// Frame ended with a partial nibble
    FramingIncomplete,
    /// Frame ended with fewer than three digits
    Runt,
    /// Digits arrived while the buffer was full or still awaiting decode
    Overrun,
}

/// Receive and send buffers
#[derive(Debug, Clone, Default)]
pub struct PacketAssembler {
    rx: RawFrame,
    rx_ready: bool,
    rx_overrun: bool,
    tx: RawFrame,
    tx_pending: bool,
}

impl PacketAssembler {
    pub const fn new() -> Self {
        Self {
            rx: RawFrame::new(),
            rx_ready: false,
            rx_overrun: false,
            tx: RawFrame::new(),
            tx_pending: false,
        }
    }

    /// Reset the receive buffer for a new frame
    ///
    /// A terminated frame that has not been taken yet is left alone.
    pub fn begin_frame(&mut self) {
        if !self.rx_ready {
            self.rx.clear();
            self.rx_overrun = false;
        }
    }

    /// Append one received hex character
    pub fn push_digit(&mut self, digit: u8) -> Result<(), ReceiveFault> {
        // Keep one slot for the terminator
        if self.rx_ready || self.rx.len() >= MAX_FRAME_LEN - 1 {
            self.rx_overrun = true;
            return Err(ReceiveFault::Overrun);
        }
        self.rx.push(digit).map_err(|_| ReceiveFault::Overrun)
    }

    /// Terminate the current frame and mark it ready for decode
    pub fn finish_frame(&mut self) -> Result<(), ReceiveFault> {
        if self.rx_ready {
            return Err(ReceiveFault::Overrun);
        }
        if self.rx_overrun {
            self.discard_frame();
            return Err(ReceiveFault::Overrun);
        }
        if self.rx.len() < MIN_FRAME_DIGITS {
            self.discard_frame();
            return Err(ReceiveFault::Runt);
        }
        self.rx.push(FRAME_END).map_err(|_| ReceiveFault::Overrun)?;
        self.rx_ready = true;
        Ok(())
    }

    /// Drop the frame being received
    pub fn discard_frame(&mut self) {
        if !self.rx_ready {
            self.rx.clear();
            self.rx_overrun = false;
        }
    }

    /// Whether a terminated frame awaits decode
    pub fn frame_ready(&self) -> bool {
        self.rx_ready
    }

    /// Take the terminated frame, clearing the receive buffer
    pub fn take_frame(&mut self) -> Option<RawFrame> {
        if !self.rx_ready {
            return None;
        }
        self.rx_ready = false;
        self.rx_overrun = false;
        Some(core::mem::take(&mut self.rx))
    }

    /// Digits received so far in the current frame
    pub fn received(&self) -> &[u8] {
        &self.rx
    }

    /// Place a frame in the send buffer and mark it pending
    ///
    /// Replaces a frame that is still waiting to be sent.
    pub fn load_outgoing(&mut self, frame: RawFrame) {
        self.tx = frame;
        self.tx_pending = true;
    }

    /// Whether a frame awaits transmission
    pub fn send_pending(&self) -> bool {
        self.tx_pending
    }

    /// Hand the pending frame to the transmitter
    pub fn take_outgoing(&mut self) -> Option<RawFrame> {
        if !self.tx_pending {
            return None;
        }
        self.tx_pending = false;
        Some(core::mem::take(&mut self.tx))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn push_all(asm: &mut PacketAssembler, digits: &[u8]) {
        for &d in digits {
            asm.push_digit(d).unwrap();
        }
    }

    #[test]
    fn test_frame_gets_terminator() {
        let mut asm = PacketAssembler::new();
        asm.begin_frame();
        push_all(&mut asm, b"18A");
        assert_eq!(asm.finish_frame(), Ok(()));
        assert!(asm.frame_ready());

        let frame = asm.take_frame().unwrap();
        assert_eq!(frame.as_slice(), b"18A\r");
        assert!(!asm.frame_ready());
        assert!(asm.received().is_empty());
        assert!(asm.take_frame().is_none());
    }

    #[test]
    fn test_runt_discarded() {
        let mut asm = PacketAssembler::new();
        asm.begin_frame();
        push_all(&mut asm, b"18");
        assert_eq!(asm.finish_frame(), Err(ReceiveFault::Runt));
        assert!(!asm.frame_ready());
        assert!(asm.received().is_empty());
    }

    #[test]
    fn test_ready_frame_is_frozen() {
        let mut asm = PacketAssembler::new();
        asm.begin_frame();
        push_all(&mut asm, b"18A");
        asm.finish_frame().unwrap();

        asm.begin_frame();
        assert_eq!(asm.push_digit(b'9'), Err(ReceiveFault::Overrun));
        assert_eq!(asm.finish_frame(), Err(ReceiveFault::Overrun));

        assert_eq!(asm.take_frame().unwrap().as_slice(), b"18A\r");
    }

    #[test]
    fn test_overlong_frame_discarded() {
        let mut asm = PacketAssembler::new();
        asm.begin_frame();
        for _ in 0..MAX_FRAME_LEN - 1 {
            asm.push_digit(b'0').unwrap();
        }
        assert_eq!(asm.push_digit(b'0'), Err(ReceiveFault::Overrun));
        assert_eq!(asm.finish_frame(), Err(ReceiveFault::Overrun));
        assert!(asm.received().is_empty());

        // Next frame is unaffected
        asm.begin_frame();
        push_all(&mut asm, b"18A");
        assert_eq!(asm.finish_frame(), Ok(()));
    }

    #[test]
    fn test_outgoing_pending_flag() {
        let mut asm = PacketAssembler::new();
        assert!(!asm.send_pending());
        assert!(asm.take_outgoing().is_none());

        let mut frame = RawFrame::new();
        frame.extend_from_slice(b"982\r").unwrap();
        asm.load_outgoing(frame);
        assert!(asm.send_pending());

        assert_eq!(asm.take_outgoing().unwrap().as_slice(), b"982\r");
        assert!(!asm.send_pending());
    }
}
