//! Simulated bus hardware for host tests

use mbus_hal::{BusDriver, Edge, Ticks};

/// Line change requested by the code under test
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum LineOp {
    Assert(Ticks),
    Release(Ticks),
    Halt,
}

/// Records everything the link asks of the hardware
#[derive(Debug, Default)]
pub struct MockBus {
    pub now: Ticks,
    pub ops: Vec<LineOp>,
    pub capture: Option<Edge>,
    pub timeout: Option<Ticks>,
    pub line_low: bool,
    pub tx_ticking: bool,
}

impl MockBus {
    pub fn new() -> Self {
        Self::default()
    }
}

impl BusDriver for MockBus {
    fn now_ticks(&self) -> Ticks {
        self.now
    }

    fn start_receive_capture(&mut self, edge: Edge) {
        self.capture = Some(edge);
    }

    fn schedule_timeout(&mut self, ticks: Ticks) {
        self.timeout = Some(ticks);
    }

    fn assert_line_for(&mut self, ticks: Ticks) {
        self.line_low = true;
        self.tx_ticking = true;
        self.ops.push(LineOp::Assert(ticks));
    }

    fn release_line_for(&mut self, ticks: Ticks) {
        self.line_low = false;
        self.tx_ticking = true;
        self.ops.push(LineOp::Release(ticks));
    }

    fn halt_transmit(&mut self) {
        self.line_low = false;
        self.tx_ticking = false;
        self.ops.push(LineOp::Halt);
    }
}
