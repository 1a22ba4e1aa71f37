//! GPIO bus driver for RP2040
//!
//! The adapter sits on the M-BUS through two transistors: one pulls the
//! line low when the output pin is high, the other mirrors the line onto
//! the input pin (inverted on most boards). Timing is derived from the
//! embassy time driver, so no dedicated timer peripheral is needed.
//!
//! The driver itself never waits. It records what the link asked for
//! (which edge to capture, when the receive timeout and the next transmit
//! tick are due) and the bus task awaits those with [`BusInput`] and
//! embassy timers.

use embassy_rp::gpio::{Input, Level, Output, Pin, Pull};
use embassy_rp::Peri;
use embassy_time::{Duration, Instant};

use mbus_hal::{BusDriver, Edge, Ticks, TICK_US};

/// Convert bus ticks to an embassy duration
pub fn ticks_to_duration(ticks: Ticks) -> Duration {
    Duration::from_micros(u64::from(ticks) * u64::from(TICK_US))
}

/// Level the input pin shows while the bus is pulled low
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
#[cfg_attr(feature = "defmt", derive(defmt::Format))]
pub enum InputPolarity {
    /// Input follows the bus
    Direct,
    /// Input is high while the bus is low
    Inverted,
}

/// Receive side of the bus
pub struct BusInput<'d> {
    pin: Input<'d>,
    polarity: InputPolarity,
}

impl<'d> BusInput<'d> {
    pub fn new(pin: Peri<'d, impl Pin>, polarity: InputPolarity) -> Self {
        Self {
            pin: Input::new(pin, Pull::None),
            polarity,
        }
    }

    /// Wait until the bus shows the level that follows `edge`
    ///
    /// Level-triggered, so an edge that happened before the call still
    /// completes immediately.
    pub async fn wait_for(&mut self, edge: Edge) {
        let want_pin_high = match (edge, self.polarity) {
            (Edge::Falling, InputPolarity::Direct) => false,
            (Edge::Rising, InputPolarity::Direct) => true,
            (Edge::Falling, InputPolarity::Inverted) => true,
            (Edge::Rising, InputPolarity::Inverted) => false,
        };

        if want_pin_high {
            self.pin.wait_for_high().await;
        } else {
            self.pin.wait_for_low().await;
        }
    }
}

/// Transmit side and timer bookkeeping
pub struct Rp2040Bus<'d> {
    /// High pulls the bus low
    output: Output<'d>,
    capture: Option<Edge>,
    rx_deadline: Option<Instant>,
    tx_deadline: Option<Instant>,
    /// Deadline of the last line change; the next one is measured from it
    tx_anchor: Option<Instant>,
}

impl<'d> Rp2040Bus<'d> {
    pub fn new(pin: Peri<'d, impl Pin>) -> Self {
        Self {
            output: Output::new(pin, Level::Low),
            capture: None,
            rx_deadline: None,
            tx_deadline: None,
            tx_anchor: None,
        }
    }

    /// Edge the receiver wants reported
    pub fn capture(&self) -> Option<Edge> {
        self.capture
    }

    /// When the receive timeout fires, if armed
    pub fn rx_deadline(&self) -> Option<Instant> {
        self.rx_deadline
    }

    /// When the next transmit tick is due, if transmitting
    pub fn tx_deadline(&self) -> Option<Instant> {
        self.tx_deadline
    }

    /// Consume the receive timeout before handing it to the link
    pub fn clear_rx_deadline(&mut self) {
        self.rx_deadline = None;
    }

    /// Consume the transmit tick before handing it to the link
    pub fn clear_tx_deadline(&mut self) {
        self.tx_deadline = None;
    }

    fn schedule_tx(&mut self, ticks: Ticks) {
        // Chain from the previous deadline so wake-up latency does not add up
        let base = self.tx_anchor.unwrap_or_else(Instant::now);
        let deadline = base + ticks_to_duration(ticks);
        self.tx_anchor = Some(deadline);
        self.tx_deadline = Some(deadline);
    }
}

impl BusDriver for Rp2040Bus<'_> {
    fn now_ticks(&self) -> Ticks {
        // Truncation is the wrap
        (Instant::now().as_micros() / u64::from(TICK_US)) as Ticks
    }

    fn start_receive_capture(&mut self, edge: Edge) {
        self.capture = Some(edge);
    }

    fn schedule_timeout(&mut self, ticks: Ticks) {
        self.rx_deadline = Some(Instant::now() + ticks_to_duration(ticks));
    }

    fn assert_line_for(&mut self, ticks: Ticks) {
        self.output.set_high();
        self.schedule_tx(ticks);
    }

    fn release_line_for(&mut self, ticks: Ticks) {
        self.output.set_low();
        self.schedule_tx(ticks);
    }

    fn halt_transmit(&mut self) {
        self.output.set_low();
        self.tx_deadline = None;
        self.tx_anchor = None;
    }
}
