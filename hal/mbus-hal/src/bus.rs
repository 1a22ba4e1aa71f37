//! Single-wire bus access
//!
//! The M-BUS is an open-collector line shared by the head unit and the
//! changer. A bit is a low pulse whose width encodes its value, so the
//! adapter needs three things from the hardware: a free-running tick
//! clock, edge capture on the input, and a way to hold the line low for a
//! measured number of ticks.
//!
//! All durations are expressed in bus ticks of [`TICK_US`] microseconds.

/// Duration of one bus tick in microseconds
pub const TICK_US: u32 = 16;

/// Tick count on the bus clock
///
/// Wraps; differences are taken with `wrapping_sub`.
pub type Ticks = u16;

/// Line transition as seen on the bus wire
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
#[cfg_attr(feature = "defmt", derive(defmt::Format))]
pub enum Edge {
    /// The line is pulled low (start of a bit pulse)
    Falling,
    /// The line is released (end of a bit pulse)
    Rising,
}

/// Hardware access for the bit-level transceiver
///
/// Implementations are called from interrupt context and must not block.
/// Every method returns immediately; the hardware reports back through
/// the edge, receive-timeout and transmit-tick entry points of the link.
pub trait BusDriver {
    /// Current value of the bus tick clock
    fn now_ticks(&self) -> Ticks;

    /// Arm edge capture for the given transition
    ///
    /// Only the armed edge is reported; the other one is ignored.
    fn start_receive_capture(&mut self, edge: Edge);

    /// Fire the receive timeout after `ticks` without a new pulse
    ///
    /// Re-arming replaces any pending timeout.
    fn schedule_timeout(&mut self, ticks: Ticks);

    /// Pull the line low and deliver a transmit tick after `ticks`
    fn assert_line_for(&mut self, ticks: Ticks);

    /// Release the line and deliver a transmit tick after `ticks`
    fn release_line_for(&mut self, ticks: Ticks);

    /// Stop delivering transmit ticks and leave the line released
    fn halt_transmit(&mut self);
}
