//! CD changer emulation
//!
//! The changer answers head unit commands and also sees its own replies,
//! since the bus is a single shared wire. Multi-step exchanges (resume,
//! disk change, status query) are driven by reacting to those echoes.

pub mod machine;
pub mod status;

pub use machine::{CommandStateMachine, Response};
pub use status::{DeviceStatus, StatusSummary};

/// Bits of the status flags field
pub mod flags {
    /// Play, pause and stop bits
    pub const PLAY_STATE_MASK: u32 = 0x00B;
    pub const PLAY: u32 = 0x001;
    pub const PAUSE: u32 = 0x002;
    pub const STOP: u32 = 0x008;

    /// Repeat, scan and mix bits
    pub const MODE_MASK: u32 = 0xCA0;
    pub const REPEAT_OFF: u32 = 0x000;
    pub const REPEAT_ONE: u32 = 0x400;
    pub const REPEAT_ALL: u32 = 0x800;
    pub const SCAN: u32 = 0x080;
    pub const MIX: u32 = 0x020;

    /// Disk change in progress
    pub const CHANGE_BUSY: u32 = 0x1001;
    /// Disk change complete
    pub const CHANGE_DONE: u32 = 0x0001;
}
