//! Board-agnostic core of the M-BUS changer emulator
//!
//! Everything between the GPIO pin and the changer behavior that does not
//! depend on a specific chip:
//!
//! - Bit timing: pulse classification, receive and transmit state machines
//! - Frame buffers shared between interrupt handlers and the foreground
//! - Bus link: the interrupt-side owner of driver, timing and buffers
//! - Changer emulation: status and command handling
//! - Coordinator: decode, reply, heartbeat
//! - Timing configuration and its flash persistence

#![cfg_attr(not(test), no_std)]
#![deny(unsafe_code)]

pub mod assembler;
pub mod changer;
pub mod config;
pub mod coordinator;
pub mod link;
pub mod timing;

#[cfg(test)]
pub(crate) mod test_support;

pub use assembler::{PacketAssembler, ReceiveFault};
pub use changer::{CommandStateMachine, DeviceStatus, Response, StatusSummary};
pub use config::TimingConfig;
pub use coordinator::{Activity, Coordinator, DropReason, FrameOutcome, ReplyStatus};
pub use link::{BusLink, LinkAccess, LinkStats, ReceiveOutcome};
