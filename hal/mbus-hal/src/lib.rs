//! M-BUS Hardware Abstraction Layer
//!
//! This crate defines the hardware seams of the changer emulator so the
//! bit timing, framing and changer logic can run against real pins on the
//! target and against simulated pins in host tests.
//!
//! # Architecture
//!
//! ```text
//! ┌─────────────────────────────────────────┐
//! │  mbus-firmware (embassy tasks)          │
//! └─────────────────────────────────────────┘
//!                     │
//!                     ▼
//! ┌─────────────────────────────────────────┐
//! │  mbus-core (receiver, transmitter,      │
//! │  changer state machine)                 │
//! └─────────────────────────────────────────┘
//!                     │
//!                     ▼
//! ┌─────────────────────────────────────────┐
//! │  mbus-hal (this crate - traits)         │
//! └─────────────────────────────────────────┘
//!                     │
//!                     ▼
//!             ┌───────────────┐
//!             │  mbus-hal-    │
//!             │    rp2040     │
//!             └───────────────┘
//! ```
//!
//! # Traits
//!
//! - [`bus::BusDriver`] - Single-wire line access and bus tick timers
//! - [`flash::FlashStorage`] - Persistent storage

#![no_std]
#![deny(unsafe_code)]

pub mod bus;
pub mod flash;

// Re-export key traits at crate root for convenience
pub use bus::{BusDriver, Edge, Ticks, TICK_US};
pub use flash::{FlashError, FlashStorage, StorageKey};
