//! RP2040-specific HAL for the M-BUS changer emulator
//!
//! Implements the shared `mbus-hal` traits on RP2040:
//!
//! - Bus driver on two GPIOs with embassy-time based tick clock
//! - Flash storage driver (implements `mbus_hal::FlashStorage`)

#![no_std]

pub mod bus;
pub mod flash;

pub use bus::{BusInput, InputPolarity, Rp2040Bus};
pub use flash::Rp2040FlashStorage;

// Re-export shared traits from mbus-hal for convenience
pub use mbus_hal::{BusDriver, FlashStorage as FlashStorageTrait, StorageKey};
