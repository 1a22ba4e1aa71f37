//! Configuration loading
//!
//! Bus timings come from flash, falling back to the factory defaults built
//! from timing.toml.

pub mod timing;

pub use timing::load_timing;
