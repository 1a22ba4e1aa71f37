//! Configuration types
//!
//! Bus timing tolerances, stored in flash as postcard binary data.

#[cfg(feature = "serde")]
pub mod persist;
pub mod timing;

#[cfg(feature = "serde")]
pub use persist::{load_or_init, load_timing, store_timing, TimingLoad};
pub use timing::*;
