//! Bus timing persistence
//!
//! Loads the timing tolerances from flash, writing the factory defaults on
//! first boot.

use defmt::*;

use mbus_core::config::{load_or_init, TimingConfig, TimingLoad};
use mbus_hal_rp2040::Rp2040FlashStorage;

include!(concat!(env!("OUT_DIR"), "/timing_defaults.rs"));

/// Load bus timings from flash
///
/// Never fails; unusable stored data is replaced with the factory defaults.
pub async fn load_timing(storage: &mut Rp2040FlashStorage<'_>) -> TimingConfig {
    match load_or_init(storage, FACTORY_TIMING).await {
        TimingLoad::Stored(timing) => {
            info!("Loaded bus timing from flash");
            log_timing(&timing);
            timing
        }
        TimingLoad::Initialized(timing) => {
            info!("No bus timing in flash, stored factory defaults");
            log_timing(&timing);
            timing
        }
        TimingLoad::Unsaved(timing, e) => {
            warn!("Could not store factory bus timing: {:?}", e);
            timing
        }
        TimingLoad::Recovered {
            config,
            cause,
            rewrite,
        } => {
            warn!("Stored bus timing unusable: {:?}, using factory defaults", cause);
            if let Err(e) = rewrite {
                warn!("Rewriting bus timing failed: {:?}", e);
            }
            config
        }
    }
}

fn log_timing(timing: &TimingConfig) {
    debug!(
        "  rx: zero {}-{}, one {}-{}, timeout {} ticks",
        timing.min_zero, timing.max_zero, timing.min_one, timing.max_one, timing.bit_timeout
    );
    debug!(
        "  tx: zero {}, one {}, bit {}, space {} ticks",
        timing.send_zero, timing.send_one, timing.send_bit, timing.send_space
    );
}
