//! Timing data persistence
//!
//! Loads and saves [`TimingConfig`] through any [`FlashStorage`]. A board
//! that has never stored timings gets the defaults written once.

use mbus_hal::{FlashError, FlashStorage, StorageKey};

use super::timing::{TimingConfig, TimingError, TimingRecord};

/// Maximum serialized timing record size
const MAX_TIMING_SIZE: usize = 64;

/// Where the active timings came from
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
#[cfg_attr(feature = "defmt", derive(defmt::Format))]
pub enum TimingLoad {
    /// Read back from flash
    Stored(TimingConfig),
    /// Flash was empty; defaults were written
    Initialized(TimingConfig),
    /// Flash was empty and writing the defaults failed
    Unsaved(TimingConfig, TimingError),
    /// Stored data was unusable; defaults are in use
    ///
    /// `rewrite` is the outcome of overwriting the bad record. On failure
    /// the next boot finds the same record.
    Recovered {
        config: TimingConfig,
        cause: TimingError,
        rewrite: Result<(), TimingError>,
    },
}

impl TimingLoad {
    /// The timings to run with
    pub fn config(&self) -> TimingConfig {
        match *self {
            TimingLoad::Stored(config)
            | TimingLoad::Initialized(config)
            | TimingLoad::Unsaved(config, _)
            | TimingLoad::Recovered { config, .. } => config,
        }
    }
}

/// Read and validate stored timings
pub async fn load_timing<S: FlashStorage>(storage: &mut S) -> Result<TimingConfig, TimingError> {
    let mut buffer = [0u8; MAX_TIMING_SIZE];
    let len = storage.read(StorageKey::TimingConfig, &mut buffer).await?;

    let record: TimingRecord =
        postcard::from_bytes(&buffer[..len]).map_err(|_| TimingError::Deserialize)?;

    record.into_timing()
}

/// Validate and store timings
pub async fn store_timing<S: FlashStorage>(
    storage: &mut S,
    timing: &TimingConfig,
) -> Result<(), TimingError> {
    timing.validate()?;

    let record = TimingRecord::new(*timing);
    let mut buffer = [0u8; MAX_TIMING_SIZE];
    let bytes = postcard::to_slice(&record, &mut buffer).map_err(|_| TimingError::Serialize)?;

    storage
        .write(StorageKey::TimingConfig, bytes)
        .await
        .map_err(TimingError::Flash)
}

/// Load timings, writing `defaults` when nothing usable is stored
///
/// Never fails: the worst case runs on `defaults` and reports why.
pub async fn load_or_init<S: FlashStorage>(storage: &mut S, defaults: TimingConfig) -> TimingLoad {
    match load_timing(storage).await {
        Ok(config) => TimingLoad::Stored(config),
        Err(TimingError::Flash(FlashError::NotFound)) => {
            match store_timing(storage, &defaults).await {
                Ok(()) => TimingLoad::Initialized(defaults),
                Err(e) => TimingLoad::Unsaved(defaults, e),
            }
        }
        Err(cause) => TimingLoad::Recovered {
            config: defaults,
            cause,
            rewrite: store_timing(storage, &defaults).await,
        },
    }
}
