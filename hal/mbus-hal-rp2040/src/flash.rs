//! Timing record storage in RP2040 flash
//!
//! The last 64KB of flash, which memory.x keeps out of the program image,
//! holds a sequential-storage map. Only the bus timing record lives there.

use embassy_rp::dma::Channel;
use embassy_rp::flash::{Async, Flash, ERASE_SIZE};
use embassy_rp::peripherals::FLASH;
use embassy_rp::Peri;
use sequential_storage::cache::NoCache;
use sequential_storage::map;

pub use mbus_hal::flash::{FlashError, StorageKey};

/// Total flash on the board
pub const FLASH_SIZE: usize = 2 * 1024 * 1024;

/// Map partition at the top of flash; must match memory.x
pub const MAP_SIZE: usize = 64 * 1024;

/// Flash offsets covered by the map
pub const MAP_RANGE: core::ops::Range<u32> = ((FLASH_SIZE - MAP_SIZE) as u32)..(FLASH_SIZE as u32);

/// One map item: key byte, the postcard record and sequential-storage headers
const ITEM_SIZE: usize = 128;

const _: () = assert!(MAP_SIZE % ERASE_SIZE == 0);

/// Flash-backed [`mbus_hal::FlashStorage`]
pub struct Rp2040FlashStorage<'d> {
    flash: Flash<'d, FLASH, Async, FLASH_SIZE>,
    item: [u8; ITEM_SIZE],
}

impl<'d> Rp2040FlashStorage<'d> {
    pub fn new(flash: Peri<'d, FLASH>, dma: Peri<'d, impl Channel>) -> Self {
        Self {
            flash: Flash::new(flash, dma),
            item: [0; ITEM_SIZE],
        }
    }
}

fn storage_error<E>(e: sequential_storage::Error<E>) -> FlashError {
    match e {
        sequential_storage::Error::Storage { .. } => FlashError::Flash,
        sequential_storage::Error::FullStorage => FlashError::Full,
        sequential_storage::Error::Corrupted { .. } => FlashError::Corrupted,
        _ => FlashError::Storage,
    }
}

impl mbus_hal::FlashStorage for Rp2040FlashStorage<'_> {
    async fn read(&mut self, key: StorageKey, buffer: &mut [u8]) -> Result<usize, FlashError> {
        let data = map::fetch_item::<StorageKey, &[u8], _>(
            &mut self.flash,
            MAP_RANGE,
            &mut NoCache::new(),
            &mut self.item,
            &key,
        )
        .await
        .map_err(storage_error)?
        .ok_or(FlashError::NotFound)?;

        let dest = buffer
            .get_mut(..data.len())
            .ok_or(FlashError::BufferTooSmall)?;
        dest.copy_from_slice(data);
        Ok(data.len())
    }

    async fn write(&mut self, key: StorageKey, data: &[u8]) -> Result<(), FlashError> {
        map::store_item(
            &mut self.flash,
            MAP_RANGE,
            &mut NoCache::new(),
            &mut self.item,
            &key,
            &data,
        )
        .await
        .map_err(storage_error)
    }
}
