//! Inter-task communication
//!
//! The bus link is shared between the bus task (edge, timeout and transmit
//! tick handling) and the controller task (decode and reply). It lives in
//! a critical-section mutex; both sides hold it only for short, non-async
//! sections. Signals wake the other side when there is work.

use core::cell::RefCell;

use embassy_sync::blocking_mutex::raw::CriticalSectionRawMutex;
use embassy_sync::blocking_mutex::Mutex;
use embassy_sync::signal::Signal;

use mbus_core::{BusLink, LinkAccess};
use mbus_hal_rp2040::Rp2040Bus;

/// Link type used by the firmware
pub type Link = BusLink<Rp2040Bus<'static>>;

/// Bus link shared between tasks
pub struct SharedLink(Mutex<CriticalSectionRawMutex, RefCell<Link>>);

impl SharedLink {
    pub fn new(link: Link) -> Self {
        Self(Mutex::new(RefCell::new(link)))
    }
}

impl LinkAccess for SharedLink {
    type Driver = Rp2040Bus<'static>;

    fn with_link<R>(&self, f: impl FnOnce(&mut Link) -> R) -> R {
        self.0.lock(|link| f(&mut link.borrow_mut()))
    }
}

/// A received frame is waiting to be decoded
pub static FRAME_READY: Signal<CriticalSectionRawMutex, ()> = Signal::new();

/// Transmit deadlines changed; the bus task must re-read them
pub static BUS_WAKE: Signal<CriticalSectionRawMutex, ()> = Signal::new();
