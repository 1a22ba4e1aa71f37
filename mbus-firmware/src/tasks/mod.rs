//! Embassy async tasks
//!
//! Each task runs independently and communicates via the shared link and
//! signals.

pub mod bus;
pub mod controller;
pub mod tick;

pub use bus::bus_task;
pub use controller::controller_task;
pub use tick::tick_task;
