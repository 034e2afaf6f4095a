//! The queue-filling engine: worker lifecycle, fill loop and seek tracking.

pub mod filler;
pub mod seek;
pub mod session;

pub use filler::{QueueFiller, QueueFillerConfig};
pub use seek::SeekState;
