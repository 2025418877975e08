//! Frame timing.
//!
//! The runtime owns one [`FrameClock`] and ticks it once per presented frame;
//! [`FrameStats`] turns those ticks into the once-per-second FPS report.

mod frame_clock;
mod stats;

pub use frame_clock::{FrameClock, FrameTime};
pub use stats::{FrameReport, FrameStats};
