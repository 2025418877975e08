//! Application contract.
//!
//! The runtime owns the window, the device and the frame loop; apps only see
//! the contexts defined here.

mod app;
mod ctx;

pub use app::{App, AppControl};
pub use ctx::{FrameCtx, StartCtx, WindowCtx};
