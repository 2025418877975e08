//! Window + runtime loop.
//!
//! Owns the `winit` event loop and the single application window, and wires
//! them to the device and the app callbacks.

mod runtime;

pub use runtime::{Runtime, RuntimeConfig};
