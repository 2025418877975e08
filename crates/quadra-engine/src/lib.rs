//! quadra engine crate.
//!
//! A small immediate-mode renderer: RAII GPU resources over a handle-based
//! driver ([`gfx`]), a wgpu implementation of that driver, and the
//! window/device runtime that drives an [`App`](core::App) once per frame.

pub mod core;
pub mod device;
pub mod gfx;
pub mod logging;
pub mod time;
pub mod window;
