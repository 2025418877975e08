use winit::dpi::{LogicalSize, PhysicalSize};
use winit::window::Window;

use crate::gfx::Context;
use crate::time::{FrameReport, FrameTime};

/// Borrowed view of the application window.
#[derive(Copy, Clone)]
pub struct WindowCtx<'a> {
    pub window: &'a Window,
}

impl WindowCtx<'_> {
    /// Drawable size in physical pixels.
    pub fn physical_size(&self) -> PhysicalSize<u32> {
        self.window.inner_size()
    }

    pub fn logical_size(&self) -> LogicalSize<f32> {
        self.window.inner_size().to_logical(self.window.scale_factor())
    }

    pub fn set_title(&self, title: &str) {
        self.window.set_title(title);
    }
}

/// Passed to [`App::on_start`](super::App::on_start).
pub struct StartCtx<'a> {
    /// Graphics context every resource is created from.
    pub gfx: &'a Context,
    pub window: WindowCtx<'a>,
    pub adapter: &'a wgpu::AdapterInfo,
}

/// Passed to [`App::on_frame`](super::App::on_frame).
///
/// Clears and draws issued through `gfx` land in the frame being built; the
/// runtime presents it after the callback returns.
pub struct FrameCtx<'a> {
    pub gfx: &'a Context,
    pub window: WindowCtx<'a>,
    pub time: FrameTime,
    /// Latest once-per-interval frame rate report.
    pub stats: Option<FrameReport>,
}
