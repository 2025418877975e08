use winit::event::WindowEvent;

use super::ctx::{FrameCtx, StartCtx};

/// Control directive returned by app callbacks.
#[derive(Debug, Copy, Clone, Eq, PartialEq)]
pub enum AppControl {
    Continue,
    Exit,
}

/// Application driven by [`Runtime`](crate::window::Runtime).
///
/// GPU resources are created in [`on_start`](Self::on_start), once the
/// window and device exist, and live in the app until it is dropped.
pub trait App {
    /// Called once before the first frame. An error stops the runtime and is
    /// returned from [`Runtime::run`](crate::window::Runtime::run).
    fn on_start(&mut self, ctx: &mut StartCtx<'_>) -> anyhow::Result<()>;

    /// Raw window events, before the runtime reacts to them.
    fn on_window_event(&mut self, event: &WindowEvent) -> AppControl {
        let _ = event;
        AppControl::Continue
    }

    /// Called once per frame, between acquiring and presenting the surface.
    fn on_frame(&mut self, ctx: &mut FrameCtx<'_>) -> AppControl;
}
