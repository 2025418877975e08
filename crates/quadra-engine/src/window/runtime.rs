use std::cell::RefCell;
use std::rc::Rc;
use std::sync::Arc;

use anyhow::{Context as _, Result};
use winit::application::ApplicationHandler;
use winit::dpi::{LogicalSize, PhysicalSize};
use winit::event::WindowEvent;
use winit::event_loop::{ActiveEventLoop, ControlFlow, EventLoop};
use winit::window::{Window, WindowId};

use crate::core::{App, AppControl, FrameCtx, StartCtx, WindowCtx};
use crate::device::{Gpu, GpuInit, SurfaceErrorAction};
use crate::gfx::{Context, Renderer, WgpuApi};
use crate::time::{FrameClock, FrameStats};

/// Window/runtime configuration.
#[derive(Debug, Clone)]
pub struct RuntimeConfig {
    pub title: String,
    pub initial_size: LogicalSize<f64>,
    /// Color the driver clears to until the app sets its own.
    pub clear_color: [f32; 4],
    /// Append the once-per-second frame rate report to the title.
    pub stats_in_title: bool,
}

impl Default for RuntimeConfig {
    fn default() -> Self {
        Self {
            title: "quadra".to_string(),
            initial_size: LogicalSize::new(960.0, 540.0),
            clear_color: [0.0, 0.0, 0.0, 1.0],
            stats_in_title: true,
        }
    }
}

impl RuntimeConfig {
    /// Driver state set up before the app starts.
    fn apply(&self, gfx: &Context) {
        Renderer::new(gfx).set_clear_color(self.clear_color);
    }
}

/// Entry point: opens the window, creates the device, then drives `app`
/// until the window closes or the app asks to exit.
pub struct Runtime;

impl Runtime {
    pub fn run<A>(config: RuntimeConfig, gpu_init: GpuInit, app: A) -> Result<()>
    where
        A: App + 'static,
    {
        let event_loop = EventLoop::new().context("failed to create winit EventLoop")?;
        let mut state = AppState::new(config, gpu_init, app);

        event_loop
            .run_app(&mut state)
            .context("winit event loop terminated with error")?;

        match state.failure.take() {
            Some(err) => Err(err),
            None => Ok(()),
        }
    }
}

/// Window and device, present between a successful start and exit.
struct Live {
    window: Arc<Window>,
    api: Rc<RefCell<WgpuApi>>,
    gfx: Context,
    clock: FrameClock,
    stats: FrameStats,
}

impl Live {
    fn start(event_loop: &ActiveEventLoop, config: &RuntimeConfig, gpu_init: GpuInit) -> Result<Self> {
        let attrs = Window::default_attributes()
            .with_title(config.title.clone())
            .with_inner_size(config.initial_size);

        let window = Arc::new(event_loop.create_window(attrs).context("failed to create window")?);

        let gpu = pollster::block_on(Gpu::new(Arc::clone(&window), gpu_init))
            .context("GPU initialization failed")?;

        let api = Rc::new(RefCell::new(WgpuApi::new(gpu)));
        let gfx = Context::from_shared(api.clone());

        Ok(Self {
            window,
            api,
            gfx,
            clock: FrameClock::new(),
            stats: FrameStats::default(),
        })
    }

    fn resize(&self, size: PhysicalSize<u32>) {
        self.api.borrow_mut().resize(size);
        self.window.request_redraw();
    }
}

struct AppState<A>
where
    A: App + 'static,
{
    config: RuntimeConfig,
    gpu_init: GpuInit,
    app: A,

    live: Option<Live>,
    exit_requested: bool,
    failure: Option<anyhow::Error>,
}

impl<A> AppState<A>
where
    A: App + 'static,
{
    fn new(config: RuntimeConfig, gpu_init: GpuInit, app: A) -> Self {
        Self {
            config,
            gpu_init,
            app,
            live: None,
            exit_requested: false,
            failure: None,
        }
    }

    fn request_exit(&mut self, event_loop: &ActiveEventLoop) {
        self.exit_requested = true;
        event_loop.exit();
    }

    fn fail(&mut self, event_loop: &ActiveEventLoop, err: anyhow::Error) {
        log::error!("{err:#}");
        self.failure = Some(err);
        self.request_exit(event_loop);
    }

    fn start(&mut self, event_loop: &ActiveEventLoop) -> Result<()> {
        let live = Live::start(event_loop, &self.config, self.gpu_init.clone())?;

        self.config.apply(&live.gfx);

        let adapter = live.api.borrow().gpu().adapter_info();
        let mut ctx = StartCtx {
            gfx: &live.gfx,
            window: WindowCtx { window: &live.window },
            adapter: &adapter,
        };
        self.app.on_start(&mut ctx).context("application start-up failed")?;

        live.window.request_redraw();
        self.live = Some(live);
        Ok(())
    }

    /// One iteration of acquire -> app frame -> present.
    fn redraw(&mut self, event_loop: &ActiveEventLoop) {
        let Some(live) = self.live.as_mut() else {
            return;
        };

        let size = live.window.inner_size();
        if size.width == 0 || size.height == 0 {
            return;
        }

        let begun = live.api.borrow_mut().begin_frame();
        match begun {
            Ok(()) => {}
            Err(SurfaceErrorAction::Fatal) => {
                self.fail(event_loop, anyhow::anyhow!("surface is unusable"));
                return;
            }
            Err(_) => {
                live.window.request_redraw();
                return;
            }
        }

        let time = live.clock.tick();
        if let Some(report) = live.stats.record(&time) {
            log::debug!("{report}");
            if self.config.stats_in_title {
                live.window.set_title(&format!("{} | {report}", self.config.title));
            }
        }

        let control = {
            let mut ctx = FrameCtx {
                gfx: &live.gfx,
                window: WindowCtx { window: &live.window },
                time,
                stats: live.stats.latest(),
            };
            self.app.on_frame(&mut ctx)
        };

        live.window.pre_present_notify();
        live.api.borrow_mut().end_frame();

        if control == AppControl::Exit {
            self.request_exit(event_loop);
        }
    }
}

impl<A> ApplicationHandler for AppState<A>
where
    A: App + 'static,
{
    fn resumed(&mut self, event_loop: &ActiveEventLoop) {
        if self.live.is_some() || self.exit_requested {
            return;
        }

        if let Err(err) = self.start(event_loop) {
            self.fail(event_loop, err);
        }
    }

    fn about_to_wait(&mut self, event_loop: &ActiveEventLoop) {
        if self.exit_requested {
            event_loop.exit();
            return;
        }

        // Continuous redraw: one frame per display refresh under Fifo.
        event_loop.set_control_flow(ControlFlow::Wait);
        if let Some(live) = &self.live {
            live.window.request_redraw();
        }
    }

    fn window_event(&mut self, event_loop: &ActiveEventLoop, _window_id: WindowId, event: WindowEvent) {
        if self.exit_requested {
            event_loop.exit();
            return;
        }

        if self.app.on_window_event(&event) == AppControl::Exit {
            self.request_exit(event_loop);
            return;
        }

        match event {
            WindowEvent::CloseRequested => self.request_exit(event_loop),

            WindowEvent::Resized(new_size) => {
                if let Some(live) = &self.live {
                    live.resize(new_size);
                }
            }

            WindowEvent::ScaleFactorChanged { .. } => {
                if let Some(live) = &self.live {
                    live.resize(live.window.inner_size());
                }
            }

            WindowEvent::Occluded(false) => {
                if let Some(live) = self.live.as_mut() {
                    live.clock.reset();
                }
            }

            WindowEvent::RedrawRequested => self.redraw(event_loop),

            _ => {}
        }
    }
}
