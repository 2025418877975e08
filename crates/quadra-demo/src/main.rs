use std::path::{Path, PathBuf};

use anyhow::Result;
use bytemuck::{Pod, Zeroable};
use glam::{Mat4, Vec3, Vec4};
use winit::event::{ElementState, WindowEvent};
use winit::keyboard::{KeyCode, PhysicalKey};

use quadra_engine::core::{App, AppControl, FrameCtx, StartCtx};
use quadra_engine::device::GpuInit;
use quadra_engine::gfx::{
    BlendMode, IndexBuffer, Renderer, ShaderProgram, Texture, VertexArray, VertexBuffer, VertexLayout,
};
use quadra_engine::logging::{init_logging, LoggingConfig};
use quadra_engine::window::{Runtime, RuntimeConfig};

#[repr(C)]
#[derive(Copy, Clone, Pod, Zeroable)]
struct Vertex {
    position: [f32; 2],
    uv: [f32; 2],
}

const fn vertex(x: f32, y: f32, u: f32, v: f32) -> Vertex {
    Vertex { position: [x, y], uv: [u, v] }
}

/// A 100x100 quad centered on the origin, in pixels.
const QUAD: [Vertex; 4] = [
    vertex(-50.0, -50.0, 0.0, 0.0),
    vertex(50.0, -50.0, 1.0, 0.0),
    vertex(50.0, 50.0, 1.0, 1.0),
    vertex(-50.0, 50.0, 0.0, 1.0),
];

const INDICES: [u32; 6] = [0, 1, 2, 2, 3, 0];

/// Pixels the selected quad moves per arrow key press.
const NUDGE: f32 = 10.0;

struct Quad {
    translation: Vec3,
    tint: Vec4,
}

/// GPU state, created once the device exists.
struct Scene {
    renderer: Renderer,
    vertex_array: VertexArray,
    // The vertex array reads from this buffer; it must stay alive with it.
    _vertices: VertexBuffer,
    indices: IndexBuffer,
    shader: ShaderProgram,
    texture: Texture,
}

struct Demo {
    res: PathBuf,
    quads: [Quad; 2],
    /// Quad moved by the arrow keys.
    selected: usize,
    elapsed: f32,
    scene: Option<Scene>,
}

impl Demo {
    fn new(res: &Path) -> Self {
        Self {
            res: res.to_path_buf(),
            quads: [
                Quad {
                    translation: Vec3::new(200.0, 200.0, 0.0),
                    tint: Vec4::new(1.0, 1.0, 1.0, 1.0),
                },
                Quad {
                    translation: Vec3::new(400.0, 200.0, 0.0),
                    tint: Vec4::new(0.4, 0.8, 1.0, 0.6),
                },
            ],
            selected: 0,
            elapsed: 0.0,
            scene: None,
        }
    }

    /// Escape exits, Tab or 1/2 pick a quad, arrows move the picked quad.
    fn handle_key(&mut self, key: KeyCode) -> AppControl {
        let step = match key {
            KeyCode::Escape => return AppControl::Exit,
            KeyCode::Tab => {
                self.selected = (self.selected + 1) % self.quads.len();
                return AppControl::Continue;
            }
            KeyCode::Digit1 => {
                self.selected = 0;
                return AppControl::Continue;
            }
            KeyCode::Digit2 => {
                self.selected = 1;
                return AppControl::Continue;
            }
            KeyCode::ArrowLeft => Vec3::new(-NUDGE, 0.0, 0.0),
            KeyCode::ArrowRight => Vec3::new(NUDGE, 0.0, 0.0),
            KeyCode::ArrowUp => Vec3::new(0.0, NUDGE, 0.0),
            KeyCode::ArrowDown => Vec3::new(0.0, -NUDGE, 0.0),
            _ => return AppControl::Continue,
        };

        let quad = &mut self.quads[self.selected];
        quad.translation += step;
        log::debug!("quad {} moved to {}", self.selected, quad.translation);
        AppControl::Continue
    }
}

impl App for Demo {
    fn on_start(&mut self, ctx: &mut StartCtx<'_>) -> Result<()> {
        log::info!("rendering on {} ({:?})", ctx.adapter.name, ctx.adapter.backend);

        let vertices = VertexBuffer::new(ctx.gfx, &QUAD);
        let indices = IndexBuffer::new(ctx.gfx, &INDICES);

        let mut layout = VertexLayout::new();
        layout.push_f32(2).push_f32(2);

        let vertex_array = VertexArray::new(ctx.gfx);
        vertex_array.add_buffer(&vertices, &layout);

        let mut shader = ShaderProgram::from_file(ctx.gfx, self.res.join("shaders/basic.shader"));
        anyhow::ensure!(shader.is_linked(), "basic shader failed: {:?}", shader.status());

        let texture = Texture::from_file(ctx.gfx, self.res.join("textures/checker.png"));
        texture.bind(0);

        shader.bind();
        shader.set_uniform_1i("u_Texture", 0);

        let renderer = Renderer::new(ctx.gfx);
        renderer.set_blend(BlendMode::Alpha);

        self.scene = Some(Scene {
            renderer,
            vertex_array,
            _vertices: vertices,
            indices,
            shader,
            texture,
        });
        Ok(())
    }

    fn on_window_event(&mut self, event: &WindowEvent) -> AppControl {
        match event {
            WindowEvent::KeyboardInput { event, .. } if event.state == ElementState::Pressed => match event.physical_key {
                PhysicalKey::Code(key) => self.handle_key(key),
                _ => AppControl::Continue,
            },
            _ => AppControl::Continue,
        }
    }

    fn on_frame(&mut self, ctx: &mut FrameCtx<'_>) -> AppControl {
        let Some(scene) = self.scene.as_mut() else {
            return AppControl::Continue;
        };

        self.elapsed += ctx.time.dt;
        let size = ctx.window.logical_size();
        let projection = Mat4::orthographic_rh(0.0, size.width, 0.0, size.height, -1.0, 1.0);
        let view = Mat4::from_translation(Vec3::new(self.elapsed.sin() * 40.0, 0.0, 0.0));

        scene.renderer.clear();
        scene.texture.bind(0);

        for quad in &self.quads {
            let mvp = projection * view * Mat4::from_translation(quad.translation);
            let [r, g, b, a] = quad.tint.to_array();

            scene.shader.bind();
            scene.shader.set_uniform_mat4("u_MVP", &mvp);
            scene.shader.set_uniform_4f("u_Tint", r, g, b, a);
            scene.renderer.draw(&scene.vertex_array, &scene.indices, &scene.shader);
        }

        AppControl::Continue
    }
}

fn main() -> Result<()> {
    init_logging(LoggingConfig::default());

    let res = Path::new(env!("CARGO_MANIFEST_DIR")).join("res");
    let config = RuntimeConfig {
        title: "quadra".into(),
        clear_color: [0.08, 0.08, 0.1, 1.0],
        ..Default::default()
    };

    Runtime::run(config, GpuInit::default(), Demo::new(&res))
}
