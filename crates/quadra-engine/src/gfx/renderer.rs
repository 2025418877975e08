use super::api::BlendMode;
use super::buffer::IndexBuffer;
use super::context::{gfx_call, Context};
use super::shader::ShaderProgram;
use super::vertex_array::VertexArray;

/// Issues clear and indexed draw calls.
///
/// Bindings made by [`draw`](Self::draw) are left in place afterwards; the
/// next bind replaces them.
#[derive(Clone)]
pub struct Renderer {
    ctx: Context,
}

impl Renderer {
    pub fn new(ctx: &Context) -> Self {
        Self { ctx: ctx.clone() }
    }

    /// Color used by subsequent [`clear`](Self::clear) calls.
    pub fn set_clear_color(&self, rgba: [f32; 4]) {
        gfx_call!(self.ctx, api => api.clear_color(rgba));
    }

    pub fn set_blend(&self, mode: BlendMode) {
        gfx_call!(self.ctx, api => api.set_blend(mode));
    }

    /// Clears the color buffer.
    pub fn clear(&self) {
        gfx_call!(self.ctx, api => api.clear());
    }

    /// Binds `shader`, `vertex_array` and `index_buffer`, then draws every
    /// index as a triangle list.
    pub fn draw(&self, vertex_array: &VertexArray, index_buffer: &IndexBuffer, shader: &ShaderProgram) {
        shader.bind();
        vertex_array.bind();
        index_buffer.bind();

        let count = index_buffer.count();
        gfx_call!(self.ctx, api => api.draw_elements(count));
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::gfx::api::BufferTarget;
    use crate::gfx::layout::VertexLayout;
    use crate::gfx::source::ShaderSource;
    use crate::gfx::testing::{spy_context, Call};
    use crate::gfx::VertexBuffer;

    #[test]
    fn draw_binds_everything_then_draws_index_count() {
        let (ctx, spy) = spy_context();
        let vb = VertexBuffer::new(&ctx, &[0.0f32; 8]);
        let ib = IndexBuffer::new(&ctx, &[0, 1, 2, 2, 3, 0]);
        let mut layout = VertexLayout::new();
        layout.push_f32(2);
        let va = VertexArray::new(&ctx);
        va.add_buffer(&vb, &layout);
        let shader = ShaderProgram::new(&ctx, &ShaderSource::parse("#shader vertex\nv\n#shader fragment\nf\n"));

        let renderer = Renderer::new(&ctx);
        let start = spy.borrow().calls.len();
        renderer.draw(&va, &ib, &shader);

        assert_eq!(
            spy.borrow().calls[start..],
            [
                Call::UseProgram(Some(shader.raw().get())),
                Call::BindVertexArray(Some(va.raw().get())),
                Call::BindBuffer(BufferTarget::ElementArray, Some(ib.raw().get())),
                Call::DrawElements(6),
            ]
        );
    }

    #[test]
    fn draw_leaves_bindings_in_place() {
        let (ctx, spy) = spy_context();
        let ib = IndexBuffer::new(&ctx, &[0, 1, 2]);
        let va = VertexArray::new(&ctx);
        let shader = ShaderProgram::new(&ctx, &ShaderSource::default());

        Renderer::new(&ctx).draw(&va, &ib, &shader);

        let spy = spy.borrow();
        assert_eq!(spy.calls.last(), Some(&Call::DrawElements(3)));
        assert_eq!(spy.count(|c| matches!(c, Call::UseProgram(None) | Call::BindVertexArray(None))), 0);
    }

    #[test]
    fn clear_state_reaches_driver() {
        let (ctx, spy) = spy_context();
        let renderer = Renderer::new(&ctx);

        renderer.set_clear_color([0.1, 0.2, 0.3, 1.0]);
        renderer.set_blend(BlendMode::Alpha);
        renderer.clear();

        assert_eq!(
            spy.borrow().calls,
            [Call::ClearColor([0.1, 0.2, 0.3, 1.0]), Call::Blend(BlendMode::Alpha), Call::Clear]
        );
    }
}
