use bytemuck::Pod;

use super::api::BufferTarget;
use super::context::{gfx_call, Context, OwnedHandle};

/// GPU-resident vertex data.
#[derive(Debug)]
pub struct VertexBuffer {
    handle: OwnedHandle,
    size: usize,
}

impl VertexBuffer {
    /// Creates a buffer, binds it and uploads `vertices`.
    pub fn new<T: Pod>(ctx: &Context, vertices: &[T]) -> Self {
        let bytes: &[u8] = bytemuck::cast_slice(vertices);

        let raw = gfx_call!(ctx, api => api.create_buffer());
        let handle = OwnedHandle::new(ctx, raw, "delete_buffer", |api, h| api.delete_buffer(h));
        let buffer = Self { handle, size: bytes.len() };

        buffer.bind();
        gfx_call!(ctx, api => api.buffer_data(BufferTarget::Array, bytes));
        buffer
    }

    pub fn bind(&self) {
        let raw = self.handle.raw();
        gfx_call!(self.handle.ctx(), api => api.bind_buffer(BufferTarget::Array, Some(raw)));
    }

    pub fn unbind(&self) {
        gfx_call!(self.handle.ctx(), api => api.bind_buffer(BufferTarget::Array, None));
    }

    /// Size of the uploaded data in bytes.
    pub fn size(&self) -> usize {
        self.size
    }

    #[cfg(test)]
    pub(crate) fn raw(&self) -> super::api::RawHandle {
        self.handle.raw()
    }
}

/// GPU-resident `u32` index data for indexed triangle draws.
#[derive(Debug)]
pub struct IndexBuffer {
    handle: OwnedHandle,
    count: u32,
}

impl IndexBuffer {
    /// Creates a buffer, binds it and uploads `indices`.
    pub fn new(ctx: &Context, indices: &[u32]) -> Self {
        let raw = gfx_call!(ctx, api => api.create_buffer());
        let handle = OwnedHandle::new(ctx, raw, "delete_buffer", |api, h| api.delete_buffer(h));
        let buffer = Self { handle, count: indices.len() as u32 };

        buffer.bind();
        gfx_call!(ctx, api => api.buffer_data(BufferTarget::ElementArray, bytemuck::cast_slice(indices)));
        buffer
    }

    pub fn bind(&self) {
        let raw = self.handle.raw();
        gfx_call!(self.handle.ctx(), api => api.bind_buffer(BufferTarget::ElementArray, Some(raw)));
    }

    pub fn unbind(&self) {
        gfx_call!(self.handle.ctx(), api => api.bind_buffer(BufferTarget::ElementArray, None));
    }

    /// Number of indices.
    pub fn count(&self) -> u32 {
        self.count
    }

    #[cfg(test)]
    pub(crate) fn raw(&self) -> super::api::RawHandle {
        self.handle.raw()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::gfx::testing::{spy_context, Call};

    #[test]
    fn vertex_upload_binds_then_fills() {
        let (ctx, spy) = spy_context();
        let vb = VertexBuffer::new(&ctx, &[1.0f32, 2.0, 3.0]);
        let id = vb.raw().get();

        let spy = spy.borrow();
        assert_eq!(vb.size(), 12);
        assert_eq!(
            spy.calls,
            [
                Call::CreateBuffer(id),
                Call::BindBuffer(BufferTarget::Array, Some(id)),
                Call::BufferData(BufferTarget::Array, bytemuck::cast_slice::<f32, u8>(&[1.0, 2.0, 3.0]).to_vec()),
            ]
        );
    }

    #[test]
    fn index_buffer_counts_indices() {
        let (ctx, spy) = spy_context();
        let ib = IndexBuffer::new(&ctx, &[0, 1, 2, 2, 3, 0]);

        assert_eq!(ib.count(), 6);
        assert_eq!(
            spy.borrow().count(|c| matches!(c, Call::BufferData(BufferTarget::ElementArray, bytes) if bytes.len() == 24)),
            1
        );
    }

    #[test]
    fn unused_buffers_release_exactly_once() {
        let (ctx, spy) = spy_context();
        let vb = VertexBuffer::new(&ctx, &[0u8; 4]);
        let ib = IndexBuffer::new(&ctx, &[]);
        assert_eq!(spy.borrow().live(), 2);

        drop(vb);
        drop(ib);

        let spy = spy.borrow();
        assert_eq!(spy.allocated(), 2);
        assert_eq!(spy.live(), 0);
        assert_eq!(spy.count(|c| matches!(c, Call::DeleteBuffer(_))), 2);
    }
}
