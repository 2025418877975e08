use super::api::AttribPointer;
use super::buffer::VertexBuffer;
use super::context::{gfx_call, Context, OwnedHandle};
use super::layout::VertexLayout;

/// Binds vertex buffers to shader input slots according to a layout.
#[derive(Debug)]
pub struct VertexArray {
    handle: OwnedHandle,
}

impl VertexArray {
    pub fn new(ctx: &Context) -> Self {
        let raw = gfx_call!(ctx, api => api.create_vertex_array());
        Self {
            handle: OwnedHandle::new(ctx, raw, "delete_vertex_array", |api, h| {
                api.delete_vertex_array(h)
            }),
        }
    }

    /// Wires every attribute of `layout` to `buffer`.
    ///
    /// Attribute `i` of the layout lands in shader input slot `i`.
    pub fn add_buffer(&self, buffer: &VertexBuffer, layout: &VertexLayout) {
        self.bind();
        buffer.bind();

        let ctx = self.handle.ctx();
        let stride = layout.stride();
        let mut offset = 0u32;

        for (slot, attr) in (0u32..).zip(layout.attributes()) {
            let pointer = AttribPointer {
                count: attr.count,
                kind: attr.kind,
                normalized: attr.normalized,
                stride,
                offset,
            };

            gfx_call!(ctx, api => api.vertex_attrib_pointer(slot, pointer));
            gfx_call!(ctx, api => api.enable_vertex_attrib(slot));

            offset += attr.count * attr.kind.size_bytes();
        }

        debug_assert_eq!(offset, stride, "attribute offsets disagree with layout stride");
    }

    pub fn bind(&self) {
        let raw = self.handle.raw();
        gfx_call!(self.handle.ctx(), api => api.bind_vertex_array(Some(raw)));
    }

    pub fn unbind(&self) {
        gfx_call!(self.handle.ctx(), api => api.bind_vertex_array(None));
    }

    #[cfg(test)]
    pub(crate) fn raw(&self) -> super::api::RawHandle {
        self.handle.raw()
    }
}
