/// One acquired swapchain image plus the encoder recording into it.
///
/// Hand it back to [`Gpu::present`](super::Gpu::present) promptly: while it
/// is alive no other frame can be acquired.
pub struct GpuFrame {
    pub surface_texture: wgpu::SurfaceTexture,
    pub view: wgpu::TextureView,
    pub encoder: wgpu::CommandEncoder,
}
