//! [`GraphicsApi`] on top of wgpu.
//!
//! wgpu has no bind points or current program, so the emulated driver state
//! lives in [`DriverState`]:
//! - buffers, vertex arrays, textures and programs live in handle tables
//! - shaders are WGSL; compiling runs naga for diagnostics and reflection
//! - uniforms are CPU shadow copies, snapshotted into uniform buffers per draw
//!
//! This module attaches wgpu objects to those handles and builds pipelines
//! lazily on first draw. Draws and clears record render passes into the
//! frame opened by [`WgpuApi::begin_frame`].

mod pipeline;
mod reflect;
mod state;

use std::collections::HashMap;
use std::rc::Rc;
use std::sync::{Arc, Mutex, PoisonError};

use wgpu::util::DeviceExt;
use winit::dpi::PhysicalSize;

use crate::device::{Gpu, GpuFrame, SurfaceErrorAction};

use super::api::{
    AttribPointer, BlendMode, BufferTarget, DriverError, GraphicsApi, RawHandle, ShaderStage, TextureParam,
    UniformLocation, UniformValue,
};
use pipeline::{PipelineCache, PipelineKey, ProgramStages, VertexStream};
use reflect::Resource;
use state::{invalid_op, Binding, DriverState, GpuObjects, SamplerParams};

const TEXTURE_FORMAT: wgpu::TextureFormat = wgpu::TextureFormat::Rgba8Unorm;

/// Sampled where a texture variable's unit has nothing usable bound.
const FALLBACK_TEXEL: [u8; 4] = [0, 0, 0, 255];

struct TextureImage {
    _texture: wgpu::Texture,
    view: Rc<wgpu::TextureView>,
}

/// wgpu objects carried by driver handles.
struct Wgpu;

impl GpuObjects for Wgpu {
    type Buffer = Rc<wgpu::Buffer>;
    type Module = wgpu::ShaderModule;
    type Image = TextureImage;
}

struct CachedPipeline {
    pipeline: wgpu::RenderPipeline,
    streams: Vec<VertexStream>,
}

/// A resource resolved for one draw's bind group.
enum Bound {
    Buffer(wgpu::Buffer),
    View(Rc<wgpu::TextureView>),
    Sampler(Rc<wgpu::Sampler>),
}

impl Bound {
    fn resource(&self) -> wgpu::BindingResource<'_> {
        match self {
            Bound::Buffer(buffer) => buffer.as_entire_binding(),
            Bound::View(view) => wgpu::BindingResource::TextureView(view.as_ref()),
            Bound::Sampler(sampler) => wgpu::BindingResource::Sampler(sampler.as_ref()),
        }
    }
}

/// Graphics driver backed by a wgpu device.
pub struct WgpuApi {
    gpu: Gpu,
    frame: Option<GpuFrame>,
    state: DriverState<Wgpu>,
    /// Filled by the device's uncaptured-error callback.
    backend_errors: Arc<Mutex<Vec<String>>>,

    samplers: HashMap<SamplerParams, Rc<wgpu::Sampler>>,
    fallback: TextureImage,
    pipelines: PipelineCache<CachedPipeline>,
}

impl WgpuApi {
    pub fn new(gpu: Gpu) -> Self {
        let backend_errors = Arc::new(Mutex::new(Vec::new()));
        let sink = Arc::clone(&backend_errors);
        gpu.device().on_uncaptured_error(Arc::new(move |error: wgpu::Error| {
            sink.lock().unwrap_or_else(PoisonError::into_inner).push(error.to_string());
        }));

        let fallback = create_image(&gpu, 1, 1, Some(&FALLBACK_TEXEL));

        Self {
            gpu,
            frame: None,
            state: DriverState::default(),
            backend_errors,
            samplers: HashMap::new(),
            fallback,
            pipelines: PipelineCache::default(),
        }
    }

    pub fn gpu(&self) -> &Gpu {
        &self.gpu
    }

    pub fn resize(&mut self, size: PhysicalSize<u32>) {
        self.gpu.resize(size);
    }

    /// Acquires the swapchain image that clears and draws render into.
    pub fn begin_frame(&mut self) -> Result<(), SurfaceErrorAction> {
        if let Some(stale) = self.frame.take() {
            log::warn!("previous frame was never ended; presenting it now");
            self.gpu.present(stale);
        }

        match self.gpu.acquire() {
            Ok(frame) => {
                self.frame = Some(frame);
                Ok(())
            }
            Err(err) => Err(self.gpu.handle_surface_error(&err)),
        }
    }

    /// Submits the frame's passes and presents it (the buffer swap).
    pub fn end_frame(&mut self) {
        if let Some(frame) = self.frame.take() {
            self.gpu.present(frame);
        }
    }

    fn draw(&mut self, count: u32) -> Result<(), DriverError> {
        let frame = self.frame.as_mut().ok_or_else(|| invalid_op("draw outside of a frame"))?;
        let call = self.state.draw_call(count)?;

        let key = PipelineKey {
            program: call.program,
            program_revision: call.program_revision,
            vertex_array: call.vertex_array,
            vertex_array_revision: call.vertex_array_revision,
            blend: self.state.blend(),
            format: self.gpu.surface_format(),
        };
        let cached = match self.pipelines.get(&key) {
            Some(cached) => cached,
            None => {
                let streams =
                    pipeline::vertex_streams(call.attributes.enabled_attributes()).map_err(DriverError::InvalidOperation)?;
                let stages = ProgramStages {
                    vertex: &call.linked.vertex.module,
                    vertex_entry: &call.linked.vertex.info.entry_point,
                    fragment: &call.linked.fragment.module,
                    fragment_entry: &call.linked.fragment.info.entry_point,
                };

                log::debug!(
                    "building pipeline: program {}, vertex array {}, blend {:?}",
                    key.program,
                    key.vertex_array,
                    key.blend
                );
                let pipeline = pipeline::build(self.gpu.device(), &stages, &streams, key.blend, key.format);
                self.pipelines.insert(key, CachedPipeline { pipeline, streams })
            }
        };

        let bind_groups = bind_groups(
            self.gpu.device(),
            &mut self.samplers,
            &self.fallback,
            &self.state.bindings(call.linked),
            &cached.pipeline,
        );
        let vertex_buffers = cached
            .streams
            .iter()
            .map(|stream| {
                self.state
                    .vertex_buffer(stream.buffer)
                    .ok_or_else(|| invalid_op(format!("vertex buffer {} has no data", stream.buffer)))
            })
            .collect::<Result<Vec<_>, _>>()?;

        let mut pass = begin_pass(&mut frame.encoder, &frame.view, wgpu::LoadOp::Load, "quadra draw");
        pass.set_pipeline(&cached.pipeline);
        for (index, group) in (0u32..).zip(&bind_groups) {
            pass.set_bind_group(index, group, &[]);
        }
        for (slot, buffer) in (0u32..).zip(&vertex_buffers) {
            pass.set_vertex_buffer(slot, buffer.slice(..));
        }
        pass.set_index_buffer(call.indices.slice(..), wgpu::IndexFormat::Uint32);
        pass.draw_indexed(0..count, 0, 0..1);

        Ok(())
    }
}

/// Snapshots a draw's bindings into one bind group per group index the
/// pipeline layout has.
fn bind_groups(
    device: &wgpu::Device,
    samplers: &mut HashMap<SamplerParams, Rc<wgpu::Sampler>>,
    fallback: &TextureImage,
    bindings: &[(&Resource, Binding<'_, TextureImage>)],
    pipeline: &wgpu::RenderPipeline,
) -> Vec<wgpu::BindGroup> {
    let Some(last_group) = bindings.iter().map(|(res, _)| res.group).max() else {
        return Vec::new();
    };

    let resolved: Vec<(&Resource, Bound)> = bindings
        .iter()
        .map(|(res, binding)| {
            let bound = match binding {
                Binding::Buffer(shadow) => Bound::Buffer(device.create_buffer_init(&wgpu::util::BufferInitDescriptor {
                    label: Some(res.name.as_str()),
                    contents: shadow,
                    usage: wgpu::BufferUsages::UNIFORM,
                })),
                Binding::Image(image) => Bound::View(Rc::clone(&image.unwrap_or(fallback).view)),
                Binding::Sampler(params) => {
                    let sampler = samplers
                        .entry(*params)
                        .or_insert_with(|| Rc::new(device.create_sampler(&params.descriptor())));
                    Bound::Sampler(Rc::clone(sampler))
                }
            };
            (*res, bound)
        })
        .collect();

    (0..=last_group)
        .map(|group| {
            let layout = pipeline.get_bind_group_layout(group);
            let entries: Vec<wgpu::BindGroupEntry<'_>> = resolved
                .iter()
                .filter(|(res, _)| res.group == group)
                .map(|(res, bound)| wgpu::BindGroupEntry { binding: res.binding, resource: bound.resource() })
                .collect();

            device.create_bind_group(&wgpu::BindGroupDescriptor {
                label: Some("quadra bind group"),
                layout: &layout,
                entries: &entries,
            })
        })
        .collect()
}

fn begin_pass<'e>(
    encoder: &'e mut wgpu::CommandEncoder,
    view: &wgpu::TextureView,
    load: wgpu::LoadOp<wgpu::Color>,
    label: &str,
) -> wgpu::RenderPass<'e> {
    encoder.begin_render_pass(&wgpu::RenderPassDescriptor {
        label: Some(label),
        color_attachments: &[Some(wgpu::RenderPassColorAttachment {
            view,
            resolve_target: None,
            ops: wgpu::Operations {
                load,
                store: wgpu::StoreOp::Store,
            },
            depth_slice: None,
        })],
        depth_stencil_attachment: None,
        timestamp_writes: None,
        occlusion_query_set: None,
        multiview_mask: None,
    })
}

fn create_image(gpu: &Gpu, width: u32, height: u32, pixels: Option<&[u8]>) -> TextureImage {
    let size = wgpu::Extent3d {
        width,
        height,
        depth_or_array_layers: 1,
    };

    let texture = gpu.device().create_texture(&wgpu::TextureDescriptor {
        label: Some("quadra texture"),
        size,
        mip_level_count: 1,
        sample_count: 1,
        dimension: wgpu::TextureDimension::D2,
        format: TEXTURE_FORMAT,
        usage: wgpu::TextureUsages::TEXTURE_BINDING | wgpu::TextureUsages::COPY_DST,
        view_formats: &[],
    });

    if let Some(pixels) = pixels {
        gpu.queue().write_texture(
            wgpu::TexelCopyTextureInfo {
                texture: &texture,
                mip_level: 0,
                origin: wgpu::Origin3d::ZERO,
                aspect: wgpu::TextureAspect::All,
            },
            pixels,
            wgpu::TexelCopyBufferLayout {
                offset: 0,
                bytes_per_row: Some(4 * width),
                rows_per_image: Some(height),
            },
            size,
        );
    }

    let view = texture.create_view(&wgpu::TextureViewDescriptor::default());
    TextureImage {
        _texture: texture,
        view: Rc::new(view),
    }
}

impl GraphicsApi for WgpuApi {
    // ── buffers ───────────────────────────────────────────────────────────

    fn create_buffer(&mut self) -> RawHandle {
        self.state.create_buffer()
    }

    fn bind_buffer(&mut self, target: BufferTarget, buffer: Option<RawHandle>) {
        self.state.bind_buffer(target, buffer);
    }

    fn buffer_data(&mut self, target: BufferTarget, data: &[u8]) {
        let device = self.gpu.device();
        self.state.buffer_data(target, data, |data| {
            Rc::new(device.create_buffer_init(&wgpu::util::BufferInitDescriptor {
                label: Some("quadra buffer"),
                contents: data,
                usage: wgpu::BufferUsages::VERTEX | wgpu::BufferUsages::INDEX | wgpu::BufferUsages::COPY_DST,
            }))
        });
    }

    fn delete_buffer(&mut self, buffer: RawHandle) {
        self.state.delete_buffer(buffer);
    }

    // ── vertex arrays ─────────────────────────────────────────────────────

    fn create_vertex_array(&mut self) -> RawHandle {
        self.state.create_vertex_array()
    }

    fn bind_vertex_array(&mut self, vertex_array: Option<RawHandle>) {
        self.state.bind_vertex_array(vertex_array);
    }

    fn vertex_attrib_pointer(&mut self, index: u32, pointer: AttribPointer) {
        self.state.vertex_attrib_pointer(index, pointer);
    }

    fn enable_vertex_attrib(&mut self, index: u32) {
        self.state.enable_vertex_attrib(index);
    }

    fn delete_vertex_array(&mut self, vertex_array: RawHandle) {
        if self.state.delete_vertex_array(vertex_array) {
            self.pipelines.forget_vertex_array(vertex_array);
        }
    }

    // ── shaders & programs ────────────────────────────────────────────────

    fn create_shader(&mut self, stage: ShaderStage) -> RawHandle {
        self.state.create_shader(stage)
    }

    fn shader_source(&mut self, shader: RawHandle, source: &str) {
        self.state.shader_source(shader, source);
    }

    fn compile_shader(&mut self, shader: RawHandle) {
        let device = self.gpu.device();
        self.state.compile_shader(shader, |stage, source| {
            let label = format!("quadra {stage} shader {shader}");
            device.create_shader_module(wgpu::ShaderModuleDescriptor {
                label: Some(&label),
                source: wgpu::ShaderSource::Wgsl(source.into()),
            })
        });
    }

    fn shader_compile_status(&mut self, shader: RawHandle) -> bool {
        self.state.shader_compile_status(shader)
    }

    fn shader_info_log(&mut self, shader: RawHandle) -> String {
        self.state.shader_info_log(shader)
    }

    fn delete_shader(&mut self, shader: RawHandle) {
        self.state.delete_shader(shader);
    }

    fn create_program(&mut self) -> RawHandle {
        self.state.create_program()
    }

    fn attach_shader(&mut self, program: RawHandle, shader: RawHandle) {
        self.state.attach_shader(program, shader);
    }

    fn link_program(&mut self, program: RawHandle) {
        if self.state.link_program(program) {
            self.pipelines.forget_program(program);
        }
    }

    fn validate_program(&mut self, program: RawHandle) {
        self.state.validate_program(program);
    }

    fn program_link_status(&mut self, program: RawHandle) -> bool {
        self.state.program_link_status(program)
    }

    fn program_info_log(&mut self, program: RawHandle) -> String {
        self.state.program_info_log(program)
    }

    fn use_program(&mut self, program: Option<RawHandle>) {
        self.state.use_program(program);
    }

    fn delete_program(&mut self, program: RawHandle) {
        if self.state.delete_program(program) {
            self.pipelines.forget_program(program);
        }
    }

    fn uniform_location(&mut self, program: RawHandle, name: &str) -> Option<UniformLocation> {
        self.state.uniform_location(program, name)
    }

    fn set_uniform(&mut self, location: UniformLocation, value: UniformValue) {
        self.state.set_uniform(location, value);
    }

    // ── textures ──────────────────────────────────────────────────────────

    fn create_texture(&mut self) -> RawHandle {
        self.state.create_texture()
    }

    fn active_texture(&mut self, unit: u32) {
        self.state.active_texture(unit);
    }

    fn bind_texture(&mut self, texture: Option<RawHandle>) {
        self.state.bind_texture(texture);
    }

    fn texture_parameter(&mut self, param: TextureParam) {
        self.state.texture_parameter(param);
    }

    fn texture_image_2d(&mut self, width: u32, height: u32, pixels: Option<&[u8]>) {
        let gpu = &self.gpu;
        self.state
            .texture_image_2d(width, height, pixels, |width, height, pixels| create_image(gpu, width, height, pixels));
    }

    fn delete_texture(&mut self, texture: RawHandle) {
        self.state.delete_texture(texture);
    }

    // ── drawing ───────────────────────────────────────────────────────────

    fn clear_color(&mut self, rgba: [f32; 4]) {
        self.state.set_clear_color(rgba);
    }

    fn clear(&mut self) {
        let Some(frame) = self.frame.as_mut() else {
            self.state.fail(invalid_op("clear outside of a frame"));
            return;
        };
        let [r, g, b, a] = self.state.clear_color().map(f64::from);
        let _pass = begin_pass(
            &mut frame.encoder,
            &frame.view,
            wgpu::LoadOp::Clear(wgpu::Color { r, g, b, a }),
            "quadra clear",
        );
    }

    fn set_blend(&mut self, mode: BlendMode) {
        self.state.set_blend(mode);
    }

    fn draw_elements(&mut self, count: u32) {
        if count == 0 {
            return;
        }
        if let Err(err) = self.draw(count) {
            self.state.fail(err);
        }
    }

    fn take_error(&mut self) -> Option<DriverError> {
        if let Some(err) = self.state.take_error() {
            return Some(err);
        }

        let mut pending = self.backend_errors.lock().unwrap_or_else(PoisonError::into_inner);
        (!pending.is_empty()).then(|| DriverError::Backend(pending.remove(0)))
    }
}
