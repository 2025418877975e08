//! Render pipeline assembly from emulated vertex-array and program state.

use std::collections::{BTreeMap, BTreeSet, HashMap};
use std::rc::Rc;

use crate::gfx::api::{AttribPointer, BlendMode, RawHandle};
use crate::gfx::layout::ScalarKind;

/// Everything a cached pipeline depends on.
#[derive(Debug, Copy, Clone, PartialEq, Eq, Hash)]
pub(crate) struct PipelineKey {
    pub program: RawHandle,
    pub program_revision: u64,
    pub vertex_array: RawHandle,
    pub vertex_array_revision: u64,
    pub blend: BlendMode,
    pub format: wgpu::TextureFormat,
}

impl PipelineKey {
    /// Same program and vertex array, built from a different revision of
    /// either.
    fn is_stale_for(&self, newer: &PipelineKey) -> bool {
        self.program == newer.program
            && self.vertex_array == newer.vertex_array
            && (self.program_revision != newer.program_revision
                || self.vertex_array_revision != newer.vertex_array_revision)
    }
}

/// Built pipelines by key. Only the latest revision of each
/// (program, vertex array) pair is kept.
pub(crate) struct PipelineCache<P> {
    entries: HashMap<PipelineKey, Rc<P>>,
}

impl<P> Default for PipelineCache<P> {
    fn default() -> Self {
        Self { entries: HashMap::new() }
    }
}

impl<P> PipelineCache<P> {
    pub(crate) fn get(&self, key: &PipelineKey) -> Option<Rc<P>> {
        self.entries.get(key).map(Rc::clone)
    }

    pub(crate) fn insert(&mut self, key: PipelineKey, pipeline: P) -> Rc<P> {
        self.entries.retain(|cached, _| !cached.is_stale_for(&key));
        let pipeline = Rc::new(pipeline);
        self.entries.insert(key, Rc::clone(&pipeline));
        pipeline
    }

    pub(crate) fn forget_program(&mut self, program: RawHandle) {
        self.entries.retain(|key, _| key.program != program);
    }

    pub(crate) fn forget_vertex_array(&mut self, vertex_array: RawHandle) {
        self.entries.retain(|key, _| key.vertex_array != vertex_array);
    }

    #[cfg(test)]
    fn len(&self) -> usize {
        self.entries.len()
    }
}

/// Attributes read from one buffer with one stride: a single wgpu vertex
/// buffer slot.
#[derive(Debug, Clone, PartialEq)]
pub(crate) struct VertexStream {
    pub buffer: RawHandle,
    pub stride: u32,
    pub attributes: Vec<wgpu::VertexAttribute>,
}

impl VertexStream {
    pub(crate) fn layout(&self) -> wgpu::VertexBufferLayout<'_> {
        wgpu::VertexBufferLayout {
            array_stride: self.stride as u64,
            step_mode: wgpu::VertexStepMode::Vertex,
            attributes: &self.attributes,
        }
    }
}

/// wgpu format for an attribute pointer, if one exists.
pub(crate) fn vertex_format(pointer: &AttribPointer) -> Option<wgpu::VertexFormat> {
    use wgpu::VertexFormat as F;

    let format = match (pointer.kind, pointer.normalized, pointer.count) {
        (ScalarKind::Float, _, 1) => F::Float32,
        (ScalarKind::Float, _, 2) => F::Float32x2,
        (ScalarKind::Float, _, 3) => F::Float32x3,
        (ScalarKind::Float, _, 4) => F::Float32x4,

        (ScalarKind::UInt32, false, 1) => F::Uint32,
        (ScalarKind::UInt32, false, 2) => F::Uint32x2,
        (ScalarKind::UInt32, false, 3) => F::Uint32x3,
        (ScalarKind::UInt32, false, 4) => F::Uint32x4,

        (ScalarKind::UByte, true, 1) => F::Unorm8,
        (ScalarKind::UByte, true, 2) => F::Unorm8x2,
        (ScalarKind::UByte, true, 4) => F::Unorm8x4,
        (ScalarKind::UByte, false, 1) => F::Uint8,
        (ScalarKind::UByte, false, 2) => F::Uint8x2,
        (ScalarKind::UByte, false, 4) => F::Uint8x4,

        _ => return None,
    };
    Some(format)
}

/// Groups enabled attributes into vertex streams, in slot order of first
/// appearance.
pub(crate) fn vertex_streams<'a>(
    attributes: impl IntoIterator<Item = (u32, &'a AttribPointer, RawHandle)>,
) -> Result<Vec<VertexStream>, String> {
    let mut streams: Vec<VertexStream> = Vec::new();

    for (slot, pointer, buffer) in attributes {
        let format = vertex_format(pointer).ok_or_else(|| {
            format!(
                "slot {slot}: {} x {:?} (normalized: {}) has no vertex format",
                pointer.count, pointer.kind, pointer.normalized
            )
        })?;

        if pointer.offset as u64 + format.size() > pointer.stride as u64 {
            return Err(format!(
                "slot {slot}: offset {} does not fit in stride {}",
                pointer.offset, pointer.stride
            ));
        }

        let attribute = wgpu::VertexAttribute {
            format,
            offset: pointer.offset as u64,
            shader_location: slot,
        };

        match streams
            .iter_mut()
            .find(|s| s.buffer == buffer && s.stride == pointer.stride)
        {
            Some(stream) => stream.attributes.push(attribute),
            None => streams.push(VertexStream {
                buffer,
                stride: pointer.stride,
                attributes: vec![attribute],
            }),
        }
    }

    Ok(streams)
}

/// Enabled attributes of a vertex array, ascending by slot.
pub(crate) fn enabled_attributes<'a>(
    pointers: &'a BTreeMap<u32, (AttribPointer, RawHandle)>,
    enabled: &'a BTreeSet<u32>,
) -> impl Iterator<Item = (u32, &'a AttribPointer, RawHandle)> + 'a {
    pointers
        .iter()
        .filter(|(slot, _)| enabled.contains(*slot))
        .map(|(slot, (pointer, buffer))| (*slot, pointer, *buffer))
}

pub(crate) fn blend_state(mode: BlendMode) -> Option<wgpu::BlendState> {
    match mode {
        BlendMode::Disabled => None,
        BlendMode::Alpha => Some(wgpu::BlendState::ALPHA_BLENDING),
    }
}

/// Shader modules and entry points of one linked program.
pub(crate) struct ProgramStages<'a> {
    pub vertex: &'a wgpu::ShaderModule,
    pub vertex_entry: &'a str,
    pub fragment: &'a wgpu::ShaderModule,
    pub fragment_entry: &'a str,
}

/// Builds a triangle-list pipeline with an automatic layout.
pub(crate) fn build(
    device: &wgpu::Device,
    stages: &ProgramStages<'_>,
    streams: &[VertexStream],
    blend: BlendMode,
    format: wgpu::TextureFormat,
) -> wgpu::RenderPipeline {
    let buffers: Vec<wgpu::VertexBufferLayout<'_>> = streams.iter().map(VertexStream::layout).collect();

    device.create_render_pipeline(&wgpu::RenderPipelineDescriptor {
        label: Some("quadra pipeline"),
        layout: None,
        vertex: wgpu::VertexState {
            module: stages.vertex,
            entry_point: Some(stages.vertex_entry),
            compilation_options: Default::default(),
            buffers: &buffers,
        },
        fragment: Some(wgpu::FragmentState {
            module: stages.fragment,
            entry_point: Some(stages.fragment_entry),
            compilation_options: Default::default(),
            targets: &[Some(wgpu::ColorTargetState {
                format,
                blend: blend_state(blend),
                write_mask: wgpu::ColorWrites::ALL,
            })],
        }),
        primitive: wgpu::PrimitiveState {
            topology: wgpu::PrimitiveTopology::TriangleList,
            strip_index_format: None,
            front_face: wgpu::FrontFace::Ccw,
            cull_mode: None,
            polygon_mode: wgpu::PolygonMode::Fill,
            unclipped_depth: false,
            conservative: false,
        },
        depth_stencil: None,
        multisample: wgpu::MultisampleState::default(),
        multiview_mask: None,
        cache: None,
    })
}

#[cfg(test)]
mod tests {
    use super::*;

    fn ptr(kind: ScalarKind, count: u32, normalized: bool, stride: u32, offset: u32) -> AttribPointer {
        AttribPointer { count, kind, normalized, stride, offset }
    }

    fn handle(id: u32) -> RawHandle {
        RawHandle::new(id).unwrap()
    }

    #[test]
    fn formats_follow_kind_count_and_normalization() {
        use wgpu::VertexFormat as F;

        assert_eq!(vertex_format(&ptr(ScalarKind::Float, 2, false, 8, 0)), Some(F::Float32x2));
        assert_eq!(vertex_format(&ptr(ScalarKind::UInt32, 1, false, 4, 0)), Some(F::Uint32));
        assert_eq!(vertex_format(&ptr(ScalarKind::UByte, 4, true, 4, 0)), Some(F::Unorm8x4));
        assert_eq!(vertex_format(&ptr(ScalarKind::UByte, 2, false, 2, 0)), Some(F::Uint8x2));
    }

    #[test]
    fn unrepresentable_formats_are_rejected() {
        assert_eq!(vertex_format(&ptr(ScalarKind::UByte, 3, true, 3, 0)), None);
        assert_eq!(vertex_format(&ptr(ScalarKind::UInt32, 4, true, 16, 0)), None);
    }

    #[test]
    fn interleaved_attributes_share_one_stream() {
        let pos = ptr(ScalarKind::Float, 2, false, 16, 0);
        let uv = ptr(ScalarKind::Float, 2, false, 16, 8);
        let vb = handle(7);

        let streams = vertex_streams([(0, &pos, vb), (1, &uv, vb)]).unwrap();

        assert_eq!(streams.len(), 1);
        assert_eq!(streams[0].stride, 16);
        let locations: Vec<(u32, u64)> = streams[0].attributes.iter().map(|a| (a.shader_location, a.offset)).collect();
        assert_eq!(locations, [(0, 0), (1, 8)]);
    }

    #[test]
    fn separate_buffers_get_separate_streams() {
        let pos = ptr(ScalarKind::Float, 3, false, 12, 0);
        let color = ptr(ScalarKind::UByte, 4, true, 4, 0);

        let streams = vertex_streams([(0, &pos, handle(1)), (1, &color, handle(2))]).unwrap();

        assert_eq!(streams.iter().map(|s| s.buffer.get()).collect::<Vec<_>>(), [1, 2]);
    }

    #[test]
    fn attribute_past_stride_is_an_error() {
        let bad = ptr(ScalarKind::Float, 4, false, 8, 0);
        assert!(vertex_streams([(0, &bad, handle(1))]).unwrap_err().contains("stride"));
    }

    #[test]
    fn only_enabled_slots_are_used() {
        let mut pointers = BTreeMap::new();
        pointers.insert(1, (ptr(ScalarKind::Float, 2, false, 16, 8), handle(3)));
        pointers.insert(0, (ptr(ScalarKind::Float, 2, false, 16, 0), handle(3)));
        let enabled: BTreeSet<u32> = [1].into_iter().collect();

        let slots: Vec<u32> = enabled_attributes(&pointers, &enabled).map(|(s, _, _)| s).collect();
        assert_eq!(slots, [1]);
    }

    fn key(program: u32, program_revision: u64, vertex_array: u32, vertex_array_revision: u64) -> PipelineKey {
        PipelineKey {
            program: handle(program),
            program_revision,
            vertex_array: handle(vertex_array),
            vertex_array_revision,
            blend: BlendMode::Disabled,
            format: wgpu::TextureFormat::Bgra8UnormSrgb,
        }
    }

    #[test]
    fn newer_revision_evicts_older_pipeline() {
        let mut cache = PipelineCache::default();
        let blended = PipelineKey { blend: BlendMode::Alpha, ..key(1, 1, 2, 1) };
        cache.insert(key(1, 1, 2, 1), "opaque");
        cache.insert(blended, "blended");
        cache.insert(key(1, 1, 3, 1), "other vertex array");
        assert_eq!(cache.len(), 3);

        for revision in 2..10 {
            cache.insert(key(1, 1, 2, revision), "rewired");
        }

        assert_eq!(cache.len(), 2);
        assert_eq!(cache.get(&key(1, 1, 2, 9)).as_deref(), Some(&"rewired"));
        assert!(cache.get(&blended).is_none());
        assert_eq!(cache.get(&key(1, 1, 3, 1)).as_deref(), Some(&"other vertex array"));

        cache.insert(key(1, 2, 2, 9), "relinked");
        assert!(cache.get(&key(1, 1, 2, 9)).is_none());
    }

    #[test]
    fn forgetting_drops_every_entry_of_the_handle() {
        let mut cache = PipelineCache::default();
        cache.insert(key(1, 1, 2, 1), ());
        cache.insert(key(1, 1, 3, 1), ());
        cache.insert(key(4, 1, 3, 1), ());

        cache.forget_program(handle(1));
        assert_eq!(cache.len(), 1);
        cache.forget_vertex_array(handle(3));
        assert_eq!(cache.len(), 0);
    }

    #[test]
    fn alpha_blend_maps_to_standard_state() {
        assert_eq!(blend_state(BlendMode::Disabled), None);
        assert_eq!(blend_state(BlendMode::Alpha), Some(wgpu::BlendState::ALPHA_BLENDING));
    }
}
