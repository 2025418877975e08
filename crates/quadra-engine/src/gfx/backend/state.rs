//! Emulated driver state: handle tables, bind points, link results and
//! uniform shadows.
//!
//! [`DriverState`] never touches a device. The GPU objects a handle carries
//! are opaque [`GpuObjects`] payloads built by the caller through the
//! closures passed to the data-carrying calls.

use std::collections::{BTreeMap, BTreeSet, HashMap, VecDeque};
use std::rc::Rc;

use crate::gfx::api::{
    AttribPointer, BlendMode, BufferTarget, DriverError, RawHandle, ShaderStage, TextureFilter, TextureParam,
    TextureWrap, UniformLocation, UniformValue,
};

use super::pipeline;
use super::reflect::{self, Resource, ResourceKind, StageInfo};

pub(crate) const MAX_TEXTURE_UNITS: u32 = 16;

/// Payload types attached to handles by the backend.
pub(crate) trait GpuObjects {
    /// Uploaded buffer contents.
    type Buffer: Clone;
    /// Compiled shader stage.
    type Module;
    /// Texture storage.
    type Image;
}

pub(crate) fn invalid_op(msg: impl Into<String>) -> DriverError {
    DriverError::InvalidOperation(msg.into())
}

pub(crate) fn invalid_value(msg: impl Into<String>) -> DriverError {
    DriverError::InvalidValue(msg.into())
}

struct BufferSlot<B> {
    gpu: Option<B>,
    size: u64,
}

#[derive(Default)]
pub(crate) struct VertexArraySlot {
    /// Slot -> (pointer, array buffer bound when the pointer was set).
    pointers: BTreeMap<u32, (AttribPointer, RawHandle)>,
    enabled: BTreeSet<u32>,
    element_buffer: Option<RawHandle>,
    revision: u64,
}

impl VertexArraySlot {
    pub(crate) fn enabled_attributes(&self) -> impl Iterator<Item = (u32, &AttribPointer, RawHandle)> {
        pipeline::enabled_attributes(&self.pointers, &self.enabled)
    }
}

pub(crate) struct Compiled<M> {
    pub info: StageInfo,
    pub module: M,
}

struct ShaderSlot<M> {
    stage: ShaderStage,
    source: String,
    compiled: Option<Rc<Compiled<M>>>,
    log: String,
}

#[derive(Debug, Clone, PartialEq)]
pub(crate) enum UniformState {
    Buffer(Vec<u8>),
    Texture { unit: u32 },
    Sampler,
}

impl UniformState {
    fn for_resource(resource: &Resource) -> Self {
        match resource.kind {
            ResourceKind::Uniform { size } => Self::Buffer(vec![0; size as usize]),
            ResourceKind::Texture => Self::Texture { unit: 0 },
            ResourceKind::Sampler => Self::Sampler,
        }
    }

    fn apply(&mut self, value: UniformValue) -> Result<(), String> {
        match (self, value) {
            (Self::Buffer(shadow), value) => {
                let bytes = value.to_bytes();
                if bytes.len() != shadow.len() {
                    return Err(format!("value is {} bytes, uniform is {}", bytes.len(), shadow.len()));
                }
                shadow.copy_from_slice(&bytes);
                Ok(())
            }
            (Self::Texture { unit }, UniformValue::I32(v)) => match u32::try_from(v) {
                Ok(v) if v < MAX_TEXTURE_UNITS => {
                    *unit = v;
                    Ok(())
                }
                _ => Err(format!("texture unit {v} out of range")),
            },
            (Self::Texture { .. }, value) => Err(format!("texture unit must be an integer, got {value:?}")),
            (Self::Sampler, _) => Err("samplers follow their texture and cannot be set".to_string()),
        }
    }
}

pub(crate) struct Uniform {
    pub resource: Resource,
    pub state: UniformState,
}

pub(crate) struct LinkedProgram<M> {
    pub vertex: Rc<Compiled<M>>,
    pub fragment: Rc<Compiled<M>>,
    pub uniforms: Vec<Uniform>,
}

struct ProgramSlot<M> {
    attached: Vec<RawHandle>,
    linked: Option<LinkedProgram<M>>,
    log: String,
    revision: u64,
}

impl<M> Default for ProgramSlot<M> {
    fn default() -> Self {
        Self {
            attached: Vec::new(),
            linked: None,
            log: String::new(),
            revision: 0,
        }
    }
}

#[derive(Debug, Copy, Clone, PartialEq, Eq, Hash)]
pub(crate) struct SamplerParams {
    min: TextureFilter,
    mag: TextureFilter,
    wrap_s: TextureWrap,
    wrap_t: TextureWrap,
}

impl Default for SamplerParams {
    fn default() -> Self {
        Self {
            min: TextureFilter::Linear,
            mag: TextureFilter::Linear,
            wrap_s: TextureWrap::Repeat,
            wrap_t: TextureWrap::Repeat,
        }
    }
}

impl SamplerParams {
    fn set(&mut self, param: TextureParam) {
        match param {
            TextureParam::MinFilter(f) => self.min = f,
            TextureParam::MagFilter(f) => self.mag = f,
            TextureParam::WrapS(w) => self.wrap_s = w,
            TextureParam::WrapT(w) => self.wrap_t = w,
        }
    }

    pub(crate) fn descriptor(&self) -> wgpu::SamplerDescriptor<'static> {
        fn filter(f: TextureFilter) -> wgpu::FilterMode {
            match f {
                TextureFilter::Nearest => wgpu::FilterMode::Nearest,
                TextureFilter::Linear => wgpu::FilterMode::Linear,
            }
        }
        fn address(w: TextureWrap) -> wgpu::AddressMode {
            match w {
                TextureWrap::ClampToEdge => wgpu::AddressMode::ClampToEdge,
                TextureWrap::Repeat => wgpu::AddressMode::Repeat,
            }
        }

        wgpu::SamplerDescriptor {
            label: Some("quadra sampler"),
            address_mode_u: address(self.wrap_s),
            address_mode_v: address(self.wrap_t),
            min_filter: filter(self.min),
            mag_filter: filter(self.mag),
            ..Default::default()
        }
    }
}

struct TextureSlot<I> {
    params: SamplerParams,
    image: Option<I>,
}

/// What one program resource reads at draw time.
pub(crate) enum Binding<'a, I> {
    /// Uniform shadow bytes.
    Buffer(&'a [u8]),
    /// Image on the resource's texture unit; `None` when nothing usable is
    /// bound there.
    Image(Option<&'a I>),
    Sampler(SamplerParams),
}

/// State resolved for one indexed draw.
pub(crate) struct DrawCall<'a, G: GpuObjects> {
    pub program: RawHandle,
    pub program_revision: u64,
    pub vertex_array: RawHandle,
    pub vertex_array_revision: u64,
    pub linked: &'a LinkedProgram<G::Module>,
    pub attributes: &'a VertexArraySlot,
    pub indices: G::Buffer,
}

/// Handle tables and bind points of the emulated driver.
pub(crate) struct DriverState<G: GpuObjects> {
    next_handle: RawHandle,
    errors: VecDeque<DriverError>,

    buffers: HashMap<RawHandle, BufferSlot<G::Buffer>>,
    array_buffer: Option<RawHandle>,
    /// Element buffer binding while no vertex array is bound.
    loose_element_buffer: Option<RawHandle>,

    vertex_arrays: HashMap<RawHandle, VertexArraySlot>,
    bound_vertex_array: Option<RawHandle>,

    shaders: HashMap<RawHandle, ShaderSlot<G::Module>>,
    programs: HashMap<RawHandle, ProgramSlot<G::Module>>,
    current_program: Option<RawHandle>,

    textures: HashMap<RawHandle, TextureSlot<G::Image>>,
    active_unit: u32,
    units: HashMap<u32, RawHandle>,

    clear_color: [f32; 4],
    blend: BlendMode,
}

impl<G: GpuObjects> Default for DriverState<G> {
    fn default() -> Self {
        Self {
            next_handle: RawHandle::FIRST,
            errors: VecDeque::new(),
            buffers: HashMap::new(),
            array_buffer: None,
            loose_element_buffer: None,
            vertex_arrays: HashMap::new(),
            bound_vertex_array: None,
            shaders: HashMap::new(),
            programs: HashMap::new(),
            current_program: None,
            textures: HashMap::new(),
            active_unit: 0,
            units: HashMap::new(),
            clear_color: [0.0, 0.0, 0.0, 1.0],
            blend: BlendMode::Disabled,
        }
    }
}

impl<G: GpuObjects> DriverState<G> {
    fn allocate(&mut self) -> RawHandle {
        let handle = self.next_handle;
        self.next_handle = handle.next();
        handle
    }

    pub(crate) fn fail(&mut self, err: DriverError) {
        self.errors.push_back(err);
    }

    pub(crate) fn take_error(&mut self) -> Option<DriverError> {
        self.errors.pop_front()
    }

    fn bound_buffer(&self, target: BufferTarget) -> Option<RawHandle> {
        match target {
            BufferTarget::Array => self.array_buffer,
            BufferTarget::ElementArray => match self.bound_vertex_array.and_then(|va| self.vertex_arrays.get(&va)) {
                Some(va) => va.element_buffer,
                None => self.loose_element_buffer,
            },
        }
    }

    fn bound_vertex_array_mut(&mut self) -> Result<&mut VertexArraySlot, DriverError> {
        let va = self.bound_vertex_array.ok_or_else(|| invalid_op("no vertex array bound"))?;
        self.vertex_arrays
            .get_mut(&va)
            .ok_or_else(|| invalid_op(format!("vertex array {va} no longer exists")))
    }

    // ── buffers ───────────────────────────────────────────────────────────

    pub(crate) fn create_buffer(&mut self) -> RawHandle {
        let handle = self.allocate();
        self.buffers.insert(handle, BufferSlot { gpu: None, size: 0 });
        handle
    }

    pub(crate) fn bind_buffer(&mut self, target: BufferTarget, buffer: Option<RawHandle>) {
        if let Some(h) = buffer.filter(|h| !self.buffers.contains_key(h)) {
            self.fail(invalid_value(format!("buffer {h} does not exist")));
            return;
        }

        match target {
            BufferTarget::Array => self.array_buffer = buffer,
            BufferTarget::ElementArray => match self.bound_vertex_array.and_then(|va| self.vertex_arrays.get_mut(&va)) {
                Some(va) => va.element_buffer = buffer,
                None => self.loose_element_buffer = buffer,
            },
        }
    }

    /// Replaces the bound buffer's contents. `upload` runs only for
    /// non-empty data on a bound buffer.
    pub(crate) fn buffer_data(&mut self, target: BufferTarget, data: &[u8], upload: impl FnOnce(&[u8]) -> G::Buffer) {
        let Some(slot) = self.bound_buffer(target).and_then(|h| self.buffers.get_mut(&h)) else {
            self.fail(invalid_op(format!("no buffer bound to {target:?}")));
            return;
        };

        slot.gpu = (!data.is_empty()).then(|| upload(data));
        slot.size = data.len() as u64;
    }

    pub(crate) fn vertex_buffer(&self, buffer: RawHandle) -> Option<G::Buffer> {
        self.buffers.get(&buffer).and_then(|b| b.gpu.clone())
    }

    pub(crate) fn delete_buffer(&mut self, buffer: RawHandle) {
        if self.buffers.remove(&buffer).is_none() {
            return;
        }

        if self.array_buffer == Some(buffer) {
            self.array_buffer = None;
        }
        if self.loose_element_buffer == Some(buffer) {
            self.loose_element_buffer = None;
        }
        for va in self.vertex_arrays.values_mut() {
            if va.element_buffer == Some(buffer) {
                va.element_buffer = None;
            }
        }
    }

    // ── vertex arrays ─────────────────────────────────────────────────────

    pub(crate) fn create_vertex_array(&mut self) -> RawHandle {
        let handle = self.allocate();
        self.vertex_arrays.insert(handle, VertexArraySlot::default());
        handle
    }

    pub(crate) fn bind_vertex_array(&mut self, vertex_array: Option<RawHandle>) {
        if let Some(h) = vertex_array.filter(|h| !self.vertex_arrays.contains_key(h)) {
            self.fail(invalid_value(format!("vertex array {h} does not exist")));
            return;
        }
        self.bound_vertex_array = vertex_array;
    }

    pub(crate) fn vertex_attrib_pointer(&mut self, index: u32, pointer: AttribPointer) {
        if pipeline::vertex_format(&pointer).is_none() {
            self.fail(DriverError::InvalidEnum(format!(
                "{} x {:?} (normalized: {}) is not a vertex format",
                pointer.count, pointer.kind, pointer.normalized
            )));
            return;
        }

        let Some(buffer) = self.array_buffer else {
            self.fail(invalid_op("no array buffer bound"));
            return;
        };

        match self.bound_vertex_array_mut() {
            Ok(va) => {
                va.pointers.insert(index, (pointer, buffer));
                va.revision += 1;
            }
            Err(err) => self.fail(err),
        }
    }

    pub(crate) fn enable_vertex_attrib(&mut self, index: u32) {
        match self.bound_vertex_array_mut() {
            Ok(va) => {
                if va.enabled.insert(index) {
                    va.revision += 1;
                }
            }
            Err(err) => self.fail(err),
        }
    }

    /// Returns whether the vertex array existed.
    pub(crate) fn delete_vertex_array(&mut self, vertex_array: RawHandle) -> bool {
        if self.vertex_arrays.remove(&vertex_array).is_none() {
            return false;
        }
        if self.bound_vertex_array == Some(vertex_array) {
            self.bound_vertex_array = None;
        }
        true
    }

    // ── shaders & programs ────────────────────────────────────────────────

    pub(crate) fn create_shader(&mut self, stage: ShaderStage) -> RawHandle {
        let handle = self.allocate();
        self.shaders.insert(
            handle,
            ShaderSlot {
                stage,
                source: String::new(),
                compiled: None,
                log: String::new(),
            },
        );
        handle
    }

    pub(crate) fn shader_source(&mut self, shader: RawHandle, source: &str) {
        match self.shaders.get_mut(&shader) {
            Some(slot) => slot.source = source.to_owned(),
            None => self.fail(invalid_value(format!("shader {shader} does not exist"))),
        }
    }

    /// Validates the source with naga; `build` turns valid source into the
    /// backend module.
    pub(crate) fn compile_shader(&mut self, shader: RawHandle, build: impl FnOnce(ShaderStage, &str) -> G::Module) {
        let Some(slot) = self.shaders.get_mut(&shader) else {
            self.fail(invalid_value(format!("shader {shader} does not exist")));
            return;
        };

        match reflect::compile(slot.stage, &slot.source) {
            Ok(info) => {
                let module = build(slot.stage, &slot.source);
                slot.compiled = Some(Rc::new(Compiled { info, module }));
                slot.log.clear();
            }
            Err(log) => {
                slot.compiled = None;
                slot.log = log;
            }
        }
    }

    pub(crate) fn shader_compile_status(&mut self, shader: RawHandle) -> bool {
        match self.shaders.get(&shader) {
            Some(slot) => slot.compiled.is_some(),
            None => {
                self.fail(invalid_value(format!("shader {shader} does not exist")));
                false
            }
        }
    }

    pub(crate) fn shader_info_log(&self, shader: RawHandle) -> String {
        self.shaders.get(&shader).map(|s| s.log.clone()).unwrap_or_default()
    }

    pub(crate) fn delete_shader(&mut self, shader: RawHandle) {
        // Programs keep their own reference to the compiled module.
        self.shaders.remove(&shader);
    }

    pub(crate) fn create_program(&mut self) -> RawHandle {
        let handle = self.allocate();
        self.programs.insert(handle, ProgramSlot::default());
        handle
    }

    pub(crate) fn attach_shader(&mut self, program: RawHandle, shader: RawHandle) {
        if !self.shaders.contains_key(&shader) {
            self.fail(invalid_value(format!("shader {shader} does not exist")));
            return;
        }
        let Some(slot) = self.programs.get_mut(&program) else {
            self.fail(invalid_value(format!("program {program} does not exist")));
            return;
        };

        if slot.attached.contains(&shader) {
            self.fail(invalid_op(format!("shader {shader} is already attached to program {program}")));
            return;
        }
        slot.attached.push(shader);
    }

    fn link(&self, attached: &[RawHandle]) -> Result<LinkedProgram<G::Module>, String> {
        let mut vertex = None;
        let mut fragment = None;

        for handle in attached {
            let shader = self
                .shaders
                .get(handle)
                .ok_or_else(|| format!("attached shader {handle} no longer exists"))?;
            let compiled = shader
                .compiled
                .clone()
                .ok_or_else(|| format!("{} shader {handle} is not compiled", shader.stage))?;

            let slot = match shader.stage {
                ShaderStage::Vertex => &mut vertex,
                ShaderStage::Fragment => &mut fragment,
            };
            if slot.replace(compiled).is_some() {
                return Err(format!("more than one {} shader attached", shader.stage));
            }
        }

        let vertex: Rc<Compiled<G::Module>> = vertex.ok_or("no vertex shader attached")?;
        let fragment: Rc<Compiled<G::Module>> = fragment.ok_or("no fragment shader attached")?;

        let uniforms = reflect::merge(&vertex.info.resources, &fragment.info.resources)?
            .into_iter()
            .map(|resource| Uniform { state: UniformState::for_resource(&resource), resource })
            .collect();

        Ok(LinkedProgram { vertex, fragment, uniforms })
    }

    /// Returns whether the program existed.
    pub(crate) fn link_program(&mut self, program: RawHandle) -> bool {
        let Some(slot) = self.programs.get(&program) else {
            self.fail(invalid_value(format!("program {program} does not exist")));
            return false;
        };

        let result = self.link(&slot.attached);
        if let Some(slot) = self.programs.get_mut(&program) {
            slot.revision += 1;
            match result {
                Ok(linked) => {
                    slot.linked = Some(linked);
                    slot.log.clear();
                }
                Err(log) => {
                    slot.linked = None;
                    slot.log = log;
                }
            }
        }
        true
    }

    pub(crate) fn validate_program(&mut self, program: RawHandle) {
        match self.programs.get(&program) {
            Some(slot) if slot.linked.is_none() => log::debug!("program {program} failed validation: not linked"),
            Some(_) => {}
            None => self.fail(invalid_value(format!("program {program} does not exist"))),
        }
    }

    pub(crate) fn program_link_status(&self, program: RawHandle) -> bool {
        self.programs.get(&program).is_some_and(|p| p.linked.is_some())
    }

    pub(crate) fn program_info_log(&self, program: RawHandle) -> String {
        self.programs.get(&program).map(|p| p.log.clone()).unwrap_or_default()
    }

    pub(crate) fn use_program(&mut self, program: Option<RawHandle>) {
        if let Some(h) = program {
            match self.programs.get(&h) {
                Some(slot) if slot.linked.is_some() => {}
                Some(_) => return self.fail(invalid_op(format!("program {h} is not linked"))),
                None => return self.fail(invalid_value(format!("program {h} does not exist"))),
            }
        }
        self.current_program = program;
    }

    /// Returns whether the program existed.
    pub(crate) fn delete_program(&mut self, program: RawHandle) -> bool {
        if self.programs.remove(&program).is_none() {
            return false;
        }
        if self.current_program == Some(program) {
            self.current_program = None;
        }
        true
    }

    pub(crate) fn uniform_location(&mut self, program: RawHandle, name: &str) -> Option<UniformLocation> {
        let linked = match self.programs.get(&program) {
            Some(slot) => slot.linked.as_ref(),
            None => {
                self.fail(invalid_value(format!("program {program} does not exist")));
                return None;
            }
        };
        let Some(linked) = linked else {
            self.fail(invalid_op(format!("program {program} is not linked")));
            return None;
        };

        (0u32..)
            .zip(&linked.uniforms)
            .find(|(_, u)| u.resource.name == name)
            .map(|(index, _)| UniformLocation(index))
    }

    pub(crate) fn set_uniform(&mut self, location: UniformLocation, value: UniformValue) {
        let Some(program) = self.current_program else {
            self.fail(invalid_op("no program in use"));
            return;
        };

        let uniform = self
            .programs
            .get_mut(&program)
            .and_then(|p| p.linked.as_mut())
            .and_then(|l| l.uniforms.get_mut(location.0 as usize));

        let result = match uniform {
            Some(uniform) => uniform
                .state
                .apply(value)
                .map_err(|msg| invalid_op(format!("uniform '{}': {msg}", uniform.resource.name))),
            None => Err(invalid_op(format!("location {} is not a uniform of program {program}", location.0))),
        };

        if let Err(err) = result {
            self.fail(err);
        }
    }

    // ── textures ──────────────────────────────────────────────────────────

    pub(crate) fn create_texture(&mut self) -> RawHandle {
        let handle = self.allocate();
        self.textures.insert(
            handle,
            TextureSlot {
                params: SamplerParams::default(),
                image: None,
            },
        );
        handle
    }

    pub(crate) fn active_texture(&mut self, unit: u32) {
        if unit >= MAX_TEXTURE_UNITS {
            self.fail(DriverError::InvalidEnum(format!("texture unit {unit} (max {MAX_TEXTURE_UNITS})")));
            return;
        }
        self.active_unit = unit;
    }

    pub(crate) fn bind_texture(&mut self, texture: Option<RawHandle>) {
        match texture {
            Some(h) if !self.textures.contains_key(&h) => {
                self.fail(invalid_value(format!("texture {h} does not exist")));
            }
            Some(h) => {
                self.units.insert(self.active_unit, h);
            }
            None => {
                self.units.remove(&self.active_unit);
            }
        }
    }

    pub(crate) fn texture_parameter(&mut self, param: TextureParam) {
        let slot = self.units.get(&self.active_unit).and_then(|t| self.textures.get_mut(t));
        match slot {
            Some(slot) => slot.params.set(param),
            None => self.fail(invalid_op(format!("no texture bound to unit {}", self.active_unit))),
        }
    }

    /// Replaces the storage of the texture on the active unit. A 0-sized
    /// image leaves the texture without storage; `upload` is not called.
    pub(crate) fn texture_image_2d(
        &mut self,
        width: u32,
        height: u32,
        pixels: Option<&[u8]>,
        upload: impl FnOnce(u32, u32, Option<&[u8]>) -> G::Image,
    ) {
        let Some(handle) = self.units.get(&self.active_unit).copied() else {
            self.fail(invalid_op(format!("no texture bound to unit {}", self.active_unit)));
            return;
        };

        let expected = width as usize * height as usize * 4;
        if let Some(pixels) = pixels.filter(|p| p.len() != expected) {
            self.fail(invalid_value(format!(
                "{width}x{height} RGBA8 image needs {expected} bytes, got {}",
                pixels.len()
            )));
            return;
        }

        if let Some(slot) = self.textures.get_mut(&handle) {
            slot.image = (width > 0 && height > 0).then(|| upload(width, height, pixels));
        }
    }

    pub(crate) fn delete_texture(&mut self, texture: RawHandle) {
        if self.textures.remove(&texture).is_some() {
            self.units.retain(|_, bound| *bound != texture);
        }
    }

    fn image_on_unit(&self, unit: u32) -> Option<&G::Image> {
        self.units
            .get(&unit)
            .and_then(|t| self.textures.get(t))
            .and_then(|t| t.image.as_ref())
    }

    /// Sampling state for a sampler variable: the parameters of the texture
    /// bound to the texture variable declared one binding before it.
    fn sampler_params(&self, linked: &LinkedProgram<G::Module>, sampler: &Resource) -> SamplerParams {
        let Some(paired_binding) = sampler.binding.checked_sub(1) else {
            return SamplerParams::default();
        };

        linked
            .uniforms
            .iter()
            .find(|u| u.resource.group == sampler.group && u.resource.binding == paired_binding)
            .and_then(|u| match u.state {
                UniformState::Texture { unit } => self.units.get(&unit),
                _ => None,
            })
            .and_then(|t| self.textures.get(t))
            .map(|t| t.params)
            .unwrap_or_default()
    }

    // ── drawing ───────────────────────────────────────────────────────────

    pub(crate) fn set_clear_color(&mut self, rgba: [f32; 4]) {
        self.clear_color = rgba;
    }

    pub(crate) fn clear_color(&self) -> [f32; 4] {
        self.clear_color
    }

    pub(crate) fn set_blend(&mut self, mode: BlendMode) {
        self.blend = mode;
    }

    pub(crate) fn blend(&self) -> BlendMode {
        self.blend
    }

    /// Checks the bind points for an indexed draw of `count` u32 indices.
    pub(crate) fn draw_call(&self, count: u32) -> Result<DrawCall<'_, G>, DriverError> {
        let program = self.current_program.ok_or_else(|| invalid_op("no program in use"))?;
        let vertex_array = self.bound_vertex_array.ok_or_else(|| invalid_op("no vertex array bound"))?;

        let program_slot = self
            .programs
            .get(&program)
            .ok_or_else(|| invalid_op(format!("program {program} no longer exists")))?;
        let linked = program_slot
            .linked
            .as_ref()
            .ok_or_else(|| invalid_op(format!("program {program} is not linked")))?;
        let attributes = self
            .vertex_arrays
            .get(&vertex_array)
            .ok_or_else(|| invalid_op(format!("vertex array {vertex_array} no longer exists")))?;

        let index_buffer = attributes.element_buffer.ok_or_else(|| invalid_op("no element buffer bound"))?;
        let index_slot = self
            .buffers
            .get(&index_buffer)
            .ok_or_else(|| invalid_op(format!("element buffer {index_buffer} no longer exists")))?;
        let needed = count as u64 * 4;
        let indices = match &index_slot.gpu {
            Some(buffer) if index_slot.size >= needed => buffer.clone(),
            _ => {
                return Err(invalid_value(format!(
                    "{count} indices need {needed} bytes; element buffer {index_buffer} holds {}",
                    index_slot.size
                )))
            }
        };

        Ok(DrawCall {
            program,
            program_revision: program_slot.revision,
            vertex_array,
            vertex_array_revision: attributes.revision,
            linked,
            attributes,
            indices,
        })
    }

    /// What each of the program's resources reads right now, in binding
    /// order.
    pub(crate) fn bindings<'a>(&'a self, linked: &'a LinkedProgram<G::Module>) -> Vec<(&'a Resource, Binding<'a, G::Image>)> {
        linked
            .uniforms
            .iter()
            .map(|uniform| {
                let binding = match &uniform.state {
                    UniformState::Buffer(shadow) => Binding::Buffer(shadow),
                    UniformState::Texture { unit } => Binding::Image(self.image_on_unit(*unit)),
                    UniformState::Sampler => Binding::Sampler(self.sampler_params(linked, &uniform.resource)),
                };
                (&uniform.resource, binding)
            })
            .collect()
    }
}
