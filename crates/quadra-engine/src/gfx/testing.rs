//! Recording [`GraphicsApi`] double for unit tests.
//!
//! The spy allocates real-looking handles, remembers every call in order and
//! counts allocations/releases so tests can assert on the exact driver
//! traffic a component produces.

use std::cell::RefCell;
use std::collections::{HashMap, HashSet, VecDeque};
use std::rc::Rc;

use super::api::{
    AttribPointer, BlendMode, BufferTarget, DriverError, GraphicsApi, RawHandle, ShaderStage,
    TextureParam, UniformLocation, UniformValue,
};
use super::context::Context;

#[derive(Debug, Clone, PartialEq)]
pub(crate) enum Call {
    CreateBuffer(u32),
    BindBuffer(BufferTarget, Option<u32>),
    BufferData(BufferTarget, Vec<u8>),
    DeleteBuffer(u32),
    CreateVertexArray(u32),
    BindVertexArray(Option<u32>),
    AttribPointer(u32, AttribPointer),
    EnableAttrib(u32),
    DeleteVertexArray(u32),
    CreateShader(ShaderStage, u32),
    ShaderSource(u32, String),
    CompileShader(u32),
    DeleteShader(u32),
    CreateProgram(u32),
    AttachShader(u32, u32),
    LinkProgram(u32),
    ValidateProgram(u32),
    UseProgram(Option<u32>),
    DeleteProgram(u32),
    UniformLocation(u32, String),
    SetUniform(UniformLocation, UniformValue),
    CreateTexture(u32),
    ActiveTexture(u32),
    BindTexture(Option<u32>),
    TexParameter(TextureParam),
    TexImage { width: u32, height: u32, pixels: Option<Vec<u8>> },
    DeleteTexture(u32),
    ClearColor([f32; 4]),
    Clear,
    Blend(BlendMode),
    DrawElements(u32),
}

#[derive(Default)]
pub(crate) struct SpyState {
    pub calls: Vec<Call>,
    pub uniform_lookups: usize,

    next_id: u32,
    live: HashSet<u32>,
    allocated: usize,
    released: Vec<u32>,
    errors: VecDeque<DriverError>,

    failing_stages: HashSet<ShaderStage>,
    failing_link: bool,
    uniforms: HashMap<String, u32>,
    shader_stages: HashMap<u32, ShaderStage>,
    attached: HashMap<u32, Vec<u32>>,
}

impl SpyState {
    /// Makes `name` an active uniform at `location` in every program.
    pub fn declare_uniform(&mut self, name: &str, location: u32) {
        self.uniforms.insert(name.to_string(), location);
    }

    /// Makes every shader of `stage` fail to compile.
    pub fn fail_stage(&mut self, stage: ShaderStage) {
        self.failing_stages.insert(stage);
    }

    pub fn fail_link(&mut self) {
        self.failing_link = true;
    }

    pub fn inject_error(&mut self, err: DriverError) {
        self.errors.push_back(err);
    }

    pub fn pending_errors(&self) -> usize {
        self.errors.len()
    }

    /// Number of handles allocated and not yet released.
    pub fn live(&self) -> usize {
        self.live.len()
    }

    pub fn allocated(&self) -> usize {
        self.allocated
    }

    pub fn release_count(&self, handle: RawHandle) -> usize {
        self.released.iter().filter(|&&id| id == handle.get()).count()
    }

    pub fn count(&self, pred: impl Fn(&Call) -> bool) -> usize {
        self.calls.iter().filter(|c| pred(c)).count()
    }

    fn allocate(&mut self) -> RawHandle {
        self.next_id += 1;
        self.allocated += 1;
        self.live.insert(self.next_id);
        RawHandle::new(self.next_id).expect("spy ids start at 1")
    }

    fn release(&mut self, handle: RawHandle) {
        self.released.push(handle.get());
        if !self.live.remove(&handle.get()) {
            self.errors.push_back(DriverError::InvalidValue(format!("{handle} is not live")));
        }
    }
}

pub(crate) struct SpyApi {
    state: Rc<RefCell<SpyState>>,
}

/// Context backed by a fresh spy, plus the spy's shared state.
pub(crate) fn spy_context() -> (Context, Rc<RefCell<SpyState>>) {
    let state = Rc::new(RefCell::new(SpyState::default()));
    let ctx = Context::new(SpyApi { state: state.clone() });
    (ctx, state)
}

impl SpyApi {
    fn record(&self, call: Call) {
        self.state.borrow_mut().calls.push(call);
    }
}

fn id(h: Option<RawHandle>) -> Option<u32> {
    h.map(RawHandle::get)
}

impl GraphicsApi for SpyApi {
    fn create_buffer(&mut self) -> RawHandle {
        let h = self.state.borrow_mut().allocate();
        self.record(Call::CreateBuffer(h.get()));
        h
    }

    fn bind_buffer(&mut self, target: BufferTarget, buffer: Option<RawHandle>) {
        self.record(Call::BindBuffer(target, id(buffer)));
    }

    fn buffer_data(&mut self, target: BufferTarget, data: &[u8]) {
        self.record(Call::BufferData(target, data.to_vec()));
    }

    fn delete_buffer(&mut self, buffer: RawHandle) {
        self.state.borrow_mut().release(buffer);
        self.record(Call::DeleteBuffer(buffer.get()));
    }

    fn create_vertex_array(&mut self) -> RawHandle {
        let h = self.state.borrow_mut().allocate();
        self.record(Call::CreateVertexArray(h.get()));
        h
    }

    fn bind_vertex_array(&mut self, vertex_array: Option<RawHandle>) {
        self.record(Call::BindVertexArray(id(vertex_array)));
    }

    fn vertex_attrib_pointer(&mut self, index: u32, pointer: AttribPointer) {
        self.record(Call::AttribPointer(index, pointer));
    }

    fn enable_vertex_attrib(&mut self, index: u32) {
        self.record(Call::EnableAttrib(index));
    }

    fn delete_vertex_array(&mut self, vertex_array: RawHandle) {
        self.state.borrow_mut().release(vertex_array);
        self.record(Call::DeleteVertexArray(vertex_array.get()));
    }

    fn create_shader(&mut self, stage: ShaderStage) -> RawHandle {
        let h = {
            let mut st = self.state.borrow_mut();
            let h = st.allocate();
            st.shader_stages.insert(h.get(), stage);
            h
        };
        self.record(Call::CreateShader(stage, h.get()));
        h
    }

    fn shader_source(&mut self, shader: RawHandle, source: &str) {
        self.record(Call::ShaderSource(shader.get(), source.to_string()));
    }

    fn compile_shader(&mut self, shader: RawHandle) {
        self.record(Call::CompileShader(shader.get()));
    }

    fn shader_compile_status(&mut self, shader: RawHandle) -> bool {
        let st = self.state.borrow();
        st.shader_stages
            .get(&shader.get())
            .is_some_and(|stage| !st.failing_stages.contains(stage))
    }

    fn shader_info_log(&mut self, shader: RawHandle) -> String {
        let st = self.state.borrow();
        match st.shader_stages.get(&shader.get()) {
            Some(stage) => format!("spy: {stage} stage rejected"),
            None => String::new(),
        }
    }

    fn delete_shader(&mut self, shader: RawHandle) {
        self.state.borrow_mut().release(shader);
        self.record(Call::DeleteShader(shader.get()));
    }

    fn create_program(&mut self) -> RawHandle {
        let h = self.state.borrow_mut().allocate();
        self.record(Call::CreateProgram(h.get()));
        h
    }

    fn attach_shader(&mut self, program: RawHandle, shader: RawHandle) {
        self.state
            .borrow_mut()
            .attached
            .entry(program.get())
            .or_default()
            .push(shader.get());
        self.record(Call::AttachShader(program.get(), shader.get()));
    }

    fn link_program(&mut self, program: RawHandle) {
        self.record(Call::LinkProgram(program.get()));
    }

    fn validate_program(&mut self, program: RawHandle) {
        self.record(Call::ValidateProgram(program.get()));
    }

    fn program_link_status(&mut self, program: RawHandle) -> bool {
        let st = self.state.borrow();
        let attached = st.attached.get(&program.get()).map_or(0, Vec::len);
        !st.failing_link && attached == 2
    }

    fn program_info_log(&mut self, _program: RawHandle) -> String {
        "spy: link rejected".to_string()
    }

    fn use_program(&mut self, program: Option<RawHandle>) {
        self.record(Call::UseProgram(id(program)));
    }

    fn delete_program(&mut self, program: RawHandle) {
        self.state.borrow_mut().release(program);
        self.record(Call::DeleteProgram(program.get()));
    }

    fn uniform_location(&mut self, program: RawHandle, name: &str) -> Option<UniformLocation> {
        let loc = {
            let mut st = self.state.borrow_mut();
            st.uniform_lookups += 1;
            st.uniforms.get(name).copied().map(UniformLocation)
        };
        self.record(Call::UniformLocation(program.get(), name.to_string()));
        loc
    }

    fn set_uniform(&mut self, location: UniformLocation, value: UniformValue) {
        self.record(Call::SetUniform(location, value));
    }

    fn create_texture(&mut self) -> RawHandle {
        let h = self.state.borrow_mut().allocate();
        self.record(Call::CreateTexture(h.get()));
        h
    }

    fn active_texture(&mut self, unit: u32) {
        self.record(Call::ActiveTexture(unit));
    }

    fn bind_texture(&mut self, texture: Option<RawHandle>) {
        self.record(Call::BindTexture(id(texture)));
    }

    fn texture_parameter(&mut self, param: TextureParam) {
        self.record(Call::TexParameter(param));
    }

    fn texture_image_2d(&mut self, width: u32, height: u32, pixels: Option<&[u8]>) {
        self.record(Call::TexImage { width, height, pixels: pixels.map(<[u8]>::to_vec) });
    }

    fn delete_texture(&mut self, texture: RawHandle) {
        self.state.borrow_mut().release(texture);
        self.record(Call::DeleteTexture(texture.get()));
    }

    fn clear_color(&mut self, rgba: [f32; 4]) {
        self.record(Call::ClearColor(rgba));
    }

    fn clear(&mut self) {
        self.record(Call::Clear);
    }

    fn set_blend(&mut self, mode: BlendMode) {
        self.record(Call::Blend(mode));
    }

    fn draw_elements(&mut self, count: u32) {
        self.record(Call::DrawElements(count));
    }

    fn take_error(&mut self) -> Option<DriverError> {
        self.state.borrow_mut().errors.pop_front()
    }
}
