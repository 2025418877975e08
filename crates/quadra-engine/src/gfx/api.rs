//! Driver boundary.
//!
//! Every GPU-facing component talks to the graphics API exclusively through
//! [`GraphicsApi`]: a handle-based, stateful driver with bind points, a
//! current program and texture units. [`WgpuApi`](super::WgpuApi) is the
//! production implementation.

use std::fmt;
use std::num::NonZeroU32;

use super::layout::ScalarKind;

/// Opaque, non-zero resource identifier allocated by the driver.
#[derive(Debug, Copy, Clone, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct RawHandle(NonZeroU32);

impl RawHandle {
    pub(crate) const FIRST: RawHandle = RawHandle(NonZeroU32::MIN);

    /// Wraps a driver id. Returns `None` for 0, the "no object" id.
    #[inline]
    pub fn new(id: u32) -> Option<Self> {
        NonZeroU32::new(id).map(Self)
    }

    #[inline]
    pub fn get(self) -> u32 {
        self.0.get()
    }

    /// The id following this one.
    #[inline]
    pub(crate) fn next(self) -> Self {
        Self(self.0.saturating_add(1))
    }
}

impl fmt::Display for RawHandle {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "#{}", self.0)
    }
}

/// Location of a uniform inside a linked program.
#[derive(Debug, Copy, Clone, PartialEq, Eq, Hash)]
pub struct UniformLocation(pub u32);

/// Buffer bind points.
#[derive(Debug, Copy, Clone, PartialEq, Eq, Hash)]
pub enum BufferTarget {
    /// Vertex attribute data.
    Array,
    /// Index data for indexed draws.
    ElementArray,
}

/// Programmable pipeline stages.
#[derive(Debug, Copy, Clone, PartialEq, Eq, Hash)]
pub enum ShaderStage {
    Vertex,
    Fragment,
}

impl ShaderStage {
    pub fn name(self) -> &'static str {
        match self {
            ShaderStage::Vertex => "vertex",
            ShaderStage::Fragment => "fragment",
        }
    }
}

impl fmt::Display for ShaderStage {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.name())
    }
}

/// How one vertex attribute slot reads bytes from the bound array buffer.
#[derive(Debug, Copy, Clone, PartialEq, Eq, Hash)]
pub struct AttribPointer {
    /// Components per vertex (1..=4).
    pub count: u32,
    pub kind: ScalarKind,
    pub normalized: bool,
    /// Byte distance between consecutive vertices.
    pub stride: u32,
    /// Byte offset of the first component inside a vertex.
    pub offset: u32,
}

#[derive(Debug, Copy, Clone, PartialEq, Eq, Hash)]
pub enum TextureFilter {
    Nearest,
    Linear,
}

#[derive(Debug, Copy, Clone, PartialEq, Eq, Hash)]
pub enum TextureWrap {
    ClampToEdge,
    Repeat,
}

/// Sampling parameters applied to the texture bound on the active unit.
#[derive(Debug, Copy, Clone, PartialEq, Eq, Hash)]
pub enum TextureParam {
    MinFilter(TextureFilter),
    MagFilter(TextureFilter),
    WrapS(TextureWrap),
    WrapT(TextureWrap),
}

/// Color blending applied by subsequent draws.
#[derive(Debug, Copy, Clone, PartialEq, Eq, Hash, Default)]
pub enum BlendMode {
    /// Source replaces destination.
    #[default]
    Disabled,
    /// `src * src.a + dst * (1 - src.a)`.
    Alpha,
}

/// Value written through a uniform setter.
#[derive(Debug, Copy, Clone, PartialEq)]
pub enum UniformValue {
    I32(i32),
    F32(f32),
    Vec4([f32; 4]),
    /// Column-major 4x4 matrix.
    Mat4([f32; 16]),
}

impl UniformValue {
    /// Raw bytes as laid out in a uniform block.
    pub fn to_bytes(&self) -> Vec<u8> {
        match self {
            UniformValue::I32(v) => bytemuck::bytes_of(v).to_vec(),
            UniformValue::F32(v) => bytemuck::bytes_of(v).to_vec(),
            UniformValue::Vec4(v) => bytemuck::cast_slice(v).to_vec(),
            UniformValue::Mat4(v) => bytemuck::cast_slice(v).to_vec(),
        }
    }
}

/// Error flag raised by the driver after a call.
///
/// Errors are a diagnostic side channel: they are drained and logged by the
/// call wrapper and never change control flow.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum DriverError {
    /// An enum-like argument is out of range.
    InvalidEnum(String),
    /// A numeric or data argument is out of range.
    InvalidValue(String),
    /// The call is not allowed in the current state.
    InvalidOperation(String),
    OutOfMemory,
    /// Error reported asynchronously by the backend's own validation.
    Backend(String),
}

impl fmt::Display for DriverError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            DriverError::InvalidEnum(msg) => write!(f, "invalid enum: {msg}"),
            DriverError::InvalidValue(msg) => write!(f, "invalid value: {msg}"),
            DriverError::InvalidOperation(msg) => write!(f, "invalid operation: {msg}"),
            DriverError::OutOfMemory => f.write_str("out of memory"),
            DriverError::Backend(msg) => write!(f, "backend: {msg}"),
        }
    }
}

impl std::error::Error for DriverError {}

/// Handle-based graphics driver.
///
/// Binding calls take `Option<RawHandle>`; `None` clears the bind point.
/// Calls that fail record a [`DriverError`] retrievable through
/// [`GraphicsApi::take_error`] instead of returning it.
pub trait GraphicsApi {
    // ── buffers ───────────────────────────────────────────────────────────

    fn create_buffer(&mut self) -> RawHandle;
    fn bind_buffer(&mut self, target: BufferTarget, buffer: Option<RawHandle>);
    /// Replaces the storage of the buffer bound at `target` with `data`.
    fn buffer_data(&mut self, target: BufferTarget, data: &[u8]);
    fn delete_buffer(&mut self, buffer: RawHandle);

    // ── vertex arrays ─────────────────────────────────────────────────────

    fn create_vertex_array(&mut self) -> RawHandle;
    fn bind_vertex_array(&mut self, vertex_array: Option<RawHandle>);
    /// Configures slot `index` of the bound vertex array to read from the
    /// currently bound [`BufferTarget::Array`] buffer.
    fn vertex_attrib_pointer(&mut self, index: u32, pointer: AttribPointer);
    fn enable_vertex_attrib(&mut self, index: u32);
    fn delete_vertex_array(&mut self, vertex_array: RawHandle);

    // ── shaders & programs ────────────────────────────────────────────────

    fn create_shader(&mut self, stage: ShaderStage) -> RawHandle;
    fn shader_source(&mut self, shader: RawHandle, source: &str);
    fn compile_shader(&mut self, shader: RawHandle);
    fn shader_compile_status(&mut self, shader: RawHandle) -> bool;
    fn shader_info_log(&mut self, shader: RawHandle) -> String;
    fn delete_shader(&mut self, shader: RawHandle);

    fn create_program(&mut self) -> RawHandle;
    fn attach_shader(&mut self, program: RawHandle, shader: RawHandle);
    fn link_program(&mut self, program: RawHandle);
    fn validate_program(&mut self, program: RawHandle);
    fn program_link_status(&mut self, program: RawHandle) -> bool;
    fn program_info_log(&mut self, program: RawHandle) -> String;
    fn use_program(&mut self, program: Option<RawHandle>);
    fn delete_program(&mut self, program: RawHandle);

    /// Looks up a uniform by name. `None` when the program has no such
    /// active uniform.
    fn uniform_location(&mut self, program: RawHandle, name: &str) -> Option<UniformLocation>;
    /// Writes a uniform of the current program.
    fn set_uniform(&mut self, location: UniformLocation, value: UniformValue);

    // ── textures ──────────────────────────────────────────────────────────

    fn create_texture(&mut self) -> RawHandle;
    fn active_texture(&mut self, unit: u32);
    /// Binds a 2D texture to the active unit.
    fn bind_texture(&mut self, texture: Option<RawHandle>);
    fn texture_parameter(&mut self, param: TextureParam);
    /// Allocates RGBA8 storage for the texture bound on the active unit.
    /// `None` leaves the contents undefined.
    fn texture_image_2d(&mut self, width: u32, height: u32, pixels: Option<&[u8]>);
    fn delete_texture(&mut self, texture: RawHandle);

    // ── drawing ───────────────────────────────────────────────────────────

    fn clear_color(&mut self, rgba: [f32; 4]);
    /// Clears the color buffer.
    fn clear(&mut self);
    fn set_blend(&mut self, mode: BlendMode);
    /// Draws `count` u32 indices from the bound element buffer as a
    /// triangle list.
    fn draw_elements(&mut self, count: u32);

    /// Pops the oldest pending error, `None` once the queue is empty.
    fn take_error(&mut self) -> Option<DriverError>;
}
