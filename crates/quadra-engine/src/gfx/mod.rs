//! Immediate-mode rendering primitives.
//!
//! Thin RAII wrappers over a handle-based graphics driver:
//! - [`VertexBuffer`] / [`IndexBuffer`] hold uploaded geometry
//! - [`VertexLayout`] + [`VertexArray`] describe how vertex bytes feed shader inputs
//! - [`ShaderProgram`] compiles a two-stage [`ShaderSource`] and caches uniform lookups
//! - [`Texture`] uploads decoded RGBA8 images
//! - [`Renderer`] clears and issues indexed draws
//!
//! Every driver call goes through [`Context`], which drains and logs driver
//! errors with the call site attached. Failures degrade, they do not abort.

pub mod api;
mod buffer;
mod context;
mod layout;
mod renderer;
mod shader;
mod source;
mod texture;
mod vertex_array;
pub mod backend;

#[cfg(test)]
pub(crate) mod testing;

pub use api::{BlendMode, DriverError, GraphicsApi, RawHandle, ShaderStage, UniformLocation};
pub use buffer::{IndexBuffer, VertexBuffer};
pub use context::Context;
pub(crate) use context::gfx_call;
pub use layout::{ScalarKind, VertexAttribute, VertexLayout};
pub use renderer::Renderer;
pub use shader::{ProgramStatus, ShaderProgram};
pub use source::ShaderSource;
pub use texture::Texture;
pub use vertex_array::VertexArray;
pub use backend::WgpuApi;
