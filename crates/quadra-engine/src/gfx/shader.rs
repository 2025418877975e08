use std::collections::HashMap;
use std::path::Path;

use glam::Mat4;

use super::api::{ShaderStage, UniformLocation, UniformValue};
use super::context::{gfx_call, Context, OwnedHandle};
use super::source::ShaderSource;

/// Outcome of building a [`ShaderProgram`]. Set once by construction.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ProgramStatus {
    Linked,
    /// At least one stage did not compile, or linking failed.
    ///
    /// The program handle is still valid and may be bound, but whatever it
    /// renders is undefined.
    Failed {
        stages: Vec<ShaderStage>,
        link_log: Option<String>,
    },
}

/// A linked vertex + fragment program with cached uniform lookups.
#[derive(Debug)]
pub struct ShaderProgram {
    handle: OwnedHandle,
    status: ProgramStatus,
    uniform_cache: HashMap<String, Option<UniformLocation>>,
}

impl ShaderProgram {
    /// Splits the two-section file at `path` and builds a program from it.
    pub fn from_file(ctx: &Context, path: impl AsRef<Path>) -> Self {
        let path = path.as_ref();
        log::debug!("building shader program from {}", path.display());
        Self::new(ctx, &ShaderSource::from_file(path))
    }

    /// Compiles both stages and links them.
    ///
    /// Nothing here is fatal. A stage that fails to compile is logged and
    /// left out, and linking still runs with the stages that did compile;
    /// check [`status`](Self::status) to tell a usable program from a broken
    /// one.
    pub fn new(ctx: &Context, source: &ShaderSource) -> Self {
        let raw = gfx_call!(ctx, api => api.create_program());
        let handle = OwnedHandle::new(ctx, raw, "delete_program", |api, h| api.delete_program(h));

        let mut compiled = Vec::with_capacity(2);
        let mut failed = Vec::new();
        for stage in [ShaderStage::Vertex, ShaderStage::Fragment] {
            match compile_stage(ctx, stage, source.stage(stage)) {
                Some(shader) => compiled.push(shader),
                None => failed.push(stage),
            }
        }

        for shader in &compiled {
            let shader = shader.raw();
            gfx_call!(ctx, api => api.attach_shader(raw, shader));
        }
        gfx_call!(ctx, api => api.link_program(raw));
        gfx_call!(ctx, api => api.validate_program(raw));

        let link_log = if gfx_call!(ctx, api => api.program_link_status(raw)) {
            None
        } else {
            let log = gfx_call!(ctx, api => api.program_info_log(raw));
            log::error!("failed to link shader program {raw}:\n{log}");
            Some(log)
        };

        // Stage objects are owned by the program once linked.
        drop(compiled);

        let status = if failed.is_empty() && link_log.is_none() {
            ProgramStatus::Linked
        } else {
            ProgramStatus::Failed { stages: failed, link_log }
        };
        Self {
            handle,
            status,
            uniform_cache: HashMap::new(),
        }
    }

    pub fn status(&self) -> &ProgramStatus {
        &self.status
    }

    pub fn is_linked(&self) -> bool {
        self.status == ProgramStatus::Linked
    }

    /// Makes this the current program.
    pub fn bind(&self) {
        let raw = self.handle.raw();
        gfx_call!(self.handle.ctx(), api => api.use_program(Some(raw)));
    }

    pub fn unbind(&self) {
        gfx_call!(self.handle.ctx(), api => api.use_program(None));
    }

    // Uniform setters write to the current program; bind first.

    pub fn set_uniform_1i(&mut self, name: &str, value: i32) {
        self.set_uniform(name, UniformValue::I32(value));
    }

    pub fn set_uniform_1f(&mut self, name: &str, value: f32) {
        self.set_uniform(name, UniformValue::F32(value));
    }

    pub fn set_uniform_4f(&mut self, name: &str, v0: f32, v1: f32, v2: f32, v3: f32) {
        self.set_uniform(name, UniformValue::Vec4([v0, v1, v2, v3]));
    }

    pub fn set_uniform_mat4(&mut self, name: &str, matrix: &Mat4) {
        self.set_uniform(name, UniformValue::Mat4(matrix.to_cols_array()));
    }

    fn set_uniform(&mut self, name: &str, value: UniformValue) {
        // Unknown names resolve to no location; writing to it is a no-op.
        let Some(location) = self.uniform_location(name) else { return };
        gfx_call!(self.handle.ctx(), api => api.set_uniform(location, value));
    }

    /// Resolves `name`, asking the driver only on the first request.
    ///
    /// Misses are cached too, so a missing uniform is looked up and warned
    /// about once per program.
    pub fn uniform_location(&mut self, name: &str) -> Option<UniformLocation> {
        if let Some(&cached) = self.uniform_cache.get(name) {
            return cached;
        }

        let raw = self.handle.raw();
        let location = gfx_call!(self.handle.ctx(), api => api.uniform_location(raw, name));
        if location.is_none() {
            log::warn!("uniform '{name}' does not exist in shader program {raw}");
        }

        self.uniform_cache.insert(name.to_owned(), location);
        location
    }

    #[cfg(test)]
    pub(crate) fn raw(&self) -> super::api::RawHandle {
        self.handle.raw()
    }
}

/// Compiles one stage. On failure the driver log is reported and the stage
/// object released; `None` is returned.
fn compile_stage(ctx: &Context, stage: ShaderStage, text: &str) -> Option<OwnedHandle> {
    let raw = gfx_call!(ctx, api => api.create_shader(stage));
    let shader = OwnedHandle::new(ctx, raw, "delete_shader", |api, h| api.delete_shader(h));

    gfx_call!(ctx, api => api.shader_source(raw, text));
    gfx_call!(ctx, api => api.compile_shader(raw));

    if gfx_call!(ctx, api => api.shader_compile_status(raw)) {
        return Some(shader);
    }

    let message = gfx_call!(ctx, api => api.shader_info_log(raw));
    log::error!("failed to compile {stage} shader!\n{message}");
    None
}
