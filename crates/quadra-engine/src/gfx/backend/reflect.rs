//! WGSL compilation and resource reflection through naga.

use std::collections::HashMap;

use crate::gfx::api::ShaderStage;

/// What a reflected resource global is.
#[derive(Debug, Copy, Clone, PartialEq, Eq)]
pub(crate) enum ResourceKind {
    /// `var<uniform>` of `size` bytes.
    Uniform { size: u32 },
    Texture,
    Sampler,
}

/// A named resource global and where it is bound.
#[derive(Debug, Clone, PartialEq, Eq)]
pub(crate) struct Resource {
    pub name: String,
    pub group: u32,
    pub binding: u32,
    pub kind: ResourceKind,
}

/// Result of a successful stage compile.
#[derive(Debug, Clone)]
pub(crate) struct StageInfo {
    pub entry_point: String,
    /// Resources the entry point actually uses, ordered by `(group, binding)`.
    pub resources: Vec<Resource>,
}

fn naga_stage(stage: ShaderStage) -> naga::ShaderStage {
    match stage {
        ShaderStage::Vertex => naga::ShaderStage::Vertex,
        ShaderStage::Fragment => naga::ShaderStage::Fragment,
    }
}

/// Parses and validates `source`, then reflects the first entry point of
/// `stage`. The error is a human-readable diagnostic.
pub(crate) fn compile(stage: ShaderStage, source: &str) -> Result<StageInfo, String> {
    let module = naga::front::wgsl::parse_str(source).map_err(|e| e.emit_to_string(source))?;

    let mut validator = naga::valid::Validator::new(
        naga::valid::ValidationFlags::all(),
        naga::valid::Capabilities::all(),
    );
    let info = validator
        .validate(&module)
        .map_err(|e| format!("validation error: {e}"))?;

    let wanted = naga_stage(stage);
    let (index, entry) = module
        .entry_points
        .iter()
        .enumerate()
        .find(|(_, ep)| ep.stage == wanted)
        .ok_or_else(|| format!("no @{stage} entry point"))?;

    let usage = info.get_entry_point(index);
    let mut resources: Vec<Resource> = module
        .global_variables
        .iter()
        .filter(|(handle, _)| !usage[*handle].is_empty())
        .filter_map(|(_, var)| {
            let binding = var.binding.as_ref()?;
            let name = var.name.clone()?;

            let kind = match var.space {
                naga::AddressSpace::Uniform => ResourceKind::Uniform {
                    size: module.types[var.ty].inner.size(module.to_ctx()),
                },
                naga::AddressSpace::Handle => match module.types[var.ty].inner {
                    naga::TypeInner::Image { .. } => ResourceKind::Texture,
                    naga::TypeInner::Sampler { .. } => ResourceKind::Sampler,
                    _ => return None,
                },
                _ => return None,
            };

            Some(Resource { name, group: binding.group, binding: binding.binding, kind })
        })
        .collect();

    resources.sort_by_key(|r| (r.group, r.binding));

    Ok(StageInfo { entry_point: entry.name.clone(), resources })
}

/// Combines the resources of both stages into one program table.
///
/// A name used by both stages must agree on slot and kind, and two names may
/// not share a slot.
pub(crate) fn merge(vertex: &[Resource], fragment: &[Resource]) -> Result<Vec<Resource>, String> {
    let mut by_name: HashMap<&str, &Resource> = HashMap::new();
    let mut by_slot: HashMap<(u32, u32), &str> = HashMap::new();
    let mut merged = Vec::new();

    for res in vertex.iter().chain(fragment) {
        if let Some(prev) = by_name.get(res.name.as_str()) {
            if prev != &res {
                return Err(format!(
                    "'{}' is declared differently in the two stages (group {} binding {} vs group {} binding {})",
                    res.name, prev.group, prev.binding, res.group, res.binding
                ));
            }
            continue;
        }

        if let Some(other) = by_slot.insert((res.group, res.binding), res.name.as_str()) {
            return Err(format!(
                "'{}' and '{other}' both use group {} binding {}",
                res.name, res.group, res.binding
            ));
        }

        by_name.insert(res.name.as_str(), res);
        merged.push(res.clone());
    }

    merged.sort_by_key(|r| (r.group, r.binding));
    Ok(merged)
}

#[cfg(test)]
pub(crate) mod fixtures {
    pub(crate) const VERTEX: &str = r#"
@group(0) @binding(0) var<uniform> u_MVP: mat4x4<f32>;
@group(0) @binding(3) var<uniform> u_Unused: vec4<f32>;

struct VsOut {
    @builtin(position) pos: vec4<f32>,
    @location(0) uv: vec2<f32>,
}

@vertex
fn vs_main(@location(0) pos: vec2<f32>, @location(1) uv: vec2<f32>) -> VsOut {
    var out: VsOut;
    out.pos = u_MVP * vec4<f32>(pos, 0.0, 1.0);
    out.uv = uv;
    return out;
}
"#;

    pub(crate) const FRAGMENT: &str = r#"
@group(0) @binding(1) var u_Texture: texture_2d<f32>;
@group(0) @binding(2) var u_Sampler: sampler;
@group(0) @binding(4) var<uniform> u_Color: vec4<f32>;

@fragment
fn fs_main(@location(0) uv: vec2<f32>) -> @location(0) vec4<f32> {
    return textureSample(u_Texture, u_Sampler, uv) * u_Color;
}
"#;
}

#[cfg(test)]
mod tests {
    use super::fixtures::{FRAGMENT, VERTEX};
    use super::*;

    fn res(name: &str, binding: u32, kind: ResourceKind) -> Resource {
        Resource { name: name.into(), group: 0, binding, kind }
    }

    #[test]
    fn vertex_stage_reflects_used_uniforms_only() {
        let info = compile(ShaderStage::Vertex, VERTEX).unwrap();

        assert_eq!(info.entry_point, "vs_main");
        assert_eq!(info.resources, [res("u_MVP", 0, ResourceKind::Uniform { size: 64 })]);
    }

    #[test]
    fn fragment_stage_reflects_textures_and_samplers() {
        let info = compile(ShaderStage::Fragment, FRAGMENT).unwrap();

        assert_eq!(info.entry_point, "fs_main");
        assert_eq!(
            info.resources,
            [
                res("u_Texture", 1, ResourceKind::Texture),
                res("u_Sampler", 2, ResourceKind::Sampler),
                res("u_Color", 4, ResourceKind::Uniform { size: 16 }),
            ]
        );
    }

    #[test]
    fn syntax_error_is_reported() {
        let err = compile(ShaderStage::Vertex, "@vertex fn vs_main( -> {").unwrap_err();
        assert!(!err.is_empty());
    }

    #[test]
    fn wrong_stage_has_no_entry_point() {
        let err = compile(ShaderStage::Vertex, FRAGMENT).unwrap_err();
        assert_eq!(err, "no @vertex entry point");
    }

    #[test]
    fn empty_source_fails() {
        assert!(compile(ShaderStage::Fragment, "").is_err());
    }

    #[test]
    fn merge_dedupes_shared_names() {
        let shared = res("u_MVP", 0, ResourceKind::Uniform { size: 64 });
        let texture = res("u_Texture", 1, ResourceKind::Texture);

        let merged = merge(&[shared.clone()], &[texture.clone(), shared.clone()]).unwrap();
        assert_eq!(merged, [shared, texture]);
    }

    #[test]
    fn merge_rejects_mismatched_declarations() {
        let a = res("u_MVP", 0, ResourceKind::Uniform { size: 64 });
        let b = res("u_MVP", 5, ResourceKind::Uniform { size: 64 });
        assert!(merge(&[a], &[b]).unwrap_err().contains("u_MVP"));
    }

    #[test]
    fn merge_rejects_shared_slot() {
        let a = res("u_A", 0, ResourceKind::Uniform { size: 16 });
        let b = res("u_B", 0, ResourceKind::Uniform { size: 16 });
        assert!(merge(&[a], &[b]).unwrap_err().contains("binding 0"));
    }
}
