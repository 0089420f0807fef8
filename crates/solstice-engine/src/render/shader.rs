//! Shader compile and link.
//!
//! Each stage is its own WGSL source unit. "Compile" parses and validates one
//! unit with naga so diagnostics can be reported per stage before wgpu ever
//! sees the source; "link" checks that the two units fit together and fit the
//! bind group layout the render context creates.

use std::collections::BTreeSet;
use std::path::PathBuf;

use naga::valid::{Capabilities, ValidationFlags, Validator};

use crate::error::{ConfigurationError, ShaderStage};

use super::common::FrameUniforms;

pub(crate) const BUILTIN_VERTEX: &str = include_str!("shaders/planet.vert.wgsl");
pub(crate) const BUILTIN_FRAGMENT: &str = include_str!("shaders/planet.frag.wgsl");

/// What the render context binds at each group 0 slot.
#[derive(Debug, Copy, Clone, Eq, PartialEq)]
enum BindingKind {
    Uniform,
    Texture2d,
    Sampler,
}

/// Indexed by `@binding`: frame uniform, day map, night map, sampler.
const LAYOUT: [BindingKind; 4] = [
    BindingKind::Uniform,
    BindingKind::Texture2d,
    BindingKind::Texture2d,
    BindingKind::Sampler,
];

/// The only vertex attribute the quad buffer supplies.
const QUAD_LOCATION: u32 = 0;

/// Where a shader stage's WGSL comes from.
#[derive(Debug, Clone, Default, PartialEq)]
pub enum ShaderSource {
    /// The source embedded in the engine.
    #[default]
    Builtin,
    /// Read from disk when the worker initializes.
    File(PathBuf),
    /// Source given directly.
    Inline(String),
}

impl ShaderSource {
    /// Resolves the WGSL text for `stage`.
    pub fn load(&self, stage: ShaderStage) -> Result<String, ConfigurationError> {
        match self {
            ShaderSource::Builtin => Ok(match stage {
                ShaderStage::Vertex => BUILTIN_VERTEX,
                ShaderStage::Fragment => BUILTIN_FRAGMENT,
            }
            .to_string()),
            ShaderSource::File(path) => {
                log::debug!("reading {stage} shader from {}", path.display());
                std::fs::read_to_string(path).map_err(|e| ConfigurationError::ShaderRead {
                    path: path.clone(),
                    reason: e.to_string(),
                })
            }
            ShaderSource::Inline(source) => Ok(source.clone()),
        }
    }
}

/// A parsed and validated stage.
#[derive(Debug)]
pub(crate) struct CompiledStage {
    pub stage: ShaderStage,
    /// Trimmed source; this is what wgpu is given.
    pub source: String,
    module: naga::Module,
}

/// Two stages that passed the link checks.
#[derive(Debug)]
pub(crate) struct LinkedProgram {
    pub vertex: CompiledStage,
    pub fragment: CompiledStage,
}

/// Parses and validates one stage.
///
/// Surrounding whitespace is trimmed first. On failure the trimmed source is
/// logged in full and the compiler diagnostics are returned.
pub(crate) fn compile(stage: ShaderStage, source: &str) -> Result<CompiledStage, ConfigurationError> {
    log::trace!("raw {stage} shader source: {source:?}");

    let trimmed = source.trim();
    if trimmed.len() != source.len() {
        log::debug!("{stage} shader source was trimmed");
    }

    let module = naga::front::wgsl::parse_str(trimmed)
        .map_err(|e| compile_failure(stage, trimmed, e.emit_to_string(trimmed)))?;

    Validator::new(ValidationFlags::all(), Capabilities::empty())
        .validate(&module)
        .map_err(|e| compile_failure(stage, trimmed, e.emit_to_string(trimmed)))?;

    Ok(CompiledStage {
        stage,
        source: trimmed.to_string(),
        module,
    })
}

fn compile_failure(stage: ShaderStage, source: &str, log: String) -> ConfigurationError {
    log::error!(
        "failed to compile the following {stage} shader source:\n\
         ----------------------------------------------------\n\
         {source}\n\
         ----------------------------------------------------"
    );
    ConfigurationError::ShaderCompile { stage, log }
}

/// Checks that `vertex` and `fragment` form a usable program.
pub(crate) fn link(
    vertex: CompiledStage,
    fragment: CompiledStage,
) -> Result<LinkedProgram, ConfigurationError> {
    let vs = entry_point(&vertex, ShaderStage::Vertex)?;
    let fs = entry_point(&fragment, ShaderStage::Fragment)?;

    check_vertex_inputs(&vertex, vs)?;

    let vs_outputs = match &vs.function.result {
        Some(result) => flatten_bindings(&vertex.module, result.ty, result.binding.as_ref()),
        None => Vec::new(),
    };
    if !vs_outputs
        .iter()
        .any(|b| matches!(b, naga::Binding::BuiltIn(naga::BuiltIn::Position { .. })))
    {
        return Err(link_failure("vertex stage does not write @builtin(position)"));
    }
    let written = locations(&vs_outputs);

    let fs_inputs: Vec<naga::Binding> = fs
        .function
        .arguments
        .iter()
        .flat_map(|arg| flatten_bindings(&fragment.module, arg.ty, arg.binding.as_ref()))
        .collect();
    let missing: Vec<u32> = locations(&fs_inputs).difference(&written).copied().collect();
    if !missing.is_empty() {
        return Err(link_failure(format!(
            "fragment inputs at @location {missing:?} are not written by the vertex stage"
        )));
    }

    let fs_outputs = match &fs.function.result {
        Some(result) => flatten_bindings(&fragment.module, result.ty, result.binding.as_ref()),
        None => Vec::new(),
    };
    let colors = locations(&fs_outputs);
    if !colors.contains(&0) {
        return Err(link_failure("fragment stage does not write a color at @location(0)"));
    }
    let extra: Vec<u32> = colors.into_iter().filter(|&l| l != 0).collect();
    if !extra.is_empty() {
        return Err(link_failure(format!(
            "fragment outputs at @location {extra:?} have no render target"
        )));
    }

    for unit in [&vertex, &fragment] {
        check_resource_bindings(unit)?;
    }

    Ok(LinkedProgram { vertex, fragment })
}

fn link_failure(log: impl Into<String>) -> ConfigurationError {
    let log = log.into();
    log::error!("shader program link failed: {log}");
    ConfigurationError::ProgramLink { log }
}

fn entry_point(
    unit: &CompiledStage,
    expected: ShaderStage,
) -> Result<&naga::EntryPoint, ConfigurationError> {
    let naga_stage = match expected {
        ShaderStage::Vertex => naga::ShaderStage::Vertex,
        ShaderStage::Fragment => naga::ShaderStage::Fragment,
    };
    let name = expected.entry_point();
    unit.module
        .entry_points
        .iter()
        .find(|ep| ep.name == name && ep.stage == naga_stage)
        .ok_or_else(|| {
            link_failure(format!("{} unit has no @{expected} entry point `{name}`", unit.stage))
        })
}

/// IO bindings of a value, looking through one level of struct.
fn flatten_bindings(
    module: &naga::Module,
    ty: naga::Handle<naga::Type>,
    binding: Option<&naga::Binding>,
) -> Vec<naga::Binding> {
    if let Some(binding) = binding {
        return vec![binding.clone()];
    }
    match &module.types[ty].inner {
        naga::TypeInner::Struct { members, .. } => {
            members.iter().filter_map(|m| m.binding.clone()).collect()
        }
        _ => Vec::new(),
    }
}

fn locations(bindings: &[naga::Binding]) -> BTreeSet<u32> {
    bindings
        .iter()
        .filter_map(|b| match b {
            naga::Binding::Location { location, .. } => Some(*location),
            _ => None,
        })
        .collect()
}

/// Every argument of the vertex entry is either a builtin or a float
/// attribute at the quad's location.
fn check_vertex_inputs(unit: &CompiledStage, vs: &naga::EntryPoint) -> Result<(), ConfigurationError> {
    for arg in &vs.function.arguments {
        match &arg.binding {
            Some(naga::Binding::Location { location, .. }) => {
                check_quad_attribute(unit, *location, arg.ty)?;
            }
            Some(naga::Binding::BuiltIn(_)) => {}
            None => {
                let naga::TypeInner::Struct { members, .. } = &unit.module.types[arg.ty].inner else {
                    continue;
                };
                for member in members {
                    if let Some(naga::Binding::Location { location, .. }) = member.binding {
                        check_quad_attribute(unit, location, member.ty)?;
                    }
                }
            }
        }
    }
    Ok(())
}

fn check_quad_attribute(
    unit: &CompiledStage,
    location: u32,
    ty: naga::Handle<naga::Type>,
) -> Result<(), ConfigurationError> {
    if location != QUAD_LOCATION {
        return Err(link_failure(format!(
            "vertex input @location({location}) is not supplied; only @location({QUAD_LOCATION}) holds the quad position"
        )));
    }
    let float = match &unit.module.types[ty].inner {
        naga::TypeInner::Scalar(scalar) | naga::TypeInner::Vector { scalar, .. } => {
            scalar.kind == naga::ScalarKind::Float
        }
        _ => false,
    };
    if !float {
        return Err(link_failure(format!(
            "vertex input @location({location}) must be a float scalar or vector"
        )));
    }
    Ok(())
}

fn binding_kind(module: &naga::Module, global: &naga::GlobalVariable) -> Option<BindingKind> {
    match (global.space, &module.types[global.ty].inner) {
        (naga::AddressSpace::Uniform, _) => Some(BindingKind::Uniform),
        (
            naga::AddressSpace::Handle,
            naga::TypeInner::Image {
                dim: naga::ImageDimension::D2,
                arrayed: false,
                class:
                    naga::ImageClass::Sampled {
                        kind: naga::ScalarKind::Float,
                        multi: false,
                    },
            },
        ) => Some(BindingKind::Texture2d),
        (naga::AddressSpace::Handle, naga::TypeInner::Sampler { comparison: false }) => {
            Some(BindingKind::Sampler)
        }
        _ => None,
    }
}

fn check_resource_bindings(unit: &CompiledStage) -> Result<(), ConfigurationError> {
    let module = &unit.module;
    for (_, global) in module.global_variables.iter() {
        let Some(rb) = &global.binding else { continue };
        let expected = match LAYOUT.get(rb.binding as usize) {
            Some(kind) if rb.group == 0 => *kind,
            _ => {
                return Err(link_failure(format!(
                    "{} stage uses @group({}) @binding({}) which the render context does not provide",
                    unit.stage, rb.group, rb.binding
                )));
            }
        };

        let found = binding_kind(module, global);
        if found != Some(expected) {
            return Err(link_failure(format!(
                "{} stage declares @binding({}) as {}, but the render context binds {expected:?} there",
                unit.stage,
                rb.binding,
                found.map_or_else(|| "an unsupported resource".to_string(), |k| format!("{k:?}")),
            )));
        }

        if expected == BindingKind::Uniform {
            let size = module.types[global.ty].inner.size(module.to_ctx());
            let provided = std::mem::size_of::<FrameUniforms>() as u32;
            if size > provided {
                return Err(link_failure(format!(
                    "{} stage expects a {size}-byte frame uniform, but only {provided} bytes are bound",
                    unit.stage
                )));
            }
        }
    }
    Ok(())
}
