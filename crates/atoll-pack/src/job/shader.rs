use std::path::Path;

use atoll_chunk::{Chunk, ChunkHeader, KindHeader, ShaderBinding, ShaderHeader, VertexAttribute};
use atoll_core::constants::{MAX_SHADER_BINDINGS, MAX_VERTEX_ATTRIBUTES};
use atoll_core::AssetFlags;
use spirv_reflect::types::{ReflectDescriptorType, ReflectFormat};
use spirv_reflect::ShaderModule;

use super::ExportJob;
use crate::context::PackContext;
use crate::error::{IoContext, PackError};
use crate::toolchain::{run_tool, side_file, ToolArgs};

/// Pipeline stage, from the source file extension.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
#[repr(u32)]
pub enum ShaderStage {
    Vertex = 1,
    Fragment = 2,
    Compute = 3,
}

impl ShaderStage {
    pub fn from_extension(ext: &str) -> Option<Self> {
        match ext {
            "vert" => Some(ShaderStage::Vertex),
            "frag" => Some(ShaderStage::Fragment),
            "comp" => Some(ShaderStage::Compute),
            _ => None,
        }
    }

    /// Stage name as the compiler expects it.
    pub fn name(self) -> &'static str {
        match self {
            ShaderStage::Vertex => "vert",
            ShaderStage::Fragment => "frag",
            ShaderStage::Compute => "comp",
        }
    }

    pub fn flag(self) -> AssetFlags {
        match self {
            ShaderStage::Vertex => AssetFlags::VERTEX_STAGE,
            ShaderStage::Fragment => AssetFlags::FRAGMENT_STAGE,
            ShaderStage::Compute => AssetFlags::COMPUTE_STAGE,
        }
    }
}

/// One descriptor binding as reported by reflection.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct ReflectedBinding {
    pub set: u32,
    pub binding: u32,
    pub descriptor_type: u32,
    pub count: u32,
}

/// One stage input as reported by reflection. `format` is a Vulkan format
/// code, `size` its byte size.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct ReflectedInput {
    pub location: u32,
    pub format: u32,
    pub size: u32,
}

/// Location of inputs without a `location` decoration (built-ins).
const NO_LOCATION: u32 = u32::MAX;

/// Build the chunk header's binding table and vertex layout. Vertex inputs
/// are packed tightly in location order; other stages carry no layout.
pub fn build_shader_header(
    stage: ShaderStage,
    bindings: &[ReflectedBinding],
    inputs: &[ReflectedInput],
    path: &Path,
) -> Result<ShaderHeader, PackError> {
    let mut header = ShaderHeader {
        stage: stage as u32,
        ..ShaderHeader::default()
    };

    for b in bindings {
        if b.set != 0 {
            return Err(PackError::format(
                "shader",
                path,
                format!(
                    "binding {} uses descriptor set {}, only set 0 is supported",
                    b.binding, b.set
                ),
            ));
        }
        let slot = b.binding as usize;
        if slot >= MAX_SHADER_BINDINGS {
            return Err(PackError::format(
                "shader",
                path,
                format!("binding {} exceeds the maximum of {}", slot, MAX_SHADER_BINDINGS),
            ));
        }
        header.bindings[slot] = ShaderBinding {
            descriptor_type: b.descriptor_type,
            count: b.count.max(1),
        };
        header.binding_mask |= 1 << slot;
    }

    if stage == ShaderStage::Vertex {
        let mut inputs: Vec<ReflectedInput> = inputs
            .iter()
            .filter(|i| i.location != NO_LOCATION)
            .copied()
            .collect();
        inputs.sort_by_key(|i| i.location);
        if inputs.len() > MAX_VERTEX_ATTRIBUTES {
            return Err(PackError::format(
                "shader",
                path,
                format!(
                    "{} vertex inputs exceed the maximum of {}",
                    inputs.len(),
                    MAX_VERTEX_ATTRIBUTES
                ),
            ));
        }
        let mut offset = 0;
        for (i, input) in inputs.iter().enumerate() {
            header.attributes[i] = VertexAttribute {
                location: input.location,
                format: input.format,
                offset,
            };
            offset += input.size;
        }
        header.attribute_count = inputs.len() as u32;
        header.vertex_stride = offset;
    }

    Ok(header)
}

/// Descriptor type codes stored in `ShaderBinding`: Vulkan's
/// `VkDescriptorType` plus one, so zero can mean "unused".
fn descriptor_code(ty: &ReflectDescriptorType) -> Option<u32> {
    let vk = match ty {
        ReflectDescriptorType::Sampler => 0,
        ReflectDescriptorType::CombinedImageSampler => 1,
        ReflectDescriptorType::SampledImage => 2,
        ReflectDescriptorType::StorageImage => 3,
        ReflectDescriptorType::UniformTexelBuffer => 4,
        ReflectDescriptorType::StorageTexelBuffer => 5,
        ReflectDescriptorType::UniformBuffer => 6,
        ReflectDescriptorType::StorageBuffer => 7,
        ReflectDescriptorType::UniformBufferDynamic => 8,
        ReflectDescriptorType::StorageBufferDynamic => 9,
        ReflectDescriptorType::InputAttachment => 10,
        _ => return None,
    };
    Some(vk + 1)
}

/// Vulkan format code and byte size of a vertex input.
fn format_code(format: &ReflectFormat) -> Option<(u32, u32)> {
    Some(match format {
        ReflectFormat::R32_UINT => (98, 4),
        ReflectFormat::R32_SINT => (99, 4),
        ReflectFormat::R32_SFLOAT => (100, 4),
        ReflectFormat::R32G32_UINT => (101, 8),
        ReflectFormat::R32G32_SINT => (102, 8),
        ReflectFormat::R32G32_SFLOAT => (103, 8),
        ReflectFormat::R32G32B32_UINT => (104, 12),
        ReflectFormat::R32G32B32_SINT => (105, 12),
        ReflectFormat::R32G32B32_SFLOAT => (106, 12),
        ReflectFormat::R32G32B32A32_UINT => (107, 16),
        ReflectFormat::R32G32B32A32_SINT => (108, 16),
        ReflectFormat::R32G32B32A32_SFLOAT => (109, 16),
        _ => return None,
    })
}

/// Reflect a SPIR-V binary into the chunk header.
pub fn reflect_spirv(
    spirv: &[u8],
    stage: ShaderStage,
    path: &Path,
) -> Result<ShaderHeader, PackError> {
    let fail = |message: String| PackError::Reflection {
        path: path.to_path_buf(),
        message,
    };
    let module = ShaderModule::load_u8_data(spirv).map_err(|e| fail(e.to_string()))?;

    let mut bindings = Vec::new();
    for b in module
        .enumerate_descriptor_bindings(None)
        .map_err(|e| fail(e.to_string()))?
    {
        let descriptor_type = descriptor_code(&b.descriptor_type).ok_or_else(|| {
            fail(format!("unsupported descriptor type at binding {}", b.binding))
        })?;
        bindings.push(ReflectedBinding {
            set: b.set,
            binding: b.binding,
            descriptor_type,
            count: b.count,
        });
    }

    let mut inputs = Vec::new();
    if stage == ShaderStage::Vertex {
        for var in module
            .enumerate_input_variables(None)
            .map_err(|e| fail(e.to_string()))?
        {
            if var.location == NO_LOCATION {
                continue;
            }
            let (format, size) = format_code(&var.format).ok_or_else(|| {
                fail(format!("unsupported format at location {}", var.location))
            })?;
            inputs.push(ReflectedInput {
                location: var.location,
                format,
                size,
            });
        }
    }

    build_shader_header(stage, &bindings, &inputs, path)
}

pub fn export(
    job: &ExportJob,
    stage: ShaderStage,
    ctx: &PackContext,
) -> Result<Vec<Chunk>, PackError> {
    let include = ctx.paths.shader_include_dir();
    let preprocessed = side_file(&job.intermediate, "pp.glsl");
    let compiled = side_file(&job.intermediate, "spv");

    run_tool(
        "preprocessor",
        &ctx.toolchain.preprocessor,
        &ToolArgs {
            input: Some(&job.source),
            output: Some(&preprocessed),
            include: Some(&include),
            stage: Some(stage.name()),
        },
    )?;
    run_tool(
        "shader compiler",
        &ctx.toolchain.shader_compiler,
        &ToolArgs {
            input: Some(&preprocessed),
            output: Some(&compiled),
            include: Some(&include),
            stage: Some(stage.name()),
        },
    )?;

    let spirv = std::fs::read(&compiled).at(&compiled)?;
    let header = reflect_spirv(&spirv, stage, &job.source)?;
    log::debug!(
        "{}: {} bytes of SPIR-V, {} binding(s), {} attribute(s)",
        job.scope(),
        spirv.len(),
        header.binding_mask.count_ones(),
        header.attribute_count
    );

    let header = ChunkHeader::new(job.flags, &job.rel_path, KindHeader::Shader(header));
    Ok(vec![Chunk::new(header, spirv)])
}
