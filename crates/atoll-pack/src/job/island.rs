use std::path::{Path, PathBuf};

use atoll_chunk::{Chunk, ChunkHeader, IslandHeader, KindHeader};
use atoll_core::ContentHash;
use atoll_texture::decode::{load_image, load_raw_f32};
use atoll_texture::{encode_texture, quantize_r16, FloatImage, PixelFormat};
use serde::{Deserialize, Serialize};

use super::texture::texture_chunk;
use super::{read_chunk_file, write_chunk_file, ExportJob};
use crate::context::PackContext;
use crate::error::{IoContext, PackError};

pub const AMBIENT_OCCLUSION_FILE: &str = "AmbientOcclusion.r32";
pub const ELEVATION_FILE: &str = "Elevation.r32";
pub const COLOR_FILE: &str = "Color.exr";
pub const NORMALS_FILE: &str = "Normals.exr";

/// Source maps read from the directory holding the `.island` descriptor.
pub const INPUT_FILES: [&str; 4] = [
    AMBIENT_OCCLUSION_FILE,
    ELEVATION_FILE,
    COLOR_FILE,
    NORMALS_FILE,
];

const META_FILE: &str = "island.ron";

/// Contents of the `.island` descriptor.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct IslandDescriptor {
    pub width: u32,
    pub height: u32,
}

/// Values computed by the pre-export and read back by the export.
#[derive(Debug, Clone, Copy, PartialEq, Default, Serialize, Deserialize)]
struct IslandMeta {
    beach_elevation: f32,
}

/// One derived texture of an island.
#[derive(Debug, Clone, Copy)]
struct Artifact {
    input: &'static str,
    name: &'static str,
    format: PixelFormat,
    mips: bool,
}

const ARTIFACTS: [Artifact; 4] = [
    Artifact {
        input: AMBIENT_OCCLUSION_FILE,
        name: "ambient_occlusion",
        format: PixelFormat::Bc4,
        mips: true,
    },
    Artifact {
        input: COLOR_FILE,
        name: "color",
        format: PixelFormat::Bc7,
        mips: true,
    },
    Artifact {
        input: NORMALS_FILE,
        name: "normals",
        format: PixelFormat::Bc7,
        mips: true,
    },
    Artifact {
        input: ELEVATION_FILE,
        name: "elevation",
        format: PixelFormat::R16,
        mips: false,
    },
];

fn side_chunk(job: &ExportJob, artifact: &Artifact) -> PathBuf {
    job.side_dir().join(format!("{}.chunk", artifact.name))
}

fn read_descriptor(path: &Path) -> Result<IslandDescriptor, PackError> {
    let text = std::fs::read_to_string(path).at(path)?;
    ron::Options::default()
        .from_str(&text)
        .map_err(|e| PackError::format("island descriptor", path, e.to_string()))
}

/// Most common non-zero quantized elevation, as a normalized value. Ties
/// resolve to the lowest elevation; no land at all gives zero.
pub fn beach_elevation(elevation: &FloatImage) -> f32 {
    let mut histogram = vec![0u32; 1 << 16];
    for &v in &elevation.pixels {
        let q = quantize_r16(v);
        if q != 0 {
            histogram[q as usize] += 1;
        }
    }
    let mut best = 0usize;
    for (value, &count) in histogram.iter().enumerate().skip(1) {
        if count > histogram[best] {
            best = value;
        }
    }
    best as f32 / u16::MAX as f32
}

fn check_size(
    image: &FloatImage,
    descriptor: &IslandDescriptor,
    path: &Path,
) -> Result<(), PackError> {
    if (image.width, image.height) != (descriptor.width, descriptor.height) {
        return Err(PackError::format(
            "island map",
            path,
            format!(
                "{}x{} does not match the descriptor's {}x{}",
                image.width, image.height, descriptor.width, descriptor.height
            ),
        ));
    }
    Ok(())
}

/// Convert the source maps into texture chunks under the side directory.
/// Skipped while the stamp matches the present inputs and is newer than all
/// of them, unless `force` is set.
pub fn pre_export(job: &mut ExportJob, ctx: &PackContext, force: bool) -> Result<(), PackError> {
    if job.pre_export_current(force)? {
        log::debug!("{}: island artifacts up to date", job.scope());
        return Ok(());
    }

    let side = job.reset_side_dir()?;
    let descriptor = read_descriptor(&job.source)?;
    let dir = job.source.parent().unwrap_or(Path::new("")).to_path_buf();
    let mut meta = IslandMeta::default();

    for artifact in &ARTIFACTS {
        let input = dir.join(artifact.input);
        if !input.is_file() {
            log::warn!(
                "{}: {} missing, skipping {}",
                job.scope(),
                artifact.input,
                artifact.name
            );
            continue;
        }
        let image = if input.extension().is_some_and(|e| e == "r32") {
            load_raw_f32(&input, descriptor.width, descriptor.height)?
        } else {
            load_image(&input)?
        };
        check_size(&image, &descriptor, &input)?;
        if artifact.input == ELEVATION_FILE {
            meta.beach_elevation = beach_elevation(&image);
        }

        let levels = if artifact.mips { ctx.config.max_mip_levels } else { 1 };
        let encoded = encode_texture(vec![image], artifact.format, levels, &ctx.encoders)?;
        let path = format!("{}/{}", job.rel_path, artifact.name);
        let chunk = texture_chunk(job.flags, &path, encoded);
        write_chunk_file(&side_chunk(job, artifact), &[chunk])?;
    }

    let meta_path = side.join(META_FILE);
    let meta_text = ron::ser::to_string(&meta)
        .map_err(|e| PackError::format("island metadata", &meta_path, e.to_string()))?;
    std::fs::write(&meta_path, meta_text).at(&meta_path)?;
    job.write_pre_export_stamp()?;
    log::info!("{}: island artifacts rebuilt", job.scope());
    Ok(())
}

/// Aggregate the pre-exported artifacts into the island chunk plus one
/// texture chunk per present artifact.
pub fn export(job: &ExportJob) -> Result<Vec<Chunk>, PackError> {
    let descriptor = read_descriptor(&job.source)?;
    let meta_path = job.side_dir().join(META_FILE);
    let meta: IslandMeta = match std::fs::read_to_string(&meta_path) {
        Ok(text) => ron::Options::default()
            .from_str(&text)
            .map_err(|e| PackError::format("island metadata", &meta_path, e.to_string()))?,
        Err(e) if e.kind() == std::io::ErrorKind::NotFound => IslandMeta::default(),
        Err(source) => {
            return Err(PackError::Io {
                path: meta_path,
                source,
            })
        }
    };

    let mut textures = Vec::new();
    let mut hashes: [ContentHash; 4] = [0; 4];
    for (slot, artifact) in ARTIFACTS.iter().enumerate() {
        let path = side_chunk(job, artifact);
        if !path.is_file() {
            continue;
        }
        let mut chunks = read_chunk_file(&path)?;
        let chunk = chunks
            .pop()
            .ok_or_else(|| PackError::format("island artifact", &path, "empty chunk file"))?;
        hashes[slot] = chunk.header.content_hash;
        textures.push(chunk);
    }

    let header = IslandHeader {
        ambient_occlusion_hash: hashes[0],
        color_hash: hashes[1],
        normals_hash: hashes[2],
        elevation_hash: hashes[3],
        beach_elevation: meta.beach_elevation,
        width: descriptor.width,
        height: descriptor.height,
        _pad: 0,
    };
    let mut chunks = vec![Chunk::new(
        ChunkHeader::new(job.flags, &job.rel_path, KindHeader::Island(header)),
        Vec::new(),
    )];
    chunks.extend(textures);
    Ok(chunks)
}
