//! Export jobs: one per source asset, discovered by walking the content
//! trees and dispatched by kind.

pub mod audio;
pub mod font;
pub mod gltf;
pub mod island;
pub mod model;
pub mod shader;
pub mod texture;

use std::collections::{HashMap, HashSet};
use std::path::{Path, PathBuf};
use std::time::{Duration, SystemTime};

use atoll_chunk::{
    read_data_file, serialize_chunk, serialize_data_file, Chunk, ChunkError, FORMAT_VERSION,
};
use atoll_core::{normalize_rel_path, AssetFlags, AssetKind, ContentHash, ContentRoot};
use atoll_texture::PixelFormat;
use serde::{Deserialize, Serialize};
use walkdir::WalkDir;

use crate::context::{LogScope, PackContext};
use crate::error::{IoContext, PackError};
use crate::resolver::ContentPaths;

pub use self::shader::ShaderStage;
pub use self::texture::TextureSource;

/// Per-kind job data.
#[derive(Debug, Clone, PartialEq)]
pub enum JobKind {
    Audio,
    Font,
    Gltf,
    Island,
    Model,
    Shader(ShaderStage),
    Texture(TextureSource),
}

impl JobKind {
    pub fn asset_kind(&self) -> AssetKind {
        match self {
            JobKind::Audio => AssetKind::Audio,
            JobKind::Font => AssetKind::Font,
            JobKind::Gltf => AssetKind::Gltf,
            JobKind::Island => AssetKind::Island,
            JobKind::Model => AssetKind::Model,
            JobKind::Shader(_) => AssetKind::Shader,
            JobKind::Texture(_) => AssetKind::Texture,
        }
    }
}

/// Entry of the generated hash table.
#[derive(Debug, Clone, PartialEq)]
pub struct AssetEntry {
    pub path: String,
    pub hash: ContentHash,
    pub flags: AssetFlags,
}

/// A job's serialized chunks, split by destination file.
#[derive(Debug, Clone, Default)]
pub struct ExportOutput {
    pub data: Vec<u8>,
    pub data_chunks: usize,
    pub textures: Vec<u8>,
    pub texture_chunks: usize,
    pub assets: Vec<AssetEntry>,
}

impl ExportOutput {
    pub fn from_chunks(chunks: &[Chunk]) -> Result<Self, ChunkError> {
        let mut out = ExportOutput::default();
        for chunk in chunks {
            let bytes = serialize_chunk(&chunk.header, &chunk.payload)?;
            if chunk.header.flags.is_texture() {
                out.textures.extend_from_slice(&bytes);
                out.texture_chunks += 1;
            } else {
                out.data.extend_from_slice(&bytes);
                out.data_chunks += 1;
            }
            out.assets.push(AssetEntry {
                path: chunk.header.path.clone(),
                hash: chunk.header.content_hash,
                flags: chunk.header.flags,
            });
        }
        Ok(out)
    }
}

/// Written last into a side directory by a finished pre-export.
pub(crate) const PRE_EXPORT_STAMP: &str = "pre_export.ron";

/// What the artifacts in a side directory were built from.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub(crate) struct PreExportStamp {
    pub format_version: i64,
    /// File names of the inputs that existed at the time.
    pub inputs: Vec<String>,
}

/// One source asset to convert.
#[derive(Debug)]
pub struct ExportJob {
    pub index: usize,
    pub kind: JobKind,
    pub flags: AssetFlags,
    pub source: PathBuf,
    pub rel_path: String,
    pub root: ContentRoot,
    pub intermediate: PathBuf,
    /// Further source files that feed this job (cubemap faces, island maps).
    pub inputs: Vec<PathBuf>,
    pub dirty: bool,
    pub output: Option<ExportOutput>,
    pub elapsed: Duration,
}

impl ExportJob {
    pub fn new(
        kind: JobKind,
        flags: AssetFlags,
        source: PathBuf,
        rel_path: String,
        root: ContentRoot,
        paths: &ContentPaths,
    ) -> Self {
        let flags = flags
            .with_kind(kind.asset_kind())
            .with_if(AssetFlags::GAME, root == ContentRoot::Game);
        let intermediate = paths.intermediate_file(root, &rel_path);
        Self {
            index: 0,
            kind,
            flags,
            source,
            rel_path,
            root,
            intermediate,
            inputs: Vec::new(),
            dirty: true,
            output: None,
            elapsed: Duration::ZERO,
        }
    }

    pub fn scope(&self) -> LogScope<'_> {
        LogScope {
            index: self.index,
            path: &self.rel_path,
        }
    }

    /// Newest modification time among the source and its inputs. Inputs
    /// that do not exist are ignored.
    pub fn source_mtime(&self) -> Result<SystemTime, PackError> {
        let mut newest = modified(&self.source)?;
        for input in &self.inputs {
            if let Ok(t) = std::fs::metadata(input).and_then(|m| m.modified()) {
                newest = newest.max(t);
            }
        }
        Ok(newest)
    }

    /// Derived artifacts live next to the intermediate chunk file.
    pub fn side_dir(&self) -> PathBuf {
        crate::toolchain::side_file(&self.intermediate, "d")
    }

    /// Expensive per-source work memoized across runs. `force` discards the
    /// memoized artifacts.
    pub fn pre_export(&mut self, ctx: &PackContext, force: bool) -> Result<(), PackError> {
        match &self.kind {
            JobKind::Gltf => gltf::pre_export(self, ctx, force),
            JobKind::Island => island::pre_export(self, ctx, force),
            _ => Ok(()),
        }
    }

    /// Stamp file of the pre-export, for kinds that have one.
    pub fn pre_export_stamp(&self) -> Option<PathBuf> {
        match self.kind {
            JobKind::Gltf | JobKind::Island => Some(self.side_dir().join(PRE_EXPORT_STAMP)),
            _ => None,
        }
    }

    fn current_stamp(&self) -> PreExportStamp {
        let inputs = self
            .inputs
            .iter()
            .filter(|p| p.is_file())
            .filter_map(|p| p.file_name())
            .map(|n| n.to_string_lossy().into_owned())
            .collect();
        PreExportStamp {
            format_version: FORMAT_VERSION,
            inputs,
        }
    }

    /// Whether the side directory can be reused as is: not forced, stamped
    /// by this format version from the same set of inputs, and newer than
    /// every source.
    pub(crate) fn pre_export_current(&self, force: bool) -> Result<bool, PackError> {
        let Some(path) = self.pre_export_stamp() else {
            return Ok(false);
        };
        if force {
            return Ok(false);
        }
        let text = match std::fs::read_to_string(&path) {
            Ok(text) => text,
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => return Ok(false),
            Err(source) => return Err(PackError::Io { path, source }),
        };
        let stamp: PreExportStamp = match ron::Options::default().from_str(&text) {
            Ok(stamp) => stamp,
            Err(e) => {
                log::warn!("{}: unreadable {}: {}", self.scope(), path.display(), e);
                return Ok(false);
            }
        };
        let current = self.current_stamp();
        if stamp != current {
            log::info!(
                "{}: pre-export was built from {:?}, now {:?}",
                self.scope(),
                stamp,
                current
            );
            return Ok(false);
        }
        Ok(modified(&path)? >= self.source_mtime()?)
    }

    /// Empty the side directory before regenerating it.
    pub(crate) fn reset_side_dir(&self) -> Result<PathBuf, PackError> {
        let side = self.side_dir();
        if side.exists() {
            std::fs::remove_dir_all(&side).at(&side)?;
        }
        std::fs::create_dir_all(&side).at(&side)?;
        Ok(side)
    }

    pub(crate) fn write_pre_export_stamp(&self) -> Result<(), PackError> {
        let Some(path) = self.pre_export_stamp() else {
            return Ok(());
        };
        let text = ron::ser::to_string(&self.current_stamp())
            .map_err(|e| PackError::format("pre-export stamp", &path, e.to_string()))?;
        std::fs::write(&path, text).at(&path)
    }

    /// Build this job's chunks from its source.
    pub fn export(&self, ctx: &PackContext) -> Result<Vec<Chunk>, PackError> {
        match &self.kind {
            JobKind::Audio => audio::export(self, ctx),
            JobKind::Font => font::export(self),
            JobKind::Gltf => gltf::export(self, ctx),
            JobKind::Island => island::export(self),
            JobKind::Model => model::export(self),
            JobKind::Shader(stage) => shader::export(self, *stage, ctx),
            JobKind::Texture(source) => texture::export(self, source, ctx),
        }
    }

    /// Export when dirty and persist the intermediate; otherwise load the
    /// intermediate verbatim.
    pub fn run_export(&mut self, ctx: &PackContext) -> Result<(), PackError> {
        let chunks = if self.dirty {
            let chunks = self.export(ctx)?;
            write_chunk_file(&self.intermediate, &chunks)?;
            log::info!("{}: exported {} chunk(s)", self.scope(), chunks.len());
            chunks
        } else {
            log::debug!("{}: up to date", self.scope());
            read_chunk_file(&self.intermediate)?
        };
        self.output = Some(ExportOutput::from_chunks(&chunks)?);
        Ok(())
    }
}

pub(crate) fn modified(path: &Path) -> Result<SystemTime, PackError> {
    std::fs::metadata(path).and_then(|m| m.modified()).at(path)
}

/// Persist chunks as a mini data file.
pub(crate) fn write_chunk_file(path: &Path, chunks: &[Chunk]) -> Result<(), PackError> {
    if let Some(parent) = path.parent() {
        std::fs::create_dir_all(parent).at(parent)?;
    }
    let bytes = serialize_data_file(chunks)?;
    std::fs::write(path, bytes).at(path)
}

pub(crate) fn read_chunk_file(path: &Path) -> Result<Vec<Chunk>, PackError> {
    let bytes = std::fs::read(path).at(path)?;
    let file = read_data_file(&bytes)?;
    Ok(file.chunks.iter().map(|c| c.to_owned_chunk()).collect())
}

const FACE_SUFFIXES: [&str; 6] = ["_px", "_nx", "_py", "_ny", "_pz", "_nz"];

/// Filename split into stem, tags and extension:
/// `grass.bc7.png` → (`grass`, [`bc7`], `png`).
pub(crate) fn split_name(name: &str) -> (&str, Vec<&str>, &str) {
    let parts: Vec<&str> = name.split('.').collect();
    match parts.len() {
        0 | 1 => (name, Vec::new(), ""),
        n => (parts[0], parts[1..n - 1].to_vec(), parts[n - 1]),
    }
}

/// Classification of one discovered file.
struct Discovered {
    kind: JobKind,
    flags: AssetFlags,
    rel_path: String,
    inputs: Vec<PathBuf>,
}

fn classify(path: &Path, rel_path: &str) -> Option<Discovered> {
    let name = rel_path.rsplit('/').next().unwrap_or(rel_path);
    let (stem, tags, ext) = split_name(name);
    let mut flags = AssetFlags::EMPTY;
    let mut inputs = Vec::new();
    let mut rel_path = rel_path.to_string();

    let kind = match ext {
        "wav" => JobKind::Audio,
        "fnt" => JobKind::Font,
        "gltf" | "glb" => JobKind::Gltf,
        "island" => {
            let dir = path.parent().unwrap_or(Path::new(""));
            inputs = island::INPUT_FILES.iter().map(|f| dir.join(f)).collect();
            JobKind::Island
        }
        "obj" | "mesh" => {
            flags = flags.with_if(AssetFlags::FLAT_NORMALS, tags.contains(&"flat"));
            JobKind::Model
        }
        "vert" | "frag" | "comp" => {
            let stage = ShaderStage::from_extension(ext)?;
            flags = stage.flag();
            JobKind::Shader(stage)
        }
        "ktx" => JobKind::Texture(TextureSource::Ktx),
        "png" | "jpg" | "jpeg" | "tga" | "bmp" | "exr" | "hdr" => {
            let format = tags
                .iter()
                .find_map(|t| match *t {
                    "bc7" | "bc4" | "r16_unorm" | "raw" => PixelFormat::from_tag(t),
                    _ => None,
                })
                .unwrap_or(if matches!(ext, "exr" | "hdr") {
                    PixelFormat::R16G16B16A16F
                } else {
                    PixelFormat::R8G8B8A8
                });
            let mips = !tags.contains(&"raw");

            // Sibling names keep the on-disk case; lowercasing preserves
            // byte offsets.
            let disk_name = path.file_name().and_then(|n| n.to_str()).unwrap_or(name);
            let base = stem.len().saturating_sub(3);
            let face_name = |suffix: &str| {
                format!("{}{}{}", &disk_name[..base], suffix, &disk_name[stem.len()..])
            };
            match FACE_SUFFIXES.iter().position(|s| stem.ends_with(s)) {
                Some(0) => {
                    inputs = FACE_SUFFIXES
                        .iter()
                        .map(|s| path.with_file_name(face_name(s)))
                        .collect();
                    let dir_len = rel_path.len() - name.len();
                    rel_path = format!(
                        "{}{}{}",
                        &rel_path[..dir_len],
                        &stem[..base],
                        &name[stem.len()..]
                    );
                    flags = AssetFlags::CUBEMAP;
                    JobKind::Texture(TextureSource::Cubemap { format })
                }
                // Other faces are consumed by the `_px` face when one exists.
                Some(_) if path.with_file_name(face_name("_px")).is_file() => return None,
                _ => JobKind::Texture(TextureSource::Image { format, mips }),
            }
        }
        _ => return None,
    };

    if matches!(kind, JobKind::Texture(_)) {
        flags = flags.with_if(AssetFlags::UI, rel_path.starts_with("ui/"));
    }
    Some(Discovered {
        kind,
        flags,
        rel_path,
        inputs,
    })
}

/// Walk both content trees and build the job list in enumeration order:
/// engine first, then game, each sorted by path. A game asset with the
/// same relative path as an engine asset replaces it in place.
pub fn discover_jobs(paths: &ContentPaths) -> Result<Vec<ExportJob>, PackError> {
    let mut jobs: Vec<ExportJob> = Vec::new();
    let mut by_path: HashMap<String, usize> = HashMap::new();

    for root in [ContentRoot::Engine, ContentRoot::Game] {
        let dir = paths.root(root);
        if !dir.is_dir() {
            log::warn!("{} content directory {} not found", root.name(), dir.display());
            continue;
        }

        let mut files = Vec::new();
        for entry in WalkDir::new(dir).sort_by_file_name() {
            let entry = entry.map_err(|e| PackError::Io {
                path: dir.to_path_buf(),
                source: e.into(),
            })?;
            if entry.file_type().is_file() && !entry.path().starts_with(&paths.output) {
                files.push(entry.into_path());
            }
        }

        let island_dirs: HashSet<PathBuf> = files
            .iter()
            .filter(|f| f.extension().is_some_and(|e| e.eq_ignore_ascii_case("island")))
            .filter_map(|f| f.parent().map(Path::to_path_buf))
            .collect();

        for file in files {
            let is_island = file.extension().is_some_and(|e| e.eq_ignore_ascii_case("island"));
            if !is_island && file.parent().is_some_and(|p| island_dirs.contains(p)) {
                continue;
            }
            let rel = normalize_rel_path(dir, &file)?;
            let Some(found) = classify(&file, &rel) else {
                log::trace!("Skipping {}", rel);
                continue;
            };

            let mut job = ExportJob::new(
                found.kind,
                found.flags,
                file,
                found.rel_path,
                root,
                paths,
            );
            job.inputs = found.inputs;

            match by_path.get(&job.rel_path) {
                Some(&i) => {
                    log::info!("{} overrides {} asset", job.rel_path, jobs[i].root.name());
                    jobs[i] = job;
                }
                None => {
                    by_path.insert(job.rel_path.clone(), jobs.len());
                    jobs.push(job);
                }
            }
        }
    }

    for (i, job) in jobs.iter_mut().enumerate() {
        job.index = i;
    }
    log::info!("Discovered {} job(s)", jobs.len());
    Ok(jobs)
}
