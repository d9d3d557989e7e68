use std::collections::HashMap;
use std::fmt::Write as _;
use std::fs::File;
use std::io::BufWriter;
use std::path::{Path, PathBuf};

use atoll_chunk::DataFileWriter;
use atoll_core::AssetFlags;

use crate::context::PackContext;
use crate::error::{IoContext, PackError};
use crate::job::{AssetEntry, ExportJob};
use crate::toolchain::side_file;

/// What the writer produced.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct WriteSummary {
    pub data_chunks: usize,
    pub texture_chunks: usize,
    pub data_bytes: u64,
    pub texture_bytes: u64,
    pub header_changed: bool,
}

fn temp_path(path: &Path) -> PathBuf {
    side_file(path, "tmp")
}

fn write_temp_files(
    jobs: &[ExportJob],
    data_tmp: &Path,
    texture_tmp: &Path,
) -> Result<WriteSummary, PackError> {
    let data_file = File::create(data_tmp).at(data_tmp)?;
    let texture_file = File::create(texture_tmp).at(texture_tmp)?;
    let mut data = DataFileWriter::new(BufWriter::new(data_file))?;
    let mut textures = DataFileWriter::new(BufWriter::new(texture_file))?;

    for job in jobs {
        let output = job.output.as_ref().ok_or_else(|| PackError::MissingOutput {
            path: job.rel_path.clone(),
        })?;
        data.append_serialized(&output.data, output.data_chunks)?;
        textures.append_serialized(&output.textures, output.texture_chunks)?;
    }

    let summary = WriteSummary {
        data_chunks: data.chunk_count(),
        texture_chunks: textures.chunk_count(),
        data_bytes: data.bytes_written(),
        texture_bytes: textures.bytes_written(),
        header_changed: false,
    };
    data.finish()?;
    textures.finish()?;
    Ok(summary)
}

/// Move the temp files into place. The data file goes first out of the way
/// and comes back last, so a failure part way leaves it missing and the next
/// run rebuilds both outputs instead of pairing it with a stale texture file.
fn replace_outputs(
    data_tmp: &Path,
    data_path: &Path,
    texture_tmp: &Path,
    texture_path: &Path,
) -> Result<(), PackError> {
    match std::fs::remove_file(data_path) {
        Ok(()) => {}
        Err(e) if e.kind() == std::io::ErrorKind::NotFound => {}
        Err(source) => {
            return Err(PackError::Io {
                path: data_path.to_path_buf(),
                source,
            })
        }
    }
    std::fs::rename(texture_tmp, texture_path).at(texture_path)?;
    std::fs::rename(data_tmp, data_path).at(data_path)
}

/// Stream every job's chunks into temp files in enumeration order, then
/// move them over the real outputs and refresh the generated header.
/// On failure the temp files are removed and the old outputs survive.
pub fn write_outputs(ctx: &PackContext, jobs: &[ExportJob]) -> Result<WriteSummary, PackError> {
    let data_path = ctx.paths.data_file();
    let texture_path = ctx.paths.texture_file();
    let data_tmp = temp_path(&data_path);
    let texture_tmp = temp_path(&texture_path);
    std::fs::create_dir_all(&ctx.paths.output).at(&ctx.paths.output)?;

    let mut summary = match write_temp_files(jobs, &data_tmp, &texture_tmp) {
        Ok(summary) => summary,
        Err(e) => {
            let _ = std::fs::remove_file(&data_tmp);
            let _ = std::fs::remove_file(&texture_tmp);
            return Err(e);
        }
    };

    if let Err(e) = replace_outputs(&data_tmp, &data_path, &texture_tmp, &texture_path) {
        let _ = std::fs::remove_file(&data_tmp);
        let _ = std::fs::remove_file(&texture_tmp);
        return Err(e);
    }
    log::info!(
        "Wrote {} ({} chunks, {} bytes) and {} ({} chunks, {} bytes)",
        data_path.display(),
        summary.data_chunks,
        summary.data_bytes,
        texture_path.display(),
        summary.texture_chunks,
        summary.texture_bytes
    );

    let assets: Vec<&AssetEntry> = jobs
        .iter()
        .filter_map(|j| j.output.as_ref())
        .flat_map(|o| o.assets.iter())
        .collect();
    let header = generate_header(&assets);
    summary.header_changed = write_if_changed(&ctx.paths.header_file(), &header)?;
    Ok(summary)
}

/// Write `text` unless the file already holds exactly that. Returns whether
/// the file was written.
pub fn write_if_changed(path: &Path, text: &str) -> Result<bool, PackError> {
    if std::fs::read_to_string(path).is_ok_and(|old| old == text) {
        log::debug!("{} unchanged", path.display());
        return Ok(false);
    }
    std::fs::write(path, text).at(path)?;
    log::info!("Wrote {}", path.display());
    Ok(true)
}

/// C++ identifier for an asset path: `ui/button.png` → `UI_BUTTON_PNG`.
pub fn identifier(path: &str) -> String {
    let mut id: String = path
        .chars()
        .map(|c| {
            if c.is_ascii_alphanumeric() {
                c.to_ascii_uppercase()
            } else {
                '_'
            }
        })
        .collect();
    if id.is_empty() || id.starts_with(|c: char| c.is_ascii_digit()) {
        id.insert(0, '_');
    }
    id
}

fn hash_array(out: &mut String, name: &str, ids: &[&str]) {
    let _ = writeln!(out, "constexpr uint64_t {name}[] = {{");
    if ids.is_empty() {
        out.push_str("    0,\n");
    }
    for id in ids {
        let _ = writeln!(out, "    {id},");
    }
    out.push_str("};\n");
    let _ = writeln!(out, "constexpr size_t {name}Count = {};\n", ids.len());
}

/// The generated table of content-hash constants.
pub fn generate_header(assets: &[&AssetEntry]) -> String {
    let mut out = String::new();
    out.push_str("// Generated by the atoll packer. Do not edit.\n");
    out.push_str("#pragma once\n\n");
    out.push_str("#include <cstddef>\n#include <cstdint>\n\n");
    out.push_str("namespace atoll::assets {\n\n");

    let mut seen: HashMap<String, usize> = HashMap::new();
    let mut textures = Vec::new();
    let mut ui_textures = Vec::new();
    let mut ids = Vec::with_capacity(assets.len());
    for asset in assets {
        let base = identifier(&asset.path);
        let n = seen.entry(base.clone()).or_insert(0);
        *n += 1;
        let id = if *n == 1 { base } else { format!("{base}_{n}") };
        let _ = writeln!(
            out,
            "constexpr uint64_t {} = {:#018x}ull; // {}",
            id, asset.hash, asset.path
        );
        ids.push((id, asset.flags));
    }
    out.push('\n');

    for (id, flags) in &ids {
        if flags.is_texture() {
            textures.push(id.as_str());
            if flags.contains(AssetFlags::UI) {
                ui_textures.push(id.as_str());
            }
        }
    }
    hash_array(&mut out, "kTextureHashes", &textures);
    hash_array(&mut out, "kUiTextureHashes", &ui_textures);

    out.push_str("} // namespace atoll::assets\n");
    out
}
