use std::path::Path;

use atoll_chunk::{read_data_file, ChunkError, ChunkIndex};
use serde::{Deserialize, Serialize};

use crate::error::{IoContext, PackError};
use crate::scheduler::PackRun;

/// One job's line in the build report.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct JobReport {
    pub index: usize,
    pub path: String,
    pub root: String,
    pub kind: String,
    pub dirty: bool,
    pub chunks: usize,
    pub data_bytes: usize,
    pub texture_bytes: usize,
    pub millis: f64,
}

/// JSON summary of a packer run.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct BuildReport {
    pub force_clean: bool,
    pub dirty: usize,
    pub wrote_outputs: bool,
    pub data_chunks: usize,
    pub texture_chunks: usize,
    pub jobs: Vec<JobReport>,
}

impl BuildReport {
    pub fn from_run(run: &PackRun) -> Self {
        let jobs = run
            .jobs
            .iter()
            .map(|job| {
                let (chunks, data_bytes, texture_bytes) =
                    job.output.as_ref().map_or((0, 0, 0), |o| {
                        (o.data_chunks + o.texture_chunks, o.data.len(), o.textures.len())
                    });
                JobReport {
                    index: job.index,
                    path: job.rel_path.clone(),
                    root: job.root.name().to_string(),
                    kind: job.kind.asset_kind().name().to_string(),
                    dirty: job.dirty,
                    chunks,
                    data_bytes,
                    texture_bytes,
                    millis: job.elapsed.as_secs_f64() * 1000.0,
                }
            })
            .collect();

        let written = run.written.as_ref();
        Self {
            force_clean: run.force_clean,
            dirty: run.dirty,
            wrote_outputs: written.is_some(),
            data_chunks: written.map_or(0, |w| w.data_chunks),
            texture_chunks: written.map_or(0, |w| w.texture_chunks),
            jobs,
        }
    }
}

/// Save a report as pretty JSON.
pub fn save_report(path: &Path, report: &BuildReport) -> Result<(), PackError> {
    if let Some(parent) = path.parent() {
        std::fs::create_dir_all(parent).at(parent)?;
    }
    let json = serde_json::to_string_pretty(report)?;
    std::fs::write(path, json).at(path)
}

/// Format the chunk index of a packed data file as a markdown table.
pub fn format_listing(bytes: &[u8]) -> Result<String, ChunkError> {
    let file = read_data_file(bytes)?;
    let mut out = String::new();
    out.push_str("| # | Offset | Hash | Kind | Flags | Size | Path |\n");
    out.push_str("|---|--------|------|------|-------|------|------|\n");
    for (i, chunk) in file.chunks.iter().enumerate() {
        let h = &chunk.header;
        out.push_str(&format!(
            "| {} | {} | {:016x} | {} | {:#x} | {} | {} |\n",
            i,
            chunk.offset,
            h.content_hash,
            h.kind.name(),
            h.flags.0,
            h.payload_size,
            h.path
        ));
    }
    let total = file.chunks.len();
    let index = ChunkIndex::build(file.chunks);
    out.push_str(&format!("\n{} chunk(s), {} unique hash(es)\n", total, index.len()));
    Ok(out)
}
