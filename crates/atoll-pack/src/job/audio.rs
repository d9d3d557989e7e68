use atoll_chunk::{Chunk, ChunkHeader, KindHeader};

use super::ExportJob;
use crate::context::PackContext;
use crate::error::{IoContext, PackError};
use crate::toolchain::{run_tool, side_file, ToolArgs};

/// Encode a `.wav` to ADPCM with the external encoder. Audio chunks carry
/// no kind header; the payload is the encoded file.
pub fn export(job: &ExportJob, ctx: &PackContext) -> Result<Vec<Chunk>, PackError> {
    let encoded = side_file(&job.intermediate, "adpcm");
    run_tool(
        "audio encoder",
        &ctx.toolchain.audio_encoder,
        &ToolArgs {
            input: Some(&job.source),
            output: Some(&encoded),
            ..ToolArgs::default()
        },
    )?;

    let source_len = std::fs::metadata(&job.source).at(&job.source)?.len();
    let payload = std::fs::read(&encoded).at(&encoded)?;
    check_compressed(job, source_len, payload.len() as u64)?;
    log::debug!(
        "{}: {} -> {} bytes",
        job.scope(),
        source_len,
        payload.len()
    );

    let header = ChunkHeader::new(job.flags, &job.rel_path, KindHeader::None);
    Ok(vec![Chunk::new(header, payload)])
}

fn check_compressed(job: &ExportJob, source_len: u64, encoded_len: u64) -> Result<(), PackError> {
    if encoded_len >= source_len {
        return Err(PackError::Toolchain {
            tool: "audio encoder",
            input: job.source.clone(),
            message: format!(
                "encoded size {encoded_len} is not smaller than source size {source_len}"
            ),
        });
    }
    Ok(())
}
