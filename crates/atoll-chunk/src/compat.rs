use std::fs::File;
use std::io::{Read, Seek, SeekFrom};
use std::path::Path;

use crate::codec::{decode_chunk_header, decode_data_header};
use crate::error::ChunkError;
use crate::format::{DataHeader, CHUNK_HEADER_SIZE, DATA_HEADER_SIZE, DATA_MAGIC, FORMAT_VERSION};

/// Why an existing output file cannot be reused incrementally.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum RebuildReason {
    Missing,
    Truncated(u64),
    BadMagic(i64),
    VersionMismatch { found: i64, expected: i64 },
    Corrupt(String),
}

impl std::fmt::Display for RebuildReason {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            RebuildReason::Missing => write!(f, "file is missing"),
            RebuildReason::Truncated(len) => write!(f, "file is truncated ({len} bytes)"),
            RebuildReason::BadMagic(found) => write!(f, "bad magic {found:#018x}"),
            RebuildReason::VersionMismatch { found, expected } => {
                write!(f, "format version {found}, packer writes {expected}")
            }
            RebuildReason::Corrupt(what) => write!(f, "file is corrupt: {what}"),
        }
    }
}

/// Compatibility of an existing output file with this packer build.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Compat {
    Current,
    NeedsRebuild(RebuildReason),
}

/// Validate magic and version of a decoded data header.
pub fn validate_data_header(header: &DataHeader) -> Result<(), ChunkError> {
    if header.magic != DATA_MAGIC {
        return Err(ChunkError::InvalidDataMagic {
            found: header.magic,
        });
    }
    if header.version != FORMAT_VERSION {
        return Err(ChunkError::UnsupportedVersion {
            found: header.version,
            expected: FORMAT_VERSION,
        });
    }
    Ok(())
}

/// Inspect an output file on disk: its header, then every chunk header in
/// turn. Payloads are skipped, not read. Anything short of a complete file
/// with the current version means a clean rebuild.
pub fn check_data_file(path: &Path) -> Result<Compat, ChunkError> {
    let mut file = match File::open(path) {
        Ok(f) => f,
        Err(e) if e.kind() == std::io::ErrorKind::NotFound => {
            return Ok(Compat::NeedsRebuild(RebuildReason::Missing))
        }
        Err(e) => return Err(e.into()),
    };

    let len = file.metadata()?.len();
    if len < DATA_HEADER_SIZE as u64 {
        return Ok(Compat::NeedsRebuild(RebuildReason::Truncated(len)));
    }

    let mut buf = [0u8; DATA_HEADER_SIZE];
    file.read_exact(&mut buf)?;
    let header = decode_data_header(&buf)?;

    match validate_data_header(&header) {
        Ok(()) => {}
        Err(ChunkError::InvalidDataMagic { found }) => {
            return Ok(Compat::NeedsRebuild(RebuildReason::BadMagic(found)))
        }
        Err(ChunkError::UnsupportedVersion { found, expected }) => {
            return Ok(Compat::NeedsRebuild(RebuildReason::VersionMismatch {
                found,
                expected,
            }))
        }
        Err(e) => return Err(e),
    }
    if header.chunk_count < 0 {
        return Ok(Compat::NeedsRebuild(RebuildReason::Corrupt(format!(
            "negative chunk count {}",
            header.chunk_count
        ))));
    }

    Ok(match walk_chunk_table(&mut file, len, header.chunk_count as u64)? {
        None => Compat::Current,
        Some(reason) => Compat::NeedsRebuild(reason),
    })
}

/// Step over `count` chunks from the end of the data header. The last chunk
/// must end exactly at `len`.
fn walk_chunk_table(
    file: &mut File,
    len: u64,
    count: u64,
) -> Result<Option<RebuildReason>, ChunkError> {
    let mut raw = vec![0u8; CHUNK_HEADER_SIZE];
    let mut offset = DATA_HEADER_SIZE as u64;
    for index in 0..count {
        if offset + CHUNK_HEADER_SIZE as u64 > len {
            return Ok(Some(RebuildReason::Truncated(len)));
        }
        file.seek(SeekFrom::Start(offset))?;
        file.read_exact(&mut raw)?;
        let header = match decode_chunk_header(&raw, 0) {
            Ok(h) => h,
            Err(e) => {
                return Ok(Some(RebuildReason::Corrupt(format!(
                    "chunk {index} at offset {offset}: {e}"
                ))))
            }
        };
        let end = header
            .payload_size
            .checked_add(15)
            .map(|size| size & !15)
            .and_then(|padded| padded.checked_add(offset + CHUNK_HEADER_SIZE as u64));
        match end {
            Some(end) if end <= len => offset = end,
            _ => return Ok(Some(RebuildReason::Truncated(len))),
        }
    }
    if offset != len {
        return Ok(Some(RebuildReason::Corrupt(format!(
            "{} trailing bytes after {count} chunk(s)",
            len - offset
        ))));
    }
    Ok(None)
}
