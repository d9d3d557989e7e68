use atoll_core::AssetFlags;

/// Errors that can occur while encoding or decoding packed data files.
#[derive(Debug, thiserror::Error)]
pub enum ChunkError {
    #[error("bad data file magic {found:#018x}")]
    InvalidDataMagic { found: i64 },

    #[error("bad chunk magic {found:#018x} at offset {offset} (file is corrupt)")]
    InvalidChunkMagic { offset: usize, found: i64 },

    #[error("unsupported data format version {found} (expected {expected})")]
    UnsupportedVersion { found: i64, expected: i64 },

    #[error("truncated data: expected {expected} bytes, got {actual}")]
    Truncated { expected: usize, actual: usize },

    #[error("chunk path exceeds {max} bytes: {path}")]
    PathTooLong { path: String, max: usize },

    #[error("chunk path is not valid UTF-8 at offset {0}")]
    InvalidPath(usize),

    #[error("flags {0:?} do not name exactly one asset kind")]
    UnknownKind(AssetFlags),

    #[error("kind header {header} does not match flags {flags:?}")]
    KindMismatch {
        header: &'static str,
        flags: AssetFlags,
    },

    #[error("negative size field {0}")]
    NegativeSize(i64),

    #[error("LZ4 decompression failed: {0}")]
    DecompressError(String),

    #[error("io: {0}")]
    Io(#[from] std::io::Error),
}
