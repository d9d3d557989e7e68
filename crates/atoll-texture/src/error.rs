use std::path::PathBuf;

/// Errors raised while decoding, filtering or encoding textures.
#[derive(Debug, thiserror::Error)]
pub enum TextureError {
    #[error("failed to decode image {path}: {source}")]
    Decode {
        path: PathBuf,
        #[source]
        source: image::ImageError,
    },

    #[error("io error on {path}: {source}")]
    Io {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    #[error("raw float image has {actual} bytes, expected {expected} for {width}x{height}")]
    RawSizeMismatch {
        width: u32,
        height: u32,
        expected: usize,
        actual: usize,
    },

    #[error("{format:?} needs dimensions that are multiples of 4, got {width}x{height}")]
    NotBlockAligned {
        format: crate::format::PixelFormat,
        width: u32,
        height: u32,
    },

    #[error("{format:?} encoder produced {actual} bytes for {width}x{height}, expected {expected}")]
    EncodedSize {
        format: crate::format::PixelFormat,
        width: u32,
        height: u32,
        expected: usize,
        actual: usize,
    },

    #[error("texture layers disagree: {0}")]
    LayerMismatch(String),

    #[error("empty image")]
    Empty,

    #[error("invalid KTX container: {0}")]
    Ktx(String),
}
