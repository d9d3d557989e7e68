use std::path::{Path, PathBuf};

use thiserror::Error;

/// Errors surfaced by export jobs, the scheduler and the output writer.
#[derive(Debug, Error)]
pub enum PackError {
    #[error("io error on {path}: {source}")]
    Io {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    #[error(transparent)]
    Core(#[from] atoll_core::CoreError),

    #[error(transparent)]
    Chunk(#[from] atoll_chunk::ChunkError),

    #[error(transparent)]
    Texture(#[from] atoll_texture::TextureError),

    #[error("glTF error in {path}: {source}")]
    Gltf {
        path: PathBuf,
        #[source]
        source: gltf::Error,
    },

    #[error("OBJ error in {path}: {source}")]
    Obj {
        path: PathBuf,
        #[source]
        source: tobj::LoadError,
    },

    #[error("failed to parse config {path}: {message}")]
    Config { path: PathBuf, message: String },

    #[error("{tool} failed on {input}: {message}")]
    Toolchain {
        tool: &'static str,
        input: PathBuf,
        message: String,
    },

    #[error("invalid {what} in {path}: {message}")]
    Format {
        what: &'static str,
        path: PathBuf,
        message: String,
    },

    #[error("shader reflection failed for {path}: {message}")]
    Reflection { path: PathBuf, message: String },

    #[error("job {path} produced no output")]
    MissingOutput { path: String },

    #[error("{phase} phase failed: {failed} job(s) failed, first error: {first}")]
    PhaseFailed {
        phase: &'static str,
        failed: usize,
        first: Box<PackError>,
    },

    #[error("failed to encode report: {0}")]
    Report(#[from] serde_json::Error),
}

impl PackError {
    pub fn format(what: &'static str, path: &Path, message: impl Into<String>) -> Self {
        PackError::Format {
            what,
            path: path.to_path_buf(),
            message: message.into(),
        }
    }
}

/// Attach the offending path to `std::io` errors.
pub trait IoContext<T> {
    fn at(self, path: &Path) -> Result<T, PackError>;
}

impl<T> IoContext<T> for std::io::Result<T> {
    fn at(self, path: &Path) -> Result<T, PackError> {
        self.map_err(|source| PackError::Io {
            path: path.to_path_buf(),
            source,
        })
    }
}
