use thiserror::Error;

/// Errors raised while building asset identities.
#[derive(Debug, Error)]
pub enum CoreError {
    #[error("path is outside content root: {0}")]
    OutsideRoot(String),

    #[error("path is not valid UTF-8: {0}")]
    NonUtf8Path(String),

    #[error("relative path exceeds {max} bytes: {path}")]
    PathTooLong { path: String, max: usize },
}
