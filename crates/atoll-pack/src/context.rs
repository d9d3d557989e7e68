use std::fmt;
use std::path::PathBuf;

use atoll_texture::BlockEncoders;

use crate::config::PackerConfig;
use crate::resolver::{ContentPaths, Toolchain};

/// Everything a job needs besides itself. Shared read-only by all tasks.
pub struct PackContext {
    pub paths: ContentPaths,
    pub config: PackerConfig,
    pub toolchain: Toolchain,
    pub encoders: BlockEncoders,
    /// Set by `--clean`; the scheduler may also force a clean rebuild when
    /// the existing outputs are stale.
    pub clean: bool,
}

impl PackContext {
    pub fn new(
        engine: PathBuf,
        game: PathBuf,
        output: PathBuf,
        config: PackerConfig,
        clean: bool,
    ) -> Self {
        let paths = ContentPaths::new(engine, game, output, &config);
        let toolchain = Toolchain::resolve(&config);
        Self {
            paths,
            config,
            toolchain,
            encoders: BlockEncoders::new(),
            clean,
        }
    }
}

/// Log prefix for one job: `[  12] textures/a.png`.
#[derive(Debug, Clone, Copy)]
pub struct LogScope<'a> {
    pub index: usize,
    pub path: &'a str,
}

impl fmt::Display for LogScope<'_> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "[{:>4}] {}", self.index, self.path)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_log_scope_format() {
        let scope = LogScope {
            index: 12,
            path: "textures/a.png",
        };
        assert_eq!(scope.to_string(), "[  12] textures/a.png");
    }
}
