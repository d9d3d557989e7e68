use std::path::Path;

use atoll_core::constants::DEFAULT_MAX_MIP_LEVELS;
use serde::{Deserialize, Serialize};

use crate::error::{IoContext, PackError};

/// Name of the config file looked up in the engine content tree when no
/// `--config` is given.
pub const DEFAULT_CONFIG_FILE: &str = "packer.ron";

/// An external program plus templated arguments. `{input}`, `{output}`,
/// `{include}` and `{stage}` are substituted per invocation.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ToolCommand {
    pub program: String,
    #[serde(default)]
    pub args: Vec<String>,
}

impl ToolCommand {
    pub fn new(program: impl Into<String>, args: &[&str]) -> Self {
        Self {
            program: program.into(),
            args: args.iter().map(|a| a.to_string()).collect(),
        }
    }

    /// Arguments with every `{key}` placeholder replaced.
    pub fn expand_args(&self, vars: &[(&str, &str)]) -> Vec<String> {
        self.args
            .iter()
            .map(|arg| {
                vars.iter().fold(arg.clone(), |acc, (key, value)| {
                    acc.replace(&format!("{{{key}}}"), value)
                })
            })
            .collect()
    }
}

/// Packer settings, read from RON. Every field is optional.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct PackerConfig {
    pub max_mip_levels: u32,
    /// Include directory for shaders, relative to the engine content root.
    pub shader_include_dir: String,
    /// Shared headers (relative to `shader_include_dir`) whose modification
    /// invalidates every shader.
    pub shader_headers: Vec<String>,
    pub data_file: String,
    pub texture_file: String,
    pub header_file: String,
    pub preprocessor: Option<ToolCommand>,
    pub shader_compiler: Option<ToolCommand>,
    pub audio_encoder: Option<ToolCommand>,
}

impl Default for PackerConfig {
    fn default() -> Self {
        Self {
            max_mip_levels: DEFAULT_MAX_MIP_LEVELS,
            shader_include_dir: "shaders/include".to_string(),
            shader_headers: vec![
                "bindings.h".to_string(),
                "constants.h".to_string(),
                "vertex_layout.h".to_string(),
            ],
            data_file: "data.bin".to_string(),
            texture_file: "textures.bin".to_string(),
            header_file: "asset_hashes.h".to_string(),
            preprocessor: None,
            shader_compiler: None,
            audio_encoder: None,
        }
    }
}

impl PackerConfig {
    pub fn from_ron_str(ron_str: &str) -> Result<Self, ron::error::SpannedError> {
        let options = ron::Options::default();
        options.from_str(ron_str)
    }

    /// Load a config from `explicit` if given, else from
    /// `<engine>/packer.ron` if it exists, else defaults.
    pub fn load(explicit: Option<&Path>, engine_dir: &Path) -> Result<Self, PackError> {
        let implicit = engine_dir.join(DEFAULT_CONFIG_FILE);
        let path = match explicit {
            Some(p) => p.to_path_buf(),
            None if implicit.is_file() => implicit,
            None => {
                log::debug!("No {} found, using default config", DEFAULT_CONFIG_FILE);
                return Ok(Self::default());
            }
        };

        let text = std::fs::read_to_string(&path).at(&path)?;
        let config = Self::from_ron_str(&text).map_err(|e| PackError::Config {
            path: path.clone(),
            message: e.to_string(),
        })?;
        if config.max_mip_levels == 0 {
            return Err(PackError::Config {
                path,
                message: "max_mip_levels must be at least 1".to_string(),
            });
        }
        log::info!("Loaded packer config from {}", path.display());
        Ok(config)
    }
}
