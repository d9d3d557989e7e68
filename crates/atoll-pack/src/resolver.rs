use std::path::{Path, PathBuf};

use atoll_core::ContentRoot;

use crate::config::{PackerConfig, ToolCommand};

/// Directories the packer reads from and writes to.
#[derive(Debug, Clone)]
pub struct ContentPaths {
    pub engine: PathBuf,
    pub game: PathBuf,
    pub output: PathBuf,
    data_file: String,
    texture_file: String,
    header_file: String,
    shader_include_dir: String,
    shader_headers: Vec<String>,
}

impl ContentPaths {
    pub fn new(engine: PathBuf, game: PathBuf, output: PathBuf, config: &PackerConfig) -> Self {
        Self {
            engine,
            game,
            output,
            data_file: config.data_file.clone(),
            texture_file: config.texture_file.clone(),
            header_file: config.header_file.clone(),
            shader_include_dir: config.shader_include_dir.clone(),
            shader_headers: config.shader_headers.clone(),
        }
    }

    pub fn root(&self, root: ContentRoot) -> &Path {
        match root {
            ContentRoot::Engine => &self.engine,
            ContentRoot::Game => &self.game,
        }
    }

    pub fn intermediate_dir(&self) -> PathBuf {
        self.output.join("intermediate")
    }

    /// `<output>/intermediate/<root>/<rel>.chunk`
    pub fn intermediate_file(&self, root: ContentRoot, rel_path: &str) -> PathBuf {
        let mut path = self.intermediate_dir().join(root.name());
        for part in rel_path.split('/') {
            path.push(part);
        }
        let mut name = path.into_os_string();
        name.push(".chunk");
        PathBuf::from(name)
    }

    pub fn data_file(&self) -> PathBuf {
        self.output.join(&self.data_file)
    }

    pub fn texture_file(&self) -> PathBuf {
        self.output.join(&self.texture_file)
    }

    pub fn header_file(&self) -> PathBuf {
        self.output.join(&self.header_file)
    }

    pub fn shader_include_dir(&self) -> PathBuf {
        self.engine.join(&self.shader_include_dir)
    }

    pub fn shader_headers(&self) -> Vec<PathBuf> {
        let include = self.shader_include_dir();
        self.shader_headers.iter().map(|h| include.join(h)).collect()
    }
}

/// External programs used by shader and audio jobs.
#[derive(Debug, Clone, PartialEq)]
pub struct Toolchain {
    pub preprocessor: ToolCommand,
    pub shader_compiler: ToolCommand,
    pub audio_encoder: ToolCommand,
}

impl Toolchain {
    /// Config entries win; otherwise tools are located through `VULKAN_SDK`,
    /// `WindowsSdkDir` and the default Windows Kits install, falling back to
    /// bare program names on `PATH`.
    pub fn resolve(config: &PackerConfig) -> Self {
        let vulkan_sdk = std::env::var_os("VULKAN_SDK").map(PathBuf::from);
        let windows_sdk = std::env::var_os("WindowsSdkDir").map(PathBuf::from);
        Self::resolve_with(config, vulkan_sdk.as_deref(), windows_sdk.as_deref())
    }

    pub fn resolve_with(
        config: &PackerConfig,
        vulkan_sdk: Option<&Path>,
        windows_sdk: Option<&Path>,
    ) -> Self {
        let preprocessor = config.preprocessor.clone().unwrap_or_else(|| {
            ToolCommand::new(
                "cpp",
                &["-P", "-E", "-x", "c", "-I", "{include}", "{input}", "-o", "{output}"],
            )
        });

        let shader_compiler = config.shader_compiler.clone().unwrap_or_else(|| {
            let program = vulkan_sdk
                .map(|sdk| sdk.join("bin").join(exe("glslangValidator")))
                .filter(|p| p.is_file())
                .map(|p| p.display().to_string())
                .unwrap_or_else(|| "glslangValidator".to_string());
            ToolCommand::new(program, &["-V", "-S", "{stage}", "{input}", "-o", "{output}"])
        });

        let audio_encoder = config.audio_encoder.clone().unwrap_or_else(|| {
            let kits = windows_sdk
                .map(Path::to_path_buf)
                .into_iter()
                .chain(std::iter::once(PathBuf::from(
                    r"C:\Program Files (x86)\Windows Kits\10",
                )));
            let program = kits
                .filter_map(|kit| probe_windows_kit(&kit, "adpcmencode3.exe"))
                .next()
                .map(|p| p.display().to_string())
                .unwrap_or_else(|| exe("adpcmencode3"));
            ToolCommand::new(program, &["{input}", "{output}"])
        });

        log::debug!("Shader compiler: {}", shader_compiler.program);
        log::debug!("Audio encoder: {}", audio_encoder.program);

        Self {
            preprocessor,
            shader_compiler,
            audio_encoder,
        }
    }
}

fn exe(name: &str) -> String {
    if cfg!(windows) {
        format!("{name}.exe")
    } else {
        name.to_string()
    }
}

/// Find `tool` under `<kit>/bin/<version>/x64`, newest version first.
fn probe_windows_kit(kit: &Path, tool: &str) -> Option<PathBuf> {
    let mut versions: Vec<PathBuf> = std::fs::read_dir(kit.join("bin"))
        .ok()?
        .filter_map(|e| e.ok())
        .map(|e| e.path())
        .filter(|p| p.is_dir())
        .collect();
    versions.sort();
    versions
        .into_iter()
        .rev()
        .map(|v| v.join("x64").join(tool))
        .find(|p| p.is_file())
}

#[cfg(test)]
mod tests {
    use super::*;

    fn paths() -> ContentPaths {
        ContentPaths::new(
            PathBuf::from("/engine"),
            PathBuf::from("/game"),
            PathBuf::from("/out"),
            &PackerConfig::default(),
        )
    }

    #[test]
    fn test_intermediate_file_layout() {
        let path = paths().intermediate_file(ContentRoot::Game, "textures/grass.bc7.png");
        assert_eq!(
            path,
            PathBuf::from("/out/intermediate/game/textures/grass.bc7.png.chunk")
        );
    }

    #[test]
    fn test_output_files() {
        let p = paths();
        assert_eq!(p.data_file(), PathBuf::from("/out/data.bin"));
        assert_eq!(p.texture_file(), PathBuf::from("/out/textures.bin"));
        assert_eq!(p.header_file(), PathBuf::from("/out/asset_hashes.h"));
        assert_eq!(p.root(ContentRoot::Engine), Path::new("/engine"));
        assert_eq!(
            p.shader_headers()[0],
            PathBuf::from("/engine/shaders/include/bindings.h")
        );
    }

    #[test]
    fn test_config_tool_overrides_probe() {
        let config = PackerConfig {
            shader_compiler: Some(ToolCommand::new("my-glslc", &["{input}"])),
            ..PackerConfig::default()
        };
        let tools = Toolchain::resolve_with(&config, Some(Path::new("/nonexistent")), None);
        assert_eq!(tools.shader_compiler.program, "my-glslc");
    }

    #[test]
    fn test_probe_windows_kit_picks_newest() {
        let kit = std::env::temp_dir().join(format!("atoll_kit_{}", std::process::id()));
        for version in ["10.0.1", "10.0.2"] {
            let dir = kit.join("bin").join(version).join("x64");
            std::fs::create_dir_all(&dir).expect("mkdir");
            std::fs::write(dir.join("adpcmencode3.exe"), b"").expect("write");
        }
        let found = probe_windows_kit(&kit, "adpcmencode3.exe").expect("found");
        assert!(found.to_string_lossy().contains("10.0.2"));

        let tools = Toolchain::resolve_with(&PackerConfig::default(), None, Some(&kit));
        assert_eq!(tools.audio_encoder.program, found.display().to_string());
        let _ = std::fs::remove_dir_all(&kit);
    }
}
