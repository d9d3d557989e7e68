use std::path::{Path, PathBuf};
use std::process::Command;

use crate::config::ToolCommand;
use crate::error::PackError;

/// Token whose presence in a tool's output marks the invocation as failed,
/// even on a zero exit status.
pub const ERROR_TOKEN: &str = "ERROR";

/// Placeholder values for one tool invocation.
#[derive(Debug, Default)]
pub struct ToolArgs<'a> {
    pub input: Option<&'a Path>,
    pub output: Option<&'a Path>,
    pub include: Option<&'a Path>,
    pub stage: Option<&'a str>,
}

/// Run `command` and return its combined stdout and stderr. Fails when the
/// program cannot be spawned, exits non-zero, prints `ERROR`, or does not
/// produce the expected output file.
pub fn run_tool(
    tool: &'static str,
    command: &ToolCommand,
    args: &ToolArgs<'_>,
) -> Result<String, PackError> {
    let input = args.input.map(Path::to_path_buf).unwrap_or_default();
    let fail = |message: String| PackError::Toolchain {
        tool,
        input: input.clone(),
        message,
    };

    let input_s = args.input.map(|p| p.display().to_string()).unwrap_or_default();
    let output_s = args.output.map(|p| p.display().to_string()).unwrap_or_default();
    let include_s = args.include.map(|p| p.display().to_string()).unwrap_or_default();
    let vars = [
        ("input", input_s.as_str()),
        ("output", output_s.as_str()),
        ("include", include_s.as_str()),
        ("stage", args.stage.unwrap_or("")),
    ];

    if let Some(out) = args.output {
        if let Some(parent) = out.parent() {
            std::fs::create_dir_all(parent).map_err(|e| fail(e.to_string()))?;
        }
        // A stale output must not pass for a fresh one.
        let _ = std::fs::remove_file(out);
    }

    let expanded = command.expand_args(&vars);
    log::debug!("{} {}", command.program, expanded.join(" "));
    let result = Command::new(&command.program)
        .args(&expanded)
        .output()
        .map_err(|e| fail(format!("cannot run {}: {}", command.program, e)))?;

    let mut text = String::from_utf8_lossy(&result.stdout).into_owned();
    text.push_str(&String::from_utf8_lossy(&result.stderr));

    if !result.status.success() {
        return Err(fail(format!("exited with {}: {}", result.status, text.trim())));
    }
    if text.contains(ERROR_TOKEN) {
        return Err(fail(text.trim().to_string()));
    }
    if let Some(out) = args.output {
        if !out.is_file() {
            return Err(fail(format!("expected output {} was not written", out.display())));
        }
    }
    Ok(text)
}

/// Side-file path next to an intermediate chunk: `<intermediate>.<suffix>`.
pub fn side_file(intermediate: &Path, suffix: &str) -> PathBuf {
    let mut name = intermediate.as_os_str().to_os_string();
    name.push(".");
    name.push(suffix);
    PathBuf::from(name)
}

#[cfg(all(test, unix))]
mod tests {
    use super::*;

    fn sh(script: &str) -> ToolCommand {
        ToolCommand::new("sh", &["-c", script, "tool", "{input}", "{output}"])
    }

    fn scratch(name: &str) -> PathBuf {
        let dir = std::env::temp_dir().join(format!("atoll_tool_{}_{}", std::process::id(), name));
        std::fs::create_dir_all(&dir).expect("mkdir");
        dir
    }

    #[test]
    fn test_successful_tool_writes_output() {
        let dir = scratch("ok");
        let input = dir.join("in.txt");
        let output = dir.join("out").join("result.txt");
        std::fs::write(&input, b"hello").expect("write");
        let args = ToolArgs {
            input: Some(&input),
            output: Some(&output),
            ..ToolArgs::default()
        };
        run_tool("copier", &sh("cp \"$1\" \"$2\""), &args).expect("tool ok");
        assert_eq!(std::fs::read(&output).expect("read"), b"hello");
        let _ = std::fs::remove_dir_all(&dir);
    }

    #[test]
    fn test_error_token_fails_despite_zero_exit() {
        let dir = scratch("token");
        let input = dir.join("in.txt");
        let output = dir.join("out.txt");
        std::fs::write(&input, b"x").expect("write");
        let args = ToolArgs {
            input: Some(&input),
            output: Some(&output),
            ..ToolArgs::default()
        };
        let err = run_tool("noisy", &sh("cp \"$1\" \"$2\"; echo ERROR: bad input"), &args)
            .expect_err("should fail");
        assert!(matches!(err, PackError::Toolchain { tool: "noisy", .. }));
        let _ = std::fs::remove_dir_all(&dir);
    }

    #[test]
    fn test_nonzero_exit_fails() {
        let args = ToolArgs::default();
        let err = run_tool("false", &ToolCommand::new("sh", &["-c", "exit 3"]), &args)
            .expect_err("should fail");
        assert!(err.to_string().contains("false failed"));
    }

    #[test]
    fn test_missing_output_fails() {
        let dir = scratch("missing");
        let output = dir.join("never.txt");
        let args = ToolArgs {
            output: Some(&output),
            ..ToolArgs::default()
        };
        assert!(run_tool("quiet", &sh("true"), &args).is_err());
        let _ = std::fs::remove_dir_all(&dir);
    }

    #[test]
    fn test_side_file_suffix() {
        let p = side_file(Path::new("/out/a.vert.chunk"), "spv");
        assert_eq!(p, PathBuf::from("/out/a.vert.chunk.spv"));
    }
}
