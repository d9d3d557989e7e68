use std::path::PathBuf;
use std::process;

use atoll_pack::report::{self, BuildReport};
use atoll_pack::{pack, PackContext, PackError, PackerConfig};

const PANIC_ENV: &str = "PACKER_PANIC_ON_ERROR";

fn usage() {
    eprintln!("Usage: packer <engine-content-dir> <game-content-dir> <output-dir> [OPTIONS]");
    eprintln!("       packer --list <file.bin>");
    eprintln!("  --clean               Rebuild every asset, ignoring intermediates");
    eprintln!("  --config <file.ron>   Packer config (default: <engine>/packer.ron)");
    eprintln!("  --report <file.json>  Write a JSON build report");
    eprintln!("  --list <file.bin>     Print the chunk index of a packed file");
}

/// Report a fatal error and exit with status 1, or panic when
/// `PACKER_PANIC_ON_ERROR=1` so a debugger stops at the failure.
fn fail(err: PackError) -> ! {
    log::error!("{}", err);
    eprintln!("packer failed: {err}");
    if std::env::var_os(PANIC_ENV).is_some_and(|v| v == "1") {
        panic!("{err}");
    }
    process::exit(1);
}

fn option_value(args: &[String], i: usize, flag: &str) -> PathBuf {
    match args.get(i) {
        Some(v) => PathBuf::from(v),
        None => {
            eprintln!("{flag} needs a value");
            process::exit(1);
        }
    }
}

fn main() {
    env_logger::Builder::from_env(env_logger::Env::default().default_filter_or("info")).init();

    let args: Vec<String> = std::env::args().collect();

    let mut positional: Vec<PathBuf> = Vec::new();
    let mut clean = false;
    let mut config_path: Option<PathBuf> = None;
    let mut report_path: Option<PathBuf> = None;
    let mut list_path: Option<PathBuf> = None;

    let mut i = 1;
    while i < args.len() {
        match args[i].as_str() {
            "--clean" => clean = true,
            "--config" => {
                i += 1;
                config_path = Some(option_value(&args, i, "--config"));
            }
            "--report" => {
                i += 1;
                report_path = Some(option_value(&args, i, "--report"));
            }
            "--list" => {
                i += 1;
                list_path = Some(option_value(&args, i, "--list"));
            }
            "--help" | "-h" => {
                usage();
                process::exit(0);
            }
            other if other.starts_with("--") => {
                eprintln!("Unknown argument: {}", other);
                process::exit(1);
            }
            other => positional.push(PathBuf::from(other)),
        }
        i += 1;
    }

    if let Some(path) = list_path {
        let bytes = std::fs::read(&path)
            .unwrap_or_else(|source| fail(PackError::Io { path, source }));
        match report::format_listing(&bytes) {
            Ok(text) => print!("{text}"),
            Err(e) => fail(e.into()),
        }
        return;
    }

    let [engine, game, output]: [PathBuf; 3] = match positional.try_into() {
        Ok(dirs) => dirs,
        Err(_) => {
            usage();
            process::exit(1);
        }
    };

    let config = PackerConfig::load(config_path.as_deref(), &engine).unwrap_or_else(|e| fail(e));
    log::info!(
        "Packing {} + {} into {}{}",
        engine.display(),
        game.display(),
        output.display(),
        if clean { " (clean)" } else { "" }
    );
    let ctx = PackContext::new(engine, game, output, config, clean);

    let run = pack(&ctx).unwrap_or_else(|e| fail(e));

    if let Some(ref path) = report_path {
        let build_report = BuildReport::from_run(&run);
        report::save_report(path, &build_report).unwrap_or_else(|e| fail(e));
        log::info!("Saved report to {}", path.display());
    }
}
