use std::path::PathBuf;

use clap::{Parser, Subcommand};
use sonance_core::config::EngineConfig;
use sonance_core::engine::Engine;

#[derive(Parser)]
#[command(name = "sonance", version, about = "voice audio enhancement engine")]
struct Cli {
    #[command(subcommand)]
    command: Command,

    /// Allow falling back to a no-op denoiser if the real one fails to load
    #[arg(long, global = true)]
    allow_degraded: bool,
}

#[derive(Subcommand)]
enum Command {
    /// Denoise a WAV file and write the result to disk
    ProcessFile(ProcessFileArgs),
    /// Print engine health and version info as JSON
    Diagnostics,
}

#[derive(Parser)]
struct ProcessFileArgs {
    /// Input PCM16 mono WAV path
    input: PathBuf,

    /// Output WAV path
    output: PathBuf,
}

fn main() {
    tracing_subscriber::fmt::init();
    let cli = Cli::parse();

    let config = EngineConfig {
        allow_degraded: cli.allow_degraded,
        ..EngineConfig::default()
    };
    let engine = Engine::new(config);
    if let Err(err) = engine.initialize() {
        eprintln!("initialize failed: {err}");
        std::process::exit(1);
    }

    let result = match cli.command {
        Command::ProcessFile(args) => run_process_file(&engine, &args),
        Command::Diagnostics => run_diagnostics(&engine),
    };

    if let Err(err) = result {
        eprintln!("{err}");
        std::process::exit(1);
    }

    if let Err(err) = engine.destroy(true) {
        eprintln!("destroy failed: {err}");
        std::process::exit(1);
    }
}

fn run_process_file(engine: &Engine, args: &ProcessFileArgs) -> Result<(), String> {
    let input = std::fs::read(&args.input).map_err(|e| format!("reading {}: {e}", args.input.display()))?;
    let output = engine
        .process_file(&input)
        .map_err(|e| format!("processing {}: {e}", args.input.display()))?;
    std::fs::write(&args.output, output).map_err(|e| format!("writing {}: {e}", args.output.display()))?;
    tracing::info!(input = %args.input.display(), output = %args.output.display(), "processed file");
    Ok(())
}

fn run_diagnostics(engine: &Engine) -> Result<(), String> {
    let diagnostics = engine.diagnostics();
    let json = serde_json::to_string_pretty(&diagnostics).map_err(|e| e.to_string())?;
    println!("{json}");
    Ok(())
}
