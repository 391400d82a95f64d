//! py2lua - translate a Python source file to Lua.

mod config;
mod run;

use clap::Parser;
use std::path::PathBuf;
use tracing_subscriber::EnvFilter;

/// Translate a Python source file to Lua
#[derive(Parser, Debug)]
#[command(name = "py2lua", version, about)]
struct Cli {
    /// Python source file (.py)
    input: PathBuf,

    /// Output file (defaults to <stem>.lua in the working directory)
    #[arg(short, long)]
    output: Option<PathBuf>,

    /// Config file (defaults to ./py2lua.toml when present)
    #[arg(long)]
    config: Option<PathBuf>,

    /// Print the normalized IR as JSON instead of writing Lua
    #[arg(long)]
    emit_ir: bool,
}

fn init_logging() {
    let filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("warn"));
    tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_writer(std::io::stderr)
        .init();
}

fn main() {
    init_logging();

    // clap reports usage errors itself, with exit code 2.
    let cli = Cli::parse();
    let args = run::RunArgs {
        input: cli.input,
        output: cli.output,
        config: cli.config,
        emit_ir: cli.emit_ir,
    };

    if let Err(e) = run::run(&args) {
        eprintln!("{}", e);
        std::process::exit(e.exit_code());
    }
}
