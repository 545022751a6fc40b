use arrowconf::{Limits, Translator};

use std::fs;
use std::path::PathBuf;
use std::process;

use clap::{Parser, ValueEnum};

/// Output format for the translated document.
#[derive(Debug, Clone, Copy, PartialEq, Eq, ValueEnum)]
enum OutputFormat {
    Toml,
    Json,
}

/// Translate an arrowconf configuration file into TOML.
#[derive(Parser)]
#[command(name = "arrowconf", version, about = "Translate arrowconf configuration files to TOML")]
struct Cli {
    /// Path to the input configuration file
    #[arg(short, long)]
    input: PathBuf,

    /// Path of the file to write
    #[arg(short, long)]
    output: PathBuf,

    /// Output format
    #[arg(long, default_value = "toml", value_enum)]
    format: OutputFormat,

    /// Maximum nesting depth of a `^{...}` expression
    #[arg(long)]
    max_depth: Option<usize>,
}

/// Enable with `RUST_LOG=arrowconf=debug`.
fn init_tracing() {
    use tracing_subscriber::{fmt, prelude::*, EnvFilter};

    if std::env::var("RUST_LOG").is_ok() {
        tracing_subscriber::registry()
            .with(fmt::layer().with_writer(std::io::stderr).with_target(true))
            .with(EnvFilter::from_default_env())
            .init();
    }
}

fn fail(code: &str, message: impl std::fmt::Display) -> ! {
    eprintln!("error[{}]: {}", code, message);
    process::exit(1);
}

fn main() {
    init_tracing();
    let cli = Cli::parse();

    let input = fs::read_to_string(&cli.input).unwrap_or_else(|e| {
        fail("io", format!("could not read '{}': {}", cli.input.display(), e))
    });

    let mut limits = Limits::default();
    if let Some(depth) = cli.max_depth {
        limits = limits.with_max_depth(depth);
    }

    let document = match Translator::with_limits(limits).translate(&input) {
        Ok(document) => document,
        Err(err) => fail(err.code(), &err),
    };

    let rendered = match cli.format {
        OutputFormat::Toml => document.to_toml().map_err(|e| e.to_string()),
        OutputFormat::Json => document.to_json_pretty().map_err(|e| e.to_string()),
    };
    let rendered = rendered.unwrap_or_else(|e| fail("serialize", e));

    if let Err(e) = fs::write(&cli.output, rendered) {
        fail("io", format!("could not write '{}': {}", cli.output.display(), e));
    }

    println!("Configuration saved to {}", cli.output.display());
}
