use std::path::PathBuf;
use std::time::Duration;

use clap::Parser;
use stagecompiler::{OutputFormat, Transform};

#[derive(Parser, Debug)]
#[command(
    name = "html5gen",
    author,
    version,
    about = "Cross-compile the HTML5 test shader and generate the WebGL test page"
)]
pub struct Cli {
    /// Configuration file; `html5gen.toml` in the current directory is used when present.
    #[arg(long, value_name = "FILE")]
    pub config: Option<PathBuf>,

    /// Cross-compiler executable; can also be supplied via the `HTML5GEN_COMPILER` env var.
    #[arg(long, env = "HTML5GEN_COMPILER", value_name = "PATH")]
    pub compiler: Option<PathBuf>,

    /// HLSL source containing both the `VS` and `PS` entry points.
    #[arg(long, value_name = "FILE")]
    pub shader: Option<PathBuf>,

    /// Page template containing the stage placeholders.
    #[arg(long, value_name = "FILE")]
    pub template: Option<PathBuf>,

    /// Destination of the generated page.
    #[arg(long, short, value_name = "FILE")]
    pub output: Option<PathBuf>,

    /// Output format handed to the compiler (`hlsl_sm3`, `hlsl_sm4`, `glsl_140`, `glsl_es_100`).
    #[arg(long, value_name = "FORMAT", value_parser = parse_output_format)]
    pub format: Option<OutputFormat>,

    /// Code transformation applied to the output (`cstr` or `jsstr`).
    #[arg(long, value_name = "MODE", value_parser = parse_transform)]
    pub transform: Option<Transform>,

    /// Kill a compiler invocation that runs longer than this (e.g. `30s` or `5`).
    #[arg(long, value_name = "DURATION", value_parser = parse_timeout)]
    pub timeout: Option<Duration>,

    /// Compile the vertex and pixel stages concurrently.
    #[arg(long)]
    pub parallel: bool,

    /// Log at debug level unless `RUST_LOG` says otherwise.
    #[arg(long, short)]
    pub verbose: bool,
}

pub fn parse() -> Cli {
    Cli::parse()
}

pub fn parse_output_format(value: &str) -> Result<OutputFormat, String> {
    if value.trim().is_empty() {
        return Err("output format must not be empty".to_string());
    }
    value.parse().map_err(|err| format!("{err}"))
}

pub fn parse_transform(value: &str) -> Result<Transform, String> {
    if value.trim().is_empty() {
        return Err("transform must not be empty".to_string());
    }
    value.parse().map_err(|err| format!("{err}"))
}

pub fn parse_timeout(value: &str) -> Result<Duration, String> {
    let trimmed = value.trim();
    if trimmed.is_empty() {
        return Err("timeout must not be empty".to_string());
    }

    let timeout = match trimmed.parse::<u64>() {
        Ok(seconds) => Duration::from_secs(seconds),
        Err(_) => humantime::parse_duration(trimmed)
            .map_err(|err| format!("invalid timeout '{trimmed}': {err}"))?,
    };

    if timeout.is_zero() {
        return Err("timeout must be greater than zero".to_string());
    }
    Ok(timeout)
}
