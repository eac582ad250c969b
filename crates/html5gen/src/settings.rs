//! Layers the fixture configuration: built-in defaults, then the optional
//! TOML file, then environment and command-line overrides. Every path stays
//! relative to the directory `html5gen` is invoked from.
use std::path::Path;

use anyhow::{Context, Result};
use fixtureconfig::FixtureConfig;
use tracing::debug;

use crate::cli::Cli;

pub const DEFAULT_CONFIG_FILE: &str = "html5gen.toml";

pub fn resolve(cli: &Cli) -> Result<FixtureConfig> {
    let mut config = match cli.config.as_deref() {
        Some(path) => FixtureConfig::load(path)
            .with_context(|| format!("failed to load config file {}", path.display()))?,
        None => {
            let path = Path::new(DEFAULT_CONFIG_FILE);
            FixtureConfig::load_or_default(path)
                .with_context(|| format!("failed to load config file {}", path.display()))?
        }
    };

    apply_overrides(&mut config, cli);
    config
        .validate()
        .context("command-line overrides produced an invalid configuration")?;

    debug!(
        compiler = %config.compiler.program.display(),
        shader = %config.paths.shader.display(),
        template = %config.paths.template.display(),
        output = %config.paths.output.display(),
        format = %config.compiler.format,
        transform = %config.compiler.transform,
        timeout = ?config.timeout,
        "resolved html5gen settings"
    );
    Ok(config)
}

fn apply_overrides(config: &mut FixtureConfig, cli: &Cli) {
    if let Some(program) = &cli.compiler {
        config.compiler.program = program.clone();
    }
    if let Some(shader) = &cli.shader {
        config.paths.shader = shader.clone();
    }
    if let Some(template) = &cli.template {
        config.paths.template = template.clone();
    }
    if let Some(output) = &cli.output {
        config.paths.output = output.clone();
    }
    if let Some(format) = cli.format {
        config.compiler.format = format;
    }
    if let Some(transform) = cli.transform {
        config.compiler.transform = transform;
    }
    if let Some(timeout) = cli.timeout {
        config.timeout = Some(timeout);
    }
}
