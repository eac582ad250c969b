use anyhow::{Context, Result};
use assembler::{run_pipeline, AssemblyRequest, CompileStrategy, Placeholders};
use fixtureconfig::FixtureConfig;
use stagecompiler::ProcessCompiler;
use tracing_subscriber::EnvFilter;

use crate::cli::Cli;
use crate::settings;

pub fn run(cli: Cli) -> Result<()> {
    let config = settings::resolve(&cli)?;
    let compiler = build_compiler(&config);
    let request = AssemblyRequest {
        template: config.paths.template.clone(),
        destination: config.paths.output.clone(),
        placeholders: Placeholders::new(
            config.placeholders.vertex.clone(),
            config.placeholders.pixel.clone(),
        ),
        strategy: if cli.parallel {
            CompileStrategy::Parallel
        } else {
            CompileStrategy::Sequential
        },
    };

    tracing::info!(
        shader = %config.paths.shader.display(),
        template = %request.template.display(),
        strategy = ?request.strategy,
        "generating HTML5 test page"
    );
    let report = run_pipeline(&compiler, &request).with_context(|| {
        format!(
            "failed to generate {} from {}",
            request.destination.display(),
            request.template.display()
        )
    })?;
    tracing::debug!(
        vertex_placeholders = report.vertex_occurrences,
        pixel_placeholders = report.pixel_occurrences,
        "substituted stage outputs"
    );
    Ok(())
}

pub fn initialise_tracing(verbose: bool) {
    let fallback = if verbose { "debug" } else { "info" };
    let filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(fallback));
    tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_target(false)
        .with_writer(std::io::stderr)
        .init();
}

fn build_compiler(config: &FixtureConfig) -> ProcessCompiler {
    ProcessCompiler::new(config.compiler.program.clone(), config.invocation_options())
        .with_launcher(config.compiler.launcher.iter().cloned())
        .with_timeout(config.timeout)
}

#[cfg(test)]
mod tests {
    use std::path::Path;

    use super::*;

    #[test]
    fn compiler_reflects_config() {
        let config = FixtureConfig::from_toml_str(
            r#"
timeout = "2s"

[compiler]
program = "bin/hlsloptconv"
format = "hlsl_sm3"

[paths]
shader = "demo.hlsl"
"#,
        )
        .unwrap();

        let compiler = build_compiler(&config);
        assert_eq!(compiler.program(), Path::new("bin/hlsloptconv"));
        assert_eq!(compiler.options().source, Path::new("demo.hlsl"));
        assert_eq!(compiler.options().format, stagecompiler::OutputFormat::HlslSm3);
    }
}
