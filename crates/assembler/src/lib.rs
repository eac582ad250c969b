//! Builds the browser test page: loads the page template, compiles both
//! shader stages through a `StageCompiler`, splices the generated text into
//! the template's placeholders, and writes the result in one atomic step.
//!
//! Types:
//!
//! - `Placeholders` names the token each stage's output replaces.
//! - `Template` holds the unmodified template text and performs substitution.
//! - `CompileStrategy` picks sequential or concurrent stage compilation.
//! - `AssemblyRequest` and `AssemblyReport` describe one run and its outcome.
//!
//! Functions:
//!
//! - `assemble` produces the page text in memory.
//! - `run_pipeline` assembles and then persists the page with `write_atomic`.
mod output;
mod stages;
mod template;

pub use output::write_atomic;
pub use stages::{compile_stages, CompileStrategy, StageOutputs};
pub use template::{substitute, Template};

use std::io;
use std::path::PathBuf;

use stagecompiler::{CompileError, Stage, StageCompiler};
use thiserror::Error;
use tracing::{debug, info};

#[derive(Debug, Error)]
pub enum AssembleError {
    #[error(transparent)]
    Compile(#[from] CompileError),

    #[error("failed to read template {}: {source}", path.display())]
    Read {
        path: PathBuf,
        #[source]
        source: io::Error,
    },

    #[error("failed to write {}: {source}", path.display())]
    Write {
        path: PathBuf,
        #[source]
        source: io::Error,
    },

    #[error("template {} has no {stage} placeholder '{token}'", path.display())]
    MissingPlaceholder {
        path: PathBuf,
        stage: Stage,
        token: String,
    },
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Placeholders {
    pub vertex: String,
    pub pixel: String,
}

impl Placeholders {
    pub fn new(vertex: impl Into<String>, pixel: impl Into<String>) -> Self {
        Self {
            vertex: vertex.into(),
            pixel: pixel.into(),
        }
    }

    pub fn token(&self, stage: Stage) -> &str {
        match stage {
            Stage::Vertex => &self.vertex,
            Stage::Pixel => &self.pixel,
        }
    }
}

#[derive(Debug, Clone)]
pub struct AssemblyRequest {
    pub template: PathBuf,
    pub destination: PathBuf,
    pub placeholders: Placeholders,
    pub strategy: CompileStrategy,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct AssemblyReport {
    pub destination: PathBuf,
    pub bytes: usize,
    pub vertex_occurrences: usize,
    pub pixel_occurrences: usize,
}

/// Compiles both stages and renders `template`. Nothing is written.
///
/// Placeholders are checked before the compiler runs so a broken template
/// never costs a compiler invocation.
pub fn assemble<C>(
    compiler: &C,
    template: &Template,
    placeholders: &Placeholders,
    strategy: CompileStrategy,
) -> Result<String, AssembleError>
where
    C: StageCompiler + Sync,
{
    template.check_placeholders(placeholders)?;
    let outputs = compile_stages(compiler, strategy)?;
    Ok(template.render(placeholders, &outputs.vertex, &outputs.pixel))
}

pub fn run_pipeline<C>(compiler: &C, request: &AssemblyRequest) -> Result<AssemblyReport, AssembleError>
where
    C: StageCompiler + Sync,
{
    let template = Template::load(&request.template)?;
    debug!(
        template = %template.path().display(),
        bytes = template.text().len(),
        "loaded page template"
    );

    let page = assemble(compiler, &template, &request.placeholders, request.strategy)?;
    write_atomic(&request.destination, &page)?;

    let report = AssemblyReport {
        destination: request.destination.clone(),
        bytes: page.len(),
        vertex_occurrences: template.occurrences(request.placeholders.token(Stage::Vertex)),
        pixel_occurrences: template.occurrences(request.placeholders.token(Stage::Pixel)),
    };
    info!(
        destination = %report.destination.display(),
        bytes = report.bytes,
        "wrote assembled page"
    );
    Ok(report)
}
