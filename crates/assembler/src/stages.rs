use std::panic;
use std::thread;

use stagecompiler::{CompileError, Stage, StageCompiler};
use tracing::{info, warn};

#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum CompileStrategy {
    /// Vertex then pixel; the pixel stage is skipped if the vertex stage fails.
    #[default]
    Sequential,
    /// Both stages at once on scoped threads.
    Parallel,
}

/// Generated text for both stages, fully captured.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct StageOutputs {
    pub vertex: String,
    pub pixel: String,
}

pub fn compile_stages<C>(compiler: &C, strategy: CompileStrategy) -> Result<StageOutputs, CompileError>
where
    C: StageCompiler + Sync,
{
    let (vertex, pixel) = match strategy {
        CompileStrategy::Sequential => {
            let vertex = compile_one(compiler, Stage::Vertex)?;
            let pixel = compile_one(compiler, Stage::Pixel)?;
            (vertex, pixel)
        }
        CompileStrategy::Parallel => {
            let (vertex, pixel) = thread::scope(|scope| {
                let pixel = scope.spawn(|| compile_one(compiler, Stage::Pixel));
                let vertex = compile_one(compiler, Stage::Vertex);
                let pixel = pixel
                    .join()
                    .unwrap_or_else(|payload| panic::resume_unwind(payload));
                (vertex, pixel)
            });
            // Vertex reports first when both stages fail.
            (vertex?, pixel?)
        }
    };

    Ok(StageOutputs { vertex, pixel })
}

fn compile_one<C>(compiler: &C, stage: Stage) -> Result<String, CompileError>
where
    C: StageCompiler + ?Sized,
{
    let output = compiler.compile(stage)?;
    if output.trim().is_empty() {
        warn!(%stage, "cross-compiler produced empty output");
    }
    info!(%stage, bytes = output.len(), "compiled stage");
    Ok(output)
}

#[cfg(test)]
mod tests {
    use std::process::ExitStatus;
    use std::sync::Mutex;

    use super::*;

    #[cfg(unix)]
    fn failure_status() -> ExitStatus {
        use std::os::unix::process::ExitStatusExt;
        ExitStatus::from_raw(1 << 8)
    }

    #[cfg(windows)]
    fn failure_status() -> ExitStatus {
        use std::os::windows::process::ExitStatusExt;
        ExitStatus::from_raw(1)
    }

    struct Recording {
        failing: &'static [Stage],
        calls: Mutex<Vec<Stage>>,
    }

    impl Recording {
        fn new(failing: &'static [Stage]) -> Self {
            Self {
                failing,
                calls: Mutex::new(Vec::new()),
            }
        }
    }

    impl StageCompiler for Recording {
        fn compile(&self, stage: Stage) -> Result<String, CompileError> {
            self.calls.lock().unwrap().push(stage);
            if self.failing.contains(&stage) {
                return Err(CompileError::Failed {
                    stage,
                    status: failure_status(),
                    diagnostics: "syntax error".into(),
                });
            }
            Ok(format!("{stage} output"))
        }
    }

    #[test]
    fn sequential_compiles_vertex_then_pixel() {
        let compiler = Recording::new(&[]);
        let outputs = compile_stages(&compiler, CompileStrategy::Sequential).unwrap();
        assert_eq!(outputs.vertex, "vertex output");
        assert_eq!(outputs.pixel, "pixel output");
        assert_eq!(*compiler.calls.lock().unwrap(), [Stage::Vertex, Stage::Pixel]);
    }

    #[test]
    fn sequential_stops_after_vertex_failure() {
        let compiler = Recording::new(&[Stage::Vertex]);
        let err = compile_stages(&compiler, CompileStrategy::Sequential).unwrap_err();
        assert_eq!(err.stage(), Stage::Vertex);
        assert_eq!(*compiler.calls.lock().unwrap(), [Stage::Vertex]);
    }

    #[test]
    fn parallel_matches_sequential_output() {
        let sequential = compile_stages(&Recording::new(&[]), CompileStrategy::Sequential).unwrap();
        let parallel = compile_stages(&Recording::new(&[]), CompileStrategy::Parallel).unwrap();
        assert_eq!(sequential, parallel);
    }

    #[test]
    fn parallel_propagates_pixel_failure() {
        let compiler = Recording::new(&[Stage::Pixel]);
        let err = compile_stages(&compiler, CompileStrategy::Parallel).unwrap_err();
        assert_eq!(err.stage(), Stage::Pixel);
        assert_eq!(compiler.calls.lock().unwrap().len(), 2);
    }

    #[test]
    fn parallel_reports_vertex_when_both_fail() {
        let compiler = Recording::new(&[Stage::Vertex, Stage::Pixel]);
        let err = compile_stages(&compiler, CompileStrategy::Parallel).unwrap_err();
        assert_eq!(err.stage(), Stage::Vertex);
        let mut calls = compiler.calls.lock().unwrap().clone();
        calls.sort_by_key(|stage| *stage == Stage::Pixel);
        assert_eq!(calls, [Stage::Vertex, Stage::Pixel]);
    }
}
