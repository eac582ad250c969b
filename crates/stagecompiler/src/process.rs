use std::ffi::OsString;
use std::io::{self, Read};
use std::path::{Path, PathBuf};
use std::process::{Child, Command, ExitStatus, Stdio};
use std::string::FromUtf8Error;
use std::thread;
use std::time::{Duration, Instant};

use crossbeam_channel::{bounded, Receiver, RecvTimeoutError};
use thiserror::Error;
use tracing::{debug, warn};

use crate::invocation::{InvocationOptions, InvocationSpec};
use crate::{normalize_line_endings, Stage};

const POLL_INTERVAL: Duration = Duration::from_millis(10);

#[derive(Debug, Error)]
pub enum CompileError {
    #[error("failed to launch cross-compiler {} for {stage} stage: {source}", program.display())]
    Spawn {
        stage: Stage,
        program: PathBuf,
        #[source]
        source: io::Error,
    },

    #[error("{stage} stage compilation failed ({status}): {diagnostics}")]
    Failed {
        stage: Stage,
        status: ExitStatus,
        diagnostics: String,
    },

    #[error("failed to collect {stage} stage compiler output: {source}")]
    Io {
        stage: Stage,
        #[source]
        source: io::Error,
    },

    #[error("{stage} stage compiler output is not valid UTF-8: {source}")]
    Decode {
        stage: Stage,
        #[source]
        source: FromUtf8Error,
    },

    #[error("{stage} stage compilation timed out after {timeout:?}")]
    TimedOut { stage: Stage, timeout: Duration },
}

impl CompileError {
    pub fn stage(&self) -> Stage {
        match self {
            Self::Spawn { stage, .. }
            | Self::Failed { stage, .. }
            | Self::Io { stage, .. }
            | Self::Decode { stage, .. }
            | Self::TimedOut { stage, .. } => *stage,
        }
    }
}

/// Produces the generated shader text for one stage.
pub trait StageCompiler {
    fn compile(&self, stage: Stage) -> Result<String, CompileError>;
}

/// Runs the cross-compiler as a child process, one spawn per stage.
#[derive(Debug, Clone)]
pub struct ProcessCompiler {
    program: PathBuf,
    launcher: Vec<OsString>,
    options: InvocationOptions,
    timeout: Option<Duration>,
}

impl ProcessCompiler {
    pub fn new(program: impl Into<PathBuf>, options: InvocationOptions) -> Self {
        Self {
            program: program.into(),
            launcher: Vec::new(),
            options,
            timeout: None,
        }
    }

    /// Runs the compiler through another program, e.g. `["wine"]` or `["sh"]`.
    /// The first element is executed with the rest, then the compiler path, as arguments.
    ///
    /// With a timeout set on Unix the launched process leads its own process
    /// group and the whole group is killed on expiry, so a compiler started by
    /// the launcher does not outlive the run. Elsewhere only the direct child is killed.
    pub fn with_launcher<I, S>(mut self, launcher: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<OsString>,
    {
        self.launcher = launcher.into_iter().map(Into::into).collect();
        self
    }

    pub fn with_timeout(mut self, timeout: Option<Duration>) -> Self {
        self.timeout = timeout;
        self
    }

    pub fn program(&self) -> &Path {
        &self.program
    }

    pub fn options(&self) -> &InvocationOptions {
        &self.options
    }

    fn command(&self, spec: &InvocationSpec) -> Command {
        let mut command = match self.launcher.split_first() {
            Some((launcher, rest)) => {
                let mut command = Command::new(launcher);
                command.args(rest).arg(&self.program);
                command
            }
            None => Command::new(&self.program),
        };
        command
            .args(spec.args())
            .stdin(Stdio::null())
            .stdout(Stdio::piped())
            .stderr(Stdio::piped());
        #[cfg(unix)]
        if self.timeout.is_some() {
            use std::os::unix::process::CommandExt;
            command.process_group(0);
        }
        command
    }

    fn run(&self, spec: &InvocationSpec) -> Result<Vec<u8>, CompileError> {
        let stage = spec.stage();
        debug!(
            %stage,
            program = %self.program.display(),
            args = ?spec.args(),
            "invoking cross-compiler"
        );

        let mut child = self
            .command(spec)
            .spawn()
            .map_err(|source| CompileError::Spawn {
                stage,
                program: self.program.clone(),
                source,
            })?;

        let stdout = drain(child.stdout.take());
        let stderr = drain(child.stderr.take());
        let io_err = |source: io::Error| CompileError::Io { stage, source };
        let deadline = self.timeout.map(|timeout| Instant::now() + timeout);

        let status = match deadline {
            Some(deadline) => wait_until(&mut child, deadline).map_err(io_err)?,
            None => Some(child.wait().map_err(io_err)?),
        };
        // A background process can keep the pipes open after the child exits,
        // so the deadline also bounds collecting the output.
        let collected = match status {
            Some(status) => match (
                collect(&stdout, deadline).map_err(io_err)?,
                collect(&stderr, deadline).map_err(io_err)?,
            ) {
                (Some(stdout), Some(stderr)) => Some((status, stdout, stderr)),
                _ => None,
            },
            None => None,
        };
        let Some((status, stdout, stderr)) = collected else {
            terminate(&mut child);
            return Err(CompileError::TimedOut {
                stage,
                timeout: self.timeout.unwrap_or_default(),
            });
        };

        if !status.success() {
            let text = String::from_utf8_lossy(&stderr);
            let diagnostics = if text.trim().is_empty() {
                "compiler produced no diagnostic output".to_string()
            } else {
                text.trim().to_string()
            };
            return Err(CompileError::Failed {
                stage,
                status,
                diagnostics,
            });
        }

        if !stderr.is_empty() {
            warn!(
                %stage,
                stderr = %String::from_utf8_lossy(&stderr).trim(),
                "cross-compiler wrote diagnostics despite succeeding"
            );
        }

        Ok(stdout)
    }
}

impl StageCompiler for ProcessCompiler {
    fn compile(&self, stage: Stage) -> Result<String, CompileError> {
        let spec = InvocationSpec::new(stage, &self.options);
        let raw = self.run(&spec)?;
        let text = String::from_utf8(raw).map_err(|source| CompileError::Decode { stage, source })?;
        let normalized = normalize_line_endings(&text);
        debug!(%stage, bytes = normalized.len(), "captured cross-compiler output");
        Ok(normalized)
    }
}

fn drain<R>(pipe: Option<R>) -> Receiver<io::Result<Vec<u8>>>
where
    R: Read + Send + 'static,
{
    let (tx, rx) = bounded(1);
    match pipe {
        Some(mut pipe) => {
            thread::spawn(move || {
                let mut buffer = Vec::new();
                let result = pipe.read_to_end(&mut buffer).map(|_| buffer);
                let _ = tx.send(result);
            });
        }
        None => {
            let _ = tx.send(Ok(Vec::new()));
        }
    }
    rx
}

/// Returns `Ok(None)` when `deadline` passes before the pipe reaches EOF.
fn collect(
    rx: &Receiver<io::Result<Vec<u8>>>,
    deadline: Option<Instant>,
) -> io::Result<Option<Vec<u8>>> {
    let received = match deadline {
        Some(deadline) => match rx.recv_deadline(deadline) {
            Ok(received) => received,
            Err(RecvTimeoutError::Timeout) => return Ok(None),
            Err(RecvTimeoutError::Disconnected) => Err(reader_gone()),
        },
        None => rx.recv().unwrap_or_else(|_| Err(reader_gone())),
    };
    received.map(Some)
}

fn reader_gone() -> io::Error {
    io::Error::other("pipe reader thread exited without a result")
}

#[cfg(unix)]
fn terminate(child: &mut Child) {
    // The child leads its own process group whenever a timeout is set.
    let group = -(child.id() as libc::pid_t);
    unsafe {
        libc::kill(group, libc::SIGKILL);
    }
    let _ = child.wait();
}

#[cfg(not(unix))]
fn terminate(child: &mut Child) {
    let _ = child.kill();
    let _ = child.wait();
}

fn wait_until(child: &mut Child, deadline: Instant) -> io::Result<Option<ExitStatus>> {
    loop {
        if let Some(status) = child.try_wait()? {
            return Ok(Some(status));
        }
        let now = Instant::now();
        if now >= deadline {
            return Ok(None);
        }
        thread::sleep(POLL_INTERVAL.min(deadline - now));
    }
}

#[cfg(all(test, unix))]
mod tests {
    use std::fs;

    use super::*;

    /// Writes a stand-in compiler script; it is run through `sh` so the test
    /// never executes a file it just wrote.
    fn fake_compiler(dir: &Path, body: &str) -> ProcessCompiler {
        let script = dir.join("fake-hlsloptconv.sh");
        fs::write(&script, body).unwrap();
        ProcessCompiler::new(script, InvocationOptions::new("html5-shader.hlsl"))
            .with_launcher(["sh"])
    }

    #[test]
    fn passes_stage_arguments_to_the_tool() {
        let temp = tempfile::tempdir().unwrap();
        let compiler = fake_compiler(temp.path(), "printf '%s\\n' \"$@\"\n");

        let output = compiler.compile(Stage::Pixel).unwrap();
        assert_eq!(
            output,
            "-P\n-DPS=1\n-f\nglsl_es_100\n-s\npixel\n-x\njsstr\nhtml5-shader.hlsl\n"
        );
    }

    #[test]
    fn normalizes_crlf_output() {
        let temp = tempfile::tempdir().unwrap();
        let compiler = fake_compiler(temp.path(), "printf 'A\\r\\nB\\r\\n'\n");

        assert_eq!(compiler.compile(Stage::Vertex).unwrap(), "A\nB\n");
    }

    #[test]
    fn reports_stage_and_stderr_on_failure() {
        let temp = tempfile::tempdir().unwrap();
        let compiler = fake_compiler(
            temp.path(),
            "echo 'partial' ; echo 'compilation failed, no output generated' >&2 ; exit 1\n",
        );

        let err = compiler.compile(Stage::Pixel).unwrap_err();
        assert_eq!(err.stage(), Stage::Pixel);
        match err {
            CompileError::Failed {
                status,
                diagnostics,
                ..
            } => {
                assert_eq!(status.code(), Some(1));
                assert_eq!(diagnostics, "compilation failed, no output generated");
            }
            other => panic!("unexpected error: {other:?}"),
        }
    }

    #[test]
    fn rejects_non_utf8_output() {
        let temp = tempfile::tempdir().unwrap();
        let compiler = fake_compiler(temp.path(), "printf '\\377\\376'\n");

        let err = compiler.compile(Stage::Vertex).unwrap_err();
        assert!(matches!(err, CompileError::Decode { stage: Stage::Vertex, .. }));
    }

    #[test]
    fn kills_compiler_after_timeout() {
        let temp = tempfile::tempdir().unwrap();
        let compiler = fake_compiler(temp.path(), "exec sleep 5\n")
            .with_timeout(Some(Duration::from_millis(100)));

        let started = Instant::now();
        let err = compiler.compile(Stage::Vertex).unwrap_err();
        assert!(matches!(err, CompileError::TimedOut { stage: Stage::Vertex, .. }));
        assert!(started.elapsed() < Duration::from_secs(4));
    }

    #[test]
    fn timeout_covers_output_held_by_background_process() {
        let temp = tempfile::tempdir().unwrap();
        let compiler = fake_compiler(temp.path(), "sleep 3 &\nprintf ok\n")
            .with_timeout(Some(Duration::from_millis(200)));

        let started = Instant::now();
        let err = compiler.compile(Stage::Pixel).unwrap_err();
        assert!(matches!(err, CompileError::TimedOut { stage: Stage::Pixel, .. }));
        assert!(started.elapsed() < Duration::from_secs(2));
    }

    #[test]
    fn timeout_kills_processes_started_by_launcher() {
        let temp = tempfile::tempdir().unwrap();
        let marker = temp.path().join("still-running");
        let body = format!("(sleep 1; touch '{}') &\nwait\n", marker.display());
        let compiler = fake_compiler(temp.path(), &body)
            .with_timeout(Some(Duration::from_millis(200)));

        let err = compiler.compile(Stage::Vertex).unwrap_err();
        assert!(matches!(err, CompileError::TimedOut { .. }));

        thread::sleep(Duration::from_millis(1500));
        assert!(!marker.exists(), "background compiler outlived the timeout");
    }

    #[test]
    fn missing_program_is_a_spawn_error() {
        let compiler = ProcessCompiler::new(
            "/nonexistent/hlsloptconv",
            InvocationOptions::new("html5-shader.hlsl"),
        );

        let err = compiler.compile(Stage::Vertex).unwrap_err();
        assert!(matches!(err, CompileError::Spawn { stage: Stage::Vertex, .. }));
    }
}
