//! Execution adapter: runs build and benchmark commands through the shell
//!
//! Every command is run as `sh -c` with the stack limit relaxed first: the
//! benchmarks keep large arrays on the stack and segfault under the default
//! 8 MiB limit. Standard output is always discarded. Standard error is
//! discarded unless the caller routes it into a file, which is how benchmark
//! results reach the value reader.
//!
//! Commands run one at a time and are never timed out. The only event that
//! interrupts a wait is Ctrl-C: the child is killed and the caller gets
//! [`TuneError::Interrupted`], which aborts the whole run. Ctrl-C trips an
//! [`InterruptLatch`] that stays set, so a signal landing between two commands
//! still stops the next one before it is spawned.

use crate::error::{TuneError, TuneResult};
use async_trait::async_trait;
use std::fs::{File, OpenOptions};
use std::path::{Path, PathBuf};
use std::process::{ExitStatus, Stdio};
use tokio_util::sync::CancellationToken;
use tracing::{debug, trace, warn};

/// Exit status of a shell killed by SIGINT, negated-signal convention
pub const SIGINT_STATUS: i32 = -2;

/// Where a command's standard error goes
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum OutputSink {
    /// Thrown away
    Discard,
    /// Written to a file, replacing previous contents
    Truncate(PathBuf),
    /// Appended to a file (build logs)
    Append(PathBuf),
}

/// A shell command plus the routing of its standard error
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct CommandSpec {
    pub command: String,
    pub stderr: OutputSink,
}

impl CommandSpec {
    /// Command with standard error discarded
    pub fn new(command: impl Into<String>) -> Self {
        Self {
            command: command.into(),
            stderr: OutputSink::Discard,
        }
    }

    /// Route standard error into `path`, truncating it
    pub fn stderr_to(mut self, path: impl Into<PathBuf>) -> Self {
        self.stderr = OutputSink::Truncate(path.into());
        self
    }

    /// Append standard error to `path`
    pub fn stderr_append(mut self, path: impl Into<PathBuf>) -> Self {
        self.stderr = OutputSink::Append(path.into());
        self
    }
}

/// One-way flag set by Ctrl-C and never cleared.
///
/// Clones observe and trip the same flag.
#[derive(Debug, Clone, Default)]
pub struct InterruptLatch {
    token: CancellationToken,
}

impl InterruptLatch {
    /// A latch only [`Self::trigger`] can set
    pub fn new() -> Self {
        Self::default()
    }

    /// A latch tripped by the first Ctrl-C the process receives.
    ///
    /// Spawns the listener, so it must be called inside a tokio runtime.
    pub fn ctrl_c() -> Self {
        let latch = Self::new();
        let token = latch.token.clone();
        tokio::spawn(async move {
            match tokio::signal::ctrl_c().await {
                Ok(()) => {
                    warn!("sigint! stopping");
                    token.cancel();
                }
                Err(e) => warn!(error = %e, "Cannot listen for Ctrl-C"),
            }
        });
        latch
    }

    pub fn trigger(&self) {
        self.token.cancel();
    }

    pub fn is_set(&self) -> bool {
        self.token.is_cancelled()
    }

    /// Resolves once the latch is set
    pub async fn tripped(&self) {
        self.token.cancelled().await
    }
}

/// Runs external commands on behalf of the pipeline.
///
/// `ShellRunner` is the real implementation; tests substitute scripted
/// runners that fabricate result files.
#[async_trait]
pub trait CommandRunner: Send + Sync {
    /// Run a command to completion and return its raw exit status.
    ///
    /// Signals are reported as the negated signal number. An interrupt is
    /// never returned as a status: it is always `Err(Interrupted)`.
    async fn run(&self, spec: &CommandSpec) -> TuneResult<i32>;

    /// Run a command and return its standard output, or an empty string if it failed
    async fn capture(&self, command: &str) -> TuneResult<String>;
}

/// Platform stack limit passed to `ulimit -s`.
///
/// macOS refuses `unlimited` for the stack, 65532 KiB is its hard maximum.
pub fn default_stack_limit() -> Option<String> {
    if cfg!(target_os = "macos") {
        Some("65532".to_string())
    } else {
        Some("unlimited".to_string())
    }
}

/// Shell-backed command runner
#[derive(Debug, Clone)]
pub struct ShellRunner {
    /// Directory commands run in; relative sink paths resolve against it too
    working_dir: PathBuf,
    /// Argument for `ulimit -s`, or `None` to leave the limit alone
    stack_limit: Option<String>,
    interrupt: InterruptLatch,
}

impl ShellRunner {
    /// Runner that leaves Ctrl-C to its default disposition, see [`Self::with_interrupt`]
    pub fn new(working_dir: impl AsRef<Path>, stack_limit: Option<String>) -> Self {
        Self {
            working_dir: working_dir.as_ref().to_path_buf(),
            stack_limit,
            interrupt: InterruptLatch::new(),
        }
    }

    /// Refuse to start commands once `latch` is set, and abandon the running one
    pub fn with_interrupt(mut self, latch: InterruptLatch) -> Self {
        self.interrupt = latch;
        self
    }

    fn check_interrupt(&self, command: &str) -> TuneResult<()> {
        if self.interrupt.is_set() {
            debug!(command, "Interrupted before start");
            return Err(TuneError::Interrupted {
                command: command.to_string(),
            });
        }
        Ok(())
    }

    pub fn working_dir(&self) -> &Path {
        &self.working_dir
    }

    /// Prefix a command with the stack-limit relaxation.
    ///
    /// `ulimit` complaints are silenced so they never end up in a result file.
    pub fn wrap(&self, command: &str) -> String {
        match &self.stack_limit {
            Some(limit) => format!("ulimit -s {limit} 2>/dev/null; {command}"),
            None => command.to_string(),
        }
    }

    fn shell(&self, command: &str) -> tokio::process::Command {
        let mut cmd = tokio::process::Command::new("sh");
        cmd.arg("-c")
            .arg(self.wrap(command))
            .current_dir(&self.working_dir)
            .stdin(Stdio::null())
            .stdout(Stdio::null())
            .kill_on_drop(true);
        cmd
    }

    fn open_sink(&self, sink: &OutputSink) -> TuneResult<Stdio> {
        let (path, append) = match sink {
            OutputSink::Discard => return Ok(Stdio::null()),
            OutputSink::Truncate(path) => (self.working_dir.join(path), false),
            OutputSink::Append(path) => (self.working_dir.join(path), true),
        };

        if let Some(parent) = path.parent() {
            std::fs::create_dir_all(parent).map_err(|e| TuneError::io(parent, e))?;
        }

        let file = if append {
            OpenOptions::new().create(true).append(true).open(&path)
        } else {
            File::create(&path)
        }
        .map_err(|e| TuneError::io(&path, e))?;

        Ok(Stdio::from(file))
    }
}

#[async_trait]
impl CommandRunner for ShellRunner {
    async fn run(&self, spec: &CommandSpec) -> TuneResult<i32> {
        self.check_interrupt(&spec.command)?;
        let mut cmd = self.shell(&spec.command);
        cmd.stderr(self.open_sink(&spec.stderr)?);
        debug!(command = %spec.command, "Running");

        let status = tokio::select! {
            status = cmd.status() => status.map_err(|source| TuneError::Spawn {
                command: spec.command.clone(),
                source,
            })?,
            _ = self.interrupt.tripped() => {
                return Err(TuneError::Interrupted { command: spec.command.clone() });
            }
        };

        let code = status_code(status);
        trace!(command = %spec.command, status = code, "Finished");
        if code == SIGINT_STATUS {
            warn!(command = %spec.command, "sigint! stopping");
            return Err(TuneError::Interrupted {
                command: spec.command.clone(),
            });
        }
        Ok(code)
    }

    async fn capture(&self, command: &str) -> TuneResult<String> {
        self.check_interrupt(command)?;
        let mut cmd = self.shell(command);
        cmd.stdout(Stdio::piped()).stderr(Stdio::null());
        debug!(command, "Capturing");

        let output = tokio::select! {
            output = cmd.output() => output.map_err(|source| TuneError::Spawn {
                command: command.to_string(),
                source,
            })?,
            _ = self.interrupt.tripped() => {
                return Err(TuneError::Interrupted { command: command.to_string() });
            }
        };

        match status_code(output.status) {
            0 => Ok(String::from_utf8_lossy(&output.stdout).into_owned()),
            SIGINT_STATUS => Err(TuneError::Interrupted {
                command: command.to_string(),
            }),
            _ => Ok(String::new()),
        }
    }
}

/// Exit code, or the negated signal number for signal deaths
fn status_code(status: ExitStatus) -> i32 {
    if let Some(code) = status.code() {
        return code;
    }
    #[cfg(unix)]
    {
        use std::os::unix::process::ExitStatusExt;
        if let Some(signal) = status.signal() {
            return -signal;
        }
    }
    -1
}
