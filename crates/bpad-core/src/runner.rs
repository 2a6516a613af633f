//! External command execution.

use std::collections::BTreeMap;
use std::path::{Path, PathBuf};
use std::process::Stdio;

use async_trait::async_trait;
use tokio::io::AsyncWriteExt;
use tokio::process::{ChildStdin, Command};
use tracing::{debug, error};

use crate::error::{BpadError, Result};

/// Stands in for secret arguments and output in logs and errors.
const REDACTED: &str = "****";

/// An external command to run.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct CommandSpec {
    /// Executable name or path.
    pub program: String,

    pub args: Vec<String>,

    /// Working directory for the child. The parent's directory never changes.
    pub cwd: Option<PathBuf>,

    /// Text written to the child's stdin. When unset, stdin is inherited.
    pub stdin: Option<String>,

    /// Extra environment for the child, layered over the inherited one.
    pub env: BTreeMap<String, String>,

    /// Whether a non-zero exit is an error.
    pub check: bool,

    /// Indices into `args` rendered as `****` by [`CommandSpec::display`].
    pub masked: Vec<usize>,

    /// Keep captured output out of debug logs.
    pub sensitive: bool,

    /// Whether stdout/stderr are captured. When false the child writes
    /// straight to the terminal and [`CommandOutput`] carries no text.
    pub capture: bool,
}

impl CommandSpec {
    pub fn new(program: impl Into<String>) -> Self {
        Self {
            program: program.into(),
            args: Vec::new(),
            cwd: None,
            stdin: None,
            env: BTreeMap::new(),
            check: true,
            masked: Vec::new(),
            sensitive: false,
            capture: true,
        }
    }

    pub fn arg(mut self, arg: impl Into<String>) -> Self {
        self.args.push(arg.into());
        self
    }

    pub fn args<I, S>(mut self, args: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        self.args.extend(args.into_iter().map(Into::into));
        self
    }

    /// Append an argument that never appears in rendered command lines.
    pub fn secret_arg(mut self, arg: impl Into<String>) -> Self {
        self.masked.push(self.args.len());
        self.args.push(arg.into());
        self
    }

    /// Mark the command's output as secret.
    pub fn sensitive(mut self) -> Self {
        self.sensitive = true;
        self
    }

    /// Let the child talk to the terminal directly, e.g. for a confirmation
    /// prompt.
    pub fn interactive(mut self) -> Self {
        self.capture = false;
        self
    }

    pub fn current_dir(mut self, dir: impl AsRef<Path>) -> Self {
        self.cwd = Some(dir.as_ref().to_path_buf());
        self
    }

    pub fn stdin(mut self, input: impl Into<String>) -> Self {
        self.stdin = Some(input.into());
        self
    }

    pub fn envs<I, K, V>(mut self, vars: I) -> Self
    where
        I: IntoIterator<Item = (K, V)>,
        K: Into<String>,
        V: Into<String>,
    {
        self.env
            .extend(vars.into_iter().map(|(k, v)| (k.into(), v.into())));
        self
    }

    /// Allow non-zero exit; the caller inspects [`CommandOutput::exit_code`].
    pub fn unchecked(mut self) -> Self {
        self.check = false;
        self
    }

    /// Render as `program arg1 arg2 ...` for logs and errors.
    pub fn display(&self) -> String {
        std::iter::once(self.program.as_str())
            .chain(self.args.iter().enumerate().map(|(i, arg)| {
                if self.masked.contains(&i) {
                    REDACTED
                } else {
                    arg.as_str()
                }
            }))
            .collect::<Vec<_>>()
            .join(" ")
    }
}

/// Captured result of a finished command.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct CommandOutput {
    /// Rendered command line.
    pub command: String,

    /// Exit code (-1 when terminated by a signal).
    pub exit_code: i32,

    pub stdout: String,

    pub stderr: String,
}

impl CommandOutput {
    /// Successful output with the given stdout.
    pub fn ok(command: impl Into<String>, stdout: impl Into<String>) -> Self {
        Self {
            command: command.into(),
            exit_code: 0,
            stdout: stdout.into(),
            stderr: String::new(),
        }
    }

    pub fn success(&self) -> bool {
        self.exit_code == 0
    }

    /// Stdout followed by stderr.
    pub fn combined(&self) -> String {
        match (self.stdout.is_empty(), self.stderr.is_empty()) {
            (_, true) => self.stdout.clone(),
            (true, false) => self.stderr.clone(),
            (false, false) => format!("{}\n{}", self.stdout.trim_end(), self.stderr),
        }
    }

    /// Convert a non-zero exit into [`BpadError::CommandFailed`].
    pub fn into_checked(self) -> Result<Self> {
        self.checked(false)
    }

    /// Like [`CommandOutput::into_checked`], honouring [`CommandSpec::sensitive`]:
    /// stdout of a sensitive command is neither logged nor kept in the error.
    pub fn checked_for(self, spec: &CommandSpec) -> Result<Self> {
        self.checked(spec.sensitive)
    }

    fn checked(self, sensitive: bool) -> Result<Self> {
        if self.success() {
            return Ok(self);
        }
        let stdout = if sensitive {
            REDACTED.to_string()
        } else {
            self.stdout
        };
        error!(
            command = %self.command,
            exit_code = self.exit_code,
            stdout = %stdout,
            stderr = %self.stderr,
            "Command failed"
        );
        Err(BpadError::CommandFailed {
            command: self.command,
            exit_code: self.exit_code,
            stdout,
            stderr: self.stderr,
        })
    }
}

/// Executes external commands.
#[async_trait]
pub trait CommandRunner: Send + Sync {
    /// Run a command to completion and capture its output.
    ///
    /// When `spec.check` is set, a non-zero exit is returned as
    /// [`BpadError::CommandFailed`].
    async fn run(&self, spec: &CommandSpec) -> Result<CommandOutput>;
}

/// Runs commands as real child processes.
#[derive(Debug, Default, Clone, Copy)]
pub struct ProcessRunner;

impl ProcessRunner {
    pub fn new() -> Self {
        Self
    }
}

#[async_trait]
impl CommandRunner for ProcessRunner {
    async fn run(&self, spec: &CommandSpec) -> Result<CommandOutput> {
        let rendered = spec.display();
        debug!(command = %rendered, cwd = ?spec.cwd, "Executing command");

        let mut command = Command::new(&spec.program);
        command
            .args(&spec.args)
            .envs(&spec.env)
            .stdout(if spec.capture {
                Stdio::piped()
            } else {
                Stdio::inherit()
            })
            .stderr(if spec.capture {
                Stdio::piped()
            } else {
                Stdio::inherit()
            })
            .stdin(if spec.stdin.is_some() {
                Stdio::piped()
            } else {
                Stdio::inherit()
            });
        if let Some(dir) = &spec.cwd {
            command.current_dir(dir);
        }

        let spawn_err = |source| BpadError::CommandSpawn {
            command: rendered.clone(),
            source,
        };
        let mut child = command.spawn().map_err(spawn_err)?;

        // Stdin is fed while output is drained; the child may fill its
        // stdout pipe before it has read all of its input.
        let stdin = child.stdin.take();
        let (fed, output) = tokio::join!(
            feed_stdin(stdin, spec.stdin.as_deref()),
            child.wait_with_output()
        );
        fed?;
        let output = output?;
        let result = CommandOutput {
            command: rendered,
            exit_code: output.status.code().unwrap_or(-1),
            stdout: String::from_utf8_lossy(&output.stdout).to_string(),
            stderr: String::from_utf8_lossy(&output.stderr).to_string(),
        };
        if spec.sensitive {
            debug!(command = %result.command, exit_code = result.exit_code, "Command result");
        } else {
            debug!(
                command = %result.command,
                exit_code = result.exit_code,
                output = %result.combined(),
                "Command result"
            );
        }

        if spec.check {
            result.checked_for(spec)
        } else {
            Ok(result)
        }
    }
}

/// Write `input` to the child and close the pipe. A child that exits without
/// reading everything is not an error here; its exit status decides.
async fn feed_stdin(stdin: Option<ChildStdin>, input: Option<&str>) -> std::io::Result<()> {
    let (Some(mut stdin), Some(input)) = (stdin, input) else {
        return Ok(());
    };
    match stdin.write_all(input.as_bytes()).await {
        Err(e) if e.kind() == std::io::ErrorKind::BrokenPipe => Ok(()),
        other => other,
    }
}
