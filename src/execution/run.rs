//! Single Step Runs
//!
//! A [`RunHandle`] is one attempt at running the current step's script. It
//! owns the child process and a private capture directory; the directory is
//! removed when the handle finishes or is dropped, whichever comes first.
//!
//! Waiting on a run never touches executor state. The resulting
//! [`RunOutcome`] is handed back to the executor's owner, which merges it
//! with [`Executor::complete_run`](super::Executor::complete_run).

use std::ffi::OsStr;
use std::path::{Path, PathBuf};
use std::process::Stdio;

use log::{debug, info, warn};
use tempfile::TempDir;
use tokio::process::{Child, ChildStderr, ChildStdout, Command};
use tokio_util::sync::CancellationToken;

use super::capture::{input_env_name, read_outputs, CapturedOutputs, OUTPUT_ENV, OUTPUT_FILE_NAME};
use crate::error::RunError;

/// Script used when a step has no `run` body.
const NOOP_SCRIPT: &str = ":";

/// How step scripts are launched.
#[derive(Debug, Clone)]
pub struct ShellConfig {
    /// Interpreter invoked as `<program> -c <script>`
    pub program: String,

    /// File sourced before every script, if it exists
    pub rc_file: Option<PathBuf>,
}

impl Default for ShellConfig {
    fn default() -> Self {
        Self {
            program: "sh".to_string(),
            rc_file: None,
        }
    }
}

/// Builds the script passed to the shell.
///
/// An empty body becomes a no-op. When `rc_file` is given it is sourced
/// first.
pub fn build_script(run: &str, rc_file: Option<&Path>) -> String {
    let body = if run.trim().is_empty() { NOOP_SCRIPT } else { run };

    match rc_file {
        Some(rc) => format!(". {}\n{}", shell_quote(&rc.to_string_lossy()), body),
        None => body.to_string(),
    }
}

/// Single-quotes `value` for POSIX shells.
fn shell_quote(value: &str) -> String {
    format!("'{}'", value.replace('\'', r"'\''"))
}

/// Result of a finished run: the outputs it captured and how it ended.
///
/// `outputs` is filled even when `result` is an error, as long as the
/// outputs file could be parsed.
#[derive(Debug)]
pub struct RunOutcome {
    pub outputs: CapturedOutputs,
    pub result: Result<(), RunError>,
}

/// One execution attempt of the current step.
#[derive(Debug)]
pub struct RunHandle {
    step_name: String,
    command: Command,
    child: Option<Child>,
    capture_dir: TempDir,
    output_path: PathBuf,
    cancel: CancellationToken,
}

impl RunHandle {
    /// Builds the command and creates the capture directory.
    ///
    /// `inputs` pairs each declared input with its captured value, if any.
    /// Inputs without a value are removed from the inherited environment.
    pub(crate) fn new(
        step_name: &str,
        shell: &ShellConfig,
        script: &str,
        inputs: &[(String, Option<String>)],
        capture_root: &Path,
        cancel: CancellationToken,
    ) -> Result<Self, RunError> {
        let capture_dir = tempfile::Builder::new()
            .prefix("outputs-")
            .tempdir_in(capture_root)
            .map_err(RunError::CreateCaptureDir)?;
        let output_path = capture_dir.path().join(OUTPUT_FILE_NAME);

        let mut command = Command::new(&shell.program);
        command
            .arg("-c")
            .arg(script)
            .env(OUTPUT_ENV, &output_path)
            .stdin(Stdio::null())
            .stdout(Stdio::piped())
            .stderr(Stdio::piped())
            .kill_on_drop(true);

        for (name, value) in inputs {
            match value {
                Some(value) => command.env(input_env_name(name), value),
                None => command.env_remove(input_env_name(name)),
            };
        }

        debug!(
            "Prepared run of '{}' (outputs: {})",
            step_name,
            output_path.display()
        );

        Ok(Self {
            step_name: step_name.to_string(),
            command,
            child: None,
            capture_dir,
            output_path,
            cancel,
        })
    }

    pub fn step_name(&self) -> &str {
        &self.step_name
    }

    /// Path the script is told to write its outputs to.
    pub fn output_path(&self) -> &Path {
        &self.output_path
    }

    /// Directory holding the outputs file; removed when the run finishes.
    pub fn capture_dir(&self) -> &Path {
        self.capture_dir.path()
    }

    /// Value explicitly set for `key` in the child's environment.
    pub fn env_var(&self, key: &str) -> Option<String> {
        self.command
            .as_std()
            .get_envs()
            .find(|(name, _)| *name == OsStr::new(key))
            .and_then(|(_, value)| value)
            .map(|value| value.to_string_lossy().into_owned())
    }

    /// Spawns the process and returns without waiting for it.
    ///
    /// Stdout and stderr are piped; take them with [`take_stdout`] and
    /// [`take_stderr`] and keep reading them, or a chatty script will block
    /// once the pipe buffers fill up.
    ///
    /// [`take_stdout`]: RunHandle::take_stdout
    /// [`take_stderr`]: RunHandle::take_stderr
    pub fn start(&mut self) -> Result<(), RunError> {
        if self.child.is_some() {
            return Ok(());
        }
        let child = self.command.spawn().map_err(RunError::Spawn)?;
        info!("Started step '{}' (pid {:?})", self.step_name, child.id());
        self.child = Some(child);
        Ok(())
    }

    pub fn take_stdout(&mut self) -> Option<ChildStdout> {
        self.child.as_mut().and_then(|child| child.stdout.take())
    }

    pub fn take_stderr(&mut self) -> Option<ChildStderr> {
        self.child.as_mut().and_then(|child| child.stderr.take())
    }

    /// Waits for the process, collects its outputs and removes the capture
    /// directory.
    ///
    /// Outputs are read even if the process failed. When both the process
    /// and the outputs file are bad, the process failure is reported.
    pub async fn wait(mut self) -> RunOutcome {
        let process = match self.child.as_mut() {
            None => Err(RunError::NotStarted),
            Some(child) => {
                tokio::select! {
                    status = child.wait() => status.map_err(RunError::Wait),
                    _ = self.cancel.cancelled() => {
                        if let Err(e) = child.kill().await {
                            warn!("Failed to kill step '{}': {}", self.step_name, e);
                        }
                        Err(RunError::Cancelled)
                    }
                }
            }
        };
        let process = process.and_then(|status| {
            if status.success() {
                Ok(())
            } else {
                Err(RunError::Failed { status })
            }
        });

        let (outputs, result) = match (process, read_outputs(&self.output_path)) {
            (Ok(()), Ok(outputs)) => (outputs, Ok(())),
            (Ok(()), Err(e)) => (CapturedOutputs::new(), Err(e)),
            (Err(e), Ok(outputs)) => (outputs, Err(e)),
            (Err(e), Err(capture)) => {
                warn!("Step '{}' also left unusable outputs: {}", self.step_name, capture);
                (CapturedOutputs::new(), Err(e))
            }
        };

        let capture_path = self.capture_dir.path().to_path_buf();
        if let Err(e) = self.capture_dir.close() {
            warn!(
                "Failed to remove outputs dir {}: {}",
                capture_path.display(),
                e
            );
        }

        match &result {
            Ok(()) => info!(
                "Step '{}' finished, {} outputs captured",
                self.step_name,
                outputs.len()
            ),
            Err(e) => info!("Step '{}' failed: {}", self.step_name, e),
        }

        RunOutcome { outputs, result }
    }
}
