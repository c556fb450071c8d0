//! Background Run Coordination
//!
//! Runs a [`RunHandle`] on tokio tasks and reports progress as [`RunEvent`]s
//! so the caller's loop never blocks on process I/O. Each run uses three
//! tasks: one reader per output stream and one waiter. The waiter drains
//! both readers before it sends the single `Finished` event, so every output
//! chunk of a run arrives before that run's `Finished`.

use std::time::Duration;

use log::{debug, warn};
use tokio::io::{AsyncRead, AsyncReadExt};
use tokio::sync::mpsc;
use tokio::task::JoinHandle;
use tokio_util::sync::CancellationToken;

use super::executor::Executor;
use super::run::{RunHandle, RunOutcome};
use crate::error::RunError;

/// Bytes requested per read from a child's output pipe.
const READ_CHUNK_SIZE: usize = 1024;

/// How long to keep reading after the process exits. Background children
/// that inherited the pipes can hold them open indefinitely.
const DRAIN_GRACE: Duration = Duration::from_millis(500);

/// Which pipe an output chunk came from.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum OutputStream {
    Stdout,
    Stderr,
}

/// Progress of a background run.
#[derive(Debug)]
pub enum RunEvent {
    /// Bytes read from one of the process's output streams
    Output {
        run_id: u64,
        stream: OutputStream,
        data: Vec<u8>,
    },

    /// The process exited and its outputs were collected
    Finished { run_id: u64, outcome: RunOutcome },
}

impl RunEvent {
    pub fn run_id(&self) -> u64 {
        match self {
            Self::Output { run_id, .. } | Self::Finished { run_id, .. } => *run_id,
        }
    }
}

pub type RunEventSender = mpsc::UnboundedSender<RunEvent>;
pub type RunEventReceiver = mpsc::UnboundedReceiver<RunEvent>;

/// Starts `handle` and streams its progress to `events`.
///
/// Spawning happens before this returns, so a missing shell is reported
/// here rather than as an event. Must be called within a tokio runtime.
pub fn spawn_run(
    run_id: u64,
    mut handle: RunHandle,
    events: RunEventSender,
) -> Result<JoinHandle<()>, RunError> {
    handle.start()?;

    let readers: Vec<JoinHandle<()>> = [
        handle
            .take_stdout()
            .map(|pipe| spawn_reader(run_id, OutputStream::Stdout, pipe, events.clone())),
        handle
            .take_stderr()
            .map(|pipe| spawn_reader(run_id, OutputStream::Stderr, pipe, events.clone())),
    ]
    .into_iter()
    .flatten()
    .collect();

    Ok(tokio::spawn(async move {
        let step_name = handle.step_name().to_string();
        let outcome = handle.wait().await;

        for reader in readers {
            drain(reader).await;
        }

        if events.send(RunEvent::Finished { run_id, outcome }).is_err() {
            debug!("Run {} of '{}' finished after its receiver closed", run_id, step_name);
        }
    }))
}

fn spawn_reader<R>(
    run_id: u64,
    stream: OutputStream,
    mut pipe: R,
    events: RunEventSender,
) -> JoinHandle<()>
where
    R: AsyncRead + Unpin + Send + 'static,
{
    tokio::spawn(async move {
        let mut buf = [0u8; READ_CHUNK_SIZE];
        loop {
            match pipe.read(&mut buf).await {
                Ok(0) => break,
                Ok(n) => {
                    let event = RunEvent::Output {
                        run_id,
                        stream,
                        data: buf[..n].to_vec(),
                    };
                    if events.send(event).is_err() {
                        break;
                    }
                }
                Err(e) => {
                    debug!("Reading {:?} of run {} failed: {}", stream, run_id, e);
                    break;
                }
            }
        }
    })
}

async fn drain(reader: JoinHandle<()>) {
    let abort = reader.abort_handle();
    if tokio::time::timeout(DRAIN_GRACE, reader).await.is_err() {
        warn!("Output pipe still open after the step exited, dropping further output");
        abort.abort();
    }
}

/// Collected output of a run driven by [`run_current_step`].
#[derive(Debug, Default, Clone)]
pub struct StepOutput {
    pub stdout: Vec<u8>,
    pub stderr: Vec<u8>,
}

/// Runs the executor's current step to completion and applies its outcome.
///
/// This is the non-interactive path: the same tasks and events the UI uses,
/// consumed in place.
pub async fn run_current_step(
    executor: &mut Executor,
    cancel: CancellationToken,
) -> Result<StepOutput, RunError> {
    let handle = executor.prepare_run(cancel)?;
    let (sender, mut receiver) = mpsc::unbounded_channel();
    spawn_run(0, handle, sender)?;

    let mut output = StepOutput::default();
    while let Some(event) = receiver.recv().await {
        match event {
            RunEvent::Output {
                stream: OutputStream::Stdout,
                data,
                ..
            } => output.stdout.extend(data),
            RunEvent::Output {
                stream: OutputStream::Stderr,
                data,
                ..
            } => output.stderr.extend(data),
            RunEvent::Finished { outcome, .. } => {
                executor.complete_run(outcome)?;
                return Ok(output);
            }
        }
    }

    Err(RunError::Wait(std::io::Error::new(
        std::io::ErrorKind::Other,
        "run task ended without reporting",
    )))
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::workflow::{StepDefinition, Workflow};
    use tempfile::tempdir;

    fn executor(steps: Vec<StepDefinition>, names: &[&str], root: &std::path::Path) -> Executor {
        let mut executor = Executor::new(Workflow::from_steps(names.iter().copied()), steps);
        executor.set_capture_root(root);
        executor.prepare().unwrap();
        executor
    }

    async fn collect(mut receiver: RunEventReceiver) -> Vec<RunEvent> {
        let mut events = Vec::new();
        while let Some(event) = receiver.recv().await {
            let finished = matches!(event, RunEvent::Finished { .. });
            events.push(event);
            if finished {
                break;
            }
        }
        events
    }

    #[tokio::test]
    async fn test_events_stream_both_pipes_then_finish() {
        let root = tempdir().unwrap();
        let executor = executor(
            vec![StepDefinition::new(
                "^talk$",
                "echo out; echo err >&2; echo OK=1 >> \"$OUTPUT\"",
            )
            .unwrap()],
            &["talk"],
            root.path(),
        );

        let (sender, receiver) = mpsc::unbounded_channel();
        let handle = executor.prepare_run(CancellationToken::new()).unwrap();
        spawn_run(7, handle, sender).unwrap();
        let events = collect(receiver).await;

        let mut stdout = Vec::new();
        let mut stderr = Vec::new();
        for event in &events[..events.len() - 1] {
            match event {
                RunEvent::Output {
                    stream: OutputStream::Stdout,
                    data,
                    ..
                } => stdout.extend_from_slice(data),
                RunEvent::Output {
                    stream: OutputStream::Stderr,
                    data,
                    ..
                } => stderr.extend_from_slice(data),
                RunEvent::Finished { .. } => panic!("finished twice"),
            }
        }
        assert_eq!(stdout, b"out\n");
        assert_eq!(stderr, b"err\n");
        assert!(events.iter().all(|event| event.run_id() == 7));

        match events.last() {
            Some(RunEvent::Finished { outcome, .. }) => {
                assert!(outcome.result.is_ok());
                assert_eq!(outcome.outputs["OK"], "1");
            }
            other => panic!("expected Finished last, got {:?}", other),
        }
    }

    #[tokio::test]
    async fn test_all_output_arrives_before_finished() {
        let root = tempdir().unwrap();
        let executor = executor(
            vec![StepDefinition::new(
                "^noisy$",
                "i=0; while [ $i -lt 2000 ]; do echo line-$i; i=$((i+1)); done",
            )
            .unwrap()],
            &["noisy"],
            root.path(),
        );

        let (sender, receiver) = mpsc::unbounded_channel();
        let handle = executor.prepare_run(CancellationToken::new()).unwrap();
        spawn_run(1, handle, sender).unwrap();
        let events = collect(receiver).await;

        let stdout: Vec<u8> = events
            .iter()
            .filter_map(|event| match event {
                RunEvent::Output { data, .. } => Some(data.clone()),
                RunEvent::Finished { .. } => None,
            })
            .flatten()
            .collect();
        let text = String::from_utf8(stdout).unwrap();

        assert_eq!(text.lines().count(), 2000);
        assert_eq!(text.lines().last(), Some("line-1999"));
        assert!(matches!(events.last(), Some(RunEvent::Finished { .. })));
    }

    #[tokio::test]
    async fn test_background_child_does_not_block_finish() {
        let root = tempdir().unwrap();
        let executor = executor(
            vec![StepDefinition::new("^bg$", "sleep 30 &\necho started").unwrap()],
            &["bg"],
            root.path(),
        );

        let (sender, receiver) = mpsc::unbounded_channel();
        let handle = executor.prepare_run(CancellationToken::new()).unwrap();
        spawn_run(1, handle, sender).unwrap();

        let events = tokio::time::timeout(Duration::from_secs(10), collect(receiver))
            .await
            .expect("finish must not wait for the background child");
        assert!(matches!(events.last(), Some(RunEvent::Finished { .. })));
    }

    #[tokio::test]
    async fn test_spawn_failure_is_returned() {
        let root = tempdir().unwrap();
        let mut executor = executor(
            vec![StepDefinition::new("^a$", "").unwrap()],
            &["a"],
            root.path(),
        );
        executor.set_shell_program("/nonexistent/shell");

        let (sender, _receiver) = mpsc::unbounded_channel();
        let handle = executor.prepare_run(CancellationToken::new()).unwrap();
        let dir = handle.capture_dir().to_path_buf();

        assert!(matches!(spawn_run(1, handle, sender), Err(RunError::Spawn(_))));
        assert!(!dir.exists());
    }

    #[tokio::test]
    async fn test_run_current_step_applies_outputs() {
        let root = tempdir().unwrap();
        let mut executor = executor(
            vec![
                StepDefinition::new("^produce$", "echo X=foo >> \"$OUTPUT\"")
                    .unwrap()
                    .with_output("X"),
                StepDefinition::new("^consume$", "echo \"got $INPUT_X\"")
                    .unwrap()
                    .with_input("X"),
            ],
            &["produce", "consume"],
            root.path(),
        );

        run_current_step(&mut executor, CancellationToken::new())
            .await
            .unwrap();
        assert_eq!(executor.captured("X"), Some("foo"));

        executor.next_step().unwrap();
        let output = run_current_step(&mut executor, CancellationToken::new())
            .await
            .unwrap();
        assert_eq!(output.stdout, b"got foo\n");
    }

    #[tokio::test]
    async fn test_run_current_step_sources_rc_file() {
        let root = tempdir().unwrap();
        let rc = root.path().join("rc");
        std::fs::write(&rc, "GREETING=hello\n").unwrap();

        let mut executor = executor(
            vec![StepDefinition::new("^a$", "echo \"$GREETING\"").unwrap()],
            &["a"],
            root.path(),
        );
        executor.set_rc_file(&rc);

        let output = run_current_step(&mut executor, CancellationToken::new())
            .await
            .unwrap();
        assert_eq!(output.stdout, b"hello\n");
    }

    #[tokio::test]
    async fn test_run_current_step_reports_failure() {
        let root = tempdir().unwrap();
        let mut executor = executor(
            vec![StepDefinition::new("^a$", "echo V=1 >> \"$OUTPUT\"; exit 2").unwrap()],
            &["a"],
            root.path(),
        );

        let result = run_current_step(&mut executor, CancellationToken::new()).await;
        assert!(matches!(result, Err(RunError::Failed { .. })));
        assert_eq!(executor.captured("V"), Some("1"));
    }
}
