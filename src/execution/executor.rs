//! Workflow Executor
//!
//! Holds the resolved bindings, the position in the workflow and all outputs
//! captured so far. The executor is owned by a single thread (the UI loop);
//! background work only ever hands it [`RunOutcome`]s to apply.

use std::path::PathBuf;

use log::{debug, info};
use tokio_util::sync::CancellationToken;

use super::capture::CapturedOutputs;
use super::run::{build_script, RunHandle, RunOutcome, ShellConfig};
use crate::error::{ExecutorError, PrepareError, RunError};
use crate::workflow::{resolve, Binding, ExecutionState, StepDefinition, Workflow};

/// The step at the executor's current position.
#[derive(Debug, Clone, Copy)]
pub struct CurrentStep<'a> {
    pub index: usize,
    pub name: &'a str,
    pub step: &'a StepDefinition,
}

/// Runs a workflow one step at a time.
///
/// # Example
///
/// ```rust,no_run
/// use guided_setup::execution::{run_current_step, Executor};
/// use guided_setup::workflow::{StepDefinition, Workflow};
/// use tokio_util::sync::CancellationToken;
///
/// # async fn demo() -> Result<(), Box<dyn std::error::Error>> {
/// let workflow = Workflow::from_steps(["intro"]);
/// let catalog = vec![StepDefinition::new("^intro$", "echo hello")?];
///
/// let mut executor = Executor::new(workflow, catalog);
/// executor.prepare()?;
/// run_current_step(&mut executor, CancellationToken::new()).await?;
/// # Ok(())
/// # }
/// ```
#[derive(Debug)]
pub struct Executor {
    workflow: Workflow,
    catalog: Vec<StepDefinition>,
    bindings: Option<Vec<Binding>>,
    state: ExecutionState,
    shell: ShellConfig,
    capture_root: PathBuf,
}

impl Executor {
    /// Creates an executor; call [`prepare`](Executor::prepare) before use.
    pub fn new(workflow: Workflow, catalog: Vec<StepDefinition>) -> Self {
        Self {
            workflow,
            catalog,
            bindings: None,
            state: ExecutionState::default(),
            shell: ShellConfig::default(),
            capture_root: std::env::temp_dir(),
        }
    }

    /// Sets the rc file sourced before every step script.
    pub fn set_rc_file(&mut self, path: impl Into<PathBuf>) {
        self.shell.rc_file = Some(path.into());
    }

    /// Sets the interpreter used as `<program> -c <script>`.
    pub fn set_shell_program(&mut self, program: impl Into<String>) {
        self.shell.program = program.into();
    }

    /// Sets the directory under which per-run capture directories are made.
    pub fn set_capture_root(&mut self, dir: impl Into<PathBuf>) {
        self.capture_root = dir.into();
    }

    /// Binds every workflow step and resets the execution state.
    pub fn prepare(&mut self) -> Result<(), PrepareError> {
        self.bindings = None;
        let bindings = resolve(&self.workflow, &self.catalog)?;
        self.bindings = Some(bindings);
        self.state = ExecutionState::default();
        info!("Prepared workflow with {} steps", self.workflow.len());
        Ok(())
    }

    /// Replaces the execution state, e.g. with one loaded from disk.
    pub fn restore_state(&mut self, state: ExecutionState) -> Result<(), ExecutorError> {
        let len = self.bindings()?.len();
        if state.current_index >= len {
            return Err(ExecutorError::StateOutOfRange {
                index: state.current_index,
                len,
            });
        }
        debug!(
            "Restored state at step {} with {} captured outputs",
            state.current_index + 1,
            state.captured_outputs.len()
        );
        self.state = state;
        Ok(())
    }

    fn bindings(&self) -> Result<&[Binding], ExecutorError> {
        self.bindings.as_deref().ok_or(ExecutorError::NotPrepared)
    }

    pub fn is_prepared(&self) -> bool {
        self.bindings.is_some()
    }

    /// Returns the step at the current position.
    pub fn current_step(&self) -> Result<CurrentStep<'_>, ExecutorError> {
        let index = self.state.current_index;
        let binding = self
            .bindings()?
            .get(index)
            .ok_or(ExecutorError::EndOfWorkflow)?;

        Ok(CurrentStep {
            index,
            name: &binding.name,
            step: &binding.step,
        })
    }

    /// Advances to the next step.
    ///
    /// At the last step this returns [`ExecutorError::EndOfWorkflow`] and the
    /// position stays where it is.
    pub fn next_step(&mut self) -> Result<CurrentStep<'_>, ExecutorError> {
        let len = self.bindings()?.len();
        if self.state.current_index + 1 >= len {
            return Err(ExecutorError::EndOfWorkflow);
        }
        self.state.current_index += 1;
        info!(
            "Advanced to step {}/{}",
            self.state.current_index + 1,
            len
        );
        self.current_step()
    }

    /// Prepares a run of the current step.
    ///
    /// Each declared input is passed as `INPUT_<name>` with its captured
    /// value; inputs nothing has produced yet are left unset. The capture
    /// directory exists once this returns.
    pub fn prepare_run(&self, cancel: CancellationToken) -> Result<RunHandle, RunError> {
        let current = self.current_step()?;

        let inputs: Vec<(String, Option<String>)> = current
            .step
            .inputs
            .iter()
            .map(|input| {
                let value = self.state.captured_outputs.get(&input.name).cloned();
                if value.is_none() {
                    debug!("Input '{}' of '{}' has no value yet", input.name, current.name);
                }
                (input.name.clone(), value)
            })
            .collect();

        let rc_file = self.shell.rc_file.as_deref().filter(|path| path.exists());
        let script = build_script(&current.step.run, rc_file);

        RunHandle::new(
            current.name,
            &self.shell,
            &script,
            &inputs,
            &self.capture_root,
            cancel,
        )
    }

    /// Applies a finished run: merges its outputs, then returns its result.
    pub fn complete_run(&mut self, outcome: RunOutcome) -> Result<(), RunError> {
        let RunOutcome { outputs, result } = outcome;
        for (key, value) in outputs {
            debug!("Captured {}={}", key, value);
            self.state.captured_outputs.insert(key, value);
        }
        result
    }

    pub fn workflow(&self) -> &Workflow {
        &self.workflow
    }

    pub fn state(&self) -> &ExecutionState {
        &self.state
    }

    pub fn captured_outputs(&self) -> &CapturedOutputs {
        &self.state.captured_outputs
    }

    /// Last captured value for an output name.
    pub fn captured(&self, name: &str) -> Option<&str> {
        self.state.captured_outputs.get(name).map(String::as_str)
    }

    pub fn current_index(&self) -> usize {
        self.state.current_index
    }

    /// Number of workflow steps.
    pub fn len(&self) -> usize {
        self.workflow.len()
    }

    pub fn is_empty(&self) -> bool {
        self.workflow.is_empty()
    }
}
