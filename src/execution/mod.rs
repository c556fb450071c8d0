//! Workflow Execution Module
//!
//! Provides the executor that walks a workflow step by step, the protocol
//! scripts use to report outputs, and the background coordination that runs
//! a step without blocking the caller.
//!
//! # Architecture
//!
//! - [`executor`]: Bindings, current position and captured outputs
//! - [`run`]: One execution attempt of a step script
//! - [`capture`]: The `key=value` outputs file protocol
//! - [`coordinator`]: Background tasks streaming run progress as events

pub mod capture;
pub mod coordinator;
pub mod executor;
pub mod run;

pub use capture::CapturedOutputs;
pub use coordinator::{
    run_current_step, spawn_run, OutputStream, RunEvent, RunEventReceiver, RunEventSender,
};
pub use executor::{CurrentStep, Executor};
pub use run::{RunHandle, RunOutcome, ShellConfig};
