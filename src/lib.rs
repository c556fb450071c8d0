//! Guided Setup - Interactive Step-by-Step Workflow Runner
//!
//! Walks an operator through a setup procedure one step at a time. A
//! workflow is an ordered list of step names; each name is bound to a step
//! definition (a shell script plus described inputs and outputs) by pattern.
//! Scripts report results by appending `key=value` lines to the file named by
//! `$OUTPUT`, and later steps receive them as `INPUT_<name>` variables.
//!
//! # Architecture
//!
//! The library is organized into five modules:
//!
//! - [`workflow`]: Workflow and step definitions, loading, matching, saved state
//! - [`execution`]: The executor, step runs and background run coordination
//! - [`monitoring`]: Timeline of step runs for the session summary
//! - [`ui`]: Terminal front-end
//! - [`error`]: Error types shared by all of the above
//!
//! # Example
//!
//! ```rust,no_run
//! use guided_setup::execution::run_current_step;
//! use guided_setup::{load_catalog, load_workflow, Executor};
//! use tokio_util::sync::CancellationToken;
//!
//! # async fn demo() -> Result<(), Box<dyn std::error::Error>> {
//! let workflow = load_workflow("setup.workflow")?;
//! let catalog = load_catalog(&["steps/*.yaml"])?;
//!
//! let mut executor = Executor::new(workflow, catalog);
//! executor.prepare()?;
//!
//! loop {
//!     run_current_step(&mut executor, CancellationToken::new()).await?;
//!     match executor.next_step() {
//!         Ok(_) => continue,
//!         Err(e) if e.is_end_of_workflow() => break,
//!         Err(e) => return Err(e.into()),
//!     }
//! }
//! println!("{:?}", executor.captured_outputs());
//! # Ok(())
//! # }
//! ```

pub mod error;
pub mod execution;
pub mod monitoring;
pub mod ui;
pub mod workflow;

// Re-export commonly used types
pub use error::{ExecutorError, LoadError, PrepareError, RunError, StateError};
pub use execution::Executor;
pub use workflow::model::{StepDefinition, Workflow};
pub use workflow::parser::{load_catalog, load_workflow};

/// Library version
pub const VERSION: &str = env!("CARGO_PKG_VERSION");

/// Application name
pub const APP_NAME: &str = "Guided Setup";
