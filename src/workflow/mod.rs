//! Workflow Definition Module
//!
//! Data structures for workflows and step definitions, loading them from
//! disk, resolving workflow step names, and persisting run progress.
//!
//! # Structure
//!
//! - [`model`]: Core data structures (Workflow, StepDefinition)
//! - [`parser`]: Workflow and step file loading
//! - [`matcher`]: Binding workflow step names to step definitions
//! - [`state`]: Execution state and its persistence

pub mod matcher;
pub mod model;
pub mod parser;
pub mod state;

pub use matcher::{resolve, Binding};
pub use model::{NameMatcher, Parameter, StepDefinition, StepPattern, StepsFile, Workflow};
pub use parser::{load_catalog, load_workflow};
pub use state::{ExecutionState, StateStore};
