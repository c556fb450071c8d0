//! Interactive Front-End
//!
//! A terminal UI that shows the current step, streams its output while it
//! runs and lets the operator advance, re-run or quit.
//!
//! # Components
//!
//! - [`app`]: Lifecycle state machine driving the executor
//! - [`view`]: Rendering with ratatui
//! - [`runtime`]: Terminal setup and the async event loop
//! - [`transcript`]: Copy of all displayed output in a file

pub mod app;
pub mod runtime;
pub mod transcript;
pub mod view;

pub use app::{Action, App, Phase};
pub use runtime::run_app;
pub use transcript::Transcript;
