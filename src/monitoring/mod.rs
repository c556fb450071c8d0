//! Monitoring Module
//!
//! Tracks step runs during an interactive session.
//!
//! # Components
//!
//! - [`ExecutionTimeline`]: Step start/end timing and the session summary

pub mod timeline;

pub use timeline::{EventType, ExecutionTimeline, RunRecord, TimelineEvent};
