//! Definition Loading
//!
//! Reads the workflow file (plain text, one step name per line) and the
//! YAML step files that make up the step catalog.

use std::fs;
use std::path::{Path, PathBuf};

use log::{debug, info};

use super::model::{StepDefinition, StepsFile, Workflow};
use crate::error::LoadError;

/// Parses workflow text into step names.
///
/// Lines are trimmed; blank lines and `#` comments are skipped.
pub fn parse_workflow(content: &str) -> Workflow {
    Workflow::from_steps(
        content
            .lines()
            .map(str::trim)
            .filter(|line| !line.is_empty() && !line.starts_with('#')),
    )
}

/// Loads a workflow from a text file.
///
/// # Example
///
/// ```rust,no_run
/// use guided_setup::workflow::load_workflow;
///
/// fn main() -> Result<(), Box<dyn std::error::Error>> {
///     let workflow = load_workflow("setup.workflow")?;
///     println!("Loaded {} steps", workflow.len());
///     Ok(())
/// }
/// ```
pub fn load_workflow(path: impl AsRef<Path>) -> Result<Workflow, LoadError> {
    let path = path.as_ref();
    info!("Loading workflow from: {}", path.display());

    let content = fs::read_to_string(path).map_err(|source| LoadError::Read {
        path: path.to_path_buf(),
        source,
    })?;

    let workflow = parse_workflow(&content);
    if workflow.is_empty() {
        return Err(LoadError::EmptyWorkflow(path.to_path_buf()));
    }

    info!("Parsed {} workflow steps", workflow.len());
    Ok(workflow)
}

/// Loads the step definitions from a single YAML file.
pub fn load_steps_file(path: impl AsRef<Path>) -> Result<Vec<StepDefinition>, LoadError> {
    let path = path.as_ref();

    let content = fs::read_to_string(path).map_err(|source| LoadError::Read {
        path: path.to_path_buf(),
        source,
    })?;

    let parsed: StepsFile = serde_yaml::from_str(&content).map_err(|source| LoadError::Parse {
        path: path.to_path_buf(),
        source,
    })?;

    debug!("{}: {} step definitions", path.display(), parsed.steps.len());
    Ok(parsed.steps)
}

/// Expands glob patterns and loads every matching step file.
///
/// Each pattern must match at least one file. Definitions keep the order of
/// the patterns, then the sorted order of the files each pattern matches.
pub fn load_catalog<S: AsRef<str>>(patterns: &[S]) -> Result<Vec<StepDefinition>, LoadError> {
    let mut catalog = Vec::new();

    for pattern in patterns {
        let pattern = pattern.as_ref();
        let mut files: Vec<PathBuf> = glob::glob(pattern)
            .map_err(|source| LoadError::Pattern {
                pattern: pattern.to_string(),
                source,
            })?
            .filter_map(Result::ok)
            .collect();
        files.sort();

        if files.is_empty() {
            return Err(LoadError::NoMatches(pattern.to_string()));
        }

        for file in files {
            catalog.extend(load_steps_file(&file)?);
        }
    }

    info!("Loaded {} step definitions", catalog.len());
    Ok(catalog)
}
