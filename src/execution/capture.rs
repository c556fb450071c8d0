//! Output Capture Protocol
//!
//! A step reports results by appending `key=value` lines to the file named by
//! its `OUTPUT` environment variable. The first `=` separates key and value,
//! blank lines are ignored, any other line without `=` is malformed. A
//! missing file means the step produced no outputs.

use std::collections::HashMap;
use std::fs;
use std::io::ErrorKind;
use std::path::Path;

use crate::error::RunError;

/// Environment variable holding the outputs file path.
pub const OUTPUT_ENV: &str = "OUTPUT";

/// Prefix of the environment variables carrying declared inputs.
pub const INPUT_ENV_PREFIX: &str = "INPUT_";

/// File name of the outputs file inside a run's capture directory.
pub const OUTPUT_FILE_NAME: &str = "outputs.env";

/// Output name -> value.
pub type CapturedOutputs = HashMap<String, String>;

/// Returns the environment variable name for an input.
pub fn input_env_name(input: &str) -> String {
    format!("{}{}", INPUT_ENV_PREFIX, input)
}

/// Parses the contents of an outputs file.
///
/// Later lines win over earlier lines with the same key.
pub fn parse_outputs(content: &str) -> Result<CapturedOutputs, RunError> {
    let mut outputs = CapturedOutputs::new();

    for (index, line) in content.split('\n').enumerate() {
        if line.is_empty() {
            continue;
        }
        let (key, value) = line.split_once('=').ok_or_else(|| RunError::MalformedOutput {
            line_number: index + 1,
            line: line.to_string(),
        })?;
        outputs.insert(key.to_string(), value.to_string());
    }

    Ok(outputs)
}

/// Reads and parses an outputs file; a missing file yields no outputs.
///
/// Scripts write raw bytes, so invalid UTF-8 is replaced rather than
/// rejected.
pub fn read_outputs(path: &Path) -> Result<CapturedOutputs, RunError> {
    match fs::read(path) {
        Ok(content) => parse_outputs(&String::from_utf8_lossy(&content)),
        Err(e) if e.kind() == ErrorKind::NotFound => Ok(CapturedOutputs::new()),
        Err(e) => Err(RunError::ReadOutput(e)),
    }
}
