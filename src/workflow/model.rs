//! Workflow Data Model
//!
//! A workflow is an ordered list of abstract step names. Step definitions
//! are the concrete implementations: each one claims workflow step names via
//! a pattern and carries the shell script that performs the step.
//!
//! # Example Step File
//!
//! ```yaml
//! steps:
//!   - match: ^collect-name$
//!     description: Ask for the operator's name
//!     outputs:
//!       - name: NAME
//!     run: |
//!       echo "NAME=Alice" >> "$OUTPUT"
//!
//!   - match: ^greet
//!     inputs:
//!       - name: NAME
//!     run: echo "Hello $INPUT_NAME"
//! ```

use std::fmt;

use regex::Regex;
use serde::de::{self, Deserializer};
use serde::{Deserialize, Serialize, Serializer};

/// Anything that can decide whether it is responsible for a workflow step name.
pub trait NameMatcher {
    /// Returns true if this matcher claims `name`.
    fn is_match(&self, name: &str) -> bool;
}

impl NameMatcher for Regex {
    fn is_match(&self, name: &str) -> bool {
        Regex::is_match(self, name)
    }
}

/// Regular expression matched against workflow step names.
///
/// Matching is unanchored: `greet` claims `greet-operator`. Use `^...$` for
/// exact names.
#[derive(Clone)]
pub struct StepPattern(Regex);

impl StepPattern {
    pub fn new(pattern: &str) -> Result<Self, regex::Error> {
        Regex::new(pattern).map(Self)
    }

    pub fn as_str(&self) -> &str {
        self.0.as_str()
    }
}

impl NameMatcher for StepPattern {
    fn is_match(&self, name: &str) -> bool {
        self.0.is_match(name)
    }
}

impl fmt::Debug for StepPattern {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_tuple("StepPattern").field(&self.as_str()).finish()
    }
}

impl Serialize for StepPattern {
    fn serialize<S: Serializer>(&self, serializer: S) -> Result<S::Ok, S::Error> {
        serializer.serialize_str(self.as_str())
    }
}

impl<'de> Deserialize<'de> for StepPattern {
    fn deserialize<D: Deserializer<'de>>(deserializer: D) -> Result<Self, D::Error> {
        let raw = String::deserialize(deserializer)?;
        StepPattern::new(&raw)
            .map_err(|e| de::Error::custom(format!("invalid match pattern {:?}: {}", raw, e)))
    }
}

/// A named value a step consumes or produces.
#[derive(Serialize, Deserialize, Debug, Clone, PartialEq, Eq)]
pub struct Parameter {
    pub name: String,

    #[serde(default, skip_serializing_if = "String::is_empty")]
    pub description: String,
}

impl Parameter {
    pub fn new(name: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            description: String::new(),
        }
    }
}

/// Concrete implementation of one or more workflow steps.
#[derive(Serialize, Deserialize, Debug, Clone)]
pub struct StepDefinition {
    /// Pattern selecting the workflow step names this definition handles
    #[serde(rename = "match")]
    pub pattern: StepPattern,

    #[serde(default)]
    pub description: String,

    /// Values read from earlier steps' captured outputs
    #[serde(default)]
    pub inputs: Vec<Parameter>,

    /// Values this step is expected to write to its outputs file
    #[serde(default)]
    pub outputs: Vec<Parameter>,

    /// Shell script body; empty means nothing to do
    #[serde(default)]
    pub run: String,
}

impl StepDefinition {
    /// Creates a definition with the given pattern and script.
    ///
    /// # Example
    ///
    /// ```
    /// use guided_setup::workflow::StepDefinition;
    ///
    /// let step = StepDefinition::new("^collect-name$", "echo NAME=Alice >> \"$OUTPUT\"")
    ///     .unwrap()
    ///     .with_output("NAME");
    /// assert_eq!(step.outputs[0].name, "NAME");
    /// ```
    pub fn new(pattern: &str, run: impl Into<String>) -> Result<Self, regex::Error> {
        Ok(Self {
            pattern: StepPattern::new(pattern)?,
            description: String::new(),
            inputs: Vec::new(),
            outputs: Vec::new(),
            run: run.into(),
        })
    }

    pub fn with_description(mut self, description: impl Into<String>) -> Self {
        self.description = description.into();
        self
    }

    pub fn with_input(mut self, name: impl Into<String>) -> Self {
        self.inputs.push(Parameter::new(name));
        self
    }

    pub fn with_output(mut self, name: impl Into<String>) -> Self {
        self.outputs.push(Parameter::new(name));
        self
    }
}

impl NameMatcher for StepDefinition {
    fn is_match(&self, name: &str) -> bool {
        self.pattern.is_match(name)
    }
}

/// On-disk container of step definitions.
#[derive(Serialize, Deserialize, Debug, Clone, Default)]
pub struct StepsFile {
    #[serde(default)]
    pub steps: Vec<StepDefinition>,
}

/// Ordered list of step names; the order is the execution order.
#[derive(Serialize, Deserialize, Debug, Clone, Default, PartialEq, Eq)]
pub struct Workflow {
    pub steps: Vec<String>,
}

impl Workflow {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn from_steps<I, S>(steps: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        Self {
            steps: steps.into_iter().map(Into::into).collect(),
        }
    }

    pub fn len(&self) -> usize {
        self.steps.len()
    }

    pub fn is_empty(&self) -> bool {
        self.steps.is_empty()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_pattern_is_unanchored() {
        let pattern = StepPattern::new("greet").unwrap();
        assert!(pattern.is_match("greet-operator"));
        assert!(pattern.is_match("please greet"));
        assert!(!pattern.is_match("farewell"));
    }

    #[test]
    fn test_anchored_pattern() {
        let pattern = StepPattern::new("^intro$").unwrap();
        assert!(pattern.is_match("intro"));
        assert!(!pattern.is_match("intro-2"));
    }

    #[test]
    fn test_step_definition_from_yaml() {
        let yaml = r#"
steps:
  - match: ^collect-name$
    description: Ask for a name
    inputs:
      - name: GREETING
    outputs:
      - name: NAME
        description: The operator's name
    run: echo NAME=Alice >> "$OUTPUT"
  - match: ^intro$
"#;
        let file: StepsFile = serde_yaml::from_str(yaml).unwrap();
        assert_eq!(file.steps.len(), 2);

        let step = &file.steps[0];
        assert_eq!(step.pattern.as_str(), "^collect-name$");
        assert_eq!(step.inputs, vec![Parameter::new("GREETING")]);
        assert_eq!(step.outputs[0].description, "The operator's name");
        assert!(step.run.contains("NAME=Alice"));

        let intro = &file.steps[1];
        assert!(intro.run.is_empty());
        assert!(intro.inputs.is_empty());
    }

    #[test]
    fn test_invalid_pattern_rejected() {
        let yaml = "steps:\n  - match: \"(unclosed\"\n";
        let result: Result<StepsFile, _> = serde_yaml::from_str(yaml);
        let err = result.unwrap_err().to_string();
        assert!(err.contains("invalid match pattern"), "{}", err);
    }

    #[test]
    fn test_step_definition_builder() {
        let step = StepDefinition::new("^a$", "exit 0")
            .unwrap()
            .with_description("first")
            .with_input("X")
            .with_output("Y");

        assert_eq!(step.description, "first");
        assert_eq!(step.inputs[0].name, "X");
        assert_eq!(step.outputs[0].name, "Y");
        assert!(step.is_match("a"));
    }

    #[test]
    fn test_workflow_from_steps() {
        let workflow = Workflow::from_steps(["intro", "collect-name"]);
        assert_eq!(workflow.len(), 2);
        assert!(!workflow.is_empty());
        assert!(Workflow::new().is_empty());
    }
}
