//! Step Resolution
//!
//! Binds every workflow step name to exactly one step definition. All names
//! are resolved up front so that typos and ambiguous catalogs are reported
//! before any script runs. Resolution stops at the first name, in workflow
//! order, that does not resolve.

use log::{debug, info};

use super::model::{NameMatcher, StepDefinition, Workflow};
use crate::error::PrepareError;

/// A workflow step name together with the definition that implements it.
#[derive(Debug, Clone)]
pub struct Binding {
    pub name: String,
    pub step: StepDefinition,
}

/// Returns the indices of all candidates that claim `name`.
pub fn find_matches<M: NameMatcher>(name: &str, candidates: &[M]) -> Vec<usize> {
    candidates
        .iter()
        .enumerate()
        .filter(|(_, candidate)| candidate.is_match(name))
        .map(|(index, _)| index)
        .collect()
}

/// Resolves `name` to the single candidate that claims it.
pub fn match_one<M: NameMatcher>(name: &str, candidates: &[M]) -> Result<usize, PrepareError> {
    let matches = find_matches(name, candidates);
    match matches.as_slice() {
        [] => Err(PrepareError::UnmatchedStep(name.to_string())),
        [index] => Ok(*index),
        _ => Err(PrepareError::AmbiguousStep {
            name: name.to_string(),
            count: matches.len(),
        }),
    }
}

/// Produces one binding per workflow step, in workflow order.
pub fn resolve(
    workflow: &Workflow,
    catalog: &[StepDefinition],
) -> Result<Vec<Binding>, PrepareError> {
    let mut bindings = Vec::with_capacity(workflow.len());

    for name in &workflow.steps {
        let index = match_one(name, catalog)?;
        debug!(
            "Step '{}' matched pattern {:?}",
            name,
            catalog[index].pattern.as_str()
        );
        bindings.push(Binding {
            name: name.clone(),
            step: catalog[index].clone(),
        });
    }

    info!(
        "Resolved {} workflow steps against {} step definitions",
        bindings.len(),
        catalog.len()
    );
    Ok(bindings)
}

#[cfg(test)]
mod tests {
    use super::*;

    fn catalog() -> Vec<StepDefinition> {
        vec![
            StepDefinition::new("^intro$", "exit 0").unwrap(),
            StepDefinition::new("^collect-name$", "echo NAME=Alice >> \"$OUTPUT\"")
                .unwrap()
                .with_output("NAME"),
            StepDefinition::new("^configure ", "true").unwrap(),
        ]
    }

    #[test]
    fn test_resolve_preserves_workflow_order() {
        let workflow = Workflow::from_steps(["collect-name", "intro", "configure dns"]);
        let bindings = resolve(&workflow, &catalog()).unwrap();

        assert_eq!(bindings.len(), 3);
        assert_eq!(bindings[0].name, "collect-name");
        assert_eq!(bindings[0].step.pattern.as_str(), "^collect-name$");
        assert_eq!(bindings[1].name, "intro");
        assert_eq!(bindings[2].step.pattern.as_str(), "^configure ");
    }

    #[test]
    fn test_same_definition_bound_to_several_names() {
        let workflow = Workflow::from_steps(["configure dns", "configure mail"]);
        let bindings = resolve(&workflow, &catalog()).unwrap();

        assert_eq!(bindings.len(), 2);
        assert_eq!(bindings[0].step.pattern.as_str(), bindings[1].step.pattern.as_str());
    }

    #[test]
    fn test_unmatched_step() {
        let workflow = Workflow::from_steps(["intro", "typo-step"]);
        let err = resolve(&workflow, &catalog()).unwrap_err();
        assert_eq!(err, PrepareError::UnmatchedStep("typo-step".to_string()));
    }

    #[test]
    fn test_first_unresolved_name_is_reported() {
        let mut steps = catalog();
        steps.push(StepDefinition::new("intro", "true").unwrap());

        // "missing" comes first, the ambiguous "intro" is never reached
        let workflow = Workflow::from_steps(["missing", "intro"]);
        let err = resolve(&workflow, &steps).unwrap_err();
        assert_eq!(err, PrepareError::UnmatchedStep("missing".to_string()));
    }

    #[test]
    fn test_ambiguous_step_reports_count() {
        let mut steps = catalog();
        steps.push(StepDefinition::new("intro", "true").unwrap());
        steps.push(StepDefinition::new("^in", "true").unwrap());

        let workflow = Workflow::from_steps(["intro"]);
        let err = resolve(&workflow, &steps).unwrap_err();
        assert_eq!(
            err,
            PrepareError::AmbiguousStep {
                name: "intro".to_string(),
                count: 3,
            }
        );
    }

    #[test]
    fn test_empty_workflow_resolves_to_nothing() {
        let bindings = resolve(&Workflow::new(), &catalog()).unwrap();
        assert!(bindings.is_empty());
    }

    struct Exact(&'static str);

    impl NameMatcher for Exact {
        fn is_match(&self, name: &str) -> bool {
            self.0 == name
        }
    }

    #[test]
    fn test_custom_matcher() {
        let candidates = [Exact("a"), Exact("b"), Exact("b")];
        assert_eq!(match_one("a", &candidates), Ok(0));
        assert_eq!(find_matches("b", &candidates), vec![1, 2]);
        assert!(matches!(
            match_one("b", &candidates),
            Err(PrepareError::AmbiguousStep { count: 2, .. })
        ));
        assert!(matches!(match_one("c", &candidates), Err(PrepareError::UnmatchedStep(_))));
    }
}
