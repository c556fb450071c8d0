//! End-to-end runs of a small setup workflow through the public API.

use std::fs;

use guided_setup::execution::run_current_step;
use guided_setup::workflow::StateStore;
use guided_setup::{load_catalog, load_workflow, Executor, ExecutorError, StepDefinition, Workflow};
use tempfile::tempdir;
use tokio_util::sync::CancellationToken;

fn intro_catalog() -> Vec<StepDefinition> {
    vec![
        StepDefinition::new("^intro$", "exit 0").unwrap(),
        StepDefinition::new("^collect-name$", "echo NAME=Alice >> \"$OUTPUT\"")
            .unwrap()
            .with_output("NAME"),
    ]
}

#[tokio::test]
async fn test_intro_then_collect_name() {
    let capture_root = tempdir().unwrap();
    let workflow = Workflow::from_steps(["intro", "collect-name"]);
    let mut executor = Executor::new(workflow, intro_catalog());
    executor.set_capture_root(capture_root.path());
    executor.prepare().unwrap();

    run_current_step(&mut executor, CancellationToken::new())
        .await
        .unwrap();
    assert!(executor.captured_outputs().is_empty());

    let next = executor.next_step().unwrap();
    assert_eq!(next.name, "collect-name");
    run_current_step(&mut executor, CancellationToken::new())
        .await
        .unwrap();

    assert_eq!(executor.current_index(), 1);
    assert_eq!(executor.captured("NAME"), Some("Alice"));
    assert_eq!(executor.next_step().unwrap_err(), ExecutorError::EndOfWorkflow);
    assert_eq!(executor.current_index(), 1);

    // Capture directories are removed after each run
    assert_eq!(fs::read_dir(capture_root.path()).unwrap().count(), 0);
}

#[tokio::test]
async fn test_scenario_from_files_with_resume() {
    let dir = tempdir().unwrap();
    let workflow_path = dir.path().join("setup.workflow");
    fs::write(&workflow_path, "# onboarding\nintro\n\ncollect-name\ngreet\n").unwrap();

    let steps_dir = dir.path().join("steps");
    fs::create_dir(&steps_dir).unwrap();
    fs::write(
        steps_dir.join("basics.yaml"),
        r#"
steps:
  - match: ^intro$
    description: Welcome
  - match: ^collect-name$
    outputs:
      - name: NAME
        description: Who is being set up
    run: echo NAME=Alice >> "$OUTPUT"
"#,
    )
    .unwrap();
    fs::write(
        steps_dir.join("greet.yaml"),
        r#"
steps:
  - match: ^greet$
    inputs:
      - name: NAME
    run: echo "GREETING=hello $INPUT_NAME" >> "$OUTPUT"
"#,
    )
    .unwrap();

    let pattern = format!("{}/*.yaml", steps_dir.display());
    let load = || {
        let mut executor = Executor::new(
            load_workflow(&workflow_path).unwrap(),
            load_catalog(&[pattern.as_str()]).unwrap(),
        );
        executor.set_capture_root(dir.path());
        executor.prepare().unwrap();
        executor
    };
    let store = StateStore::new(dir.path().join("state.json"), workflow_path.display().to_string());

    // First session stops after collecting the name
    let mut executor = load();
    assert_eq!(executor.len(), 3);
    run_current_step(&mut executor, CancellationToken::new()).await.unwrap();
    executor.next_step().unwrap();
    run_current_step(&mut executor, CancellationToken::new()).await.unwrap();
    executor.next_step().unwrap();
    store.save(executor.state()).unwrap();

    // Second session picks up at the greeting with NAME still available
    let mut executor = load();
    executor.restore_state(store.load_or_create().unwrap()).unwrap();
    assert_eq!(executor.current_step().unwrap().name, "greet");
    run_current_step(&mut executor, CancellationToken::new()).await.unwrap();

    assert_eq!(executor.captured("GREETING"), Some("hello Alice"));
}
