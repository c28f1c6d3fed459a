use crate::{
    artifacts::ArtifactError,
    database::{PriorTable, Row},
    experiment::Param,
    filter::{decide, filter, Decision},
    test_util::{instance, task, write_artifact},
};
use std::fs;
use tempfile::tempdir;

fn recorded(instance: &str, axis: &str) -> Row {
    Row::from([
        ("instance".to_owned(), Param::from(instance)),
        ("axis".to_owned(), Param::from(axis)),
    ])
}

#[test]
fn missing_output_runs_and_clears_raw_log() {
    let dir = tempdir().unwrap();
    let a = instance(dir.path(), "A");
    let task = task(dir.path(), &a, "x", None);
    fs::write(&task.raw_log, "partial output").unwrap();

    assert_eq!(
        decide(&task, &PriorTable::empty()).unwrap(),
        Decision::RunMissing
    );
    assert!(!task.raw_log.exists());
}

#[test]
fn stale_output_is_invalidated() {
    let dir = tempdir().unwrap();
    let a = instance(dir.path(), "A");
    let dependency = dir.path().join("A.lb.json");
    write_artifact(&dependency, 5);

    let task = task(dir.path(), &a, "x", Some(&dependency));
    write_artifact(&task.output, 3);
    fs::write(&task.raw_log, "log").unwrap();

    assert_eq!(
        decide(&task, &PriorTable::empty()).unwrap(),
        Decision::RunStale
    );
    assert!(!task.output.exists());
    assert!(!task.raw_log.exists());
    assert!(dependency.exists());
}

#[test]
fn current_output_is_kept() {
    let dir = tempdir().unwrap();
    let a = instance(dir.path(), "A");
    let dependency = dir.path().join("A.lb.json");
    write_artifact(&dependency, 3);

    let task = task(dir.path(), &a, "x", Some(&dependency));
    write_artifact(&task.output, 5);

    assert_eq!(
        decide(&task, &PriorTable::empty()).unwrap(),
        Decision::SkipSatisfied
    );
    assert!(task.output.exists());
}

#[test]
fn equal_progress_is_not_stale() {
    let dir = tempdir().unwrap();
    let a = instance(dir.path(), "A");
    let dependency = dir.path().join("A.lb.json");
    write_artifact(&dependency, 4);

    let task = task(dir.path(), &a, "x", Some(&dependency));
    write_artifact(&task.output, 4);

    assert_eq!(
        decide(&task, &PriorTable::empty()).unwrap(),
        Decision::SkipSatisfied
    );
}

#[test]
fn corrupt_output_is_treated_as_missing() {
    let dir = tempdir().unwrap();
    let a = instance(dir.path(), "A");
    let dependency = dir.path().join("A.lb.json");
    write_artifact(&dependency, 1);

    let task = task(dir.path(), &a, "x", Some(&dependency));
    fs::write(&task.output, "{ not json").unwrap();

    let report = filter(vec![task.clone()], &PriorTable::empty()).unwrap();

    assert_eq!(report.run, vec![task.clone()]);
    assert_eq!(report.missing, 1);
    assert!(!task.output.exists());
}

#[test]
fn output_without_iterations_is_corrupt() {
    let dir = tempdir().unwrap();
    let a = instance(dir.path(), "A");
    let task = task(dir.path(), &a, "x", None);
    fs::write(&task.output, r#"{"lower_bound": 2.0}"#).unwrap();

    assert_eq!(
        decide(&task, &PriorTable::empty()).unwrap(),
        Decision::RunMissing
    );
}

#[test]
fn vanished_dependency_is_fatal() {
    let dir = tempdir().unwrap();
    let a = instance(dir.path(), "A");
    let dependency = dir.path().join("A.lb.json");

    let task = task(dir.path(), &a, "x", Some(&dependency));
    write_artifact(&task.output, 2);

    assert!(matches!(
        decide(&task, &PriorTable::empty()),
        Err(ArtifactError::NotFound { .. })
    ));
}

#[test]
fn corrupt_dependency_keeps_output() {
    let dir = tempdir().unwrap();
    let a = instance(dir.path(), "A");
    let dependency = dir.path().join("A.lb.json");
    fs::write(&dependency, "[]").unwrap();

    let task = task(dir.path(), &a, "x", Some(&dependency));
    write_artifact(&task.output, 2);

    assert_eq!(
        decide(&task, &PriorTable::empty()).unwrap(),
        Decision::SkipSatisfied
    );
    assert!(task.output.exists());
}

#[test]
fn recorded_tasks_are_not_touched() {
    let dir = tempdir().unwrap();
    let a = instance(dir.path(), "A");
    let task = task(dir.path(), &a, "x", None);
    fs::write(&task.output, "corrupt but recorded").unwrap();

    let prior = PriorTable::from_rows(vec![recorded("A", "x")]).keyed_by(&["axis"]);

    assert_eq!(decide(&task, &prior).unwrap(), Decision::SkipRecorded);
    assert!(task.output.exists());
}

#[test]
fn prior_rows_only_match_on_every_key_field() {
    let dir = tempdir().unwrap();
    let a = instance(dir.path(), "A");
    let task = task(dir.path(), &a, "x", None);

    let other_value = PriorTable::from_rows(vec![recorded("A", "y")]).keyed_by(&["axis"]);
    assert_eq!(decide(&task, &other_value).unwrap(), Decision::RunMissing);

    let missing_field = PriorTable::from_rows(vec![Row::from([(
        "instance".to_owned(),
        Param::from("A"),
    )])])
    .keyed_by(&["axis"]);
    assert_eq!(decide(&task, &missing_field).unwrap(), Decision::RunMissing);
}

#[test]
fn selects_exactly_the_unsatisfied_tasks() {
    let dir = tempdir().unwrap();
    let a = instance(dir.path(), "A");
    let b = instance(dir.path(), "B");

    let tasks = vec![
        task(dir.path(), &a, "x", None),
        task(dir.path(), &a, "y", None),
        task(dir.path(), &b, "x", None),
        task(dir.path(), &b, "y", None),
    ];
    write_artifact(&tasks[0].output, 2);
    let prior = PriorTable::from_rows(vec![recorded("B", "y")]).keyed_by(&["axis"]);

    let report = filter(tasks.clone(), &prior).unwrap();

    assert_eq!(report.run, vec![tasks[1].clone(), tasks[2].clone()]);
    assert_eq!(report.satisfied, 1);
    assert_eq!(report.recorded, 1);
    assert_eq!(report.missing, 2);
}

#[test]
fn duplicate_tasks_run_once() {
    let dir = tempdir().unwrap();
    let a = instance(dir.path(), "A");
    let task = task(dir.path(), &a, "x", None);

    let report = filter(vec![task.clone(), task.clone()], &PriorTable::empty()).unwrap();

    assert_eq!(report.run.len(), 1);
    assert_eq!(report.duplicates, 1);
}

#[test]
fn second_pass_dispatches_nothing() {
    let dir = tempdir().unwrap();
    let a = instance(dir.path(), "A");
    let dependency = dir.path().join("A.lb.json");
    write_artifact(&dependency, 2);
    let tasks = vec![
        task(dir.path(), &a, "x", Some(&dependency)),
        task(dir.path(), &a, "y", None),
    ];

    let first = filter(tasks.clone(), &PriorTable::empty()).unwrap();
    assert_eq!(first.run.len(), 2);

    // the solver writes its results
    for task in first.run.iter() {
        write_artifact(&task.output, 2);
    }

    let second = filter(tasks, &PriorTable::empty()).unwrap();
    assert!(second.run.is_empty());
    assert_eq!(second.satisfied, 2);
}
