use crate::config::{
    check_executable, write_snapshot, ConfigErrors, ExecutorConfig, LocalConfig, RunnerConfig,
    SlurmConfig, SNAPSHOT_FILE,
};
use std::{fs, os::unix::fs::PermissionsExt};
use tempfile::tempdir;

#[test]
fn defaults_to_local_executor() {
    let config: RunnerConfig = serde_yaml::from_str("{}").unwrap();

    assert_eq!(config.executor, ExecutorConfig::Local(LocalConfig::default()));
}

#[test]
fn parses_slurm_executor() {
    let config: RunnerConfig = serde_yaml::from_str(
        "
executor:
  name: slurm
  partition: alg
  constraint: alggen03
  exclude: algry01,algry04
  exclusive: true
",
    )
    .unwrap();

    assert_eq!(
        config.executor,
        ExecutorConfig::Slurm(SlurmConfig {
            partition: Some("alg".to_owned()),
            constraint: Some("alggen03".to_owned()),
            exclude: Some("algry01,algry04".to_owned()),
            exclusive: true,
            ..SlurmConfig::default()
        })
    );
}

#[test]
fn rejects_unknown_executor() {
    assert!(serde_yaml::from_str::<RunnerConfig>("executor:\n  name: mpi\n").is_err());
}

#[test]
fn detects_executable_bit() {
    let dir = tempdir().unwrap();
    let path = dir.path().join("solver");
    fs::write(&path, "#!/bin/sh\n").unwrap();

    fs::set_permissions(&path, fs::Permissions::from_mode(0o644)).unwrap();
    assert!(!check_executable(&path).unwrap());

    fs::set_permissions(&path, fs::Permissions::from_mode(0o755)).unwrap();
    assert!(check_executable(&path).unwrap());

    assert!(check_executable(&dir.path().join("missing")).is_err());
}

#[test]
fn snapshot_lands_in_output_directory() {
    let dir = tempdir().unwrap();

    let path = write_snapshot(
        dir.path(),
        "approx",
        &serde_json::json!({ "time": 10.0 }),
        &RunnerConfig::default(),
    )
    .unwrap();

    assert_eq!(path, dir.path().join(SNAPSHOT_FILE));
    let content = fs::read_to_string(path).unwrap();
    assert!(content.contains("experiment: approx"));
    assert!(content.contains("time: 10.0"));
}

#[test]
fn snapshot_into_missing_directory_is_a_write_error() {
    let dir = tempdir().unwrap();
    let missing = dir.path().join("missing");

    let result = write_snapshot(&missing, "approx", &(), &RunnerConfig::default());

    match result {
        Err(ConfigErrors::Write { path, .. }) => assert_eq!(path, missing.join(SNAPSHOT_FILE)),
        other => panic!("unexpected result {other:?}"),
    }
}
