use crate::{
    database::{sqlite::ResultTable, PriorTable, RESULTS_FILE},
    experiment::{ApproxParams, Experiment, Param, SolveParams},
    finalize::{pack, record_results, write_archive, PackSummary, ARCHIVE_FILE},
    task::enumerate_tasks,
    test_util::{instance, write_artifact},
};
use std::fs;
use tempfile::tempdir;

fn approx() -> Experiment {
    Experiment::Approx(ApproxParams {
        time: 60.0,
        radius: 1.0,
    })
}

#[test]
fn records_instance_configuration_and_metrics() {
    let dir = tempdir().unwrap();
    let experiment = approx();
    let tasks = enumerate_tasks(
        &[instance(dir.path(), "a"), instance(dir.path(), "b")],
        &experiment,
        dir.path(),
    );
    write_artifact(&tasks[0].output, 3);

    assert_eq!(record_results(dir.path(), &experiment, &tasks).unwrap(), 1);

    let rows = ResultTable::open(&dir.path().join(RESULTS_FILE))
        .unwrap()
        .rows()
        .unwrap();
    assert_eq!(rows.len(), 1);
    let row = &rows[0];
    assert_eq!(row["instance"], Param::from("a"));
    assert_eq!(row["timelimit"], Param::Float(60.0));
    assert_eq!(row["radius"], Param::Float(1.0));
    assert_eq!(row["iterations"], Param::Int(3));
    assert_eq!(row["vertices"], Param::Int(4));
    assert_eq!(row["lower_bound"], Param::Float(1.5));
    assert_eq!(row["status"], Param::from("optimal"));
}

#[test]
fn skips_corrupt_and_stale_results() {
    let dir = tempdir().unwrap();
    let bounds = tempdir().unwrap();
    write_artifact(&bounds.path().join("a.json"), 5);
    write_artifact(&bounds.path().join("b.json"), 1);
    write_artifact(&bounds.path().join("c.json"), 1);

    let experiment = Experiment::Solve(SolveParams {
        lower_bound_dir: bounds.path().to_path_buf(),
        time: 1000.0,
        max_witness_size: 20,
    });
    let tasks = enumerate_tasks(
        &["a", "b", "c"].map(|name| instance(dir.path(), name)),
        &experiment,
        dir.path(),
    );
    write_artifact(&tasks[0].output, 2);
    write_artifact(&tasks[1].output, 2);
    fs::write(&tasks[2].output, "garbage").unwrap();

    assert_eq!(record_results(dir.path(), &experiment, &tasks).unwrap(), 1);
}

#[test]
fn nothing_to_record_leaves_no_table() {
    let dir = tempdir().unwrap();
    let tasks = enumerate_tasks(&[instance(dir.path(), "a")], &approx(), dir.path());

    assert_eq!(record_results(dir.path(), &approx(), &tasks).unwrap(), 0);
    assert!(!dir.path().join(RESULTS_FILE).exists());
}

#[test]
fn archive_holds_results_and_raw_logs() {
    let dir = tempdir().unwrap();
    write_artifact(&dir.path().join("a.json"), 1);
    fs::write(dir.path().join("a_raw.out"), "log").unwrap();
    fs::write(dir.path().join("config.yaml"), "experiment: approx").unwrap();

    assert_eq!(write_archive(dir.path()).unwrap(), 2);

    let file = fs::File::open(dir.path().join(ARCHIVE_FILE)).unwrap();
    let mut archive = zip::ZipArchive::new(file).unwrap();
    let mut names = archive.file_names().map(String::from).collect::<Vec<_>>();
    names.sort();
    assert_eq!(names, vec!["a.json", "a_raw.out"]);
    assert_eq!(archive.by_name("a_raw.out").unwrap().size(), 3);
}

#[test]
fn packing_twice_changes_nothing() {
    let dir = tempdir().unwrap();
    let experiment = approx();
    let tasks = enumerate_tasks(
        &[instance(dir.path(), "a"), instance(dir.path(), "b")],
        &experiment,
        dir.path(),
    );
    for task in tasks.iter() {
        write_artifact(&task.output, 2);
    }

    let first = pack(dir.path(), &experiment, &tasks).unwrap();
    let second = pack(dir.path(), &experiment, &tasks).unwrap();

    assert_eq!(
        first,
        PackSummary {
            recorded: 2,
            archived: 2
        }
    );
    assert_eq!(first, second);

    let table = ResultTable::open(&dir.path().join(RESULTS_FILE)).unwrap();
    assert_eq!(table.rows().unwrap().len(), 2);
    assert_eq!(PriorTable::from_rows(table.rows().unwrap()).len(), 2);
}
