use crate::{
    artifacts::{self, ArtifactError, ResultRecord},
    barrier::FinalizationError,
    database::{sqlite::ResultTable, Row, INSTANCE_COLUMN, RESULTS_FILE},
    experiment::{Experiment, Param},
    polygon::read_polygon,
    task::Task,
};
use itertools::Itertools;
use serde_json::Value;
use std::{
    collections::HashMap,
    fs::{self, File},
    io,
    path::Path,
};
use tracing::{debug, info, instrument, warn};
use zip::{write::FileOptions, CompressionMethod, ZipWriter};

/// file name of the packed output directory
pub const ARCHIVE_FILE: &str = "results.zip";

#[derive(Debug, Default, Clone, PartialEq, Eq)]
pub struct PackSummary {
    pub recorded: usize,
    pub archived: usize,
}

fn io_error(path: &Path) -> impl FnOnce(io::Error) -> FinalizationError + '_ {
    move |source| FinalizationError::Io {
        path: path.to_path_buf(),
        source,
    }
}

/// convert a reported metric into a table value, nested values are stored as JSON text
fn metric_param(value: &Value) -> Option<Param> {
    match value {
        Value::Null => None,
        Value::Bool(flag) => Some(Param::Int(i64::from(*flag))),
        Value::Number(number) => number
            .as_i64()
            .map(Param::Int)
            .or_else(|| number.as_f64().map(Param::Float)),
        Value::String(text) => Some(Param::Text(text.clone())),
        Value::Array(_) | Value::Object(_) => Some(Param::Text(value.to_string())),
    }
}

/// table row for a finished task: instance, configuration, progress and metrics
pub fn result_row(task: &Task, record: &ResultRecord, vertices: Option<usize>) -> Row {
    let mut row = Row::new();

    row.insert(
        INSTANCE_COLUMN.to_owned(),
        Param::Text(task.instance.name.clone()),
    );
    for (name, value) in task.configuration.iter() {
        row.insert(name.to_owned(), value.clone());
    }
    row.insert(
        "iterations".to_owned(),
        Param::Int(record.progress() as i64),
    );
    if let Some(vertices) = vertices {
        row.insert("vertices".to_owned(), Param::Int(vertices as i64));
    }

    for (name, value) in record.metrics.iter() {
        if name == "id" || row.contains_key(name) {
            warn!(metric = %name, "Metric shadows an identifying column, not recording it");
            continue;
        }

        if let Some(value) = metric_param(value) {
            row.insert(name.clone(), value);
        }
    }

    row
}

/// record every valid result of `tasks` into the result table of `out_dir`
pub fn record_results(
    out_dir: &Path,
    experiment: &Experiment,
    tasks: &[Task],
) -> Result<usize, FinalizationError> {
    let mut vertices: HashMap<&str, Option<usize>> = HashMap::new();
    let mut rows = Vec::new();

    for task in tasks.iter().filter(|task| artifacts::has_output(task)) {
        let record = match ResultRecord::load(&task.output) {
            Ok(record) => record,
            Err(ArtifactError::Corrupt { path, source }) => {
                warn!(path = ?path, "Skipping corrupt result: {source}");
                continue;
            }
            Err(ArtifactError::NotFound { .. }) => continue,
            Err(error) => return Err(error.into()),
        };

        if let Some(dependency) = &task.dependency {
            if let Ok(upstream) = artifacts::progress_counter(dependency) {
                if upstream > record.progress() {
                    warn!(path = ?task.output, "Skipping stale result");
                    continue;
                }
            }
        }

        let count = *vertices
            .entry(task.instance.name.as_str())
            .or_insert_with(|| match read_polygon(&task.instance.path) {
                Ok(polygon) => Some(polygon.vertices.len()),
                Err(error) => {
                    warn!(path = ?task.instance.path, "Failed to read polygon: {error}");
                    None
                }
            });

        rows.push(result_row(task, &record, count));
    }

    if rows.is_empty() {
        debug!("No results to record");
        return Ok(0);
    }

    let mut table = ResultTable::open(&out_dir.join(RESULTS_FILE))?;

    Ok(table.replace(&rows, experiment.key_fields())?)
}

/// pack all results and raw logs of `out_dir` into a single archive
pub fn write_archive(out_dir: &Path) -> Result<usize, FinalizationError> {
    let entries = fs::read_dir(out_dir)
        .map_err(io_error(out_dir))?
        .filter_map(Result::ok)
        .map(|entry| entry.path())
        .filter(|path| path.is_file())
        .filter(|path| {
            path.file_name()
                .and_then(|name| name.to_str())
                .map_or(false, |name| name.ends_with(".json") || name.ends_with("_raw.out"))
        })
        .sorted()
        .collect_vec();

    let target = out_dir.join(ARCHIVE_FILE);
    // NOTE: written next to the target and renamed, a crash never leaves a truncated archive
    let temporary = out_dir.join(format!(".{ARCHIVE_FILE}.tmp"));

    let mut writer = ZipWriter::new(File::create(&temporary).map_err(io_error(&temporary))?);
    let options = FileOptions::default().compression_method(CompressionMethod::Deflated);

    for path in entries.iter() {
        let name = path
            .file_name()
            .map(|name| name.to_string_lossy().into_owned())
            .unwrap_or_default();

        writer.start_file(name, options)?;
        let mut input = File::open(path).map_err(io_error(path))?;
        io::copy(&mut input, &mut writer).map_err(io_error(path))?;
    }

    writer.finish()?;
    fs::rename(&temporary, &target).map_err(io_error(&target))?;

    debug!(path = ?target, entries = entries.len(), "Wrote archive");

    Ok(entries.len())
}

/// Finalize an output directory.
///
/// Safe to run any number of times: rows are replaced by key and the archive is rebuilt.
#[instrument(skip_all, fields(out_dir = ?out_dir, experiment = experiment.name()))]
pub fn pack(
    out_dir: &Path,
    experiment: &Experiment,
    tasks: &[Task],
) -> Result<PackSummary, FinalizationError> {
    let recorded = record_results(out_dir, experiment, tasks)?;
    let archived = write_archive(out_dir)?;

    info!(recorded = recorded, archived = archived, "Packed output directory");

    Ok(PackSummary { recorded, archived })
}
