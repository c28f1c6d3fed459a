use crate::{
    artifacts::ArtifactError,
    barrier::{finalize_after, BarrierReport, FinalizationError},
    catalog::{list_instances, CatalogError, INSTANCE_EXTENSION},
    config::ConfigErrors,
    database::{load_prior_results, PriorTable, TableError},
    dispatch::{dispatch, Dispatched},
    executors::Executor,
    experiment::{Experiment, Invocation},
    filter::filter,
    finalize::pack,
    task::enumerate_tasks,
};
use std::path::PathBuf;
use thiserror::Error;
use tracing::{info, instrument, warn};

#[derive(Error, Debug)]
pub enum RunnerError {
    #[error(transparent)]
    Config(#[from] ConfigErrors),
    #[error(transparent)]
    Catalog(#[from] CatalogError),
    #[error(transparent)]
    Artifact(#[from] ArtifactError),
    #[error("Failed to load prior results: {0}")]
    Table(#[from] TableError),
    #[error("Finalization failed, rerun with --finalize-only once fixed: {0}")]
    Finalization(#[from] FinalizationError),
    #[error("Failed to create output directory {path:?}: {source}")]
    OutputDirectory {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },
}

#[derive(Debug, Clone)]
pub struct RunOptions {
    pub dir: PathBuf,
    pub out_dir: PathBuf,
    pub executable: PathBuf,
    pub batch_size: usize,
    /// skip filtering and dispatching, only finalize
    pub finalize_only: bool,
}

#[derive(Debug, Default)]
pub struct RunSummary {
    pub instances: usize,
    pub tasks: usize,
    pub dispatched: usize,
    pub submission_failures: usize,
    pub barrier: BarrierReport,
}

/// One orchestration round: enumerate, filter, dispatch, wait and finalize.
///
/// The prior table is read once before filtering and never again during the run.
#[instrument(skip_all, fields(experiment = experiment.name()))]
pub fn run<E: Executor>(
    experiment: &Experiment,
    options: &RunOptions,
    executor: &E,
) -> Result<RunSummary, RunnerError> {
    std::fs::create_dir_all(&options.out_dir).map_err(|source| RunnerError::OutputDirectory {
        path: options.out_dir.clone(),
        source,
    })?;

    let instances = list_instances(&options.dir, INSTANCE_EXTENSION)?;
    let tasks = enumerate_tasks(&instances, experiment, &options.out_dir);

    info!(
        instances = instances.len(),
        tasks = tasks.len(),
        "Enumerated task space"
    );

    let mut summary = RunSummary {
        instances: instances.len(),
        tasks: tasks.len(),
        ..RunSummary::default()
    };

    let jobs: Vec<Dispatched<E::Job>> = if options.finalize_only {
        info!("Only finalizing, nothing is dispatched");
        Vec::new()
    } else {
        let prior = if experiment.uses_prior_table() {
            load_prior_results(&options.out_dir)?.keyed_by(experiment.key_fields())
        } else {
            PriorTable::empty()
        };

        let selected = filter(tasks.clone(), &prior)?;
        let report = dispatch(
            &selected.run,
            options.batch_size,
            executor,
            &Invocation::new(&options.executable, experiment),
        );

        if !report.failures.is_empty() {
            warn!(
                failed = report.failures.len(),
                "Some tasks were not submitted, they are retried on the next run"
            );
        }

        summary.dispatched = report.jobs.len();
        summary.submission_failures = report.failures.len();
        report.jobs
    };

    summary.barrier = finalize_after(&jobs, || {
        pack(&options.out_dir, experiment, &tasks).map(|_| ())
    })?;

    Ok(summary)
}
