use crate::{
    artifacts::{self, ArtifactError},
    database::PriorTable,
    task::Task,
};
use std::collections::HashSet;
use tracing::{debug, info, instrument, warn};

/// What happens to a single task
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Decision {
    /// the result table already holds a row for the task
    SkipRecorded,
    /// a valid result exists on disk
    SkipSatisfied,
    /// no (usable) result exists
    RunMissing,
    /// the result was superseded by its dependency and got removed
    RunStale,
}

impl Decision {
    pub fn runs(self) -> bool {
        matches!(self, Self::RunMissing | Self::RunStale)
    }
}

#[derive(Debug, Default)]
pub struct FilterReport {
    /// tasks to dispatch, in input order
    pub run: Vec<Task>,
    pub recorded: usize,
    pub satisfied: usize,
    pub missing: usize,
    pub stale: usize,
    pub duplicates: usize,
}

/// Decide the fate of one task, removing stale or corrupt artifacts on the way.
///
/// Only a dependency that disappeared, or files that can't be touched, are errors. Corrupt
/// results are reported and handled like absent ones.
pub fn decide(task: &Task, prior: &PriorTable) -> Result<Decision, ArtifactError> {
    if prior.contains(task) {
        return Ok(Decision::SkipRecorded);
    }

    if !artifacts::has_output(task) {
        artifacts::clear_raw_log(task)?;
        return Ok(Decision::RunMissing);
    }

    let output = match artifacts::progress_counter(&task.output) {
        Ok(output) => output,
        Err(ArtifactError::Corrupt { path, source }) => {
            warn!(path = ?path, "Result is corrupt, recomputing: {source}");
            artifacts::invalidate(task)?;
            return Ok(Decision::RunMissing);
        }
        Err(ArtifactError::NotFound { .. }) => {
            artifacts::clear_raw_log(task)?;
            return Ok(Decision::RunMissing);
        }
        Err(error) => return Err(error),
    };

    let Some(dependency) = &task.dependency else {
        return Ok(Decision::SkipSatisfied);
    };

    match artifacts::progress_counter(dependency) {
        Ok(upstream) if upstream > output => {
            artifacts::invalidate(task)?;
            warn!(
                path = ?task.output,
                iterations = output,
                dependency_iterations = upstream,
                "Removed stale result"
            );

            Ok(Decision::RunStale)
        }
        Ok(_) => Ok(Decision::SkipSatisfied),
        Err(ArtifactError::Corrupt { path, source }) => {
            warn!(path = ?path, "Dependency is corrupt, keeping existing result: {source}");
            Ok(Decision::SkipSatisfied)
        }
        Err(error) => Err(error),
    }
}

/// reduce `tasks` to the ones that have to run, each task key at most once
#[instrument(skip_all, fields(tasks = tasks.len(), prior = prior.len()))]
pub fn filter(tasks: Vec<Task>, prior: &PriorTable) -> Result<FilterReport, ArtifactError> {
    let mut report = FilterReport::default();
    let mut seen = HashSet::new();

    for task in tasks {
        if !seen.insert(task.key()) {
            debug!(task = %task.key(), "Dropped duplicate task");
            report.duplicates += 1;
            continue;
        }

        let decision = decide(&task, prior)?;
        debug!(task = %task.key(), decision = ?decision, "Decided");

        match decision {
            Decision::SkipRecorded => report.recorded += 1,
            Decision::SkipSatisfied => report.satisfied += 1,
            Decision::RunMissing => report.missing += 1,
            Decision::RunStale => report.stale += 1,
        }

        if decision.runs() {
            report.run.push(task);
        }
    }

    info!(
        run = report.run.len(),
        recorded = report.recorded,
        satisfied = report.satisfied,
        missing = report.missing,
        stale = report.stale,
        "Filtered tasks"
    );

    Ok(report)
}
