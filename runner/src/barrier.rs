use crate::{
    artifacts::ArtifactError,
    database::TableError,
    executors::{JobHandle, JobState},
};
use std::{io, path::PathBuf};
use thiserror::Error;
use tracing::{info, instrument, warn};

#[derive(Error, Debug)]
pub enum FinalizationError {
    #[error("Failed to record results: {0}")]
    Table(#[from] TableError),
    #[error("Failed to read results: {0}")]
    Artifact(#[from] ArtifactError),
    #[error("Failed to write {path:?}: {source}")]
    Io {
        path: PathBuf,
        #[source]
        source: io::Error,
    },
    #[error("Failed to write archive: {0}")]
    Archive(#[from] zip::result::ZipError),
}

#[derive(Debug, Default, Clone, PartialEq, Eq)]
pub struct BarrierReport {
    pub succeeded: usize,
    pub failed: usize,
}

/// Wait until every job is terminal, then run `finalize` exactly once.
///
/// Failed jobs gate the same way as successful ones. With no jobs `finalize` runs right away.
#[instrument(skip_all, fields(jobs = jobs.len()))]
pub fn finalize_after<J, F>(jobs: &[J], finalize: F) -> Result<BarrierReport, FinalizationError>
where
    J: JobHandle,
    F: FnOnce() -> Result<(), FinalizationError>,
{
    let mut report = BarrierReport::default();

    for (index, job) in jobs.iter().enumerate() {
        match job.wait() {
            JobState::Failed(reason) => {
                warn!(job = job.id(), "Job failed: {reason}");
                report.failed += 1;
            }
            _ => report.succeeded += 1,
        }

        info!("Done with {}/{}", index + 1, jobs.len());
    }

    info!(
        succeeded = report.succeeded,
        failed = report.failed,
        "All jobs terminal, finalizing"
    );

    finalize()?;

    Ok(report)
}
