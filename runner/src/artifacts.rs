use crate::task::Task;
use serde::Deserialize;
use serde_json::Value;
use std::{
    collections::BTreeMap,
    fs::{self, File},
    io::{self, BufReader},
    path::{Path, PathBuf},
};
use thiserror::Error;
use tracing::{debug, info};

#[derive(Error, Debug)]
pub enum ArtifactError {
    #[error("Artifact {path:?} not found")]
    NotFound { path: PathBuf },
    #[error("Artifact {path:?} is corrupt: {source}")]
    Corrupt {
        path: PathBuf,
        #[source]
        source: serde_json::Error,
    },
    #[error("Failed to access artifact {path:?}: {source}")]
    Io {
        path: PathBuf,
        #[source]
        source: io::Error,
    },
}

/// Structured result written by the solver for a finished task
#[derive(Debug, Clone, Deserialize)]
pub struct ResultRecord {
    /// one entry per solver iteration, its length is the progress counter
    pub iterations: Vec<Value>,
    /// everything else the solver reported
    #[serde(flatten)]
    pub metrics: BTreeMap<String, Value>,
}

impl ResultRecord {
    pub fn load(path: &Path) -> Result<Self, ArtifactError> {
        let file = File::open(path).map_err(|source| match source.kind() {
            io::ErrorKind::NotFound => ArtifactError::NotFound {
                path: path.to_path_buf(),
            },
            _ => ArtifactError::Io {
                path: path.to_path_buf(),
                source,
            },
        })?;

        serde_json::from_reader(BufReader::new(file)).map_err(|source| ArtifactError::Corrupt {
            path: path.to_path_buf(),
            source,
        })
    }

    pub fn progress(&self) -> usize {
        self.iterations.len()
    }
}

/// whether the structured result of `task` exists
pub fn has_output(task: &Task) -> bool {
    task.output.is_file()
}

/// number of iterations recorded in the artifact at `path`
pub fn progress_counter(path: &Path) -> Result<usize, ArtifactError> {
    ResultRecord::load(path).map(|record| record.progress())
}

/// remove a file, reporting whether something was removed
fn remove_if_present(path: &Path) -> Result<bool, ArtifactError> {
    match fs::remove_file(path) {
        Ok(()) => Ok(true),
        Err(error) if error.kind() == io::ErrorKind::NotFound => Ok(false),
        Err(source) => Err(ArtifactError::Io {
            path: path.to_path_buf(),
            source,
        }),
    }
}

/// delete the result and the raw log of `task` so it can be dispatched again
pub fn invalidate(task: &Task) -> Result<bool, ArtifactError> {
    let output = remove_if_present(&task.output)?;
    let raw_log = remove_if_present(&task.raw_log)?;

    if output || raw_log {
        debug!(output = ?task.output, raw_log = ?task.raw_log, "Invalidated task artifacts");
    }

    Ok(output || raw_log)
}

/// drop a raw log left behind by an earlier, unfinished attempt
pub fn clear_raw_log(task: &Task) -> Result<bool, ArtifactError> {
    let removed = remove_if_present(&task.raw_log)?;

    if removed {
        info!(path = ?task.raw_log, "Removed leftover raw output");
    }

    Ok(removed)
}
