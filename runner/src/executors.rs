pub mod local;
pub mod slurm;

use crate::config::{ConfigErrors, ExecutorConfig};
use std::{io, path::PathBuf};
use thiserror::Error;

#[derive(Error, Debug)]
pub enum SubmissionError {
    #[error("Failed to create output capture {path:?}: {source}")]
    Capture {
        path: PathBuf,
        #[source]
        source: io::Error,
    },
    #[error("Failed to spawn submission command: {0}")]
    Spawn(#[from] io::Error),
    #[error("Submission was rejected ({status}): {stderr}")]
    Rejected { status: String, stderr: String },
    #[error("Unexpected submission response '{0}'")]
    InvalidResponse(String),
}

/// A single unit of work as handed to an execution facility
#[derive(Debug, Clone, PartialEq)]
pub struct Submission {
    /// human readable name, used as job name where supported
    pub name: String,
    pub exec: PathBuf,
    pub args: Vec<String>,
    /// file receiving stdout and stderr
    pub capture: PathBuf,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum JobState {
    Pending,
    Running,
    Succeeded,
    Failed(String),
}

impl JobState {
    pub fn is_terminal(&self) -> bool {
        matches!(self, Self::Succeeded | Self::Failed(_))
    }
}

/// Handle to asynchronously running work
pub trait JobHandle {
    /// opaque identifier assigned by the execution facility
    fn id(&self) -> &str;

    /// current state, never blocks on the job
    fn state(&self) -> JobState;

    /// block until the job reached a terminal state
    fn wait(&self) -> JobState;
}

/// An execution facility accepting submissions
pub trait Executor {
    type Job: JobHandle;

    /// hand `submission` over without waiting for it to run
    fn submit(&self, submission: Submission) -> Result<Self::Job, SubmissionError>;
}

/// All supported executors
/// (kept as an enum to select them from the config file)
#[derive(Debug)]
pub enum Executors {
    Local(local::LocalExecutor),
    Slurm(slurm::SlurmExecutor),
}

#[derive(Debug, Clone)]
pub enum Job {
    Local(local::LocalJob),
    Slurm(slurm::SlurmJob),
}

impl Executors {
    pub fn load(config: &ExecutorConfig) -> Result<Self, ConfigErrors> {
        match config {
            ExecutorConfig::Local(config) => Ok(Self::Local(local::LocalExecutor::load(config)?)),
            ExecutorConfig::Slurm(config) => Ok(Self::Slurm(slurm::SlurmExecutor::load(config))),
        }
    }
}

impl Executor for Executors {
    type Job = Job;

    fn submit(&self, submission: Submission) -> Result<Self::Job, SubmissionError> {
        match self {
            Self::Local(executor) => executor.submit(submission).map(Job::Local),
            Self::Slurm(executor) => executor.submit(submission).map(Job::Slurm),
        }
    }
}

impl JobHandle for Job {
    fn id(&self) -> &str {
        match self {
            Self::Local(job) => job.id(),
            Self::Slurm(job) => job.id(),
        }
    }

    fn state(&self) -> JobState {
        match self {
            Self::Local(job) => job.state(),
            Self::Slurm(job) => job.state(),
        }
    }

    fn wait(&self) -> JobState {
        match self {
            Self::Local(job) => job.wait(),
            Self::Slurm(job) => job.wait(),
        }
    }
}
