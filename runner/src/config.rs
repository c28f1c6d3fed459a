use once_cell::sync::Lazy;
use rayon::ThreadPoolBuildError;
use serde::{Deserialize, Serialize};
use std::{
    fs::File,
    io::{BufReader, Error},
    os::unix::fs::MetadataExt,
    path::{Path, PathBuf},
};
use thiserror::Error;
use tracing::{debug, info};

/// file name of the run snapshot inside an output directory
pub const SNAPSHOT_FILE: &str = "config.yaml";

/// name of the host the orchestrator runs on
pub static HOSTNAME: Lazy<String> = Lazy::new(|| match nix::unistd::gethostname() {
    Ok(hostname) => hostname.to_string_lossy().into_owned(),
    Err(error) => {
        debug!(error = ?error, "Failed to retrieve hostname");
        "unknown".to_owned()
    }
});

#[derive(Error, Debug)]
pub enum ConfigErrors {
    #[error("File {0:?} not found")]
    FileNotFound(PathBuf),
    #[error("Metadata not found")]
    MetadataNotFound(#[from] Error),
    #[error("{0:?} is not executable")]
    NotExecutable(PathBuf),
    #[error("Failed to read config {path:?}: {source}")]
    Read {
        path: PathBuf,
        #[source]
        source: Error,
    },
    #[error("Failed to write {path:?}: {source}")]
    Write {
        path: PathBuf,
        #[source]
        source: Error,
    },
    #[error("Config is invalid: {0}")]
    Parse(#[from] serde_yaml::Error),
    #[error("Executor failed to load: {0}")]
    FailedLoadExecutor(#[from] ThreadPoolBuildError),
}

// check if a file is executable
pub fn check_executable(path: &Path) -> Result<bool, ConfigErrors> {
    if !path.is_file() {
        Err(ConfigErrors::FileNotFound(path.to_path_buf()))
    } else {
        let metadata = File::open(path)?.metadata()?;

        Ok((metadata.mode() & 0o111) != 0)
    }
}

/// make sure the solver can actually be started before anything is dispatched
pub fn preflight_checks(executable: &Path) -> Result<(), ConfigErrors> {
    if check_executable(executable)? {
        Ok(())
    } else {
        Err(ConfigErrors::NotExecutable(executable.to_path_buf()))
    }
}

#[derive(Deserialize, Serialize, Clone, Debug, Default, PartialEq)]
#[serde(deny_unknown_fields)]
pub struct RunnerConfig {
    #[serde(default)]
    pub executor: ExecutorConfig,
}

/// Executor selection, see `Executors::load`
#[derive(Deserialize, Serialize, Clone, Debug, PartialEq)]
#[serde(tag = "name", rename_all = "lowercase")]
pub enum ExecutorConfig {
    Local(LocalConfig),
    Slurm(SlurmConfig),
}

impl Default for ExecutorConfig {
    fn default() -> Self {
        Self::Local(LocalConfig::default())
    }
}

#[derive(Deserialize, Serialize, Clone, Debug, Default, PartialEq)]
#[serde(deny_unknown_fields)]
pub struct LocalConfig {
    // number of concurrently running solvers, defaults to the number of cpus
    #[serde(default)]
    pub threads: Option<usize>,
    // seconds after which a solver is killed
    #[serde(default)]
    pub timeout: Option<u64>,
}

#[derive(Deserialize, Serialize, Clone, Debug, PartialEq)]
#[serde(deny_unknown_fields)]
pub struct SlurmConfig {
    #[serde(default)]
    pub partition: Option<String>,
    #[serde(default)]
    pub constraint: Option<String>,
    // comma separated list of nodes
    #[serde(default)]
    pub exclude: Option<String>,
    #[serde(default)]
    pub exclusive: bool,
    // passed as --time, e.g., "02:00:00"
    #[serde(default)]
    pub time_limit: Option<String>,
    #[serde(default)]
    pub mail_user: Option<String>,
    #[serde(default)]
    pub mail_type: Option<String>,
    // seconds between two state queries while waiting
    #[serde(default = "default_poll_interval")]
    pub poll_interval: u64,
}

impl Default for SlurmConfig {
    fn default() -> Self {
        Self {
            partition: None,
            constraint: None,
            exclude: None,
            exclusive: false,
            time_limit: None,
            mail_user: None,
            mail_type: None,
            poll_interval: default_poll_interval(),
        }
    }
}

fn default_poll_interval() -> u64 {
    30
}

impl RunnerConfig {
    pub fn load(path: &Path) -> Result<Self, ConfigErrors> {
        let file = File::open(path).map_err(|source| ConfigErrors::Read {
            path: path.to_path_buf(),
            source,
        })?;
        let config = serde_yaml::from_reader(BufReader::new(file))?;

        info!(path = ?path, "Loaded config");

        Ok(config)
    }
}

/// Record of how an output directory was produced
#[derive(Serialize, Debug)]
pub struct RunSnapshot<'a, A: Serialize> {
    pub experiment: &'a str,
    pub host: &'a str,
    pub arguments: &'a A,
    pub executor: &'a ExecutorConfig,
}

/// write the snapshot of the current run into `out_dir`, replacing the previous one
pub fn write_snapshot<A: Serialize>(
    out_dir: &Path,
    experiment: &str,
    arguments: &A,
    config: &RunnerConfig,
) -> Result<PathBuf, ConfigErrors> {
    let path = out_dir.join(SNAPSHOT_FILE);
    let snapshot = RunSnapshot {
        experiment,
        host: HOSTNAME.as_str(),
        arguments,
        executor: &config.executor,
    };

    let file = File::create(&path).map_err(|source| ConfigErrors::Write {
        path: path.clone(),
        source,
    })?;
    serde_yaml::to_writer(file, &snapshot)?;

    debug!(path = ?path, "Wrote run snapshot");

    Ok(path)
}
