use super::{Executor, JobHandle, JobState, Submission, SubmissionError};
use crate::config::LocalConfig;
use parking_lot::{Condvar, Mutex};
use rayon::{ThreadPool, ThreadPoolBuildError, ThreadPoolBuilder};
use std::{
    fs::File,
    process::{Command, Stdio},
    sync::{
        atomic::{AtomicU64, Ordering},
        Arc,
    },
    time::{Duration, Instant},
};
use tracing::{debug, info, warn};
use wait_timeout::ChildExt;

/// Executor that works on a local thread pool
#[derive(Debug)]
pub struct LocalExecutor {
    pool: ThreadPool,
    timeout: Option<Duration>,
    submitted: AtomicU64,
}

/// state shared between a running unit and its handles
#[derive(Debug)]
struct JobSlot {
    state: Mutex<JobState>,
    changed: Condvar,
}

impl JobSlot {
    fn set(&self, state: JobState) {
        *self.state.lock() = state;
        self.changed.notify_all();
    }
}

#[derive(Debug, Clone)]
pub struct LocalJob {
    id: String,
    slot: Arc<JobSlot>,
}

impl LocalExecutor {
    pub fn load(config: &LocalConfig) -> Result<Self, ThreadPoolBuildError> {
        let mut builder = ThreadPoolBuilder::new().thread_name(|index| format!("mowbench-{index}"));

        if let Some(threads) = config.threads {
            debug!("Starting thread pool with {threads} threads");
            builder = builder.num_threads(threads);
        }

        Ok(Self {
            pool: builder.build()?,
            timeout: config.timeout.map(Duration::from_secs),
            submitted: AtomicU64::new(0),
        })
    }
}

/// run a submission to completion, killing it after `timeout`
fn run(submission: &Submission, capture: File, timeout: Option<Duration>) -> JobState {
    let stderr = match capture.try_clone() {
        Ok(stderr) => stderr,
        Err(error) => return JobState::Failed(format!("failed to share output capture: {error}")),
    };
    let start = Instant::now();

    let mut child = match Command::new(&submission.exec)
        .args(&submission.args)
        .stdin(Stdio::null())
        .stdout(capture)
        .stderr(stderr)
        .spawn()
    {
        Ok(child) => child,
        Err(error) => {
            warn!(exec = ?submission.exec, "Failed with {error}");
            return JobState::Failed(format!("failed to spawn: {error}"));
        }
    };

    let status = match timeout {
        Some(timeout) => match child.wait_timeout(timeout) {
            Ok(Some(status)) => Ok(status),
            Ok(None) => {
                // child hasn't exited yet
                if let Err(error) = child.kill() {
                    warn!("Failed to kill timed out child: {error}");
                }
                let _ = child.wait();

                return JobState::Failed(format!("timed out after {} s", timeout.as_secs()));
            }
            Err(error) => Err(error),
        },
        None => child.wait(),
    };

    match status {
        Ok(status) => {
            debug!(
                "Finished in {} ms | status: {}",
                start.elapsed().as_millis(),
                status.success()
            );

            if status.success() {
                JobState::Succeeded
            } else {
                JobState::Failed(status.to_string())
            }
        }
        Err(error) => JobState::Failed(format!("failed to wait for child: {error}")),
    }
}

impl Executor for LocalExecutor {
    type Job = LocalJob;

    fn submit(&self, submission: Submission) -> Result<Self::Job, SubmissionError> {
        let capture =
            File::create(&submission.capture).map_err(|source| SubmissionError::Capture {
                path: submission.capture.clone(),
                source,
            })?;

        let id = format!(
            "local-{}",
            self.submitted.fetch_add(1, Ordering::SeqCst) + 1
        );
        let slot = Arc::new(JobSlot {
            state: Mutex::new(JobState::Pending),
            changed: Condvar::new(),
        });

        let timeout = self.timeout;
        let shared = Arc::clone(&slot);
        let job_id = id.clone();
        self.pool.spawn(move || {
            shared.set(JobState::Running);
            let state = run(&submission, capture, timeout);
            info!(job = %job_id, name = %submission.name, state = ?state, "Local job finished");
            shared.set(state);
        });

        Ok(LocalJob { id, slot })
    }
}

impl JobHandle for LocalJob {
    fn id(&self) -> &str {
        &self.id
    }

    fn state(&self) -> JobState {
        self.slot.state.lock().clone()
    }

    fn wait(&self) -> JobState {
        let mut state = self.slot.state.lock();

        while !state.is_terminal() {
            self.slot.changed.wait(&mut state);
        }

        state.clone()
    }
}
