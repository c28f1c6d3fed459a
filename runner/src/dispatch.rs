use crate::{
    executors::{Executor, JobHandle, JobState, SubmissionError},
    experiment::Invocation,
    task::{Task, TaskKey},
};
use tracing::{error, info, instrument};

/// a submitted job together with the task it runs
#[derive(Debug, Clone)]
pub struct Dispatched<J> {
    pub task: TaskKey,
    pub job: J,
}

#[derive(Debug)]
pub struct SubmissionFailure {
    pub task: TaskKey,
    pub error: SubmissionError,
}

/// Outcome of one dispatch round, in task order
#[derive(Debug)]
pub struct DispatchReport<J> {
    pub jobs: Vec<Dispatched<J>>,
    pub failures: Vec<SubmissionFailure>,
}

impl<J: JobHandle> JobHandle for Dispatched<J> {
    fn id(&self) -> &str {
        self.job.id()
    }

    fn state(&self) -> JobState {
        self.job.state()
    }

    fn wait(&self) -> JobState {
        self.job.wait()
    }
}

/// Submit every task in batches of at most `batch_size`.
///
/// Submission does not wait for the jobs to run. A task that fails to submit is reported and
/// left out, it will show up as missing on the next run.
#[instrument(skip_all, fields(tasks = tasks.len(), batch_size = batch_size))]
pub fn dispatch<E: Executor>(
    tasks: &[Task],
    batch_size: usize,
    executor: &E,
    invocation: &Invocation,
) -> DispatchReport<E::Job> {
    let batch_size = batch_size.max(1);
    let batches = tasks.len().div_ceil(batch_size);
    let mut report = DispatchReport {
        jobs: Vec::with_capacity(tasks.len()),
        failures: Vec::new(),
    };

    for (index, batch) in tasks.chunks(batch_size).enumerate() {
        info!("Submitting batch {}/{batches} ({} tasks)", index + 1, batch.len());

        for task in batch {
            match executor.submit(invocation.submission(task)) {
                Ok(job) => report.jobs.push(Dispatched {
                    task: task.key(),
                    job,
                }),
                Err(error) => {
                    error!(task = %task.key(), "Failed to submit: {error}");
                    report.failures.push(SubmissionFailure {
                        task: task.key(),
                        error,
                    });
                }
            }
        }
    }

    info!(
        submitted = report.jobs.len(),
        failed = report.failures.len(),
        "Dispatch done"
    );

    report
}
