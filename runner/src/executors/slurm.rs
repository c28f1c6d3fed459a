/*
 * Slurm executor:
 * 1. every submission becomes one `sbatch --wrap` job, output captured by slurm itself
 * 2. job handles ask `sacct` for the state and fall back to `squeue` while accounting lags
 * 3. waiting is a polling loop with the configured interval
 */

use super::{Executor, JobHandle, JobState, Submission, SubmissionError};
use crate::config::SlurmConfig;
use itertools::Itertools;
use std::{process::Command, thread, time::Duration};
use tracing::{debug, info, warn};

/// every poll spawns `sacct` and possibly `squeue`
const MIN_POLL_INTERVAL: u64 = 1;

#[derive(Debug)]
pub struct SlurmExecutor {
    config: SlurmConfig,
}

#[derive(Debug, Clone)]
pub struct SlurmJob {
    id: String,
    poll_interval: Duration,
}

/// quote a single word for `sh`
pub fn shell_quote(word: &str) -> String {
    let plain = !word.is_empty()
        && word
            .chars()
            .all(|c| c.is_ascii_alphanumeric() || "-_./=:,+@%".contains(c));

    if plain {
        word.to_owned()
    } else {
        format!("'{}'", word.replace('\'', "'\\''"))
    }
}

/// map the state column of `sacct`/ `squeue` onto a job state
/// e.g., "CANCELLED by 1000" or "COMPLETED"
pub fn parse_state(output: &str) -> Option<JobState> {
    let state = output.lines().next()?.split_whitespace().next()?;
    let state = state.trim_end_matches('+');

    Some(match state {
        "COMPLETED" => JobState::Succeeded,
        "PENDING" | "REQUEUED" | "REQUEUE_HOLD" | "REQUEUE_FED" | "RESV_DEL_HOLD" => {
            JobState::Pending
        }
        "RUNNING" | "COMPLETING" | "CONFIGURING" | "SUSPENDED" | "STOPPED" | "RESIZING"
        | "SIGNALING" | "STAGE_OUT" => JobState::Running,
        failed => JobState::Failed(failed.to_lowercase()),
    })
}

impl SlurmExecutor {
    pub fn load(config: &SlurmConfig) -> Self {
        let mut config = config.clone();

        if config.poll_interval < MIN_POLL_INTERVAL {
            warn!(
                configured = config.poll_interval,
                "Poll interval too short, using {MIN_POLL_INTERVAL} s"
            );
            config.poll_interval = MIN_POLL_INTERVAL;
        }

        Self { config }
    }

    /// time between two state queries of a submitted job
    pub fn poll_interval(&self) -> Duration {
        Duration::from_secs(self.config.poll_interval)
    }

    /// arguments passed to `sbatch` for one submission
    pub fn sbatch_args(&self, submission: &Submission) -> Vec<String> {
        let mut args = vec![
            "--parsable".to_owned(),
            format!("--job-name={}", submission.name),
            format!("--output={}", submission.capture.to_string_lossy()),
        ];

        let optional = [
            ("partition", &self.config.partition),
            ("constraint", &self.config.constraint),
            ("exclude", &self.config.exclude),
            ("time", &self.config.time_limit),
            ("mail-user", &self.config.mail_user),
            ("mail-type", &self.config.mail_type),
        ];
        args.extend(
            optional
                .into_iter()
                .filter_map(|(flag, value)| value.as_ref().map(|value| format!("--{flag}={value}"))),
        );

        if self.config.exclusive {
            args.push("--exclusive".to_owned());
        }

        let command = std::iter::once(submission.exec.to_string_lossy().into_owned())
            .chain(submission.args.iter().cloned())
            .map(|word| shell_quote(&word))
            .join(" ");
        args.push(format!("--wrap={command}"));

        args
    }
}

impl Executor for SlurmExecutor {
    type Job = SlurmJob;

    fn submit(&self, submission: Submission) -> Result<Self::Job, SubmissionError> {
        let output = Command::new("sbatch")
            .args(self.sbatch_args(&submission))
            .output()?;

        if !output.status.success() {
            return Err(SubmissionError::Rejected {
                status: output.status.to_string(),
                stderr: String::from_utf8_lossy(&output.stderr).trim().to_owned(),
            });
        }

        // --parsable prints "<id>" or "<id>;<cluster>"
        let stdout = String::from_utf8_lossy(&output.stdout);
        let id = stdout.trim().split(';').next().unwrap_or_default();

        if id.is_empty() || !id.chars().all(|c| c.is_ascii_digit()) {
            return Err(SubmissionError::InvalidResponse(stdout.trim().to_owned()));
        }

        info!(job = id, name = %submission.name, "Submitted slurm job");

        Ok(SlurmJob {
            id: id.to_owned(),
            poll_interval: self.poll_interval(),
        })
    }
}

impl SlurmJob {
    fn query(&self, program: &str, args: &[&str]) -> Option<String> {
        match Command::new(program).args(args).output() {
            Ok(output) if output.status.success() => {
                Some(String::from_utf8_lossy(&output.stdout).into_owned())
            }
            // squeue rejects ids of jobs that were already purged from the queue
            Ok(output) if String::from_utf8_lossy(&output.stderr).contains("Invalid job id") => {
                Some(String::new())
            }
            Ok(output) => {
                warn!(
                    job = %self.id,
                    program = program,
                    stderr = %String::from_utf8_lossy(&output.stderr).trim(),
                    "State query failed"
                );
                None
            }
            Err(error) => {
                warn!(job = %self.id, program = program, "Failed to run state query: {error}");
                None
            }
        }
    }
}

impl JobHandle for SlurmJob {
    fn id(&self) -> &str {
        &self.id
    }

    fn state(&self) -> JobState {
        let accounted = self
            .query("sacct", &["-j", &self.id, "-X", "-n", "-P", "-o", "State"])
            .and_then(|output| parse_state(&output));
        if let Some(state) = accounted {
            return state;
        }

        match self.query("squeue", &["-h", "-j", &self.id, "-o", "%T"]) {
            Some(output) => parse_state(&output).unwrap_or_else(|| {
                // neither accounting nor the queue know the job anymore
                JobState::Failed("vanished from the queue".to_owned())
            }),
            // the queue could not be asked, try again on the next poll
            None => JobState::Pending,
        }
    }

    fn wait(&self) -> JobState {
        loop {
            let state = self.state();

            if state.is_terminal() {
                return state;
            }

            debug!(job = %self.id, state = ?state, "Waiting for slurm job");
            thread::sleep(self.poll_interval);
        }
    }
}
