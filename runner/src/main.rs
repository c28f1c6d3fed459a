use clap::Parser;
use mowbench_runner::{
    cli::Cli,
    config::{preflight_checks, write_snapshot, RunnerConfig},
    executors::Executors,
    orchestrator::{self, RunOptions, RunnerError},
};
use std::process::ExitCode;
use tracing::{error, info};
use tracing_subscriber::EnvFilter;

fn run(cli: Cli) -> Result<(), RunnerError> {
    let config = match &cli.config {
        Some(path) => RunnerConfig::load(path)?,
        None => RunnerConfig::default(),
    };

    let experiment = cli.command.experiment();
    let options = RunOptions::from(cli.command.common());

    if !options.finalize_only {
        preflight_checks(&options.executable)?;
    }

    std::fs::create_dir_all(&options.out_dir).map_err(|source| RunnerError::OutputDirectory {
        path: options.out_dir.clone(),
        source,
    })?;
    write_snapshot(&options.out_dir, experiment.name(), &cli.command, &config)?;

    let executor = Executors::load(&config.executor)?;
    let summary = orchestrator::run(&experiment, &options, &executor)?;

    info!(
        instances = summary.instances,
        tasks = summary.tasks,
        dispatched = summary.dispatched,
        submission_failures = summary.submission_failures,
        succeeded = summary.barrier.succeeded,
        failed = summary.barrier.failed,
        "Done with processing"
    );

    Ok(())
}

fn main() -> ExitCode {
    tracing_subscriber::fmt()
        .with_env_filter(
            EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info")),
        )
        .init();

    match run(Cli::parse()) {
        Ok(()) => ExitCode::SUCCESS,
        Err(error) => {
            error!("{error}");
            ExitCode::FAILURE
        }
    }
}
