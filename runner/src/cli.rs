use crate::{
    experiment::{
        ApproxParams, Experiment, FollowupStrategy, InitialStrategy, LowerBoundParams, SolveParams,
    },
    orchestrator::RunOptions,
};
use clap::{Args, Parser, Subcommand};
use serde::Serialize;
use std::path::PathBuf;

/// Drive batches of mowing solver runs and collect their results
#[derive(Parser, Debug)]
#[command(name = "mowbench", author, version, about)]
pub struct Cli {
    /// YAML file selecting the executor
    #[arg(short, long, global = true)]
    pub config: Option<PathBuf>,

    #[command(subcommand)]
    pub command: Command,
}

#[derive(Subcommand, Debug)]
pub enum Command {
    /// Lower bounds for every pair of witness strategies, or for one chosen pair
    LowerBound(LowerBoundArgs),
    /// Solutions seeded from previously computed lower bounds
    Solve(SolveArgs),
    /// Approximate tours
    Approx(ApproxArgs),
}

#[derive(Args, Debug, Clone, Serialize)]
pub struct CommonArgs {
    /// directory containing the .poly instances
    #[arg(short, long)]
    pub dir: PathBuf,

    /// output directory, created if absent
    #[arg(short, long)]
    pub out_dir: PathBuf,

    /// solver executable
    #[arg(short, long)]
    pub executable: PathBuf,

    /// number of tasks submitted together
    #[arg(short, long, default_value_t = 5)]
    pub batch_size: usize,

    /// only record and pack existing results
    #[arg(long)]
    pub finalize_only: bool,
}

#[derive(Args, Debug, Clone, Serialize)]
pub struct LowerBoundArgs {
    #[command(flatten)]
    #[serde(flatten)]
    pub common: CommonArgs,

    /// time limit in seconds
    #[arg(short, long, default_value_t = 1800.0)]
    pub time: f64,

    #[arg(short, long, default_value_t = 1.0)]
    pub radius: f64,

    #[arg(short = 'w', long, default_value_t = 10)]
    pub max_witnesses: u32,

    #[arg(long, default_value_t = 15)]
    pub max_initial_witnesses: u32,

    #[arg(long, default_value_t = 5)]
    pub max_iterations: u32,

    /// run only this initial strategy, results are written as <instance>.json
    #[arg(long, value_enum, requires = "followup_strategy")]
    pub initial_strategy: Option<InitialStrategy>,

    #[arg(long, value_enum, requires = "initial_strategy")]
    pub followup_strategy: Option<FollowupStrategy>,
}

#[derive(Args, Debug, Clone, Serialize)]
pub struct SolveArgs {
    #[command(flatten)]
    #[serde(flatten)]
    pub common: CommonArgs,

    /// directory holding one lower bound result per instance
    #[arg(short, long)]
    pub lower_bound_dir: PathBuf,

    /// time limit in seconds
    #[arg(short, long, default_value_t = 1000.0)]
    pub time: f64,

    #[arg(short, long, default_value_t = 20)]
    pub max_witness_size: u32,
}

#[derive(Args, Debug, Clone, Serialize)]
pub struct ApproxArgs {
    #[command(flatten)]
    #[serde(flatten)]
    pub common: CommonArgs,

    /// time limit in seconds
    #[arg(short, long, default_value_t = 1000.0)]
    pub time: f64,

    #[arg(short, long, default_value_t = 1.0)]
    pub radius: f64,
}

impl Command {
    pub fn common(&self) -> &CommonArgs {
        match self {
            Self::LowerBound(args) => &args.common,
            Self::Solve(args) => &args.common,
            Self::Approx(args) => &args.common,
        }
    }

    pub fn experiment(&self) -> Experiment {
        match self {
            Self::LowerBound(args) => Experiment::LowerBound(LowerBoundParams {
                radius: args.radius,
                time: args.time,
                max_initial_witnesses: args.max_initial_witnesses,
                max_witnesses: args.max_witnesses,
                max_iterations: args.max_iterations,
                pair: args.initial_strategy.zip(args.followup_strategy),
            }),
            Self::Solve(args) => Experiment::Solve(SolveParams {
                lower_bound_dir: args.lower_bound_dir.clone(),
                time: args.time,
                max_witness_size: args.max_witness_size,
            }),
            Self::Approx(args) => Experiment::Approx(ApproxParams {
                time: args.time,
                radius: args.radius,
            }),
        }
    }
}

impl Serialize for Command {
    fn serialize<S: serde::Serializer>(&self, serializer: S) -> Result<S::Ok, S::Error> {
        match self {
            Self::LowerBound(args) => args.serialize(serializer),
            Self::Solve(args) => args.serialize(serializer),
            Self::Approx(args) => args.serialize(serializer),
        }
    }
}

impl From<&CommonArgs> for RunOptions {
    fn from(args: &CommonArgs) -> Self {
        Self {
            dir: args.dir.clone(),
            out_dir: args.out_dir.clone(),
            executable: args.executable.clone(),
            batch_size: args.batch_size,
            finalize_only: args.finalize_only,
        }
    }
}
