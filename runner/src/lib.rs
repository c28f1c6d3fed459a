//! Orchestration of large batches of mowing solver runs.
//!
//! A run enumerates every (instance, configuration) pair of an experiment, drops the pairs whose
//! results are already recorded or still valid on disk, submits the rest to an executor and packs
//! the output directory once all submitted jobs are done. Running it again with unchanged inputs
//! dispatches nothing.

pub mod artifacts;
pub mod barrier;
pub mod catalog;
pub mod cli;
pub mod config;
pub mod database;
pub mod dispatch;
pub mod executors;
pub mod experiment;
pub mod filter;
pub mod finalize;
pub mod orchestrator;
pub mod polygon;
pub mod task;

#[cfg(test)]
mod test_util;

#[cfg(test)]
mod config_test;
#[cfg(test)]
mod experiment_test;
#[cfg(test)]
mod filter_test;
#[cfg(test)]
mod finalize_test;
