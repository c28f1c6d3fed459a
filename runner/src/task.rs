use crate::{
    catalog::Instance,
    experiment::{Axis, Experiment, ParameterConfiguration},
};
use itertools::{iproduct, Itertools};
use std::{fmt, path::{Path, PathBuf}};
use tracing::{debug, warn};

/// One instance paired with one configuration, plus where its files live
#[derive(Debug, Clone, PartialEq)]
pub struct Task {
    pub instance: Instance,
    pub configuration: ParameterConfiguration,
    /// structured result written by the solver
    pub output: PathBuf,
    /// captured stdout/ stderr of the solver
    pub raw_log: PathBuf,
    /// upstream artifact this result is derived from
    pub dependency: Option<PathBuf>,
}

/// identity of a task, two tasks with equal keys are the same unit of work
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct TaskKey {
    pub instance: String,
    pub configuration: ParameterConfiguration,
}

impl Task {
    pub fn key(&self) -> TaskKey {
        TaskKey {
            instance: self.instance.name.clone(),
            configuration: self.configuration.clone(),
        }
    }
}

impl fmt::Display for TaskKey {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}[{}]", self.instance, self.configuration)
    }
}

/// expand `base` with every combination of the axis values
pub fn configurations(base: &ParameterConfiguration, axes: &[Axis]) -> Vec<ParameterConfiguration> {
    // NOTE: multi_cartesian_product yields nothing for zero axes, but the product of nothing is
    // the single base configuration
    if axes.is_empty() {
        return vec![base.clone()];
    }

    axes.iter()
        .map(|axis| axis.values.iter().map(move |value| (axis.name, value)))
        .multi_cartesian_product()
        .map(|combination| {
            combination
                .into_iter()
                .fold(base.clone(), |configuration, (name, value)| {
                    configuration.with(name, value.clone())
                })
        })
        .collect()
}

/// Build the cross product of instances and configurations.
///
/// `build` turns a pair into a task and may reject it by returning `None`. Instances are visited
/// sorted by name so the sequence is stable for the same inputs.
pub fn enumerate<F>(
    instances: &[Instance],
    base: &ParameterConfiguration,
    axes: &[Axis],
    mut build: F,
) -> Vec<Task>
where
    F: FnMut(&Instance, ParameterConfiguration) -> Option<Task>,
{
    let configurations = configurations(base, axes);
    let instances = instances.iter().sorted_by(|a, b| a.name.cmp(&b.name));

    iproduct!(instances, configurations.iter())
        .filter_map(|(instance, configuration)| build(instance, configuration.clone()))
        .collect()
}

/// all tasks of `experiment` over `instances`, laid out in `out_dir`
pub fn enumerate_tasks(instances: &[Instance], experiment: &Experiment, out_dir: &Path) -> Vec<Task> {
    let tasks = enumerate(
        instances,
        &experiment.base(),
        &experiment.axes(),
        |instance, configuration| {
            let task = experiment.task(instance, configuration, out_dir);

            match &task.dependency {
                Some(dependency) if !dependency.is_file() => {
                    warn!(
                        instance = %instance.name,
                        dependency = ?dependency,
                        "Dependency does not exist, skipping"
                    );
                    None
                }
                _ => Some(task),
            }
        },
    );

    debug!(
        experiment = experiment.name(),
        count = tasks.len(),
        "Enumerated tasks"
    );

    tasks
}
