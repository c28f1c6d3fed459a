use crate::{catalog::Instance, executors::Submission, task::Task};
use clap::ValueEnum;
use rusqlite::{
    types::{ToSqlOutput, Value},
    ToSql,
};
use serde::Serialize;
use std::{
    fmt,
    hash::{Hash, Hasher},
    path::{Path, PathBuf},
};

/// a single scalar parameter value
#[derive(Debug, Clone, Serialize)]
#[serde(untagged)]
pub enum Param {
    Text(String),
    Int(i64),
    Float(f64),
}

impl Param {
    /// render the value as a positional solver argument
    pub fn as_arg(&self) -> String {
        match self {
            Self::Text(text) => text.clone(),
            Self::Int(value) => value.to_string(),
            Self::Float(value) => value.to_string(),
        }
    }

    /// bit pattern of a numeric value, integers and floats compare numerically
    /// NOTE: SQLite might hand back either one for the same stored number
    fn numeric_bits(&self) -> Option<u64> {
        let value = match self {
            Self::Text(_) => return None,
            Self::Int(value) => *value as f64,
            Self::Float(value) => *value,
        };

        Some(if value == 0.0 {
            0f64.to_bits()
        } else if value.is_nan() {
            f64::NAN.to_bits()
        } else {
            value.to_bits()
        })
    }
}

impl PartialEq for Param {
    fn eq(&self, other: &Self) -> bool {
        match (self, other) {
            (Self::Text(a), Self::Text(b)) => a == b,
            (Self::Text(_), _) | (_, Self::Text(_)) => false,
            _ => self.numeric_bits() == other.numeric_bits(),
        }
    }
}

impl Eq for Param {}

impl Hash for Param {
    fn hash<H: Hasher>(&self, state: &mut H) {
        match self {
            Self::Text(text) => {
                state.write_u8(0);
                text.hash(state);
            }
            _ => {
                state.write_u8(1);
                self.numeric_bits().hash(state);
            }
        }
    }
}

impl fmt::Display for Param {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.as_arg())
    }
}

impl From<&str> for Param {
    fn from(value: &str) -> Self {
        Self::Text(value.to_owned())
    }
}

impl From<f64> for Param {
    fn from(value: f64) -> Self {
        Self::Float(value)
    }
}

impl From<u32> for Param {
    fn from(value: u32) -> Self {
        Self::Int(value.into())
    }
}

impl ToSql for Param {
    fn to_sql(&self) -> rusqlite::Result<ToSqlOutput<'_>> {
        Ok(ToSqlOutput::Owned(match self {
            Self::Text(text) => Value::Text(text.clone()),
            Self::Int(value) => Value::Integer(*value),
            Self::Float(value) => Value::Real(*value),
        }))
    }
}

/// Ordered tuple of named parameter values, compared by value
#[derive(Debug, Clone, Default, PartialEq, Eq, Hash)]
pub struct ParameterConfiguration {
    fields: Vec<(String, Param)>,
}

impl ParameterConfiguration {
    pub fn new() -> Self {
        Self::default()
    }

    /// append a field, replacing an existing one with the same name in place
    pub fn with(mut self, name: &str, value: impl Into<Param>) -> Self {
        let value = value.into();

        match self.fields.iter_mut().find(|(field, _)| field == name) {
            Some((_, existing)) => *existing = value,
            None => self.fields.push((name.to_owned(), value)),
        }

        self
    }

    pub fn get(&self, name: &str) -> Option<&Param> {
        self.fields
            .iter()
            .find(|(field, _)| field == name)
            .map(|(_, value)| value)
    }

    pub fn iter(&self) -> impl Iterator<Item = (&str, &Param)> {
        self.fields.iter().map(|(name, value)| (name.as_str(), value))
    }

    pub fn len(&self) -> usize {
        self.fields.len()
    }

    pub fn is_empty(&self) -> bool {
        self.fields.is_empty()
    }
}

impl fmt::Display for ParameterConfiguration {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let mut first = true;

        for (name, value) in self.iter() {
            if !first {
                f.write_str(", ")?;
            }
            write!(f, "{name}={value}")?;
            first = false;
        }

        Ok(())
    }
}

/// one independent dimension of the configuration space
#[derive(Debug, Clone)]
pub struct Axis {
    pub name: &'static str,
    pub values: Vec<Param>,
}

impl Axis {
    pub fn new(name: &'static str, values: impl IntoIterator<Item = Param>) -> Self {
        Self {
            name,
            values: values.into_iter().collect(),
        }
    }
}

/// Placement of the first set of witnesses
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, ValueEnum)]
#[serde(rename_all = "snake_case")]
pub enum InitialStrategy {
    #[value(name = "convex_hull")]
    ConvexHull,
    Vertices,
}

impl InitialStrategy {
    pub const ALL: [Self; 2] = [Self::ConvexHull, Self::Vertices];

    pub fn as_str(&self) -> &'static str {
        match self {
            Self::ConvexHull => "convex_hull",
            Self::Vertices => "vertices",
        }
    }
}

/// Placement of witnesses in every iteration after the first
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, ValueEnum)]
#[serde(rename_all = "snake_case")]
pub enum FollowupStrategy {
    Grid,
    Random,
    Skeleton,
}

impl FollowupStrategy {
    pub const ALL: [Self; 3] = [Self::Grid, Self::Random, Self::Skeleton];

    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Grid => "grid",
            Self::Random => "random",
            Self::Skeleton => "skeleton",
        }
    }
}

#[derive(Debug, Clone, PartialEq)]
pub struct LowerBoundParams {
    pub radius: f64,
    pub time: f64,
    pub max_initial_witnesses: u32,
    pub max_witnesses: u32,
    pub max_iterations: u32,
    /// a single strategy pair instead of the full sweep, results are named after the instance
    pub pair: Option<(InitialStrategy, FollowupStrategy)>,
}

#[derive(Debug, Clone, PartialEq)]
pub struct SolveParams {
    pub lower_bound_dir: PathBuf,
    pub time: f64,
    pub max_witness_size: u32,
}

#[derive(Debug, Clone, PartialEq)]
pub struct ApproxParams {
    pub time: f64,
    pub radius: f64,
}

/// All supported experiment kinds.
///
/// An experiment fixes the configuration axes, the fields that key the result table, the
/// on-disk layout of a task and the positional argument contract of the solver executable.
#[derive(Debug, Clone, PartialEq)]
pub enum Experiment {
    /// iterative lower bounds over every strategy pair
    LowerBound(LowerBoundParams),
    /// solutions seeded from a previously computed lower bound
    Solve(SolveParams),
    /// approximation of a tour per instance
    Approx(ApproxParams),
}

const LOWER_BOUND_KEY: [&str; 3] = ["radius", "initial_strategy", "followup_strategy"];

impl Experiment {
    pub fn name(&self) -> &'static str {
        match self {
            Self::LowerBound(_) => "lower-bound",
            Self::Solve(_) => "solve",
            Self::Approx(_) => "approx",
        }
    }

    /// fields shared by every task of the experiment
    pub fn base(&self) -> ParameterConfiguration {
        match self {
            Self::LowerBound(params) => ParameterConfiguration::new()
                .with("radius", params.radius)
                .with("timelimit", params.time)
                .with("max_initial_witnesses", params.max_initial_witnesses)
                .with("max_witnesses", params.max_witnesses)
                .with("max_iterations", params.max_iterations),
            Self::Solve(params) => ParameterConfiguration::new()
                .with("timelimit", params.time)
                .with("max_witness_size", params.max_witness_size),
            Self::Approx(params) => ParameterConfiguration::new()
                .with("timelimit", params.time)
                .with("radius", params.radius),
        }
    }

    pub fn axes(&self) -> Vec<Axis> {
        match self {
            Self::LowerBound(params) => {
                let (initial, followup) = match params.pair {
                    Some((initial, followup)) => (vec![initial], vec![followup]),
                    None => (InitialStrategy::ALL.to_vec(), FollowupStrategy::ALL.to_vec()),
                };

                vec![
                    Axis::new(
                        "initial_strategy",
                        initial.iter().map(|s| Param::from(s.as_str())),
                    ),
                    Axis::new(
                        "followup_strategy",
                        followup.iter().map(|s| Param::from(s.as_str())),
                    ),
                ]
            }
            Self::Solve(_) | Self::Approx(_) => Vec::new(),
        }
    }

    /// configuration fields which, together with the instance name, identify a table row
    pub fn key_fields(&self) -> &'static [&'static str] {
        match self {
            Self::LowerBound(_) => &LOWER_BOUND_KEY,
            Self::Solve(_) | Self::Approx(_) => &[],
        }
    }

    /// whether previously recorded rows suppress dispatching a task
    /// NOTE: solve results are kept current through dependency staleness instead
    pub fn uses_prior_table(&self) -> bool {
        matches!(self, Self::LowerBound(_))
    }

    /// upstream artifact an instance's result depends on
    pub fn dependency(&self, instance: &Instance) -> Option<PathBuf> {
        match self {
            Self::Solve(params) => Some(
                params
                    .lower_bound_dir
                    .join(format!("{}.json", instance.name)),
            ),
            Self::LowerBound(_) | Self::Approx(_) => None,
        }
    }

    /// file stem shared by the structured result and the raw log of a task
    pub fn output_stem(&self, instance: &Instance, configuration: &ParameterConfiguration) -> String {
        match self {
            // same layout as solve expects of its lower bound directory
            Self::LowerBound(LowerBoundParams { pair: Some(_), .. }) => instance.name.clone(),
            Self::LowerBound(_) => {
                let mut stem = instance.name.clone();
                for field in ["initial_strategy", "followup_strategy"] {
                    if let Some(value) = configuration.get(field) {
                        stem.push('.');
                        stem.push_str(&value.as_arg());
                    }
                }
                if let Some(radius) = configuration.get("radius") {
                    stem.push_str(&format!(".r{radius}"));
                }

                stem
            }
            Self::Solve(_) | Self::Approx(_) => instance.name.clone(),
        }
    }

    /// build a task in `out_dir` for the given instance and configuration
    pub fn task(
        &self,
        instance: &Instance,
        configuration: ParameterConfiguration,
        out_dir: &Path,
    ) -> Task {
        let stem = self.output_stem(instance, &configuration);

        Task {
            instance: instance.clone(),
            output: out_dir.join(format!("{stem}.json")),
            raw_log: out_dir.join(format!("{stem}_raw.out")),
            dependency: self.dependency(instance),
            configuration,
        }
    }

    /// positional arguments handed to the solver executable
    pub fn arguments(&self, task: &Task) -> Vec<String> {
        let mut args = vec![
            task.instance.path.to_string_lossy().into_owned(),
            task.output.to_string_lossy().into_owned(),
        ];
        let field = |name: &str| {
            task.configuration
                .get(name)
                .map(Param::as_arg)
                .unwrap_or_default()
        };

        match self {
            Self::LowerBound(_) => {
                args.extend(
                    [
                        "radius",
                        "max_initial_witnesses",
                        "max_witnesses",
                        "max_iterations",
                        "initial_strategy",
                        "followup_strategy",
                        "timelimit",
                    ]
                    .into_iter()
                    .map(field),
                );
            }
            Self::Solve(_) => {
                args.push(
                    task.dependency
                        .as_ref()
                        .map(|path| path.to_string_lossy().into_owned())
                        .unwrap_or_default(),
                );
                args.extend(["timelimit", "max_witness_size"].into_iter().map(field));
            }
            Self::Approx(_) => {
                args.extend(["timelimit", "radius"].into_iter().map(field));
            }
        }

        args
    }
}

/// Everything needed to turn a task into a complete solver invocation
#[derive(Debug, Clone)]
pub struct Invocation<'a> {
    pub executable: &'a Path,
    pub experiment: &'a Experiment,
}

impl<'a> Invocation<'a> {
    pub fn new(executable: &'a Path, experiment: &'a Experiment) -> Self {
        Self {
            executable,
            experiment,
        }
    }

    pub fn submission(&self, task: &Task) -> Submission {
        Submission {
            name: format!(
                "{}-{}",
                self.experiment.name(),
                self.experiment
                    .output_stem(&task.instance, &task.configuration)
            ),
            exec: self.executable.to_path_buf(),
            args: self.experiment.arguments(task),
            capture: task.raw_log.clone(),
        }
    }
}
