use crate::{
    catalog::Instance,
    executors::{JobHandle, JobState},
    experiment::ParameterConfiguration,
    task::Task,
};
use parking_lot::Mutex;
use serde_json::json;
use std::{fs, path::Path, sync::Arc};

pub const SQUARE: &str = "4 0 0 1 0 1 1 0 1\n";

/// create `<name>.poly` in `dir`
pub fn instance(dir: &Path, name: &str) -> Instance {
    let path = dir.join(format!("{name}.poly"));
    fs::write(&path, SQUARE).unwrap();

    Instance {
        name: name.to_owned(),
        path,
    }
}

/// write a result artifact with `iterations` entries and one metric
pub fn write_artifact(path: &Path, iterations: usize) {
    let value = json!({
        "iterations": (0..iterations).map(|i| json!({ "witnesses": i })).collect::<Vec<_>>(),
        "lower_bound": 1.5,
        "status": "optimal",
    });
    fs::write(path, serde_json::to_vec(&value).unwrap()).unwrap();
}

/// task over a single `axis` value laid out in `out_dir`
pub fn task(out_dir: &Path, instance: &Instance, axis: &str, dependency: Option<&Path>) -> Task {
    let stem = format!("{}.{axis}", instance.name);

    Task {
        instance: instance.clone(),
        configuration: ParameterConfiguration::new().with("axis", axis),
        output: out_dir.join(format!("{stem}.json")),
        raw_log: out_dir.join(format!("{stem}_raw.out")),
        dependency: dependency.map(Path::to_path_buf),
    }
}

/// job handle whose state is controlled by the test
#[derive(Debug, Clone)]
pub struct FakeJob {
    pub id: String,
    pub state: Arc<Mutex<JobState>>,
}

impl FakeJob {
    pub fn new(id: &str, state: JobState) -> Self {
        Self {
            id: id.to_owned(),
            state: Arc::new(Mutex::new(state)),
        }
    }

    pub fn set(&self, state: JobState) {
        *self.state.lock() = state;
    }
}

impl JobHandle for FakeJob {
    fn id(&self) -> &str {
        &self.id
    }

    fn state(&self) -> JobState {
        self.state.lock().clone()
    }

    fn wait(&self) -> JobState {
        loop {
            let state = self.state();
            if state.is_terminal() {
                return state;
            }
            std::thread::sleep(std::time::Duration::from_millis(5));
        }
    }
}
