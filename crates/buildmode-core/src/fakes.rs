//! In-memory fakes for the step seam (testing only)
//!
//! `RecordingFactory` builds `FakeStep`s that never spawn anything: each
//! execution is appended to a shared log and returns a preconfigured exit
//! code (0 unless told otherwise).

use std::collections::HashMap;
use std::sync::{Arc, Mutex};

use async_trait::async_trait;

use crate::step::{Step, StepFactory, StepOutcome, StepSpec};

#[derive(Debug, Default)]
struct Shared {
    executed: Mutex<Vec<StepSpec>>,
    exit_codes: Mutex<HashMap<String, i32>>,
}

/// Step factory that records executions instead of running tools.
#[derive(Debug, Default, Clone)]
pub struct RecordingFactory {
    shared: Arc<Shared>,
}

impl RecordingFactory {
    pub fn new() -> Self {
        Self::default()
    }

    /// Make the step called `name` exit with `exit_code`.
    pub fn fail_step(self, name: &str, exit_code: i32) -> Self {
        self.shared
            .exit_codes
            .lock()
            .unwrap()
            .insert(name.to_string(), exit_code);
        self
    }

    /// Names of executed steps, in execution order.
    pub fn executed(&self) -> Vec<String> {
        self.shared
            .executed
            .lock()
            .unwrap()
            .iter()
            .map(|s| s.name.clone())
            .collect()
    }

    /// Every execution of the step called `name`.
    pub fn executions_of(&self, name: &str) -> Vec<StepSpec> {
        self.shared
            .executed
            .lock()
            .unwrap()
            .iter()
            .filter(|s| s.name == name)
            .cloned()
            .collect()
    }
}

impl StepFactory for RecordingFactory {
    fn build(&self, spec: &StepSpec) -> Box<dyn Step> {
        Box::new(FakeStep {
            spec: spec.clone(),
            shared: self.shared.clone(),
        })
    }
}

/// A step that only records that it ran.
#[derive(Debug)]
pub struct FakeStep {
    spec: StepSpec,
    shared: Arc<Shared>,
}

#[async_trait]
impl Step for FakeStep {
    fn name(&self) -> &str {
        &self.spec.name
    }

    async fn execute(&self) -> StepOutcome {
        self.shared.executed.lock().unwrap().push(self.spec.clone());
        let exit_code = self
            .shared
            .exit_codes
            .lock()
            .unwrap()
            .get(&self.spec.name)
            .copied()
            .unwrap_or(0);
        StepOutcome::new(&self.spec.name, exit_code)
    }
}
