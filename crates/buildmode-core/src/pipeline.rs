//! Fail-fast pipeline execution.

use crate::error::DispatchError;
use crate::mode::Mode;
use crate::step::{StepFactory, StepOutcome, StepSpec};
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::time::Instant;
use tracing::{error, info, warn};
use uuid::Uuid;

/// Ordered steps selected for one mode.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
pub struct Pipeline {
    /// Mode the steps were planned for.
    pub mode: Mode,

    /// Steps in execution order.
    pub steps: Vec<StepSpec>,
}

/// Result of a pipeline that ran to completion.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct PipelineReport {
    /// Identifier of this run, used to correlate log lines.
    pub run_id: String,

    /// Mode that was executed.
    pub mode: Mode,

    /// Wall-clock start time.
    pub started_at: DateTime<Utc>,

    /// Total duration in milliseconds.
    pub duration_ms: u64,

    /// Outcomes of every executed step, in order.
    pub steps: Vec<StepOutcome>,
}

impl PipelineReport {
    /// Number of steps that passed.
    pub fn passed_count(&self) -> usize {
        self.steps.iter().filter(|s| s.passed()).count()
    }

    /// Number of non-fatal steps that failed.
    pub fn failed_count(&self) -> usize {
        self.steps.iter().filter(|s| !s.passed()).count()
    }
}

impl Pipeline {
    pub fn new(mode: Mode) -> Self {
        Self {
            mode,
            steps: Vec::new(),
        }
    }

    /// Append a step.
    pub fn push(&mut self, step: StepSpec) {
        self.steps.push(step);
    }

    /// Names of the planned steps, in order.
    pub fn step_names(&self) -> Vec<&str> {
        self.steps.iter().map(|s| s.name.as_str()).collect()
    }

    /// Find a planned step by name.
    pub fn step(&self, name: &str) -> Option<&StepSpec> {
        self.steps.iter().find(|s| s.name == name)
    }

    /// Execute steps one at a time.
    ///
    /// The first failing fatal step aborts the run: nothing after it is
    /// built or executed, and its exit code becomes the run's status.
    /// Failing non-fatal steps are logged and recorded in the report.
    pub async fn run(&self, factory: &dyn StepFactory) -> Result<PipelineReport, DispatchError> {
        let start = Instant::now();
        let started_at = Utc::now();
        let run_id = Uuid::new_v4().to_string();

        info!(run_id = %run_id, mode = %self.mode, steps = self.steps.len(), "Starting pipeline");

        let mut outcomes = Vec::with_capacity(self.steps.len());
        for spec in &self.steps {
            info!(run_id = %run_id, step = %spec.name, command = %spec.describe(), "Executing step");

            let step = factory.build(spec);
            let outcome = step.execute().await;

            if outcome.passed() {
                info!(
                    run_id = %run_id,
                    step = %spec.name,
                    duration_ms = outcome.duration_ms,
                    "Step passed"
                );
            } else if spec.fatal {
                error!(
                    run_id = %run_id,
                    step = %spec.name,
                    exit_code = outcome.exit_code,
                    duration_ms = outcome.duration_ms,
                    "Step failed, aborting pipeline"
                );
                return Err(DispatchError::StepFailed {
                    step: spec.name.clone(),
                    exit_code: outcome.exit_code,
                });
            } else {
                warn!(
                    run_id = %run_id,
                    step = %spec.name,
                    exit_code = outcome.exit_code,
                    "Non-fatal step failed, continuing"
                );
            }

            outcomes.push(outcome);
        }

        let duration_ms = start.elapsed().as_millis() as u64;
        info!(run_id = %run_id, mode = %self.mode, duration_ms, "Pipeline completed successfully");

        Ok(PipelineReport {
            run_id,
            mode: self.mode,
            started_at,
            duration_ms,
            steps: outcomes,
        })
    }
}
