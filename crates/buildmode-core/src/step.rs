//! Step definitions and the seam between planning and execution.

use crate::coverage::RemoteScriptStep;
use crate::publish::PublishStep;
use crate::runner::ProcessRunner;
use async_trait::async_trait;
use serde::{Deserialize, Serialize};
use std::path::PathBuf;
use std::time::{Duration, Instant};

/// Where a tool's stdout/stderr go.
#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq, Default)]
#[serde(rename_all = "snake_case")]
pub enum OutputMode {
    /// Stream straight to the dispatcher's own stdout/stderr.
    #[default]
    Inherit,

    /// Collect into the [`StepOutcome`].
    Capture,
}

/// Result of executing one step.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
pub struct StepOutcome {
    /// Step name.
    pub step_name: String,

    /// Exit code (0 = success).
    pub exit_code: i32,

    /// Captured stdout (empty unless capturing).
    pub stdout: String,

    /// Captured stderr, or the dispatcher's own failure message.
    pub stderr: String,

    /// Duration in milliseconds.
    pub duration_ms: u64,
}

impl StepOutcome {
    pub fn new(step_name: &str, exit_code: i32) -> Self {
        Self {
            step_name: step_name.to_string(),
            exit_code,
            stdout: String::new(),
            stderr: String::new(),
            duration_ms: 0,
        }
    }

    pub fn with_stderr(mut self, stderr: impl Into<String>) -> Self {
        self.stderr = stderr.into();
        self
    }

    pub fn with_elapsed(mut self, start: Instant) -> Self {
        self.duration_ms = start.elapsed().as_millis() as u64;
        self
    }

    /// Whether this step passed (exit code 0).
    pub fn passed(&self) -> bool {
        self.exit_code == 0
    }
}

/// What a step does.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
#[serde(tag = "kind", rename_all = "snake_case")]
pub enum StepKind {
    /// Run a fixed command line.
    Command { argv: Vec<String> },

    /// Upload every artifact in `dist_dir` with twine.
    Publish {
        python: String,
        dist_dir: PathBuf,
        skip_existing: bool,
    },

    /// Download a script and run it through `interpreter`.
    RemoteScript { url: String, interpreter: String },
}

/// A planned step: pure data, built into a [`Step`] only when reached.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
pub struct StepSpec {
    /// Human-readable step name.
    pub name: String,

    /// What to execute.
    #[serde(flatten)]
    pub kind: StepKind,

    /// Whether a failure aborts the pipeline.
    pub fatal: bool,
}

impl StepSpec {
    /// A fatal step running `argv`.
    pub fn command<S: AsRef<str>>(name: &str, argv: &[S]) -> Self {
        Self {
            name: name.to_string(),
            kind: StepKind::Command {
                argv: argv.iter().map(|s| s.as_ref().to_string()).collect(),
            },
            fatal: true,
        }
    }

    /// A fatal step uploading the contents of `dist_dir`.
    pub fn publish(name: &str, python: &str, dist_dir: PathBuf, skip_existing: bool) -> Self {
        Self {
            name: name.to_string(),
            kind: StepKind::Publish {
                python: python.to_string(),
                dist_dir,
                skip_existing,
            },
            fatal: true,
        }
    }

    /// A fatal step running a downloaded script.
    pub fn remote_script(name: &str, url: &str, interpreter: &str) -> Self {
        Self {
            name: name.to_string(),
            kind: StepKind::RemoteScript {
                url: url.to_string(),
                interpreter: interpreter.to_string(),
            },
            fatal: true,
        }
    }

    /// Set whether a failure of this step aborts the pipeline.
    pub fn fatal(mut self, fatal: bool) -> Self {
        self.fatal = fatal;
        self
    }

    /// Shell-like rendering for plans and logs.
    pub fn describe(&self) -> String {
        match &self.kind {
            StepKind::Command { argv } => argv.join(" "),
            StepKind::Publish {
                python,
                dist_dir,
                skip_existing,
            } => {
                let flag = if *skip_existing { " --skip-existing" } else { "" };
                format!(
                    "{} -m twine upload{} {}/*",
                    python,
                    flag,
                    dist_dir.display()
                )
            }
            StepKind::RemoteScript { url, interpreter } => {
                format!("curl -s {} | {}", url, interpreter)
            }
        }
    }
}

/// A unit of work with a name and a blocking execute-to-status operation.
#[async_trait]
pub trait Step: Send + Sync {
    fn name(&self) -> &str;

    /// Run to completion. Failures are reported through the outcome's exit
    /// code, never as an error value.
    async fn execute(&self) -> StepOutcome;
}

/// Turns planned steps into executable ones.
pub trait StepFactory: Send + Sync {
    fn build(&self, spec: &StepSpec) -> Box<dyn Step>;
}

/// Runs a fixed command line.
pub struct CommandStep {
    name: String,
    argv: Vec<String>,
    runner: ProcessRunner,
}

impl CommandStep {
    pub fn new(name: &str, argv: Vec<String>, runner: ProcessRunner) -> Self {
        Self {
            name: name.to_string(),
            argv,
            runner,
        }
    }
}

#[async_trait]
impl Step for CommandStep {
    fn name(&self) -> &str {
        &self.name
    }

    async fn execute(&self) -> StepOutcome {
        self.runner.run(&self.name, &self.argv, None).await
    }
}

/// Builds steps that spawn real processes and talk to the network.
pub struct SystemStepFactory {
    runner: ProcessRunner,
    http: reqwest::Client,
}

impl SystemStepFactory {
    /// Create a factory whose steps share one timeout and output mode.
    pub fn new(timeout: Option<Duration>, output: OutputMode) -> reqwest::Result<Self> {
        let http = reqwest::Client::builder()
            .user_agent(concat!("buildmode/", env!("CARGO_PKG_VERSION")))
            .build()?;
        Ok(Self {
            runner: ProcessRunner::new(timeout, output),
            http,
        })
    }
}

impl StepFactory for SystemStepFactory {
    fn build(&self, spec: &StepSpec) -> Box<dyn Step> {
        match &spec.kind {
            StepKind::Command { argv } => Box::new(CommandStep::new(
                &spec.name,
                argv.clone(),
                self.runner.clone(),
            )),
            StepKind::Publish {
                python,
                dist_dir,
                skip_existing,
            } => Box::new(PublishStep::new(
                &spec.name,
                python,
                dist_dir.clone(),
                *skip_existing,
                self.runner.clone(),
            )),
            StepKind::RemoteScript { url, interpreter } => Box::new(RemoteScriptStep::new(
                &spec.name,
                url,
                interpreter,
                self.http.clone(),
                self.runner.clone(),
            )),
        }
    }
}
