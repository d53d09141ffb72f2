//! buildmode - CI build-mode dispatcher
//!
//! Selects one of three mutually exclusive pipelines from `$BUILD` and runs
//! it fail-fast:
//! - `lint`: flake8, isort, black and mypy in check-only mode
//! - `sdist`: build a source distribution, publish it when a release tag is set
//! - anything else: run the tests under coverage and upload the report

pub mod config;
pub mod coverage;
pub mod dispatcher;
pub mod error;
pub mod fakes;
pub mod mode;
pub mod pipeline;
pub mod publish;
pub mod runner;
pub mod step;
pub mod telemetry;

// Re-export key types
pub use config::{CoveragePolicy, DispatchConfig, ProjectLayout};
pub use dispatcher::ModeDispatcher;
pub use error::{ConfigError, DispatchError};
pub use mode::Mode;
pub use pipeline::{Pipeline, PipelineReport};
pub use step::{OutputMode, Step, StepFactory, StepKind, StepOutcome, StepSpec, SystemStepFactory};
pub use telemetry::{init_tracing, LogFormat};
