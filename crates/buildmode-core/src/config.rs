//! Dispatcher configuration, read once from the environment.
//!
//! All environment access happens in [`DispatchConfig::from_lookup`]; the
//! rest of the crate only sees the resulting immutable value.

use crate::error::ConfigError;
use crate::mode::Mode;
use serde::{Deserialize, Serialize};
use std::path::PathBuf;
use std::time::Duration;

/// Selects the pipeline.
pub const ENV_BUILD: &str = "BUILD";
/// Non-empty value enables the publish step.
pub const ENV_RELEASE_TAG: &str = "RELEASE_TAG";
/// Interpreter/platform running the test pipeline.
pub const ENV_RUNTIME_ID: &str = "RUNTIME_ID";

const ENV_RELEASE_TAG_FALLBACK: &str = "TRAVIS_TAG";
const ENV_RUNTIME_ID_FALLBACK: &str = "TRAVIS_PYTHON_VERSION";
const ENV_COVERAGE_SKIP_RUNTIME: &str = "COVERAGE_SKIP_RUNTIME";
const ENV_COVERAGE_UPLOAD_FATAL: &str = "COVERAGE_UPLOAD_FATAL";
const ENV_COVERAGE_SCRIPT_URL: &str = "COVERAGE_SCRIPT_URL";
const ENV_PACKAGE: &str = "PACKAGE";
const ENV_DIST_DIR: &str = "DIST_DIR";
const ENV_PYTHON: &str = "PYTHON";
const ENV_STEP_TIMEOUT_SECS: &str = "STEP_TIMEOUT_SECS";

/// Source tree areas the lint tools look at, and where sdists land.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
pub struct ProjectLayout {
    /// Library package directory.
    pub library: String,

    /// Example programs directory.
    pub examples: String,

    /// Test suite directory.
    pub tests: String,

    /// Output directory of `setup.py sdist`.
    pub dist_dir: PathBuf,
}

impl Default for ProjectLayout {
    fn default() -> Self {
        ProjectLayout {
            library: "aioquic".to_string(),
            examples: "examples".to_string(),
            tests: "tests".to_string(),
            dist_dir: PathBuf::from("dist"),
        }
    }
}

impl ProjectLayout {
    /// The three areas style, import-order and formatting checks run over.
    pub fn lint_targets(&self) -> [&str; 3] {
        [&self.library, &self.examples, &self.tests]
    }
}

/// Coverage upload behaviour of the test pipeline.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
pub struct CoveragePolicy {
    /// Runtime identifier for which the upload is skipped.
    pub skip_runtime: String,

    /// Whether a failed upload fails the run.
    pub upload_fatal: bool,

    /// Location of the uploader script, executed with bash.
    pub script_url: String,
}

impl Default for CoveragePolicy {
    fn default() -> Self {
        CoveragePolicy {
            skip_runtime: "pypy3".to_string(),
            upload_fatal: true,
            script_url: "https://codecov.io/bash".to_string(),
        }
    }
}

/// Immutable configuration for one dispatcher run.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
pub struct DispatchConfig {
    /// Pipeline to run.
    pub mode: Mode,

    /// Release tag; `Some` only when non-empty.
    pub release_tag: Option<String>,

    /// Interpreter/platform identifier.
    pub runtime_id: Option<String>,

    /// Coverage upload policy.
    pub coverage: CoveragePolicy,

    /// Source layout.
    pub layout: ProjectLayout,

    /// Python interpreter used for setup.py and twine.
    pub python: String,

    /// Per-step timeout in seconds, 0 disables.
    pub step_timeout_secs: u64,
}

impl Default for DispatchConfig {
    fn default() -> Self {
        DispatchConfig {
            mode: Mode::default(),
            release_tag: None,
            runtime_id: None,
            coverage: CoveragePolicy::default(),
            layout: ProjectLayout::default(),
            python: "python3".to_string(),
            step_timeout_secs: 0,
        }
    }
}

impl DispatchConfig {
    /// Create a config for `mode` with every other value defaulted.
    pub fn new(mode: Mode) -> Self {
        DispatchConfig {
            mode,
            ..Default::default()
        }
    }

    /// Load configuration from the process environment.
    pub fn from_env() -> Result<Self, ConfigError> {
        Self::from_lookup(|key| std::env::var(key).ok())
    }

    /// Load configuration through an arbitrary variable lookup.
    pub fn from_lookup<F>(lookup: F) -> Result<Self, ConfigError>
    where
        F: Fn(&str) -> Option<String>,
    {
        let mode = Mode::from_build(lookup(ENV_BUILD).as_deref());

        let release_tag = [ENV_RELEASE_TAG, ENV_RELEASE_TAG_FALLBACK]
            .iter()
            .filter_map(|key| lookup(key))
            .find(|tag| !tag.is_empty());

        let runtime_id = [ENV_RUNTIME_ID, ENV_RUNTIME_ID_FALLBACK]
            .iter()
            .filter_map(|key| lookup(key))
            .find(|id| !id.is_empty());

        let defaults = CoveragePolicy::default();
        let coverage = CoveragePolicy {
            skip_runtime: lookup(ENV_COVERAGE_SKIP_RUNTIME).unwrap_or(defaults.skip_runtime),
            upload_fatal: match lookup(ENV_COVERAGE_UPLOAD_FATAL) {
                Some(raw) => parse_bool(ENV_COVERAGE_UPLOAD_FATAL, &raw)?,
                None => defaults.upload_fatal,
            },
            script_url: lookup(ENV_COVERAGE_SCRIPT_URL).unwrap_or(defaults.script_url),
        };

        let mut layout = ProjectLayout::default();
        if let Some(library) = lookup(ENV_PACKAGE).filter(|v| !v.is_empty()) {
            layout.library = library;
        }
        if let Some(dist_dir) = lookup(ENV_DIST_DIR).filter(|v| !v.is_empty()) {
            layout.dist_dir = PathBuf::from(dist_dir);
        }

        let python = lookup(ENV_PYTHON)
            .filter(|v| !v.is_empty())
            .unwrap_or_else(|| "python3".to_string());

        let step_timeout_secs = match lookup(ENV_STEP_TIMEOUT_SECS) {
            Some(raw) => raw.parse::<u64>().map_err(|e| ConfigError::InvalidValue {
                var: ENV_STEP_TIMEOUT_SECS,
                value: raw.clone(),
                reason: e.to_string(),
            })?,
            None => 0,
        };

        Ok(DispatchConfig {
            mode,
            release_tag,
            runtime_id,
            coverage,
            layout,
            python,
            step_timeout_secs,
        })
    }

    /// Set the release tag; an empty tag is treated as absent.
    pub fn with_release_tag(mut self, tag: &str) -> Self {
        self.release_tag = Some(tag.to_string()).filter(|t| !t.is_empty());
        self
    }

    /// Set the runtime identifier.
    pub fn with_runtime_id(mut self, runtime_id: &str) -> Self {
        self.runtime_id = Some(runtime_id.to_string());
        self
    }

    /// Make coverage upload failures fatal or not.
    pub fn with_coverage_upload_fatal(mut self, fatal: bool) -> Self {
        self.coverage.upload_fatal = fatal;
        self
    }

    /// Whether the sdist pipeline should publish.
    pub fn should_publish(&self) -> bool {
        self.release_tag.is_some()
    }

    /// Whether the test pipeline should upload coverage.
    pub fn should_upload_coverage(&self) -> bool {
        self.runtime_id.as_deref() != Some(self.coverage.skip_runtime.as_str())
    }

    /// Per-step timeout, `None` when disabled.
    pub fn step_timeout(&self) -> Option<Duration> {
        (self.step_timeout_secs > 0).then(|| Duration::from_secs(self.step_timeout_secs))
    }
}

fn parse_bool(var: &'static str, raw: &str) -> Result<bool, ConfigError> {
    match raw.to_ascii_lowercase().as_str() {
        "1" | "true" | "yes" | "on" => Ok(true),
        "0" | "false" | "no" | "off" => Ok(false),
        _ => Err(ConfigError::InvalidValue {
            var,
            value: raw.to_string(),
            reason: "expected true or false".to_string(),
        }),
    }
}
