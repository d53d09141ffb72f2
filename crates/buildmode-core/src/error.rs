//! Error types for buildmode-core

use thiserror::Error;

/// A pipeline aborted because one of its steps failed.
///
/// This is the only failure kind a run can end with; lint violations,
/// missing tools and network failures are not distinguished.
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum DispatchError {
    /// A fatal step exited unsuccessfully
    #[error("Step '{step}' failed with exit code {exit_code}")]
    StepFailed { step: String, exit_code: i32 },
}

impl DispatchError {
    /// Exit status the whole run should terminate with.
    pub fn exit_code(&self) -> i32 {
        match self {
            DispatchError::StepFailed { exit_code, .. } => *exit_code,
        }
    }

    /// Name of the step that aborted the run.
    pub fn step(&self) -> &str {
        match self {
            DispatchError::StepFailed { step, .. } => step,
        }
    }
}

/// Errors raised while loading configuration from the environment
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum ConfigError {
    /// A variable is set but cannot be parsed
    #[error("Invalid value for {var}: {value:?} ({reason})")]
    InvalidValue {
        var: &'static str,
        value: String,
        reason: String,
    },
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_step_failed_exposes_status() {
        let err = DispatchError::StepFailed {
            step: "mypy".to_string(),
            exit_code: 2,
        };
        assert_eq!(err.exit_code(), 2);
        assert_eq!(err.step(), "mypy");
        assert_eq!(err.to_string(), "Step 'mypy' failed with exit code 2");
    }

    #[test]
    fn test_config_error_message() {
        let err = ConfigError::InvalidValue {
            var: "STEP_TIMEOUT_SECS",
            value: "soon".to_string(),
            reason: "invalid digit found in string".to_string(),
        };
        assert!(err.to_string().contains("STEP_TIMEOUT_SECS"));
        assert!(err.to_string().contains("\"soon\""));
    }
}
