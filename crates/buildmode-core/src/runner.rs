//! External process execution for pipeline steps.

use crate::step::{OutputMode, StepOutcome};
use std::process::Stdio;
use std::time::{Duration, Instant};
use tokio::io::AsyncWriteExt;
use tokio::process::Command;
use tracing::{debug, error, warn};

/// Exit code reported when the tool could not be started.
pub const EXIT_SPAWN_FAILED: i32 = 127;

/// Exit code reported when a step exceeded its timeout.
pub const EXIT_TIMED_OUT: i32 = 124;

/// Exit code reported when no status could be obtained at all.
pub const EXIT_NO_STATUS: i32 = -1;

/// Shell convention for a child terminated by a signal.
#[cfg(unix)]
const SIGNAL_EXIT_BASE: i32 = 128;

/// Runs one external command to completion and folds every outcome,
/// including spawn errors and timeouts, into a [`StepOutcome`].
#[derive(Debug, Clone, Default)]
pub struct ProcessRunner {
    timeout: Option<Duration>,
    output: OutputMode,
}

impl ProcessRunner {
    /// Create a runner with an optional per-command timeout.
    pub fn new(timeout: Option<Duration>, output: OutputMode) -> Self {
        Self { timeout, output }
    }

    /// Per-command timeout, shared with steps that do work before spawning.
    pub fn timeout(&self) -> Option<Duration> {
        self.timeout
    }

    /// Run `argv` (first element is the executable), optionally feeding
    /// `stdin` to the child.
    pub async fn run(&self, step_name: &str, argv: &[String], stdin: Option<Vec<u8>>) -> StepOutcome {
        let start = Instant::now();

        let Some((exe, args)) = argv.split_first() else {
            error!(step = %step_name, "Step has empty command");
            return StepOutcome::new(step_name, EXIT_SPAWN_FAILED)
                .with_stderr("empty command")
                .with_elapsed(start);
        };

        debug!(step = %step_name, command = ?argv, "Spawning");

        let mut command = Command::new(exe);
        command
            .args(args)
            .kill_on_drop(true)
            .stdin(if stdin.is_some() {
                Stdio::piped()
            } else {
                Stdio::inherit()
            });
        match self.output {
            OutputMode::Inherit => command.stdout(Stdio::inherit()).stderr(Stdio::inherit()),
            OutputMode::Capture => command.stdout(Stdio::piped()).stderr(Stdio::piped()),
        };

        let mut child = match command.spawn() {
            Ok(child) => child,
            Err(e) => {
                error!(step = %step_name, exe = %exe, error = %e, "Failed to start tool");
                return StepOutcome::new(step_name, EXIT_SPAWN_FAILED)
                    .with_stderr(e.to_string())
                    .with_elapsed(start);
            }
        };

        // Feed stdin concurrently with waiting so a chatty child cannot
        // block on a full stdout pipe while we block on its stdin.
        if let (Some(input), Some(mut pipe)) = (stdin, child.stdin.take()) {
            let step = step_name.to_string();
            tokio::spawn(async move {
                if let Err(e) = pipe.write_all(&input).await {
                    debug!(step = %step, error = %e, "Child closed stdin early");
                }
            });
        }

        let wait = child.wait_with_output();
        let waited = match self.timeout {
            Some(limit) => match tokio::time::timeout(limit, wait).await {
                Ok(result) => result,
                Err(_) => {
                    warn!(step = %step_name, timeout_secs = limit.as_secs(), "Step timed out, killed");
                    return StepOutcome::new(step_name, EXIT_TIMED_OUT)
                        .with_stderr(format!("timed out after {} seconds", limit.as_secs()))
                        .with_elapsed(start);
                }
            },
            None => wait.await,
        };

        let output = match waited {
            Ok(output) => output,
            Err(e) => {
                error!(step = %step_name, error = %e, "Failed to wait for tool");
                return StepOutcome::new(step_name, EXIT_NO_STATUS)
                    .with_stderr(e.to_string())
                    .with_elapsed(start);
            }
        };

        StepOutcome {
            step_name: step_name.to_string(),
            exit_code: exit_code_of(output.status),
            stdout: String::from_utf8_lossy(&output.stdout).to_string(),
            stderr: String::from_utf8_lossy(&output.stderr).to_string(),
            duration_ms: start.elapsed().as_millis() as u64,
        }
    }
}

/// Exit code as a shell would report it: `128 + signal` for killed children.
fn exit_code_of(status: std::process::ExitStatus) -> i32 {
    if let Some(code) = status.code() {
        return code;
    }
    #[cfg(unix)]
    {
        use std::os::unix::process::ExitStatusExt;
        if let Some(signal) = status.signal() {
            return SIGNAL_EXIT_BASE + signal;
        }
    }
    EXIT_NO_STATUS
}

#[cfg(test)]
mod tests {
    use super::*;

    fn argv(parts: &[&str]) -> Vec<String> {
        parts.iter().map(|s| s.to_string()).collect()
    }

    fn capturing() -> ProcessRunner {
        ProcessRunner::new(Some(Duration::from_secs(30)), OutputMode::Capture)
    }

    #[tokio::test]
    async fn test_run_simple_command() {
        let outcome = capturing().run("echo_test", &argv(&["echo", "hello"]), None).await;
        assert!(outcome.passed());
        assert_eq!(outcome.exit_code, 0);
        assert!(outcome.stdout.contains("hello"));
    }

    #[tokio::test]
    async fn test_run_failing_command() {
        let outcome = capturing().run("false_test", &argv(&["false"]), None).await;
        assert!(!outcome.passed());
        assert_ne!(outcome.exit_code, 0);
    }

    #[tokio::test]
    async fn test_exit_code_is_preserved() {
        let outcome = capturing().run("exit3", &argv(&["sh", "-c", "exit 3"]), None).await;
        assert_eq!(outcome.exit_code, 3);
    }

    #[tokio::test]
    async fn test_missing_tool_reports_127() {
        let outcome = capturing()
            .run("ghost", &argv(&["buildmode-no-such-tool-xyz"]), None)
            .await;
        assert_eq!(outcome.exit_code, EXIT_SPAWN_FAILED);
        assert!(!outcome.stderr.is_empty());
    }

    #[tokio::test]
    async fn test_empty_command_reports_127() {
        let outcome = capturing().run("empty", &[], None).await;
        assert_eq!(outcome.exit_code, EXIT_SPAWN_FAILED);
    }

    #[tokio::test]
    async fn test_timeout_reports_124() {
        let runner = ProcessRunner::new(Some(Duration::from_millis(200)), OutputMode::Capture);
        let outcome = runner.run("sleepy", &argv(&["sleep", "5"]), None).await;
        assert_eq!(outcome.exit_code, EXIT_TIMED_OUT);
        assert!(outcome.duration_ms < 5000);
    }

    #[cfg(unix)]
    #[tokio::test]
    async fn test_signal_kill_reports_128_plus_signal() {
        let outcome = capturing().run("killed", &argv(&["sh", "-c", "kill -9 $$"]), None).await;
        assert_eq!(outcome.exit_code, 137);
        assert!(!outcome.passed());
    }

    #[tokio::test]
    async fn test_stdin_is_fed_to_child() {
        let script = b"echo from-script\nexit 4\n".to_vec();
        let outcome = capturing().run("script", &argv(&["sh"]), Some(script)).await;
        assert_eq!(outcome.exit_code, 4);
        assert!(outcome.stdout.contains("from-script"));
    }
}
