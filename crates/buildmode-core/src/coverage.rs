//! Coverage report upload through a downloaded uploader script.

use crate::runner::{ProcessRunner, EXIT_TIMED_OUT};
use crate::step::{Step, StepOutcome};
use async_trait::async_trait;
use std::time::Instant;
use tracing::{error, info, warn};

/// Exit code reported when the uploader script cannot be fetched.
pub const EXIT_FETCH_FAILED: i32 = 1;

/// Fetches the uploader script over HTTP and pipes it into an interpreter.
pub struct RemoteScriptStep {
    name: String,
    url: String,
    interpreter: String,
    http: reqwest::Client,
    runner: ProcessRunner,
}

impl RemoteScriptStep {
    pub fn new(
        name: &str,
        url: &str,
        interpreter: &str,
        http: reqwest::Client,
        runner: ProcessRunner,
    ) -> Self {
        Self {
            name: name.to_string(),
            url: url.to_string(),
            interpreter: interpreter.to_string(),
            http,
            runner,
        }
    }

    async fn fetch_script(&self) -> reqwest::Result<Vec<u8>> {
        let response = self.http.get(&self.url).send().await?.error_for_status()?;
        Ok(response.bytes().await?.to_vec())
    }

    /// Run an already fetched script through the interpreter's stdin.
    pub async fn run_script(&self, script: Vec<u8>) -> StepOutcome {
        let argv = vec![self.interpreter.clone()];
        self.runner.run(&self.name, &argv, Some(script)).await
    }
}

#[async_trait]
impl Step for RemoteScriptStep {
    fn name(&self) -> &str {
        &self.name
    }

    async fn execute(&self) -> StepOutcome {
        let start = Instant::now();
        let fetched = match self.runner.timeout() {
            Some(limit) => match tokio::time::timeout(limit, self.fetch_script()).await {
                Ok(result) => result,
                Err(_) => {
                    warn!(step = %self.name, url = %self.url, timeout_secs = limit.as_secs(), "Uploader script download timed out");
                    return StepOutcome::new(&self.name, EXIT_TIMED_OUT)
                        .with_stderr(format!("download timed out after {} seconds", limit.as_secs()))
                        .with_elapsed(start);
                }
            },
            None => self.fetch_script().await,
        };

        let script = match fetched {
            Ok(script) => script,
            Err(e) => {
                error!(step = %self.name, url = %self.url, error = %e, "Failed to fetch uploader script");
                return StepOutcome::new(&self.name, EXIT_FETCH_FAILED).with_stderr(e.to_string());
            }
        };

        info!(step = %self.name, url = %self.url, bytes = script.len(), "Running uploader script");
        self.run_script(script).await
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::step::OutputMode;
    use std::time::Duration;

    fn step(url: &str, interpreter: &str) -> RemoteScriptStep {
        RemoteScriptStep::new(
            "coverage_upload",
            url,
            interpreter,
            reqwest::Client::new(),
            ProcessRunner::new(None, OutputMode::Capture),
        )
    }

    #[tokio::test]
    async fn test_run_script_propagates_status() {
        let upload = step("http://127.0.0.1:9/bash", "sh");
        let outcome = upload.run_script(b"echo uploading\nexit 0\n".to_vec()).await;
        assert!(outcome.passed());
        assert!(outcome.stdout.contains("uploading"));

        let outcome = upload.run_script(b"exit 5\n".to_vec()).await;
        assert_eq!(outcome.exit_code, 5);
    }

    #[tokio::test]
    async fn test_silent_script_host_times_out() {
        let listener = tokio::net::TcpListener::bind("127.0.0.1:0").await.expect("bind");
        let url = format!("http://{}/bash", listener.local_addr().expect("addr"));
        // Accept and hold connections without ever answering.
        let server = tokio::spawn(async move {
            let mut held = Vec::new();
            while let Ok((socket, _)) = listener.accept().await {
                held.push(socket);
            }
        });

        let upload = RemoteScriptStep::new(
            "coverage_upload",
            &url,
            "sh",
            reqwest::Client::new(),
            ProcessRunner::new(Some(Duration::from_millis(300)), OutputMode::Capture),
        );
        let outcome = tokio::time::timeout(Duration::from_secs(5), upload.execute())
            .await
            .expect("download should be bounded by the step timeout");

        assert_eq!(outcome.exit_code, EXIT_TIMED_OUT);
        assert!(outcome.stderr.contains("timed out"));
        server.abort();
    }

    #[tokio::test]
    async fn test_unreachable_script_host_fails() {
        // Port 9 (discard) is not expected to be listening locally.
        let outcome = step("http://127.0.0.1:9/bash", "sh").execute().await;
        assert_eq!(outcome.exit_code, EXIT_FETCH_FAILED);
        assert_eq!(outcome.step_name, "coverage_upload");
    }
}
