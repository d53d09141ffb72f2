//! Source distribution upload.
//!
//! Artifacts are enumerated when the step executes, after the build step
//! has populated the output directory, and handed to `twine upload`.
//! With `skip_existing` set, a re-run against an index that already holds
//! the same files succeeds.

use crate::runner::ProcessRunner;
use crate::step::{Step, StepOutcome};
use async_trait::async_trait;
use std::path::{Path, PathBuf};
use tracing::{error, info};

/// Exit code reported when there is nothing to upload.
pub const EXIT_NO_ARTIFACTS: i32 = 1;

/// Uploads every file in the artifact directory to the package index.
pub struct PublishStep {
    name: String,
    python: String,
    dist_dir: PathBuf,
    skip_existing: bool,
    runner: ProcessRunner,
}

impl PublishStep {
    pub fn new(
        name: &str,
        python: &str,
        dist_dir: PathBuf,
        skip_existing: bool,
        runner: ProcessRunner,
    ) -> Self {
        Self {
            name: name.to_string(),
            python: python.to_string(),
            dist_dir,
            skip_existing,
            runner,
        }
    }

    /// Full twine command line for `artifacts`.
    pub fn command_line(&self, artifacts: &[PathBuf]) -> Vec<String> {
        let mut argv = vec![
            self.python.clone(),
            "-m".to_string(),
            "twine".to_string(),
            "upload".to_string(),
        ];
        if self.skip_existing {
            argv.push("--skip-existing".to_string());
        }
        argv.extend(artifacts.iter().map(|p| p.to_string_lossy().to_string()));
        argv
    }
}

/// Regular files directly inside `dist_dir`, sorted by name.
pub async fn collect_artifacts(dist_dir: &Path) -> std::io::Result<Vec<PathBuf>> {
    let mut entries = tokio::fs::read_dir(dist_dir).await?;
    let mut artifacts = Vec::new();
    while let Some(entry) = entries.next_entry().await? {
        if entry.file_type().await?.is_file() {
            artifacts.push(entry.path());
        }
    }
    artifacts.sort();
    Ok(artifacts)
}

#[async_trait]
impl Step for PublishStep {
    fn name(&self) -> &str {
        &self.name
    }

    async fn execute(&self) -> StepOutcome {
        let artifacts = match collect_artifacts(&self.dist_dir).await {
            Ok(found) if !found.is_empty() => found,
            Ok(_) => {
                error!(step = %self.name, dist_dir = %self.dist_dir.display(), "No artifacts to upload");
                return StepOutcome::new(&self.name, EXIT_NO_ARTIFACTS)
                    .with_stderr(format!("no artifacts in {}", self.dist_dir.display()));
            }
            Err(e) => {
                error!(step = %self.name, dist_dir = %self.dist_dir.display(), error = %e, "Cannot read artifact directory");
                return StepOutcome::new(&self.name, EXIT_NO_ARTIFACTS).with_stderr(e.to_string());
            }
        };

        info!(
            step = %self.name,
            artifacts = artifacts.len(),
            skip_existing = self.skip_existing,
            "Uploading artifacts"
        );
        let argv = self.command_line(&artifacts);
        self.runner.run(&self.name, &argv, None).await
    }
}
