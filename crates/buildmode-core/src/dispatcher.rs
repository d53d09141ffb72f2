//! Mode dispatch: which steps run for `lint`, `sdist` and `test`.

use crate::config::DispatchConfig;
use crate::error::DispatchError;
use crate::mode::Mode;
use crate::pipeline::{Pipeline, PipelineReport};
use crate::step::{StepFactory, StepSpec};

/// Interpreter the coverage uploader script is piped into.
const UPLOADER_INTERPRETER: &str = "bash";

/// Selects and runs exactly one pipeline for a configuration.
#[derive(Debug, Clone)]
pub struct ModeDispatcher {
    config: DispatchConfig,
}

impl ModeDispatcher {
    pub fn new(config: DispatchConfig) -> Self {
        Self { config }
    }

    pub fn config(&self) -> &DispatchConfig {
        &self.config
    }

    /// Plan the steps for the configured mode without running anything.
    ///
    /// The conditional steps are decided here: publish only with a release
    /// tag, coverage upload only off the excluded runtime.
    pub fn plan(&self) -> Pipeline {
        match self.config.mode {
            Mode::Lint => self.lint_pipeline(),
            Mode::Sdist => self.sdist_pipeline(),
            Mode::Test => self.test_pipeline(),
        }
    }

    /// Plan and run the selected pipeline.
    pub async fn run(&self, factory: &dyn StepFactory) -> Result<PipelineReport, DispatchError> {
        self.plan().run(factory).await
    }

    fn lint_pipeline(&self) -> Pipeline {
        let layout = &self.config.layout;
        let targets = layout.lint_targets();

        let mut pipeline = Pipeline::new(Mode::Lint);
        pipeline.push(StepSpec::command("flake8", &with_targets(&["flake8"], &targets)));
        pipeline.push(StepSpec::command(
            "isort",
            &with_targets(&["isort", "-c", "-df", "-rc"], &targets),
        ));
        pipeline.push(StepSpec::command(
            "black",
            &with_targets(&["black", "--check", "--diff"], &targets),
        ));
        pipeline.push(StepSpec::command("mypy", &["mypy", layout.library.as_str()]));
        pipeline
    }

    fn sdist_pipeline(&self) -> Pipeline {
        let python = self.config.python.as_str();
        let dist_dir = self.config.layout.dist_dir.clone();

        let mut pipeline = Pipeline::new(Mode::Sdist);
        let dist_arg = dist_dir.to_string_lossy().into_owned();
        pipeline.push(StepSpec::command(
            "sdist",
            &[python, "setup.py", "sdist", "--dist-dir", dist_arg.as_str()],
        ));
        if self.config.should_publish() {
            pipeline.push(StepSpec::publish("publish", python, dist_dir, true));
        }
        pipeline
    }

    fn test_pipeline(&self) -> Pipeline {
        let coverage = &self.config.coverage;

        let mut pipeline = Pipeline::new(Mode::Test);
        pipeline.push(StepSpec::command(
            "coverage_run",
            &["coverage", "run", "setup.py", "test"],
        ));
        if self.config.should_upload_coverage() {
            pipeline.push(
                StepSpec::remote_script("coverage_upload", &coverage.script_url, UPLOADER_INTERPRETER)
                    .fatal(coverage.upload_fatal),
            );
        }
        pipeline
    }
}

fn with_targets<'a>(command: &[&'a str], targets: &[&'a str]) -> Vec<&'a str> {
    command.iter().chain(targets.iter()).copied().collect()
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::step::StepKind;
    use std::path::PathBuf;

    fn argv_of(pipeline: &Pipeline, name: &str) -> Vec<String> {
        match &pipeline.step(name).expect("step planned").kind {
            StepKind::Command { argv } => argv.clone(),
            other => panic!("{} is not a command step: {:?}", name, other),
        }
    }

    #[test]
    fn test_lint_plan_order_and_targets() {
        let plan = ModeDispatcher::new(DispatchConfig::new(Mode::Lint)).plan();
        assert_eq!(plan.mode, Mode::Lint);
        assert_eq!(plan.step_names(), vec!["flake8", "isort", "black", "mypy"]);
        assert!(plan.steps.iter().all(|s| s.fatal));

        assert_eq!(argv_of(&plan, "flake8"), vec!["flake8", "aioquic", "examples", "tests"]);
        assert_eq!(
            argv_of(&plan, "isort"),
            vec!["isort", "-c", "-df", "-rc", "aioquic", "examples", "tests"]
        );
        assert_eq!(
            argv_of(&plan, "black"),
            vec!["black", "--check", "--diff", "aioquic", "examples", "tests"]
        );
        assert_eq!(argv_of(&plan, "mypy"), vec!["mypy", "aioquic"]);
    }

    #[test]
    fn test_sdist_plan_without_tag() {
        let plan = ModeDispatcher::new(DispatchConfig::new(Mode::Sdist)).plan();
        assert_eq!(plan.step_names(), vec!["sdist"]);
        assert_eq!(
            argv_of(&plan, "sdist"),
            vec!["python3", "setup.py", "sdist", "--dist-dir", "dist"]
        );
    }

    #[test]
    fn test_sdist_plan_with_tag_publishes_skip_existing() {
        let config = DispatchConfig::new(Mode::Sdist).with_release_tag("0.5.0");
        let plan = ModeDispatcher::new(config).plan();
        assert_eq!(plan.step_names(), vec!["sdist", "publish"]);

        let publish = plan.step("publish").expect("publish planned");
        assert!(publish.fatal);
        assert_eq!(
            publish.kind,
            StepKind::Publish {
                python: "python3".to_string(),
                dist_dir: PathBuf::from("dist"),
                skip_existing: true,
            }
        );
    }

    #[test]
    fn test_test_plan_uploads_coverage() {
        let config = DispatchConfig::new(Mode::Test).with_runtime_id("3.7");
        let plan = ModeDispatcher::new(config).plan();
        assert_eq!(plan.step_names(), vec!["coverage_run", "coverage_upload"]);
        assert_eq!(argv_of(&plan, "coverage_run"), vec!["coverage", "run", "setup.py", "test"]);

        let upload = plan.step("coverage_upload").expect("upload planned");
        assert!(upload.fatal);
        assert_eq!(
            upload.kind,
            StepKind::RemoteScript {
                url: "https://codecov.io/bash".to_string(),
                interpreter: "bash".to_string(),
            }
        );
    }

    #[test]
    fn test_test_plan_skips_upload_on_excluded_runtime() {
        let config = DispatchConfig::new(Mode::Test).with_runtime_id("pypy3");
        let plan = ModeDispatcher::new(config).plan();
        assert_eq!(plan.step_names(), vec!["coverage_run"]);
    }

    #[test]
    fn test_non_fatal_upload_is_planned_as_such() {
        let config = DispatchConfig::new(Mode::Test).with_coverage_upload_fatal(false);
        let plan = ModeDispatcher::new(config).plan();
        assert!(!plan.step("coverage_upload").expect("upload planned").fatal);
    }

    #[test]
    fn test_custom_layout_flows_into_plan() {
        let mut config = DispatchConfig::new(Mode::Lint);
        config.layout.library = "mylib".to_string();
        let plan = ModeDispatcher::new(config).plan();
        assert_eq!(argv_of(&plan, "mypy"), vec!["mypy", "mylib"]);
        assert_eq!(argv_of(&plan, "flake8")[1], "mylib");
    }
}
