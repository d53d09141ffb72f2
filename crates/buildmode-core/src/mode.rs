//! Build mode selection.

use serde::{Deserialize, Serialize};
use std::fmt;

/// The pipeline a run executes.
///
/// `Test` is the explicit fallback for every `$BUILD` value that is not
/// exactly `lint` or `sdist`, so dispatch is always total.
#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq, Hash, Default)]
#[serde(rename_all = "snake_case")]
pub enum Mode {
    /// flake8, isort, black, mypy
    Lint,

    /// setup.py sdist, then twine upload on tagged builds
    Sdist,

    /// coverage run setup.py test, then coverage upload
    #[default]
    Test,
}

impl Mode {
    /// Select a mode from the raw `$BUILD` value.
    ///
    /// Matching is exact: no trimming, no case folding. `None` and the empty
    /// string both select `Test`.
    pub fn from_build(value: Option<&str>) -> Self {
        match value {
            Some("lint") => Mode::Lint,
            Some("sdist") => Mode::Sdist,
            _ => Mode::Test,
        }
    }

    /// Get the mode name as a string.
    pub fn name(&self) -> &'static str {
        match self {
            Mode::Lint => "lint",
            Mode::Sdist => "sdist",
            Mode::Test => "test",
        }
    }
}

impl fmt::Display for Mode {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.name())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_exact_matches() {
        assert_eq!(Mode::from_build(Some("lint")), Mode::Lint);
        assert_eq!(Mode::from_build(Some("sdist")), Mode::Sdist);
    }

    #[test]
    fn test_everything_else_is_test() {
        assert_eq!(Mode::from_build(None), Mode::Test);
        assert_eq!(Mode::from_build(Some("")), Mode::Test);
        assert_eq!(Mode::from_build(Some("test")), Mode::Test);
        assert_eq!(Mode::from_build(Some("wheel")), Mode::Test);
    }

    #[test]
    fn test_no_normalization() {
        assert_eq!(Mode::from_build(Some("LINT")), Mode::Test);
        assert_eq!(Mode::from_build(Some(" lint")), Mode::Test);
        assert_eq!(Mode::from_build(Some("sdist\n")), Mode::Test);
    }

    #[test]
    fn test_display_and_serde_names_agree() {
        for mode in [Mode::Lint, Mode::Sdist, Mode::Test] {
            let json = serde_json::to_string(&mode).expect("serialize");
            assert_eq!(json, format!("\"{}\"", mode));
        }
    }
}
