//! Mutation campaign configuration.

use std::path::PathBuf;

use serde::{Deserialize, Serialize};

use super::applicator::SourceSyntax;

/// Configuration for a campaign, an agent cycle, or the iteration loop.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct MutationConfig {
    /// Directory where the test commands are executed.
    pub project_dir: PathBuf,
    /// Subject file mutated in place, relative to `project_dir` unless absolute.
    pub subject_file: PathBuf,
    /// Test file that generated tests are appended to.
    pub test_file: PathBuf,
    /// Argv of the bare pass/fail test command.
    pub test_command: Vec<String>,
    /// Argv of the coverage-reporting test command.
    pub coverage_command: Vec<String>,
    /// Optional per-run timeout in seconds. `None` waits indefinitely.
    pub timeout_secs: Option<u64>,
    /// Subject coverage percentage the agent treats as done.
    pub target_coverage: f64,
    /// Upper bound on tests synthesized per agent cycle.
    pub max_improvements: usize,
    /// Line-scanning rules for the subject language.
    pub syntax: SourceSyntax,
}

fn argv(parts: &[&str]) -> Vec<String> {
    parts.iter().map(|p| p.to_string()).collect()
}

impl Default for MutationConfig {
    fn default() -> Self {
        let project_dir = std::env::current_dir().unwrap_or_else(|_| PathBuf::from("."));
        Self {
            project_dir,
            subject_file: PathBuf::from("calculator.py"),
            test_file: PathBuf::from("test_calculator.py"),
            test_command: argv(&["python3", "-m", "pytest", "-q"]),
            coverage_command: argv(&[
                "python3",
                "-m",
                "pytest",
                "--cov=.",
                "--cov-report=term",
            ]),
            timeout_secs: None,
            target_coverage: 100.0,
            max_improvements: 5,
            syntax: SourceSyntax::default(),
        }
    }
}

impl MutationConfig {
    /// Set project directory.
    pub fn with_project_dir(mut self, project_dir: impl Into<PathBuf>) -> Self {
        self.project_dir = project_dir.into();
        self
    }

    /// Set subject file.
    pub fn with_subject_file(mut self, subject_file: impl Into<PathBuf>) -> Self {
        self.subject_file = subject_file.into();
        self
    }

    /// Set test file.
    pub fn with_test_file(mut self, test_file: impl Into<PathBuf>) -> Self {
        self.test_file = test_file.into();
        self
    }

    /// Set the pass/fail test command argv.
    pub fn with_test_command<I, S>(mut self, command: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        self.test_command = command.into_iter().map(Into::into).collect();
        self
    }

    /// Set the coverage command argv.
    pub fn with_coverage_command<I, S>(mut self, command: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        self.coverage_command = command.into_iter().map(Into::into).collect();
        self
    }

    /// Set timeout in seconds.
    pub fn with_timeout_secs(mut self, timeout_secs: u64) -> Self {
        self.timeout_secs = Some(timeout_secs);
        self
    }

    /// Set target subject coverage.
    pub fn with_target_coverage(mut self, target_coverage: f64) -> Self {
        self.target_coverage = target_coverage;
        self
    }

    /// Set per-cycle synthesis cap.
    pub fn with_max_improvements(mut self, max_improvements: usize) -> Self {
        self.max_improvements = max_improvements;
        self
    }

    /// Set source syntax rules.
    pub fn with_syntax(mut self, syntax: SourceSyntax) -> Self {
        self.syntax = syntax;
        self
    }

    /// Subject path resolved against the project directory.
    pub fn subject_path(&self) -> PathBuf {
        self.project_dir.join(&self.subject_file)
    }

    /// Test file path resolved against the project directory.
    pub fn test_path(&self) -> PathBuf {
        self.project_dir.join(&self.test_file)
    }

    /// Subject file name as it appears in coverage reports (`calculator.py`).
    pub fn subject_name(&self) -> String {
        self.subject_file
            .file_name()
            .map(|n| n.to_string_lossy().to_string())
            .unwrap_or_default()
    }

    /// Subject module name as used in the agent report (`calculator`).
    pub fn module_name(&self) -> String {
        self.subject_file
            .file_stem()
            .map(|n| n.to_string_lossy().to_string())
            .unwrap_or_default()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn defaults_and_builder_overrides_work() {
        let default = MutationConfig::default();
        assert_eq!(default.subject_file, PathBuf::from("calculator.py"));
        assert_eq!(default.test_command, ["python3", "-m", "pytest", "-q"]);
        assert_eq!(default.timeout_secs, None);
        assert_eq!(default.max_improvements, 5);

        let cfg = MutationConfig::default()
            .with_project_dir("/tmp/project-a")
            .with_subject_file("src/ops.py")
            .with_test_file("tests/test_ops.py")
            .with_test_command(["sh", "-c", "exit 0"])
            .with_timeout_secs(42)
            .with_target_coverage(90.0);

        assert_eq!(cfg.subject_path(), PathBuf::from("/tmp/project-a/src/ops.py"));
        assert_eq!(cfg.test_path(), PathBuf::from("/tmp/project-a/tests/test_ops.py"));
        assert_eq!(cfg.test_command, ["sh", "-c", "exit 0"]);
        assert_eq!(cfg.timeout_secs, Some(42));
        assert_eq!(cfg.target_coverage, 90.0);
        assert_eq!(cfg.subject_name(), "ops.py");
        assert_eq!(cfg.module_name(), "ops");
    }

    #[test]
    fn absolute_subject_path_ignores_project_dir() {
        let cfg = MutationConfig::default()
            .with_project_dir("/tmp/project-b")
            .with_subject_file("/srv/calc.py");
        assert_eq!(cfg.subject_path(), PathBuf::from("/srv/calc.py"));
    }
}
