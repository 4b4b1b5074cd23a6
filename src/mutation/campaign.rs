//! Mutation campaign orchestration.
//!
//! A campaign visits every (line, rule) pair of the subject in file order ×
//! catalog order. For each matching pair it writes the mutation, runs the
//! suite, restores the subject from a [`Backup`], and classifies the mutation.
//! The subject is back to its original bytes before the next pair starts and
//! when the campaign returns, on every exit path.

use std::path::PathBuf;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::{Arc, OnceLock};
use std::time::Instant;

use serde::{Deserialize, Serialize};
use thiserror::Error;

use super::applicator::{ApplyError, apply, is_skippable_line, split_lines, split_terminator};
use super::catalog::{MutationCategory, MutationRule, catalog};
use super::config::MutationConfig;
use super::events::{CampaignEvent, MutationOutcome, now_timestamp_ms};
use super::runner::{TestRunner, TestRunnerError, TestStatus};
use super::snapshot::{Backup, SnapshotError};

/// Campaign errors. Every variant aborts the campaign.
#[derive(Debug, Error)]
pub enum CampaignError {
    /// Backup or restore failure.
    #[error("snapshot error: {0}")]
    Snapshot(#[from] SnapshotError),
    /// Mutation application failure.
    #[error("apply error: {0}")]
    Apply(#[from] ApplyError),
    /// Test runner failure.
    #[error("test runner error: {0}")]
    Runner(#[from] TestRunnerError),
    /// IO error.
    #[error("io error: {0}")]
    Io(#[from] std::io::Error),
    /// Signal handler error.
    #[error("signal handler installation failed: {0}")]
    Signal(String),
}

/// A mutation the suite did not detect.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct MutationRecord {
    /// 1-based line number.
    pub line: usize,
    /// Trimmed original line.
    pub original: String,
    /// Trimmed mutated line.
    pub mutated: String,
    /// Subject path.
    pub file: PathBuf,
    /// Rule pattern.
    pub pattern: String,
    /// Rule replacement.
    pub replacement: String,
    /// Rule category.
    pub category: MutationCategory,
}

/// Outcome of a campaign.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct CampaignResult {
    /// Subject path.
    pub subject: PathBuf,
    /// Mutations applied and tested.
    pub total: usize,
    /// Mutations the suite detected (including timeouts).
    pub killed: usize,
    /// Killed mutations whose run hit the timeout.
    pub timed_out: usize,
    /// Undetected mutations, in visit order.
    pub survivors: Vec<MutationRecord>,
    /// Comment/docstring lines that were not mutated.
    pub skipped_lines: usize,
    /// Whether the campaign stopped before visiting every pair.
    pub interrupted: bool,
}

impl CampaignResult {
    fn new(subject: PathBuf) -> Self {
        Self {
            subject,
            total: 0,
            killed: 0,
            timed_out: 0,
            survivors: Vec::new(),
            skipped_lines: 0,
            interrupted: false,
        }
    }

    /// Killed mutations over attempted mutations, as a percentage.
    /// Zero when nothing was attempted.
    pub fn mutation_score(&self) -> f64 {
        if self.total == 0 {
            return 0.0;
        }
        (self.total - self.survivors.len()) as f64 * 100.0 / self.total as f64
    }

    /// True if every attempted mutation was killed.
    pub fn all_killed(&self) -> bool {
        self.survivors.is_empty()
    }
}

/// Install the process-wide Ctrl-C handler once and return its flag.
pub fn install_interrupt_handler() -> Result<Arc<AtomicBool>, CampaignError> {
    static INIT: OnceLock<Result<Arc<AtomicBool>, String>> = OnceLock::new();

    let result = INIT.get_or_init(|| {
        let flag = Arc::new(AtomicBool::new(false));
        let handler_flag = Arc::clone(&flag);
        ctrlc::set_handler(move || {
            handler_flag.store(true, Ordering::SeqCst);
        })
        .map(|()| flag)
        .map_err(|e| e.to_string())
    });

    match result {
        Ok(flag) => Ok(Arc::clone(flag)),
        Err(msg) => Err(CampaignError::Signal(msg.clone())),
    }
}

/// Campaign driver over one subject file.
pub struct Campaign<'a> {
    config: &'a MutationConfig,
    runner: &'a dyn TestRunner,
    rules: &'a [MutationRule],
    interrupt: Option<Arc<AtomicBool>>,
}

impl<'a> Campaign<'a> {
    /// Campaign over the full catalog.
    pub fn new(config: &'a MutationConfig, runner: &'a dyn TestRunner) -> Self {
        Self {
            config,
            runner,
            rules: catalog(),
            interrupt: None,
        }
    }

    /// Restrict the campaign to `rules`.
    pub fn with_rules(mut self, rules: &'a [MutationRule]) -> Self {
        self.rules = rules;
        self
    }

    /// Stop before the next attempt once `flag` is set.
    pub fn with_interrupt_flag(mut self, flag: Arc<AtomicBool>) -> Self {
        self.interrupt = Some(flag);
        self
    }

    fn interrupted(&self) -> bool {
        self.interrupt
            .as_ref()
            .is_some_and(|flag| flag.load(Ordering::SeqCst))
    }

    /// Run the campaign, reporting progress to `observer`.
    pub fn run(
        &self,
        observer: &mut dyn FnMut(&CampaignEvent),
    ) -> Result<CampaignResult, CampaignError> {
        let subject = self.config.subject_path();
        let text = std::fs::read_to_string(&subject)?;
        let lines: Vec<String> = split_lines(&text)
            .into_iter()
            .map(|raw| split_terminator(raw).0.to_string())
            .collect();

        tracing::info!(
            subject = %subject.display(),
            lines = lines.len(),
            rules = self.rules.len(),
            "starting mutation campaign"
        );
        observer(&CampaignEvent::CampaignStarted {
            timestamp_ms: now_timestamp_ms(),
            subject: subject.clone(),
            lines: lines.len(),
            rules: self.rules.len(),
        });

        let mut result = CampaignResult::new(subject);
        let mut backup = None;
        let visited = self.visit(&lines, &mut backup, &mut result, observer);

        // Final restoration outranks whatever stopped the loop.
        let restored = backup.take().map_or(Ok(()), Backup::restore);
        if let Err(err) = &restored {
            tracing::error!(error = %err, "final restore failed");
        }
        restored?;
        visited?;

        tracing::info!(
            total = result.total,
            survived = result.survivors.len(),
            interrupted = result.interrupted,
            "mutation campaign finished"
        );
        Ok(result)
    }

    fn visit(
        &self,
        lines: &[String],
        backup: &mut Option<Backup>,
        result: &mut CampaignResult,
        observer: &mut dyn FnMut(&CampaignEvent),
    ) -> Result<(), CampaignError> {
        let subject = result.subject.clone();

        for (line_index, line) in lines.iter().enumerate() {
            if is_skippable_line(line, &self.config.syntax) {
                result.skipped_lines += 1;
                continue;
            }

            for rule in self.rules {
                if self.interrupted() {
                    self.stop(result, observer);
                    return Ok(());
                }

                // Kept across non-matching pairs: they never write the subject,
                // so the held copy is still byte-identical to a fresh one.
                if backup.is_none() {
                    *backup = Some(Backup::snapshot(&subject)?);
                }

                let Some(attempt) = apply(&subject, rule, line_index, &self.config.syntax)? else {
                    continue;
                };
                if !attempt.matched {
                    continue;
                }

                let number = result.total + 1;
                let original = attempt.original.trim().to_string();
                let mutated = attempt.mutated.trim().to_string();
                tracing::debug!(attempt = number, line = attempt.line, %original, %mutated, "mutation applied");
                observer(&CampaignEvent::MutationApplied {
                    timestamp_ms: now_timestamp_ms(),
                    attempt: number,
                    line: attempt.line,
                    category: rule.category,
                    original: original.clone(),
                    mutated: mutated.clone(),
                });

                let started = Instant::now();
                let run = self.runner.run_tests();
                let duration_ms = started.elapsed().as_millis() as u64;

                // Restore before inspecting the run, so a runner failure never
                // leaves the subject mutated.
                if let Some(held) = backup.take() {
                    held.restore()?;
                }
                let run = run?;

                // A Ctrl-C also reaches the test process, so its verdict is
                // not trustworthy; drop the attempt.
                if self.interrupted() {
                    self.stop(result, observer);
                    return Ok(());
                }

                let outcome = if run.passed() {
                    MutationOutcome::Survived
                } else if run.status == TestStatus::TimedOut {
                    MutationOutcome::Timeout
                } else {
                    MutationOutcome::Killed
                };
                result.total = number;
                if outcome == MutationOutcome::Timeout {
                    result.timed_out += 1;
                }
                if outcome.is_killed() {
                    result.killed += 1;
                } else {
                    result.survivors.push(MutationRecord {
                        line: attempt.line,
                        original,
                        mutated,
                        file: subject.clone(),
                        pattern: rule.pattern.to_string(),
                        replacement: rule.replacement.to_string(),
                        category: rule.category,
                    });
                }

                tracing::debug!(attempt = number, ?outcome, duration_ms, "mutation tested");
                observer(&CampaignEvent::MutationFinished {
                    timestamp_ms: now_timestamp_ms(),
                    attempt: number,
                    line: attempt.line,
                    outcome,
                    exit_code: run.exit_code,
                    duration_ms,
                });
            }
        }

        observer(&CampaignEvent::CampaignCompleted {
            timestamp_ms: now_timestamp_ms(),
            total: result.total,
            survived: result.survivors.len(),
        });
        Ok(())
    }

    fn stop(&self, result: &mut CampaignResult, observer: &mut dyn FnMut(&CampaignEvent)) {
        tracing::warn!(completed = result.total, "mutation campaign interrupted");
        result.interrupted = true;
        observer(&CampaignEvent::CampaignInterrupted {
            timestamp_ms: now_timestamp_ms(),
            completed_attempts: result.total,
        });
    }
}

#[cfg(test)]
mod tests {
    use std::cell::RefCell;
    use std::path::Path;

    use tempfile::tempdir;

    use super::*;
    use crate::mutation::catalog::rule_by_pattern;
    use crate::mutation::metrics::RunMetrics;
    use crate::mutation::runner::TestRunOutcome;
    use crate::mutation::snapshot::backup_path;

    const CALCULATOR: &str = "\
def add(a, b):
    return a + b

# Calculate the quotient
def divide(a, b):
    \"\"\"Divide a by b\"\"\"
    if b == 0:
        raise ValueError(\"Cannot divide by zero\")
    return a / b
";

    /// Reads the subject on every run and lets a predicate decide the verdict.
    struct ScriptedRunner {
        subject: PathBuf,
        original: String,
        survives: fn(&str) -> bool,
        seen: RefCell<Vec<String>>,
    }

    impl ScriptedRunner {
        fn new(subject: &Path, survives: fn(&str) -> bool) -> Self {
            Self {
                subject: subject.to_path_buf(),
                original: std::fs::read_to_string(subject).expect("subject should read"),
                survives,
                seen: RefCell::new(Vec::new()),
            }
        }
    }

    impl TestRunner for ScriptedRunner {
        fn run_tests(&self) -> Result<TestRunOutcome, TestRunnerError> {
            let content = std::fs::read_to_string(&self.subject)?;
            let changed = self
                .original
                .lines()
                .zip(content.lines())
                .filter(|(a, b)| a != b)
                .count();
            assert_eq!(changed, 1, "exactly one line should be mutated per run");
            let saved = std::fs::read_to_string(backup_path(&self.subject))?;
            assert_eq!(saved, self.original, "side file should hold the pristine subject");
            let passed = (self.survives)(&content);
            self.seen.borrow_mut().push(content);
            Ok(TestRunOutcome {
                status: if passed {
                    TestStatus::Passed
                } else {
                    TestStatus::Failed
                },
                exit_code: Some(if passed { 0 } else { 1 }),
                stdout: String::new(),
                stderr: String::new(),
            })
        }

        fn run_with_metrics(&self, _subject_name: &str) -> Result<RunMetrics, TestRunnerError> {
            Ok(RunMetrics::default())
        }
    }

    struct FailingRunner;

    impl TestRunner for FailingRunner {
        fn run_tests(&self) -> Result<TestRunOutcome, TestRunnerError> {
            Err(TestRunnerError::Spawn {
                program: "pytest".to_string(),
                source: std::io::Error::from(std::io::ErrorKind::NotFound),
            })
        }

        fn run_with_metrics(&self, _subject_name: &str) -> Result<RunMetrics, TestRunnerError> {
            Ok(RunMetrics::default())
        }
    }

    /// Deletes the side file mid-run so the restore must fail.
    struct BackupThief {
        subject: PathBuf,
    }

    impl TestRunner for BackupThief {
        fn run_tests(&self) -> Result<TestRunOutcome, TestRunnerError> {
            std::fs::remove_file(backup_path(&self.subject))?;
            Ok(TestRunOutcome {
                status: TestStatus::Failed,
                exit_code: Some(1),
                stdout: String::new(),
                stderr: String::new(),
            })
        }

        fn run_with_metrics(&self, _subject_name: &str) -> Result<RunMetrics, TestRunnerError> {
            Ok(RunMetrics::default())
        }
    }

    fn setup(content: &str) -> (tempfile::TempDir, MutationConfig) {
        let tmp = tempdir().expect("tempdir should be created");
        std::fs::write(tmp.path().join("calculator.py"), content)
            .expect("subject should be written");
        let config = MutationConfig::default().with_project_dir(tmp.path());
        (tmp, config)
    }

    fn assert_pristine(config: &MutationConfig, content: &str) {
        let subject = config.subject_path();
        assert_eq!(
            std::fs::read_to_string(&subject).expect("subject should read"),
            content
        );
        assert!(!backup_path(&subject).exists(), "backup should be consumed");
    }

    struct TimeoutRunner;

    impl TestRunner for TimeoutRunner {
        fn run_tests(&self) -> Result<TestRunOutcome, TestRunnerError> {
            Ok(TestRunOutcome {
                status: TestStatus::TimedOut,
                exit_code: None,
                stdout: String::new(),
                stderr: String::new(),
            })
        }

        fn run_with_metrics(&self, _subject_name: &str) -> Result<RunMetrics, TestRunnerError> {
            Ok(RunMetrics::default())
        }
    }

    #[test]
    fn timed_out_runs_count_as_killed() {
        let (_tmp, config) = setup(CALCULATOR);
        let rules = [rule_by_pattern(r"\+").expect("add rule").clone()];

        let result = Campaign::new(&config, &TimeoutRunner)
            .with_rules(&rules)
            .run(&mut |_| {})
            .expect("campaign should succeed");

        assert_eq!(result.total, 1);
        assert_eq!(result.killed, 1);
        assert_eq!(result.timed_out, 1);
        assert!(result.survivors.is_empty());
        assert_pristine(&config, CALCULATOR);
    }

    #[test]
    fn killed_add_mutation_is_not_a_survivor() {
        let (_tmp, config) = setup(CALCULATOR);
        let runner = ScriptedRunner::new(&config.subject_path(), |c| !c.contains("a - b"));
        let rules = [rule_by_pattern(r"\+").expect("add rule").clone()];

        let result = Campaign::new(&config, &runner)
            .with_rules(&rules)
            .run(&mut |_| {})
            .expect("campaign should succeed");

        assert_eq!(result.total, 1);
        assert_eq!(result.killed, 1);
        assert!(result.survivors.is_empty());
        assert_eq!(result.mutation_score(), 100.0);
        assert!(runner.seen.borrow()[0].contains("    return a - b\n"));
        assert_pristine(&config, CALCULATOR);
    }

    #[test]
    fn passing_runs_are_recorded_as_survivors() {
        let (_tmp, config) = setup(CALCULATOR);
        let runner = ScriptedRunner::new(&config.subject_path(), |c| c.contains("pass\n"));
        let rules = [
            rule_by_pattern(r"\+").expect("add rule").clone(),
            rule_by_pattern("raise (.+)").expect("raise rule").clone(),
        ];

        let result = Campaign::new(&config, &runner)
            .with_rules(&rules)
            .run(&mut |_| {})
            .expect("campaign should succeed");

        assert_eq!(result.total, 2);
        assert_eq!(result.survivors.len(), 1);
        let survivor = &result.survivors[0];
        assert_eq!(survivor.line, 8);
        assert_eq!(survivor.original, "raise ValueError(\"Cannot divide by zero\")");
        assert_eq!(survivor.mutated, "pass");
        assert_eq!(survivor.category, MutationCategory::RaiseToPass);
        assert_eq!(survivor.file, config.subject_path());
        assert_eq!(result.mutation_score(), 50.0);
        assert_pristine(&config, CALCULATOR);
    }

    #[test]
    fn total_counts_matching_pairs_over_non_skipped_lines() {
        let (_tmp, config) = setup(CALCULATOR);
        let runner = ScriptedRunner::new(&config.subject_path(), |_| false);

        let mut applied = 0;
        let result = Campaign::new(&config, &runner)
            .run(&mut |event| {
                if matches!(event, CampaignEvent::MutationApplied { .. }) {
                    applied += 1;
                }
            })
            .expect("campaign should succeed");

        let expected: usize = CALCULATOR
            .lines()
            .filter(|line| !is_skippable_line(line, &config.syntax))
            .map(|line| {
                catalog()
                    .iter()
                    .filter(|rule| rule.apply_once(line).is_some_and(|m| m != line))
                    .count()
            })
            .sum();

        assert_eq!(result.total, expected);
        assert_eq!(applied, expected);
        assert_eq!(result.killed, expected);
        assert_eq!(result.skipped_lines, 2);
        assert!(result.survivors.len() <= result.total);
        assert!(!result.interrupted);
        assert_pristine(&config, CALCULATOR);
    }

    #[test]
    fn comment_only_subject_yields_no_attempts() {
        let content = "# Calculate factorial\n    \"\"\"Docstring only\"\"\"\n";
        let (_tmp, config) = setup(content);
        let runner = FailingRunner;

        let result = Campaign::new(&config, &runner)
            .run(&mut |_| {})
            .expect("campaign should succeed without running tests");

        assert_eq!(result.total, 0);
        assert_eq!(result.skipped_lines, 2);
        assert_eq!(result.mutation_score(), 0.0);
        assert_pristine(&config, content);
    }

    #[test]
    fn runner_failure_aborts_and_restores_subject() {
        let (_tmp, config) = setup(CALCULATOR);
        let err = Campaign::new(&config, &FailingRunner)
            .run(&mut |_| {})
            .unwrap_err();
        assert!(matches!(err, CampaignError::Runner(TestRunnerError::Spawn { .. })));
        assert_pristine(&config, CALCULATOR);
    }

    #[test]
    fn restore_failure_is_fatal() {
        let (_tmp, config) = setup(CALCULATOR);
        let runner = BackupThief {
            subject: config.subject_path(),
        };
        let err = Campaign::new(&config, &runner)
            .run(&mut |_| {})
            .unwrap_err();
        assert!(matches!(
            err,
            CampaignError::Snapshot(SnapshotError::Restore { .. })
        ));
    }

    #[test]
    fn interrupt_stops_before_next_attempt_and_restores() {
        let (_tmp, config) = setup(CALCULATOR);
        let runner = ScriptedRunner::new(&config.subject_path(), |_| false);
        let flag = Arc::new(AtomicBool::new(true));

        let mut events = Vec::new();
        let result = Campaign::new(&config, &runner)
            .with_interrupt_flag(Arc::clone(&flag))
            .run(&mut |event| events.push(event.clone()))
            .expect("interrupted campaign should still return a result");

        assert!(result.interrupted);
        assert_eq!(result.total, 0);
        assert!(runner.seen.borrow().is_empty());
        assert!(matches!(
            events.last(),
            Some(CampaignEvent::CampaignInterrupted {
                completed_attempts: 0,
                ..
            })
        ));
        assert_pristine(&config, CALCULATOR);
    }

    #[test]
    fn events_bracket_each_attempt() {
        let (_tmp, config) = setup(CALCULATOR);
        let runner = ScriptedRunner::new(&config.subject_path(), |_| true);
        let rules = [rule_by_pattern("==").expect("eq rule").clone()];

        let mut events = Vec::new();
        Campaign::new(&config, &runner)
            .with_rules(&rules)
            .run(&mut |event| events.push(event.clone()))
            .expect("campaign should succeed");

        assert_eq!(events.len(), 4);
        assert!(matches!(events[0], CampaignEvent::CampaignStarted { rules: 1, .. }));
        match &events[1] {
            CampaignEvent::MutationApplied {
                attempt,
                line,
                original,
                mutated,
                ..
            } => {
                assert_eq!((*attempt, *line), (1, 7));
                assert_eq!(original, "if b == 0:");
                assert_eq!(mutated, "if b != 0:");
            }
            other => panic!("expected mutation_applied, got {other:?}"),
        }
        assert!(matches!(
            events[2],
            CampaignEvent::MutationFinished {
                outcome: MutationOutcome::Survived,
                exit_code: Some(0),
                ..
            }
        ));
        assert!(matches!(
            events[3],
            CampaignEvent::CampaignCompleted {
                total: 1,
                survived: 1,
                ..
            }
        ));
    }
}
