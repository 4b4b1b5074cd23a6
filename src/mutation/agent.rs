//! One improvement cycle: measure coverage, run a campaign, synthesize tests
//! for survivors, and summarize the result in the line-oriented report
//! grammar the iteration driver scrapes.

use std::sync::Arc;
use std::sync::atomic::AtomicBool;

use thiserror::Error;

use super::campaign::{Campaign, CampaignError, CampaignResult};
use super::config::MutationConfig;
use super::events::CampaignEvent;
use super::metrics::{RunMetrics, SUCCESS_MARKER};
use super::runner::TestRunner;
use super::synthesizer::{SynthesisError, improve_tests};

/// Agent cycle errors.
#[derive(Debug, Error)]
pub enum AgentError {
    /// Campaign aborted.
    #[error(transparent)]
    Campaign(#[from] CampaignError),
    /// Tests could not be generated or appended.
    #[error(transparent)]
    Synthesis(#[from] SynthesisError),
}

/// Outcome of one agent cycle.
#[derive(Debug, Clone, PartialEq)]
pub struct AgentReport {
    /// Subject module name, e.g. `calculator`.
    pub module: String,
    /// Subject file name, e.g. `calculator.py`.
    pub subject_name: String,
    /// Coverage target for the subject.
    pub target_coverage: f64,
    /// Metrics scraped from the coverage run.
    pub metrics: RunMetrics,
    /// Campaign outcome.
    pub campaign: CampaignResult,
    /// Names of the tests appended this cycle.
    pub generated: Vec<String>,
}

impl AgentReport {
    /// True once the subject meets the coverage target and every attempted
    /// mutation was killed.
    pub fn success(&self) -> bool {
        !self.campaign.interrupted
            && self.campaign.all_killed()
            && self
                .metrics
                .subject_coverage
                .is_some_and(|c| c >= self.target_coverage)
    }

    /// Render the textual report.
    pub fn render(&self) -> String {
        let total = self.campaign.total;
        let killed = self.campaign.killed;

        let mut out = if self.success() {
            format!(
                "{SUCCESS_MARKER} Achieved {} coverage for {} module and killed all {total} mutations.\n\n",
                percent(self.metrics.subject_coverage),
                self.module
            )
        } else {
            format!(
                "Progress: {} overall coverage, {} {} module coverage, {killed}/{total} mutations killed.\n\n",
                percent(self.metrics.overall_coverage),
                percent(self.metrics.subject_coverage),
                self.module
            )
        };

        out.push_str("Coverage details:\n");
        if self.metrics.overall_coverage.is_none() && self.metrics.subject_coverage.is_none() {
            out.push_str("Failed to extract coverage information.\n");
        } else {
            out.push_str(&format!(
                "Current test coverage: {}\n",
                percent(self.metrics.overall_coverage)
            ));
            out.push_str(&format!(
                "Coverage of {}: {}\n",
                self.subject_name,
                percent(self.metrics.subject_coverage)
            ));
        }

        out.push_str("\nMutation details:\n");
        out.push_str(&format!("Total mutations: {total}\n"));
        out.push_str(&format!("Killed mutations: {killed}\n"));
        out.push_str(&format!(
            "Mutation score: {:.2}%\n",
            self.campaign.mutation_score()
        ));
        if self.campaign.interrupted {
            out.push_str("Campaign interrupted before all mutations were tried.\n");
        }
        for (i, m) in self.campaign.survivors.iter().enumerate() {
            out.push_str(&format!(
                "{}. Line {}: {} -> {}\n",
                i + 1,
                m.line,
                m.original,
                m.mutated
            ));
        }

        if self.success() {
            return out;
        }

        out.push_str("\nImprovements made:\n");
        if self.campaign.survivors.is_empty() {
            out.push_str("No surviving mutations to fix.\n");
        } else {
            out.push_str(&format!(
                "Improved {} tests based on surviving mutations.\n",
                self.generated.len()
            ));
            for name in &self.generated {
                out.push_str(&format!("- {name}\n"));
            }
        }
        out.push_str("\nRun again to continue improving test coverage.\n");
        out
    }
}

fn percent(value: Option<f64>) -> String {
    match value {
        Some(v) => format!("{v:.1}%"),
        None => "unknown".to_string(),
    }
}

/// Runs improvement cycles against one subject.
pub struct Agent<'a> {
    config: &'a MutationConfig,
    runner: &'a dyn TestRunner,
    interrupt: Option<Arc<AtomicBool>>,
}

impl<'a> Agent<'a> {
    /// Create an agent.
    pub fn new(config: &'a MutationConfig, runner: &'a dyn TestRunner) -> Self {
        Self {
            config,
            runner,
            interrupt: None,
        }
    }

    /// Forward an interrupt flag to the campaign.
    pub fn with_interrupt_flag(mut self, flag: Arc<AtomicBool>) -> Self {
        self.interrupt = Some(flag);
        self
    }

    /// Run one full cycle.
    pub fn run_cycle(
        &self,
        observer: &mut dyn FnMut(&CampaignEvent),
    ) -> Result<AgentReport, AgentError> {
        let subject_name = self.config.subject_name();

        // Coverage failures degrade to unknown metrics.
        let metrics = match self.runner.run_with_metrics(&subject_name) {
            Ok(metrics) => metrics,
            Err(err) => {
                tracing::warn!(error = %err, "coverage run failed");
                RunMetrics::default()
            }
        };

        let mut campaign = Campaign::new(self.config, self.runner);
        if let Some(flag) = &self.interrupt {
            campaign = campaign.with_interrupt_flag(Arc::clone(flag));
        }
        let result = campaign.run(observer)?;

        let generated = if result.interrupted {
            Vec::new()
        } else {
            improve_tests(self.config, &result.survivors, self.config.max_improvements)?
        };

        Ok(AgentReport {
            module: self.config.module_name(),
            subject_name,
            target_coverage: self.config.target_coverage,
            metrics,
            campaign: result,
            generated: generated.into_iter().map(|t| t.name).collect(),
        })
    }
}
