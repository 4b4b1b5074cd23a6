//! Line-granular mutation testing with test synthesis.

pub mod agent;
pub mod applicator;
pub mod campaign;
pub mod catalog;
pub mod config;
pub mod driver;
pub mod events;
pub mod metrics;
/// Human-readable and machine-friendly campaign summaries.
pub mod report;
pub mod runner;
pub mod snapshot;
pub mod synthesizer;

pub use agent::{Agent, AgentError, AgentReport};
pub use applicator::{ApplyError, MutationAttempt, SourceSyntax, apply, is_skippable_line};
pub use campaign::{
    Campaign, CampaignError, CampaignResult, MutationRecord, install_interrupt_handler,
};
pub use catalog::{MutationCategory, MutationRule, catalog, rule_by_pattern};
pub use config::MutationConfig;
pub use driver::{DriverOutcome, IterationDriver, extract_coverage};
pub use events::{CampaignEvent, MutationOutcome, append_event, read_events};
pub use metrics::RunMetrics;
pub use report::{CampaignSummary, ReportFormat, render_summary};
pub use runner::{CommandTestRunner, TestRunOutcome, TestRunner, TestRunnerError, TestStatus};
pub use snapshot::{Backup, SnapshotError};
pub use synthesizer::{
    GeneratedTest, SynthesisError, Synthesizer, append_tests, improve_tests,
};
