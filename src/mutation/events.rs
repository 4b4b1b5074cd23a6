//! Campaign event model and append-only JSONL log.

use std::fs::OpenOptions;
use std::io::Write;
use std::path::{Path, PathBuf};

use serde::{Deserialize, Serialize};

use super::catalog::MutationCategory;

/// Classification of one applied mutation.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum MutationOutcome {
    /// Tests failed or errored.
    Killed,
    /// Tests passed.
    Survived,
    /// Tests were killed after the timeout; counted as killed.
    Timeout,
}

impl MutationOutcome {
    /// True for outcomes that count towards the mutation score.
    pub fn is_killed(&self) -> bool {
        matches!(self, Self::Killed | Self::Timeout)
    }
}

/// Event emitted while a campaign runs.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "event", rename_all = "snake_case")]
pub enum CampaignEvent {
    /// Campaign began.
    CampaignStarted {
        /// Unix timestamp millis.
        timestamp_ms: i64,
        /// Subject path.
        subject: PathBuf,
        /// Number of lines in the subject.
        lines: usize,
        /// Number of catalog rules.
        rules: usize,
    },
    /// A mutation was written to the subject and tests are about to run.
    MutationApplied {
        /// Unix timestamp millis.
        timestamp_ms: i64,
        /// 1-based attempt number.
        attempt: usize,
        /// 1-based line number.
        line: usize,
        /// Rule category.
        category: MutationCategory,
        /// Trimmed original line.
        original: String,
        /// Trimmed mutated line.
        mutated: String,
    },
    /// Tests finished and the subject was restored.
    MutationFinished {
        /// Unix timestamp millis.
        timestamp_ms: i64,
        /// 1-based attempt number.
        attempt: usize,
        /// 1-based line number.
        line: usize,
        /// Classification.
        outcome: MutationOutcome,
        /// Test process exit code.
        #[serde(default)]
        exit_code: Option<i32>,
        /// Test runtime in milliseconds.
        duration_ms: u64,
    },
    /// Campaign stopped early on an interrupt.
    CampaignInterrupted {
        /// Unix timestamp millis.
        timestamp_ms: i64,
        /// Attempts completed before the stop.
        completed_attempts: usize,
    },
    /// Campaign visited every (line, rule) pair.
    CampaignCompleted {
        /// Unix timestamp millis.
        timestamp_ms: i64,
        /// Attempted mutations.
        total: usize,
        /// Surviving mutations.
        survived: usize,
    },
}

/// Current unix timestamp in milliseconds.
pub fn now_timestamp_ms() -> i64 {
    let now = std::time::SystemTime::now();
    let duration = now
        .duration_since(std::time::UNIX_EPOCH)
        .unwrap_or_else(|_| std::time::Duration::from_secs(0));
    (duration.as_secs() as i64)
        .saturating_mul(1000)
        .saturating_add(duration.subsec_millis() as i64)
}

/// Append one event as a JSONL line.
pub fn append_event(events_path: &Path, event: &CampaignEvent) -> std::io::Result<()> {
    let mut file = OpenOptions::new()
        .create(true)
        .append(true)
        .open(events_path)?;
    let json = serde_json::to_string(event).map_err(std::io::Error::other)?;
    file.write_all(json.as_bytes())?;
    file.write_all(b"\n")?;
    file.flush()?;
    Ok(())
}

/// Read every well-formed event back from a JSONL log; malformed lines are skipped.
pub fn read_events(events_path: &Path) -> std::io::Result<Vec<CampaignEvent>> {
    let text = std::fs::read_to_string(events_path)?;
    Ok(text
        .lines()
        .filter(|line| !line.trim().is_empty())
        .filter_map(|line| serde_json::from_str(line).ok())
        .collect())
}
