use serde::Serialize;

use super::campaign::{CampaignResult, MutationRecord};

/// Supported output formats for campaign summaries.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum ReportFormat {
    /// Plain text console summary.
    #[default]
    Text,
    /// Markdown summary.
    Markdown,
    /// JSON summary with all survivors inline.
    Json,
}

/// Per-survivor report entry.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct SurvivorReport {
    /// Source file path.
    pub source_file: String,
    /// Source line number.
    pub source_line: usize,
    /// Mutation category.
    pub category: String,
    /// Rule pattern.
    pub pattern: String,
    /// Original code.
    pub original_code: String,
    /// Mutated code.
    pub mutated_code: String,
}

impl From<&MutationRecord> for SurvivorReport {
    fn from(record: &MutationRecord) -> Self {
        Self {
            source_file: record.file.display().to_string(),
            source_line: record.line,
            category: record.category.to_string(),
            pattern: record.pattern.clone(),
            original_code: record.original.clone(),
            mutated_code: record.mutated.clone(),
        }
    }
}

/// Aggregated campaign counts.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct CampaignSummary {
    /// Attempted mutations.
    pub total: usize,
    /// Killed mutations (timeouts included).
    pub killed: usize,
    /// Surviving mutations.
    pub survived: usize,
    /// Killed by timeout.
    pub timeout: usize,
    /// Comment/docstring lines skipped.
    pub skipped_lines: usize,
    /// Mutation score, percentage.
    pub mutation_score: f64,
}

impl CampaignSummary {
    /// Build summary from a campaign result.
    pub fn from_result(result: &CampaignResult) -> Self {
        Self {
            total: result.total,
            killed: result.killed,
            survived: result.survivors.len(),
            timeout: result.timed_out,
            skipped_lines: result.skipped_lines,
            mutation_score: result.mutation_score(),
        }
    }
}

/// Render a campaign summary in the requested format.
pub fn render_summary(result: &CampaignResult, format: ReportFormat) -> String {
    let summary = CampaignSummary::from_result(result);
    let subject = result.subject.display().to_string();

    match format {
        ReportFormat::Text => {
            let mut out = format!("{}\n", "=".repeat(50));
            out.push_str(&format!("Mutation testing summary for {subject}:\n"));
            out.push_str(&format!("Total mutations: {}\n", summary.total));
            out.push_str(&format!("Surviving mutations: {}\n", summary.survived));
            out.push_str(&format!("Mutation score: {:.2}%\n", summary.mutation_score));
            if result.interrupted {
                out.push_str("Campaign interrupted before all mutations were tried.\n");
            }

            if !result.survivors.is_empty() {
                out.push_str("\nSurviving mutations that need additional test cases:\n");
                for (i, m) in result.survivors.iter().enumerate() {
                    out.push_str(&format!(
                        "{}. Line {}: {} -> {}\n",
                        i + 1,
                        m.line,
                        m.original,
                        m.mutated
                    ));
                }
            }
            out
        }
        ReportFormat::Markdown => {
            let mut out = format!("# Mutation Campaign {subject}\n\n");
            out.push_str(&format!("- interrupted: {}\n\n", result.interrupted));

            out.push_str("## Summary\n\n| metric | count |\n|---|---:|\n");
            out.push_str(&format!("| total | {} |\n", summary.total));
            out.push_str(&format!("| killed | {} |\n", summary.killed));
            out.push_str(&format!("| survived | {} |\n", summary.survived));
            out.push_str(&format!("| timeout | {} |\n", summary.timeout));
            out.push_str(&format!("| skipped lines | {} |\n", summary.skipped_lines));
            out.push_str(&format!(
                "| mutation score | {:.2}% |\n",
                summary.mutation_score
            ));

            if !result.survivors.is_empty() {
                out.push_str("\n## Survivors\n\n");
                for m in result.survivors.iter().map(SurvivorReport::from) {
                    out.push_str(&format!("### {}:{}\n\n", m.source_file, m.source_line));
                    out.push_str(&format!("- **type**: {}\n", m.category));
                    out.push_str(&format!("- original: `{}`\n", m.original_code));
                    out.push_str(&format!("- mutated: `{}`\n\n", m.mutated_code));
                }
            }
            out
        }
        ReportFormat::Json => {
            let survivors: Vec<SurvivorReport> =
                result.survivors.iter().map(SurvivorReport::from).collect();
            serde_json::to_string_pretty(&serde_json::json!({
                "subject": subject,
                "interrupted": result.interrupted,
                "summary": summary,
                "survivors": survivors,
            }))
            .expect("report JSON should serialize")
        }
    }
}
