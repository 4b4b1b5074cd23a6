//! Metric scraping from test tool output and agent report text.
//!
//! Every parser here returns `None` when its anchor phrase is absent; output
//! format drift degrades to unknown metrics instead of failing.

use std::sync::LazyLock;

use regex::Regex;
use serde::{Deserialize, Serialize};

static TOTAL_COVERAGE: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"TOTAL\s+\d+\s+\d+\s+(\d+(?:\.\d+)?)%").expect("valid regex"));
static MUTATIONS_GENERATED: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"(\d+) mutations were generated").expect("valid regex"));
static MUTATIONS_KILLED: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"(\d+) of them were killed").expect("valid regex"));
static MODULE_COVERAGE: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(r"(\d+(?:\.\d+)?)% [\w.-]+ module coverage").expect("valid regex")
});
static PROGRESS: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"Progress: (\d+(?:\.\d+)?)%").expect("valid regex"));
static ACHIEVED_COVERAGE: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(r"Achieved (\d+(?:\.\d+)?)% coverage for").expect("valid regex")
});
static KILLED_FRACTION: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"(\d+)/(\d+) mutations killed").expect("valid regex"));

/// Marker the agent prints when the target is reached.
pub const SUCCESS_MARKER: &str = "SUCCESS!";

/// Metrics scraped from one test tool run.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct RunMetrics {
    /// Overall coverage percentage (`TOTAL` row).
    pub overall_coverage: Option<f64>,
    /// Coverage percentage of the subject file's row.
    pub subject_coverage: Option<f64>,
    /// Mutations killed, from a mutation tool report.
    pub mutations_killed: Option<u64>,
    /// Mutations generated, from a mutation tool report.
    pub mutations_total: Option<u64>,
}

impl RunMetrics {
    /// Scrape coverage and mutation counts from `text`.
    ///
    /// `subject_name` is the file name as it appears in the coverage table,
    /// e.g. `calculator.py`.
    pub fn scrape(text: &str, subject_name: &str) -> Self {
        Self {
            overall_coverage: capture_f64(&TOTAL_COVERAGE, text),
            subject_coverage: subject_coverage(text, subject_name),
            mutations_killed: capture_u64(&MUTATIONS_KILLED, text),
            mutations_total: capture_u64(&MUTATIONS_GENERATED, text),
        }
    }

    /// True if no field could be scraped.
    pub fn is_empty(&self) -> bool {
        self.overall_coverage.is_none()
            && self.subject_coverage.is_none()
            && self.mutations_killed.is_none()
            && self.mutations_total.is_none()
    }
}

fn capture_f64(re: &Regex, text: &str) -> Option<f64> {
    re.captures(text)?.get(1)?.as_str().parse().ok()
}

fn capture_u64(re: &Regex, text: &str) -> Option<u64> {
    re.captures(text)?.get(1)?.as_str().parse().ok()
}

fn subject_coverage(text: &str, subject_name: &str) -> Option<f64> {
    if subject_name.is_empty() {
        return None;
    }
    let pattern = format!(
        r"{}\s+\d+\s+\d+\s+(\d+(?:\.\d+)?)%",
        regex::escape(subject_name)
    );
    let re = Regex::new(&pattern).ok()?;
    capture_f64(&re, text)
}

/// `NN% <module> module coverage` from an agent report.
pub fn parse_module_coverage(text: &str) -> Option<f64> {
    capture_f64(&MODULE_COVERAGE, text)
}

/// `Achieved NN% coverage for` from a success report.
pub fn parse_achieved_coverage(text: &str) -> Option<f64> {
    capture_f64(&ACHIEVED_COVERAGE, text)
}

/// `Progress: NN%` from an agent report.
pub fn parse_progress(text: &str) -> Option<f64> {
    capture_f64(&PROGRESS, text)
}

/// `K/N mutations killed` from an agent report.
pub fn parse_killed_fraction(text: &str) -> Option<(u64, u64)> {
    let caps = KILLED_FRACTION.captures(text)?;
    let killed = caps.get(1)?.as_str().parse().ok()?;
    let total = caps.get(2)?.as_str().parse().ok()?;
    Some((killed, total))
}

/// True if the agent report carries the success marker.
pub fn has_success_marker(text: &str) -> bool {
    text.contains(SUCCESS_MARKER)
}

#[cfg(test)]
mod tests {
    use super::*;

    const COVERAGE_REPORT: &str = "\
============================= test session starts ==============================
collected 31 items

test_calculator.py ...............................                       [100%]

---------- coverage: platform linux, python 3.11.4-final-0 -----------
Name                 Stmts   Miss  Cover
----------------------------------------
calculator.py           41      3    93%
test_calculator.py     180      0   100%
----------------------------------------
TOTAL                  221      3    99%
";

    #[test]
    fn scrapes_coverage_table_rows() {
        let metrics = RunMetrics::scrape(COVERAGE_REPORT, "calculator.py");
        assert_eq!(metrics.overall_coverage, Some(99.0));
        assert_eq!(metrics.subject_coverage, Some(93.0));
        assert_eq!(metrics.mutations_killed, None);
        assert_eq!(metrics.mutations_total, None);
        assert!(!metrics.is_empty());
    }

    #[test]
    fn subject_name_is_matched_literally() {
        // `.` in the file name must not match the `_` of another row.
        let text = "calculatorXpy   10   0   100%\ncalculator.py   10   5   50%\n";
        let metrics = RunMetrics::scrape(text, "calculator.py");
        assert_eq!(metrics.subject_coverage, Some(50.0));
    }

    #[test]
    fn scrapes_mutation_tool_summary() {
        let text = "- Mutation testing starting -\n42 mutations were generated\n37 of them were killed\n";
        let metrics = RunMetrics::scrape(text, "calculator.py");
        assert_eq!(metrics.mutations_total, Some(42));
        assert_eq!(metrics.mutations_killed, Some(37));
    }

    #[test]
    fn missing_anchors_leave_fields_unknown() {
        let metrics = RunMetrics::scrape("ERROR: usage: pytest [options]\n", "calculator.py");
        assert!(metrics.is_empty());
        assert_eq!(RunMetrics::scrape("TOTAL 1 0 100%", "").subject_coverage, None);
    }

    #[test]
    fn parses_agent_report_grammar() {
        let progress = "Progress: 97.5% overall coverage, 93.0% calculator module coverage, 40/44 mutations killed.\n";
        assert_eq!(parse_module_coverage(progress), Some(93.0));
        assert_eq!(parse_progress(progress), Some(97.5));
        assert_eq!(parse_killed_fraction(progress), Some((40, 44)));
        assert!(!has_success_marker(progress));

        let success = "SUCCESS! Achieved 100.0% coverage for calculator module and killed all 44 mutations.";
        assert!(has_success_marker(success));
        assert_eq!(parse_progress(success), None);
        assert_eq!(parse_module_coverage(success), None);
        assert_eq!(parse_achieved_coverage(success), Some(100.0));
        assert_eq!(parse_achieved_coverage(progress), None);
        assert_eq!(parse_module_coverage("Progress: unknown overall coverage"), None);
    }
}
