//! Test-case synthesis for surviving mutations.
//!
//! Bodies are canned per [`MutationCategory`]: literal arguments chosen so the
//! original operator and the mutated one disagree. Categories without a
//! canned body get a structurally valid placeholder.

use std::collections::HashMap;
use std::fs::OpenOptions;
use std::io::Write;
use std::path::Path;
use std::sync::LazyLock;

use regex::Regex;
use thiserror::Error;

use super::applicator::SourceSyntax;
use super::campaign::MutationRecord;
use super::catalog::MutationCategory;
use super::config::MutationConfig;

static GENERATED_NAME: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"def test_(\w+)_mutation_(\d+)\(").expect("valid regex"));

/// Banner written before every appended batch.
pub const GENERATED_BANNER: &str = "# Automatically generated tests for catching mutations";

/// Synthesizer failures.
#[derive(Debug, Error)]
pub enum SynthesisError {
    /// Configured function header pattern does not compile.
    #[error("invalid function header pattern `{pattern}`: {source}")]
    InvalidHeader {
        /// Offending pattern.
        pattern: String,
        /// Regex compile error.
        source: regex::Error,
    },
    /// Test file read or append failure.
    #[error("io error: {0}")]
    Io(#[from] std::io::Error),
}

/// One generated test function.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct GeneratedTest {
    /// Test function name, `test_<func>_mutation_<n>`.
    pub name: String,
    /// Function under test.
    pub function: String,
    /// Category the body was chosen for.
    pub category: MutationCategory,
    /// Full source text, starting with a newline.
    pub text: String,
}

/// Turns survivor records into test functions with unique names.
#[derive(Debug)]
pub struct Synthesizer {
    header: Regex,
    last_suffix: HashMap<String, u64>,
}

impl Synthesizer {
    /// Build a synthesizer that avoids every generated name already in
    /// `existing_tests`.
    pub fn new(syntax: &SourceSyntax, existing_tests: &str) -> Result<Self, SynthesisError> {
        let header = Regex::new(&syntax.function_header).map_err(|source| {
            SynthesisError::InvalidHeader {
                pattern: syntax.function_header.clone(),
                source,
            }
        })?;
        let mut last_suffix: HashMap<String, u64> = HashMap::new();
        for caps in GENERATED_NAME.captures_iter(existing_tests) {
            let Ok(n) = caps[2].parse::<u64>() else {
                continue;
            };
            let slot = last_suffix.entry(caps[1].to_string()).or_default();
            *slot = (*slot).max(n);
        }

        Ok(Self {
            header,
            last_suffix,
        })
    }

    /// Name of the function whose header is the nearest one at or above
    /// `line` (1-based).
    pub fn enclosing_function(&self, subject_source: &str, line: usize) -> Option<String> {
        subject_source
            .lines()
            .take(line)
            .collect::<Vec<_>>()
            .into_iter()
            .rev()
            .find_map(|candidate| {
                self.header
                    .captures(candidate)
                    .and_then(|caps| caps.get(1))
                    .map(|m| m.as_str().to_string())
            })
    }

    /// Generate a test for `record`, or `None` if the mutated line is not
    /// inside any function.
    pub fn synthesize(
        &mut self,
        record: &MutationRecord,
        subject_source: &str,
    ) -> Option<GeneratedTest> {
        let Some(function) = self.enclosing_function(subject_source, record.line) else {
            tracing::debug!(line = record.line, "no enclosing function, skipping survivor");
            return None;
        };

        let suffix = self.last_suffix.entry(function.clone()).or_default();
        *suffix += 1;
        let name = format!("test_{function}_mutation_{suffix}");

        let docstring = format!(
            "Test to catch mutation: {} -> {}",
            docstring_escape(&record.original),
            docstring_escape(&record.mutated)
        );
        let body = canned_body(record, &function);
        let text = format!("\ndef {name}():\n    \"\"\"{docstring}\"\"\"\n{body}");

        Some(GeneratedTest {
            name,
            function,
            category: record.category,
            text,
        })
    }
}

fn canned_body(record: &MutationRecord, f: &str) -> String {
    match record.category {
        MutationCategory::AddToSub => format!(
            "    # Test that addition doesn't become subtraction\n    assert {f}(5, 3) == 8\n    assert {f}(5, 3) != 2\n"
        ),
        MutationCategory::SubToAdd => format!(
            "    # Test that subtraction doesn't become addition\n    assert {f}(5, 3) == 2\n    assert {f}(5, 3) != 8\n"
        ),
        MutationCategory::MulToDiv => format!(
            "    # Test that multiplication doesn't become division\n    assert {f}(10, 2) == 20\n    assert {f}(10, 2) != 5\n"
        ),
        MutationCategory::DivToMul => format!(
            "    # Test that division doesn't become multiplication\n    assert {f}(10, 2) == 5\n    assert {f}(10, 2) != 20\n"
        ),
        MutationCategory::ModToDiv => format!(
            "    # Test that modulo doesn't become division\n    assert {f}(10, 3) == 1\n    assert {f}(10, 3) != 3.33\n"
        ),
        MutationCategory::EqToNe => format!(
            "    # Test that equality check doesn't become inequality\n    assert {f}(5, 5) == True\n    assert {f}(5, 6) == False\n"
        ),
        MutationCategory::NeToEq => format!(
            "    # Test that inequality check doesn't become equality\n    assert {f}(5, 6) == True\n    assert {f}(5, 5) == False\n"
        ),
        MutationCategory::RaiseToPass => format!(
            "    # Test that exception is properly raised\n    with pytest.raises(ValueError):\n        {f}(10, 0)\n"
        ),
        _ => format!(
            "    # Add a specific test for this mutation\n    # Original: {}\n    # Mutated: {}\n    pass\n",
            single_line(&record.original),
            single_line(&record.mutated)
        ),
    }
}

// Keeps arbitrary source text from closing the docstring early.
fn docstring_escape(text: &str) -> String {
    single_line(text).replace('\\', "\\\\").replace('"', "\\\"")
}

fn single_line(text: &str) -> String {
    text.replace(['\r', '\n'], " ")
}

/// Append `tests` under the generated-tests banner. Existing content is never
/// rewritten; an empty batch leaves the file untouched.
pub fn append_tests(test_file: &Path, tests: &[GeneratedTest]) -> Result<(), SynthesisError> {
    if tests.is_empty() {
        return Ok(());
    }

    let mut out = format!("\n{GENERATED_BANNER}\n");
    for test in tests {
        out.push_str(&test.text);
    }
    out.push('\n');

    let mut file = OpenOptions::new()
        .create(true)
        .append(true)
        .open(test_file)?;
    file.write_all(out.as_bytes())?;
    file.flush()?;

    tracing::info!(
        count = tests.len(),
        test_file = %test_file.display(),
        "appended generated tests"
    );
    Ok(())
}

/// Generate tests for at most `limit` survivors and append them to the
/// configured test file. Returns the tests that were written.
pub fn improve_tests(
    config: &MutationConfig,
    survivors: &[MutationRecord],
    limit: usize,
) -> Result<Vec<GeneratedTest>, SynthesisError> {
    if survivors.is_empty() || limit == 0 {
        return Ok(Vec::new());
    }

    let subject_source = std::fs::read_to_string(config.subject_path())?;
    let test_path = config.test_path();
    let existing = match std::fs::read_to_string(&test_path) {
        Ok(text) => text,
        Err(err) if err.kind() == std::io::ErrorKind::NotFound => String::new(),
        Err(err) => return Err(err.into()),
    };

    let mut synth = Synthesizer::new(&config.syntax, &existing)?;
    let tests: Vec<GeneratedTest> = survivors
        .iter()
        .take(limit)
        .filter_map(|record| synth.synthesize(record, &subject_source))
        .collect();
    append_tests(&test_path, &tests)?;
    Ok(tests)
}
