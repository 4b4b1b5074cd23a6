//! Single-line mutation application.

use std::path::{Path, PathBuf};

use serde::{Deserialize, Serialize};
use thiserror::Error;

use super::catalog::MutationRule;

/// Line-scanning rules for the subject language.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct SourceSyntax {
    /// Prefixes of comment lines (after trimming).
    pub comment_markers: Vec<String>,
    /// Prefixes of block-string/docstring lines (after trimming).
    pub block_string_delimiters: Vec<String>,
    /// Regex matching a function header; capture group 1 is the name.
    pub function_header: String,
}

impl Default for SourceSyntax {
    fn default() -> Self {
        Self {
            comment_markers: vec!["#".to_string()],
            block_string_delimiters: vec!["\"\"\"".to_string()],
            function_header: r"^def (\w+)\(".to_string(),
        }
    }
}

/// True for lines that are never mutated (comments and docstrings).
pub fn is_skippable_line(line: &str, syntax: &SourceSyntax) -> bool {
    let trimmed = line.trim();
    syntax
        .comment_markers
        .iter()
        .chain(syntax.block_string_delimiters.iter())
        .any(|marker| !marker.is_empty() && trimmed.starts_with(marker.as_str()))
}

/// Outcome of trying one rule on one line.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct MutationAttempt<'r> {
    /// Mutated file.
    pub file: PathBuf,
    /// 1-based line number.
    pub line: usize,
    /// Rule that was tried.
    pub rule: &'r MutationRule,
    /// Line text before the mutation, without its line ending.
    pub original: String,
    /// Line text after the mutation (equal to `original` if unmatched).
    pub mutated: String,
    /// Whether the pattern occurred and the file was rewritten.
    pub matched: bool,
}

/// Application failures.
#[derive(Debug, Error)]
pub enum ApplyError {
    /// Requested line does not exist.
    #[error("line index {line_index} out of range for {path} ({line_count} lines)")]
    LineOutOfRange {
        /// Subject path.
        path: PathBuf,
        /// Requested 0-based index.
        line_index: usize,
        /// Number of lines in the file.
        line_count: usize,
    },
    /// Read or write failure.
    #[error("io error: {0}")]
    Io(#[from] std::io::Error),
}

/// Split text into lines, each keeping its original terminator.
pub fn split_lines(text: &str) -> Vec<&str> {
    text.split_inclusive('\n').collect()
}

/// Split a raw line into content and terminator (`\n`, `\r\n`, or empty).
pub fn split_terminator(raw: &str) -> (&str, &str) {
    if let Some(content) = raw.strip_suffix("\r\n") {
        (content, "\r\n")
    } else if let Some(content) = raw.strip_suffix('\n') {
        (content, "\n")
    } else {
        (raw, "")
    }
}

/// Apply `rule` to line `line_index` (0-based) of `path`.
///
/// Returns `Ok(None)` for comment/docstring lines. An unmatched rule yields an
/// attempt with `matched == false` and performs no write. A matched rule
/// rewrites the file with exactly that line changed.
pub fn apply<'r>(
    path: &Path,
    rule: &'r MutationRule,
    line_index: usize,
    syntax: &SourceSyntax,
) -> Result<Option<MutationAttempt<'r>>, ApplyError> {
    let text = std::fs::read_to_string(path)?;
    let lines = split_lines(&text);
    let raw = *lines.get(line_index).ok_or_else(|| ApplyError::LineOutOfRange {
        path: path.to_path_buf(),
        line_index,
        line_count: lines.len(),
    })?;

    let (content, terminator) = split_terminator(raw);
    if is_skippable_line(content, syntax) {
        return Ok(None);
    }

    // A rewrite that reproduces the line (`return True` under the
    // `return x` rule) is treated as a non-match.
    let Some(mutated) = rule.apply_once(content).filter(|m| m != content) else {
        return Ok(Some(MutationAttempt {
            file: path.to_path_buf(),
            line: line_index + 1,
            rule,
            original: content.to_string(),
            mutated: content.to_string(),
            matched: false,
        }));
    };

    let mut rewritten = String::with_capacity(text.len() + mutated.len());
    for (idx, line) in lines.iter().enumerate() {
        if idx == line_index {
            rewritten.push_str(&mutated);
            rewritten.push_str(terminator);
        } else {
            rewritten.push_str(line);
        }
    }
    std::fs::write(path, rewritten)?;

    Ok(Some(MutationAttempt {
        file: path.to_path_buf(),
        line: line_index + 1,
        rule,
        original: content.to_string(),
        mutated,
        matched: true,
    }))
}
