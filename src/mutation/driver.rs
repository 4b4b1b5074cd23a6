//! Bounded loop that re-runs the agent until it reports success.

use std::ffi::OsString;
use std::io::{self, Write};
use std::path::PathBuf;
use std::process::{Command, Stdio};
use std::time::Duration;

use super::metrics::{
    has_success_marker, parse_achieved_coverage, parse_killed_fraction, parse_module_coverage,
    parse_progress,
};

/// How the loop ended.
#[derive(Debug, Clone, PartialEq)]
pub enum DriverOutcome {
    /// The agent reported success.
    Succeeded {
        /// Iteration that succeeded (1-based).
        iteration: usize,
        /// Coverage parsed from that iteration.
        coverage: f64,
    },
    /// The iteration budget ran out.
    Exhausted {
        /// Coverage parsed from the last iteration.
        coverage: f64,
        /// Killed mutations from the last iteration.
        killed: u64,
        /// Attempted mutations from the last iteration.
        total: u64,
    },
}

impl DriverOutcome {
    /// Process exit code: 0 on success, 1 on exhaustion.
    pub fn exit_code(&self) -> i32 {
        match self {
            Self::Succeeded { .. } => 0,
            Self::Exhausted { .. } => 1,
        }
    }
}

/// Coverage from an agent report: the success line, then module coverage,
/// then `Progress:`, else 0.
pub fn extract_coverage(output: &str) -> f64 {
    parse_achieved_coverage(output)
        .or_else(|| parse_module_coverage(output))
        .or_else(|| parse_progress(output))
        .unwrap_or(0.0)
}

/// Runs an agent command up to `max_iterations` times.
#[derive(Debug, Clone)]
pub struct IterationDriver {
    program: OsString,
    args: Vec<OsString>,
    project_dir: PathBuf,
    module: String,
    max_iterations: usize,
    delay: Duration,
}

impl IterationDriver {
    /// Driver for `program args...`.
    pub fn new<I, S>(program: impl Into<OsString>, args: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<OsString>,
    {
        Self {
            program: program.into(),
            args: args.into_iter().map(Into::into).collect(),
            project_dir: PathBuf::from("."),
            module: "calculator".to_string(),
            max_iterations: 10,
            delay: Duration::from_secs(1),
        }
    }

    /// Set working directory of the agent command.
    pub fn with_project_dir(mut self, project_dir: impl Into<PathBuf>) -> Self {
        self.project_dir = project_dir.into();
        self
    }

    /// Set module name used in the success message.
    pub fn with_module(mut self, module: impl Into<String>) -> Self {
        self.module = module.into();
        self
    }

    /// Set iteration budget.
    pub fn with_max_iterations(mut self, max_iterations: usize) -> Self {
        self.max_iterations = max_iterations;
        self
    }

    /// Set delay between iterations.
    pub fn with_delay(mut self, delay: Duration) -> Self {
        self.delay = delay;
        self
    }

    fn invoke(&self) -> (String, String) {
        let output = Command::new(&self.program)
            .args(&self.args)
            .current_dir(&self.project_dir)
            .stdin(Stdio::null())
            .output();
        match output {
            Ok(output) => (
                String::from_utf8_lossy(&output.stdout).to_string(),
                String::from_utf8_lossy(&output.stderr).to_string(),
            ),
            Err(err) => {
                tracing::error!(program = ?self.program, error = %err, "failed to start agent");
                (String::new(), format!("failed to start agent: {err}"))
            }
        }
    }

    /// Run the loop, writing progress to `out`.
    pub fn run<W: Write>(&self, out: &mut W) -> io::Result<DriverOutcome> {
        let mut coverage = 0.0;
        let mut killed = 0;
        let mut total = 0;

        writeln!(out, "Starting mutation testing agent loop")?;
        writeln!(out, "======================================")?;

        for iteration in 1..=self.max_iterations {
            writeln!(out, "\nIteration {iteration}/{}", self.max_iterations)?;
            writeln!(out, "---------------------------")?;

            let (stdout, stderr) = self.invoke();
            writeln!(out, "{stdout}")?;
            if !stderr.is_empty() {
                writeln!(out, "Errors: {stderr}")?;
            }

            let prev_coverage = coverage;
            let prev_killed = killed;
            coverage = extract_coverage(&stdout);
            (killed, total) = parse_killed_fraction(&stdout).unwrap_or((0, 0));
            tracing::debug!(iteration, coverage, killed, total, "agent iteration finished");

            if has_success_marker(&stdout) || coverage >= 100.0 {
                writeln!(
                    out,
                    "\nSuccess! Achieved 100% coverage for {} module.",
                    self.module
                )?;
                out.flush()?;
                return Ok(DriverOutcome::Succeeded {
                    iteration,
                    coverage,
                });
            }

            if iteration > 1 && coverage <= prev_coverage && killed <= prev_killed {
                writeln!(out, "\nNo progress made in this iteration.")?;
            }
            out.flush()?;

            if iteration < self.max_iterations && !self.delay.is_zero() {
                std::thread::sleep(self.delay);
            }
        }

        writeln!(out, "\nMaximum iterations reached without achieving 100% coverage.")?;
        writeln!(out, "Final coverage: {coverage:.1}%")?;
        writeln!(out, "Final mutation score: {killed}/{total}")?;
        out.flush()?;
        Ok(DriverOutcome::Exhausted {
            coverage,
            killed,
            total,
        })
    }
}
