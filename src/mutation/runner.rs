//! Test runner abstraction and external command adapter.

use std::io::Read;
use std::path::PathBuf;
use std::process::{Child, Command, ExitStatus, Stdio};
use std::time::{Duration, Instant};

use thiserror::Error;

use super::config::MutationConfig;
use super::metrics::RunMetrics;

/// Runner-level errors. All of them abort a campaign.
#[derive(Debug, Error)]
pub enum TestRunnerError {
    /// Configured argv is empty.
    #[error("test command is empty")]
    EmptyCommand,
    /// The test process could not be started.
    #[error("failed to start test command `{program}`: {source}")]
    Spawn {
        /// Program that failed to start.
        program: String,
        /// Underlying IO error.
        source: std::io::Error,
    },
    /// IO failure while waiting on the process.
    #[error("io error: {0}")]
    Io(#[from] std::io::Error),
}

/// Pass/fail verdict of one test run.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum TestStatus {
    /// Exit code 0.
    Passed,
    /// Non-zero exit code or killed by a signal.
    Failed,
    /// Killed after the configured timeout.
    TimedOut,
}

/// Result of one test run, with buffered process output.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct TestRunOutcome {
    /// Verdict.
    pub status: TestStatus,
    /// Process exit code, if any.
    pub exit_code: Option<i32>,
    /// Captured stdout.
    pub stdout: String,
    /// Captured stderr.
    pub stderr: String,
}

impl TestRunOutcome {
    /// True if the suite passed.
    pub fn passed(&self) -> bool {
        self.status == TestStatus::Passed
    }
}

/// Test runner contract. Implementations must not touch the subject file.
pub trait TestRunner {
    /// Run the pass/fail suite.
    fn run_tests(&self) -> Result<TestRunOutcome, TestRunnerError>;

    /// Run the coverage suite and scrape its report.
    fn run_with_metrics(&self, subject_name: &str) -> Result<RunMetrics, TestRunnerError>;
}

/// Runs configured argvs as child processes in the project directory.
#[derive(Debug, Clone)]
pub struct CommandTestRunner {
    project_dir: PathBuf,
    test_command: Vec<String>,
    coverage_command: Vec<String>,
    timeout: Option<Duration>,
}

impl CommandTestRunner {
    /// Build from a config.
    pub fn from_config(config: &MutationConfig) -> Self {
        Self {
            project_dir: config.project_dir.clone(),
            test_command: config.test_command.clone(),
            coverage_command: config.coverage_command.clone(),
            timeout: config.timeout_secs.map(Duration::from_secs),
        }
    }

    /// Override the timeout.
    pub fn with_timeout(mut self, timeout: Option<Duration>) -> Self {
        self.timeout = timeout;
        self
    }

    fn execute(&self, argv: &[String]) -> Result<TestRunOutcome, TestRunnerError> {
        let (program, args) = argv.split_first().ok_or(TestRunnerError::EmptyCommand)?;
        let mut cmd = Command::new(program);
        cmd.args(args)
            .current_dir(&self.project_dir)
            .stdin(Stdio::null())
            .stdout(Stdio::piped())
            .stderr(Stdio::piped());

        let spawn_err = |source| TestRunnerError::Spawn {
            program: program.clone(),
            source,
        };

        let Some(timeout) = self.timeout else {
            let output = cmd.output().map_err(spawn_err)?;
            return Ok(outcome_from(
                output.status,
                false,
                output.stdout,
                output.stderr,
            ));
        };

        // Own process group, so a timeout also reaches whatever the suite
        // spawned (shell wrappers, pytest workers) and the pipes close.
        #[cfg(unix)]
        std::os::unix::process::CommandExt::process_group(&mut cmd, 0);

        let mut child = cmd.spawn().map_err(spawn_err)?;
        // Drain both pipes on their own threads so a chatty suite cannot
        // block on a full pipe while we poll for exit.
        let stdout = child.stdout.take().map(drain);
        let stderr = child.stderr.take().map(drain);

        let deadline = Instant::now() + timeout;
        let mut timed_out = false;
        let status = loop {
            if let Some(status) = child.try_wait()? {
                break status;
            }
            if Instant::now() >= deadline {
                tracing::warn!(program = %program, ?timeout, "test command timed out, killing it");
                timed_out = true;
                kill_tree(&mut child)?;
                break child.wait()?;
            }
            std::thread::sleep(Duration::from_millis(20));
        };

        let stdout = stdout.map(join_drain).unwrap_or_default();
        let stderr = stderr.map(join_drain).unwrap_or_default();
        Ok(outcome_from(status, timed_out, stdout, stderr))
    }
}

#[cfg(unix)]
fn kill_tree(child: &mut Child) -> std::io::Result<()> {
    use nix::errno::Errno;
    use nix::sys::signal::{Signal, killpg};
    use nix::unistd::Pid;

    let Ok(pgid) = i32::try_from(child.id()) else {
        return child.kill();
    };
    match killpg(Pid::from_raw(pgid), Signal::SIGKILL) {
        Ok(()) | Err(Errno::ESRCH) => Ok(()),
        Err(errno) => Err(std::io::Error::from_raw_os_error(errno as i32)),
    }
}

#[cfg(not(unix))]
fn kill_tree(child: &mut Child) -> std::io::Result<()> {
    child.kill()
}

fn drain<R: Read + Send + 'static>(mut pipe: R) -> std::thread::JoinHandle<Vec<u8>> {
    std::thread::spawn(move || {
        let mut buf = Vec::new();
        let _ = pipe.read_to_end(&mut buf);
        buf
    })
}

fn join_drain(handle: std::thread::JoinHandle<Vec<u8>>) -> Vec<u8> {
    handle.join().unwrap_or_default()
}

fn outcome_from(
    status: ExitStatus,
    timed_out: bool,
    stdout: Vec<u8>,
    stderr: Vec<u8>,
) -> TestRunOutcome {
    let verdict = if timed_out {
        TestStatus::TimedOut
    } else if status.success() {
        TestStatus::Passed
    } else {
        TestStatus::Failed
    };
    TestRunOutcome {
        status: verdict,
        exit_code: status.code(),
        stdout: String::from_utf8_lossy(&stdout).to_string(),
        stderr: String::from_utf8_lossy(&stderr).to_string(),
    }
}

impl TestRunner for CommandTestRunner {
    fn run_tests(&self) -> Result<TestRunOutcome, TestRunnerError> {
        self.execute(&self.test_command)
    }

    fn run_with_metrics(&self, subject_name: &str) -> Result<RunMetrics, TestRunnerError> {
        let outcome = self.execute(&self.coverage_command)?;
        let metrics = RunMetrics::scrape(&outcome.stdout, subject_name);
        if metrics.is_empty() {
            tracing::warn!(
                exit_code = ?outcome.exit_code,
                "no metrics found in coverage command output"
            );
        }
        Ok(metrics)
    }
}
