use std::ffi::OsString;
use std::io::Write;
use std::path::PathBuf;
use std::time::Duration;

use anyhow::{Context, Result};
use clap::{Args, Parser, Subcommand, ValueEnum};
use tracing_subscriber::EnvFilter;

use mutation_harness::mutation::{
    Agent, Campaign, CampaignEvent, CommandTestRunner, IterationDriver, MutationConfig,
    MutationOutcome, ReportFormat, append_event, improve_tests, install_interrupt_handler,
    render_summary,
};

#[derive(Debug, Parser)]
#[command(name = "mutation-harness")]
#[command(about = "Line-granular mutation testing with test synthesis")]
struct Cli {
    #[command(subcommand)]
    command: Option<TopCommand>,
}

#[derive(Debug, Subcommand)]
enum TopCommand {
    /// Mutate every line of the subject, report survivors, and add tests for them.
    Campaign {
        #[command(flatten)]
        common: CommonArgs,
        /// Output format of the summary.
        #[arg(long, value_enum, default_value = "text")]
        format: OutputFormat,
        /// Report survivors without appending generated tests.
        #[arg(long)]
        no_synthesize: bool,
    },
    /// Run one cycle: coverage, campaign, and test synthesis.
    Agent {
        #[command(flatten)]
        common: CommonArgs,
        #[command(flatten)]
        agent: AgentArgs,
    },
    /// Re-run the agent until it reports success or the budget runs out.
    Loop {
        #[command(flatten)]
        common: CommonArgs,
        #[command(flatten)]
        agent: AgentArgs,
        /// Iteration budget.
        #[arg(long, default_value_t = 10)]
        max_iterations: usize,
        /// Delay between iterations in milliseconds.
        #[arg(long, default_value_t = 1000)]
        delay_ms: u64,
    },
}

#[derive(Debug, Default, Args)]
struct CommonArgs {
    /// Project directory the test commands run in.
    #[arg(long)]
    project: Option<PathBuf>,
    /// Subject file to mutate.
    #[arg(long)]
    subject: Option<PathBuf>,
    /// Test file generated tests are appended to.
    #[arg(long)]
    test_file: Option<PathBuf>,
    /// Pass/fail test command, split with shell quoting rules.
    #[arg(long)]
    test_command: Option<String>,
    /// Coverage test command, split with shell quoting rules.
    #[arg(long)]
    coverage_command: Option<String>,
    /// Kill a test run after this many seconds and count the mutation as killed.
    #[arg(long)]
    timeout_secs: Option<u64>,
    /// Append campaign events as JSON lines to this file.
    #[arg(long)]
    events: Option<PathBuf>,
}

#[derive(Debug, Default, Args)]
struct AgentArgs {
    /// Subject coverage percentage that counts as done.
    #[arg(long)]
    target_coverage: Option<f64>,
    /// Maximum tests generated per cycle.
    #[arg(long)]
    max_improvements: Option<usize>,
}

#[derive(Debug, Clone, Copy, ValueEnum)]
enum OutputFormat {
    /// Plain text
    Text,
    /// Markdown
    Md,
    /// JSON
    Json,
}

fn split_command(command: &str) -> Result<Vec<String>> {
    shell_words::split(command).with_context(|| format!("invalid command line `{command}`"))
}

fn make_config(common: &CommonArgs, agent: Option<&AgentArgs>) -> Result<MutationConfig> {
    let mut config = MutationConfig::default();
    if let Some(project) = &common.project {
        config = config.with_project_dir(project);
    }
    if let Some(subject) = &common.subject {
        config = config.with_subject_file(subject);
    }
    if let Some(test_file) = &common.test_file {
        config = config.with_test_file(test_file);
    }
    if let Some(command) = &common.test_command {
        config = config.with_test_command(split_command(command)?);
    }
    if let Some(command) = &common.coverage_command {
        config = config.with_coverage_command(split_command(command)?);
    }
    if let Some(timeout_secs) = common.timeout_secs {
        config = config.with_timeout_secs(timeout_secs);
    }
    if let Some(agent) = agent {
        if let Some(target) = agent.target_coverage {
            config = config.with_target_coverage(target);
        }
        if let Some(max) = agent.max_improvements {
            config = config.with_max_improvements(max);
        }
    }
    Ok(config)
}

/// Observer that records events and, in text mode, prints per-attempt progress.
fn observer(events: Option<PathBuf>, progress: bool) -> impl FnMut(&CampaignEvent) {
    move |event| {
        if let Some(path) = &events {
            if let Err(err) = append_event(path, event) {
                tracing::warn!(path = %path.display(), error = %err, "failed to record event");
            }
        }
        if !progress {
            return;
        }
        match event {
            CampaignEvent::CampaignStarted { subject, .. } => {
                println!("Analyzing mutations in {}...", subject.display());
            }
            CampaignEvent::MutationApplied {
                attempt,
                line,
                original,
                mutated,
                ..
            } => {
                print!("Testing mutation {attempt}: Line {line}: {original} -> {mutated} ... ");
                let _ = std::io::stdout().flush();
            }
            CampaignEvent::MutationFinished { outcome, .. } => match outcome {
                MutationOutcome::Survived => println!("SURVIVED (not caught by tests)"),
                MutationOutcome::Killed => println!("killed (caught by tests)"),
                MutationOutcome::Timeout => println!("killed (timed out)"),
            },
            CampaignEvent::CampaignInterrupted { .. } => {
                println!("\nInterrupted, subject restored.");
            }
            CampaignEvent::CampaignCompleted { .. } => {}
        }
    }
}

fn run_campaign(common: CommonArgs, format: OutputFormat, no_synthesize: bool) -> Result<()> {
    let config = make_config(&common, None)?;
    let runner = CommandTestRunner::from_config(&config);
    let interrupt = install_interrupt_handler()?;
    let text = matches!(format, OutputFormat::Text);

    if text {
        println!("Starting manual mutation testing...");
    }
    let mut on_event = observer(common.events.clone(), text);
    let result = Campaign::new(&config, &runner)
        .with_interrupt_flag(interrupt)
        .run(&mut on_event)
        .with_context(|| format!("mutation campaign on {}", config.subject_path().display()))?;

    let format = match format {
        OutputFormat::Text => ReportFormat::Text,
        OutputFormat::Md => ReportFormat::Markdown,
        OutputFormat::Json => ReportFormat::Json,
    };
    if text {
        println!();
    }
    print!("{}", render_summary(&result, format));
    if !text {
        println!();
    }

    if result.survivors.is_empty() {
        if text && !result.interrupted {
            println!("\nNo surviving mutations found. Your tests are robust!");
        }
    } else if !no_synthesize && !result.interrupted {
        let written = improve_tests(&config, &result.survivors, usize::MAX)
            .context("appending generated tests")?;
        if text {
            println!(
                "\nAdded {} new test cases to {}",
                written.len(),
                config.test_file.display()
            );
        }
    }
    Ok(())
}

fn run_agent(common: CommonArgs, agent: AgentArgs) -> Result<()> {
    let config = make_config(&common, Some(&agent))?;
    let runner = CommandTestRunner::from_config(&config);
    let interrupt = install_interrupt_handler()?;

    println!("Running agent...");
    let mut on_event = observer(common.events.clone(), false);
    let report = Agent::new(&config, &runner)
        .with_interrupt_flag(interrupt)
        .run_cycle(&mut on_event)?;
    print!("{}", report.render());
    Ok(())
}

/// Argv that re-invokes this binary's `agent` subcommand with the same options.
fn agent_args(common: &CommonArgs, agent: &AgentArgs) -> Vec<OsString> {
    let mut args: Vec<OsString> = vec!["agent".into()];
    let mut push = |flag: &str, value: OsString| {
        args.push(flag.into());
        args.push(value);
    };
    // The agent runs inside the project directory, so `--project` is implied.
    if let Some(subject) = &common.subject {
        push("--subject", subject.clone().into());
    }
    if let Some(test_file) = &common.test_file {
        push("--test-file", test_file.clone().into());
    }
    if let Some(command) = &common.test_command {
        push("--test-command", command.into());
    }
    if let Some(command) = &common.coverage_command {
        push("--coverage-command", command.into());
    }
    if let Some(timeout_secs) = common.timeout_secs {
        push("--timeout-secs", timeout_secs.to_string().into());
    }
    if let Some(events) = &common.events {
        let events = std::path::absolute(events).unwrap_or_else(|_| events.clone());
        push("--events", events.into());
    }
    if let Some(target) = agent.target_coverage {
        push("--target-coverage", target.to_string().into());
    }
    if let Some(max) = agent.max_improvements {
        push("--max-improvements", max.to_string().into());
    }
    args
}

fn run_loop(
    common: CommonArgs,
    agent: AgentArgs,
    max_iterations: usize,
    delay_ms: u64,
) -> Result<i32> {
    let config = make_config(&common, Some(&agent))?;
    let exe = std::env::current_exe().context("locating the running executable")?;

    let driver = IterationDriver::new(exe, agent_args(&common, &agent))
        .with_project_dir(&config.project_dir)
        .with_module(config.module_name())
        .with_max_iterations(max_iterations)
        .with_delay(Duration::from_millis(delay_ms));

    let stdout = std::io::stdout();
    let outcome = driver.run(&mut stdout.lock())?;
    Ok(outcome.exit_code())
}

fn init_tracing() {
    let filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("warn"));
    let _ = tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_writer(std::io::stderr)
        .try_init();
}

fn main() -> Result<()> {
    init_tracing();
    let cli = Cli::parse();

    match cli.command {
        None => run_campaign(CommonArgs::default(), OutputFormat::Text, false)?,
        Some(TopCommand::Campaign {
            common,
            format,
            no_synthesize,
        }) => run_campaign(common, format, no_synthesize)?,
        Some(TopCommand::Agent { common, agent }) => run_agent(common, agent)?,
        Some(TopCommand::Loop {
            common,
            agent,
            max_iterations,
            delay_ms,
        }) => {
            let code = run_loop(common, agent, max_iterations, delay_ms)?;
            std::process::exit(code);
        }
    }

    Ok(())
}
