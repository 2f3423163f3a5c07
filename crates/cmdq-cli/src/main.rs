//! cmdq - submit commands, drain them with a worker group, print the results.

use std::path::PathBuf;
use std::sync::Arc;
use std::time::Duration;

use anyhow::{Context, Result, bail};
use clap::{Parser, Subcommand, ValueEnum};
use serde::Serialize;
use tracing_subscriber::{EnvFilter, fmt, prelude::*};

use cmdq_core::app::{Lookup, Service, ServiceBuilder};
use cmdq_core::config::CmdqConfig;
use cmdq_core::domain::{Command, EntryState, Fingerprint, ResultRecord, SubmitOutcome};
use cmdq_core::impls::{EchoExecutor, InMemoryKvStore, ShellExecutor};
use cmdq_core::ports::Executor;

/// cmdq - content-addressed command queue
#[derive(Parser)]
#[command(name = "cmdq")]
#[command(author, version, about, long_about = None)]
struct Cli {
    /// JSON config file; flags and env vars override its values
    #[arg(long, env = "CMDQ_CONFIG", global = true)]
    config: Option<PathBuf>,

    /// Enable verbose logging
    #[arg(short, long, global = true)]
    verbose: bool,

    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Submit commands and drain the queue until it is idle
    Run(RunArgs),

    /// Print the fingerprint of a command without running it
    Fingerprint {
        /// Command text
        command: String,
    },
}

#[derive(clap::Args)]
struct RunArgs {
    /// Commands to submit (duplicates are deduplicated)
    #[arg(required = true)]
    commands: Vec<String>,

    #[arg(long, value_enum, default_value_t = ExecutorKind::Echo)]
    executor: ExecutorKind,

    /// Per-command timeout for the shell executor
    #[arg(long, env = "CMDQ_EXEC_TIMEOUT_SECS", default_value_t = 30)]
    exec_timeout_secs: u64,

    /// Claim lease
    #[arg(long, env = "CMDQ_LEASE_SECS")]
    lease_secs: Option<u64>,

    /// Attempts before an entry is dead-lettered
    #[arg(long, env = "CMDQ_MAX_ATTEMPTS")]
    max_attempts: Option<u32>,

    /// Number of drain workers
    #[arg(long, env = "CMDQ_WORKERS")]
    workers: Option<usize>,

    /// Give up waiting for the queue after this long
    #[arg(long, env = "CMDQ_WAIT_SECS", default_value_t = 300)]
    wait_secs: u64,
}

#[derive(Clone, Copy, ValueEnum)]
enum ExecutorKind {
    /// Return the command text as output
    Echo,
    /// Run through `sh -c`
    Shell,
}

#[derive(Serialize)]
struct Report {
    command: String,
    fingerprint: Fingerprint,
    submitted: &'static str,
    #[serde(skip_serializing_if = "Option::is_none")]
    result: Option<ResultRecord>,
    #[serde(skip_serializing_if = "Option::is_none")]
    queue_state: Option<EntryState>,
    #[serde(skip_serializing_if = "Option::is_none")]
    last_error: Option<String>,
}

#[tokio::main]
async fn main() -> Result<()> {
    let cli = Cli::parse();

    let filter = if cli.verbose {
        EnvFilter::new("debug")
    } else {
        EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info"))
    };

    tracing_subscriber::registry()
        .with(fmt::layer().with_writer(std::io::stderr))
        .with(filter)
        .init();

    match cli.command {
        Commands::Run(args) => {
            let config = load_config(cli.config.as_deref(), &args)?;
            run(config, args).await?;
        }
        Commands::Fingerprint { command } => {
            let command = Command::new(command).context("invalid command")?;
            println!("{}", Fingerprint::of(&command));
        }
    }

    Ok(())
}

fn load_config(path: Option<&std::path::Path>, args: &RunArgs) -> Result<CmdqConfig> {
    let mut config = match path {
        Some(path) => CmdqConfig::from_json_file(path)
            .with_context(|| format!("failed to load config from {}", path.display()))?,
        None => CmdqConfig::default(),
    };

    if let Some(secs) = args.lease_secs {
        config.drain.lease = Duration::from_secs(secs);
    }
    if let Some(max_attempts) = args.max_attempts {
        config.drain.max_attempts = max_attempts;
    }
    if let Some(workers) = args.workers {
        config.worker.workers = workers;
    }
    config.validate().context("invalid configuration")?;
    Ok(config)
}

async fn run(config: CmdqConfig, args: RunArgs) -> Result<()> {
    let executor: Arc<dyn Executor> = match args.executor {
        ExecutorKind::Echo => Arc::new(EchoExecutor),
        ExecutorKind::Shell => Arc::new(ShellExecutor::new(Duration::from_secs(
            args.exec_timeout_secs,
        ))),
    };

    let service = ServiceBuilder::new()
        .shared_store(Arc::new(InMemoryKvStore::new("cmdq")))
        .executor(executor)
        .config(config)
        .build()
        .context("failed to build service")?;

    let mut submitted = Vec::with_capacity(args.commands.len());
    for text in args.commands {
        let command = Command::new(text).context("invalid command")?;
        let outcome = service
            .coordinator
            .submit(command.clone())
            .await
            .with_context(|| format!("failed to submit {command:?}"))?;
        submitted.push((command, outcome));
    }

    let workers = service.spawn_workers();
    let drained = tokio::select! {
        res = wait_until_idle(&service, Duration::from_secs(args.wait_secs)) => res,
        _ = tokio::signal::ctrl_c() => {
            tracing::warn!("interrupted, stopping workers");
            Ok(false)
        }
    };
    workers.shutdown_and_join().await;
    let drained = drained?;

    let mut reports = Vec::with_capacity(submitted.len());
    for (command, outcome) in submitted {
        reports.push(report(&service, command, &outcome).await?);
    }
    println!("{}", serde_json::to_string_pretty(&reports)?);

    if !drained {
        bail!("queue was not drained before the deadline");
    }
    Ok(())
}

/// Poll until nothing is Pending or Claimed. `false` on deadline.
async fn wait_until_idle(service: &Service, deadline: Duration) -> Result<bool> {
    let poll = service.config.worker.idle_poll;
    let started = tokio::time::Instant::now();
    loop {
        let counts = service
            .admin
            .counts()
            .await
            .context("failed to read queue counts")?;
        if counts.in_flight() == 0 {
            tracing::info!(
                results = counts.results,
                failed = counts.failed,
                "queue drained"
            );
            return Ok(true);
        }
        if started.elapsed() >= deadline {
            tracing::warn!(pending = counts.pending, claimed = counts.claimed, "deadline reached");
            return Ok(false);
        }
        tokio::time::sleep(poll).await;
    }
}

async fn report(service: &Service, command: Command, outcome: &SubmitOutcome) -> Result<Report> {
    let submitted = match outcome {
        SubmitOutcome::Cached { .. } => "cached",
        SubmitOutcome::Enqueued { .. } => "enqueued",
        SubmitOutcome::AlreadyQueued { .. } => "already_queued",
    };
    let fingerprint = outcome.fingerprint().clone();
    let mut report = Report {
        command: command.to_string(),
        fingerprint,
        submitted,
        result: None,
        queue_state: None,
        last_error: None,
    };

    match service
        .admin
        .lookup(&command)
        .await
        .context("failed to look up result")?
    {
        Lookup::Cached(record) => report.result = Some(record),
        Lookup::Queued(entry) => {
            report.queue_state = Some(entry.state);
            report.last_error = entry.last_error;
        }
        Lookup::Unknown => {}
    }
    Ok(report)
}
