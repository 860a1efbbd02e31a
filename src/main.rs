#![forbid(unsafe_code)]

//! `agent-ensemble`: inspect agent transcripts and task plans offline.
//!
//! `replay` streams a recorded NDJSON transcript through the stream reader
//! and the protocol translator and prints one canonical event per line.
//! `plan` runs the heuristic planner on a task description.

use std::path::{Path, PathBuf};

use clap::{Parser, Subcommand, ValueEnum};
use serde_json::json;
use tokio_util::sync::CancellationToken;
use tracing::{info, info_span, warn, Instrument};
use tracing_subscriber::{fmt, EnvFilter};

use agent_ensemble::backend::signals::{BackendSignal, SignalBus, SignalSource};
use agent_ensemble::config::GlobalConfig;
use agent_ensemble::protocol::reader::run_reader;
use agent_ensemble::protocol::translator::translate_for_runtime;
use agent_ensemble::{planner, AppError, Result};

const REPLAY_SESSION_ID: &str = "replay";

#[derive(Debug, Copy, Clone, Eq, PartialEq, ValueEnum)]
enum LogFormat {
    Text,
    Json,
}

#[derive(Debug, Parser)]
#[command(name = "agent-ensemble", about = "Agent session event pipeline", version, long_about = None)]
struct Cli {
    /// Path to the TOML configuration file.
    #[arg(long, global = true)]
    config: Option<PathBuf>,

    /// Log output format (text or json).
    #[arg(long, value_enum, default_value_t = LogFormat::Text, global = true)]
    log_format: LogFormat,

    #[command(subcommand)]
    command: Command,
}

#[derive(Debug, Subcommand)]
enum Command {
    /// Translate a recorded agent transcript into canonical events.
    Replay {
        /// NDJSON transcript file.
        file: PathBuf,
        /// Runtime that produced the transcript (defaults to the configured runtime).
        #[arg(long)]
        runtime: Option<String>,
    },
    /// Classify a task and print the deployment plan.
    Plan {
        /// Task description.
        task: String,
        /// Project context text used for the runtime recommendation.
        #[arg(long, default_value = "")]
        context: String,
    },
}

fn main() -> Result<()> {
    let args = Cli::parse();
    init_tracing(args.log_format)?;

    tokio::runtime::Builder::new_multi_thread()
        .enable_all()
        .build()
        .map_err(|err| AppError::Config(format!("failed to build tokio runtime: {err}")))?
        .block_on(run(args))
}

async fn run(args: Cli) -> Result<()> {
    let config = match args.config.as_ref() {
        Some(path) => GlobalConfig::load_from_path(path)?,
        None => GlobalConfig::default(),
    };

    match args.command {
        Command::Replay { file, runtime } => {
            let runtime = runtime.unwrap_or(config.default_runtime);
            replay(&file, &runtime).await
        }
        Command::Plan { task, context } => {
            let plan = planner::analyze_task(&task, &context)?;
            let rendered = serde_json::to_string_pretty(&plan)
                .map_err(|err| AppError::Protocol(format!("failed to render plan: {err}")))?;
            println!("{rendered}");
            Ok(())
        }
    }
}

async fn replay(file: &Path, runtime: &str) -> Result<()> {
    let transcript = tokio::fs::File::open(file).await?;
    info!(file = %file.display(), runtime, "replaying transcript");

    let bus = SignalBus::new();
    let mut signals = bus.subscribe()?;
    let cancel = CancellationToken::new();
    let reader = tokio::spawn(
        run_reader(REPLAY_SESSION_ID.to_owned(), transcript, bus, cancel.clone())
            .instrument(info_span!("reader", session_id = REPLAY_SESSION_ID)),
    );

    let mut event_count: u64 = 0;
    while let Some(signal) = signals.recv().await {
        match signal {
            BackendSignal::AgentOutput {
                record_kind,
                payload,
                ..
            } => {
                for event in translate_for_runtime(runtime, &record_kind, payload) {
                    event_count += 1;
                    let line = json!({
                        "recordKind": record_kind,
                        "type": event.kind().as_str(),
                        "payload": event.payload(),
                    });
                    println!("{line}");
                }
            }
            BackendSignal::ExternalSessionAssigned {
                external_session_id,
                ..
            } => info!(external_session_id, "transcript session id"),
            BackendSignal::SessionCompleted {
                needs_input,
                last_result,
                usage,
                ..
            } => {
                let line = json!({
                    "type": "task_update",
                    "payload": {
                        "needsInput": needs_input,
                        "lastResult": last_result,
                        "usage": usage,
                    },
                });
                println!("{line}");
                break;
            }
            BackendSignal::SessionCancelled { .. } => break,
        }
    }

    cancel.cancel();
    if let Err(err) = reader.await {
        warn!(%err, "reader task failed");
    }
    info!(event_count, "replay finished");
    Ok(())
}

fn init_tracing(log_format: LogFormat) -> Result<()> {
    let env_filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info"));
    let subscriber = fmt()
        .with_env_filter(env_filter)
        .with_writer(std::io::stderr);

    match log_format {
        LogFormat::Text => subscriber
            .try_init()
            .map_err(|err| AppError::Config(format!("failed to init tracing: {err}")))?,
        LogFormat::Json => subscriber
            .json()
            .try_init()
            .map_err(|err| AppError::Config(format!("failed to init tracing: {err}")))?,
    }

    Ok(())
}
