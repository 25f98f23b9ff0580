//! RelayCode CLI - Main entry point

mod commands;

use clap::{Parser, Subcommand};
use relay_foundation::RelayConfig;
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt};

/// RelayCode - run coding agents as background tasks and talk to them later
#[derive(Parser, Debug)]
#[command(name = "relay")]
#[command(author, version, about, long_about = None)]
struct Args {
    #[command(subcommand)]
    command: Command,

    /// Enable debug logging
    #[arg(short, long, global = true)]
    debug: bool,
}

#[derive(Subcommand, Debug)]
enum Command {
    /// Launch an agent task in the background and print its id
    Dispatch {
        /// Task id to assign (generated when omitted)
        #[arg(long)]
        task_id: Option<String>,

        /// Directory the agent works in
        #[arg(short, long)]
        workdir: std::path::PathBuf,

        /// Prompt handed to the agent
        #[arg(short, long)]
        prompt: String,
    },
    /// Show the current status of a task
    Status { task_id: String },
    /// Print the tail of a task's transcript
    Log {
        task_id: String,

        /// Number of lines to show
        #[arg(short, long)]
        lines: Option<usize>,

        /// Show the supervisor's own log instead of the transcript
        #[arg(long)]
        debug_log: bool,
    },
    /// Show the question a task is waiting on, if any
    Question { task_id: String },
    /// Show the final result of a task, if any
    Result { task_id: String },
    /// Answer the question a task is waiting on
    Answer { task_id: String, text: String },
    /// List all known tasks
    List,
    /// Supervise one task in the foreground (spawned by dispatch)
    #[command(hide = true)]
    Run {
        #[arg(long)]
        task_id: String,

        #[arg(long)]
        workdir: std::path::PathBuf,

        #[arg(long)]
        prompt: String,
    },
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    let args = Args::parse();

    // Load configuration
    let config = RelayConfig::load().unwrap_or_else(|e| {
        eprintln!("Warning: Failed to load config: {}", e);
        RelayConfig::default()
    });

    // Supervisor mode has no terminal - its stderr and its subscriber both
    // point at the task's bridge log, so skip the terminal logging setup.
    if let Command::Run {
        task_id,
        workdir,
        prompt,
    } = &args.command
    {
        return commands::run_supervisor(&config, task_id, workdir, prompt).await;
    }

    // Initialize logging (stderr - stdout is reserved for command output)
    let log_level = if args.debug { "debug" } else { "info" };
    tracing_subscriber::registry()
        .with(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| tracing_subscriber::EnvFilter::new(log_level)),
        )
        .with(
            tracing_subscriber::fmt::layer()
                .with_target(false)
                .with_writer(std::io::stderr),
        )
        .init();

    match args.command {
        Command::Dispatch {
            task_id,
            workdir,
            prompt,
        } => commands::dispatch(&config, task_id, workdir, prompt).await,
        Command::Status { task_id } => commands::status(&config, &task_id),
        Command::Log {
            task_id,
            lines,
            debug_log,
        } => commands::log(&config, &task_id, lines, debug_log),
        Command::Question { task_id } => commands::question(&config, &task_id),
        Command::Result { task_id } => commands::result(&config, &task_id),
        Command::Answer { task_id, text } => commands::answer(&config, &task_id, &text),
        Command::List => commands::list(&config),
        Command::Run { .. } => unreachable!("handled before logging setup"),
    }
}
