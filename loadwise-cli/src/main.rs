//! Loadwise CLI: estimate, check and tune fine-tuning or multi-agent configurations
//! against declared hardware.

mod commands;
mod render;

use clap::Parser;
use std::path::PathBuf;
use tracing_subscriber::layer::SubscriberExt;
use tracing_subscriber::util::SubscriberInitExt;
use tracing_subscriber::{EnvFilter, Layer};

/// Loadwise: will this configuration fit, and what would make it fit better?
#[derive(Parser, Debug)]
#[command(name = "loadwise", version, about, long_about = None)]
struct Cli {
    /// Workspace directory (searched for .loadwise/config.toml)
    #[arg(short, long, default_value = ".")]
    workspace: PathBuf,

    /// Configuration file that takes precedence over every other source
    #[arg(short, long)]
    config: Option<PathBuf>,

    /// Increase verbosity (-v, -vv, -vvv)
    #[arg(short, long, action = clap::ArgAction::Count)]
    verbose: u8,

    /// Suppress non-essential output
    #[arg(short, long)]
    quiet: bool,

    #[command(subcommand)]
    command: Commands,
}

#[derive(clap::Args, Debug)]
struct TaskArgs {
    /// Task file (JSON if it ends in .json, TOML otherwise)
    task: PathBuf,

    /// Print machine-readable JSON instead of text
    #[arg(long)]
    json: bool,
}

#[derive(clap::Args, Debug)]
struct ResourceArgs {
    /// Available GPU memory in GiB (defaults to [resources] in config)
    #[arg(long)]
    vram_gib: Option<f64>,

    /// Available system memory in GiB (defaults to [resources] in config)
    #[arg(long)]
    ram_gib: Option<f64>,
}

#[derive(clap::Subcommand, Debug)]
enum Commands {
    /// Print the VRAM, RAM and time estimate for a task
    Estimate {
        #[command(flatten)]
        task: TaskArgs,
    },
    /// Estimate a task and classify it against available hardware
    Check {
        #[command(flatten)]
        task: TaskArgs,
        #[command(flatten)]
        resources: ResourceArgs,
    },
    /// List ranked changes that would lower the task's footprint
    Suggest {
        #[command(flatten)]
        task: TaskArgs,
        #[command(flatten)]
        resources: ResourceArgs,
    },
    /// Manage configuration
    Config {
        #[command(subcommand)]
        action: ConfigAction,
    },
}

#[derive(clap::Subcommand, Debug)]
enum ConfigAction {
    /// Write a default .loadwise/config.toml into the workspace
    Init,
    /// Show the merged configuration
    Show,
}

fn main() -> anyhow::Result<()> {
    // Load .env file if present
    let _ = dotenvy::dotenv();

    let cli = Cli::parse();

    let filter = match cli.verbose {
        0 if cli.quiet => "error",
        0 => "warn",
        1 => "info",
        2 => "debug",
        _ => "trace",
    };

    let stderr_layer = tracing_subscriber::fmt::layer()
        .with_writer(std::io::stderr)
        .with_target(false)
        .with_filter(EnvFilter::new(filter));

    let log_dir = directories::ProjectDirs::from("dev", "loadwise", "loadwise")
        .map(|d| d.data_dir().join("logs"))
        .unwrap_or_else(|| PathBuf::from("."));
    let _ = std::fs::create_dir_all(&log_dir);
    let file_appender = tracing_appender::rolling::daily(&log_dir, "loadwise.log");
    let (non_blocking, _guard) = tracing_appender::non_blocking(file_appender);
    let json_layer = tracing_subscriber::fmt::layer()
        .json()
        .with_writer(non_blocking)
        .with_filter(EnvFilter::new("debug"));

    tracing_subscriber::registry()
        .with(stderr_layer)
        .with(json_layer)
        .init();

    let workspace = cli
        .workspace
        .canonicalize()
        .unwrap_or_else(|_| std::env::current_dir().unwrap_or_else(|_| PathBuf::from(".")));

    commands::handle_command(cli.command, &workspace, cli.config.as_deref())
}
