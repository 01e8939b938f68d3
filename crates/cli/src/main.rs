mod config_commands;
mod plan_commands;
mod run_commands;

use {
    clap::{Parser, Subcommand},
    tracing::info,
    tracing_subscriber::{EnvFilter, fmt, layer::SubscriberExt, util::SubscriberInitExt},
};

use crate::{config_commands::ConfigAction, run_commands::RunArgs};

#[derive(Parser)]
#[command(name = "indus", about = "Indus browser agent dispatcher")]
struct Cli {
    #[command(subcommand)]
    command: Commands,

    /// Log level (trace, debug, info, warn, error).
    #[arg(long, global = true, default_value = "info")]
    log_level: String,

    /// Output logs as JSON instead of human-readable.
    #[arg(long, global = true, default_value_t = false)]
    json_logs: bool,

    /// Custom config directory (overrides default ~/.config/indus/).
    #[arg(long, global = true, env = "INDUS_CONFIG_DIR")]
    config_dir: Option<std::path::PathBuf>,
}

#[derive(Subcommand)]
enum Commands {
    /// Ask the planner for high-level steps.
    Plan {
        #[arg(short, long)]
        prompt: String,
    },
    /// Run one task against a screenshot file without touching a real window.
    Run(RunArgs),
    /// Configuration management.
    Config {
        #[command(subcommand)]
        action: ConfigAction,
    },
}

fn init_telemetry(cli: &Cli) {
    let filter =
        EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(&cli.log_level));

    let registry = tracing_subscriber::registry().with(filter);

    // Logs go to stderr; stdout carries command output.
    if cli.json_logs {
        registry
            .with(
                fmt::layer()
                    .json()
                    .with_target(true)
                    .with_thread_ids(false)
                    .with_writer(std::io::stderr),
            )
            .init();
    } else {
        registry
            .with(
                fmt::layer()
                    .with_target(false)
                    .with_thread_ids(false)
                    .with_ansi(true)
                    .with_writer(std::io::stderr),
            )
            .init();
    }
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    dotenvy::dotenv().ok();
    let cli = Cli::parse();

    init_telemetry(&cli);

    info!(version = env!("CARGO_PKG_VERSION"), "indus starting");

    // Apply directory override before loading config
    if let Some(ref dir) = cli.config_dir {
        indus_config::set_config_dir(dir.clone());
    }
    let config = indus_config::discover_and_load();

    match cli.command {
        Commands::Plan { prompt } => plan_commands::handle_plan(&config, &prompt).await,
        Commands::Run(args) => run_commands::handle_run(&config, args).await,
        Commands::Config { action } => config_commands::handle_config(&config, action),
    }
}
