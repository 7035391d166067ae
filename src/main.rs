use std::path::PathBuf;
use std::process::ExitCode;

use anyhow::Result;
use clap::{Parser, Subcommand};
use log::info;

use verismart_bridge::catalog::Catalog;
use verismart_bridge::config::AppConfig;
use verismart_bridge::state::AppState;
use verismart_bridge::{commands, logging};

#[derive(Parser)]
#[command(name = "verismart-bridge")]
#[command(about = "Run VeriSmart kit projects over Bluetooth LE", long_about = None)]
struct Cli {
    #[command(subcommand)]
    command: Commands,

    /// Config file (defaults to the user config directory)
    #[arg(short, long, value_name = "FILE")]
    config: Option<PathBuf>,

    /// Log at debug level
    #[arg(short, long)]
    verbose: bool,
}

#[derive(Subcommand)]
enum Commands {
    /// List grades and projects
    Projects,
    /// Report whether Bluetooth is available
    Status,
    /// Connect, send one three-digit command code, disconnect
    Send {
        #[arg(value_name = "CODE")]
        code: String,
    },
    /// Start a project, stop it when Enter is pressed
    Run {
        grade: u32,
        project: u32,
    },
}

#[tokio::main]
async fn main() -> ExitCode {
    let cli = Cli::parse();
    match run(cli).await {
        Ok(()) => ExitCode::SUCCESS,
        Err(e) => {
            eprintln!("Error: {:#}", e);
            ExitCode::FAILURE
        }
    }
}

async fn run(cli: Cli) -> Result<()> {
    let config_path = match cli.config {
        Some(path) => path,
        None => AppConfig::default_path()?,
    };
    let mut config = AppConfig::load_config(&config_path).await?;
    if cli.verbose {
        config.logging.level = "debug".to_string();
    }
    logging::setup_logging(&config.logging);

    match cli.command {
        Commands::Projects => commands::list_projects(&Catalog::builtin()?),
        Commands::Status => commands::status(&start(config).await?),
        Commands::Send { code } => commands::send_code(&start(config).await?, &code).await?,
        Commands::Run { grade, project } => {
            commands::run_project(&start(config).await?, grade, project).await?
        }
    }
    Ok(())
}

/// Brings up Bluetooth and the shared controller
async fn start(config: AppConfig) -> Result<AppState> {
    info!("Starting AppState initialization.");
    AppState::new(config).await
}
