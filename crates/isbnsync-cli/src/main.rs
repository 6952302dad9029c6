use clap::{ArgAction, Parser, Subcommand};
use color_eyre::eyre::{eyre, Context};
use commands::{cleanup, clear, run};
use isbnsync_config::{Config, PathManager};
use std::path::PathBuf;

mod commands;
mod logging;
mod output;

#[derive(Parser)]
#[command(name = "isbnsync")]
#[command(about = "isbnsync - Scrape the Book Planet catalog and correct ISBNs in your spreadsheet")]
#[command(version)]
struct Cli {
    /// Enable verbose output (use multiple times for more verbosity: -v, -vv)
    #[arg(short, long, action = ArgAction::Count, global = true)]
    verbose: u8,

    /// Suppress all output except errors
    #[arg(short, long, global = true)]
    quiet: bool,

    /// Output format
    #[arg(long, global = true, default_value = "human", value_enum)]
    output: output::OutputFormat,

    /// Config file (defaults to config.toml in the config directory)
    #[arg(long, global = true, value_name = "PATH")]
    config: Option<PathBuf>,

    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Fetch every configured batch, then reconcile the spreadsheet
    #[command(long_about = "Fetch the configured catalog batches (resuming from saved progress), merge and deduplicate the records, write the consolidated file and correct stale ISBNs in the configured spreadsheet.")]
    Run,
    /// Find and terminate leftover headless browser processes
    #[command(long_about = "List Chrome/Chromium processes started for automation (headless, remote debugging, chromedriver) with their memory use, ask for confirmation, terminate them and report system memory before and after.")]
    Cleanup,
    /// Delete saved progress files
    #[command(long_about = "Delete the per-batch progress files and the consolidated file so the next run starts from the first page.")]
    Clear {
        /// Don't ask for confirmation
        #[arg(long, short, action = ArgAction::SetTrue)]
        yes: bool,
    },
}

#[tokio::main]
async fn main() -> color_eyre::Result<()> {
    color_eyre::install()?;

    let cli = Cli::parse();
    let paths = PathManager::default();

    let config_path = match &cli.config {
        Some(path) if !path.exists() => {
            return Err(eyre!("Config file {} does not exist", path.display()));
        }
        Some(path) => path.clone(),
        None => paths.config_file(),
    };
    let config = Config::load_or_default(&config_path)
        .map_err(|e| eyre!("{}", e))
        .wrap_err_with(|| format!("Failed to load {}", config_path.display()))?;

    let log_file = config.logging.file.then(|| paths.run_log_file());
    logging::init_logging(cli.verbose, cli.quiet, log_file).map_err(|e| eyre!("{}", e))?;

    let output = output::Output::new(cli.output, cli.quiet);

    match cli.command {
        Commands::Run => run::run_batches(config, &paths, &output).await,
        Commands::Cleanup => cleanup::run_cleanup(&output).await,
        Commands::Clear { yes } => clear::run_clear(&config, &paths, yes, &output),
    }
}
