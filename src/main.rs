//! Slotwatch CLI - appointment availability watcher
//!
//! The watch logic is contained in lib.rs, and this file is responsible
//! for parsing arguments, loading configuration and handling top-level errors.

use chrono::NaiveDate;
use clap::{Args, CommandFactory, Parser, Subcommand};
use clap_complete::Shell;
use colored::Colorize;
use slotwatch::config::Overrides;
use slotwatch::fetcher::HttpFetcher;
use slotwatch::notify::Notifier;
use slotwatch::{date, logging, Config, Watcher};
use std::path::PathBuf;
use tracing::{info, warn};

#[derive(Parser)]
#[command(name = "slotwatch")]
#[command(
    author,
    version,
    about = "Watch a scheduling page for appointment availability",
    long_about = None
)]
struct Cli {
    /// Config file (default: ./slotwatch.toml, then ~/.config/slotwatch/slotwatch.toml)
    #[arg(long, global = true)]
    config: Option<PathBuf>,

    #[command(subcommand)]
    command: Option<Commands>,
}

#[derive(Subcommand)]
enum Commands {
    /// Poll the page and alert on availability (the default)
    Run(RunArgs),
    /// Show which date, if any, would be read from some text
    Parse {
        /// Text as it appears on the page
        text: String,
    },
    /// Print the effective configuration with secrets masked
    Config,
    /// Generate shell completions
    Completions {
        /// Target shell
        shell: Shell,
    },
}

#[derive(Args, Default)]
struct RunArgs {
    /// Page to watch (overrides START_URL and SCHEDULE_URL)
    #[arg(long)]
    url: Option<String>,
    /// CSS rule for availability elements (overrides AVAIL_SELECTOR)
    #[arg(long)]
    selector: Option<String>,
    /// Seconds between checks; 0 or less checks once
    #[arg(long, allow_negative_numbers = true)]
    interval: Option<i64>,
    /// Maximum random extra seconds added to each interval
    #[arg(long)]
    jitter: Option<u64>,
    /// Alert only for dates on or before this one (YYYY-MM-DD)
    #[arg(long)]
    target_date: Option<NaiveDate>,
    /// Saved browser session file
    #[arg(long)]
    session: Option<PathBuf>,
    /// Check once and exit, whatever the interval
    #[arg(long)]
    once: bool,
}

impl From<RunArgs> for Overrides {
    fn from(args: RunArgs) -> Self {
        Overrides {
            url: args.url,
            selector: args.selector,
            interval_secs: args.interval,
            jitter_secs: args.jitter,
            target_date: args.target_date,
            session_path: args.session,
            once: args.once,
        }
    }
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    let cli = Cli::parse();

    match cli.command {
        Some(Commands::Parse { text }) => match date::parse_date(&text) {
            Some(found) => println!("{} {}", "✔".green(), found.format("%Y-%m-%d")),
            None => println!("{} no date found", "✘".red()),
        },
        Some(Commands::Config) => {
            let config = Config::load(cli.config.as_deref())?;
            print!("{}", config.to_redacted_toml()?);
        }
        Some(Commands::Completions { shell }) => {
            let mut command = Cli::command();
            clap_complete::generate(shell, &mut command, "slotwatch", &mut std::io::stdout());
        }
        Some(Commands::Run(args)) => run(cli.config, args).await?,
        None => run(cli.config, RunArgs::default()).await?,
    }

    Ok(())
}

async fn run(config_path: Option<PathBuf>, args: RunArgs) -> anyhow::Result<()> {
    logging::init();

    let mut config = Config::load(config_path.as_deref())?;
    config.apply_overrides(args.into());
    config.validate()?;

    let notifier = Notifier::from_config(&config.telegram, &config.email)?;
    let channels = notifier.channel_names();
    if channels.is_empty() {
        warn!("no notification channel configured; alerts will be reported as failed");
    }

    info!(
        url = config.page_url(),
        selector = %config.target.selector,
        interval = config.schedule.interval_secs,
        jitter = config.schedule.jitter_secs,
        target = ?config.schedule.earliest_target_date,
        channels = ?channels,
        "watching for availability"
    );

    let fetcher = HttpFetcher::new()?;
    let mut watcher = Watcher::new(&config, Box::new(fetcher), notifier)?;
    watcher.run().await;

    Ok(())
}
