use anyhow::{bail, Context, Result};
use clap::{Parser, Subcommand};
use std::path::PathBuf;
use std::time::Duration;
use tracing::{info, level_filters::LevelFilter};
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt, EnvFilter};

mod cli_style;

use cli_style::get_styles;
use tunegrab::client::{ApiClient, ClientError, CommandOutcome, QueueCommand, QueueDriver};
use tunegrab::link::{LinkRules, DEFAULT_DOMAIN};
use tunegrab::queue::{status_text, JsonFileBackend, QueueStore, QueueView};

#[derive(Parser, Debug)]
#[command(styles=get_styles())]
struct CliArgs {
    /// Base url of the conversion server.
    #[clap(long, default_value = "http://127.0.0.1:3000")]
    pub server: String,

    /// Where the queue is kept between runs.
    #[clap(long, default_value = "tunegrab-queue.json")]
    pub state_file: PathBuf,

    /// Only links on this domain are accepted.
    #[clap(long, default_value = DEFAULT_DOMAIN)]
    pub allowed_domain: String,

    /// Timeout for plain requests, in seconds.
    #[clap(long, default_value_t = 120)]
    pub timeout_secs: u64,

    #[command(subcommand)]
    command: Command,
}

#[derive(Subcommand, Debug)]
enum Command {
    /// Resolves a link and queues it; collections queue every member.
    Add { url: String },

    /// Shows the queue.
    List,

    /// Converts one queued item.
    Download { id: u64 },

    /// Converts every pending item, one after the other.
    DownloadAll,

    /// Saves every completed item into a local directory.
    DownloadCompleted {
        #[clap(long, default_value = ".")]
        dest: PathBuf,
    },

    /// Removes one item from the queue.
    Remove { id: u64 },

    /// Removes every item from the queue.
    Clear {
        /// Confirms the removal.
        #[clap(long)]
        yes: bool,
    },
}

impl Command {
    fn into_queue_command(self) -> Option<QueueCommand> {
        Some(match self {
            Command::Add { url } => QueueCommand::Add { url },
            Command::List => return None,
            Command::Download { id } => QueueCommand::Download { id },
            Command::DownloadAll => QueueCommand::DownloadAll,
            Command::DownloadCompleted { dest } => QueueCommand::DownloadCompleted { dest },
            Command::Remove { id } => QueueCommand::Remove { id },
            Command::Clear { yes } => QueueCommand::Clear { confirmed: yes },
        })
    }
}

fn print_queue(driver: &QueueDriver) {
    let store = driver.store();
    if store.is_empty() {
        println!("Queue is empty");
    }
    for item in store.items() {
        let collection = item
            .collection_name
            .as_deref()
            .map(|name| format!(" [{}]", name))
            .unwrap_or_default();
        println!(
            "{:>4}  {:<11}  {}{}  ({})",
            item.id,
            item.status.to_string(),
            item.display_title(),
            collection,
            status_text(item)
        );
    }

    let QueueView {
        summary,
        download_all,
        download_completed,
    } = driver.view();
    println!();
    println!(
        "{} pending, {} downloading, {} completed, {} failed",
        summary.pending, summary.downloading, summary.completed, summary.error
    );
    for button in [download_all, download_completed] {
        let marker = if button.enabled { "*" } else { "-" };
        println!("  {} {}", marker, button.label);
    }
}

fn print_outcome(outcome: CommandOutcome) {
    match outcome {
        CommandOutcome::Added(outcome) => {
            println!("Queued {} item(s)", outcome.added.len());
            if outcome.skipped_duplicates > 0 {
                println!("Skipped {} already queued", outcome.skipped_duplicates);
            }
        }
        CommandOutcome::Finished { id, status } => println!("Item {} is {}", id, status),
        CommandOutcome::Batch(report) => println!(
            "Batch finished: {} completed, {} failed",
            report.completed, report.failed
        ),
        CommandOutcome::Saved(paths) => {
            for path in &paths {
                println!("Saved {}", path.display());
            }
            println!("{} file(s) saved", paths.len());
        }
        CommandOutcome::Removed(item) => println!("Removed {}", item.display_title()),
        CommandOutcome::Cleared(count) => println!("Removed {} item(s)", count),
    }
}

#[tokio::main]
async fn main() -> Result<()> {
    let cli_args = CliArgs::parse();

    tracing_subscriber::registry()
        .with(tracing_subscriber::fmt::layer().with_writer(std::io::stderr))
        .with(
            EnvFilter::builder()
                .with_default_directive(LevelFilter::INFO.into())
                .with_env_var("LOG_LEVEL")
                .from_env_lossy(),
        )
        .try_init()
        .context("Failed to initialize logging")?;

    let backend = JsonFileBackend::new(&cli_args.state_file);
    info!("Using queue file {:?}", backend.path());
    let store = QueueStore::open(Box::new(backend)).context("Failed to open queue")?;

    let api = ApiClient::new(&cli_args.server, Duration::from_secs(cli_args.timeout_secs))
        .context("Failed to create HTTP client")?;
    let mut driver = QueueDriver::new(api, store, LinkRules::for_domain(&cli_args.allowed_domain));

    let Some(command) = cli_args.command.into_queue_command() else {
        print_queue(&driver);
        return Ok(());
    };

    match driver.dispatch(command).await {
        Ok(outcome) => {
            print_outcome(outcome);
            Ok(())
        }
        Err(ClientError::Queue(err)) => bail!("{}", err),
        Err(err) => Err(err).context("Command failed"),
    }
}
