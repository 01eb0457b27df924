use anyhow::{Context, Result};
use clap::Parser;
use std::path::PathBuf;
use std::sync::Arc;
use tokio_util::sync::CancellationToken;
use tracing::{error, info, level_filters::LevelFilter};
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt, EnvFilter};

use tunegrab::background_jobs::{jobs::DownloadsSweepJob, JobContext, JobScheduler};
use tunegrab::config::{AppConfig, CliConfig, FileConfig};
use tunegrab::conversion::{ConversionRunner, ConversionSettings};
use tunegrab::metadata::{MetadataResolver, ToolLookup};
use tunegrab::server::{run_server, RequestsLoggingLevel, ServerState};

#[derive(Parser, Debug)]
struct CliArgs {
    /// Path to a TOML config file; its values override the flags below.
    #[clap(long)]
    pub config: Option<PathBuf>,

    /// The port to listen on.
    #[clap(short, long, default_value_t = 3000)]
    pub port: u16,

    /// The level of logging to perform on each request.
    #[clap(long, default_value = "path")]
    pub logging_level: RequestsLoggingLevel,

    /// Directory where converted files are written and served from.
    #[clap(long)]
    pub downloads_dir: Option<PathBuf>,

    /// Path to the yt-dlp compatible fetch tool.
    #[clap(long)]
    pub tool_path: Option<PathBuf>,

    /// Only links on this domain are accepted.
    #[clap(long)]
    pub allowed_domain: Option<String>,
}

impl CliArgs {
    fn to_cli_config(&self) -> CliConfig {
        CliConfig {
            port: self.port,
            logging_level: self.logging_level.clone(),
            downloads_dir: self.downloads_dir.clone(),
            tool_path: self.tool_path.clone(),
            allowed_domain: self.allowed_domain.clone(),
        }
    }
}

#[tokio::main]
async fn main() -> Result<()> {
    let cli_args = CliArgs::parse();

    tracing_subscriber::registry()
        .with(tracing_subscriber::fmt::layer())
        .with(
            EnvFilter::builder()
                .with_default_directive(LevelFilter::INFO.into())
                .with_env_var("LOG_LEVEL")
                .from_env_lossy(),
        )
        .try_init()
        .context("Failed to initialize logging")?;

    let file_config = match &cli_args.config {
        Some(path) => {
            info!("Loading config from {:?}", path);
            Some(FileConfig::load(path)?)
        }
        None => None,
    };
    let config = AppConfig::resolve(&cli_args.to_cli_config(), file_config)?;

    std::fs::create_dir_all(&config.downloads_dir).with_context(|| {
        format!(
            "Failed to create downloads directory {:?}",
            config.downloads_dir
        )
    })?;
    info!("Writing converted files to {:?}", config.downloads_dir);

    let lookup = Arc::new(ToolLookup::new(&config.tool_path));
    let resolver = Arc::new(MetadataResolver::new(
        lookup,
        config.link_rules(),
        config.resolver.clone(),
    ));
    let runner = Arc::new(ConversionRunner::new(
        resolver.clone(),
        ConversionSettings::new(&config.tool_path, &config.downloads_dir),
    ));

    let shutdown_token = CancellationToken::new();
    let mut scheduler = JobScheduler::new(
        shutdown_token.clone(),
        JobContext::new(shutdown_token.clone(), &config.downloads_dir),
    );
    scheduler.register_job(Arc::new(DownloadsSweepJob::new(
        config.cleanup.retention,
        config.cleanup.sweep_interval,
    )));
    let scheduler_task = tokio::spawn(async move { scheduler.run().await });

    let state = ServerState::new(
        config.server_config(),
        resolver,
        runner,
        config.downloads_dir.clone(),
    );
    let result = run_server(state).await;
    if let Err(err) = &result {
        error!("Server stopped: {:#}", err);
    }

    shutdown_token.cancel();
    let _ = scheduler_task.await;
    result
}
