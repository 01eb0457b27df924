mod file_config;

pub use file_config::{CleanupConfig, FileConfig, ResolverConfig};

use crate::link::{LinkRules, DEFAULT_DOMAIN};
use crate::metadata::ResolverSettings;
use crate::server::{RequestsLoggingLevel, ServerConfig};
use anyhow::{bail, Result};
use clap::ValueEnum;
use std::path::PathBuf;
use std::time::Duration;

pub const DEFAULT_DOWNLOADS_DIR: &str = "./downloads";
pub const DEFAULT_TOOL_PATH: &str = "yt-dlp";

/// CLI arguments that can be used for config resolution.
/// This struct mirrors the CLI arguments that can be overridden by TOML config.
#[derive(Debug, Clone, Default)]
pub struct CliConfig {
    pub port: u16,
    pub logging_level: RequestsLoggingLevel,
    pub downloads_dir: Option<PathBuf>,
    pub tool_path: Option<PathBuf>,
    pub allowed_domain: Option<String>,
}

#[derive(Debug, Clone)]
pub struct AppConfig {
    pub port: u16,
    pub logging_level: RequestsLoggingLevel,
    pub downloads_dir: PathBuf,
    pub tool_path: PathBuf,
    pub allowed_domain: String,

    pub resolver: ResolverSettings,
    pub cleanup: CleanupSettings,
}

#[derive(Debug, Clone, PartialEq)]
pub struct CleanupSettings {
    pub retention: Duration,
    pub sweep_interval: Duration,
    pub post_transfer_delete: Duration,
}

impl Default for CleanupSettings {
    fn default() -> Self {
        Self {
            retention: Duration::from_secs(60 * 60),
            sweep_interval: Duration::from_secs(30 * 60),
            post_transfer_delete: Duration::from_secs(5),
        }
    }
}

impl AppConfig {
    /// Resolve configuration from CLI arguments and optional TOML file config.
    /// TOML values override CLI values where present.
    pub fn resolve(cli: &CliConfig, file_config: Option<FileConfig>) -> Result<Self> {
        let file = file_config.unwrap_or_default();

        let port = file.port.unwrap_or(cli.port);

        let logging_level = file
            .logging_level
            .and_then(|s| parse_logging_level(&s))
            .unwrap_or_else(|| cli.logging_level.clone());

        let downloads_dir = file
            .downloads_dir
            .map(PathBuf::from)
            .or_else(|| cli.downloads_dir.clone())
            .unwrap_or_else(|| PathBuf::from(DEFAULT_DOWNLOADS_DIR));
        if downloads_dir.exists() && !downloads_dir.is_dir() {
            bail!("downloads_dir is not a directory: {:?}", downloads_dir);
        }

        let tool_path = file
            .tool_path
            .map(PathBuf::from)
            .or_else(|| cli.tool_path.clone())
            .unwrap_or_else(|| PathBuf::from(DEFAULT_TOOL_PATH));

        let allowed_domain = file
            .allowed_domain
            .or_else(|| cli.allowed_domain.clone())
            .unwrap_or_else(|| DEFAULT_DOMAIN.to_string());
        if allowed_domain.trim().is_empty() {
            bail!("allowed_domain must not be empty");
        }

        let defaults = ResolverSettings::default();
        let resolver_file = file.resolver.unwrap_or_default();
        let resolver = ResolverSettings {
            item_timeout: resolver_file
                .item_timeout_secs
                .map(Duration::from_secs)
                .unwrap_or(defaults.item_timeout),
            enumeration_timeout: resolver_file
                .enumeration_timeout_secs
                .map(Duration::from_secs)
                .unwrap_or(defaults.enumeration_timeout),
            enrichment_timeout: resolver_file
                .enrichment_timeout_secs
                .map(Duration::from_secs)
                .unwrap_or(defaults.enrichment_timeout),
            enrichment_head: resolver_file
                .enrichment_head
                .unwrap_or(defaults.enrichment_head),
            placeholder_fallback: resolver_file
                .placeholder_fallback
                .unwrap_or(defaults.placeholder_fallback),
            placeholder_count: resolver_file
                .placeholder_count
                .unwrap_or(defaults.placeholder_count),
        };

        let cleanup_defaults = CleanupSettings::default();
        let cleanup_file = file.cleanup.unwrap_or_default();
        let cleanup = CleanupSettings {
            retention: minutes("cleanup.retention_minutes", cleanup_file.retention_minutes)?
                .unwrap_or(cleanup_defaults.retention),
            sweep_interval: minutes(
                "cleanup.sweep_interval_minutes",
                cleanup_file.sweep_interval_minutes,
            )?
            .unwrap_or(cleanup_defaults.sweep_interval),
            post_transfer_delete: cleanup_file
                .post_transfer_delete_secs
                .map(Duration::from_secs)
                .unwrap_or(cleanup_defaults.post_transfer_delete),
        };
        if cleanup.sweep_interval.is_zero() {
            bail!("cleanup.sweep_interval_minutes must be greater than zero");
        }

        Ok(Self {
            port,
            logging_level,
            downloads_dir,
            tool_path,
            allowed_domain,
            resolver,
            cleanup,
        })
    }

    pub fn link_rules(&self) -> LinkRules {
        LinkRules::for_domain(&self.allowed_domain)
    }

    pub fn server_config(&self) -> ServerConfig {
        ServerConfig {
            requests_logging_level: self.logging_level.clone(),
            port: self.port,
            post_transfer_delete: self.cleanup.post_transfer_delete,
        }
    }
}

/// Parses a logging level string into RequestsLoggingLevel.
/// Uses clap's ValueEnum trait for parsing.
fn parse_logging_level(s: &str) -> Option<RequestsLoggingLevel> {
    RequestsLoggingLevel::from_str(s, true).ok()
}

/// Longest accepted cleanup window, one year.
const MAX_MINUTES: u64 = 365 * 24 * 60;

fn minutes(key: &str, value: Option<u64>) -> Result<Option<Duration>> {
    match value {
        Some(m) if m > MAX_MINUTES => {
            bail!("{} must be at most {} (got {})", key, MAX_MINUTES, m)
        }
        Some(m) => Ok(Some(Duration::from_secs(m.saturating_mul(60)))),
        None => Ok(None),
    }
}
