use anyhow::{Context, Result};
use serde::Deserialize;
use std::path::Path;

#[derive(Debug, Deserialize, Default)]
#[serde(default)]
pub struct FileConfig {
    // Core settings (can override CLI)
    pub port: Option<u16>,
    pub logging_level: Option<String>,
    pub downloads_dir: Option<String>,
    pub tool_path: Option<String>,
    pub allowed_domain: Option<String>,

    pub resolver: Option<ResolverConfig>,
    pub cleanup: Option<CleanupConfig>,
}

#[derive(Debug, Deserialize, Default, Clone)]
#[serde(default)]
pub struct ResolverConfig {
    pub item_timeout_secs: Option<u64>,
    pub enumeration_timeout_secs: Option<u64>,
    pub enrichment_timeout_secs: Option<u64>,
    pub enrichment_head: Option<usize>,
    /// Synthesize placeholder entries when every enumeration attempt fails.
    pub placeholder_fallback: Option<bool>,
    pub placeholder_count: Option<usize>,
}

#[derive(Debug, Deserialize, Default, Clone)]
#[serde(default)]
pub struct CleanupConfig {
    pub retention_minutes: Option<u64>,
    pub sweep_interval_minutes: Option<u64>,
    pub post_transfer_delete_secs: Option<u64>,
}

impl FileConfig {
    pub fn load(path: &Path) -> Result<Self> {
        let content = std::fs::read_to_string(path)
            .with_context(|| format!("Failed to read config file: {:?}", path))?;
        toml::from_str(&content).with_context(|| format!("Failed to parse config file: {:?}", path))
    }
}
