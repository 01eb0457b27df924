//! Upstream metadata lookups through the external fetch tool.

use async_trait::async_trait;
use std::path::PathBuf;
use std::process::Stdio;
use std::time::Duration;
use thiserror::Error;
use tokio::process::Command;
use tracing::debug;

use super::models::ItemFields;

const ITEM_FIELDS_TEMPLATE: &str = "%(title)s|%(uploader)s|%(duration)s";
const MEMBER_URL_TEMPLATE: &str = "%(url)s";

const ALTERNATE_USER_AGENT: &str =
    "Mozilla/5.0 (Windows NT 10.0; Win64; x64) AppleWebKit/537.36";
const ALTERNATE_ACCEPT: &str =
    "Accept:text/html,application/xhtml+xml,application/xml;q=0.9,*/*;q=0.8";

#[derive(Debug, Error)]
pub enum LookupError {
    #[error("failed to launch {tool}: {source}")]
    Spawn {
        tool: String,
        #[source]
        source: std::io::Error,
    },

    #[error("lookup timed out after {0:?}")]
    Timeout(Duration),

    #[error("lookup exited with code {code:?}: {stderr}")]
    Failed { code: Option<i32>, stderr: String },

    #[error("lookup produced no output")]
    Empty,
}

/// Request variations used to get past transient upstream rejection.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum RequestProfile {
    Default,
    AlternateUserAgent,
    AlternateAccept,
}

impl RequestProfile {
    fn extra_args(&self) -> Vec<&'static str> {
        match self {
            RequestProfile::Default => vec![],
            RequestProfile::AlternateUserAgent => vec!["--user-agent", ALTERNATE_USER_AGENT],
            RequestProfile::AlternateAccept => vec!["--add-header", ALTERNATE_ACCEPT],
        }
    }
}

/// Access to upstream metadata.
#[async_trait]
pub trait MetadataLookup: Send + Sync {
    /// Title, uploader and duration of a single item.
    async fn describe(&self, url: &str, timeout: Duration) -> Result<ItemFields, LookupError>;

    /// Member urls of a collection, in upstream order.
    async fn enumerate(
        &self,
        url: &str,
        profile: RequestProfile,
        timeout: Duration,
    ) -> Result<Vec<String>, LookupError>;
}

/// [`MetadataLookup`] backed by a yt-dlp compatible executable.
pub struct ToolLookup {
    tool_path: PathBuf,
}

impl ToolLookup {
    pub fn new(tool_path: impl Into<PathBuf>) -> Self {
        Self {
            tool_path: tool_path.into(),
        }
    }

    async fn run(&self, args: Vec<&str>, timeout: Duration) -> Result<String, LookupError> {
        debug!("Running {:?} {:?}", self.tool_path, args);
        let output = Command::new(&self.tool_path)
            .args(&args)
            .stdin(Stdio::null())
            .stdout(Stdio::piped())
            .stderr(Stdio::piped())
            .kill_on_drop(true)
            .output();

        let output = tokio::time::timeout(timeout, output)
            .await
            .map_err(|_| LookupError::Timeout(timeout))?
            .map_err(|source| LookupError::Spawn {
                tool: self.tool_path.display().to_string(),
                source,
            })?;

        if !output.status.success() {
            let stderr = String::from_utf8_lossy(&output.stderr).trim().to_string();
            return Err(LookupError::Failed {
                code: output.status.code(),
                stderr,
            });
        }

        let stdout = String::from_utf8_lossy(&output.stdout).trim().to_string();
        if stdout.is_empty() {
            return Err(LookupError::Empty);
        }
        Ok(stdout)
    }
}

#[async_trait]
impl MetadataLookup for ToolLookup {
    async fn describe(&self, url: &str, timeout: Duration) -> Result<ItemFields, LookupError> {
        let stdout = self
            .run(vec!["--print", ITEM_FIELDS_TEMPLATE, url], timeout)
            .await?;
        Ok(ItemFields::parse_delimited(&stdout))
    }

    async fn enumerate(
        &self,
        url: &str,
        profile: RequestProfile,
        timeout: Duration,
    ) -> Result<Vec<String>, LookupError> {
        let mut args = profile.extra_args();
        args.extend(["--flat-playlist", "--print", MEMBER_URL_TEMPLATE, url]);
        let stdout = self.run(args, timeout).await?;
        Ok(stdout
            .lines()
            .map(str::trim)
            .filter(|l| !l.is_empty())
            .map(str::to_string)
            .collect())
    }
}
