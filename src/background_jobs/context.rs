use std::path::PathBuf;
use tokio_util::sync::CancellationToken;

/// Context provided to jobs during execution.
#[derive(Clone)]
pub struct JobContext {
    /// Token to check for cancellation/shutdown requests.
    pub cancellation_token: CancellationToken,

    /// Directory holding converted artifacts.
    pub downloads_dir: PathBuf,
}

impl JobContext {
    pub fn new(cancellation_token: CancellationToken, downloads_dir: impl Into<PathBuf>) -> Self {
        Self {
            cancellation_token,
            downloads_dir: downloads_dir.into(),
        }
    }

    /// Same resources, different cancellation token.
    pub fn with_token(&self, cancellation_token: CancellationToken) -> Self {
        Self {
            cancellation_token,
            downloads_dir: self.downloads_dir.clone(),
        }
    }

    /// Jobs check this between units of work and bail out with `JobError::Cancelled`.
    pub fn is_cancelled(&self) -> bool {
        self.cancellation_token.is_cancelled()
    }
}
