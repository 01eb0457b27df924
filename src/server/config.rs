use std::time::Duration;

use super::RequestsLoggingLevel;

#[derive(Clone)]
pub struct ServerConfig {
    pub requests_logging_level: RequestsLoggingLevel,
    pub port: u16,
    /// How long a transferred artifact stays on disk after its stream ends.
    pub post_transfer_delete: Duration,
}

impl Default for ServerConfig {
    fn default() -> Self {
        ServerConfig {
            requests_logging_level: RequestsLoggingLevel::Path,
            port: 3000,
            post_transfer_delete: Duration::from_secs(5),
        }
    }
}
