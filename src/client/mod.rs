//! Queue client: talks to the server and keeps the local queue in step.

mod api;
mod driver;
mod error;
mod events;

pub use api::{ApiClient, ConvertedArtifact, HealthStatus};
pub use driver::{BatchReport, CommandOutcome, QueueCommand, QueueDriver, DEFAULT_BATCH_PAUSE};
pub use error::ClientError;
pub use events::{ProgressSubscription, SseDecoder, StreamEvent};
