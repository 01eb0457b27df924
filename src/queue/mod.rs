//! Client-side download queue.

mod models;
mod persistence;
mod store;
mod view;

pub use models::{NewItem, QueueItem, QueueSnapshot, QueueStatus};
pub use persistence::{JsonFileBackend, MemoryBackend, QueueBackend};
pub use store::{InsertOutcome, QueueError, QueueStore, STARTING_MESSAGE, TRANSPORT_ERROR_MESSAGE};
pub use view::{status_text, ButtonState, QueueSummary, QueueView};
