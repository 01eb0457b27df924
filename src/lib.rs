//! Tunegrab: resolves media links, converts them to audio and streams progress.
//!
//! This library exposes the internal modules for the binaries and the tests.

pub mod background_jobs;
pub mod client;
pub mod config;
pub mod conversion;
pub mod link;
pub mod metadata;
pub mod queue;
pub mod server;

// Re-export commonly used types for convenience
pub use link::{LinkKind, LinkRules, ValidationError};
pub use server::{run_server, RequestsLoggingLevel};
