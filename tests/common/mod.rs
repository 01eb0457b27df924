//! Shared end-to-end test harness.
//!
//! Tests import from here only: `TestServer` boots the real router on a random
//! port, `FakeTool` stands in for the external fetch tool.

#![allow(dead_code)]

mod fake_tool;
mod server;
mod stub_server;

pub use fake_tool::{FakeTool, SILENT_CONVERSION};
pub use server::TestServer;
pub use stub_server::DroppingStreamServer;

pub const SINGLE_LINK: &str = "https://soundcloud.com/alice/song";
pub const COLLECTION_LINK: &str = "https://soundcloud.com/djbob/sets/summer-mix";
pub const COLLECTION_MEMBERS: [&str; 3] = [
    "https://soundcloud.com/djbob/first-song",
    "https://soundcloud.com/djbob/second-song",
    "https://soundcloud.com/djbob/third-song",
];

/// Milliseconds to wait for the server to answer its health check.
pub const SERVER_READY_TIMEOUT_MS: u64 = 5000;
pub const SERVER_READY_POLL_INTERVAL_MS: u64 = 20;
