use axum::extract::FromRef;
use std::path::PathBuf;
use std::sync::Arc;
use std::time::Instant;

use crate::conversion::ConversionRunner;
use crate::metadata::MetadataResolver;

use super::ServerConfig;

pub type GuardedResolver = Arc<MetadataResolver>;
pub type GuardedRunner = Arc<ConversionRunner>;

#[derive(Clone)]
pub struct ServerState {
    pub config: ServerConfig,
    pub start_time: Instant,
    pub resolver: GuardedResolver,
    pub runner: GuardedRunner,
    pub downloads_dir: PathBuf,
}

impl ServerState {
    pub fn new(
        config: ServerConfig,
        resolver: GuardedResolver,
        runner: GuardedRunner,
        downloads_dir: PathBuf,
    ) -> ServerState {
        ServerState {
            config,
            start_time: Instant::now(),
            resolver,
            runner,
            downloads_dir,
        }
    }
}

impl FromRef<ServerState> for GuardedResolver {
    fn from_ref(input: &ServerState) -> Self {
        input.resolver.clone()
    }
}

impl FromRef<ServerState> for GuardedRunner {
    fn from_ref(input: &ServerState) -> Self {
        input.runner.clone()
    }
}

impl FromRef<ServerState> for ServerConfig {
    fn from_ref(input: &ServerState) -> Self {
        input.config.clone()
    }
}
