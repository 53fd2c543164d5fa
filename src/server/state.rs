use axum::extract::FromRef;

use crate::coordinator::SessionCoordinator;
use std::sync::Arc;
use std::time::Instant;

use super::ServerConfig;

pub type GuardedCoordinator = Arc<SessionCoordinator>;

#[derive(Clone)]
pub struct ServerState {
    pub config: ServerConfig,
    pub start_time: Instant,
    pub coordinator: GuardedCoordinator,
}

impl FromRef<ServerState> for GuardedCoordinator {
    fn from_ref(input: &ServerState) -> Self {
        input.coordinator.clone()
    }
}

impl FromRef<ServerState> for ServerConfig {
    fn from_ref(input: &ServerState) -> Self {
        input.config.clone()
    }
}
