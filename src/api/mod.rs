pub mod games;
pub mod health;

use crate::config::Config;
use crate::orchestration::{Orchestrator, ViewStore};
use axum::{routing::get, Router};
use std::sync::Arc;
use tower_http::cors::{Any, CorsLayer};

#[derive(Clone)]
pub struct AppState {
    pub orchestrator: Arc<Orchestrator>,
    pub store: ViewStore,
    pub config: Config,
}

impl AppState {
    pub fn new(orchestrator: Arc<Orchestrator>, store: ViewStore, config: Config) -> Self {
        Self {
            orchestrator,
            store,
            config,
        }
    }
}

pub fn create_router(state: AppState) -> Router {
    let cors = CorsLayer::new()
        .allow_origin(Any)
        .allow_methods(Any)
        .allow_headers(Any);

    Router::new()
        .route("/health", get(health::health))
        .route("/ready", get(health::ready))
        .route("/v1/games/:id", get(games::get_game))
        .route("/v1/games/:id/rounds/:round", get(games::get_round))
        .route("/v1/games/:id/projection", get(games::get_projection))
        .route("/v1/games/:id/placements", get(games::get_placements))
        .layer(cors)
        .with_state(state)
}
