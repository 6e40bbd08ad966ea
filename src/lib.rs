pub mod config;
pub mod db;
pub mod error;
pub mod models;
pub mod rbac;
pub mod routes;
pub mod services;
pub mod telemetry;

use std::sync::Arc;

use axum::{extract::FromRef, Router};
use sqlx::SqlitePool;
use tower_http::{cors::CorsLayer, trace::TraceLayer};

use crate::config::Config;
use crate::services::{event_stream::EventHub, exam_service::ExamAnalyst, media_service::MediaClient};

#[derive(Clone)]
pub struct AppState {
    pub pool: SqlitePool,
    pub events: Arc<EventHub>,
    pub media: Arc<MediaClient>,
    pub analyst: Arc<ExamAnalyst>,
    pub config: Arc<Config>,
}

impl AppState {
    pub fn new(pool: SqlitePool, config: Config) -> Self {
        Self {
            pool,
            events: Arc::new(EventHub::new()),
            media: Arc::new(MediaClient::new(config.media.clone())),
            analyst: Arc::new(ExamAnalyst::new(config.ai.clone())),
            config: Arc::new(config),
        }
    }
}

impl FromRef<AppState> for SqlitePool {
    fn from_ref(state: &AppState) -> Self {
        state.pool.clone()
    }
}

impl FromRef<AppState> for Arc<EventHub> {
    fn from_ref(state: &AppState) -> Self {
        state.events.clone()
    }
}

impl FromRef<AppState> for Arc<MediaClient> {
    fn from_ref(state: &AppState) -> Self {
        state.media.clone()
    }
}

impl FromRef<AppState> for Arc<ExamAnalyst> {
    fn from_ref(state: &AppState) -> Self {
        state.analyst.clone()
    }
}

impl FromRef<AppState> for Arc<Config> {
    fn from_ref(state: &AppState) -> Self {
        state.config.clone()
    }
}

/// The full HTTP surface with its middleware, ready to serve.
pub fn app(state: AppState) -> Router {
    routes::router()
        .layer(CorsLayer::permissive())
        .layer(TraceLayer::new_for_http())
        .with_state(state)
}
