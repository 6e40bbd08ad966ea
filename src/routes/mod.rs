use axum::{routing::get, Router};

use crate::AppState;

pub mod admin;
pub mod auth;
pub mod events;
pub mod exam;
pub mod notes;
pub mod users;

pub fn router() -> Router<AppState> {
    Router::new()
        .route("/healthz", get(|| async { "ok" }))
        .merge(auth::router())
        .merge(notes::router())
        .merge(users::router())
        .merge(events::router())
        .merge(exam::router())
        .merge(admin::router())
}
