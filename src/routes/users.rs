use axum::{
    extract::{Json, Query, State},
    response::IntoResponse,
    routing::get,
    Router,
};
use serde::Deserialize;
use serde_json::json;
use sqlx::SqlitePool;

use crate::error::AppResult;
use crate::models::filter::NoteFilter;
use crate::models::note::NoteListResponse;
use crate::rbac::AuthUser;
use crate::services::{note_service, points_service};
use crate::AppState;

const DEFAULT_LEADERBOARD_SIZE: i64 = 10;

#[derive(Debug, Deserialize)]
pub struct LeaderboardQuery {
    pub limit: Option<i64>,
}

/// Own uploads in every status, so pending and rejected submissions show up.
async fn my_notes(
    State(pool): State<SqlitePool>,
    auth: AuthUser,
    Query(mut filter): Query<NoteFilter>,
) -> AppResult<impl IntoResponse> {
    filter.uploader_id = Some(auth.user.id.clone());
    let notes = note_service::list_notes(&pool, &filter, &auth.user).await?;
    Ok(Json(NoteListResponse::new(notes)))
}

async fn my_bookmarks(
    State(pool): State<SqlitePool>,
    auth: AuthUser,
) -> AppResult<impl IntoResponse> {
    let notes = note_service::list_bookmarks(&pool, &auth.user).await?;
    Ok(Json(NoteListResponse::new(notes)))
}

async fn my_points(
    State(pool): State<SqlitePool>,
    auth: AuthUser,
) -> AppResult<impl IntoResponse> {
    let history = points_service::history(&pool, &auth.user.id).await?;
    Ok(Json(json!({
        "points": auth.user.points,
        "total_points_earned": auth.user.total_points_earned,
        "total_points_spent": auth.user.total_points_spent,
        "history": history,
    })))
}

async fn leaderboard(
    State(pool): State<SqlitePool>,
    _auth: AuthUser,
    Query(q): Query<LeaderboardQuery>,
) -> AppResult<impl IntoResponse> {
    let entries =
        points_service::leaderboard(&pool, q.limit.unwrap_or(DEFAULT_LEADERBOARD_SIZE)).await?;
    Ok(Json(json!({ "students": entries })))
}

pub fn router() -> Router<AppState> {
    Router::new()
        .route("/users/me/notes", get(my_notes))
        .route("/users/me/bookmarks", get(my_bookmarks))
        .route("/users/me/points", get(my_points))
        .route("/leaderboard", get(leaderboard))
}
