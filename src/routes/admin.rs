use std::sync::Arc;

use axum::{
    extract::{Json, Path, Query, State},
    response::IntoResponse,
    routing::{get, patch, post},
    Router,
};
use serde::Deserialize;
use serde_json::json;
use sqlx::SqlitePool;

use crate::error::{AppError, AppResult};
use crate::models::filter::NoteFilter;
use crate::models::note::NoteListResponse;
use crate::models::user::Role;
use crate::rbac::AdminUser;
use crate::services::event_stream::EventHub;
use crate::services::{admin_service, note_service};
use crate::AppState;

#[derive(Deserialize)]
pub struct UpdateRoleReq {
    pub role: String,
}

#[derive(Deserialize)]
pub struct GrantPointsReq {
    pub amount: i64,
    pub description: Option<String>,
}

async fn list_notes(
    AdminUser(admin): AdminUser,
    State(pool): State<SqlitePool>,
    Query(filter): Query<NoteFilter>,
) -> AppResult<impl IntoResponse> {
    let notes = note_service::list_notes(&pool, &filter, &admin).await?;
    Ok(Json(NoteListResponse::new(notes)))
}

async fn approve(
    _admin: AdminUser,
    State(pool): State<SqlitePool>,
    State(events): State<Arc<EventHub>>,
    Path(note_id): Path<String>,
) -> AppResult<impl IntoResponse> {
    Ok(Json(admin_service::approve(&pool, &events, &note_id).await?))
}

async fn reject(
    _admin: AdminUser,
    State(pool): State<SqlitePool>,
    State(events): State<Arc<EventHub>>,
    Path(note_id): Path<String>,
) -> AppResult<impl IntoResponse> {
    Ok(Json(admin_service::reject(&pool, &events, &note_id).await?))
}

async fn toggle_verify(
    _admin: AdminUser,
    State(state): State<AppState>,
    Path(note_id): Path<String>,
) -> AppResult<impl IntoResponse> {
    let note = admin_service::toggle_verify(
        &state.pool,
        &state.events,
        &note_id,
        state.config.verify_bonus,
    )
    .await?;
    Ok(Json(note))
}

async fn delete_note(
    AdminUser(admin): AdminUser,
    State(pool): State<SqlitePool>,
    State(events): State<Arc<EventHub>>,
    Path(note_id): Path<String>,
) -> AppResult<impl IntoResponse> {
    admin_service::delete(&pool, &events, &note_id, &admin).await?;
    Ok(Json(json!({ "ok": true, "id": note_id })))
}

async fn stats(_admin: AdminUser, State(pool): State<SqlitePool>) -> AppResult<impl IntoResponse> {
    Ok(Json(admin_service::stats(&pool).await?))
}

async fn list_users(_admin: AdminUser, State(pool): State<SqlitePool>) -> AppResult<impl IntoResponse> {
    let users = admin_service::list_users(&pool).await?;
    Ok(Json(json!({ "users": users, "total": users.len() })))
}

async fn update_user_role(
    AdminUser(admin): AdminUser,
    State(pool): State<SqlitePool>,
    Path(user_id): Path<String>,
    Json(req): Json<UpdateRoleReq>,
) -> AppResult<impl IntoResponse> {
    let role = match req.role.trim() {
        "student" => Role::Student,
        "faculty" => Role::Faculty,
        "admin" => Role::Admin,
        _ => return Err(AppError::field("role", "Please select a role")),
    };
    if user_id == admin.id && role != Role::Admin {
        return Err(AppError::Forbidden("Admins cannot demote themselves".into()));
    }
    Ok(Json(admin_service::set_role(&pool, &user_id, role).await?))
}

async fn grant_points(
    _admin: AdminUser,
    State(pool): State<SqlitePool>,
    State(events): State<Arc<EventHub>>,
    Path(user_id): Path<String>,
    Json(req): Json<GrantPointsReq>,
) -> AppResult<impl IntoResponse> {
    let points = admin_service::grant_points(
        &pool,
        &events,
        &user_id,
        req.amount,
        req.description.as_deref(),
    )
    .await?;
    Ok(Json(json!({ "user_id": user_id, "points": points })))
}

pub fn router() -> Router<AppState> {
    Router::new()
        .route("/admin/notes", get(list_notes))
        .route("/admin/notes/:id", axum::routing::delete(delete_note))
        .route("/admin/notes/:id/approve", post(approve))
        .route("/admin/notes/:id/reject", post(reject))
        .route("/admin/notes/:id/verify", post(toggle_verify))
        .route("/admin/stats", get(stats))
        .route("/admin/users", get(list_users))
        .route("/admin/users/:id/role", patch(update_user_role))
        .route("/admin/users/:id/points", post(grant_points))
}
