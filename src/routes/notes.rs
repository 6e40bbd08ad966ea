use std::sync::Arc;

use axum::{
    extract::{DefaultBodyLimit, Json, Multipart, Path, Query, State},
    http::StatusCode,
    response::IntoResponse,
    routing::{get, post},
    Router,
};
use serde::Deserialize;
use serde_json::json;

use crate::error::{AppError, AppResult};
use crate::models::filter::NoteFilter;
use crate::models::note::{NewNote, NoteListResponse, ResourceType};
use crate::rbac::AuthUser;
use crate::services::event_stream::EventHub;
use crate::services::media_service::StoredFile;
use crate::services::note_service;
use crate::AppState;

pub const MAX_UPLOAD_BYTES: usize = 25 * 1024 * 1024;
const DEFAULT_BEST_LIMIT: usize = 20;

#[derive(Debug, Deserialize)]
pub struct LimitQuery {
    pub limit: Option<usize>,
}

#[derive(Debug, Deserialize)]
pub struct SetLikeReq {
    pub liked: bool,
}

/// An upload form as it arrives: text fields plus at most one file part.
struct UploadForm {
    note: NewNote,
    file: Option<(String, Vec<u8>)>,
}

fn form_error(e: axum::extract::multipart::MultipartError) -> AppError {
    AppError::invalid(format!("Malformed upload: {e}"))
}

async fn read_form(mut multipart: Multipart) -> AppResult<UploadForm> {
    let mut note = NewNote::default();
    let mut file = None;

    while let Some(field) = multipart.next_field().await.map_err(form_error)? {
        let name = field.name().unwrap_or_default().to_string();
        if name == "file" {
            let file_name = field
                .file_name()
                .map(str::to_string)
                .unwrap_or_else(|| "upload.bin".into());
            let bytes = field.bytes().await.map_err(form_error)?;
            if !bytes.is_empty() {
                file = Some((file_name, bytes.to_vec()));
            }
            continue;
        }

        let value = field.text().await.map_err(form_error)?;
        match name.as_str() {
            "title" => note.title = value,
            "description" => note.description = Some(value),
            "resource_type" => note.resource_type = value.parse::<ResourceType>().ok(),
            "branch" => note.branch = value,
            "semester" => {
                note.semester = value
                    .trim()
                    .parse()
                    .map_err(|_| AppError::field("semester", "Semester must be a number"))?;
            }
            "subject" => note.subject = value,
            "module" => note.module = Some(value),
            other => tracing::debug!(field = other, "ignoring unknown upload field"),
        }
    }
    Ok(UploadForm { note, file })
}

async fn list_notes(
    State(state): State<AppState>,
    auth: AuthUser,
    Query(filter): Query<NoteFilter>,
) -> AppResult<impl IntoResponse> {
    let notes = note_service::list_notes(&state.pool, &filter, &auth.user).await?;
    Ok(Json(NoteListResponse::new(notes)))
}

async fn upload_note(
    State(state): State<AppState>,
    auth: AuthUser,
    multipart: Multipart,
) -> AppResult<impl IntoResponse> {
    let UploadForm { note, file } = read_form(multipart).await?;
    note_service::validate_new_note(&note)?;

    let stored: Option<StoredFile> = match file {
        Some((name, bytes)) => Some(state.media.upload(&name, bytes).await?),
        None => None,
    };
    let created = note_service::create_note(
        &state.pool,
        &state.events,
        &auth.user,
        note,
        stored,
        state.config.upload_points,
    )
    .await?;
    Ok((StatusCode::CREATED, Json(created)))
}

async fn best_notes(
    State(state): State<AppState>,
    _auth: AuthUser,
    Query(filter): Query<NoteFilter>,
    Query(limit): Query<LimitQuery>,
) -> AppResult<impl IntoResponse> {
    let limit = limit.limit.unwrap_or(DEFAULT_BEST_LIMIT).clamp(1, 100);
    let ranked = note_service::best_notes(&state.pool, &filter, limit).await?;
    Ok(Json(json!({ "notes": ranked, "total": ranked.len() })))
}

async fn get_note(
    State(state): State<AppState>,
    auth: AuthUser,
    Path(note_id): Path<String>,
) -> AppResult<impl IntoResponse> {
    let note = note_service::get_visible(&state.pool, &note_id, &auth.user).await?;
    Ok(Json(note_service::view(&state.pool, note, &auth.user).await?))
}

async fn delete_note(
    State(pool): State<sqlx::SqlitePool>,
    State(events): State<Arc<EventHub>>,
    auth: AuthUser,
    Path(note_id): Path<String>,
) -> AppResult<impl IntoResponse> {
    note_service::delete_note(&pool, &events, &note_id, &auth.user).await?;
    Ok(Json(json!({ "ok": true, "id": note_id })))
}

async fn toggle_like(
    State(pool): State<sqlx::SqlitePool>,
    State(events): State<Arc<EventHub>>,
    auth: AuthUser,
    Path(note_id): Path<String>,
) -> AppResult<impl IntoResponse> {
    Ok(Json(note_service::toggle_like(&pool, &events, &note_id, &auth.user).await?))
}

async fn set_like(
    State(pool): State<sqlx::SqlitePool>,
    State(events): State<Arc<EventHub>>,
    auth: AuthUser,
    Path(note_id): Path<String>,
    Json(req): Json<SetLikeReq>,
) -> AppResult<impl IntoResponse> {
    Ok(Json(
        note_service::set_like(&pool, &events, &note_id, &auth.user, req.liked).await?,
    ))
}

async fn toggle_bookmark(
    State(pool): State<sqlx::SqlitePool>,
    auth: AuthUser,
    Path(note_id): Path<String>,
) -> AppResult<impl IntoResponse> {
    let bookmarked = note_service::toggle_bookmark(&pool, &note_id, &auth.user).await?;
    Ok(Json(json!({ "id": note_id, "bookmarked": bookmarked })))
}

async fn download(
    State(pool): State<sqlx::SqlitePool>,
    State(events): State<Arc<EventHub>>,
    auth: AuthUser,
    Path(note_id): Path<String>,
) -> AppResult<impl IntoResponse> {
    Ok(Json(
        note_service::record_download(&pool, &events, &note_id, &auth.user).await?,
    ))
}

pub fn router() -> Router<AppState> {
    Router::new()
        .route(
            "/notes",
            get(list_notes)
                .post(upload_note)
                .layer(DefaultBodyLimit::max(MAX_UPLOAD_BYTES)),
        )
        .route("/notes/best", get(best_notes))
        .route("/notes/:id", get(get_note).delete(delete_note))
        .route("/notes/:id/like", post(toggle_like).put(set_like))
        .route("/notes/:id/bookmark", post(toggle_bookmark))
        .route("/notes/:id/download", post(download))
}

