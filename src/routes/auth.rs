use axum::{
    extract::{Json, State},
    http::StatusCode,
    response::IntoResponse,
    routing::{get, post},
    Router,
};
use serde_json::json;

use crate::error::AppResult;
use crate::models::user::{LoginReq, MeResponse, SignupReq};
use crate::rbac::AuthUser;
use crate::services::auth_service;
use crate::AppState;

async fn signup(
    State(state): State<AppState>,
    Json(req): Json<SignupReq>,
) -> AppResult<impl IntoResponse> {
    let user = auth_service::signup(&state.pool, &state.config, req).await?;
    let session = auth_service::create_session(&state.pool, &user).await?;
    Ok((StatusCode::CREATED, Json(session)))
}

async fn login(
    State(state): State<AppState>,
    Json(req): Json<LoginReq>,
) -> AppResult<impl IntoResponse> {
    let session = auth_service::login(&state.pool, &req.email, &req.password).await?;
    Ok(Json(session))
}

async fn logout(
    State(state): State<AppState>,
    auth: AuthUser,
) -> AppResult<impl IntoResponse> {
    auth_service::logout(&state.pool, &auth.token).await?;
    tracing::info!(user_id = %auth.user.id, "logout");
    Ok(Json(json!({ "ok": true })))
}

async fn me(auth: AuthUser) -> Json<MeResponse> {
    Json(MeResponse::from(&auth.user))
}

pub fn router() -> Router<AppState> {
    Router::new()
        .route("/auth/signup", post(signup))
        .route("/auth/login", post(login))
        .route("/auth/logout", post(logout))
        .route("/auth/me", get(me))
}
