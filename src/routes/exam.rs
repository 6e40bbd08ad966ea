use std::sync::Arc;

use axum::{
    extract::{Json, State},
    routing::post,
    Router,
};

use crate::error::AppResult;
use crate::models::prediction::{PredictReq, PredictResponse};
use crate::rbac::AuthUser;
use crate::services::exam_service::ExamAnalyst;
use crate::AppState;

async fn predict(
    State(analyst): State<Arc<ExamAnalyst>>,
    auth: AuthUser,
    Json(req): Json<PredictReq>,
) -> AppResult<Json<PredictResponse>> {
    tracing::debug!(user_id = %auth.user.id, subject = %req.subject, "exam prediction requested");
    Ok(Json(analyst.predict(req).await?))
}

pub fn router() -> Router<AppState> {
    Router::new().route("/exam/predict", post(predict))
}
