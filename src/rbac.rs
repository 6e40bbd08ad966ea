use axum::{
    async_trait,
    extract::{FromRef, FromRequestParts},
    http::{header::AUTHORIZATION, request::Parts},
};
use sqlx::SqlitePool;

use crate::error::AppError;
use crate::models::user::User;
use crate::services::auth_service;

/// Signed-in user, resolved from `Authorization: Bearer <token>` on every
/// request so role and points are never stale.
#[derive(Debug, Clone)]
pub struct AuthUser {
    pub user: User,
    pub token: String,
}

pub fn bearer_token(parts: &Parts) -> Option<&str> {
    parts
        .headers
        .get(AUTHORIZATION)
        .and_then(|v| v.to_str().ok())
        .and_then(|v| v.strip_prefix("Bearer "))
        .map(str::trim)
        .filter(|t| !t.is_empty())
}

#[async_trait]
impl<S> FromRequestParts<S> for AuthUser
where
    S: Send + Sync,
    SqlitePool: FromRef<S>,
{
    type Rejection = AppError;

    async fn from_request_parts(parts: &mut Parts, state: &S) -> Result<Self, Self::Rejection> {
        let token = bearer_token(parts)
            .ok_or_else(|| AppError::Unauthorized("Missing or invalid token".into()))?
            .to_string();
        let pool = SqlitePool::from_ref(state);
        match auth_service::resolve_session(&pool, &token).await? {
            Some(user) => Ok(AuthUser { user, token }),
            None => Err(AppError::Unauthorized("Session expired, please log in again".into())),
        }
    }
}

pub struct AdminUser(pub User);

#[async_trait]
impl<S> FromRequestParts<S> for AdminUser
where
    S: Send + Sync,
    SqlitePool: FromRef<S>,
{
    type Rejection = AppError;

    async fn from_request_parts(parts: &mut Parts, state: &S) -> Result<Self, Self::Rejection> {
        let AuthUser { user, .. } = AuthUser::from_request_parts(parts, state).await?;
        if user.is_admin() {
            Ok(AdminUser(user))
        } else {
            tracing::debug!(user_id = %user.id, "admin route refused");
            Err(AppError::Forbidden("Admin rights required".into()))
        }
    }
}
