use serde::Serialize;
use sqlx::{FromRow, SqlitePool};

use crate::error::{AppError, AppResult};
use crate::models::note::{Note, NoteStatus};
use crate::models::user::{PointsKind, Role, User};
use crate::services::event_stream::EventHub;
use crate::services::{auth_service, note_service, points_service};

/// Largest single admin adjustment, either direction.
pub const MAX_GRANT: i64 = 1_000_000;

#[derive(Debug, Clone, Serialize, FromRow, PartialEq, Eq)]
pub struct BranchCount {
    pub branch: String,
    pub count: i64,
}

#[derive(Debug, Clone, Serialize)]
pub struct AdminStats {
    pub pending: i64,
    pub approved: i64,
    pub rejected: i64,
    pub verified: i64,
    pub total_notes: i64,
    pub total_users: i64,
    pub by_branch: Vec<BranchCount>,
}

async fn set_status(
    pool: &SqlitePool,
    events: &EventHub,
    note_id: &str,
    status: NoteStatus,
) -> AppResult<Note> {
    let result = sqlx::query("UPDATE notes SET status = ? WHERE id = ?")
        .bind(status)
        .bind(note_id)
        .execute(pool)
        .await?;
    if result.rows_affected() == 0 {
        return Err(AppError::NotFound("Note"));
    }
    tracing::info!(note_id, status = ?status, "note moderated");
    note_service::publish_update(pool, events, note_id).await;
    note_service::get_note(pool, note_id)
        .await?
        .ok_or(AppError::NotFound("Note"))
}

pub async fn approve(pool: &SqlitePool, events: &EventHub, note_id: &str) -> AppResult<Note> {
    set_status(pool, events, note_id, NoteStatus::Approved).await
}

pub async fn reject(pool: &SqlitePool, events: &EventHub, note_id: &str) -> AppResult<Note> {
    set_status(pool, events, note_id, NoteStatus::Rejected).await
}

/// Flips the admin upvote; the verified badge always follows it. Becoming
/// verified pays the uploader the verification bonus.
pub async fn toggle_verify(
    pool: &SqlitePool,
    events: &EventHub,
    note_id: &str,
    verify_bonus: i64,
) -> AppResult<Note> {
    let result = sqlx::query(
        "UPDATE notes SET admin_upvoted = NOT admin_upvoted, admin_verified = NOT admin_upvoted \
         WHERE id = ?",
    )
    .bind(note_id)
    .execute(pool)
    .await?;
    if result.rows_affected() == 0 {
        return Err(AppError::NotFound("Note"));
    }

    let note = note_service::get_note(pool, note_id)
        .await?
        .ok_or(AppError::NotFound("Note"))?;
    tracing::info!(note_id, verified = note.admin_verified, "verification toggled");

    if note.admin_verified {
        points_service::award_best_effort(
            pool,
            events,
            &note.uploader_id,
            verify_bonus,
            PointsKind::AdminVerified,
            &format!("\"{}\" verified by admin", note.title),
        )
        .await;
    }
    note_service::publish_update(pool, events, note_id).await;
    Ok(note)
}

pub async fn delete(pool: &SqlitePool, events: &EventHub, note_id: &str, admin: &User) -> AppResult<()> {
    note_service::delete_note(pool, events, note_id, admin).await
}

pub async fn grant_points(
    pool: &SqlitePool,
    events: &EventHub,
    user_id: &str,
    amount: i64,
    description: Option<&str>,
) -> AppResult<i64> {
    if amount == 0 {
        return Err(AppError::field("amount", "Amount must not be zero"));
    }
    if !(-MAX_GRANT..=MAX_GRANT).contains(&amount) {
        return Err(AppError::field(
            "amount",
            format!("Amount must be between -{MAX_GRANT} and {MAX_GRANT}"),
        ));
    }
    let description = description
        .map(str::trim)
        .filter(|d| !d.is_empty())
        .unwrap_or("Adjusted by admin");
    points_service::award(pool, events, user_id, amount, PointsKind::AdminGrant, description).await
}

pub async fn list_users(pool: &SqlitePool) -> AppResult<Vec<User>> {
    auth_service::list_users(pool).await
}

pub async fn set_role(pool: &SqlitePool, user_id: &str, role: Role) -> AppResult<User> {
    let user = auth_service::set_role(pool, user_id, role).await?;
    tracing::info!(user_id, role = role.as_str(), "role changed");
    Ok(user)
}

pub async fn stats(pool: &SqlitePool) -> AppResult<AdminStats> {
    let (pending, approved, rejected, verified, total_notes): (i64, i64, i64, i64, i64) =
        sqlx::query_as(
            r#"
            SELECT
                COALESCE(SUM(status = 'pending'), 0),
                COALESCE(SUM(status = 'approved'), 0),
                COALESCE(SUM(status = 'rejected'), 0),
                COALESCE(SUM(admin_verified), 0),
                COUNT(*)
            FROM notes
            "#,
        )
        .fetch_one(pool)
        .await?;
    let total_users: i64 = sqlx::query_scalar("SELECT COUNT(*) FROM users")
        .fetch_one(pool)
        .await?;
    let by_branch = sqlx::query_as::<_, BranchCount>(
        "SELECT branch, COUNT(*) AS count FROM notes GROUP BY branch ORDER BY count DESC, branch ASC",
    )
    .fetch_all(pool)
    .await?;

    Ok(AdminStats {
        pending,
        approved,
        rejected,
        verified,
        total_notes,
        total_users,
        by_branch,
    })
}
