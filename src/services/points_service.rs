/// Points balance, history log and the student leaderboard.
use sqlx::SqlitePool;

use crate::db::now_epoch;
use crate::error::{AppError, AppResult};
use crate::models::user::{LeaderboardEntry, PointsEntry, PointsKind};
use crate::services::event_stream::{EventHub, LiveEvent};

/// Apply a signed points change and log it. Returns the new balance.
pub async fn award(
    pool: &SqlitePool,
    events: &EventHub,
    user_id: &str,
    amount: i64,
    kind: PointsKind,
    description: &str,
) -> AppResult<i64> {
    let (earned, spent) = if amount >= 0 {
        (amount, 0)
    } else {
        let spent = amount
            .checked_neg()
            .ok_or_else(|| AppError::field("amount", "Amount is out of range"))?;
        (0, spent)
    };

    let mut tx = pool.begin().await?;

    // Guarded write first: the balance never drops below zero.
    let updated = sqlx::query(
        "UPDATE users SET points = points + ?, total_points_earned = total_points_earned + ?, \
         total_points_spent = total_points_spent + ? WHERE id = ? AND points + ? >= 0",
    )
    .bind(amount)
    .bind(earned)
    .bind(spent)
    .bind(user_id)
    .bind(amount)
    .execute(&mut *tx)
    .await?;

    let balance: Option<i64> = sqlx::query_scalar("SELECT points FROM users WHERE id = ?")
        .bind(user_id)
        .fetch_optional(&mut *tx)
        .await?;
    let balance = balance.ok_or(AppError::NotFound("User"))?;
    if updated.rows_affected() == 0 {
        return Err(AppError::field(
            "amount",
            format!("Insufficient points: balance is {balance}"),
        ));
    }

    insert_history(&mut tx, user_id, amount, kind, description).await?;
    tx.commit().await?;

    let points = balance;
    tracing::info!(user_id, amount, kind = ?kind, points, "points updated");
    events.publish(LiveEvent::PointsChanged {
        user_id: user_id.to_string(),
        points,
    });
    Ok(points)
}

/// Same as [`award`] but never fails the caller: errors are logged and dropped.
pub async fn award_best_effort(
    pool: &SqlitePool,
    events: &EventHub,
    user_id: &str,
    amount: i64,
    kind: PointsKind,
    description: &str,
) {
    if amount == 0 {
        return;
    }
    if let Err(e) = award(pool, events, user_id, amount, kind, description).await {
        tracing::warn!(user_id, error = %e, "points award failed, continuing");
    }
}

pub(crate) async fn insert_history(
    tx: &mut sqlx::Transaction<'_, sqlx::Sqlite>,
    user_id: &str,
    amount: i64,
    kind: PointsKind,
    description: &str,
) -> AppResult<()> {
    sqlx::query(
        "INSERT INTO points_history (user_id, amount, kind, description, created_at) \
         VALUES (?, ?, ?, ?, ?)",
    )
    .bind(user_id)
    .bind(amount)
    .bind(kind)
    .bind(description)
    .bind(now_epoch())
    .execute(&mut **tx)
    .await?;
    Ok(())
}

pub async fn history(pool: &SqlitePool, user_id: &str) -> AppResult<Vec<PointsEntry>> {
    let rows = sqlx::query_as::<_, PointsEntry>(
        "SELECT amount, kind, description, created_at FROM points_history \
         WHERE user_id = ? ORDER BY created_at DESC, id DESC",
    )
    .bind(user_id)
    .fetch_all(pool)
    .await?;
    Ok(rows)
}

/// Top students by points. Ties go to the older account, then to the id.
pub async fn leaderboard(pool: &SqlitePool, limit: i64) -> AppResult<Vec<LeaderboardEntry>> {
    let mut rows = sqlx::query_as::<_, LeaderboardEntry>(
        r#"
        SELECT u.id AS user_id, u.username, u.branch, u.points,
               (SELECT COUNT(*) FROM notes n WHERE n.uploader_id = u.id) AS uploads
        FROM users u
        WHERE u.role = 'student'
        ORDER BY u.points DESC, u.created_at ASC, u.id ASC
        LIMIT ?
        "#,
    )
    .bind(limit.clamp(1, 100))
    .fetch_all(pool)
    .await?;

    for (i, row) in rows.iter_mut().enumerate() {
        row.rank = i as i64 + 1;
    }
    Ok(rows)
}
