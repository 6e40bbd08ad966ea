/// Notes: upload, listing, likes, bookmarks, downloads and deletion.
use std::collections::HashSet;

use sqlx::SqlitePool;

use crate::db::now_epoch;
use crate::error::{AppError, AppResult};
use crate::models::filter::{NoteFilter, SortOrder};
use crate::models::note::{
    visible_to, DownloadRef, LikeState, NewNote, Note, NoteStatus, NoteView, RankedNote,
    NOTE_COLUMNS,
};
use crate::models::user::{PointsKind, User};
use crate::services::event_stream::{EventHub, LiveEvent};
use crate::services::{media_service::StoredFile, points_service};

pub const MAX_SEMESTER: i64 = 8;

pub fn validate_new_note(new: &NewNote) -> AppResult<()> {
    if new.title.trim().is_empty() {
        return Err(AppError::field("title", "Title is required"));
    }
    if new.resource_type.is_none() {
        return Err(AppError::field("resource_type", "Please select a resource type"));
    }
    if new.branch.trim().is_empty() {
        return Err(AppError::field("branch", "Please select a branch"));
    }
    if !(1..=MAX_SEMESTER).contains(&new.semester) {
        return Err(AppError::field(
            "semester",
            format!("Semester must be between 1 and {MAX_SEMESTER}"),
        ));
    }
    if new.subject.trim().is_empty() {
        return Err(AppError::field("subject", "Subject is required"));
    }
    Ok(())
}

fn trimmed(value: Option<String>) -> Option<String> {
    value
        .map(|v| v.trim().to_string())
        .filter(|v| !v.is_empty())
}

pub async fn create_note(
    pool: &SqlitePool,
    events: &EventHub,
    uploader: &User,
    new: NewNote,
    file: Option<StoredFile>,
    upload_points: i64,
) -> AppResult<Note> {
    validate_new_note(&new)?;
    let resource_type = new
        .resource_type
        .ok_or_else(|| AppError::field("resource_type", "Please select a resource type"))?;

    let id = uuid::Uuid::new_v4().to_string();
    let status = if uploader.is_admin() {
        NoteStatus::Approved
    } else {
        NoteStatus::Pending
    };
    let (file_name, file_url) = match file {
        Some(f) => (Some(f.file_name), f.file_url),
        None => (None, None),
    };

    sqlx::query(
        r#"
        INSERT INTO notes (
            id, title, description, resource_type, branch, semester, subject, module,
            uploader_id, upvotes, downloads, status, admin_upvoted, admin_verified,
            file_name, file_url, created_at
        ) VALUES (?, ?, ?, ?, ?, ?, ?, ?, ?, 0, 0, ?, 0, 0, ?, ?, ?)
        "#,
    )
    .bind(&id)
    .bind(new.title.trim())
    .bind(trimmed(new.description))
    .bind(resource_type)
    .bind(new.branch.trim())
    .bind(new.semester)
    .bind(new.subject.trim())
    .bind(trimmed(new.module))
    .bind(&uploader.id)
    .bind(status)
    .bind(file_name)
    .bind(file_url)
    .bind(now_epoch())
    .execute(pool)
    .await?;

    let note = get_note(pool, &id).await?.ok_or(AppError::NotFound("Note"))?;
    tracing::info!(note_id = %note.id, user_id = %uploader.id, "note uploaded");
    events.publish(LiveEvent::NoteCreated {
        note_id: note.id.clone(),
        uploader_id: uploader.id.clone(),
        title: note.title.clone(),
        status: note.status,
    });

    // The note already exists; a failed points update must not undo it.
    points_service::award_best_effort(
        pool,
        events,
        &uploader.id,
        upload_points,
        PointsKind::Upload,
        &format!("Uploaded \"{}\"", note.title),
    )
    .await;

    Ok(note)
}

pub async fn get_note(pool: &SqlitePool, note_id: &str) -> AppResult<Option<Note>> {
    let sql = format!(
        "SELECT {NOTE_COLUMNS} FROM notes n JOIN users u ON u.id = n.uploader_id WHERE n.id = ?"
    );
    let note = sqlx::query_as::<_, Note>(&sql)
        .bind(note_id)
        .fetch_optional(pool)
        .await?;
    Ok(note)
}

pub fn can_view(note: &Note, viewer: &User) -> bool {
    visible_to(note.status, &note.uploader_id, viewer)
}

/// Fetches a note the viewer is allowed to see. Hidden notes read as missing.
pub async fn get_visible(pool: &SqlitePool, note_id: &str, viewer: &User) -> AppResult<Note> {
    match get_note(pool, note_id).await? {
        Some(note) if can_view(&note, viewer) => Ok(note),
        _ => Err(AppError::NotFound("Note")),
    }
}

pub async fn view(pool: &SqlitePool, note: Note, viewer: &User) -> AppResult<NoteView> {
    let liked = membership(pool, "note_upvotes", &note.id, &viewer.id).await?;
    let bookmarked = membership(pool, "bookmarks", &note.id, &viewer.id).await?;
    Ok(NoteView {
        note,
        liked,
        bookmarked,
    })
}

async fn membership(pool: &SqlitePool, table: &str, note_id: &str, user_id: &str) -> AppResult<bool> {
    let sql = format!("SELECT COUNT(*) FROM {table} WHERE note_id = ? AND user_id = ?");
    let n: i64 = sqlx::query_scalar(&sql)
        .bind(note_id)
        .bind(user_id)
        .fetch_one(pool)
        .await?;
    Ok(n > 0)
}

async fn user_note_ids(pool: &SqlitePool, table: &str, user_id: &str) -> AppResult<HashSet<String>> {
    let sql = format!("SELECT note_id FROM {table} WHERE user_id = ?");
    let ids: Vec<String> = sqlx::query_scalar(&sql).bind(user_id).fetch_all(pool).await?;
    Ok(ids.into_iter().collect())
}

async fn decorate(pool: &SqlitePool, notes: Vec<Note>, viewer: &User) -> AppResult<Vec<NoteView>> {
    let liked = user_note_ids(pool, "note_upvotes", &viewer.id).await?;
    let saved = user_note_ids(pool, "bookmarks", &viewer.id).await?;
    Ok(notes
        .into_iter()
        .map(|note| NoteView {
            liked: liked.contains(&note.id),
            bookmarked: saved.contains(&note.id),
            note,
        })
        .collect())
}

/// Candidate set visible to the viewer, before any filter is applied.
async fn visible_candidates(pool: &SqlitePool, viewer: &User, filter: &NoteFilter) -> AppResult<Vec<Note>> {
    let own_uploads = filter.uploader_id.as_deref() == Some(viewer.id.as_str());
    let notes = if viewer.is_admin() {
        let sql = format!("SELECT {NOTE_COLUMNS} FROM notes n JOIN users u ON u.id = n.uploader_id");
        sqlx::query_as::<_, Note>(&sql).fetch_all(pool).await?
    } else if own_uploads {
        let sql = format!(
            "SELECT {NOTE_COLUMNS} FROM notes n JOIN users u ON u.id = n.uploader_id \
             WHERE n.uploader_id = ?"
        );
        sqlx::query_as::<_, Note>(&sql)
            .bind(&viewer.id)
            .fetch_all(pool)
            .await?
    } else {
        let sql = format!(
            "SELECT {NOTE_COLUMNS} FROM notes n JOIN users u ON u.id = n.uploader_id \
             WHERE n.status = 'approved'"
        );
        sqlx::query_as::<_, Note>(&sql).fetch_all(pool).await?
    };
    Ok(notes)
}

pub async fn list_notes(pool: &SqlitePool, filter: &NoteFilter, viewer: &User) -> AppResult<Vec<NoteView>> {
    let candidates = visible_candidates(pool, viewer, filter).await?;
    let shown = filter.apply(candidates);
    decorate(pool, shown, viewer).await
}

/// Approved notes ranked by upvotes, downloads, then recency.
pub async fn best_notes(pool: &SqlitePool, filter: &NoteFilter, limit: usize) -> AppResult<Vec<RankedNote>> {
    let sql = format!(
        "SELECT {NOTE_COLUMNS} FROM notes n JOIN users u ON u.id = n.uploader_id \
         WHERE n.status = 'approved'"
    );
    let candidates = sqlx::query_as::<_, Note>(&sql).fetch_all(pool).await?;
    let filter = NoteFilter {
        sort: SortOrder::Top,
        status: None,
        ..filter.clone()
    };
    Ok(filter
        .apply(candidates)
        .into_iter()
        .take(limit)
        .enumerate()
        .map(|(i, note)| RankedNote { rank: i + 1, note })
        .collect())
}

/// Membership change on the upvote set. `None` toggles.
///
/// The write happens first so the transaction takes the write lock up front,
/// then the counter is recomputed from the set, keeping
/// `upvotes == |note_upvotes|` no matter how requests interleave.
async fn change_like(
    pool: &SqlitePool,
    events: &EventHub,
    note_id: &str,
    user: &User,
    desired: Option<bool>,
) -> AppResult<LikeState> {
    let mut tx = pool.begin().await?;

    let locked = sqlx::query("UPDATE notes SET upvotes = upvotes WHERE id = ?")
        .bind(note_id)
        .execute(&mut *tx)
        .await?;
    if locked.rows_affected() == 0 {
        return Err(AppError::NotFound("Note"));
    }

    let liked = match desired {
        Some(true) => {
            insert_like(&mut tx, note_id, &user.id).await?;
            true
        }
        Some(false) => {
            delete_like(&mut tx, note_id, &user.id).await?;
            false
        }
        None => {
            if delete_like(&mut tx, note_id, &user.id).await? {
                false
            } else {
                insert_like(&mut tx, note_id, &user.id).await?;
                true
            }
        }
    };

    sqlx::query(
        "UPDATE notes SET upvotes = (SELECT COUNT(*) FROM note_upvotes WHERE note_id = ?) WHERE id = ?",
    )
    .bind(note_id)
    .bind(note_id)
    .execute(&mut *tx)
    .await?;
    let upvotes: i64 = sqlx::query_scalar("SELECT upvotes FROM notes WHERE id = ?")
        .bind(note_id)
        .fetch_one(&mut *tx)
        .await?;
    tx.commit().await?;

    tracing::debug!(note_id, user_id = %user.id, liked, upvotes, "like updated");
    publish_update(pool, events, note_id).await;
    Ok(LikeState { liked, upvotes })
}

async fn insert_like(
    tx: &mut sqlx::Transaction<'_, sqlx::Sqlite>,
    note_id: &str,
    user_id: &str,
) -> AppResult<()> {
    sqlx::query("INSERT OR IGNORE INTO note_upvotes (note_id, user_id, created_at) VALUES (?, ?, ?)")
        .bind(note_id)
        .bind(user_id)
        .bind(now_epoch())
        .execute(&mut **tx)
        .await?;
    Ok(())
}

async fn delete_like(
    tx: &mut sqlx::Transaction<'_, sqlx::Sqlite>,
    note_id: &str,
    user_id: &str,
) -> AppResult<bool> {
    let r = sqlx::query("DELETE FROM note_upvotes WHERE note_id = ? AND user_id = ?")
        .bind(note_id)
        .bind(user_id)
        .execute(&mut **tx)
        .await?;
    Ok(r.rows_affected() > 0)
}

pub async fn set_like(
    pool: &SqlitePool,
    events: &EventHub,
    note_id: &str,
    user: &User,
    liked: bool,
) -> AppResult<LikeState> {
    get_visible(pool, note_id, user).await?;
    change_like(pool, events, note_id, user, Some(liked)).await
}

pub async fn toggle_like(
    pool: &SqlitePool,
    events: &EventHub,
    note_id: &str,
    user: &User,
) -> AppResult<LikeState> {
    get_visible(pool, note_id, user).await?;
    change_like(pool, events, note_id, user, None).await
}

pub async fn publish_update(pool: &SqlitePool, events: &EventHub, note_id: &str) {
    match get_note(pool, note_id).await {
        Ok(Some(note)) => events.publish(LiveEvent::note_updated(&note)),
        Ok(None) => {}
        Err(e) => tracing::warn!(note_id, error = %e, "could not publish note update"),
    }
}

pub async fn record_download(
    pool: &SqlitePool,
    events: &EventHub,
    note_id: &str,
    viewer: &User,
) -> AppResult<DownloadRef> {
    let note = get_visible(pool, note_id, viewer).await?;
    sqlx::query("UPDATE notes SET downloads = downloads + 1 WHERE id = ?")
        .bind(note_id)
        .execute(pool)
        .await?;
    let downloads: i64 = sqlx::query_scalar("SELECT downloads FROM notes WHERE id = ?")
        .bind(note_id)
        .fetch_one(pool)
        .await?;
    publish_update(pool, events, note_id).await;
    Ok(DownloadRef {
        id: note.id,
        downloads,
        file_name: note.file_name,
        file_url: note.file_url,
    })
}

/// Removes a note with its upvotes and bookmarks. Only the uploader or an
/// admin may do this.
pub async fn delete_note(pool: &SqlitePool, events: &EventHub, note_id: &str, actor: &User) -> AppResult<()> {
    // Hidden notes read as missing here too, so a refusal never confirms they exist.
    let note = get_visible(pool, note_id, actor).await?;
    if !actor.is_admin() && note.uploader_id != actor.id {
        return Err(AppError::Forbidden("Only the uploader or an admin can delete this note".into()));
    }

    let mut tx = pool.begin().await?;
    for sql in [
        "DELETE FROM note_upvotes WHERE note_id = ?",
        "DELETE FROM bookmarks WHERE note_id = ?",
        "DELETE FROM notes WHERE id = ?",
    ] {
        sqlx::query(sql).bind(note_id).execute(&mut *tx).await?;
    }
    tx.commit().await?;

    tracing::info!(note_id, user_id = %actor.id, "note deleted");
    events.publish(LiveEvent::NoteDeleted {
        note_id: note_id.to_string(),
        uploader_id: note.uploader_id,
        status: note.status,
    });
    Ok(())
}

pub async fn set_bookmark(pool: &SqlitePool, note_id: &str, user: &User, saved: bool) -> AppResult<bool> {
    get_visible(pool, note_id, user).await?;
    if saved {
        sqlx::query("INSERT OR IGNORE INTO bookmarks (note_id, user_id, created_at) VALUES (?, ?, ?)")
            .bind(note_id)
            .bind(&user.id)
            .bind(now_epoch())
            .execute(pool)
            .await?;
    } else {
        sqlx::query("DELETE FROM bookmarks WHERE note_id = ? AND user_id = ?")
            .bind(note_id)
            .bind(&user.id)
            .execute(pool)
            .await?;
    }
    Ok(saved)
}

pub async fn toggle_bookmark(pool: &SqlitePool, note_id: &str, user: &User) -> AppResult<bool> {
    let saved = membership(pool, "bookmarks", note_id, &user.id).await?;
    set_bookmark(pool, note_id, user, !saved).await
}

/// Saved notes, most recently saved first. Notes that stopped being visible
/// (rejected after saving) are left out.
pub async fn list_bookmarks(pool: &SqlitePool, user: &User) -> AppResult<Vec<NoteView>> {
    let sql = format!(
        "SELECT {NOTE_COLUMNS} FROM bookmarks b \
         JOIN notes n ON n.id = b.note_id \
         JOIN users u ON u.id = n.uploader_id \
         WHERE b.user_id = ? ORDER BY b.created_at DESC, n.id ASC"
    );
    let notes = sqlx::query_as::<_, Note>(&sql)
        .bind(&user.id)
        .fetch_all(pool)
        .await?;
    let visible = notes.into_iter().filter(|n| can_view(n, user)).collect();
    decorate(pool, visible, user).await
}
