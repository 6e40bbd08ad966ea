use std::str::FromStr;

use serde::{Deserialize, Serialize};
use sqlx::FromRow;

use crate::error::AppError;
use crate::models::user::User;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize, sqlx::Type)]
#[serde(rename_all = "snake_case")]
#[sqlx(rename_all = "snake_case")]
pub enum ResourceType {
    Notes,
    Pyq,
    LabManual,
    Viva,
}

impl FromStr for ResourceType {
    type Err = AppError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_lowercase().as_str() {
            "notes" | "note" => Ok(Self::Notes),
            "pyq" | "pyqs" => Ok(Self::Pyq),
            "lab_manual" | "lab" | "lab manual" => Ok(Self::LabManual),
            "viva" => Ok(Self::Viva),
            _ => Err(AppError::field("resource_type", "Please select a resource type")),
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, sqlx::Type)]
#[serde(rename_all = "snake_case")]
#[sqlx(rename_all = "snake_case")]
pub enum NoteStatus {
    Pending,
    Approved,
    Rejected,
}

impl FromStr for NoteStatus {
    type Err = AppError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim() {
            "pending" => Ok(Self::Pending),
            "approved" => Ok(Self::Approved),
            "rejected" => Ok(Self::Rejected),
            other => Err(AppError::field("status", format!("Unknown status {other:?}"))),
        }
    }
}

/// Approved notes are public; anything else only reaches its uploader and
/// admins.
pub fn visible_to(status: NoteStatus, uploader_id: &str, viewer: &User) -> bool {
    status == NoteStatus::Approved || viewer.is_admin() || uploader_id == viewer.id
}

#[derive(Debug, Clone, FromRow, Serialize, PartialEq)]
pub struct Note {
    pub id: String,
    pub title: String,
    pub description: Option<String>,
    pub resource_type: ResourceType,
    pub branch: String,
    pub semester: i64,
    pub subject: String,
    pub module: Option<String>,
    pub uploader_id: String,
    pub uploader_name: String,
    pub upvotes: i64,
    pub downloads: i64,
    pub status: NoteStatus,
    pub admin_upvoted: bool,
    pub admin_verified: bool,
    pub file_name: Option<String>,
    pub file_url: Option<String>,
    pub created_at: i64,
}

/// Every note query selects these columns so rows map onto [`Note`].
pub const NOTE_COLUMNS: &str = "n.id, n.title, n.description, n.resource_type, n.branch, \
     n.semester, n.subject, n.module, n.uploader_id, u.username AS uploader_name, n.upvotes, \
     n.downloads, n.status, n.admin_upvoted, n.admin_verified, n.file_name, n.file_url, n.created_at";

/// Upload metadata, collected from the multipart form fields.
#[derive(Debug, Clone, Default)]
pub struct NewNote {
    pub title: String,
    pub description: Option<String>,
    pub resource_type: Option<ResourceType>,
    pub branch: String,
    pub semester: i64,
    pub subject: String,
    pub module: Option<String>,
}

/// A note as seen by one viewer.
#[derive(Debug, Clone, Serialize)]
pub struct NoteView {
    #[serde(flatten)]
    pub note: Note,
    pub liked: bool,
    pub bookmarked: bool,
}

#[derive(Debug, Clone, Serialize)]
pub struct NoteListResponse {
    pub notes: Vec<NoteView>,
    pub total: usize,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub message: Option<String>,
}

pub const EMPTY_STATE_MESSAGE: &str = "No resources found";

impl NoteListResponse {
    pub fn new(notes: Vec<NoteView>) -> Self {
        let message = notes.is_empty().then(|| EMPTY_STATE_MESSAGE.to_string());
        Self {
            total: notes.len(),
            notes,
            message,
        }
    }
}

#[derive(Debug, Clone, Serialize)]
pub struct RankedNote {
    pub rank: usize,
    #[serde(flatten)]
    pub note: Note,
}

#[derive(Debug, Clone, Copy, Serialize, PartialEq, Eq)]
pub struct LikeState {
    pub liked: bool,
    pub upvotes: i64,
}

#[derive(Debug, Clone, Serialize)]
pub struct DownloadRef {
    pub id: String,
    pub downloads: i64,
    pub file_name: Option<String>,
    pub file_url: Option<String>,
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn resource_type_accepts_form_labels() {
        assert_eq!("Lab Manual".parse::<ResourceType>().unwrap(), ResourceType::LabManual);
        assert_eq!(" PYQs ".parse::<ResourceType>().unwrap(), ResourceType::Pyq);
        let err = "slides".parse::<ResourceType>().unwrap_err();
        assert_eq!(err.to_string(), "Please select a resource type");
        assert!("archived".parse::<NoteStatus>().is_err());
    }
}
