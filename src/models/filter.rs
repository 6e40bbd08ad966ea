//! In-memory filtering and ordering of note lists.
//!
//! The database hands back a candidate set (already narrowed by visibility),
//! and [`NoteFilter::apply`] keeps the notes satisfying every active predicate.
use std::cmp::Ordering;
use std::fmt::Display;
use std::str::FromStr;

use serde::{de, Deserialize, Deserializer};

use super::note::{Note, NoteStatus, ResourceType};

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum SortOrder {
    #[default]
    Newest,
    Top,
    Downloads,
}

#[derive(Debug, Clone, Default, Deserialize)]
pub struct NoteFilter {
    #[serde(default, deserialize_with = "blank_as_none")]
    pub resource_type: Option<ResourceType>,
    pub branch: Option<String>,
    #[serde(default, deserialize_with = "blank_as_none")]
    pub semester: Option<i64>,
    pub subject: Option<String>,
    pub module: Option<String>,
    #[serde(default, deserialize_with = "blank_as_none")]
    pub status: Option<NoteStatus>,
    #[serde(default, deserialize_with = "blank_as_none")]
    pub verified: Option<bool>,
    pub search: Option<String>,
    pub uploader_id: Option<String>,
    #[serde(default)]
    pub sort: SortOrder,
}

impl NoteFilter {
    pub fn matches(&self, note: &Note) -> bool {
        if let Some(t) = self.resource_type {
            if note.resource_type != t {
                return false;
            }
        }
        if !eq_opt(&self.branch, &note.branch)
            || !eq_opt(&self.subject, &note.subject)
            || !eq_opt(&self.uploader_id, &note.uploader_id)
        {
            return false;
        }
        if let Some(module) = active(&self.module) {
            if note.module.as_deref() != Some(module) {
                return false;
            }
        }
        if let Some(sem) = self.semester {
            if note.semester != sem {
                return false;
            }
        }
        if let Some(status) = self.status {
            if note.status != status {
                return false;
            }
        }
        if let Some(verified) = self.verified {
            if note.admin_verified != verified {
                return false;
            }
        }
        if let Some(q) = active(&self.search) {
            let q = q.to_lowercase();
            let hit = note.title.to_lowercase().contains(&q)
                || note.subject.to_lowercase().contains(&q)
                || note.uploader_name.to_lowercase().contains(&q);
            if !hit {
                return false;
            }
        }
        true
    }

    pub fn apply(&self, notes: Vec<Note>) -> Vec<Note> {
        let mut kept: Vec<Note> = notes.into_iter().filter(|n| self.matches(n)).collect();
        sort_notes(&mut kept, self.sort);
        kept
    }
}

pub fn sort_notes(notes: &mut [Note], order: SortOrder) {
    notes.sort_by(|a, b| compare(a, b, order));
}

fn compare(a: &Note, b: &Note, order: SortOrder) -> Ordering {
    match order {
        SortOrder::Newest => b.created_at.cmp(&a.created_at).then_with(|| a.id.cmp(&b.id)),
        SortOrder::Top => b
            .upvotes
            .cmp(&a.upvotes)
            .then_with(|| b.downloads.cmp(&a.downloads))
            .then_with(|| b.created_at.cmp(&a.created_at))
            .then_with(|| a.id.cmp(&b.id)),
        SortOrder::Downloads => b
            .downloads
            .cmp(&a.downloads)
            .then_with(|| b.upvotes.cmp(&a.upvotes))
            .then_with(|| a.id.cmp(&b.id)),
    }
}

// Blank selections ("", "   ") behave like "All".
fn active(value: &Option<String>) -> Option<&str> {
    value.as_deref().map(str::trim).filter(|s| !s.is_empty())
}

/// Query values arrive as text; an empty value is the "All" selection.
fn blank_as_none<'de, D, T>(deserializer: D) -> Result<Option<T>, D::Error>
where
    D: Deserializer<'de>,
    T: FromStr,
    T::Err: Display,
{
    let raw: Option<String> = Option::deserialize(deserializer)?;
    match raw.as_deref().map(str::trim) {
        None | Some("") => Ok(None),
        Some(value) => value.parse().map(Some).map_err(de::Error::custom),
    }
}

fn eq_opt(wanted: &Option<String>, actual: &str) -> bool {
    match active(wanted) {
        Some(w) => w == actual,
        None => true,
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn note(id: &str, ty: ResourceType, subject: &str, upvotes: i64, created_at: i64) -> Note {
        Note {
            id: id.into(),
            title: format!("{subject} {id}"),
            description: None,
            resource_type: ty,
            branch: "Computer Science".into(),
            semester: 6,
            subject: subject.into(),
            module: None,
            uploader_id: "u1".into(),
            uploader_name: "Rohan".into(),
            upvotes,
            downloads: 0,
            status: NoteStatus::Approved,
            admin_upvoted: false,
            admin_verified: false,
            file_name: None,
            file_url: None,
            created_at,
        }
    }

    fn sample() -> Vec<Note> {
        let mut verified = note("c", ResourceType::Pyq, "OS", 30, 3);
        verified.admin_verified = true;
        let mut other_branch = note("d", ResourceType::Notes, "DBMS", 5, 4);
        other_branch.branch = "EXTC".into();
        other_branch.semester = 4;
        vec![
            note("a", ResourceType::Notes, "DBMS", 10, 1),
            note("b", ResourceType::LabManual, "DBMS", 20, 2),
            verified,
            other_branch,
        ]
    }

    #[test]
    fn displayed_set_satisfies_every_active_predicate() {
        let filter = NoteFilter {
            subject: Some("DBMS".into()),
            branch: Some("Computer Science".into()),
            semester: Some(6),
            ..Default::default()
        };
        let notes = sample();
        let shown = filter.apply(notes.clone());
        let expected: Vec<&str> = notes
            .iter()
            .filter(|n| n.subject == "DBMS" && n.branch == "Computer Science" && n.semester == 6)
            .map(|n| n.id.as_str())
            .collect();
        let mut got: Vec<&str> = shown.iter().map(|n| n.id.as_str()).collect();
        got.sort();
        assert_eq!(got, expected);
    }

    #[test]
    fn blank_selections_are_ignored() {
        let filter = NoteFilter {
            subject: Some("  ".into()),
            search: Some(String::new()),
            ..Default::default()
        };
        assert_eq!(filter.apply(sample()).len(), 4);
    }

    #[test]
    fn verified_and_search_filters() {
        let verified = NoteFilter {
            verified: Some(true),
            ..Default::default()
        };
        let shown = verified.apply(sample());
        assert_eq!(shown.len(), 1);
        assert_eq!(shown[0].id, "c");

        let search = NoteFilter {
            search: Some("rohan".into()),
            resource_type: Some(ResourceType::LabManual),
            ..Default::default()
        };
        let shown = search.apply(sample());
        assert_eq!(shown.len(), 1);
        assert_eq!(shown[0].id, "b");
    }

    #[test]
    fn sort_orders() {
        let newest = NoteFilter::default().apply(sample());
        let ids: Vec<&str> = newest.iter().map(|n| n.id.as_str()).collect();
        assert_eq!(ids, ["d", "c", "b", "a"]);

        let top = NoteFilter {
            sort: SortOrder::Top,
            ..Default::default()
        }
        .apply(sample());
        let ids: Vec<&str> = top.iter().map(|n| n.id.as_str()).collect();
        assert_eq!(ids, ["c", "b", "a", "d"]);
    }

    #[test]
    fn empty_query_values_mean_all() {
        let filter: NoteFilter = serde_json::from_value(serde_json::json!({
            "semester": "",
            "verified": " ",
            "resource_type": "",
            "status": "",
        }))
        .unwrap();
        assert_eq!(filter.semester, None);
        assert_eq!(filter.verified, None);
        assert_eq!(filter.apply(sample()).len(), 4);

        let typed: NoteFilter = serde_json::from_value(serde_json::json!({
            "semester": "4",
            "verified": "false",
            "resource_type": "notes",
        }))
        .unwrap();
        let ids: Vec<String> = typed.apply(sample()).into_iter().map(|n| n.id).collect();
        assert_eq!(ids, ["d"]);

        let bad = serde_json::from_value::<NoteFilter>(serde_json::json!({ "semester": "sixth" }));
        assert!(bad.is_err());
    }
}
