/// Live change feed. Every mutation of a note or a user's points is fanned out
/// to all connected `/events` subscribers.
use serde::Serialize;
use tokio::sync::broadcast;

use crate::models::note::{visible_to, Note, NoteStatus};
use crate::models::user::User;

const CHANNEL_CAPACITY: usize = 256;

/// Note events carry the note's status and uploader so each subscriber can be
/// held to the same visibility rule as the read endpoints.
#[derive(Debug, Clone, Serialize, PartialEq)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum LiveEvent {
    NoteCreated {
        note_id: String,
        uploader_id: String,
        title: String,
        status: NoteStatus,
    },
    NoteUpdated {
        note_id: String,
        uploader_id: String,
        upvotes: i64,
        downloads: i64,
        status: NoteStatus,
        admin_verified: bool,
    },
    NoteDeleted {
        note_id: String,
        uploader_id: String,
        status: NoteStatus,
    },
    PointsChanged {
        user_id: String,
        points: i64,
    },
}

impl LiveEvent {
    pub fn note_updated(note: &Note) -> Self {
        LiveEvent::NoteUpdated {
            note_id: note.id.clone(),
            uploader_id: note.uploader_id.clone(),
            upvotes: note.upvotes,
            downloads: note.downloads,
            status: note.status,
            admin_verified: note.admin_verified,
        }
    }

    pub fn note_id(&self) -> Option<&str> {
        match self {
            LiveEvent::NoteCreated { note_id, .. }
            | LiveEvent::NoteUpdated { note_id, .. }
            | LiveEvent::NoteDeleted { note_id, .. } => Some(note_id),
            LiveEvent::PointsChanged { .. } => None,
        }
    }

    pub fn user_id(&self) -> Option<&str> {
        match self {
            LiveEvent::NoteCreated { uploader_id, .. }
            | LiveEvent::NoteUpdated { uploader_id, .. }
            | LiveEvent::NoteDeleted { uploader_id, .. } => Some(uploader_id),
            LiveEvent::PointsChanged { user_id, .. } => Some(user_id),
        }
    }

    /// Whether `viewer` may receive this event at all.
    pub fn visible_to(&self, viewer: &User) -> bool {
        match self {
            LiveEvent::NoteCreated {
                uploader_id,
                status,
                ..
            }
            | LiveEvent::NoteUpdated {
                uploader_id,
                status,
                ..
            }
            | LiveEvent::NoteDeleted {
                uploader_id,
                status,
                ..
            } => visible_to(*status, uploader_id, viewer),
            LiveEvent::PointsChanged { .. } => true,
        }
    }
}

/// Subscription narrowing. An unset field matches everything.
#[derive(Debug, Clone, Default, serde::Deserialize)]
pub struct EventFilter {
    pub note_id: Option<String>,
    pub user_id: Option<String>,
}

impl EventFilter {
    pub fn matches(&self, event: &LiveEvent) -> bool {
        if let Some(wanted) = &self.note_id {
            if event.note_id() != Some(wanted.as_str()) {
                return false;
            }
        }
        if let Some(wanted) = &self.user_id {
            if event.user_id() != Some(wanted.as_str()) {
                return false;
            }
        }
        true
    }
}

pub struct EventHub {
    tx: broadcast::Sender<LiveEvent>,
}

impl EventHub {
    pub fn new() -> Self {
        let (tx, _) = broadcast::channel(CHANNEL_CAPACITY);
        Self { tx }
    }

    /// Fire and forget. Having no subscribers is not an error.
    pub fn publish(&self, event: LiveEvent) {
        let delivered = self.tx.send(event).unwrap_or(0);
        tracing::trace!(delivered, "live event published");
    }

    pub fn subscribe(&self) -> broadcast::Receiver<LiveEvent> {
        self.tx.subscribe()
    }

    pub fn subscriber_count(&self) -> usize {
        self.tx.receiver_count()
    }
}

impl Default for EventHub {
    fn default() -> Self {
        Self::new()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::models::user::Role;

    #[tokio::test]
    async fn filtered_subscription_sees_only_matching_events() {
        let hub = EventHub::new();
        let mut rx = hub.subscribe();
        let filter = EventFilter {
            user_id: Some("u1".into()),
            ..Default::default()
        };

        hub.publish(LiveEvent::PointsChanged {
            user_id: "u2".into(),
            points: 5,
        });
        hub.publish(LiveEvent::PointsChanged {
            user_id: "u1".into(),
            points: 110,
        });

        let mut seen = Vec::new();
        while let Ok(ev) = rx.try_recv() {
            if filter.matches(&ev) {
                seen.push(ev);
            }
        }
        assert_eq!(
            seen,
            vec![LiveEvent::PointsChanged {
                user_id: "u1".into(),
                points: 110
            }]
        );
    }

    #[test]
    fn publishing_without_subscribers_is_fine() {
        let hub = EventHub::new();
        hub.publish(LiveEvent::NoteDeleted {
            note_id: "n1".into(),
            uploader_id: "u1".into(),
            status: NoteStatus::Approved,
        });
        assert_eq!(hub.subscriber_count(), 0);
    }

    fn user(id: &str, role: Role) -> User {
        User {
            id: id.into(),
            email: format!("{id}@slrtce.in"),
            username: id.into(),
            password_hash: String::new(),
            role,
            branch: None,
            points: 0,
            total_points_earned: 0,
            total_points_spent: 0,
            created_at: 0,
        }
    }

    #[test]
    fn pending_note_events_reach_only_uploader_and_admins() {
        let created = LiveEvent::NoteCreated {
            note_id: "n1".into(),
            uploader_id: "author".into(),
            title: "Draft".into(),
            status: NoteStatus::Pending,
        };
        assert!(created.visible_to(&user("author", Role::Student)));
        assert!(created.visible_to(&user("boss", Role::Admin)));
        assert!(!created.visible_to(&user("reader", Role::Student)));

        let approved = LiveEvent::NoteCreated {
            status: NoteStatus::Approved,
            note_id: "n2".into(),
            uploader_id: "author".into(),
            title: "Final".into(),
        };
        assert!(approved.visible_to(&user("reader", Role::Student)));
    }
}
