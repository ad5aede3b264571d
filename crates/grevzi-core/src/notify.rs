//! User-facing notifications raised by the claim controller

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

pub const MINTING_MESSAGE: &str = "Minting...";
pub const MINTED_MESSAGE: &str = "HOORAY.. You successfully minted!";
pub const MINT_FAILED_MESSAGE: &str = "Whoops... Something went wrong!";

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum NotificationKind {
    /// Stays up until dismissed programmatically
    Progress,
    Success,
    Failure,
}

impl NotificationKind {
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Progress => "progress",
            Self::Success => "success",
            Self::Failure => "failure",
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct NotificationId(u64);

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Notification {
    pub id: NotificationId,
    pub kind: NotificationKind,
    pub message: String,
    pub raised_at: DateTime<Utc>,
}

/// Notifications currently on screen for one page view
#[derive(Debug, Default)]
pub struct Notifications {
    active: Vec<Notification>,
    next_id: u64,
}

impl Notifications {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn raise(&mut self, kind: NotificationKind, message: impl Into<String>) -> NotificationId {
        self.next_id += 1;
        let id = NotificationId(self.next_id);
        self.active.push(Notification {
            id,
            kind,
            message: message.into(),
            raised_at: Utc::now(),
        });
        id
    }

    /// Returns false if it was already gone
    pub fn dismiss(&mut self, id: NotificationId) -> bool {
        let before = self.active.len();
        self.active.retain(|n| n.id != id);
        self.active.len() != before
    }

    pub fn active(&self) -> &[Notification] {
        &self.active
    }

    /// Drop success/failure notifications older than `max_age`
    pub fn expire(&mut self, max_age: chrono::Duration) {
        let cutoff = Utc::now() - max_age;
        self.active
            .retain(|n| n.kind == NotificationKind::Progress || n.raised_at > cutoff);
    }

    pub fn count(&self, kind: NotificationKind) -> usize {
        self.active.iter().filter(|n| n.kind == kind).count()
    }
}
