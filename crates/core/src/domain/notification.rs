use std::fmt;

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

use crate::domain::leave::LeaveRequestId;
use crate::domain::user::UserId;

#[derive(Clone, Debug, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct NotificationId(pub String);

impl fmt::Display for NotificationId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

#[derive(Clone, Copy, Debug, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum NotificationKind {
    Info,
    Warning,
    Success,
}

impl NotificationKind {
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Info => "info",
            Self::Warning => "warning",
            Self::Success => "success",
        }
    }

    pub fn parse(value: &str) -> Option<Self> {
        match value.trim().to_ascii_lowercase().as_str() {
            "info" => Some(Self::Info),
            "warning" => Some(Self::Warning),
            "success" => Some(Self::Success),
            _ => None,
        }
    }
}

/// A message for one user, produced by a workflow transition. The engine only
/// creates notifications; the read flag belongs to the presentation layer.
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct Notification {
    pub id: NotificationId,
    pub user_id: UserId,
    pub message: String,
    pub kind: NotificationKind,
    pub read: bool,
    pub created_at: DateTime<Utc>,
    pub leave_request_id: Option<LeaveRequestId>,
}

impl Notification {
    pub fn new(
        user_id: UserId,
        kind: NotificationKind,
        message: impl Into<String>,
        leave_request_id: Option<LeaveRequestId>,
    ) -> Self {
        Self {
            id: NotificationId(Uuid::new_v4().to_string()),
            user_id,
            message: message.into(),
            kind,
            read: false,
            created_at: Utc::now(),
            leave_request_id,
        }
    }
}
