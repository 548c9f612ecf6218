use std::fmt;

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

use crate::domain::leave::LeaveRequestId;

#[derive(Clone, Debug, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct LogEntryId(pub String);

impl fmt::Display for LogEntryId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

/// One line of the append-only activity record. `actor` is a display name,
/// matching what administrators review.
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct LogEntry {
    pub id: LogEntryId,
    pub occurred_at: DateTime<Utc>,
    pub actor: String,
    pub activity: String,
    pub leave_request_id: Option<LeaveRequestId>,
}

impl LogEntry {
    pub fn new(
        actor: impl Into<String>,
        activity: impl Into<String>,
        leave_request_id: Option<LeaveRequestId>,
    ) -> Self {
        Self {
            id: LogEntryId(Uuid::new_v4().to_string()),
            occurred_at: Utc::now(),
            actor: actor.into(),
            activity: activity.into(),
            leave_request_id,
        }
    }
}
