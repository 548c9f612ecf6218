use std::fmt;

use chrono::{DateTime, NaiveDate, Utc};
use serde::{Deserialize, Serialize};

use crate::domain::user::UserId;

#[derive(Clone, Debug, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct LeaveTypeId(pub String);

impl fmt::Display for LeaveTypeId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

/// A configured category of leave. `balance_bearing` marks the one type
/// whose consumption decrements the annual leave balance;
/// `requires_attachment` marks types that expect a supporting document
/// (which may be completed after submission).
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct LeaveType {
    pub id: LeaveTypeId,
    pub name: String,
    pub balance_bearing: bool,
    pub requires_attachment: bool,
}

#[derive(Clone, Debug, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct LeaveRequestId(pub String);

impl fmt::Display for LeaveRequestId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

#[derive(Clone, Copy, Debug, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum LeaveStatus {
    Pending,
    Approved,
    Rejected,
    Cancelled,
    Suspended,
}

impl LeaveStatus {
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Pending => "pending",
            Self::Approved => "approved",
            Self::Rejected => "rejected",
            Self::Cancelled => "cancelled",
            Self::Suspended => "suspended",
        }
    }

    pub fn parse(value: &str) -> Option<Self> {
        match value.trim().to_ascii_lowercase().as_str() {
            "pending" => Some(Self::Pending),
            "approved" => Some(Self::Approved),
            "rejected" => Some(Self::Rejected),
            "cancelled" => Some(Self::Cancelled),
            "suspended" => Some(Self::Suspended),
            _ => None,
        }
    }
}

/// A leave request travelling through its department's approval chain.
///
/// `next_approver_id` names the single identity whose decision is currently
/// awaited; it is `None` in every terminal status. `version` is the
/// optimistic-concurrency token checked by the store at commit time.
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct LeaveRequest {
    pub id: LeaveRequestId,
    pub requester_id: UserId,
    pub leave_type_id: LeaveTypeId,
    pub start_date: NaiveDate,
    pub end_date: NaiveDate,
    pub days: u32,
    pub reason: String,
    pub status: LeaveStatus,
    pub attachment_uploaded: bool,
    pub next_approver_id: Option<UserId>,
    pub version: u32,
    pub created_at: DateTime<Utc>,
}

impl LeaveRequest {
    /// Whether the given user is the approver this request is waiting on.
    pub fn is_awaiting(&self, approver: &UserId) -> bool {
        self.status == LeaveStatus::Pending && self.next_approver_id.as_ref() == Some(approver)
    }
}
