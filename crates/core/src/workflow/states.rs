use chrono::NaiveDate;
use serde::{Deserialize, Serialize};

use crate::domain::activity::LogEntry;
use crate::domain::leave::{LeaveRequest, LeaveStatus, LeaveTypeId};
use crate::domain::notification::Notification;
use crate::domain::user::UserId;

/// The action taken by the approver a pending request is waiting on.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Decision {
    Approved,
    Rejected,
    Suspended,
}

impl Decision {
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Approved => "approved",
            Self::Rejected => "rejected",
            Self::Suspended => "suspended",
        }
    }
}

#[derive(Clone, Debug, PartialEq, Eq)]
pub struct SubmissionInput {
    pub requester_id: UserId,
    pub leave_type_id: LeaveTypeId,
    pub start_date: NaiveDate,
    pub end_date: NaiveDate,
    pub days: u32,
    pub reason: String,
    pub attachment_uploaded: bool,
}

/// A balance adjustment a transition requires. Applied by the store in the
/// same transaction as the request update.
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub enum BalanceEffect {
    Debit { user_id: UserId, days: u32 },
    Credit { user_id: UserId, days: u32 },
}

/// Everything one transition produced. The caller persists the request,
/// applies the balance effect, and delivers the side-channel records as one
/// atomic unit.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct TransitionOutcome {
    pub request: LeaveRequest,
    /// `None` for submission, which creates the request.
    pub previous_status: Option<LeaveStatus>,
    pub balance: Option<BalanceEffect>,
    pub notifications: Vec<Notification>,
    pub log_entries: Vec<LogEntry>,
}
