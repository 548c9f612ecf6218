use async_trait::async_trait;
use thiserror::Error;

use crate::domain::activity::LogEntry;
use crate::domain::leave::{LeaveRequest, LeaveRequestId};
use crate::domain::notification::Notification;
use crate::domain::user::UserId;
use crate::errors::StoreError;
use crate::workflow::states::{BalanceEffect, TransitionOutcome};

/// Everything a single workflow operation writes. A store must apply the
/// whole commit atomically: the request row is replaced only while its stored
/// version still equals `expected_version`, the balance adjustment happens in
/// the same transaction, and the notification and activity records ride
/// along. Nothing is written when any part fails.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct WorkflowCommit {
    /// The updated request, version already bumped by the engine.
    pub request: LeaveRequest,
    /// Stored version the update is based on; `None` inserts a new request.
    pub expected_version: Option<u32>,
    pub balance: Option<BalanceEffect>,
    pub notifications: Vec<Notification>,
    pub log_entries: Vec<LogEntry>,
}

impl WorkflowCommit {
    /// Builds the commit for a transition outcome. `expected_version` is the
    /// version the request carried when it was loaded, or `None` for a
    /// submission.
    pub fn from_outcome(outcome: TransitionOutcome, expected_version: Option<u32>) -> Self {
        Self {
            request: outcome.request,
            expected_version,
            balance: outcome.balance,
            notifications: outcome.notifications,
            log_entries: outcome.log_entries,
        }
    }
}

#[derive(Clone, Debug, Error, PartialEq, Eq)]
pub enum CommitError {
    #[error("request `{0}` was updated by another actor")]
    Conflict(LeaveRequestId),
    #[error(transparent)]
    Store(#[from] StoreError),
}

/// Persistence port for leave requests and the records a transition emits.
#[async_trait]
pub trait WorkflowStore: Send + Sync {
    async fn request(&self, id: &LeaveRequestId) -> Result<Option<LeaveRequest>, StoreError>;

    /// All requests submitted by one user, newest first.
    async fn requests_for_user(&self, user: &UserId) -> Result<Vec<LeaveRequest>, StoreError>;

    /// Pending requests currently awaiting the given approver, oldest first.
    async fn pending_for_approver(
        &self,
        approver: &UserId,
    ) -> Result<Vec<LeaveRequest>, StoreError>;

    /// Applies the commit atomically and returns the stored request.
    async fn commit(&self, commit: WorkflowCommit) -> Result<LeaveRequest, CommitError>;
}
