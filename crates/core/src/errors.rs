use chrono::NaiveDate;
use thiserror::Error;

use crate::domain::department::DepartmentId;
use crate::domain::leave::{LeaveRequestId, LeaveStatus, LeaveTypeId};
use crate::domain::user::UserId;

/// Failures reported by workflow operations. Every operation returns either a
/// new state or one of these; there is no partial mutation on failure. Only
/// `ConcurrentModification` is worth retrying, after reloading the request.
#[derive(Clone, Debug, Error, PartialEq, Eq)]
pub enum WorkflowError {
    #[error("user `{approver}` is not the approver awaited by request `{request}`")]
    NotAuthorizedApprover { request: LeaveRequestId, approver: UserId },
    #[error("request `{request}` does not allow this operation in status `{status:?}`")]
    InvalidTransition { request: LeaveRequestId, status: LeaveStatus },
    #[error("no approval flow is configured for department `{department}`")]
    NoApprovalFlowConfigured { department: DepartmentId },
    #[error("insufficient balance for user `{user}`: requested {requested} days, {available} available")]
    InsufficientBalance { user: UserId, requested: u32, available: u32 },
    #[error("approver `{approver}` is not part of the approval chain for department `{department}`")]
    InvalidChainState { approver: UserId, department: DepartmentId },
    #[error("request `{request}` was modified concurrently; reload and retry")]
    ConcurrentModification { request: LeaveRequestId },
    #[error("invalid date range: start {start} is after end {end}")]
    InvalidDateRange { start: NaiveDate, end: NaiveDate },
    #[error("day count must be greater than zero")]
    InvalidDayCount,
    #[error("user `{actor}` may not cancel request `{request}`")]
    UnauthorizedCancellation { request: LeaveRequestId, actor: UserId },
    #[error("unknown user `{0}`")]
    UnknownUser(UserId),
    #[error("unknown leave type `{0}`")]
    UnknownLeaveType(LeaveTypeId),
    #[error("leave request `{0}` not found")]
    RequestNotFound(LeaveRequestId),
    #[error(transparent)]
    Store(#[from] StoreError),
}

/// Failures surfaced by the persistence collaborators. Kept free of any
/// concrete backend type so the core contract stays backend-agnostic; the db
/// crate maps its driver errors into these.
#[derive(Clone, Debug, Error, PartialEq, Eq)]
pub enum StoreError {
    #[error("storage backend failure: {0}")]
    Backend(String),
    #[error("stored data could not be decoded: {0}")]
    Decode(String),
}
