use async_trait::async_trait;

use crate::domain::department::{ApprovalChain, Department, DepartmentId};
use crate::domain::leave::{LeaveType, LeaveTypeId};
use crate::domain::user::{User, UserId};
use crate::errors::StoreError;

/// Read-only lookup of users, departments, leave types, and the
/// per-department approval-chain configuration. The workflow never writes
/// through this port; balances change only inside a workflow commit.
#[async_trait]
pub trait Directory: Send + Sync {
    async fn user(&self, id: &UserId) -> Result<Option<User>, StoreError>;

    /// Lookup by employee number.
    async fn user_by_nip(&self, nip: &str) -> Result<Option<User>, StoreError>;

    async fn department(&self, id: &DepartmentId) -> Result<Option<Department>, StoreError>;

    async fn leave_type(&self, id: &LeaveTypeId) -> Result<Option<LeaveType>, StoreError>;

    /// The ordered approver chain configured for a department. An unknown or
    /// unconfigured department yields an empty chain; callers decide whether
    /// that is an error.
    async fn approval_chain(&self, department: &DepartmentId)
        -> Result<ApprovalChain, StoreError>;
}
