//! In-memory implementations of the persistence ports, for tests and for
//! embedding without a database. A single locked state backs both ports so a
//! workflow commit stays atomic across the request, the balance, and the
//! emitted records.

use std::collections::HashMap;
use std::sync::Arc;

use async_trait::async_trait;
use tokio::sync::RwLock;

use crate::directory::Directory;
use crate::domain::activity::LogEntry;
use crate::domain::department::{ApprovalChain, Department, DepartmentId};
use crate::domain::leave::{LeaveRequest, LeaveRequestId, LeaveType, LeaveTypeId};
use crate::domain::notification::Notification;
use crate::domain::user::{User, UserId};
use crate::errors::StoreError;
use crate::workflow::states::BalanceEffect;
use crate::workflow::store::{CommitError, WorkflowCommit, WorkflowStore};

#[derive(Default)]
struct MemoryState {
    users: HashMap<String, User>,
    departments: HashMap<String, Department>,
    leave_types: HashMap<String, LeaveType>,
    chains: HashMap<String, ApprovalChain>,
    requests: HashMap<String, LeaveRequest>,
    notifications: Vec<Notification>,
    log_entries: Vec<LogEntry>,
}

#[derive(Clone, Default)]
pub struct InMemoryBackend {
    state: Arc<RwLock<MemoryState>>,
}

impl InMemoryBackend {
    pub fn new() -> Self {
        Self::default()
    }

    pub async fn insert_user(&self, user: User) {
        let mut state = self.state.write().await;
        state.users.insert(user.id.0.clone(), user);
    }

    pub async fn insert_department(&self, department: Department) {
        let mut state = self.state.write().await;
        state.departments.insert(department.id.0.clone(), department);
    }

    pub async fn insert_leave_type(&self, leave_type: LeaveType) {
        let mut state = self.state.write().await;
        state.leave_types.insert(leave_type.id.0.clone(), leave_type);
    }

    pub async fn set_approval_chain(&self, department: DepartmentId, chain: ApprovalChain) {
        let mut state = self.state.write().await;
        state.chains.insert(department.0, chain);
    }

    pub async fn balance_of(&self, user: &UserId) -> Option<u32> {
        let state = self.state.read().await;
        state.users.get(&user.0).map(|user| user.annual_leave_balance)
    }

    pub async fn notifications(&self) -> Vec<Notification> {
        self.state.read().await.notifications.clone()
    }

    pub async fn log_entries(&self) -> Vec<LogEntry> {
        self.state.read().await.log_entries.clone()
    }
}

#[async_trait]
impl Directory for InMemoryBackend {
    async fn user(&self, id: &UserId) -> Result<Option<User>, StoreError> {
        Ok(self.state.read().await.users.get(&id.0).cloned())
    }

    async fn user_by_nip(&self, nip: &str) -> Result<Option<User>, StoreError> {
        let state = self.state.read().await;
        Ok(state.users.values().find(|user| user.nip == nip).cloned())
    }

    async fn department(&self, id: &DepartmentId) -> Result<Option<Department>, StoreError> {
        Ok(self.state.read().await.departments.get(&id.0).cloned())
    }

    async fn leave_type(&self, id: &LeaveTypeId) -> Result<Option<LeaveType>, StoreError> {
        Ok(self.state.read().await.leave_types.get(&id.0).cloned())
    }

    async fn approval_chain(
        &self,
        department: &DepartmentId,
    ) -> Result<ApprovalChain, StoreError> {
        let state = self.state.read().await;
        Ok(state.chains.get(&department.0).cloned().unwrap_or_default())
    }
}

#[async_trait]
impl WorkflowStore for InMemoryBackend {
    async fn request(&self, id: &LeaveRequestId) -> Result<Option<LeaveRequest>, StoreError> {
        Ok(self.state.read().await.requests.get(&id.0).cloned())
    }

    async fn requests_for_user(&self, user: &UserId) -> Result<Vec<LeaveRequest>, StoreError> {
        let state = self.state.read().await;
        let mut requests: Vec<LeaveRequest> =
            state.requests.values().filter(|req| &req.requester_id == user).cloned().collect();
        requests.sort_by(|left, right| right.created_at.cmp(&left.created_at));
        Ok(requests)
    }

    async fn pending_for_approver(
        &self,
        approver: &UserId,
    ) -> Result<Vec<LeaveRequest>, StoreError> {
        let state = self.state.read().await;
        let mut requests: Vec<LeaveRequest> = state
            .requests
            .values()
            .filter(|req| req.is_awaiting(approver))
            .cloned()
            .collect();
        requests.sort_by(|left, right| left.created_at.cmp(&right.created_at));
        Ok(requests)
    }

    async fn commit(&self, commit: WorkflowCommit) -> Result<LeaveRequest, CommitError> {
        let mut state = self.state.write().await;

        match commit.expected_version {
            None => {
                if state.requests.contains_key(&commit.request.id.0) {
                    return Err(CommitError::Conflict(commit.request.id));
                }
            }
            Some(expected) => {
                let stored = state
                    .requests
                    .get(&commit.request.id.0)
                    .ok_or_else(|| CommitError::Conflict(commit.request.id.clone()))?;
                if stored.version != expected {
                    return Err(CommitError::Conflict(commit.request.id));
                }
            }
        }

        if let Some(effect) = &commit.balance {
            let (user_id, days, is_debit) = match effect {
                BalanceEffect::Debit { user_id, days } => (user_id, *days, true),
                BalanceEffect::Credit { user_id, days } => (user_id, *days, false),
            };
            let user = state.users.get_mut(&user_id.0).ok_or_else(|| {
                CommitError::Store(StoreError::Backend(format!("unknown user `{user_id}`")))
            })?;
            let adjusted = if is_debit {
                user.annual_leave_balance.checked_sub(days)
            } else {
                user.annual_leave_balance.checked_add(days)
            };
            user.annual_leave_balance = adjusted.ok_or_else(|| {
                CommitError::Store(StoreError::Backend(format!(
                    "balance adjustment out of range for user `{user_id}`"
                )))
            })?;
        }

        state.requests.insert(commit.request.id.0.clone(), commit.request.clone());
        state.notifications.extend(commit.notifications);
        state.log_entries.extend(commit.log_entries);

        Ok(commit.request)
    }
}
