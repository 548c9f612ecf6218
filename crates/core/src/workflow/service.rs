use crate::directory::Directory;
use crate::domain::leave::{LeaveRequest, LeaveRequestId, LeaveType, LeaveTypeId};
use crate::domain::user::{User, UserId};
use crate::errors::WorkflowError;
use crate::workflow::engine::WorkflowEngine;
use crate::workflow::states::{Decision, SubmissionInput};
use crate::workflow::store::{CommitError, WorkflowCommit, WorkflowStore};

/// Drives the approval workflow against the injected persistence
/// collaborators. Every operation is one atomic unit: load the entities, run
/// the pure transition, commit the result under an optimistic version check.
/// A lost race surfaces as `ConcurrentModification`; the service never
/// retries on its own.
pub struct WorkflowService<D, S> {
    directory: D,
    store: S,
    engine: WorkflowEngine,
}

impl<D, S> WorkflowService<D, S>
where
    D: Directory,
    S: WorkflowStore,
{
    pub fn new(directory: D, store: S) -> Self {
        Self { directory, store, engine: WorkflowEngine::new() }
    }

    pub async fn submit(&self, input: SubmissionInput) -> Result<LeaveRequest, WorkflowError> {
        let requester = self.load_user(&input.requester_id).await?;
        let leave_type = self.load_leave_type(&input.leave_type_id).await?;
        let chain = self.directory.approval_chain(&requester.department_id).await?;

        let outcome = self.engine.submit(input, &requester, &leave_type, &chain)?;
        tracing::info!(
            request = %outcome.request.id,
            requester = %requester.id,
            leave_type = %leave_type.id,
            days = outcome.request.days,
            "leave request submitted"
        );
        self.commit(WorkflowCommit::from_outcome(outcome, None)).await
    }

    pub async fn decide(
        &self,
        request_id: &LeaveRequestId,
        approver_id: &UserId,
        decision: Decision,
    ) -> Result<LeaveRequest, WorkflowError> {
        let request = self.load_request(request_id).await?;
        let acting = self.load_user(approver_id).await?;
        let requester = self.load_user(&request.requester_id).await?;
        let leave_type = self.load_leave_type(&request.leave_type_id).await?;
        let chain = self.directory.approval_chain(&requester.department_id).await?;

        let expected_version = request.version;
        let outcome =
            self.engine.decide(&request, &acting, decision, &chain, &leave_type, &requester)?;
        tracing::info!(
            request = %request_id,
            approver = %approver_id,
            decision = decision.as_str(),
            status = outcome.request.status.as_str(),
            "decision applied"
        );
        self.commit(WorkflowCommit::from_outcome(outcome, Some(expected_version))).await
    }

    pub async fn cancel(
        &self,
        request_id: &LeaveRequestId,
        actor_id: &UserId,
        elevated: bool,
    ) -> Result<LeaveRequest, WorkflowError> {
        let request = self.load_request(request_id).await?;
        let actor = self.load_user(actor_id).await?;
        let requester = self.load_user(&request.requester_id).await?;
        let leave_type = self.load_leave_type(&request.leave_type_id).await?;

        let expected_version = request.version;
        let outcome = self.engine.cancel(&request, &actor, elevated, &leave_type, &requester)?;
        tracing::info!(
            request = %request_id,
            actor = %actor_id,
            from_status = ?outcome.previous_status,
            refunded = outcome.balance.is_some(),
            "leave request cancelled"
        );
        self.commit(WorkflowCommit::from_outcome(outcome, Some(expected_version))).await
    }

    pub async fn request(&self, id: &LeaveRequestId) -> Result<LeaveRequest, WorkflowError> {
        self.load_request(id).await
    }

    pub async fn requests_for_user(
        &self,
        user: &UserId,
    ) -> Result<Vec<LeaveRequest>, WorkflowError> {
        Ok(self.store.requests_for_user(user).await?)
    }

    /// Pending requests whose decision is currently awaited from the given
    /// approver.
    pub async fn pending_approvals(
        &self,
        approver: &UserId,
    ) -> Result<Vec<LeaveRequest>, WorkflowError> {
        Ok(self.store.pending_for_approver(approver).await?)
    }

    async fn load_user(&self, id: &UserId) -> Result<User, WorkflowError> {
        self.directory.user(id).await?.ok_or_else(|| WorkflowError::UnknownUser(id.clone()))
    }

    async fn load_leave_type(&self, id: &LeaveTypeId) -> Result<LeaveType, WorkflowError> {
        self.directory
            .leave_type(id)
            .await?
            .ok_or_else(|| WorkflowError::UnknownLeaveType(id.clone()))
    }

    async fn load_request(&self, id: &LeaveRequestId) -> Result<LeaveRequest, WorkflowError> {
        self.store.request(id).await?.ok_or_else(|| WorkflowError::RequestNotFound(id.clone()))
    }

    async fn commit(&self, commit: WorkflowCommit) -> Result<LeaveRequest, WorkflowError> {
        let request_id = commit.request.id.clone();
        match self.store.commit(commit).await {
            Ok(request) => Ok(request),
            Err(CommitError::Conflict(_)) => {
                tracing::warn!(request = %request_id, "commit lost an optimistic version race");
                Err(WorkflowError::ConcurrentModification { request: request_id })
            }
            Err(CommitError::Store(err)) => Err(err.into()),
        }
    }
}

#[cfg(test)]
mod tests {
    use async_trait::async_trait;
    use chrono::NaiveDate;

    use super::WorkflowService;
    use crate::domain::department::{ApprovalChain, Department, DepartmentId};
    use crate::domain::leave::{LeaveRequest, LeaveRequestId, LeaveStatus, LeaveType, LeaveTypeId};
    use crate::domain::user::{Role, User, UserId};
    use crate::errors::{StoreError, WorkflowError};
    use crate::memory::InMemoryBackend;
    use crate::workflow::states::{Decision, SubmissionInput};
    use crate::workflow::store::{CommitError, WorkflowCommit, WorkflowStore};

    fn user_id(id: &str) -> UserId {
        UserId(id.to_string())
    }

    async fn seeded_backend() -> InMemoryBackend {
        let backend = InMemoryBackend::new();
        backend
            .insert_department(Department {
                id: DepartmentId("dept-eng".to_string()),
                name: "Engineering".to_string(),
            })
            .await;
        backend
            .insert_leave_type(LeaveType {
                id: LeaveTypeId("annual".to_string()),
                name: "Annual Leave".to_string(),
                balance_bearing: true,
                requires_attachment: false,
            })
            .await;
        for (id, name, role, balance) in [
            ("u-emp", "Nora Feld", Role::Employee, 10),
            ("u-head", "Priya Raman", Role::Employee, 8),
            ("u-admin", "Site Admin", Role::Admin, 0),
        ] {
            backend
                .insert_user(User {
                    id: user_id(id),
                    name: name.to_string(),
                    nip: format!("nip-{id}"),
                    department_id: DepartmentId("dept-eng".to_string()),
                    role,
                    annual_leave_balance: balance,
                    phone: None,
                    join_date: None,
                })
                .await;
        }
        backend
            .set_approval_chain(
                DepartmentId("dept-eng".to_string()),
                ApprovalChain::new(vec![user_id("u-head"), user_id("u-admin")]),
            )
            .await;
        backend
    }

    fn submission(days: u32) -> SubmissionInput {
        SubmissionInput {
            requester_id: user_id("u-emp"),
            leave_type_id: LeaveTypeId("annual".to_string()),
            start_date: NaiveDate::from_ymd_opt(2026, 9, 7).expect("valid date"),
            end_date: NaiveDate::from_ymd_opt(2026, 9, 9).expect("valid date"),
            days,
            reason: "Family matters".to_string(),
            attachment_uploaded: false,
        }
    }

    #[tokio::test]
    async fn two_level_chain_debits_at_final_approval_and_refunds_on_cancel() {
        let backend = seeded_backend().await;
        let service = WorkflowService::new(backend.clone(), backend.clone());

        let request = service.submit(submission(3)).await.expect("submit");
        assert_eq!(request.status, LeaveStatus::Pending);
        assert_eq!(request.next_approver_id, Some(user_id("u-head")));
        assert_eq!(backend.balance_of(&user_id("u-emp")).await, Some(10));

        let request = service
            .decide(&request.id, &user_id("u-head"), Decision::Approved)
            .await
            .expect("first approval");
        assert_eq!(request.status, LeaveStatus::Pending);
        assert_eq!(request.next_approver_id, Some(user_id("u-admin")));
        assert_eq!(backend.balance_of(&user_id("u-emp")).await, Some(10));

        let request = service
            .decide(&request.id, &user_id("u-admin"), Decision::Approved)
            .await
            .expect("final approval");
        assert_eq!(request.status, LeaveStatus::Approved);
        assert_eq!(request.next_approver_id, None);
        assert_eq!(backend.balance_of(&user_id("u-emp")).await, Some(7));

        let request = service
            .cancel(&request.id, &user_id("u-admin"), true)
            .await
            .expect("administrative cancel");
        assert_eq!(request.status, LeaveStatus::Cancelled);
        assert_eq!(backend.balance_of(&user_id("u-emp")).await, Some(10));
    }

    #[tokio::test]
    async fn decisions_by_the_wrong_approver_change_nothing() {
        let backend = seeded_backend().await;
        let service = WorkflowService::new(backend.clone(), backend.clone());

        let request = service.submit(submission(3)).await.expect("submit");
        let error = service
            .decide(&request.id, &user_id("u-admin"), Decision::Approved)
            .await
            .expect_err("admin is second in the chain");
        assert!(matches!(error, WorkflowError::NotAuthorizedApprover { .. }));

        let stored = service.request(&request.id).await.expect("reload");
        assert_eq!(stored, request);
    }

    #[tokio::test]
    async fn pending_approvals_tracks_the_awaited_approver() {
        let backend = seeded_backend().await;
        let service = WorkflowService::new(backend.clone(), backend.clone());

        let request = service.submit(submission(2)).await.expect("submit");
        assert_eq!(service.pending_approvals(&user_id("u-head")).await.expect("list").len(), 1);
        assert!(service.pending_approvals(&user_id("u-admin")).await.expect("list").is_empty());

        service
            .decide(&request.id, &user_id("u-head"), Decision::Approved)
            .await
            .expect("forward");
        assert!(service.pending_approvals(&user_id("u-head")).await.expect("list").is_empty());
        assert_eq!(service.pending_approvals(&user_id("u-admin")).await.expect("list").len(), 1);
    }

    #[tokio::test]
    async fn unknown_identities_are_reported_as_typed_errors() {
        let backend = seeded_backend().await;
        let service = WorkflowService::new(backend.clone(), backend.clone());

        let mut input = submission(2);
        input.requester_id = user_id("u-ghost");
        let error = service.submit(input).await.expect_err("unknown requester");
        assert_eq!(error, WorkflowError::UnknownUser(user_id("u-ghost")));

        let error = service
            .decide(&LeaveRequestId("req-missing".to_string()), &user_id("u-head"), Decision::Approved)
            .await
            .expect_err("unknown request");
        assert_eq!(error, WorkflowError::RequestNotFound(LeaveRequestId("req-missing".to_string())));
    }

    /// Store double whose commits always lose the version race.
    struct ContestedStore {
        inner: InMemoryBackend,
    }

    #[async_trait]
    impl WorkflowStore for ContestedStore {
        async fn request(&self, id: &LeaveRequestId) -> Result<Option<LeaveRequest>, StoreError> {
            self.inner.request(id).await
        }

        async fn requests_for_user(
            &self,
            user: &UserId,
        ) -> Result<Vec<LeaveRequest>, StoreError> {
            self.inner.requests_for_user(user).await
        }

        async fn pending_for_approver(
            &self,
            approver: &UserId,
        ) -> Result<Vec<LeaveRequest>, StoreError> {
            self.inner.pending_for_approver(approver).await
        }

        async fn commit(&self, commit: WorkflowCommit) -> Result<LeaveRequest, CommitError> {
            Err(CommitError::Conflict(commit.request.id))
        }
    }

    #[tokio::test]
    async fn lost_commit_races_surface_as_concurrent_modification() {
        let backend = seeded_backend().await;
        let service =
            WorkflowService::new(backend.clone(), ContestedStore { inner: backend.clone() });

        let error = service.submit(submission(2)).await.expect_err("contested commit");
        assert!(matches!(error, WorkflowError::ConcurrentModification { .. }));
    }
}
