use chrono::Utc;
use uuid::Uuid;

use crate::domain::activity::LogEntry;
use crate::domain::department::ApprovalChain;
use crate::domain::leave::{LeaveRequest, LeaveRequestId, LeaveStatus, LeaveType};
use crate::domain::notification::{Notification, NotificationKind};
use crate::domain::user::User;
use crate::errors::WorkflowError;
use crate::ledger;
use crate::workflow::states::{BalanceEffect, Decision, SubmissionInput, TransitionOutcome};

/// The approval state machine. All methods are pure: they take loaded
/// entities, validate the transition, and return the updated request together
/// with the records and balance effect the caller must persist atomically.
#[derive(Clone, Debug, Default)]
pub struct WorkflowEngine;

impl WorkflowEngine {
    pub fn new() -> Self {
        Self
    }

    /// Creates a new request in `Pending`, awaiting the first chain entry.
    /// The balance is only pre-checked here; the debit happens at final
    /// approval.
    pub fn submit(
        &self,
        input: SubmissionInput,
        requester: &User,
        leave_type: &LeaveType,
        chain: &ApprovalChain,
    ) -> Result<TransitionOutcome, WorkflowError> {
        if input.start_date > input.end_date {
            return Err(WorkflowError::InvalidDateRange {
                start: input.start_date,
                end: input.end_date,
            });
        }
        if input.days == 0 {
            return Err(WorkflowError::InvalidDayCount);
        }
        if leave_type.balance_bearing {
            ledger::debit(requester, input.days)?;
        }
        let first_approver = chain.first().ok_or_else(|| {
            WorkflowError::NoApprovalFlowConfigured {
                department: requester.department_id.clone(),
            }
        })?;

        let request = LeaveRequest {
            id: LeaveRequestId(Uuid::new_v4().to_string()),
            requester_id: requester.id.clone(),
            leave_type_id: input.leave_type_id.clone(),
            start_date: input.start_date,
            end_date: input.end_date,
            days: input.days,
            reason: input.reason.clone(),
            status: LeaveStatus::Pending,
            attachment_uploaded: input.attachment_uploaded,
            next_approver_id: Some(first_approver.clone()),
            version: 1,
            created_at: Utc::now(),
        };

        let mut notifications = vec![Notification::new(
            first_approver.clone(),
            NotificationKind::Info,
            format!(
                "New leave request from {} ({}) is waiting for your approval.",
                requester.name, leave_type.name
            ),
            Some(request.id.clone()),
        )];
        if leave_type.requires_attachment && !input.attachment_uploaded {
            notifications.push(Notification::new(
                requester.id.clone(),
                NotificationKind::Warning,
                format!("Your {} request is awaiting a supporting document.", leave_type.name),
                Some(request.id.clone()),
            ));
        }

        let log_entries = vec![LogEntry::new(
            requester.name.clone(),
            format!("Submitted a new leave request ({}, {} days).", leave_type.name, input.days),
            Some(request.id.clone()),
        )];

        Ok(TransitionOutcome {
            request,
            previous_status: None,
            balance: None,
            notifications,
            log_entries,
        })
    }

    /// Applies one approver decision to a pending request.
    ///
    /// The acting user must be exactly the awaited approver. An `Approved`
    /// decision by the last chain entry is final: the request terminates and
    /// a balance-bearing leave type is debited in the same outcome. Any
    /// earlier entry forwards the request to the next approver unchanged.
    pub fn decide(
        &self,
        request: &LeaveRequest,
        acting: &User,
        decision: Decision,
        chain: &ApprovalChain,
        leave_type: &LeaveType,
        requester: &User,
    ) -> Result<TransitionOutcome, WorkflowError> {
        if request.status != LeaveStatus::Pending {
            return Err(WorkflowError::InvalidTransition {
                request: request.id.clone(),
                status: request.status,
            });
        }
        if request.next_approver_id.as_ref() != Some(&acting.id) {
            return Err(WorkflowError::NotAuthorizedApprover {
                request: request.id.clone(),
                approver: acting.id.clone(),
            });
        }

        let mut updated = request.clone();
        updated.version += 1;
        let mut balance = None;
        let mut notifications = Vec::new();
        let mut log_entries = Vec::new();

        match decision {
            Decision::Rejected => {
                updated.status = LeaveStatus::Rejected;
                updated.next_approver_id = None;
                notifications.push(Notification::new(
                    requester.id.clone(),
                    NotificationKind::Warning,
                    format!("Your {} request was rejected.", leave_type.name),
                    Some(request.id.clone()),
                ));
                log_entries.push(LogEntry::new(
                    acting.name.clone(),
                    format!("Rejected leave request for {}.", requester.name),
                    Some(request.id.clone()),
                ));
            }
            Decision::Suspended => {
                updated.status = LeaveStatus::Suspended;
                updated.next_approver_id = None;
                notifications.push(Notification::new(
                    requester.id.clone(),
                    NotificationKind::Warning,
                    format!("Your {} request was suspended.", leave_type.name),
                    Some(request.id.clone()),
                ));
                log_entries.push(LogEntry::new(
                    acting.name.clone(),
                    format!("Suspended leave request for {}.", requester.name),
                    Some(request.id.clone()),
                ));
            }
            Decision::Approved => {
                let index = chain.position_of(&acting.id).ok_or_else(|| {
                    WorkflowError::InvalidChainState {
                        approver: acting.id.clone(),
                        department: requester.department_id.clone(),
                    }
                })?;

                match chain.next_after(index) {
                    Some(next_approver) => {
                        updated.next_approver_id = Some(next_approver.clone());
                        notifications.push(Notification::new(
                            next_approver.clone(),
                            NotificationKind::Info,
                            format!(
                                "Leave request from {} ({}) was approved and is now waiting for your decision.",
                                requester.name, leave_type.name
                            ),
                            Some(request.id.clone()),
                        ));
                        log_entries.push(LogEntry::new(
                            acting.name.clone(),
                            format!("Approved and forwarded leave request for {}.", requester.name),
                            Some(request.id.clone()),
                        ));
                    }
                    None => {
                        updated.status = LeaveStatus::Approved;
                        updated.next_approver_id = None;
                        if leave_type.balance_bearing {
                            balance = Some(ledger::debit_effect(requester, request.days)?);
                        }
                        notifications.push(Notification::new(
                            requester.id.clone(),
                            NotificationKind::Success,
                            format!(
                                "Congratulations! Your {} request has been fully approved.",
                                leave_type.name
                            ),
                            Some(request.id.clone()),
                        ));
                        log_entries.push(LogEntry::new(
                            acting.name.clone(),
                            format!("Approved (Final) leave request for {}.", requester.name),
                            Some(request.id.clone()),
                        ));
                    }
                }
            }
        }

        Ok(TransitionOutcome {
            request: updated,
            previous_status: Some(LeaveStatus::Pending),
            balance,
            notifications,
            log_entries,
        })
    }

    /// Cancels a request. A pending request may be cancelled by its requester
    /// or an administrator; an approved or suspended one only with elevated
    /// (credential-verified) authorization. A request that reached terminal
    /// `Approved` with a balance-bearing leave type gets its days credited
    /// back; a suspended one never debited, so nothing is restored.
    pub fn cancel(
        &self,
        request: &LeaveRequest,
        actor: &User,
        elevated: bool,
        leave_type: &LeaveType,
        requester: &User,
    ) -> Result<TransitionOutcome, WorkflowError> {
        match request.status {
            LeaveStatus::Pending => {
                if actor.id != requester.id && !actor.role.is_admin() {
                    return Err(WorkflowError::UnauthorizedCancellation {
                        request: request.id.clone(),
                        actor: actor.id.clone(),
                    });
                }
            }
            LeaveStatus::Approved | LeaveStatus::Suspended => {
                if !elevated {
                    return Err(WorkflowError::UnauthorizedCancellation {
                        request: request.id.clone(),
                        actor: actor.id.clone(),
                    });
                }
            }
            LeaveStatus::Rejected | LeaveStatus::Cancelled => {
                return Err(WorkflowError::InvalidTransition {
                    request: request.id.clone(),
                    status: request.status,
                });
            }
        }

        let mut updated = request.clone();
        let previous_status = request.status;
        updated.status = LeaveStatus::Cancelled;
        updated.next_approver_id = None;
        updated.version += 1;

        let balance = ledger::refunds_on_cancel(previous_status, leave_type.balance_bearing)
            .then(|| BalanceEffect::Credit { user_id: requester.id.clone(), days: request.days });

        let self_cancel = actor.id == requester.id;
        let mut notifications = Vec::new();
        if !self_cancel {
            notifications.push(Notification::new(
                requester.id.clone(),
                NotificationKind::Info,
                format!("Your {} request was cancelled by {}.", leave_type.name, actor.name),
                Some(request.id.clone()),
            ));
        }
        let log_entries = vec![if self_cancel {
            LogEntry::new(
                requester.name.clone(),
                format!(
                    "Cancelled their own leave request ({}, {} days).",
                    leave_type.name, request.days
                ),
                Some(request.id.clone()),
            )
        } else {
            LogEntry::new(
                actor.name.clone(),
                format!(
                    "Cancelled leave request for {} ({}, {} days).",
                    requester.name, leave_type.name, request.days
                ),
                Some(request.id.clone()),
            )
        }];

        Ok(TransitionOutcome {
            request: updated,
            previous_status: Some(previous_status),
            balance,
            notifications,
            log_entries,
        })
    }
}
