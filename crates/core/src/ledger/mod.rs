//! Balance accounting rules for annual leave.
//!
//! The ledger never touches storage itself: it validates arithmetic and
//! decides when a debit or credit applies. Application happens inside the
//! same atomic commit as the status transition that triggered it.

use crate::domain::leave::LeaveStatus;
use crate::domain::user::User;
use crate::errors::WorkflowError;
use crate::workflow::states::BalanceEffect;

/// Checked debit of `days` from the user's balance. Submission pre-checks the
/// balance, but the ledger enforces it again so a stored balance can never go
/// negative.
pub fn debit(user: &User, days: u32) -> Result<u32, WorkflowError> {
    user.annual_leave_balance.checked_sub(days).ok_or_else(|| {
        WorkflowError::InsufficientBalance {
            user: user.id.clone(),
            requested: days,
            available: user.annual_leave_balance,
        }
    })
}

/// Credit of `days` back onto a balance. No upper bound is enforced here.
pub fn credit(balance: u32, days: u32) -> u32 {
    balance.saturating_add(days)
}

/// Validates that the user's balance covers a final-approval debit and turns
/// it into the effect the store applies.
pub fn debit_effect(user: &User, days: u32) -> Result<BalanceEffect, WorkflowError> {
    debit(user, days)?;
    Ok(BalanceEffect::Debit { user_id: user.id.clone(), days })
}

/// Whether cancelling a request in `status` refunds the balance. A debit only
/// ever happens at the transition into terminal `Approved`, so that is the
/// only status a cancellation credits back from; `Suspended` never debited.
pub fn refunds_on_cancel(status: LeaveStatus, balance_bearing: bool) -> bool {
    balance_bearing && status == LeaveStatus::Approved
}

#[cfg(test)]
mod tests {
    use super::{credit, debit, debit_effect, refunds_on_cancel};
    use crate::domain::department::DepartmentId;
    use crate::domain::leave::LeaveStatus;
    use crate::domain::user::{Role, User, UserId};
    use crate::errors::WorkflowError;
    use crate::workflow::states::BalanceEffect;

    fn user(balance: u32) -> User {
        User {
            id: UserId("u-1".to_string()),
            name: "Nora Feld".to_string(),
            nip: "199001012015012001".to_string(),
            department_id: DepartmentId("dept-eng".to_string()),
            role: Role::Employee,
            annual_leave_balance: balance,
            phone: None,
            join_date: None,
        }
    }

    #[test]
    fn debit_subtracts_when_covered() {
        assert_eq!(debit(&user(10), 3), Ok(7));
        assert_eq!(debit(&user(3), 3), Ok(0));
    }

    #[test]
    fn debit_rejects_overdraw() {
        let error = debit(&user(2), 3).expect_err("overdraw must fail");
        assert_eq!(
            error,
            WorkflowError::InsufficientBalance {
                user: UserId("u-1".to_string()),
                requested: 3,
                available: 2,
            }
        );
    }

    #[test]
    fn credit_has_no_upper_bound() {
        assert_eq!(credit(10, 3), 13);
        assert_eq!(credit(u32::MAX, 1), u32::MAX);
    }

    #[test]
    fn debit_effect_names_the_debited_user() {
        let effect = debit_effect(&user(10), 4).expect("covered debit");
        assert_eq!(effect, BalanceEffect::Debit { user_id: UserId("u-1".to_string()), days: 4 });
    }

    #[test]
    fn only_approved_balance_bearing_requests_refund() {
        assert!(refunds_on_cancel(LeaveStatus::Approved, true));
        assert!(!refunds_on_cancel(LeaveStatus::Approved, false));
        assert!(!refunds_on_cancel(LeaveStatus::Suspended, true));
        assert!(!refunds_on_cancel(LeaveStatus::Pending, true));
    }
}
