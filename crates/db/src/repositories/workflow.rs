use async_trait::async_trait;
use chrono::{DateTime, NaiveDate, Utc};
use sqlx::Row;

use leaveflow_core::audit::{ActivitySealer, SealedEntry};
use leaveflow_core::domain::activity::{LogEntry, LogEntryId};
use leaveflow_core::domain::leave::{LeaveRequest, LeaveRequestId, LeaveStatus, LeaveTypeId};
use leaveflow_core::domain::user::UserId;
use leaveflow_core::errors::StoreError;
use leaveflow_core::workflow::states::BalanceEffect;
use leaveflow_core::workflow::store::{CommitError, WorkflowCommit, WorkflowStore};

use super::{backend_error, decode_error};
use crate::DbPool;

/// SQLite-backed workflow store. A commit is one transaction: the request
/// row is inserted or replaced under the version guard, the balance
/// adjustment runs against the same connection, and the emitted records are
/// appended, the activity entries sealed onto the stored trail.
pub struct SqlWorkflowStore {
    pool: DbPool,
    sealer: ActivitySealer,
}

impl SqlWorkflowStore {
    pub fn new(pool: DbPool, sealer: ActivitySealer) -> Self {
        Self { pool, sealer }
    }
}

const REQUEST_COLUMNS: &str = "id, requester_id, leave_type_id, start_date, end_date, days, \
                               reason, status, attachment_uploaded, next_approver_id, version, \
                               created_at";

pub(crate) fn row_to_request(row: &sqlx::sqlite::SqliteRow) -> Result<LeaveRequest, StoreError> {
    let id: String = row.try_get("id").map_err(|e| decode_error(e.to_string()))?;
    let requester_id: String =
        row.try_get("requester_id").map_err(|e| decode_error(e.to_string()))?;
    let leave_type_id: String =
        row.try_get("leave_type_id").map_err(|e| decode_error(e.to_string()))?;
    let start_date_str: String =
        row.try_get("start_date").map_err(|e| decode_error(e.to_string()))?;
    let end_date_str: String =
        row.try_get("end_date").map_err(|e| decode_error(e.to_string()))?;
    let days: u32 = row.try_get("days").map_err(|e| decode_error(e.to_string()))?;
    let reason: String = row.try_get("reason").map_err(|e| decode_error(e.to_string()))?;
    let status_str: String = row.try_get("status").map_err(|e| decode_error(e.to_string()))?;
    let attachment_uploaded: bool =
        row.try_get("attachment_uploaded").map_err(|e| decode_error(e.to_string()))?;
    let next_approver_id: Option<String> =
        row.try_get("next_approver_id").map_err(|e| decode_error(e.to_string()))?;
    let version: u32 = row.try_get("version").map_err(|e| decode_error(e.to_string()))?;
    let created_at_str: String =
        row.try_get("created_at").map_err(|e| decode_error(e.to_string()))?;

    let status = LeaveStatus::parse(&status_str)
        .ok_or_else(|| decode_error(format!("unknown status `{status_str}`")))?;
    let start_date = start_date_str
        .parse::<NaiveDate>()
        .map_err(|_| decode_error(format!("invalid start date `{start_date_str}`")))?;
    let end_date = end_date_str
        .parse::<NaiveDate>()
        .map_err(|_| decode_error(format!("invalid end date `{end_date_str}`")))?;
    let created_at = DateTime::parse_from_rfc3339(&created_at_str)
        .map(|dt| dt.with_timezone(&Utc))
        .map_err(|_| decode_error(format!("invalid created_at `{created_at_str}`")))?;

    Ok(LeaveRequest {
        id: LeaveRequestId(id),
        requester_id: UserId(requester_id),
        leave_type_id: LeaveTypeId(leave_type_id),
        start_date,
        end_date,
        days,
        reason,
        status,
        attachment_uploaded,
        next_approver_id: next_approver_id.map(UserId),
        version,
        created_at,
    })
}

pub(crate) fn row_to_sealed(row: &sqlx::sqlite::SqliteRow) -> Result<SealedEntry, StoreError> {
    let id: String = row.try_get("id").map_err(|e| decode_error(e.to_string()))?;
    let version: u32 = row.try_get("version").map_err(|e| decode_error(e.to_string()))?;
    let occurred_at_str: String =
        row.try_get("occurred_at").map_err(|e| decode_error(e.to_string()))?;
    let actor: String = row.try_get("actor").map_err(|e| decode_error(e.to_string()))?;
    let activity: String = row.try_get("activity").map_err(|e| decode_error(e.to_string()))?;
    let leave_request_id: Option<String> =
        row.try_get("leave_request_id").map_err(|e| decode_error(e.to_string()))?;
    let content_hash: String =
        row.try_get("content_hash").map_err(|e| decode_error(e.to_string()))?;
    let prev_hash: Option<String> =
        row.try_get("prev_hash").map_err(|e| decode_error(e.to_string()))?;
    let entry_hash: String =
        row.try_get("entry_hash").map_err(|e| decode_error(e.to_string()))?;
    let signature: String = row.try_get("signature").map_err(|e| decode_error(e.to_string()))?;

    let occurred_at = DateTime::parse_from_rfc3339(&occurred_at_str)
        .map(|dt| dt.with_timezone(&Utc))
        .map_err(|_| decode_error(format!("invalid occurred_at `{occurred_at_str}`")))?;

    Ok(SealedEntry {
        entry: LogEntry {
            id: LogEntryId(id),
            occurred_at,
            actor,
            activity,
            leave_request_id: leave_request_id.map(LeaveRequestId),
        },
        version,
        content_hash,
        prev_hash,
        entry_hash,
        signature,
    })
}

pub(crate) async fn last_sealed_entry(
    executor: &mut sqlx::SqliteConnection,
) -> Result<Option<SealedEntry>, StoreError> {
    let row = sqlx::query(
        "SELECT id, version, occurred_at, actor, activity, leave_request_id,
                content_hash, prev_hash, entry_hash, signature
         FROM activity_log ORDER BY version DESC LIMIT 1",
    )
    .fetch_optional(executor)
    .await
    .map_err(backend_error)?;

    row.as_ref().map(row_to_sealed).transpose()
}

#[async_trait]
impl WorkflowStore for SqlWorkflowStore {
    async fn request(&self, id: &LeaveRequestId) -> Result<Option<LeaveRequest>, StoreError> {
        let query = format!("SELECT {REQUEST_COLUMNS} FROM leave_request WHERE id = ?");
        let row = sqlx::query(&query)
            .bind(&id.0)
            .fetch_optional(&self.pool)
            .await
            .map_err(backend_error)?;
        row.as_ref().map(row_to_request).transpose()
    }

    async fn requests_for_user(&self, user: &UserId) -> Result<Vec<LeaveRequest>, StoreError> {
        let query = format!(
            "SELECT {REQUEST_COLUMNS} FROM leave_request
             WHERE requester_id = ? ORDER BY created_at DESC"
        );
        let rows =
            sqlx::query(&query).bind(&user.0).fetch_all(&self.pool).await.map_err(backend_error)?;
        rows.iter().map(row_to_request).collect()
    }

    async fn pending_for_approver(
        &self,
        approver: &UserId,
    ) -> Result<Vec<LeaveRequest>, StoreError> {
        let query = format!(
            "SELECT {REQUEST_COLUMNS} FROM leave_request
             WHERE status = 'pending' AND next_approver_id = ? ORDER BY created_at ASC"
        );
        let rows = sqlx::query(&query)
            .bind(&approver.0)
            .fetch_all(&self.pool)
            .await
            .map_err(backend_error)?;
        rows.iter().map(row_to_request).collect()
    }

    async fn commit(&self, commit: WorkflowCommit) -> Result<LeaveRequest, CommitError> {
        let mut tx = self.pool.begin().await.map_err(|e| CommitError::Store(backend_error(e)))?;
        let request = &commit.request;

        match commit.expected_version {
            None => {
                let insert = sqlx::query(
                    "INSERT INTO leave_request
                         (id, requester_id, leave_type_id, start_date, end_date, days, reason,
                          status, attachment_uploaded, next_approver_id, version, created_at)
                     VALUES (?, ?, ?, ?, ?, ?, ?, ?, ?, ?, ?, ?)",
                )
                .bind(&request.id.0)
                .bind(&request.requester_id.0)
                .bind(&request.leave_type_id.0)
                .bind(request.start_date.to_string())
                .bind(request.end_date.to_string())
                .bind(request.days)
                .bind(&request.reason)
                .bind(request.status.as_str())
                .bind(request.attachment_uploaded)
                .bind(request.next_approver_id.as_ref().map(|id| id.0.clone()))
                .bind(request.version)
                .bind(request.created_at.to_rfc3339())
                .execute(&mut *tx)
                .await;

                if let Err(err) = insert {
                    if err.as_database_error().is_some_and(|db| db.is_unique_violation()) {
                        return Err(CommitError::Conflict(request.id.clone()));
                    }
                    return Err(CommitError::Store(backend_error(err)));
                }
            }
            Some(expected) => {
                // Zero affected rows means the stored version moved (or the
                // row vanished); both surface as a conflict for the caller to
                // reload.
                let result = sqlx::query(
                    "UPDATE leave_request
                     SET status = ?, next_approver_id = ?, attachment_uploaded = ?, version = ?
                     WHERE id = ? AND version = ?",
                )
                .bind(request.status.as_str())
                .bind(request.next_approver_id.as_ref().map(|id| id.0.clone()))
                .bind(request.attachment_uploaded)
                .bind(request.version)
                .bind(&request.id.0)
                .bind(expected)
                .execute(&mut *tx)
                .await
                .map_err(|e| CommitError::Store(backend_error(e)))?;

                if result.rows_affected() == 0 {
                    return Err(CommitError::Conflict(request.id.clone()));
                }
            }
        }

        if let Some(effect) = &commit.balance {
            let result = match effect {
                BalanceEffect::Debit { user_id, days } => {
                    sqlx::query(
                        "UPDATE app_user
                         SET annual_leave_balance = annual_leave_balance - ?
                         WHERE id = ? AND annual_leave_balance >= ?",
                    )
                    .bind(days)
                    .bind(&user_id.0)
                    .bind(days)
                    .execute(&mut *tx)
                    .await
                }
                BalanceEffect::Credit { user_id, days } => {
                    sqlx::query(
                        "UPDATE app_user
                         SET annual_leave_balance = annual_leave_balance + ?
                         WHERE id = ?",
                    )
                    .bind(days)
                    .bind(&user_id.0)
                    .execute(&mut *tx)
                    .await
                }
            }
            .map_err(|e| CommitError::Store(backend_error(e)))?;

            if result.rows_affected() == 0 {
                return Err(CommitError::Store(StoreError::Backend(
                    "balance adjustment rejected: user missing or balance not covering the debit"
                        .to_string(),
                )));
            }
        }

        for notification in &commit.notifications {
            sqlx::query(
                "INSERT INTO notification
                     (id, user_id, message, kind, is_read, created_at, leave_request_id)
                 VALUES (?, ?, ?, ?, ?, ?, ?)",
            )
            .bind(&notification.id.0)
            .bind(&notification.user_id.0)
            .bind(&notification.message)
            .bind(notification.kind.as_str())
            .bind(notification.read)
            .bind(notification.created_at.to_rfc3339())
            .bind(notification.leave_request_id.as_ref().map(|id| id.0.clone()))
            .execute(&mut *tx)
            .await
            .map_err(|e| CommitError::Store(backend_error(e)))?;
        }

        let mut prev = last_sealed_entry(&mut tx).await.map_err(CommitError::Store)?;
        for entry in commit.log_entries.clone() {
            let sealed = self.sealer.seal(entry, prev.as_ref());
            sqlx::query(
                "INSERT INTO activity_log
                     (id, version, occurred_at, actor, activity, leave_request_id,
                      content_hash, prev_hash, entry_hash, signature)
                 VALUES (?, ?, ?, ?, ?, ?, ?, ?, ?, ?)",
            )
            .bind(&sealed.entry.id.0)
            .bind(sealed.version)
            .bind(sealed.entry.occurred_at.to_rfc3339())
            .bind(&sealed.entry.actor)
            .bind(&sealed.entry.activity)
            .bind(sealed.entry.leave_request_id.as_ref().map(|id| id.0.clone()))
            .bind(&sealed.content_hash)
            .bind(&sealed.prev_hash)
            .bind(&sealed.entry_hash)
            .bind(&sealed.signature)
            .execute(&mut *tx)
            .await
            .map_err(|e| CommitError::Store(backend_error(e)))?;
            prev = Some(sealed);
        }

        tx.commit().await.map_err(|e| CommitError::Store(backend_error(e)))?;

        Ok(commit.request)
    }
}
