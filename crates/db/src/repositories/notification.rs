use async_trait::async_trait;
use chrono::{DateTime, Utc};
use sqlx::Row;

use leaveflow_core::domain::leave::LeaveRequestId;
use leaveflow_core::domain::notification::{Notification, NotificationId, NotificationKind};
use leaveflow_core::domain::user::UserId;

use super::{NotificationRepository, RepositoryError};
use crate::DbPool;

pub struct SqlNotificationRepository {
    pool: DbPool,
}

impl SqlNotificationRepository {
    pub fn new(pool: DbPool) -> Self {
        Self { pool }
    }
}

fn row_to_notification(row: &sqlx::sqlite::SqliteRow) -> Result<Notification, RepositoryError> {
    let id: String = row.try_get("id").map_err(|e| RepositoryError::Decode(e.to_string()))?;
    let user_id: String =
        row.try_get("user_id").map_err(|e| RepositoryError::Decode(e.to_string()))?;
    let message: String =
        row.try_get("message").map_err(|e| RepositoryError::Decode(e.to_string()))?;
    let kind_str: String =
        row.try_get("kind").map_err(|e| RepositoryError::Decode(e.to_string()))?;
    let read: bool = row.try_get("is_read").map_err(|e| RepositoryError::Decode(e.to_string()))?;
    let created_at_str: String =
        row.try_get("created_at").map_err(|e| RepositoryError::Decode(e.to_string()))?;
    let leave_request_id: Option<String> =
        row.try_get("leave_request_id").map_err(|e| RepositoryError::Decode(e.to_string()))?;

    let kind = NotificationKind::parse(&kind_str)
        .ok_or_else(|| RepositoryError::Decode(format!("unknown notification kind `{kind_str}`")))?;
    let created_at = DateTime::parse_from_rfc3339(&created_at_str)
        .map(|dt| dt.with_timezone(&Utc))
        .map_err(|_| RepositoryError::Decode(format!("invalid created_at `{created_at_str}`")))?;

    Ok(Notification {
        id: NotificationId(id),
        user_id: UserId(user_id),
        message,
        kind,
        read,
        created_at,
        leave_request_id: leave_request_id.map(LeaveRequestId),
    })
}

#[async_trait]
impl NotificationRepository for SqlNotificationRepository {
    async fn list_for_user(&self, user: &UserId) -> Result<Vec<Notification>, RepositoryError> {
        let rows = sqlx::query(
            "SELECT id, user_id, message, kind, is_read, created_at, leave_request_id
             FROM notification WHERE user_id = ? ORDER BY created_at DESC",
        )
        .bind(&user.0)
        .fetch_all(&self.pool)
        .await?;

        rows.iter().map(row_to_notification).collect()
    }

    async fn unread_count(&self, user: &UserId) -> Result<u32, RepositoryError> {
        let count: i64 = sqlx::query_scalar(
            "SELECT COUNT(*) FROM notification WHERE user_id = ? AND is_read = 0",
        )
        .bind(&user.0)
        .fetch_one(&self.pool)
        .await?;

        u32::try_from(count)
            .map_err(|_| RepositoryError::Decode(format!("unread count out of range: {count}")))
    }

    async fn mark_read(&self, id: &NotificationId) -> Result<bool, RepositoryError> {
        let result = sqlx::query("UPDATE notification SET is_read = 1 WHERE id = ?")
            .bind(&id.0)
            .execute(&self.pool)
            .await?;

        Ok(result.rows_affected() > 0)
    }
}
