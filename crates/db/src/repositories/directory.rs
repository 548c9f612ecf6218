use async_trait::async_trait;
use chrono::NaiveDate;
use sqlx::Row;

use leaveflow_core::directory::Directory;
use leaveflow_core::domain::department::{ApprovalChain, Department, DepartmentId};
use leaveflow_core::domain::leave::{LeaveType, LeaveTypeId};
use leaveflow_core::domain::user::{Role, User, UserId};
use leaveflow_core::errors::StoreError;

use super::{backend_error, decode_error};
use crate::DbPool;

/// Read-only directory lookups backed by SQLite.
pub struct SqlDirectory {
    pool: DbPool,
}

impl SqlDirectory {
    pub fn new(pool: DbPool) -> Self {
        Self { pool }
    }

    async fn fetch_user(&self, clause: &str, bind: &str) -> Result<Option<User>, StoreError> {
        let query = format!(
            "SELECT id, name, nip, department_id, role, annual_leave_balance, phone, join_date
             FROM app_user WHERE {clause} = ?"
        );
        let row =
            sqlx::query(&query).bind(bind).fetch_optional(&self.pool).await.map_err(backend_error)?;
        row.as_ref().map(row_to_user).transpose()
    }
}

pub(crate) fn row_to_user(row: &sqlx::sqlite::SqliteRow) -> Result<User, StoreError> {
    let id: String = row.try_get("id").map_err(|e| decode_error(e.to_string()))?;
    let name: String = row.try_get("name").map_err(|e| decode_error(e.to_string()))?;
    let nip: String = row.try_get("nip").map_err(|e| decode_error(e.to_string()))?;
    let department_id: String =
        row.try_get("department_id").map_err(|e| decode_error(e.to_string()))?;
    let role_str: String = row.try_get("role").map_err(|e| decode_error(e.to_string()))?;
    let annual_leave_balance: u32 =
        row.try_get("annual_leave_balance").map_err(|e| decode_error(e.to_string()))?;
    let phone: Option<String> = row.try_get("phone").map_err(|e| decode_error(e.to_string()))?;
    let join_date_str: Option<String> =
        row.try_get("join_date").map_err(|e| decode_error(e.to_string()))?;

    let role = Role::parse(&role_str)
        .ok_or_else(|| decode_error(format!("unknown role `{role_str}`")))?;
    let join_date = join_date_str
        .map(|raw| {
            raw.parse::<NaiveDate>()
                .map_err(|_| decode_error(format!("invalid join date `{raw}`")))
        })
        .transpose()?;

    Ok(User {
        id: UserId(id),
        name,
        nip,
        department_id: DepartmentId(department_id),
        role,
        annual_leave_balance,
        phone,
        join_date,
    })
}

#[async_trait]
impl Directory for SqlDirectory {
    async fn user(&self, id: &UserId) -> Result<Option<User>, StoreError> {
        self.fetch_user("id", &id.0).await
    }

    async fn user_by_nip(&self, nip: &str) -> Result<Option<User>, StoreError> {
        self.fetch_user("nip", nip).await
    }

    async fn department(&self, id: &DepartmentId) -> Result<Option<Department>, StoreError> {
        let row = sqlx::query("SELECT id, name FROM department WHERE id = ?")
            .bind(&id.0)
            .fetch_optional(&self.pool)
            .await
            .map_err(backend_error)?;

        row.map(|row| {
            let id: String = row.try_get("id").map_err(|e| decode_error(e.to_string()))?;
            let name: String = row.try_get("name").map_err(|e| decode_error(e.to_string()))?;
            Ok(Department { id: DepartmentId(id), name })
        })
        .transpose()
    }

    async fn leave_type(&self, id: &LeaveTypeId) -> Result<Option<LeaveType>, StoreError> {
        let row = sqlx::query(
            "SELECT id, name, balance_bearing, requires_attachment FROM leave_type WHERE id = ?",
        )
        .bind(&id.0)
        .fetch_optional(&self.pool)
        .await
        .map_err(backend_error)?;

        row.map(|row| {
            let id: String = row.try_get("id").map_err(|e| decode_error(e.to_string()))?;
            let name: String = row.try_get("name").map_err(|e| decode_error(e.to_string()))?;
            let balance_bearing: bool =
                row.try_get("balance_bearing").map_err(|e| decode_error(e.to_string()))?;
            let requires_attachment: bool =
                row.try_get("requires_attachment").map_err(|e| decode_error(e.to_string()))?;
            Ok(LeaveType { id: LeaveTypeId(id), name, balance_bearing, requires_attachment })
        })
        .transpose()
    }

    async fn approval_chain(
        &self,
        department: &DepartmentId,
    ) -> Result<ApprovalChain, StoreError> {
        let rows = sqlx::query(
            "SELECT approver_id FROM approval_flow WHERE department_id = ? ORDER BY position ASC",
        )
        .bind(&department.0)
        .fetch_all(&self.pool)
        .await
        .map_err(backend_error)?;

        let approvers = rows
            .iter()
            .map(|row| {
                row.try_get::<String, _>("approver_id")
                    .map(UserId)
                    .map_err(|e| decode_error(e.to_string()))
            })
            .collect::<Result<Vec<_>, _>>()?;

        Ok(ApprovalChain::new(approvers))
    }
}
