//! Deterministic demo directory: departments with two-level approval chains
//! ending at the admin account, employees with varied balances, and the full
//! leave-type catalog. Requests are not seeded; they are born through the
//! workflow.

use sqlx::Row;

use crate::repositories::RepositoryError;
use crate::DbPool;

/// (id, name)
const DEPARTMENTS: &[(&str, &str)] = &[
    ("dept-hr", "People Operations"),
    ("dept-eng", "Engineering"),
    ("dept-fin", "Finance"),
    ("dept-mkt", "Marketing"),
];

/// (id, name, balance_bearing, requires_attachment)
const LEAVE_TYPES: &[(&str, &str, bool, bool)] = &[
    ("annual", "Annual Leave", true, false),
    ("sick", "Sick Leave", false, true),
    ("maternity", "Maternity Leave", false, false),
    ("important", "Emergency Family Leave", false, false),
    ("extended", "Extended Leave", false, false),
    ("unpaid", "Unpaid Leave", false, false),
    ("other", "Other Leave", false, false),
];

/// (id, name, nip, department_id, role, annual_leave_balance)
const USERS: &[(&str, &str, &str, &str, &str, u32)] = &[
    ("u-admin", "Site Admin", "197812302005021001", "dept-hr", "admin", 0),
    ("u-hr-head", "Farah Idris", "198409252010122003", "dept-hr", "employee", 8),
    ("u-eng-head", "Priya Raman", "198610112011011002", "dept-eng", "employee", 9),
    ("u-fin-head", "Tomas Vale", "198202142008121001", "dept-fin", "employee", 11),
    ("u-mkt-head", "Milan Oswalt", "198807192012031004", "dept-mkt", "employee", 10),
    ("u-hr-1", "Nora Feld", "199508172021011001", "dept-hr", "employee", 12),
    ("u-eng-1", "Devi Anand", "199205202019032002", "dept-eng", "employee", 10),
    ("u-fin-1", "Jonas Brandt", "199811102022021003", "dept-fin", "employee", 5),
    ("u-mkt-1", "Lena Vogel", "199609092021091004", "dept-mkt", "employee", 15),
];

/// (department_id, ordered approver ids)
const APPROVAL_FLOWS: &[(&str, &[&str])] = &[
    ("dept-hr", &["u-hr-head", "u-admin"]),
    ("dept-eng", &["u-eng-head", "u-admin"]),
    ("dept-fin", &["u-fin-head", "u-admin"]),
    ("dept-mkt", &["u-mkt-head", "u-admin"]),
];

#[derive(Clone, Debug, PartialEq, Eq)]
pub struct SeedSummary {
    pub departments: usize,
    pub users: usize,
    pub leave_types: usize,
    pub approval_flows: usize,
}

#[derive(Clone, Debug, PartialEq, Eq)]
pub struct SeedVerification {
    pub valid: bool,
    pub issues: Vec<String>,
}

pub async fn seed_demo(pool: &DbPool) -> Result<SeedSummary, RepositoryError> {
    let mut tx = pool.begin().await?;

    for (id, name) in DEPARTMENTS {
        sqlx::query(
            "INSERT INTO department (id, name) VALUES (?, ?)
             ON CONFLICT(id) DO UPDATE SET name = excluded.name",
        )
        .bind(id)
        .bind(name)
        .execute(&mut *tx)
        .await?;
    }

    for (id, name, balance_bearing, requires_attachment) in LEAVE_TYPES {
        sqlx::query(
            "INSERT INTO leave_type (id, name, balance_bearing, requires_attachment)
             VALUES (?, ?, ?, ?)
             ON CONFLICT(id) DO UPDATE SET
                 name = excluded.name,
                 balance_bearing = excluded.balance_bearing,
                 requires_attachment = excluded.requires_attachment",
        )
        .bind(id)
        .bind(name)
        .bind(balance_bearing)
        .bind(requires_attachment)
        .execute(&mut *tx)
        .await?;
    }

    for (id, name, nip, department_id, role, balance) in USERS {
        sqlx::query(
            "INSERT INTO app_user
                 (id, name, nip, department_id, role, annual_leave_balance)
             VALUES (?, ?, ?, ?, ?, ?)
             ON CONFLICT(id) DO UPDATE SET
                 name = excluded.name,
                 nip = excluded.nip,
                 department_id = excluded.department_id,
                 role = excluded.role,
                 annual_leave_balance = excluded.annual_leave_balance",
        )
        .bind(id)
        .bind(name)
        .bind(nip)
        .bind(department_id)
        .bind(role)
        .bind(balance)
        .execute(&mut *tx)
        .await?;
    }

    for (department_id, approvers) in APPROVAL_FLOWS {
        sqlx::query("DELETE FROM approval_flow WHERE department_id = ?")
            .bind(department_id)
            .execute(&mut *tx)
            .await?;
        for (position, approver_id) in approvers.iter().enumerate() {
            sqlx::query(
                "INSERT INTO approval_flow (department_id, position, approver_id)
                 VALUES (?, ?, ?)",
            )
            .bind(department_id)
            .bind(position as i64)
            .bind(approver_id)
            .execute(&mut *tx)
            .await?;
        }
    }

    tx.commit().await?;

    let summary = SeedSummary {
        departments: DEPARTMENTS.len(),
        users: USERS.len(),
        leave_types: LEAVE_TYPES.len(),
        approval_flows: APPROVAL_FLOWS.len(),
    };
    tracing::info!(
        departments = summary.departments,
        users = summary.users,
        leave_types = summary.leave_types,
        "demo dataset seeded"
    );

    Ok(summary)
}

/// Checks the invariants the workflow relies on: every department resolves a
/// non-empty chain of existing approvers terminated by an admin, and exactly
/// one leave type is balance-bearing.
pub async fn verify_seed(pool: &DbPool) -> Result<SeedVerification, RepositoryError> {
    let mut issues = Vec::new();

    let departments =
        sqlx::query("SELECT id FROM department ORDER BY id").fetch_all(pool).await?;
    for row in &departments {
        let department_id: String =
            row.try_get("id").map_err(|e| RepositoryError::Decode(e.to_string()))?;
        let chain = sqlx::query(
            "SELECT flow.approver_id, app_user.role
             FROM approval_flow flow
             LEFT JOIN app_user ON app_user.id = flow.approver_id
             WHERE flow.department_id = ?
             ORDER BY flow.position ASC",
        )
        .bind(&department_id)
        .fetch_all(pool)
        .await?;

        if chain.is_empty() {
            issues.push(format!("department `{department_id}` has no approval flow"));
            continue;
        }
        for row in &chain {
            let role: Option<String> =
                row.try_get("role").map_err(|e| RepositoryError::Decode(e.to_string()))?;
            if role.is_none() {
                let approver: String = row
                    .try_get("approver_id")
                    .map_err(|e| RepositoryError::Decode(e.to_string()))?;
                issues.push(format!(
                    "department `{department_id}` references unknown approver `{approver}`"
                ));
            }
        }
        let last_role: Option<String> = chain
            .last()
            .map(|row| row.try_get("role"))
            .transpose()
            .map_err(|e| RepositoryError::Decode(e.to_string()))?
            .flatten();
        if last_role.as_deref() != Some("admin") {
            issues.push(format!(
                "department `{department_id}` chain does not end at an admin account"
            ));
        }
    }

    let bearing_count: i64 =
        sqlx::query_scalar("SELECT COUNT(*) FROM leave_type WHERE balance_bearing = 1")
            .fetch_one(pool)
            .await?;
    if bearing_count != 1 {
        issues.push(format!("expected exactly one balance-bearing leave type, found {bearing_count}"));
    }

    Ok(SeedVerification { valid: issues.is_empty(), issues })
}

#[cfg(test)]
mod tests {
    use super::{seed_demo, verify_seed};
    use crate::{connect_with_settings, migrations};

    #[tokio::test]
    async fn demo_seed_passes_its_own_verification() {
        let pool = connect_with_settings("sqlite::memory:", 1, 30).await.expect("connect");
        migrations::run_pending(&pool).await.expect("migrations");

        let summary = seed_demo(&pool).await.expect("seed");
        assert_eq!(summary.departments, 4);
        assert_eq!(summary.leave_types, 7);

        let verification = verify_seed(&pool).await.expect("verify");
        assert!(verification.valid, "unexpected issues: {:?}", verification.issues);
    }

    #[tokio::test]
    async fn seeding_twice_is_idempotent() {
        let pool = connect_with_settings("sqlite::memory:", 1, 30).await.expect("connect");
        migrations::run_pending(&pool).await.expect("migrations");

        seed_demo(&pool).await.expect("first seed");
        seed_demo(&pool).await.expect("second seed");

        let verification = verify_seed(&pool).await.expect("verify");
        assert!(verification.valid);
    }

    #[tokio::test]
    async fn verification_flags_a_department_without_a_flow() {
        let pool = connect_with_settings("sqlite::memory:", 1, 30).await.expect("connect");
        migrations::run_pending(&pool).await.expect("migrations");
        seed_demo(&pool).await.expect("seed");

        sqlx::query("INSERT INTO department (id, name) VALUES ('dept-new', 'New Ventures')")
            .execute(&pool)
            .await
            .expect("insert department");

        let verification = verify_seed(&pool).await.expect("verify");
        assert!(!verification.valid);
        assert!(verification
            .issues
            .iter()
            .any(|issue| issue.contains("dept-new") && issue.contains("no approval flow")));
    }
}
