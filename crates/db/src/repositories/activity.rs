use async_trait::async_trait;

use leaveflow_core::audit::{ActivitySealer, SealedEntry, TrailVerification};

use super::{ActivityLogRepository, RepositoryError};
use crate::DbPool;

pub struct SqlActivityLogRepository {
    pool: DbPool,
}

impl SqlActivityLogRepository {
    pub fn new(pool: DbPool) -> Self {
        Self { pool }
    }

    async fn load_trail(&self, limit: Option<u32>) -> Result<Vec<SealedEntry>, RepositoryError> {
        let mut conn = self.pool.acquire().await?;
        let query = match limit {
            Some(_) => {
                "SELECT id, version, occurred_at, actor, activity, leave_request_id,
                        content_hash, prev_hash, entry_hash, signature
                 FROM activity_log ORDER BY version ASC LIMIT ?"
            }
            None => {
                "SELECT id, version, occurred_at, actor, activity, leave_request_id,
                        content_hash, prev_hash, entry_hash, signature
                 FROM activity_log ORDER BY version ASC"
            }
        };
        let mut q = sqlx::query(query);
        if let Some(limit) = limit {
            q = q.bind(limit);
        }
        let rows = q.fetch_all(&mut *conn).await?;

        rows.iter()
            .map(|row| {
                super::workflow::row_to_sealed(row)
                    .map_err(|err| RepositoryError::Decode(err.to_string()))
            })
            .collect()
    }
}

#[async_trait]
impl ActivityLogRepository for SqlActivityLogRepository {
    async fn list(&self, limit: u32) -> Result<Vec<SealedEntry>, RepositoryError> {
        self.load_trail(Some(limit)).await
    }

    async fn verify(&self, sealer: &ActivitySealer) -> Result<TrailVerification, RepositoryError> {
        let trail = self.load_trail(None).await?;
        Ok(sealer.verify_trail(&trail))
    }
}
