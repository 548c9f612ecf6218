use async_trait::async_trait;
use thiserror::Error;

use leaveflow_core::audit::{ActivitySealer, SealedEntry, TrailVerification};
use leaveflow_core::domain::notification::{Notification, NotificationId};
use leaveflow_core::domain::user::UserId;
use leaveflow_core::errors::StoreError;

pub mod activity;
pub mod directory;
pub mod notification;
pub mod workflow;

pub use activity::SqlActivityLogRepository;
pub use directory::SqlDirectory;
pub use notification::SqlNotificationRepository;
pub use workflow::SqlWorkflowStore;

#[derive(Debug, Error)]
pub enum RepositoryError {
    #[error("database error: {0}")]
    Database(#[from] sqlx::Error),
    #[error("decode error: {0}")]
    Decode(String),
}

impl From<RepositoryError> for StoreError {
    fn from(value: RepositoryError) -> Self {
        match value {
            RepositoryError::Database(err) => Self::Backend(err.to_string()),
            RepositoryError::Decode(message) => Self::Decode(message),
        }
    }
}

pub(crate) fn backend_error(err: sqlx::Error) -> StoreError {
    StoreError::Backend(err.to_string())
}

pub(crate) fn decode_error(message: impl Into<String>) -> StoreError {
    StoreError::Decode(message.into())
}

/// Presentation-layer access to notifications: the core only creates them;
/// listing and the read flag belong to the collaborator.
#[async_trait]
pub trait NotificationRepository: Send + Sync {
    async fn list_for_user(&self, user: &UserId) -> Result<Vec<Notification>, RepositoryError>;

    async fn unread_count(&self, user: &UserId) -> Result<u32, RepositoryError>;

    /// Returns false when the notification does not exist.
    async fn mark_read(&self, id: &NotificationId) -> Result<bool, RepositoryError>;
}

/// Presentation-layer access to the sealed activity trail.
#[async_trait]
pub trait ActivityLogRepository: Send + Sync {
    /// Entries oldest-first, capped at `limit`.
    async fn list(&self, limit: u32) -> Result<Vec<SealedEntry>, RepositoryError>;

    /// Walks the whole stored trail against the given sealer.
    async fn verify(&self, sealer: &ActivitySealer) -> Result<TrailVerification, RepositoryError>;
}
