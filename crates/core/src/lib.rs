pub mod audit;
pub mod config;
pub mod directory;
pub mod domain;
pub mod errors;
pub mod ledger;
pub mod memory;
pub mod workflow;

pub use audit::{ActivitySealer, SealedEntry, TrailVerification};
pub use config::{AppConfig, ConfigError, LoadOptions, LogFormat};
pub use directory::Directory;
pub use domain::activity::{LogEntry, LogEntryId};
pub use domain::department::{ApprovalChain, Department, DepartmentId};
pub use domain::leave::{LeaveRequest, LeaveRequestId, LeaveStatus, LeaveType, LeaveTypeId};
pub use domain::notification::{Notification, NotificationId, NotificationKind};
pub use domain::user::{Role, User, UserId};
pub use errors::{StoreError, WorkflowError};
pub use memory::InMemoryBackend;
pub use workflow::engine::WorkflowEngine;
pub use workflow::service::WorkflowService;
pub use workflow::states::{BalanceEffect, Decision, SubmissionInput, TransitionOutcome};
pub use workflow::store::{CommitError, WorkflowCommit, WorkflowStore};
