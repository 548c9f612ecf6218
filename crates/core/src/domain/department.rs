use std::fmt;

use serde::{Deserialize, Serialize};

use crate::domain::user::UserId;

#[derive(Clone, Debug, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct DepartmentId(pub String);

impl fmt::Display for DepartmentId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct Department {
    pub id: DepartmentId,
    pub name: String,
}

/// Ordered approver identities configured for one department. The last entry
/// is the final authority; an empty chain means no approval flow is set up
/// and submissions must be rejected, never auto-approved.
#[derive(Clone, Debug, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct ApprovalChain(Vec<UserId>);

impl ApprovalChain {
    pub fn new(approvers: Vec<UserId>) -> Self {
        Self(approvers)
    }

    pub fn is_empty(&self) -> bool {
        self.0.is_empty()
    }

    pub fn len(&self) -> usize {
        self.0.len()
    }

    pub fn first(&self) -> Option<&UserId> {
        self.0.first()
    }

    /// Index of the given approver, searched by value since configuration may
    /// change between requests.
    pub fn position_of(&self, approver: &UserId) -> Option<usize> {
        self.0.iter().position(|entry| entry == approver)
    }

    pub fn next_after(&self, index: usize) -> Option<&UserId> {
        self.0.get(index + 1)
    }

    pub fn is_final(&self, index: usize) -> bool {
        index + 1 == self.0.len()
    }

    pub fn approvers(&self) -> &[UserId] {
        &self.0
    }
}
