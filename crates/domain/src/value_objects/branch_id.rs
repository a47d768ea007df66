//! Branch identifier newtype.
//!
//! Branch ids are plain strings rather than UUIDs: legacy sessions used the
//! owning session id as their branch id, and freshly generated branches use a
//! `branch-` prefix.

use serde::{Deserialize, Serialize};
use std::fmt;
use uuid::Uuid;

use crate::error::DomainError;

/// Maximum length of a branch identifier
const MAX_BRANCH_ID_LENGTH: usize = 128;

/// Prefix for generated branch identifiers
pub const BRANCH_ID_PREFIX: &str = "branch-";

/// A validated branch identifier (non-empty, <=128 chars, no whitespace)
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(try_from = "String", into = "String")]
pub struct BranchId(String);

impl BranchId {
    /// Create a branch id from an existing value.
    ///
    /// # Errors
    ///
    /// Returns `DomainError::Validation` if the value is empty after trimming,
    /// contains whitespace, or exceeds 128 characters.
    pub fn new(value: impl Into<String>) -> Result<Self, DomainError> {
        let value = value.into();
        let trimmed = value.trim();
        if trimmed.is_empty() {
            return Err(DomainError::validation("Branch id cannot be empty"));
        }
        if trimmed.len() > MAX_BRANCH_ID_LENGTH {
            return Err(DomainError::validation(format!(
                "Branch id cannot exceed {} characters",
                MAX_BRANCH_ID_LENGTH
            )));
        }
        if trimmed.chars().any(char::is_whitespace) {
            return Err(DomainError::validation("Branch id cannot contain whitespace"));
        }
        Ok(Self(trimmed.to_string()))
    }

    /// Build a fresh branch id from a random UUID (`branch-<hex>`).
    pub fn generate(seed: Uuid) -> Self {
        Self(format!("{}{}", BRANCH_ID_PREFIX, seed.simple()))
    }

    /// Returns the id as a string slice.
    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl fmt::Display for BranchId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.0)
    }
}

impl TryFrom<String> for BranchId {
    type Error = DomainError;

    fn try_from(s: String) -> Result<Self, Self::Error> {
        Self::new(s)
    }
}

impl From<BranchId> for String {
    fn from(id: BranchId) -> String {
        id.0
    }
}
