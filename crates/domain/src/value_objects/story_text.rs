//! Validated text newtypes for story nodes
//!
//! Narrative content is opaque to the engine, but it must not be blank and
//! must fit the storage limits:
//! - Non-empty after trimming
//! - Within length limits (counted in chars)

use serde::{Deserialize, Serialize};
use std::fmt;

use crate::error::DomainError;

/// Maximum length for a node's narrative content
const MAX_CONTENT_LENGTH: usize = 20_000;

/// Maximum length for the text of a player's choice
const MAX_CHOICE_LENGTH: usize = 1_000;

// ============================================================================
// StoryContent
// ============================================================================

/// Narrative text for one story step (non-empty, <=20000 chars, trimmed)
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(try_from = "String", into = "String")]
pub struct StoryContent(String);

impl StoryContent {
    /// Create validated story content.
    ///
    /// # Errors
    ///
    /// Returns `DomainError::Validation` if the text is blank or too long.
    pub fn new(content: impl Into<String>) -> Result<Self, DomainError> {
        let content = content.into();
        let trimmed = content.trim();
        if trimmed.is_empty() {
            return Err(DomainError::validation("Story content cannot be empty"));
        }
        if trimmed.chars().count() > MAX_CONTENT_LENGTH {
            return Err(DomainError::validation(format!(
                "Story content cannot exceed {} characters",
                MAX_CONTENT_LENGTH
            )));
        }
        Ok(Self(trimmed.to_string()))
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }

    pub fn into_inner(self) -> String {
        self.0
    }
}

impl fmt::Display for StoryContent {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.0)
    }
}

impl TryFrom<String> for StoryContent {
    type Error = DomainError;

    fn try_from(s: String) -> Result<Self, Self::Error> {
        Self::new(s)
    }
}

impl From<StoryContent> for String {
    fn from(content: StoryContent) -> String {
        content.0
    }
}

// ============================================================================
// ChoiceText
// ============================================================================

/// The choice a player made to reach a node (non-empty, <=1000 chars, trimmed)
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(try_from = "String", into = "String")]
pub struct ChoiceText(String);

impl ChoiceText {
    /// Create validated choice text.
    ///
    /// # Errors
    ///
    /// Returns `DomainError::Validation` if the text is blank or too long.
    pub fn new(text: impl Into<String>) -> Result<Self, DomainError> {
        let text = text.into();
        let trimmed = text.trim();
        if trimmed.is_empty() {
            return Err(DomainError::validation("Choice text cannot be empty"));
        }
        if trimmed.chars().count() > MAX_CHOICE_LENGTH {
            return Err(DomainError::validation(format!(
                "Choice text cannot exceed {} characters",
                MAX_CHOICE_LENGTH
            )));
        }
        Ok(Self(trimmed.to_string()))
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }

    pub fn into_inner(self) -> String {
        self.0
    }
}

impl fmt::Display for ChoiceText {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.0)
    }
}

impl TryFrom<String> for ChoiceText {
    type Error = DomainError;

    fn try_from(s: String) -> Result<Self, Self::Error> {
        Self::new(s)
    }
}

impl From<ChoiceText> for String {
    fn from(text: ChoiceText) -> String {
        text.0
    }
}
