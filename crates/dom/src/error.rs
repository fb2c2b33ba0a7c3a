//! Error types for DOM operations
//!
//! Structural failures only. Waiting for an element that never shows up is
//! not an error anywhere in this crate.

use thiserror::Error;

pub type Result<T> = std::result::Result<T, DomError>;

#[derive(Debug, Error)]
pub enum DomError {
    #[error("Node not found: {0}")]
    NodeNotFound(u32),

    #[error("Invalid node type: expected {expected}, got {actual}")]
    InvalidNodeType { expected: String, actual: String },

    #[error("Invalid selector '{selector}': {reason}")]
    InvalidSelector { selector: String, reason: String },

    #[error("Hierarchy request error: {0}")]
    HierarchyRequest(String),

    #[error("Invalid observe options: {0}")]
    InvalidObserveOptions(String),

    #[error("Snapshot error: {0}")]
    SnapshotError(String),

    #[error("Parse error: {0}")]
    ParseError(#[from] serde_json::Error),
}

impl DomError {
    pub(crate) fn invalid_selector(selector: &str, reason: impl Into<String>) -> Self {
        DomError::InvalidSelector {
            selector: selector.to_string(),
            reason: reason.into(),
        }
    }
}
