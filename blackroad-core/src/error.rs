//! Error types for platform operations

use crate::{EntityKind, TaskStatus};
use serde::{Deserialize, Serialize};
use std::fmt;
use thiserror::Error;
use uuid::Uuid;

/// Storage layer errors.
#[derive(Debug, Clone, Error, PartialEq, Eq)]
pub enum StorageError {
    #[error("Entity not found: {entity} with id {id}")]
    NotFound { entity: EntityKind, id: String },

    #[error("Storage lock poisoned")]
    LockPoisoned,
}

/// Input validation errors.
#[derive(Debug, Clone, Error, PartialEq, Eq)]
pub enum ValidationError {
    #[error("Required field missing: {field}")]
    RequiredFieldMissing { field: String },

    #[error("Invalid value for {field}: {reason}")]
    InvalidValue { field: String, reason: String },

    #[error("Invalid topic {topic:?}: {reason}")]
    InvalidTopic { topic: String, reason: String },
}

/// Claim ledger and quarantine errors.
#[derive(Debug, Clone, Error, PartialEq, Eq)]
pub enum ReasoningError {
    #[error("Invalid claim reference: {ids:?}")]
    InvalidReference { ids: Vec<String> },

    #[error("Claim {claim_id} is already in open quarantine {quarantine_id}")]
    AlreadyQuarantined { claim_id: Uuid, quarantine_id: Uuid },

    #[error("Quarantine {quarantine_id} is already resolved")]
    AlreadyResolved { quarantine_id: Uuid },
}

/// Event bus and task delegation errors.
#[derive(Debug, Clone, Error, PartialEq, Eq)]
pub enum CoordinationError {
    #[error("Invalid transition for task {task_id}: {from} -> {to}")]
    InvalidTransition {
        task_id: Uuid,
        from: TaskStatus,
        to: TaskStatus,
    },

    #[error("No capable agent for capabilities {required:?}")]
    NoCapableAgent { required: Vec<String> },
}

/// Configuration errors.
#[derive(Debug, Clone, Error, PartialEq, Eq)]
pub enum ConfigError {
    #[error("Invalid value for {field}: {value} - {reason}")]
    InvalidValue {
        field: String,
        value: String,
        reason: String,
    },
}

/// Master error type for all platform errors.
#[derive(Debug, Clone, Error, PartialEq, Eq)]
pub enum PlatformError {
    #[error("Storage error: {0}")]
    Storage(#[from] StorageError),

    #[error("Validation error: {0}")]
    Validation(#[from] ValidationError),

    #[error("Reasoning error: {0}")]
    Reasoning(#[from] ReasoningError),

    #[error("Coordination error: {0}")]
    Coordination(#[from] CoordinationError),

    #[error("Config error: {0}")]
    Config(#[from] ConfigError),
}

/// Result type alias for platform operations.
pub type PlatformResult<T> = Result<T, PlatformError>;

/// Flat classification of a failure, stable across the wire.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ErrorKind {
    NotFound,
    InvalidReference,
    AlreadyQuarantined,
    AlreadyResolved,
    InvalidTransition,
    NoCapableAgent,
    Validation,
    Config,
    Internal,
}

impl ErrorKind {
    pub fn as_str(&self) -> &'static str {
        match self {
            ErrorKind::NotFound => "not_found",
            ErrorKind::InvalidReference => "invalid_reference",
            ErrorKind::AlreadyQuarantined => "already_quarantined",
            ErrorKind::AlreadyResolved => "already_resolved",
            ErrorKind::InvalidTransition => "invalid_transition",
            ErrorKind::NoCapableAgent => "no_capable_agent",
            ErrorKind::Validation => "validation",
            ErrorKind::Config => "config",
            ErrorKind::Internal => "internal",
        }
    }
}

impl fmt::Display for ErrorKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl PlatformError {
    pub fn not_found(entity: EntityKind, id: impl ToString) -> Self {
        PlatformError::Storage(StorageError::NotFound {
            entity,
            id: id.to_string(),
        })
    }

    pub fn invalid_value(field: impl Into<String>, reason: impl Into<String>) -> Self {
        PlatformError::Validation(ValidationError::InvalidValue {
            field: field.into(),
            reason: reason.into(),
        })
    }

    pub fn missing_field(field: impl Into<String>) -> Self {
        PlatformError::Validation(ValidationError::RequiredFieldMissing {
            field: field.into(),
        })
    }

    pub fn kind(&self) -> ErrorKind {
        match self {
            PlatformError::Storage(StorageError::NotFound { .. }) => ErrorKind::NotFound,
            PlatformError::Storage(StorageError::LockPoisoned) => ErrorKind::Internal,
            PlatformError::Validation(_) => ErrorKind::Validation,
            PlatformError::Reasoning(ReasoningError::InvalidReference { .. }) => {
                ErrorKind::InvalidReference
            }
            PlatformError::Reasoning(ReasoningError::AlreadyQuarantined { .. }) => {
                ErrorKind::AlreadyQuarantined
            }
            PlatformError::Reasoning(ReasoningError::AlreadyResolved { .. }) => {
                ErrorKind::AlreadyResolved
            }
            PlatformError::Coordination(CoordinationError::InvalidTransition { .. }) => {
                ErrorKind::InvalidTransition
            }
            PlatformError::Coordination(CoordinationError::NoCapableAgent { .. }) => {
                ErrorKind::NoCapableAgent
            }
            PlatformError::Config(_) => ErrorKind::Config,
        }
    }

    /// Identifiers the failure refers to.
    pub fn offending_ids(&self) -> Vec<String> {
        match self {
            PlatformError::Storage(StorageError::NotFound { id, .. }) => vec![id.clone()],
            PlatformError::Reasoning(ReasoningError::InvalidReference { ids }) => ids.clone(),
            PlatformError::Reasoning(ReasoningError::AlreadyQuarantined {
                claim_id,
                quarantine_id,
            }) => vec![claim_id.to_string(), quarantine_id.to_string()],
            PlatformError::Reasoning(ReasoningError::AlreadyResolved { quarantine_id }) => {
                vec![quarantine_id.to_string()]
            }
            PlatformError::Coordination(CoordinationError::InvalidTransition {
                task_id, ..
            }) => vec![task_id.to_string()],
            PlatformError::Coordination(CoordinationError::NoCapableAgent { required }) => {
                required.clone()
            }
            PlatformError::Validation(ValidationError::InvalidTopic { topic, .. }) => {
                vec![topic.clone()]
            }
            _ => Vec::new(),
        }
    }
}

// =============================================================================
// TESTS
// =============================================================================
