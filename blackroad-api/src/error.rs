//! Error Types for the BlackRoad API
//!
//! Every failure leaving the dispatcher is an `ApiError`: a stable
//! `ErrorCode`, a human-readable message and, for service failures, the
//! flat error kind plus the identifiers it refers to.

use blackroad_core::{ErrorKind, PlatformError, ValidationError};
use serde::{Deserialize, Serialize};
use std::fmt;

// ============================================================================
// ERROR CODE ENUM
// ============================================================================

/// Error codes for API responses.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[cfg_attr(feature = "openapi", derive(utoipa::ToSchema))]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum ErrorCode {
    // ========================================================================
    // Request Errors
    // ========================================================================
    /// No endpoint is registered under the requested name
    EndpointNotFound,

    /// Request contains invalid input data
    InvalidInput,

    /// Required field is missing from request
    MissingField,

    /// Platform configuration is invalid
    InvalidConfig,

    // ========================================================================
    // Service Errors
    // ========================================================================
    /// Requested entity does not exist
    EntityNotFound,

    /// Claim id set is empty or refers to unknown or superseded claims
    InvalidReference,

    /// Claim already sits in an open quarantine
    AlreadyQuarantined,

    /// Quarantine has already been resolved
    AlreadyResolved,

    /// Task state change not permitted from its current status
    InvalidTransition,

    /// No registered agent can take the delegated task
    NoCapableAgent,

    // ========================================================================
    // Server Errors
    // ========================================================================
    /// Internal error
    InternalError,
}

impl ErrorCode {
    /// Get a default message for this error code.
    pub fn default_message(&self) -> &'static str {
        match self {
            ErrorCode::EndpointNotFound => "Endpoint not found",
            ErrorCode::InvalidInput => "Invalid input data",
            ErrorCode::MissingField => "Required field is missing",
            ErrorCode::InvalidConfig => "Invalid platform configuration",
            ErrorCode::EntityNotFound => "Entity not found",
            ErrorCode::InvalidReference => "Invalid claim reference",
            ErrorCode::AlreadyQuarantined => "Claim is already quarantined",
            ErrorCode::AlreadyResolved => "Quarantine is already resolved",
            ErrorCode::InvalidTransition => "Invalid task status transition",
            ErrorCode::NoCapableAgent => "No capable agent available",
            ErrorCode::InternalError => "Internal error",
        }
    }

    /// Whether a caller could succeed by fixing the request.
    pub fn is_client_error(&self) -> bool {
        !matches!(self, ErrorCode::InternalError)
    }
}

impl From<ErrorKind> for ErrorCode {
    fn from(kind: ErrorKind) -> Self {
        match kind {
            ErrorKind::NotFound => ErrorCode::EntityNotFound,
            ErrorKind::InvalidReference => ErrorCode::InvalidReference,
            ErrorKind::AlreadyQuarantined => ErrorCode::AlreadyQuarantined,
            ErrorKind::AlreadyResolved => ErrorCode::AlreadyResolved,
            ErrorKind::InvalidTransition => ErrorCode::InvalidTransition,
            ErrorKind::NoCapableAgent => ErrorCode::NoCapableAgent,
            ErrorKind::Validation => ErrorCode::InvalidInput,
            ErrorKind::Config => ErrorCode::InvalidConfig,
            ErrorKind::Internal => ErrorCode::InternalError,
        }
    }
}

impl fmt::Display for ErrorCode {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{:?}", self)
    }
}

// ============================================================================
// API ERROR STRUCT
// ============================================================================

/// Structured error returned by every endpoint.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[cfg_attr(feature = "openapi", derive(utoipa::ToSchema))]
pub struct ApiError {
    /// Error code categorizing the error
    pub code: ErrorCode,

    /// Human-readable error message
    pub message: String,

    /// `{"kind", "ids"}` for service failures
    #[serde(skip_serializing_if = "Option::is_none")]
    #[cfg_attr(feature = "openapi", schema(value_type = Option<Object>))]
    pub details: Option<serde_json::Value>,
}

impl ApiError {
    /// Create a new API error with the given code and message.
    pub fn new(code: ErrorCode, message: impl Into<String>) -> Self {
        Self {
            code,
            message: message.into(),
            details: None,
        }
    }

    /// Create a new API error with the given code, using the default message.
    pub fn from_code(code: ErrorCode) -> Self {
        Self::new(code, code.default_message())
    }

    /// Add additional details to the error.
    pub fn with_details(mut self, details: serde_json::Value) -> Self {
        self.details = Some(details);
        self
    }

    pub fn endpoint_not_found(name: &str) -> Self {
        Self::new(
            ErrorCode::EndpointNotFound,
            format!("Unknown endpoint '{}'", name),
        )
    }

    pub fn invalid_input(message: impl Into<String>) -> Self {
        Self::new(ErrorCode::InvalidInput, message)
    }

    pub fn missing_field(field: &str) -> Self {
        Self::new(
            ErrorCode::MissingField,
            format!("Required field '{}' is missing", field),
        )
        .with_details(serde_json::json!({ "field": field }))
    }

    pub fn internal_error(message: impl Into<String>) -> Self {
        Self::new(ErrorCode::InternalError, message)
    }

    /// Identifiers carried in `details.ids`.
    pub fn ids(&self) -> Vec<String> {
        self.details
            .as_ref()
            .and_then(|d| d.get("ids"))
            .and_then(|ids| ids.as_array())
            .map(|ids| {
                ids.iter()
                    .filter_map(|id| id.as_str().map(str::to_string))
                    .collect()
            })
            .unwrap_or_default()
    }
}

impl fmt::Display for ApiError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}: {}", self.code, self.message)
    }
}

impl std::error::Error for ApiError {}

// ============================================================================
// CONVERSIONS
// ============================================================================

impl From<PlatformError> for ApiError {
    fn from(err: PlatformError) -> Self {
        let kind = err.kind();
        let code = match &err {
            PlatformError::Validation(ValidationError::RequiredFieldMissing { .. }) => {
                ErrorCode::MissingField
            }
            _ => ErrorCode::from(kind),
        };
        if code == ErrorCode::InternalError {
            tracing::error!(error = %err, "platform failure");
        }
        ApiError::new(code, err.to_string()).with_details(serde_json::json!({
            "kind": kind.as_str(),
            "ids": err.offending_ids(),
        }))
    }
}

/// Request bodies that fail to deserialize.
impl From<serde_json::Error> for ApiError {
    fn from(err: serde_json::Error) -> Self {
        let message = err.to_string();
        match message
            .strip_prefix("missing field `")
            .and_then(|rest| rest.split('`').next())
        {
            Some(field) => ApiError::missing_field(field),
            None => ApiError::invalid_input(format!("Invalid request: {}", message)),
        }
    }
}

// ============================================================================
// RESULT TYPE ALIAS
// ============================================================================

/// Result type alias for API operations.
pub type ApiResult<T> = Result<T, ApiError>;
