use std::fmt;

use axum::http::StatusCode;
use axum::response::{IntoResponse, Response};
use axum::Json;
use serde::Serialize;
use serde_json::json;
use tracing::{error, warn};

use super::domain::EntityKind;
use super::store::RepositoryError;

/// Field-level detail attached to validation failures.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct FieldError {
    pub field: &'static str,
    pub message: String,
}

impl FieldError {
    pub fn new(field: &'static str, message: impl Into<String>) -> Self {
        Self {
            field,
            message: message.into(),
        }
    }
}

impl fmt::Display for FieldError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}: {}", self.field, self.message)
    }
}

/// Coarse classification so callers can tell "sign in" from "fix the form" from "retry".
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum ErrorClass {
    Validation,
    Authentication,
    Authorization,
    StateConflict,
    NotFound,
    Unavailable,
    Internal,
}

/// Typed failures returned by every marketplace operation.
#[derive(Debug, thiserror::Error)]
pub enum MarketplaceError {
    #[error("authentication required")]
    AuthenticationRequired,
    #[error("not authorized: {reason}")]
    Unauthorized { reason: String },
    #[error("an approved freelancer profile is required")]
    FreelancerProfileRequired,
    #[error("validation failed: {}", join_fields(.0))]
    ValidationFailed(Vec<FieldError>),
    #[error("a reason is required for this decision")]
    MissingReason,
    #[error("review score {0} must be between 1 and 5 in half-point steps")]
    InvalidScore(f64),
    #[error("admins cannot moderate their own account")]
    SelfModeration,
    #[error("{kind} {id} is not pending (current status: {current})")]
    NotPending {
        kind: EntityKind,
        id: String,
        current: &'static str,
    },
    #[error("{kind} {id} was already {current}")]
    Conflict {
        kind: EntityKind,
        id: String,
        current: &'static str,
    },
    #[error("{kind} {id} is {current}; this action requires {required}")]
    InvalidState {
        kind: EntityKind,
        id: String,
        current: &'static str,
        required: &'static str,
    },
    #[error("application {id} was already {current}")]
    AlreadyDecided { id: String, current: &'static str },
    #[error("an application to service {service_id} from this freelancer is still awaiting a decision")]
    DuplicateApplication { service_id: String },
    #[error("service {id} is not accepting applications (status: {current}, active: {active})")]
    ServiceUnavailable {
        id: String,
        current: &'static str,
        active: bool,
    },
    #[error("{kind} {id} already exists")]
    AlreadyExists { kind: &'static str, id: String },
    #[error("{kind} {id} not found")]
    NotFound { kind: &'static str, id: String },
    #[error("store unavailable: {0}")]
    StoreUnavailable(String),
    #[error("identity provider unavailable: {0}")]
    ProviderUnavailable(String),
    #[error("internal error: {0}")]
    Internal(String),
}

fn join_fields(fields: &[FieldError]) -> String {
    fields
        .iter()
        .map(ToString::to_string)
        .collect::<Vec<_>>()
        .join("; ")
}

impl MarketplaceError {
    pub fn unauthorized(reason: impl Into<String>) -> Self {
        Self::Unauthorized {
            reason: reason.into(),
        }
    }

    pub fn not_found(kind: &'static str, id: impl fmt::Display) -> Self {
        Self::NotFound {
            kind,
            id: id.to_string(),
        }
    }

    pub fn class(&self) -> ErrorClass {
        match self {
            MarketplaceError::ValidationFailed(_)
            | MarketplaceError::MissingReason
            | MarketplaceError::InvalidScore(_) => ErrorClass::Validation,
            MarketplaceError::AuthenticationRequired => ErrorClass::Authentication,
            MarketplaceError::Unauthorized { .. }
            | MarketplaceError::FreelancerProfileRequired
            | MarketplaceError::SelfModeration => ErrorClass::Authorization,
            MarketplaceError::NotPending { .. }
            | MarketplaceError::Conflict { .. }
            | MarketplaceError::InvalidState { .. }
            | MarketplaceError::AlreadyDecided { .. }
            | MarketplaceError::DuplicateApplication { .. }
            | MarketplaceError::ServiceUnavailable { .. }
            | MarketplaceError::AlreadyExists { .. } => ErrorClass::StateConflict,
            MarketplaceError::NotFound { .. } => ErrorClass::NotFound,
            MarketplaceError::StoreUnavailable(_) | MarketplaceError::ProviderUnavailable(_) => {
                ErrorClass::Unavailable
            }
            MarketplaceError::Internal(_) => ErrorClass::Internal,
        }
    }

    pub fn status_code(&self) -> StatusCode {
        match self.class() {
            ErrorClass::Validation => StatusCode::BAD_REQUEST,
            ErrorClass::Authentication => StatusCode::UNAUTHORIZED,
            ErrorClass::Authorization => StatusCode::FORBIDDEN,
            ErrorClass::StateConflict => StatusCode::CONFLICT,
            ErrorClass::NotFound => StatusCode::NOT_FOUND,
            ErrorClass::Unavailable => StatusCode::SERVICE_UNAVAILABLE,
            ErrorClass::Internal => StatusCode::INTERNAL_SERVER_ERROR,
        }
    }

    /// Status of the entity a conflicting transition was attempted against.
    pub fn current_status(&self) -> Option<&'static str> {
        match self {
            MarketplaceError::NotPending { current, .. }
            | MarketplaceError::Conflict { current, .. }
            | MarketplaceError::InvalidState { current, .. }
            | MarketplaceError::AlreadyDecided { current, .. }
            | MarketplaceError::ServiceUnavailable { current, .. } => Some(*current),
            _ => None,
        }
    }

    pub fn is_retryable(&self) -> bool {
        self.class() == ErrorClass::Unavailable
    }

    /// Message safe to hand to API clients.
    pub fn user_message(&self) -> String {
        match self {
            MarketplaceError::Internal(_) => "internal server error".to_string(),
            MarketplaceError::StoreUnavailable(_) | MarketplaceError::ProviderUnavailable(_) => {
                "service temporarily unavailable, retry later".to_string()
            }
            other => other.to_string(),
        }
    }
}

impl From<RepositoryError> for MarketplaceError {
    fn from(value: RepositoryError) -> Self {
        match value {
            RepositoryError::Unavailable(detail) => MarketplaceError::StoreUnavailable(detail),
            other => MarketplaceError::Internal(other.to_string()),
        }
    }
}

impl IntoResponse for MarketplaceError {
    fn into_response(self) -> Response {
        match self.class() {
            ErrorClass::Internal => error!(error = %self, "marketplace request failed"),
            ErrorClass::Unavailable => warn!(error = %self, "marketplace dependency unavailable"),
            _ => {}
        }

        let mut body = json!({
            "error": self.user_message(),
            "class": self.class(),
        });
        if let MarketplaceError::ValidationFailed(fields) = &self {
            body["fields"] = json!(fields);
        }
        if let Some(current) = self.current_status() {
            body["current_status"] = json!(current);
        }

        (self.status_code(), Json(body)).into_response()
    }
}
