//! Error types for catalog operations
//!
//! Errors follow the request taxonomy:
//! - Invalid: malformed or missing input, caught before any storage access
//! - NotFound: an id or alias that does not resolve to a visible row
//! - Forbidden: the caller lacks the relationship the operation needs
//! - Conflict: a uniqueness violation (alias taken)
//! - Storage/Upstream: internal failures, never shown to the caller verbatim

use thiserror::Error;

use crate::db::DbError;
use crate::status::ResponseStatus;

/// Error returned by every service function.
#[derive(Debug, Error)]
pub enum CatalogError {
    #[error("{message}")]
    Invalid {
        code: ResponseStatus,
        message: String,
    },

    #[error("{message}")]
    NotFound {
        code: ResponseStatus,
        message: String,
    },

    #[error("{message}")]
    Forbidden {
        code: ResponseStatus,
        message: String,
    },

    #[error("{message}")]
    Conflict {
        code: ResponseStatus,
        message: String,
    },

    #[error("{message}")]
    Unauthorized {
        code: ResponseStatus,
        message: String,
    },

    #[error("{message}")]
    RateLimited {
        code: ResponseStatus,
        message: String,
    },

    #[error("{0}")]
    PayloadTooLarge(String),

    #[error("This function has not been implemented yet.")]
    NotImplemented,

    #[error("Storage error: {0}")]
    Storage(DbError),

    #[error("Upstream service error: {0}")]
    Upstream(String),
}

impl CatalogError {
    /// Plain BAD_REQUEST for a missing or malformed parameter.
    pub fn bad_param(name: &str, requirement: &str) -> Self {
        CatalogError::Invalid {
            code: ResponseStatus::BadRequest,
            message: format!("Invalid or missing parameter: '{}' {}", name, requirement),
        }
    }

    pub fn invalid(code: ResponseStatus, message: impl Into<String>) -> Self {
        CatalogError::Invalid {
            code,
            message: message.into(),
        }
    }

    pub fn not_found(code: ResponseStatus, message: impl Into<String>) -> Self {
        CatalogError::NotFound {
            code,
            message: message.into(),
        }
    }

    pub fn forbidden(message: impl Into<String>) -> Self {
        CatalogError::Forbidden {
            code: ResponseStatus::Forbidden,
            message: message.into(),
        }
    }

    /// FORBIDDEN family with a specific code (e.g. MEDIA_UNSUPPORTED).
    pub fn forbidden_with(code: ResponseStatus, message: impl Into<String>) -> Self {
        CatalogError::Forbidden {
            code,
            message: message.into(),
        }
    }

    pub fn unauthorized(code: ResponseStatus, message: impl Into<String>) -> Self {
        CatalogError::Unauthorized {
            code,
            message: message.into(),
        }
    }

    pub fn alias_exists() -> Self {
        CatalogError::Conflict {
            code: ResponseStatus::AliasExists,
            message: "Alias already in use.".to_string(),
        }
    }

    /// The generic family, which decides the HTTP status.
    pub fn status(&self) -> ResponseStatus {
        match self {
            CatalogError::Invalid { .. } | CatalogError::Conflict { .. } => {
                ResponseStatus::BadRequest
            }
            CatalogError::NotFound { .. } => ResponseStatus::NotFound,
            CatalogError::Forbidden { .. } => ResponseStatus::Forbidden,
            CatalogError::Unauthorized { .. } => ResponseStatus::Unauthorized,
            CatalogError::RateLimited { .. } => ResponseStatus::TooManyRequests,
            CatalogError::PayloadTooLarge(_) => ResponseStatus::PayloadTooLarge,
            CatalogError::NotImplemented => ResponseStatus::NotImplemented,
            CatalogError::Storage(_) | CatalogError::Upstream(_) => {
                ResponseStatus::InternalServerError
            }
        }
    }

    /// The specific code surfaced in the JSON body for client-side branching.
    pub fn code(&self) -> ResponseStatus {
        match self {
            CatalogError::Invalid { code, .. }
            | CatalogError::NotFound { code, .. }
            | CatalogError::Forbidden { code, .. }
            | CatalogError::Conflict { code, .. }
            | CatalogError::Unauthorized { code, .. }
            | CatalogError::RateLimited { code, .. } => *code,
            other => other.status(),
        }
    }

    /// Returns true if retrying the same call could succeed.
    pub fn is_retryable(&self) -> bool {
        match self {
            CatalogError::Storage(e) => e.is_busy(),
            CatalogError::Upstream(_) => true,
            _ => false,
        }
    }

    /// True for failures the caller caused; false for our own faults.
    pub fn is_internal(&self) -> bool {
        matches!(self, CatalogError::Storage(_) | CatalogError::Upstream(_))
    }

    /// Message safe to hand back to a client.
    pub fn public_message(&self) -> String {
        if self.is_internal() {
            "An internal error occurred.".to_string()
        } else {
            self.to_string()
        }
    }
}

impl From<DbError> for CatalogError {
    fn from(err: DbError) -> Self {
        if err.is_alias_violation() {
            CatalogError::alias_exists()
        } else {
            CatalogError::Storage(err)
        }
    }
}

impl From<crate::media::MediaError> for CatalogError {
    fn from(err: crate::media::MediaError) -> Self {
        CatalogError::Upstream(format!("object store: {}", err))
    }
}

impl From<rusqlite::Error> for CatalogError {
    fn from(err: rusqlite::Error) -> Self {
        CatalogError::from(DbError::from(err))
    }
}

/// Serializable error body: `{"error_code": n, "error_message": "..."}`.
#[derive(Debug, Clone, serde::Serialize)]
pub struct ErrorBody {
    pub error_code: ResponseStatus,
    pub error_message: String,
}

impl From<&CatalogError> for ErrorBody {
    fn from(err: &CatalogError) -> Self {
        ErrorBody {
            error_code: err.code(),
            error_message: err.public_message(),
        }
    }
}
