//! Error Taxonomy
//!
//! Every failure the library surfaces falls into one of a handful of classes.
//! Components catch collaborator failures at their own boundary and translate
//! them into these variants; callers decide whether a class is fatal.
//!
//! - **Connectivity**: the datastore or cache is unreachable.
//! - **UnitUnavailable**: a call to a search unit errored or timed out.
//! - **EmptyTopology**: no healthy unit exists at search time.
//! - **InvalidRequest**: the request was rejected before any side effect.

use axum::http::StatusCode;
use serde::{Deserialize, Serialize};
use thiserror::Error;

#[derive(Debug, Error)]
pub enum SearchError {
    #[error("Collaborator unreachable: {0}")]
    Connectivity(String),

    #[error("Unit {unit_id} unavailable: {reason}")]
    UnitUnavailable { unit_id: String, reason: String },

    #[error("No healthy search units available")]
    EmptyTopology,

    #[error("Invalid request: {0}")]
    InvalidRequest(String),

    #[error("Index error: {0}")]
    Index(String),
}

pub type SearchResult<T> = Result<T, SearchError>;

impl SearchError {
    pub fn invalid(message: impl Into<String>) -> Self {
        Self::InvalidRequest(message.into())
    }

    pub fn unavailable(unit_id: impl Into<String>, reason: impl ToString) -> Self {
        Self::UnitUnavailable {
            unit_id: unit_id.into(),
            reason: reason.to_string(),
        }
    }

    pub fn status_code(&self) -> StatusCode {
        match self {
            SearchError::EmptyTopology => StatusCode::SERVICE_UNAVAILABLE,
            SearchError::InvalidRequest(_) => StatusCode::BAD_REQUEST,
            SearchError::Connectivity(_) | SearchError::UnitUnavailable { .. } => {
                StatusCode::BAD_GATEWAY
            }
            SearchError::Index(_) => StatusCode::INTERNAL_SERVER_ERROR,
        }
    }

    /// Short machine-readable class name used in HTTP error bodies.
    pub fn kind(&self) -> &'static str {
        match self {
            SearchError::Connectivity(_) => "connectivity",
            SearchError::UnitUnavailable { .. } => "unit_unavailable",
            SearchError::EmptyTopology => "empty_topology",
            SearchError::InvalidRequest(_) => "invalid_request",
            SearchError::Index(_) => "index",
        }
    }
}

/// JSON body returned by every management endpoint on failure.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ErrorResponse {
    pub error: String,
    pub message: String,
}

impl From<&SearchError> for ErrorResponse {
    fn from(err: &SearchError) -> Self {
        Self {
            error: err.kind().to_string(),
            message: err.to_string(),
        }
    }
}
