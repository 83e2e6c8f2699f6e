use axum::{
    http::StatusCode,
    response::{IntoResponse, Json, Response},
};
use serde::{Deserialize, Serialize};
use thiserror::Error;

pub const UNKNOWN_URL_MESSAGE: &str = "The requested URL does not exist.";

/// The only error body callers ever see.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ErrorResponse {
    pub message: String,
}

#[derive(Error, Debug)]
pub enum RelayError {
    #[error("{0}")]
    Validation(String),

    #[error("{0}")]
    NotFound(String),

    #[error("There was a problem creating a customer for account, {account_id}. Please try making the purchase again.")]
    Provisioning {
        account_id: String,
        #[source]
        source: anyhow::Error,
    },

    #[error("There was a problem charging account, {account_id}. Please try charging again.")]
    Gateway {
        account_id: String,
        #[source]
        source: anyhow::Error,
    },

    #[error("There was a problem listing payments for account, {account_id}. Please try again.")]
    Listing {
        account_id: String,
        #[source]
        source: anyhow::Error,
    },
}

impl RelayError {
    pub fn unknown_url() -> Self {
        Self::NotFound(UNKNOWN_URL_MESSAGE.to_string())
    }

    pub fn kind(&self) -> &'static str {
        match self {
            Self::Validation(_) => "validation",
            Self::NotFound(_) => "not_found",
            Self::Provisioning { .. } => "provisioning",
            Self::Gateway { .. } => "gateway",
            Self::Listing { .. } => "listing",
        }
    }

    /// Every kind maps to 400; existing clients tell errors apart by message.
    pub fn status_code(&self) -> StatusCode {
        StatusCode::BAD_REQUEST
    }
}

impl IntoResponse for RelayError {
    fn into_response(self) -> Response {
        match &self {
            Self::Provisioning { source, .. } | Self::Gateway { source, .. } | Self::Listing { source, .. } => {
                tracing::warn!(kind = self.kind(), cause = %format!("{:#}", source), "{}", self);
            }
            _ => tracing::debug!(kind = self.kind(), "{}", self),
        }

        let body = ErrorResponse {
            message: self.to_string(),
        };
        (self.status_code(), Json(body)).into_response()
    }
}

pub type Result<T> = std::result::Result<T, RelayError>;
