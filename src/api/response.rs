//! JSON response envelope and HTTP error mapping

use crate::library::ServiceError;
use axum::http::StatusCode;
use axum::response::{IntoResponse, Response};
use axum::Json;
use serde::Serialize;

const STATUS_OK: &str = "OK";
const STATUS_ERR: &str = "Error";

/// `{status, message?, result?}` wrapper around every reply.
#[derive(Debug, Serialize)]
pub struct Envelope<T> {
    pub status: &'static str,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub message: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub result: Option<T>,
}

impl<T: Serialize> Envelope<T> {
    pub fn success(result: T) -> Self {
        Self {
            status: STATUS_OK,
            message: None,
            result: Some(result),
        }
    }
}

impl Envelope<()> {
    pub fn error(message: impl Into<String>) -> Self {
        Self {
            status: STATUS_ERR,
            message: Some(message.into()),
            result: None,
        }
    }
}

pub fn reply<T: Serialize>(status: StatusCode, result: T) -> Response {
    (status, Json(Envelope::success(result))).into_response()
}

/// A failed request: HTTP status plus the short client-facing message.
#[derive(Debug)]
pub struct ApiError {
    pub status: StatusCode,
    pub message: String,
}

impl ApiError {
    pub fn decode() -> Self {
        Self {
            status: StatusCode::BAD_REQUEST,
            message: "Can't decode json body".to_string(),
        }
    }

    pub fn validation(message: impl Into<String>) -> Self {
        Self {
            status: StatusCode::BAD_REQUEST,
            message: message.into(),
        }
    }

    pub fn timeout() -> Self {
        Self {
            status: StatusCode::INTERNAL_SERVER_ERROR,
            message: "request timed out".to_string(),
        }
    }

    /// Map a service failure. `context` replaces the detail of internal
    /// errors, which is only logged.
    pub fn from_service(err: ServiceError, context: &str) -> Self {
        match err {
            ServiceError::Validation(msg) => Self::validation(msg),
            ServiceError::NotFound => Self {
                status: StatusCode::NOT_FOUND,
                message: "song not found".to_string(),
            },
            ServiceError::PageOutOfRange(_) => Self {
                status: StatusCode::NOT_FOUND,
                message: "page out of range".to_string(),
            },
            ServiceError::Enrichment(_) | ServiceError::Storage(_) => {
                tracing::error!(error = %err, "{context}");
                Self {
                    status: StatusCode::INTERNAL_SERVER_ERROR,
                    message: context.to_string(),
                }
            }
        }
    }
}

impl IntoResponse for ApiError {
    fn into_response(self) -> Response {
        (self.status, Json(Envelope::error(self.message))).into_response()
    }
}
