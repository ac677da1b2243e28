//! Error taxonomy shared by the services and the RPC surface.
//!
//! Services return [`ServiceError`]; the RPC layer turns it into a Connect-style
//! `{"code", "message"}` body with the matching HTTP status.

use axum::{
    extract::rejection::JsonRejection,
    http::StatusCode,
    response::{IntoResponse, Response},
    Json,
};
use serde::Serialize;
use thiserror::Error;
use tracing::error;

use crate::db::StoreError;

/// Message returned for every rejected credential or token.
pub const AUTHENTICATION_FAILED: &str = "authentication failed";
/// Message returned by the access interceptor, whatever the root cause.
pub const UNAUTHENTICATED: &str = "unauthenticated";

#[derive(Debug, Error)]
pub enum ServiceError {
    #[error("{0}")]
    Validation(String),

    #[error("{0}")]
    Authentication(&'static str),

    #[error("{0} not found")]
    NotFound(&'static str),

    #[error("{0}")]
    Conflict(String),

    #[error("internal error: {0}")]
    Internal(String),
}

impl ServiceError {
    pub fn validation(msg: impl Into<String>) -> Self {
        Self::Validation(msg.into())
    }

    pub fn internal(err: impl std::fmt::Display) -> Self {
        Self::Internal(err.to_string())
    }

    pub fn code(&self) -> Code {
        match self {
            Self::Validation(_) | Self::Conflict(_) => Code::InvalidArgument,
            Self::Authentication(_) => Code::Unauthenticated,
            Self::NotFound(_) => Code::NotFound,
            Self::Internal(_) => Code::Internal,
        }
    }
}

impl From<StoreError> for ServiceError {
    fn from(e: StoreError) -> Self {
        match e {
            StoreError::Conflict(msg) => Self::Conflict(msg),
            other => Self::Internal(other.to_string()),
        }
    }
}

impl From<tokio::task::JoinError> for ServiceError {
    fn from(e: tokio::task::JoinError) -> Self {
        Self::Internal(format!("blocking task failed: {e}"))
    }
}

/// Connect error codes used by this service.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum Code {
    InvalidArgument,
    Unauthenticated,
    NotFound,
    DeadlineExceeded,
    Internal,
}

impl Code {
    pub fn status(self) -> StatusCode {
        match self {
            Code::InvalidArgument => StatusCode::BAD_REQUEST,
            Code::Unauthenticated => StatusCode::UNAUTHORIZED,
            Code::NotFound => StatusCode::NOT_FOUND,
            Code::DeadlineExceeded => StatusCode::GATEWAY_TIMEOUT,
            Code::Internal => StatusCode::INTERNAL_SERVER_ERROR,
        }
    }
}

#[derive(Debug, Serialize)]
pub struct ErrorBody {
    pub code: Code,
    pub message: String,
}

/// Error half of every RPC handler.
#[derive(Debug)]
pub struct RpcError {
    pub code: Code,
    pub message: String,
}

impl RpcError {
    pub fn unauthenticated() -> Self {
        Self {
            code: Code::Unauthenticated,
            message: UNAUTHENTICATED.into(),
        }
    }

    /// The call ran past the configured request timeout.
    pub fn deadline_exceeded() -> Self {
        Self {
            code: Code::DeadlineExceeded,
            message: "deadline exceeded".into(),
        }
    }
}

impl From<ServiceError> for RpcError {
    fn from(e: ServiceError) -> Self {
        let code = e.code();
        let message = match &e {
            ServiceError::Internal(cause) => {
                error!(error = %cause, "internal error");
                "internal error".to_string()
            }
            other => other.to_string(),
        };
        Self { code, message }
    }
}

impl From<JsonRejection> for RpcError {
    fn from(rejection: JsonRejection) -> Self {
        Self {
            code: Code::InvalidArgument,
            message: rejection.body_text(),
        }
    }
}

impl IntoResponse for RpcError {
    fn into_response(self) -> Response {
        let body = ErrorBody {
            code: self.code,
            message: self.message,
        };
        (self.code.status(), Json(body)).into_response()
    }
}

pub type RpcResult<T> = Result<Json<T>, RpcError>;

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn conflict_is_presented_as_invalid_argument() {
        let err = ServiceError::Conflict("user already exists".into());
        assert_eq!(err.code(), Code::InvalidArgument);
        assert_eq!(err.code().status(), StatusCode::BAD_REQUEST);
    }

    #[test]
    fn internal_cause_is_not_leaked() {
        let rpc: RpcError = ServiceError::internal("connection refused on 10.0.0.3").into();
        assert_eq!(rpc.code, Code::Internal);
        assert_eq!(rpc.message, "internal error");
    }

    #[test]
    fn store_conflict_maps_to_conflict() {
        let err: ServiceError = StoreError::Conflict("user already exists".into()).into();
        assert!(matches!(err, ServiceError::Conflict(_)));
    }

    #[test]
    fn deadline_exceeded_is_a_gateway_timeout() {
        let res = RpcError::deadline_exceeded().into_response();
        assert_eq!(res.status(), StatusCode::GATEWAY_TIMEOUT);
        let json = serde_json::to_string(&Code::DeadlineExceeded).unwrap();
        assert_eq!(json, "\"deadline_exceeded\"");
    }

    #[test]
    fn codes_serialize_in_snake_case() {
        let json = serde_json::to_string(&Code::InvalidArgument).unwrap();
        assert_eq!(json, "\"invalid_argument\"");
        let json = serde_json::to_string(&Code::NotFound).unwrap();
        assert_eq!(json, "\"not_found\"");
    }
}
