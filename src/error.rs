/*
 * Responsibility
 * - アプリ共通の AppError 定義
 * - IntoResponse 実装 (HTTP status / JSON error body)
 * - provider / directory / config error を統一的に変換
 *   (provider 側の詳細は log にのみ残し、response には出さない)
 */
use axum::{
    Json,
    http::StatusCode,
    response::{IntoResponse, Response},
};
use serde::Serialize;
use thiserror::Error;

use crate::config::ConfigError;
use crate::services::auth::DenyReason;
use crate::services::oauth::{ProviderError, StateError};
use crate::services::users::DirectoryError;

#[derive(Debug, Serialize)]
pub struct ErrorResponse {
    pub error: ErrorBody,
}

#[derive(Debug, Serialize)]
pub struct ErrorBody {
    pub code: &'static str,
    pub message: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub reason: Option<&'static str>,
}

#[derive(Debug, Error)]
pub enum AppError {
    #[error("{0}")]
    InvalidRequest(String),

    #[error("authentication required")]
    Unauthenticated,

    #[error("insufficient privilege")]
    Forbidden,

    #[error("unknown provider")]
    UnknownProvider,

    #[error("invalid or expired state")]
    InvalidState,

    #[error("authorization code rejected by provider")]
    ProviderRejected,

    #[error("identity provider unavailable")]
    ProviderUnavailable,

    #[error("{0} not found")]
    NotFound(&'static str),

    #[error("configuration error: {0}")]
    Config(#[from] ConfigError),

    #[error("internal server error")]
    Internal,
}

impl AppError {
    pub fn denied(reason: DenyReason) -> Self {
        match reason {
            DenyReason::Unauthenticated => Self::Unauthenticated,
            DenyReason::InsufficientPrivilege => Self::Forbidden,
        }
    }
}

impl IntoResponse for AppError {
    fn into_response(self) -> Response {
        let (status, code, reason) = match &self {
            AppError::InvalidRequest(_) => (StatusCode::BAD_REQUEST, "BAD_REQUEST", None),
            AppError::Unauthenticated => (
                StatusCode::UNAUTHORIZED,
                "UNAUTHORIZED",
                Some(DenyReason::Unauthenticated.as_str()),
            ),
            AppError::Forbidden => (
                StatusCode::FORBIDDEN,
                "FORBIDDEN",
                Some(DenyReason::InsufficientPrivilege.as_str()),
            ),
            AppError::UnknownProvider => (StatusCode::NOT_FOUND, "UNKNOWN_PROVIDER", None),
            AppError::InvalidState => (StatusCode::BAD_REQUEST, "INVALID_STATE", None),
            AppError::ProviderRejected => {
                (StatusCode::BAD_REQUEST, "PROVIDER_EXCHANGE_FAILED", None)
            }
            AppError::ProviderUnavailable => {
                (StatusCode::BAD_GATEWAY, "PROVIDER_UNREACHABLE", None)
            }
            AppError::NotFound(_) => (StatusCode::NOT_FOUND, "NOT_FOUND", None),
            AppError::Config(_) | AppError::Internal => {
                (StatusCode::INTERNAL_SERVER_ERROR, "INTERNAL", None)
            }
        };

        // configuration detail never leaves the process
        let message = match &self {
            AppError::Config(_) => AppError::Internal.to_string(),
            other => other.to_string(),
        };

        let body = ErrorResponse {
            error: ErrorBody {
                code,
                message,
                reason,
            },
        };

        (status, Json(body)).into_response()
    }
}

impl From<ProviderError> for AppError {
    fn from(e: ProviderError) -> Self {
        match e {
            ProviderError::UnknownProvider(_) => AppError::UnknownProvider,
            ProviderError::Exchange(_) | ProviderError::UnverifiedIdentity => {
                AppError::ProviderRejected
            }
            ProviderError::Unreachable(_) => AppError::ProviderUnavailable,
        }
    }
}

impl From<StateError> for AppError {
    fn from(_: StateError) -> Self {
        AppError::InvalidState
    }
}

impl From<DirectoryError> for AppError {
    fn from(e: DirectoryError) -> Self {
        match e {
            DirectoryError::NotFound => AppError::NotFound("user"),
            DirectoryError::InvalidMark(mark) => {
                AppError::InvalidRequest(format!("invalid mark: {mark}"))
            }
            DirectoryError::Backend(_) => AppError::Internal,
        }
    }
}
