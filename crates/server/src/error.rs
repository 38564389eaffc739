//! API error types.

use crate::pipeline::fetch::FetchError;
use crate::pipeline::render::RenderError;
use axum::http::StatusCode;
use axum::http::header::CONTENT_TYPE;
use axum::response::{IntoResponse, Response};
use vignette_signer::SignerError;

/// API error type.
///
/// One variant per rejection kind of the resize pipeline. Degraded cache
/// reads and writes are absorbed inside the pipeline and never surface here.
#[derive(Clone, Debug, thiserror::Error)]
pub enum ApiError {
    #[error("{0}")]
    Auth(String),

    #[error("{0}")]
    BadSize(String),

    #[error("{0}")]
    BadSource(String),

    #[error("upstream fetch failed: {0}")]
    Upstream(FetchError),

    #[error("render failed: {0}")]
    Render(#[from] RenderError),

    #[error("storage unavailable: {0}")]
    StorageUnavailable(String),

    #[error("internal error: {0}")]
    Internal(String),
}

impl ApiError {
    /// Get the error code for this error.
    pub fn code(&self) -> &'static str {
        match self {
            Self::Auth(_) => "unauthorized",
            Self::BadSize(_) => "bad_size",
            Self::BadSource(_) => "bad_source",
            Self::Upstream(_) => "upstream_error",
            Self::Render(_) => "render_error",
            Self::StorageUnavailable(_) => "storage_unavailable",
            Self::Internal(_) => "internal_error",
        }
    }

    /// Get the HTTP status code for this error.
    pub fn status_code(&self) -> StatusCode {
        match self {
            Self::Auth(_) => StatusCode::UNAUTHORIZED,
            Self::BadSize(_) => StatusCode::BAD_REQUEST,
            Self::BadSource(_) => StatusCode::UNPROCESSABLE_ENTITY,
            Self::Upstream(FetchError::NotFound(_)) => StatusCode::NOT_FOUND,
            Self::Upstream(_) => StatusCode::BAD_GATEWAY,
            Self::Render(_) => StatusCode::INTERNAL_SERVER_ERROR,
            Self::StorageUnavailable(_) => StatusCode::SERVICE_UNAVAILABLE,
            Self::Internal(_) => StatusCode::INTERNAL_SERVER_ERROR,
        }
    }
}

impl From<vignette_core::Error> for ApiError {
    fn from(err: vignette_core::Error) -> Self {
        match err {
            vignette_core::Error::InvalidSize(_) => Self::BadSize(err.to_string()),
            vignette_core::Error::InvalidSource(_) => Self::BadSource(err.to_string()),
            vignette_core::Error::UnknownFormat => Self::Render(RenderError::UnknownFormat),
            vignette_core::Error::Config(_) => Self::Internal(err.to_string()),
        }
    }
}

impl From<SignerError> for ApiError {
    fn from(err: SignerError) -> Self {
        match err {
            SignerError::Mismatch => Self::Auth(err.to_string()),
            SignerError::KeyLoading(_) | SignerError::InvalidKey(_) => {
                Self::Internal(err.to_string())
            }
        }
    }
}

impl From<FetchError> for ApiError {
    fn from(err: FetchError) -> Self {
        match err {
            FetchError::Storage(message) => Self::StorageUnavailable(message),
            other => Self::Upstream(other),
        }
    }
}

impl IntoResponse for ApiError {
    fn into_response(self) -> Response {
        let status = self.status_code();
        let body = format!("{}: {}", self.code(), self);
        (
            status,
            [(CONTENT_TYPE, "text/plain; charset=utf-8")],
            body,
        )
            .into_response()
    }
}

/// Result type for API handlers.
pub type ApiResult<T> = std::result::Result<T, ApiError>;
