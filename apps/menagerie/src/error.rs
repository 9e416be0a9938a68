//! Errors surfaced by the binary.
//!
//! The same type serves the CLI (printed and turned into a failing exit
//! code) and the HTTP handlers, where it renders as a page.

use crate::api::html;
use axum::http::StatusCode;
use axum::response::{Html, IntoResponse, Redirect, Response};
use menagerie_core::ZooError;
use menagerie_core::response::DB_RETRY_MESSAGE;
use thiserror::Error;

/// Application-level failure.
#[derive(Debug, Error)]
pub enum AppError {
    /// Store or domain failure.
    #[error(transparent)]
    Store(#[from] ZooError),

    /// The requested page or record does not exist.
    #[error("not found")]
    NotFound,

    /// Signed in, but not allowed to do this.
    #[error("forbidden: {0}")]
    Forbidden(String),

    /// Bad command-line usage (existing database without `--force`, ...).
    #[error("{0}")]
    Usage(String),

    #[error("io error: {0}")]
    Io(#[from] std::io::Error),

    #[error("json error: {0}")]
    Json(#[from] serde_json::Error),
}

/// Shorthand used across the binary.
pub type AppResult<T> = Result<T, AppError>;

impl IntoResponse for AppError {
    fn into_response(self) -> Response {
        match self {
            Self::NotFound | Self::Store(ZooError::NotFound { .. }) => {
                (StatusCode::NOT_FOUND, Html(html::not_found_page())).into_response()
            }
            Self::Store(ZooError::Invalid(reason)) => (
                StatusCode::BAD_REQUEST,
                Html(html::error_page("Bad Request", &reason)),
            )
                .into_response(),
            Self::Forbidden(reason) | Self::Store(ZooError::Forbidden(reason)) => {
                tracing::warn!(%reason, "request denied");
                Redirect::to("/unauthorized").into_response()
            }
            // Details stay in the log; the page only says something went wrong.
            other => {
                tracing::error!(error = %other, "request failed");
                (
                    StatusCode::INTERNAL_SERVER_ERROR,
                    Html(html::error_page("Database Error", DB_RETRY_MESSAGE)),
                )
                    .into_response()
            }
        }
    }
}
