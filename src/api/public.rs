//! Public API types

use axum::response::{IntoResponse, Response};
use http::StatusCode;

// Errors

pub struct ApiError(anyhow::Error);

/// Convert `ApiError` into an Axum compatible response.
impl IntoResponse for ApiError {
    fn into_response(self) -> Response {
        // Always log the error
        tracing::error!("{:#}", self.0);

        // Respond with an error status
        (
            StatusCode::INTERNAL_SERVER_ERROR,
            format!("Something went wrong: {}", self.0),
        )
            .into_response()
    }
}

/// Enables using `?` on functions that return `Result<_,
/// anyhow::Error>` to turn them into `Result<_, ApiError>`
impl<E> From<E> for ApiError
where
    E: Into<anyhow::Error>,
{
    fn from(err: E) -> Self {
        Self(err.into())
    }
}

// Pagination

pub const MAX_PAGE_SIZE: usize = 100;

/// A page request resolved from optional query parameters. Pages start
/// at 1 and `limit` is clamped to `1..=MAX_PAGE_SIZE`.
#[derive(Clone, Copy, Debug, PartialEq)]
pub struct Page {
    pub page: usize,
    pub limit: usize,
}

impl Page {
    pub fn new(page: Option<usize>, limit: Option<usize>, default_limit: usize) -> Self {
        Self {
            page: page.unwrap_or(1).max(1),
            limit: limit.unwrap_or(default_limit).clamp(1, MAX_PAGE_SIZE),
        }
    }

    /// Rows to skip. Saturates for absurd page numbers, which then
    /// simply return nothing.
    pub fn offset(&self) -> i64 {
        let offset = (self.page - 1).saturating_mul(self.limit);
        i64::try_from(offset).unwrap_or(i64::MAX)
    }
}

// Re-export public types from each route

pub mod conversations {
    pub use crate::api::routes::conversations::public::*;
}

pub mod personas {
    pub use crate::api::routes::personas::public::*;
}
