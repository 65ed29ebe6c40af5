//! Request extractors with problem-document rejections.

use axum::extract::FromRequest;

use crate::error::AppError;

/// `axum::Json` whose rejection renders as a `validation` problem (400)
/// instead of axum's plain-text 422.
#[derive(Debug, FromRequest)]
#[from_request(via(axum::Json), rejection(AppError))]
pub struct ApiJson<T>(pub T);
