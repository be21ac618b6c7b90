//! Body and query extractors that reject with the JSON error shape.

use axum::extract::{FromRequest, FromRequestParts};

use crate::error::ApiErr;

/// [`axum::Json`] whose rejection is an [`ApiErr`].
#[derive(Debug, FromRequest)]
#[from_request(via(axum::Json), rejection(ApiErr))]
pub struct ApiJson<T>(pub T);

/// [`axum::extract::Query`] whose rejection is an [`ApiErr`].
#[derive(Debug, FromRequestParts)]
#[from_request(via(axum::extract::Query), rejection(ApiErr))]
pub struct ApiQuery<T>(pub T);
