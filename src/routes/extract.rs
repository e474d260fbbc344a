//! `Json`/`Query` wrappers whose rejections use the API's JSON error body.

use axum::extract::{FromRequest, FromRequestParts};

use crate::error::ProgressError;

#[derive(FromRequest)]
#[from_request(via(axum::Json), rejection(ProgressError))]
pub struct ApiJson<T>(pub T);

#[derive(FromRequestParts)]
#[from_request(via(axum::extract::Query), rejection(ProgressError))]
pub struct ApiQuery<T>(pub T);
