//! Request extractors whose rejections use the JSON error envelope.
//!
//! Query strings go through `axum_extra`'s `Query`, which accepts repeated
//! keys (`?tags=a&tags=b`) for `Vec` fields.

use axum::extract::{FromRequest, FromRequestParts};

use crate::error::ServerError;

/// JSON request body
#[derive(Debug, FromRequest)]
#[from_request(via(axum::Json), rejection(ServerError))]
pub struct ApiJson<T>(pub T);

/// Query string, with repeated keys collected into `Vec` fields
#[derive(Debug, FromRequestParts)]
#[from_request(via(axum_extra::extract::Query), rejection(ServerError))]
pub struct ApiQuery<T>(pub T);

/// Path parameters
#[derive(Debug, FromRequestParts)]
#[from_request(via(axum::extract::Path), rejection(ServerError))]
pub struct ApiPath<T>(pub T);
