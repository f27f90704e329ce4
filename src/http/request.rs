//! Request identification and body decoding.
//!
//! # Responsibilities
//! - Generate or propagate the `x-request-id` header (UUID v4)
//! - Decode JSON and urlencoded bodies for route handlers
//!
//! # Design Decisions
//! - Request ID added as early as possible for tracing
//! - Body decoding is on demand: the pipeline never buffers a body itself
//! - Decode rejections become `Failure`s with the rejection's status

use axum::{
    body::Body,
    extract::{FromRequest, Json, Form},
    http::{HeaderName, Request},
};
use serde::de::DeserializeOwned;
use tower_http::request_id::{MakeRequestUuid, PropagateRequestIdLayer, SetRequestIdLayer};

use crate::http::response::Failure;

/// Header carrying the request ID.
pub const X_REQUEST_ID: HeaderName = HeaderName::from_static("x-request-id");

/// Layer that assigns a UUID v4 request id when the client did not send one.
pub fn set_request_id_layer() -> SetRequestIdLayer<MakeRequestUuid> {
    SetRequestIdLayer::new(X_REQUEST_ID, MakeRequestUuid)
}

/// Layer that copies the request id onto the response.
pub fn propagate_request_id_layer() -> PropagateRequestIdLayer {
    PropagateRequestIdLayer::new(X_REQUEST_ID)
}

/// Read the request id header, if present and printable.
pub fn request_id_of(headers: &axum::http::HeaderMap) -> Option<String> {
    headers
        .get(&X_REQUEST_ID)
        .and_then(|v| v.to_str().ok())
        .map(str::to_owned)
}

/// Decode a JSON body.
pub async fn json_body<T>(request: Request<Body>) -> Result<T, Failure>
where
    T: DeserializeOwned,
{
    match Json::<T>::from_request(request, &()).await {
        Ok(Json(value)) => Ok(value),
        Err(rejection) => Err(Failure::with_status(rejection.status(), rejection.body_text())),
    }
}

/// Decode an `application/x-www-form-urlencoded` body.
pub async fn form_body<T>(request: Request<Body>) -> Result<T, Failure>
where
    T: DeserializeOwned,
{
    match Form::<T>::from_request(request, &()).await {
        Ok(Form(value)) => Ok(value),
        Err(rejection) => Err(Failure::with_status(rejection.status(), rejection.body_text())),
    }
}

/// Decode a body as JSON or urlencoded depending on its content type.
pub async fn payload<T>(request: Request<Body>) -> Result<T, Failure>
where
    T: DeserializeOwned,
{
    let is_form = request
        .headers()
        .get(axum::http::header::CONTENT_TYPE)
        .and_then(|v| v.to_str().ok())
        .is_some_and(|ct| ct.starts_with("application/x-www-form-urlencoded"));

    if is_form {
        form_body(request).await
    } else {
        json_body(request).await
    }
}
