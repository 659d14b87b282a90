//! Serves image payloads behind signed URLs.
//! Streams object bodies to avoid buffering in memory.

use crate::{
    errors::{AppError, StoreError},
    services::signer::Verification,
    state::AppState,
};
use axum::{
    body::Body,
    extract::{Path, Query, State},
    http::{HeaderValue, StatusCode, header},
    response::Response,
};
use chrono::Utc;
use serde::Deserialize;
use tokio_util::io::ReaderStream;

/// Query string carried by a signed URL.
#[derive(Debug, Deserialize)]
pub struct SignedQuery {
    pub expires: i64,
    pub signature: String,
}

/// `GET /objects/{*key}?expires=&signature=`
pub async fn get_signed_object(
    State(state): State<AppState>,
    Path(key): Path<String>,
    Query(q): Query<SignedQuery>,
) -> Result<Response, AppError> {
    match state.signer.verify(&key, q.expires, &q.signature, Utc::now()) {
        Verification::Valid => {}
        Verification::Expired => {
            tracing::debug!(key = %key, "rejected expired signed url");
            return Err(AppError::forbidden("signed url expired"));
        }
        Verification::BadSignature => {
            tracing::warn!(key = %key, "rejected signed url with bad signature");
            return Err(AppError::forbidden("invalid signature"));
        }
    }

    let object = state
        .images
        .objects()
        .open_object(&key)
        .await
        .map_err(|err| match err {
            StoreError::ObjectNotFound(_) => AppError::not_found(err.to_string()),
            other => AppError::from(other),
        })?;

    let content_type = HeaderValue::from_str(&object.content_type)
        .unwrap_or_else(|_| HeaderValue::from_static("application/octet-stream"));
    let mut response = Response::new(Body::from_stream(ReaderStream::new(object.reader)));
    *response.status_mut() = StatusCode::OK;
    let headers = response.headers_mut();
    headers.insert(header::CONTENT_TYPE, content_type);
    headers.insert(header::CONTENT_LENGTH, HeaderValue::from(object.size_bytes));
    headers.insert(
        header::CACHE_CONTROL,
        HeaderValue::from_static("private, max-age=1800"),
    );
    Ok(response)
}
