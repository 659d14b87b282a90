//! Defines routes for the photo album API.
//!
//! ## Structure
//! - **Album API**
//!   - `GET  /api/list`        — every record with a signed read URL
//!   - `POST /api/addImage`    — multipart `name` + `imageFile`
//!   - `PUT  /api/updateImage` — multipart `id` + `imageFile`
//!   - `PUT  /api/deleteImage` — multipart `id`
//!
//! - **Signed object reads**
//!   - `GET /objects/{*key}?expires=&signature=`
//!
//! - **Probes**: `GET /healthz`, `GET /readyz`

use crate::{
    handlers::{
        health_handlers::{healthz, readyz},
        image_handlers::{add_image, delete_image, list_images, update_image},
        object_handlers::get_signed_object,
    },
    state::AppState,
};
use axum::{
    Router,
    extract::DefaultBodyLimit,
    routing::{get, post, put},
};

/// Build and return the router carrying `AppState` to all handlers.
///
/// `max_upload_bytes` caps request bodies; uploads are buffered in memory.
pub fn routes(max_upload_bytes: usize) -> Router<AppState> {
    Router::new()
        .route("/healthz", get(healthz))
        .route("/readyz", get(readyz))
        .route("/api/list", get(list_images))
        .route("/api/addImage", post(add_image))
        .route("/api/updateImage", put(update_image))
        .route("/api/deleteImage", put(delete_image))
        .route("/objects/{*key}", get(get_signed_object))
        .layer(DefaultBodyLimit::max(max_upload_bytes))
}
