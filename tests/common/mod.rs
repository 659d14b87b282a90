//! Shared test harness for integration tests.
//!
//! Provides [`TestHarness`], which wires the full router over an in-memory
//! SQLite pool and an object store rooted in a temp directory.

#![allow(dead_code)]

use axum::{
    Router,
    body::Body,
    http::{Request, Response, header},
};
use http_body_util::BodyExt;
use photo_album::{
    models::image::ImageView,
    routes::routes::routes,
    services::{
        image_service::ImageService,
        metadata_store::{MetadataStore, SqliteMetadataStore},
        object_store::{LocalObjectStore, ObjectStore},
        signer::UrlSigner,
    },
    state::AppState,
};
use sqlx::sqlite::SqlitePoolOptions;
use std::sync::Arc;
use tempfile::TempDir;
use tower::ServiceExt;

pub const BASE_URL: &str = "http://localhost:8080";
pub const BOUNDARY: &str = "album-test-boundary";

pub struct TestHarness {
    pub app: Router,
    pub objects: Arc<LocalObjectStore>,
    pub metadata: Arc<SqliteMetadataStore>,
    _dir: TempDir,
}

impl TestHarness {
    /// Harness with the real disk-backed object store.
    pub async fn new() -> Self {
        Self::with_object_store(|local| local as Arc<dyn ObjectStore>).await
    }

    /// Harness whose service talks to whatever `wrap` builds around the
    /// disk-backed store. `objects` still points at the disk store, so tests
    /// can inspect what actually got written.
    pub async fn with_object_store<F>(wrap: F) -> Self
    where
        F: FnOnce(Arc<LocalObjectStore>) -> Arc<dyn ObjectStore>,
    {
        let dir = tempfile::tempdir().expect("failed to create temp dir");
        let pool = SqlitePoolOptions::new()
            .max_connections(1)
            .connect("sqlite::memory:")
            .await
            .expect("failed to open in-memory sqlite");
        let metadata = Arc::new(SqliteMetadataStore::new(Arc::new(pool)));
        metadata.migrate().await.expect("failed to migrate");

        let signer = UrlSigner::new("test-secret", BASE_URL);
        let objects = Arc::new(LocalObjectStore::new(dir.path(), "photos", signer.clone()));
        let service_objects = wrap(objects.clone());
        let service_metadata: Arc<dyn MetadataStore> = metadata.clone();

        let images = ImageService::new(service_objects, service_metadata);
        let app = routes(1024 * 1024).with_state(AppState::new(images, signer));

        Self {
            app,
            objects,
            metadata,
            _dir: dir,
        }
    }

    pub async fn send(&self, request: Request<Body>) -> Response<Body> {
        self.app.clone().oneshot(request).await.unwrap()
    }

    pub async fn get(&self, uri: &str) -> Response<Body> {
        self.send(Request::get(uri).body(Body::empty()).unwrap())
            .await
    }

    /// `GET /api/list`, asserting success.
    pub async fn list(&self) -> Vec<ImageView> {
        let response = self.get("/api/list").await;
        assert_eq!(response.status(), 200);
        serde_json::from_slice(&body_bytes(response).await).unwrap()
    }

    /// Follow a signed URL issued under [`BASE_URL`].
    pub async fn fetch_signed(&self, url: &str) -> Response<Body> {
        let path = url.strip_prefix(BASE_URL).expect("url issued under base");
        self.get(path).await
    }

    pub async fn add(&self, name: &str, file_name: &str, data: &[u8]) -> Response<Body> {
        let form = Multipart::new()
            .text("name", name)
            .file("imageFile", file_name, data);
        self.send(form.request("POST", "/api/addImage")).await
    }

    pub async fn update(&self, id: &str, file_name: &str, data: &[u8]) -> Response<Body> {
        let form = Multipart::new()
            .text("id", id)
            .file("imageFile", file_name, data);
        self.send(form.request("PUT", "/api/updateImage")).await
    }

    pub async fn delete(&self, id: &str) -> Response<Body> {
        let form = Multipart::new().text("id", id);
        self.send(form.request("PUT", "/api/deleteImage")).await
    }
}

pub async fn body_bytes(response: Response<Body>) -> Vec<u8> {
    response
        .into_body()
        .collect()
        .await
        .unwrap()
        .to_bytes()
        .to_vec()
}

pub async fn body_string(response: Response<Body>) -> String {
    String::from_utf8(body_bytes(response).await).unwrap()
}

/// Minimal multipart/form-data body builder.
#[derive(Default)]
pub struct Multipart {
    body: Vec<u8>,
}

impl Multipart {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn text(mut self, name: &str, value: &str) -> Self {
        self.body.extend_from_slice(
            format!(
                "--{BOUNDARY}\r\nContent-Disposition: form-data; name=\"{name}\"\r\n\r\n{value}\r\n"
            )
            .as_bytes(),
        );
        self
    }

    pub fn file(mut self, name: &str, file_name: &str, data: &[u8]) -> Self {
        self.body.extend_from_slice(
            format!(
                "--{BOUNDARY}\r\nContent-Disposition: form-data; name=\"{name}\"; filename=\"{file_name}\"\r\nContent-Type: application/octet-stream\r\n\r\n"
            )
            .as_bytes(),
        );
        self.body.extend_from_slice(data);
        self.body.extend_from_slice(b"\r\n");
        self
    }

    pub fn request(mut self, method: &str, uri: &str) -> Request<Body> {
        self.body
            .extend_from_slice(format!("--{BOUNDARY}--\r\n").as_bytes());
        Request::builder()
            .method(method)
            .uri(uri)
            .header(
                header::CONTENT_TYPE,
                format!("multipart/form-data; boundary={BOUNDARY}"),
            )
            .body(Body::from(self.body))
            .unwrap()
    }
}
