//! HTTP handlers for the album API under `/api`.
//! Each handler reads its multipart form and delegates to `ImageService`.
//! Failures come back as 500 with the raw error text.

use crate::{
    errors::{AppError, StoreError},
    models::image::{ImageUpload, ImageView},
    state::AppState,
};
use anyhow::{Context, anyhow};
use axum::{
    Json,
    extract::{Multipart, State, multipart::MultipartError},
    http::StatusCode,
};
use std::error::Error as _;

/// Fields accepted by the add/update/delete forms.
#[derive(Debug, Default)]
struct ImageForm {
    id: Option<String>,
    name: Option<String>,
    image_file: Option<ImageUpload>,
}

impl ImageForm {
    async fn read(mut multipart: Multipart) -> anyhow::Result<Self> {
        let mut form = Self::default();
        while let Some(field) = multipart
            .next_field()
            .await
            .map_err(multipart_error)
            .context("reading multipart form")?
        {
            let field_name = field.name().map(str::to_string);
            match field_name.as_deref() {
                Some("id") => {
                    let id = field.text().await.map_err(multipart_error);
                    form.id = Some(id.context("reading `id`")?);
                }
                Some("name") => {
                    let name = field.text().await.map_err(multipart_error);
                    form.name = Some(name.context("reading `name`")?);
                }
                Some("imageFile") => {
                    let file_name = field.file_name().map(str::to_string);
                    let data = field.bytes().await.map_err(multipart_error);
                    let data = data.context("reading `imageFile`")?;
                    form.image_file = Some(ImageUpload { file_name, data });
                }
                _ => {}
            }
        }
        Ok(form)
    }

    fn id(&mut self) -> anyhow::Result<String> {
        self.id
            .take()
            .filter(|id| !id.is_empty())
            .ok_or_else(|| anyhow!("missing form field `id`"))
    }

    fn image_file(&mut self) -> anyhow::Result<ImageUpload> {
        self.image_file
            .take()
            .ok_or_else(|| anyhow!("missing form file `imageFile`"))
    }
}

/// `MultipartError`'s own `Display` is generic; the parser's message and any
/// body error underneath it (e.g. a length limit) are spelled out here.
fn multipart_error(err: MultipartError) -> anyhow::Error {
    let mut message = err.body_text();
    let mut source = err.source();
    while let Some(cause) = source {
        let text = cause.to_string();
        if !message.contains(&text) {
            message.push_str(": ");
            message.push_str(&text);
        }
        source = cause.source();
    }
    anyhow!(message)
}

fn failed(op: &'static str) -> impl Fn(StoreError) -> AppError {
    move |err| {
        tracing::error!(error = %err, "{} failed", op);
        AppError::from(err)
    }
}

/// `GET /api/list`
pub async fn list_images(
    State(state): State<AppState>,
) -> Result<Json<Vec<ImageView>>, AppError> {
    let images = state
        .images
        .list_images()
        .await
        .map_err(failed("list images"))?;
    tracing::debug!(count = images.len(), "listed images");
    Ok(Json(images))
}

/// `POST /api/addImage` with `name` and `imageFile`.
pub async fn add_image(
    State(state): State<AppState>,
    multipart: Multipart,
) -> Result<StatusCode, AppError> {
    let mut form = ImageForm::read(multipart).await?;
    let name = form.name.take().unwrap_or_default();
    let upload = form.image_file()?;
    tracing::info!(name = %name, file_name = ?upload.file_name, "adding image");

    state
        .images
        .add_image(name, upload)
        .await
        .map_err(failed("add image"))?;
    Ok(StatusCode::OK)
}

/// `PUT /api/updateImage` with `id` and `imageFile`.
pub async fn update_image(
    State(state): State<AppState>,
    multipart: Multipart,
) -> Result<StatusCode, AppError> {
    let mut form = ImageForm::read(multipart).await?;
    let id = form.id()?;
    let upload = form.image_file()?;
    tracing::info!(id = %id, file_name = ?upload.file_name, "updating image");

    state
        .images
        .update_image(&id, upload)
        .await
        .map_err(failed("update image"))?;
    Ok(StatusCode::OK)
}

/// `PUT /api/deleteImage` with `id`.
pub async fn delete_image(
    State(state): State<AppState>,
    multipart: Multipart,
) -> Result<StatusCode, AppError> {
    let mut form = ImageForm::read(multipart).await?;
    let id = form.id()?;
    tracing::info!(id = %id, "deleting image");

    state
        .images
        .delete_image(&id)
        .await
        .map_err(failed("delete image"))?;
    Ok(StatusCode::OK)
}
