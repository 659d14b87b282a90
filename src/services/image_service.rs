//! ImageService — the image record lifecycle over two independent stores.
//!
//! Each operation runs its steps strictly in order and stops at the first
//! failure. The stores are not updated atomically: a failure between the two
//! writes leaves them inconsistent (an orphaned payload, or a record whose
//! payload is gone), and nothing compensates for it.

use crate::{
    errors::StoreResult,
    models::image::{IMAGE_CONTENT_TYPE, ImageRecord, ImageUpload, ImageView, object_key_for},
    services::{metadata_store::MetadataStore, object_store::ObjectStore},
};
use chrono::{Duration, Local, NaiveDate, Utc};
use std::sync::Arc;
use tracing::info;
use uuid::Uuid;

/// How long a listed URL stays readable, in seconds.
pub const SIGNED_URL_TTL_SECS: i64 = 30 * 60;

#[derive(Clone)]
pub struct ImageService {
    objects: Arc<dyn ObjectStore>,
    metadata: Arc<dyn MetadataStore>,
}

fn today() -> NaiveDate {
    Local::now().date_naive()
}

impl ImageService {
    pub fn new(objects: Arc<dyn ObjectStore>, metadata: Arc<dyn MetadataStore>) -> Self {
        Self { objects, metadata }
    }

    pub fn objects(&self) -> &Arc<dyn ObjectStore> {
        &self.objects
    }

    pub fn metadata(&self) -> &Arc<dyn MetadataStore> {
        &self.metadata
    }

    /// Store the payload under a fresh key, then write the record.
    pub async fn add_image(&self, name: String, upload: ImageUpload) -> StoreResult<ImageRecord> {
        let id = Uuid::new_v4().to_string();
        let object_key = object_key_for(&id, upload.file_name.as_deref());

        self.objects
            .put_object(&object_key, IMAGE_CONTENT_TYPE, upload.data)
            .await?;

        let record = ImageRecord {
            id,
            name,
            date: today(),
            object_key,
        };
        self.metadata.put(&record).await?;

        info!(id = %record.id, key = %record.object_key, "image added");
        Ok(record)
    }

    /// Overwrite the payload at the record's key, then bump its date.
    ///
    /// `name` and `object_key` are left as they are.
    pub async fn update_image(&self, id: &str, upload: ImageUpload) -> StoreResult<()> {
        let record = self.metadata.get(id).await?;

        self.objects
            .put_object(&record.object_key, IMAGE_CONTENT_TYPE, upload.data)
            .await?;
        self.metadata.touch_date(id, today()).await?;

        info!(id, key = %record.object_key, "image updated");
        Ok(())
    }

    /// Remove the record, then its payload.
    pub async fn delete_image(&self, id: &str) -> StoreResult<()> {
        let record = self.metadata.delete(id).await?;
        self.objects.delete_object(&record.object_key).await?;

        info!(id, key = %record.object_key, "image deleted");
        Ok(())
    }

    /// Every record with a freshly signed read URL. One failure fails the
    /// whole listing.
    pub async fn list_images(&self) -> StoreResult<Vec<ImageView>> {
        let records = self.metadata.list().await?;
        let expires_at = Utc::now() + Duration::seconds(SIGNED_URL_TTL_SECS);

        let mut views = Vec::with_capacity(records.len());
        for record in records {
            let url = self
                .objects
                .signed_url(&record.object_key, expires_at)
                .await?;
            views.push(ImageView::new(record, url));
        }
        Ok(views)
    }
}
