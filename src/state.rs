use crate::services::{image_service::ImageService, signer::UrlSigner};

/// Shared handler state. Cheap to clone; everything inside is behind `Arc`.
#[derive(Clone)]
pub struct AppState {
    pub images: ImageService,
    pub signer: UrlSigner,
}

impl AppState {
    pub fn new(images: ImageService, signer: UrlSigner) -> Self {
        Self { images, signer }
    }
}
