//! Core data models for the photo album service.
//!
//! `ImageRecord` maps to the `images` table via `sqlx::FromRow` and
//! serializes as JSON via `serde`.

pub mod image;
