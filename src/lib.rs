//! Photo album backend: image records whose metadata lives in SQLite and
//! whose payloads live in a local object store, read back through signed URLs.

pub mod config;
pub mod errors;
pub mod handlers;
pub mod models;
pub mod routes;
pub mod services;
pub mod state;
