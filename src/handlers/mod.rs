//! HTTP request handlers.

pub mod landing;
pub mod models;
pub mod transcriptions;
