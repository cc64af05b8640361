//! Cloudflare R2 artifact publisher.
//!
//! This crate provides:
//! - File upload to R2 through the S3 API
//! - Public URL construction from a configured base URL
//! - A publisher that degrades to "not configured" when credentials are absent

pub mod client;
pub mod error;
pub mod publisher;

pub use client::{R2Client, R2Config};
pub use error::{StorageError, StorageResult};
pub use publisher::{audio_key, video_key, ArtifactPublisher, StoragePublisher, UploadOutcome};
