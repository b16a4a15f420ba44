//! Remote API boundary.
//!
//! One method per remote capability. Implementations never retry and never
//! panic on bad responses: every failure comes back as an [`ApiError`].

use async_trait::async_trait;

use crate::account::Registration;
use crate::error::ApiError;
use crate::types::{
    Credentials, ImageBytes, LocalImage, LoginGrant, Photo, PhotoId, StatsSnapshot, SubjectId,
};

/// Event photos to upload in one request, in selection order.
#[derive(Debug, Clone)]
pub struct UploadBatch {
    pub uploader: SubjectId,
    pub images: Vec<LocalImage>,
    pub event_label: Option<String>,
}

#[async_trait]
pub trait Gateway: Send + Sync {
    async fn register(&self, registration: &Registration) -> Result<SubjectId, ApiError>;

    async fn login(&self, credentials: &Credentials) -> Result<LoginGrant, ApiError>;

    /// Submit face samples; returns how many the server accepted.
    async fn enroll_face(&self, subject: SubjectId, samples: &[LocalImage]) -> Result<u32, ApiError>;

    async fn upload_photos(&self, batch: &UploadBatch) -> Result<Vec<PhotoId>, ApiError>;

    /// Trigger matching over every pending photo on the server, not just the caller's.
    async fn process_photos(&self) -> Result<u32, ApiError>;

    async fn list_my_photos(&self, subject: SubjectId) -> Result<Vec<Photo>, ApiError>;

    async fn fetch_photo(&self, photo: PhotoId) -> Result<ImageBytes, ApiError>;

    async fn fetch_thumbnail(&self, photo: PhotoId) -> Result<ImageBytes, ApiError>;

    async fn fetch_stats(&self) -> Result<StatsSnapshot, ApiError>;
}
