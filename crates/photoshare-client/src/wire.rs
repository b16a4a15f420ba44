//! JSON shapes exchanged with the photo service.

use chrono::NaiveDateTime;
use photoshare_core::{Photo, PhotoId, SubjectId};
use serde::{Deserialize, Serialize};

#[derive(Serialize)]
pub(crate) struct RegisterRequest<'a> {
    pub name: &'a str,
    pub email: &'a str,
    pub password: &'a str,
}

#[derive(Serialize)]
pub(crate) struct LoginRequest<'a> {
    pub email: &'a str,
    pub password: &'a str,
}

#[derive(Deserialize)]
pub(crate) struct RegisterResponse {
    pub user_id: SubjectId,
}

#[derive(Deserialize)]
pub(crate) struct LoginResponse {
    pub user_id: SubjectId,
    pub name: String,
    #[serde(default)]
    pub has_face_data: bool,
}

#[derive(Deserialize)]
pub(crate) struct EnrollResponse {
    pub enrolled_count: u32,
}

#[derive(Deserialize)]
pub(crate) struct UploadResponse {
    pub photo_ids: Vec<PhotoId>,
}

#[derive(Deserialize)]
pub(crate) struct ProcessResponse {
    pub processed_count: u32,
}

#[derive(Deserialize)]
pub(crate) struct MyPhotosResponse {
    pub photos: Vec<PhotoEntry>,
}

#[derive(Deserialize)]
pub(crate) struct PhotoEntry {
    pub id: PhotoId,
    #[serde(default)]
    pub thumbnail_path: Option<String>,
    #[serde(default)]
    pub uploaded_at: Option<String>,
    #[serde(default)]
    pub event_name: Option<String>,
}

impl From<PhotoEntry> for Photo {
    fn from(entry: PhotoEntry) -> Self {
        Photo {
            id: entry.id,
            event_label: entry.event_name.filter(|name| !name.is_empty()),
            has_thumbnail: entry.thumbnail_path.is_some(),
            has_full_image: true,
            // Advisory; an unparseable timestamp does not sink the listing.
            uploaded_at: entry
                .uploaded_at
                .and_then(|raw| raw.parse::<NaiveDateTime>().ok()),
        }
    }
}

/// Error body: `{"detail": "..."}`, where validation errors carry a list instead.
#[derive(Deserialize)]
pub(crate) struct ErrorBody {
    pub detail: serde_json::Value,
}

impl ErrorBody {
    pub fn into_detail(self) -> String {
        match self.detail {
            serde_json::Value::String(s) => s,
            other => other.to_string(),
        }
    }
}
