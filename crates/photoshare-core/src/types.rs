use std::fmt;
use std::path::Path;

use chrono::NaiveDateTime;
use serde::{Deserialize, Serialize};

/// Server-assigned identifier of a registered subject (a user who can be matched in photos).
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(transparent)]
pub struct SubjectId(pub i64);

impl fmt::Display for SubjectId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.0)
    }
}

/// Server-assigned identifier of an uploaded photo.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(transparent)]
pub struct PhotoId(pub i64);

impl fmt::Display for PhotoId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.0)
    }
}

/// The signed-in user, as persisted in the session store.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Identity {
    pub subject_id: SubjectId,
    pub display_name: String,
    /// The email the user signed in with.
    pub contact_handle: String,
    /// One-way within a session: only a successful enrollment sets it.
    pub has_enrolled_face: bool,
}

/// Email/password pair for `login`.
#[derive(Debug, Clone, Serialize)]
pub struct Credentials {
    pub email: String,
    pub password: String,
}

impl Credentials {
    pub fn new(email: impl Into<String>, password: impl Into<String>) -> Self {
        Self {
            email: email.into(),
            password: password.into(),
        }
    }
}

/// Successful `login` payload.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct LoginGrant {
    pub subject_id: SubjectId,
    pub display_name: String,
    pub has_enrolled_face: bool,
}

/// A photo the caller appears in. Read-only; the client never mutates it.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Photo {
    pub id: PhotoId,
    pub event_label: Option<String>,
    pub has_thumbnail: bool,
    pub has_full_image: bool,
    pub uploaded_at: Option<NaiveDateTime>,
}

/// Aggregate service counters. Advisory only, never cached.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
pub struct StatsSnapshot {
    pub total_users: u64,
    pub total_photos: u64,
    pub processed_photos: u64,
    pub pending_photos: u64,
}

/// Opaque image payload returned by binary fetches.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ImageBytes {
    pub bytes: Vec<u8>,
    pub content_type: String,
}

impl ImageBytes {
    /// File extension matching the content type (`jpg` when unknown).
    pub fn extension(&self) -> &'static str {
        image::ImageFormat::from_mime_type(&self.content_type)
            .and_then(|format| format.extensions_str().first().copied())
            .unwrap_or("jpg")
    }
}

/// A locally selected image file, read into memory for submission.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct LocalImage {
    pub file_name: String,
    pub content_type: String,
    pub bytes: Vec<u8>,
}

impl LocalImage {
    pub fn new(file_name: impl Into<String>, bytes: Vec<u8>) -> Self {
        let file_name = file_name.into();
        let content_type = content_type_for(&file_name).to_string();
        Self {
            file_name,
            content_type,
            bytes,
        }
    }

    /// Read an image file from disk.
    pub async fn open(path: impl AsRef<Path>) -> std::io::Result<Self> {
        let path = path.as_ref();
        let bytes = tokio::fs::read(path).await?;
        let file_name = path
            .file_name()
            .map(|n| n.to_string_lossy().into_owned())
            .unwrap_or_else(|| "image".to_string());
        Ok(Self::new(file_name, bytes))
    }
}

/// MIME type derived from the file extension.
pub fn content_type_for(file_name: &str) -> &'static str {
    image::ImageFormat::from_path(file_name)
        .map(|format| format.to_mime_type())
        .unwrap_or("application/octet-stream")
}
