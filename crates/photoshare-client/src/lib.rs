//! photoshare-client — HTTP gateway to the photo service.
//!
//! Thin reqwest client implementing [`photoshare_core::Gateway`]. JSON bodies
//! for accounts, multipart for face samples and event photos, raw bytes for
//! image fetches. Nothing here retries: every failure, including a response
//! that cannot be decoded, is returned as a classified [`ApiError`].

mod wire;

use std::time::Duration;

use async_trait::async_trait;
use photoshare_core::{
    ApiError, Credentials, Gateway, ImageBytes, LocalImage, LoginGrant, Photo, PhotoId,
    Registration, StatsSnapshot, SubjectId, UploadBatch,
};
use reqwest::header::CONTENT_TYPE;
use reqwest::multipart::{Form, Part};
use reqwest::{RequestBuilder, Response, StatusCode};
use serde::de::DeserializeOwned;

use crate::wire::{
    EnrollResponse, ErrorBody, LoginRequest, LoginResponse, MyPhotosResponse, ProcessResponse,
    RegisterRequest, RegisterResponse, UploadResponse,
};

/// Default per-request timeout.
pub const DEFAULT_TIMEOUT: Duration = Duration::from_secs(30);

/// Client for the photo service REST API.
pub struct HttpGateway {
    base_url: String,
    client: reqwest::Client,
}

impl HttpGateway {
    /// Create a gateway for `base_url` (e.g. "http://localhost:8000").
    pub fn new(base_url: impl Into<String>) -> Self {
        Self {
            base_url: normalize(base_url.into()),
            client: reqwest::Client::new(),
        }
    }

    /// Create a gateway whose requests give up after `timeout`.
    pub fn with_timeout(base_url: impl Into<String>, timeout: Duration) -> Result<Self, reqwest::Error> {
        let client = reqwest::Client::builder().timeout(timeout).build()?;
        Ok(Self {
            base_url: normalize(base_url.into()),
            client,
        })
    }

    pub fn base_url(&self) -> &str {
        &self.base_url
    }

    fn url(&self, path: &str) -> String {
        format!("{}{}", self.base_url, path)
    }

    /// Send and classify non-success statuses.
    async fn send(&self, request: RequestBuilder) -> Result<Response, ApiError> {
        let response = request.send().await.map_err(classify_transport)?;
        let status = response.status();
        if status.is_success() {
            return Ok(response);
        }
        let detail = response
            .json::<ErrorBody>()
            .await
            .ok()
            .map(ErrorBody::into_detail);
        let error = classify_status(status, detail);
        tracing::debug!(%status, error = %error, "request failed");
        Err(error)
    }

    async fn json<T: DeserializeOwned>(&self, request: RequestBuilder) -> Result<T, ApiError> {
        let response = self.send(request).await?;
        response.json::<T>().await.map_err(|e| {
            tracing::warn!(error = %e, "malformed response body");
            ApiError::ServerUnavailable
        })
    }

    async fn image(&self, request: RequestBuilder) -> Result<ImageBytes, ApiError> {
        let response = self.send(request).await?;
        let content_type = response
            .headers()
            .get(CONTENT_TYPE)
            .and_then(|v| v.to_str().ok())
            .unwrap_or("application/octet-stream")
            .to_string();
        let bytes = response.bytes().await.map_err(classify_transport)?;
        Ok(ImageBytes {
            bytes: bytes.to_vec(),
            content_type,
        })
    }
}

fn normalize(base_url: String) -> String {
    base_url.trim_end_matches('/').to_string()
}

/// Map an HTTP error status (and the server's `detail`, if any) to an [`ApiError`].
pub fn classify_status(status: StatusCode, detail: Option<String>) -> ApiError {
    match status {
        StatusCode::UNAUTHORIZED | StatusCode::FORBIDDEN => ApiError::Unauthorized,
        StatusCode::NOT_FOUND => ApiError::NotFound,
        StatusCode::BAD_REQUEST | StatusCode::CONFLICT | StatusCode::UNPROCESSABLE_ENTITY => {
            ApiError::ValidationRejected {
                detail: detail.unwrap_or_else(|| status.to_string()),
            }
        }
        _ => ApiError::ServerUnavailable,
    }
}

/// Map a reqwest transport error to an [`ApiError`].
fn classify_transport(err: reqwest::Error) -> ApiError {
    if err.is_decode() {
        tracing::warn!(error = %err, "undecodable response");
        return ApiError::ServerUnavailable;
    }
    tracing::warn!(error = %err, connect = err.is_connect(), timeout = err.is_timeout(), "request did not complete");
    ApiError::NetworkUnreachable
}

/// One `files` part per image, in order.
fn files_form(images: &[LocalImage]) -> Form {
    images
        .iter()
        .fold(Form::new(), |form, image| form.part("files", file_part(image)))
}

fn file_part(image: &LocalImage) -> Part {
    let part = || Part::bytes(image.bytes.clone()).file_name(image.file_name.clone());
    part().mime_str(&image.content_type).unwrap_or_else(|_| part())
}

#[async_trait]
impl Gateway for HttpGateway {
    async fn register(&self, registration: &Registration) -> Result<SubjectId, ApiError> {
        let body = RegisterRequest {
            name: registration.name(),
            email: registration.email(),
            password: registration.password(),
        };
        let response: RegisterResponse = self
            .json(self.client.post(self.url("/api/register")).json(&body))
            .await?;
        Ok(response.user_id)
    }

    async fn login(&self, credentials: &Credentials) -> Result<LoginGrant, ApiError> {
        let body = LoginRequest {
            email: &credentials.email,
            password: &credentials.password,
        };
        let response: LoginResponse = self
            .json(self.client.post(self.url("/api/login")).json(&body))
            .await?;
        Ok(LoginGrant {
            subject_id: response.user_id,
            display_name: response.name,
            has_enrolled_face: response.has_face_data,
        })
    }

    async fn enroll_face(&self, subject: SubjectId, samples: &[LocalImage]) -> Result<u32, ApiError> {
        let url = self.url(&format!("/api/enroll-face/{subject}"));
        tracing::debug!(%url, samples = samples.len(), "POST enroll-face");
        let response: EnrollResponse = self
            .json(self.client.post(url).multipart(files_form(samples)))
            .await?;
        Ok(response.enrolled_count)
    }

    async fn upload_photos(&self, batch: &UploadBatch) -> Result<Vec<PhotoId>, ApiError> {
        let mut form = files_form(&batch.images).text("uploaded_by", batch.uploader.to_string());
        if let Some(label) = &batch.event_label {
            form = form.text("event_name", label.clone());
        }
        tracing::debug!(photos = batch.images.len(), "POST upload-photos");
        let response: UploadResponse = self
            .json(self.client.post(self.url("/api/upload-photos")).multipart(form))
            .await?;
        Ok(response.photo_ids)
    }

    async fn process_photos(&self) -> Result<u32, ApiError> {
        let response: ProcessResponse = self
            .json(self.client.post(self.url("/api/process-photos")))
            .await?;
        Ok(response.processed_count)
    }

    async fn list_my_photos(&self, subject: SubjectId) -> Result<Vec<Photo>, ApiError> {
        let response: MyPhotosResponse = self
            .json(self.client.get(self.url(&format!("/api/my-photos/{subject}"))))
            .await?;
        Ok(response.photos.into_iter().map(Photo::from).collect())
    }

    async fn fetch_photo(&self, photo: PhotoId) -> Result<ImageBytes, ApiError> {
        self.image(self.client.get(self.url(&format!("/api/photo/{photo}"))))
            .await
    }

    async fn fetch_thumbnail(&self, photo: PhotoId) -> Result<ImageBytes, ApiError> {
        self.image(self.client.get(self.url(&format!("/api/thumbnail/{photo}"))))
            .await
    }

    async fn fetch_stats(&self) -> Result<StatsSnapshot, ApiError> {
        self.json(self.client.get(self.url("/api/stats"))).await
    }
}
