//! Scripted in-memory gateway for workflow tests.

use std::collections::{HashMap, HashSet};
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::Mutex;

use async_trait::async_trait;

use crate::account::Registration;
use crate::error::ApiError;
use crate::gateway::{Gateway, UploadBatch};
use crate::types::{
    Credentials, ImageBytes, LocalImage, LoginGrant, Photo, PhotoId, StatsSnapshot, SubjectId,
};

struct User {
    id: SubjectId,
    name: String,
    password: String,
    enrolled: bool,
}

struct StoredPhoto {
    id: PhotoId,
    event_label: Option<String>,
    processed: bool,
    matched: Vec<SubjectId>,
}

#[derive(Default)]
struct State {
    users: HashMap<String, User>,
    photos: Vec<StoredPhoto>,
    next_user: i64,
    next_photo: i64,
}

#[derive(Default)]
pub struct Calls {
    pub register: AtomicUsize,
    pub login: AtomicUsize,
    pub enroll: AtomicUsize,
    pub upload: AtomicUsize,
    pub process: AtomicUsize,
    pub list: AtomicUsize,
    pub photo: AtomicUsize,
    pub thumbnail: AtomicUsize,
    pub stats: AtomicUsize,
}

impl Calls {
    pub fn get(counter: &AtomicUsize) -> usize {
        counter.load(Ordering::SeqCst)
    }
}

#[derive(Default)]
pub struct FakeGateway {
    pub calls: Calls,
    state: Mutex<State>,
    /// Subjects the fake "recognizes" in every processed photo.
    faces_in_photos: Mutex<Vec<SubjectId>>,
    enroll_error: Mutex<Option<ApiError>>,
    upload_error: Mutex<Option<ApiError>>,
    process_errors: Mutex<Vec<ApiError>>,
    broken_thumbnails: Mutex<HashSet<PhotoId>>,
}

impl FakeGateway {
    pub fn new() -> Self {
        let gateway = Self::default();
        gateway.lock().next_user = 1;
        gateway.lock().next_photo = 1;
        gateway
    }

    fn lock(&self) -> std::sync::MutexGuard<'_, State> {
        self.state.lock().unwrap()
    }

    pub fn with_user(self, id: i64, name: &str, email: &str, password: &str) -> Self {
        self.lock().users.insert(
            email.to_string(),
            User {
                id: SubjectId(id),
                name: name.to_string(),
                password: password.to_string(),
                enrolled: false,
            },
        );
        self
    }

    pub fn recognize(&self, subject: SubjectId) {
        self.faces_in_photos.lock().unwrap().push(subject);
    }

    pub fn fail_enroll(&self, error: ApiError) {
        *self.enroll_error.lock().unwrap() = Some(error);
    }

    pub fn fail_upload(&self, error: ApiError) {
        *self.upload_error.lock().unwrap() = Some(error);
    }

    /// Fail the next process call; queued errors are consumed in order.
    pub fn fail_process(&self, error: ApiError) {
        self.process_errors.lock().unwrap().push(error);
    }

    pub fn break_thumbnail(&self, photo: PhotoId) {
        self.broken_thumbnails.lock().unwrap().insert(photo);
    }

    pub fn is_enrolled(&self, email: &str) -> bool {
        self.lock().users.get(email).is_some_and(|u| u.enrolled)
    }

    pub fn pending(&self) -> usize {
        self.lock().photos.iter().filter(|p| !p.processed).count()
    }
}

fn bump(counter: &AtomicUsize) {
    counter.fetch_add(1, Ordering::SeqCst);
}

#[async_trait]
impl Gateway for FakeGateway {
    async fn register(&self, registration: &Registration) -> Result<SubjectId, ApiError> {
        bump(&self.calls.register);
        tokio::task::yield_now().await;
        let mut state = self.lock();
        if state.users.contains_key(registration.email()) {
            return Err(ApiError::ValidationRejected {
                detail: "Email already registered".into(),
            });
        }
        let id = SubjectId(state.next_user);
        state.next_user += 1;
        state.users.insert(
            registration.email().to_string(),
            User {
                id,
                name: registration.name().to_string(),
                password: registration.password().to_string(),
                enrolled: false,
            },
        );
        Ok(id)
    }

    async fn login(&self, credentials: &Credentials) -> Result<LoginGrant, ApiError> {
        bump(&self.calls.login);
        tokio::task::yield_now().await;
        let state = self.lock();
        match state.users.get(&credentials.email) {
            Some(user) if user.password == credentials.password => Ok(LoginGrant {
                subject_id: user.id,
                display_name: user.name.clone(),
                has_enrolled_face: user.enrolled,
            }),
            _ => Err(ApiError::Unauthorized),
        }
    }

    async fn enroll_face(&self, subject: SubjectId, samples: &[LocalImage]) -> Result<u32, ApiError> {
        bump(&self.calls.enroll);
        tokio::task::yield_now().await;
        if let Some(error) = self.enroll_error.lock().unwrap().clone() {
            return Err(error);
        }
        let mut state = self.lock();
        let user = state
            .users
            .values_mut()
            .find(|u| u.id == subject)
            .ok_or(ApiError::NotFound)?;
        user.enrolled = true;
        Ok(samples.len() as u32)
    }

    async fn upload_photos(&self, batch: &UploadBatch) -> Result<Vec<PhotoId>, ApiError> {
        bump(&self.calls.upload);
        tokio::task::yield_now().await;
        if let Some(error) = self.upload_error.lock().unwrap().clone() {
            return Err(error);
        }
        let mut state = self.lock();
        let mut ids = Vec::with_capacity(batch.images.len());
        for _ in &batch.images {
            let id = PhotoId(state.next_photo);
            state.next_photo += 1;
            state.photos.push(StoredPhoto {
                id,
                event_label: batch.event_label.clone(),
                processed: false,
                matched: Vec::new(),
            });
            ids.push(id);
        }
        Ok(ids)
    }

    async fn process_photos(&self) -> Result<u32, ApiError> {
        bump(&self.calls.process);
        tokio::task::yield_now().await;
        {
            let mut errors = self.process_errors.lock().unwrap();
            if !errors.is_empty() {
                return Err(errors.remove(0));
            }
        }
        let faces = self.faces_in_photos.lock().unwrap().clone();
        let mut state = self.lock();
        let mut processed = 0;
        for photo in state.photos.iter_mut().filter(|p| !p.processed) {
            photo.processed = true;
            photo.matched = faces.clone();
            processed += 1;
        }
        Ok(processed)
    }

    async fn list_my_photos(&self, subject: SubjectId) -> Result<Vec<Photo>, ApiError> {
        bump(&self.calls.list);
        tokio::task::yield_now().await;
        let state = self.lock();
        Ok(state
            .photos
            .iter()
            .filter(|p| p.matched.contains(&subject))
            .map(|p| Photo {
                id: p.id,
                event_label: p.event_label.clone(),
                has_thumbnail: true,
                has_full_image: true,
                uploaded_at: None,
            })
            .collect())
    }

    async fn fetch_photo(&self, photo: PhotoId) -> Result<ImageBytes, ApiError> {
        bump(&self.calls.photo);
        tokio::task::yield_now().await;
        if !self.lock().photos.iter().any(|p| p.id == photo) {
            return Err(ApiError::NotFound);
        }
        Ok(ImageBytes {
            bytes: format!("full-{photo}").into_bytes(),
            content_type: "image/png".into(),
        })
    }

    async fn fetch_thumbnail(&self, photo: PhotoId) -> Result<ImageBytes, ApiError> {
        bump(&self.calls.thumbnail);
        tokio::task::yield_now().await;
        if self.broken_thumbnails.lock().unwrap().contains(&photo) {
            return Err(ApiError::NotFound);
        }
        Ok(ImageBytes {
            bytes: format!("thumb-{photo}").into_bytes(),
            content_type: "image/jpeg".into(),
        })
    }

    async fn fetch_stats(&self) -> Result<StatsSnapshot, ApiError> {
        bump(&self.calls.stats);
        tokio::task::yield_now().await;
        let state = self.lock();
        let processed = state.photos.iter().filter(|p| p.processed).count() as u64;
        Ok(StatsSnapshot {
            total_users: state.users.len() as u64,
            total_photos: state.photos.len() as u64,
            processed_photos: processed,
            pending_photos: state.photos.len() as u64 - processed,
        })
    }
}

/// `n` small named images.
pub fn images(n: usize) -> Vec<LocalImage> {
    (0..n)
        .map(|i| LocalImage::new(format!("img{i}.jpg"), vec![0xff, 0xd8, i as u8]))
        .collect()
}
