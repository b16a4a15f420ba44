//! Wires the session store, the workflows and the gallery around one gateway.
//!
//! The session gates everything user-specific: enrollment, uploads and the
//! personal gallery all refuse with `NotSignedIn` before touching the network.

use std::cell::{Ref, RefCell};
use std::path::{Path, PathBuf};

use crate::account::Registration;
use crate::enrollment::{EnrollOutcome, EnrollmentWorkflow};
use crate::error::{ApiError, DownloadError, WorkflowError};
use crate::gallery::{Gallery, GalleryItem};
use crate::gateway::Gateway;
use crate::session::{KeyValueStore, SessionStore};
use crate::types::{Credentials, Identity, LocalImage, Photo, PhotoId, StatsSnapshot, SubjectId};
use crate::upload::{UploadOutcome, UploadWorkflow};

pub struct Controller<G, S> {
    gateway: G,
    session: RefCell<SessionStore<S>>,
    enrollment: EnrollmentWorkflow,
    upload: UploadWorkflow,
    gallery: Gallery,
}

impl<G: Gateway, S: KeyValueStore> Controller<G, S> {
    /// Build a controller and restore any persisted session from `store`.
    pub fn new(gateway: G, store: S) -> Self {
        let mut session = SessionStore::new(store);
        match session.load() {
            Some(identity) => tracing::info!(
                subject = %identity.subject_id,
                enrolled = identity.has_enrolled_face,
                "session restored"
            ),
            None => tracing::debug!("no saved session"),
        }
        Self {
            gateway,
            session: RefCell::new(session),
            enrollment: EnrollmentWorkflow::default(),
            upload: UploadWorkflow::new(),
            gallery: Gallery::new(),
        }
    }

    pub fn gateway(&self) -> &G {
        &self.gateway
    }

    pub fn session(&self) -> Ref<'_, SessionStore<S>> {
        self.session.borrow()
    }

    pub fn identity(&self) -> Option<Identity> {
        self.session.borrow().identity().cloned()
    }

    pub fn enrollment(&self) -> &EnrollmentWorkflow {
        &self.enrollment
    }

    pub fn upload(&self) -> &UploadWorkflow {
        &self.upload
    }

    pub fn gallery(&self) -> &Gallery {
        &self.gallery
    }

    fn subject(&self) -> Result<SubjectId, WorkflowError> {
        self.session
            .borrow()
            .identity()
            .map(|i| i.subject_id)
            .ok_or(WorkflowError::NotSignedIn)
    }

    /// Register, then sign in with the same credentials.
    pub async fn sign_up(&self, registration: Registration) -> Result<Identity, WorkflowError> {
        let subject = self.gateway.register(&registration).await?;
        tracing::info!(%subject, "account: registered");
        self.sign_in(registration.credentials()).await
    }

    pub async fn sign_in(&self, credentials: Credentials) -> Result<Identity, WorkflowError> {
        let grant = self.gateway.login(&credentials).await.map_err(|e| {
            tracing::warn!(email = %credentials.email, error = %e, "account: login failed");
            e
        })?;
        let identity = Identity {
            subject_id: grant.subject_id,
            display_name: grant.display_name,
            contact_handle: credentials.email,
            has_enrolled_face: grant.has_enrolled_face,
        };

        if self.subject().ok() != Some(identity.subject_id) {
            self.enrollment.skip();
            self.gallery.clear();
        }
        self.session.borrow_mut().save(identity.clone())?;
        tracing::info!(subject = %identity.subject_id, "account: signed in");
        Ok(identity)
    }

    /// Forget the identity and any staged samples. Safe to repeat.
    pub fn sign_out(&self) -> Result<(), WorkflowError> {
        self.enrollment.skip();
        self.gallery.clear();
        self.session.borrow_mut().clear()?;
        tracing::info!("account: signed out");
        Ok(())
    }

    pub fn select_samples(&self, files: Vec<LocalImage>) -> Result<usize, WorkflowError> {
        self.enrollment.select_samples(files)
    }

    pub async fn enroll(&self) -> Result<EnrollOutcome, WorkflowError> {
        self.enrollment.submit(&self.gateway, &self.session).await
    }

    pub fn skip_enrollment(&self) {
        self.enrollment.skip();
    }

    pub async fn upload_and_process(
        &self,
        files: Vec<LocalImage>,
        event_label: Option<String>,
    ) -> Result<UploadOutcome, WorkflowError> {
        let result = self
            .upload
            .upload_and_process(&self.gateway, &self.session, files, event_label)
            .await;
        self.note_upload_result(&result);
        result
    }

    pub async fn retry_processing(&self) -> Result<UploadOutcome, WorkflowError> {
        let result = self.upload.retry_processing(&self.gateway).await;
        self.note_upload_result(&result);
        result
    }

    fn note_upload_result(&self, result: &Result<UploadOutcome, WorkflowError>) {
        if matches!(result, Ok(outcome) if outcome.gallery_may_have_changed) {
            self.gallery.invalidate();
        }
    }

    /// The signed-in user's matched photos.
    pub async fn my_photos(&self) -> Result<Vec<Photo>, WorkflowError> {
        let subject = self.subject()?;
        Ok(self.gallery.list_for_subject(&self.gateway, subject).await?)
    }

    pub async fn gallery_items(&self, photos: &[Photo]) -> Vec<GalleryItem> {
        self.gallery.thumbnails(&self.gateway, photos).await
    }

    pub async fn download(&self, photo: PhotoId, dir: &Path) -> Result<PathBuf, DownloadError> {
        self.gallery.download(&self.gateway, photo, dir).await
    }

    /// Always a fresh snapshot.
    pub async fn stats(&self) -> Result<StatsSnapshot, ApiError> {
        self.gateway.fetch_stats().await
    }
}
