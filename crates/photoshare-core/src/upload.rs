//! Upload-and-process workflow.
//!
//! `idle → validating → uploading → remote-processing → succeeded | failed`
//!
//! The two remote phases are not atomic. When the upload succeeds and the
//! processing trigger fails, the photos stay stored on the server; the run
//! ends `Failed` with [`WorkflowError::ProcessingIncomplete`] carrying the
//! uploaded ids, and [`UploadWorkflow::retry_processing`] re-runs only the
//! trigger.

use std::cell::RefCell;

use crate::error::{ApiError, WorkflowError};
use crate::gateway::{Gateway, UploadBatch};
use crate::session::{KeyValueStore, SessionStore};
use crate::types::{LocalImage, PhotoId};
use crate::workflow::{Phase, WorkflowRun};

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct UploadOutcome {
    /// Photos stored by the upload phase (empty for a standalone retry).
    pub uploaded: Vec<PhotoId>,
    /// Photos the server processed, across all uploaders.
    pub processed_count: u32,
    /// New matches may now be visible in any enrolled user's gallery.
    pub gallery_may_have_changed: bool,
}

pub struct UploadWorkflow {
    run: WorkflowRun,
    uploaded: RefCell<Vec<PhotoId>>,
}

impl Default for UploadWorkflow {
    fn default() -> Self {
        Self::new()
    }
}

impl UploadWorkflow {
    pub fn new() -> Self {
        Self {
            run: WorkflowRun::new("upload"),
            uploaded: RefCell::new(Vec::new()),
        }
    }

    pub fn run(&self) -> &WorkflowRun {
        &self.run
    }

    pub fn phase(&self) -> Phase {
        self.run.phase()
    }

    /// Ids stored by the last upload phase and not yet processed.
    pub fn uploaded(&self) -> Vec<PhotoId> {
        self.uploaded.borrow().clone()
    }

    pub fn uploaded_count(&self) -> usize {
        self.uploaded.borrow().len()
    }

    /// True when photos are stored but the last processing attempt failed.
    pub fn is_partial(&self) -> bool {
        self.phase() == Phase::Failed
            && matches!(self.run.error(), Some(WorkflowError::ProcessingIncomplete { .. }))
    }

    /// Reject an empty selection; otherwise leave the run in `Validating`.
    pub fn validate(&self, files: &[LocalImage]) -> Result<(), WorkflowError> {
        self.run.ensure_not_in_flight()?;
        self.run.advance(Phase::Validating)?;
        if files.is_empty() {
            return Err(self.run.fail(Phase::Idle, WorkflowError::EmptySelection));
        }
        Ok(())
    }

    /// Upload `files` for the signed-in user, then trigger processing.
    pub async fn upload_and_process<G, S>(
        &self,
        gateway: &G,
        session: &RefCell<SessionStore<S>>,
        files: Vec<LocalImage>,
        event_label: Option<String>,
    ) -> Result<UploadOutcome, WorkflowError>
    where
        G: Gateway + ?Sized,
        S: KeyValueStore,
    {
        self.run.ensure_not_in_flight()?;
        let uploader = session
            .borrow()
            .identity()
            .map(|i| i.subject_id)
            .ok_or(WorkflowError::NotSignedIn)?;
        self.validate(&files)?;

        let event_label = event_label
            .map(|label| label.trim().to_string())
            .filter(|label| !label.is_empty());
        let batch = UploadBatch {
            uploader,
            images: files,
            event_label,
        };

        self.run.advance(Phase::Uploading)?;
        self.uploaded.replace(Vec::new());
        tracing::info!(
            %uploader,
            count = batch.images.len(),
            event = batch.event_label.as_deref().unwrap_or(""),
            "upload: sending photos"
        );
        let result = gateway.upload_photos(&batch).await;
        drop(batch);

        let ids = match result {
            Ok(ids) => ids,
            Err(e) => {
                tracing::warn!(%uploader, error = %e, "upload: failed, nothing stored");
                return Err(self.run.fail(Phase::Failed, e.into()));
            }
        };
        tracing::info!(%uploader, uploaded = ids.len(), "upload: stored");
        self.uploaded.replace(ids);

        self.run.advance(Phase::RemoteProcessing)?;
        self.process(gateway).await
    }

    /// Re-run only the server-wide processing trigger.
    pub async fn retry_processing<G>(&self, gateway: &G) -> Result<UploadOutcome, WorkflowError>
    where
        G: Gateway + ?Sized,
    {
        self.run.ensure_not_in_flight()?;
        if self.phase() == Phase::Validating {
            // A checked selection that was never sent is abandoned.
            self.run.reset();
        }
        self.run.advance(Phase::RemoteProcessing)?;
        tracing::info!(pending_from_last_upload = self.uploaded_count(), "upload: retrying processing");
        self.process(gateway).await
    }

    async fn process<G>(&self, gateway: &G) -> Result<UploadOutcome, WorkflowError>
    where
        G: Gateway + ?Sized,
    {
        let result = gateway.process_photos().await;
        match result {
            Ok(processed_count) => {
                // Processed ids no longer belong to a partial outcome.
                let uploaded = self.uploaded.take();
                self.run.advance(Phase::Succeeded)?;
                tracing::info!(uploaded = uploaded.len(), processed_count, "upload: processing complete");
                Ok(UploadOutcome {
                    uploaded,
                    processed_count,
                    gallery_may_have_changed: true,
                })
            }
            Err(source) => {
                let uploaded = self.uploaded();
                tracing::warn!(
                    uploaded = uploaded.len(),
                    error = %source,
                    "upload: processing failed; photos remain stored"
                );
                Err(self.run.fail(Phase::Failed, partial_or_remote(uploaded, source)))
            }
        }
    }
}

fn partial_or_remote(uploaded: Vec<PhotoId>, source: ApiError) -> WorkflowError {
    if uploaded.is_empty() {
        WorkflowError::Remote(source)
    } else {
        WorkflowError::ProcessingIncomplete { uploaded, source }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::session::MemoryStore;
    use crate::testing::{images, Calls, FakeGateway};
    use crate::types::{Identity, SubjectId};

    fn uploader(id: i64) -> RefCell<SessionStore<MemoryStore>> {
        let mut store = SessionStore::new(MemoryStore::new());
        store
            .save(Identity {
                subject_id: SubjectId(id),
                display_name: "Uploader".into(),
                contact_handle: "up@x.com".into(),
                has_enrolled_face: false,
            })
            .unwrap();
        RefCell::new(store)
    }

    #[tokio::test]
    async fn test_empty_selection_rejected_locally() {
        let gw = FakeGateway::new();
        let workflow = UploadWorkflow::new();

        let err = workflow
            .upload_and_process(&gw, &uploader(42), vec![], None)
            .await
            .unwrap_err();

        assert_eq!(err, WorkflowError::EmptySelection);
        assert_eq!(workflow.phase(), Phase::Idle);
        assert_eq!(Calls::get(&gw.calls.upload), 0);
        assert_eq!(Calls::get(&gw.calls.process), 0);
    }

    #[tokio::test]
    async fn test_requires_sign_in() {
        let gw = FakeGateway::new();
        let workflow = UploadWorkflow::new();
        let session = RefCell::new(SessionStore::new(MemoryStore::new()));

        let err = workflow
            .upload_and_process(&gw, &session, images(2), None)
            .await
            .unwrap_err();
        assert_eq!(err, WorkflowError::NotSignedIn);
        assert_eq!(Calls::get(&gw.calls.upload), 0);
    }

    #[tokio::test]
    async fn test_both_phases_succeed() {
        let gw = FakeGateway::new();
        let workflow = UploadWorkflow::new();

        let outcome = workflow
            .upload_and_process(&gw, &uploader(42), images(5), Some("Picnic".into()))
            .await
            .unwrap();

        assert_eq!(outcome.uploaded.len(), 5);
        assert_eq!(outcome.processed_count, 5);
        assert!(outcome.gallery_may_have_changed);
        assert_eq!(workflow.phase(), Phase::Succeeded);
        assert_eq!(gw.pending(), 0);
    }

    #[tokio::test]
    async fn test_upload_failure_never_triggers_processing() {
        for error in [
            ApiError::Unauthorized,
            ApiError::ValidationRejected { detail: "bad".into() },
            ApiError::NotFound,
            ApiError::ServerUnavailable,
            ApiError::NetworkUnreachable,
        ] {
            let gw = FakeGateway::new();
            gw.fail_upload(error.clone());
            let workflow = UploadWorkflow::new();

            let err = workflow
                .upload_and_process(&gw, &uploader(42), images(3), None)
                .await
                .unwrap_err();

            assert_eq!(err, WorkflowError::Remote(error));
            assert_eq!(workflow.phase(), Phase::Failed);
            assert_eq!(workflow.uploaded_count(), 0);
            assert!(!workflow.is_partial());
            assert_eq!(Calls::get(&gw.calls.process), 0);
        }
    }

    #[tokio::test]
    async fn test_processing_failure_is_partial_outcome() {
        let gw = FakeGateway::new();
        gw.fail_process(ApiError::ServerUnavailable);
        let workflow = UploadWorkflow::new();

        let err = workflow
            .upload_and_process(&gw, &uploader(42), images(3), None)
            .await
            .unwrap_err();

        match &err {
            WorkflowError::ProcessingIncomplete { uploaded, source } => {
                assert_eq!(uploaded.len(), 3);
                assert_eq!(source, &ApiError::ServerUnavailable);
            }
            other => panic!("expected partial outcome, got {other:?}"),
        }
        assert_eq!(workflow.phase(), Phase::Failed);
        assert_eq!(workflow.uploaded_count(), 3);
        assert!(workflow.is_partial());
        assert_eq!(gw.pending(), 3);
    }

    #[tokio::test]
    async fn test_retry_processing_without_reupload() {
        let gw = FakeGateway::new();
        gw.fail_process(ApiError::NetworkUnreachable);
        let workflow = UploadWorkflow::new();
        let session = uploader(42);

        assert!(workflow
            .upload_and_process(&gw, &session, images(3), None)
            .await
            .is_err());

        let outcome = workflow.retry_processing(&gw).await.unwrap();
        assert_eq!(outcome.uploaded.len(), 3);
        assert_eq!(outcome.processed_count, 3);
        assert_eq!(workflow.phase(), Phase::Succeeded);
        assert_eq!(Calls::get(&gw.calls.upload), 1);
        assert_eq!(Calls::get(&gw.calls.process), 2);
    }

    #[tokio::test]
    async fn test_retry_without_prior_upload_reports_remote_error() {
        let gw = FakeGateway::new();
        gw.fail_process(ApiError::ServerUnavailable);
        let workflow = UploadWorkflow::new();

        let err = workflow.retry_processing(&gw).await.unwrap_err();
        assert_eq!(err, WorkflowError::Remote(ApiError::ServerUnavailable));
    }

    #[tokio::test]
    async fn test_retry_after_success_is_not_partial() {
        let gw = FakeGateway::new();
        let workflow = UploadWorkflow::new();
        workflow
            .upload_and_process(&gw, &uploader(42), images(3), None)
            .await
            .unwrap();
        assert_eq!(workflow.uploaded_count(), 0);

        let outcome = workflow.retry_processing(&gw).await.unwrap();
        assert!(outcome.uploaded.is_empty());
        assert_eq!(outcome.processed_count, 0);

        gw.fail_process(ApiError::ServerUnavailable);
        let err = workflow.retry_processing(&gw).await.unwrap_err();
        assert_eq!(err, WorkflowError::Remote(ApiError::ServerUnavailable));
        assert!(!workflow.is_partial());
    }

    #[tokio::test]
    async fn test_retry_after_validate_abandons_selection() {
        let gw = FakeGateway::new();
        let workflow = UploadWorkflow::new();
        workflow.validate(&images(2)).unwrap();
        assert_eq!(workflow.phase(), Phase::Validating);

        let outcome = workflow.retry_processing(&gw).await.unwrap();
        assert_eq!(outcome.processed_count, 0);
        assert_eq!(workflow.phase(), Phase::Succeeded);
        assert_eq!(Calls::get(&gw.calls.upload), 0);
    }

    #[tokio::test]
    async fn test_single_flight() {
        let gw = FakeGateway::new();
        let workflow = UploadWorkflow::new();
        let session = uploader(42);

        let (first, second, retry) = tokio::join!(
            workflow.upload_and_process(&gw, &session, images(2), None),
            workflow.upload_and_process(&gw, &session, images(4), None),
            workflow.retry_processing(&gw),
        );

        assert_eq!(first.unwrap().uploaded.len(), 2);
        assert_eq!(second, Err(WorkflowError::Busy));
        assert_eq!(retry, Err(WorkflowError::Busy));
        assert_eq!(Calls::get(&gw.calls.upload), 1);
        assert_eq!(Calls::get(&gw.calls.process), 1);
    }

    #[tokio::test]
    async fn test_blank_event_label_is_dropped() {
        let gw = FakeGateway::new();
        gw.recognize(SubjectId(42));
        let workflow = UploadWorkflow::new();
        workflow
            .upload_and_process(&gw, &uploader(42), images(1), Some("   ".into()))
            .await
            .unwrap();

        let photos = gw.list_my_photos(SubjectId(42)).await.unwrap();
        assert_eq!(photos.len(), 1);
        assert_eq!(photos[0].event_label, None);
    }
}
