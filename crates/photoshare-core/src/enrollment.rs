//! Enrollment workflow: stage 3–5 face samples, submit them, record success.
//!
//! `idle → validating → submitting → succeeded | failed`

use std::cell::RefCell;
use std::ops::RangeInclusive;
use std::rc::Rc;

use crate::error::WorkflowError;
use crate::gateway::Gateway;
use crate::preview::{PreviewHandle, PreviewRegistry};
use crate::session::{KeyValueStore, SessionStore};
use crate::types::LocalImage;
use crate::workflow::{Phase, WorkflowRun};

/// Accepted batch sizes.
pub const SAMPLE_COUNT: RangeInclusive<usize> = 3..=5;

/// Staged samples and the preview handles that belong to them.
///
/// Dropping the batch releases its previews.
#[derive(Debug)]
pub struct EnrollmentBatch {
    images: Vec<LocalImage>,
    previews: Vec<PreviewHandle>,
}

impl EnrollmentBatch {
    pub fn len(&self) -> usize {
        self.images.len()
    }

    pub fn is_empty(&self) -> bool {
        self.images.is_empty()
    }

    pub fn images(&self) -> &[LocalImage] {
        &self.images
    }

    pub fn previews(&self) -> &[PreviewHandle] {
        &self.previews
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct EnrollOutcome {
    pub enrolled_count: u32,
}

pub struct EnrollmentWorkflow {
    run: WorkflowRun,
    registry: Rc<PreviewRegistry>,
    batch: RefCell<Option<EnrollmentBatch>>,
}

impl Default for EnrollmentWorkflow {
    fn default() -> Self {
        Self::new(PreviewRegistry::new())
    }
}

impl EnrollmentWorkflow {
    pub fn new(registry: Rc<PreviewRegistry>) -> Self {
        Self {
            run: WorkflowRun::new("enrollment"),
            registry,
            batch: RefCell::new(None),
        }
    }

    pub fn run(&self) -> &WorkflowRun {
        &self.run
    }

    pub fn phase(&self) -> Phase {
        self.run.phase()
    }

    pub fn registry(&self) -> &Rc<PreviewRegistry> {
        &self.registry
    }

    /// Number of samples currently staged.
    pub fn staged(&self) -> usize {
        self.batch.borrow().as_ref().map_or(0, EnrollmentBatch::len)
    }

    /// Preview URIs of the staged samples, in selection order.
    pub fn preview_uris(&self) -> Vec<String> {
        self.batch
            .borrow()
            .as_ref()
            .map(|b| b.previews.iter().map(|p| p.uri().to_string()).collect())
            .unwrap_or_default()
    }

    /// Stage a new selection, replacing (and releasing) any previous one.
    ///
    /// A count outside 3..=5 drops back to `Idle` with `InvalidSampleCount`.
    pub fn select_samples(&self, files: Vec<LocalImage>) -> Result<usize, WorkflowError> {
        self.run.ensure_not_in_flight()?;
        self.run.advance(Phase::Validating)?;

        let count = files.len();
        if !SAMPLE_COUNT.contains(&count) {
            self.batch.replace(None);
            return Err(self
                .run
                .fail(Phase::Idle, WorkflowError::InvalidSampleCount { count }));
        }

        let previews = files
            .iter()
            .map(|f| self.registry.acquire(&f.file_name))
            .collect();
        self.batch.replace(Some(EnrollmentBatch {
            images: files,
            previews,
        }));
        tracing::debug!(count, "enroll: samples staged");
        Ok(count)
    }

    /// Submit the staged samples for the signed-in subject.
    ///
    /// The batch is consumed either way; a failed run needs a new selection.
    pub async fn submit<G, S>(
        &self,
        gateway: &G,
        session: &RefCell<SessionStore<S>>,
    ) -> Result<EnrollOutcome, WorkflowError>
    where
        G: Gateway + ?Sized,
        S: KeyValueStore,
    {
        self.run.ensure_not_in_flight()?;
        let subject = session
            .borrow()
            .identity()
            .map(|i| i.subject_id)
            .ok_or(WorkflowError::NotSignedIn)?;
        if self.run.phase() != Phase::Validating {
            return Err(WorkflowError::NoSamplesSelected);
        }
        let batch = self
            .batch
            .borrow_mut()
            .take()
            .ok_or(WorkflowError::NoSamplesSelected)?;

        self.run.advance(Phase::Submitting)?;
        tracing::info!(%subject, samples = batch.len(), "enroll: submitting");
        let result = gateway.enroll_face(subject, batch.images()).await;
        drop(batch);

        match result {
            Ok(enrolled_count) => {
                if let Err(e) = session.borrow_mut().mark_enrolled() {
                    tracing::warn!(error = %e, "enroll: could not persist enrollment flag");
                }
                self.run.advance(Phase::Succeeded)?;
                tracing::info!(%subject, enrolled_count, "enroll: succeeded");
                Ok(EnrollOutcome { enrolled_count })
            }
            Err(e) => {
                tracing::warn!(%subject, error = %e, "enroll: rejected");
                Err(self.run.fail(Phase::Failed, e.into()))
            }
        }
    }

    /// Leave enrollment pending. Drops any staged batch. Ignored while submitting.
    pub fn skip(&self) {
        if self.run.is_in_flight() {
            return;
        }
        self.batch.replace(None);
        self.run.reset();
    }
}
