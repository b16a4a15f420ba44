//! Shared state machine for the enrollment and upload-and-process workflows.
//!
//! Runs are driven from a single thread: every transition is synchronous and
//! happens between awaits, so a plain `Cell` is enough to gate concurrent
//! attempts. A run that is in flight rejects a second attempt with
//! [`WorkflowError::Busy`].

use std::cell::{Cell, RefCell};
use std::fmt;

use crate::error::WorkflowError;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Phase {
    Idle,
    /// A selection is being checked, or has been accepted and awaits submission.
    Validating,
    /// Enrollment samples are on the wire.
    Submitting,
    /// Event photos are on the wire.
    Uploading,
    /// The server-side processing trigger is running.
    RemoteProcessing,
    Succeeded,
    Failed,
}

impl Phase {
    /// Phases during which a network call is outstanding.
    pub fn is_in_flight(self) -> bool {
        matches!(self, Self::Submitting | Self::Uploading | Self::RemoteProcessing)
    }

    pub fn is_terminal(self) -> bool {
        matches!(self, Self::Succeeded | Self::Failed)
    }

    fn can_advance_to(self, next: Phase) -> bool {
        use Phase::*;
        match (self, next) {
            (_, Idle) => !self.is_in_flight(),
            (Idle | Validating | Succeeded | Failed, Validating) => true,
            (Validating, Submitting | Uploading) => true,
            (Uploading, RemoteProcessing) => true,
            // Retrying the processing trigger on its own.
            (Idle | Succeeded | Failed, RemoteProcessing) => true,
            (Submitting | Uploading | RemoteProcessing, Succeeded | Failed) => true,
            (Validating, Failed) => true,
            _ => false,
        }
    }
}

impl fmt::Display for Phase {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let name = match self {
            Self::Idle => "idle",
            Self::Validating => "validating",
            Self::Submitting => "submitting",
            Self::Uploading => "uploading",
            Self::RemoteProcessing => "remote-processing",
            Self::Succeeded => "succeeded",
            Self::Failed => "failed",
        };
        f.write_str(name)
    }
}

/// One workflow's current run: its phase and the last error, if any.
pub struct WorkflowRun {
    name: &'static str,
    phase: Cell<Phase>,
    error: RefCell<Option<WorkflowError>>,
}

impl WorkflowRun {
    pub fn new(name: &'static str) -> Self {
        Self {
            name,
            phase: Cell::new(Phase::Idle),
            error: RefCell::new(None),
        }
    }

    pub fn phase(&self) -> Phase {
        self.phase.get()
    }

    pub fn error(&self) -> Option<WorkflowError> {
        self.error.borrow().clone()
    }

    pub fn is_in_flight(&self) -> bool {
        self.phase().is_in_flight()
    }

    /// Reject with `Busy` while a network call is outstanding.
    pub fn ensure_not_in_flight(&self) -> Result<(), WorkflowError> {
        if self.is_in_flight() {
            tracing::debug!(workflow = self.name, phase = %self.phase(), "rejected: run in flight");
            return Err(WorkflowError::Busy);
        }
        Ok(())
    }

    /// Move to `next`. Entering a non-failed phase clears the previous error.
    ///
    /// An illegal transition is refused with `Busy` while a call is in flight
    /// and with `IllegalTransition` otherwise.
    pub fn advance(&self, next: Phase) -> Result<(), WorkflowError> {
        let current = self.phase();
        if !current.can_advance_to(next) {
            if current.is_in_flight() {
                return Err(WorkflowError::Busy);
            }
            tracing::warn!(workflow = self.name, from = %current, to = %next, "illegal transition");
            return Err(WorkflowError::IllegalTransition { from: current, to: next });
        }
        tracing::debug!(workflow = self.name, from = %current, to = %next, "transition");
        self.phase.set(next);
        if next != Phase::Failed {
            self.error.replace(None);
        }
        Ok(())
    }

    /// Record `error` and move to `to` (`Failed`, or `Idle` for local rejections).
    pub fn fail(&self, to: Phase, error: WorkflowError) -> WorkflowError {
        debug_assert!(matches!(to, Phase::Failed | Phase::Idle));
        tracing::debug!(workflow = self.name, from = %self.phase(), to = %to, error = %error, "run failed");
        self.phase.set(to);
        self.error.replace(Some(error.clone()));
        error
    }

    /// Return to `Idle` without side effects. Ignored while in flight.
    pub fn reset(&self) {
        if self.is_in_flight() {
            return;
        }
        self.phase.set(Phase::Idle);
        self.error.replace(None);
    }

    #[cfg(test)]
    pub(crate) fn force(&self, phase: Phase) {
        self.phase.set(phase);
    }
}
