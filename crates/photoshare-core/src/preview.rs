//! Preview handles for selected images.
//!
//! A handle is acquired when a sample is selected and released when it is
//! dropped, so replacing, submitting or abandoning a batch releases every
//! handle exactly once. The registry only tracks which handles are live.

use std::cell::{Cell, RefCell};
use std::collections::HashSet;
use std::rc::Rc;

use uuid::Uuid;

#[derive(Debug, Default)]
pub struct PreviewRegistry {
    live: RefCell<HashSet<Uuid>>,
    released: Cell<usize>,
}

impl PreviewRegistry {
    pub fn new() -> Rc<Self> {
        Rc::new(Self::default())
    }

    /// Acquire a handle for the image called `file_name`.
    pub fn acquire(self: &Rc<Self>, file_name: &str) -> PreviewHandle {
        let id = Uuid::new_v4();
        self.live.borrow_mut().insert(id);
        tracing::trace!(%id, file_name, "preview acquired");
        PreviewHandle {
            id,
            uri: format!("preview:{id}/{file_name}"),
            registry: Rc::clone(self),
        }
    }

    /// Number of handles acquired and not yet released.
    pub fn live(&self) -> usize {
        self.live.borrow().len()
    }

    /// Total handles released over the registry's lifetime.
    pub fn released(&self) -> usize {
        self.released.get()
    }

    fn release(&self, id: Uuid) {
        let removed = self.live.borrow_mut().remove(&id);
        debug_assert!(removed, "preview {id} released twice");
        if removed {
            self.released.set(self.released.get() + 1);
            tracing::trace!(%id, "preview released");
        }
    }
}

/// Scoped preview resource. Released on drop.
#[derive(Debug)]
pub struct PreviewHandle {
    id: Uuid,
    uri: String,
    registry: Rc<PreviewRegistry>,
}

impl PreviewHandle {
    pub fn id(&self) -> Uuid {
        self.id
    }

    pub fn uri(&self) -> &str {
        &self.uri
    }
}

impl Drop for PreviewHandle {
    fn drop(&mut self) {
        self.registry.release(self.id);
    }
}
