//! photoshare-core — client-side workflows for the photo sharing service.
//!
//! Sequences face enrollment, bulk upload, server-side processing and gallery
//! retrieval against a remote [`Gateway`], keeping the signed-in identity in a
//! durable [`SessionStore`].

pub mod account;
pub mod controller;
pub mod enrollment;
pub mod error;
pub mod gallery;
pub mod gateway;
pub mod preview;
pub mod session;
pub mod types;
pub mod upload;
pub mod workflow;

#[cfg(test)]
pub(crate) mod testing;

pub use account::Registration;
pub use controller::Controller;
pub use error::{ApiError, DownloadError, StoreError, WorkflowError};
pub use gateway::{Gateway, UploadBatch};
pub use session::{FileStore, KeyValueStore, MemoryStore, SessionStore};
pub use types::{
    Credentials, Identity, ImageBytes, LocalImage, LoginGrant, Photo, PhotoId, StatsSnapshot,
    SubjectId,
};
pub use workflow::Phase;
