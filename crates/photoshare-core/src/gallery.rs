//! Gallery retrieval: the caller's matched photos and per-photo fetches.

use std::cell::{Cell, RefCell};
use std::path::{Path, PathBuf};

use crate::error::{ApiError, DownloadError};
use crate::gateway::Gateway;
use crate::types::{ImageBytes, Photo, PhotoId, SubjectId};

/// A thumbnail, or the marker shown when it could not be fetched.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Thumbnail {
    Image(ImageBytes),
    Placeholder,
}

impl Thumbnail {
    pub fn is_placeholder(&self) -> bool {
        matches!(self, Self::Placeholder)
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct GalleryItem {
    pub photo: Photo,
    pub thumbnail: Thumbnail,
}

#[derive(Default)]
pub struct Gallery {
    listed: RefCell<Vec<Photo>>,
    stale: Cell<bool>,
}

impl Gallery {
    pub fn new() -> Self {
        Self::default()
    }

    /// Photos matched to `subject`, in server order.
    pub async fn list_for_subject<G>(&self, gateway: &G, subject: SubjectId) -> Result<Vec<Photo>, ApiError>
    where
        G: Gateway + ?Sized,
    {
        let photos = gateway.list_my_photos(subject).await.map_err(|e| {
            tracing::warn!(%subject, error = %e, "gallery: listing failed");
            e
        })?;
        tracing::info!(%subject, count = photos.len(), "gallery: listed");
        self.listed.replace(photos.clone());
        self.stale.set(false);
        Ok(photos)
    }

    /// The most recent successful listing.
    pub fn listed(&self) -> Vec<Photo> {
        self.listed.borrow().clone()
    }

    /// Mark the listing out of date (new photos may have been matched).
    pub fn invalidate(&self) {
        self.stale.set(true);
    }

    pub fn is_stale(&self) -> bool {
        self.stale.get()
    }

    /// Drop the listing, e.g. when the user changes.
    pub fn clear(&self) {
        self.listed.replace(Vec::new());
        self.stale.set(false);
    }

    pub async fn fetch_full<G>(&self, gateway: &G, photo: PhotoId) -> Result<ImageBytes, ApiError>
    where
        G: Gateway + ?Sized,
    {
        gateway.fetch_photo(photo).await
    }

    /// Fetch one thumbnail. Any failure degrades to [`Thumbnail::Placeholder`].
    pub async fn fetch_thumbnail<G>(&self, gateway: &G, photo: PhotoId) -> Thumbnail
    where
        G: Gateway + ?Sized,
    {
        match gateway.fetch_thumbnail(photo).await {
            Ok(bytes) => Thumbnail::Image(bytes),
            Err(e) => {
                tracing::warn!(%photo, error = %e, "gallery: thumbnail unavailable, using placeholder");
                Thumbnail::Placeholder
            }
        }
    }

    /// One item per photo, in order. Photos without a thumbnail are not fetched.
    pub async fn thumbnails<G>(&self, gateway: &G, photos: &[Photo]) -> Vec<GalleryItem>
    where
        G: Gateway + ?Sized,
    {
        let mut items = Vec::with_capacity(photos.len());
        for photo in photos {
            let thumbnail = if photo.has_thumbnail {
                self.fetch_thumbnail(gateway, photo.id).await
            } else {
                Thumbnail::Placeholder
            };
            items.push(GalleryItem {
                photo: photo.clone(),
                thumbnail,
            });
        }
        items
    }

    /// Save the full image as `photo_{id}.{ext}` under `dir`.
    pub async fn download<G>(&self, gateway: &G, photo: PhotoId, dir: &Path) -> Result<PathBuf, DownloadError>
    where
        G: Gateway + ?Sized,
    {
        let image = self.fetch_full(gateway, photo).await?;
        let path = dir.join(format!("photo_{photo}.{}", image.extension()));

        let write = async {
            tokio::fs::create_dir_all(dir).await?;
            tokio::fs::write(&path, &image.bytes).await
        };
        if let Err(source) = write.await {
            tracing::warn!(%photo, path = %path.display(), error = %source, "gallery: download not saved");
            return Err(DownloadError::Write { path, source });
        }

        tracing::info!(%photo, path = %path.display(), bytes = image.bytes.len(), "gallery: downloaded");
        Ok(path)
    }
}
