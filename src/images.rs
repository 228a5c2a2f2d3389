//! Image File Store
//!
//! Sidecar image files live under one directory as `{post_id}.{ext}`.

use std::io;
use std::path::{Path, PathBuf};

use tracing::debug;

use crate::models::{ImageMime, PostId};

#[derive(Debug, Clone)]
pub struct ImageStore {
    root: PathBuf,
}

impl ImageStore {
    pub fn new(root: impl Into<PathBuf>) -> Self {
        Self { root: root.into() }
    }

    pub fn root(&self) -> &Path {
        &self.root
    }

    /// Path of the file backing a post's image.
    pub fn path_for(&self, id: PostId, mime: ImageMime) -> PathBuf {
        self.root.join(format!("{}.{}", id, mime.extension()))
    }

    /// Writes the image for `id`, replacing any existing file.
    pub async fn write(&self, id: PostId, mime: ImageMime, data: &[u8]) -> io::Result<()> {
        tokio::fs::create_dir_all(&self.root).await?;
        tokio::fs::write(self.path_for(id, mime), data).await
    }

    /// Writes the image for `id` only if no file exists yet.
    ///
    /// Returns `true` when a file was written.
    pub async fn materialize_if_missing(
        &self,
        id: PostId,
        mime: ImageMime,
        data: &[u8],
    ) -> io::Result<bool> {
        let path = self.path_for(id, mime);
        if tokio::fs::try_exists(&path).await? {
            return Ok(false);
        }
        self.write(id, mime, data).await?;
        debug!("Materialized image {}", path.display());
        Ok(true)
    }

    pub async fn read(&self, id: PostId, mime: ImageMime) -> io::Result<Vec<u8>> {
        tokio::fs::read(self.path_for(id, mime)).await
    }
}
