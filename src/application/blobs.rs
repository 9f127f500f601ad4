//! Binary content storage contract for post pages and profile pictures.

use async_trait::async_trait;
use bytes::Bytes;
use thiserror::Error;
use uuid::Uuid;

use crate::domain::entities::PageDescriptor;

#[derive(Debug, Error)]
pub enum BlobError {
    #[error("blob io error at `{path}`: {source}")]
    Io {
        path: String,
        #[source]
        source: std::io::Error,
    },
    #[error("unsupported content type `{0}`")]
    UnsupportedType(String),
    #[error("stored page `{0}` could not be decoded")]
    Corrupted(String),
}

/// One uploaded page as received from the caller.
#[derive(Debug, Clone)]
pub struct PageUpload {
    pub content_type: String,
    pub bytes: Bytes,
}

impl PageUpload {
    pub fn new(content_type: impl Into<String>, bytes: impl Into<Bytes>) -> Self {
        Self {
            content_type: content_type.into(),
            bytes: bytes.into(),
        }
    }

    pub fn size(&self) -> usize {
        self.bytes.len()
    }
}

#[derive(Debug, Clone)]
pub struct ImageUpload {
    pub content_type: String,
    pub bytes: Bytes,
}

impl ImageUpload {
    pub fn new(content_type: impl Into<String>, bytes: impl Into<Bytes>) -> Self {
        Self {
            content_type: content_type.into(),
            bytes: bytes.into(),
        }
    }

    pub fn size(&self) -> usize {
        self.bytes.len()
    }
}

#[async_trait]
pub trait BlobStore: Send + Sync {
    /// Store pages in order and describe them as they will be listed back.
    async fn upload_post_pages(
        &self,
        post_id: Uuid,
        pages: &[PageUpload],
    ) -> Result<Vec<PageDescriptor>, BlobError>;

    /// `None` when the post has no stored pages.
    async fn post_pages(&self, post_id: Uuid) -> Result<Option<Vec<PageDescriptor>>, BlobError>;

    async fn delete_post_pages(&self, post_id: Uuid) -> Result<(), BlobError>;

    /// Store the picture, replacing any previous one, and return its URL.
    async fn upload_profile_picture(
        &self,
        user_id: Uuid,
        image: &ImageUpload,
    ) -> Result<String, BlobError>;

    fn profile_picture_url(&self, user_id: Uuid) -> String;
}
