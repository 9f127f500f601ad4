//! Filesystem-backed blob storage for post pages and profile pictures.
//!
//! Layout under the root directory:
//!
//! ```text
//! <pages-bucket>/<post-id>/<index>-<unix-millis>.<extension>
//! <pictures-bucket>/<user-id>
//! ```
//!
//! URLs handed out mirror the layout: `/<bucket>/<relative path>`.

use std::path::{Path, PathBuf};

use async_trait::async_trait;
use time::OffsetDateTime;
use tokio::{fs, io::AsyncWriteExt};
use tracing::debug;
use uuid::Uuid;

use crate::{
    application::blobs::{BlobError, BlobStore, ImageUpload, PageUpload},
    domain::{
        constraints::{page_type_for_file_name, page_type_for_mime},
        entities::PageDescriptor,
        quiz::Quiz,
        types::PageKind,
    },
};

#[derive(Debug, Clone)]
pub struct DiskBlobStore {
    root: PathBuf,
    pages_bucket: String,
    pictures_bucket: String,
}

impl DiskBlobStore {
    /// Initialise storage rooted at the provided directory, creating both buckets.
    pub fn new(
        root: impl Into<PathBuf>,
        pages_bucket: impl Into<String>,
        pictures_bucket: impl Into<String>,
    ) -> Result<Self, BlobError> {
        let store = Self {
            root: root.into(),
            pages_bucket: pages_bucket.into(),
            pictures_bucket: pictures_bucket.into(),
        };
        for bucket in [&store.pages_bucket, &store.pictures_bucket] {
            let path = store.root.join(bucket);
            std::fs::create_dir_all(&path).map_err(|source| io_error(&path, source))?;
        }
        Ok(store)
    }

    fn post_dir(&self, post_id: Uuid) -> PathBuf {
        self.root.join(&self.pages_bucket).join(post_id.to_string())
    }

    fn picture_path(&self, user_id: Uuid) -> PathBuf {
        self.root
            .join(&self.pictures_bucket)
            .join(user_id.to_string())
    }

    fn page_url(&self, post_id: Uuid, file_name: &str) -> String {
        format!("/{}/{}/{}", self.pages_bucket, post_id, file_name)
    }

    async fn describe(
        &self,
        post_id: Uuid,
        path: &Path,
        file_name: &str,
    ) -> Result<PageDescriptor, BlobError> {
        let page_type = page_type_for_file_name(file_name)
            .ok_or_else(|| BlobError::Corrupted(file_name.to_string()))?;
        if page_type.kind == PageKind::Quiz {
            let bytes = fs::read(path).await.map_err(|source| io_error(path, source))?;
            let quiz =
                Quiz::parse(&bytes).map_err(|_| BlobError::Corrupted(file_name.to_string()))?;
            return Ok(PageDescriptor::Quiz { quiz });
        }
        Ok(PageDescriptor::Remote {
            kind: page_type.kind,
            remote_url: self.page_url(post_id, file_name),
        })
    }
}

#[async_trait]
impl BlobStore for DiskBlobStore {
    async fn upload_post_pages(
        &self,
        post_id: Uuid,
        pages: &[PageUpload],
    ) -> Result<Vec<PageDescriptor>, BlobError> {
        let dir = self.post_dir(post_id);
        fs::create_dir_all(&dir)
            .await
            .map_err(|source| io_error(&dir, source))?;

        let millis = OffsetDateTime::now_utc().unix_timestamp_nanos() / 1_000_000;
        let mut descriptors = Vec::with_capacity(pages.len());
        for (index, page) in pages.iter().enumerate() {
            let page_type = page_type_for_mime(&page.content_type)
                .ok_or_else(|| BlobError::UnsupportedType(page.content_type.clone()))?;
            let file_name = format!("{index}-{millis}.{}", page_type.extension);
            let path = dir.join(&file_name);
            write_file(&path, &page.bytes).await?;
            descriptors.push(self.describe(post_id, &path, &file_name).await?);
        }

        debug!(
            target: "agora::blobs",
            post_id = %post_id,
            pages = descriptors.len(),
            "stored post pages"
        );
        Ok(descriptors)
    }

    async fn post_pages(&self, post_id: Uuid) -> Result<Option<Vec<PageDescriptor>>, BlobError> {
        let dir = self.post_dir(post_id);
        let mut entries = match fs::read_dir(&dir).await {
            Ok(entries) => entries,
            Err(err) if err.kind() == std::io::ErrorKind::NotFound => return Ok(None),
            Err(source) => return Err(io_error(&dir, source)),
        };

        let mut files: Vec<(usize, String, PathBuf)> = Vec::new();
        while let Some(entry) = entries
            .next_entry()
            .await
            .map_err(|source| io_error(&dir, source))?
        {
            let file_name = entry.file_name().to_string_lossy().into_owned();
            let index = page_index(&file_name)
                .ok_or_else(|| BlobError::Corrupted(file_name.clone()))?;
            files.push((index, file_name, entry.path()));
        }
        if files.is_empty() {
            return Ok(None);
        }
        files.sort_by_key(|(index, _, _)| *index);

        let mut descriptors = Vec::with_capacity(files.len());
        for (_, file_name, path) in files {
            descriptors.push(self.describe(post_id, &path, &file_name).await?);
        }
        Ok(Some(descriptors))
    }

    async fn delete_post_pages(&self, post_id: Uuid) -> Result<(), BlobError> {
        let dir = self.post_dir(post_id);
        match fs::remove_dir_all(&dir).await {
            Ok(()) => Ok(()),
            Err(err) if err.kind() == std::io::ErrorKind::NotFound => Ok(()),
            Err(source) => Err(io_error(&dir, source)),
        }
    }

    async fn upload_profile_picture(
        &self,
        user_id: Uuid,
        image: &ImageUpload,
    ) -> Result<String, BlobError> {
        if !image.content_type.starts_with("image/") {
            return Err(BlobError::UnsupportedType(image.content_type.clone()));
        }
        write_file(&self.picture_path(user_id), &image.bytes).await?;
        Ok(self.profile_picture_url(user_id))
    }

    fn profile_picture_url(&self, user_id: Uuid) -> String {
        format!("/{}/{}", self.pictures_bucket, user_id)
    }
}

/// Leading page index of a stored page file name (`<index>-<millis>.<ext>`).
fn page_index(file_name: &str) -> Option<usize> {
    file_name.split_once('-')?.0.parse().ok()
}

async fn write_file(path: &Path, bytes: &[u8]) -> Result<(), BlobError> {
    let mut file = fs::File::create(path)
        .await
        .map_err(|source| io_error(path, source))?;
    file.write_all(bytes)
        .await
        .map_err(|source| io_error(path, source))?;
    file.flush().await.map_err(|source| io_error(path, source))
}

fn io_error(path: &Path, source: std::io::Error) -> BlobError {
    BlobError::Io {
        path: path.display().to_string(),
        source,
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use tempfile::tempdir;

    const QUIZ: &str = r#"{
        "name": "Borrowing",
        "questions": [{
            "title": "Who owns it?",
            "answers": [
                {"answer": "the caller", "isCorrect": true},
                {"answer": "nobody", "isCorrect": false}
            ]
        }]
    }"#;

    fn store(root: &Path) -> DiskBlobStore {
        DiskBlobStore::new(root, "post-pages", "profile-pictures").expect("create store")
    }

    #[tokio::test]
    async fn pages_are_listed_back_in_upload_order() {
        let dir = tempdir().expect("tempdir");
        let store = store(dir.path());
        let post_id = Uuid::new_v4();
        let pages: Vec<PageUpload> = (0..12)
            .map(|n| PageUpload::new("text/markdown", format!("# page {n}")))
            .collect();

        let uploaded = store
            .upload_post_pages(post_id, &pages)
            .await
            .expect("upload");
        let listed = store
            .post_pages(post_id)
            .await
            .expect("list")
            .expect("pages exist");

        assert_eq!(uploaded, listed);
        match &listed[10] {
            PageDescriptor::Remote { kind, remote_url } => {
                assert_eq!(*kind, PageKind::Markdown);
                assert!(remote_url.starts_with(&format!("/post-pages/{post_id}/10-")));
                assert!(remote_url.ends_with(".md"));
            }
            other => panic!("unexpected descriptor {other:?}"),
        }
    }

    #[tokio::test]
    async fn quiz_pages_are_inlined() {
        let dir = tempdir().expect("tempdir");
        let store = store(dir.path());
        let post_id = Uuid::new_v4();
        let pages = vec![
            PageUpload::new("application/pdf", b"%PDF-1.7".to_vec()),
            PageUpload::new("application/json+quiz", QUIZ),
        ];

        store
            .upload_post_pages(post_id, &pages)
            .await
            .expect("upload");
        let listed = store.post_pages(post_id).await.expect("list").expect("pages");

        assert_eq!(listed[0].kind(), PageKind::Pdf);
        match &listed[1] {
            PageDescriptor::Quiz { quiz } => assert_eq!(quiz.name, "Borrowing"),
            other => panic!("expected quiz, got {other:?}"),
        }
    }

    #[tokio::test]
    async fn unsupported_page_type_is_rejected() {
        let dir = tempdir().expect("tempdir");
        let store = store(dir.path());

        let err = store
            .upload_post_pages(Uuid::new_v4(), &[PageUpload::new("application/zip", "zip")])
            .await
            .expect_err("zip is not a page type");
        assert!(matches!(err, BlobError::UnsupportedType(mime) if mime == "application/zip"));
    }

    #[tokio::test]
    async fn missing_and_deleted_posts_have_no_pages() {
        let dir = tempdir().expect("tempdir");
        let store = store(dir.path());
        let post_id = Uuid::new_v4();

        assert!(store.post_pages(post_id).await.expect("list").is_none());

        store
            .upload_post_pages(post_id, &[PageUpload::new("image/png", vec![0x89, b'P'])])
            .await
            .expect("upload");
        store.delete_post_pages(post_id).await.expect("delete");
        store.delete_post_pages(post_id).await.expect("delete twice");

        assert!(store.post_pages(post_id).await.expect("list").is_none());
    }

    #[tokio::test]
    async fn profile_picture_replaces_previous_one() {
        let dir = tempdir().expect("tempdir");
        let store = store(dir.path());
        let user_id = Uuid::new_v4();

        let first = store
            .upload_profile_picture(user_id, &ImageUpload::new("image/png", vec![1, 2, 3]))
            .await
            .expect("first upload");
        let second = store
            .upload_profile_picture(user_id, &ImageUpload::new("image/jpeg", vec![4]))
            .await
            .expect("second upload");

        assert_eq!(first, second);
        assert_eq!(second, format!("/profile-pictures/{user_id}"));
        let stored = std::fs::read(dir.path().join("profile-pictures").join(user_id.to_string()))
            .expect("read picture");
        assert_eq!(stored, vec![4]);
    }

    #[tokio::test]
    async fn non_image_profile_picture_is_rejected() {
        let dir = tempdir().expect("tempdir");
        let store = store(dir.path());

        let err = store
            .upload_profile_picture(Uuid::new_v4(), &ImageUpload::new("text/plain", "hi"))
            .await
            .expect_err("text is not an image");
        assert!(matches!(err, BlobError::UnsupportedType(_)));
    }
}
