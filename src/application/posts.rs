use std::sync::Arc;

use futures::TryFutureExt;
use serde::Serialize;
use tracing::info;
use uuid::Uuid;

use crate::{
    application::{
        blobs::{BlobStore, PageUpload},
        error::ServiceError,
        pagination::{PageResult, Paging},
        repos::{CreatePostParams, PostSearchFilter},
        storage::DataStorage,
        timing::timed,
        users::ensure_user_exists,
        validation::{
            Report, char_length, count_within, has_repetitions, optional_char_length,
            parse_optional_uuid, parse_uuid, search_query, topic_ids,
        },
    },
    domain::{
        constraints::{
            page_type_for_mime,
            posts::{DESCRIPTION_CHARS, MAX_FILE_SIZE_BYTES, PAGES, RATING, TITLE_CHARS, TOPICS},
            topics::NAME_CHARS as TOPIC_NAME_CHARS,
        },
        entities::{Existence, PageDescriptor, PostMyInfo, PostStats},
        error::DomainError,
        quiz::Quiz,
        types::{Difficulty, PageKind, TrendingWindow},
    },
};

#[derive(Debug, Clone)]
pub struct CreatePostInput {
    pub title: String,
    pub description: Option<String>,
    pub difficulty: Option<Difficulty>,
    pub topics: Vec<String>,
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct CreatedPost {
    pub id: Uuid,
    pub pages: Vec<PageDescriptor>,
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct PostDetails {
    pub metadata: PostMyInfo,
    pub pages: Option<Vec<PageDescriptor>>,
}

#[derive(Clone)]
pub struct PostService {
    storage: DataStorage,
    blobs: Arc<dyn BlobStore>,
}

impl PostService {
    pub fn new(storage: DataStorage, blobs: Arc<dyn BlobStore>) -> Self {
        Self { storage, blobs }
    }

    /// Publish a post. Content checks run before anything is written; the
    /// record and its pages are stored in one transaction.
    pub async fn create(
        &self,
        author: &str,
        input: CreatePostInput,
        pages: Vec<PageUpload>,
    ) -> Result<CreatedPost, ServiceError> {
        timed("PostService.create", async {
            let params = validate_new_post(author, input)?;
            if has_repetitions(&params.topics) {
                return Err(DomainError::RepeatedTopics.into());
            }

            self.storage
                .transaction(|tx| async move {
                    if let Existence::Missing(missing) = tx.topic().exist(&params.topics).await? {
                        return Err(DomainError::topics_not_found(&missing).into());
                    }
                    check_pages(&pages)?;
                    ensure_user_exists(&tx, params.author_id).await?;

                    let id = tx.post().create(&params).await?;
                    let pages = self.blobs.upload_post_pages(id, &pages).await?;
                    info!(post_id = %id, pages = pages.len(), "post created");
                    Ok::<_, ServiceError>(CreatedPost { id, pages })
                })
                .await
        })
        .await
    }

    /// Remove a post. Its record and stored pages are deleted concurrently.
    pub async fn delete(&self, post: &str, caller: &str) -> Result<Uuid, ServiceError> {
        timed("PostService.delete", async {
            let post = parse_uuid("postId", post)?;
            let caller = parse_uuid("userId", caller)?;
            self.storage
                .transaction(|tx| async move {
                    let stats = tx
                        .post_stats()
                        .by_id(post)
                        .await?
                        .ok_or(DomainError::PostNotFound)?;
                    if stats.author.id != caller {
                        return Err(DomainError::OnlyOwnerCanPerform.into());
                    }
                    let (deleted, ()) = futures::try_join!(
                        tx.post().delete(post).err_into::<ServiceError>(),
                        self.blobs.delete_post_pages(post).err_into::<ServiceError>(),
                    )?;
                    Ok::<_, ServiceError>(deleted)
                })
                .await
        })
        .await
    }

    pub async fn rate(&self, post: &str, caller: &str, rating: i32) -> Result<(), ServiceError> {
        timed("PostService.rate", async {
            let mut report = Report::new("rating");
            let post = report.uuid("postId", post);
            let caller = report.uuid("userId", caller);
            report.field(
                "rating",
                if RATING.contains(&rating) {
                    Ok(())
                } else {
                    Err(format!(
                        "must be between {} and {}",
                        RATING.start(),
                        RATING.end()
                    ))
                },
            );
            let (post, caller) = report.finish_with(post.zip(caller))?;

            self.storage
                .transaction(|tx| async move {
                    let stats = tx
                        .post_stats()
                        .by_id(post)
                        .await?
                        .ok_or(DomainError::PostNotFound)?;
                    if stats.author.id == caller {
                        return Err(DomainError::CannotRateOwnPost.into());
                    }
                    Ok(tx.post().rate(post, caller, rating).await?)
                })
                .await
        })
        .await
    }

    /// Record that `caller` read the post. A post counts once per reader.
    pub async fn view(&self, post: &str, caller: &str) -> Result<(), ServiceError> {
        timed("PostService.view", async {
            let post = parse_uuid("postId", post)?;
            let caller = parse_uuid("userId", caller)?;
            self.storage
                .transaction(|tx| async move {
                    if !tx.post().exists(post).await?
                        || matches!(tx.user().exist(&[caller]).await?, Existence::Missing(_))
                    {
                        return Err(DomainError::PostNotFound.into());
                    }
                    if tx.post().has_viewed(post, caller).await? {
                        return Err(DomainError::PostAlreadyViewed.into());
                    }
                    Ok(tx.post().view(post, caller).await?)
                })
                .await
        })
        .await
    }

    pub async fn by_id(
        &self,
        post: &str,
        with_pages: bool,
        me: Option<&str>,
    ) -> Result<PostDetails, ServiceError> {
        timed("PostService.by_id", async {
            let post = parse_uuid("postId", post)?;
            let me = parse_optional_uuid("me", me)?;
            self.storage
                .transaction(|tx| async move {
                    let stats = tx
                        .post_stats()
                        .by_id(post)
                        .await?
                        .ok_or(DomainError::PostNotFound)?;
                    let metadata = match me {
                        Some(me) => {
                            let state = tx.post_stats().viewer_state(post, me).await?;
                            PostMyInfo::for_viewer(stats, state)
                        }
                        None => PostMyInfo::anonymous(stats),
                    };
                    let pages = if with_pages {
                        let pages = self
                            .blobs
                            .post_pages(post)
                            .await?
                            .ok_or(DomainError::PostPagesNotFound)?;
                        Some(pages)
                    } else {
                        None
                    };
                    Ok::<_, ServiceError>(PostDetails { metadata, pages })
                })
                .await
        })
        .await
    }

    pub async fn search(
        &self,
        query: Option<&str>,
        paging: Paging,
        filter: PostSearchFilter,
    ) -> Result<PageResult<PostStats>, ServiceError> {
        timed("PostService.search", async {
            let query = query.map(str::trim);
            search_query("post search", query)?;
            self.storage
                .transaction(|tx| async move {
                    Ok(tx.post_stats().search(query, paging, &filter).await?)
                })
                .await
        })
        .await
    }

    pub async fn from_user(
        &self,
        user: &str,
        paging: Paging,
    ) -> Result<PageResult<PostStats>, ServiceError> {
        timed("PostService.from_user", async {
            let user = parse_uuid("userId", user)?;
            self.storage
                .transaction(|tx| async move {
                    ensure_user_exists(&tx, user).await?;
                    Ok(tx.post_stats().published_by_user(user, paging).await?)
                })
                .await
        })
        .await
    }

    /// Best scored posts of the window, optionally restricted to some topics.
    pub async fn trending(
        &self,
        window: TrendingWindow,
        topics: Option<Vec<String>>,
    ) -> Result<Vec<PostStats>, ServiceError> {
        timed("PostService.trending", async {
            let topics = topics
                .as_deref()
                .map(|topics| topic_ids("topics", topics))
                .transpose()?;
            self.storage
                .transaction(|tx| async move {
                    Ok(tx.post_stats().trending(window, topics.as_deref()).await?)
                })
                .await
        })
        .await
    }
}

fn validate_new_post(author: &str, input: CreatePostInput) -> Result<CreatePostParams, ServiceError> {
    let title = input.title.trim().to_string();
    let description = input
        .description
        .map(|description| description.trim().to_string())
        .filter(|description| !description.is_empty());
    let topics: Vec<String> = input
        .topics
        .iter()
        .map(|topic| topic.trim().to_string())
        .collect();

    let mut report = Report::new("post");
    let author_id = report.uuid("authorId", author);
    report
        .field("title", char_length(&title, &TITLE_CHARS))
        .field(
            "description",
            optional_char_length(description.as_deref(), &DESCRIPTION_CHARS),
        )
        .field("topics", count_within(&topics, &TOPICS));
    for topic in &topics {
        report.field("topics", char_length(topic, &TOPIC_NAME_CHARS));
    }
    let author_id = report.finish_with(author_id)?;

    Ok(CreatePostParams {
        author_id,
        title,
        description,
        difficulty: input.difficulty,
        topics,
    })
}

/// Page count, then per page: type, size and quiz schema.
fn check_pages(pages: &[PageUpload]) -> Result<(), DomainError> {
    if !PAGES.contains(&pages.len()) {
        return Err(DomainError::PostPagesConstraint);
    }
    for page in pages {
        let file_type =
            page_type_for_mime(&page.content_type).ok_or_else(|| DomainError::InvalidFileType {
                mime: page.content_type.clone(),
            })?;
        if page.size() > MAX_FILE_SIZE_BYTES {
            return Err(DomainError::ExceededMaxFileSize { size: page.size() });
        }
        if file_type.kind == PageKind::Quiz {
            Quiz::parse(&page.bytes)?;
        }
    }
    Ok(())
}
