//! Storage module contracts.
//!
//! Each trait is one storage module of the facade. Operation names and parameter
//! order are mirrored by `cache::catalog`, which the cache policy table is
//! validated against.

use std::sync::Arc;

use async_trait::async_trait;
use serde::{Deserialize, Serialize};
use thiserror::Error;
use uuid::Uuid;

use crate::application::pagination::{PageResult, Paging};
use crate::domain::entities::{
    Existence, FeedRecord, FeedSources, FeedUpdate, FollowSplit, PostStats, PostViewerState,
    SessionRecord, TopicStats, UserPrivateStats, UserPublicStats,
};
use crate::domain::types::{Difficulty, TrendingWindow};

#[derive(Debug, Error)]
pub enum RepoError {
    #[error("persistence error: {0}")]
    Persistence(String),
    #[error("storage unavailable: {0}")]
    Unavailable(String),
    #[error("duplicate record violates unique constraint `{constraint}`")]
    Duplicate { constraint: String },
    #[error("resource not found")]
    NotFound,
    #[error("invalid input: {message}")]
    InvalidInput { message: String },
    #[error("integrity error: {message}")]
    Integrity { message: String },
    #[error("database timeout")]
    Timeout,
    #[error("transaction already finished")]
    TransactionClosed,
}

impl RepoError {
    pub fn from_persistence(err: impl std::fmt::Display) -> Self {
        Self::Persistence(err.to_string())
    }

    pub fn is_connectivity(&self) -> bool {
        matches!(self, RepoError::Unavailable(_) | RepoError::Timeout)
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct CreateUserParams {
    pub email: String,
    pub name: String,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct CreatePostParams {
    pub author_id: Uuid,
    pub title: String,
    pub description: Option<String>,
    pub difficulty: Option<Difficulty>,
    pub topics: Vec<String>,
}

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct PostSearchFilter {
    pub topics: Option<Vec<String>>,
    pub difficulty: Option<Difficulty>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct CreateFeedParams {
    pub owner_id: Uuid,
    pub name: String,
    pub position: i32,
    pub topics: Vec<String>,
    pub authors: Vec<Uuid>,
}

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct UpdateFeedParams {
    pub name: Option<String>,
    pub topics: Option<Vec<String>>,
    pub authors: Option<Vec<Uuid>>,
}

/// Selection for feed-style post listings, ordered by score descending.
///
/// A post matches when its author is in `authors` or it shares a topic with
/// `topics`. `match_all` drops both criteria.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct PostMatchQuery {
    pub topics: Vec<String>,
    pub authors: Vec<Uuid>,
    pub match_all: bool,
    pub unseen_by: Option<Uuid>,
    pub exclude_author: Option<Uuid>,
    pub limit: i64,
}

#[async_trait]
pub trait UserStore: Send + Sync {
    async fn create(&self, params: &CreateUserParams) -> Result<Uuid, RepoError>;

    async fn is_followed_by_user(&self, user_id: Uuid, follower_id: Uuid)
    -> Result<bool, RepoError>;

    async fn follow(&self, follower_id: Uuid, user_id: Uuid) -> Result<(), RepoError>;

    async fn unfollow(&self, follower_id: Uuid, user_id: Uuid) -> Result<(), RepoError>;

    async fn exists_by_username(&self, name: &str) -> Result<bool, RepoError>;

    async fn exist(&self, user_ids: &[Uuid]) -> Result<Existence<Uuid>, RepoError>;

    async fn followed_authors(&self, follower_id: Uuid) -> Result<Vec<Uuid>, RepoError>;
}

#[async_trait]
pub trait PostStore: Send + Sync {
    async fn create(&self, params: &CreatePostParams) -> Result<Uuid, RepoError>;

    async fn delete(&self, post_id: Uuid) -> Result<Uuid, RepoError>;

    /// Insert or replace the rating a user gave a post.
    async fn rate(&self, post_id: Uuid, user_id: Uuid, rating: i32) -> Result<(), RepoError>;

    async fn view(&self, post_id: Uuid, user_id: Uuid) -> Result<(), RepoError>;

    async fn has_viewed(&self, post_id: Uuid, user_id: Uuid) -> Result<bool, RepoError>;

    async fn exists(&self, post_id: Uuid) -> Result<bool, RepoError>;
}

#[async_trait]
pub trait PostStatsStore: Send + Sync {
    async fn by_id(&self, post_id: Uuid) -> Result<Option<PostStats>, RepoError>;

    async fn search(
        &self,
        query: Option<&str>,
        paging: Paging,
        filter: &PostSearchFilter,
    ) -> Result<PageResult<PostStats>, RepoError>;

    async fn trending(
        &self,
        window: TrendingWindow,
        topics: Option<&[String]>,
    ) -> Result<Vec<PostStats>, RepoError>;

    async fn published_by_user(
        &self,
        user_id: Uuid,
        paging: Paging,
    ) -> Result<PageResult<PostStats>, RepoError>;

    async fn saved_by_user(
        &self,
        user_id: Uuid,
        paging: Paging,
    ) -> Result<PageResult<PostStats>, RepoError>;

    async fn viewer_state(
        &self,
        post_id: Uuid,
        user_id: Uuid,
    ) -> Result<PostViewerState, RepoError>;

    async fn matching(&self, query: &PostMatchQuery) -> Result<Vec<PostStats>, RepoError>;
}

#[async_trait]
pub trait UserStatsStore: Send + Sync {
    async fn public_by_id(&self, user_id: Uuid) -> Result<Option<UserPublicStats>, RepoError>;

    async fn private_by_id(&self, user_id: Uuid) -> Result<Option<UserPrivateStats>, RepoError>;

    async fn followers(
        &self,
        user_id: Uuid,
        paging: Paging,
    ) -> Result<PageResult<UserPublicStats>, RepoError>;

    async fn follows(
        &self,
        user_id: Uuid,
        paging: Paging,
    ) -> Result<PageResult<UserPublicStats>, RepoError>;

    /// Authors ordered by score. `ranking_position` is the persisted global one.
    async fn ranking(
        &self,
        topic_id: Option<&str>,
        paging: Paging,
    ) -> Result<PageResult<UserPublicStats>, RepoError>;

    async fn search(
        &self,
        query: Option<&str>,
        paging: Paging,
    ) -> Result<PageResult<UserPublicStats>, RepoError>;

    async fn are_followed_by(
        &self,
        user_ids: &[Uuid],
        follower_id: Uuid,
    ) -> Result<FollowSplit<Uuid>, RepoError>;

    /// Best scored author per topic, in topic order.
    async fn top_author_per_topic(
        &self,
        topic_ids: &[String],
    ) -> Result<Vec<UserPublicStats>, RepoError>;
}

#[async_trait]
pub trait TopicStore: Send + Sync {
    async fn follow(&self, topic_id: &str, follower_id: Uuid) -> Result<(), RepoError>;

    async fn unfollow(&self, topic_id: &str, follower_id: Uuid) -> Result<(), RepoError>;

    async fn is_followed_by_user(&self, topic_id: &str, user_id: Uuid)
    -> Result<bool, RepoError>;

    async fn exist(&self, topic_ids: &[String]) -> Result<Existence<String>, RepoError>;

    async fn followed_topics(&self, user_id: Uuid) -> Result<Vec<String>, RepoError>;
}

#[async_trait]
pub trait TopicStatsStore: Send + Sync {
    async fn search(
        &self,
        query: Option<&str>,
        paging: Paging,
    ) -> Result<PageResult<TopicStats>, RepoError>;

    async fn by_id(&self, topic_id: &str) -> Result<Option<TopicStats>, RepoError>;

    async fn followed_by_user(
        &self,
        user_id: Uuid,
        paging: Paging,
    ) -> Result<PageResult<TopicStats>, RepoError>;

    async fn are_followed_by(
        &self,
        topic_ids: &[String],
        user_id: Uuid,
    ) -> Result<FollowSplit<String>, RepoError>;

    async fn random(&self, count: i64) -> Result<Vec<TopicStats>, RepoError>;
}

#[async_trait]
pub trait FeedStore: Send + Sync {
    async fn by_id(&self, feed_id: Uuid) -> Result<Option<FeedRecord>, RepoError>;

    async fn create(&self, params: &CreateFeedParams) -> Result<FeedRecord, RepoError>;

    async fn delete(&self, feed_id: Uuid) -> Result<FeedRecord, RepoError>;

    async fn update(
        &self,
        feed_id: Uuid,
        params: &UpdateFeedParams,
    ) -> Result<FeedUpdate, RepoError>;

    /// Highest position among the owner's feeds, 0 when there are none.
    async fn max_position(&self, owner_id: Uuid) -> Result<i32, RepoError>;

    async fn position(&self, feed_id: Uuid) -> Result<Option<i32>, RepoError>;

    async fn set_position(&self, feed_id: Uuid, position: i32) -> Result<(), RepoError>;

    async fn authors(&self, feed_id: Uuid) -> Result<Vec<UserPublicStats>, RepoError>;

    async fn topics(&self, feed_id: Uuid) -> Result<Vec<TopicStats>, RepoError>;

    async fn by_owner(&self, owner_id: Uuid) -> Result<Vec<FeedRecord>, RepoError>;

    async fn sources(&self, feed_id: Uuid) -> Result<Option<FeedSources>, RepoError>;
}

#[async_trait]
pub trait MeStore: Send + Sync {
    async fn delete(&self, user_id: Uuid) -> Result<Uuid, RepoError>;

    async fn update_name(&self, user_id: Uuid, name: &str) -> Result<(), RepoError>;

    async fn update_profile_picture(&self, user_id: Uuid, image_url: &str)
    -> Result<(), RepoError>;

    async fn has_completed_signup(&self, user_id: Uuid) -> Result<bool, RepoError>;

    async fn complete_signup(&self, user_id: Uuid) -> Result<(), RepoError>;

    async fn exists_in_saved_posts(&self, user_id: Uuid, post_id: Uuid)
    -> Result<bool, RepoError>;

    async fn add_to_saved_posts(&self, user_id: Uuid, post_id: Uuid) -> Result<(), RepoError>;

    async fn delete_from_saved_posts(&self, user_id: Uuid, post_id: Uuid)
    -> Result<(), RepoError>;
}

#[async_trait]
pub trait AuthStore: Send + Sync {
    async fn create_session(&self, user_id: Uuid) -> Result<SessionRecord, RepoError>;

    async fn delete_session(&self, session_id: Uuid) -> Result<SessionRecord, RepoError>;
}

/// The full set of storage modules bound to one connection scope.
#[derive(Clone)]
pub struct StorageModules {
    pub user: Arc<dyn UserStore>,
    pub post: Arc<dyn PostStore>,
    pub post_stats: Arc<dyn PostStatsStore>,
    pub user_stats: Arc<dyn UserStatsStore>,
    pub topic: Arc<dyn TopicStore>,
    pub topic_stats: Arc<dyn TopicStatsStore>,
    pub feed: Arc<dyn FeedStore>,
    pub me: Arc<dyn MeStore>,
    pub auth: Arc<dyn AuthStore>,
}
