//! Storage module decorators routing every call through the cache layer.

use std::sync::Arc;

use async_trait::async_trait;
use uuid::Uuid;

use crate::{
    application::{
        pagination::{PageResult, Paging},
        repos::{
            AuthStore, CreateFeedParams, CreatePostParams, CreateUserParams, FeedStore, MeStore,
            PostMatchQuery, PostSearchFilter, PostStatsStore, PostStore, RepoError,
            StorageModules, TopicStatsStore, TopicStore, UpdateFeedParams, UserStatsStore,
            UserStore,
        },
    },
    domain::{
        entities::{
            Existence, FeedRecord, FeedSources, FeedUpdate, FollowSplit, PostStats,
            PostViewerState, SessionRecord, TopicStats, UserPrivateStats, UserPublicStats,
        },
        types::TrendingWindow,
    },
};

use super::{
    catalog::{auth, feed, me, post, post_stats, topic, topic_stats, user, user_stats},
    keys::arg,
    layer::CacheLayer,
};

pub(crate) fn wrap(cache: &CacheLayer, modules: StorageModules) -> StorageModules {
    StorageModules {
        user: Arc::new(CachedUserStore {
            inner: modules.user,
            cache: cache.clone(),
        }),
        post: Arc::new(CachedPostStore {
            inner: modules.post,
            cache: cache.clone(),
        }),
        post_stats: Arc::new(CachedPostStatsStore {
            inner: modules.post_stats,
            cache: cache.clone(),
        }),
        user_stats: Arc::new(CachedUserStatsStore {
            inner: modules.user_stats,
            cache: cache.clone(),
        }),
        topic: Arc::new(CachedTopicStore {
            inner: modules.topic,
            cache: cache.clone(),
        }),
        topic_stats: Arc::new(CachedTopicStatsStore {
            inner: modules.topic_stats,
            cache: cache.clone(),
        }),
        feed: Arc::new(CachedFeedStore {
            inner: modules.feed,
            cache: cache.clone(),
        }),
        me: Arc::new(CachedMeStore {
            inner: modules.me,
            cache: cache.clone(),
        }),
        auth: Arc::new(CachedAuthStore {
            inner: modules.auth,
            cache: cache.clone(),
        }),
    }
}

struct CachedUserStore {
    inner: Arc<dyn UserStore>,
    cache: CacheLayer,
}

#[async_trait]
impl UserStore for CachedUserStore {
    async fn create(&self, params: &CreateUserParams) -> Result<Uuid, RepoError> {
        self.cache
            .intercept(user::CREATE, &[arg(params)], self.inner.create(params))
            .await
    }

    async fn is_followed_by_user(
        &self,
        user_id: Uuid,
        follower_id: Uuid,
    ) -> Result<bool, RepoError> {
        self.cache
            .intercept(
                user::IS_FOLLOWED_BY_USER,
                &[arg(&user_id), arg(&follower_id)],
                self.inner.is_followed_by_user(user_id, follower_id),
            )
            .await
    }

    async fn follow(&self, follower_id: Uuid, user_id: Uuid) -> Result<(), RepoError> {
        self.cache
            .intercept(
                user::FOLLOW,
                &[arg(&follower_id), arg(&user_id)],
                self.inner.follow(follower_id, user_id),
            )
            .await
    }

    async fn unfollow(&self, follower_id: Uuid, user_id: Uuid) -> Result<(), RepoError> {
        self.cache
            .intercept(
                user::UNFOLLOW,
                &[arg(&follower_id), arg(&user_id)],
                self.inner.unfollow(follower_id, user_id),
            )
            .await
    }

    async fn exists_by_username(&self, name: &str) -> Result<bool, RepoError> {
        self.cache
            .intercept(
                user::EXISTS_BY_USERNAME,
                &[arg(name)],
                self.inner.exists_by_username(name),
            )
            .await
    }

    async fn exist(&self, user_ids: &[Uuid]) -> Result<Existence<Uuid>, RepoError> {
        self.cache
            .intercept(user::EXIST, &[arg(user_ids)], self.inner.exist(user_ids))
            .await
    }

    async fn followed_authors(&self, follower_id: Uuid) -> Result<Vec<Uuid>, RepoError> {
        self.cache
            .intercept(
                user::FOLLOWED_AUTHORS,
                &[arg(&follower_id)],
                self.inner.followed_authors(follower_id),
            )
            .await
    }
}

struct CachedPostStore {
    inner: Arc<dyn PostStore>,
    cache: CacheLayer,
}

#[async_trait]
impl PostStore for CachedPostStore {
    async fn create(&self, params: &CreatePostParams) -> Result<Uuid, RepoError> {
        self.cache
            .intercept(post::CREATE, &[arg(params)], self.inner.create(params))
            .await
    }

    async fn delete(&self, post_id: Uuid) -> Result<Uuid, RepoError> {
        self.cache
            .intercept(post::DELETE, &[arg(&post_id)], self.inner.delete(post_id))
            .await
    }

    async fn rate(&self, post_id: Uuid, user_id: Uuid, rating: i32) -> Result<(), RepoError> {
        self.cache
            .intercept(
                post::RATE,
                &[arg(&post_id), arg(&user_id), arg(&rating)],
                self.inner.rate(post_id, user_id, rating),
            )
            .await
    }

    async fn view(&self, post_id: Uuid, user_id: Uuid) -> Result<(), RepoError> {
        self.cache
            .intercept(
                post::VIEW,
                &[arg(&post_id), arg(&user_id)],
                self.inner.view(post_id, user_id),
            )
            .await
    }

    async fn has_viewed(&self, post_id: Uuid, user_id: Uuid) -> Result<bool, RepoError> {
        self.cache
            .intercept(
                post::HAS_VIEWED,
                &[arg(&post_id), arg(&user_id)],
                self.inner.has_viewed(post_id, user_id),
            )
            .await
    }

    async fn exists(&self, post_id: Uuid) -> Result<bool, RepoError> {
        self.cache
            .intercept(post::EXISTS, &[arg(&post_id)], self.inner.exists(post_id))
            .await
    }
}

struct CachedPostStatsStore {
    inner: Arc<dyn PostStatsStore>,
    cache: CacheLayer,
}

#[async_trait]
impl PostStatsStore for CachedPostStatsStore {
    async fn by_id(&self, post_id: Uuid) -> Result<Option<PostStats>, RepoError> {
        self.cache
            .intercept(post_stats::BY_ID, &[arg(&post_id)], self.inner.by_id(post_id))
            .await
    }

    async fn search(
        &self,
        query: Option<&str>,
        paging: Paging,
        filter: &PostSearchFilter,
    ) -> Result<PageResult<PostStats>, RepoError> {
        self.cache
            .intercept(
                post_stats::SEARCH,
                &[arg(&query), arg(&paging), arg(filter)],
                self.inner.search(query, paging, filter),
            )
            .await
    }

    async fn trending(
        &self,
        window: TrendingWindow,
        topics: Option<&[String]>,
    ) -> Result<Vec<PostStats>, RepoError> {
        self.cache
            .intercept(
                post_stats::TRENDING,
                &[arg(&window), arg(&topics)],
                self.inner.trending(window, topics),
            )
            .await
    }

    async fn published_by_user(
        &self,
        user_id: Uuid,
        paging: Paging,
    ) -> Result<PageResult<PostStats>, RepoError> {
        self.cache
            .intercept(
                post_stats::PUBLISHED_BY_USER,
                &[arg(&user_id), arg(&paging)],
                self.inner.published_by_user(user_id, paging),
            )
            .await
    }

    async fn saved_by_user(
        &self,
        user_id: Uuid,
        paging: Paging,
    ) -> Result<PageResult<PostStats>, RepoError> {
        self.cache
            .intercept(
                post_stats::SAVED_BY_USER,
                &[arg(&user_id), arg(&paging)],
                self.inner.saved_by_user(user_id, paging),
            )
            .await
    }

    async fn viewer_state(
        &self,
        post_id: Uuid,
        user_id: Uuid,
    ) -> Result<PostViewerState, RepoError> {
        self.cache
            .intercept(
                post_stats::VIEWER_STATE,
                &[arg(&post_id), arg(&user_id)],
                self.inner.viewer_state(post_id, user_id),
            )
            .await
    }

    async fn matching(&self, query: &PostMatchQuery) -> Result<Vec<PostStats>, RepoError> {
        self.cache
            .intercept(post_stats::MATCHING, &[arg(query)], self.inner.matching(query))
            .await
    }
}

struct CachedUserStatsStore {
    inner: Arc<dyn UserStatsStore>,
    cache: CacheLayer,
}

#[async_trait]
impl UserStatsStore for CachedUserStatsStore {
    async fn public_by_id(&self, user_id: Uuid) -> Result<Option<UserPublicStats>, RepoError> {
        self.cache
            .intercept(
                user_stats::PUBLIC_BY_ID,
                &[arg(&user_id)],
                self.inner.public_by_id(user_id),
            )
            .await
    }

    async fn private_by_id(&self, user_id: Uuid) -> Result<Option<UserPrivateStats>, RepoError> {
        self.cache
            .intercept(
                user_stats::PRIVATE_BY_ID,
                &[arg(&user_id)],
                self.inner.private_by_id(user_id),
            )
            .await
    }

    async fn followers(
        &self,
        user_id: Uuid,
        paging: Paging,
    ) -> Result<PageResult<UserPublicStats>, RepoError> {
        self.cache
            .intercept(
                user_stats::FOLLOWERS,
                &[arg(&user_id), arg(&paging)],
                self.inner.followers(user_id, paging),
            )
            .await
    }

    async fn follows(
        &self,
        user_id: Uuid,
        paging: Paging,
    ) -> Result<PageResult<UserPublicStats>, RepoError> {
        self.cache
            .intercept(
                user_stats::FOLLOWS,
                &[arg(&user_id), arg(&paging)],
                self.inner.follows(user_id, paging),
            )
            .await
    }

    async fn ranking(
        &self,
        topic_id: Option<&str>,
        paging: Paging,
    ) -> Result<PageResult<UserPublicStats>, RepoError> {
        self.cache
            .intercept(
                user_stats::RANKING,
                &[arg(&topic_id), arg(&paging)],
                self.inner.ranking(topic_id, paging),
            )
            .await
    }

    async fn search(
        &self,
        query: Option<&str>,
        paging: Paging,
    ) -> Result<PageResult<UserPublicStats>, RepoError> {
        self.cache
            .intercept(
                user_stats::SEARCH,
                &[arg(&query), arg(&paging)],
                self.inner.search(query, paging),
            )
            .await
    }

    async fn are_followed_by(
        &self,
        user_ids: &[Uuid],
        follower_id: Uuid,
    ) -> Result<FollowSplit<Uuid>, RepoError> {
        self.cache
            .intercept(
                user_stats::ARE_FOLLOWED_BY,
                &[arg(user_ids), arg(&follower_id)],
                self.inner.are_followed_by(user_ids, follower_id),
            )
            .await
    }

    async fn top_author_per_topic(
        &self,
        topic_ids: &[String],
    ) -> Result<Vec<UserPublicStats>, RepoError> {
        self.cache
            .intercept(
                user_stats::TOP_AUTHOR_PER_TOPIC,
                &[arg(topic_ids)],
                self.inner.top_author_per_topic(topic_ids),
            )
            .await
    }
}

struct CachedTopicStore {
    inner: Arc<dyn TopicStore>,
    cache: CacheLayer,
}

#[async_trait]
impl TopicStore for CachedTopicStore {
    async fn follow(&self, topic_id: &str, follower_id: Uuid) -> Result<(), RepoError> {
        self.cache
            .intercept(
                topic::FOLLOW,
                &[arg(topic_id), arg(&follower_id)],
                self.inner.follow(topic_id, follower_id),
            )
            .await
    }

    async fn unfollow(&self, topic_id: &str, follower_id: Uuid) -> Result<(), RepoError> {
        self.cache
            .intercept(
                topic::UNFOLLOW,
                &[arg(topic_id), arg(&follower_id)],
                self.inner.unfollow(topic_id, follower_id),
            )
            .await
    }

    async fn is_followed_by_user(
        &self,
        topic_id: &str,
        user_id: Uuid,
    ) -> Result<bool, RepoError> {
        self.cache
            .intercept(
                topic::IS_FOLLOWED_BY_USER,
                &[arg(topic_id), arg(&user_id)],
                self.inner.is_followed_by_user(topic_id, user_id),
            )
            .await
    }

    async fn exist(&self, topic_ids: &[String]) -> Result<Existence<String>, RepoError> {
        self.cache
            .intercept(topic::EXIST, &[arg(topic_ids)], self.inner.exist(topic_ids))
            .await
    }

    async fn followed_topics(&self, user_id: Uuid) -> Result<Vec<String>, RepoError> {
        self.cache
            .intercept(
                topic::FOLLOWED_TOPICS,
                &[arg(&user_id)],
                self.inner.followed_topics(user_id),
            )
            .await
    }
}

struct CachedTopicStatsStore {
    inner: Arc<dyn TopicStatsStore>,
    cache: CacheLayer,
}

#[async_trait]
impl TopicStatsStore for CachedTopicStatsStore {
    async fn search(
        &self,
        query: Option<&str>,
        paging: Paging,
    ) -> Result<PageResult<TopicStats>, RepoError> {
        self.cache
            .intercept(
                topic_stats::SEARCH,
                &[arg(&query), arg(&paging)],
                self.inner.search(query, paging),
            )
            .await
    }

    async fn by_id(&self, topic_id: &str) -> Result<Option<TopicStats>, RepoError> {
        self.cache
            .intercept(topic_stats::BY_ID, &[arg(topic_id)], self.inner.by_id(topic_id))
            .await
    }

    async fn followed_by_user(
        &self,
        user_id: Uuid,
        paging: Paging,
    ) -> Result<PageResult<TopicStats>, RepoError> {
        self.cache
            .intercept(
                topic_stats::FOLLOWED_BY_USER,
                &[arg(&user_id), arg(&paging)],
                self.inner.followed_by_user(user_id, paging),
            )
            .await
    }

    async fn are_followed_by(
        &self,
        topic_ids: &[String],
        user_id: Uuid,
    ) -> Result<FollowSplit<String>, RepoError> {
        self.cache
            .intercept(
                topic_stats::ARE_FOLLOWED_BY,
                &[arg(topic_ids), arg(&user_id)],
                self.inner.are_followed_by(topic_ids, user_id),
            )
            .await
    }

    async fn random(&self, count: i64) -> Result<Vec<TopicStats>, RepoError> {
        self.cache
            .intercept(topic_stats::RANDOM, &[arg(&count)], self.inner.random(count))
            .await
    }
}

struct CachedFeedStore {
    inner: Arc<dyn FeedStore>,
    cache: CacheLayer,
}

#[async_trait]
impl FeedStore for CachedFeedStore {
    async fn by_id(&self, feed_id: Uuid) -> Result<Option<FeedRecord>, RepoError> {
        self.cache
            .intercept(feed::BY_ID, &[arg(&feed_id)], self.inner.by_id(feed_id))
            .await
    }

    async fn create(&self, params: &CreateFeedParams) -> Result<FeedRecord, RepoError> {
        self.cache
            .intercept(feed::CREATE, &[arg(params)], self.inner.create(params))
            .await
    }

    async fn delete(&self, feed_id: Uuid) -> Result<FeedRecord, RepoError> {
        self.cache
            .intercept(feed::DELETE, &[arg(&feed_id)], self.inner.delete(feed_id))
            .await
    }

    async fn update(
        &self,
        feed_id: Uuid,
        params: &UpdateFeedParams,
    ) -> Result<FeedUpdate, RepoError> {
        self.cache
            .intercept(
                feed::UPDATE,
                &[arg(&feed_id), arg(params)],
                self.inner.update(feed_id, params),
            )
            .await
    }

    async fn max_position(&self, owner_id: Uuid) -> Result<i32, RepoError> {
        self.cache
            .intercept(
                feed::MAX_POSITION,
                &[arg(&owner_id)],
                self.inner.max_position(owner_id),
            )
            .await
    }

    async fn position(&self, feed_id: Uuid) -> Result<Option<i32>, RepoError> {
        self.cache
            .intercept(feed::POSITION, &[arg(&feed_id)], self.inner.position(feed_id))
            .await
    }

    async fn set_position(&self, feed_id: Uuid, position: i32) -> Result<(), RepoError> {
        self.cache
            .intercept(
                feed::SET_POSITION,
                &[arg(&feed_id), arg(&position)],
                self.inner.set_position(feed_id, position),
            )
            .await
    }

    async fn authors(&self, feed_id: Uuid) -> Result<Vec<UserPublicStats>, RepoError> {
        self.cache
            .intercept(feed::AUTHORS, &[arg(&feed_id)], self.inner.authors(feed_id))
            .await
    }

    async fn topics(&self, feed_id: Uuid) -> Result<Vec<TopicStats>, RepoError> {
        self.cache
            .intercept(feed::TOPICS, &[arg(&feed_id)], self.inner.topics(feed_id))
            .await
    }

    async fn by_owner(&self, owner_id: Uuid) -> Result<Vec<FeedRecord>, RepoError> {
        self.cache
            .intercept(feed::BY_OWNER, &[arg(&owner_id)], self.inner.by_owner(owner_id))
            .await
    }

    async fn sources(&self, feed_id: Uuid) -> Result<Option<FeedSources>, RepoError> {
        self.cache
            .intercept(feed::SOURCES, &[arg(&feed_id)], self.inner.sources(feed_id))
            .await
    }
}

struct CachedMeStore {
    inner: Arc<dyn MeStore>,
    cache: CacheLayer,
}

#[async_trait]
impl MeStore for CachedMeStore {
    async fn delete(&self, user_id: Uuid) -> Result<Uuid, RepoError> {
        self.cache
            .intercept(me::DELETE, &[arg(&user_id)], self.inner.delete(user_id))
            .await
    }

    async fn update_name(&self, user_id: Uuid, name: &str) -> Result<(), RepoError> {
        self.cache
            .intercept(
                me::UPDATE_NAME,
                &[arg(&user_id), arg(name)],
                self.inner.update_name(user_id, name),
            )
            .await
    }

    async fn update_profile_picture(
        &self,
        user_id: Uuid,
        image_url: &str,
    ) -> Result<(), RepoError> {
        self.cache
            .intercept(
                me::UPDATE_PROFILE_PICTURE,
                &[arg(&user_id), arg(image_url)],
                self.inner.update_profile_picture(user_id, image_url),
            )
            .await
    }

    async fn has_completed_signup(&self, user_id: Uuid) -> Result<bool, RepoError> {
        self.cache
            .intercept(
                me::HAS_COMPLETED_SIGN_UP,
                &[arg(&user_id)],
                self.inner.has_completed_signup(user_id),
            )
            .await
    }

    async fn complete_signup(&self, user_id: Uuid) -> Result<(), RepoError> {
        self.cache
            .intercept(
                me::COMPLETE_SIGN_UP,
                &[arg(&user_id)],
                self.inner.complete_signup(user_id),
            )
            .await
    }

    async fn exists_in_saved_posts(
        &self,
        user_id: Uuid,
        post_id: Uuid,
    ) -> Result<bool, RepoError> {
        self.cache
            .intercept(
                me::EXISTS_IN_SAVED_POSTS,
                &[arg(&user_id), arg(&post_id)],
                self.inner.exists_in_saved_posts(user_id, post_id),
            )
            .await
    }

    async fn add_to_saved_posts(&self, user_id: Uuid, post_id: Uuid) -> Result<(), RepoError> {
        self.cache
            .intercept(
                me::ADD_TO_SAVED_POSTS,
                &[arg(&user_id), arg(&post_id)],
                self.inner.add_to_saved_posts(user_id, post_id),
            )
            .await
    }

    async fn delete_from_saved_posts(
        &self,
        user_id: Uuid,
        post_id: Uuid,
    ) -> Result<(), RepoError> {
        self.cache
            .intercept(
                me::DELETE_FROM_SAVED_POSTS,
                &[arg(&user_id), arg(&post_id)],
                self.inner.delete_from_saved_posts(user_id, post_id),
            )
            .await
    }
}

struct CachedAuthStore {
    inner: Arc<dyn AuthStore>,
    cache: CacheLayer,
}

#[async_trait]
impl AuthStore for CachedAuthStore {
    async fn create_session(&self, user_id: Uuid) -> Result<SessionRecord, RepoError> {
        self.cache
            .intercept(
                auth::CREATE_SESSION,
                &[arg(&user_id)],
                self.inner.create_session(user_id),
            )
            .await
    }

    async fn delete_session(&self, session_id: Uuid) -> Result<SessionRecord, RepoError> {
        self.cache
            .intercept(
                auth::DELETE_SESSION,
                &[arg(&session_id)],
                self.inner.delete_session(session_id),
            )
            .await
    }
}
