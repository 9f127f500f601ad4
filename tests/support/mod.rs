//! In-memory storage backend and blob store shared by the integration suites.
//!
//! The backend keeps one `World` behind a mutex. Opening a transaction snapshots
//! it and a rollback restores the snapshot, so a failed service call leaves no
//! trace. Every store call and every BEGIN/COMMIT/ROLLBACK is counted.

#![allow(dead_code)]

use std::{
    collections::HashMap,
    sync::{
        Arc, Mutex, MutexGuard,
        atomic::{AtomicBool, AtomicUsize, Ordering},
    },
};

use agora::{
    application::{
        blobs::{BlobError, BlobStore, ImageUpload, PageUpload},
        pagination::{PageResult, Paging},
        posts::CreatePostInput,
        repos::{
            AuthStore, CreateFeedParams, CreatePostParams, CreateUserParams, FeedStore, MeStore,
            PostMatchQuery, PostSearchFilter, PostStatsStore, PostStore, RepoError,
            StorageModules, TopicStatsStore, TopicStore, UpdateFeedParams, UserStatsStore,
            UserStore,
        },
        services::Services,
        storage::{DataStorage, IsolationLevel, StorageBackend, StorageLayer},
        users::CreateUserInput,
    },
    domain::{
        constraints::{auth::SESSION_TTL, page_type_for_mime, posts::TRENDING_SIZE},
        entities::{
            AuthorSummary, Existence, FeedRecord, FeedSources, FeedUpdate, FollowSplit,
            PageDescriptor, PostStats, PostViewerState, SessionRecord, TopicStats,
            UserPrivateStats, UserPublicStats,
        },
        quiz::Quiz,
        types::{Difficulty, PageKind, TrendingWindow},
    },
};
use async_trait::async_trait;
use bytes::Bytes;
use time::{Duration, OffsetDateTime};
use uuid::Uuid;

#[derive(Debug, Clone)]
pub struct UserRow {
    pub id: Uuid,
    pub email: String,
    pub name: String,
    pub image: Option<String>,
    pub signup_completed: bool,
    pub name_updated_at: Option<OffsetDateTime>,
    pub image_updated_at: Option<OffsetDateTime>,
    pub created_at: OffsetDateTime,
}

#[derive(Debug, Clone)]
pub struct PostRow {
    pub id: Uuid,
    pub author_id: Uuid,
    pub title: String,
    pub description: Option<String>,
    pub difficulty: Option<Difficulty>,
    pub topics: Vec<String>,
    pub created_at: OffsetDateTime,
}

#[derive(Debug, Clone, Default)]
pub struct World {
    pub users: Vec<UserRow>,
    pub topics: Vec<String>,
    pub posts: Vec<PostRow>,
    /// (post, viewer)
    pub views: Vec<(Uuid, Uuid)>,
    /// (post, rater) -> rating
    pub ratings: HashMap<(Uuid, Uuid), i32>,
    /// (user, post)
    pub saved: Vec<(Uuid, Uuid)>,
    /// (followed user, follower)
    pub user_follows: Vec<(Uuid, Uuid)>,
    /// (topic, follower)
    pub topic_follows: Vec<(String, Uuid)>,
    pub feeds: Vec<FeedRecord>,
    pub feed_topics: Vec<(Uuid, String)>,
    pub feed_authors: Vec<(Uuid, Uuid)>,
    pub sessions: Vec<SessionRecord>,
}

impl World {
    fn user(&self, id: Uuid) -> Option<&UserRow> {
        self.users.iter().find(|user| user.id == id)
    }

    fn user_mut(&mut self, id: Uuid) -> Result<&mut UserRow, RepoError> {
        self.users
            .iter_mut()
            .find(|user| user.id == id)
            .ok_or(RepoError::NotFound)
    }

    fn remove_post(&mut self, post_id: Uuid) {
        self.posts.retain(|post| post.id != post_id);
        self.views.retain(|(post, _)| *post != post_id);
        self.ratings.retain(|(post, _), _| *post != post_id);
        self.saved.retain(|(_, post)| *post != post_id);
    }

    fn remove_feed(&mut self, feed_id: Uuid) {
        self.feeds.retain(|feed| feed.id != feed_id);
        self.feed_topics.retain(|(feed, _)| *feed != feed_id);
        self.feed_authors.retain(|(feed, _)| *feed != feed_id);
    }

    fn remove_user(&mut self, user_id: Uuid) {
        let posts: Vec<Uuid> = self
            .posts
            .iter()
            .filter(|post| post.author_id == user_id)
            .map(|post| post.id)
            .collect();
        for post in posts {
            self.remove_post(post);
        }
        let feeds: Vec<Uuid> = self
            .feeds
            .iter()
            .filter(|feed| feed.owner_id == user_id)
            .map(|feed| feed.id)
            .collect();
        for feed in feeds {
            self.remove_feed(feed);
        }
        self.users.retain(|user| user.id != user_id);
        self.views.retain(|(_, viewer)| *viewer != user_id);
        self.ratings.retain(|(_, rater), _| *rater != user_id);
        self.saved.retain(|(user, _)| *user != user_id);
        self.user_follows
            .retain(|(user, follower)| *user != user_id && *follower != user_id);
        self.topic_follows.retain(|(_, follower)| *follower != user_id);
        self.feed_authors.retain(|(_, author)| *author != user_id);
        self.sessions.retain(|session| session.user_id != user_id);
    }

    fn post_ratings(&self, post_id: Uuid) -> Vec<i32> {
        self.ratings
            .iter()
            .filter(|((post, _), _)| *post == post_id)
            .map(|(_, rating)| *rating)
            .collect()
    }

    /// Every post with its stats, ranked by score then recency.
    pub fn post_stats(&self) -> Vec<PostStats> {
        let mut stats: Vec<PostStats> = self
            .posts
            .iter()
            .filter_map(|post| {
                let author = self.user(post.author_id)?;
                let ratings = self.post_ratings(post.id);
                let rates_count = ratings.len() as i64;
                let avg_rating = mean(&ratings);
                let views_count =
                    self.views.iter().filter(|(id, _)| *id == post.id).count() as i64;
                let mut topics = post.topics.clone();
                topics.sort();
                Some(PostStats {
                    id: post.id,
                    title: post.title.clone(),
                    description: post.description.clone(),
                    difficulty: post.difficulty,
                    created_at: post.created_at,
                    author: AuthorSummary {
                        id: author.id,
                        name: author.name.clone(),
                        image: author.image.clone(),
                        created_at: author.created_at,
                    },
                    topics,
                    ranking_position: 0,
                    avg_rating,
                    rates_count,
                    views_count,
                    score: avg_rating * (1.0 + rates_count as f64).ln()
                        + (1.0 + views_count as f64).ln(),
                })
            })
            .collect();
        stats.sort_by(|a, b| {
            b.score
                .total_cmp(&a.score)
                .then(b.created_at.cmp(&a.created_at))
        });
        for (index, post) in stats.iter_mut().enumerate() {
            post.ranking_position = index as i64 + 1;
        }
        stats
    }

    /// Every user with public stats. Only publishing users are ranked.
    pub fn user_stats(&self) -> Vec<UserPrivateStats> {
        let mut stats: Vec<UserPrivateStats> = self
            .users
            .iter()
            .map(|user| {
                let posts: Vec<&PostRow> = self
                    .posts
                    .iter()
                    .filter(|post| post.author_id == user.id)
                    .collect();
                let ratings: Vec<i32> = posts
                    .iter()
                    .flat_map(|post| self.post_ratings(post.id))
                    .collect();
                let mut topics: Vec<String> = posts
                    .iter()
                    .flat_map(|post| post.topics.iter().cloned())
                    .collect();
                topics.sort();
                topics.dedup();
                let followers_count = self
                    .user_follows
                    .iter()
                    .filter(|(followed, _)| *followed == user.id)
                    .count() as i64;
                let posts_published = posts.len() as i64;
                let avg_post_rating = mean(&ratings);
                UserPrivateStats {
                    public: UserPublicStats {
                        id: user.id,
                        name: user.name.clone(),
                        image: user.image.clone(),
                        created_at: user.created_at,
                        avg_post_rating,
                        followers_count,
                        ranking_position: None,
                        posts_published,
                        topics_user_publishes_on: topics,
                        score: avg_post_rating * (1.0 + posts_published as f64).ln()
                            + (1.0 + followers_count as f64).ln(),
                    },
                    email: user.email.clone(),
                    name_updated_at: user.name_updated_at,
                    image_updated_at: user.image_updated_at,
                    signup_completed: user.signup_completed,
                }
            })
            .collect();
        sort_by_score(&mut stats, |user| &user.public);
        let mut position = 0;
        for user in stats.iter_mut() {
            if user.public.posts_published > 0 {
                position += 1;
                user.public.ranking_position = Some(position);
            }
        }
        stats
    }

    pub fn public_stats(&self) -> Vec<UserPublicStats> {
        self.user_stats().into_iter().map(|user| user.public).collect()
    }

    pub fn topic_stats(&self, topic: &str) -> Option<TopicStats> {
        if !self.topics.iter().any(|id| id == topic) {
            return None;
        }
        Some(TopicStats {
            id: topic.to_string(),
            posts_count: self
                .posts
                .iter()
                .filter(|post| post.topics.iter().any(|id| id == topic))
                .count() as i64,
            followers_count: self
                .topic_follows
                .iter()
                .filter(|(id, _)| id == topic)
                .count() as i64,
        })
    }

    fn sorted_topic_stats(&self) -> Vec<TopicStats> {
        let mut topics = self.topics.clone();
        topics.sort();
        topics
            .iter()
            .filter_map(|topic| self.topic_stats(topic))
            .collect()
    }
}

fn mean(values: &[i32]) -> f64 {
    if values.is_empty() {
        0.0
    } else {
        values.iter().map(|value| f64::from(*value)).sum::<f64>() / values.len() as f64
    }
}

fn sort_by_score<T>(items: &mut [T], public: impl Fn(&T) -> &UserPublicStats) {
    items.sort_by(|a, b| {
        let (a, b) = (public(a), public(b));
        (b.posts_published > 0)
            .cmp(&(a.posts_published > 0))
            .then(b.score.total_cmp(&a.score))
            .then(a.created_at.cmp(&b.created_at))
            .then(a.id.cmp(&b.id))
    });
}

fn by_name(users: &mut [UserPublicStats]) {
    users.sort_by(|a, b| a.name.cmp(&b.name).then(a.id.cmp(&b.id)));
}

fn newest_first(posts: &mut [PostStats]) {
    posts.sort_by(|a, b| b.created_at.cmp(&a.created_at).then(a.id.cmp(&b.id)));
}

fn page<T>(items: Vec<T>, paging: Paging) -> PageResult<T> {
    let total = items.len() as i64;
    let data = items
        .into_iter()
        .skip(paging.skip() as usize)
        .take(paging.limit() as usize)
        .collect();
    paging.build(data, total)
}

fn contains_ci(haystack: &str, needle: &str) -> bool {
    haystack.to_lowercase().contains(&needle.to_lowercase())
}

fn overlaps(left: &[String], right: &[String]) -> bool {
    left.iter().any(|item| right.contains(item))
}

fn unique<T: Clone + PartialEq>(items: &[T]) -> Vec<T> {
    let mut unique = Vec::with_capacity(items.len());
    for item in items {
        if !unique.contains(item) {
            unique.push(item.clone());
        }
    }
    unique
}

fn duplicate(constraint: &str) -> RepoError {
    RepoError::Duplicate {
        constraint: constraint.to_string(),
    }
}

/// BEGIN/COMMIT/ROLLBACK counts and per-operation call counts.
#[derive(Default)]
pub struct Counters {
    begins: AtomicUsize,
    commits: AtomicUsize,
    rollbacks: AtomicUsize,
    isolation: Mutex<Vec<IsolationLevel>>,
    calls: Mutex<HashMap<&'static str, usize>>,
}

impl Counters {
    pub fn begins(&self) -> usize {
        self.begins.load(Ordering::SeqCst)
    }

    pub fn commits(&self) -> usize {
        self.commits.load(Ordering::SeqCst)
    }

    pub fn rollbacks(&self) -> usize {
        self.rollbacks.load(Ordering::SeqCst)
    }

    pub fn isolation_levels(&self) -> Vec<IsolationLevel> {
        self.isolation.lock().expect("isolation lock").clone()
    }

    /// How many times the raw store ran `operation`, e.g. `"postStats.byId"`.
    pub fn calls(&self, operation: &str) -> usize {
        self.calls
            .lock()
            .expect("calls lock")
            .get(operation)
            .copied()
            .unwrap_or(0)
    }

    pub fn reset(&self) {
        self.begins.store(0, Ordering::SeqCst);
        self.commits.store(0, Ordering::SeqCst);
        self.rollbacks.store(0, Ordering::SeqCst);
        self.isolation.lock().expect("isolation lock").clear();
        self.calls.lock().expect("calls lock").clear();
    }

    fn hit(&self, operation: &'static str) {
        *self
            .calls
            .lock()
            .expect("calls lock")
            .entry(operation)
            .or_default() += 1;
    }
}

#[derive(Clone)]
pub struct MemoryBackend {
    world: Arc<Mutex<World>>,
    counters: Arc<Counters>,
    snapshot: Option<Arc<Mutex<Option<World>>>>,
}

impl MemoryBackend {
    pub fn new() -> Self {
        Self {
            world: Arc::new(Mutex::new(World::default())),
            counters: Arc::new(Counters::default()),
            snapshot: None,
        }
    }

    pub fn counters(&self) -> &Counters {
        &self.counters
    }

    pub fn world(&self) -> MutexGuard<'_, World> {
        self.world.lock().expect("world lock")
    }

    pub fn seed_topics(&self, topics: &[&str]) {
        let mut world = self.world();
        for topic in topics {
            if !world.topics.iter().any(|id| id == topic) {
                world.topics.push(topic.to_string());
            }
        }
    }

    pub fn backdate_post(&self, post_id: Uuid, by: Duration) {
        if let Some(post) = self.world().posts.iter_mut().find(|post| post.id == post_id) {
            post.created_at -= by;
        }
    }

    pub fn backdate_profile_updates(&self, user_id: Uuid, by: Duration) {
        if let Some(user) = self.world().users.iter_mut().find(|user| user.id == user_id) {
            user.name_updated_at = user.name_updated_at.map(|at| at - by);
            user.image_updated_at = user.image_updated_at.map(|at| at - by);
        }
    }

    fn store(&self) -> Arc<MemoryStore> {
        Arc::new(MemoryStore {
            world: Arc::clone(&self.world),
            counters: Arc::clone(&self.counters),
        })
    }
}

#[async_trait]
impl StorageBackend for MemoryBackend {
    fn modules(&self) -> StorageModules {
        let store = self.store();
        StorageModules {
            user: store.clone(),
            post: store.clone(),
            post_stats: store.clone(),
            user_stats: store.clone(),
            topic: store.clone(),
            topic_stats: store.clone(),
            feed: store.clone(),
            me: store.clone(),
            auth: store,
        }
    }

    fn in_transaction(&self) -> bool {
        self.snapshot.is_some()
    }

    async fn begin(
        &self,
        isolation: IsolationLevel,
    ) -> Result<Arc<dyn StorageBackend>, RepoError> {
        self.counters.begins.fetch_add(1, Ordering::SeqCst);
        self.counters
            .isolation
            .lock()
            .expect("isolation lock")
            .push(isolation);
        let snapshot = self.world().clone();
        Ok(Arc::new(MemoryBackend {
            world: Arc::clone(&self.world),
            counters: Arc::clone(&self.counters),
            snapshot: Some(Arc::new(Mutex::new(Some(snapshot)))),
        }))
    }

    async fn commit(&self) -> Result<(), RepoError> {
        let snapshot = self.snapshot.as_ref().ok_or(RepoError::TransactionClosed)?;
        snapshot
            .lock()
            .expect("snapshot lock")
            .take()
            .ok_or(RepoError::TransactionClosed)?;
        self.counters.commits.fetch_add(1, Ordering::SeqCst);
        Ok(())
    }

    async fn rollback(&self) -> Result<(), RepoError> {
        let snapshot = self.snapshot.as_ref().ok_or(RepoError::TransactionClosed)?;
        let restored = snapshot
            .lock()
            .expect("snapshot lock")
            .take()
            .ok_or(RepoError::TransactionClosed)?;
        *self.world() = restored;
        self.counters.rollbacks.fetch_add(1, Ordering::SeqCst);
        Ok(())
    }
}

/// One value implementing every storage module over the shared world.
pub struct MemoryStore {
    world: Arc<Mutex<World>>,
    counters: Arc<Counters>,
}

impl MemoryStore {
    fn enter(&self, operation: &'static str) -> MutexGuard<'_, World> {
        self.counters.hit(operation);
        self.world.lock().expect("world lock")
    }
}

#[async_trait]
impl UserStore for MemoryStore {
    async fn create(&self, params: &CreateUserParams) -> Result<Uuid, RepoError> {
        let mut world = self.enter("user.create");
        if world.users.iter().any(|user| user.name == params.name) {
            return Err(duplicate("users_name_key"));
        }
        if world.users.iter().any(|user| user.email == params.email) {
            return Err(duplicate("users_email_key"));
        }
        let id = Uuid::new_v4();
        world.users.push(UserRow {
            id,
            email: params.email.clone(),
            name: params.name.clone(),
            image: None,
            signup_completed: false,
            name_updated_at: None,
            image_updated_at: None,
            created_at: OffsetDateTime::now_utc(),
        });
        Ok(id)
    }

    async fn is_followed_by_user(
        &self,
        user_id: Uuid,
        follower_id: Uuid,
    ) -> Result<bool, RepoError> {
        let world = self.enter("user.isFollowedByUser");
        Ok(world.user_follows.contains(&(user_id, follower_id)))
    }

    async fn follow(&self, follower_id: Uuid, user_id: Uuid) -> Result<(), RepoError> {
        let mut world = self.enter("user.follow");
        if world.user_follows.contains(&(user_id, follower_id)) {
            return Err(duplicate("user_follows_pkey"));
        }
        world.user_follows.push((user_id, follower_id));
        Ok(())
    }

    async fn unfollow(&self, follower_id: Uuid, user_id: Uuid) -> Result<(), RepoError> {
        let mut world = self.enter("user.unfollow");
        let before = world.user_follows.len();
        world
            .user_follows
            .retain(|edge| *edge != (user_id, follower_id));
        if world.user_follows.len() == before {
            return Err(RepoError::NotFound);
        }
        Ok(())
    }

    async fn exists_by_username(&self, name: &str) -> Result<bool, RepoError> {
        let world = self.enter("user.existsByUsername");
        Ok(world.users.iter().any(|user| user.name == name))
    }

    async fn exist(&self, user_ids: &[Uuid]) -> Result<Existence<Uuid>, RepoError> {
        let world = self.enter("user.exist");
        let requested = unique(user_ids);
        let found: Vec<Uuid> = requested
            .iter()
            .copied()
            .filter(|id| world.user(*id).is_some())
            .collect();
        Ok(Existence::from_found(&requested, &found))
    }

    async fn followed_authors(&self, follower_id: Uuid) -> Result<Vec<Uuid>, RepoError> {
        let world = self.enter("user.followedAuthors");
        Ok(world
            .user_follows
            .iter()
            .filter(|(_, follower)| *follower == follower_id)
            .map(|(user, _)| *user)
            .collect())
    }
}

#[async_trait]
impl PostStore for MemoryStore {
    async fn create(&self, params: &CreatePostParams) -> Result<Uuid, RepoError> {
        let mut world = self.enter("post.create");
        if world.user(params.author_id).is_none()
            || !params
                .topics
                .iter()
                .all(|topic| world.topics.contains(topic))
        {
            return Err(RepoError::InvalidInput {
                message: "foreign key violation".into(),
            });
        }
        let id = Uuid::new_v4();
        world.posts.push(PostRow {
            id,
            author_id: params.author_id,
            title: params.title.clone(),
            description: params.description.clone(),
            difficulty: params.difficulty,
            topics: unique(&params.topics),
            created_at: OffsetDateTime::now_utc(),
        });
        Ok(id)
    }

    async fn delete(&self, post_id: Uuid) -> Result<Uuid, RepoError> {
        let mut world = self.enter("post.delete");
        if !world.posts.iter().any(|post| post.id == post_id) {
            return Err(RepoError::NotFound);
        }
        world.remove_post(post_id);
        Ok(post_id)
    }

    async fn rate(&self, post_id: Uuid, user_id: Uuid, rating: i32) -> Result<(), RepoError> {
        let mut world = self.enter("post.rate");
        world.ratings.insert((post_id, user_id), rating);
        Ok(())
    }

    async fn view(&self, post_id: Uuid, user_id: Uuid) -> Result<(), RepoError> {
        let mut world = self.enter("post.view");
        if world.views.contains(&(post_id, user_id)) {
            return Err(duplicate("post_views_pkey"));
        }
        world.views.push((post_id, user_id));
        Ok(())
    }

    async fn has_viewed(&self, post_id: Uuid, user_id: Uuid) -> Result<bool, RepoError> {
        let world = self.enter("post.hasViewed");
        Ok(world.views.contains(&(post_id, user_id)))
    }

    async fn exists(&self, post_id: Uuid) -> Result<bool, RepoError> {
        let world = self.enter("post.exists");
        Ok(world.posts.iter().any(|post| post.id == post_id))
    }
}

#[async_trait]
impl PostStatsStore for MemoryStore {
    async fn by_id(&self, post_id: Uuid) -> Result<Option<PostStats>, RepoError> {
        let world = self.enter("postStats.byId");
        Ok(world.post_stats().into_iter().find(|post| post.id == post_id))
    }

    async fn search(
        &self,
        query: Option<&str>,
        paging: Paging,
        filter: &PostSearchFilter,
    ) -> Result<PageResult<PostStats>, RepoError> {
        let world = self.enter("postStats.search");
        let mut posts: Vec<PostStats> = world
            .post_stats()
            .into_iter()
            .filter(|post| {
                query.is_none_or(|query| {
                    contains_ci(&post.title, query)
                        || post
                            .description
                            .as_deref()
                            .is_some_and(|description| contains_ci(description, query))
                })
            })
            .filter(|post| {
                filter
                    .topics
                    .as_deref()
                    .is_none_or(|topics| overlaps(&post.topics, topics))
            })
            .filter(|post| {
                filter
                    .difficulty
                    .is_none_or(|difficulty| post.difficulty == Some(difficulty))
            })
            .collect();
        newest_first(&mut posts);
        Ok(page(posts, paging))
    }

    async fn trending(
        &self,
        window: TrendingWindow,
        topics: Option<&[String]>,
    ) -> Result<Vec<PostStats>, RepoError> {
        let world = self.enter("postStats.trending");
        let since = window.since(OffsetDateTime::now_utc());
        Ok(world
            .post_stats()
            .into_iter()
            .filter(|post| post.created_at > since)
            .filter(|post| topics.is_none_or(|topics| overlaps(&post.topics, topics)))
            .take(TRENDING_SIZE as usize)
            .collect())
    }

    async fn published_by_user(
        &self,
        user_id: Uuid,
        paging: Paging,
    ) -> Result<PageResult<PostStats>, RepoError> {
        let world = self.enter("postStats.publishedByUser");
        let mut posts: Vec<PostStats> = world
            .post_stats()
            .into_iter()
            .filter(|post| post.author.id == user_id)
            .collect();
        newest_first(&mut posts);
        Ok(page(posts, paging))
    }

    async fn saved_by_user(
        &self,
        user_id: Uuid,
        paging: Paging,
    ) -> Result<PageResult<PostStats>, RepoError> {
        let world = self.enter("postStats.savedByUser");
        let mut posts: Vec<PostStats> = world
            .post_stats()
            .into_iter()
            .filter(|post| world.saved.contains(&(user_id, post.id)))
            .collect();
        newest_first(&mut posts);
        Ok(page(posts, paging))
    }

    async fn viewer_state(
        &self,
        post_id: Uuid,
        user_id: Uuid,
    ) -> Result<PostViewerState, RepoError> {
        let world = self.enter("postStats.viewerState");
        Ok(PostViewerState {
            post_id,
            i_read: world.views.contains(&(post_id, user_id)),
            i_saved: world.saved.contains(&(user_id, post_id)),
            i_rated: world.ratings.get(&(post_id, user_id)).copied(),
        })
    }

    async fn matching(&self, query: &PostMatchQuery) -> Result<Vec<PostStats>, RepoError> {
        let world = self.enter("postStats.matching");
        Ok(world
            .post_stats()
            .into_iter()
            .filter(|post| {
                query
                    .unseen_by
                    .is_none_or(|viewer| !world.views.contains(&(post.id, viewer)))
            })
            .filter(|post| query.exclude_author != Some(post.author.id))
            .filter(|post| {
                query.match_all
                    || query.authors.contains(&post.author.id)
                    || overlaps(&post.topics, &query.topics)
            })
            .take(query.limit as usize)
            .collect())
    }
}

#[async_trait]
impl UserStatsStore for MemoryStore {
    async fn public_by_id(&self, user_id: Uuid) -> Result<Option<UserPublicStats>, RepoError> {
        let world = self.enter("userStats.publicById");
        Ok(world.public_stats().into_iter().find(|user| user.id == user_id))
    }

    async fn private_by_id(&self, user_id: Uuid) -> Result<Option<UserPrivateStats>, RepoError> {
        let world = self.enter("userStats.privateById");
        Ok(world
            .user_stats()
            .into_iter()
            .find(|user| user.public.id == user_id))
    }

    async fn followers(
        &self,
        user_id: Uuid,
        paging: Paging,
    ) -> Result<PageResult<UserPublicStats>, RepoError> {
        let world = self.enter("userStats.followers");
        let mut users: Vec<UserPublicStats> = world
            .public_stats()
            .into_iter()
            .filter(|user| world.user_follows.contains(&(user_id, user.id)))
            .collect();
        by_name(&mut users);
        Ok(page(users, paging))
    }

    async fn follows(
        &self,
        user_id: Uuid,
        paging: Paging,
    ) -> Result<PageResult<UserPublicStats>, RepoError> {
        let world = self.enter("userStats.follows");
        let mut users: Vec<UserPublicStats> = world
            .public_stats()
            .into_iter()
            .filter(|user| world.user_follows.contains(&(user.id, user_id)))
            .collect();
        by_name(&mut users);
        Ok(page(users, paging))
    }

    async fn ranking(
        &self,
        topic_id: Option<&str>,
        paging: Paging,
    ) -> Result<PageResult<UserPublicStats>, RepoError> {
        let world = self.enter("userStats.ranking");
        let users: Vec<UserPublicStats> = world
            .public_stats()
            .into_iter()
            .filter(|user| match topic_id {
                Some(topic) => user.topics_user_publishes_on.iter().any(|id| id == topic),
                None => !user.topics_user_publishes_on.is_empty(),
            })
            .collect();
        Ok(page(users, paging))
    }

    async fn search(
        &self,
        query: Option<&str>,
        paging: Paging,
    ) -> Result<PageResult<UserPublicStats>, RepoError> {
        let world = self.enter("userStats.search");
        let mut users: Vec<UserPublicStats> = world
            .public_stats()
            .into_iter()
            .filter(|user| query.is_none_or(|query| contains_ci(&user.name, query)))
            .collect();
        by_name(&mut users);
        Ok(page(users, paging))
    }

    async fn are_followed_by(
        &self,
        user_ids: &[Uuid],
        follower_id: Uuid,
    ) -> Result<FollowSplit<Uuid>, RepoError> {
        let world = self.enter("userStats.areFollowedBy");
        let (following, not_following) = user_ids
            .iter()
            .copied()
            .partition(|id| world.user_follows.contains(&(*id, follower_id)));
        Ok(FollowSplit {
            following,
            not_following,
        })
    }

    async fn top_author_per_topic(
        &self,
        topic_ids: &[String],
    ) -> Result<Vec<UserPublicStats>, RepoError> {
        let world = self.enter("userStats.topAuthorPerTopic");
        let ranked = world.public_stats();
        Ok(topic_ids
            .iter()
            .filter_map(|topic| {
                ranked
                    .iter()
                    .find(|user| user.topics_user_publishes_on.contains(topic))
                    .cloned()
            })
            .collect())
    }
}

#[async_trait]
impl TopicStore for MemoryStore {
    async fn follow(&self, topic_id: &str, follower_id: Uuid) -> Result<(), RepoError> {
        let mut world = self.enter("topic.follow");
        let edge = (topic_id.to_string(), follower_id);
        if world.topic_follows.contains(&edge) {
            return Err(duplicate("topic_follows_pkey"));
        }
        world.topic_follows.push(edge);
        Ok(())
    }

    async fn unfollow(&self, topic_id: &str, follower_id: Uuid) -> Result<(), RepoError> {
        let mut world = self.enter("topic.unfollow");
        world
            .topic_follows
            .retain(|(topic, follower)| !(topic == topic_id && *follower == follower_id));
        Ok(())
    }

    async fn is_followed_by_user(
        &self,
        topic_id: &str,
        user_id: Uuid,
    ) -> Result<bool, RepoError> {
        let world = self.enter("topic.isFollowedByUser");
        Ok(world
            .topic_follows
            .iter()
            .any(|(topic, follower)| topic == topic_id && *follower == user_id))
    }

    async fn exist(&self, topic_ids: &[String]) -> Result<Existence<String>, RepoError> {
        let world = self.enter("topic.exist");
        let requested = unique(topic_ids);
        let found: Vec<String> = requested
            .iter()
            .filter(|id| world.topics.contains(id))
            .cloned()
            .collect();
        Ok(Existence::from_found(&requested, &found))
    }

    async fn followed_topics(&self, user_id: Uuid) -> Result<Vec<String>, RepoError> {
        let world = self.enter("topic.followedTopics");
        let mut topics: Vec<String> = world
            .topic_follows
            .iter()
            .filter(|(_, follower)| *follower == user_id)
            .map(|(topic, _)| topic.clone())
            .collect();
        topics.sort();
        Ok(topics)
    }
}

#[async_trait]
impl TopicStatsStore for MemoryStore {
    async fn search(
        &self,
        query: Option<&str>,
        paging: Paging,
    ) -> Result<PageResult<TopicStats>, RepoError> {
        let world = self.enter("topicStats.search");
        let topics: Vec<TopicStats> = world
            .sorted_topic_stats()
            .into_iter()
            .filter(|topic| query.is_none_or(|query| contains_ci(&topic.id, query)))
            .collect();
        Ok(page(topics, paging))
    }

    async fn by_id(&self, topic_id: &str) -> Result<Option<TopicStats>, RepoError> {
        let world = self.enter("topicStats.byId");
        Ok(world.topic_stats(topic_id))
    }

    async fn followed_by_user(
        &self,
        user_id: Uuid,
        paging: Paging,
    ) -> Result<PageResult<TopicStats>, RepoError> {
        let world = self.enter("topicStats.followedByUser");
        let topics: Vec<TopicStats> = world
            .sorted_topic_stats()
            .into_iter()
            .filter(|topic| world.topic_follows.contains(&(topic.id.clone(), user_id)))
            .collect();
        Ok(page(topics, paging))
    }

    async fn are_followed_by(
        &self,
        topic_ids: &[String],
        user_id: Uuid,
    ) -> Result<FollowSplit<String>, RepoError> {
        let world = self.enter("topicStats.areFollowedBy");
        let (following, not_following) = topic_ids
            .iter()
            .cloned()
            .partition(|id| world.topic_follows.contains(&(id.clone(), user_id)));
        Ok(FollowSplit {
            following,
            not_following,
        })
    }

    async fn random(&self, count: i64) -> Result<Vec<TopicStats>, RepoError> {
        let world = self.enter("topicStats.random");
        Ok(world
            .sorted_topic_stats()
            .into_iter()
            .take(count as usize)
            .collect())
    }
}

#[async_trait]
impl FeedStore for MemoryStore {
    async fn by_id(&self, feed_id: Uuid) -> Result<Option<FeedRecord>, RepoError> {
        let world = self.enter("feed.byId");
        Ok(world.feeds.iter().find(|feed| feed.id == feed_id).cloned())
    }

    async fn create(&self, params: &CreateFeedParams) -> Result<FeedRecord, RepoError> {
        let mut world = self.enter("feed.create");
        let now = OffsetDateTime::now_utc();
        let feed = FeedRecord {
            id: Uuid::new_v4(),
            name: params.name.clone(),
            owner_id: params.owner_id,
            position: params.position,
            created_at: now,
            updated_at: now,
        };
        world.feeds.push(feed.clone());
        for topic in unique(&params.topics) {
            world.feed_topics.push((feed.id, topic));
        }
        for author in unique(&params.authors) {
            world.feed_authors.push((feed.id, author));
        }
        Ok(feed)
    }

    async fn delete(&self, feed_id: Uuid) -> Result<FeedRecord, RepoError> {
        let mut world = self.enter("feed.delete");
        let feed = world
            .feeds
            .iter()
            .find(|feed| feed.id == feed_id)
            .cloned()
            .ok_or(RepoError::NotFound)?;
        world.remove_feed(feed_id);
        Ok(feed)
    }

    async fn update(
        &self,
        feed_id: Uuid,
        params: &UpdateFeedParams,
    ) -> Result<FeedUpdate, RepoError> {
        let mut world = self.enter("feed.update");
        let feed = world
            .feeds
            .iter_mut()
            .find(|feed| feed.id == feed_id)
            .ok_or(RepoError::NotFound)?;
        if let Some(name) = &params.name {
            feed.name = name.clone();
        }
        feed.updated_at = OffsetDateTime::now_utc();
        let feed = feed.clone();

        if let Some(topics) = &params.topics {
            world.feed_topics.retain(|(id, _)| *id != feed_id);
            for topic in unique(topics) {
                world.feed_topics.push((feed_id, topic));
            }
        }
        if let Some(authors) = &params.authors {
            world.feed_authors.retain(|(id, _)| *id != feed_id);
            for author in unique(authors) {
                world.feed_authors.push((feed_id, author));
            }
        }

        let sources = feed_sources(&world, feed_id);
        Ok(FeedUpdate {
            feed,
            topics: sources.topics,
            authors: sources.authors,
        })
    }

    async fn max_position(&self, owner_id: Uuid) -> Result<i32, RepoError> {
        let world = self.enter("feed.maxPosition");
        Ok(world
            .feeds
            .iter()
            .filter(|feed| feed.owner_id == owner_id)
            .map(|feed| feed.position)
            .max()
            .unwrap_or(0))
    }

    async fn position(&self, feed_id: Uuid) -> Result<Option<i32>, RepoError> {
        let world = self.enter("feed.position");
        Ok(world
            .feeds
            .iter()
            .find(|feed| feed.id == feed_id)
            .map(|feed| feed.position))
    }

    async fn set_position(&self, feed_id: Uuid, position: i32) -> Result<(), RepoError> {
        let mut world = self.enter("feed.setPosition");
        let feed = world
            .feeds
            .iter_mut()
            .find(|feed| feed.id == feed_id)
            .ok_or(RepoError::NotFound)?;
        feed.position = position;
        feed.updated_at = OffsetDateTime::now_utc();
        Ok(())
    }

    async fn authors(&self, feed_id: Uuid) -> Result<Vec<UserPublicStats>, RepoError> {
        let world = self.enter("feed.authors");
        let mut authors: Vec<UserPublicStats> = world
            .public_stats()
            .into_iter()
            .filter(|user| world.feed_authors.contains(&(feed_id, user.id)))
            .collect();
        by_name(&mut authors);
        Ok(authors)
    }

    async fn topics(&self, feed_id: Uuid) -> Result<Vec<TopicStats>, RepoError> {
        let world = self.enter("feed.topics");
        Ok(world
            .sorted_topic_stats()
            .into_iter()
            .filter(|topic| world.feed_topics.contains(&(feed_id, topic.id.clone())))
            .collect())
    }

    async fn by_owner(&self, owner_id: Uuid) -> Result<Vec<FeedRecord>, RepoError> {
        let world = self.enter("feed.byOwner");
        let mut feeds: Vec<FeedRecord> = world
            .feeds
            .iter()
            .filter(|feed| feed.owner_id == owner_id)
            .cloned()
            .collect();
        feeds.sort_by_key(|feed| feed.position);
        Ok(feeds)
    }

    async fn sources(&self, feed_id: Uuid) -> Result<Option<FeedSources>, RepoError> {
        let world = self.enter("feed.sources");
        if !world.feeds.iter().any(|feed| feed.id == feed_id) {
            return Ok(None);
        }
        Ok(Some(feed_sources(&world, feed_id)))
    }
}

fn feed_sources(world: &World, feed_id: Uuid) -> FeedSources {
    let mut topics: Vec<String> = world
        .feed_topics
        .iter()
        .filter(|(id, _)| *id == feed_id)
        .map(|(_, topic)| topic.clone())
        .collect();
    topics.sort();
    let mut authors: Vec<Uuid> = world
        .feed_authors
        .iter()
        .filter(|(id, _)| *id == feed_id)
        .map(|(_, author)| *author)
        .collect();
    authors.sort();
    FeedSources { topics, authors }
}

#[async_trait]
impl MeStore for MemoryStore {
    async fn delete(&self, user_id: Uuid) -> Result<Uuid, RepoError> {
        let mut world = self.enter("me.delete");
        if world.user(user_id).is_none() {
            return Err(RepoError::NotFound);
        }
        world.remove_user(user_id);
        Ok(user_id)
    }

    async fn update_name(&self, user_id: Uuid, name: &str) -> Result<(), RepoError> {
        let mut world = self.enter("me.updateName");
        if world
            .users
            .iter()
            .any(|user| user.name == name && user.id != user_id)
        {
            return Err(duplicate("users_name_key"));
        }
        let user = world.user_mut(user_id)?;
        user.name = name.to_string();
        user.name_updated_at = Some(OffsetDateTime::now_utc());
        Ok(())
    }

    async fn update_profile_picture(
        &self,
        user_id: Uuid,
        image_url: &str,
    ) -> Result<(), RepoError> {
        let mut world = self.enter("me.updateProfilePicture");
        let user = world.user_mut(user_id)?;
        user.image = Some(image_url.to_string());
        user.image_updated_at = Some(OffsetDateTime::now_utc());
        Ok(())
    }

    async fn has_completed_signup(&self, user_id: Uuid) -> Result<bool, RepoError> {
        let world = self.enter("me.hasCompletedSignUp");
        Ok(world
            .user(user_id)
            .is_some_and(|user| user.signup_completed))
    }

    async fn complete_signup(&self, user_id: Uuid) -> Result<(), RepoError> {
        let mut world = self.enter("me.completeSignUp");
        world.user_mut(user_id)?.signup_completed = true;
        Ok(())
    }

    async fn exists_in_saved_posts(
        &self,
        user_id: Uuid,
        post_id: Uuid,
    ) -> Result<bool, RepoError> {
        let world = self.enter("me.existsInSavedPosts");
        Ok(world.saved.contains(&(user_id, post_id)))
    }

    async fn add_to_saved_posts(&self, user_id: Uuid, post_id: Uuid) -> Result<(), RepoError> {
        let mut world = self.enter("me.addToSavedPosts");
        if world.saved.contains(&(user_id, post_id)) {
            return Err(duplicate("saved_posts_pkey"));
        }
        world.saved.push((user_id, post_id));
        Ok(())
    }

    async fn delete_from_saved_posts(
        &self,
        user_id: Uuid,
        post_id: Uuid,
    ) -> Result<(), RepoError> {
        let mut world = self.enter("me.deleteFromSavedPosts");
        let before = world.saved.len();
        world.saved.retain(|entry| *entry != (user_id, post_id));
        if world.saved.len() == before {
            return Err(RepoError::NotFound);
        }
        Ok(())
    }
}

#[async_trait]
impl AuthStore for MemoryStore {
    async fn create_session(&self, user_id: Uuid) -> Result<SessionRecord, RepoError> {
        let mut world = self.enter("auth.createSession");
        let session = SessionRecord {
            id: Uuid::new_v4(),
            user_id,
            expires_at: OffsetDateTime::now_utc() + SESSION_TTL,
        };
        world.sessions.push(session.clone());
        Ok(session)
    }

    async fn delete_session(&self, session_id: Uuid) -> Result<SessionRecord, RepoError> {
        let mut world = self.enter("auth.deleteSession");
        let index = world
            .sessions
            .iter()
            .position(|session| session.id == session_id)
            .ok_or(RepoError::NotFound)?;
        Ok(world.sessions.remove(index))
    }
}

/// Blob store keeping pages and pictures in memory.
#[derive(Default)]
pub struct RecordingBlobs {
    pages: Mutex<HashMap<Uuid, Vec<PageDescriptor>>>,
    pictures: Mutex<HashMap<Uuid, Bytes>>,
    fail_uploads: AtomicBool,
}

impl RecordingBlobs {
    pub fn fail_uploads(&self, fail: bool) {
        self.fail_uploads.store(fail, Ordering::SeqCst);
    }

    pub fn has_pages(&self, post_id: Uuid) -> bool {
        self.pages.lock().expect("pages lock").contains_key(&post_id)
    }

    pub fn picture(&self, user_id: Uuid) -> Option<Bytes> {
        self.pictures
            .lock()
            .expect("pictures lock")
            .get(&user_id)
            .cloned()
    }

    fn check_failure(&self) -> Result<(), BlobError> {
        if self.fail_uploads.load(Ordering::SeqCst) {
            return Err(BlobError::Io {
                path: "memory".into(),
                source: std::io::Error::other("upload refused"),
            });
        }
        Ok(())
    }
}

#[async_trait]
impl BlobStore for RecordingBlobs {
    async fn upload_post_pages(
        &self,
        post_id: Uuid,
        pages: &[PageUpload],
    ) -> Result<Vec<PageDescriptor>, BlobError> {
        self.check_failure()?;
        let mut descriptors = Vec::with_capacity(pages.len());
        for (index, page) in pages.iter().enumerate() {
            let page_type = page_type_for_mime(&page.content_type)
                .ok_or_else(|| BlobError::UnsupportedType(page.content_type.clone()))?;
            let descriptor = if page_type.kind == PageKind::Quiz {
                let quiz = Quiz::parse(&page.bytes)
                    .map_err(|_| BlobError::Corrupted(format!("{post_id}/{index}")))?;
                PageDescriptor::Quiz { quiz }
            } else {
                PageDescriptor::Remote {
                    kind: page_type.kind,
                    remote_url: format!("/post-pages/{post_id}/{index}.{}", page_type.extension),
                }
            };
            descriptors.push(descriptor);
        }
        self.pages
            .lock()
            .expect("pages lock")
            .insert(post_id, descriptors.clone());
        Ok(descriptors)
    }

    async fn post_pages(&self, post_id: Uuid) -> Result<Option<Vec<PageDescriptor>>, BlobError> {
        Ok(self.pages.lock().expect("pages lock").get(&post_id).cloned())
    }

    async fn delete_post_pages(&self, post_id: Uuid) -> Result<(), BlobError> {
        self.pages.lock().expect("pages lock").remove(&post_id);
        Ok(())
    }

    async fn upload_profile_picture(
        &self,
        user_id: Uuid,
        image: &ImageUpload,
    ) -> Result<String, BlobError> {
        self.check_failure()?;
        self.pictures
            .lock()
            .expect("pictures lock")
            .insert(user_id, image.bytes.clone());
        Ok(self.profile_picture_url(user_id))
    }

    fn profile_picture_url(&self, user_id: Uuid) -> String {
        format!("/profile-pictures/{user_id}")
    }
}

/// Services over a fresh in-memory backend.
pub struct Harness {
    pub backend: MemoryBackend,
    pub blobs: Arc<RecordingBlobs>,
    pub storage: DataStorage,
    pub services: Services,
}

impl Harness {
    pub fn new() -> Self {
        Self::with_layer(None)
    }

    pub fn with_layer(layer: Option<Arc<dyn StorageLayer>>) -> Self {
        let backend = MemoryBackend::new();
        backend.seed_topics(&["rust", "go", "databases", "networking", "compilers"]);
        let blobs = Arc::new(RecordingBlobs::default());
        let storage = DataStorage::new(Arc::new(backend.clone()), layer);
        let services = Services::new(storage.clone(), blobs.clone());
        Self {
            backend,
            blobs,
            storage,
            services,
        }
    }

    pub fn counters(&self) -> &Counters {
        self.backend.counters()
    }

    /// Register a user named `name` and return its id as a string.
    pub async fn user(&self, name: &str) -> String {
        self.services
            .users
            .create(
                CreateUserInput {
                    email: format!("{name}@example.com"),
                    name: name.to_string(),
                },
                None,
            )
            .await
            .expect("create user")
            .to_string()
    }

    /// Publish a one-page markdown post on `topics`.
    pub async fn post(&self, author: &str, title: &str, topics: &[&str]) -> String {
        self.services
            .posts
            .create(author, post_input(title, topics), vec![markdown_page()])
            .await
            .expect("create post")
            .id
            .to_string()
    }
}

pub fn post_input(title: &str, topics: &[&str]) -> CreatePostInput {
    CreatePostInput {
        title: title.to_string(),
        description: None,
        difficulty: Some(Difficulty::Medium),
        topics: topics.iter().map(|topic| topic.to_string()).collect(),
    }
}

pub fn markdown_page() -> PageUpload {
    PageUpload::new("text/markdown", "# Heading\n\nBody text.")
}

pub fn uuid(id: &str) -> Uuid {
    Uuid::parse_str(id).expect("valid uuid")
}
