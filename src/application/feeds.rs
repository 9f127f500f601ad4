use uuid::Uuid;

use crate::{
    application::{
        error::ServiceError,
        following,
        ranking::{feed_query, home_query, shuffle},
        repos::{CreateFeedParams, UpdateFeedParams},
        storage::{DataStorage, IsolationLevel},
        timing::timed,
        users::{ensure_user_exists, ensure_users_exist},
        validation::{
            Report, ValidationError, char_length, has_repetitions, parse_optional_uuid,
            parse_uuid, topic_ids,
        },
    },
    domain::{
        constraints::feeds::{MAX_AUTHORS, MAX_TOPICS, NAME_CHARS},
        entities::{
            Existence, FeedRecord, FeedUpdate, Following, PostStats, TopicStats, UserPublicStats,
        },
        error::DomainError,
    },
};

#[derive(Debug, Clone, Default)]
pub struct CreateFeedInput {
    pub name: String,
    pub topics: Option<Vec<String>>,
    pub authors: Option<Vec<String>>,
}

#[derive(Debug, Clone, Default)]
pub struct UpdateFeedInput {
    pub name: Option<String>,
    pub topics: Option<Vec<String>>,
    pub authors: Option<Vec<String>>,
}

#[derive(Clone)]
pub struct FeedService {
    storage: DataStorage,
}

impl FeedService {
    pub fn new(storage: DataStorage) -> Self {
        Self { storage }
    }

    pub async fn by_id(&self, feed: &str, me: &str) -> Result<FeedRecord, ServiceError> {
        timed("FeedService.by_id", async {
            let feed = parse_uuid("feedId", feed)?;
            let me = parse_uuid("me", me)?;
            self.storage
                .transaction(|tx| async move {
                    owned_feed(&tx, feed, me, DomainError::NotYourFeed).await
                })
                .await
        })
        .await
    }

    /// Create a feed at the end of the owner's list.
    pub async fn create(
        &self,
        owner: &str,
        input: CreateFeedInput,
    ) -> Result<FeedRecord, ServiceError> {
        timed("FeedService.create", async {
            let mut report = Report::new("feed");
            let owner = report.uuid("ownerId", owner);
            let name = input.name.trim().to_string();
            report.field("name", char_length(&name, &NAME_CHARS));
            let owner = report.finish_with(owner)?;

            let topics = topic_ids("topics", &input.topics.unwrap_or_default())?;
            let authors = parse_authors(input.authors.unwrap_or_default())?;
            check_sources(Some(&topics), Some(&authors), true)?;

            self.storage
                .transaction(|tx| async move {
                    ensure_user_exists(&tx, owner).await?;
                    ensure_sources_exist(&tx, &topics, &authors).await?;
                    let position = tx.feed().max_position(owner).await? + 1;
                    let params = CreateFeedParams {
                        owner_id: owner,
                        name,
                        position,
                        topics,
                        authors,
                    };
                    Ok(tx.feed().create(&params).await?)
                })
                .await
        })
        .await
    }

    /// Rename a feed or replace its topics and authors.
    pub async fn update(
        &self,
        feed: &str,
        me: &str,
        input: UpdateFeedInput,
    ) -> Result<FeedUpdate, ServiceError> {
        timed("FeedService.update", async {
            let feed = parse_uuid("feedId", feed)?;
            let me = parse_uuid("me", me)?;
            if input.name.is_none() && input.topics.is_none() && input.authors.is_none() {
                return Err(DomainError::FeedTopicsAndAuthors.into());
            }
            let name = input.name.map(|name| name.trim().to_string());
            Report::new("feed")
                .field(
                    "name",
                    name.as_deref()
                        .map_or(Ok(()), |name| char_length(name, &NAME_CHARS)),
                )
                .finish()?;
            let topics = input
                .topics
                .as_deref()
                .map(|topics| topic_ids("topics", topics))
                .transpose()?;
            let authors = input.authors.map(parse_authors).transpose()?;
            check_sources(topics.as_deref(), authors.as_deref(), false)?;

            self.storage
                .transaction(|tx| async move {
                    owned_feed(&tx, feed, me, DomainError::OnlyOwnerCanPerform).await?;
                    if topics.is_some() || authors.is_some() {
                        ensure_sources_remain(&tx, feed, topics.as_deref(), authors.as_deref())
                            .await?;
                    }
                    ensure_sources_exist(
                        &tx,
                        topics.as_deref().unwrap_or_default(),
                        authors.as_deref().unwrap_or_default(),
                    )
                    .await?;
                    let params = UpdateFeedParams {
                        name,
                        topics,
                        authors,
                    };
                    Ok(tx.feed().update(feed, &params).await?)
                })
                .await
        })
        .await
    }

    pub async fn delete(&self, feed: &str, me: &str) -> Result<FeedRecord, ServiceError> {
        timed("FeedService.delete", async {
            let feed = parse_uuid("feedId", feed)?;
            let me = parse_uuid("me", me)?;
            self.storage
                .transaction(|tx| async move {
                    owned_feed(&tx, feed, me, DomainError::OnlyOwnerCanPerform).await?;
                    Ok(tx.feed().delete(feed).await?)
                })
                .await
        })
        .await
    }

    /// Exchange the positions of two feeds owned by `me`.
    ///
    /// Runs serializable so concurrent swaps cannot interleave their reads.
    pub async fn swap_position(&self, a: &str, b: &str, me: &str) -> Result<(), ServiceError> {
        timed("FeedService.swap_position", async {
            let a = parse_uuid("feedId", a)?;
            let b = parse_uuid("otherFeedId", b)?;
            let me = parse_uuid("me", me)?;
            self.storage
                .run_in_transaction(IsolationLevel::Serializable, |tx| async move {
                    owned_feed(&tx, a, me, DomainError::NotYourFeed).await?;
                    owned_feed(&tx, b, me, DomainError::NotYourFeed).await?;
                    let position_a = tx
                        .feed()
                        .position(a)
                        .await?
                        .ok_or(DomainError::FeedNotFound)?;
                    let position_b = tx
                        .feed()
                        .position(b)
                        .await?
                        .ok_or(DomainError::FeedNotFound)?;
                    tx.feed().set_position(a, position_b).await?;
                    tx.feed().set_position(b, position_a).await?;
                    Ok(())
                })
                .await
        })
        .await
    }

    pub async fn authors(
        &self,
        feed: &str,
        me: Option<&str>,
    ) -> Result<Vec<Following<UserPublicStats>>, ServiceError> {
        timed("FeedService.authors", async {
            let feed = parse_uuid("feedId", feed)?;
            let me = parse_optional_uuid("me", me)?;
            self.storage
                .transaction(|tx| async move {
                    ensure_feed_exists(&tx, feed).await?;
                    let authors = tx.feed().authors(feed).await?;
                    Ok(following::users(&tx, authors, me).await?)
                })
                .await
        })
        .await
    }

    pub async fn topics(
        &self,
        feed: &str,
        me: Option<&str>,
    ) -> Result<Vec<Following<TopicStats>>, ServiceError> {
        timed("FeedService.topics", async {
            let feed = parse_uuid("feedId", feed)?;
            let me = parse_optional_uuid("me", me)?;
            self.storage
                .transaction(|tx| async move {
                    ensure_feed_exists(&tx, feed).await?;
                    let topics = tx.feed().topics(feed).await?;
                    Ok(following::topics(&tx, topics, me).await?)
                })
                .await
        })
        .await
    }

    /// The user's feeds in display order.
    pub async fn user_feeds(&self, user: &str) -> Result<Vec<FeedRecord>, ServiceError> {
        timed("FeedService.user_feeds", async {
            let user = parse_uuid("userId", user)?;
            let mut feeds = self
                .storage
                .transaction(|tx| async move {
                    ensure_user_exists(&tx, user).await?;
                    Ok::<_, ServiceError>(tx.feed().by_owner(user).await?)
                })
                .await?;
            feeds.sort_by_key(|feed| feed.position);
            Ok(feeds)
        })
        .await
    }

    /// Unseen posts drawn from the feed's topics and authors, in random order.
    pub async fn posts(
        &self,
        feed: &str,
        me: Option<&str>,
    ) -> Result<Vec<PostStats>, ServiceError> {
        timed("FeedService.posts", async {
            let feed = parse_uuid("feedId", feed)?;
            let me = parse_optional_uuid("me", me)?;
            let mut posts = self
                .storage
                .transaction(|tx| async move {
                    let sources = tx
                        .feed()
                        .sources(feed)
                        .await?
                        .ok_or(DomainError::FeedNotFound)?;
                    let query = feed_query(sources, me);
                    Ok::<_, ServiceError>(tx.post_stats().matching(&query).await?)
                })
                .await?;
            shuffle(&mut posts, &mut rand::thread_rng());
            Ok(posts)
        })
        .await
    }

    /// Posts from followed authors and topics the user has not seen yet.
    pub async fn home(&self, user: &str) -> Result<Vec<PostStats>, ServiceError> {
        timed("FeedService.home", async {
            let user = parse_uuid("userId", user)?;
            let mut posts = self
                .storage
                .transaction(|tx| async move {
                    ensure_user_exists(&tx, user).await?;
                    let authors = tx.user().followed_authors(user).await?;
                    let topics = tx.topic().followed_topics(user).await?;
                    let query = home_query(user, authors, topics);
                    Ok::<_, ServiceError>(tx.post_stats().matching(&query).await?)
                })
                .await?;
            shuffle(&mut posts, &mut rand::thread_rng());
            Ok(posts)
        })
        .await
    }
}

async fn owned_feed(
    tx: &DataStorage,
    feed: Uuid,
    me: Uuid,
    not_owner: DomainError,
) -> Result<FeedRecord, ServiceError> {
    let record = tx
        .feed()
        .by_id(feed)
        .await?
        .ok_or(DomainError::FeedNotFound)?;
    if record.owner_id != me {
        return Err(not_owner.into());
    }
    Ok(record)
}

async fn ensure_feed_exists(tx: &DataStorage, feed: Uuid) -> Result<(), ServiceError> {
    match tx.feed().by_id(feed).await? {
        Some(_) => Ok(()),
        None => Err(DomainError::FeedNotFound.into()),
    }
}

async fn ensure_sources_exist(
    tx: &DataStorage,
    topics: &[String],
    authors: &[Uuid],
) -> Result<(), ServiceError> {
    if !topics.is_empty() {
        if let Existence::Missing(missing) = tx.topic().exist(topics).await? {
            return Err(DomainError::topics_not_found(&missing).into());
        }
    }
    if !authors.is_empty() {
        ensure_users_exist(tx, authors).await?;
    }
    Ok(())
}

/// Reject an update that would leave the feed with neither topics nor
/// authors. A list left out of the update keeps its stored contents.
async fn ensure_sources_remain(
    tx: &DataStorage,
    feed: Uuid,
    topics: Option<&[String]>,
    authors: Option<&[Uuid]>,
) -> Result<(), ServiceError> {
    let stored = tx
        .feed()
        .sources(feed)
        .await?
        .ok_or(DomainError::FeedNotFound)?;
    let topics_left = topics.map_or(stored.topics.len(), <[String]>::len);
    let authors_left = authors.map_or(stored.authors.len(), <[Uuid]>::len);
    if topics_left == 0 && authors_left == 0 {
        return Err(DomainError::FeedTopicsAndAuthors.into());
    }
    Ok(())
}

fn parse_authors(values: Vec<String>) -> Result<Vec<Uuid>, ValidationError> {
    values
        .iter()
        .map(|value| parse_uuid("authors", value))
        .collect()
}

/// Size and repetition rules for feed sources. `require_any` rejects a feed
/// left with neither topics nor authors.
fn check_sources(
    topics: Option<&[String]>,
    authors: Option<&[Uuid]>,
    require_any: bool,
) -> Result<(), DomainError> {
    let topics = topics.unwrap_or_default();
    let authors = authors.unwrap_or_default();
    if topics.len() > MAX_TOPICS || authors.len() > MAX_AUTHORS {
        return Err(DomainError::FeedTopicsAndAuthors);
    }
    if require_any && topics.is_empty() && authors.is_empty() {
        return Err(DomainError::FeedTopicsAndAuthors);
    }
    if has_repetitions(topics) {
        return Err(DomainError::RepeatedTopics);
    }
    if has_repetitions(authors) {
        return Err(DomainError::RepeatedAuthors);
    }
    Ok(())
}
