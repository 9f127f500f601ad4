use async_trait::async_trait;
use sqlx::{Postgres, QueryBuilder};
use time::OffsetDateTime;
use uuid::Uuid;

use crate::{
    application::repos::{CreateFeedParams, FeedStore, RepoError, UpdateFeedParams},
    domain::entities::{FeedRecord, FeedSources, FeedUpdate, TopicStats, UserPublicStats},
};

use super::{
    PgScope,
    topics::TopicStatsRow,
    user_stats::{UserStatsRow, public_columns},
    util::unique,
};

const FEED_COLUMNS: &str = "id, name, owner_id, position, created_at, updated_at";

#[derive(sqlx::FromRow)]
struct FeedRow {
    id: Uuid,
    name: String,
    owner_id: Uuid,
    position: i32,
    created_at: OffsetDateTime,
    updated_at: OffsetDateTime,
}

impl From<FeedRow> for FeedRecord {
    fn from(row: FeedRow) -> Self {
        Self {
            id: row.id,
            name: row.name,
            owner_id: row.owner_id,
            position: row.position,
            created_at: row.created_at,
            updated_at: row.updated_at,
        }
    }
}

pub(crate) struct PgFeedStore {
    scope: PgScope,
}

impl PgFeedStore {
    pub(crate) fn new(scope: PgScope) -> Self {
        Self { scope }
    }

    async fn insert_topics(&self, feed_id: Uuid, topics: &[String]) -> Result<(), RepoError> {
        let topics = unique(topics);
        if topics.is_empty() {
            return Ok(());
        }
        let mut qb: QueryBuilder<'_, Postgres> =
            QueryBuilder::new("INSERT INTO feed_topics (feed_id, topic_id) ");
        qb.push_values(topics, |mut row, topic| {
            row.push_bind(feed_id).push_bind(topic);
        });
        self.scope.execute(qb.build()).await?;
        Ok(())
    }

    async fn insert_authors(&self, feed_id: Uuid, authors: &[Uuid]) -> Result<(), RepoError> {
        let authors = unique(authors);
        if authors.is_empty() {
            return Ok(());
        }
        let mut qb: QueryBuilder<'_, Postgres> =
            QueryBuilder::new("INSERT INTO feed_authors (feed_id, author_id) ");
        qb.push_values(authors, |mut row, author| {
            row.push_bind(feed_id).push_bind(author);
        });
        self.scope.execute(qb.build()).await?;
        Ok(())
    }

    async fn topic_ids(&self, feed_id: Uuid) -> Result<Vec<String>, RepoError> {
        let rows = self
            .scope
            .fetch_all(
                sqlx::query_as::<_, (String,)>(
                    "SELECT topic_id FROM feed_topics WHERE feed_id = $1 ORDER BY topic_id",
                )
                .bind(feed_id),
            )
            .await?;
        Ok(rows.into_iter().map(|(id,)| id).collect())
    }

    async fn author_ids(&self, feed_id: Uuid) -> Result<Vec<Uuid>, RepoError> {
        let rows = self
            .scope
            .fetch_all(
                sqlx::query_as::<_, (Uuid,)>(
                    "SELECT author_id FROM feed_authors WHERE feed_id = $1 ORDER BY author_id",
                )
                .bind(feed_id),
            )
            .await?;
        Ok(rows.into_iter().map(|(id,)| id).collect())
    }
}

#[async_trait]
impl FeedStore for PgFeedStore {
    async fn by_id(&self, feed_id: Uuid) -> Result<Option<FeedRecord>, RepoError> {
        let row = self
            .scope
            .fetch_optional(
                sqlx::query_as::<_, FeedRow>(&format!(
                    "SELECT {FEED_COLUMNS} FROM feeds WHERE id = $1"
                ))
                .bind(feed_id),
            )
            .await?;
        Ok(row.map(FeedRecord::from))
    }

    async fn create(&self, params: &CreateFeedParams) -> Result<FeedRecord, RepoError> {
        let row = self
            .scope
            .fetch_one(
                sqlx::query_as::<_, FeedRow>(&format!(
                    "INSERT INTO feeds (owner_id, name, position) VALUES ($1, $2, $3) \
                     RETURNING {FEED_COLUMNS}"
                ))
                .bind(params.owner_id)
                .bind(&params.name)
                .bind(params.position),
            )
            .await?;
        self.insert_topics(row.id, &params.topics).await?;
        self.insert_authors(row.id, &params.authors).await?;
        Ok(row.into())
    }

    async fn delete(&self, feed_id: Uuid) -> Result<FeedRecord, RepoError> {
        let row = self
            .scope
            .fetch_optional(
                sqlx::query_as::<_, FeedRow>(&format!(
                    "DELETE FROM feeds WHERE id = $1 RETURNING {FEED_COLUMNS}"
                ))
                .bind(feed_id),
            )
            .await?;
        row.map(FeedRecord::from).ok_or(RepoError::NotFound)
    }

    async fn update(
        &self,
        feed_id: Uuid,
        params: &UpdateFeedParams,
    ) -> Result<FeedUpdate, RepoError> {
        let row = self
            .scope
            .fetch_optional(
                sqlx::query_as::<_, FeedRow>(&format!(
                    "UPDATE feeds SET name = COALESCE($2, name), updated_at = now() \
                     WHERE id = $1 RETURNING {FEED_COLUMNS}"
                ))
                .bind(feed_id)
                .bind(params.name.as_deref()),
            )
            .await?
            .ok_or(RepoError::NotFound)?;

        if let Some(topics) = params.topics.as_deref() {
            self.scope
                .execute(sqlx::query("DELETE FROM feed_topics WHERE feed_id = $1").bind(feed_id))
                .await?;
            self.insert_topics(feed_id, topics).await?;
        }
        if let Some(authors) = params.authors.as_deref() {
            self.scope
                .execute(sqlx::query("DELETE FROM feed_authors WHERE feed_id = $1").bind(feed_id))
                .await?;
            self.insert_authors(feed_id, authors).await?;
        }

        Ok(FeedUpdate {
            feed: row.into(),
            topics: self.topic_ids(feed_id).await?,
            authors: self.author_ids(feed_id).await?,
        })
    }

    async fn max_position(&self, owner_id: Uuid) -> Result<i32, RepoError> {
        let (max,) = self
            .scope
            .fetch_one(
                sqlx::query_as::<_, (i32,)>(
                    "SELECT COALESCE(MAX(position), 0) FROM feeds WHERE owner_id = $1",
                )
                .bind(owner_id),
            )
            .await?;
        Ok(max)
    }

    async fn position(&self, feed_id: Uuid) -> Result<Option<i32>, RepoError> {
        let row = self
            .scope
            .fetch_optional(
                sqlx::query_as::<_, (i32,)>("SELECT position FROM feeds WHERE id = $1")
                    .bind(feed_id),
            )
            .await?;
        Ok(row.map(|(position,)| position))
    }

    async fn set_position(&self, feed_id: Uuid, position: i32) -> Result<(), RepoError> {
        let result = self
            .scope
            .execute(
                sqlx::query("UPDATE feeds SET position = $2, updated_at = now() WHERE id = $1")
                    .bind(feed_id)
                    .bind(position),
            )
            .await?;
        if result.rows_affected() == 0 {
            return Err(RepoError::NotFound);
        }
        Ok(())
    }

    async fn authors(&self, feed_id: Uuid) -> Result<Vec<UserPublicStats>, RepoError> {
        let rows = self
            .scope
            .fetch_all(
                sqlx::query_as::<_, UserStatsRow>(&format!(
                    "SELECT {} FROM user_stats us \
                     INNER JOIN feed_authors fa ON fa.author_id = us.id \
                     WHERE fa.feed_id = $1 ORDER BY us.name, us.id",
                    public_columns()
                ))
                .bind(feed_id),
            )
            .await?;
        Ok(rows.into_iter().map(UserPublicStats::from).collect())
    }

    async fn topics(&self, feed_id: Uuid) -> Result<Vec<TopicStats>, RepoError> {
        let rows = self
            .scope
            .fetch_all(
                sqlx::query_as::<_, TopicStatsRow>(
                    "SELECT ts.id, ts.posts_count, ts.followers_count FROM topic_stats ts \
                     INNER JOIN feed_topics ft ON ft.topic_id = ts.id \
                     WHERE ft.feed_id = $1 ORDER BY ts.id",
                )
                .bind(feed_id),
            )
            .await?;
        Ok(rows.into_iter().map(TopicStats::from).collect())
    }

    async fn by_owner(&self, owner_id: Uuid) -> Result<Vec<FeedRecord>, RepoError> {
        let rows = self
            .scope
            .fetch_all(
                sqlx::query_as::<_, FeedRow>(&format!(
                    "SELECT {FEED_COLUMNS} FROM feeds WHERE owner_id = $1 ORDER BY position"
                ))
                .bind(owner_id),
            )
            .await?;
        Ok(rows.into_iter().map(FeedRecord::from).collect())
    }

    async fn sources(&self, feed_id: Uuid) -> Result<Option<FeedSources>, RepoError> {
        if self.position(feed_id).await?.is_none() {
            return Ok(None);
        }
        Ok(Some(FeedSources {
            topics: self.topic_ids(feed_id).await?,
            authors: self.author_ids(feed_id).await?,
        }))
    }
}
