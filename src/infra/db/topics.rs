use async_trait::async_trait;
use sqlx::{Postgres, QueryBuilder};
use uuid::Uuid;

use crate::{
    application::{
        pagination::{PageResult, Paging},
        repos::{RepoError, TopicStatsStore, TopicStore},
    },
    domain::entities::{Existence, FollowSplit, TopicStats},
};

use super::{
    PgScope,
    util::{escape_like, unique},
};

#[derive(sqlx::FromRow)]
pub(super) struct TopicStatsRow {
    id: String,
    posts_count: i64,
    followers_count: i64,
}

impl From<TopicStatsRow> for TopicStats {
    fn from(row: TopicStatsRow) -> Self {
        Self {
            id: row.id,
            posts_count: row.posts_count,
            followers_count: row.followers_count,
        }
    }
}

pub(crate) struct PgTopicStore {
    scope: PgScope,
}

impl PgTopicStore {
    pub(crate) fn new(scope: PgScope) -> Self {
        Self { scope }
    }
}

#[async_trait]
impl TopicStore for PgTopicStore {
    async fn follow(&self, topic_id: &str, follower_id: Uuid) -> Result<(), RepoError> {
        self.scope
            .execute(
                sqlx::query("INSERT INTO topic_follows (topic_id, follower_id) VALUES ($1, $2)")
                    .bind(topic_id)
                    .bind(follower_id),
            )
            .await?;
        Ok(())
    }

    async fn unfollow(&self, topic_id: &str, follower_id: Uuid) -> Result<(), RepoError> {
        self.scope
            .execute(
                sqlx::query("DELETE FROM topic_follows WHERE topic_id = $1 AND follower_id = $2")
                    .bind(topic_id)
                    .bind(follower_id),
            )
            .await?;
        Ok(())
    }

    async fn is_followed_by_user(
        &self,
        topic_id: &str,
        user_id: Uuid,
    ) -> Result<bool, RepoError> {
        let count = self
            .scope
            .count(
                sqlx::query_as(
                    "SELECT COUNT(*) FROM topic_follows WHERE topic_id = $1 AND follower_id = $2",
                )
                .bind(topic_id)
                .bind(user_id),
            )
            .await?;
        Ok(count > 0)
    }

    async fn exist(&self, topic_ids: &[String]) -> Result<Existence<String>, RepoError> {
        let requested = unique(topic_ids);
        let found: Vec<String> = self
            .scope
            .fetch_all(
                sqlx::query_as::<_, (String,)>("SELECT id FROM topics WHERE id = ANY($1)")
                    .bind(&requested),
            )
            .await?
            .into_iter()
            .map(|(id,)| id)
            .collect();
        Ok(Existence::from_found(&requested, &found))
    }

    async fn followed_topics(&self, user_id: Uuid) -> Result<Vec<String>, RepoError> {
        let rows = self
            .scope
            .fetch_all(
                sqlx::query_as::<_, (String,)>(
                    "SELECT topic_id FROM topic_follows WHERE follower_id = $1 ORDER BY topic_id",
                )
                .bind(user_id),
            )
            .await?;
        Ok(rows.into_iter().map(|(id,)| id).collect())
    }
}

pub(crate) struct PgTopicStatsStore {
    scope: PgScope,
}

impl PgTopicStatsStore {
    pub(crate) fn new(scope: PgScope) -> Self {
        Self { scope }
    }

    async fn page(
        &self,
        mut rows: QueryBuilder<'_, Postgres>,
        mut count: QueryBuilder<'_, Postgres>,
        paging: Paging,
    ) -> Result<PageResult<TopicStats>, RepoError> {
        rows.push(" ORDER BY ts.id LIMIT ");
        rows.push_bind(paging.limit());
        rows.push(" OFFSET ");
        rows.push_bind(paging.skip());

        let data = self
            .scope
            .fetch_all(rows.build_query_as::<TopicStatsRow>())
            .await?;
        let total = self.scope.count(count.build_query_as()).await?;
        Ok(paging.build(data.into_iter().map(TopicStats::from).collect(), total))
    }
}

#[async_trait]
impl TopicStatsStore for PgTopicStatsStore {
    async fn search(
        &self,
        query: Option<&str>,
        paging: Paging,
    ) -> Result<PageResult<TopicStats>, RepoError> {
        let mut rows: QueryBuilder<'_, Postgres> = QueryBuilder::new(
            "SELECT ts.id, ts.posts_count, ts.followers_count FROM topic_stats ts WHERE TRUE",
        );
        let mut count: QueryBuilder<'_, Postgres> =
            QueryBuilder::new("SELECT COUNT(*) FROM topic_stats ts WHERE TRUE");
        if let Some(query) = query {
            let pattern = format!("%{}%", escape_like(query));
            rows.push(" AND ts.id ILIKE ");
            rows.push_bind(pattern.clone());
            count.push(" AND ts.id ILIKE ");
            count.push_bind(pattern);
        }
        self.page(rows, count, paging).await
    }

    async fn by_id(&self, topic_id: &str) -> Result<Option<TopicStats>, RepoError> {
        let row = self
            .scope
            .fetch_optional(
                sqlx::query_as::<_, TopicStatsRow>(
                    "SELECT id, posts_count, followers_count FROM topic_stats WHERE id = $1",
                )
                .bind(topic_id),
            )
            .await?;
        Ok(row.map(TopicStats::from))
    }

    async fn followed_by_user(
        &self,
        user_id: Uuid,
        paging: Paging,
    ) -> Result<PageResult<TopicStats>, RepoError> {
        const FOLLOWED: &str =
            " AND ts.id IN (SELECT topic_id FROM topic_follows WHERE follower_id = ";
        let mut rows: QueryBuilder<'_, Postgres> = QueryBuilder::new(
            "SELECT ts.id, ts.posts_count, ts.followers_count FROM topic_stats ts WHERE TRUE",
        );
        rows.push(FOLLOWED);
        rows.push_bind(user_id);
        rows.push(")");
        let mut count: QueryBuilder<'_, Postgres> =
            QueryBuilder::new("SELECT COUNT(*) FROM topic_stats ts WHERE TRUE");
        count.push(FOLLOWED);
        count.push_bind(user_id);
        count.push(")");
        self.page(rows, count, paging).await
    }

    async fn are_followed_by(
        &self,
        topic_ids: &[String],
        user_id: Uuid,
    ) -> Result<FollowSplit<String>, RepoError> {
        let followed: Vec<String> = self
            .scope
            .fetch_all(
                sqlx::query_as::<_, (String,)>(
                    "SELECT topic_id FROM topic_follows WHERE follower_id = $1 AND topic_id = ANY($2)",
                )
                .bind(user_id)
                .bind(topic_ids.to_vec()),
            )
            .await?
            .into_iter()
            .map(|(id,)| id)
            .collect();

        let (following, not_following): (Vec<String>, Vec<String>) = topic_ids
            .iter()
            .cloned()
            .partition(|id| followed.contains(id));
        Ok(FollowSplit {
            following,
            not_following,
        })
    }

    async fn random(&self, count: i64) -> Result<Vec<TopicStats>, RepoError> {
        let rows = self
            .scope
            .fetch_all(
                sqlx::query_as::<_, TopicStatsRow>(
                    "SELECT id, posts_count, followers_count FROM topic_stats ORDER BY random() LIMIT $1",
                )
                .bind(count),
            )
            .await?;
        Ok(rows.into_iter().map(TopicStats::from).collect())
    }
}
