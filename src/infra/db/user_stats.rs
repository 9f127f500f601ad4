use async_trait::async_trait;
use sqlx::{Postgres, QueryBuilder};
use time::OffsetDateTime;
use uuid::Uuid;

use crate::{
    application::{
        pagination::{PageResult, Paging},
        repos::{RepoError, UserStatsStore},
    },
    domain::entities::{FollowSplit, UserPrivateStats, UserPublicStats},
};

use super::{PgScope, util::escape_like};

const USER_STATS_COLUMNS: &str = "us.id, us.name, us.image, us.created_at, us.avg_post_rating, \
     us.followers_count, us.ranking_position, us.posts_published, \
     us.topics_user_publishes_on, us.score";

#[derive(sqlx::FromRow)]
pub(super) struct UserStatsRow {
    id: Uuid,
    name: String,
    image: Option<String>,
    created_at: OffsetDateTime,
    avg_post_rating: f64,
    followers_count: i64,
    ranking_position: Option<i64>,
    posts_published: i64,
    topics_user_publishes_on: Vec<String>,
    score: f64,
}

impl From<UserStatsRow> for UserPublicStats {
    fn from(row: UserStatsRow) -> Self {
        Self {
            id: row.id,
            name: row.name,
            image: row.image,
            created_at: row.created_at,
            avg_post_rating: row.avg_post_rating,
            followers_count: row.followers_count,
            ranking_position: row.ranking_position,
            posts_published: row.posts_published,
            topics_user_publishes_on: row.topics_user_publishes_on,
            score: row.score,
        }
    }
}

#[derive(sqlx::FromRow)]
struct UserPrivateRow {
    #[sqlx(flatten)]
    public: UserStatsRow,
    email: String,
    name_updated_at: Option<OffsetDateTime>,
    image_updated_at: Option<OffsetDateTime>,
    signup_completed: bool,
}

/// Public user columns selected from `user_stats us`, for joins in other modules.
pub(super) fn public_columns() -> &'static str {
    USER_STATS_COLUMNS
}

pub(crate) struct PgUserStatsStore {
    scope: PgScope,
}

impl PgUserStatsStore {
    pub(crate) fn new(scope: PgScope) -> Self {
        Self { scope }
    }

    /// Run a listing whose filter is pushed by `filter` onto both the page and
    /// the count query.
    async fn page<F>(
        &self,
        paging: Paging,
        order: &str,
        filter: F,
    ) -> Result<PageResult<UserPublicStats>, RepoError>
    where
        F: Fn(&mut QueryBuilder<'static, Postgres>),
    {
        let mut rows = QueryBuilder::new("SELECT ");
        rows.push(USER_STATS_COLUMNS);
        rows.push(" FROM user_stats us WHERE TRUE");
        filter(&mut rows);
        rows.push(" ORDER BY ");
        rows.push(order);
        rows.push(" LIMIT ");
        rows.push_bind(paging.limit());
        rows.push(" OFFSET ");
        rows.push_bind(paging.skip());

        let mut count = QueryBuilder::new("SELECT COUNT(*) FROM user_stats us WHERE TRUE");
        filter(&mut count);

        let data = self
            .scope
            .fetch_all(rows.build_query_as::<UserStatsRow>())
            .await?;
        let total = self.scope.count(count.build_query_as()).await?;
        Ok(paging.build(data.into_iter().map(UserPublicStats::from).collect(), total))
    }
}

#[async_trait]
impl UserStatsStore for PgUserStatsStore {
    async fn public_by_id(&self, user_id: Uuid) -> Result<Option<UserPublicStats>, RepoError> {
        let row = self
            .scope
            .fetch_optional(
                sqlx::query_as::<_, UserStatsRow>(&format!(
                    "SELECT {USER_STATS_COLUMNS} FROM user_stats us WHERE us.id = $1"
                ))
                .bind(user_id),
            )
            .await?;
        Ok(row.map(UserPublicStats::from))
    }

    async fn private_by_id(&self, user_id: Uuid) -> Result<Option<UserPrivateStats>, RepoError> {
        let row = self
            .scope
            .fetch_optional(
                sqlx::query_as::<_, UserPrivateRow>(&format!(
                    "SELECT {USER_STATS_COLUMNS}, us.email, us.name_updated_at, \
                     us.image_updated_at, us.signup_completed \
                     FROM user_stats us WHERE us.id = $1"
                ))
                .bind(user_id),
            )
            .await?;
        Ok(row.map(|row| UserPrivateStats {
            public: row.public.into(),
            email: row.email,
            name_updated_at: row.name_updated_at,
            image_updated_at: row.image_updated_at,
            signup_completed: row.signup_completed,
        }))
    }

    async fn followers(
        &self,
        user_id: Uuid,
        paging: Paging,
    ) -> Result<PageResult<UserPublicStats>, RepoError> {
        self.page(paging, "us.name, us.id", |qb| {
            qb.push(" AND us.id IN (SELECT follower_id FROM user_follows WHERE user_id = ");
            qb.push_bind(user_id);
            qb.push(")");
        })
        .await
    }

    async fn follows(
        &self,
        user_id: Uuid,
        paging: Paging,
    ) -> Result<PageResult<UserPublicStats>, RepoError> {
        self.page(paging, "us.name, us.id", |qb| {
            qb.push(" AND us.id IN (SELECT user_id FROM user_follows WHERE follower_id = ");
            qb.push_bind(user_id);
            qb.push(")");
        })
        .await
    }

    async fn ranking(
        &self,
        topic_id: Option<&str>,
        paging: Paging,
    ) -> Result<PageResult<UserPublicStats>, RepoError> {
        let topic = topic_id.map(str::to_string);
        self.page(paging, "us.score DESC, us.created_at, us.id", |qb| match &topic {
            Some(topic) => {
                qb.push(" AND ");
                qb.push_bind(topic.clone());
                qb.push(" = ANY(us.topics_user_publishes_on)");
            }
            None => {
                qb.push(" AND cardinality(us.topics_user_publishes_on) > 0");
            }
        })
        .await
    }

    async fn search(
        &self,
        query: Option<&str>,
        paging: Paging,
    ) -> Result<PageResult<UserPublicStats>, RepoError> {
        let pattern = query.map(|query| format!("%{}%", escape_like(query)));
        self.page(paging, "us.name, us.id", |qb| {
            if let Some(pattern) = &pattern {
                qb.push(" AND us.name ILIKE ");
                qb.push_bind(pattern.clone());
            }
        })
        .await
    }

    async fn are_followed_by(
        &self,
        user_ids: &[Uuid],
        follower_id: Uuid,
    ) -> Result<FollowSplit<Uuid>, RepoError> {
        let followed: Vec<Uuid> = self
            .scope
            .fetch_all(
                sqlx::query_as::<_, (Uuid,)>(
                    "SELECT user_id FROM user_follows WHERE follower_id = $1 AND user_id = ANY($2)",
                )
                .bind(follower_id)
                .bind(user_ids.to_vec()),
            )
            .await?
            .into_iter()
            .map(|(id,)| id)
            .collect();

        let (following, not_following): (Vec<Uuid>, Vec<Uuid>) = user_ids
            .iter()
            .copied()
            .partition(|id| followed.contains(id));
        Ok(FollowSplit {
            following,
            not_following,
        })
    }

    async fn top_author_per_topic(
        &self,
        topic_ids: &[String],
    ) -> Result<Vec<UserPublicStats>, RepoError> {
        let rows = self
            .scope
            .fetch_all(
                sqlx::query_as::<_, UserStatsRow>(&format!(
                    r#"
                    SELECT {USER_STATS_COLUMNS}
                    FROM unnest($1::text[]) WITH ORDINALITY AS t(topic_id, ord)
                    CROSS JOIN LATERAL (
                        SELECT *
                        FROM user_stats inner_us
                        WHERE t.topic_id = ANY(inner_us.topics_user_publishes_on)
                        ORDER BY inner_us.score DESC, inner_us.created_at
                        LIMIT 1
                    ) us
                    ORDER BY t.ord
                    "#
                ))
                .bind(topic_ids.to_vec()),
            )
            .await?;
        Ok(rows.into_iter().map(UserPublicStats::from).collect())
    }
}
