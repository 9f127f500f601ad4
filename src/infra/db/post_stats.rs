use async_trait::async_trait;
use sqlx::{Postgres, QueryBuilder};
use time::OffsetDateTime;
use uuid::Uuid;

use crate::{
    application::{
        pagination::{PageResult, Paging},
        repos::{PostMatchQuery, PostSearchFilter, PostStatsStore, RepoError},
    },
    domain::{
        constraints::posts::TRENDING_SIZE,
        entities::{AuthorSummary, PostStats, PostViewerState},
        types::{Difficulty, TrendingWindow},
    },
};

use super::{PgScope, util::escape_like};

const POST_STATS_COLUMNS: &str = "ps.id, ps.title, ps.description, ps.difficulty, ps.created_at, \
     ps.topics, ps.ranking_position, ps.avg_rating, ps.rates_count, ps.views_count, ps.score, \
     u.id AS author_id, u.name AS author_name, u.image AS author_image, \
     u.created_at AS author_created_at";

const POST_STATS_FROM: &str = " FROM post_stats ps INNER JOIN users u ON u.id = ps.author_id";

#[derive(sqlx::FromRow)]
pub(super) struct PostStatsRow {
    id: Uuid,
    title: String,
    description: Option<String>,
    difficulty: Option<Difficulty>,
    created_at: OffsetDateTime,
    topics: Vec<String>,
    ranking_position: i64,
    avg_rating: f64,
    rates_count: i64,
    views_count: i64,
    score: f64,
    author_id: Uuid,
    author_name: String,
    author_image: Option<String>,
    author_created_at: OffsetDateTime,
}

impl From<PostStatsRow> for PostStats {
    fn from(row: PostStatsRow) -> Self {
        Self {
            id: row.id,
            title: row.title,
            description: row.description,
            difficulty: row.difficulty,
            created_at: row.created_at,
            author: AuthorSummary {
                id: row.author_id,
                name: row.author_name,
                image: row.author_image,
                created_at: row.author_created_at,
            },
            topics: row.topics,
            ranking_position: row.ranking_position,
            avg_rating: row.avg_rating,
            rates_count: row.rates_count,
            views_count: row.views_count,
            score: row.score,
        }
    }
}

#[derive(sqlx::FromRow)]
struct ViewerStateRow {
    i_read: bool,
    i_saved: bool,
    i_rated: Option<i32>,
}

pub(crate) struct PgPostStatsStore {
    scope: PgScope,
}

impl PgPostStatsStore {
    pub(crate) fn new(scope: PgScope) -> Self {
        Self { scope }
    }

    fn select() -> QueryBuilder<'static, Postgres> {
        let mut qb = QueryBuilder::new("SELECT ");
        qb.push(POST_STATS_COLUMNS);
        qb.push(POST_STATS_FROM);
        qb.push(" WHERE TRUE");
        qb
    }

    fn count() -> QueryBuilder<'static, Postgres> {
        let mut qb = QueryBuilder::new("SELECT COUNT(*)");
        qb.push(POST_STATS_FROM);
        qb.push(" WHERE TRUE");
        qb
    }

    fn push_search_filter<'a>(
        qb: &mut QueryBuilder<'a, Postgres>,
        query: Option<&str>,
        filter: &PostSearchFilter,
    ) {
        if let Some(query) = query {
            let pattern = format!("%{}%", escape_like(query));
            qb.push(" AND (ps.title ILIKE ");
            qb.push_bind(pattern.clone());
            qb.push(" OR ps.description ILIKE ");
            qb.push_bind(pattern);
            qb.push(")");
        }
        if let Some(topics) = filter.topics.as_ref() {
            qb.push(" AND ps.topics && ");
            qb.push_bind(topics.clone());
        }
        if let Some(difficulty) = filter.difficulty {
            qb.push(" AND ps.difficulty = ");
            qb.push_bind(difficulty);
        }
    }

    fn push_page(qb: &mut QueryBuilder<'_, Postgres>, paging: Paging) {
        qb.push(" ORDER BY ps.created_at DESC, ps.id LIMIT ");
        qb.push_bind(paging.limit());
        qb.push(" OFFSET ");
        qb.push_bind(paging.skip());
    }

    async fn page(
        &self,
        mut rows: QueryBuilder<'_, Postgres>,
        mut count: QueryBuilder<'_, Postgres>,
        paging: Paging,
    ) -> Result<PageResult<PostStats>, RepoError> {
        Self::push_page(&mut rows, paging);
        let data = self
            .scope
            .fetch_all(rows.build_query_as::<PostStatsRow>())
            .await?;
        let total = self.scope.count(count.build_query_as()).await?;
        Ok(paging.build(data.into_iter().map(PostStats::from).collect(), total))
    }
}

#[async_trait]
impl PostStatsStore for PgPostStatsStore {
    async fn by_id(&self, post_id: Uuid) -> Result<Option<PostStats>, RepoError> {
        let mut qb = Self::select();
        qb.push(" AND ps.id = ");
        qb.push_bind(post_id);
        let row = self
            .scope
            .fetch_optional(qb.build_query_as::<PostStatsRow>())
            .await?;
        Ok(row.map(PostStats::from))
    }

    async fn search(
        &self,
        query: Option<&str>,
        paging: Paging,
        filter: &PostSearchFilter,
    ) -> Result<PageResult<PostStats>, RepoError> {
        let mut rows = Self::select();
        Self::push_search_filter(&mut rows, query, filter);
        let mut count = Self::count();
        Self::push_search_filter(&mut count, query, filter);
        self.page(rows, count, paging).await
    }

    async fn trending(
        &self,
        window: TrendingWindow,
        topics: Option<&[String]>,
    ) -> Result<Vec<PostStats>, RepoError> {
        let mut qb = Self::select();
        qb.push(" AND ps.created_at > ");
        qb.push_bind(window.since(OffsetDateTime::now_utc()));
        if let Some(topics) = topics {
            qb.push(" AND ps.topics && ");
            qb.push_bind(topics.to_vec());
        }
        qb.push(" ORDER BY ps.score DESC, ps.created_at DESC LIMIT ");
        qb.push_bind(TRENDING_SIZE);

        let rows = self
            .scope
            .fetch_all(qb.build_query_as::<PostStatsRow>())
            .await?;
        Ok(rows.into_iter().map(PostStats::from).collect())
    }

    async fn published_by_user(
        &self,
        user_id: Uuid,
        paging: Paging,
    ) -> Result<PageResult<PostStats>, RepoError> {
        let mut rows = Self::select();
        rows.push(" AND ps.author_id = ");
        rows.push_bind(user_id);
        let mut count = Self::count();
        count.push(" AND ps.author_id = ");
        count.push_bind(user_id);
        self.page(rows, count, paging).await
    }

    async fn saved_by_user(
        &self,
        user_id: Uuid,
        paging: Paging,
    ) -> Result<PageResult<PostStats>, RepoError> {
        const SAVED: &str =
            " AND EXISTS (SELECT 1 FROM saved_posts sp WHERE sp.post_id = ps.id AND sp.user_id = ";
        let mut rows = Self::select();
        rows.push(SAVED);
        rows.push_bind(user_id);
        rows.push(")");
        let mut count = Self::count();
        count.push(SAVED);
        count.push_bind(user_id);
        count.push(")");
        self.page(rows, count, paging).await
    }

    async fn viewer_state(
        &self,
        post_id: Uuid,
        user_id: Uuid,
    ) -> Result<PostViewerState, RepoError> {
        let row = self
            .scope
            .fetch_one(
                sqlx::query_as::<_, ViewerStateRow>(
                    r#"
                    SELECT
                        EXISTS (SELECT 1 FROM post_views WHERE post_id = $1 AND user_id = $2) AS i_read,
                        EXISTS (SELECT 1 FROM saved_posts WHERE post_id = $1 AND user_id = $2) AS i_saved,
                        (SELECT rating FROM post_ratings WHERE post_id = $1 AND user_id = $2) AS i_rated
                    "#,
                )
                .bind(post_id)
                .bind(user_id),
            )
            .await?;

        Ok(PostViewerState {
            post_id,
            i_read: row.i_read,
            i_saved: row.i_saved,
            i_rated: row.i_rated,
        })
    }

    async fn matching(&self, query: &PostMatchQuery) -> Result<Vec<PostStats>, RepoError> {
        let mut qb = Self::select();
        if let Some(viewer) = query.unseen_by {
            qb.push(" AND NOT EXISTS (SELECT 1 FROM post_views pv WHERE pv.post_id = ps.id AND pv.user_id = ");
            qb.push_bind(viewer);
            qb.push(")");
        }
        if let Some(author) = query.exclude_author {
            qb.push(" AND ps.author_id <> ");
            qb.push_bind(author);
        }
        if !query.match_all {
            qb.push(" AND (ps.author_id = ANY(");
            qb.push_bind(query.authors.clone());
            qb.push(") OR ps.topics && ");
            qb.push_bind(query.topics.clone());
            qb.push(")");
        }
        qb.push(" ORDER BY ps.score DESC, ps.created_at DESC LIMIT ");
        qb.push_bind(query.limit);

        let rows = self
            .scope
            .fetch_all(qb.build_query_as::<PostStatsRow>())
            .await?;
        Ok(rows.into_iter().map(PostStats::from).collect())
    }
}
