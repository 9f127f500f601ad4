use async_trait::async_trait;
use sqlx::{Postgres, QueryBuilder};
use uuid::Uuid;

use crate::application::repos::{CreatePostParams, PostStore, RepoError};

use super::PgScope;

pub(crate) struct PgPostStore {
    scope: PgScope,
}

impl PgPostStore {
    pub(crate) fn new(scope: PgScope) -> Self {
        Self { scope }
    }
}

#[async_trait]
impl PostStore for PgPostStore {
    async fn create(&self, params: &CreatePostParams) -> Result<Uuid, RepoError> {
        let (id,) = self
            .scope
            .fetch_one(
                sqlx::query_as::<_, (Uuid,)>(
                    r#"
                    INSERT INTO posts (author_id, title, description, difficulty)
                    VALUES ($1, $2, $3, $4)
                    RETURNING id
                    "#,
                )
                .bind(params.author_id)
                .bind(&params.title)
                .bind(&params.description)
                .bind(params.difficulty),
            )
            .await?;

        if !params.topics.is_empty() {
            let mut qb: QueryBuilder<'_, Postgres> =
                QueryBuilder::new("INSERT INTO post_topics (post_id, topic_id) ");
            qb.push_values(&params.topics, |mut row, topic| {
                row.push_bind(id).push_bind(topic);
            });
            self.scope.execute(qb.build()).await?;
        }

        Ok(id)
    }

    async fn delete(&self, post_id: Uuid) -> Result<Uuid, RepoError> {
        let (id,) = self
            .scope
            .fetch_optional(
                sqlx::query_as::<_, (Uuid,)>("DELETE FROM posts WHERE id = $1 RETURNING id")
                    .bind(post_id),
            )
            .await?
            .ok_or(RepoError::NotFound)?;
        Ok(id)
    }

    async fn rate(&self, post_id: Uuid, user_id: Uuid, rating: i32) -> Result<(), RepoError> {
        self.scope
            .execute(
                sqlx::query(
                    r#"
                    INSERT INTO post_ratings (post_id, user_id, rating)
                    VALUES ($1, $2, $3)
                    ON CONFLICT (post_id, user_id) DO UPDATE SET rating = EXCLUDED.rating
                    "#,
                )
                .bind(post_id)
                .bind(user_id)
                .bind(rating),
            )
            .await?;
        Ok(())
    }

    async fn view(&self, post_id: Uuid, user_id: Uuid) -> Result<(), RepoError> {
        self.scope
            .execute(
                sqlx::query("INSERT INTO post_views (post_id, user_id) VALUES ($1, $2)")
                    .bind(post_id)
                    .bind(user_id),
            )
            .await?;
        Ok(())
    }

    async fn has_viewed(&self, post_id: Uuid, user_id: Uuid) -> Result<bool, RepoError> {
        let count = self
            .scope
            .count(
                sqlx::query_as("SELECT COUNT(*) FROM post_views WHERE post_id = $1 AND user_id = $2")
                    .bind(post_id)
                    .bind(user_id),
            )
            .await?;
        Ok(count > 0)
    }

    async fn exists(&self, post_id: Uuid) -> Result<bool, RepoError> {
        let count = self
            .scope
            .count(sqlx::query_as("SELECT COUNT(*) FROM posts WHERE id = $1").bind(post_id))
            .await?;
        Ok(count > 0)
    }
}
