use async_trait::async_trait;
use uuid::Uuid;

use crate::{
    application::repos::{CreateUserParams, RepoError, UserStore},
    domain::entities::Existence,
};

use super::{PgScope, util::unique};

pub(crate) struct PgUserStore {
    scope: PgScope,
}

impl PgUserStore {
    pub(crate) fn new(scope: PgScope) -> Self {
        Self { scope }
    }
}

#[async_trait]
impl UserStore for PgUserStore {
    async fn create(&self, params: &CreateUserParams) -> Result<Uuid, RepoError> {
        let (id,) = self
            .scope
            .fetch_one(
                sqlx::query_as::<_, (Uuid,)>(
                    "INSERT INTO users (email, name) VALUES ($1, $2) RETURNING id",
                )
                .bind(&params.email)
                .bind(&params.name),
            )
            .await?;
        Ok(id)
    }

    async fn is_followed_by_user(
        &self,
        user_id: Uuid,
        follower_id: Uuid,
    ) -> Result<bool, RepoError> {
        let count = self
            .scope
            .count(
                sqlx::query_as(
                    "SELECT COUNT(*) FROM user_follows WHERE user_id = $1 AND follower_id = $2",
                )
                .bind(user_id)
                .bind(follower_id),
            )
            .await?;
        Ok(count > 0)
    }

    async fn follow(&self, follower_id: Uuid, user_id: Uuid) -> Result<(), RepoError> {
        self.scope
            .execute(
                sqlx::query("INSERT INTO user_follows (user_id, follower_id) VALUES ($1, $2)")
                    .bind(user_id)
                    .bind(follower_id),
            )
            .await?;
        Ok(())
    }

    async fn unfollow(&self, follower_id: Uuid, user_id: Uuid) -> Result<(), RepoError> {
        let result = self
            .scope
            .execute(
                sqlx::query("DELETE FROM user_follows WHERE user_id = $1 AND follower_id = $2")
                    .bind(user_id)
                    .bind(follower_id),
            )
            .await?;
        if result.rows_affected() == 0 {
            return Err(RepoError::NotFound);
        }
        Ok(())
    }

    async fn exists_by_username(&self, name: &str) -> Result<bool, RepoError> {
        let count = self
            .scope
            .count(sqlx::query_as("SELECT COUNT(*) FROM users WHERE name = $1").bind(name))
            .await?;
        Ok(count > 0)
    }

    async fn exist(&self, user_ids: &[Uuid]) -> Result<Existence<Uuid>, RepoError> {
        let requested = unique(user_ids);
        let found: Vec<Uuid> = self
            .scope
            .fetch_all(
                sqlx::query_as::<_, (Uuid,)>("SELECT id FROM users WHERE id = ANY($1)")
                    .bind(&requested),
            )
            .await?
            .into_iter()
            .map(|(id,)| id)
            .collect();
        Ok(Existence::from_found(&requested, &found))
    }

    async fn followed_authors(&self, follower_id: Uuid) -> Result<Vec<Uuid>, RepoError> {
        let rows = self
            .scope
            .fetch_all(
                sqlx::query_as::<_, (Uuid,)>(
                    "SELECT user_id FROM user_follows WHERE follower_id = $1 ORDER BY created_at",
                )
                .bind(follower_id),
            )
            .await?;
        Ok(rows.into_iter().map(|(id,)| id).collect())
    }
}
