use async_trait::async_trait;
use uuid::Uuid;

use crate::application::repos::{MeStore, RepoError};

use super::PgScope;

pub(crate) struct PgMeStore {
    scope: PgScope,
}

impl PgMeStore {
    pub(crate) fn new(scope: PgScope) -> Self {
        Self { scope }
    }

    async fn update_user(&self, sql: &str, user_id: Uuid, value: &str) -> Result<(), RepoError> {
        let result = self
            .scope
            .execute(sqlx::query(sql).bind(user_id).bind(value))
            .await?;
        if result.rows_affected() == 0 {
            return Err(RepoError::NotFound);
        }
        Ok(())
    }
}

#[async_trait]
impl MeStore for PgMeStore {
    async fn delete(&self, user_id: Uuid) -> Result<Uuid, RepoError> {
        let row = self
            .scope
            .fetch_optional(
                sqlx::query_as::<_, (Uuid,)>("DELETE FROM users WHERE id = $1 RETURNING id")
                    .bind(user_id),
            )
            .await?;
        row.map(|(id,)| id).ok_or(RepoError::NotFound)
    }

    async fn update_name(&self, user_id: Uuid, name: &str) -> Result<(), RepoError> {
        self.update_user(
            "UPDATE users SET name = $2, name_updated_at = now() WHERE id = $1",
            user_id,
            name,
        )
        .await
    }

    async fn update_profile_picture(
        &self,
        user_id: Uuid,
        image_url: &str,
    ) -> Result<(), RepoError> {
        self.update_user(
            "UPDATE users SET image = $2, image_updated_at = now() WHERE id = $1",
            user_id,
            image_url,
        )
        .await
    }

    async fn has_completed_signup(&self, user_id: Uuid) -> Result<bool, RepoError> {
        let row = self
            .scope
            .fetch_optional(
                sqlx::query_as::<_, (bool,)>("SELECT signup_completed FROM users WHERE id = $1")
                    .bind(user_id),
            )
            .await?;
        Ok(row.is_some_and(|(completed,)| completed))
    }

    async fn complete_signup(&self, user_id: Uuid) -> Result<(), RepoError> {
        let result = self
            .scope
            .execute(
                sqlx::query("UPDATE users SET signup_completed = TRUE WHERE id = $1")
                    .bind(user_id),
            )
            .await?;
        if result.rows_affected() == 0 {
            return Err(RepoError::NotFound);
        }
        Ok(())
    }

    async fn exists_in_saved_posts(
        &self,
        user_id: Uuid,
        post_id: Uuid,
    ) -> Result<bool, RepoError> {
        let count = self
            .scope
            .count(
                sqlx::query_as(
                    "SELECT COUNT(*) FROM saved_posts WHERE user_id = $1 AND post_id = $2",
                )
                .bind(user_id)
                .bind(post_id),
            )
            .await?;
        Ok(count > 0)
    }

    async fn add_to_saved_posts(&self, user_id: Uuid, post_id: Uuid) -> Result<(), RepoError> {
        self.scope
            .execute(
                sqlx::query("INSERT INTO saved_posts (user_id, post_id) VALUES ($1, $2)")
                    .bind(user_id)
                    .bind(post_id),
            )
            .await?;
        Ok(())
    }

    async fn delete_from_saved_posts(
        &self,
        user_id: Uuid,
        post_id: Uuid,
    ) -> Result<(), RepoError> {
        let result = self
            .scope
            .execute(
                sqlx::query("DELETE FROM saved_posts WHERE user_id = $1 AND post_id = $2")
                    .bind(user_id)
                    .bind(post_id),
            )
            .await?;
        if result.rows_affected() == 0 {
            return Err(RepoError::NotFound);
        }
        Ok(())
    }
}
