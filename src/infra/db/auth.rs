use async_trait::async_trait;
use time::OffsetDateTime;
use uuid::Uuid;

use crate::{
    application::repos::{AuthStore, RepoError},
    domain::{constraints::auth::SESSION_TTL, entities::SessionRecord},
};

use super::PgScope;

#[derive(sqlx::FromRow)]
struct SessionRow {
    id: Uuid,
    user_id: Uuid,
    expires_at: OffsetDateTime,
}

impl From<SessionRow> for SessionRecord {
    fn from(row: SessionRow) -> Self {
        Self {
            id: row.id,
            user_id: row.user_id,
            expires_at: row.expires_at,
        }
    }
}

pub(crate) struct PgAuthStore {
    scope: PgScope,
}

impl PgAuthStore {
    pub(crate) fn new(scope: PgScope) -> Self {
        Self { scope }
    }
}

#[async_trait]
impl AuthStore for PgAuthStore {
    async fn create_session(&self, user_id: Uuid) -> Result<SessionRecord, RepoError> {
        let row = self
            .scope
            .fetch_one(
                sqlx::query_as::<_, SessionRow>(
                    "INSERT INTO sessions (user_id, expires_at) VALUES ($1, $2) \
                     RETURNING id, user_id, expires_at",
                )
                .bind(user_id)
                .bind(OffsetDateTime::now_utc() + SESSION_TTL),
            )
            .await?;
        Ok(row.into())
    }

    async fn delete_session(&self, session_id: Uuid) -> Result<SessionRecord, RepoError> {
        let row = self
            .scope
            .fetch_optional(
                sqlx::query_as::<_, SessionRow>(
                    "DELETE FROM sessions WHERE id = $1 RETURNING id, user_id, expires_at",
                )
                .bind(session_id),
            )
            .await?;
        row.map(SessionRecord::from).ok_or(RepoError::NotFound)
    }
}
