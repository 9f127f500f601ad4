//! Postgres-backed storage modules.
//!
//! Every module shares a [`PgScope`]: either the pool or one open transaction.
//! Modules built from a transaction scope run all their statements on that
//! transaction's connection.

mod auth;
mod feeds;
mod me;
mod post_stats;
mod posts;
mod topics;
mod user_stats;
mod users;
mod util;

pub use util::map_sqlx_error;

use std::sync::Arc;

use async_trait::async_trait;
use sqlx::{
    FromRow, Postgres, Transaction,
    postgres::{PgArguments, PgPool, PgPoolOptions, PgQueryResult, PgRow},
    query::{Query, QueryAs},
};
use tokio::sync::Mutex;
use tracing::debug;

use crate::application::{
    repos::{RepoError, StorageModules},
    storage::{IsolationLevel, StorageBackend},
};

type SharedTransaction = Arc<Mutex<Option<Transaction<'static, Postgres>>>>;

#[derive(Clone)]
pub(crate) struct PgScope {
    pool: PgPool,
    tx: Option<SharedTransaction>,
}

impl PgScope {
    pub(crate) async fn fetch_all<'q, T>(
        &self,
        query: QueryAs<'q, Postgres, T, PgArguments>,
    ) -> Result<Vec<T>, RepoError>
    where
        T: for<'r> FromRow<'r, PgRow> + Send + Unpin,
    {
        match &self.tx {
            None => query.fetch_all(&self.pool).await,
            Some(tx) => {
                let mut guard = tx.lock().await;
                let conn = guard.as_mut().ok_or(RepoError::TransactionClosed)?;
                query.fetch_all(&mut **conn).await
            }
        }
        .map_err(map_sqlx_error)
    }

    pub(crate) async fn fetch_optional<'q, T>(
        &self,
        query: QueryAs<'q, Postgres, T, PgArguments>,
    ) -> Result<Option<T>, RepoError>
    where
        T: for<'r> FromRow<'r, PgRow> + Send + Unpin,
    {
        match &self.tx {
            None => query.fetch_optional(&self.pool).await,
            Some(tx) => {
                let mut guard = tx.lock().await;
                let conn = guard.as_mut().ok_or(RepoError::TransactionClosed)?;
                query.fetch_optional(&mut **conn).await
            }
        }
        .map_err(map_sqlx_error)
    }

    pub(crate) async fn fetch_one<'q, T>(
        &self,
        query: QueryAs<'q, Postgres, T, PgArguments>,
    ) -> Result<T, RepoError>
    where
        T: for<'r> FromRow<'r, PgRow> + Send + Unpin,
    {
        match &self.tx {
            None => query.fetch_one(&self.pool).await,
            Some(tx) => {
                let mut guard = tx.lock().await;
                let conn = guard.as_mut().ok_or(RepoError::TransactionClosed)?;
                query.fetch_one(&mut **conn).await
            }
        }
        .map_err(map_sqlx_error)
    }

    pub(crate) async fn execute<'q>(
        &self,
        query: Query<'q, Postgres, PgArguments>,
    ) -> Result<PgQueryResult, RepoError> {
        match &self.tx {
            None => query.execute(&self.pool).await,
            Some(tx) => {
                let mut guard = tx.lock().await;
                let conn = guard.as_mut().ok_or(RepoError::TransactionClosed)?;
                query.execute(&mut **conn).await
            }
        }
        .map_err(map_sqlx_error)
    }

    /// Row count of a `SELECT COUNT(*)` style query.
    pub(crate) async fn count<'q>(
        &self,
        query: QueryAs<'q, Postgres, (i64,), PgArguments>,
    ) -> Result<i64, RepoError> {
        self.fetch_one(query).await.map(|(count,)| count)
    }
}

/// Storage backend over a Postgres pool, or over one transaction taken from it.
#[derive(Clone)]
pub struct PgBackend {
    scope: PgScope,
}

impl PgBackend {
    pub fn new(pool: PgPool) -> Self {
        Self {
            scope: PgScope { pool, tx: None },
        }
    }

    pub fn pool(&self) -> &PgPool {
        &self.scope.pool
    }

    pub async fn connect(url: &str, max_connections: u32) -> Result<PgPool, sqlx::Error> {
        PgPoolOptions::new()
            .max_connections(max_connections)
            .connect(url)
            .await
    }

    pub async fn run_migrations(pool: &PgPool) -> Result<(), sqlx::Error> {
        sqlx::migrate!("./migrations")
            .run(pool)
            .await
            .map_err(Into::into)
    }

    pub async fn health_check(&self) -> Result<(), sqlx::Error> {
        sqlx::query("SELECT 1")
            .execute(self.pool())
            .await
            .map(|_| ())
    }

    async fn take_transaction(&self) -> Result<Transaction<'static, Postgres>, RepoError> {
        let Some(shared) = &self.scope.tx else {
            return Err(RepoError::TransactionClosed);
        };
        shared
            .lock()
            .await
            .take()
            .ok_or(RepoError::TransactionClosed)
    }
}

#[async_trait]
impl StorageBackend for PgBackend {
    fn modules(&self) -> StorageModules {
        let scope = &self.scope;
        StorageModules {
            user: Arc::new(users::PgUserStore::new(scope.clone())),
            post: Arc::new(posts::PgPostStore::new(scope.clone())),
            post_stats: Arc::new(post_stats::PgPostStatsStore::new(scope.clone())),
            user_stats: Arc::new(user_stats::PgUserStatsStore::new(scope.clone())),
            topic: Arc::new(topics::PgTopicStore::new(scope.clone())),
            topic_stats: Arc::new(topics::PgTopicStatsStore::new(scope.clone())),
            feed: Arc::new(feeds::PgFeedStore::new(scope.clone())),
            me: Arc::new(me::PgMeStore::new(scope.clone())),
            auth: Arc::new(auth::PgAuthStore::new(scope.clone())),
        }
    }

    fn in_transaction(&self) -> bool {
        self.scope.tx.is_some()
    }

    async fn begin(
        &self,
        isolation: IsolationLevel,
    ) -> Result<Arc<dyn StorageBackend>, RepoError> {
        let mut tx = self.scope.pool.begin().await.map_err(map_sqlx_error)?;
        let statement = format!("SET TRANSACTION ISOLATION LEVEL {}", isolation.as_sql());
        sqlx::query(&statement)
            .execute(&mut *tx)
            .await
            .map_err(map_sqlx_error)?;
        debug!(isolation = isolation.as_sql(), "postgres transaction opened");

        Ok(Arc::new(PgBackend {
            scope: PgScope {
                pool: self.scope.pool.clone(),
                tx: Some(Arc::new(Mutex::new(Some(tx)))),
            },
        }))
    }

    async fn commit(&self) -> Result<(), RepoError> {
        self.take_transaction()
            .await?
            .commit()
            .await
            .map_err(map_sqlx_error)
    }

    async fn rollback(&self) -> Result<(), RepoError> {
        self.take_transaction()
            .await?
            .rollback()
            .await
            .map_err(map_sqlx_error)
    }
}
