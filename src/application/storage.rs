//! Transactional storage facade.
//!
//! `DataStorage` exposes every storage module through one value. It is bound
//! either to the root backend or to an open transaction; nested
//! `run_in_transaction` calls reuse the open transaction instead of starting a
//! new one.

use std::{future::Future, sync::Arc};

use async_trait::async_trait;
use tracing::{debug, warn};

use crate::application::repos::{
    AuthStore, FeedStore, MeStore, PostStatsStore, PostStore, RepoError, StorageModules,
    TopicStatsStore, TopicStore, UserStatsStore, UserStore,
};

#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum IsolationLevel {
    ReadCommitted,
    #[default]
    RepeatableRead,
    Serializable,
}

impl IsolationLevel {
    pub fn as_sql(self) -> &'static str {
        match self {
            IsolationLevel::ReadCommitted => "READ COMMITTED",
            IsolationLevel::RepeatableRead => "REPEATABLE READ",
            IsolationLevel::Serializable => "SERIALIZABLE",
        }
    }
}

/// A connection scope able to hand out storage modules and open transactions.
#[async_trait]
pub trait StorageBackend: Send + Sync {
    /// Modules bound to this scope's connection.
    fn modules(&self) -> StorageModules;

    fn in_transaction(&self) -> bool;

    /// Open a transaction and return a backend bound to it.
    async fn begin(&self, isolation: IsolationLevel)
    -> Result<Arc<dyn StorageBackend>, RepoError>;

    async fn commit(&self) -> Result<(), RepoError>;

    async fn rollback(&self) -> Result<(), RepoError>;
}

/// Wraps raw storage modules, e.g. with cache interception.
pub trait StorageLayer: Send + Sync {
    fn wrap(&self, modules: StorageModules) -> StorageModules;
}

#[derive(Clone)]
pub struct DataStorage {
    backend: Arc<dyn StorageBackend>,
    layer: Option<Arc<dyn StorageLayer>>,
    modules: StorageModules,
}

impl DataStorage {
    pub fn new(backend: Arc<dyn StorageBackend>, layer: Option<Arc<dyn StorageLayer>>) -> Self {
        let modules = compose(backend.as_ref(), layer.as_deref());
        Self {
            backend,
            layer,
            modules,
        }
    }

    pub fn in_transaction(&self) -> bool {
        self.backend.in_transaction()
    }

    /// Run `block` inside one logical transaction at the default isolation level.
    pub async fn transaction<T, E, F, Fut>(&self, block: F) -> Result<T, E>
    where
        F: FnOnce(DataStorage) -> Fut,
        Fut: Future<Output = Result<T, E>>,
        E: From<RepoError>,
    {
        self.run_in_transaction(IsolationLevel::default(), block)
            .await
    }

    /// Run `block` inside one logical transaction.
    ///
    /// When this facade is already transactional the block receives it directly
    /// and `isolation` is ignored. Otherwise a transaction is opened, the block
    /// gets a facade bound to it (sharing the same storage layer), and the
    /// transaction commits on `Ok` and rolls back on `Err`.
    pub async fn run_in_transaction<T, E, F, Fut>(
        &self,
        isolation: IsolationLevel,
        block: F,
    ) -> Result<T, E>
    where
        F: FnOnce(DataStorage) -> Fut,
        Fut: Future<Output = Result<T, E>>,
        E: From<RepoError>,
    {
        if self.backend.in_transaction() {
            return block(self.clone()).await;
        }

        let backend = self.backend.begin(isolation).await.map_err(E::from)?;
        debug!(isolation = isolation.as_sql(), "transaction opened");

        let scoped = DataStorage {
            modules: compose(backend.as_ref(), self.layer.as_deref()),
            backend: Arc::clone(&backend),
            layer: self.layer.clone(),
        };

        match block(scoped).await {
            Ok(value) => {
                backend.commit().await.map_err(E::from)?;
                Ok(value)
            }
            Err(err) => {
                if let Err(rollback_err) = backend.rollback().await {
                    warn!(error = %rollback_err, "transaction rollback failed");
                }
                Err(err)
            }
        }
    }

    pub fn user(&self) -> &dyn UserStore {
        self.modules.user.as_ref()
    }

    pub fn post(&self) -> &dyn PostStore {
        self.modules.post.as_ref()
    }

    pub fn post_stats(&self) -> &dyn PostStatsStore {
        self.modules.post_stats.as_ref()
    }

    pub fn user_stats(&self) -> &dyn UserStatsStore {
        self.modules.user_stats.as_ref()
    }

    pub fn topic(&self) -> &dyn TopicStore {
        self.modules.topic.as_ref()
    }

    pub fn topic_stats(&self) -> &dyn TopicStatsStore {
        self.modules.topic_stats.as_ref()
    }

    pub fn feed(&self) -> &dyn FeedStore {
        self.modules.feed.as_ref()
    }

    pub fn me(&self) -> &dyn MeStore {
        self.modules.me.as_ref()
    }

    pub fn auth(&self) -> &dyn AuthStore {
        self.modules.auth.as_ref()
    }
}

fn compose(backend: &dyn StorageBackend, layer: Option<&dyn StorageLayer>) -> StorageModules {
    let modules = backend.modules();
    match layer {
        Some(layer) => layer.wrap(modules),
        None => modules,
    }
}
