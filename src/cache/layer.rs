//! Read-through caching and write-triggered eviction around storage calls.

use std::{future::Future, sync::Arc};

use serde::{Serialize, de::DeserializeOwned};
use serde_json::Value;

use crate::application::{
    repos::{RepoError, StorageModules},
    storage::StorageLayer,
};

use super::{
    catalog::Operation,
    decorators,
    events::{EventKind, record, record_error},
    keys::{KeyArg, cache_key},
    plan::{CachePlan, InvalidationTarget, Role},
    store::CacheStore,
};

#[derive(Clone)]
pub struct CacheLayer {
    plan: Arc<CachePlan>,
    store: Arc<dyn CacheStore>,
}

impl CacheLayer {
    pub fn new(plan: Arc<CachePlan>, store: Arc<dyn CacheStore>) -> Self {
        Self { plan, store }
    }

    pub fn plan(&self) -> &CachePlan {
        &self.plan
    }

    /// Run one storage call under the role the plan assigns to `operation`.
    pub async fn intercept<T, Fut>(
        &self,
        operation: Operation,
        args: &[KeyArg],
        call: Fut,
    ) -> Result<T, RepoError>
    where
        T: Serialize + DeserializeOwned,
        Fut: Future<Output = Result<T, RepoError>>,
    {
        match self.plan.role(&operation) {
            Role::Cached(rule) => {
                let Some(args) = key_args(&operation, args) else {
                    return call.await;
                };
                let key = cache_key(&operation, &rule.arg_mask, &args);
                if let Some(hit) = self.lookup::<T>(&operation, &key).await {
                    return Ok(hit);
                }
                record(EventKind::Miss, &operation, &key);

                let value = call.await?;
                self.remember(&operation, &key, &value, rule.ttl).await;
                Ok(value)
            }
            Role::Invalidating(targets) => {
                let value = call.await?;
                if let Some(args) = key_args(&operation, args) {
                    self.evict(&operation, targets, &args);
                }
                Ok(value)
            }
            Role::Passthrough => call.await,
        }
    }

    async fn lookup<T: DeserializeOwned>(&self, operation: &Operation, key: &str) -> Option<T> {
        let cached = match self.store.get(key).await {
            Ok(cached) => cached?,
            Err(err) => {
                record_error("get", operation, key, &err);
                return None;
            }
        };
        match serde_json::from_value::<T>(cached) {
            Ok(value) => {
                record(EventKind::Hit, operation, key);
                Some(value)
            }
            Err(err) => {
                record_error("decode", operation, key, &err);
                None
            }
        }
    }

    async fn remember<T: Serialize>(
        &self,
        operation: &Operation,
        key: &str,
        value: &T,
        ttl: std::time::Duration,
    ) {
        let encoded = match serde_json::to_value(value) {
            Ok(Value::Null) => return,
            Ok(encoded) => encoded,
            Err(err) => {
                record_error("encode", operation, key, &err);
                return;
            }
        };
        match self.store.set(key, encoded, ttl).await {
            Ok(()) => record(EventKind::Store, operation, key),
            Err(err) => record_error("set", operation, key, &err),
        }
    }

    /// Evict every key the trigger call touches.
    ///
    /// Eviction runs on a detached task after the write has returned, so a read
    /// issued right after the write can still observe the old cached value.
    fn evict(&self, trigger: &Operation, targets: &[InvalidationTarget], args: &[Value]) {
        let keys: Vec<(Operation, String)> = targets
            .iter()
            .map(|target| {
                (
                    target.target,
                    cache_key(&target.target, &target.arg_mask, args),
                )
            })
            .collect();
        let store = Arc::clone(&self.store);
        let trigger = *trigger;

        tokio::spawn(async move {
            for (target, key) in keys {
                match store.invalidate(&key).await {
                    Ok(()) => record(EventKind::Invalidate, &target, &key),
                    Err(err) => record_error("invalidate", &trigger, &key, &err),
                }
            }
        });
    }
}

/// Encoded arguments, or `None` when one of them failed to encode and no key
/// can be derived.
fn key_args(operation: &Operation, args: &[KeyArg]) -> Option<Vec<Value>> {
    let encoded: Result<Vec<Value>, _> = args.iter().map(|arg| arg.as_ref().cloned()).collect();
    match encoded {
        Ok(values) => Some(values),
        Err(err) => {
            record_error("encode_args", operation, "", err);
            None
        }
    }
}

impl StorageLayer for CacheLayer {
    fn wrap(&self, modules: StorageModules) -> StorageModules {
        decorators::wrap(self, modules)
    }
}
