//! Validated, immutable form of the cache policy table.

use std::{
    collections::{HashMap, HashSet},
    fmt,
    time::Duration,
};

use thiserror::Error;

use super::{
    catalog::{Module, Operation},
    policy::PolicyRecord,
};

#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum PlanError {
    #[error("operation `{0}` is not part of the storage catalog")]
    UnknownOperation(String),
    #[error("mask of {mask_len} entries for `{operation}` exceeds its {arity} parameters")]
    MaskTooLong {
        operation: String,
        mask_len: usize,
        arity: usize,
    },
    #[error("`{0}` is cached with a zero TTL")]
    ZeroTtl(String),
    #[error("`{0}` is registered more than once")]
    Duplicate(String),
    #[error("`{0}` is both cached and an invalidation trigger")]
    DualRole(String),
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct CachedRule {
    pub operation: Operation,
    pub arg_mask: Vec<bool>,
    pub ttl: Duration,
}

/// A cached operation whose key a trigger call rebuilds.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct InvalidationTarget {
    pub target: Operation,
    pub arg_mask: Vec<bool>,
}

/// What the cache layer does with a call.
#[derive(Debug, Clone, Copy)]
pub enum Role<'a> {
    Cached(&'a CachedRule),
    Invalidating(&'a [InvalidationTarget]),
    Passthrough,
}

type OperationId = (Module, &'static str);

#[derive(Debug, Default)]
pub struct CachePlan {
    cached: HashMap<OperationId, CachedRule>,
    index: HashMap<OperationId, Vec<InvalidationTarget>>,
}

impl CachePlan {
    /// Validate `table` against `catalog` and invert its triggers.
    pub fn build(table: &[PolicyRecord], catalog: &[Operation]) -> Result<Self, PlanError> {
        let known: HashSet<OperationId> = catalog.iter().map(Operation::id).collect();
        let check = |operation: &Operation, mask: &[bool]| -> Result<(), PlanError> {
            if !known.contains(&operation.id()) {
                return Err(PlanError::UnknownOperation(operation.to_string()));
            }
            if mask.len() > operation.arity() {
                return Err(PlanError::MaskTooLong {
                    operation: operation.to_string(),
                    mask_len: mask.len(),
                    arity: operation.arity(),
                });
            }
            Ok(())
        };

        let mut plan = CachePlan::default();
        for record in table {
            check(&record.operation, &record.arg_mask)?;
            if record.ttl_secs == 0 {
                return Err(PlanError::ZeroTtl(record.operation.to_string()));
            }
            let rule = CachedRule {
                operation: record.operation,
                arg_mask: record.arg_mask.clone(),
                ttl: Duration::from_secs(record.ttl_secs),
            };
            if plan.cached.insert(record.operation.id(), rule).is_some() {
                return Err(PlanError::Duplicate(record.operation.to_string()));
            }
        }

        for record in table {
            for trigger in &record.invalidated_by {
                check(&trigger.operation, &trigger.arg_mask)?;
                if plan.cached.contains_key(&trigger.operation.id()) {
                    return Err(PlanError::DualRole(trigger.operation.to_string()));
                }
                plan.index
                    .entry(trigger.operation.id())
                    .or_default()
                    .push(InvalidationTarget {
                        target: record.operation,
                        arg_mask: trigger.arg_mask.clone(),
                    });
            }
        }

        Ok(plan)
    }

    pub fn role(&self, operation: &Operation) -> Role<'_> {
        let id = operation.id();
        if let Some(rule) = self.cached.get(&id) {
            return Role::Cached(rule);
        }
        match self.index.get(&id) {
            Some(targets) => Role::Invalidating(targets),
            None => Role::Passthrough,
        }
    }

    pub fn cached_len(&self) -> usize {
        self.cached.len()
    }

    pub fn trigger_len(&self) -> usize {
        self.index.len()
    }
}

impl fmt::Display for CachePlan {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let mut cached: Vec<&CachedRule> = self.cached.values().collect();
        cached.sort_by_key(|rule| rule.operation.to_string());
        writeln!(f, "cached operations:")?;
        for rule in cached {
            writeln!(
                f,
                "  {} mask={} ttl={}s",
                rule.operation,
                mask_str(&rule.arg_mask),
                rule.ttl.as_secs()
            )?;
        }

        let mut triggers: Vec<(String, &Vec<InvalidationTarget>)> = self
            .index
            .iter()
            .map(|((module, name), targets)| (format!("{}.{}", module.as_str(), name), targets))
            .collect();
        triggers.sort_by(|a, b| a.0.cmp(&b.0));
        writeln!(f, "invalidation index:")?;
        for (trigger, targets) in triggers {
            let described: Vec<String> = targets
                .iter()
                .map(|target| format!("{}{}", target.target, mask_str(&target.arg_mask)))
                .collect();
            writeln!(f, "  {trigger} -> {}", described.join(", "))?;
        }
        Ok(())
    }
}

fn mask_str(mask: &[bool]) -> String {
    let flags: Vec<&str> = mask.iter().map(|keep| if *keep { "t" } else { "f" }).collect();
    format!("[{}]", flags.join(","))
}
