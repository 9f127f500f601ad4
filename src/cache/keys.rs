//! Cache key derivation.
//!
//! A key is `module.operation.` followed by the JSON encoding of each argument
//! kept by the mask, concatenated. Mask positions past the end of the mask
//! are dropped.

use serde::Serialize;
use serde_json::Value;

use super::catalog::Operation;

pub fn cache_key(operation: &Operation, mask: &[bool], args: &[Value]) -> String {
    let mut key = format!("{}.{}.", operation.module.as_str(), operation.name);
    for (keep, arg) in mask.iter().zip(args) {
        if *keep {
            key.push_str(&arg.to_string());
        }
    }
    key
}

/// One encoded call argument. A failed encoding keeps its error so the layer
/// can refuse to derive a key from it.
pub type KeyArg = Result<Value, serde_json::Error>;

/// Encode one call argument for key derivation.
pub fn arg<T: Serialize + ?Sized>(value: &T) -> KeyArg {
    serde_json::to_value(value)
}
