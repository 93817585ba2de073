//! Frozen-result cache shared by every run of an executor.
//!
//! A frozen node is served from here instead of executing, provided a
//! previous run stored a result under the same key. Keys combine the
//! template id with a hash of the node's fully resolved inputs, so a
//! frozen node still re-executes the moment anything feeding it changes.

use std::hash::{Hash, Hasher};

use parking_lot::Mutex;
use rustc_hash::{FxHashMap, FxHasher};
use serde_json::Value;

use crate::types::TemplateId;

/// Identity of one cacheable invocation.
#[derive(Clone, Debug, PartialEq, Eq, Hash)]
pub struct CacheKey {
    pub template: TemplateId,
    pub input_hash: u64,
}

impl CacheKey {
    #[must_use]
    pub fn new(template: &TemplateId, inputs: &FxHashMap<String, Value>) -> Self {
        Self {
            template: template.clone(),
            input_hash: hash_inputs(inputs),
        }
    }
}

/// Hash the resolved input map independent of field iteration order.
///
/// Nested objects are `serde_json::Map`s, which iterate sorted by key, so
/// only the outer map needs explicit ordering.
fn hash_inputs(inputs: &FxHashMap<String, Value>) -> u64 {
    let mut fields: Vec<(&String, &Value)> = inputs.iter().collect();
    fields.sort_unstable_by_key(|(field, _)| *field);

    let mut hasher = FxHasher::default();
    for (field, value) in fields {
        field.hash(&mut hasher);
        value.hash(&mut hasher);
    }
    hasher.finish()
}

/// A cached node result, enough to replay the node's settle without
/// running its body.
#[derive(Clone, Debug, PartialEq)]
pub struct CachedResult {
    pub value: Value,
    /// For conditional sources, the output the cached run took.
    pub active_output: Option<String>,
}

/// Concurrent store of settled results keyed by [`CacheKey`].
#[derive(Debug, Default)]
pub struct ResultCache {
    entries: Mutex<FxHashMap<CacheKey, CachedResult>>,
}

impl ResultCache {
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    #[must_use]
    pub fn get(&self, key: &CacheKey) -> Option<CachedResult> {
        self.entries.lock().get(key).cloned()
    }

    pub fn put(&self, key: CacheKey, result: CachedResult) {
        self.entries.lock().insert(key, result);
    }

    pub fn clear(&self) {
        self.entries.lock().clear();
    }

    #[must_use]
    pub fn len(&self) -> usize {
        self.entries.lock().len()
    }

    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.entries.lock().is_empty()
    }
}
