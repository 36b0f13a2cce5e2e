//! Listing context construction.
//!
//! A [`Context`] is the flattened, dot-path keyed snapshot of one listing
//! and its joined catalog attributes. It is built once per listing and
//! never mutated during evaluation; nested records flatten lazily at
//! lookup rather than being expanded up front.

use std::collections::BTreeMap;

use crate::value::Value;

/// Immutable flat map from dot-path key to typed value.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct Context(BTreeMap<String, Value>);

impl Context {
    pub fn new() -> Self {
        Context(BTreeMap::new())
    }

    pub fn insert(&mut self, key: impl Into<String>, value: Value) {
        self.0.insert(key.into(), value);
    }

    /// Look up a dot-path. An exact key wins; otherwise the path walks
    /// through nested `Record` values segment by segment.
    pub fn get(&self, path: &str) -> Option<&Value> {
        if let Some(v) = self.0.get(path) {
            return Some(v);
        }
        let (head, rest) = path.split_once('.')?;
        let mut cur = self.0.get(head)?;
        for seg in rest.split('.') {
            match cur {
                Value::Record(fields) => cur = fields.get(seg)?,
                _ => return None,
            }
        }
        Some(cur)
    }

    pub fn contains(&self, path: &str) -> bool {
        self.get(path).is_some()
    }

    pub fn is_empty(&self) -> bool {
        self.0.is_empty()
    }

    /// Top-level keys, in sorted order.
    pub fn keys(&self) -> impl Iterator<Item = &str> {
        self.0.keys().map(String::as_str)
    }

    /// Build a context from a listing JSON object. Scalar members become
    /// scalar entries; nested objects are kept as records and resolved
    /// via dot-paths at lookup. Null members are omitted.
    pub fn from_json(listing: &serde_json::Value) -> Context {
        let mut ctx = Context::new();
        if let serde_json::Value::Object(obj) = listing {
            for (k, v) in obj {
                if let Some(val) = Value::from_json(v) {
                    ctx.insert(k.clone(), val);
                }
            }
        }
        ctx
    }
}

/// Build a context from a listing plus its joined catalog entities, each
/// inserted under its relation name (`cpu_spec`, `gpu_spec`, ...). A
/// missing relation (`None` or non-object JSON) simply contributes no
/// keys.
pub fn build_context(
    listing: &serde_json::Value,
    related: &[(&str, Option<&serde_json::Value>)],
) -> Context {
    let mut ctx = Context::from_json(listing);
    for (name, entity) in related {
        let Some(entity) = entity else { continue };
        if !entity.is_object() {
            continue;
        }
        if let Some(val) = Value::from_json(entity) {
            ctx.insert(*name, val);
        }
    }
    ctx
}

// ──────────────────────────────────────────────
// Tests
// ──────────────────────────────────────────────
