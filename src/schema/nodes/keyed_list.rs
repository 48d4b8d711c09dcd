//! Keyed list node: an association list where both the key and the value
//! are themselves schemas (so keys can carry variables too, e.g.
//! `{{name}}: {{value}}` query-string-style pairs), accumulated rather
//! than keyed by a fixed Rust-side map.

use serde_json::Value as Json;

use crate::errors::{PardonError, Result, SchemaErrorKind};
use crate::schema::{ExecutionContext, Schema};
use crate::scope::{ScopeArena, ScopeId, ScriptEnvironment};

#[derive(Debug, Clone, PartialEq)]
pub struct KeyedEntry {
    pub key: Schema,
    pub value: Schema,
}

#[derive(Debug, Clone, PartialEq)]
pub struct KeyedListNode {
    /// Template schema new keys must be compatible with.
    pub key_template: Box<Schema>,
    /// Template schema new values must be compatible with.
    pub value_template: Box<Schema>,
    pub entries: Vec<KeyedEntry>,
}

impl KeyedListNode {
    pub fn new(key_template: Schema, value_template: Schema) -> Self {
        Self {
            key_template: Box::new(key_template),
            value_template: Box::new(value_template),
            entries: Vec::new(),
        }
    }

    pub fn with_entry(mut self, key: Schema, value: Schema) -> Self {
        self.entries.push(KeyedEntry { key, value });
        self
    }
}

pub fn merge(a: &KeyedListNode, b: &KeyedListNode, ctx: ExecutionContext) -> Result<KeyedListNode> {
    let key_template = Box::new(a.key_template.merge(&b.key_template, ctx)?);
    let value_template = Box::new(a.value_template.merge(&b.value_template, ctx)?);

    let mut entries = a.entries.clone();
    'outer: for b_entry in &b.entries {
        for slot in entries.iter_mut() {
            if let Ok(merged_key) = slot.key.merge(&b_entry.key, ctx) {
                let merged_value = slot.value.merge(&b_entry.value, ctx)?;
                slot.key = merged_key;
                slot.value = merged_value;
                continue 'outer;
            }
        }
        entries.push(b_entry.clone());
    }

    Ok(KeyedListNode {
        key_template,
        value_template,
        entries,
    })
}

pub fn scope(node: &KeyedListNode, arena: &mut ScopeArena, parent: &ScopeId) -> Result<ScopeId> {
    let own = arena.subscope(parent);
    for (i, entry) in node.entries.iter().enumerate() {
        let entry_scope = own.child(i.to_string());
        entry.key.scope(arena, &entry_scope.child("key"))?;
        entry.value.scope(arena, &entry_scope.child("value"))?;
    }
    Ok(own)
}

pub fn render(
    node: &KeyedListNode,
    arena: &mut ScopeArena,
    scope_id: &ScopeId,
    env: &dyn ScriptEnvironment,
    ctx: ExecutionContext,
) -> Result<Json> {
    let mut out = Vec::new();
    for (i, entry) in node.entries.iter().enumerate() {
        let entry_scope = scope_id.child(i.to_string());
        let key = entry.key.render(arena, &entry_scope.child("key"), env, ctx)?;
        if key.is_null() {
            return Err(missing_key_error());
        }
        let value = entry.value.render(arena, &entry_scope.child("value"), env, ctx)?;
        out.push(Json::Array(vec![key, value]));
    }
    Ok(Json::Array(out))
}

pub fn resolve(node: &KeyedListNode, arena: &ScopeArena, scope_id: &ScopeId) -> Result<Json> {
    let mut out = Vec::new();
    for (i, entry) in node.entries.iter().enumerate() {
        let entry_scope = scope_id.child(i.to_string());
        let key = entry.key.resolve(arena, &entry_scope.child("key"))?;
        let value = entry
            .value
            .resolve(arena, &entry_scope.child("value"))
            .unwrap_or(Json::Null);
        out.push(Json::Array(vec![key, value]));
    }
    Ok(Json::Array(out))
}

pub(crate) fn missing_key_error() -> PardonError {
    PardonError::schema(SchemaErrorKind::Missing, "$", "keyed list entry has no key")
}
