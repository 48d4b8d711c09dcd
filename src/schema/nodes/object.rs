//! Object node: a keyed map of named fields, plus an optional archetype
//! schema applied to any key not explicitly listed (keyed-object
//! templates like `{{key}}: <archetype>`). A structured field (object,
//! array, keyed-list) gets its own child scope; a scalar or reference
//! field shares the object's own scope, so sibling fields can name the
//! same pattern variable and be checked for consistency (see
//! `field_scope_id`).

use indexmap::IndexMap;
use serde_json::Value as Json;

use crate::errors::{PardonError, Result, SchemaErrorKind};
use crate::schema::{incompatible, ExecutionContext, Schema};
use crate::scope::{ScopeArena, ScopeId, ScriptEnvironment};

#[derive(Debug, Clone, PartialEq)]
pub struct ObjectNode {
    pub fields: IndexMap<String, Schema>,
    pub archetype: Option<Box<Schema>>,
    /// Hidden fields (spec's "Stub / Hidden" node kind): scoped and
    /// rendered exactly like `fields`, so a `{{name = expr}}` binding
    /// here still resolves and defines `name` for sibling fields, but
    /// the rendered value itself never appears in the object's output
    /// (e.g. an HTTPS template's `computations` map).
    pub hidden: IndexMap<String, Schema>,
}

impl ObjectNode {
    pub fn new() -> Self {
        Self {
            fields: IndexMap::new(),
            archetype: None,
            hidden: IndexMap::new(),
        }
    }

    pub fn with_field(mut self, name: impl Into<String>, schema: Schema) -> Self {
        self.fields.insert(name.into(), schema);
        self
    }

    pub fn with_hidden_field(mut self, name: impl Into<String>, schema: Schema) -> Self {
        self.hidden.insert(name.into(), schema);
        self
    }
}

impl Default for ObjectNode {
    fn default() -> Self {
        Self::new()
    }
}

pub fn merge(a: &ObjectNode, b: &ObjectNode, ctx: ExecutionContext) -> Result<ObjectNode> {
    require_compatible(a, b)?;
    let mut fields = IndexMap::new();
    for (key, a_field) in &a.fields {
        fields.insert(key.clone(), a_field.clone());
    }
    for (key, b_field) in &b.fields {
        match fields.get(key) {
            Some(existing) => {
                let merged = existing.merge(b_field, ctx).map_err(|e| {
                    if let PardonError::Schema { kind, message, .. } = e {
                        PardonError::schema(kind, format!(".{key}"), message)
                    } else {
                        e
                    }
                })?;
                fields.insert(key.clone(), merged);
            }
            None => {
                fields.insert(key.clone(), b_field.clone());
            }
        }
    }

    let archetype = match (&a.archetype, &b.archetype) {
        (Some(x), Some(y)) => Some(Box::new(x.merge(y, ctx)?)),
        (Some(x), None) => Some(x.clone()),
        (None, Some(y)) => Some(y.clone()),
        (None, None) => None,
    };

    let mut hidden = IndexMap::new();
    for (key, a_field) in &a.hidden {
        hidden.insert(key.clone(), a_field.clone());
    }
    for (key, b_field) in &b.hidden {
        match hidden.get(key) {
            Some(existing) => {
                hidden.insert(key.clone(), existing.merge(b_field, ctx)?);
            }
            None => {
                hidden.insert(key.clone(), b_field.clone());
            }
        }
    }

    Ok(ObjectNode { fields, archetype, hidden })
}

/// A scalar or reference field shares its enclosing object's own scope
/// rather than getting a private child scope: two fields templated from
/// the same named variable (`{a: "{{x}}", b: "{{x}}"}`) name the *same*
/// binding, and a conflicting concrete value for one must be visible as
/// a conflict when the other resolves (spec scenario S2, "redefined:x").
/// A field that's itself structured (object/array/keyed-list) still gets
/// its own child scope so its internal addressing doesn't collide with a
/// same-named sibling.
fn field_scope_id(own: &ScopeId, key: &str, field: &Schema) -> ScopeId {
    let mut leaf = field;
    while let Schema::Redacted(inner) = leaf {
        leaf = inner;
    }
    match leaf {
        Schema::Scalar(_) | Schema::Reference(_) => own.clone(),
        _ => own.child(key),
    }
}

pub fn scope(node: &ObjectNode, arena: &mut ScopeArena, parent: &ScopeId) -> Result<ScopeId> {
    let own = arena.subscope(parent);
    for (key, field) in &node.fields {
        let field_scope = field_scope_id(&own, key, field);
        field.scope(arena, &field_scope)?;
    }
    for (key, field) in &node.hidden {
        let field_scope = field_scope_id(&own, key, field);
        field.scope(arena, &field_scope)?;
    }
    Ok(own)
}

pub fn render(
    node: &ObjectNode,
    arena: &mut ScopeArena,
    scope_id: &ScopeId,
    env: &dyn ScriptEnvironment,
    ctx: ExecutionContext,
) -> Result<Json> {
    let mut map = serde_json::Map::new();
    for (key, field) in &node.fields {
        let field_scope = field_scope_id(scope_id, key, field);
        let value = field.render(arena, &field_scope, env, ctx).map_err(|e| {
            if let PardonError::Schema { kind, message, .. } = e {
                PardonError::schema(kind, format!(".{key}"), message)
            } else {
                e
            }
        })?;
        map.insert(key.clone(), value);
    }
    for (key, field) in &node.hidden {
        let field_scope = field_scope_id(scope_id, key, field);
        field.render(arena, &field_scope, env, ctx).map_err(|e| {
            if let PardonError::Schema { kind, message, .. } = e {
                PardonError::schema(kind, format!(".{key}"), message)
            } else {
                e
            }
        })?;
    }
    Ok(Json::Object(map))
}

pub fn resolve(node: &ObjectNode, arena: &ScopeArena, scope_id: &ScopeId) -> Result<Json> {
    let mut map = serde_json::Map::new();
    for (key, field) in &node.fields {
        let field_scope = field_scope_id(scope_id, key, field);
        if let Ok(value) = field.resolve(arena, &field_scope) {
            map.insert(key.clone(), value);
        }
    }
    Ok(Json::Object(map))
}

pub(crate) fn require_compatible(a: &ObjectNode, b: &ObjectNode) -> Result<()> {
    let a_empty = a.fields.is_empty() && a.hidden.is_empty() && a.archetype.is_none();
    let b_empty = b.fields.is_empty() && b.hidden.is_empty() && b.archetype.is_none();
    if a_empty && b_empty {
        return Err(incompatible(
            "$",
            &Schema::Object(a.clone()),
            &Schema::Object(b.clone()),
        ));
    }
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::schema::nodes::scalar::ScalarNode;
    use crate::schema::Mode;

    #[test]
    fn test_merge_disjoint_fields() {
        let a = ObjectNode::new().with_field("id", Schema::Scalar(ScalarNode::string_literal("1")));
        let b = ObjectNode::new().with_field("name", Schema::Scalar(ScalarNode::string_literal("x")));
        let merged = merge(&a, &b, ExecutionContext::build(Mode::Mix)).unwrap();
        assert!(merged.fields.contains_key("id"));
        assert!(merged.fields.contains_key("name"));
    }

    #[test]
    fn test_merge_both_empty_objects_incompatible() {
        let a = ObjectNode::new();
        let b = ObjectNode::new();
        let err = merge(&a, &b, ExecutionContext::build(Mode::Mix)).unwrap_err();
        assert!(err.is_schema_kind(SchemaErrorKind::Incompatible));
    }

    #[test]
    fn test_render_scoped_per_field() {
        let node = ObjectNode::new()
            .with_field("id", Schema::Scalar(ScalarNode::string_literal("42")))
            .with_field("name", Schema::Scalar(ScalarNode::string_literal("widget")));
        let mut arena = ScopeArena::new();
        let root = arena.root();
        let scope = Schema::Object(node.clone()).scope(&mut arena, &root).unwrap();
        let env = crate::scope::MapEnvironment::default();
        let value = render(&node, &mut arena, &scope, &env, ExecutionContext::build(Mode::Render)).unwrap();
        assert_eq!(value["id"], "42");
        assert_eq!(value["name"], "widget");
    }
}
