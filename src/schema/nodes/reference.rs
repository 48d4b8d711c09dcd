//! Reference node: a named variable occurrence carrying the full hint set
//! (`! ? @ ~ + :`) and an optional `.$of` type schema it must resolve
//! compatibly with. [`ReferencePath`] is a small fluent builder mirroring
//! the `.@value` / `.@key` / `.$of` accessor chain from the spec's
//! reference grammar.

use serde_json::Value as Json;

use crate::errors::{PardonError, Result, SchemaErrorKind};
use crate::pattern::{Hint, HintSet};
use crate::schema::{incompatible, ExecutionContext, Schema};
use crate::scope::{ScopeArena, ScopeId, ScriptEnvironment};

#[derive(Debug, Clone, PartialEq)]
pub struct ReferenceNode {
    pub name: String,
    pub hints: HintSet,
    /// The type this reference must ultimately resolve compatibly with.
    pub of: Option<Box<Schema>>,
    /// Embedded `= expr` binding, if any — evaluated against the
    /// environment during render when nothing else has already bound
    /// `name` (mirrors a scalar pattern variable's `expr`).
    pub expr: Option<String>,
}

impl ReferenceNode {
    pub fn named(name: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            hints: HintSet::default(),
            of: None,
            expr: None,
        }
    }
}

/// Fluent builder for a [`ReferenceNode`], mirroring the spec's
/// `.@value` / `.@key` / `.$of` / `.$<Type>` accessor chain syntax.
#[derive(Debug, Clone)]
pub struct ReferencePath {
    name: String,
    hints: HintSet,
    of: Option<Box<Schema>>,
    expr: Option<String>,
}

impl ReferencePath {
    pub fn new(name: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            hints: HintSet::default(),
            of: None,
            expr: None,
        }
    }

    /// `.$expr(<src>)` — an `= expr` binding, evaluated if nothing else
    /// resolves this reference's name by render time.
    pub fn expr(mut self, src: impl Into<String>) -> Self {
        self.expr = Some(src.into());
        self
    }

    fn with_hint(mut self, hint: Hint) -> Self {
        self.hints.insert(hint);
        self
    }

    /// `!` required
    pub fn required(self) -> Self {
        self.with_hint(Hint::Required)
    }

    /// `?` optional
    pub fn optional(self) -> Self {
        self.with_hint(Hint::Optional)
    }

    /// `@` redact — corresponds to the spec's `.@value` accessor on a
    /// secret-bearing reference.
    pub fn redact(self) -> Self {
        self.with_hint(Hint::Redact)
    }

    /// `~` meld / offline-available
    pub fn meld(self) -> Self {
        self.with_hint(Hint::Meld)
    }

    /// `+` flow-export
    pub fn export(self) -> Self {
        self.with_hint(Hint::Export)
    }

    /// `.$of(<schema>)` — constrain the resolved type.
    pub fn of(mut self, schema: Schema) -> Self {
        self.of = Some(Box::new(schema));
        self
    }

    pub fn build(self) -> ReferenceNode {
        ReferenceNode {
            name: self.name,
            hints: self.hints,
            of: self.of,
            expr: self.expr,
        }
    }
}

pub fn merge_with(r: &ReferenceNode, other: &Schema, ctx: ExecutionContext) -> Result<Schema> {
    match other {
        Schema::Reference(r2) => {
            if r.name != r2.name {
                return Err(incompatible(
                    "$",
                    &Schema::Reference(r.clone()),
                    &Schema::Reference(r2.clone()),
                ));
            }
            let mut hints = r.hints.clone();
            for h in r2.hints.iter() {
                hints.insert(*h);
            }
            let of = match (&r.of, &r2.of) {
                (Some(x), Some(y)) => Some(Box::new(x.merge(y, ctx)?)),
                (Some(x), None) => Some(x.clone()),
                (None, Some(y)) => Some(y.clone()),
                (None, None) => None,
            };
            let expr = r.expr.clone().or_else(|| r2.expr.clone());
            Ok(Schema::Reference(ReferenceNode {
                name: r.name.clone(),
                hints,
                of,
                expr,
            }))
        }
        concrete => {
            let merged = match &r.of {
                Some(of_schema) => of_schema.merge(concrete, ctx)?,
                None => concrete.clone(),
            };
            if r.hints.contains(Hint::Redact) {
                Ok(Schema::Redacted(Box::new(merged)))
            } else {
                Ok(merged)
            }
        }
    }
}

pub fn scope(node: &ReferenceNode, arena: &mut ScopeArena, parent: &ScopeId) -> Result<ScopeId> {
    arena.declare(parent, &node.name, node.hints.clone(), node.expr.clone())?;
    Ok(parent.clone())
}

pub fn render(
    node: &ReferenceNode,
    arena: &mut ScopeArena,
    scope_id: &ScopeId,
    env: &dyn ScriptEnvironment,
    _ctx: ExecutionContext,
) -> Result<Json> {
    let value = match arena.resolve_or_evaluate(scope_id, &node.name, env)? {
        Some(v) => v,
        None => match env.resolve(&node.name) {
            Some(v) => {
                arena.define(scope_id, &node.name, v.clone())?;
                v
            }
            None => {
                if node.hints.contains(Hint::Optional) {
                    return Ok(Json::Null);
                }
                return Err(PardonError::schema(
                    SchemaErrorKind::Undefined,
                    node.name.clone(),
                    "reference has no bound value",
                ));
            }
        },
    };
    if node.hints.contains(Hint::Redact) {
        Ok(Json::String(env.redact(&value)))
    } else {
        Ok(Json::String(value))
    }
}

pub fn resolve(node: &ReferenceNode, arena: &ScopeArena, scope_id: &ScopeId) -> Result<Json> {
    match arena.resolve(scope_id, &node.name) {
        Some(v) => Ok(Json::String(v.to_string())),
        None if node.hints.contains(Hint::Optional) => Ok(Json::Null),
        None => Err(PardonError::schema(
            SchemaErrorKind::Undefined,
            node.name.clone(),
            "reference has no bound value",
        )),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::schema::Mode;

    #[test]
    fn test_reference_path_builder() {
        let r = ReferencePath::new("token").required().redact().build();
        assert!(r.hints.contains(Hint::Required));
        assert!(r.hints.contains(Hint::Redact));
        assert_eq!(r.name, "token");
    }

    #[test]
    fn test_merge_with_concrete_narrows_and_redacts() {
        let r = ReferenceNode {
            name: "token".into(),
            hints: HintSet::default().with(Hint::Redact),
            of: None,
            expr: None,
        };
        let concrete = Schema::Scalar(crate::schema::nodes::scalar::ScalarNode::string_literal("secret"));
        let merged = merge_with(&r, &concrete, ExecutionContext::build(Mode::Mix)).unwrap();
        assert!(matches!(merged, Schema::Redacted(_)));
    }

    #[test]
    fn test_render_falls_back_to_environment() {
        let r = ReferenceNode::named("env");
        let mut arena = ScopeArena::new();
        let root = arena.root();
        let mut env = crate::scope::MapEnvironment::default();
        env.values.insert("env".to_string(), "stage".to_string());
        let value = render(&r, &mut arena, &root, &env, ExecutionContext::build(Mode::Render)).unwrap();
        assert_eq!(value, Json::String("stage".into()));
    }

    #[test]
    fn test_render_evaluates_expr_binding_when_unbound() {
        let r = ReferencePath::new("total").expr("1 + 2").build();
        let mut arena = ScopeArena::new();
        let root = arena.root();
        let env = crate::scope::MapEnvironment::default();
        let value = render(&r, &mut arena, &root, &env, ExecutionContext::build(Mode::Render)).unwrap();
        assert_eq!(value, Json::String("3".into()));
        assert_eq!(arena.resolve(&root, "total"), Some("3"));
    }

    #[test]
    fn test_render_optional_missing_is_null() {
        let r = ReferencePath::new("maybe").optional().build();
        let mut arena = ScopeArena::new();
        let root = arena.root();
        let env = crate::scope::MapEnvironment::default();
        let value = render(&r, &mut arena, &root, &env, ExecutionContext::build(Mode::Render)).unwrap();
        assert_eq!(value, Json::Null);
    }
}
