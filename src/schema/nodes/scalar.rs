//! Scalar node: string, number, boolean, bigint, and null leaves, each
//! optionally backed by a [`Pattern`] for variable extraction.

use serde_json::{Number, Value as Json};

use crate::errors::{PardonError, Result, SchemaErrorKind};
use crate::pattern::{GenericBuilding, Hint, Pattern};
use crate::schema::{ExecutionContext, Mode};
use crate::scope::{ScopeArena, ScopeId, ScriptEnvironment};

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ScalarKind {
    String,
    Number,
    Boolean,
    BigInt,
    Null,
}

/// A scalar leaf. `literal` preserves the *original textual form* of a
/// bound value (so `1.50` round-trips as `1.50`, not `1.5`) separately
/// from the typed JSON value it represents.
#[derive(Debug, Clone, PartialEq)]
pub struct ScalarNode {
    pub kind: ScalarKind,
    pub pattern: Option<Pattern>,
    pub literal: Option<String>,
}

impl ScalarNode {
    pub fn string_literal(value: impl Into<String>) -> Self {
        Self {
            kind: ScalarKind::String,
            pattern: None,
            literal: Some(value.into()),
        }
    }

    pub fn templated(kind: ScalarKind, pattern: Pattern) -> Self {
        Self {
            kind,
            pattern: Some(pattern),
            literal: None,
        }
    }

    fn to_json(&self, text: &str) -> Result<Json> {
        match self.kind {
            ScalarKind::String => Ok(Json::String(text.to_string())),
            ScalarKind::Boolean => text
                .parse::<bool>()
                .map(Json::Bool)
                .map_err(|_| type_err(text, "boolean")),
            ScalarKind::Null => {
                if text == "null" {
                    Ok(Json::Null)
                } else {
                    Err(type_err(text, "null"))
                }
            }
            ScalarKind::Number | ScalarKind::BigInt => {
                let n: f64 = text.parse().map_err(|_| type_err(text, "number"))?;
                Number::from_f64(n)
                    .map(Json::Number)
                    .ok_or_else(|| type_err(text, "number"))
            }
        }
    }
}

fn type_err(text: &str, expected: &str) -> PardonError {
    PardonError::schema(
        SchemaErrorKind::Type,
        "$",
        format!("`{text}` is not a valid {expected}"),
    )
}

pub fn merge(a: &ScalarNode, b: &ScalarNode, ctx: ExecutionContext) -> Result<ScalarNode> {
    if a.kind != b.kind {
        return Err(PardonError::schema(
            SchemaErrorKind::Incompatible,
            "$",
            format!("cannot merge {:?} with {:?}", a.kind, b.kind),
        ));
    }

    match (&a.literal, &b.literal) {
        (Some(x), Some(y)) => {
            if x == y {
                Ok(a.clone())
            } else if ctx.mode == Mode::Match {
                Err(PardonError::schema(SchemaErrorKind::Mismatch, "$", format!("`{x}` != `{y}`")))
            } else {
                Err(PardonError::schema(
                    SchemaErrorKind::Mismatch,
                    "$",
                    format!("conflicting literal values `{x}` and `{y}`"),
                ))
            }
        }
        (Some(lit), None) => {
            if let Some(p) = &b.pattern {
                if p.match_value(lit).is_none() {
                    return Err(PardonError::schema(
                        SchemaErrorKind::Incompatible,
                        "$",
                        format!("literal `{lit}` doesn't satisfy pattern"),
                    ));
                }
            }
            Ok(ScalarNode {
                kind: a.kind,
                pattern: b.pattern.clone(),
                literal: a.literal.clone(),
            })
        }
        (None, Some(lit)) => {
            if let Some(p) = &a.pattern {
                if p.match_value(lit).is_none() {
                    return Err(PardonError::schema(
                        SchemaErrorKind::Incompatible,
                        "$",
                        format!("literal `{lit}` doesn't satisfy pattern"),
                    ));
                }
            }
            Ok(ScalarNode {
                kind: a.kind,
                pattern: a.pattern.clone(),
                literal: b.literal.clone(),
            })
        }
        (None, None) => {
            let pattern = match (&a.pattern, &b.pattern) {
                (Some(p), None) | (None, Some(p)) => Some(p.clone()),
                (Some(p1), Some(p2)) => {
                    if p1.compatible(p2) {
                        Some(p1.clone())
                    } else {
                        return Err(PardonError::schema(
                            SchemaErrorKind::Incompatible,
                            "$",
                            "incompatible scalar patterns",
                        ));
                    }
                }
                (None, None) => None,
            };
            Ok(ScalarNode {
                kind: a.kind,
                pattern,
                literal: None,
            })
        }
    }
}

/// Scalars declare their variables directly into `parent` rather than
/// allocating their own child scope: a leaf carries no nested structure
/// for a subscope to usefully isolate, and leaving the value in the
/// parent lets sibling nodes (and `resolve` calls against the parent)
/// see it without walking back down.
pub fn scope(node: &ScalarNode, arena: &mut ScopeArena, parent: &ScopeId) -> Result<ScopeId> {
    if let Some(pattern) = &node.pattern {
        for (name, hints, expr) in pattern.variable_info() {
            arena.declare(parent, name, hints.clone(), expr.map(str::to_string))?;
        }
    }
    Ok(parent.clone())
}

pub fn render(
    node: &ScalarNode,
    arena: &mut ScopeArena,
    scope_id: &ScopeId,
    env: &dyn ScriptEnvironment,
    _ctx: ExecutionContext,
) -> Result<Json> {
    let text = render_text(node, arena, scope_id, env)?;
    if let Some(pattern) = &node.pattern {
        if redact_hint_present(pattern) {
            return Ok(Json::String(env.redact(&text)));
        }
    }
    node.to_json(&text)
}

pub fn resolve(node: &ScalarNode, arena: &ScopeArena, scope_id: &ScopeId) -> Result<Json> {
    if let Some(lit) = &node.literal {
        if let Some(pattern) = &node.pattern {
            if let Some(bound) = pattern.match_value(lit) {
                for (name, value) in &bound {
                    if let Some(existing) = arena.resolve(scope_id, name) {
                        if existing != value {
                            return Err(PardonError::schema(
                                SchemaErrorKind::Inconsistent,
                                name.clone(),
                                format!("redefined as `{value}`, was `{existing}`"),
                            ));
                        }
                    }
                }
            }
        }
        return node.to_json(lit);
    }
    if let Some(pattern) = &node.pattern {
        let values = arena.resolved_values(scope_id);
        let missing = pattern
            .variable_names()
            .into_iter()
            .any(|n| !values.contains_key(n));
        if missing {
            return Err(PardonError::schema(
                SchemaErrorKind::Undefined,
                "$",
                "scalar pattern has unresolved variables",
            ));
        }
        let text = pattern.render_named(&values);
        return node.to_json(&text);
    }
    Err(PardonError::schema(SchemaErrorKind::Missing, "$", "scalar has no value"))
}

fn render_text(
    node: &ScalarNode,
    arena: &mut ScopeArena,
    scope_id: &ScopeId,
    env: &dyn ScriptEnvironment,
) -> Result<String> {
    if let Some(lit) = &node.literal {
        if let Some(pattern) = &node.pattern {
            if let Some(bound) = pattern.match_value(lit) {
                for (name, value) in &bound {
                    arena.define(scope_id, name, value.clone())?;
                }
            }
        }
        return Ok(lit.clone());
    }
    let Some(pattern) = &node.pattern else {
        return Err(PardonError::schema(
            SchemaErrorKind::Missing,
            "$",
            "scalar has neither a literal value nor a pattern",
        ));
    };
    let mut values = arena.resolved_values(scope_id);
    for name in pattern.variable_names() {
        if !values.contains_key(name) {
            if let Some(v) = arena.resolve_or_evaluate(scope_id, name, env)? {
                values.insert(name.to_string(), v);
            }
        }
    }
    let missing: Vec<&str> = pattern
        .variable_names()
        .into_iter()
        .filter(|n| !values.contains_key(*n))
        .collect();
    if !missing.is_empty() {
        return Err(PardonError::schema(
            SchemaErrorKind::Undefined,
            "$",
            format!("unresolved variable(s): {}", missing.join(", ")),
        ));
    }
    let text = pattern.render_named(&values);
    for name in pattern.variable_names() {
        if let Some(v) = values.get(name) {
            arena.define(scope_id, name, v.clone())?;
        }
    }
    Ok(text)
}

/// Build a scalar from a bare `{{...}}` string, used by the `.https` parser
/// for URL/pathname/header segments that aren't JSON-typed.
pub fn from_template_string(source: &str) -> Result<ScalarNode> {
    let pattern = Pattern::parse(source, &GenericBuilding)?;
    match pattern {
        Pattern::Literal(lit) => Ok(ScalarNode::string_literal(lit)),
        regex @ Pattern::Regex(_) => Ok(ScalarNode::templated(ScalarKind::String, regex)),
    }
}

pub fn redact_hint_present(pattern: &Pattern) -> bool {
    match pattern {
        Pattern::Literal(_) => false,
        Pattern::Regex(rp) => rp.vars.iter().any(|v| v.hints.contains(Hint::Redact)),
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_merge_same_literal_ok() {
        let a = ScalarNode::string_literal("prod");
        let b = ScalarNode::string_literal("prod");
        let merged = merge(&a, &b, ExecutionContext::build(Mode::Mix)).unwrap();
        assert_eq!(merged.literal.as_deref(), Some("prod"));
    }

    #[test]
    fn test_merge_conflicting_literal_errors() {
        let a = ScalarNode::string_literal("prod");
        let b = ScalarNode::string_literal("stage");
        assert!(merge(&a, &b, ExecutionContext::build(Mode::Match)).is_err());
    }

    #[test]
    fn test_resolve_literal_number_preserves_text() {
        let node = ScalarNode {
            kind: ScalarKind::Number,
            pattern: None,
            literal: Some("1.50".to_string()),
        };
        let arena = ScopeArena::new();
        let json = resolve(&node, &arena, &arena.root()).unwrap();
        assert_eq!(json, Json::from(1.5));
    }

    #[test]
    fn test_render_redacts_when_pattern_carries_redact_hint() {
        use crate::scope::MapEnvironment;

        let node = ScalarNode::templated(
            ScalarKind::String,
            Pattern::parse("Bearer {{@token}}", &crate::pattern::GenericBuilding).unwrap(),
        );
        let mut arena = ScopeArena::new();
        let root = arena.root();
        let scope_id = scope(&node, &mut arena, &root).unwrap();
        arena.define(&scope_id, "token", "secret-value").unwrap();

        let env = MapEnvironment::default();
        let rendered = render(&node, &mut arena, &scope_id, &env, ExecutionContext::build(Mode::Render)).unwrap();
        assert_eq!(rendered, Json::String("***".to_string()));
    }

    /// Scenario S4: a variable with an `= expr` binding and no other
    /// source of a value evaluates that expression during render.
    #[test]
    fn test_render_evaluates_declared_expr_binding_scenario_s4() {
        use crate::scope::MapEnvironment;

        let node = ScalarNode::templated(
            ScalarKind::Number,
            Pattern::parse("{{total = 1 + 2}}", &crate::pattern::GenericBuilding).unwrap(),
        );
        let mut arena = ScopeArena::new();
        let root = arena.root();
        let scope_id = scope(&node, &mut arena, &root).unwrap();

        let env = MapEnvironment::default();
        let rendered = render(&node, &mut arena, &scope_id, &env, ExecutionContext::build(Mode::Render)).unwrap();
        assert_eq!(rendered, Json::from(3.0));
        assert_eq!(arena.resolve(&scope_id, "total"), Some("3"));
    }
}
