//! Array node: tuple (fixed positional elements), template (one element
//! schema repeated to fill a "strut" length), multivalue (an unordered
//! bag of an element schema, merged either by first-fit slotting or in
//! parallel depending on merge mode — see the mux/mix decision in
//! `DESIGN.md`), and lenient (tuple that tolerates length mismatch).

use serde_json::Value as Json;

use crate::errors::{PardonError, Result, SchemaErrorKind};
use crate::schema::{ExecutionContext, Mode, Schema};
use crate::scope::{ScopeArena, ScopeId, ScriptEnvironment};

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ArrayKind {
    Tuple,
    Template,
    Multivalue,
    Lenient,
}

#[derive(Debug, Clone, PartialEq)]
pub struct ArrayNode {
    pub kind: ArrayKind,
    /// Explicit positional elements (tuple/lenient), or already-instantiated
    /// elements accumulated into a template/multivalue array.
    pub items: Vec<Schema>,
    /// The repeated element schema for template/multivalue arrays.
    pub element: Option<Box<Schema>>,
    /// Minimum number of elements a template array renders even with no
    /// explicit `items`.
    pub strut: usize,
}

impl ArrayNode {
    pub fn tuple(items: Vec<Schema>) -> Self {
        Self {
            kind: ArrayKind::Tuple,
            items,
            element: None,
            strut: 0,
        }
    }

    pub fn template(element: Schema, strut: usize) -> Self {
        Self {
            kind: ArrayKind::Template,
            items: Vec::new(),
            element: Some(Box::new(element)),
            strut,
        }
    }

    pub fn multivalue(element: Schema) -> Self {
        Self {
            kind: ArrayKind::Multivalue,
            items: Vec::new(),
            element: Some(Box::new(element)),
            strut: 0,
        }
    }
}

fn incompatible_kind(a: ArrayKind, b: ArrayKind) -> PardonError {
    PardonError::schema(
        SchemaErrorKind::Incompatible,
        "$",
        format!("cannot merge array kinds {a:?} and {b:?}"),
    )
}

pub fn merge(a: &ArrayNode, b: &ArrayNode, ctx: ExecutionContext) -> Result<ArrayNode> {
    match (a.kind, b.kind) {
        (ArrayKind::Tuple, ArrayKind::Tuple) => merge_tuple(a, b, ctx, false),
        (ArrayKind::Lenient, _) | (_, ArrayKind::Lenient) => merge_tuple(a, b, ctx, true),
        (ArrayKind::Template, ArrayKind::Template) => {
            let element = match (&a.element, &b.element) {
                (Some(x), Some(y)) => Box::new(x.merge(y, ctx)?),
                (Some(x), None) => x.clone(),
                (None, Some(y)) => y.clone(),
                (None, None) => {
                    return Err(PardonError::schema(
                        SchemaErrorKind::Missing,
                        "$",
                        "template array has no element schema",
                    ))
                }
            };
            Ok(ArrayNode {
                kind: ArrayKind::Template,
                items: merge_items_pairwise(&a.items, &b.items, ctx)?,
                element: Some(element),
                strut: a.strut.max(b.strut),
            })
        }
        (ArrayKind::Multivalue, ArrayKind::Multivalue) => merge_multivalue(a, b, ctx),
        _ => Err(incompatible_kind(a.kind, b.kind)),
    }
}

fn merge_items_pairwise(
    a: &[Schema],
    b: &[Schema],
    ctx: ExecutionContext,
) -> Result<Vec<Schema>> {
    let len = a.len().max(b.len());
    let mut out = Vec::with_capacity(len);
    for i in 0..len {
        out.push(match (a.get(i), b.get(i)) {
            (Some(x), Some(y)) => x.merge(y, ctx)?,
            (Some(x), None) => x.clone(),
            (None, Some(y)) => y.clone(),
            (None, None) => unreachable!(),
        });
    }
    Ok(out)
}

fn merge_tuple(a: &ArrayNode, b: &ArrayNode, ctx: ExecutionContext, lenient: bool) -> Result<ArrayNode> {
    if !lenient && a.items.len() != b.items.len() {
        return Err(PardonError::schema(
            SchemaErrorKind::Mismatch,
            "$",
            format!("tuple length {} != {}", a.items.len(), b.items.len()),
        ));
    }
    Ok(ArrayNode {
        kind: ArrayKind::Tuple,
        items: merge_items_pairwise(&a.items, &b.items, ctx)?,
        element: None,
        strut: 0,
    })
}

/// Multivalue merge: under `Mode::Mux` each side's elements are kept as
/// separate entries (parallel construction — option A's elements and
/// option B's elements both survive). Under every other merge mode
/// (`Mix`, `Match`, `Meld`) elements are first-fit slotted: each of `b`'s
/// items is merged into the first `a` item it's compatible with, or
/// appended if none match.
fn merge_multivalue(a: &ArrayNode, b: &ArrayNode, ctx: ExecutionContext) -> Result<ArrayNode> {
    let element = match (&a.element, &b.element) {
        (Some(x), Some(y)) => Box::new(x.merge(y, ctx)?),
        (Some(x), None) => x.clone(),
        (None, Some(y)) => y.clone(),
        (None, None) => {
            return Err(PardonError::schema(
                SchemaErrorKind::Missing,
                "$",
                "multivalue array has no element schema",
            ))
        }
    };

    let items = if ctx.mode == Mode::Mux {
        let mut items = a.items.clone();
        items.extend(b.items.clone());
        items
    } else {
        let mut items = a.items.clone();
        'outer: for b_item in &b.items {
            for slot in items.iter_mut() {
                if let Ok(merged) = slot.merge(b_item, ctx) {
                    *slot = merged;
                    continue 'outer;
                }
            }
            items.push(b_item.clone());
        }
        items
    };

    Ok(ArrayNode {
        kind: ArrayKind::Multivalue,
        items,
        element: Some(element),
        strut: a.strut.max(b.strut),
    })
}

pub fn scope(node: &ArrayNode, arena: &mut ScopeArena, parent: &ScopeId) -> Result<ScopeId> {
    let own = arena.subscope(parent);
    for (i, item) in node.items.iter().enumerate() {
        let child = own.child(i.to_string());
        item.scope(arena, &child)?;
    }
    Ok(own)
}

pub fn render(
    node: &ArrayNode,
    arena: &mut ScopeArena,
    scope_id: &ScopeId,
    env: &dyn ScriptEnvironment,
    ctx: ExecutionContext,
) -> Result<Json> {
    let mut out = Vec::new();
    if !node.items.is_empty() {
        for (i, item) in node.items.iter().enumerate() {
            let child = scope_id.child(i.to_string());
            out.push(item.render(arena, &child, env, ctx)?);
        }
    } else if let Some(element) = &node.element {
        for i in 0..node.strut {
            let child = scope_id.child(i.to_string());
            out.push(element.render(arena, &child, env, ctx)?);
        }
    }
    Ok(Json::Array(out))
}

pub fn resolve(node: &ArrayNode, arena: &ScopeArena, scope_id: &ScopeId) -> Result<Json> {
    let mut out = Vec::new();
    for (i, item) in node.items.iter().enumerate() {
        let child = scope_id.child(i.to_string());
        if let Ok(v) = item.resolve(arena, &child) {
            out.push(v);
        }
    }
    Ok(Json::Array(out))
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::schema::nodes::scalar::ScalarNode;

    fn lit(s: &str) -> Schema {
        Schema::Scalar(ScalarNode::string_literal(s))
    }

    #[test]
    fn test_tuple_merge_requires_equal_length() {
        let a = ArrayNode::tuple(vec![lit("1")]);
        let b = ArrayNode::tuple(vec![lit("1"), lit("2")]);
        assert!(merge(&a, &b, ExecutionContext::build(Mode::Match)).is_err());
    }

    #[test]
    fn test_multivalue_mux_keeps_both_sides_parallel() {
        let a = ArrayNode {
            kind: ArrayKind::Multivalue,
            items: vec![lit("a")],
            element: Some(Box::new(lit("x"))),
            strut: 0,
        };
        let b = ArrayNode {
            kind: ArrayKind::Multivalue,
            items: vec![lit("b")],
            element: Some(Box::new(lit("x"))),
            strut: 0,
        };
        let merged = merge(&a, &b, ExecutionContext::build(Mode::Mux)).unwrap();
        assert_eq!(merged.items.len(), 2);
    }

    #[test]
    fn test_multivalue_mix_first_fit_slots() {
        let a = ArrayNode {
            kind: ArrayKind::Multivalue,
            items: vec![lit("same")],
            element: Some(Box::new(lit("x"))),
            strut: 0,
        };
        let b = ArrayNode {
            kind: ArrayKind::Multivalue,
            items: vec![lit("same")],
            element: Some(Box::new(lit("x"))),
            strut: 0,
        };
        let merged = merge(&a, &b, ExecutionContext::build(Mode::Mix)).unwrap();
        assert_eq!(merged.items.len(), 1);
    }

    #[test]
    fn test_template_render_fills_strut() {
        let node = ArrayNode::template(lit("x"), 3);
        let mut arena = ScopeArena::new();
        let root = arena.root();
        let env = crate::scope::MapEnvironment::default();
        let value = render(&node, &mut arena, &root, &env, ExecutionContext::build(Mode::Render)).unwrap();
        assert_eq!(value.as_array().unwrap().len(), 3);
    }
}
