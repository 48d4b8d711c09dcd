//! Dispatch tables for [`super::Schema`]'s four operations. Kept separate
//! from `mod.rs` so each node module only has to export plain functions
//! operating on its own node type; this file is the only place that
//! pattern-matches on the full `Schema` enum.

use serde_json::Value as Json;

use super::{incompatible, kind_name, ExecutionContext, Schema};
use crate::errors::Result;
use crate::scope::{ScopeArena, ScopeId, ScriptEnvironment};

use super::nodes::{array, encoding, keyed_list, object, reference, scalar};

pub fn merge(a: &Schema, b: &Schema, ctx: ExecutionContext) -> Result<Schema> {
    match (a, b) {
        // A stub absorbs anything: the other side wins outright.
        (Schema::Stub(_), other) => Ok(other.clone()),
        (other, Schema::Stub(_)) => Ok(other.clone()),

        // References narrow against whatever they're merged with.
        (Schema::Reference(r), other) | (other, Schema::Reference(r)) => {
            reference::merge_with(r, other, ctx)
        }

        (Schema::Redacted(inner_a), Schema::Redacted(inner_b)) => {
            Ok(Schema::Redacted(Box::new(merge(inner_a, inner_b, ctx)?)))
        }
        (Schema::Redacted(inner), other) | (other, Schema::Redacted(inner)) => {
            Ok(Schema::Redacted(Box::new(merge(inner, other, ctx)?)))
        }

        (Schema::Scalar(x), Schema::Scalar(y)) => Ok(Schema::Scalar(scalar::merge(x, y, ctx)?)),
        (Schema::Object(x), Schema::Object(y)) => Ok(Schema::Object(object::merge(x, y, ctx)?)),
        (Schema::Array(x), Schema::Array(y)) => Ok(Schema::Array(array::merge(x, y, ctx)?)),
        (Schema::KeyedList(x), Schema::KeyedList(y)) => {
            Ok(Schema::KeyedList(keyed_list::merge(x, y, ctx)?))
        }
        (Schema::Encoding(x), Schema::Encoding(y)) => {
            Ok(Schema::Encoding(encoding::merge(x, y, ctx)?))
        }

        _ => Err(incompatible("$", a, b)),
    }
}

pub fn scope(schema: &Schema, arena: &mut ScopeArena, parent: &ScopeId) -> Result<ScopeId> {
    match schema {
        Schema::Scalar(s) => scalar::scope(s, arena, parent),
        Schema::Object(o) => object::scope(o, arena, parent),
        Schema::Array(a) => array::scope(a, arena, parent),
        Schema::KeyedList(k) => keyed_list::scope(k, arena, parent),
        Schema::Encoding(e) => encoding::scope(e, arena, parent),
        Schema::Reference(r) => reference::scope(r, arena, parent),
        Schema::Redacted(inner) => scope(inner, arena, parent),
        Schema::Stub(_) => Ok(arena.subscope(parent)),
    }
}

pub fn render(
    schema: &Schema,
    arena: &mut ScopeArena,
    scope_id: &ScopeId,
    env: &dyn ScriptEnvironment,
    ctx: ExecutionContext,
) -> Result<Json> {
    match schema {
        Schema::Scalar(s) => scalar::render(s, arena, scope_id, env, ctx),
        Schema::Object(o) => object::render(o, arena, scope_id, env, ctx),
        Schema::Array(a) => array::render(a, arena, scope_id, env, ctx),
        Schema::KeyedList(k) => keyed_list::render(k, arena, scope_id, env, ctx),
        Schema::Encoding(e) => encoding::render(e, arena, scope_id, env, ctx),
        Schema::Reference(r) => reference::render(r, arena, scope_id, env, ctx),
        Schema::Redacted(inner) => {
            let value = render(inner, arena, scope_id, env, ctx)?;
            match value {
                Json::String(s) => Ok(Json::String(env.redact(&s))),
                other => Ok(other),
            }
        }
        Schema::Stub(v) => Ok(v.clone()),
    }
}

pub fn resolve(schema: &Schema, arena: &ScopeArena, scope_id: &ScopeId) -> Result<Json> {
    match schema {
        Schema::Scalar(s) => scalar::resolve(s, arena, scope_id),
        Schema::Object(o) => object::resolve(o, arena, scope_id),
        Schema::Array(a) => array::resolve(a, arena, scope_id),
        Schema::KeyedList(k) => keyed_list::resolve(k, arena, scope_id),
        Schema::Encoding(e) => encoding::resolve(e, arena, scope_id),
        Schema::Reference(r) => reference::resolve(r, arena, scope_id),
        Schema::Redacted(inner) => resolve(inner, arena, scope_id),
        Schema::Stub(v) => Ok(v.clone()),
    }
}

#[allow(dead_code)]
pub(crate) fn describe(schema: &Schema) -> &'static str {
    kind_name(schema)
}
