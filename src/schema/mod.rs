//! The schema kernel (component C3): the `Schema` value type and the
//! merge/scope/render/resolve operations every node kind in
//! [`nodes`] implements a piece of.
//!
//! Unlike a `dyn Schema` trait-object hierarchy, node kinds here are
//! variants of one closed [`Schema`] enum. The node set is small and fixed
//! (spec.md names exactly eight kinds), so an enum dispatches the same way
//! a sealed trait would while avoiding a boxed trait object per node and
//! letting `merge` pattern-match on the *pair* of incoming kinds directly,
//! which every node kind needs to do anyway (e.g. "scalar merged with
//! reference produces a narrowed reference").

pub mod context;
pub mod kernel;
pub mod nodes;

pub use context::{ExecutionContext, Mode, Phase};
pub use nodes::{
    array::ArrayNode, encoding::EncodingNode, keyed_list::KeyedListNode, object::ObjectNode,
    reference::ReferenceNode, scalar::ScalarNode,
};

use serde_json::Value as Json;

use crate::errors::{PardonError, Result, SchemaErrorKind};
use crate::scope::{ScopeArena, ScopeId};
use crate::scope::ScriptEnvironment;

/// A node in the schema tree. Before a collection is fully assembled a
/// `Schema` may still contain unresolved `Reference`/`Stub` nodes
/// ("schematic" in spec terms); once every reference has been `merge`d
/// against a concrete value it is "compiled" in the spec's sense, but
/// that distinction is a *property* of a tree, not a different Rust type.
#[derive(Debug, Clone, PartialEq)]
pub enum Schema {
    Scalar(ScalarNode),
    Object(ObjectNode),
    Array(ArrayNode),
    KeyedList(KeyedListNode),
    Encoding(EncodingNode),
    Reference(ReferenceNode),
    /// `@`-redacted wrapper: delegates every operation to `inner`, but
    /// `render` reports through `environment.redact`.
    Redacted(Box<Schema>),
    /// Hidden/passthrough node: carries a literal JSON value with no
    /// template structure at all (`~` meld-only data, e.g.).
    Stub(Json),
}

impl Schema {
    pub fn literal(value: Json) -> Schema {
        Schema::Stub(value)
    }

    /// Merge `self` and `other` under `ctx.mode` (must be one of the four
    /// merge modes). Returns the merged schema, or a `SchemaError` if the
    /// two trees are structurally incompatible.
    pub fn merge(&self, other: &Schema, ctx: ExecutionContext) -> Result<Schema> {
        if !ctx.mode.is_merge() {
            return Err(PardonError::Configuration(
                "Schema::merge called with a render mode".into(),
            ));
        }
        kernel::merge(self, other, ctx)
    }

    /// Allocate this schema's scope tree under `parent`, declaring every
    /// variable the tree references. Returns the root scope id for this
    /// subtree.
    pub fn scope(&self, arena: &mut ScopeArena, parent: &ScopeId) -> Result<ScopeId> {
        kernel::scope(self, arena, parent)
    }

    /// Render this schema to a concrete JSON value under `ctx`.
    pub fn render(
        &self,
        arena: &mut ScopeArena,
        scope: &ScopeId,
        env: &dyn ScriptEnvironment,
        ctx: ExecutionContext,
    ) -> Result<Json> {
        if !ctx.mode.is_render() {
            return Err(PardonError::Configuration(
                "Schema::render called with a merge mode".into(),
            ));
        }
        kernel::render(self, arena, scope, env, ctx)
    }

    /// Read the best-effort value already resolved in `scope`, without
    /// triggering any new evaluation (used for `preview`/display).
    pub fn resolve(&self, arena: &ScopeArena, scope: &ScopeId) -> Result<Json> {
        kernel::resolve(self, arena, scope)
    }

    pub fn is_stub(&self) -> bool {
        matches!(self, Schema::Stub(_))
    }

    pub fn is_reference(&self) -> bool {
        matches!(self, Schema::Reference(_))
    }
}

pub(crate) fn incompatible(loc: &str, a: &Schema, b: &Schema) -> PardonError {
    PardonError::schema(
        SchemaErrorKind::Incompatible,
        loc,
        format!("cannot merge {} with {}", kind_name(a), kind_name(b)),
    )
}

pub(crate) fn kind_name(s: &Schema) -> &'static str {
    match s {
        Schema::Scalar(_) => "scalar",
        Schema::Object(_) => "object",
        Schema::Array(_) => "array",
        Schema::KeyedList(_) => "keyed-list",
        Schema::Encoding(_) => "encoding",
        Schema::Reference(_) => "reference",
        Schema::Redacted(_) => "redacted",
        Schema::Stub(_) => "stub",
    }
}
