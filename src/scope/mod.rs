//! Hierarchical variable scopes (component C2).
//!
//! A [`Scope`] holds declarations (known variable names, with hints) and
//! definitions (resolved values) for one level of a schema tree; child
//! scopes ("subscopes") are created per object field / array element and
//! inherit lookups from their parent.
//!
//! `ScopeId` is a path of string keys from the root rather than an arena
//! index. That makes child-id construction a pure function of
//! `(parent, key)` — no scope needs to have been visited before, or be
//! mutable, for something to ask "what is the id of this field's scope".
//! That matters because `render` needs a `&mut ScopeArena` (it defines new
//! values) while `resolve`/`preview` only ever reads; with path ids both
//! can address the same scope tree without the read side forcing
//! allocation.

pub mod expr;

use std::collections::BTreeMap;

use crate::errors::{PardonError, Result, SchemaErrorKind};
use crate::pattern::{Hint, HintSet};

/// A path-addressed scope identifier: `vec![]` is the root, and each
/// segment names one step down the schema tree (a field name, an array
/// index rendered as a string, etc).
#[derive(Debug, Clone, PartialEq, Eq, PartialOrd, Ord, Hash, Default)]
pub struct ScopeId(Vec<String>);

impl ScopeId {
    pub fn root() -> Self {
        ScopeId(Vec::new())
    }

    /// The id of the child scope named `key` under this scope.
    pub fn child(&self, key: impl Into<String>) -> ScopeId {
        let mut path = self.0.clone();
        path.push(key.into());
        ScopeId(path)
    }

    /// The id of this scope's parent, or `None` at the root.
    pub fn parent(&self) -> Option<ScopeId> {
        if self.0.is_empty() {
            None
        } else {
            let mut path = self.0.clone();
            path.pop();
            Some(ScopeId(path))
        }
    }
}

/// A declared-but-not-yet-defined variable slot.
#[derive(Debug, Clone)]
pub struct Declaration {
    pub hints: HintSet,
    pub expr: Option<String>,
}

/// One level of the scope tree.
#[derive(Debug, Clone, Default)]
struct ScopeData {
    declarations: BTreeMap<String, Declaration>,
    definitions: BTreeMap<String, String>,
    /// Names this scope's owning node has already rendered, so repeated
    /// `rendering` queries during multi-pass render are idempotent.
    rendered: BTreeMap<String, String>,
}

/// The full scope tree for one evaluation, keyed by [`ScopeId`] path.
/// Scopes that were never written to simply aren't present in the map and
/// read as empty — `resolve`/`resolved_values` treat a missing scope the
/// same as a present-but-empty one.
#[derive(Debug, Clone, Default)]
pub struct ScopeArena {
    scopes: BTreeMap<ScopeId, ScopeData>,
}

impl ScopeArena {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn root(&self) -> ScopeId {
        ScopeId::root()
    }

    /// Construct (without allocating) the id of `key`'s child scope under
    /// `parent`.
    pub fn subscope(&self, parent: &ScopeId) -> ScopeId {
        // Callers that don't care about a distinguishing key (i.e. a node
        // that owns exactly one anonymous child scope) use this.
        parent.child("$")
    }

    fn get(&self, id: &ScopeId) -> Option<&ScopeData> {
        self.scopes.get(id)
    }

    /// Declare `name` in `id`'s scope. Declaring the same name twice with
    /// different hints is a `Redefined` schema error; declaring it twice
    /// identically is idempotent.
    pub fn declare(
        &mut self,
        id: &ScopeId,
        name: &str,
        hints: HintSet,
        expr: Option<String>,
    ) -> Result<()> {
        let scope = self.scopes.entry(id.clone()).or_default();
        if let Some(existing) = scope.declarations.get(name) {
            if existing.expr != expr {
                return Err(PardonError::schema(
                    SchemaErrorKind::Redefined,
                    name,
                    "declared twice with different bindings",
                ));
            }
            return Ok(());
        }
        scope
            .declarations
            .insert(name.to_string(), Declaration { hints, expr });
        Ok(())
    }

    /// Define a concrete value for `name` in `id`'s scope. Defining the
    /// same name with a different value is an `Inconsistent` schema error.
    pub fn define(&mut self, id: &ScopeId, name: &str, value: impl Into<String>) -> Result<()> {
        let value = value.into();
        let scope = self.scopes.entry(id.clone()).or_default();
        if let Some(existing) = scope.definitions.get(name) {
            if existing != &value {
                return Err(PardonError::schema(
                    SchemaErrorKind::Inconsistent,
                    name,
                    format!("redefined as `{value}`, was `{existing}`"),
                ));
            }
            return Ok(());
        }
        scope.definitions.insert(name.to_string(), value);
        Ok(())
    }

    /// Resolve `name` by walking from `id` up through parents, returning
    /// the nearest definition.
    pub fn resolve(&self, id: &ScopeId, name: &str) -> Option<&str> {
        let mut cursor = Some(id.clone());
        while let Some(cur) = cursor {
            if let Some(scope) = self.get(&cur) {
                if let Some(v) = scope.definitions.get(name) {
                    return Some(v.as_str());
                }
            }
            cursor = cur.parent();
        }
        None
    }

    /// Record that `name` rendered to `value` in `id`'s scope, memoizing
    /// the result so repeated calls within one render pass are idempotent
    /// (Testable Property 3).
    pub fn rendering(&mut self, id: &ScopeId, name: &str, value: impl Into<String>) -> String {
        let value = value.into();
        let scope = self.scopes.entry(id.clone()).or_default();
        scope.rendered.entry(name.to_string()).or_insert(value).clone()
    }

    /// All values that have been rendered or defined anywhere in `id`'s
    /// ancestor chain (nearest-wins), suitable for building a complete
    /// bindings map to feed back into `Pattern::render_named`.
    pub fn resolved_values(&self, id: &ScopeId) -> BTreeMap<String, String> {
        let mut chain = Vec::new();
        let mut cursor = Some(id.clone());
        while let Some(cur) = cursor {
            chain.push(cur.clone());
            cursor = cur.parent();
        }
        let mut out = BTreeMap::new();
        for scope_id in chain.into_iter().rev() {
            if let Some(scope) = self.get(&scope_id) {
                out.extend(scope.definitions.clone());
                out.extend(scope.rendered.clone());
            }
        }
        out
    }

    /// [`Self::resolved_values`], filtered by the declaring hints the way
    /// the spec's `resolvedValues({secrets, exportsOnly})` does: `@`
    /// (redact) identifiers drop unless `secrets` is set, `:` (no-export)
    /// identifiers always drop, and `exportsOnly` further narrows to only
    /// `+` (flow-export) identifiers. An identifier with no declaration
    /// anywhere in the chain (defined directly, e.g. by a literal match)
    /// carries no hints and is never filtered out.
    pub fn resolved_values_filtered(
        &self,
        id: &ScopeId,
        secrets: bool,
        exports_only: bool,
    ) -> BTreeMap<String, String> {
        let values = self.resolved_values(id);
        let hints = self.declared_hints(id);
        values
            .into_iter()
            .filter(|(name, _)| {
                let Some(hints) = hints.get(name) else {
                    return true;
                };
                if hints.contains(Hint::NoExport) {
                    return false;
                }
                if !secrets && hints.contains(Hint::Redact) {
                    return false;
                }
                if exports_only && !hints.contains(Hint::Export) {
                    return false;
                }
                true
            })
            .collect()
    }

    /// The declared hints for every name declared anywhere in `id`'s
    /// ancestor chain (nearest-wins, same precedence as `resolved_values`).
    fn declared_hints(&self, id: &ScopeId) -> BTreeMap<String, HintSet> {
        let mut chain = Vec::new();
        let mut cursor = Some(id.clone());
        while let Some(cur) = cursor {
            chain.push(cur.clone());
            cursor = cur.parent();
        }
        let mut out = BTreeMap::new();
        for scope_id in chain.into_iter().rev() {
            if let Some(scope) = self.get(&scope_id) {
                for (name, decl) in &scope.declarations {
                    out.insert(name.clone(), decl.hints.clone());
                }
            }
        }
        out
    }

    /// True if `name` has already been rendered in `id`'s scope (without
    /// walking parents) — used to skip redundant render work.
    pub fn cached(&self, id: &ScopeId, name: &str) -> bool {
        self.get(id).map(|s| s.rendered.contains_key(name)).unwrap_or(false)
    }

    /// The declaration for `name` nearest to `id`, walking ancestors the
    /// same way `resolve` does.
    pub fn declaration(&self, id: &ScopeId, name: &str) -> Option<&Declaration> {
        let mut cursor = Some(id.clone());
        while let Some(cur) = cursor {
            if let Some(scope) = self.get(&cur) {
                if let Some(decl) = scope.declarations.get(name) {
                    return Some(decl);
                }
            }
            cursor = cur.parent();
        }
        None
    }

    /// Resolve `name` at `id`: an already-defined or already-rendered
    /// value short-circuits; otherwise, if `name` was declared with an
    /// `= expr` binding reachable from `id`, evaluate it against `env`,
    /// define the result, and return it. Returns `Ok(None)` if there's
    /// neither a value nor a declared expression to fall back to.
    pub fn resolve_or_evaluate(
        &mut self,
        id: &ScopeId,
        name: &str,
        env: &dyn ScriptEnvironment,
    ) -> Result<Option<String>> {
        if let Some(v) = self.resolve(id, name) {
            return Ok(Some(v.to_string()));
        }
        let Some(expr) = self.declaration(id, name).and_then(|d| d.expr.clone()) else {
            return Ok(None);
        };
        let value = env.evaluate(&expr)?.to_string();
        self.define(id, name, value.clone())?;
        Ok(Some(value))
    }
}

/// The environment a schema tree runs against: secret evaluation,
/// resolution of external values, redaction policy, ambient config, and
/// pattern compatibility checks. Adapted from the spec's `ScriptEnvironment`
/// contract; implemented by the CLI driver and by test doubles.
pub trait ScriptEnvironment: Send + Sync {
    /// Evaluate a restricted-grammar expression against this environment.
    fn evaluate(&self, expr: &str) -> Result<expr::Value>;

    /// Resolve an external (non-scope) value by name, e.g. an environment
    /// variable or secret-store entry.
    fn resolve(&self, name: &str) -> Option<String>;

    /// Redact `value` for display/logging given it was reached through a
    /// node tagged with the `@` hint.
    fn redact(&self, value: &str) -> String;

    /// True if `candidate` is an acceptable match for `pattern` beyond what
    /// the raw regex already encodes (e.g. environment allow-lists).
    fn matches(&self, pattern: &str, candidate: &str) -> bool {
        let _ = pattern;
        let _ = candidate;
        true
    }

    /// Ambient configuration value lookup (backs [`crate::config_space`]).
    fn config(&self, key: &str) -> Option<String>;
}

/// A minimal in-memory environment: values from a map, redaction replaces
/// with asterisks. Used by tests and as the base the CLI environment wraps.
#[derive(Debug, Clone, Default)]
pub struct MapEnvironment {
    pub values: BTreeMap<String, String>,
    pub config: BTreeMap<String, String>,
}

impl ScriptEnvironment for MapEnvironment {
    fn evaluate(&self, expr_src: &str) -> Result<expr::Value> {
        let parsed = expr::parse(expr_src)?;
        let ctx = expr::MapContext(
            self.values
                .iter()
                .map(|(k, v)| (k.clone(), expr::Value::String(v.clone())))
                .collect(),
        );
        expr::eval(&parsed, &ctx)
    }

    fn resolve(&self, name: &str) -> Option<String> {
        self.values.get(name).cloned()
    }

    fn redact(&self, _value: &str) -> String {
        "***".to_string()
    }

    fn config(&self, key: &str) -> Option<String> {
        self.config.get(key).cloned()
    }
}
