//! Config space (component C5): option-row enumeration over a nested
//! configuration map, with `choose`/`implied`/`exhausted`/`defaults`
//! tree-walking resolution.
//!
//! A [`ConfigSpace`] is a set of *dimensions* (e.g. `env`, `region`),
//! each offering a fixed set of named *options* (e.g. `stage`, `prod`),
//! each option contributing a JSON config fragment that gets deep-merged
//! on top of the space's ambient `defaults` once chosen.

use std::collections::BTreeMap;

use indexmap::IndexMap;
use serde_json::Value as Json;

use crate::errors::{PardonError, Result};
use crate::utils::deep_merge;

/// One selectable option within a dimension.
#[derive(Debug, Clone, PartialEq)]
pub struct ConfigOption {
    pub name: String,
    pub fragment: Json,
}

/// The full set of configurable dimensions for a collection.
#[derive(Debug, Clone, Default)]
pub struct ConfigSpace {
    /// Dimension name -> ordered option list (order is insertion/file
    /// order, used as the tie-break when a dimension isn't chosen
    /// explicitly and has no default).
    pub dimensions: IndexMap<String, Vec<ConfigOption>>,
    pub defaults: Json,
}

impl ConfigSpace {
    pub fn new(defaults: Json) -> Self {
        Self {
            dimensions: IndexMap::new(),
            defaults,
        }
    }

    pub fn add_dimension(&mut self, name: impl Into<String>, options: Vec<ConfigOption>) {
        self.dimensions.insert(name.into(), options);
    }

    fn option<'a>(&'a self, dimension: &str, name: &str) -> Option<&'a ConfigOption> {
        self.dimensions
            .get(dimension)
            .and_then(|opts| opts.iter().find(|o| o.name == name))
    }

    /// Resolve one choice per dimension: explicit selections from
    /// `selections` win; a dimension with exactly one option auto-selects
    /// it (`implied`); a dimension with a `default` fragment key in
    /// `defaults` at `<dimension>.default` falls back to that option
    /// name; otherwise the dimension is left unchosen.
    pub fn choose(&self, selections: &BTreeMap<String, String>) -> Result<BTreeMap<String, String>> {
        let mut chosen = BTreeMap::new();
        for (dimension, options) in &self.dimensions {
            if let Some(explicit) = selections.get(dimension) {
                if self.option(dimension, explicit).is_none() {
                    return Err(PardonError::Configuration(format!(
                        "unknown option `{explicit}` for dimension `{dimension}`"
                    )));
                }
                chosen.insert(dimension.clone(), explicit.clone());
                continue;
            }
            if options.len() == 1 {
                chosen.insert(dimension.clone(), options[0].name.clone());
                continue;
            }
            if let Some(default_name) = self
                .defaults
                .get(dimension)
                .and_then(|d| d.get("default"))
                .and_then(|v| v.as_str())
            {
                if self.option(dimension, default_name).is_some() {
                    chosen.insert(dimension.clone(), default_name.to_string());
                }
            }
        }
        Ok(chosen)
    }

    /// The config fragments implied by `chosen`, deep-merged on top of
    /// `defaults` in dimension order.
    pub fn implied(&self, chosen: &BTreeMap<String, String>) -> Json {
        let mut merged = self.defaults.clone();
        for (dimension, _options) in &self.dimensions {
            if let Some(option_name) = chosen.get(dimension) {
                if let Some(option) = self.option(dimension, option_name) {
                    merged = deep_merge(&merged, &option.fragment);
                }
            }
        }
        merged
    }

    /// True once every dimension in `chosen` has a concrete selection —
    /// i.e. there's nothing left to enumerate.
    pub fn is_exhausted(&self, chosen: &BTreeMap<String, String>) -> bool {
        self.dimensions.keys().all(|d| chosen.contains_key(d))
    }

    /// The reverse of `implied`: given a concrete `key`/`value` pair
    /// already known (e.g. a rendered `origin`), find the dimension
    /// option(s) whose fragment carries that same value at `key`, and
    /// force that selection. A dimension where exactly one option implies
    /// `value` is forced; a dimension where zero or more than one option
    /// would (the value doesn't pin it down) is left out of the result.
    /// This is what lets a concrete `origin` force `env=prod` for every
    /// other pattern in the same request sharing `{{env}}` (C5's
    /// pattern↔option reconciliation).
    pub fn reconcile(&self, key: &str, value: &Json) -> BTreeMap<String, String> {
        let mut forced = BTreeMap::new();
        for (dimension, options) in &self.dimensions {
            let implying: Vec<&ConfigOption> =
                options.iter().filter(|o| o.fragment.get(key) == Some(value)).collect();
            if implying.len() == 1 {
                forced.insert(dimension.clone(), implying[0].name.clone());
            }
        }
        forced
    }

    /// Enumerate every combination of options across all dimensions (the
    /// full cartesian product), used to list every concrete variant a
    /// templated collection can produce.
    pub fn exhaust(&self) -> Vec<BTreeMap<String, String>> {
        let mut combos: Vec<BTreeMap<String, String>> = vec![BTreeMap::new()];
        for (dimension, options) in &self.dimensions {
            let mut next = Vec::with_capacity(combos.len() * options.len().max(1));
            for combo in &combos {
                if options.is_empty() {
                    next.push(combo.clone());
                    continue;
                }
                for option in options {
                    let mut extended = combo.clone();
                    extended.insert(dimension.clone(), option.name.clone());
                    next.push(extended);
                }
            }
            combos = next;
        }
        combos
    }
}
