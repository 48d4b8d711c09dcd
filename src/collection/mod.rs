//! The collection builder (component C10): scans an ordered list of
//! layer directories, classifies every file, and assembles an immutable
//! [`Collection`] snapshot — endpoints with their merged configuration,
//! plus the config-space each one exposes.
//!
//! A collection load scans the filesystem once; reloading builds a
//! fresh snapshot and replaces the old one atomically (callers swap an
//! `Arc<Collection>`, they never mutate one in place).

pub mod loader;
pub mod model;

use std::path::PathBuf;

use crate::config_space::ConfigSpace;
use crate::errors::{PardonError, Result};
use crate::schema::Schema;

pub use model::{Asset, AssetKind, ConfigFile, Endpoint};

fn literal_text(schema: &Schema) -> Option<&str> {
    match schema {
        Schema::Scalar(s) => s.literal.as_deref(),
        _ => None,
    }
}

/// An immutable, fully assembled collection: every endpoint, keyed by
/// id, with its merged configuration already resolved.
#[derive(Debug, Clone, Default)]
pub struct Collection {
    pub endpoints: Vec<Endpoint>,
}

impl Collection {
    /// Scan `roots` (layer directories, in precedence order — later
    /// layers override earlier ones) and assemble a fresh snapshot.
    pub fn load(roots: &[PathBuf]) -> Result<Self> {
        let assets = loader::scan_layers(roots)?;
        let data = loader::load_data_records(&assets)?;
        let endpoints = loader::assemble_endpoints(&assets, &data)?;
        Ok(Self { endpoints })
    }

    pub fn endpoint(&self, id: &str) -> Option<&Endpoint> {
        self.endpoints.iter().find(|e| e.id == id)
    }

    /// Find the endpoint whose request method/pathname best matches
    /// `method`/`path_hint` — the crude form of C10's "match selects an
    /// endpoint from the collection" step; a direct id match wins,
    /// otherwise the first endpoint whose first step's request method
    /// agrees (full pattern-based matching happens later, against that
    /// endpoint's schema, in the execution pipeline's `match` stage).
    pub fn find_endpoint(&self, id_hint: Option<&str>, method: &str) -> Result<&Endpoint> {
        if let Some(id) = id_hint {
            return self
                .endpoint(id)
                .ok_or_else(|| PardonError::Configuration(format!("no endpoint named `{id}`")));
        }
        self.endpoints
            .iter()
            .find(|e| {
                e.steps
                    .first()
                    .and_then(|step| literal_text(&step.request.method))
                    .map(|m| m.eq_ignore_ascii_case(method))
                    .unwrap_or(false)
            })
            .ok_or_else(|| PardonError::Configuration(format!("no endpoint matches method `{method}`")))
    }

    pub fn config_space(&self, id: &str) -> Result<ConfigSpace> {
        let endpoint = self
            .endpoint(id)
            .ok_or_else(|| PardonError::Configuration(format!("no endpoint named `{id}`")))?;
        Ok(endpoint.config.to_config_space())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::io::Write;

    fn write_file(dir: &std::path::Path, rel: &str, contents: &str) {
        let path = dir.join(rel);
        std::fs::create_dir_all(path.parent().unwrap()).unwrap();
        let mut f = std::fs::File::create(path).unwrap();
        f.write_all(contents.as_bytes()).unwrap();
    }

    #[test]
    fn test_load_finds_endpoint_by_id() {
        let dir = tempfile::tempdir().unwrap();
        write_file(dir.path(), "things/get.https", ">>>\nGET https://example.com/things\n");

        let collection = Collection::load(&[dir.path().to_path_buf()]).unwrap();
        assert!(collection.endpoint("things/get").is_some());
    }

    #[test]
    fn test_find_endpoint_by_method_fallback() {
        let dir = tempfile::tempdir().unwrap();
        write_file(dir.path(), "things/get.https", ">>>\nGET https://example.com/things\n");

        let collection = Collection::load(&[dir.path().to_path_buf()]).unwrap();
        let endpoint = collection.find_endpoint(None, "GET").unwrap();
        assert_eq!(endpoint.id, "things/get");
    }

    #[test]
    fn test_find_endpoint_missing_id_errors() {
        let collection = Collection::default();
        let err = collection.find_endpoint(Some("nope"), "GET").unwrap_err();
        assert!(matches!(err, PardonError::Configuration(_)));
    }
}
