//! The on-disk shapes a collection layer can contribute, and the
//! assembled, in-memory collection they fold into.
//!
//! `ConfigFile`/`ServiceFile` mirror the recognized configuration option
//! table (`config`, `defaults`, `import`, `export`, `mixin`): both
//! deserialize straight off `serde_yaml`, the way the teacher's
//! `load_config_from_path` reads a pipeline's `config.yaml`.

use std::collections::BTreeMap;

use indexmap::IndexMap;
use serde::Deserialize;
use serde_json::Value as Json;

use crate::config_space::{ConfigOption, ConfigSpace};
use crate::https::HttpsFile;

/// How a file under a layer directory was classified, per the layer
/// classification table.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum AssetKind {
    Configuration,
    Data,
    Mixin,
    Endpoint,
    Script,
}

/// `service.yaml` / `config.yaml`: config-space dimensions, a
/// conditional defaults tree, import/export bindings, and mixin
/// references — deserialized directly from YAML.
#[derive(Debug, Clone, Default, Deserialize)]
pub struct ConfigFile {
    #[serde(default)]
    pub config: IndexMap<String, Vec<RawConfigOption>>,
    #[serde(default)]
    pub defaults: Json,
    #[serde(default)]
    pub import: Vec<String>,
    #[serde(default)]
    pub export: Vec<String>,
    #[serde(default)]
    pub mixin: Vec<String>,
}

/// One option row under a `config` dimension, as written in YAML —
/// either a bare string (the option contributes nothing but its name)
/// or a named fragment.
#[derive(Debug, Clone, Deserialize)]
#[serde(untagged)]
pub enum RawConfigOption {
    Name(String),
    Fragment { name: String, #[serde(flatten)] fragment: Json },
}

impl ConfigFile {
    pub fn to_config_space(&self) -> ConfigSpace {
        let mut space = ConfigSpace::new(self.defaults.clone());
        for (dimension, rows) in &self.config {
            let options = rows
                .iter()
                .map(|row| match row {
                    RawConfigOption::Name(name) => ConfigOption {
                        name: name.clone(),
                        fragment: Json::Null,
                    },
                    RawConfigOption::Fragment { name, fragment } => ConfigOption {
                        name: name.clone(),
                        fragment: fragment.clone(),
                    },
                })
                .collect();
            space.add_dimension(dimension.clone(), options);
        }
        space
    }

    /// Dotted-key `config` merge: deep-merge `config`/`defaults`,
    /// child-wins (the overlay, i.e. the deeper layer, wins);
    /// `import`/`export`/`mixin` lists concat without duplicates.
    pub fn merge(&self, overlay: &ConfigFile) -> ConfigFile {
        let mut config = self.config.clone();
        for (dimension, rows) in &overlay.config {
            config.insert(dimension.clone(), rows.clone());
        }
        ConfigFile {
            config,
            defaults: crate::utils::deep_merge(&self.defaults, &overlay.defaults),
            import: concat_dedup(&self.import, &overlay.import),
            export: concat_dedup(&self.export, &overlay.export),
            mixin: concat_dedup(&self.mixin, &overlay.mixin),
        }
    }
}

fn concat_dedup(base: &[String], overlay: &[String]) -> Vec<String> {
    let mut out = base.to_vec();
    for item in overlay {
        if !out.contains(item) {
            out.push(item.clone());
        }
    }
    out
}

/// A classified layer file, before assembly into endpoints.
#[derive(Debug, Clone)]
pub struct Asset {
    pub id: String,
    pub kind: AssetKind,
    pub layer_index: usize,
    pub path: std::path::PathBuf,
}

/// An endpoint assembled from its own `.https` file(s) plus every
/// configuration layer ancestral to its path, with defaults propagated
/// down from the collection root.
#[derive(Debug, Clone)]
pub struct Endpoint {
    pub id: String,
    pub steps: Vec<HttpsFile>,
    pub config: ConfigFile,
}

/// Data records keyed by id (`**/*.yaml`, `**/*.json` assets, including
/// `…/defaults` records consulted during defaults propagation).
pub type DataRecords = BTreeMap<String, Json>;
