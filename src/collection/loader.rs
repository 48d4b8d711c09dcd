//! Scans an ordered list of layer directories with `walkdir` (the
//! teacher's `list_sql_templates` pattern, generalized from "just list
//! `.sql` files" to the full layer classification table), classifies
//! every file, and assembles endpoints by merging configuration layers
//! ancestral to each `.https` file's path.

use std::path::{Path, PathBuf};

use walkdir::WalkDir;

use crate::errors::Result;
use crate::https;

use super::model::{Asset, AssetKind, ConfigFile, DataRecords, Endpoint};

fn classify(path: &Path) -> Option<AssetKind> {
    let name = path.file_name()?.to_str()?;
    if name == "service.yaml" || name == "config.yaml" {
        return Some(AssetKind::Configuration);
    }
    if name.ends_with(".mix.https") || name.ends_with(".mux.https") {
        return Some(AssetKind::Mixin);
    }
    if name.ends_with(".https") {
        return Some(AssetKind::Endpoint);
    }
    if name.ends_with(".yaml") || name.ends_with(".yml") || name.ends_with(".json") {
        return Some(AssetKind::Data);
    }
    if name.ends_with(".ts") || name.ends_with(".js") {
        return Some(AssetKind::Script);
    }
    None
}

fn asset_id(root: &Path, path: &Path) -> String {
    let rel = path.strip_prefix(root).unwrap_or(path);
    let rel = rel.with_extension("");
    rel.components()
        .map(|c| c.as_os_str().to_string_lossy())
        .collect::<Vec<_>>()
        .join("/")
}

/// Walk one layer directory, returning every classified asset with an
/// id relative to `root`.
pub fn scan_layer(root: impl AsRef<Path>, layer_index: usize) -> Result<Vec<Asset>> {
    let root = root.as_ref();
    let mut out = Vec::new();

    for entry in WalkDir::new(root) {
        let entry = entry?;
        if !entry.file_type().is_file() {
            continue;
        }
        let path = entry.path();
        let Some(kind) = classify(path) else { continue };
        out.push(Asset {
            id: asset_id(root, path),
            kind,
            layer_index,
            path: path.to_path_buf(),
        });
    }

    out.sort_by(|a, b| a.id.cmp(&b.id));
    Ok(out)
}

/// Scan every layer in order, returning all assets across all layers —
/// callers merge same-id assets themselves (configurations are
/// discovered first per layer so dependency ordering holds).
pub fn scan_layers(roots: &[PathBuf]) -> Result<Vec<Asset>> {
    let mut out = Vec::new();
    for (index, root) in roots.iter().enumerate() {
        out.extend(scan_layer(root, index)?);
    }
    Ok(out)
}

fn load_config_file(path: &Path) -> Result<ConfigFile> {
    let text = std::fs::read_to_string(path)?;
    Ok(serde_yaml::from_str(&text)?)
}

fn load_data_file(path: &Path) -> Result<serde_json::Value> {
    let text = std::fs::read_to_string(path)?;
    if path.extension().and_then(|e| e.to_str()) == Some("json") {
        Ok(serde_json::from_str(&text)?)
    } else {
        Ok(serde_yaml::from_str(&text)?)
    }
}

/// Merge every configuration asset sharing `id`, in layer order (later
/// layers' values win per `ConfigFile::merge`'s child-wins rule).
pub fn merge_configurations(assets: &[Asset]) -> Result<ConfigFile> {
    let mut merged = ConfigFile::default();
    let mut configs: Vec<&Asset> = assets.iter().filter(|a| a.kind == AssetKind::Configuration).collect();
    configs.sort_by_key(|a| a.layer_index);
    for asset in configs {
        let file = load_config_file(&asset.path)?;
        merged = merged.merge(&file);
    }
    Ok(merged)
}

/// Load every `**/*.yaml`/`**/*.json` data asset into a flat id -> value
/// map, including the `…/defaults` records consulted during defaults
/// propagation.
pub fn load_data_records(assets: &[Asset]) -> Result<DataRecords> {
    let mut out = DataRecords::new();
    for asset in assets.iter().filter(|a| a.kind == AssetKind::Data) {
        out.insert(asset.id.clone(), load_data_file(&asset.path)?);
    }
    Ok(out)
}

/// Ancestral path prefixes of `id`, root-to-leaf (`"a/b/c"` ->
/// `["", "a", "a/b", "a/b/c"]`), used both for configuration-layer
/// ancestry and defaults propagation.
fn ancestry(id: &str) -> Vec<String> {
    let mut out = vec![String::new()];
    let mut cursor = String::new();
    for segment in id.split('/') {
        if !cursor.is_empty() {
            cursor.push('/');
        }
        cursor.push_str(segment);
        out.push(cursor.clone());
    }
    out
}

/// Deep-merge every `…/defaults` data record found along `id`'s ancestry
/// (root to leaf, so a closer default wins) into `config.defaults`.
pub fn propagate_defaults(config: &ConfigFile, id: &str, data: &DataRecords) -> ConfigFile {
    let mut defaults = config.defaults.clone();
    for prefix in ancestry(id) {
        let key = if prefix.is_empty() {
            "defaults".to_string()
        } else {
            format!("{prefix}/defaults")
        };
        if let Some(record) = data.get(&key) {
            defaults = crate::utils::deep_merge(&defaults, record);
        }
    }
    ConfigFile {
        defaults,
        ..config.clone()
    }
}

/// Assemble every endpoint: each `.https` asset's steps, merged against
/// the configuration layers ancestral to its path and with defaults
/// propagated from the collection root down.
pub fn assemble_endpoints(assets: &[Asset], data: &DataRecords) -> Result<Vec<Endpoint>> {
    let base_config = merge_configurations(assets)?;

    let mut by_id: std::collections::BTreeMap<String, Vec<&Asset>> = std::collections::BTreeMap::new();
    for asset in assets.iter().filter(|a| a.kind == AssetKind::Endpoint) {
        by_id.entry(asset.id.clone()).or_default().push(asset);
    }

    let mut endpoints = Vec::new();
    for (id, mut files) in by_id {
        files.sort_by_key(|a| a.layer_index);
        let mut steps = Vec::new();
        for asset in files {
            let text = std::fs::read_to_string(&asset.path)?;
            steps.push(https::parse::parse(&text)?);
        }

        // Ancestral configuration assets specifically (service.yaml /
        // config.yaml found at or above this endpoint's directory).
        let ancestral: Vec<&Asset> = assets
            .iter()
            .filter(|a| a.kind == AssetKind::Configuration)
            .filter(|a| is_ancestor_dir(&parent_id(&a.id), &id))
            .collect();
        let mut ancestral_sorted = ancestral;
        ancestral_sorted.sort_by_key(|a| a.layer_index);
        let mut config = base_config.clone();
        for asset in ancestral_sorted {
            config = config.merge(&load_config_file(&asset.path)?);
        }
        config = propagate_defaults(&config, &id, data);

        endpoints.push(Endpoint { id, steps, config });
    }

    Ok(endpoints)
}

fn parent_id(config_asset_id: &str) -> String {
    match config_asset_id.rsplit_once('/') {
        Some((parent, _)) => parent.to_string(),
        None => String::new(),
    }
}

/// True if `dir` (a `/`-joined path, possibly empty for the root) is an
/// ancestor directory of `endpoint_id`, matching whole path segments
/// rather than a raw string prefix.
fn is_ancestor_dir(dir: &str, endpoint_id: &str) -> bool {
    if dir.is_empty() {
        return true;
    }
    endpoint_id == dir || endpoint_id.starts_with(&format!("{dir}/"))
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::io::Write;

    fn write_file(dir: &Path, rel: &str, contents: &str) {
        let path = dir.join(rel);
        std::fs::create_dir_all(path.parent().unwrap()).unwrap();
        let mut f = std::fs::File::create(path).unwrap();
        f.write_all(contents.as_bytes()).unwrap();
    }

    #[test]
    fn test_classify_by_extension() {
        assert_eq!(classify(Path::new("a/service.yaml")), Some(AssetKind::Configuration));
        assert_eq!(classify(Path::new("a/get.https")), Some(AssetKind::Endpoint));
        assert_eq!(classify(Path::new("a/thing.mix.https")), Some(AssetKind::Mixin));
        assert_eq!(classify(Path::new("a/data.yaml")), Some(AssetKind::Data));
        assert_eq!(classify(Path::new("a/hook.ts")), Some(AssetKind::Script));
    }

    #[test]
    fn test_scan_layer_finds_and_sorts_assets() {
        let dir = tempfile::tempdir().unwrap();
        write_file(dir.path(), "service.yaml", "config: {}\n");
        write_file(dir.path(), "things/get.https", ">>>\nGET https://example.com/things\n");

        let assets = scan_layer(dir.path(), 0).unwrap();
        assert_eq!(assets.len(), 2);
        assert_eq!(assets[0].id, "service");
        assert_eq!(assets[1].id, "things/get");
    }

    #[test]
    fn test_assemble_endpoints_merges_ancestral_config() {
        let dir = tempfile::tempdir().unwrap();
        write_file(dir.path(), "service.yaml", "defaults:\n  origin: https://example.com\n");
        write_file(dir.path(), "things/get.https", ">>>\nGET https://example.com/things\n");

        let assets = scan_layer(dir.path(), 0).unwrap();
        let data = load_data_records(&assets).unwrap();
        let endpoints = assemble_endpoints(&assets, &data).unwrap();
        assert_eq!(endpoints.len(), 1);
        assert_eq!(endpoints[0].id, "things/get");
        assert_eq!(
            endpoints[0].config.defaults.get("origin").and_then(|v| v.as_str()),
            Some("https://example.com")
        );
    }
}
