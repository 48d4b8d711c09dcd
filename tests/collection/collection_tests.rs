use std::io::Write;
use std::path::Path;

use pardon::collection::Collection;

fn write_file(dir: &Path, rel: &str, contents: &str) {
    let path = dir.join(rel);
    std::fs::create_dir_all(path.parent().unwrap()).unwrap();
    let mut f = std::fs::File::create(path).unwrap();
    f.write_all(contents.as_bytes()).unwrap();
}

/// Scenario S5, exactly as spec'd: given a concrete origin matching one
/// of the `env` dimension's options, reconciliation forces `env=prod` —
/// the reverse of `choose`/`implied`, which only go from a selected
/// dimension to its implied fragment.
#[test]
fn test_s5_config_selection_from_collection() {
    let dir = tempfile::tempdir().unwrap();
    write_file(
        dir.path(),
        "service.yaml",
        "config:\n  env:\n    - name: stage\n      origin: https://stage.example.com\n    - name: prod\n      origin: https://prod.example.com\n",
    );
    write_file(dir.path(), "things/get.https", ">>>\nGET {{origin}}/v1/things\n");

    let collection = Collection::load(&[dir.path().to_path_buf()]).unwrap();
    let space = collection.config_space("things/get").unwrap();

    let forced = space.reconcile("origin", &serde_json::json!("https://prod.example.com"));
    assert_eq!(forced.get("env"), Some(&"prod".to_string()));

    let chosen = space.choose(&forced).unwrap();
    let implied = space.implied(&chosen);
    assert_eq!(implied.get("origin").and_then(|v| v.as_str()), Some("https://prod.example.com"));
}

/// Layers later in the precedence order override earlier ones for the
/// same configuration key, and endpoints nested deeper inherit defaults
/// propagated from ancestor `defaults` data records.
#[test]
fn test_layer_precedence_and_nested_defaults_propagate() {
    let base = tempfile::tempdir().unwrap();
    write_file(base.path(), "service.yaml", "defaults:\n  origin: https://example.com\n");
    write_file(base.path(), "things/get.https", ">>>\nGET {{origin}}/v1/things\n");
    write_file(base.path(), "things/defaults.yaml", "id: \"default-id\"\n");

    let overlay = tempfile::tempdir().unwrap();
    write_file(overlay.path(), "service.yaml", "defaults:\n  origin: https://overridden.example.com\n");

    let collection = Collection::load(&[base.path().to_path_buf(), overlay.path().to_path_buf()]).unwrap();
    let endpoint = collection.endpoint("things/get").unwrap();

    assert_eq!(
        endpoint.config.defaults.get("origin").and_then(|v| v.as_str()),
        Some("https://overridden.example.com")
    );
    assert_eq!(
        endpoint.config.defaults.get("id").and_then(|v| v.as_str()),
        Some("default-id")
    );
}

/// Mixin and data files are classified distinctly from endpoints and
/// configuration, and don't themselves become endpoints.
#[test]
fn test_mixin_and_data_assets_are_not_endpoints() {
    let dir = tempfile::tempdir().unwrap();
    write_file(dir.path(), "things/shared.mix.https", ">>>\nGET https://example.com/things\n");
    write_file(dir.path(), "things/seed.yaml", "id: 1\n");
    write_file(dir.path(), "things/get.https", ">>>\nGET https://example.com/things\n");

    let collection = Collection::load(&[dir.path().to_path_buf()]).unwrap();
    assert_eq!(collection.endpoints.len(), 1);
    assert_eq!(collection.endpoints[0].id, "things/get");
}
