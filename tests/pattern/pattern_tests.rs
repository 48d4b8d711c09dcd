use std::collections::BTreeMap;

use pardon::pattern::{GenericBuilding, Pattern};

#[test]
fn test_pattern_round_trip_property_1() {
    let pattern = Pattern::parse("/v1/thing/{{id}}", &GenericBuilding).unwrap();
    let mut bindings = BTreeMap::new();
    bindings.insert("id".to_string(), "abc-123".to_string());

    let rendered = pattern.render_named(&bindings);
    assert_eq!(rendered, "/v1/thing/abc-123");

    let matched = pattern.match_value(&rendered).unwrap();
    assert_eq!(matched.get("id"), Some(&"abc-123".to_string()));
}

#[test]
fn test_s1_url_templating_renders_with_config_selected_origin() {
    // Mirrors spec scenario S1: a templated origin plus a config-selected
    // value for `env` renders the full URL.
    let origin_pattern = Pattern::parse("https://{{env}}.example.com", &GenericBuilding).unwrap();
    let path_pattern = Pattern::parse("/v1/thing/{{id}}", &GenericBuilding).unwrap();

    let mut bindings = BTreeMap::new();
    bindings.insert("env".to_string(), "stage".to_string());
    bindings.insert("id".to_string(), "abc".to_string());

    let origin = origin_pattern.render_named(&bindings);
    let path = path_pattern.render_named(&bindings);

    assert_eq!(format!("{origin}{path}"), "https://stage.example.com/v1/thing/abc");
}
