use std::collections::BTreeMap;

use serde_json::json;

use pardon::schema::{ExecutionContext, KeyedListNode, Mode, ObjectNode, Phase, ScalarNode, Schema};
use pardon::scope::{MapEnvironment, ScopeArena};

fn lit(s: &str) -> Schema {
    Schema::Scalar(ScalarNode::string_literal(s))
}

fn value_record(v: &str) -> Schema {
    Schema::Object(ObjectNode::new().with_field("value", lit(v)))
}

/// Scenario S3: a keyed list matched against concrete `{name, value}`
/// entries resolves to one binding per distinct key, each carrying its
/// own value — entries don't interfere with each other's bindings the
/// way two object fields sharing one variable name would (that's S2).
#[test]
fn test_s3_keyed_list_resolves_one_binding_per_key() {
    let key_template = Schema::Scalar(ScalarNode::templated(
        pardon::schema::nodes::scalar::ScalarKind::String,
        pardon::pattern::Pattern::parse("{{key}}", &pardon::pattern::GenericBuilding).unwrap(),
    ));
    let value_template = Schema::Object(
        ObjectNode::new().with_field(
            "value",
            Schema::Scalar(ScalarNode::templated(
                pardon::schema::nodes::scalar::ScalarKind::String,
                pardon::pattern::Pattern::parse("{{v}}", &pardon::pattern::GenericBuilding).unwrap(),
            )),
        ),
    );

    let matched = Schema::KeyedList(
        KeyedListNode::new(key_template, value_template)
            .with_entry(lit("a"), value_record("1"))
            .with_entry(lit("b"), value_record("2")),
    );

    let mut arena = ScopeArena::new();
    let root = matched.scope(&mut arena, &arena.root()).unwrap();
    let env = MapEnvironment::default();
    let rendered = matched
        .render(&mut arena, &root, &env, ExecutionContext::new(Mode::Render, Phase::Build))
        .unwrap();

    let pairs = rendered.as_array().unwrap();
    assert_eq!(pairs.len(), 2);

    let mut resolved_values = BTreeMap::new();
    for pair in pairs {
        let entry = pair.as_array().unwrap();
        let key = entry[0].as_str().unwrap().to_string();
        resolved_values.insert(key, entry[1].clone());
    }

    assert_eq!(resolved_values.get("a"), Some(&json!({"value": "1"})));
    assert_eq!(resolved_values.get("b"), Some(&json!({"value": "2"})));
}

/// Merging accumulates entries keyed by their (independently) matched
/// key rather than overwriting — a second entry under a distinct key
/// from a different merge side is additive, matching S3's two-entry
/// result.
#[test]
fn test_keyed_list_merge_accumulates_distinct_keys() {
    let a = KeyedListNode::new(lit("k"), lit("v")).with_entry(lit("a"), value_record("1"));
    let b = KeyedListNode::new(lit("k"), lit("v")).with_entry(lit("b"), value_record("2"));

    let merged = pardon::schema::nodes::keyed_list::merge(&a, &b, ExecutionContext::new(Mode::Mix, Phase::Build)).unwrap();
    assert_eq!(merged.entries.len(), 2);
}
