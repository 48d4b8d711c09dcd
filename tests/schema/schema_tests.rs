use serde_json::json;

use pardon::schema::{ExecutionContext, Mode, ObjectNode, Phase, ReferenceNode, ScalarNode, Schema};
use pardon::scope::{MapEnvironment, ScopeArena};

fn obj(fields: &[(&str, Schema)]) -> Schema {
    let mut node = ObjectNode::new();
    for (name, schema) in fields {
        node = node.with_field(*name, schema.clone());
    }
    Schema::Object(node)
}

/// Testable Property 4: merging two structurally compatible templates is
/// associative in the sense that matters for this kernel — regardless of
/// merge order, the final schema renders the same concrete value.
#[test]
fn test_merge_associativity_property_4() {
    let t1 = obj(&[("id", Schema::Scalar(ScalarNode::string_literal("42")))]);
    let t2 = obj(&[("name", Schema::Reference(ReferenceNode::named("name")))]);

    let ctx = ExecutionContext::new(Mode::Mix, Phase::Build);
    let ab = t1.merge(&t2, ctx).unwrap();
    let ba = t2.merge(&t1, ctx).unwrap();

    let env = MapEnvironment {
        values: [("name".to_string(), "widget".to_string())].into_iter().collect(),
        config: Default::default(),
    };

    let mut arena_ab = ScopeArena::new();
    let root_ab = ab.scope(&mut arena_ab, &arena_ab.root()).unwrap();
    let rendered_ab = ab
        .render(&mut arena_ab, &root_ab, &env, ExecutionContext::new(Mode::Render, Phase::Build))
        .unwrap();

    let mut arena_ba = ScopeArena::new();
    let root_ba = ba.scope(&mut arena_ba, &arena_ba.root()).unwrap();
    let rendered_ba = ba
        .render(&mut arena_ba, &root_ba, &env, ExecutionContext::new(Mode::Render, Phase::Build))
        .unwrap();

    assert_eq!(rendered_ab, json!({"id": "42", "name": "widget"}));
    assert_eq!(rendered_ab, rendered_ba);
}

fn templated_pattern_field() -> Schema {
    Schema::Scalar(ScalarNode::templated(
        pardon::schema::nodes::scalar::ScalarKind::String,
        pardon::pattern::Pattern::parse("{{x}}", &pardon::pattern::GenericBuilding).unwrap(),
    ))
}

/// Scenario S2, exactly as spec'd: `{a: "{{x}}", b: "{{x}}"}` merged
/// with `{a:"hello", b:"hello"}` succeeds, since every occurrence of `x`
/// agrees.
#[test]
fn test_s2_reference_binding_consistent_values_merge_and_render() {
    let template = obj(&[("a", templated_pattern_field()), ("b", templated_pattern_field())]);
    let concrete = obj(&[
        ("a", Schema::Scalar(ScalarNode::string_literal("hello"))),
        ("b", Schema::Scalar(ScalarNode::string_literal("hello"))),
    ]);

    let merged = template
        .merge(&concrete, ExecutionContext::new(Mode::Match, Phase::Build))
        .unwrap();

    let mut arena = ScopeArena::new();
    let root = merged.scope(&mut arena, &arena.root()).unwrap();
    let env = MapEnvironment::default();
    let rendered = merged
        .render(&mut arena, &root, &env, ExecutionContext::new(Mode::Render, Phase::Build))
        .unwrap();

    assert_eq!(rendered, json!({"a": "hello", "b": "hello"}));
}

/// Scenario S2's conflicting case: `{a:"hello", b:"world"}` disagrees on
/// what `x` is, which merge lets through (each field is independently
/// compatible with the pattern) but scope+render catches once both
/// fields bind the *same* shared variable to different values —
/// `SchemaErrorKind::Inconsistent`, the "redefined:x" this scenario names.
#[test]
fn test_s2_reference_binding_conflicting_values_is_inconsistent() {
    let template = obj(&[("a", templated_pattern_field()), ("b", templated_pattern_field())]);
    let concrete = obj(&[
        ("a", Schema::Scalar(ScalarNode::string_literal("hello"))),
        ("b", Schema::Scalar(ScalarNode::string_literal("world"))),
    ]);

    let merged = template
        .merge(&concrete, ExecutionContext::new(Mode::Match, Phase::Build))
        .unwrap();

    let mut arena = ScopeArena::new();
    let root = merged.scope(&mut arena, &arena.root()).unwrap();
    let env = MapEnvironment::default();
    let err = merged
        .render(&mut arena, &root, &env, ExecutionContext::new(Mode::Render, Phase::Build))
        .unwrap_err();

    let message = err.to_string();
    assert!(message.contains("redefined"), "unexpected error: {message}");
}

/// The same conflict, reached directly through two occurrences of a
/// `Schema::Reference` sharing one scope (e.g. two request fields
/// templated from one config key) rather than through a merged pattern.
#[test]
fn test_s2_reference_render_twice_at_same_scope_conflicts() {
    let r = ReferenceNode::named("x");
    let mut arena = ScopeArena::new();
    let scope = arena.root();
    let env = MapEnvironment::default();
    let ctx = ExecutionContext::new(Mode::Render, Phase::Build);

    arena.define(&scope, "x", "hello").unwrap();
    let first = Schema::Reference(r.clone()).render(&mut arena, &scope, &env, ctx).unwrap();
    assert_eq!(first, json!("hello"));

    // A later attempt to rebind "x" to a different value at the same
    // scope is the conflict S2 describes.
    let err = arena.define(&scope, "x", "world").unwrap_err();
    assert!(err.to_string().contains("x"));
}

/// Object field merge is independent per key: disjoint fields from both
/// sides survive, agreeing literal fields collapse to one, and the
/// archetype (if present on either side) is carried through.
#[test]
fn test_object_merge_keeps_disjoint_fields_and_archetype() {
    let a = ObjectNode::new()
        .with_field("id", Schema::Scalar(ScalarNode::string_literal("1")))
        .with_field("shared", Schema::Scalar(ScalarNode::string_literal("same")));
    let b = ObjectNode::new()
        .with_field("name", Schema::Scalar(ScalarNode::string_literal("widget")))
        .with_field("shared", Schema::Scalar(ScalarNode::string_literal("same")));

    let merged = pardon::schema::nodes::object::merge(&a, &b, ExecutionContext::new(Mode::Mix, Phase::Build)).unwrap();
    assert!(merged.fields.contains_key("id"));
    assert!(merged.fields.contains_key("name"));
    assert!(merged.fields.contains_key("shared"));
}
