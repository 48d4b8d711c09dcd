use std::collections::BTreeMap;
use std::sync::Arc;

use pardon::flows::{Flow, Signature};
use pardon::pipeline::Execution;
use pardon::schema::{ObjectNode, ReferenceNode, ScalarNode, Schema};
use pardon::scope::MapEnvironment;

/// Scenario S6's capture mechanism, isolated from the network: a value
/// captured from an earlier step's response (here, simulated directly
/// rather than fetched) resolves a `{{token}}` reference in a later
/// step's request the same way `run_flow`'s per-step environment layers
/// captured values over the base environment.
#[test]
fn test_s6_captured_value_resolves_in_next_step_schema() {
    let mut env = MapEnvironment::default();
    // What step 1 would have captured from its response.
    env.values.insert("token".to_string(), "tok-abc123".to_string());

    let step2_request = Schema::Object(
        ObjectNode::new()
            .with_field("method", Schema::Scalar(ScalarNode::string_literal("GET")))
            .with_field("origin", Schema::Scalar(ScalarNode::string_literal("https://example.invalid")))
            .with_field("pathname", Schema::Scalar(ScalarNode::string_literal("/me")))
            .with_field("authorization", Schema::Reference(ReferenceNode::named("token"))),
    );

    let mut exec = Execution::init(step2_request, None, Arc::new(env)).unwrap();
    let rendered = exec.render().unwrap();
    assert_eq!(rendered["authorization"], "tok-abc123");
}

/// A flow's signature composes its argument dict from call-site options
/// before the first step ever runs, and that argument feeds the first
/// step's environment the same way a captured value feeds a later one.
#[test]
fn test_s6_signature_argument_seeds_first_step_environment() {
    let signature = Signature::new().required("user");
    let mut options = BTreeMap::new();
    options.insert("user".to_string(), serde_json::json!("alice"));

    let argument = signature.compose_values_dict(&options, &MapEnvironment::default()).unwrap();
    assert_eq!(argument["user"], serde_json::json!("alice"));
}

/// A two-step flow (`login` capturing a token, `me` consuming it) runs
/// the signature/capture plumbing before ever touching the network; the
/// first fetch to an unreachable address is where it actually fails,
/// confirming the composition itself doesn't panic or short-circuit.
#[tokio::test]
async fn test_s6_two_step_flow_composes_before_failing_on_fetch() {
    let login = Schema::Object(
        ObjectNode::new()
            .with_field("method", Schema::Scalar(ScalarNode::string_literal("POST")))
            .with_field("origin", Schema::Scalar(ScalarNode::string_literal("https://example.invalid")))
            .with_field("pathname", Schema::Scalar(ScalarNode::string_literal("/login"))),
    );
    let me = Schema::Object(
        ObjectNode::new()
            .with_field("method", Schema::Scalar(ScalarNode::string_literal("GET")))
            .with_field("origin", Schema::Scalar(ScalarNode::string_literal("https://example.invalid")))
            .with_field("pathname", Schema::Scalar(ScalarNode::string_literal("/me")))
            .with_field("authorization", Schema::Reference(ReferenceNode::named("token"))),
    );

    let flow = Flow::new(Signature::new()).with_step(login, None).with_step(me, None);
    let result = pardon::flows::run_flow(&flow, BTreeMap::new(), Arc::new(MapEnvironment::default())).await;
    assert!(result.is_err());
}
