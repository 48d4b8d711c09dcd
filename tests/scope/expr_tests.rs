use pardon::scope::expr::Value;
use pardon::scope::{MapEnvironment, ScriptEnvironment};

/// Scenario S4 (the slice of it the restricted expression grammar
/// actually models): `.await` desugars to a call that, for a value
/// already bound in the environment, just returns it — the grammar here
/// stops well short of a JSON/array value space, so this exercises the
/// desugaring itself rather than `JSON.parse(...).length`.
#[test]
fn test_s4_await_desugars_through_environment_evaluate() {
    let mut env = MapEnvironment::default();
    env.values.insert("text".to_string(), "[\"x\",\"y\"]".to_string());

    let direct = env.evaluate("text").unwrap();
    let awaited = env.evaluate("text.await").unwrap();

    assert_eq!(direct, Value::String("[\"x\",\"y\"]".to_string()));
    assert_eq!(awaited, direct);
}

#[test]
fn test_expression_binding_feeds_arithmetic_and_comparison() {
    let env = MapEnvironment::default();
    assert_eq!(env.evaluate("1 + 2 * 3").unwrap(), Value::Number(7.0));
    assert_eq!(env.evaluate("1 < 2 && 3 >= 3").unwrap(), Value::Bool(true));
}

#[test]
fn test_undefined_identifier_errors_through_environment() {
    let env = MapEnvironment::default();
    assert!(env.evaluate("missing_var").is_err());
}
