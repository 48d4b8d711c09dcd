//! Builtin expression functions exposed to the restricted grammar in
//! [`crate::scope::expr`] — the whitelist an environment's `call`
//! implementation dispatches into for anything that isn't a plain
//! identifier lookup.

use chrono::{Duration, Utc};

use crate::errors::{PardonError, Result};
use crate::scope::expr::Value;

/// `current_date()` — current UTC instant, RFC 3339.
pub fn current_date() -> String {
    Utc::now().to_rfc3339()
}

/// `few_date_ago(n)` — UTC instant `n` days in the past, RFC 3339.
pub fn few_date_ago(days: i64) -> String {
    (Utc::now() - Duration::days(days)).to_rfc3339()
}

/// Dispatch a builtin call by name. Environments implementing
/// [`crate::scope::ScriptEnvironment`] delegate unrecognized `call`s here
/// before giving up.
pub fn call_builtin(name: &str, args: &[Value]) -> Result<Value> {
    match name {
        "current_date" => Ok(Value::String(current_date())),
        "few_date_ago" => {
            let days = match args.first() {
                Some(Value::Number(n)) => *n as i64,
                _ => {
                    return Err(PardonError::Configuration(
                        "few_date_ago(n) requires a numeric argument".into(),
                    ))
                }
            };
            Ok(Value::String(few_date_ago(days)))
        }
        _ => Err(PardonError::Configuration(format!(
            "unknown builtin function `{name}`"
        ))),
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_current_date_is_rfc3339() {
        let d = current_date();
        assert!(chrono::DateTime::parse_from_rfc3339(&d).is_ok());
    }

    #[test]
    fn test_few_date_ago_is_before_now() {
        let now = Utc::now();
        let past = few_date_ago(5);
        let parsed = chrono::DateTime::parse_from_rfc3339(&past).unwrap();
        assert!(parsed.with_timezone(&Utc) < now);
    }

    #[test]
    fn test_call_builtin_dispatches() {
        let result = call_builtin("few_date_ago", &[Value::Number(1.0)]).unwrap();
        assert!(matches!(result, Value::String(_)));
    }
}
