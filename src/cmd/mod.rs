//! Command-line interface and end-to-end pipeline execution for
//! `pardon-run`: load a collection, match an ad-hoc "ask" against it,
//! and drive the request through the pipeline.

use std::collections::BTreeMap;
use std::path::PathBuf;
use std::sync::Arc;

use clap::Parser;
use tracing::{info, instrument};

use crate::collection::Collection;
use crate::config_space::ConfigSpace;
use crate::errors::{PardonError, Result};
use crate::https;
use crate::pipeline::Execution;
use crate::schema::{ExecutionContext, Mode, Phase, Schema};
use crate::scope::{MapEnvironment, ScriptEnvironment};

/// `pardon-run` command-line flags.
#[derive(Parser, Debug)]
#[command(
    name = "pardon-run",
    version,
    about = "Render and execute an HTTP request against a pardon collection."
)]
pub struct Cli {
    /// Collection root directory (layer directories are its immediate children).
    #[arg(long = "collection", short = 'c', value_name = "DIR", default_value = ".")]
    pub collection: String,

    /// Config override, `KEY=VALUE`. Repeatable.
    #[arg(long = "env", short = 'e', value_name = "KEY=VALUE")]
    pub env: Vec<String>,

    /// Include redacted (`@`-hinted) values in the printed output.
    #[arg(long = "secrets")]
    pub secrets: bool,

    /// Emit logs in JSON format.
    #[arg(long = "log-json")]
    pub log_json: bool,

    /// Set log level (overrides env vars like `PARDON_LOG_LEVEL`).
    #[arg(long = "log-level")]
    pub log_level: Option<String>,

    /// The HTTP sketch text (`METHOD url` plus optional header lines), or
    /// `@path` to read it from disk.
    pub ask: String,
}

/// What `run_ask` produced, and the process exit code it implies
/// (spec's 0/1/2/3: success / user error / configuration error /
/// network error).
pub struct ExecutionOutcome {
    pub rendered_request: serde_json::Value,
    pub response: Option<serde_json::Value>,
    pub exit_code: i32,
}

fn parse_env_overrides(pairs: &[String]) -> BTreeMap<String, String> {
    pairs
        .iter()
        .filter_map(|pair| pair.split_once('=').map(|(k, v)| (k.to_string(), v.to_string())))
        .collect()
}

fn read_ask_text(ask: &str) -> Result<String> {
    if let Some(path) = ask.strip_prefix('@') {
        Ok(std::fs::read_to_string(path)?)
    } else {
        Ok(ask.to_string())
    }
}

/// Normalize a bare sketch (no `>>>` line yet) into `.https` source.
fn normalize_ask_source(text: &str) -> String {
    if text.trim_start().starts_with(">>>") {
        text.to_string()
    } else {
        format!(">>>\n{text}\n")
    }
}

pub fn exit_code_for(err: &PardonError) -> i32 {
    match err {
        PardonError::Configuration(_) | PardonError::Flow(_) => 2,
        PardonError::Reqwest(_) => 3,
        PardonError::Execution { cause, .. } => exit_code_for(cause),
        _ => 1,
    }
}

/// Load the collection, match `cli.ask` against it, and run it through
/// the execution pipeline end to end. On failure, the caller maps the
/// returned error to a process exit code via [`exit_code_for`].
#[instrument(name = "run_ask", skip(cli), fields(collection = %cli.collection))]
pub async fn run_ask(cli: &Cli) -> Result<ExecutionOutcome> {
    let collection_root = PathBuf::from(&cli.collection);
    let layers = discover_layers(&collection_root)?;
    let collection = Collection::load(&layers)?;

    let ask_text = read_ask_text(&cli.ask)?;
    let ask_file = https::parse::parse(&normalize_ask_source(&ask_text))?;
    let ask_method = literal_method(&ask_file.request.method);

    let endpoint = collection.find_endpoint(None, &ask_method).ok();
    info!(endpoint = ?endpoint.map(|e| e.id.as_str()), "matched endpoint");

    let ask_schema = ask_file.request.to_schema();
    let (template, response_template) = match endpoint.and_then(|e| e.steps.first()) {
        Some(step) => {
            let merged = step
                .request
                .to_schema()
                .merge(&ask_schema, ExecutionContext::new(Mode::Match, Phase::Build))?;
            (merged, step.response.as_ref().map(|r| r.to_schema()))
        }
        None => (ask_schema, None),
    };

    let mut overrides = parse_env_overrides(&cli.env);
    let mut config = BTreeMap::new();
    if let Some(ep) = endpoint {
        let space = collection.config_space(&ep.id)?;
        let forced = reconcile_config(&template, &space);
        let chosen = space.choose(&forced)?;
        for (dimension, option) in &chosen {
            overrides.entry(dimension.clone()).or_insert_with(|| option.clone());
        }
        if let Some(implied) = space.implied(&chosen).as_object() {
            for (key, value) in implied {
                if let Some(s) = value.as_str() {
                    config.entry(key.clone()).or_insert_with(|| s.to_string());
                }
            }
        }
    }
    let environment: Arc<dyn ScriptEnvironment> = Arc::new(MapEnvironment {
        values: overrides,
        config,
    });

    let mut execution = Execution::init(template, response_template, environment)?;
    let rendered_request = execution.render()?.clone();
    let rendered_request = if cli.secrets {
        rendered_request
    } else {
        redact_top_level(rendered_request)
    };

    execution.fetch().await?;
    let processed = execution.process()?.clone();

    Ok(ExecutionOutcome {
        rendered_request,
        response: Some(processed),
        exit_code: 0,
    })
}

/// Scan `template`'s concrete top-level scalar fields and reconcile each
/// one against `space`, forcing every dimension a field's value pins down
/// (C5's pattern↔option reconciliation, scenario S5: a concrete `origin`
/// forces `env=prod` before any `{{env}}` pattern elsewhere renders).
fn reconcile_config(template: &Schema, space: &ConfigSpace) -> BTreeMap<String, String> {
    let mut forced = BTreeMap::new();
    if let Schema::Object(obj) = template {
        for (key, field) in &obj.fields {
            if let Schema::Scalar(s) = field {
                if let Some(lit) = &s.literal {
                    for (dimension, option) in space.reconcile(key, &serde_json::Value::String(lit.clone())) {
                        forced.entry(dimension).or_insert(option);
                    }
                }
            }
        }
    }
    forced
}

fn literal_method(schema: &Schema) -> String {
    match schema {
        Schema::Scalar(s) => s.literal.clone().unwrap_or_else(|| "GET".to_string()),
        _ => "GET".to_string(),
    }
}

/// Best-effort display redaction for fields the environment didn't
/// already mark `@`-redacted: values named like secrets never print in
/// full without `--secrets`.
fn redact_top_level(mut value: serde_json::Value) -> serde_json::Value {
    if let Some(obj) = value.as_object_mut() {
        if let Some(headers) = obj.get_mut("headers") {
            if let Some(arr) = headers.as_array_mut() {
                for pair in arr.iter_mut() {
                    if let Some(pair_arr) = pair.as_array_mut() {
                        if let Some(name) = pair_arr.first().and_then(|v| v.as_str()) {
                            if name.eq_ignore_ascii_case("authorization") {
                                pair_arr[1] = serde_json::json!("***");
                            }
                        }
                    }
                }
            }
        }
    }
    value
}

fn discover_layers(root: &std::path::Path) -> Result<Vec<PathBuf>> {
    if !root.exists() {
        return Err(PardonError::Configuration(format!(
            "collection root `{}` does not exist",
            root.display()
        )));
    }
    let mut layers: Vec<PathBuf> = std::fs::read_dir(root)?
        .filter_map(|e| e.ok())
        .map(|e| e.path())
        .filter(|p| p.is_dir())
        .collect();
    layers.sort();
    if layers.is_empty() {
        layers.push(root.to_path_buf());
    }
    Ok(layers)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_parse_env_overrides() {
        let overrides = parse_env_overrides(&["FOO=bar".to_string(), "malformed".to_string()]);
        assert_eq!(overrides.get("FOO"), Some(&"bar".to_string()));
        assert_eq!(overrides.len(), 1);
    }

    #[test]
    fn test_normalize_ask_source_adds_delimiter() {
        let normalized = normalize_ask_source("GET https://example.com/things");
        assert!(normalized.starts_with(">>>\n"));
    }

    #[test]
    fn test_normalize_ask_source_leaves_existing_delimiter() {
        let source = ">>>\nGET https://example.com/things\n";
        assert_eq!(normalize_ask_source(source), source);
    }

    #[test]
    fn test_exit_code_for_configuration_error() {
        let err = PardonError::Configuration("bad".into());
        assert_eq!(exit_code_for(&err), 2);
    }
}
