//! Flows (component C9): a flow is a signature plus a sequence of
//! `.https` interactions that run through the execution pipeline
//! (component C7) back to back. Only the `+` (flow-export)-hinted
//! values a step resolves feed the next step's environment — `@`
//! (redact)-hinted ones never do, matching Testable Property 6's
//! export filtering (see [`crate::scope::ScopeArena::resolved_values_filtered`]).
//! Nested flows get their own isolated tracker (component C8) chain so
//! each flow's `awaited` set only ever contains its own requests.

use std::collections::BTreeMap;
use std::sync::Arc;

use serde_json::Value as Json;

use crate::errors::{PardonError, Result};
use crate::https::fetch::RenderedRequest;
use crate::pipeline::Execution;
use crate::schema::Schema;
use crate::scope::ScriptEnvironment;
use crate::tracker;

/// How a declared flow parameter is satisfied.
#[derive(Debug, Clone, PartialEq)]
pub enum ParamKind {
    Required,
    Optional,
    Defaulted(Json),
    /// Collects every option not claimed by a named parameter.
    Rest,
}

#[derive(Debug, Clone, PartialEq)]
pub struct SignatureParam {
    /// The name the composed argument is stored under.
    pub name: String,
    /// The name looked up in `options`/`environment` — differs from
    /// `name` for a renamed parameter (`{ newName: oldName }`).
    pub source: String,
    pub kind: ParamKind,
}

/// A flow's declared parameter list, extracted from either a `.https`
/// `>>>` header's parameter tokens or a programmatically built
/// destructured-first-argument shape.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct Signature {
    pub params: Vec<SignatureParam>,
}

impl Signature {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn required(mut self, name: impl Into<String>) -> Self {
        let name = name.into();
        self.params.push(SignatureParam {
            source: name.clone(),
            name,
            kind: ParamKind::Required,
        });
        self
    }

    pub fn optional(mut self, name: impl Into<String>) -> Self {
        let name = name.into();
        self.params.push(SignatureParam {
            source: name.clone(),
            name,
            kind: ParamKind::Optional,
        });
        self
    }

    pub fn renamed(mut self, name: impl Into<String>, source: impl Into<String>) -> Self {
        self.params.push(SignatureParam {
            name: name.into(),
            source: source.into(),
            kind: ParamKind::Optional,
        });
        self
    }

    pub fn defaulted(mut self, name: impl Into<String>, default: Json) -> Self {
        let name = name.into();
        self.params.push(SignatureParam {
            source: name.clone(),
            name,
            kind: ParamKind::Defaulted(default),
        });
        self
    }

    pub fn rest(mut self, name: impl Into<String>) -> Self {
        let name = name.into();
        self.params.push(SignatureParam {
            source: name.clone(),
            name,
            kind: ParamKind::Rest,
        });
        self
    }

    /// Parse a `.https` `>>>` header's parameter tokens: `name` is
    /// required, `name?` optional, `name=default` defaulted, `...name`
    /// collects the rest.
    pub fn from_https_params(tokens: &[String]) -> Self {
        let mut sig = Self::new();
        for token in tokens {
            if let Some(rest_name) = token.strip_prefix("...") {
                sig = sig.rest(rest_name);
            } else if let Some((name, default)) = token.split_once('=') {
                sig = sig.defaulted(name, Json::String(default.to_string()));
            } else if let Some(name) = token.strip_suffix('?') {
                sig = sig.optional(name);
            } else {
                sig = sig.required(token.clone());
            }
        }
        sig
    }

    /// Build the flow's argument dict: for each declared name, take
    /// `options[source]` else `environment[source]` else the default;
    /// a missing required parameter is a `Flow` error; the rest
    /// parameter (if any) collects every option key no named parameter
    /// claimed.
    pub fn compose_values_dict(
        &self,
        options: &BTreeMap<String, Json>,
        environment: &dyn ScriptEnvironment,
    ) -> Result<BTreeMap<String, Json>> {
        let mut out = BTreeMap::new();
        let mut claimed: Vec<&str> = Vec::new();

        for param in &self.params {
            if matches!(param.kind, ParamKind::Rest) {
                continue;
            }
            claimed.push(param.source.as_str());
            let value = options
                .get(&param.source)
                .cloned()
                .or_else(|| environment.resolve(&param.source).map(Json::String));

            let value = match (value, &param.kind) {
                (Some(v), _) => v,
                (None, ParamKind::Defaulted(default)) => default.clone(),
                (None, ParamKind::Optional) => Json::Null,
                (None, ParamKind::Rest) => unreachable!(),
                (None, ParamKind::Required) => {
                    return Err(PardonError::Flow(format!(
                        "missing required flow argument `{}`",
                        param.name
                    )))
                }
            };
            out.insert(param.name.clone(), value);
        }

        if let Some(rest_param) = self.params.iter().find(|p| matches!(p.kind, ParamKind::Rest)) {
            let remainder: serde_json::Map<String, Json> = options
                .iter()
                .filter(|(k, _)| !claimed.contains(&k.as_str()))
                .map(|(k, v)| (k.clone(), v.clone()))
                .collect();
            out.insert(rest_param.name.clone(), Json::Object(remainder));
        }

        Ok(out)
    }
}

/// Wraps a base environment with a flow's captured values, so a later
/// step's `{{token}}` resolves against what an earlier step captured.
struct FlowEnvironment<'a> {
    base: &'a dyn ScriptEnvironment,
    captured: BTreeMap<String, String>,
}

impl<'a> ScriptEnvironment for FlowEnvironment<'a> {
    fn evaluate(&self, expr: &str) -> Result<crate::scope::expr::Value> {
        self.base.evaluate(expr)
    }

    fn resolve(&self, name: &str) -> Option<String> {
        self.captured.get(name).cloned().or_else(|| self.base.resolve(name))
    }

    fn redact(&self, value: &str) -> String {
        self.base.redact(value)
    }

    fn matches(&self, pattern: &str, candidate: &str) -> bool {
        self.base.matches(pattern, candidate)
    }

    fn config(&self, key: &str) -> Option<String> {
        self.base.config(key)
    }
}

fn flatten_scalar(value: &Json) -> Option<String> {
    match value {
        Json::String(s) => Some(s.clone()),
        Json::Number(n) => Some(n.to_string()),
        Json::Bool(b) => Some(b.to_string()),
        Json::Null => None,
        other => serde_json::to_string(other).ok(),
    }
}

/// One `.https` interaction in a flow.
#[derive(Debug, Clone, PartialEq)]
pub struct FlowStep {
    pub request: Schema,
    pub response: Option<Schema>,
}

/// A flow: a signature plus the interactions it runs, in order.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct Flow {
    pub signature: Signature,
    pub steps: Vec<FlowStep>,
}

impl Flow {
    pub fn new(signature: Signature) -> Self {
        Self {
            signature,
            steps: Vec::new(),
        }
    }

    pub fn with_step(mut self, request: Schema, response: Option<Schema>) -> Self {
        self.steps.push(FlowStep { request, response });
        self
    }
}

/// Run `flow` against `options`, returning each step's processed
/// response value in order. Runs inside its own isolated tracker chain
/// (via [`tracker::shared`]) so nested flows' `awaited` sets don't leak
/// into each other or the caller.
pub async fn run_flow(
    flow: &Flow,
    options: BTreeMap<String, Json>,
    environment: Arc<dyn ScriptEnvironment>,
) -> Result<Vec<Json>> {
    let argument = flow.signature.compose_values_dict(&options, environment.as_ref())?;

    let mut captured: BTreeMap<String, String> = BTreeMap::new();
    for (name, value) in &argument {
        if let Some(s) = flatten_scalar(value) {
            captured.insert(name.clone(), s);
        }
    }

    tracker::shared(async move {
        let mut results = Vec::with_capacity(flow.steps.len());
        for step in &flow.steps {
            let step_env: Arc<dyn ScriptEnvironment> = Arc::new(FlowEnvironment {
                base: environment.as_ref(),
                captured: captured.clone(),
            });

            let mut exec = Execution::init(step.request.clone(), step.response.clone(), step_env)?;
            let rendered = exec.render()?.clone();
            if let Ok(request) = RenderedRequest::from_json(&rendered) {
                tracker::track(format!("{} {}", request.method, request.url()));
            }
            exec.fetch().await?;
            let processed = exec.process()?.clone();

            // Only `+` (flow-export)-hinted scope values cross into the
            // next step's environment; `@`-redacted ones never do.
            captured.extend(exec.exported_values(false, true));

            results.push(processed);
        }
        Ok(results)
    })
    .await
}
