//! The execution pipeline (component C7): a lazy six-stage state machine
//! — `init → match → preview → render → fetch → process` — plus
//! `reprocess` for re-running the back half against an updated partial
//! without re-rendering or re-fetching, and `hookExecution` for wrapping
//! the fetch stage with before/after hooks (logging, a history sink,
//! retry policy, ...).
//!
//! Each stage memoizes its result the first time it runs; calling a
//! stage method again is a no-op that returns the cached value, which is
//! what makes `render` run exactly once per execution (Testable
//! Property 8) even if multiple downstream stages ask for it.

use std::sync::Arc;

use async_trait::async_trait;
use reqwest::Client;
use serde_json::Value as Json;

use crate::errors::{PardonError, Result, Stage};
use crate::https::fetch::{fetch as do_fetch, RenderedRequest, RenderedResponse};
use crate::schema::{ExecutionContext, Mode, Phase, Schema};
use crate::scope::{ScopeArena, ScopeId, ScriptEnvironment};

/// Hook invoked around the `fetch` stage — a history sink, request
/// logger, or retry/backoff policy implements this.
#[async_trait]
pub trait RequestHook: Send + Sync {
    async fn before_fetch(&self, _request: &RenderedRequest) -> Result<()> {
        Ok(())
    }

    async fn after_fetch(&self, _request: &RenderedRequest, _response: &RenderedResponse) -> Result<()> {
        Ok(())
    }
}

/// One request's lazy execution state.
pub struct Execution {
    template: Schema,
    response_template: Option<Schema>,
    env: Arc<dyn ScriptEnvironment>,
    client: Client,
    arena: ScopeArena,
    scope: ScopeId,

    matched: Option<Schema>,
    previewed: Option<Json>,
    rendered: Option<Json>,
    fetched: Option<RenderedResponse>,
    processed: Option<Json>,
}

impl Execution {
    /// `init` — the pipeline's first stage: bind a request template (and
    /// optional documented response template) to a fresh scope tree.
    pub fn init(template: Schema, response_template: Option<Schema>, env: Arc<dyn ScriptEnvironment>) -> Result<Self> {
        let mut arena = ScopeArena::new();
        let root = arena.root();
        let scope = template.scope(&mut arena, &root)?;
        Ok(Self {
            template,
            response_template,
            env,
            client: Client::new(),
            arena,
            scope,
            matched: None,
            previewed: None,
            rendered: None,
            fetched: None,
            processed: None,
        })
    }

    /// `match` — unify `concrete` (if given, e.g. matching a captured
    /// HTTP exchange) against the request template. Idempotent: later
    /// calls, with or without `concrete`, return the already-matched
    /// schema.
    pub fn match_stage(&mut self, concrete: Option<&Schema>) -> Result<&Schema> {
        if self.matched.is_none() {
            let matched = match concrete {
                Some(c) => self
                    .template
                    .merge(c, ExecutionContext::new(Mode::Match, Phase::Build))
                    .map_err(|e| PardonError::stage(Stage::Match, e))?,
                None => self.template.clone(),
            };
            self.matched = Some(matched);
        }
        Ok(self.matched.as_ref().unwrap())
    }

    /// `preview` — a best-effort value from whatever has already been
    /// resolved, without triggering new evaluation or side effects.
    pub fn preview(&mut self) -> Result<&Json> {
        self.match_stage(None)?;
        if self.previewed.is_none() {
            let matched = self.matched.clone().unwrap();
            let value = matched
                .resolve(&self.arena, &self.scope)
                .map_err(|e| PardonError::stage(Stage::Preview, e))?;
            self.previewed = Some(value);
        }
        Ok(self.previewed.as_ref().unwrap())
    }

    /// `render` — the full render pass; runs exactly once per execution.
    pub fn render(&mut self) -> Result<&Json> {
        self.match_stage(None)?;
        if self.rendered.is_none() {
            let matched = self.matched.clone().unwrap();
            let value = matched
                .render(
                    &mut self.arena,
                    &self.scope,
                    self.env.as_ref(),
                    ExecutionContext::new(Mode::Render, Phase::Validate),
                )
                .map_err(|e| PardonError::stage(Stage::Render, e))?;
            self.rendered = Some(value);
        }
        Ok(self.rendered.as_ref().unwrap())
    }

    /// `fetch` — execute the rendered request against the network.
    pub async fn fetch(&mut self) -> Result<&RenderedResponse> {
        self.render()?;
        if self.fetched.is_none() {
            let rendered = self.rendered.clone().unwrap();
            let request = RenderedRequest::from_json(&rendered)
                .map_err(|e| PardonError::stage(Stage::Fetch, e))?;
            let response = do_fetch(&self.client, &request)
                .await
                .map_err(|e| PardonError::stage(Stage::Fetch, e))?;
            self.fetched = Some(response);
        }
        Ok(self.fetched.as_ref().unwrap())
    }

    /// `fetch`, wrapped with `hook.before_fetch`/`hook.after_fetch`.
    pub async fn hook_execution(&mut self, hook: &dyn RequestHook) -> Result<&RenderedResponse> {
        self.render()?;
        if self.fetched.is_none() {
            let rendered = self.rendered.clone().unwrap();
            let request = RenderedRequest::from_json(&rendered)
                .map_err(|e| PardonError::stage(Stage::Fetch, e))?;
            hook.before_fetch(&request).await?;
            let response = do_fetch(&self.client, &request)
                .await
                .map_err(|e| PardonError::stage(Stage::Fetch, e))?;
            hook.after_fetch(&request, &response).await?;
            self.fetched = Some(response);
        }
        Ok(self.fetched.as_ref().unwrap())
    }

    /// `process` — merge the network response against the documented
    /// response template and render the result.
    pub fn process(&mut self) -> Result<&Json> {
        if self.processed.is_none() {
            let fetched = self
                .fetched
                .clone()
                .ok_or_else(|| PardonError::Aborted("process called before fetch".into()))?;
            let value = self.build_response_value(&fetched)?;
            self.processed = Some(value);
        }
        Ok(self.processed.as_ref().unwrap())
    }

    fn build_response_value(&mut self, fetched: &RenderedResponse) -> Result<Json> {
        use serde_json::json;
        let body_json: Json = serde_json::from_str(&fetched.body).unwrap_or_else(|_| json!(fetched.body));
        let concrete = json!({
            "status": fetched.status,
            "statusText": fetched.status_text,
            "headers": fetched.headers.iter().map(|(k, v)| json!([k, v])).collect::<Vec<_>>(),
            "body": body_json,
        });

        match &self.response_template {
            Some(template) => {
                let merged = template
                    .merge(&Schema::Stub(concrete), ExecutionContext::new(Mode::Match, Phase::Build))
                    .map_err(|e| PardonError::stage(Stage::Process, e))?;
                let response_scope = self.scope.child("response");
                merged
                    .render(&mut self.arena, &response_scope, self.env.as_ref(), ExecutionContext::new(Mode::Render, Phase::Validate))
                    .map_err(|e| PardonError::stage(Stage::Process, e))
            }
            None => Ok(concrete),
        }
    }

    /// The subset of this execution's scope values a flow step can export
    /// to the next step's environment: `secrets` includes `@`-redacted
    /// identifiers, `exports_only` further narrows to `+`-hinted ones (see
    /// [`crate::scope::ScopeArena::resolved_values_filtered`]).
    pub fn exported_values(&self, secrets: bool, exports_only: bool) -> std::collections::BTreeMap<String, String> {
        self.arena.resolved_values_filtered(&self.scope, secrets, exports_only)
    }

    /// `reprocess` — re-run only `match` and `process` against `partial`
    /// (an override merged into the already-matched request schema under
    /// `Mode::Meld`), without re-rendering or re-fetching even if the
    /// partial touches fields that would otherwise reshape the request.
    /// This keeps `reprocess` usable for things like "re-interpret the
    /// response I already have under a corrected schema" without the
    /// cost (or side effects) of hitting the network again.
    pub fn reprocess(&mut self, partial: &Schema) -> Result<&Json> {
        let base = self.match_stage(None)?.clone();
        let updated = base
            .merge(partial, ExecutionContext::new(Mode::Meld, Phase::Build))
            .map_err(|e| PardonError::stage(Stage::Match, e))?;
        self.matched = Some(updated);
        self.processed = None;
        self.process()
    }
}
