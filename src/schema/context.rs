//! The execution context threaded through merge/render calls: which
//! operation mode a [`Schema`](super::Schema) call is running under, and
//! which phase of the two-pass build/validate cycle it belongs to.

/// The mode a schema operation runs under. The four merge modes combine
/// two schemas into one; the four render modes turn one schema into a
/// concrete value.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Mode {
    /// Merge two schemas, requiring structural agreement (used when
    /// unifying a concrete HTTP exchange against a template).
    Match,
    /// Merge two schemas permissively, letting either side supply what the
    /// other lacks; for multivalue arrays, slots into the first compatible
    /// position (see the config-space mux/mix distinction in `config_space`).
    Mix,
    /// Like `Mix`, but multivalue arrays are built in parallel rather than
    /// first-fit slotted — each option contributes its own element.
    Mux,
    /// Merge for an offline/"meld" combination of layered collection data
    /// that doesn't require full compatibility, only non-contradiction.
    Meld,
    /// Produce the final rendered value.
    Render,
    /// Produce a best-effort value without requiring all dependencies to
    /// be resolved yet (used for display before fetch).
    Preview,
    /// Render pass that runs strictly before the request is sent.
    Prerender,
    /// Render pass that runs after the response is available.
    Postrender,
}

impl Mode {
    pub fn is_merge(self) -> bool {
        matches!(self, Mode::Match | Mode::Mix | Mode::Mux | Mode::Meld)
    }

    pub fn is_render(self) -> bool {
        !self.is_merge()
    }
}

/// Two-pass build/validate cycle: schemas are first assembled (`Build`)
/// then checked for completeness and consistency (`Validate`).
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Phase {
    Build,
    Validate,
}

/// Context threaded through a single merge/render call. Carries no scope
/// arena reference (that's passed explicitly to avoid aliasing issues);
/// it only carries the "what kind of call is this" tag.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct ExecutionContext {
    pub mode: Mode,
    pub phase: Phase,
}

impl ExecutionContext {
    pub fn new(mode: Mode, phase: Phase) -> Self {
        Self { mode, phase }
    }

    pub fn build(mode: Mode) -> Self {
        Self::new(mode, Phase::Build)
    }

    pub fn validate(mode: Mode) -> Self {
        Self::new(mode, Phase::Validate)
    }
}
