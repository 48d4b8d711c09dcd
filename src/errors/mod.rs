use thiserror::Error;

/// The `SchemaError` sub-tags from the merge/render taxonomy.
///
/// Each variant corresponds to one row of the schema error taxonomy: merges
/// either reject a value outright (`Incompatible`/`Mismatch`) or report that
/// the template didn't constrain anything further (`Missing`); renders can
/// fail because the scope disagrees with itself (`Redefined`/`Inconsistent`),
/// because dependencies can't be ordered (`Unevaluated`), because a value
/// never showed up (`Undefined`/`Unidentified`), because it showed up with
/// the wrong shape (`Type`), or because a user assertion rejected it
/// (`Reject`).
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SchemaErrorKind {
    Incompatible,
    Mismatch,
    Missing,
    Redefined,
    Inconsistent,
    Unevaluated,
    Undefined,
    Unidentified,
    Type,
    Reject,
}

impl std::fmt::Display for SchemaErrorKind {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        let s = match self {
            Self::Incompatible => "incompatible",
            Self::Mismatch => "mismatch",
            Self::Missing => "missing",
            Self::Redefined => "redefined",
            Self::Inconsistent => "inconsistent",
            Self::Unevaluated => "unevaluated",
            Self::Undefined => "undefined",
            Self::Unidentified => "unidentified",
            Self::Type => "type",
            Self::Reject => "reject",
        };
        f.write_str(s)
    }
}

/// A single pipeline stage, used to label `Execution` errors.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Stage {
    Init,
    Match,
    Preview,
    Render,
    Fetch,
    Process,
}

impl std::fmt::Display for Stage {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        let s = match self {
            Self::Init => "init",
            Self::Match => "match",
            Self::Preview => "preview",
            Self::Render => "render",
            Self::Fetch => "fetch",
            Self::Process => "process",
        };
        f.write_str(s)
    }
}

/// Main error type for pardon operations.
#[derive(Error, Debug)]
pub enum PardonError {
    #[error("Regex error: {0}")]
    Regex(#[from] regex::Error),

    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),

    #[error("HTTP request failed: {0}")]
    Reqwest(#[from] reqwest::Error),

    #[error("Invalid header name: {0}")]
    HeaderName(#[from] reqwest::header::InvalidHeaderName),

    #[error("Invalid header value: {0}")]
    HeaderValue(#[from] reqwest::header::InvalidHeaderValue),

    #[error("JSON serialization error: {0}")]
    SerdeJson(#[from] serde_json::Error),

    #[error("YAML error: {0}")]
    SerdeYaml(#[from] serde_yaml::Error),

    #[error("Directory walk error: {0}")]
    WalkDir(#[from] walkdir::Error),

    #[error("URL parse error: {0}")]
    UrlParse(#[from] url::ParseError),

    #[error("Tracing filter error: {0}")]
    FromEnv(#[from] tracing_subscriber::filter::FromEnvError),

    #[error("Parse error at {path}: {message}")]
    Parse { path: String, message: String },

    #[error("Schema error [{kind}] at {loc}: {message}")]
    Schema {
        kind: SchemaErrorKind,
        loc: String,
        message: String,
    },

    #[error("Execution failed at stage '{stage}': {cause}")]
    Execution {
        stage: Stage,
        cause: Box<PardonError>,
    },

    #[error("Configuration error: {0}")]
    Configuration(String),

    #[error("Flow error: {0}")]
    Flow(String),

    #[error("Execution aborted: {0}")]
    Aborted(String),
}

impl PardonError {
    pub fn schema(kind: SchemaErrorKind, loc: impl Into<String>, message: impl Into<String>) -> Self {
        Self::Schema {
            kind,
            loc: loc.into(),
            message: message.into(),
        }
    }

    pub fn stage(stage: Stage, cause: PardonError) -> Self {
        Self::Execution {
            stage,
            cause: Box::new(cause),
        }
    }

    /// True if this error (or its cause chain) carries the given schema kind.
    pub fn is_schema_kind(&self, kind: SchemaErrorKind) -> bool {
        match self {
            Self::Schema { kind: k, .. } => *k == kind,
            Self::Execution { cause, .. } => cause.is_schema_kind(kind),
            _ => false,
        }
    }
}

/// Convenience Result type that uses PardonError
pub type Result<T> = std::result::Result<T, PardonError>;

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_error_display() {
        let err = PardonError::Configuration("missing collection root".to_string());
        assert_eq!(err.to_string(), "Configuration error: missing collection root");
    }

    #[test]
    fn test_schema_error_display() {
        let err = PardonError::schema(SchemaErrorKind::Redefined, "a.b", "x bound twice");
        assert!(err.to_string().contains("redefined"));
        assert!(err.is_schema_kind(SchemaErrorKind::Redefined));
    }

    #[test]
    fn test_stage_wraps_cause() {
        let cause = PardonError::schema(SchemaErrorKind::Missing, "x", "required");
        let err = PardonError::stage(Stage::Render, cause);
        assert!(err.to_string().contains("stage 'render'"));
        assert!(err.is_schema_kind(SchemaErrorKind::Missing));
    }
}
