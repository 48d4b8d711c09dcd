//! Tolerant URL splitting: templated URLs (`https://{{env}}.example.com/v1/{{id}}?a=1`)
//! aren't valid `url::Url` input until every `{{...}}` span is filled in,
//! so origin/pathname/query are split out with plain string scanning
//! rather than a strict parser.

/// The three structural parts of a (possibly templated) URL.
#[derive(Debug, Clone, PartialEq)]
pub struct SplitUrl {
    pub origin: String,
    pub pathname: String,
    pub query: Option<String>,
}

/// Split `source` into origin / pathname / query. `origin` includes the
/// scheme (`https://host`); `pathname` always starts with `/` (empty
/// path becomes `/`).
pub fn split(source: &str) -> SplitUrl {
    let (before_query, query) = match source.find('?') {
        Some(idx) => (&source[..idx], Some(source[idx + 1..].to_string())),
        None => (source, None),
    };

    let scheme_end = before_query.find("://").map(|i| i + 3);
    let (scheme_and_authority_end, path_start) = match scheme_end {
        Some(after_scheme) => {
            let rest = &before_query[after_scheme..];
            match rest.find('/') {
                Some(slash) => (after_scheme + slash, after_scheme + slash),
                None => (before_query.len(), before_query.len()),
            }
        }
        None => (0, 0),
    };

    let origin = before_query[..scheme_and_authority_end].to_string();
    let pathname = if path_start < before_query.len() {
        before_query[path_start..].to_string()
    } else {
        "/".to_string()
    };

    SplitUrl {
        origin,
        pathname,
        query,
    }
}

/// Recombine origin/pathname/query into one URL string.
pub fn join(origin: &str, pathname: &str, query: Option<&str>) -> String {
    let mut out = String::new();
    out.push_str(origin.trim_end_matches('/'));
    if pathname.is_empty() {
        out.push('/');
    } else if pathname.starts_with('/') {
        out.push_str(pathname);
    } else {
        out.push('/');
        out.push_str(pathname);
    }
    if let Some(q) = query {
        if !q.is_empty() {
            out.push('?');
            out.push_str(q);
        }
    }
    out
}
