//! The `.https` file format parser: optional YAML front matter, a `>>>`
//! delimited request section (with optional flow signature params on the
//! same line), and an optional `<<<` delimited response section (with an
//! optional leading `?outcome: <label>` line). Bodies are preserved
//! byte-for-byte rather than re-serialized, so an existing file's
//! formatting survives a parse/merge/write round trip.

use indexmap::IndexMap;

use super::search_params::SearchParams;
use super::{scalar_from, url, HttpsFile, RequestTemplate, ResponseTemplate};
use crate::errors::{PardonError, Result};
use crate::schema::nodes::keyed_list::KeyedEntry;
use crate::schema::nodes::scalar::ScalarNode;
use crate::schema::Schema;

struct ParsedMessage {
    first_line: String,
    headers: Vec<(String, String)>,
    body: Option<String>,
}

fn parse_message(text: &str) -> ParsedMessage {
    let mut lines = text.lines();
    let first_line = lines.next().unwrap_or("").trim().to_string();

    let mut headers = Vec::new();
    let mut rest_lines: Vec<&str> = lines.collect();
    let mut consumed = 0;
    for line in &rest_lines {
        if line.trim().is_empty() {
            consumed += 1;
            break;
        }
        match line.split_once(':') {
            Some((k, v)) => headers.push((k.trim().to_string(), v.trim().to_string())),
            None => break,
        }
        consumed += 1;
    }
    rest_lines.drain(0..consumed.min(rest_lines.len()));
    let body_text = rest_lines.join("\n");
    let body = if body_text.trim().is_empty() {
        None
    } else {
        Some(body_text)
    };

    ParsedMessage {
        first_line,
        headers,
        body,
    }
}

fn headers_to_entries(headers: &[(String, String)]) -> Result<Vec<KeyedEntry>> {
    headers
        .iter()
        .map(|(k, v)| {
            Ok(KeyedEntry {
                key: Schema::Scalar(ScalarNode::string_literal(k.clone())),
                value: scalar_from(v)?,
            })
        })
        .collect()
}

/// Extract the `computations: { name: expr }` front-matter map, if
/// present, into the name→expr-source pairs [`RequestTemplate`] carries
/// as hidden fields.
fn extract_computations(front_matter: &Option<serde_yaml::Value>) -> IndexMap<String, String> {
    let mut out = IndexMap::new();
    let Some(serde_yaml::Value::Mapping(top)) = front_matter else {
        return out;
    };
    let Some(serde_yaml::Value::Mapping(computations)) =
        top.get(serde_yaml::Value::String("computations".to_string()))
    else {
        return out;
    };
    for (k, v) in computations {
        if let (Some(name), Some(expr)) = (k.as_str(), v.as_str()) {
            out.insert(name.to_string(), expr.to_string());
        }
    }
    out
}

fn parse_request(text: &str) -> Result<RequestTemplate> {
    let msg = parse_message(text);
    let mut parts = msg.first_line.splitn(2, char::is_whitespace);
    let method = parts.next().unwrap_or("GET").trim();
    let url_text = parts.next().unwrap_or("").trim();
    if url_text.is_empty() {
        return Err(PardonError::Parse {
            path: "<https>".into(),
            message: "request line missing a URL".into(),
        });
    }

    let split = url::split(url_text);
    let mut search_params = Vec::new();
    if let Some(query) = &split.query {
        for (k, v) in SearchParams::parse(query).0 {
            search_params.push(KeyedEntry {
                key: Schema::Scalar(ScalarNode::string_literal(k)),
                value: scalar_from(&v)?,
            });
        }
    }

    Ok(RequestTemplate {
        method: Schema::Scalar(ScalarNode::string_literal(method.to_uppercase())),
        origin: scalar_from(&split.origin)?,
        pathname: scalar_from(&split.pathname)?,
        search_params,
        headers: headers_to_entries(&msg.headers)?,
        body: msg.body.map(|b| scalar_from(&b)).transpose()?,
        computations: IndexMap::new(),
    })
}

fn parse_response(text: &str) -> Result<ResponseTemplate> {
    let mut outcome = None;
    let mut remaining = text;
    if let Some(rest) = text.trim_start().strip_prefix("?outcome:") {
        let mut lines = rest.splitn(2, '\n');
        outcome = Some(lines.next().unwrap_or("").trim().to_string());
        remaining = lines.next().unwrap_or("");
    }

    let msg = parse_message(remaining);
    let mut parts = msg.first_line.splitn(2, char::is_whitespace);
    let status = parts.next().unwrap_or("200").trim();
    let status_text = parts.next().map(|s| s.trim().to_string()).filter(|s| !s.is_empty());

    Ok(ResponseTemplate {
        status: scalar_from(status)?,
        status_text: status_text.map(|s| scalar_from(&s)).transpose()?,
        headers: headers_to_entries(&msg.headers)?,
        body: msg.body.map(|b| scalar_from(&b)).transpose()?,
        outcome,
    })
}

/// Parse a complete `.https` file's source text.
pub fn parse(source: &str) -> Result<HttpsFile> {
    let mut rest = source;

    let front_matter = if let Some(after_open) = rest.strip_prefix("---\n") {
        match after_open.find("\n---\n") {
            Some(idx) => {
                let yaml_text = &after_open[..idx];
                rest = &after_open[idx + "\n---\n".len()..];
                Some(serde_yaml::from_str(yaml_text)?)
            }
            None => None,
        }
    } else {
        None
    };

    let rest = rest.trim_start_matches('\n');
    let (marker_line, after_marker) = match rest.find('\n') {
        Some(idx) => (&rest[..idx], &rest[idx + 1..]),
        None => (rest, ""),
    };
    if !marker_line.trim_start().starts_with(">>>") {
        return Err(PardonError::Parse {
            path: "<https>".into(),
            message: "expected `>>>` request delimiter".into(),
        });
    }
    let flow_params: Vec<String> = marker_line
        .trim_start()
        .trim_start_matches(">>>")
        .split_whitespace()
        .map(|s| s.to_string())
        .collect();

    let (request_text, response_text) = match after_marker.find("\n<<<") {
        Some(idx) => {
            let request_text = &after_marker[..idx];
            let after_delim = &after_marker[idx + "\n<<<".len()..];
            let response_start = after_delim.find('\n').map(|i| i + 1).unwrap_or(after_delim.len());
            (request_text, Some(&after_delim[response_start..]))
        }
        None => (after_marker, None),
    };

    let mut request = parse_request(request_text)?;
    request.computations = extract_computations(&front_matter);
    let response = response_text.map(parse_response).transpose()?;

    Ok(HttpsFile {
        front_matter,
        flow_params,
        request,
        response,
    })
}
