//! Executing a rendered request template against the network (the
//! pipeline's `fetch` stage). Takes the already-rendered JSON produced by
//! [`crate::schema::Schema::render`] rather than the template itself —
//! by the time we're here every variable has a value.

use reqwest::{Method, Client};
use serde_json::Value as Json;

use crate::errors::{PardonError, Result};
use crate::https::url;

/// A fully rendered request, ready to execute.
#[derive(Debug, Clone)]
pub struct RenderedRequest {
    pub method: String,
    pub origin: String,
    pub pathname: String,
    pub search_params: Vec<(String, String)>,
    pub headers: Vec<(String, String)>,
    pub body: Option<String>,
}

impl RenderedRequest {
    /// Build from the `Schema::render` output of a request template
    /// assembled by [`crate::https::RequestTemplate::to_schema`].
    pub fn from_json(value: &Json) -> Result<Self> {
        let method = value["method"].as_str().unwrap_or("GET").to_string();
        let origin = value["origin"].as_str().unwrap_or("").to_string();
        let pathname = value["pathname"].as_str().unwrap_or("/").to_string();

        let search_params = value
            .get("searchParams")
            .and_then(|v| v.as_array())
            .map(|arr| {
                arr.iter()
                    .filter_map(|pair| {
                        let pair = pair.as_array()?;
                        Some((pair.first()?.as_str()?.to_string(), pair.get(1)?.as_str()?.to_string()))
                    })
                    .collect()
            })
            .unwrap_or_default();

        let headers = value
            .get("headers")
            .and_then(|v| v.as_array())
            .map(|arr| {
                arr.iter()
                    .filter_map(|pair| {
                        let pair = pair.as_array()?;
                        Some((pair.first()?.as_str()?.to_string(), pair.get(1)?.as_str()?.to_string()))
                    })
                    .collect()
            })
            .unwrap_or_default();

        let body = value.get("body").and_then(|b| match b {
            Json::String(s) => Some(s.clone()),
            Json::Null => None,
            other => Some(other.to_string()),
        });

        Ok(Self {
            method,
            origin,
            pathname,
            search_params,
            headers,
            body,
        })
    }

    pub fn url(&self) -> String {
        let query = if self.search_params.is_empty() {
            None
        } else {
            Some(
                self.search_params
                    .iter()
                    .map(|(k, v)| format!("{k}={v}"))
                    .collect::<Vec<_>>()
                    .join("&"),
            )
        };
        url::join(&self.origin, &self.pathname, query.as_deref())
    }
}

/// The network response, before it's merged back against the response
/// schema for the `process` stage.
#[derive(Debug, Clone)]
pub struct RenderedResponse {
    pub status: u16,
    pub status_text: String,
    pub headers: Vec<(String, String)>,
    pub body: String,
}

/// Execute `request` against the network.
pub async fn fetch(client: &Client, request: &RenderedRequest) -> Result<RenderedResponse> {
    let method = Method::from_bytes(request.method.as_bytes())
        .map_err(|e| PardonError::Configuration(format!("invalid HTTP method: {e}")))?;

    let mut builder = client.request(method, request.url());
    for (name, value) in &request.headers {
        builder = builder.header(name, value);
    }
    if let Some(body) = &request.body {
        builder = builder.body(body.clone());
    }

    let response = builder.send().await?;
    let status = response.status();
    let status_text = status.canonical_reason().unwrap_or("").to_string();
    let headers = response
        .headers()
        .iter()
        .map(|(k, v)| (k.to_string(), v.to_str().unwrap_or("").to_string()))
        .collect();
    let body = response.text().await?;

    Ok(RenderedResponse {
        status: status.as_u16(),
        status_text,
        headers,
        body,
    })
}
