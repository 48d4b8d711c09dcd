//! HTTPS template (component C6): the request/response schema shapes and
//! the `.https` file format built on top of the core [`crate::schema`]
//! kernel.

pub mod fetch;
pub mod parse;
pub mod search_params;
pub mod url;

use indexmap::IndexMap;

use crate::schema::nodes::keyed_list::{KeyedEntry, KeyedListNode};
use crate::schema::nodes::object::ObjectNode;
use crate::schema::nodes::reference::ReferencePath;
use crate::schema::nodes::scalar::{from_template_string, ScalarNode};
use crate::schema::Schema;
use crate::Result;

/// A request template: method/origin/pathname/searchParams/headers/body,
/// plus named `computations` (expression bindings evaluated before
/// render, e.g. a `contentLength = body.length` row). Each entry becomes
/// a hidden reference field in [`Self::to_schema`]: it declares its `=
/// expr` binding into the request's own scope (so `method`/`headers`/etc
/// can reference the computed name) without appearing in the rendered
/// request object.
#[derive(Debug, Clone, PartialEq)]
pub struct RequestTemplate {
    pub method: Schema,
    pub origin: Schema,
    pub pathname: Schema,
    pub search_params: Vec<KeyedEntry>,
    pub headers: Vec<KeyedEntry>,
    pub body: Option<Schema>,
    pub computations: IndexMap<String, String>,
}

impl RequestTemplate {
    pub fn to_schema(&self) -> Schema {
        let mut obj = ObjectNode::new()
            .with_field("method", self.method.clone())
            .with_field("origin", self.origin.clone())
            .with_field("pathname", self.pathname.clone());

        if !self.search_params.is_empty() {
            obj = obj.with_field(
                "searchParams",
                Schema::KeyedList(KeyedListNode {
                    key_template: Box::new(Schema::Scalar(ScalarNode::string_literal(""))),
                    value_template: Box::new(Schema::Scalar(ScalarNode::string_literal(""))),
                    entries: self.search_params.clone(),
                }),
            );
        }
        if !self.headers.is_empty() {
            obj = obj.with_field(
                "headers",
                Schema::KeyedList(KeyedListNode {
                    key_template: Box::new(Schema::Scalar(ScalarNode::string_literal(""))),
                    value_template: Box::new(Schema::Scalar(ScalarNode::string_literal(""))),
                    entries: self.headers.clone(),
                }),
            );
        }
        if let Some(body) = &self.body {
            obj = obj.with_field("body", body.clone());
        }
        for (name, expr) in &self.computations {
            obj = obj.with_hidden_field(
                name.clone(),
                Schema::Reference(ReferencePath::new(name.clone()).expr(expr.clone()).build()),
            );
        }
        Schema::Object(obj)
    }
}

/// A response template: scoped status/statusText/headers/body, plus an
/// `outcome` label (`?outcome: success` in `.https` source) used to
/// classify which of several documented response shapes actually showed
/// up.
#[derive(Debug, Clone, PartialEq)]
pub struct ResponseTemplate {
    pub status: Schema,
    pub status_text: Option<Schema>,
    pub headers: Vec<KeyedEntry>,
    pub body: Option<Schema>,
    pub outcome: Option<String>,
}

impl ResponseTemplate {
    pub fn to_schema(&self) -> Schema {
        let mut obj = ObjectNode::new().with_field("status", self.status.clone());
        if let Some(status_text) = &self.status_text {
            obj = obj.with_field("statusText", status_text.clone());
        }
        if !self.headers.is_empty() {
            obj = obj.with_field(
                "headers",
                Schema::KeyedList(KeyedListNode {
                    key_template: Box::new(Schema::Scalar(ScalarNode::string_literal(""))),
                    value_template: Box::new(Schema::Scalar(ScalarNode::string_literal(""))),
                    entries: self.headers.clone(),
                }),
            );
        }
        if let Some(body) = &self.body {
            obj = obj.with_field("body", body.clone());
        }
        Schema::Object(obj)
    }
}

/// A fully parsed `.https` file: the request, an optional documented
/// response, and the flow signature parameters declared after `>>>`.
#[derive(Debug, Clone, PartialEq)]
pub struct HttpsFile {
    pub front_matter: Option<serde_yaml::Value>,
    pub flow_params: Vec<String>,
    pub request: RequestTemplate,
    pub response: Option<ResponseTemplate>,
}

pub(crate) fn scalar_from(source: &str) -> Result<Schema> {
    Ok(Schema::Scalar(from_template_string(source)?))
}
