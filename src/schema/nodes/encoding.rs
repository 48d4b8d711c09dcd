//! Encoding adapter node: wraps an inner schema behind a wire codec.
//! Merging a raw payload against an encoding node decodes it first
//! (`merge = decode`); rendering an encoding node encodes its inner
//! value back to wire form (`render = encode`).

use base64::Engine;
use serde_json::Value as Json;

use crate::errors::{PardonError, Result, SchemaErrorKind};
use crate::schema::{ExecutionContext, Schema};
use crate::scope::{ScopeArena, ScopeId, ScriptEnvironment};

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Codec {
    Json,
    Form,
    Base64,
    Text,
    Raw,
}

#[derive(Debug, Clone, PartialEq)]
pub struct EncodingNode {
    pub codec: Codec,
    pub inner: Box<Schema>,
}

impl EncodingNode {
    pub fn new(codec: Codec, inner: Schema) -> Self {
        Self {
            codec,
            inner: Box::new(inner),
        }
    }

    /// Decode `raw` per this node's codec and merge the result into
    /// `inner`, producing a new node whose `inner` reflects what the raw
    /// payload contributed.
    pub fn merge_raw_payload(&self, raw: &str, ctx: ExecutionContext) -> Result<EncodingNode> {
        let decoded = decode(self.codec, raw)?;
        let decoded_schema = Schema::Stub(decoded);
        let merged_inner = self.inner.merge(&decoded_schema, ctx)?;
        Ok(EncodingNode {
            codec: self.codec,
            inner: Box::new(merged_inner),
        })
    }
}

pub fn decode(codec: Codec, raw: &str) -> Result<Json> {
    match codec {
        Codec::Json => {
            if raw.trim().is_empty() {
                Ok(Json::Null)
            } else {
                Ok(serde_json::from_str(raw)?)
            }
        }
        Codec::Form => {
            let mut map = serde_json::Map::new();
            for (k, v) in url::form_urlencoded::parse(raw.as_bytes()) {
                map.insert(k.into_owned(), Json::String(v.into_owned()));
            }
            Ok(Json::Object(map))
        }
        Codec::Base64 => {
            let bytes = base64::engine::general_purpose::STANDARD
                .decode(raw.trim())
                .map_err(|e| {
                    PardonError::schema(SchemaErrorKind::Type, "$", format!("invalid base64: {e}"))
                })?;
            Ok(Json::String(String::from_utf8_lossy(&bytes).into_owned()))
        }
        Codec::Text | Codec::Raw => Ok(Json::String(raw.to_string())),
    }
}

pub fn encode(codec: Codec, value: &Json) -> Result<String> {
    match codec {
        Codec::Json => Ok(serde_json::to_string(value)?),
        Codec::Form => {
            let obj = value.as_object().ok_or_else(|| {
                PardonError::schema(SchemaErrorKind::Type, "$", "form encoding requires an object")
            })?;
            let mut serializer = url::form_urlencoded::Serializer::new(String::new());
            for (k, v) in obj {
                let text = match v {
                    Json::String(s) => s.clone(),
                    other => other.to_string(),
                };
                serializer.append_pair(k, &text);
            }
            Ok(serializer.finish())
        }
        Codec::Base64 => {
            let text = match value {
                Json::String(s) => s.clone(),
                other => other.to_string(),
            };
            Ok(base64::engine::general_purpose::STANDARD.encode(text))
        }
        Codec::Text | Codec::Raw => Ok(match value {
            Json::String(s) => s.clone(),
            Json::Null => String::new(),
            other => other.to_string(),
        }),
    }
}

pub fn merge(a: &EncodingNode, b: &EncodingNode, ctx: ExecutionContext) -> Result<EncodingNode> {
    if a.codec != b.codec {
        return Err(PardonError::schema(
            SchemaErrorKind::Incompatible,
            "$",
            format!("cannot merge encoding {:?} with {:?}", a.codec, b.codec),
        ));
    }
    Ok(EncodingNode {
        codec: a.codec,
        inner: Box::new(a.inner.merge(&b.inner, ctx)?),
    })
}

pub fn scope(node: &EncodingNode, arena: &mut ScopeArena, parent: &ScopeId) -> Result<ScopeId> {
    let own = arena.subscope(parent);
    node.inner.scope(arena, &own.child("inner"))?;
    Ok(own)
}

pub fn render(
    node: &EncodingNode,
    arena: &mut ScopeArena,
    scope_id: &ScopeId,
    env: &dyn ScriptEnvironment,
    ctx: ExecutionContext,
) -> Result<Json> {
    let inner_value = node.inner.render(arena, &scope_id.child("inner"), env, ctx)?;
    Ok(Json::String(encode(node.codec, &inner_value)?))
}

pub fn resolve(node: &EncodingNode, arena: &ScopeArena, scope_id: &ScopeId) -> Result<Json> {
    let inner_value = node.inner.resolve(arena, &scope_id.child("inner"))?;
    Ok(Json::String(encode(node.codec, &inner_value)?))
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::schema::nodes::scalar::ScalarNode;
    use crate::schema::Mode;

    #[test]
    fn test_json_round_trip() {
        let decoded = decode(Codec::Json, r#"{"a":1}"#).unwrap();
        assert_eq!(decoded["a"], 1);
        let encoded = encode(Codec::Json, &decoded).unwrap();
        assert_eq!(encoded, r#"{"a":1}"#);
    }

    #[test]
    fn test_form_round_trip() {
        let decoded = decode(Codec::Form, "a=1&b=two").unwrap();
        assert_eq!(decoded["a"], "1");
        assert_eq!(decoded["b"], "two");
    }

    #[test]
    fn test_base64_round_trip() {
        let encoded = encode(Codec::Base64, &Json::String("hello".into())).unwrap();
        let decoded = decode(Codec::Base64, &encoded).unwrap();
        assert_eq!(decoded, Json::String("hello".into()));
    }

    #[test]
    fn test_merge_raw_payload_decodes_then_merges() {
        let node = EncodingNode::new(
            Codec::Json,
            Schema::Scalar(ScalarNode {
                kind: crate::schema::nodes::scalar::ScalarKind::String,
                pattern: None,
                literal: None,
            }),
        );
        let merged = node
            .merge_raw_payload(r#""hello""#, ExecutionContext::build(Mode::Mix))
            .unwrap();
        assert!(matches!(*merged.inner, Schema::Scalar(_) | Schema::Stub(_)));
    }
}
