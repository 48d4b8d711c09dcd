//! Insertion-order-preserving search params. A plain `BTreeMap` would
//! silently reorder (and dedupe) query parameters; `.https` requests need
//! to replay repeated keys (`?tag=a&tag=b`) in the order they were
//! written, so params are kept as a flat ordered list.

#[derive(Debug, Clone, Default, PartialEq)]
pub struct SearchParams(pub Vec<(String, String)>);

impl SearchParams {
    pub fn parse(query: &str) -> Self {
        if query.is_empty() {
            return Self::default();
        }
        let mut pairs = Vec::new();
        for part in query.split('&') {
            if part.is_empty() {
                continue;
            }
            match part.split_once('=') {
                Some((k, v)) => pairs.push((k.to_string(), v.to_string())),
                None => pairs.push((part.to_string(), String::new())),
            }
        }
        Self(pairs)
    }

    pub fn push(&mut self, key: impl Into<String>, value: impl Into<String>) {
        self.0.push((key.into(), value.into()));
    }

    pub fn get_all<'a>(&'a self, key: &str) -> impl Iterator<Item = &'a str> {
        self.0.iter().filter(move |(k, _)| k == key).map(|(_, v)| v.as_str())
    }

    pub fn render(&self) -> String {
        self.0
            .iter()
            .map(|(k, v)| format!("{k}={v}"))
            .collect::<Vec<_>>()
            .join("&")
    }

    pub fn is_empty(&self) -> bool {
        self.0.is_empty()
    }
}
