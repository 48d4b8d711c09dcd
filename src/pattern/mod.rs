//! Pattern parsing, matching, rendering and rewriting (component C1).
//!
//! A [`Pattern`] is either a bare literal string or a "regex-backed" string
//! containing zero or more `{{ ... }}` variable spans. Patterns are
//! value-typed and immutable once parsed; all the operations described in
//! `spec.md` §4.1 are inherent methods here.

use std::collections::BTreeMap;

use regex::Regex;

use crate::errors::{PardonError, Result, SchemaErrorKind};

/// A single hint character attached to a pattern variable.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord)]
pub enum Hint {
    /// `:` non-export
    NoExport,
    /// `?` optional
    Optional,
    /// `!` required
    Required,
    /// `@` redact
    Redact,
    /// `~` meld / offline-available
    Meld,
    /// `*` multivalue
    Multivalue,
    /// `+` flow-export
    Export,
    /// `...` widen to a greedy match
    Widen,
}

impl Hint {
    fn from_char(c: char) -> Option<Self> {
        match c {
            ':' => Some(Hint::NoExport),
            '?' => Some(Hint::Optional),
            '!' => Some(Hint::Required),
            '@' => Some(Hint::Redact),
            '~' => Some(Hint::Meld),
            '*' => Some(Hint::Multivalue),
            '+' => Some(Hint::Export),
            _ => None,
        }
    }
}

/// An ordered, de-duplicated collection of hints. Small enough that a
/// `Vec` beats pulling in a bitflags dependency for this alone.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct HintSet(Vec<Hint>);

impl HintSet {
    pub fn contains(&self, hint: Hint) -> bool {
        self.0.contains(&hint)
    }

    pub fn is_empty(&self) -> bool {
        self.0.is_empty()
    }

    pub fn insert(&mut self, hint: Hint) {
        if !self.0.contains(&hint) {
            self.0.push(hint);
        }
    }

    /// Consuming builder form of [`Self::insert`], for constructing a
    /// `HintSet` fluently outside of pattern parsing (e.g. reference
    /// nodes built directly in Rust rather than parsed from `{{...}}`).
    pub fn with(mut self, hint: Hint) -> Self {
        self.insert(hint);
        self
    }

    pub fn iter(&self) -> impl Iterator<Item = &Hint> {
        self.0.iter()
    }
}

/// Callback surface used while compiling a pattern's regex: lets callers
/// (URL origin, pathname, header value, ...) pick a default character class
/// for a variable based on its hints, mirroring `building.re` in the spec.
pub trait PatternBuilding {
    /// Default regex fragment (no capturing group) for a variable carrying
    /// the given hints and no explicit `% /regex/` constraint.
    fn default_regex(&self, hints: &HintSet) -> &str;
}

/// Generic building context: `[^/]+` by default, widened to `.*` by the
/// `...` hint. Suitable for header values, form fields, and anything not
/// URL-structural.
#[derive(Debug, Clone, Copy, Default)]
pub struct GenericBuilding;

impl PatternBuilding for GenericBuilding {
    fn default_regex(&self, hints: &HintSet) -> &str {
        if hints.contains(Hint::Widen) {
            ".*"
        } else {
            ".+"
        }
    }
}

/// Origin building context: forbids `.` by default (so `{{env}}.example.com`
/// doesn't greedily eat the rest of the host), widened by `...`.
#[derive(Debug, Clone, Copy, Default)]
pub struct OriginBuilding;

impl PatternBuilding for OriginBuilding {
    fn default_regex(&self, hints: &HintSet) -> &str {
        if hints.contains(Hint::Widen) {
            ".*"
        } else {
            "[^.]+"
        }
    }
}

/// Pathname building context: one path segment by default (`[^/]+`),
/// widened to `.*` by `...` (the `.../dots` hint from spec.md §3).
#[derive(Debug, Clone, Copy, Default)]
pub struct PathnameBuilding;

impl PatternBuilding for PathnameBuilding {
    fn default_regex(&self, hints: &HintSet) -> &str {
        if hints.contains(Hint::Widen) {
            ".*"
        } else {
            "[^/]+"
        }
    }
}

/// One `{{...}}` variable occurrence within a pattern's source text.
#[derive(Debug, Clone, PartialEq)]
pub struct PatternVar {
    /// `None` for anonymous variables (`{{}}` / hint-only, no name).
    pub name: Option<String>,
    pub hints: HintSet,
    /// Explicit `% /regex/` constraint, if present.
    pub constraint: Option<String>,
    /// Embedded `= expr` source, if present.
    pub expr: Option<String>,
    /// The original `{{...}}` source text, used to re-emit this span
    /// unchanged when no substitution value is supplied to `render`.
    pub source: String,
}

/// One piece of a parsed pattern: either raw literal text or a reference to
/// one of the pattern's `vars` by index.
#[derive(Debug, Clone, PartialEq)]
enum Segment {
    Literal(String),
    Var(usize),
}

/// A regex-backed pattern: literal text interleaved with named variables.
#[derive(Debug, Clone)]
pub struct RegexPattern {
    pub source: String,
    pub vars: Vec<PatternVar>,
    segments: Vec<Segment>,
    regex: Regex,
}

impl PartialEq for RegexPattern {
    fn eq(&self, other: &Self) -> bool {
        self.source == other.source
    }
}

/// A pattern is either a raw literal or a regex-backed template.
#[derive(Debug, Clone, PartialEq)]
pub enum Pattern {
    Literal(String),
    Regex(Box<RegexPattern>),
}

/// Strip a single layer of matching quotes (`'...'` or `"..."`) from `s`,
/// unescaping `\\` and the matching quote character. Returns `None` if `s`
/// isn't fully quoted.
fn unquote(s: &str) -> Option<String> {
    let s = s.trim();
    let bytes = s.as_bytes();
    if bytes.len() < 2 {
        return None;
    }
    let quote = bytes[0];
    if quote != b'\'' && quote != b'"' {
        return None;
    }
    if bytes[bytes.len() - 1] != quote {
        return None;
    }
    let inner = &s[1..s.len() - 1];
    let mut out = String::with_capacity(inner.len());
    let mut chars = inner.chars().peekable();
    while let Some(c) = chars.next() {
        if c == '\\' {
            if let Some(&next) = chars.peek() {
                out.push(next);
                chars.next();
                continue;
            }
        }
        out.push(c);
    }
    Some(out)
}

/// Find the end of a `{{...}}` span starting at `start` (index of the first
/// `{`). Honors the `$$expr("...")` JSON-string escape so that an embedded
/// expression can itself contain literal `{{`/`}}` without terminating the
/// span early.
fn find_span_end(source: &str, start: usize) -> Option<usize> {
    let bytes = source.as_bytes();
    let mut i = start + 2;
    while i + 1 < bytes.len() + 1 {
        if i + 1 <= bytes.len().saturating_sub(1) && &source[i..i + 2.min(bytes.len() - i)] == "}}"
        {
            return Some(i);
        }
        if source[i..].starts_with("$$expr(\"") {
            // Skip a JSON-escaped string literal so embedded `{{`/`}}` pass through.
            let mut j = i + "$$expr(\"".len();
            loop {
                if j >= bytes.len() {
                    return None;
                }
                match bytes[j] {
                    b'\\' => j += 2,
                    b'"' => {
                        j += 1;
                        break;
                    }
                    _ => j += 1,
                }
            }
            i = j;
            continue;
        }
        if i + 2 > bytes.len() {
            return None;
        }
        i += 1;
    }
    None
}

/// Parse the inner text of a `{{...}}` span into a [`PatternVar`].
fn parse_var(inner: &str, source: String) -> PatternVar {
    let mut rest = inner.trim();
    let mut hints = HintSet::default();

    loop {
        if let Some(stripped) = rest.strip_prefix("...") {
            hints.insert(Hint::Widen);
            rest = stripped;
            continue;
        }
        if let Some(c) = rest.chars().next() {
            if let Some(hint) = Hint::from_char(c) {
                hints.insert(hint);
                rest = &rest[c.len_utf8()..];
                continue;
            }
        }
        break;
    }

    // Split off a trailing `% /regex/` constraint first (it can't contain `=`
    // meaningfully for our grammar), then a trailing `= expr`.
    let (before_constraint, constraint) = match rest.find('%') {
        Some(idx) => {
            let (name_and_expr, constraint_part) = rest.split_at(idx);
            let constraint_part = constraint_part[1..].trim();
            let constraint = constraint_part
                .strip_prefix('/')
                .and_then(|s| s.strip_suffix('/'))
                .unwrap_or(constraint_part)
                .to_string();
            (name_and_expr, Some(constraint))
        }
        None => (rest, None),
    };

    let (name_part, expr) = match before_constraint.find('=') {
        Some(idx) => {
            let (name_part, expr_part) = before_constraint.split_at(idx);
            (name_part.trim(), Some(expr_part[1..].trim().to_string()))
        }
        None => (before_constraint.trim(), None),
    };

    let name = if name_part.is_empty() {
        None
    } else {
        Some(name_part.to_string())
    };

    PatternVar {
        name,
        hints,
        constraint,
        expr,
        source,
    }
}

impl Pattern {
    /// Parse `source` into a pattern. `building` supplies the default regex
    /// fragment for variables without an explicit `% /regex/` constraint.
    pub fn parse(source: &str, building: &dyn PatternBuilding) -> Result<Pattern> {
        if let Some(literal) = unquote(source) {
            return Ok(Pattern::Literal(literal));
        }

        let mut segments = Vec::new();
        let mut vars = Vec::new();
        let mut literal_buf = String::new();
        let mut i = 0;
        let bytes_len = source.len();

        while i < bytes_len {
            if source[i..].starts_with("{{") {
                match find_span_end(source, i) {
                    Some(end) => {
                        if !literal_buf.is_empty() {
                            segments.push(Segment::Literal(std::mem::take(&mut literal_buf)));
                        }
                        let inner = &source[i + 2..end];
                        let span_source = source[i..end + 2].to_string();
                        if let Some(literal) = unquote(inner) {
                            literal_buf.push_str(&literal);
                        } else {
                            let var = parse_var(inner, span_source);
                            vars.push(var);
                            segments.push(Segment::Var(vars.len() - 1));
                        }
                        i = end + 2;
                        continue;
                    }
                    None => {
                        return Err(PardonError::Parse {
                            path: "<pattern>".into(),
                            message: format!("unterminated variable span in `{source}`"),
                        });
                    }
                }
            }
            let ch = source[i..].chars().next().unwrap();
            literal_buf.push(ch);
            i += ch.len_utf8();
        }
        if !literal_buf.is_empty() {
            segments.push(Segment::Literal(literal_buf));
        }

        if vars.is_empty() {
            // No variable spans at all: this is effectively a literal,
            // reassembled from its (possibly quote-unwrapped) segments.
            let joined: String = segments
                .into_iter()
                .map(|s| match s {
                    Segment::Literal(l) => l,
                    Segment::Var(_) => unreachable!(),
                })
                .collect();
            return Ok(Pattern::Literal(joined));
        }

        let mut regex_src = String::from("^");
        for seg in &segments {
            match seg {
                Segment::Literal(l) => regex_src.push_str(&regex::escape(l)),
                Segment::Var(idx) => {
                    let var = &vars[*idx];
                    if var.hints.contains(Hint::NoExport) && false {
                        // no-export never affects matching; kept for clarity
                        unreachable!()
                    }
                    let frag = var
                        .constraint
                        .clone()
                        .unwrap_or_else(|| building.default_regex(&var.hints).to_string());
                    regex_src.push('(');
                    regex_src.push_str(&frag);
                    regex_src.push(')');
                    if var.hints.contains(Hint::Optional) {
                        regex_src.push('?');
                    }
                }
            }
        }
        regex_src.push('$');

        let regex = Regex::new(&regex_src)?;

        Ok(Pattern::Regex(Box::new(RegexPattern {
            source: source.to_string(),
            vars,
            segments,
            regex,
        })))
    }

    /// Match `input` against this pattern, returning a name→value map.
    /// Anonymous variables are extracted but discarded from the result.
    /// Returns `None` if the pattern doesn't match.
    pub fn match_value(&self, input: &str) -> Option<BTreeMap<String, String>> {
        match self {
            Pattern::Literal(lit) => {
                if lit == input {
                    Some(BTreeMap::new())
                } else {
                    None
                }
            }
            Pattern::Regex(rp) => {
                let captures = rp.regex.captures(input)?;
                let mut out = BTreeMap::new();
                for (i, var) in rp.vars.iter().enumerate() {
                    if let Some(name) = &var.name {
                        if let Some(m) = captures.get(i + 1) {
                            out.insert(name.clone(), m.as_str().to_string());
                        }
                    }
                }
                Some(out)
            }
        }
    }

    /// Render this pattern by substituting each variable (in source order)
    /// with the corresponding value in `values`, or leaving the original
    /// `{{...}}` text if no value was supplied for that position.
    pub fn render(&self, values: &[Option<&str>]) -> String {
        match self {
            Pattern::Literal(lit) => lit.clone(),
            Pattern::Regex(rp) => {
                let mut out = String::new();
                for seg in &rp.segments {
                    match seg {
                        Segment::Literal(l) => out.push_str(l),
                        Segment::Var(idx) => {
                            let var = &rp.vars[*idx];
                            match values.get(*idx).copied().flatten() {
                                Some(v) => out.push_str(v),
                                None => out.push_str(&var.source),
                            }
                        }
                    }
                }
                out
            }
        }
    }

    /// Render using a name→value map rather than positional values.
    pub fn render_named(&self, values: &BTreeMap<String, String>) -> String {
        match self {
            Pattern::Literal(lit) => lit.clone(),
            Pattern::Regex(rp) => {
                let positional: Vec<Option<&str>> = rp
                    .vars
                    .iter()
                    .map(|v| v.name.as_ref().and_then(|n| values.get(n)).map(|s| s.as_str()))
                    .collect();
                self.render(&positional)
            }
        }
    }

    /// The set of named variables carried by this pattern, in source order.
    pub fn variable_names(&self) -> Vec<&str> {
        match self {
            Pattern::Literal(_) => Vec::new(),
            Pattern::Regex(rp) => rp
                .vars
                .iter()
                .filter_map(|v| v.name.as_deref())
                .collect(),
        }
    }

    /// Named variables paired with their declared hints and `= expr`
    /// binding (if any), in source order — what a node's `scope` stage
    /// needs to declare each variable with its real hints/expr rather
    /// than a throwaway default.
    pub fn variable_info(&self) -> Vec<(&str, &HintSet, Option<&str>)> {
        match self {
            Pattern::Literal(_) => Vec::new(),
            Pattern::Regex(rp) => rp
                .vars
                .iter()
                .filter_map(|v| v.name.as_deref().map(|n| (n, &v.hints, v.expr.as_deref())))
                .collect(),
        }
    }

    fn literal_prefix(&self) -> String {
        match self {
            Pattern::Literal(l) => l.clone(),
            Pattern::Regex(rp) => {
                let mut prefix = String::new();
                for seg in &rp.segments {
                    match seg {
                        Segment::Literal(l) => prefix.push_str(l),
                        Segment::Var(_) => break,
                    }
                }
                prefix
            }
        }
    }

    /// True iff `self` and `other` share an instance: either one is a
    /// literal the other's regex matches, or (for two regex patterns) their
    /// literal prefixes agree (one is a prefix of the other).
    pub fn compatible(&self, other: &Pattern) -> bool {
        match (self, other) {
            (Pattern::Literal(a), Pattern::Literal(b)) => a == b,
            (Pattern::Literal(lit), Pattern::Regex(rp))
            | (Pattern::Regex(rp), Pattern::Literal(lit)) => rp.regex.is_match(lit),
            (Pattern::Regex(_), Pattern::Regex(_)) => {
                let a = self.literal_prefix();
                let b = other.literal_prefix();
                a.starts_with(&b) || b.starts_with(&a)
            }
        }
    }

    /// Rewrite this pattern's variable occurrences: for every variable named
    /// `n` that appears both in `self` and in `from`, replace that
    /// occurrence's source text with the span text of `to`'s variable named
    /// `n`. `from` and `to` must carry the same (multi-)set of variable
    /// names; returns `None` otherwise. If `self` is a literal, it is first
    /// matched against `from` to extract a value map, which is then
    /// rendered into `to`.
    pub fn rewrite(&self, from: &Pattern, to: &Pattern) -> Option<Pattern> {
        let mut from_names: Vec<&str> = from.variable_names();
        let mut to_names: Vec<&str> = to.variable_names();
        from_names.sort_unstable();
        to_names.sort_unstable();
        if from_names != to_names {
            return None;
        }

        match self {
            Pattern::Literal(lit) => {
                let values = from.match_value(lit)?;
                Some(Pattern::Literal(to.render_named(&values)))
            }
            Pattern::Regex(rp) => {
                let to_rp = match to {
                    Pattern::Regex(r) => r,
                    Pattern::Literal(_) => return None,
                };
                let mut out = String::new();
                for seg in &rp.segments {
                    match seg {
                        Segment::Literal(l) => out.push_str(l),
                        Segment::Var(idx) => {
                            let var = &rp.vars[*idx];
                            match &var.name {
                                Some(name) if from.variable_names().contains(&name.as_str()) => {
                                    let replacement = to_rp
                                        .vars
                                        .iter()
                                        .find(|v| v.name.as_deref() == Some(name.as_str()))
                                        .map(|v| v.source.as_str())
                                        .unwrap_or(&var.source);
                                    out.push_str(replacement);
                                }
                                _ => out.push_str(&var.source),
                            }
                        }
                    }
                }
                Pattern::parse(&out, &GenericBuilding).ok()
            }
        }
    }
}
