//! Response mapping.
//!
//! Contracts describe an operation's output as `field -> path expression`
//! pairs evaluated against the raw response payload. Expressions are compiled
//! once, when the runtime is assembled, and applied per response.
//!
//! The path grammar is a deliberately small JSONPath subset: `$` roots the
//! expression, `.key` and `['key']` descend into objects, `[0]` indexes
//! arrays, and `[*]` (or `.*`) fans out across every element. An expression
//! may carry a fallback after ` ?? `, used only when the path matches
//! nothing. A present `null` is a match; fallbacks do not fire for it.

use std::collections::BTreeMap;

use serde_json::{Map, Value};
use thiserror::Error;
use tracing::warn;

/// Delimiter separating a path expression from its fallback literal.
const FALLBACK_DELIMITER: &str = " ?? ";

/// Parse failure for one path expression.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum PathError {
    #[error("path must start with '$'")]
    MissingRoot,
    #[error("empty key segment at byte {0}")]
    EmptyKey(usize),
    #[error("unterminated bracket segment at byte {0}")]
    UnterminatedBracket(usize),
    #[error("invalid index '{segment}' at byte {at}")]
    InvalidIndex { segment: String, at: usize },
    #[error("unexpected character '{found}' at byte {at}")]
    UnexpectedChar { found: char, at: usize },
}

/// One step of a compiled path.
#[derive(Debug, Clone, PartialEq, Eq)]
enum Segment {
    Key(String),
    Index(usize),
    Wildcard,
}

/// Compiled `output field <- path + fallback` rule.
#[derive(Debug, Clone)]
struct FieldRule {
    field: String,
    segments: Vec<Segment>,
    fallback: Option<Value>,
}

/// Compiled response mapping for one operation.
///
/// [`apply`](Self::apply) is pure: same payload in, same output out, no
/// interior state.
#[derive(Debug, Clone, Default)]
pub struct ResponseMapping {
    rules: Vec<FieldRule>,
}

impl ResponseMapping {
    /// Compiles a contract's mapping section.
    ///
    /// Malformed expressions are logged and skipped here, at load time, so
    /// one bad field never costs the other fields their mapping at call
    /// time.
    #[must_use]
    pub fn compile(mapping: &BTreeMap<String, String>) -> Self {
        let mut rules = Vec::with_capacity(mapping.len());
        for (field, expr) in mapping {
            let (path, fallback) = split_fallback(expr);
            match parse_path(path) {
                Ok(segments) => rules.push(FieldRule {
                    field: field.clone(),
                    segments,
                    fallback,
                }),
                Err(error) => {
                    warn!(field = %field, expr = %expr, %error, "skipping unmappable response field");
                }
            }
        }
        Self { rules }
    }

    /// True when nothing compiled; the raw payload should pass through.
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.rules.is_empty()
    }

    /// Maps a raw payload into the declared output shape.
    ///
    /// One match yields the value itself, several matches yield an array in
    /// match order, zero matches yield the fallback or omit the field.
    #[must_use]
    pub fn apply(&self, payload: &Value) -> Map<String, Value> {
        let mut output = Map::new();
        for rule in &self.rules {
            let matches = eval(&rule.segments, payload);
            match matches.len() {
                0 => {
                    if let Some(fallback) = &rule.fallback {
                        output.insert(rule.field.clone(), fallback.clone());
                    }
                }
                1 => {
                    output.insert(rule.field.clone(), matches[0].clone());
                }
                _ => {
                    output.insert(
                        rule.field.clone(),
                        Value::Array(matches.into_iter().cloned().collect()),
                    );
                }
            }
        }
        output
    }
}

/// Splits an expression on the first ` ?? ` into path and parsed fallback.
fn split_fallback(expr: &str) -> (&str, Option<Value>) {
    match expr.split_once(FALLBACK_DELIMITER) {
        Some((path, literal)) => (path.trim_end(), Some(parse_literal(literal.trim()))),
        None => (expr.trim(), None),
    }
}

/// Fallback literals parse as JSON when they can, raw strings when they
/// cannot. `0` is the number zero, `"0"` is a string, `hello` is a string.
fn parse_literal(literal: &str) -> Value {
    serde_json::from_str(literal).unwrap_or_else(|_| Value::String(literal.to_string()))
}

fn parse_path(expr: &str) -> Result<Vec<Segment>, PathError> {
    let rest = expr.strip_prefix('$').ok_or(PathError::MissingRoot)?;
    let mut segments = Vec::new();
    let mut chars = rest.char_indices().peekable();
    // Positions are reported within `expr`, so offset past the `$`.
    let base = 1;
    while let Some((at, c)) = chars.next() {
        match c {
            '.' => {
                let mut key = String::new();
                while let Some(&(_, next)) = chars.peek() {
                    if next == '.' || next == '[' {
                        break;
                    }
                    key.push(next);
                    chars.next();
                }
                if key.is_empty() {
                    return Err(PathError::EmptyKey(base + at));
                }
                if key == "*" {
                    segments.push(Segment::Wildcard);
                } else {
                    segments.push(Segment::Key(key));
                }
            }
            '[' => {
                let mut inner = String::new();
                let mut closed = false;
                for (_, next) in chars.by_ref() {
                    if next == ']' {
                        closed = true;
                        break;
                    }
                    inner.push(next);
                }
                if !closed {
                    return Err(PathError::UnterminatedBracket(base + at));
                }
                segments.push(parse_bracket(&inner, base + at)?);
            }
            other => {
                return Err(PathError::UnexpectedChar {
                    found: other,
                    at: base + at,
                });
            }
        }
    }
    Ok(segments)
}

fn parse_bracket(inner: &str, at: usize) -> Result<Segment, PathError> {
    let inner = inner.trim();
    if inner == "*" {
        return Ok(Segment::Wildcard);
    }
    let quoted = inner.len() >= 2
        && ((inner.starts_with('\'') && inner.ends_with('\''))
            || (inner.starts_with('"') && inner.ends_with('"')));
    if quoted {
        let key = &inner[1..inner.len() - 1];
        if key.is_empty() {
            return Err(PathError::EmptyKey(at));
        }
        return Ok(Segment::Key(key.to_string()));
    }
    inner
        .parse::<usize>()
        .map(Segment::Index)
        .map_err(|_| PathError::InvalidIndex {
            segment: inner.to_string(),
            at,
        })
}

/// Evaluates compiled segments against a payload, collecting every match.
fn eval<'a>(segments: &[Segment], root: &'a Value) -> Vec<&'a Value> {
    let mut current = vec![root];
    for segment in segments {
        let mut next = Vec::new();
        for value in current {
            match segment {
                Segment::Key(key) => {
                    if let Some(object) = value.as_object()
                        && let Some(hit) = object.get(key)
                    {
                        next.push(hit);
                    }
                }
                Segment::Index(index) => {
                    if let Some(array) = value.as_array()
                        && let Some(hit) = array.get(*index)
                    {
                        next.push(hit);
                    }
                }
                Segment::Wildcard => match value {
                    Value::Object(object) => next.extend(object.values()),
                    Value::Array(array) => next.extend(array.iter()),
                    _ => {}
                },
            }
        }
        if next.is_empty() {
            return Vec::new();
        }
        current = next;
    }
    current
}
