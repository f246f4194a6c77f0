use serde_json::Value;

use crate::options::Parser;

/// Resolves a tag against the scope chain. `scopes` is ordered outermost
/// first; the last entry is the current scope.
pub trait TagParser: Send + Sync {
    fn resolve(&self, tag: &str, scopes: &[&Value]) -> Option<Value>;
}

pub struct LiteralParser;

impl TagParser for LiteralParser {
    fn resolve(&self, tag: &str, scopes: &[&Value]) -> Option<Value> {
        if tag == "." {
            return scopes.last().map(|&v| v.clone());
        }
        lookup_key(tag, scopes).cloned()
    }
}

pub struct PathParser;

impl TagParser for PathParser {
    fn resolve(&self, tag: &str, scopes: &[&Value]) -> Option<Value> {
        if tag == "." || tag == "this" {
            return scopes.last().map(|&v| v.clone());
        }
        if let Some(v) = lookup_key(tag, scopes) {
            return Some(v.clone());
        }

        let mut segments = tag.split('.').map(str::trim);
        let first = segments.next()?;
        let mut current = lookup_key(first, scopes)?;
        for seg in segments {
            current = match current {
                Value::Object(map) => map.get(seg)?,
                Value::Array(items) => items.get(seg.parse::<usize>().ok()?)?,
                _ => return None,
            };
        }
        Some(current.clone())
    }
}

fn lookup_key<'a>(key: &str, scopes: &[&'a Value]) -> Option<&'a Value> {
    scopes
        .iter()
        .rev()
        .find_map(|&scope| scope.as_object().and_then(|map| map.get(key)))
}

pub(crate) fn resolve(parser: &Parser, tag: &str, scopes: &[&Value]) -> Option<Value> {
    let found = match parser {
        Parser::Literal => LiteralParser.resolve(tag, scopes),
        Parser::Path => PathParser.resolve(tag, scopes),
        Parser::Custom(custom) => custom.resolve(tag, scopes),
    };
    found.filter(|v| !v.is_null())
}

pub(crate) fn is_truthy(value: &Value) -> bool {
    match value {
        Value::Null => false,
        Value::Bool(b) => *b,
        Value::Number(n) => n.as_f64().is_some_and(|f| f != 0.0),
        Value::String(s) => !s.is_empty(),
        Value::Array(items) => !items.is_empty(),
        Value::Object(_) => true,
    }
}

pub(crate) fn display(value: &Value) -> String {
    match value {
        Value::String(s) => s.clone(),
        Value::Null => String::new(),
        other => other.to_string(),
    }
}
