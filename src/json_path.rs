//! Scalar lookup in small JSON documents
//!
//! Paths look like `$.foo[1].bar.baz[2][3].value`, which is the same as
//! `foo[1].bar.baz[2][3].value`. Key segments consist of ASCII letters, digits,
//! `-` and `_`; a bracket holding only digits is an array index, any other
//! bracket content is an object key. Characters outside that grammar are skipped.

use log::debug;
use serde_json::Value;

/// Returned by [`resolve`] when no number can be produced
pub const NOT_FOUND: f32 = -99999.0;

/// Parse `json` and return the number at `path`, or [`NOT_FOUND`]
pub fn resolve(json: &str, path: &str) -> f32 {
    let root: Value = match serde_json::from_str(json) {
        Ok(root) => root,
        Err(e) => {
            debug!("could not parse json for value: {}", e);
            return NOT_FOUND;
        }
    };

    match resolve_number(&root, path) {
        Some(value) => {
            debug!("success reading value: {}", value);
            value as f32
        }
        None => NOT_FOUND,
    }
}

/// Number at `path` in an already parsed document
pub fn resolve_number(root: &Value, path: &str) -> Option<f64> {
    match resolve_value(root, path)? {
        Value::Number(n) => n.as_f64(),
        other => {
            debug!("value at '{}' is not a number: {}", path, other);
            None
        }
    }
}

/// Walk `path` from `root`
///
/// A failed lookup leaves the walk unresolved; the rest of the path is still
/// scanned (and every later lookup fails) so each problem gets logged.
pub fn resolve_value<'a>(root: &'a Value, path: &str) -> Option<&'a Value> {
    debug!("parsing '{}'", path);

    let mut current = Some(root);
    let mut token = String::new();

    for c in path.chars() {
        match c {
            '$' => {}
            '.' | '[' => {
                if !token.is_empty() {
                    current = lookup_key(current, &token);
                    token.clear();
                }
            }
            ']' => {
                current = lookup_bracket(current, &token);
                token.clear();
            }
            c if is_segment_char(c) => token.push(c),
            other => debug!("ignoring '{}' in path", other),
        }
    }

    if !token.is_empty() {
        current = lookup_key(current, &token);
    }

    current
}

fn is_segment_char(c: char) -> bool {
    c.is_ascii_alphanumeric() || c == '-' || c == '_'
}

fn lookup_key<'a>(current: Option<&'a Value>, key: &str) -> Option<&'a Value> {
    let found = current.and_then(|v| v.as_object()).and_then(|obj| obj.get(key));
    if found.is_none() {
        debug!("failed to parse key {}", key);
    }
    found
}

fn lookup_bracket<'a>(current: Option<&'a Value>, content: &str) -> Option<&'a Value> {
    if content.is_empty() || !content.bytes().all(|b| b.is_ascii_digit()) {
        return lookup_key(current, content);
    }

    let found = content
        .parse::<usize>()
        .ok()
        .and_then(|index| current?.as_array()?.get(index));
    if found.is_none() {
        debug!("failed in parsing index {}", content);
    }
    found
}
