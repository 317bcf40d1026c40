//! Placeholder resolution for property values.
//!
//! Supports `${key}` and `${key:default}` syntax, where `key` is a flattened
//! property name. Placeholders may nest (`${a:${b}}`), and resolved values are
//! themselves resolved. Use `$$` to escape and produce a literal `$`.

use super::ConfigDataError;

/// Maximum depth of nested placeholder expansion.
const MAX_DEPTH: usize = 32;

/// Resolves every placeholder in `text`.
///
/// `lookup` returns the raw string for a key, `Ok(None)` when no source has
/// it, or an error (for example when the key lives in an inactive source).
pub(crate) fn resolve_placeholders<F>(text: &str, lookup: &F) -> Result<String, ConfigDataError>
where
    F: Fn(&str) -> Result<Option<String>, ConfigDataError>,
{
    let mut visiting = Vec::new();
    resolve_text(text, lookup, &mut visiting)
}

fn resolve_text<F>(
    text: &str,
    lookup: &F,
    visiting: &mut Vec<String>,
) -> Result<String, ConfigDataError>
where
    F: Fn(&str) -> Result<Option<String>, ConfigDataError>,
{
    if visiting.len() > MAX_DEPTH {
        return Err(ConfigDataError::CircularPlaceholder(text.to_string()));
    }

    let mut result = String::with_capacity(text.len());
    let mut chars = text.chars().peekable();

    while let Some(ch) = chars.next() {
        if ch != '$' {
            result.push(ch);
            continue;
        }
        match chars.peek() {
            Some('$') => {
                // Escape sequence: $$ -> $
                chars.next();
                result.push('$');
            }
            Some('{') => {
                chars.next();
                let inner = consume_placeholder(&mut chars)
                    .ok_or_else(|| ConfigDataError::UnclosedPlaceholder(text.to_string()))?;
                result.push_str(&resolve_placeholder(&inner, lookup, visiting)?);
            }
            _ => result.push('$'),
        }
    }

    Ok(result)
}

fn resolve_placeholder<F>(
    inner: &str,
    lookup: &F,
    visiting: &mut Vec<String>,
) -> Result<String, ConfigDataError>
where
    F: Fn(&str) -> Result<Option<String>, ConfigDataError>,
{
    let (key, default) = split_default(inner);
    let key = resolve_text(key, lookup, visiting)?;

    if visiting.contains(&key) {
        return Err(ConfigDataError::CircularPlaceholder(key));
    }

    match lookup(&key)? {
        Some(value) => {
            visiting.push(key);
            let resolved = resolve_text(&value, lookup, visiting);
            visiting.pop();
            resolved
        }
        None => match default {
            Some(default) => resolve_text(default, lookup, visiting),
            None => Err(ConfigDataError::UnresolvablePlaceholder(key)),
        },
    }
}

/// Consumes up to the `}` matching an already consumed `${`.
fn consume_placeholder(chars: &mut std::iter::Peekable<std::str::Chars>) -> Option<String> {
    let mut result = String::new();
    let mut depth = 0usize;
    while let Some(ch) = chars.next() {
        match ch {
            '$' if chars.peek() == Some(&'{') => {
                depth += 1;
                result.push(ch);
            }
            '}' if depth == 0 => return Some(result),
            '}' => {
                depth -= 1;
                result.push(ch);
            }
            _ => result.push(ch),
        }
    }
    None
}

/// Splits `key:default` at the first `:` outside nested placeholders.
fn split_default(inner: &str) -> (&str, Option<&str>) {
    let mut depth = 0usize;
    let bytes = inner.as_bytes();
    for (i, &b) in bytes.iter().enumerate() {
        match b {
            b'{' if i > 0 && bytes[i - 1] == b'$' => depth += 1,
            b'}' => depth = depth.saturating_sub(1),
            b':' if depth == 0 => return (&inner[..i], Some(&inner[i + 1..])),
            _ => {}
        }
    }
    (inner, None)
}
