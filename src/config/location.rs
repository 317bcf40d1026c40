//! Config data locations.

use std::fmt;
use std::hash::{Hash, Hasher};

const OPTIONAL_PREFIX: &str = "optional:";

/// A reference to config data, for example `classpath:/config/` or
/// `optional:file:./app.toml`.
///
/// The `optional:` marker is parsed off the value. Two locations are equal when
/// their values are equal, regardless of whether either one is optional.
#[derive(Debug, Clone, Eq)]
pub struct Location {
    value: String,
    optional: bool,
}

impl Location {
    /// Parses a location string, returning `None` for blank input.
    pub fn parse(s: &str) -> Option<Self> {
        let s = s.trim();
        let (value, optional) = match s.strip_prefix(OPTIONAL_PREFIX) {
            Some(rest) => (rest.trim(), true),
            None => (s, false),
        };
        if value.is_empty() {
            return None;
        }
        Some(Self {
            value: value.to_string(),
            optional,
        })
    }

    /// The location value without the `optional:` marker.
    pub fn value(&self) -> &str {
        &self.value
    }

    pub fn is_optional(&self) -> bool {
        self.optional
    }

    pub fn has_prefix(&self, prefix: &str) -> bool {
        self.value.starts_with(prefix)
    }

    /// Returns the value with `prefix` removed, or the whole value when it
    /// does not carry the prefix.
    pub fn non_prefixed_value(&self, prefix: &str) -> &str {
        self.value.strip_prefix(prefix).unwrap_or(&self.value)
    }

    /// Returns the scheme prefix of the value (`classpath:`, `file:`, ...) if
    /// it has one.
    pub fn scheme(&self) -> Option<&str> {
        let colon = self.value.find(':')?;
        let scheme = &self.value[..colon];
        let valid = scheme.len() > 1
            && scheme.starts_with(|c: char| c.is_ascii_alphabetic())
            && scheme
                .chars()
                .all(|c| c.is_ascii_alphanumeric() || matches!(c, '+' | '-' | '.'));
        valid.then_some(&self.value[..=colon])
    }

    /// Splits a `;` separated value into individual locations, each keeping
    /// this location's optional marker.
    pub fn split(&self) -> Vec<Location> {
        self.value
            .split(';')
            .filter_map(Location::parse)
            .map(|location| Location {
                optional: location.optional || self.optional,
                ..location
            })
            .collect()
    }
}

impl PartialEq for Location {
    fn eq(&self, other: &Self) -> bool {
        self.value == other.value
    }
}

impl Hash for Location {
    fn hash<H: Hasher>(&self, state: &mut H) {
        self.value.hash(state);
    }
}

impl fmt::Display for Location {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        if self.optional {
            f.write_str(OPTIONAL_PREFIX)?;
        }
        f.write_str(&self.value)
    }
}
