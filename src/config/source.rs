use std::collections::BTreeMap;

use toml::{Table, Value};

/// A named set of configuration properties.
///
/// Nested tables are flattened on the way in, so `[server] port = 80` is
/// stored under the key `server.port`. The name identifies the source in logs
/// and errors; it plays no part in merging.
#[derive(Debug, Clone, PartialEq, Default)]
pub struct PropertySource {
    name: String,
    properties: BTreeMap<String, Value>,
}

impl PropertySource {
    pub fn new(name: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            properties: BTreeMap::new(),
        }
    }

    /// Creates a source from a parsed TOML table, flattening nested tables.
    pub fn from_table(name: impl Into<String>, table: Table) -> Self {
        let mut source = Self::new(name);
        flatten_into(&mut source.properties, None, table);
        source
    }

    /// Adds a property, flattening it if the value is a table.
    pub fn with_property(mut self, key: impl Into<String>, value: impl Into<Value>) -> Self {
        self.insert(key, value);
        self
    }

    pub fn insert(&mut self, key: impl Into<String>, value: impl Into<Value>) {
        let key = key.into();
        match value.into() {
            Value::Table(table) => flatten_into(&mut self.properties, Some(&key), table),
            value => {
                self.properties.insert(key, value);
            }
        }
    }

    pub fn name(&self) -> &str {
        &self.name
    }

    pub fn get(&self, key: &str) -> Option<&Value> {
        self.properties.get(key)
    }

    pub fn contains(&self, key: &str) -> bool {
        self.properties.contains_key(key)
    }

    pub fn keys(&self) -> impl Iterator<Item = &str> {
        self.properties.keys().map(String::as_str)
    }

    pub fn iter(&self) -> impl Iterator<Item = (&str, &Value)> {
        self.properties.iter().map(|(k, v)| (k.as_str(), v))
    }

    pub fn len(&self) -> usize {
        self.properties.len()
    }

    pub fn is_empty(&self) -> bool {
        self.properties.is_empty()
    }
}

fn flatten_into(out: &mut BTreeMap<String, Value>, prefix: Option<&str>, table: Table) {
    for (key, value) in table {
        let key = match prefix {
            Some(prefix) => format!("{prefix}.{key}"),
            None => key,
        };
        match value {
            Value::Table(nested) => flatten_into(out, Some(&key), nested),
            value => {
                out.insert(key, value);
            }
        }
    }
}

/// Coerces a raw string to the most specific scalar: boolean, integer, float,
/// or string as the fallback.
///
/// Numbers are only coerced when they print back to the same text, so values
/// such as `007` or `1.10` stay strings.
pub(crate) fn coerce_value(s: &str) -> Value {
    if s.eq_ignore_ascii_case("true") {
        return Value::Boolean(true);
    }
    if s.eq_ignore_ascii_case("false") {
        return Value::Boolean(false);
    }

    if looks_like_integer(s) {
        if let Ok(i) = s.parse::<i64>() {
            if i.to_string() == s {
                return Value::Integer(i);
            }
        }
    }

    if s.contains('.') {
        if let Ok(f) = s.parse::<f64>() {
            if f.is_finite() && f.to_string() == s {
                return Value::Float(f);
            }
        }
    }

    Value::String(s.to_string())
}

fn looks_like_integer(s: &str) -> bool {
    let s = s.strip_prefix('-').unwrap_or(s);
    !s.is_empty() && s.chars().all(|c| c.is_ascii_digit())
}

/// Inserts `value` under a dotted `path`, creating intermediate tables.
pub(crate) fn merge_at_path(table: &mut Table, path: &[&str], value: Value) {
    let Some((first, rest)) = path.split_first() else {
        if let Value::Table(overlay) = value {
            deep_merge(table, overlay);
        }
        return;
    };

    if rest.is_empty() {
        match (table.get_mut(*first), value) {
            (Some(Value::Table(base)), Value::Table(overlay)) => deep_merge(base, overlay),
            (_, value) => {
                table.insert((*first).to_string(), value);
            }
        }
        return;
    }

    if !matches!(table.get(*first), Some(Value::Table(_))) {
        table.insert((*first).to_string(), Value::Table(Table::new()));
    }

    if let Some(Value::Table(nested)) = table.get_mut(*first) {
        merge_at_path(nested, rest, value);
    }
}

fn deep_merge(base: &mut Table, overlay: Table) {
    for (key, value) in overlay {
        match (base.get_mut(&key), value) {
            (Some(Value::Table(base_table)), Value::Table(overlay_table)) => {
                deep_merge(base_table, overlay_table);
            }
            (_, value) => {
                base.insert(key, value);
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_from_table_flattens() {
        let table: Table = toml::from_str(
            r#"
            name = "app"
            [server]
            port = 8080
            [server.tls]
            enabled = true
            "#,
        )
        .unwrap();
        let source = PropertySource::from_table("test", table);

        assert_eq!(source.get("name"), Some(&Value::String("app".into())));
        assert_eq!(source.get("server.port"), Some(&Value::Integer(8080)));
        assert_eq!(source.get("server.tls.enabled"), Some(&Value::Boolean(true)));
        assert!(!source.contains("server"));
    }

    #[test]
    fn test_coerce_value() {
        assert_eq!(coerce_value("true"), Value::Boolean(true));
        assert_eq!(coerce_value("42"), Value::Integer(42));
        assert_eq!(coerce_value("-7"), Value::Integer(-7));
        assert_eq!(coerce_value("2.5"), Value::Float(2.5));
        assert_eq!(coerce_value("007"), Value::String("007".into()));
        assert_eq!(coerce_value("1.10"), Value::String("1.10".into()));
        assert_eq!(coerce_value("hello"), Value::String("hello".into()));
    }

    #[test]
    fn test_merge_at_path_builds_nested_tables() {
        let mut table = Table::new();
        merge_at_path(&mut table, &["server", "host"], Value::String("localhost".into()));
        merge_at_path(&mut table, &["server", "port"], Value::Integer(80));

        let server = table["server"].as_table().unwrap();
        assert_eq!(server["host"].as_str(), Some("localhost"));
        assert_eq!(server["port"].as_integer(), Some(80));
    }
}
