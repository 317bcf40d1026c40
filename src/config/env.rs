use super::source::{coerce_value, PropertySource};

/// Maps prefixed environment variables onto property keys.
///
/// `MYAPP__CONFIG__ADDITIONAL_LOCATION` with prefix `MYAPP` and separator `__`
/// becomes `config.additional-location`: the prefix is removed, segments are
/// split on the separator and lowercased, and `_` inside a segment turns into
/// `-`.
#[derive(Debug, Clone)]
pub struct EnvSource {
    prefix: String,
    separator: String,
}

impl EnvSource {
    pub fn new(prefix: impl Into<String>, separator: impl Into<String>) -> Self {
        let separator = separator.into();
        assert!(!separator.is_empty(), "separator must not be empty");
        Self {
            prefix: prefix.into(),
            separator,
        }
    }

    /// Snapshots the current process environment.
    pub fn property_source(&self) -> PropertySource {
        self.property_source_from(std::env::vars())
    }

    pub(crate) fn property_source_from(
        &self,
        vars: impl IntoIterator<Item = (String, String)>,
    ) -> PropertySource {
        let prefix_with_sep = format!("{}{}", self.prefix, self.separator);
        let mut source = PropertySource::new(format!("environment [{}]", self.prefix));

        for (key, value) in vars {
            let Some(path_str) = key.strip_prefix(&prefix_with_sep) else {
                continue;
            };
            if path_str.is_empty() {
                continue;
            }

            let path: Vec<String> = path_str
                .split(&self.separator)
                .map(|s| s.to_lowercase().replace('_', "-"))
                .collect();

            source.insert(path.join("."), coerce_value(&value));
        }

        source
    }
}
