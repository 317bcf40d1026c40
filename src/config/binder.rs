//! Read-only composite lookup over property sources.

use std::collections::BTreeSet;
use std::sync::Arc;

use toml::Value;

use super::location::Location;
use super::resolve::resolve_placeholders;
use super::source::PropertySource;
use super::ConfigDataError;

/// One property source as seen by a [`Binder`], tagged with whether the
/// contributor it belongs to is currently active.
#[derive(Debug, Clone)]
pub(crate) struct BindSource {
    pub(crate) source: Arc<PropertySource>,
    pub(crate) active: bool,
    pub(crate) location: Option<Location>,
}

impl BindSource {
    pub(crate) fn active(source: Arc<PropertySource>) -> Self {
        Self {
            source,
            active: true,
            location: None,
        }
    }

    fn inactive_access(&self, property: &str) -> ConfigDataError {
        ConfigDataError::InactiveConfigDataAccess {
            property: property.to_string(),
            source_name: self.source.name().to_string(),
            location: self.location.clone(),
        }
    }
}

/// A first-match-wins view over an ordered list of property sources.
///
/// String values have `${...}` placeholders resolved against a separate
/// placeholder scope, which is usually every contributor rather than just the
/// sources being bound. A binder that fails on inactive sources returns
/// [`ConfigDataError::InactiveConfigDataAccess`] whenever a requested key or
/// placeholder is present in an inactive source.
#[derive(Debug, Clone)]
pub struct Binder {
    sources: Vec<BindSource>,
    placeholders: Arc<[BindSource]>,
    fail_on_inactive: bool,
}

impl Binder {
    /// Creates a binder over active sources, in precedence order.
    pub fn new(sources: impl IntoIterator<Item = Arc<PropertySource>>) -> Self {
        let sources: Vec<BindSource> = sources.into_iter().map(BindSource::active).collect();
        let placeholders = sources.clone().into();
        Self {
            sources,
            placeholders,
            fail_on_inactive: false,
        }
    }

    pub(crate) fn scoped(
        sources: Vec<BindSource>,
        placeholders: Arc<[BindSource]>,
        fail_on_inactive: bool,
    ) -> Self {
        let sources = if fail_on_inactive {
            sources
        } else {
            sources.into_iter().filter(|s| s.active).collect()
        };
        Self {
            sources,
            placeholders,
            fail_on_inactive,
        }
    }

    /// Names of the sources visible to this binder, in precedence order.
    pub fn source_names(&self) -> Vec<&str> {
        self.sources.iter().map(|s| s.source.name()).collect()
    }

    /// Looks up `key`, resolving placeholders in string values.
    pub fn get(&self, key: &str) -> Result<Option<Value>, ConfigDataError> {
        let Some(value) = lookup(&self.sources, key, self.fail_on_inactive)? else {
            return Ok(None);
        };
        self.resolve_value(key, value.clone()).map(Some)
    }

    pub fn contains(&self, key: &str) -> Result<bool, ConfigDataError> {
        Ok(lookup(&self.sources, key, self.fail_on_inactive)?.is_some())
    }

    /// Binds a scalar as a string.
    pub fn bind_string(&self, key: &str) -> Result<Option<String>, ConfigDataError> {
        match self.get(key)? {
            None => Ok(None),
            Some(value) => scalar_to_string(&value)
                .map(Some)
                .ok_or_else(|| ConfigDataError::Bind {
                    property: key.to_string(),
                    reason: format!("expected a single value but found {}", value.type_str()),
                }),
        }
    }

    /// Binds a list from an array or a comma-separated string.
    ///
    /// Blank entries are dropped.
    pub fn bind_string_list(&self, key: &str) -> Result<Option<Vec<String>>, ConfigDataError> {
        let Some(value) = self.get(key)? else {
            return Ok(None);
        };
        let items = match &value {
            Value::Array(items) => items
                .iter()
                .map(|item| {
                    scalar_to_string(item).ok_or_else(|| ConfigDataError::Bind {
                        property: key.to_string(),
                        reason: format!("list element is {}", item.type_str()),
                    })
                })
                .collect::<Result<Vec<_>, _>>()?,
            Value::Table(_) => {
                return Err(ConfigDataError::Bind {
                    property: key.to_string(),
                    reason: "expected a list but found a table".to_string(),
                })
            }
            scalar => scalar_to_string(scalar)
                .map(|s| s.split(',').map(str::to_string).collect())
                .unwrap_or_default(),
        };
        Ok(Some(
            items
                .into_iter()
                .map(|item| item.trim().to_string())
                .filter(|item| !item.is_empty())
                .collect(),
        ))
    }

    /// Binds a list of config data locations.
    pub fn bind_locations(&self, key: &str) -> Result<Option<Vec<Location>>, ConfigDataError> {
        Ok(self.bind_string_list(key)?.map(|values| {
            values
                .iter()
                .filter_map(|value| Location::parse(value))
                .collect()
        }))
    }

    /// Every key starting with `prefix` across all visible sources, sorted.
    pub fn keys_with_prefix(&self, prefix: &str) -> Vec<String> {
        let keys: BTreeSet<&str> = self
            .sources
            .iter()
            .flat_map(|s| s.source.keys())
            .filter(|key| key.starts_with(prefix) && key.len() > prefix.len())
            .collect();
        keys.into_iter().map(str::to_string).collect()
    }

    pub(crate) fn resolve_value(&self, key: &str, value: Value) -> Result<Value, ConfigDataError> {
        match value {
            Value::String(s) => self
                .resolve_placeholders(&s)
                .map(Value::String)
                .map_err(|e| ConfigDataError::BindPlaceholder {
                    property: key.to_string(),
                    source: Box::new(e),
                }),
            Value::Array(items) => items
                .into_iter()
                .map(|item| self.resolve_value(key, item))
                .collect::<Result<Vec<_>, _>>()
                .map(Value::Array),
            other => Ok(other),
        }
    }

    /// Resolves `${...}` placeholders in `text` against this binder's
    /// placeholder scope.
    pub fn resolve_placeholders(&self, text: &str) -> Result<String, ConfigDataError> {
        let find = |key: &str| -> Result<Option<String>, ConfigDataError> {
            match lookup(&self.placeholders, key, self.fail_on_inactive)? {
                None => Ok(None),
                Some(value) => scalar_to_string(value)
                    .map(Some)
                    .ok_or_else(|| ConfigDataError::Bind {
                        property: key.to_string(),
                        reason: format!("cannot use {} in a placeholder", value.type_str()),
                    }),
            }
        };
        resolve_placeholders(text, &find)
    }
}

/// First active match wins. With `fail_on_inactive`, any inactive source that
/// holds the key is an error, even when an active source also holds it.
fn lookup<'a>(
    sources: &'a [BindSource],
    key: &str,
    fail_on_inactive: bool,
) -> Result<Option<&'a Value>, ConfigDataError> {
    let mut found = None;
    for source in sources {
        let Some(value) = source.source.get(key) else {
            continue;
        };
        if !source.active {
            if fail_on_inactive {
                return Err(source.inactive_access(key));
            }
            continue;
        }
        found = found.or(Some(value));
    }
    Ok(found)
}

pub(crate) fn scalar_to_string(value: &Value) -> Option<String> {
    match value {
        Value::String(s) => Some(s.clone()),
        Value::Integer(i) => Some(i.to_string()),
        Value::Float(f) => Some(f.to_string()),
        Value::Boolean(b) => Some(b.to_string()),
        Value::Datetime(dt) => Some(dt.to_string()),
        Value::Array(_) | Value::Table(_) => None,
    }
}
