use std::path::PathBuf;
use thiserror::Error;

use super::location::Location;

#[derive(Debug, Error)]
#[non_exhaustive]
pub enum ConfigDataError {
    #[error("config data location '{location}' cannot be found{}", resource_suffix(.resource))]
    LocationNotFound {
        location: Location,
        resource: Option<String>,
    },

    #[error("config data resource '{0}' cannot be found")]
    ResourceNotFound(String),

    #[error("inactive property source '{source_name}'{} cannot contain property '{property}'", location_suffix(.location))]
    InactiveConfigDataAccess {
        property: String,
        source_name: String,
        location: Option<Location>,
    },

    #[error("property '{property}' imported from '{source_name}' is invalid{}", invalid_suffix(.replacement, .profile_specific))]
    InvalidConfigDataProperty {
        property: String,
        source_name: String,
        replacement: Option<String>,
        profile_specific: bool,
    },

    #[error("failed to bind property '{property}': {reason}")]
    Bind { property: String, reason: String },

    #[error("failed to bind property '{property}': {source}")]
    BindPlaceholder {
        property: String,
        source: Box<ConfigDataError>,
    },

    #[error("no resolver supports config data location '{0}'")]
    UnsupportedLocation(Location),

    #[error("file extension of '{0}' is not known to any property source loader")]
    UnknownExtension(Location),

    #[error("no config data loader can load resource '{0}'")]
    NoLoader(String),

    #[error("failed to read config file '{path}': {source}")]
    ReadError {
        path: PathBuf,
        source: std::io::Error,
    },

    #[error("failed to parse config file '{path}': {source}")]
    ParseError {
        path: PathBuf,
        source: toml::de::Error,
    },

    #[error("malformed properties file '{path}' at line {line}: {message}")]
    PropertiesSyntax {
        path: PathBuf,
        line: usize,
        message: String,
    },

    #[error("could not resolve placeholder '{0}'")]
    UnresolvablePlaceholder(String),

    #[error("circular placeholder reference '{0}'")]
    CircularPlaceholder(String),

    #[error("unclosed placeholder in '{0}' (missing '}}')")]
    UnclosedPlaceholder(String),

    #[error("invalid profile expression '{expression}': {reason}")]
    InvalidProfileExpression { expression: String, reason: String },

    #[error("invalid profile name '{0}'")]
    InvalidProfileName(String),

    #[error("failed to deserialize config: {0}")]
    Deserialize(#[from] toml::de::Error),
}

impl ConfigDataError {
    /// Returns `true` for the errors the not-found policy is allowed to swallow.
    pub fn is_not_found(&self) -> bool {
        matches!(
            self,
            Self::LocationNotFound { .. } | Self::ResourceNotFound(_)
        )
    }

    /// Attaches `location` to a loader-level not-found error.
    pub(crate) fn with_location(self, location: &Location) -> Self {
        match self {
            Self::ResourceNotFound(resource) => Self::LocationNotFound {
                location: location.clone(),
                resource: Some(resource),
            },
            other => other,
        }
    }

    /// Unwraps a binding failure whose root cause is an inactive-source access.
    pub(crate) fn unwrap_inactive(self) -> Self {
        match self {
            Self::BindPlaceholder { source, .. }
                if matches!(*source, Self::InactiveConfigDataAccess { .. }) =>
            {
                *source
            }
            other => other,
        }
    }
}

fn resource_suffix(resource: &Option<String>) -> String {
    resource
        .as_ref()
        .map(|r| format!(" (resource '{r}')"))
        .unwrap_or_default()
}

fn location_suffix(location: &Option<Location>) -> String {
    location
        .as_ref()
        .map(|l| format!(" imported from location '{l}'"))
        .unwrap_or_default()
}

fn invalid_suffix(replacement: &Option<String>, profile_specific: &bool) -> String {
    match (replacement, *profile_specific) {
        (_, true) => " in a profile specific resource".to_string(),
        (Some(replacement), false) => format!(" and should be replaced with '{replacement}'"),
        (None, false) => String::new(),
    }
}
