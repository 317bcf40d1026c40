//! Loading resolved resources into [`ConfigData`].

use std::collections::BTreeSet;
use std::fmt;
use std::sync::Arc;

use super::file::{read_resource, PropertySourceLoader};
use super::location::Location;
use super::resolver::Resource;
use super::source::PropertySource;
use super::ConfigDataError;

/// Options that change how a piece of config data is processed.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub enum ConfigDataOption {
    /// `config.import` declared by the data is ignored.
    IgnoreImports,
    /// Profile properties declared by the data are ignored.
    IgnoreProfiles,
    /// The data is only active once profiles are known.
    ProfileSpecific,
}

/// A set of [`ConfigDataOption`]s.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct Options(BTreeSet<ConfigDataOption>);

impl Options {
    pub fn none() -> Self {
        Self::default()
    }

    pub fn of(options: impl IntoIterator<Item = ConfigDataOption>) -> Self {
        Self(options.into_iter().collect())
    }

    pub fn contains(&self, option: ConfigDataOption) -> bool {
        self.0.contains(&option)
    }

    #[must_use]
    pub fn with(mut self, option: ConfigDataOption) -> Self {
        self.0.insert(option);
        self
    }

    #[must_use]
    pub fn without(mut self, option: ConfigDataOption) -> Self {
        self.0.remove(&option);
        self
    }
}

/// The property sources loaded from one resource.
///
/// Sources are in document order. `imports` are extra locations the loader
/// wants imported alongside the ones declared in the sources themselves.
#[derive(Debug, Clone, Default)]
pub struct ConfigData {
    property_sources: Vec<Arc<PropertySource>>,
    imports: Vec<Location>,
    options: Options,
}

impl ConfigData {
    pub fn new(property_sources: Vec<PropertySource>, options: Options) -> Self {
        Self {
            property_sources: property_sources.into_iter().map(Arc::new).collect(),
            imports: Vec::new(),
            options,
        }
    }

    /// Data with no property sources.
    pub fn empty() -> Self {
        Self::default()
    }

    #[must_use]
    pub fn with_imports(mut self, imports: Vec<Location>) -> Self {
        self.imports = imports;
        self
    }

    pub fn property_sources(&self) -> &[Arc<PropertySource>] {
        &self.property_sources
    }

    pub fn imports(&self) -> &[Location] {
        &self.imports
    }

    pub fn options(&self) -> &Options {
        &self.options
    }
}

/// Loads [`ConfigData`] for the resources it claims.
pub trait ConfigDataLoader: Send + Sync + fmt::Debug {
    fn is_loadable(&self, resource: &Resource) -> bool;

    /// Loads `resource`. A resource that does not exist must fail with
    /// [`ConfigDataError::ResourceNotFound`].
    fn load(&self, resource: &Resource) -> Result<ConfigData, ConfigDataError>;
}

/// The ordered loader registry.
#[derive(Debug, Default)]
pub struct ConfigDataLoaders {
    loaders: Vec<Box<dyn ConfigDataLoader>>,
}

impl ConfigDataLoaders {
    pub fn new(loaders: Vec<Box<dyn ConfigDataLoader>>) -> Self {
        Self { loaders }
    }

    /// Loads `resource` with the first loader that claims it.
    pub fn load(&self, resource: &Resource) -> Result<ConfigData, ConfigDataError> {
        self.loaders
            .iter()
            .find(|loader| loader.is_loadable(resource))
            .ok_or_else(|| ConfigDataError::NoLoader(resource.id().to_string()))?
            .load(resource)
    }
}

/// Loads filesystem resources, picking the format by file extension.
#[derive(Debug, Clone)]
pub struct StandardConfigDataLoader {
    formats: Vec<Arc<dyn PropertySourceLoader>>,
}

impl StandardConfigDataLoader {
    pub fn new(formats: Vec<Arc<dyn PropertySourceLoader>>) -> Self {
        Self { formats }
    }

    fn format_for(&self, extension: &str) -> Option<&dyn PropertySourceLoader> {
        self.formats
            .iter()
            .find(|format| format.file_extensions().contains(&extension))
            .map(Arc::as_ref)
    }
}

impl ConfigDataLoader for StandardConfigDataLoader {
    fn is_loadable(&self, resource: &Resource) -> bool {
        resource.path().is_some()
    }

    fn load(&self, resource: &Resource) -> Result<ConfigData, ConfigDataError> {
        if resource.is_empty_directory() {
            return Ok(ConfigData::empty());
        }
        let path = resource
            .path()
            .ok_or_else(|| ConfigDataError::NoLoader(resource.id().to_string()))?;
        let format = path
            .extension()
            .and_then(|e| e.to_str())
            .and_then(|e| self.format_for(e))
            .ok_or_else(|| ConfigDataError::NoLoader(resource.id().to_string()))?;
        let contents = read_resource(path)?
            .ok_or_else(|| ConfigDataError::ResourceNotFound(resource.id().to_string()))?;

        let name = format!("Config resource '{resource}'");
        let sources = format.load(&name, path, &contents)?;
        let options = if resource.profile().is_some() {
            Options::of([ConfigDataOption::ProfileSpecific])
        } else {
            Options::none()
        };
        Ok(ConfigData::new(sources, options))
    }
}
