use std::path::{Path, PathBuf};
use std::sync::Arc;

use serde::de::DeserializeOwned;

use super::binder::Binder;
use super::env::EnvSource;
use super::environment::{ConfigDataEnvironment, Environment, EnvironmentUpdateListener};
use super::file::{PropertiesPropertySourceLoader, PropertySourceLoader, TomlPropertySourceLoader};
use super::loader::{ConfigDataLoader, ConfigDataLoaders, StandardConfigDataLoader};
use super::log::Log;
use super::resolver::{LocationResolver, LocationResolvers, StandardLocationResolver};
use super::source::PropertySource;
use super::ConfigDataError;
use crate::context::BootstrapRegistry;

/// A property source registered before processing starts.
#[derive(Debug)]
enum ConfigSource {
    Properties(PropertySource),
    Env(EnvSource),
}

impl ConfigSource {
    fn into_property_source(self) -> PropertySource {
        match self {
            Self::Properties(source) => source,
            Self::Env(env) => env.property_source(),
        }
    }
}

/// Builder for loading config data.
///
/// Registered sources seed the run: they are the highest-precedence
/// properties, and they decide where config data is searched for through
/// `config.location`, `config.additional-location` and `config.import`.
/// Without `config.location` the default search locations are used:
///
/// ```text
/// optional:classpath:/
/// optional:classpath:/config/
/// optional:file:./
/// optional:file:./config/
/// optional:file:./config/*/
/// ```
///
/// Each location is searched for `application.properties` and
/// `application.toml` (see `config.name`), and for profile-specific variants
/// such as `application-dev.toml` once the active profiles are known.
///
/// ## Variable References
///
/// String values can reference other properties using `${path.to.key}`, with
/// an optional default: `${server.port:8080}`. Use `$$` to escape a literal
/// `$`.
///
/// ## Example
///
/// ```no_run
/// use dragon_cfg::{Config, PropertySource};
/// use serde::Deserialize;
///
/// #[derive(Deserialize)]
/// struct MyConfig {
///     name: String,
///     port: u16,
/// }
///
/// let config: MyConfig = Config::builder()
///     .with_classpath_root("resources")
///     .with_source(PropertySource::new("args").with_property("config.import", "optional:file:./local.toml"))
///     .with_env("MYAPP", "__")
///     .build()?;
/// # Ok::<(), dragon_cfg::ConfigDataError>(())
/// ```
#[derive(Debug, Default)]
#[must_use = "builders do nothing until .load() or .build() is called"]
pub struct Config {
    sources: Vec<ConfigSource>,
    default_properties: Option<PropertySource>,
    classpath: Vec<PathBuf>,
    working_dir: Option<PathBuf>,
    additional_profiles: Vec<String>,
    resolvers: Vec<Box<dyn LocationResolver>>,
    loaders: Vec<Box<dyn ConfigDataLoader>>,
    formats: Vec<Arc<dyn PropertySourceLoader>>,
    listener: Option<Arc<dyn EnvironmentUpdateListener>>,
    bootstrap: Option<Arc<BootstrapRegistry>>,
    log: Option<Log>,
}

impl Config {
    /// Creates a new configuration builder.
    pub fn builder() -> Self {
        Self::default()
    }

    /// Adds an existing property source.
    ///
    /// Sources registered later take precedence over earlier ones, and all of
    /// them take precedence over imported config data.
    pub fn with_source(mut self, source: PropertySource) -> Self {
        self.sources.push(ConfigSource::Properties(source));
        self
    }

    /// Adds the environment variables starting with `prefix` as a source.
    ///
    /// Variables are mapped to keys by:
    /// 1. Removing the prefix and separator
    /// 2. Splitting the remaining segments on the separator
    /// 3. Lowercasing each segment and turning `_` into `-`
    ///
    /// Values are coerced from strings to the most specific type:
    /// integer, float, boolean, or string (fallback). Like
    /// [`with_source`](Self::with_source), later registrations win.
    ///
    /// ```no_run
    /// # use dragon_cfg::Config;
    /// // MYAPP__CONFIG__LOCATION=file:./conf/ replaces the default search locations
    /// let env = Config::builder().with_env("MYAPP", "__").load()?;
    /// # Ok::<(), dragon_cfg::ConfigDataError>(())
    /// ```
    ///
    /// # Panics
    ///
    /// Panics if `separator` is empty.
    pub fn with_env(mut self, prefix: impl Into<String>, separator: impl Into<String>) -> Self {
        self.sources
            .push(ConfigSource::Env(EnvSource::new(prefix, separator)));
        self
    }

    /// Sets the lowest-precedence source, consulted after all config data.
    pub fn with_default_properties(mut self, source: PropertySource) -> Self {
        self.default_properties = Some(source);
        self
    }

    /// Adds a root directory for `classpath:` locations. Roots are tried in
    /// registration order.
    pub fn with_classpath_root(mut self, root: impl AsRef<Path>) -> Self {
        self.classpath.push(root.as_ref().to_path_buf());
        self
    }

    /// Sets the directory `file:` locations are relative to. Defaults to the
    /// process working directory.
    pub fn with_working_dir(mut self, dir: impl AsRef<Path>) -> Self {
        self.working_dir = Some(dir.as_ref().to_path_buf());
        self
    }

    /// Activates profiles in addition to `profiles.active`. They come first in
    /// the active profile list.
    pub fn with_additional_profiles<I>(mut self, profiles: I) -> Self
    where
        I: IntoIterator,
        I::Item: Into<String>,
    {
        self.additional_profiles
            .extend(profiles.into_iter().map(Into::into));
        self
    }

    /// Registers a location resolver. Custom resolvers are consulted before
    /// the standard one, in registration order.
    pub fn with_resolver(mut self, resolver: impl LocationResolver + 'static) -> Self {
        self.resolvers.push(Box::new(resolver));
        self
    }

    /// Registers a config data loader. Custom loaders are consulted before
    /// the standard one, in registration order.
    pub fn with_loader(mut self, loader: impl ConfigDataLoader + 'static) -> Self {
        self.loaders.push(Box::new(loader));
        self
    }

    /// Registers a file format. Custom formats take precedence over the
    /// built-in `.properties` and `.toml` formats.
    pub fn with_format(mut self, format: impl PropertySourceLoader + 'static) -> Self {
        self.formats.push(Arc::new(format));
        self
    }

    pub fn with_listener(mut self, listener: Arc<dyn EnvironmentUpdateListener>) -> Self {
        self.listener = Some(listener);
        self
    }

    /// Publishes the binder to `registry` after every processing pass.
    pub fn with_bootstrap_registry(mut self, registry: Arc<BootstrapRegistry>) -> Self {
        self.bootstrap = Some(registry);
        self
    }

    /// Sends processing logs to `log` instead of `tracing`.
    pub fn with_log(mut self, log: Log) -> Self {
        self.log = Some(log);
        self
    }

    /// Processes all config data and returns the resulting environment.
    pub fn load(self) -> Result<Environment, ConfigDataError> {
        let working_dir = match self.working_dir {
            Some(dir) => dir,
            None => std::env::current_dir().map_err(|e| ConfigDataError::ReadError {
                path: PathBuf::from("."),
                source: e,
            })?,
        };

        let existing: Vec<Arc<PropertySource>> = self
            .sources
            .into_iter()
            .rev()
            .map(|source| Arc::new(source.into_property_source()))
            .collect();
        let default_properties = self.default_properties.map(Arc::new);

        let mut formats = self.formats;
        formats.push(Arc::new(PropertiesPropertySourceLoader));
        formats.push(Arc::new(TomlPropertySourceLoader));
        let mut extensions: Vec<String> = Vec::new();
        for extension in formats.iter().flat_map(|f| f.file_extensions()) {
            if !extensions.iter().any(|e| e == extension) {
                extensions.push((*extension).to_string());
            }
        }

        let binder = Binder::new(existing.iter().chain(&default_properties).cloned());
        let mut resolvers = self.resolvers;
        resolvers.push(Box::new(StandardLocationResolver::new(
            &binder,
            extensions,
            self.classpath,
            working_dir,
        )?));
        let mut loaders = self.loaders;
        loaders.push(Box::new(StandardConfigDataLoader::new(formats)));

        let mut environment = ConfigDataEnvironment::new(
            self.log.unwrap_or_default(),
            existing,
            default_properties,
            LocationResolvers::new(resolvers),
            ConfigDataLoaders::new(loaders),
            self.additional_profiles,
        )?;
        if let Some(listener) = self.listener {
            environment = environment.with_listener(listener);
        }
        if let Some(registry) = self.bootstrap {
            environment = environment.with_bootstrap_registry(registry);
        }
        environment.process_and_apply()
    }

    /// Loads the environment and binds it to `T` in one step.
    ///
    /// The environment itself is dropped; use [`load`](Self::load) when the
    /// active profiles or property sources are needed too.
    pub fn build<T: DeserializeOwned>(self) -> Result<T, ConfigDataError> {
        self.load()?.deserialize()
    }
}
