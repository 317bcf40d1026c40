//! The application context: typed configuration next to the environment it
//! was bound from.

mod bootstrap;

pub use bootstrap::BootstrapRegistry;

use serde::de::DeserializeOwned;

use crate::config::Environment;
use crate::Error;

/// Central application context holding configuration and the environment it
/// came from.
///
/// `C` is bound from the environment once, when the context is built, so
/// [`config()`](Self::config) is a plain field read afterwards.
///
/// ## Example
///
/// ```no_run
/// use dragon_cfg::{AppContext, Config};
/// use serde::Deserialize;
///
/// #[derive(Deserialize)]
/// struct MyConfig {
///     name: String,
///     port: u16,
/// }
///
/// let ctx = AppContext::builder()
///     .with_environment(
///         Config::builder()
///             .with_additional_profiles(["dev"])
///             .load()?
///     )
///     .build::<MyConfig>()?;
///
/// let port = ctx.config().port;
/// let dev = ctx.environment().accepts_profiles("dev")?;
/// # Ok::<(), dragon_cfg::Error>(())
/// ```
#[derive(Debug)]
pub struct AppContext<C> {
    config: C,
    environment: Environment,
}

impl<C> AppContext<C> {
    /// The typed configuration.
    pub fn config(&self) -> &C {
        &self.config
    }

    /// The property sources and profiles the configuration was built from.
    pub fn environment(&self) -> &Environment {
        &self.environment
    }

    pub fn active_profiles(&self) -> &[String] {
        self.environment.active_profiles()
    }
}

impl AppContext<()> {
    /// Starts an empty builder; an environment must be attached before
    /// building.
    pub fn builder() -> AppContextBuilder {
        AppContextBuilder { environment: None }
    }
}

/// Builder for constructing an [`AppContext`].
#[derive(Debug)]
#[must_use = "builders do nothing until .build() is called"]
pub struct AppContextBuilder {
    environment: Option<Environment>,
}

impl AppContextBuilder {
    /// Attaches the environment produced by
    /// [`Config::load`](crate::Config::load).
    pub fn with_environment(mut self, environment: Environment) -> Self {
        self.environment = Some(environment);
        self
    }

    /// Builds the `AppContext`, deserializing the environment into `C`.
    ///
    /// Returns an error if no environment was provided.
    pub fn build<C: DeserializeOwned>(self) -> Result<AppContext<C>, Error> {
        let environment = self.environment.ok_or(Error::MissingEnvironment)?;
        Ok(AppContext {
            config: environment.deserialize()?,
            environment,
        })
    }
}
