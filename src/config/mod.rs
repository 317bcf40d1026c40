//! Config data loading: locations, imports, profiles and the resulting
//! environment.

mod activation;
mod binder;
mod builder;
mod contributor;
mod contributors;
mod env;
mod environment;
mod error;
mod file;
mod importer;
mod loader;
mod location;
mod log;
mod profiles;
mod resolve;
mod resolver;
mod source;

#[cfg(test)]
mod testing;

pub use activation::{ActivationContext, ImportPhase};
pub use binder::Binder;
pub use builder::Config;
pub use contributor::{Activate, ConfigDataProperties, Contributor, Kind};
pub use contributors::Contributors;
pub use env::EnvSource;
pub use environment::{
    ConfigDataEnvironment, Environment, EnvironmentUpdateListener, DEFAULT_SEARCH_LOCATIONS,
};
pub use error::ConfigDataError;
pub use file::{PropertiesPropertySourceLoader, PropertySourceLoader, TomlPropertySourceLoader};
pub use importer::{Importer, NotFoundAction};
pub use loader::{
    ConfigData, ConfigDataLoader, ConfigDataLoaders, ConfigDataOption, Options,
    StandardConfigDataLoader,
};
pub use location::Location;
pub use log::{DeferredLog, Log, LogSink, TracingSink};
pub use profiles::{ProfileExpression, Profiles};
pub use resolver::{
    LocationResolver, LocationResolvers, ResolutionResult, Resource, ResolverContext,
    StandardLocationResolver,
};
pub use source::PropertySource;
