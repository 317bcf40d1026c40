//! Resolving and loading a batch of imports.

use std::collections::HashSet;
use std::str::FromStr;

use super::activation::{ActivationContext, ImportPhase};
use super::loader::{ConfigData, ConfigDataLoaders};
use super::location::Location;
use super::log::Log;
use super::profiles::Profiles;
use super::resolver::{LocationResolvers, ResolutionResult, Resource, ResolverContext};
use super::ConfigDataError;

pub(crate) const ON_NOT_FOUND_PROPERTY: &str = "config.on-not-found";

/// What to do when a mandatory location or resource cannot be found.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum NotFoundAction {
    /// Abort processing with the error.
    #[default]
    Fail,
    /// Log the error and carry on.
    Ignore,
}

impl NotFoundAction {
    pub fn handle(self, log: &Log, error: ConfigDataError) -> Result<(), ConfigDataError> {
        match self {
            Self::Fail => Err(error),
            Self::Ignore => {
                log.trace(format_args!("Ignoring missing config data: {error}"));
                Ok(())
            }
        }
    }
}

impl FromStr for NotFoundAction {
    type Err = ConfigDataError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_ascii_lowercase().as_str() {
            "fail" => Ok(Self::Fail),
            "ignore" => Ok(Self::Ignore),
            other => Err(ConfigDataError::Bind {
                property: ON_NOT_FOUND_PROPERTY.to_string(),
                reason: format!("'{other}' is not one of 'fail' or 'ignore'"),
            }),
        }
    }
}

/// Runs the resolvers and loaders for batches of imports.
///
/// One importer lives for a whole processing run. It remembers every resource
/// it has loaded so that nothing is loaded twice, and the locations it has
/// seen for the final mandatory-location check.
#[derive(Debug)]
pub struct Importer<'a> {
    log: Log,
    resolvers: &'a LocationResolvers,
    loaders: &'a ConfigDataLoaders,
    not_found_action: NotFoundAction,
    loaded: HashSet<Resource>,
    loaded_locations: HashSet<Location>,
    optional_locations: HashSet<Location>,
    reported_locations: HashSet<Location>,
}

impl<'a> Importer<'a> {
    pub fn new(
        log: Log,
        not_found_action: NotFoundAction,
        resolvers: &'a LocationResolvers,
        loaders: &'a ConfigDataLoaders,
    ) -> Self {
        Self {
            log,
            resolvers,
            loaders,
            not_found_action,
            loaded: HashSet::new(),
            loaded_locations: HashSet::new(),
            optional_locations: HashSet::new(),
            reported_locations: HashSet::new(),
        }
    }

    /// Resolves `locations` and loads every resource not already loaded.
    ///
    /// Profile-specific variants are only resolved once profiles are
    /// activated. Candidates are loaded last to first, so the returned list
    /// runs from the highest-precedence result to the lowest.
    pub fn resolve_and_load(
        &mut self,
        activation: Option<&ActivationContext>,
        context: &ResolverContext,
        locations: &[Location],
    ) -> Result<Vec<(ResolutionResult, ConfigData)>, ConfigDataError> {
        let profiles = activation
            .filter(|a| a.import_phase() == ImportPhase::AfterProfileActivation)
            .and_then(ActivationContext::profiles);
        let mut candidates = Vec::new();
        for location in locations {
            candidates.extend(self.resolve(context, location, profiles)?);
        }
        self.load(candidates)
    }

    fn resolve(
        &mut self,
        context: &ResolverContext,
        location: &Location,
        profiles: Option<&Profiles>,
    ) -> Result<Vec<ResolutionResult>, ConfigDataError> {
        match self.resolvers.resolve(context, location, profiles) {
            Ok(results) if results.is_empty() && !location.is_optional() => {
                self.handle(
                    ConfigDataError::LocationNotFound {
                        location: location.clone(),
                        resource: None,
                    },
                    location,
                )?;
                Ok(results)
            }
            Ok(results) => Ok(results),
            Err(error) if error.is_not_found() => {
                self.handle(error, location)?;
                Ok(Vec::new())
            }
            Err(error) => Err(error),
        }
    }

    fn load(
        &mut self,
        candidates: Vec<ResolutionResult>,
    ) -> Result<Vec<(ResolutionResult, ConfigData)>, ConfigDataError> {
        let mut imported = Vec::new();
        for candidate in candidates.into_iter().rev() {
            let location = candidate.location.clone();
            if location.is_optional() {
                self.optional_locations.insert(location.clone());
            }
            if self.loaded.contains(&candidate.resource) {
                self.log.trace(format_args!(
                    "Skipping already loaded config resource '{}'",
                    candidate.resource
                ));
                self.loaded_locations.insert(location);
                continue;
            }
            match self.loaders.load(&candidate.resource) {
                Ok(data) => {
                    self.log.trace(format_args!(
                        "Loaded config resource '{}' from location '{}'",
                        candidate.resource, location
                    ));
                    self.loaded.insert(candidate.resource.clone());
                    self.loaded_locations.insert(location);
                    imported.push((candidate, data));
                }
                Err(error) if error.is_not_found() => {
                    self.handle(error.with_location(&location), &location)?;
                }
                Err(error) => return Err(error),
            }
        }
        Ok(imported)
    }

    fn handle(&mut self, error: ConfigDataError, location: &Location) -> Result<(), ConfigDataError> {
        self.reported_locations.insert(location.clone());
        let action = if location.is_optional() {
            NotFoundAction::Ignore
        } else {
            self.not_found_action
        };
        action.handle(&self.log, error)
    }

    /// Locations that produced at least one loaded (or already loaded) resource.
    pub fn loaded_locations(&self) -> &HashSet<Location> {
        &self.loaded_locations
    }

    pub fn optional_locations(&self) -> &HashSet<Location> {
        &self.optional_locations
    }

    /// Locations whose not-found condition was already handled.
    pub fn reported_locations(&self) -> &HashSet<Location> {
        &self.reported_locations
    }
}
