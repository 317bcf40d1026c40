//! Three-pass config data processing and the resulting [`Environment`].

use std::collections::HashSet;
use std::fmt;
use std::sync::Arc;

use serde::de::DeserializeOwned;
use toml::{Table, Value};

use super::activation::ActivationContext;
use super::binder::Binder;
use super::contributor::{Contributor, IMPORT_PROPERTY};
use super::contributors::Contributors;
use super::importer::{Importer, NotFoundAction, ON_NOT_FOUND_PROPERTY};
use super::loader::{ConfigDataLoaders, ConfigDataOption};
use super::location::Location;
use super::log::Log;
use super::profiles::{
    ProfileExpression, Profiles, ACTIVE_PROFILES, DEFAULT_PROFILES, INCLUDE_PROFILES,
    PROFILE_GROUP_PREFIX,
};
use super::resolver::{LocationResolvers, Resource};
use super::source::{merge_at_path, PropertySource};
use super::ConfigDataError;
use crate::context::BootstrapRegistry;

const LOCATION_PROPERTY: &str = "config.location";
const ADDITIONAL_LOCATION_PROPERTY: &str = "config.additional-location";

/// Searched when `config.location` is not set. Later entries take precedence.
pub const DEFAULT_SEARCH_LOCATIONS: [&str; 5] = [
    "optional:classpath:/",
    "optional:classpath:/config/",
    "optional:file:./",
    "optional:file:./config/",
    "optional:file:./config/*/",
];

/// Keys that fail processing, with the key that replaced them.
const INVALID_PROPERTIES: [(&str, &str); 1] = [("profiles", "config.activate.on-profile")];

/// Keys that are no longer supported and only produce a warning.
const DEPRECATED_PROPERTIES: [&str; 1] = ["config.use-legacy-processing"];

/// Keys that a profile-specific resource must not set.
const PROFILE_SPECIFIC_INVALID_PROPERTIES: [&str; 3] =
    [ACTIVE_PROFILES, DEFAULT_PROFILES, INCLUDE_PROFILES];

/// Receives updates as the environment is populated.
pub trait EnvironmentUpdateListener: Send + Sync + fmt::Debug {
    /// Called for every imported property source added to the environment.
    fn on_property_source_added(
        &self,
        _source: &PropertySource,
        _location: Option<&Location>,
        _resource: Option<&Resource>,
    ) {
    }

    /// Called once the final profiles are known.
    fn on_set_profiles(&self, _profiles: &Profiles) {}
}

/// Processes config data in three passes and applies the result.
///
/// 1. Imports are processed without any profile information.
/// 2. Profiles are bound and imports are processed again, so that documents
///    gated on those profiles can contribute their own imports.
/// 3. `profiles.include` is collected, the final profiles are built and
///    imports are processed once more, this time with profile-specific
///    variants.
#[derive(Debug)]
pub struct ConfigDataEnvironment {
    log: Log,
    resolvers: LocationResolvers,
    loaders: ConfigDataLoaders,
    not_found_action: NotFoundAction,
    additional_profiles: Vec<String>,
    existing: Vec<Arc<PropertySource>>,
    default_properties: Option<Arc<PropertySource>>,
    contributors: Contributors,
    bootstrap: Option<Arc<BootstrapRegistry>>,
    listener: Option<Arc<dyn EnvironmentUpdateListener>>,
}

impl ConfigDataEnvironment {
    /// Creates the contributor tree for `existing` sources (highest
    /// precedence first) and the optional `default_properties`.
    pub fn new(
        log: Log,
        existing: Vec<Arc<PropertySource>>,
        default_properties: Option<Arc<PropertySource>>,
        resolvers: LocationResolvers,
        loaders: ConfigDataLoaders,
        additional_profiles: Vec<String>,
    ) -> Result<Self, ConfigDataError> {
        let binder = initial_binder(&existing, default_properties.as_ref());
        let not_found_action = binder
            .bind_string(ON_NOT_FOUND_PROPERTY)?
            .map(|value| value.parse::<NotFoundAction>())
            .transpose()?
            .unwrap_or_default();

        let mut children: Vec<Arc<Contributor>> = existing
            .iter()
            .cloned()
            .map(|source| Arc::new(Contributor::existing(source)))
            .collect();
        children.extend(initial_imports(&binder)?);
        if let Some(defaults) = &default_properties {
            children.push(Arc::new(Contributor::existing(defaults.clone())));
        }

        Ok(Self {
            contributors: Contributors::new(log.clone(), children),
            log,
            resolvers,
            loaders,
            not_found_action,
            additional_profiles,
            existing,
            default_properties,
            bootstrap: None,
            listener: None,
        })
    }

    #[must_use]
    pub fn with_bootstrap_registry(mut self, registry: Arc<BootstrapRegistry>) -> Self {
        self.bootstrap = Some(registry);
        self
    }

    #[must_use]
    pub fn with_listener(mut self, listener: Arc<dyn EnvironmentUpdateListener>) -> Self {
        self.listener = Some(listener);
        self
    }

    pub fn contributors(&self) -> &Contributors {
        &self.contributors
    }

    /// Runs all three passes and returns the populated environment.
    pub fn process_and_apply(self) -> Result<Environment, ConfigDataError> {
        self.process().map_err(ConfigDataError::unwrap_inactive)
    }

    fn process(self) -> Result<Environment, ConfigDataError> {
        let mut importer = Importer::new(
            self.log.clone(),
            self.not_found_action,
            &self.resolvers,
            &self.loaders,
        );
        self.register_bootstrap_binder(&self.contributors, None, true);

        let contributors = self.contributors.with_processed_imports(&mut importer, None)?;
        self.register_bootstrap_binder(&contributors, None, true);

        let activation = ActivationContext::initial(Profiles::bind(
            &profiles_binder(&contributors, None),
            self.additional_profiles.iter().cloned(),
        )?);
        let contributors =
            contributors.with_processed_imports(&mut importer, Some(&activation))?;
        self.register_bootstrap_binder(&contributors, Some(&activation), true);

        let activation = self.with_profiles(&contributors, &activation)?;
        let contributors =
            contributors.with_processed_imports(&mut importer, Some(&activation))?;
        self.register_bootstrap_binder(&contributors, Some(&activation), false);

        self.apply(&contributors, &activation, &importer)
    }

    /// Builds the final activation context, with `profiles.include` merged.
    fn with_profiles(
        &self,
        contributors: &Contributors,
        activation: &ActivationContext,
    ) -> Result<ActivationContext, ConfigDataError> {
        let mut additional = self.additional_profiles.clone();
        additional.extend(contributors.included_profiles(Some(activation))?);
        let profiles = Profiles::bind(&profiles_binder(contributors, Some(activation)), additional)?;
        Ok(activation.with_profiles(profiles))
    }

    fn register_bootstrap_binder(
        &self,
        contributors: &Contributors,
        activation: Option<&ActivationContext>,
        fail_on_inactive: bool,
    ) {
        if let Some(bootstrap) = &self.bootstrap {
            bootstrap.register(contributors.binder(activation, |_| true, fail_on_inactive));
        }
    }

    fn apply(
        &self,
        contributors: &Contributors,
        activation: &ActivationContext,
        importer: &Importer<'_>,
    ) -> Result<Environment, ConfigDataError> {
        self.check_invalid_properties(contributors, activation)?;
        self.check_mandatory_locations(contributors, activation, importer)?;

        let mut property_sources = self.existing.clone();
        for contributor in contributors.bound_imports() {
            let Some(source) = contributor.property_source() else {
                continue;
            };
            if !contributor.is_active(Some(activation)) {
                self.log.trace(format_args!(
                    "Skipping inactive property source '{}'",
                    source.name()
                ));
                continue;
            }
            self.log.trace(format_args!(
                "Adding imported property source '{}'",
                source.name()
            ));
            if let Some(listener) = &self.listener {
                listener.on_property_source_added(
                    source,
                    contributor.location(),
                    contributor.resource(),
                );
            }
            property_sources.push(source.clone());
        }
        property_sources.extend(self.default_properties.clone());

        let profiles = activation
            .profiles()
            .cloned()
            .unwrap_or_else(|| Profiles::new(Vec::<String>::new(), ["default"]));
        self.log.debug(format_args!(
            "Setting default profiles: {:?}",
            profiles.default()
        ));
        self.log.debug(format_args!(
            "Setting active profiles: {:?}",
            profiles.active()
        ));
        if let Some(listener) = &self.listener {
            listener.on_set_profiles(&profiles);
        }

        Ok(Environment {
            property_sources,
            active_profiles: profiles.active().to_vec(),
            default_profiles: profiles.default().to_vec(),
        })
    }

    fn check_invalid_properties(
        &self,
        contributors: &Contributors,
        activation: &ActivationContext,
    ) -> Result<(), ConfigDataError> {
        for contributor in contributors.iter() {
            let Some(source) = contributor.property_source() else {
                continue;
            };
            if !contributor.is_active(Some(activation)) {
                continue;
            }
            for (property, replacement) in INVALID_PROPERTIES {
                if source.contains(property) {
                    return Err(ConfigDataError::InvalidConfigDataProperty {
                        property: property.to_string(),
                        source_name: source.name().to_string(),
                        replacement: Some(replacement.to_string()),
                        profile_specific: false,
                    });
                }
            }
            if contributor.is_profile_specific()
                && !contributor.has_option(ConfigDataOption::IgnoreProfiles)
            {
                let invalid = source.keys().find(|key| {
                    PROFILE_SPECIFIC_INVALID_PROPERTIES.contains(key)
                        || key.starts_with(PROFILE_GROUP_PREFIX)
                });
                if let Some(property) = invalid {
                    return Err(ConfigDataError::InvalidConfigDataProperty {
                        property: property.to_string(),
                        source_name: source.name().to_string(),
                        replacement: None,
                        profile_specific: true,
                    });
                }
            }
            for property in DEPRECATED_PROPERTIES {
                if source.contains(property) {
                    let error = ConfigDataError::InvalidConfigDataProperty {
                        property: property.to_string(),
                        source_name: source.name().to_string(),
                        replacement: None,
                        profile_specific: false,
                    };
                    self.log.warn(format_args!("{error}"));
                }
            }
        }
        Ok(())
    }

    /// Applies the not-found policy to mandatory imports that never produced
    /// any config data.
    fn check_mandatory_locations(
        &self,
        contributors: &Contributors,
        activation: &ActivationContext,
        importer: &Importer<'_>,
    ) -> Result<(), ConfigDataError> {
        let mut mandatory: Vec<Location> = Vec::new();
        let mut seen = HashSet::new();
        for contributor in contributors.iter() {
            if !contributor.is_active(Some(activation)) {
                continue;
            }
            for location in contributor.imports() {
                if !location.is_optional() && seen.insert(location.clone()) {
                    mandatory.push(location.clone());
                }
            }
        }

        let bound: HashSet<Location> = contributors
            .iter()
            .filter_map(|contributor| contributor.location().cloned())
            .collect();
        for location in mandatory {
            if bound.contains(&location)
                || importer.loaded_locations().contains(&location)
                || importer.optional_locations().contains(&location)
                || importer.reported_locations().contains(&location)
            {
                continue;
            }
            self.not_found_action.handle(
                &self.log,
                ConfigDataError::LocationNotFound {
                    location,
                    resource: None,
                },
            )?;
        }
        Ok(())
    }
}

/// Binder over the sources that exist before any config data is loaded.
fn initial_binder(
    existing: &[Arc<PropertySource>],
    default_properties: Option<&Arc<PropertySource>>,
) -> Binder {
    Binder::new(existing.iter().chain(default_properties).cloned())
}

/// One initial-import contributor per location, `config.import` first, then
/// `config.additional-location`, then `config.location` or the default search
/// locations. Each group is reversed so its last entry takes precedence.
fn initial_imports(binder: &Binder) -> Result<Vec<Arc<Contributor>>, ConfigDataError> {
    let defaults = || {
        DEFAULT_SEARCH_LOCATIONS
            .iter()
            .filter_map(|l| Location::parse(l))
            .collect::<Vec<_>>()
    };
    let groups = [
        binder.bind_locations(IMPORT_PROPERTY)?.unwrap_or_default(),
        binder
            .bind_locations(ADDITIONAL_LOCATION_PROPERTY)?
            .unwrap_or_default(),
        binder
            .bind_locations(LOCATION_PROPERTY)?
            .unwrap_or_else(defaults),
    ];
    Ok(groups
        .into_iter()
        .flat_map(|locations| locations.into_iter().rev())
        .map(|location| Arc::new(Contributor::initial_import(location)))
        .collect())
}

/// Binder used to read profile properties; skips data that ignores profiles
/// and fails on reads from inactive data.
fn profiles_binder(contributors: &Contributors, activation: Option<&ActivationContext>) -> Binder {
    contributors.binder(
        activation,
        |contributor| !contributor.has_option(ConfigDataOption::IgnoreProfiles),
        true,
    )
}

/// The ordered property sources and profiles produced by processing.
#[derive(Debug, Clone, Default)]
pub struct Environment {
    property_sources: Vec<Arc<PropertySource>>,
    active_profiles: Vec<String>,
    default_profiles: Vec<String>,
}

impl Environment {
    /// Property sources, highest precedence first.
    pub fn property_sources(&self) -> &[Arc<PropertySource>] {
        &self.property_sources
    }

    pub fn active_profiles(&self) -> &[String] {
        &self.active_profiles
    }

    pub fn default_profiles(&self) -> &[String] {
        &self.default_profiles
    }

    /// A binder over all property sources.
    pub fn binder(&self) -> Binder {
        Binder::new(self.property_sources.iter().cloned())
    }

    /// Looks up `key`, with placeholders resolved.
    pub fn get(&self, key: &str) -> Result<Option<Value>, ConfigDataError> {
        self.binder().get(key)
    }

    pub fn get_string(&self, key: &str) -> Result<Option<String>, ConfigDataError> {
        self.binder().bind_string(key)
    }

    /// Evaluates a profile expression such as `prod & !cloud` against the
    /// active profiles, or the default ones when none are active.
    pub fn accepts_profiles(&self, expression: &str) -> Result<bool, ConfigDataError> {
        let profiles = Profiles::new(
            self.active_profiles.iter().cloned(),
            self.default_profiles.iter().cloned(),
        );
        Ok(ProfileExpression::parse(expression)?.matches(&profiles))
    }

    /// Deserializes the whole environment into `T`.
    ///
    /// Flattened keys are rebuilt into nested tables, lowest precedence first
    /// so that higher-precedence values overwrite them.
    pub fn deserialize<T: DeserializeOwned>(&self) -> Result<T, ConfigDataError> {
        let binder = self.binder();
        let mut table = Table::new();
        for source in self.property_sources.iter().rev() {
            for (key, value) in source.iter() {
                let value = binder.resolve_value(key, value.clone())?;
                let path: Vec<&str> = key.split('.').collect();
                merge_at_path(&mut table, &path, value);
            }
        }
        Ok(Value::Table(table).try_into()?)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::activation::ImportPhase;
    use crate::config::contributor::Kind;
    use crate::config::log::DeferredLog;
    use crate::config::testing::InMemoryLoader;
    use serde::Deserialize;
    use std::sync::Mutex;

    fn environment(
        loader: InMemoryLoader,
        existing: &[(&str, &str)],
        additional_profiles: &[&str],
    ) -> ConfigDataEnvironment {
        let mut source = PropertySource::new("test");
        for (k, v) in existing {
            source.insert(*k, *v);
        }
        ConfigDataEnvironment::new(
            Log::default(),
            vec![Arc::new(source)],
            None,
            LocationResolvers::new(vec![Box::new(loader.resolver())]),
            ConfigDataLoaders::new(vec![Box::new(loader)]),
            additional_profiles.iter().map(|p| p.to_string()).collect(),
        )
        .unwrap()
    }

    fn names(env: &Environment) -> Vec<&str> {
        env.property_sources().iter().map(|s| s.name()).collect()
    }

    #[test]
    fn test_initial_import_order() {
        let env = environment(
            InMemoryLoader::new()
                .with_document("mem:a", &[("k", "a")])
                .with_document("mem:b", &[("k", "b")])
                .with_document("mem:c", &[("k", "c")]),
            &[
                ("config.location", "mem:a"),
                ("config.additional-location", "mem:b"),
                ("config.import", "mem:c"),
            ],
            &[],
        )
        .process_and_apply()
        .unwrap();

        assert_eq!(names(&env), ["test", "mem:c #1", "mem:b #1", "mem:a #1"]);
        assert_eq!(env.get_string("k").unwrap().as_deref(), Some("c"));
    }

    #[test]
    fn test_profile_specific_variant_wins() {
        let env = environment(
            InMemoryLoader::new()
                .with_document("mem:app", &[("k", "plain"), ("profiles.active", "dev")])
                .with_document("mem:app-dev", &[("k", "dev")]),
            &[("config.location", "mem:app")],
            &[],
        )
        .process_and_apply()
        .unwrap();

        assert_eq!(env.active_profiles(), ["dev"]);
        assert_eq!(names(&env), ["test", "mem:app-dev #1", "mem:app #1"]);
        assert_eq!(env.get_string("k").unwrap().as_deref(), Some("dev"));
    }

    #[test]
    fn test_included_profile_loads_its_variant() {
        let env = environment(
            InMemoryLoader::new()
                .with_document("mem:app", &[("profiles.include", "extra")])
                .with_document("mem:app-extra", &[("k", "extra")]),
            &[("config.location", "mem:app")],
            &["cli"],
        )
        .process_and_apply()
        .unwrap();

        assert_eq!(env.active_profiles(), ["cli", "extra"]);
        assert_eq!(env.get_string("k").unwrap().as_deref(), Some("extra"));
    }

    #[test]
    fn test_self_activation_rejected() {
        let result = environment(
            InMemoryLoader::new().with_document(
                "mem:app",
                &[
                    ("config.activate.on-profile", "prod"),
                    ("profiles.active", "prod"),
                ],
            ),
            &[("config.location", "mem:app")],
            &[],
        )
        .process_and_apply();

        assert!(matches!(
            result,
            Err(ConfigDataError::InactiveConfigDataAccess { property, .. }) if property == "profiles.active"
        ));
    }

    #[test]
    fn test_invalid_and_deprecated_properties() {
        let result = environment(
            InMemoryLoader::new().with_document("mem:app", &[("profiles", "dev")]),
            &[("config.location", "mem:app")],
            &[],
        )
        .process_and_apply();
        assert!(matches!(
            result,
            Err(ConfigDataError::InvalidConfigDataProperty { replacement: Some(r), .. })
                if r == "config.activate.on-profile"
        ));

        let result = environment(
            InMemoryLoader::new()
                .with_document("mem:app", &[("profiles.active", "dev")])
                .with_document("mem:app-dev", &[("profiles.include", "more")]),
            &[("config.location", "mem:app")],
            &[],
        )
        .process_and_apply();
        assert!(matches!(
            result,
            Err(ConfigDataError::InvalidConfigDataProperty { profile_specific: true, .. })
        ));

        let deferred = Arc::new(DeferredLog::new());
        let loader = InMemoryLoader::new()
            .with_document("mem:app", &[("config.use-legacy-processing", "true")]);
        let mut source = PropertySource::new("test");
        source.insert("config.location", "mem:app");
        ConfigDataEnvironment::new(
            Log::new(deferred.clone()),
            vec![Arc::new(source)],
            None,
            LocationResolvers::new(vec![Box::new(loader.resolver())]),
            ConfigDataLoaders::new(vec![Box::new(loader)]),
            Vec::new(),
        )
        .unwrap()
        .process_and_apply()
        .unwrap();
        assert!(deferred.contains("config.use-legacy-processing"));
    }

    #[test]
    fn test_mandatory_import_from_gated_document() {
        let loader = InMemoryLoader::new()
            .with_document("mem:app", &[("k", "base")])
            .with_document(
                "mem:app",
                &[("config.activate.on-profile", "prod"), ("config.import", "mem:gone")],
            );

        let env = environment(loader.clone(), &[("config.location", "mem:app")], &[])
            .process_and_apply()
            .unwrap();
        assert_eq!(env.get_string("k").unwrap().as_deref(), Some("base"));

        let result = environment(loader, &[("config.location", "mem:app")], &["prod"])
            .process_and_apply();
        assert!(matches!(result, Err(ConfigDataError::LocationNotFound { .. })));
    }

    #[test]
    fn test_initial_contributor_tree() {
        let env = environment(
            InMemoryLoader::new(),
            &[("config.location", "mem:a, mem:b"), ("config.import", "mem:c")],
            &[],
        );

        let root = env.contributors().root();
        assert_eq!(root.kind(), Kind::Root);
        let children: Vec<(Kind, Option<&str>)> = root
            .children(ImportPhase::BeforeProfileActivation)
            .iter()
            .map(|c| (c.kind(), c.location().map(Location::value)))
            .collect();
        assert_eq!(
            children,
            [
                (Kind::Existing, None),
                (Kind::InitialImport, Some("mem:c")),
                (Kind::InitialImport, Some("mem:b")),
                (Kind::InitialImport, Some("mem:a")),
            ]
        );
    }

    #[test]
    fn test_loader_declared_imports_follow_first_document() {
        let loader = InMemoryLoader::new()
            .with_document("mem:app", &[("k", "first")])
            .with_document("mem:app", &[("other", "second")])
            .with_imports("mem:app", &["mem:extra"])
            .with_document("mem:extra", &[("k", "extra")]);
        let counts = loader.load_counts();

        let env = environment(loader, &[("config.location", "mem:app")], &[])
            .process_and_apply()
            .unwrap();

        assert_eq!(
            names(&env),
            ["test", "mem:app #2", "mem:extra #1", "mem:app #1"]
        );
        assert_eq!(env.get_string("k").unwrap().as_deref(), Some("extra"));
        assert_eq!(counts.count("mem:extra"), 1);
    }

    #[test]
    fn test_ignore_imports_drops_all_imports() {
        let loader = InMemoryLoader::new()
            .with_document("mem:app", &[("k", "app"), ("config.import", "mem:extra")])
            .with_options("mem:app", &[ConfigDataOption::IgnoreImports])
            .with_imports("mem:app", &["mem:declared"])
            .with_document("mem:extra", &[("k", "extra")])
            .with_document("mem:declared", &[("k", "declared")]);
        let counts = loader.load_counts();

        let env = environment(loader, &[("config.location", "mem:app")], &[])
            .process_and_apply()
            .unwrap();

        assert_eq!(names(&env), ["test", "mem:app #1"]);
        assert_eq!(env.get_string("k").unwrap().as_deref(), Some("app"));
        assert_eq!(counts.count("mem:extra"), 0);
        assert_eq!(counts.count("mem:declared"), 0);
    }

    #[test]
    fn test_ignore_profiles_hides_profile_properties() {
        let loader = InMemoryLoader::new()
            .with_document("mem:app", &[("profiles.active", "dev")])
            .with_document("mem:app-dev", &[("k", "dev"), ("profiles.include", "more")])
            .with_options("mem:app-dev", &[ConfigDataOption::IgnoreProfiles])
            .with_document(
                "mem:lib",
                &[
                    ("profiles.active", "lib"),
                    ("profiles.include", "lib-extra"),
                    ("profiles.group.dev", "lib"),
                ],
            )
            .with_options("mem:lib", &[ConfigDataOption::IgnoreProfiles]);

        let env = environment(
            loader,
            &[("config.location", "mem:app"), ("config.import", "mem:lib")],
            &[],
        )
        .process_and_apply()
        .unwrap();

        assert_eq!(env.active_profiles(), ["dev"]);
        assert_eq!(env.get_string("k").unwrap().as_deref(), Some("dev"));
        assert!(names(&env).contains(&"mem:lib #1"));
        assert!(names(&env).contains(&"mem:app-dev #1"));
    }

    #[derive(Debug, Default)]
    struct Recorder {
        added: Mutex<Vec<String>>,
        profiles: Mutex<Vec<String>>,
    }

    impl EnvironmentUpdateListener for Recorder {
        fn on_property_source_added(
            &self,
            source: &PropertySource,
            _location: Option<&Location>,
            _resource: Option<&Resource>,
        ) {
            self.added.lock().unwrap().push(source.name().to_string());
        }

        fn on_set_profiles(&self, profiles: &Profiles) {
            *self.profiles.lock().unwrap() = profiles.active().to_vec();
        }
    }

    #[test]
    fn test_listener_and_bootstrap_registry() {
        let recorder = Arc::new(Recorder::default());
        let registry = Arc::new(BootstrapRegistry::new());
        environment(
            InMemoryLoader::new().with_document("mem:app", &[("k", "v")]),
            &[("config.location", "mem:app")],
            &["dev"],
        )
        .with_listener(recorder.clone())
        .with_bootstrap_registry(registry.clone())
        .process_and_apply()
        .unwrap();

        assert_eq!(*recorder.added.lock().unwrap(), ["mem:app #1"]);
        assert_eq!(*recorder.profiles.lock().unwrap(), ["dev"]);
        assert_eq!(registry.generation(), 4);
        let binder = registry.binder().unwrap();
        assert_eq!(binder.bind_string("k").unwrap().as_deref(), Some("v"));
    }

    #[derive(Debug, Deserialize, PartialEq)]
    struct Server {
        host: String,
        port: u16,
        url: String,
    }

    #[derive(Debug, Deserialize, PartialEq)]
    struct AppConfig {
        server: Server,
    }

    #[test]
    fn test_deserialize_merges_by_precedence() {
        let env = Environment {
            property_sources: vec![
                Arc::new(
                    PropertySource::new("high")
                        .with_property("server.port", 9090)
                        .with_property("server.url", "http://${server.host}:${server.port}"),
                ),
                Arc::new(
                    PropertySource::new("low")
                        .with_property("server.host", "localhost")
                        .with_property("server.port", 80),
                ),
            ],
            active_profiles: Vec::new(),
            default_profiles: vec!["default".to_string()],
        };

        let config: AppConfig = env.deserialize().unwrap();
        assert_eq!(
            config.server,
            Server {
                host: "localhost".to_string(),
                port: 9090,
                url: "http://localhost:9090".to_string(),
            }
        );
        assert!(env.accepts_profiles("default").unwrap());
        assert!(!env.accepts_profiles("prod").unwrap());
    }
}
