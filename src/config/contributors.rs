//! Snapshots of the whole config data tree.

use std::sync::Arc;

use super::activation::{ActivationContext, ImportPhase};
use super::binder::{BindSource, Binder};
use super::contributor::{Contributor, Kind};
use super::importer::Importer;
use super::loader::{ConfigData, ConfigDataOption};
use super::log::Log;
use super::profiles::INCLUDE_PROFILES;
use super::resolver::{ResolutionResult, ResolverContext};
use super::ConfigDataError;

/// An immutable snapshot of the contributor tree.
///
/// Iteration is children first: a contributor's `AfterProfileActivation`
/// children, then its `BeforeProfileActivation` children, then the
/// contributor itself. Earlier contributors take precedence over later ones.
#[derive(Debug, Clone)]
pub struct Contributors {
    log: Log,
    root: Arc<Contributor>,
}

impl Contributors {
    pub(crate) fn new(log: Log, children: Vec<Arc<Contributor>>) -> Self {
        Self {
            log,
            root: Arc::new(Contributor::root(children)),
        }
    }

    pub fn root(&self) -> &Arc<Contributor> {
        &self.root
    }

    /// Every contributor in precedence order.
    pub fn iter(&self) -> impl Iterator<Item = Arc<Contributor>> {
        self.root.walk().into_iter()
    }

    fn with_replacement(&self, existing: &Arc<Contributor>, replacement: Contributor) -> Self {
        Self {
            log: self.log.clone(),
            root: self.root.with_replacement(existing, &Arc::new(replacement)),
        }
    }

    /// Binds and imports until no contributor has work left for the import
    /// phase of `activation`.
    ///
    /// Each step handles the first contributor, in iteration order, that is
    /// either unbound or active with imports it has not processed in this
    /// phase yet.
    pub(crate) fn with_processed_imports(
        &self,
        importer: &mut Importer<'_>,
        activation: Option<&ActivationContext>,
    ) -> Result<Self, ConfigDataError> {
        let phase = ImportPhase::of(activation);
        let mut result = self.clone();
        let mut processed = 0;
        loop {
            let next = result.iter().find(|contributor| {
                contributor.kind().is_unbound()
                    || (contributor.is_active(activation)
                        && contributor.has_unprocessed_imports(phase))
            });
            let Some(contributor) = next else {
                self.log.trace(format_args!(
                    "Processed imports for {processed} contributors in phase {phase:?}"
                ));
                return Ok(result);
            };

            if contributor.kind().is_unbound() {
                let scope = result.placeholder_scope(activation, Some(&contributor));
                let bound = contributor.with_bound_properties(scope)?;
                result = result.with_replacement(&contributor, bound);
                continue;
            }

            let context = ResolverContext::new(
                result.binder(activation, |_| true, false),
                contributor.resource().cloned(),
            );
            let imported =
                importer.resolve_and_load(activation, &context, contributor.imports())?;
            self.log.trace(format_args!(
                "Imported {} resource(s) from [{}]",
                imported.len(),
                contributor
                    .imports()
                    .iter()
                    .map(ToString::to_string)
                    .collect::<Vec<_>>()
                    .join(", ")
            ));
            let updated = contributor.with_children(phase, as_contributors(imported));
            result = result.with_replacement(&contributor, updated);
            processed += 1;
        }
    }

    /// Every property source in the tree, tagged with its activity.
    ///
    /// `current` always counts as active. Unbound contributors are judged by
    /// their raw activation properties.
    pub(crate) fn placeholder_scope(
        &self,
        activation: Option<&ActivationContext>,
        current: Option<&Arc<Contributor>>,
    ) -> Arc<[BindSource]> {
        self.iter()
            .filter_map(|contributor| {
                let active = current.is_some_and(|c| Arc::ptr_eq(c, &contributor))
                    || contributor.is_provisionally_active(activation);
                contributor.bind_source(active)
            })
            .collect::<Vec<_>>()
            .into()
    }

    /// A binder over the contributors accepted by `filter`.
    ///
    /// With `fail_on_inactive` set, reading a key that an inactive contributor
    /// holds is an error. Otherwise inactive contributors are invisible.
    pub fn binder(
        &self,
        activation: Option<&ActivationContext>,
        filter: impl Fn(&Contributor) -> bool,
        fail_on_inactive: bool,
    ) -> Binder {
        let sources = self
            .iter()
            .filter(|contributor| filter(&**contributor))
            .filter_map(|contributor| contributor.bind_source(contributor.is_active(activation)))
            .collect();
        Binder::scoped(
            sources,
            self.placeholder_scope(activation, None),
            fail_on_inactive,
        )
    }

    /// Profiles named by `profiles.include` across all contributors, in
    /// iteration order.
    ///
    /// An include declared by an inactive contributor is an error.
    pub(crate) fn included_profiles(
        &self,
        activation: Option<&ActivationContext>,
    ) -> Result<Vec<String>, ConfigDataError> {
        let scope = self.placeholder_scope(activation, None);
        let mut included = Vec::new();
        for contributor in self.iter() {
            if contributor.has_option(ConfigDataOption::IgnoreProfiles) {
                continue;
            }
            let Some(own) = contributor.bind_source(true) else {
                continue;
            };
            let binder = Binder::scoped(vec![own.clone()], scope.clone(), true);
            let Some(profiles) = binder.bind_string_list(INCLUDE_PROFILES)? else {
                continue;
            };
            if !contributor.is_active(activation) {
                return Err(ConfigDataError::InactiveConfigDataAccess {
                    property: INCLUDE_PROFILES.to_string(),
                    source_name: own.source.name().to_string(),
                    location: own.location,
                });
            }
            included.extend(profiles);
        }
        Ok(included)
    }

    /// Bound imports in precedence order.
    pub fn bound_imports(&self) -> impl Iterator<Item = Arc<Contributor>> {
        self.iter()
            .filter(|contributor| contributor.kind() == Kind::BoundImport)
    }
}

/// Turns imported data into child contributors.
///
/// The importer already lists results from highest precedence to lowest;
/// documents inside one resource are reversed so that later documents win.
fn as_contributors(imported: Vec<(ResolutionResult, ConfigData)>) -> Vec<Arc<Contributor>> {
    let mut contributors = Vec::new();
    for (result, data) in &imported {
        let count = data.property_sources().len();
        if count == 0 {
            contributors.push(Arc::new(Contributor::empty_location(result, data)));
            continue;
        }
        for index in (0..count).rev() {
            contributors.push(Arc::new(Contributor::unbound_import(result, data, index)));
        }
    }
    contributors
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::importer::NotFoundAction;
    use crate::config::loader::ConfigDataLoaders;
    use crate::config::location::Location;
    use crate::config::profiles::Profiles;
    use crate::config::resolver::LocationResolvers;
    use crate::config::testing::InMemoryLoader;

    struct Fixture {
        resolvers: LocationResolvers,
        loaders: ConfigDataLoaders,
    }

    impl Fixture {
        fn new(loader: InMemoryLoader) -> Self {
            Self {
                resolvers: LocationResolvers::new(vec![Box::new(loader.resolver())]),
                loaders: ConfigDataLoaders::new(vec![Box::new(loader)]),
            }
        }

        fn importer(&self) -> Importer<'_> {
            Importer::new(Log::default(), NotFoundAction::Fail, &self.resolvers, &self.loaders)
        }
    }

    fn initial(locations: &[&str]) -> Contributors {
        let children = locations
            .iter()
            .rev()
            .filter_map(|l| Location::parse(l))
            .map(|l| Arc::new(Contributor::initial_import(l)))
            .collect();
        Contributors::new(Log::default(), children)
    }

    fn string(binder: &Binder, key: &str) -> Option<String> {
        binder.bind_string(key).unwrap()
    }

    #[test]
    fn test_import_overrides_importer() {
        let fixture = Fixture::new(
            InMemoryLoader::new()
                .with_document("mem:app", &[("greeting", "hi"), ("config.import", "mem:extra")])
                .with_document("mem:extra", &[("greeting", "hello")]),
        );
        let mut importer = fixture.importer();

        let contributors = initial(&["mem:app"])
            .with_processed_imports(&mut importer, None)
            .unwrap();

        let binder = contributors.binder(None, |_| true, false);
        assert_eq!(string(&binder, "greeting").as_deref(), Some("hello"));
        assert_eq!(binder.source_names(), ["mem:extra #1", "mem:app #1"]);
        assert!(contributors.iter().all(|c| !c.kind().is_unbound()));
    }

    #[test]
    fn test_later_locations_and_documents_win() {
        let fixture = Fixture::new(
            InMemoryLoader::new()
                .with_document("mem:a", &[("name", "a")])
                .with_document("mem:b", &[("name", "b1")])
                .with_document("mem:b", &[("name", "b2")]),
        );
        let mut importer = fixture.importer();

        let contributors = initial(&["mem:a", "mem:b"])
            .with_processed_imports(&mut importer, None)
            .unwrap();

        let binder = contributors.binder(None, |_| true, false);
        assert_eq!(binder.source_names(), ["mem:b #2", "mem:b #1", "mem:a #1"]);
        assert_eq!(string(&binder, "name").as_deref(), Some("b2"));
    }

    #[test]
    fn test_gated_import_waits_for_profiles() {
        let fixture = Fixture::new(
            InMemoryLoader::new()
                .with_document("mem:app", &[("name", "base")])
                .with_document(
                    "mem:app",
                    &[
                        ("config.activate.on-profile", "dev"),
                        ("config.import", "mem:dev-extra"),
                    ],
                )
                .with_document("mem:dev-extra", &[("name", "dev")]),
        );
        let mut importer = fixture.importer();

        let first = initial(&["mem:app"])
            .with_processed_imports(&mut importer, None)
            .unwrap();
        let binder = first.binder(None, |_| true, false);
        assert_eq!(string(&binder, "name").as_deref(), Some("base"));

        let activation = ActivationContext::initial(Profiles::new(["dev"], ["default"]));
        let second = first
            .with_processed_imports(&mut importer, Some(&activation))
            .unwrap();
        let binder = second.binder(Some(&activation), |_| true, false);
        assert_eq!(string(&binder, "name").as_deref(), Some("dev"));
    }

    #[test]
    fn test_fail_on_inactive_binder() {
        let fixture = Fixture::new(InMemoryLoader::new().with_document(
            "mem:app",
            &[
                ("config.activate.on-profile", "prod"),
                ("profiles.active", "prod"),
            ],
        ));
        let mut importer = fixture.importer();
        let contributors = initial(&["mem:app"])
            .with_processed_imports(&mut importer, None)
            .unwrap();

        let binder = contributors.binder(None, |_| true, true);
        assert!(matches!(
            binder.get("profiles.active"),
            Err(ConfigDataError::InactiveConfigDataAccess { .. })
        ));
    }

    #[test]
    fn test_included_profiles() {
        let fixture = Fixture::new(
            InMemoryLoader::new()
                .with_document("mem:app", &[("profiles.include", "a,b")])
                .with_document(
                    "mem:app",
                    &[("config.activate.on-profile", "x"), ("profiles.include", "c")],
                ),
        );
        let mut importer = fixture.importer();
        let contributors = initial(&["mem:app"])
            .with_processed_imports(&mut importer, None)
            .unwrap();

        let activation = ActivationContext::initial(Profiles::new(["x"], ["default"]));
        assert_eq!(
            contributors.included_profiles(Some(&activation)).unwrap(),
            ["c", "a", "b"]
        );

        let activation = ActivationContext::initial(Profiles::new(["y"], ["default"]));
        assert!(matches!(
            contributors.included_profiles(Some(&activation)),
            Err(ConfigDataError::InactiveConfigDataAccess { property, .. }) if property == "profiles.include"
        ));
    }

    #[test]
    fn test_empty_data_becomes_empty_location() {
        let fixture = Fixture::new(InMemoryLoader::new().with_document("mem:empty", &[]));
        let mut importer = fixture.importer();
        let contributors = initial(&["mem:empty"])
            .with_processed_imports(&mut importer, None)
            .unwrap();

        let kinds: Vec<Kind> = contributors.iter().map(|c| c.kind()).collect();
        assert_eq!(kinds, [Kind::EmptyLocation, Kind::InitialImport, Kind::Root]);
    }
}
