//! In-memory resolver and loader for unit tests.

use std::collections::{BTreeMap, HashMap};
use std::sync::{Arc, Mutex, PoisonError};

use toml::Value;

use super::loader::{ConfigData, ConfigDataLoader, ConfigDataOption, Options};
use super::location::Location;
use super::profiles::Profiles;
use super::resolver::{LocationResolver, Resource, ResolverContext};
use super::source::{coerce_value, PropertySource};
use super::ConfigDataError;

const SCHEME: &str = "mem:";

type Documents = BTreeMap<String, Vec<Vec<(String, Value)>>>;

/// Counts how often each resource id was loaded.
#[derive(Debug, Clone, Default)]
pub(crate) struct LoadCounts(Arc<Mutex<HashMap<String, usize>>>);

impl LoadCounts {
    pub(crate) fn count(&self, id: &str) -> usize {
        self.0
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .get(id)
            .copied()
            .unwrap_or(0)
    }

    fn record(&self, id: &str) {
        *self
            .0
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .entry(id.to_string())
            .or_default() += 1;
    }
}

/// Serves `mem:` resources from documents registered up front.
///
/// A resource registered as `mem:app-dev` is the `dev` variant of
/// `mem:app`.
#[derive(Debug, Clone, Default)]
pub(crate) struct InMemoryLoader {
    documents: Arc<Documents>,
    options: BTreeMap<String, Vec<ConfigDataOption>>,
    imports: BTreeMap<String, Vec<Location>>,
    counts: LoadCounts,
}

impl InMemoryLoader {
    pub(crate) fn new() -> Self {
        Self::default()
    }

    /// Adds one document to resource `id`; values are coerced like
    /// `.properties` values. Empty documents are dropped on load.
    pub(crate) fn with_document(mut self, id: &str, pairs: &[(&str, &str)]) -> Self {
        let document = pairs
            .iter()
            .map(|(k, v)| ((*k).to_string(), coerce_value(v)))
            .collect();
        Arc::make_mut(&mut self.documents)
            .entry(id.to_string())
            .or_default()
            .push(document);
        self
    }

    /// Options reported for resource `id`, on top of `ProfileSpecific` for
    /// variants.
    pub(crate) fn with_options(mut self, id: &str, options: &[ConfigDataOption]) -> Self {
        self.options
            .entry(id.to_string())
            .or_default()
            .extend_from_slice(options);
        self
    }

    /// Imports declared by the loader itself for resource `id`.
    pub(crate) fn with_imports(mut self, id: &str, locations: &[&str]) -> Self {
        self.imports
            .entry(id.to_string())
            .or_default()
            .extend(locations.iter().filter_map(|l| Location::parse(l)));
        self
    }

    pub(crate) fn load_counts(&self) -> LoadCounts {
        self.counts.clone()
    }

    pub(crate) fn resolver(&self) -> InMemoryResolver {
        InMemoryResolver {
            documents: self.documents.clone(),
        }
    }
}

impl ConfigDataLoader for InMemoryLoader {
    fn is_loadable(&self, resource: &Resource) -> bool {
        resource.id().starts_with(SCHEME)
    }

    fn load(&self, resource: &Resource) -> Result<ConfigData, ConfigDataError> {
        let documents = self
            .documents
            .get(resource.id())
            .ok_or_else(|| ConfigDataError::ResourceNotFound(resource.id().to_string()))?;
        self.counts.record(resource.id());

        let sources = documents
            .iter()
            .enumerate()
            .map(|(index, pairs)| {
                let mut source = PropertySource::new(format!("{} #{}", resource.id(), index + 1));
                for (key, value) in pairs {
                    source.insert(key.clone(), value.clone());
                }
                source
            })
            .filter(|source| !source.is_empty())
            .collect();
        let registered = self.options.get(resource.id()).into_iter().flatten();
        let mut options = Options::of(registered.copied());
        if resource.profile().is_some() {
            options = options.with(ConfigDataOption::ProfileSpecific);
        }
        let imports = self.imports.get(resource.id()).cloned().unwrap_or_default();
        Ok(ConfigData::new(sources, options).with_imports(imports))
    }
}

#[derive(Debug, Clone)]
pub(crate) struct InMemoryResolver {
    documents: Arc<Documents>,
}

impl LocationResolver for InMemoryResolver {
    fn is_resolvable(&self, _context: &ResolverContext, location: &Location) -> bool {
        location.has_prefix(SCHEME)
    }

    fn resolve(
        &self,
        _context: &ResolverContext,
        location: &Location,
    ) -> Result<Vec<Resource>, ConfigDataError> {
        Ok(vec![Resource::named(location.value(), None)])
    }

    fn resolve_profile_specific(
        &self,
        _context: &ResolverContext,
        location: &Location,
        profiles: &Profiles,
    ) -> Result<Vec<Resource>, ConfigDataError> {
        Ok(profiles
            .accepted()
            .iter()
            .map(|profile| (format!("{}-{profile}", location.value()), profile))
            .filter(|(id, _)| self.documents.contains_key(id))
            .map(|(id, profile)| Resource::named(id, Some(profile.as_str())))
            .collect())
    }
}
