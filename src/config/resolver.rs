//! Location resolution: turning a [`Location`] into concrete [`Resource`]s.

use std::fmt;
use std::hash::{Hash, Hasher};
use std::path::{Component, Path, PathBuf};

use super::binder::Binder;
use super::location::Location;
use super::profiles::Profiles;
use super::ConfigDataError;

const CLASSPATH_PREFIX: &str = "classpath:";
const FILE_PREFIX: &str = "file:";
const WILDCARD_SUFFIX: &str = "*/";
const DEFAULT_CONFIG_NAME: &str = "application";
pub(crate) const CONFIG_NAME_PROPERTY: &str = "config.name";

/// A concrete piece of config data that a location resolved to.
///
/// Resources are compared by `id`, which is how the importer recognises data
/// that has already been loaded. The profile is not part of the identity: a
/// file reached once as a plain import and once as a profile variant is the
/// same resource.
#[derive(Debug, Clone)]
pub struct Resource {
    id: String,
    path: Option<PathBuf>,
    profile: Option<String>,
    empty_directory: bool,
}

impl Resource {
    /// A filesystem resource. The path is lexically normalized.
    pub fn file(path: impl AsRef<Path>, profile: Option<&str>) -> Self {
        let path = normalize(path.as_ref());
        Self {
            id: path.display().to_string(),
            path: Some(path),
            profile: profile.map(str::to_string),
            empty_directory: false,
        }
    }

    /// An existing directory that holds no config files.
    pub fn empty_directory(path: impl AsRef<Path>) -> Self {
        let path = normalize(path.as_ref());
        Self {
            id: format!("{}/", path.display()),
            path: Some(path),
            profile: None,
            empty_directory: true,
        }
    }

    /// A resource that is not backed by the filesystem.
    pub fn named(id: impl Into<String>, profile: Option<&str>) -> Self {
        Self {
            id: id.into(),
            path: None,
            profile: profile.map(str::to_string),
            empty_directory: false,
        }
    }

    pub fn id(&self) -> &str {
        &self.id
    }

    pub fn path(&self) -> Option<&Path> {
        self.path.as_deref()
    }

    /// The profile this resource is specific to, if any.
    pub fn profile(&self) -> Option<&str> {
        self.profile.as_deref()
    }

    pub fn is_empty_directory(&self) -> bool {
        self.empty_directory
    }
}

impl PartialEq for Resource {
    fn eq(&self, other: &Self) -> bool {
        self.id == other.id && self.empty_directory == other.empty_directory
    }
}

impl Eq for Resource {}

impl Hash for Resource {
    fn hash<H: Hasher>(&self, state: &mut H) {
        self.id.hash(state);
        self.empty_directory.hash(state);
    }
}

impl fmt::Display for Resource {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.id)
    }
}

/// What a resolver may consult while resolving a location.
#[derive(Debug, Clone)]
pub struct ResolverContext {
    binder: Binder,
    parent: Option<Resource>,
}

impl ResolverContext {
    pub fn new(binder: Binder, parent: Option<Resource>) -> Self {
        Self { binder, parent }
    }

    /// Binder over the contributors known at the time of resolution.
    pub fn binder(&self) -> &Binder {
        &self.binder
    }

    /// The resource that declared the import being resolved.
    pub fn parent(&self) -> Option<&Resource> {
        self.parent.as_ref()
    }
}

/// Resolves locations for the schemes it claims.
///
/// Resolvers are registered with the host at startup and tried in order; the
/// first one whose [`is_resolvable`](Self::is_resolvable) returns `true`
/// handles the location. Implementations must not keep per-run state.
pub trait LocationResolver: Send + Sync + fmt::Debug {
    fn is_resolvable(&self, context: &ResolverContext, location: &Location) -> bool;

    fn resolve(
        &self,
        context: &ResolverContext,
        location: &Location,
    ) -> Result<Vec<Resource>, ConfigDataError>;

    /// Resolves profile-specific variants of `location`.
    fn resolve_profile_specific(
        &self,
        _context: &ResolverContext,
        _location: &Location,
        _profiles: &Profiles,
    ) -> Result<Vec<Resource>, ConfigDataError> {
        Ok(Vec::new())
    }
}

/// A resource together with the location it was resolved from.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ResolutionResult {
    pub location: Location,
    pub resource: Resource,
    pub profile_specific: bool,
}

/// The ordered resolver registry.
#[derive(Debug, Default)]
pub struct LocationResolvers {
    resolvers: Vec<Box<dyn LocationResolver>>,
}

impl LocationResolvers {
    pub fn new(resolvers: Vec<Box<dyn LocationResolver>>) -> Self {
        Self { resolvers }
    }

    /// Resolves `location` with the first resolver that claims it.
    ///
    /// Profile-specific variants are appended after the plain resources when
    /// `profiles` is known.
    pub fn resolve(
        &self,
        context: &ResolverContext,
        location: &Location,
        profiles: Option<&Profiles>,
    ) -> Result<Vec<ResolutionResult>, ConfigDataError> {
        let resolver = self
            .resolvers
            .iter()
            .find(|r| r.is_resolvable(context, location))
            .ok_or_else(|| ConfigDataError::UnsupportedLocation(location.clone()))?;

        let as_results = |resources: Vec<Resource>, profile_specific: bool| {
            resources.into_iter().map(move |resource| ResolutionResult {
                location: location.clone(),
                resource,
                profile_specific,
            })
        };

        let mut results: Vec<ResolutionResult> =
            as_results(resolver.resolve(context, location)?, false).collect();
        if let Some(profiles) = profiles {
            results.extend(as_results(
                resolver.resolve_profile_specific(context, location, profiles)?,
                true,
            ));
        }
        Ok(results)
    }
}

/// Resolves `classpath:`, `file:` and prefix-less locations.
///
/// * `classpath:` paths resolve against the configured classpath roots; the
///   first root that holds the path wins.
/// * `file:` paths resolve against the working directory.
/// * Prefix-less paths resolve against the importing resource's directory
///   when there is one, otherwise like `file:`.
///
/// A location ending in `/` is a directory and expands to
/// `{name}.{ext}` for every config name and known extension. A trailing `*/`
/// expands to every immediate, non-hidden subdirectory in name order.
#[derive(Debug, Clone)]
pub struct StandardLocationResolver {
    config_names: Vec<String>,
    extensions: Vec<String>,
    classpath: Vec<PathBuf>,
    working_dir: PathBuf,
}

impl StandardLocationResolver {
    /// Creates a resolver; `config.name` is bound from `binder`.
    pub fn new(
        binder: &Binder,
        extensions: Vec<String>,
        classpath: Vec<PathBuf>,
        working_dir: PathBuf,
    ) -> Result<Self, ConfigDataError> {
        let config_names = binder
            .bind_string_list(CONFIG_NAME_PROPERTY)?
            .filter(|names| !names.is_empty())
            .unwrap_or_else(|| vec![DEFAULT_CONFIG_NAME.to_string()]);
        for name in &config_names {
            if name.contains('*') || name.contains('/') {
                return Err(ConfigDataError::Bind {
                    property: CONFIG_NAME_PROPERTY.to_string(),
                    reason: format!("config name '{name}' must not contain '*' or '/'"),
                });
            }
        }
        Ok(Self {
            config_names,
            extensions,
            classpath,
            working_dir,
        })
    }

    fn base_path(&self, context: &ResolverContext, location: &Location) -> PathBuf {
        if location.has_prefix(CLASSPATH_PREFIX) {
            let relative = location
                .non_prefixed_value(CLASSPATH_PREFIX)
                .trim_start_matches('/');
            let root = self
                .classpath
                .iter()
                .find(|root| root.join(relative).exists())
                .or_else(|| self.classpath.first())
                .cloned()
                .unwrap_or_else(|| self.working_dir.clone());
            return root.join(relative);
        }

        let (value, relative_to_parent) = match location.value().strip_prefix(FILE_PREFIX) {
            Some(rest) => (rest, false),
            None => (location.value(), true),
        };
        let path = Path::new(value);
        if path.is_absolute() {
            return path.to_path_buf();
        }
        let parent_dir = context
            .parent()
            .filter(|_| relative_to_parent)
            .and_then(Resource::path)
            .and_then(Path::parent);
        match parent_dir {
            Some(dir) => dir.join(path),
            None => self.working_dir.join(path),
        }
    }

    fn resolve_references(
        &self,
        context: &ResolverContext,
        location: &Location,
        profile: Option<&str>,
    ) -> Result<Vec<Resource>, ConfigDataError> {
        let value = location.value();
        if value.ends_with('/') {
            self.resolve_directory(context, location, profile)
        } else {
            self.resolve_file(context, location, profile)
        }
    }

    fn resolve_directory(
        &self,
        context: &ResolverContext,
        location: &Location,
        profile: Option<&str>,
    ) -> Result<Vec<Resource>, ConfigDataError> {
        let base = self.base_path(context, location);
        let pattern = location.value().ends_with(WILDCARD_SUFFIX);
        let directories = if pattern {
            let parent = base.parent().map(Path::to_path_buf).unwrap_or_default();
            if !parent.is_dir() {
                return self.missing(location, profile);
            }
            subdirectories(&parent)?
        } else {
            if !base.is_dir() {
                return self.missing(location, profile);
            }
            vec![base]
        };

        let mut resources: Vec<Resource> = directories
            .iter()
            .flat_map(|directory| self.candidates_in(directory, profile))
            .collect();
        if resources.is_empty() && profile.is_none() && !location.is_optional() {
            if directories.is_empty() {
                return self.missing(location, profile);
            }
            resources.extend(directories.iter().map(Resource::empty_directory));
        }
        Ok(resources)
    }

    /// Existing `{name}[-{profile}].{ext}` files in `directory`.
    ///
    /// Extensions are listed in reverse registration order; the importer loads
    /// in reverse, so earlier-registered formats end up with higher precedence.
    fn candidates_in(&self, directory: &Path, profile: Option<&str>) -> Vec<Resource> {
        let mut resources = Vec::new();
        for name in &self.config_names {
            let stem = match profile {
                Some(profile) => format!("{name}-{profile}"),
                None => name.clone(),
            };
            for extension in self.extensions.iter().rev() {
                let path = directory.join(format!("{stem}.{extension}"));
                if path.is_file() {
                    resources.push(Resource::file(path, profile));
                }
            }
        }
        resources
    }

    fn resolve_file(
        &self,
        context: &ResolverContext,
        location: &Location,
        profile: Option<&str>,
    ) -> Result<Vec<Resource>, ConfigDataError> {
        let path = self.base_path(context, location);
        let extension = path
            .extension()
            .and_then(|e| e.to_str())
            .filter(|e| self.extensions.iter().any(|known| known == e))
            .ok_or_else(|| ConfigDataError::UnknownExtension(location.clone()))?;

        match profile {
            None => Ok(vec![Resource::file(path, None)]),
            Some(profile) => {
                let stem = path.file_stem().and_then(|s| s.to_str()).unwrap_or_default();
                let variant = path.with_file_name(format!("{stem}-{profile}.{extension}"));
                Ok(if variant.is_file() {
                    vec![Resource::file(variant, Some(profile))]
                } else {
                    Vec::new()
                })
            }
        }
    }

    fn missing(
        &self,
        location: &Location,
        profile: Option<&str>,
    ) -> Result<Vec<Resource>, ConfigDataError> {
        if location.is_optional() || profile.is_some() {
            Ok(Vec::new())
        } else {
            Err(ConfigDataError::LocationNotFound {
                location: location.clone(),
                resource: None,
            })
        }
    }
}

impl LocationResolver for StandardLocationResolver {
    fn is_resolvable(&self, _context: &ResolverContext, location: &Location) -> bool {
        match location.scheme() {
            None => true,
            Some(scheme) => scheme == CLASSPATH_PREFIX || scheme == FILE_PREFIX,
        }
    }

    fn resolve(
        &self,
        context: &ResolverContext,
        location: &Location,
    ) -> Result<Vec<Resource>, ConfigDataError> {
        let mut resources = Vec::new();
        for location in location.split() {
            resources.extend(self.resolve_references(context, &location, None)?);
        }
        Ok(resources)
    }

    fn resolve_profile_specific(
        &self,
        context: &ResolverContext,
        location: &Location,
        profiles: &Profiles,
    ) -> Result<Vec<Resource>, ConfigDataError> {
        let mut resources = Vec::new();
        for location in location.split() {
            for profile in profiles.accepted() {
                resources.extend(self.resolve_references(context, &location, Some(profile))?);
            }
        }
        Ok(resources)
    }
}

fn subdirectories(parent: &Path) -> Result<Vec<PathBuf>, ConfigDataError> {
    let entries = std::fs::read_dir(parent).map_err(|e| ConfigDataError::ReadError {
        path: parent.to_path_buf(),
        source: e,
    })?;
    let mut directories: Vec<PathBuf> = entries
        .filter_map(Result::ok)
        .map(|entry| entry.path())
        .filter(|path| path.is_dir())
        .filter(|path| {
            path.file_name()
                .and_then(|n| n.to_str())
                .is_some_and(|n| !n.starts_with('.'))
        })
        .collect();
    directories.sort();
    Ok(directories)
}

/// Removes `.` components and folds `..` where possible, without touching
/// the filesystem.
fn normalize(path: &Path) -> PathBuf {
    let mut normalized = PathBuf::new();
    for component in path.components() {
        match component {
            Component::CurDir => {}
            Component::ParentDir => {
                let can_pop = matches!(
                    normalized.components().next_back(),
                    Some(Component::Normal(_))
                );
                if can_pop {
                    normalized.pop();
                } else {
                    normalized.push("..");
                }
            }
            other => normalized.push(other.as_os_str()),
        }
    }
    normalized
}
