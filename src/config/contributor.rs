//! A single node of the config data tree.

use std::collections::BTreeMap;
use std::sync::Arc;

use super::activation::{ActivationContext, ImportPhase};
use super::binder::{scalar_to_string, BindSource, Binder};
use super::loader::{ConfigData, ConfigDataOption, Options};
use super::location::Location;
use super::profiles::ProfileExpression;
use super::resolver::{ResolutionResult, Resource};
use super::source::PropertySource;
use super::ConfigDataError;

pub(crate) const IMPORT_PROPERTY: &str = "config.import";
pub(crate) const ON_PROFILE_PROPERTY: &str = "config.activate.on-profile";

/// What a [`Contributor`] stands for.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Kind {
    /// The tree root; holds no data itself.
    Root,
    /// A location seeded from `config.location`, `config.additional-location`
    /// or `config.import`.
    InitialImport,
    /// A property source that existed before processing started.
    Existing,
    /// Imported data whose properties have not been bound yet.
    UnboundImport,
    /// Imported profile-specific data whose properties have not been bound yet.
    UnboundProfileSpecificImport,
    /// Imported data with its imports and activation bound.
    BoundImport,
    /// A location that resolved to nothing loadable.
    EmptyLocation,
}

impl Kind {
    pub fn is_unbound(self) -> bool {
        matches!(self, Self::UnboundImport | Self::UnboundProfileSpecificImport)
    }
}

/// The `config.activate.*` condition of a document.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Activate {
    on_profile: Vec<ProfileExpression>,
}

impl Activate {
    pub fn on_profile(&self) -> &[ProfileExpression] {
        &self.on_profile
    }

    /// Without known profiles nothing gated on a profile is active.
    pub fn is_active(&self, context: Option<&ActivationContext>) -> bool {
        match context.and_then(ActivationContext::profiles) {
            None => false,
            Some(profiles) => self.on_profile.iter().any(|e| e.matches(profiles)),
        }
    }

    fn parse(expressions: &[String]) -> Result<Option<Self>, ConfigDataError> {
        if expressions.is_empty() {
            return Ok(None);
        }
        let on_profile = expressions
            .iter()
            .map(|e| ProfileExpression::parse(e))
            .collect::<Result<_, _>>()?;
        Ok(Some(Self { on_profile }))
    }
}

/// The bound `config.*` properties of a contributor.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct ConfigDataProperties {
    imports: Vec<Location>,
    activate: Option<Activate>,
}

impl ConfigDataProperties {
    fn of_imports(imports: Vec<Location>) -> Self {
        Self {
            imports,
            activate: None,
        }
    }

    fn bind(binder: &Binder, mut imports: Vec<Location>) -> Result<Self, ConfigDataError> {
        imports.extend(binder.bind_locations(IMPORT_PROPERTY)?.unwrap_or_default());
        let on_profile = binder.bind_string_list(ON_PROFILE_PROPERTY)?.unwrap_or_default();
        Ok(Self {
            imports,
            activate: Activate::parse(&on_profile)?,
        })
    }

    pub fn imports(&self) -> &[Location] {
        &self.imports
    }

    pub fn activate(&self) -> Option<&Activate> {
        self.activate.as_ref()
    }

    fn is_active(&self, context: Option<&ActivationContext>) -> bool {
        self.activate.as_ref().map_or(true, |a| a.is_active(context))
    }

    #[must_use]
    fn without_imports(self) -> Self {
        Self {
            imports: Vec::new(),
            ..self
        }
    }
}

/// One property source, its imports and their resolved children.
///
/// Contributors are immutable. Changes go through
/// [`with_replacement`](Self::with_replacement), which rebuilds only the path
/// from the root to the replaced node.
#[derive(Debug, Clone)]
pub struct Contributor {
    kind: Kind,
    location: Option<Location>,
    resource: Option<Resource>,
    profile_specific: bool,
    source: Option<Arc<PropertySource>>,
    properties: Option<ConfigDataProperties>,
    declared_imports: Vec<Location>,
    options: Options,
    children: BTreeMap<ImportPhase, Vec<Arc<Contributor>>>,
}

impl Contributor {
    fn of(kind: Kind) -> Self {
        Self {
            kind,
            location: None,
            resource: None,
            profile_specific: false,
            source: None,
            properties: None,
            declared_imports: Vec::new(),
            options: Options::none(),
            children: BTreeMap::new(),
        }
    }

    pub(crate) fn root(children: Vec<Arc<Contributor>>) -> Self {
        let mut root = Self::of(Kind::Root);
        root.children
            .insert(ImportPhase::BeforeProfileActivation, children);
        root
    }

    pub(crate) fn initial_import(location: Location) -> Self {
        Self {
            properties: Some(ConfigDataProperties::of_imports(vec![location.clone()])),
            location: Some(location),
            ..Self::of(Kind::InitialImport)
        }
    }

    pub(crate) fn existing(source: Arc<PropertySource>) -> Self {
        Self {
            source: Some(source),
            ..Self::of(Kind::Existing)
        }
    }

    /// One document of imported data, not yet bound. Loader-declared imports
    /// go to the first document only.
    pub(crate) fn unbound_import(result: &ResolutionResult, data: &ConfigData, index: usize) -> Self {
        let kind = if result.profile_specific {
            Kind::UnboundProfileSpecificImport
        } else {
            Kind::UnboundImport
        };
        Self {
            location: Some(result.location.clone()),
            resource: Some(result.resource.clone()),
            profile_specific: result.profile_specific,
            source: data.property_sources().get(index).cloned(),
            declared_imports: if index == 0 {
                data.imports().to_vec()
            } else {
                Vec::new()
            },
            options: data.options().clone(),
            ..Self::of(kind)
        }
    }

    pub(crate) fn empty_location(result: &ResolutionResult, data: &ConfigData) -> Self {
        Self {
            location: Some(result.location.clone()),
            resource: Some(result.resource.clone()),
            profile_specific: result.profile_specific,
            properties: Some(ConfigDataProperties::of_imports(data.imports().to_vec())),
            options: data.options().clone(),
            ..Self::of(Kind::EmptyLocation)
        }
    }

    pub fn kind(&self) -> Kind {
        self.kind
    }

    pub fn location(&self) -> Option<&Location> {
        self.location.as_ref()
    }

    pub fn resource(&self) -> Option<&Resource> {
        self.resource.as_ref()
    }

    pub fn property_source(&self) -> Option<&Arc<PropertySource>> {
        self.source.as_ref()
    }

    pub fn properties(&self) -> Option<&ConfigDataProperties> {
        self.properties.as_ref()
    }

    /// Whether this contributor came from a profile-specific resolution.
    pub fn is_profile_specific(&self) -> bool {
        self.profile_specific
    }

    pub fn has_option(&self, option: ConfigDataOption) -> bool {
        self.options.contains(option)
    }

    pub fn imports(&self) -> &[Location] {
        self.properties
            .as_ref()
            .map(ConfigDataProperties::imports)
            .unwrap_or(&[])
    }

    pub fn children(&self, phase: ImportPhase) -> &[Arc<Contributor>] {
        self.children.get(&phase).map(Vec::as_slice).unwrap_or(&[])
    }

    /// Unbound contributors are never active. Neither is profile-specific data
    /// before any activation context exists.
    pub fn is_active(&self, context: Option<&ActivationContext>) -> bool {
        if self.kind.is_unbound() {
            return false;
        }
        if context.is_none() && self.has_option(ConfigDataOption::ProfileSpecific) {
            return false;
        }
        self.properties
            .as_ref()
            .map_or(true, |p| p.is_active(context))
    }

    /// Best-effort activity of a contributor that may still be unbound.
    ///
    /// Unbound activation is read from the raw source without placeholder
    /// resolution; anything that fails to parse counts as inactive.
    pub(crate) fn is_provisionally_active(&self, context: Option<&ActivationContext>) -> bool {
        if !self.kind.is_unbound() {
            return self.is_active(context);
        }
        if context.is_none() && self.has_option(ConfigDataOption::ProfileSpecific) {
            return false;
        }
        let raw = self
            .source
            .as_ref()
            .and_then(|s| s.get(ON_PROFILE_PROPERTY))
            .map(raw_string_list)
            .unwrap_or_default();
        match Activate::parse(&raw) {
            Ok(None) => true,
            Ok(Some(activate)) => activate.is_active(context),
            Err(_) => false,
        }
    }

    pub(crate) fn has_unprocessed_imports(&self, phase: ImportPhase) -> bool {
        !self.imports().is_empty() && !self.children.contains_key(&phase)
    }

    pub(crate) fn bind_source(&self, active: bool) -> Option<BindSource> {
        self.source.as_ref().map(|source| BindSource {
            source: source.clone(),
            active,
            location: self.location.clone(),
        })
    }

    /// Binds `config.import` and `config.activate.on-profile` from this
    /// contributor's own source, resolving placeholders against
    /// `placeholders`.
    pub(crate) fn with_bound_properties(
        &self,
        placeholders: Arc<[BindSource]>,
    ) -> Result<Self, ConfigDataError> {
        let sources = self.bind_source(true).into_iter().collect();
        let binder = Binder::scoped(sources, placeholders, true);
        let mut properties = ConfigDataProperties::bind(&binder, self.declared_imports.clone())?;
        if self.has_option(ConfigDataOption::IgnoreImports) {
            properties = properties.without_imports();
        }
        Ok(Self {
            kind: Kind::BoundImport,
            properties: Some(properties),
            ..self.clone()
        })
    }

    /// Attaches the contributors imported during `phase`.
    pub(crate) fn with_children(&self, phase: ImportPhase, children: Vec<Arc<Contributor>>) -> Self {
        let mut updated = self.clone();
        updated.children.insert(phase, children);
        updated
    }

    /// Returns a tree in which `existing` is swapped for `replacement`.
    ///
    /// Subtrees that do not contain `existing` are shared with `self`.
    pub(crate) fn with_replacement(
        self: &Arc<Self>,
        existing: &Arc<Contributor>,
        replacement: &Arc<Contributor>,
    ) -> Arc<Self> {
        if Arc::ptr_eq(self, existing) {
            return replacement.clone();
        }
        let mut changed = false;
        let children: BTreeMap<ImportPhase, Vec<Arc<Contributor>>> = self
            .children
            .iter()
            .map(|(phase, children)| {
                let replaced: Vec<Arc<Contributor>> = children
                    .iter()
                    .map(|child| {
                        let updated = child.with_replacement(existing, replacement);
                        changed |= !Arc::ptr_eq(&updated, child);
                        updated
                    })
                    .collect();
                (*phase, replaced)
            })
            .collect();
        if !changed {
            return self.clone();
        }
        Arc::new(Self {
            children,
            ..(**self).clone()
        })
    }

    /// Every contributor in the tree, children before their parent.
    ///
    /// `AfterProfileActivation` children come before `BeforeProfileActivation`
    /// ones, so data imported later in the run takes precedence.
    pub(crate) fn walk(self: &Arc<Self>) -> Vec<Arc<Contributor>> {
        let mut out = Vec::new();
        self.walk_into(&mut out);
        out
    }

    fn walk_into(self: &Arc<Self>, out: &mut Vec<Arc<Contributor>>) {
        for children in self.children.values().rev() {
            for child in children {
                child.walk_into(out);
            }
        }
        out.push(self.clone());
    }
}

fn raw_string_list(value: &toml::Value) -> Vec<String> {
    let items: Vec<String> = match value {
        toml::Value::Array(items) => items.iter().filter_map(scalar_to_string).collect(),
        other => scalar_to_string(other)
            .map(|s| s.split(',').map(str::to_string).collect())
            .unwrap_or_default(),
    };
    items
        .into_iter()
        .map(|s| s.trim().to_string())
        .filter(|s| !s.is_empty())
        .collect()
}
