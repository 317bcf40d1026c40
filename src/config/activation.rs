use super::profiles::Profiles;

/// Which pass a contributor's imports were resolved in.
///
/// Each contributor resolves its imports at most once per phase. Imports
/// resolved after profile activation also pick up profile-specific variants.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub enum ImportPhase {
    BeforeProfileActivation,
    AfterProfileActivation,
}

impl ImportPhase {
    pub fn of(context: Option<&ActivationContext>) -> Self {
        context.map_or(Self::BeforeProfileActivation, |c| c.import_phase)
    }
}

/// What is currently known about the runtime profiles.
///
/// The initial context carries the profiles bound from the first pass but is
/// still in the [`ImportPhase::BeforeProfileActivation`] phase. The final
/// context, produced by [`with_profiles`](Self::with_profiles), also includes
/// profiles declared by `profiles.include`.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ActivationContext {
    profiles: Option<Profiles>,
    import_phase: ImportPhase,
}

impl ActivationContext {
    /// A context that knows nothing about profiles yet.
    pub fn new() -> Self {
        Self {
            profiles: None,
            import_phase: ImportPhase::BeforeProfileActivation,
        }
    }

    pub fn initial(profiles: Profiles) -> Self {
        Self {
            profiles: Some(profiles),
            import_phase: ImportPhase::BeforeProfileActivation,
        }
    }

    pub fn with_profiles(&self, profiles: Profiles) -> Self {
        Self {
            profiles: Some(profiles),
            import_phase: ImportPhase::AfterProfileActivation,
        }
    }

    pub fn profiles(&self) -> Option<&Profiles> {
        self.profiles.as_ref()
    }

    pub fn import_phase(&self) -> ImportPhase {
        self.import_phase
    }
}

impl Default for ActivationContext {
    fn default() -> Self {
        Self::new()
    }
}
