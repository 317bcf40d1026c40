//! Shared access to the binder while configuration is still being processed.

use std::fmt;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::Arc;

use arc_swap::ArcSwapOption;

use crate::config::Binder;

/// Holds the most recent [`Binder`] produced during config data processing.
///
/// The binder is replaced after the contributors are created and again after
/// every processing pass. Readers on any thread get a consistent snapshot
/// without locking.
///
/// ## Example
///
/// ```no_run
/// use std::sync::Arc;
/// use dragon_cfg::{BootstrapRegistry, Config};
///
/// let registry = Arc::new(BootstrapRegistry::new());
/// let env = Config::builder()
///     .with_bootstrap_registry(registry.clone())
///     .load()?;
///
/// let binder = registry.binder().expect("registered during load");
/// let name = binder.bind_string("app.name")?;
/// # Ok::<(), dragon_cfg::Error>(())
/// ```
#[derive(Default)]
pub struct BootstrapRegistry {
    binder: ArcSwapOption<Binder>,
    generation: AtomicUsize,
}

impl BootstrapRegistry {
    pub fn new() -> Self {
        Self::default()
    }

    /// Publishes `binder`, replacing any previous one.
    pub fn register(&self, binder: Binder) {
        self.binder.store(Some(Arc::new(binder)));
        self.generation.fetch_add(1, Ordering::Release);
    }

    /// The latest binder, if one has been registered.
    pub fn binder(&self) -> Option<Arc<Binder>> {
        self.binder.load_full()
    }

    /// How many binders have been registered so far.
    pub fn generation(&self) -> usize {
        self.generation.load(Ordering::Acquire)
    }
}

impl fmt::Debug for BootstrapRegistry {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("BootstrapRegistry")
            .field("registered", &self.binder.load().is_some())
            .field("generation", &self.generation())
            .finish()
    }
}
