use crate::config::ConfigDataError;
use thiserror::Error;

/// Errors surfaced by [`AppContext`](crate::AppContext) and the crate root.
#[derive(Debug, Error)]
#[non_exhaustive]
pub enum Error {
    #[error("configuration error: {0}")]
    Config(#[from] ConfigDataError),

    #[error("application context requires an environment")]
    MissingEnvironment,
}
