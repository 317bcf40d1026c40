//! Layered configuration built from imported config data.
//!
//! [`Config`] collects the existing property sources, follows
//! `config.location` and `config.import` to find and load config files, and
//! activates profile-specific documents. The resulting [`Environment`] lists
//! every active source in precedence order and can be bound to a typed
//! struct, either directly or through an [`AppContext`].

pub mod config;
pub mod context;
mod error;

pub use config::{Config, ConfigDataError, Environment, PropertySource};
pub use context::{AppContext, BootstrapRegistry};
pub use error::Error;
