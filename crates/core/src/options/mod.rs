//! Options binding, validation and change tracking
//!
//! An options type is any `DeserializeOwned` struct bound from a
//! [`ConfigSection`](crate::config::ConfigSection). Three accessors expose it
//! with different freshness:
//!
//! - [`Options`]: bound once per container.
//! - [`OptionsSnapshot`]: bound once per scope.
//! - [`OptionsMonitor`]: follows every configuration change.

pub mod factory;
pub mod manager;
pub mod monitor;
pub mod registration;

pub use factory::{
    ConfigureOptions, OptionsFactory, OptionsType, OptionsValidationError, ValidateOptions,
    ValidateOptionsResult, DEFAULT_OPTIONS_NAME,
};
pub use manager::{Options, OptionsSnapshot};
pub use monitor::OptionsMonitor;
pub use registration::OptionsServiceExt;
