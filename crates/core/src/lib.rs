pub mod config;
pub mod container;
pub mod errors;
pub mod options;

// Re-export key types for convenience
pub use config::{ChangeSubscription, ConfigError, ConfigSection, ConfigSource, Configuration, ConfigurationChange};
pub use container::{Injectable, IocContainer, ResolutionContext, ScopeId, ServiceId, ServiceScope};
pub use errors::{short_type_name, CoreError};
pub use options::{
    ConfigureOptions, Options, OptionsMonitor, OptionsServiceExt, OptionsSnapshot, ValidateOptions,
    ValidateOptionsResult,
};

/// Version information
pub const VERSION: &str = env!("CARGO_PKG_VERSION");
