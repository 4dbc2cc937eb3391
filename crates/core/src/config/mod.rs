pub mod configuration;
pub mod sources;
pub mod validation;

pub use configuration::{ChangeSubscription, ConfigSection, Configuration, ConfigurationChange};
pub use sources::ConfigSource;
pub use validation::ConfigError;
