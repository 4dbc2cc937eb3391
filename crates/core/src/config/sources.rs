/// Configuration source information for debugging and hot-reload
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ConfigSource {
    /// Values loaded from environment variables sharing a prefix
    EnvVar(String),
    /// Values parsed from a JSON document
    Json,
    /// Values parsed from a YAML document
    Yaml,
    /// Values supplied as colon-separated key/value pairs
    Pairs,
    /// Value provided programmatically
    Programmatic,
}

impl ConfigSource {
    /// Check if source is environment variable
    pub fn is_env_var(&self) -> bool {
        matches!(self, ConfigSource::EnvVar(_))
    }

    /// Check if source was set programmatically
    pub fn is_programmatic(&self) -> bool {
        matches!(self, ConfigSource::Programmatic)
    }

    /// Get source description
    pub fn description(&self) -> String {
        match self {
            ConfigSource::EnvVar(prefix) => format!("Environment variables: {}*", prefix),
            ConfigSource::Json => "JSON document".to_string(),
            ConfigSource::Yaml => "YAML document".to_string(),
            ConfigSource::Pairs => "Key/value pairs".to_string(),
            ConfigSource::Programmatic => "Programmatically set".to_string(),
        }
    }
}

impl std::fmt::Display for ConfigSource {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.description())
    }
}
