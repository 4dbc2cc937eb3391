use thiserror::Error;

/// Configuration error type
#[derive(Debug, Error)]
pub enum ConfigError {
    #[error("Invalid configuration path '{path}': {reason}")]
    InvalidPath { path: String, reason: String },

    #[error("Failed to bind section '{section}' to {target_type}: {message}")]
    BindFailed {
        section: String,
        target_type: String,
        message: String,
    },

    #[error("Lock error on resource '{resource}'")]
    LockError { resource: String },

    #[error("YAML error: {0}")]
    Yaml(#[from] serde_yaml::Error),

    #[error("JSON error: {0}")]
    Json(#[from] serde_json::Error),
}

impl ConfigError {
    /// Create an invalid path error
    pub fn invalid_path(path: impl Into<String>, reason: impl Into<String>) -> Self {
        Self::InvalidPath {
            path: path.into(),
            reason: reason.into(),
        }
    }

    /// Create a bind failure error
    pub fn bind_failed(
        section: impl Into<String>,
        target_type: impl Into<String>,
        message: impl Into<String>,
    ) -> Self {
        Self::BindFailed {
            section: section.into(),
            target_type: target_type.into(),
            message: message.into(),
        }
    }

    /// Create a lock error
    pub fn lock(resource: impl Into<String>) -> Self {
        Self::LockError {
            resource: resource.into(),
        }
    }
}
