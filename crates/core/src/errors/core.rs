use thiserror::Error;

use crate::config::ConfigError;
use crate::options::OptionsValidationError;

/// Core error type for bridged options
#[derive(Debug, Error)]
pub enum CoreError {
    #[error("{message}")]
    ContractViolation { message: String },

    #[error("No bridge has been declared for the '{settings_type}' settings type.")]
    MissingBridgeDeclaration { settings_type: String },

    #[error("Failed to bridge '{settings_type}' to '{target_type}': {source}")]
    BridgeFailed {
        settings_type: String,
        target_type: String,
        source: Box<dyn std::error::Error + Send + Sync>,
    },

    #[error(transparent)]
    OptionsValidation(#[from] OptionsValidationError),

    #[error(transparent)]
    Config(#[from] ConfigError),

    #[error("Service not found: {service_type}")]
    ServiceNotFound { service_type: String },

    #[error("Scope not found: {scope}")]
    ScopeNotFound { scope: String },

    #[error("Lock error on resource: {resource}")]
    LockError { resource: String },

    #[error("Circular dependency detected: {path} (cycle at: {cycle_service})")]
    CircularDependency { path: String, cycle_service: String },

    #[error("Invalid service descriptor: {message}")]
    InvalidServiceDescriptor { message: String },
}

impl CoreError {
    /// Create a new contract violation error
    pub fn contract_violation(message: impl Into<String>) -> Self {
        Self::ContractViolation {
            message: message.into(),
        }
    }

    /// Create a new missing bridge declaration error
    pub fn missing_bridge_declaration(settings_type: impl Into<String>) -> Self {
        Self::MissingBridgeDeclaration {
            settings_type: settings_type.into(),
        }
    }

    /// Create a new bridge failure keeping the adapter's error as the source
    pub fn bridge_failed(
        settings_type: impl Into<String>,
        target_type: impl Into<String>,
        source: Box<dyn std::error::Error + Send + Sync>,
    ) -> Self {
        Self::BridgeFailed {
            settings_type: settings_type.into(),
            target_type: target_type.into(),
            source,
        }
    }

    /// Create a new service not found error
    pub fn service_not_found(service_type: impl Into<String>) -> Self {
        Self::ServiceNotFound {
            service_type: service_type.into(),
        }
    }

    /// Create a new lock error
    pub fn lock(resource: impl Into<String>) -> Self {
        Self::LockError {
            resource: resource.into(),
        }
    }

    /// Check if the error is a contract violation
    pub fn is_contract_violation(&self) -> bool {
        matches!(self, Self::ContractViolation { .. })
    }

    /// Check if the error is a missing bridge declaration
    pub fn is_missing_bridge_declaration(&self) -> bool {
        matches!(self, Self::MissingBridgeDeclaration { .. })
    }

    /// Check if the error came from options validation
    pub fn is_validation(&self) -> bool {
        matches!(self, Self::OptionsValidation(_))
    }

    /// Check if the error is a service error
    pub fn is_service(&self) -> bool {
        matches!(self, Self::ServiceNotFound { .. })
    }
}

/// Short, unqualified name of a type for error messages
///
/// `my_app::settings::AccountOptions` becomes `AccountOptions`; generic
/// arguments are shortened the same way.
pub fn short_type_name(full: &str) -> String {
    let mut out = String::with_capacity(full.len());
    let mut segment = String::new();

    for ch in full.chars() {
        match ch {
            ':' => segment.clear(),
            '<' | '>' | ',' | ' ' | '(' | ')' | '[' | ']' | '&' | ';' => {
                out.push_str(&segment);
                segment.clear();
                out.push(ch);
            }
            _ => segment.push(ch),
        }
    }
    out.push_str(&segment);
    out
}
