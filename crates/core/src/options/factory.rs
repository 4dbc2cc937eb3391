use std::sync::Arc;

use serde::de::DeserializeOwned;
use thiserror::Error;

use crate::config::ConfigSection;
use crate::errors::{short_type_name, CoreError};

/// Name passed to validators for the unnamed options instance
pub const DEFAULT_OPTIONS_NAME: &str = "";

/// Types that can be bound from a configuration section
pub trait OptionsType: DeserializeOwned + Send + Sync + 'static {}

impl<T> OptionsType for T where T: DeserializeOwned + Send + Sync + 'static {}

/// Post-bind hook that adjusts a freshly bound options value
pub trait ConfigureOptions<T>: Send + Sync {
    fn configure(&self, options: &mut T);
}

/// Outcome of a [`ValidateOptions`] check
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ValidateOptionsResult {
    Success,
    /// The validator does not apply to this options instance
    Skip,
    Fail(Vec<String>),
}

impl ValidateOptionsResult {
    /// Failure with a single message
    pub fn fail(message: impl Into<String>) -> Self {
        Self::Fail(vec![message.into()])
    }

    pub fn is_failure(&self) -> bool {
        matches!(self, Self::Fail(_))
    }
}

/// Validation hook run after all configure hooks
pub trait ValidateOptions<T>: Send + Sync {
    fn validate(&self, name: &str, options: &T) -> ValidateOptionsResult;
}

/// Options rejected by one or more validators
///
/// Displays the validators' messages joined by `"; "`.
#[derive(Debug, Clone, Error)]
#[error("{}", .failures.join("; "))]
pub struct OptionsValidationError {
    pub options_name: String,
    pub options_type: String,
    pub failures: Vec<String>,
}

impl OptionsValidationError {
    pub fn new<T>(options_name: impl Into<String>, failures: Vec<String>) -> Self {
        Self {
            options_name: options_name.into(),
            options_type: short_type_name(std::any::type_name::<T>()),
            failures,
        }
    }
}

/// Creates options values: bind, then configure, then validate
pub struct OptionsFactory<T> {
    section: ConfigSection,
    configurators: Vec<Arc<dyn ConfigureOptions<T>>>,
    validators: Vec<Arc<dyn ValidateOptions<T>>>,
}

impl<T> std::fmt::Debug for OptionsFactory<T> {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("OptionsFactory")
            .field("section", &self.section.path())
            .field("configurators", &self.configurators.len())
            .field("validators", &self.validators.len())
            .finish()
    }
}

impl<T: OptionsType> OptionsFactory<T> {
    pub fn new(
        section: ConfigSection,
        configurators: Vec<Arc<dyn ConfigureOptions<T>>>,
        validators: Vec<Arc<dyn ValidateOptions<T>>>,
    ) -> Self {
        Self {
            section,
            configurators,
            validators,
        }
    }

    /// Section the options are bound from
    pub fn section(&self) -> &ConfigSection {
        &self.section
    }

    /// Create a value from the section's current contents
    pub fn create(&self) -> Result<T, CoreError> {
        self.create_versioned().map(|(value, _)| value)
    }

    /// Create a value together with the configuration version it was read at
    pub fn create_versioned(&self) -> Result<(T, u64), CoreError> {
        let (mut value, version) = self.section.bind_versioned::<T>()?;

        for configurator in &self.configurators {
            configurator.configure(&mut value);
        }
        self.validate(&value)?;

        Ok((value, version))
    }

    fn validate(&self, value: &T) -> Result<(), OptionsValidationError> {
        let failures: Vec<String> = self
            .validators
            .iter()
            .filter_map(|v| match v.validate(DEFAULT_OPTIONS_NAME, value) {
                ValidateOptionsResult::Fail(messages) => Some(messages),
                ValidateOptionsResult::Success | ValidateOptionsResult::Skip => None,
            })
            .flatten()
            .collect();

        if failures.is_empty() {
            Ok(())
        } else {
            Err(OptionsValidationError::new::<T>(DEFAULT_OPTIONS_NAME, failures))
        }
    }
}
