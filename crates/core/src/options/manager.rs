use std::sync::Arc;

use crate::errors::CoreError;
use crate::options::factory::{OptionsFactory, OptionsType};

/// Options value fixed for the container's lifetime
///
/// Registered as a singleton: the value is bound on first resolution and
/// never changes afterwards, even if the configuration is reloaded.
#[derive(Debug)]
pub struct Options<T> {
    value: Arc<T>,
}

impl<T: OptionsType> Options<T> {
    pub fn create(factory: &OptionsFactory<T>) -> Result<Self, CoreError> {
        Ok(Self {
            value: Arc::new(factory.create()?),
        })
    }

    pub fn value(&self) -> Arc<T> {
        self.value.clone()
    }
}

/// Options value fixed for one scope
///
/// Registered as scoped: each scope binds its own value on first resolution
/// within that scope.
#[derive(Debug)]
pub struct OptionsSnapshot<T> {
    value: Arc<T>,
    version: u64,
}

impl<T: OptionsType> OptionsSnapshot<T> {
    pub fn create(factory: &OptionsFactory<T>) -> Result<Self, CoreError> {
        let (value, version) = factory.create_versioned()?;
        Ok(Self {
            value: Arc::new(value),
            version,
        })
    }

    pub fn value(&self) -> Arc<T> {
        self.value.clone()
    }

    /// Configuration version the snapshot was taken at
    pub fn version(&self) -> u64 {
        self.version
    }
}
