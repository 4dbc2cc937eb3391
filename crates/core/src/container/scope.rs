use std::collections::HashMap;
use std::sync::{Arc, RwLock};

use once_cell::sync::OnceCell;

use crate::container::descriptor::{ErasedInstance, ServiceId};
use crate::errors::CoreError;

/// Service scope enumeration
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default)]
pub enum ServiceScope {
    /// Single instance shared across the application
    #[default]
    Singleton,
    /// New instance created for each request
    Transient,
    /// Instance scoped to a particular context (e.g., request scope)
    Scoped,
}

impl ServiceScope {
    /// Check if the scope is singleton
    pub fn is_singleton(&self) -> bool {
        matches!(self, ServiceScope::Singleton)
    }

    /// Check if the scope is transient
    pub fn is_transient(&self) -> bool {
        matches!(self, ServiceScope::Transient)
    }

    /// Check if the scope is scoped
    pub fn is_scoped(&self) -> bool {
        matches!(self, ServiceScope::Scoped)
    }

    /// Get the scope name as a string
    pub fn as_str(&self) -> &'static str {
        match self {
            ServiceScope::Singleton => "singleton",
            ServiceScope::Transient => "transient",
            ServiceScope::Scoped => "scoped",
        }
    }
}

impl std::fmt::Display for ServiceScope {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.as_str())
    }
}

/// Identifier of a service scope
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct ScopeId(uuid::Uuid);

impl ScopeId {
    /// Generate a fresh scope identifier
    pub fn new() -> Self {
        Self(uuid::Uuid::new_v4())
    }

    /// The underlying UUID
    pub fn as_uuid(&self) -> uuid::Uuid {
        self.0
    }
}

impl Default for ScopeId {
    fn default() -> Self {
        Self::new()
    }
}

impl std::fmt::Display for ScopeId {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.0)
    }
}

/// Single-initialization slot for one cached service instance
///
/// Concurrent first resolutions of the same service block until one
/// factory call finishes instead of racing.
#[derive(Debug, Default)]
pub struct InstanceCell {
    instance: OnceCell<ErasedInstance>,
}

impl InstanceCell {
    /// Return the cached instance, creating it with `init` on first use
    ///
    /// A failed or panicking `init` leaves the cell empty so a later call
    /// tries again.
    pub fn get_or_try_init<F>(&self, init: F) -> Result<ErasedInstance, CoreError>
    where
        F: FnOnce() -> Result<ErasedInstance, CoreError>,
    {
        self.instance.get_or_try_init(init).cloned()
    }

    /// Whether an instance has been created
    pub fn is_initialized(&self) -> bool {
        self.instance.get().is_some()
    }
}

/// Map of instance cells keyed by service
#[derive(Debug, Default)]
pub struct InstanceCells {
    cells: RwLock<HashMap<ServiceId, Arc<InstanceCell>>>,
}

impl InstanceCells {
    pub fn new() -> Self {
        Self::default()
    }

    /// Get the cell for a service, inserting an empty one if needed
    pub fn cell(&self, service_id: &ServiceId, resource: &str) -> Result<Arc<InstanceCell>, CoreError> {
        {
            let cells = self.cells.read().map_err(|_| CoreError::lock(resource))?;
            if let Some(cell) = cells.get(service_id) {
                return Ok(cell.clone());
            }
        }

        let mut cells = self.cells.write().map_err(|_| CoreError::lock(resource))?;
        Ok(cells.entry(service_id.clone()).or_default().clone())
    }

    /// Number of services with an initialized instance
    pub fn initialized_count(&self) -> usize {
        self.cells
            .read()
            .map(|cells| cells.values().filter(|c| c.is_initialized()).count())
            .unwrap_or(0)
    }

    /// Drop every cached instance
    pub fn clear(&self) {
        if let Ok(mut cells) = self.cells.write() {
            cells.clear();
        }
    }
}

/// Scoped service manager for managing services within a specific scope
#[derive(Debug)]
pub struct ScopedServiceManager {
    scope_id: ScopeId,
    instances: InstanceCells,
}

impl ScopedServiceManager {
    /// Create a new scoped service manager
    pub fn new() -> Self {
        Self {
            scope_id: ScopeId::new(),
            instances: InstanceCells::new(),
        }
    }

    /// Get the scope ID
    pub fn scope_id(&self) -> ScopeId {
        self.scope_id
    }

    /// Get the instance cell for a scoped service
    pub fn cell(&self, service_id: &ServiceId) -> Result<Arc<InstanceCell>, CoreError> {
        self.instances.cell(service_id, "scoped_instances")
    }

    /// Get the number of services created in this scope
    pub fn service_count(&self) -> usize {
        self.instances.initialized_count()
    }

    /// Clear all services from this scope
    pub fn clear(&self) {
        self.instances.clear();
    }
}

impl Default for ScopedServiceManager {
    fn default() -> Self {
        Self::new()
    }
}
