use std::cell::RefCell;

use crate::container::descriptor::ServiceId;
use crate::errors::CoreError;

/// Dependency resolution path for error reporting
#[derive(Debug, Clone, Default)]
pub struct ResolutionPath {
    pub services: Vec<ServiceId>,
}

impl ResolutionPath {
    /// Create a new resolution path
    pub fn new() -> Self {
        Self::default()
    }

    /// Add a service to the resolution path
    pub fn push(&mut self, service_id: ServiceId) {
        self.services.push(service_id);
    }

    /// Remove the last service from the resolution path
    pub fn pop(&mut self) -> Option<ServiceId> {
        self.services.pop()
    }

    /// Check if the path contains a service (for cycle detection)
    pub fn contains(&self, service_id: &ServiceId) -> bool {
        self.services.contains(service_id)
    }

    /// Get the path as a string for error messages
    pub fn path_string(&self) -> String {
        self.services
            .iter()
            .map(ServiceId::display_name)
            .collect::<Vec<_>>()
            .join(" -> ")
    }
}

thread_local! {
    static ACTIVE_PATH: RefCell<ResolutionPath> = RefCell::new(ResolutionPath::new());
}

/// Marks a service as being resolved on the current thread
///
/// Entering a service that is already on the path reports a cycle instead of
/// waiting on its own initialization lock. The entry is removed on drop.
#[derive(Debug)]
pub struct ResolutionGuard {
    _private: (),
}

impl ResolutionGuard {
    pub fn enter(service_id: &ServiceId) -> Result<Self, CoreError> {
        ACTIVE_PATH.with(|path| {
            let mut path = path.borrow_mut();
            if path.contains(service_id) {
                let mut cycle = path.clone();
                cycle.push(service_id.clone());
                return Err(CoreError::CircularDependency {
                    path: cycle.path_string(),
                    cycle_service: service_id.display_name(),
                });
            }
            path.push(service_id.clone());
            Ok(ResolutionGuard { _private: () })
        })
    }

    /// Depth of the current thread's resolution path
    pub fn depth() -> usize {
        ACTIVE_PATH.with(|path| path.borrow().services.len())
    }
}

impl Drop for ResolutionGuard {
    fn drop(&mut self) {
        ACTIVE_PATH.with(|path| {
            path.borrow_mut().pop();
        });
    }
}
