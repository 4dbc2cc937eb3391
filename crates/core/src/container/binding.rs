use std::any::TypeId;
use std::collections::HashMap;
use std::sync::Arc;

use crate::container::descriptor::{ErasedInstance, ServiceDescriptor, ServiceId};

/// One member of a service collection
#[derive(Debug, Clone)]
pub struct CollectionEntry {
    /// Concrete type of the member, used for de-duplication
    pub implementation_id: TypeId,
    pub implementation_name: &'static str,
    pub instance: ErasedInstance,
}

/// Registered service descriptors and service collections
///
/// All registration methods use "add if absent" semantics: the first
/// registration for a service wins and later ones report `false`.
#[derive(Debug, Default)]
pub struct ServiceBindings {
    descriptors: HashMap<ServiceId, Arc<ServiceDescriptor>>,
    collections: HashMap<ServiceId, Vec<CollectionEntry>>,
}

impl ServiceBindings {
    /// Create empty bindings
    pub fn new() -> Self {
        Self::default()
    }

    /// Add a descriptor unless the service is already registered
    pub fn try_add_descriptor(&mut self, descriptor: ServiceDescriptor) -> bool {
        if self.descriptors.contains_key(&descriptor.service_id) {
            return false;
        }
        self.descriptors
            .insert(descriptor.service_id.clone(), Arc::new(descriptor));
        true
    }

    /// Add a collection member unless one with the same implementation exists
    pub fn try_add_to_collection(&mut self, service_id: ServiceId, entry: CollectionEntry) -> bool {
        let members = self.collections.entry(service_id).or_default();
        if members
            .iter()
            .any(|m| m.implementation_id == entry.implementation_id)
        {
            return false;
        }
        members.push(entry);
        true
    }

    /// Get the descriptor for a service
    pub fn get_descriptor(&self, service_id: &ServiceId) -> Option<Arc<ServiceDescriptor>> {
        self.descriptors.get(service_id).cloned()
    }

    /// Get the members of a service collection in registration order
    pub fn collection(&self, service_id: &ServiceId) -> &[CollectionEntry] {
        self.collections
            .get(service_id)
            .map(Vec::as_slice)
            .unwrap_or(&[])
    }

    /// Check whether a service is registered
    pub fn contains(&self, service_id: &ServiceId) -> bool {
        self.descriptors.contains_key(service_id)
    }

    /// All registered descriptors
    pub fn descriptors(&self) -> impl Iterator<Item = &Arc<ServiceDescriptor>> {
        self.descriptors.values()
    }

    /// Number of registered descriptors
    pub fn count(&self) -> usize {
        self.descriptors.len()
    }
}
