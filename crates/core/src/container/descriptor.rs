use std::any::{Any, TypeId};
use std::sync::Arc;

use crate::container::ioc_container::ResolutionContext;
use crate::container::scope::ServiceScope;
use crate::errors::CoreError;

/// Service identifier for a registered type
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct ServiceId {
    pub type_id: TypeId,
    pub type_name: &'static str,
}

impl ServiceId {
    /// Create a new service ID for a type
    pub fn of<T: 'static + ?Sized>() -> Self {
        Self {
            type_id: TypeId::of::<T>(),
            type_name: std::any::type_name::<T>(),
        }
    }

    /// Get the type name as a string
    pub fn type_name(&self) -> &'static str {
        self.type_name
    }

    /// Name used in error messages
    pub fn display_name(&self) -> String {
        self.type_name.to_string()
    }
}

/// A resolved service instance with its concrete type erased
///
/// The payload is always an `Arc<T>` for the registered `T`, which lets
/// trait objects (`T = dyn Trait`) travel through `Any`.
pub type ErasedInstance = Arc<dyn Any + Send + Sync>;

/// Factory function for creating service instances
pub type ServiceFactory =
    Box<dyn Fn(&ResolutionContext<'_>) -> Result<ErasedInstance, CoreError> + Send + Sync>;

/// Wrap a typed instance for storage
pub fn erase<T: ?Sized + Send + Sync + 'static>(instance: Arc<T>) -> ErasedInstance {
    Arc::new(instance)
}

/// Recover a typed instance from storage
pub fn unerase<T: ?Sized + Send + Sync + 'static>(
    instance: &ErasedInstance,
    service_id: &ServiceId,
) -> Result<Arc<T>, CoreError> {
    instance
        .downcast_ref::<Arc<T>>()
        .cloned()
        .ok_or_else(|| CoreError::InvalidServiceDescriptor {
            message: format!(
                "Service {} produced an instance that is not a {}",
                service_id.display_name(),
                std::any::type_name::<T>()
            ),
        })
}

/// Service descriptor containing all metadata for a service
pub struct ServiceDescriptor {
    /// Service identifier
    pub service_id: ServiceId,
    /// Implementation type, when known
    pub implementation_id: Option<TypeId>,
    /// Service lifetime/scope
    pub lifetime: ServiceScope,
    /// Creates instances
    pub factory: ServiceFactory,
    /// Dependencies this service requires
    pub dependencies: Vec<ServiceId>,
}

impl std::fmt::Debug for ServiceDescriptor {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("ServiceDescriptor")
            .field("service_id", &self.service_id)
            .field("implementation_id", &self.implementation_id)
            .field("lifetime", &self.lifetime)
            .field("factory", &"<factory_fn>")
            .field("dependencies", &self.dependencies)
            .finish()
    }
}

impl ServiceDescriptor {
    /// Start a factory-based descriptor for `T`
    pub fn factory<T: ?Sized + Send + Sync + 'static>() -> ServiceDescriptorFactoryBuilder<T> {
        ServiceDescriptorFactoryBuilder::new()
    }
}

/// Service descriptor builder with custom factory
pub struct ServiceDescriptorFactoryBuilder<T: ?Sized> {
    lifetime: ServiceScope,
    implementation_id: Option<TypeId>,
    dependencies: Vec<ServiceId>,
    factory: Option<ServiceFactory>,
    _phantom: std::marker::PhantomData<fn() -> Arc<T>>,
}

impl<T: ?Sized + Send + Sync + 'static> Default for ServiceDescriptorFactoryBuilder<T> {
    fn default() -> Self {
        Self::new()
    }
}

impl<T: ?Sized + Send + Sync + 'static> ServiceDescriptorFactoryBuilder<T> {
    /// Create a new factory-based service descriptor builder
    pub fn new() -> Self {
        Self {
            lifetime: ServiceScope::Transient,
            implementation_id: None,
            dependencies: Vec::new(),
            factory: None,
            _phantom: std::marker::PhantomData,
        }
    }

    /// Set the service lifetime
    pub fn with_lifetime(mut self, lifetime: ServiceScope) -> Self {
        self.lifetime = lifetime;
        self
    }

    /// Record the concrete implementation type
    pub fn implemented_by<TImpl: 'static>(mut self) -> Self {
        self.implementation_id = Some(TypeId::of::<TImpl>());
        self
    }

    /// Add a dependency
    pub fn depends_on<D: ?Sized + 'static>(mut self) -> Self {
        self.dependencies.push(ServiceId::of::<D>());
        self
    }

    /// Add several dependencies
    pub fn depends_on_all(mut self, dependencies: impl IntoIterator<Item = ServiceId>) -> Self {
        self.dependencies.extend(dependencies);
        self
    }

    /// Set the factory function
    pub fn with_factory<F>(mut self, factory: F) -> Self
    where
        F: Fn(&ResolutionContext<'_>) -> Result<Arc<T>, CoreError> + Send + Sync + 'static,
    {
        self.factory = Some(Box::new(move |ctx| factory(ctx).map(erase)));
        self
    }

    /// Build the service descriptor
    pub fn build(self) -> Result<ServiceDescriptor, CoreError> {
        let factory = self.factory.ok_or_else(|| CoreError::InvalidServiceDescriptor {
            message: "Factory function is required".to_string(),
        })?;

        Ok(ServiceDescriptor {
            service_id: ServiceId::of::<T>(),
            implementation_id: self.implementation_id,
            lifetime: self.lifetime,
            factory,
            dependencies: self.dependencies,
        })
    }
}
