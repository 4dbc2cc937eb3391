use std::any::TypeId;
use std::collections::HashMap;
use std::sync::{Arc, RwLock};

use crate::container::autowiring::Injectable;
use crate::container::binding::{CollectionEntry, ServiceBindings};
use crate::container::descriptor::{erase, unerase, ErasedInstance, ServiceDescriptor, ServiceId};
use crate::container::resolver::ResolutionGuard;
use crate::container::scope::{InstanceCells, ScopeId, ScopedServiceManager, ServiceScope};
use crate::errors::CoreError;

/// IoC container with singleton, scoped and transient lifetimes
///
/// Services are registered with "add if absent" semantics, the container is
/// built once, and then shared (usually behind an `Arc`) for resolution.
/// Resolving a scoped service outside an explicit scope uses the container's
/// root scope.
#[derive(Debug)]
pub struct IocContainer {
    /// Service bindings and descriptors
    bindings: ServiceBindings,
    /// Singleton instances
    singletons: InstanceCells,
    /// Scope used when no explicit scope is given
    root_scope: Arc<ScopedServiceManager>,
    /// Active scopes
    scopes: RwLock<HashMap<ScopeId, Arc<ScopedServiceManager>>>,
    /// Whether the container is built and ready
    is_built: bool,
}

impl Default for IocContainer {
    fn default() -> Self {
        Self::new()
    }
}

impl IocContainer {
    /// Create a new IoC container
    pub fn new() -> Self {
        Self {
            bindings: ServiceBindings::new(),
            singletons: InstanceCells::new(),
            root_scope: Arc::new(ScopedServiceManager::new()),
            scopes: RwLock::new(HashMap::new()),
            is_built: false,
        }
    }

    /// Build the container and prepare for service resolution
    ///
    /// Fails if a registered service declares a dependency that was never
    /// registered.
    pub fn build(&mut self) -> Result<(), CoreError> {
        if self.is_built {
            return Ok(());
        }

        for descriptor in self.bindings.descriptors() {
            for dependency in &descriptor.dependencies {
                if !self.bindings.contains(dependency) {
                    return Err(CoreError::ServiceNotFound {
                        service_type: format!(
                            "{} (required by {})",
                            dependency.display_name(),
                            descriptor.service_id.display_name()
                        ),
                    });
                }
            }
        }

        self.is_built = true;
        tracing::debug!(services = self.bindings.count(), "container built");
        Ok(())
    }

    /// Whether [`IocContainer::build`] has completed
    pub fn is_built(&self) -> bool {
        self.is_built
    }

    fn ensure_not_built(&self) -> Result<(), CoreError> {
        if self.is_built {
            return Err(CoreError::InvalidServiceDescriptor {
                message: "Cannot register services after container is built".to_string(),
            });
        }
        Ok(())
    }

    fn ensure_built(&self) -> Result<(), CoreError> {
        if !self.is_built {
            return Err(CoreError::InvalidServiceDescriptor {
                message: "Container must be built before resolving services".to_string(),
            });
        }
        Ok(())
    }

    /// Register a descriptor unless its service is already registered
    pub fn try_add_descriptor(&mut self, descriptor: ServiceDescriptor) -> Result<bool, CoreError> {
        self.ensure_not_built()?;

        let service = descriptor.service_id.display_name();
        let lifetime = descriptor.lifetime;
        let added = self.bindings.try_add_descriptor(descriptor);
        if added {
            tracing::debug!(%service, %lifetime, "service registered");
        } else {
            tracing::debug!(%service, %lifetime, "service already registered, keeping first registration");
        }
        Ok(added)
    }

    /// Register a factory for `T` with the given lifetime, if absent
    pub fn try_add_factory<T, F>(&mut self, lifetime: ServiceScope, factory: F) -> Result<bool, CoreError>
    where
        T: ?Sized + Send + Sync + 'static,
        F: Fn(&ResolutionContext<'_>) -> Result<Arc<T>, CoreError> + Send + Sync + 'static,
    {
        let descriptor = ServiceDescriptor::factory::<T>()
            .with_lifetime(lifetime)
            .with_factory(factory)
            .build()?;
        self.try_add_descriptor(descriptor)
    }

    /// Register a singleton factory for `T`, if absent
    pub fn try_add_singleton<T, F>(&mut self, factory: F) -> Result<bool, CoreError>
    where
        T: ?Sized + Send + Sync + 'static,
        F: Fn(&ResolutionContext<'_>) -> Result<Arc<T>, CoreError> + Send + Sync + 'static,
    {
        self.try_add_factory(ServiceScope::Singleton, factory)
    }

    /// Register a scoped factory for `T`, if absent
    pub fn try_add_scoped<T, F>(&mut self, factory: F) -> Result<bool, CoreError>
    where
        T: ?Sized + Send + Sync + 'static,
        F: Fn(&ResolutionContext<'_>) -> Result<Arc<T>, CoreError> + Send + Sync + 'static,
    {
        self.try_add_factory(ServiceScope::Scoped, factory)
    }

    /// Register a transient factory for `T`, if absent
    pub fn try_add_transient<T, F>(&mut self, factory: F) -> Result<bool, CoreError>
    where
        T: ?Sized + Send + Sync + 'static,
        F: Fn(&ResolutionContext<'_>) -> Result<Arc<T>, CoreError> + Send + Sync + 'static,
    {
        self.try_add_factory(ServiceScope::Transient, factory)
    }

    /// Register an existing instance as the singleton for `T`, if absent
    pub fn try_add_singleton_instance<T>(&mut self, instance: Arc<T>) -> Result<bool, CoreError>
    where
        T: ?Sized + Send + Sync + 'static,
    {
        self.try_add_singleton::<T, _>(move |_| Ok(instance.clone()))
    }

    /// Register an [`Injectable`] type with the given lifetime, if absent
    pub fn try_add_injectable<T: Injectable>(&mut self, lifetime: ServiceScope) -> Result<bool, CoreError> {
        let descriptor = ServiceDescriptor::factory::<T>()
            .with_lifetime(lifetime)
            .implemented_by::<T>()
            .depends_on_all(T::dependencies())
            .with_factory(|ctx| T::create(ctx).map(Arc::new))
            .build()?;
        self.try_add_descriptor(descriptor)
    }

    /// Add a member to the collection of `T` unless a `TImpl` is already in it
    pub fn try_add_to_collection<T, TImpl>(&mut self, instance: Arc<T>) -> Result<bool, CoreError>
    where
        T: ?Sized + Send + Sync + 'static,
        TImpl: 'static,
    {
        self.ensure_not_built()?;

        let entry = CollectionEntry {
            implementation_id: TypeId::of::<TImpl>(),
            implementation_name: std::any::type_name::<TImpl>(),
            instance: erase(instance),
        };
        let added = self.bindings.try_add_to_collection(ServiceId::of::<T>(), entry);
        tracing::debug!(
            service = std::any::type_name::<T>(),
            implementation = std::any::type_name::<TImpl>(),
            added,
            "collection member registration"
        );
        Ok(added)
    }

    /// Check if a service is registered
    pub fn contains<T: ?Sized + 'static>(&self) -> bool {
        self.bindings.contains(&ServiceId::of::<T>())
    }

    /// Get the registered descriptor of a service
    pub fn descriptor<T: ?Sized + 'static>(&self) -> Option<Arc<ServiceDescriptor>> {
        self.bindings.get_descriptor(&ServiceId::of::<T>())
    }

    /// Number of registered services
    pub fn service_count(&self) -> usize {
        self.bindings.count()
    }

    /// Create a new service scope
    pub fn create_scope(&self) -> Result<ScopeId, CoreError> {
        let scope_manager = Arc::new(ScopedServiceManager::new());
        let scope_id = scope_manager.scope_id();

        let mut scopes = self.scopes.write().map_err(|_| CoreError::lock("scopes"))?;
        scopes.insert(scope_id, scope_manager);
        tracing::debug!(%scope_id, "scope created");
        Ok(scope_id)
    }

    /// Dispose of a scope and drop all of its instances
    ///
    /// Returns whether the scope existed.
    pub fn dispose_scope(&self, scope_id: &ScopeId) -> Result<bool, CoreError> {
        let removed = {
            let mut scopes = self.scopes.write().map_err(|_| CoreError::lock("scopes"))?;
            scopes.remove(scope_id)
        };

        match removed {
            Some(scope) => {
                scope.clear();
                tracing::debug!(%scope_id, "scope disposed");
                Ok(true)
            }
            None => Ok(false),
        }
    }

    /// Number of active scopes, not counting the root scope
    pub fn scope_count(&self) -> usize {
        self.scopes.read().map(|s| s.len()).unwrap_or(0)
    }

    fn scope(&self, scope_id: &ScopeId) -> Result<Arc<ScopedServiceManager>, CoreError> {
        let scopes = self.scopes.read().map_err(|_| CoreError::lock("scopes"))?;
        scopes.get(scope_id).cloned().ok_or_else(|| CoreError::ScopeNotFound {
            scope: scope_id.to_string(),
        })
    }

    /// Resolve a service from the root scope
    pub fn resolve<T: ?Sized + Send + Sync + 'static>(&self) -> Result<Arc<T>, CoreError> {
        let service_id = ServiceId::of::<T>();
        let instance = self.resolve_erased(&service_id, &self.root_scope)?;
        unerase::<T>(&instance, &service_id)
    }

    /// Resolve a service within a scope
    pub fn resolve_scoped<T: ?Sized + Send + Sync + 'static>(&self, scope_id: &ScopeId) -> Result<Arc<T>, CoreError> {
        let scope = self.scope(scope_id)?;
        let service_id = ServiceId::of::<T>();
        let instance = self.resolve_erased(&service_id, &scope)?;
        unerase::<T>(&instance, &service_id)
    }

    /// Try to resolve a service, returning None if it cannot be resolved
    pub fn try_resolve<T: ?Sized + Send + Sync + 'static>(&self) -> Option<Arc<T>> {
        self.resolve::<T>().ok()
    }

    /// Resolve every member of the collection of `T`, in registration order
    pub fn resolve_all<T: ?Sized + Send + Sync + 'static>(&self) -> Result<Vec<Arc<T>>, CoreError> {
        self.ensure_built()?;

        let service_id = ServiceId::of::<T>();
        self.bindings
            .collection(&service_id)
            .iter()
            .map(|entry| unerase::<T>(&entry.instance, &service_id))
            .collect()
    }

    fn resolve_erased(
        &self,
        service_id: &ServiceId,
        scope: &Arc<ScopedServiceManager>,
    ) -> Result<ErasedInstance, CoreError> {
        self.ensure_built()?;

        let descriptor = self
            .bindings
            .get_descriptor(service_id)
            .ok_or_else(|| CoreError::service_not_found(service_id.display_name()))?;

        let _guard = ResolutionGuard::enter(service_id)?;
        tracing::trace!(
            service = service_id.type_name(),
            lifetime = %descriptor.lifetime,
            scope = %scope.scope_id(),
            "resolving service"
        );

        match descriptor.lifetime {
            ServiceScope::Singleton => {
                // Singletons never capture a request scope.
                let cell = self.singletons.cell(service_id, "singleton_instances")?;
                cell.get_or_try_init(|| {
                    (descriptor.factory)(&ResolutionContext::new(self, &self.root_scope))
                })
            }
            ServiceScope::Scoped => {
                let cell = scope.cell(service_id)?;
                cell.get_or_try_init(|| (descriptor.factory)(&ResolutionContext::new(self, scope)))
            }
            ServiceScope::Transient => (descriptor.factory)(&ResolutionContext::new(self, scope)),
        }
    }
}

/// View of the container handed to factories during resolution
///
/// Resolves dependencies in the same scope as the service being created.
pub struct ResolutionContext<'a> {
    container: &'a IocContainer,
    scope: &'a Arc<ScopedServiceManager>,
}

impl<'a> ResolutionContext<'a> {
    fn new(container: &'a IocContainer, scope: &'a Arc<ScopedServiceManager>) -> Self {
        Self { container, scope }
    }

    /// Resolve a dependency in the current scope
    pub fn resolve<T: ?Sized + Send + Sync + 'static>(&self) -> Result<Arc<T>, CoreError> {
        let service_id = ServiceId::of::<T>();
        let instance = self.container.resolve_erased(&service_id, self.scope)?;
        unerase::<T>(&instance, &service_id)
    }

    /// Try to resolve a dependency, returning None if it cannot be resolved
    pub fn try_resolve<T: ?Sized + Send + Sync + 'static>(&self) -> Option<Arc<T>> {
        self.resolve::<T>().ok()
    }

    /// Resolve every member of a collection
    pub fn resolve_all<T: ?Sized + Send + Sync + 'static>(&self) -> Result<Vec<Arc<T>>, CoreError> {
        self.container.resolve_all::<T>()
    }

    /// Scope the current resolution runs in
    pub fn scope_id(&self) -> ScopeId {
        self.scope.scope_id()
    }
}

impl std::fmt::Debug for ResolutionContext<'_> {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("ResolutionContext")
            .field("scope", &self.scope.scope_id())
            .finish()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::atomic::{AtomicUsize, Ordering};

    trait Greeting: Send + Sync + std::fmt::Debug {
        fn text(&self) -> String;
    }

    #[derive(Debug)]
    struct Hello(usize);

    impl Greeting for Hello {
        fn text(&self) -> String {
            format!("hello #{}", self.0)
        }
    }

    fn counting_container(lifetime: ServiceScope) -> (IocContainer, Arc<AtomicUsize>) {
        let counter = Arc::new(AtomicUsize::new(0));
        let mut container = IocContainer::new();
        let c = counter.clone();
        container
            .try_add_factory::<dyn Greeting, _>(lifetime, move |_| {
                let n = c.fetch_add(1, Ordering::SeqCst);
                Ok(Arc::new(Hello(n)) as Arc<dyn Greeting>)
            })
            .unwrap();
        container.build().unwrap();
        (container, counter)
    }

    #[test]
    fn test_resolve_requires_build() {
        let container = IocContainer::new();
        let err = container.resolve::<String>().unwrap_err();
        assert!(err.to_string().contains("must be built"));
    }

    #[test]
    fn test_register_after_build_fails() {
        let mut container = IocContainer::new();
        container.build().unwrap();
        let err = container
            .try_add_singleton_instance(Arc::new("late".to_string()))
            .unwrap_err();
        assert!(matches!(err, CoreError::InvalidServiceDescriptor { .. }));
    }

    #[test]
    fn test_singleton_trait_object() {
        let (container, counter) = counting_container(ServiceScope::Singleton);

        let a = container.resolve::<dyn Greeting>().unwrap();
        let b = container.resolve::<dyn Greeting>().unwrap();
        let scope = container.create_scope().unwrap();
        let c = container.resolve_scoped::<dyn Greeting>(&scope).unwrap();

        assert!(Arc::ptr_eq(&a, &b));
        assert!(Arc::ptr_eq(&a, &c));
        assert_eq!(a.text(), "hello #0");
        assert_eq!(counter.load(Ordering::SeqCst), 1);
    }

    #[test]
    fn test_scoped_instances_per_scope() {
        let (container, counter) = counting_container(ServiceScope::Scoped);
        let first = container.create_scope().unwrap();
        let second = container.create_scope().unwrap();

        let a1 = container.resolve_scoped::<dyn Greeting>(&first).unwrap();
        let a2 = container.resolve_scoped::<dyn Greeting>(&first).unwrap();
        let b = container.resolve_scoped::<dyn Greeting>(&second).unwrap();

        assert!(Arc::ptr_eq(&a1, &a2));
        assert!(!Arc::ptr_eq(&a1, &b));
        assert_eq!(counter.load(Ordering::SeqCst), 2);

        // The root scope behaves like one more scope.
        let root1 = container.resolve::<dyn Greeting>().unwrap();
        let root2 = container.resolve::<dyn Greeting>().unwrap();
        assert!(Arc::ptr_eq(&root1, &root2));
        assert!(!Arc::ptr_eq(&root1, &a1));
    }

    #[test]
    fn test_transient_instances_are_fresh() {
        let (container, counter) = counting_container(ServiceScope::Transient);

        let a = container.resolve::<dyn Greeting>().unwrap();
        let b = container.resolve::<dyn Greeting>().unwrap();

        assert!(!Arc::ptr_eq(&a, &b));
        assert_eq!(counter.load(Ordering::SeqCst), 2);
    }

    #[test]
    fn test_first_registration_wins() {
        let mut container = IocContainer::new();
        assert!(container.try_add_singleton_instance(Arc::new("first".to_string())).unwrap());
        assert!(!container.try_add_singleton_instance(Arc::new("second".to_string())).unwrap());
        container.build().unwrap();

        assert_eq!(container.service_count(), 1);
        assert_eq!(*container.resolve::<String>().unwrap(), "first");
    }

    #[test]
    fn test_dispose_scope() {
        let (container, _) = counting_container(ServiceScope::Scoped);
        let scope = container.create_scope().unwrap();
        container.resolve_scoped::<dyn Greeting>(&scope).unwrap();
        assert_eq!(container.scope_count(), 1);

        assert!(container.dispose_scope(&scope).unwrap());
        assert!(!container.dispose_scope(&scope).unwrap());
        assert_eq!(container.scope_count(), 0);

        let err = container.resolve_scoped::<dyn Greeting>(&scope).unwrap_err();
        assert!(matches!(err, CoreError::ScopeNotFound { .. }));
    }

    #[test]
    fn test_factory_error_propagates_unchanged() {
        let mut container = IocContainer::new();
        container
            .try_add_transient::<String, _>(|_| Err(CoreError::contract_violation("broken factory")))
            .unwrap();
        container.build().unwrap();

        let err = container.resolve::<String>().unwrap_err();
        assert!(err.is_contract_violation());
        assert_eq!(err.to_string(), "broken factory");
    }

    #[test]
    fn test_missing_service() {
        let mut container = IocContainer::new();
        container.build().unwrap();
        let err = container.resolve::<dyn Greeting>().unwrap_err();
        assert!(err.is_service());
        assert!(container.try_resolve::<dyn Greeting>().is_none());
    }

    #[test]
    fn test_build_checks_declared_dependencies() {
        struct NeedsString(Arc<String>);

        impl Injectable for NeedsString {
            fn dependencies() -> Vec<ServiceId> {
                vec![ServiceId::of::<String>()]
            }

            fn create(resolver: &ResolutionContext<'_>) -> Result<Self, CoreError> {
                Ok(Self(resolver.resolve::<String>()?))
            }
        }

        let mut container = IocContainer::new();
        container.try_add_injectable::<NeedsString>(ServiceScope::Transient).unwrap();
        let err = container.build().unwrap_err();
        assert!(err.to_string().contains("required by"));

        let mut container = IocContainer::new();
        container.try_add_injectable::<NeedsString>(ServiceScope::Transient).unwrap();
        container.try_add_singleton_instance(Arc::new("dep".to_string())).unwrap();
        container.build().unwrap();
        assert_eq!(*container.resolve::<NeedsString>().unwrap().0, "dep");
    }

    #[test]
    fn test_cycle_is_reported() {
        let mut container = IocContainer::new();
        container
            .try_add_singleton::<String, _>(|ctx| {
                let n = ctx.resolve::<u32>()?;
                Ok(Arc::new(n.to_string()))
            })
            .unwrap();
        container
            .try_add_singleton::<u32, _>(|ctx| {
                let s = ctx.resolve::<String>()?;
                Ok(Arc::new(s.len() as u32))
            })
            .unwrap();
        container.build().unwrap();

        let err = container.resolve::<String>().unwrap_err();
        assert!(matches!(err, CoreError::CircularDependency { .. }));
    }

    #[test]
    fn test_scoped_dependency_follows_resolution_scope() {
        let mut container = IocContainer::new();
        container
            .try_add_scoped::<ScopeId, _>(|ctx| Ok(Arc::new(ctx.scope_id())))
            .unwrap();
        container
            .try_add_transient::<String, _>(|ctx| {
                let scope = ctx.resolve::<ScopeId>()?;
                Ok(Arc::new(scope.to_string()))
            })
            .unwrap();
        container.build().unwrap();

        let scope = container.create_scope().unwrap();
        assert_eq!(*container.resolve_scoped::<String>(&scope).unwrap(), scope.to_string());
    }

    #[test]
    fn test_collections_keep_order() {
        struct First;
        struct Second;

        let mut container = IocContainer::new();
        container
            .try_add_to_collection::<dyn Greeting, First>(Arc::new(Hello(1)))
            .unwrap();
        container
            .try_add_to_collection::<dyn Greeting, Second>(Arc::new(Hello(2)))
            .unwrap();
        assert!(!container
            .try_add_to_collection::<dyn Greeting, First>(Arc::new(Hello(3)))
            .unwrap());
        container.build().unwrap();

        let texts: Vec<String> = container
            .resolve_all::<dyn Greeting>()
            .unwrap()
            .iter()
            .map(|g| g.text())
            .collect();
        assert_eq!(texts, vec!["hello #1", "hello #2"]);
    }
}
