use crate::container::descriptor::ServiceId;
use crate::container::ioc_container::ResolutionContext;
use crate::errors::CoreError;

/// Trait for services that can be constructed by the IoC container
///
/// ```rust
/// use std::sync::Arc;
/// use bridged_options_core::container::{Injectable, IocContainer, ResolutionContext, ServiceId, ServiceScope};
/// use bridged_options_core::CoreError;
///
/// #[derive(Default)]
/// struct Clock;
///
/// impl Injectable for Clock {
///     fn create(_: &ResolutionContext<'_>) -> Result<Self, CoreError> {
///         Ok(Clock)
///     }
/// }
///
/// struct Greeter {
///     clock: Arc<Clock>,
/// }
///
/// impl Injectable for Greeter {
///     fn dependencies() -> Vec<ServiceId> {
///         vec![ServiceId::of::<Clock>()]
///     }
///
///     fn create(resolver: &ResolutionContext<'_>) -> Result<Self, CoreError> {
///         Ok(Greeter { clock: resolver.resolve::<Clock>()? })
///     }
/// }
///
/// let mut container = IocContainer::new();
/// container.try_add_injectable::<Clock>(ServiceScope::Singleton).unwrap();
/// container.try_add_injectable::<Greeter>(ServiceScope::Transient).unwrap();
/// container.build().unwrap();
///
/// let greeter = container.resolve::<Greeter>().unwrap();
/// assert!(Arc::ptr_eq(&greeter.clock, &container.resolve::<Clock>().unwrap()));
/// ```
pub trait Injectable: Send + Sync + 'static {
    /// Services this type resolves in [`Injectable::create`]
    ///
    /// Checked when the container is built.
    fn dependencies() -> Vec<ServiceId> {
        Vec::new()
    }

    /// Create an instance, resolving dependencies from the container
    fn create(resolver: &ResolutionContext<'_>) -> Result<Self, CoreError>
    where
        Self: Sized;
}
