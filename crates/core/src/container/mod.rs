pub mod autowiring;
pub mod binding;
pub mod descriptor;
pub mod ioc_container;
pub mod resolver;
pub mod scope;


pub use autowiring::Injectable;
pub use binding::{CollectionEntry, ServiceBindings};
pub use descriptor::{ServiceDescriptor, ServiceDescriptorFactoryBuilder, ServiceId};
pub use ioc_container::{IocContainer, ResolutionContext};
pub use resolver::ResolutionPath;
pub use scope::{ScopeId, ScopedServiceManager, ServiceScope};
