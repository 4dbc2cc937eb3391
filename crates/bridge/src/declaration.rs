//! Adapter declaration and discovery
//!
//! Every settings type that should be bridged declares exactly one adapter
//! type. Declarations live in a process-wide registry that is written once
//! per settings type, usually before `main` runs via [`declare_bridge!`]:
//!
//! ```rust,ignore
//! declare_bridge!(AccountOptions => dyn AccountInfo, via AccountBridge);
//! ```
//!
//! The macro only compiles if `AccountBridge` implements
//! `BridgeOptions<AccountOptions, dyn AccountInfo>`. Declarations built at
//! runtime with [`BridgeViaType::new`] are checked when they are created.
//!
//! [`declare_bridge!`]: crate::declare_bridge

use std::any::{Any, TypeId};
use std::collections::HashMap;
use std::sync::{Arc, RwLock};

use bridged_options_core::container::{Injectable, IocContainer, ResolutionContext, ServiceId, ServiceScope};
use bridged_options_core::{short_type_name, CoreError};
use once_cell::sync::Lazy;

/// Error returned by an adapter that cannot translate its settings
pub type BridgeError = Box<dyn std::error::Error + Send + Sync>;

/// Translation from a settings type `S` to a capability `T`
///
/// Adapters are stateless; one instance is shared by every resolution in a
/// container.
pub trait BridgeOptions<S, T: ?Sized>: Send + Sync + 'static {
    fn bridge_from(&self, settings: &S) -> Result<Arc<T>, BridgeError>;
}

type InstallFn = fn(&mut IocContainer) -> Result<bool, CoreError>;
type ResolveFn = fn(&ResolutionContext<'_>) -> Result<Box<dyn Any + Send + Sync>, CoreError>;

fn install_adapter<A: Injectable>(container: &mut IocContainer) -> Result<bool, CoreError> {
    container.try_add_injectable::<A>(ServiceScope::Singleton)
}

fn resolve_adapter<A, S, T>(ctx: &ResolutionContext<'_>) -> Result<Box<dyn Any + Send + Sync>, CoreError>
where
    A: BridgeOptions<S, T> + Injectable,
    S: 'static,
    T: ?Sized + 'static,
{
    let adapter: Arc<dyn BridgeOptions<S, T>> = ctx.resolve::<A>()?;
    Ok(Box::new(adapter))
}

/// One `BridgeOptions<S, T>` implementation of an adapter type
#[derive(Clone)]
pub struct BridgeCapability {
    adapter: TypeId,
    source: ServiceId,
    target: ServiceId,
    install: InstallFn,
    resolve: ResolveFn,
}

impl BridgeCapability {
    /// Capability of adapter `A` translating `S` into `T`
    pub fn of<A, S, T>() -> Self
    where
        A: BridgeOptions<S, T> + Injectable,
        S: 'static,
        T: ?Sized + 'static,
    {
        Self {
            adapter: TypeId::of::<A>(),
            source: ServiceId::of::<S>(),
            target: ServiceId::of::<T>(),
            install: install_adapter::<A>,
            resolve: resolve_adapter::<A, S, T>,
        }
    }

    /// Settings type consumed
    pub fn source(&self) -> &ServiceId {
        &self.source
    }

    /// Capability type produced
    pub fn target(&self) -> &ServiceId {
        &self.target
    }

    /// Whether this is the `S` to `T` translation
    pub fn bridges<S: 'static, T: ?Sized + 'static>(&self) -> bool {
        self.source.type_id == TypeId::of::<S>() && self.target.type_id == TypeId::of::<T>()
    }

    /// Register the adapter as a singleton unless it is already registered
    pub fn install(&self, container: &mut IocContainer) -> Result<bool, CoreError> {
        (self.install)(container)
    }

    /// Resolve the shared adapter instance as a `BridgeOptions<S, T>`
    pub fn adapter<S: 'static, T: ?Sized + 'static>(
        &self,
        ctx: &ResolutionContext<'_>,
    ) -> Result<Arc<dyn BridgeOptions<S, T>>, CoreError> {
        let erased = (self.resolve)(ctx)?;
        erased
            .downcast::<Arc<dyn BridgeOptions<S, T>>>()
            .map(|adapter| *adapter)
            .map_err(|_| {
                CoreError::contract_violation(format!(
                    "The bridge capability '{}' to '{}' was requested as '{}' to '{}'.",
                    short_type_name(self.source.type_name()),
                    short_type_name(self.target.type_name()),
                    short_type_name(std::any::type_name::<S>()),
                    short_type_name(std::any::type_name::<T>()),
                ))
            })
    }
}

impl std::fmt::Debug for BridgeCapability {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("BridgeCapability")
            .field("source", &self.source.type_name())
            .field("target", &self.target.type_name())
            .finish()
    }
}

/// Runtime description of an adapter type and the bridges it implements
#[derive(Debug, Clone)]
pub struct AdapterType {
    type_id: TypeId,
    type_name: &'static str,
    capabilities: Vec<BridgeCapability>,
}

impl AdapterType {
    /// Adapter `A` with its `S` to `T` capability
    pub fn of<A, S, T>() -> Self
    where
        A: BridgeOptions<S, T> + Injectable,
        S: 'static,
        T: ?Sized + 'static,
    {
        let mut adapter = Self::untyped::<A>();
        adapter.capabilities.push(BridgeCapability::of::<A, S, T>());
        adapter
    }

    /// Any type, with no bridge capability attached
    ///
    /// Declaring such a type is rejected; add capabilities first.
    pub fn untyped<A: 'static>() -> Self {
        Self {
            type_id: TypeId::of::<A>(),
            type_name: std::any::type_name::<A>(),
            capabilities: Vec::new(),
        }
    }

    /// Add another `BridgeOptions` implementation of the same adapter
    pub fn with_capability(mut self, capability: BridgeCapability) -> Result<Self, CoreError> {
        if capability.adapter != self.type_id {
            return Err(CoreError::contract_violation(format!(
                "The bridge capability '{}' to '{}' does not belong to '{}'.",
                short_type_name(capability.source.type_name()),
                short_type_name(capability.target.type_name()),
                self.short_name(),
            )));
        }
        self.capabilities.push(capability);
        Ok(self)
    }

    pub fn type_id(&self) -> TypeId {
        self.type_id
    }

    pub fn type_name(&self) -> &'static str {
        self.type_name
    }

    /// Unqualified type name used in messages
    pub fn short_name(&self) -> String {
        short_type_name(self.type_name)
    }

    pub fn capabilities(&self) -> &[BridgeCapability] {
        &self.capabilities
    }

    /// The `S` to `T` capability, if the adapter has it
    pub fn capability_for<S: 'static, T: ?Sized + 'static>(&self) -> Option<&BridgeCapability> {
        self.capabilities.iter().find(|c| c.bridges::<S, T>())
    }
}

/// Declaration naming the adapter of a settings type
#[derive(Debug, Clone)]
pub struct BridgeViaType {
    adapter: AdapterType,
}

impl BridgeViaType {
    /// Validate and wrap an adapter type
    ///
    /// Fails with a contract violation if the adapter is missing or bridges
    /// nothing.
    pub fn new(adapter: Option<AdapterType>) -> Result<Self, CoreError> {
        let adapter = adapter.ok_or_else(|| CoreError::contract_violation("The bridge type must not be null."))?;

        if adapter.capabilities.is_empty() {
            return Err(CoreError::contract_violation(format!(
                "The bridge type '{}' does not implement the BridgeOptions trait.",
                adapter.short_name()
            )));
        }

        Ok(Self { adapter })
    }

    pub fn adapter(&self) -> &AdapterType {
        &self.adapter
    }
}

#[derive(Debug, Clone)]
struct Declaration {
    settings_type: &'static str,
    bridge: BridgeViaType,
}

/// Registry of settings type to adapter declarations
///
/// Each settings type may be declared once; later declarations are rejected.
#[derive(Debug, Default)]
pub struct BridgeDeclarations {
    declarations: RwLock<HashMap<TypeId, Declaration>>,
}

static BRIDGE_DECLARATIONS: Lazy<BridgeDeclarations> = Lazy::new(BridgeDeclarations::new);

impl BridgeDeclarations {
    pub fn new() -> Self {
        Self::default()
    }

    /// The process-wide registry used by the registrar
    pub fn global() -> &'static BridgeDeclarations {
        &BRIDGE_DECLARATIONS
    }

    /// Attach `bridge` to the settings type `S`
    pub fn declare<S: 'static>(&self, bridge: BridgeViaType) -> Result<(), CoreError> {
        let settings_type = std::any::type_name::<S>();
        let mut declarations = self
            .declarations
            .write()
            .map_err(|_| CoreError::lock("bridge_declarations"))?;

        if declarations.contains_key(&TypeId::of::<S>()) {
            return Err(CoreError::contract_violation(format!(
                "A bridge has already been declared for the '{}' settings type.",
                short_type_name(settings_type)
            )));
        }

        tracing::debug!(
            settings_type,
            adapter = bridge.adapter().type_name(),
            "bridge declared"
        );
        declarations.insert(TypeId::of::<S>(), Declaration { settings_type, bridge });
        Ok(())
    }

    /// Validate `adapter` and attach it to the settings type `S`
    pub fn declare_adapter<S: 'static>(&self, adapter: Option<AdapterType>) -> Result<(), CoreError> {
        self.declare::<S>(BridgeViaType::new(adapter)?)
    }

    /// Declaration of `S`, if any
    pub fn lookup<S: 'static>(&self) -> Option<BridgeViaType> {
        let declarations = match self.declarations.read() {
            Ok(declarations) => declarations,
            Err(poisoned) => poisoned.into_inner(),
        };
        declarations.get(&TypeId::of::<S>()).map(|d| d.bridge.clone())
    }

    pub fn is_declared<S: 'static>(&self) -> bool {
        self.lookup::<S>().is_some()
    }

    /// Names of all declared settings types
    pub fn declared_types(&self) -> Vec<&'static str> {
        match self.declarations.read() {
            Ok(declarations) => declarations.values().map(|d| d.settings_type).collect(),
            Err(poisoned) => poisoned.into_inner().values().map(|d| d.settings_type).collect(),
        }
    }

    pub fn count(&self) -> usize {
        match self.declarations.read() {
            Ok(declarations) => declarations.len(),
            Err(poisoned) => poisoned.into_inner().len(),
        }
    }
}

/// Validate `adapter` and declare it for `S` in the global registry
pub fn declare_adapter<S: 'static>(adapter: Option<AdapterType>) -> Result<(), CoreError> {
    BridgeDeclarations::global().declare_adapter::<S>(adapter)
}

/// Declared adapter of `S` in the global registry
pub fn lookup_adapter<S: 'static>() -> Option<BridgeViaType> {
    BridgeDeclarations::global().lookup::<S>()
}

/// Used by [`declare_bridge!`](crate::declare_bridge) at program start
///
/// # Panics
/// Panics if `S` already has a declaration.
#[doc(hidden)]
pub fn register_static_declaration<S: 'static>(adapter: AdapterType) {
    if let Err(e) = declare_adapter::<S>(Some(adapter)) {
        panic!("Invalid bridge declaration: {}", e);
    }
}

/// Declare the adapter of a settings type at program start
///
/// ```rust,ignore
/// declare_bridge!(AccountOptions => dyn AccountInfo, via AccountBridge);
/// ```
///
/// The adapter must implement `BridgeOptions<Settings, Target>` and
/// `Injectable`. Declaring the same settings type twice aborts the program
/// before `main`.
#[macro_export]
macro_rules! declare_bridge {
    ($settings:ty => $target:ty, via $adapter:ty) => {
        const _: () = {
            #[$crate::__private::ctor]
            fn __declare_bridge() {
                $crate::declaration::register_static_declaration::<$settings>(
                    $crate::declaration::AdapterType::of::<$adapter, $settings, $target>(),
                );
            }
        };
    };
}
