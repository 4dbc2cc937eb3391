use std::sync::Arc;

use bridged_options_core::config::ConfigSection;
use bridged_options_core::container::{IocContainer, ResolutionContext, ServiceScope};
use bridged_options_core::options::{Options, OptionsMonitor, OptionsServiceExt, OptionsSnapshot, OptionsType};
use bridged_options_core::{short_type_name, CoreError};

use crate::declaration::lookup_adapter;

/// How many bridged values exist and when they are computed
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum BridgeLifetime {
    /// One value per container, computed on first resolution
    ProcessSingleton,
    /// One value per scope, computed on first resolution in that scope
    RequestScoped,
    /// A fresh value on every resolution, from the latest configuration
    Reactive,
}

impl BridgeLifetime {
    /// Container lifetime of the bridged capability
    pub fn service_scope(&self) -> ServiceScope {
        match self {
            BridgeLifetime::ProcessSingleton => ServiceScope::Singleton,
            BridgeLifetime::RequestScoped => ServiceScope::Scoped,
            BridgeLifetime::Reactive => ServiceScope::Transient,
        }
    }

    fn settings<S: OptionsType>(&self, ctx: &ResolutionContext<'_>) -> Result<Arc<S>, CoreError> {
        match self {
            BridgeLifetime::ProcessSingleton => Ok(ctx.resolve::<Options<S>>()?.value()),
            BridgeLifetime::RequestScoped => Ok(ctx.resolve::<OptionsSnapshot<S>>()?.value()),
            BridgeLifetime::Reactive => ctx.resolve::<OptionsMonitor<S>>()?.current_value(),
        }
    }
}

impl std::fmt::Display for BridgeLifetime {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            BridgeLifetime::ProcessSingleton => write!(f, "process_singleton"),
            BridgeLifetime::RequestScoped => write!(f, "request_scoped"),
            BridgeLifetime::Reactive => write!(f, "reactive"),
        }
    }
}

/// Registration of bridged capabilities on an [`IocContainer`]
///
/// `S` is the settings type bound from `section`, `I` the capability
/// produced by the adapter declared for `S`. Registrations are "add if
/// absent": the first registration of `I` wins.
pub trait OptionsBridgeExt {
    /// Register `I` under the given lifetime
    ///
    /// Fails with `MissingBridgeDeclaration` if `S` declares no adapter and
    /// with `ContractViolation` if the adapter does not produce `I` from `S`.
    fn add_bridge<S, I>(&mut self, lifetime: BridgeLifetime, section: ConfigSection) -> Result<&mut Self, CoreError>
    where
        S: OptionsType,
        I: ?Sized + Send + Sync + 'static;

    /// Register `I` as a singleton computed once
    fn add_options_bridge<S, I>(&mut self, section: ConfigSection) -> Result<&mut Self, CoreError>
    where
        S: OptionsType,
        I: ?Sized + Send + Sync + 'static,
    {
        self.add_bridge::<S, I>(BridgeLifetime::ProcessSingleton, section)
    }

    /// Register `I` computed once per scope
    fn add_scoped_options_bridge<S, I>(&mut self, section: ConfigSection) -> Result<&mut Self, CoreError>
    where
        S: OptionsType,
        I: ?Sized + Send + Sync + 'static,
    {
        self.add_bridge::<S, I>(BridgeLifetime::RequestScoped, section)
    }

    /// Register `I` recomputed from the current configuration on every resolution
    fn add_monitored_options_bridge<S, I>(&mut self, section: ConfigSection) -> Result<&mut Self, CoreError>
    where
        S: OptionsType,
        I: ?Sized + Send + Sync + 'static,
    {
        self.add_bridge::<S, I>(BridgeLifetime::Reactive, section)
    }
}

impl OptionsBridgeExt for IocContainer {
    fn add_bridge<S, I>(&mut self, lifetime: BridgeLifetime, section: ConfigSection) -> Result<&mut Self, CoreError>
    where
        S: OptionsType,
        I: ?Sized + Send + Sync + 'static,
    {
        let settings_type = short_type_name(std::any::type_name::<S>());
        let target_type = short_type_name(std::any::type_name::<I>());

        self.configure_options::<S>(section)?;

        let declaration =
            lookup_adapter::<S>().ok_or_else(|| CoreError::missing_bridge_declaration(settings_type.clone()))?;
        let adapter = declaration.adapter();
        let capability = adapter.capability_for::<S, I>().cloned().ok_or_else(|| {
            CoreError::contract_violation(format!(
                "The bridge type '{}' declared on '{}' does not bridge to '{}'.",
                adapter.short_name(),
                settings_type,
                target_type
            ))
        })?;

        capability.install(self)?;

        let added = {
            let settings_type = settings_type.clone();
            let target_type = target_type.clone();
            self.try_add_factory::<I, _>(lifetime.service_scope(), move |ctx| {
                let settings = lifetime.settings::<S>(ctx)?;
                let bridge = capability.adapter::<S, I>(ctx)?;
                bridge
                    .bridge_from(&settings)
                    .map_err(|source| CoreError::bridge_failed(settings_type.as_str(), target_type.as_str(), source))
            })?
        };

        if added {
            tracing::debug!(
                settings = %settings_type,
                target = %target_type,
                adapter = adapter.type_name(),
                %lifetime,
                "options bridge registered"
            );
        } else {
            tracing::debug!(
                settings = %settings_type,
                target = %target_type,
                %lifetime,
                "bridged capability already registered, keeping first registration"
            );
        }

        Ok(self)
    }
}
