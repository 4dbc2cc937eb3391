//! Bridged options
//!
//! Expose a settings type bound from configuration through a domain-facing
//! capability trait. A settings type declares exactly one adapter
//! ([`declare_bridge!`]); the registrar ([`OptionsBridgeExt`]) then wires the
//! capability into an [`IocContainer`](core::IocContainer) with one of three
//! lifetimes:
//!
//! - [`BridgeLifetime::ProcessSingleton`]: one value for the container.
//! - [`BridgeLifetime::RequestScoped`]: one value per scope.
//! - [`BridgeLifetime::Reactive`]: recomputed on every resolution from the
//!   latest configuration.
//!
//! ```rust
//! use std::sync::Arc;
//! use bridged_options::core::{Configuration, CoreError, Injectable, IocContainer, ResolutionContext};
//! use bridged_options::{declare_bridge, BridgeError, BridgeOptions, OptionsBridgeExt};
//! use serde::Deserialize;
//!
//! #[derive(Deserialize)]
//! #[serde(rename_all = "PascalCase")]
//! struct ServerSettings {
//!     port: String,
//! }
//!
//! trait ServerInfo: Send + Sync {
//!     fn port(&self) -> u16;
//! }
//!
//! struct Port(u16);
//!
//! impl ServerInfo for Port {
//!     fn port(&self) -> u16 {
//!         self.0
//!     }
//! }
//!
//! struct ServerBridge;
//!
//! impl Injectable for ServerBridge {
//!     fn create(_: &ResolutionContext<'_>) -> Result<Self, CoreError> {
//!         Ok(ServerBridge)
//!     }
//! }
//!
//! impl BridgeOptions<ServerSettings, dyn ServerInfo> for ServerBridge {
//!     fn bridge_from(&self, settings: &ServerSettings) -> Result<Arc<dyn ServerInfo>, BridgeError> {
//!         Ok(Arc::new(Port(settings.port.parse()?)))
//!     }
//! }
//!
//! declare_bridge!(ServerSettings => dyn ServerInfo, via ServerBridge);
//!
//! fn main() {
//!     let config = Configuration::from_pairs([("Server:Port", Some("8080"))]).unwrap();
//!     let mut container = IocContainer::new();
//!     container
//!         .add_options_bridge::<ServerSettings, dyn ServerInfo>(config.section("Server"))
//!         .unwrap();
//!     container.build().unwrap();
//!
//!     assert_eq!(container.resolve::<dyn ServerInfo>().unwrap().port(), 8080);
//! }
//! ```

pub mod declaration;
pub mod registrar;

pub use bridged_options_core as core;

pub use declaration::{
    declare_adapter, lookup_adapter, AdapterType, BridgeCapability, BridgeDeclarations, BridgeError,
    BridgeOptions, BridgeViaType,
};
pub use registrar::{BridgeLifetime, OptionsBridgeExt};

#[doc(hidden)]
pub mod __private {
    pub use ctor::ctor;
}

/// Version information
pub const VERSION: &str = env!("CARGO_PKG_VERSION");
