//! Dynamic in-process service registry.
//!
//! Modules are installed into a [`Registry`] and receive a
//! [`ModuleContext`]. Through it they publish services under string
//! interface ids, look services up by ranking or LDAP-style filter, check
//! service objects out and back in, and listen for registry events.
//!
//! # Model
//!
//! - A registration owns its properties, its service (a shared object table
//!   or a [`PrototypeServiceFactory`]) and a usage count per consuming module.
//! - A [`ServiceReferenceBase`] shares ownership of the registration record.
//!   It stays safe to hold after unregistration and simply reports invalid.
//! - The best service is the one with the highest `service.ranking`; among
//!   equal rankings the most recently registered one wins.
//! - Listeners run synchronously on the mutating thread with no registry lock
//!   held, in the order they were added.
//!
//! ```
//! use std::sync::Arc;
//!
//! use plexus_primitives::PropertyMap;
//! use plexus_registry::{Registry, ServiceInterface, Version};
//!
//! pub trait Reader: Send + Sync {
//! 	fn name(&self) -> &str;
//! }
//!
//! impl ServiceInterface for dyn Reader {
//! 	const ID: &'static str = "org.plexus.io.Reader";
//! }
//!
//! struct PngReader;
//!
//! impl Reader for PngReader {
//! 	fn name(&self) -> &str {
//! 		"png"
//! 	}
//! }
//!
//! let registry = Registry::new();
//! let provider = registry.install_module("io", Version::new(1, 0, 0));
//! let consumer = registry.install_module("viewer", Version::new(1, 0, 0));
//!
//! let reader: Arc<dyn Reader> = Arc::new(PngReader);
//! provider
//! 	.register_service(reader, PropertyMap::new().with("mimetype", "image/png"))
//! 	.unwrap();
//!
//! let reference = consumer.get_service_reference::<dyn Reader>().unwrap();
//! let service = consumer.get_service(&reference).unwrap().unwrap();
//! assert_eq!(service.name(), "png");
//! consumer.unget_service(&reference).unwrap();
//! ```

mod config;
mod context;
mod error;
mod event;
mod factory;
mod interface;
mod listeners;
mod module;
mod reference;
mod registration;
mod registry;

#[cfg(test)]
mod tests;

pub use config::{ConfigError, RegistryConfig};
pub use context::ModuleContext;
pub use error::{RegistryError, Result};
pub use event::{ServiceEvent, ServiceEventKind};
pub use factory::PrototypeServiceFactory;
pub use interface::{ErasedService, InterfaceMap, ServiceInterface};
pub use listeners::ListenerId;
pub use module::{Module, ModuleId, ParseVersionError, Version};
pub use reference::{ServiceReference, ServiceReferenceBase};
pub use registry::Registry;
pub use registration::{ServiceId, ServiceRegistration};
