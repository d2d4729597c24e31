//! The registry core: service index, module table and mutation paths.
//!
//! # Role
//!
//! [`Registry`] is an explicit value shared by every module installed into
//! it. Each test or process constructs its own; there is no global instance.
//!
//! # Invariants
//!
//! - Service ids are assigned from one atomic counter per registry, start at
//!   1 and are never reused.
//! - The index lock is never held while a registration lock is taken or a
//!   listener or factory runs. Lookups clone candidate records out of the
//!   index first and inspect them afterwards.
//! - REGISTERED is dispatched before `register` returns; UNREGISTERING is
//!   dispatched while references are still valid.

use std::collections::BTreeMap;
use std::sync::Arc;
use std::sync::atomic::{AtomicI64, AtomicU64, Ordering};

use parking_lot::RwLock;
use plexus_primitives::{Filter, PropertyMap};
use rustc_hash::FxHashMap;

use crate::config::RegistryConfig;
use crate::context::ModuleContext;
use crate::error::{RegistryError, Result};
use crate::event::ServiceEventKind;
use crate::interface::InterfaceMap;
use crate::listeners::ListenerTable;
use crate::module::{Module, ModuleId, Version};
use crate::reference::ServiceReferenceBase;
use crate::registration::{RegistrationCore, ServiceId, ServiceRegistration, ServiceSource};

#[derive(Default)]
struct ServiceIndex {
	by_id: BTreeMap<ServiceId, Arc<RegistrationCore>>,
	by_interface: FxHashMap<String, Vec<Arc<RegistrationCore>>>,
}

impl ServiceIndex {
	fn insert(&mut self, core: &Arc<RegistrationCore>) {
		self.by_id.insert(core.id, Arc::clone(core));
		for interface in core.interfaces.iter() {
			self.by_interface.entry(interface.clone()).or_default().push(Arc::clone(core));
		}
	}

	fn remove(&mut self, core: &Arc<RegistrationCore>) {
		self.by_id.remove(&core.id);
		for interface in core.interfaces.iter() {
			if let Some(list) = self.by_interface.get_mut(interface) {
				list.retain(|other| !Arc::ptr_eq(other, core));
				if list.is_empty() {
					self.by_interface.remove(interface);
				}
			}
		}
	}

	/// Candidates in registration order.
	fn candidates(&self, interface: Option<&str>) -> Vec<Arc<RegistrationCore>> {
		match interface {
			Some(interface) => self.by_interface.get(interface).cloned().unwrap_or_default(),
			None => self.by_id.values().cloned().collect(),
		}
	}
}

pub(crate) struct RegistryInner {
	config: RegistryConfig,
	next_service_id: AtomicI64,
	next_module_id: AtomicU64,
	index: RwLock<ServiceIndex>,
	pub(crate) listeners: ListenerTable,
	modules: RwLock<BTreeMap<ModuleId, Module>>,
}

impl RegistryInner {
	fn new(config: RegistryConfig) -> Self {
		Self {
			config,
			next_service_id: AtomicI64::new(0),
			next_module_id: AtomicU64::new(0),
			index: RwLock::new(ServiceIndex::default()),
			listeners: ListenerTable::default(),
			modules: RwLock::new(BTreeMap::new()),
		}
	}

	pub(crate) fn install_module(&self, name: String, version: Version) -> Module {
		let id = ModuleId(self.next_module_id.fetch_add(1, Ordering::Relaxed) + 1);
		let module = Module::new(id, name, version);
		self.modules.write().insert(id, module.clone());
		tracing::debug!(registry = %self.config.name, module_id = %id, module = %module, "module.installed");
		module
	}

	/// Publishes `source` under `interfaces` on behalf of `module`.
	pub(crate) fn register(
		self: &Arc<Self>,
		module: &Module,
		interfaces: Vec<String>,
		source: ServiceSource,
		properties: PropertyMap,
	) -> Result<ServiceRegistration> {
		let mut unique: Vec<String> = Vec::with_capacity(interfaces.len());
		for interface in interfaces {
			if interface.is_empty() {
				return Err(RegistryError::InvalidArgument("interface id must not be empty".into()));
			}
			if !unique.contains(&interface) {
				unique.push(interface);
			}
		}
		if unique.is_empty() {
			return Err(RegistryError::InvalidArgument(
				"a service must be registered under at least one interface".into(),
			));
		}
		if !module.is_running() {
			return Err(RegistryError::module_stopped(module));
		}

		let id = ServiceId(self.next_service_id.fetch_add(1, Ordering::Relaxed) + 1);
		let core = Arc::new(RegistrationCore::new(
			id,
			unique,
			module.clone(),
			source,
			properties,
			Arc::downgrade(self),
		));
		self.index.write().insert(&core);

		// A stop that began before the insert landed may have missed it in its
		// sweep. Whoever claims the record first tears it down.
		if !module.is_running() {
			if core.begin_unregister().is_ok() {
				self.remove_from_index(&core);
				core.finish_unregister();
			}
			return Err(RegistryError::module_stopped(module));
		}

		tracing::debug!(
			registry = %self.config.name,
			service_id = %id,
			module = %module,
			interfaces = ?core.interfaces,
			"service.registered"
		);
		self.listeners
			.dispatch(ServiceEventKind::Registered, &core.handle().reference(), &core.properties(), None);
		Ok(core.handle())
	}

	pub(crate) fn set_properties(&self, core: &Arc<RegistrationCore>, properties: PropertyMap) -> Result<()> {
		let (previous, current) = core.replace_properties(properties)?;
		tracing::debug!(
			registry = %self.config.name,
			service_id = %core.id,
			ranking = core.ranking(),
			"service.modified"
		);
		let reference = ServiceReferenceBase::from_core(Arc::clone(core));
		self.listeners
			.dispatch(ServiceEventKind::Modified, &reference, &current, Some(&previous));
		Ok(())
	}

	pub(crate) fn unregister(&self, core: &Arc<RegistrationCore>) -> Result<()> {
		core.begin_unregister()?;
		let reference = ServiceReferenceBase::from_core(Arc::clone(core));
		self.listeners
			.dispatch(ServiceEventKind::Unregistering, &reference, &core.properties(), None);
		self.remove_from_index(core);
		core.finish_unregister();
		tracing::debug!(registry = %self.config.name, service_id = %core.id, "service.unregistered");
		Ok(())
	}

	fn remove_from_index(&self, core: &Arc<RegistrationCore>) {
		self.index.write().remove(core);
	}

	/// Valid references published under `interface` (or all interfaces)
	/// whose properties match `filter`, in registration order.
	pub(crate) fn find_references(&self, interface: Option<&str>, filter: Option<&Filter>) -> Vec<ServiceReferenceBase> {
		let candidates = self.index.read().candidates(interface);
		candidates
			.into_iter()
			.filter(|core| core.is_valid() && core.matches(filter))
			.map(ServiceReferenceBase::from_core)
			.collect()
	}

	/// Highest ranking match, newest on ties; invalid if nothing matches.
	pub(crate) fn best_reference(&self, interface: Option<&str>, filter: Option<&Filter>) -> ServiceReferenceBase {
		self.find_references(interface, filter).into_iter().max().unwrap_or_default()
	}

	pub(crate) fn get_service(&self, module: &Module, reference: &ServiceReferenceBase) -> Result<Option<InterfaceMap>> {
		match reference.core() {
			Some(core) if core.is_valid() => core.get_service(module, self.config.validate_factory_interfaces),
			_ => Ok(None),
		}
	}

	pub(crate) fn unget_service(&self, module: &Module, reference: &ServiceReferenceBase) -> Result<bool> {
		match reference.core() {
			Some(core) => core.unget_service(module),
			None => Ok(false),
		}
	}

	/// Records registered by `module`, in registration order.
	pub(crate) fn registered_by(&self, module: ModuleId) -> Vec<Arc<RegistrationCore>> {
		self.index
			.read()
			.by_id
			.values()
			.filter(|core| core.owner.id() == module)
			.cloned()
			.collect()
	}

	/// Valid services on which `module` holds a usage count.
	pub(crate) fn used_by(&self, module: ModuleId) -> Vec<ServiceReferenceBase> {
		let candidates = self.index.read().candidates(None);
		candidates
			.into_iter()
			.filter(|core| core.is_valid() && core.usage_count(module) > 0)
			.map(ServiceReferenceBase::from_core)
			.collect()
	}

	/// Tears a module down. Returns false if it was already stopped.
	pub(crate) fn stop_module(&self, module: &Module) -> bool {
		if self.modules.write().remove(&module.id()).is_none() {
			return false;
		}
		module.begin_stop();

		let owned = self.registered_by(module.id());
		for core in &owned {
			// Another thread may be unregistering it already; either way it goes.
			let _ = self.unregister(core);
		}

		let candidates = self.index.read().candidates(None);
		let outstanding: usize = candidates.iter().map(|core| core.release_module(module)).sum();
		if outstanding > 0 && self.config.warn_on_outstanding_usage {
			tracing::warn!(
				registry = %self.config.name,
				module = %module,
				outstanding,
				"module.outstanding_usage"
			);
		}

		let listeners = self.listeners.remove_module(module.id());
		module.deactivate();
		tracing::debug!(
			registry = %self.config.name,
			module = %module,
			services = owned.len(),
			listeners,
			"module.stopped"
		);
		true
	}
}

/// A service registry shared by a set of modules.
///
/// Cloning yields another handle to the same registry.
#[derive(Clone)]
pub struct Registry {
	inner: Arc<RegistryInner>,
}

impl Default for Registry {
	fn default() -> Self {
		Self::new()
	}
}

impl Registry {
	pub fn new() -> Self {
		Self::with_config(RegistryConfig::default())
	}

	pub fn with_config(config: RegistryConfig) -> Self {
		Self {
			inner: Arc::new(RegistryInner::new(config)),
		}
	}

	pub fn config(&self) -> &RegistryConfig {
		&self.inner.config
	}

	/// Installs a module and returns its context, through which it registers
	/// and consumes services.
	pub fn install_module(&self, name: impl Into<String>, version: Version) -> ModuleContext {
		let module = self.inner.install_module(name.into(), version);
		ModuleContext::new(Arc::clone(&self.inner), module)
	}

	/// An installed, not yet stopped module.
	pub fn module(&self, id: ModuleId) -> Option<Module> {
		self.inner.modules.read().get(&id).cloned()
	}

	/// Installed modules ordered by id.
	pub fn modules(&self) -> Vec<Module> {
		self.inner.modules.read().values().cloned().collect()
	}

	/// Number of currently registered services.
	pub fn service_count(&self) -> usize {
		self.inner.index.read().by_id.len()
	}

	/// Number of registered service listeners across all modules.
	pub fn listener_count(&self) -> usize {
		self.inner.listeners.len()
	}
}

impl std::fmt::Debug for Registry {
	fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
		f.debug_struct("Registry")
			.field("name", &self.inner.config.name)
			.field("modules", &self.inner.modules.read().len())
			.field("services", &self.service_count())
			.finish()
	}
}
