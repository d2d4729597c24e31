//! Registry-owned service records and the provider-side registration handle.
//!
//! # Invariants
//!
//! - `available` flips to false exactly once, after UNREGISTERING has been
//!   dispatched and before the record's properties and service are dropped.
//! - Usage counts change only after a factory call has succeeded.
//! - Factory callbacks never run while `state` is locked.

use std::fmt;
use std::sync::atomic::{AtomicBool, AtomicI32, Ordering};
use std::sync::{Arc, Weak};

use parking_lot::{Mutex, ReentrantMutex};
use plexus_primitives::{Filter, OBJECTCLASS, PropertyMap, SERVICE_ID, SERVICE_RANKING, Value};
use rustc_hash::FxHashMap;

use crate::error::{RegistryError, Result};
use crate::factory::PrototypeServiceFactory;
use crate::interface::InterfaceMap;
use crate::module::{Module, ModuleId};
use crate::reference::ServiceReferenceBase;
use crate::registry::RegistryInner;

/// Registry-assigned service identifier. Strictly increasing, never reused.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub struct ServiceId(pub(crate) i64);

impl ServiceId {
	pub const fn get(self) -> i64 {
		self.0
	}
}

impl fmt::Display for ServiceId {
	fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
		write!(f, "{}", self.0)
	}
}

/// What a registration hands out.
#[derive(Clone)]
pub(crate) enum ServiceSource {
	/// One shared object table for every consumer.
	Object(InterfaceMap),
	/// A factory producing one instance per consuming module.
	Factory(Arc<dyn PrototypeServiceFactory>),
}

struct Usage {
	module: Module,
	count: usize,
	/// Factory-created instance cached for this module.
	instance: Option<InterfaceMap>,
}

pub(crate) struct RegistrationState {
	unregistering: bool,
	properties: PropertyMap,
	source: Option<ServiceSource>,
	usage: FxHashMap<ModuleId, Usage>,
	/// Serializes factory calls per consuming module.
	gates: FxHashMap<ModuleId, Arc<ReentrantMutex<()>>>,
}

impl RegistrationState {
	fn usage_entry(&mut self, module: &Module) -> &mut Usage {
		self.usage.entry(module.id()).or_insert_with(|| Usage {
			module: module.clone(),
			count: 0,
			instance: None,
		})
	}

	/// Bumps the usage count if an instance is already cached for the module.
	fn checkout_cached(&mut self, module: ModuleId) -> Option<InterfaceMap> {
		let usage = self.usage.get_mut(&module)?;
		let instance = usage.instance.clone()?;
		usage.count += 1;
		Some(instance)
	}

	fn factory(&self) -> Option<Arc<dyn PrototypeServiceFactory>> {
		match &self.source {
			Some(ServiceSource::Factory(factory)) => Some(Arc::clone(factory)),
			_ => None,
		}
	}
}

/// The shared record behind registrations and references.
pub(crate) struct RegistrationCore {
	pub(crate) id: ServiceId,
	pub(crate) interfaces: Box<[String]>,
	pub(crate) owner: Module,
	ranking: AtomicI32,
	available: AtomicBool,
	state: Mutex<RegistrationState>,
	pub(crate) registry: Weak<RegistryInner>,
}

impl RegistrationCore {
	pub(crate) fn new(
		id: ServiceId,
		interfaces: Vec<String>,
		owner: Module,
		source: ServiceSource,
		properties: PropertyMap,
		registry: Weak<RegistryInner>,
	) -> Self {
		let properties = with_registry_properties(id, &interfaces, properties);
		Self {
			id,
			interfaces: interfaces.into_boxed_slice(),
			owner,
			ranking: AtomicI32::new(properties.ranking()),
			available: AtomicBool::new(true),
			state: Mutex::new(RegistrationState {
				unregistering: false,
				properties,
				source: Some(source),
				usage: FxHashMap::default(),
				gates: FxHashMap::default(),
			}),
			registry,
		}
	}

	pub(crate) fn handle(self: &Arc<Self>) -> ServiceRegistration {
		ServiceRegistration {
			core: Arc::clone(self),
		}
	}

	fn is_available(&self) -> bool {
		self.available.load(Ordering::Acquire)
	}

	/// Registered, not yet torn down, and owned by an active module.
	pub(crate) fn is_valid(&self) -> bool {
		self.is_available() && self.owner.is_active()
	}

	pub(crate) fn ranking(&self) -> i32 {
		self.ranking.load(Ordering::Acquire)
	}

	pub(crate) fn properties(&self) -> PropertyMap {
		self.state.lock().properties.clone()
	}

	pub(crate) fn property(&self, key: &str) -> Option<Value> {
		self.state.lock().properties.get(key).cloned()
	}

	pub(crate) fn property_keys(&self) -> Vec<String> {
		self.state.lock().properties.keys().map(str::to_string).collect()
	}

	pub(crate) fn matches(&self, filter: Option<&Filter>) -> bool {
		match filter {
			Some(filter) => filter.matches(&self.state.lock().properties),
			None => true,
		}
	}

	pub(crate) fn using_modules(&self) -> Vec<Module> {
		let state = self.state.lock();
		let mut modules: Vec<Module> = state.usage.values().map(|u| u.module.clone()).collect();
		modules.sort_by_key(Module::id);
		modules
	}

	pub(crate) fn usage_count(&self, module: ModuleId) -> usize {
		self.state.lock().usage.get(&module).map_or(0, |u| u.count)
	}

	/// Marks the record as unregistering. Fails if that already happened.
	pub(crate) fn begin_unregister(&self) -> Result<()> {
		let mut state = self.state.lock();
		if state.unregistering {
			return Err(RegistryError::IllegalState(format!("service {} is already unregistered", self.id)));
		}
		state.unregistering = true;
		Ok(())
	}

	/// Swaps in new properties, returning `(previous, current)` snapshots.
	pub(crate) fn replace_properties(&self, properties: PropertyMap) -> Result<(PropertyMap, PropertyMap)> {
		let properties = with_registry_properties(self.id, &self.interfaces, properties);
		let mut state = self.state.lock();
		if state.unregistering {
			return Err(RegistryError::IllegalState(format!("service {} is already unregistered", self.id)));
		}
		self.ranking.store(properties.ranking(), Ordering::Release);
		let previous = std::mem::replace(&mut state.properties, properties);
		Ok((previous, state.properties.clone()))
	}

	/// Invalidates the record, drops its properties and service, and releases
	/// every factory instance still checked out.
	pub(crate) fn finish_unregister(self: &Arc<Self>) {
		let (factory, instances) = {
			let mut state = self.state.lock();
			self.available.store(false, Ordering::Release);
			state.properties.clear();
			state.gates.clear();
			let factory = state.factory();
			state.source = None;
			let instances: Vec<(Module, InterfaceMap)> = std::mem::take(&mut state.usage)
				.into_values()
				.filter_map(|u| Some((u.module, u.instance?)))
				.collect();
			(factory, instances)
		};

		if let Some(factory) = factory {
			for (module, instance) in instances {
				self.release_instance(&factory, &module, instance);
			}
		}
	}

	/// Checks the service out for `module`.
	///
	/// Returns `Ok(None)` once the registration is no longer available.
	pub(crate) fn get_service(self: &Arc<Self>, module: &Module, validate: bool) -> Result<Option<InterfaceMap>> {
		let (factory, gate) = {
			let mut state = self.state.lock();
			if !self.is_available() {
				return Ok(None);
			}
			match state.source.clone() {
				None => return Ok(None),
				Some(ServiceSource::Object(map)) => {
					state.usage_entry(module).count += 1;
					return Ok(Some(map));
				}
				Some(ServiceSource::Factory(factory)) => {
					if let Some(instance) = state.checkout_cached(module.id()) {
						return Ok(Some(instance));
					}
					let gate = Arc::clone(state.gates.entry(module.id()).or_default());
					(factory, gate)
				}
			}
		};

		let _gate = gate.lock();
		{
			let mut state = self.state.lock();
			if !self.is_available() {
				return Ok(None);
			}
			if let Some(instance) = state.checkout_cached(module.id()) {
				return Ok(Some(instance));
			}
		}

		let registration = self.handle();
		let instance = factory
			.get_service(module, &registration)
			.map_err(|source| RegistryError::Factory {
				service_id: self.id,
				source,
			})?;

		if validate && let Some(missing) = self.interfaces.iter().find(|id| !instance.contains(id)) {
			let err = RegistryError::IllegalState(format!(
				"factory for service {} did not provide interface {missing}",
				self.id
			));
			self.release_instance(&factory, module, instance);
			return Err(err);
		}

		let mut state = self.state.lock();
		if !self.is_available() {
			drop(state);
			self.release_instance(&factory, module, instance);
			return Ok(None);
		}
		if let Some(existing) = state.checkout_cached(module.id()) {
			drop(state);
			self.release_instance(&factory, module, instance);
			return Ok(Some(existing));
		}
		let usage = state.usage_entry(module);
		usage.instance = Some(instance.clone());
		usage.count += 1;
		tracing::trace!(service_id = %self.id, module = %module, "service.factory_instance_created");
		Ok(Some(instance))
	}

	/// Drops one usage of the service by `module`.
	///
	/// Returns `Ok(false)` when the module holds no usage, without touching
	/// the factory.
	pub(crate) fn unget_service(self: &Arc<Self>, module: &Module) -> Result<bool> {
		let (factory, instance) = {
			let mut state = self.state.lock();
			let Some(usage) = state.usage.get_mut(&module.id()) else {
				return Ok(false);
			};
			if usage.count > 1 {
				usage.count -= 1;
				return Ok(true);
			}
			let factory = state.factory();
			let released = state.usage.remove(&module.id()).and_then(|u| u.instance);
			match (factory, released) {
				(Some(factory), Some(instance)) => (factory, instance),
				_ => return Ok(true),
			}
		};

		let registration = self.handle();
		if let Err(source) = factory.unget_service(module, &registration, instance.clone()) {
			// Put the checkout back so the failed release leaves counts unchanged.
			let mut state = self.state.lock();
			if self.is_available() && !state.usage.contains_key(&module.id()) {
				state.usage.insert(
					module.id(),
					Usage {
						module: module.clone(),
						count: 1,
						instance: Some(instance),
					},
				);
			}
			return Err(RegistryError::Factory {
				service_id: self.id,
				source,
			});
		}
		Ok(true)
	}

	/// Drops every usage held by `module`, running factory cleanup.
	///
	/// Returns the usage count that was outstanding.
	pub(crate) fn release_module(self: &Arc<Self>, module: &Module) -> usize {
		let (count, factory, instance) = {
			let mut state = self.state.lock();
			state.gates.remove(&module.id());
			let Some(usage) = state.usage.remove(&module.id()) else {
				return 0;
			};
			(usage.count, state.factory(), usage.instance)
		};
		if let (Some(factory), Some(instance)) = (factory, instance) {
			self.release_instance(&factory, module, instance);
		}
		count
	}

	/// Factory release on teardown paths; failures are logged, not returned.
	fn release_instance(self: &Arc<Self>, factory: &Arc<dyn PrototypeServiceFactory>, module: &Module, instance: InterfaceMap) {
		let registration = self.handle();
		if let Err(error) = factory.unget_service(module, &registration, instance) {
			tracing::warn!(
				service_id = %self.id,
				module = %module,
				error = %error,
				"service.factory_release_failed"
			);
		}
	}
}

/// Injects `objectclass`, `service.id` and a default `service.ranking`.
fn with_registry_properties(id: ServiceId, interfaces: &[String], properties: PropertyMap) -> PropertyMap {
	let mut merged = PropertyMap::new()
		.with(OBJECTCLASS, Value::List(interfaces.iter().map(|i| Value::from(i.as_str())).collect()))
		.with(SERVICE_ID, id.0);
	for (key, value) in properties.iter() {
		if key != OBJECTCLASS && key != SERVICE_ID {
			merged.insert(key, value.clone());
		}
	}
	if !merged.contains_key(SERVICE_RANKING) {
		merged.insert(SERVICE_RANKING, 0);
	}
	merged
}

/// Provider-side handle to a registered service.
///
/// Clones share the same registration; unregistering through one clone makes
/// the others fail with [`RegistryError::IllegalState`].
#[derive(Clone)]
pub struct ServiceRegistration {
	pub(crate) core: Arc<RegistrationCore>,
}

impl ServiceRegistration {
	pub fn service_id(&self) -> ServiceId {
		self.core.id
	}

	/// Interface ids the service was published under.
	pub fn interfaces(&self) -> &[String] {
		&self.core.interfaces
	}

	/// The registering module.
	pub fn module(&self) -> &Module {
		&self.core.owner
	}

	/// A reference to this registration, valid until it is unregistered.
	pub fn reference(&self) -> ServiceReferenceBase {
		ServiceReferenceBase::from_core(Arc::clone(&self.core))
	}

	/// Replaces the service properties and fires MODIFIED.
	///
	/// `service.id` and `objectclass` are always re-injected.
	pub fn set_properties(&self, properties: PropertyMap) -> Result<()> {
		self.registry()?.set_properties(&self.core, properties)
	}

	/// Fires UNREGISTERING, then invalidates every reference to this service.
	pub fn unregister(&self) -> Result<()> {
		self.registry()?.unregister(&self.core)
	}

	fn registry(&self) -> Result<Arc<RegistryInner>> {
		self.core
			.registry
			.upgrade()
			.ok_or_else(|| RegistryError::IllegalState("registry has been dropped".into()))
	}
}

impl PartialEq for ServiceRegistration {
	fn eq(&self, other: &Self) -> bool {
		Arc::ptr_eq(&self.core, &other.core)
	}
}

impl Eq for ServiceRegistration {}

impl fmt::Debug for ServiceRegistration {
	fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
		f.debug_struct("ServiceRegistration")
			.field("id", &self.core.id)
			.field("interfaces", &self.core.interfaces)
			.field("module", &self.core.owner.name())
			.field("valid", &self.core.is_valid())
			.finish()
	}
}
