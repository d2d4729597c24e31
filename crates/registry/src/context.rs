//! Per-module access to the registry.

use std::fmt;
use std::sync::Arc;

use plexus_primitives::{Filter, PropertyMap};

use crate::error::{RegistryError, Result};
use crate::event::ServiceEvent;
use crate::factory::PrototypeServiceFactory;
use crate::interface::{InterfaceMap, ServiceInterface};
use crate::listeners::ListenerId;
use crate::module::Module;
use crate::reference::{ServiceReference, ServiceReferenceBase};
use crate::registration::{ServiceRegistration, ServiceSource};
use crate::registry::RegistryInner;

/// A module's handle into its registry.
///
/// Every operation acts on behalf of the owning module: registrations are
/// owned by it, usage counts are charged to it, and listeners are removed
/// when it stops. Once the module is stopped every operation fails with
/// [`RegistryError::IllegalState`].
#[derive(Clone)]
pub struct ModuleContext {
	registry: Arc<RegistryInner>,
	module: Module,
}

impl ModuleContext {
	pub(crate) fn new(registry: Arc<RegistryInner>, module: Module) -> Self {
		Self { registry, module }
	}

	pub fn module(&self) -> &Module {
		&self.module
	}

	fn ensure_active(&self) -> Result<()> {
		if self.module.is_active() {
			Ok(())
		} else {
			Err(RegistryError::module_stopped(&self.module))
		}
	}

	/// Like `ensure_active`, but also refuses a module that is stopping.
	/// Guards operations that acquire something the stop sweep must release.
	fn ensure_running(&self) -> Result<()> {
		if self.module.is_running() {
			Ok(())
		} else {
			Err(RegistryError::module_stopped(&self.module))
		}
	}

	fn parse_filter(filter: Option<&str>) -> Result<Option<Filter>> {
		filter.map(Filter::parse).transpose().map_err(RegistryError::from)
	}

	/// Registers one shared object under `I::ID`.
	pub fn register_service<I: ServiceInterface + ?Sized>(
		&self,
		service: Arc<I>,
		properties: PropertyMap,
	) -> Result<ServiceRegistration> {
		self.register_services(InterfaceMap::single(service), properties)
	}

	/// Registers one shared object table under every interface it contains.
	pub fn register_services(&self, services: InterfaceMap, properties: PropertyMap) -> Result<ServiceRegistration> {
		self.ensure_active()?;
		let interfaces = services.interface_ids().map(str::to_string).collect();
		self.registry
			.register(&self.module, interfaces, ServiceSource::Object(services), properties)
	}

	/// Registers a per-module factory under `I::ID`.
	pub fn register_factory<I: ServiceInterface + ?Sized>(
		&self,
		factory: impl PrototypeServiceFactory,
		properties: PropertyMap,
	) -> Result<ServiceRegistration> {
		self.register_factory_for(&[I::ID], factory, properties)
	}

	/// Registers a per-module factory under several interface ids.
	pub fn register_factory_for(
		&self,
		interfaces: &[&str],
		factory: impl PrototypeServiceFactory,
		properties: PropertyMap,
	) -> Result<ServiceRegistration> {
		self.ensure_active()?;
		let interfaces = interfaces.iter().map(|id| id.to_string()).collect();
		self.registry.register(
			&self.module,
			interfaces,
			ServiceSource::Factory(Arc::new(factory)),
			properties,
		)
	}

	/// Best service published under `I::ID`: highest ranking, newest on ties.
	///
	/// The returned reference is invalid if nothing is registered.
	pub fn get_service_reference<I: ServiceInterface + ?Sized>(&self) -> Result<ServiceReference<I>> {
		self.ensure_active()?;
		Ok(ServiceReference::new(self.registry.best_reference(Some(I::ID), None)))
	}

	/// Untyped variant of [`get_service_reference`](Self::get_service_reference).
	pub fn get_service_reference_by_id(&self, interface: &str) -> Result<ServiceReferenceBase> {
		self.ensure_active()?;
		Ok(self.registry.best_reference(Some(interface), None))
	}

	/// Every service published under `I::ID` whose properties match `filter`.
	///
	/// A malformed filter yields an invalid-argument error.
	pub fn get_service_references<I: ServiceInterface + ?Sized>(
		&self,
		filter: Option<&str>,
	) -> Result<Vec<ServiceReference<I>>> {
		self.ensure_active()?;
		let filter = Self::parse_filter(filter)?;
		Ok(self
			.registry
			.find_references(Some(I::ID), filter.as_ref())
			.into_iter()
			.map(ServiceReference::new)
			.collect())
	}

	/// Untyped lookup. With no interface, every registered service is a
	/// candidate.
	pub fn get_service_references_by_id(
		&self,
		interface: Option<&str>,
		filter: Option<&str>,
	) -> Result<Vec<ServiceReferenceBase>> {
		self.ensure_active()?;
		let filter = Self::parse_filter(filter)?;
		Ok(self.registry.find_references(interface, filter.as_ref()))
	}

	/// Checks out the service object for `I`, charging one usage to this
	/// module.
	///
	/// Returns `Ok(None)` if the reference is invalid. Factory failures are
	/// returned unchanged and leave the usage count as it was.
	pub fn get_service<I: ServiceInterface + ?Sized>(&self, reference: &ServiceReference<I>) -> Result<Option<Arc<I>>> {
		let Some(services) = self.get_service_base(reference.as_base())? else {
			return Ok(None);
		};
		match services.get::<I>() {
			Some(service) => Ok(Some(service)),
			None => {
				self.unget_service(reference.as_base())?;
				Err(RegistryError::IllegalState(format!(
					"service {} does not provide {}",
					reference.service_id().map_or_else(|| "?".to_string(), |id| id.to_string()),
					I::ID
				)))
			}
		}
	}

	/// Checks out the whole interface table behind `reference`.
	pub fn get_service_base(&self, reference: &ServiceReferenceBase) -> Result<Option<InterfaceMap>> {
		self.ensure_running()?;
		self.registry.get_service(&self.module, reference)
	}

	/// Releases one usage of `reference` held by this module.
	///
	/// Returns `Ok(false)` when the module holds no usage. When the count
	/// reaches zero for a factory service, the factory's release hook runs.
	pub fn unget_service(&self, reference: &ServiceReferenceBase) -> Result<bool> {
		self.ensure_active()?;
		self.registry.unget_service(&self.module, reference)
	}

	/// Adds a listener called synchronously for every service event whose
	/// properties match `filter`.
	pub fn add_service_listener<F>(&self, listener: F, filter: Option<&str>) -> Result<ListenerId>
	where
		F: Fn(&ServiceEvent) + Send + Sync + 'static,
	{
		self.ensure_running()?;
		let filter = Self::parse_filter(filter)?;
		Ok(self.registry.listeners.add(&self.module, filter, Box::new(listener)))
	}

	/// Removes a listener added through this module. Returns false if it
	/// was already gone.
	pub fn remove_service_listener(&self, id: ListenerId) -> Result<bool> {
		self.ensure_active()?;
		Ok(self.registry.listeners.remove(self.module.id(), id))
	}

	/// Services this module has registered and not yet unregistered.
	pub fn registered_services(&self) -> Result<Vec<ServiceRegistration>> {
		self.ensure_active()?;
		Ok(self
			.registry
			.registered_by(self.module.id())
			.iter()
			.map(|core| core.handle())
			.collect())
	}

	/// Services on which this module currently holds a usage count.
	pub fn services_in_use(&self) -> Result<Vec<ServiceReferenceBase>> {
		self.ensure_active()?;
		Ok(self.registry.used_by(self.module.id()))
	}

	/// Unloads the module: unregisters its services, releases the services it
	/// uses, and removes its listeners. Stopping twice is a no-op.
	pub fn stop(&self) -> Result<()> {
		self.registry.stop_module(&self.module);
		Ok(())
	}
}

impl fmt::Debug for ModuleContext {
	fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
		f.debug_struct("ModuleContext").field("module", &self.module).finish()
	}
}
