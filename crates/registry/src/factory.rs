use crate::interface::InterfaceMap;
use crate::module::Module;
use crate::registration::ServiceRegistration;

/// Provider hook producing a private service instance per consuming module.
///
/// The registry calls [`get_service`](Self::get_service) the first time a
/// module checks the service out and caches the result for that module until
/// its usage count drops back to zero, at which point
/// [`unget_service`](Self::unget_service) receives the instance. Both calls run
/// without any registry lock held.
///
/// Errors propagate to the consumer unchanged; the registry's usage counts are
/// left as they were before the failing call.
pub trait PrototypeServiceFactory: Send + Sync + 'static {
	/// Creates the instance handed to `module`.
	fn get_service(&self, module: &Module, registration: &ServiceRegistration) -> anyhow::Result<InterfaceMap>;

	/// Releases an instance previously created for `module`.
	fn unget_service(
		&self,
		module: &Module,
		registration: &ServiceRegistration,
		service: InterfaceMap,
	) -> anyhow::Result<()> {
		let _ = (module, registration, service);
		Ok(())
	}
}

impl<F> PrototypeServiceFactory for F
where
	F: Fn(&Module, &ServiceRegistration) -> anyhow::Result<InterfaceMap> + Send + Sync + 'static,
{
	fn get_service(&self, module: &Module, registration: &ServiceRegistration) -> anyhow::Result<InterfaceMap> {
		self(module, registration)
	}
}
