//! Consumer-side handles to registered services.
//!
//! A reference shares ownership of the registration record through an `Arc`,
//! so the record outlives unregistration for as long as any handle exists.
//! Validity is tracked separately: once the service is unregistered (or its
//! module stops) every handle reports invalid and answers queries with empty
//! results.
//!
//! # Ordering
//!
//! References sort by `(valid, ranking, service id)` ascending: invalid
//! handles first, then lower rankings, then older registrations. The maximum
//! of a set is therefore the best service: highest ranking, newest on ties.

use std::cmp::Ordering;
use std::fmt;
use std::hash::{Hash, Hasher};
use std::marker::PhantomData;
use std::ops::Deref;
use std::sync::Arc;

use plexus_primitives::{PropertyMap, Value};

use crate::interface::ServiceInterface;
use crate::module::Module;
use crate::registration::{RegistrationCore, ServiceId};

/// Untyped reference to a registered service.
///
/// The default value is an invalid reference that points at nothing.
#[derive(Clone, Default)]
pub struct ServiceReferenceBase {
	core: Option<Arc<RegistrationCore>>,
}

impl ServiceReferenceBase {
	pub(crate) fn from_core(core: Arc<RegistrationCore>) -> Self {
		Self { core: Some(core) }
	}

	pub(crate) fn core(&self) -> Option<&Arc<RegistrationCore>> {
		self.core.as_ref()
	}

	fn valid_core(&self) -> Option<&Arc<RegistrationCore>> {
		self.core.as_ref().filter(|core| core.is_valid())
	}

	/// True while the service is registered and its module is active.
	pub fn is_valid(&self) -> bool {
		self.valid_core().is_some()
	}

	/// Id of the referenced registration, kept after unregistration.
	pub fn service_id(&self) -> Option<ServiceId> {
		self.core.as_ref().map(|core| core.id)
	}

	/// Current ranking; 0 for invalid references.
	pub fn ranking(&self) -> i32 {
		self.valid_core().map_or(0, |core| core.ranking())
	}

	/// Property value, or `None` if absent or the reference is invalid.
	pub fn property(&self, key: &str) -> Option<Value> {
		self.valid_core()?.property(key)
	}

	/// Property keys in insertion order.
	pub fn property_keys(&self) -> Vec<String> {
		self.valid_core().map(|core| core.property_keys()).unwrap_or_default()
	}

	/// Snapshot of all properties.
	pub fn properties(&self) -> PropertyMap {
		self.valid_core().map(|core| core.properties()).unwrap_or_default()
	}

	/// Module that registered the service.
	pub fn module(&self) -> Option<Module> {
		self.valid_core().map(|core| core.owner.clone())
	}

	/// Interface ids the service is published under.
	pub fn interfaces(&self) -> &[String] {
		match self.valid_core() {
			Some(core) => &core.interfaces,
			None => &[],
		}
	}

	/// Modules currently holding a usage count on the service.
	pub fn using_modules(&self) -> Vec<Module> {
		self.valid_core().map(|core| core.using_modules()).unwrap_or_default()
	}

	/// Narrows to a typed reference if the service is published under `I::ID`.
	pub fn cast<I: ServiceInterface + ?Sized>(&self) -> Option<ServiceReference<I>> {
		self.interfaces()
			.iter()
			.any(|id| id == I::ID)
			.then(|| ServiceReference::new(self.clone()))
	}

	/// Snapshot of the `(valid, ranking, service id)` triple this reference
	/// orders by.
	///
	/// The key is read once, so it stays consistent while other threads
	/// modify or unregister the service. Prefer
	/// `refs.sort_by_cached_key(ServiceReferenceBase::sort_key)` over
	/// `refs.sort()` when providers may be changing the services concurrently.
	pub fn sort_key(&self) -> (bool, i32, i64) {
		match &self.core {
			None => (false, i32::MIN, i64::MIN),
			Some(core) if core.is_valid() => (true, core.ranking(), core.id.get()),
			Some(core) => (false, i32::MIN, core.id.get()),
		}
	}
}

impl PartialEq for ServiceReferenceBase {
	fn eq(&self, other: &Self) -> bool {
		match (&self.core, &other.core) {
			(Some(a), Some(b)) => Arc::ptr_eq(a, b),
			(None, None) => true,
			_ => false,
		}
	}
}

impl Eq for ServiceReferenceBase {}

impl Hash for ServiceReferenceBase {
	fn hash<H: Hasher>(&self, state: &mut H) {
		self.core.as_ref().map(Arc::as_ptr).hash(state);
	}
}

impl PartialOrd for ServiceReferenceBase {
	fn partial_cmp(&self, other: &Self) -> Option<Ordering> {
		Some(self.cmp(other))
	}
}

/// Orders by [`sort_key`](ServiceReferenceBase::sort_key).
///
/// Each comparison reads the live ranking and validity. If another thread
/// changes them mid-sort, the order is inconsistent and `slice::sort` may
/// panic. Sort by a cached key in that case.
impl Ord for ServiceReferenceBase {
	fn cmp(&self, other: &Self) -> Ordering {
		self.sort_key().cmp(&other.sort_key())
	}
}

impl fmt::Debug for ServiceReferenceBase {
	fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
		f.debug_struct("ServiceReference")
			.field("id", &self.service_id())
			.field("valid", &self.is_valid())
			.finish()
	}
}

/// Renders `<module> (<k1>=<v1>,<k2>=<v2>,...)` in property order.
impl fmt::Display for ServiceReferenceBase {
	fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
		match self.valid_core() {
			Some(core) => write!(f, "{} ({})", core.owner, core.properties()),
			None => f.write_str("Invalid service reference"),
		}
	}
}

/// Reference typed by the interface it was looked up under.
pub struct ServiceReference<I: ?Sized> {
	base: ServiceReferenceBase,
	_interface: PhantomData<fn() -> Arc<I>>,
}

impl<I: ?Sized> ServiceReference<I> {
	pub(crate) fn new(base: ServiceReferenceBase) -> Self {
		Self {
			base,
			_interface: PhantomData,
		}
	}

	pub fn as_base(&self) -> &ServiceReferenceBase {
		&self.base
	}

	pub fn into_base(self) -> ServiceReferenceBase {
		self.base
	}
}

impl<I: ?Sized> Deref for ServiceReference<I> {
	type Target = ServiceReferenceBase;

	fn deref(&self) -> &ServiceReferenceBase {
		&self.base
	}
}

impl<I: ?Sized> From<ServiceReference<I>> for ServiceReferenceBase {
	fn from(reference: ServiceReference<I>) -> Self {
		reference.base
	}
}

impl<I: ?Sized> Clone for ServiceReference<I> {
	fn clone(&self) -> Self {
		Self::new(self.base.clone())
	}
}

impl<I: ?Sized> Default for ServiceReference<I> {
	fn default() -> Self {
		Self::new(ServiceReferenceBase::default())
	}
}

impl<I: ?Sized> PartialEq for ServiceReference<I> {
	fn eq(&self, other: &Self) -> bool {
		self.base == other.base
	}
}

impl<I: ?Sized> PartialEq<ServiceReferenceBase> for ServiceReference<I> {
	fn eq(&self, other: &ServiceReferenceBase) -> bool {
		&self.base == other
	}
}

impl<I: ?Sized> Eq for ServiceReference<I> {}

impl<I: ?Sized> Hash for ServiceReference<I> {
	fn hash<H: Hasher>(&self, state: &mut H) {
		self.base.hash(state);
	}
}

impl<I: ?Sized> PartialOrd for ServiceReference<I> {
	fn partial_cmp(&self, other: &Self) -> Option<Ordering> {
		Some(self.cmp(other))
	}
}

impl<I: ?Sized> Ord for ServiceReference<I> {
	fn cmp(&self, other: &Self) -> Ordering {
		self.base.cmp(&other.base)
	}
}

impl<I: ?Sized> fmt::Debug for ServiceReference<I> {
	fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
		fmt::Debug::fmt(&self.base, f)
	}
}

impl<I: ?Sized> fmt::Display for ServiceReference<I> {
	fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
		fmt::Display::fmt(&self.base, f)
	}
}
