//! Type-erased capability tables.
//!
//! Services are published under string interface ids. [`ServiceInterface`]
//! ties an id to a Rust type (usually `dyn Trait`) so lookups stay typed at the
//! call site while the registry stores `Arc<I>` behind `dyn Any`.

use std::any::Any;
use std::fmt;
use std::sync::Arc;

/// Binds a stable interface id to a service type.
///
/// Implement it for the trait object consumers ask for:
///
/// ```
/// use plexus_registry::ServiceInterface;
///
/// pub trait Reader: Send + Sync {
/// 	fn extensions(&self) -> &[&'static str];
/// }
///
/// impl ServiceInterface for dyn Reader {
/// 	const ID: &'static str = "org.plexus.io.Reader";
/// }
/// ```
pub trait ServiceInterface: Send + Sync + 'static {
	const ID: &'static str;
}

/// A type-erased service object; holds an `Arc<I>` for some interface `I`.
pub type ErasedService = Arc<dyn Any + Send + Sync>;

/// Interface id to service object table produced by a provider.
///
/// Insertion order is preserved. Cloning only clones the `Arc`s.
#[derive(Clone, Default)]
pub struct InterfaceMap {
	entries: Vec<(String, ErasedService)>,
}

impl InterfaceMap {
	pub fn new() -> Self {
		Self::default()
	}

	/// Creates a map exposing one object under `I::ID`.
	pub fn single<I: ServiceInterface + ?Sized>(service: Arc<I>) -> Self {
		Self::new().with(service)
	}

	/// Builder-style [`insert`](Self::insert).
	pub fn with<I: ServiceInterface + ?Sized>(mut self, service: Arc<I>) -> Self {
		self.insert(service);
		self
	}

	/// Publishes `service` under `I::ID`, replacing any previous entry.
	pub fn insert<I: ServiceInterface + ?Sized>(&mut self, service: Arc<I>) {
		self.insert_erased(I::ID, Arc::new(service));
	}

	/// Publishes an already erased object. `service` must hold an `Arc<I>`
	/// for the `I` whose id is `id`, or typed lookups will miss it.
	pub fn insert_erased(&mut self, id: impl Into<String>, service: ErasedService) {
		let id = id.into();
		match self.entries.iter_mut().find(|(existing, _)| *existing == id) {
			Some(slot) => slot.1 = service,
			None => self.entries.push((id, service)),
		}
	}

	/// Typed lookup.
	pub fn get<I: ServiceInterface + ?Sized>(&self) -> Option<Arc<I>> {
		self.get_erased(I::ID)?.downcast_ref::<Arc<I>>().cloned()
	}

	pub fn get_erased(&self, id: &str) -> Option<&ErasedService> {
		self.entries.iter().find(|(existing, _)| existing == id).map(|(_, s)| s)
	}

	pub fn contains(&self, id: &str) -> bool {
		self.get_erased(id).is_some()
	}

	/// Interface ids in insertion order.
	pub fn interface_ids(&self) -> impl Iterator<Item = &str> {
		self.entries.iter().map(|(id, _)| id.as_str())
	}

	pub fn len(&self) -> usize {
		self.entries.len()
	}

	pub fn is_empty(&self) -> bool {
		self.entries.is_empty()
	}
}

impl fmt::Debug for InterfaceMap {
	fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
		f.debug_list().entries(self.interface_ids()).finish()
	}
}

#[cfg(test)]
mod tests {
	use super::*;

	trait Greeter: Send + Sync {
		fn greet(&self) -> String;
	}

	impl ServiceInterface for dyn Greeter {
		const ID: &'static str = "test.Greeter";
	}

	trait Counter: Send + Sync {
		fn count(&self) -> usize;
	}

	impl ServiceInterface for dyn Counter {
		const ID: &'static str = "test.Counter";
	}

	struct Both;

	impl Greeter for Both {
		fn greet(&self) -> String {
			"hi".into()
		}
	}

	impl Counter for Both {
		fn count(&self) -> usize {
			3
		}
	}

	#[test]
	fn one_object_under_two_interfaces() {
		let obj = Arc::new(Both);
		let map = InterfaceMap::new()
			.with::<dyn Greeter>(obj.clone())
			.with::<dyn Counter>(obj);
		assert_eq!(map.interface_ids().collect::<Vec<_>>(), ["test.Greeter", "test.Counter"]);
		assert_eq!(map.get::<dyn Greeter>().unwrap().greet(), "hi");
		assert_eq!(map.get::<dyn Counter>().unwrap().count(), 3);
	}

	#[test]
	fn mismatched_erased_entry_misses_typed_lookup() {
		let mut map = InterfaceMap::new();
		map.insert_erased("test.Greeter", Arc::new(5u32));
		assert!(map.contains("test.Greeter"));
		assert!(map.get::<dyn Greeter>().is_none());
	}

	#[test]
	fn insert_replaces_in_place() {
		let mut map = InterfaceMap::single::<dyn Greeter>(Arc::new(Both));
		map.insert::<dyn Greeter>(Arc::new(Both));
		assert_eq!(map.len(), 1);
	}
}
