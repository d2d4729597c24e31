//! Service listener table and synchronous event dispatch.
//!
//! # Role
//!
//! Holds every registered listener in a copy-on-write vector. Dispatch loads a
//! snapshot and calls listeners in insertion order on the mutating thread
//! with no registry lock held, so callbacks may re-enter the registry.
//!
//! # Invariants
//!
//! - Listeners added or removed during a dispatch do not affect that
//!   dispatch; they see the next one.
//! - A panicking listener is logged and skipped. The remaining listeners
//!   still run and the triggering mutation completes.

use std::any::Any;
use std::fmt;
use std::panic::{AssertUnwindSafe, catch_unwind};
use std::sync::Arc;
use std::sync::atomic::{AtomicU64, Ordering};

use arc_swap::ArcSwap;
use plexus_primitives::{Filter, PropertyMap};

use crate::event::{ServiceEvent, ServiceEventKind};
use crate::module::{Module, ModuleId};
use crate::reference::ServiceReferenceBase;

/// Token returned by `add_service_listener`, used to remove the listener.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub struct ListenerId(u64);

impl fmt::Display for ListenerId {
	fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
		write!(f, "{}", self.0)
	}
}

pub(crate) type ListenerFn = Box<dyn Fn(&ServiceEvent) + Send + Sync>;

pub(crate) struct ListenerEntry {
	id: ListenerId,
	module: Module,
	filter: Option<Filter>,
	callback: ListenerFn,
}

impl ListenerEntry {
	/// Event kind this listener should receive, or `None` to skip it.
	fn select(&self, kind: ServiceEventKind, properties: &PropertyMap, previous: Option<&PropertyMap>) -> Option<ServiceEventKind> {
		let Some(filter) = &self.filter else {
			return Some(kind);
		};
		if filter.matches(properties) {
			return Some(kind);
		}
		match (kind, previous) {
			(ServiceEventKind::Modified, Some(previous)) if filter.matches(previous) => Some(ServiceEventKind::ModifiedEndMatch),
			_ => None,
		}
	}
}

#[derive(Default)]
pub(crate) struct ListenerTable {
	next_id: AtomicU64,
	entries: ArcSwap<Vec<Arc<ListenerEntry>>>,
}

impl ListenerTable {
	pub(crate) fn add(&self, module: &Module, filter: Option<Filter>, callback: ListenerFn) -> ListenerId {
		let id = ListenerId(self.next_id.fetch_add(1, Ordering::Relaxed) + 1);
		let entry = Arc::new(ListenerEntry {
			id,
			module: module.clone(),
			filter,
			callback,
		});
		self.entries.rcu(|current| {
			let mut next = Vec::clone(current);
			next.push(Arc::clone(&entry));
			next
		});
		id
	}

	/// Removes a listener owned by `module`. Returns false if there was none.
	pub(crate) fn remove(&self, module: ModuleId, id: ListenerId) -> bool {
		let previous = self.entries.rcu(|current| {
			current
				.iter()
				.filter(|entry| !(entry.id == id && entry.module.id() == module))
				.cloned()
				.collect::<Vec<_>>()
		});
		previous.iter().any(|entry| entry.id == id && entry.module.id() == module)
	}

	/// Drops every listener owned by `module`, returning how many there were.
	pub(crate) fn remove_module(&self, module: ModuleId) -> usize {
		let previous = self.entries.rcu(|current| {
			current
				.iter()
				.filter(|entry| entry.module.id() != module)
				.cloned()
				.collect::<Vec<_>>()
		});
		previous.iter().filter(|entry| entry.module.id() == module).count()
	}

	pub(crate) fn len(&self) -> usize {
		self.entries.load().len()
	}

	/// Delivers an event to every interested listener.
	///
	/// `properties` is the snapshot filters are evaluated against. For
	/// [`ServiceEventKind::Modified`], `previous` holds the properties before
	/// the change so listeners that stop matching receive
	/// [`ServiceEventKind::ModifiedEndMatch`].
	pub(crate) fn dispatch(
		&self,
		kind: ServiceEventKind,
		reference: &ServiceReferenceBase,
		properties: &PropertyMap,
		previous: Option<&PropertyMap>,
	) {
		let snapshot = self.entries.load_full();
		for entry in snapshot.iter() {
			let Some(kind) = entry.select(kind, properties, previous) else {
				continue;
			};
			tracing::trace!(listener = %entry.id, module = %entry.module, kind = %kind, "listener.dispatch");
			let event = ServiceEvent::new(kind, reference.clone());
			if let Err(payload) = catch_unwind(AssertUnwindSafe(|| (entry.callback)(&event))) {
				tracing::error!(
					listener = %entry.id,
					module = %entry.module,
					kind = %kind,
					panic = panic_message(payload.as_ref()),
					"listener.panicked"
				);
			}
		}
	}
}

fn panic_message(payload: &(dyn Any + Send)) -> &str {
	if let Some(message) = payload.downcast_ref::<&'static str>() {
		message
	} else if let Some(message) = payload.downcast_ref::<String>() {
		message
	} else {
		"non-string panic payload"
	}
}
