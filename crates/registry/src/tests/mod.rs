//! Registry behavior tests: ordering, factories, listeners, lifecycle and
//! concurrent access.

mod concurrency;
mod ordering;

use std::sync::Arc;
use std::sync::atomic::{AtomicBool, AtomicUsize, Ordering};

use parking_lot::Mutex;
use plexus_primitives::{PropertyMap, SERVICE_RANKING};

use crate::{InterfaceMap, Module, ModuleContext, PrototypeServiceFactory, Registry, ServiceInterface, ServiceRegistration, Version};

pub(super) trait Reader: Send + Sync + std::fmt::Debug {
	fn name(&self) -> String;
}

impl ServiceInterface for dyn Reader {
	const ID: &'static str = "test.io.Reader";
}

pub(super) trait Writer: Send + Sync {
	fn write(&self, data: &str) -> usize;
}

impl ServiceInterface for dyn Writer {
	const ID: &'static str = "test.io.Writer";
}

#[derive(Debug)]
pub(super) struct NamedReader(pub String);

impl Reader for NamedReader {
	fn name(&self) -> String {
		self.0.clone()
	}
}

impl Writer for NamedReader {
	fn write(&self, data: &str) -> usize {
		data.len()
	}
}

pub(super) fn reader(name: &str) -> Arc<dyn Reader> {
	Arc::new(NamedReader(name.to_string()))
}

pub(super) fn props(entries: &[(&str, &str)]) -> PropertyMap {
	entries.iter().map(|(k, v)| (*k, *v)).collect()
}

pub(super) fn ranked(ranking: i32) -> PropertyMap {
	PropertyMap::new().with(SERVICE_RANKING, ranking)
}

pub(super) fn registry_with(modules: &[&str]) -> (Registry, Vec<ModuleContext>) {
	let _ = tracing_subscriber::fmt().with_test_writer().try_init();
	let registry = Registry::new();
	let contexts = modules
		.iter()
		.map(|name| registry.install_module(*name, Version::new(1, 0, 0)))
		.collect();
	(registry, contexts)
}

/// Shared counters observed by tests while the registry owns the factory.
#[derive(Default)]
pub(super) struct FactoryStats {
	pub created: AtomicUsize,
	pub released: AtomicUsize,
	pub fail_get: AtomicBool,
	pub fail_unget: AtomicBool,
	/// `(consumer module name, instance name)` per release, in order.
	pub releases: Mutex<Vec<(String, String)>>,
}

impl FactoryStats {
	pub fn created(&self) -> usize {
		self.created.load(Ordering::SeqCst)
	}

	pub fn released(&self) -> usize {
		self.released.load(Ordering::SeqCst)
	}
}

/// Produces a fresh `NamedReader` per consuming module.
pub(super) struct CountingFactory {
	pub label: String,
	pub stats: Arc<FactoryStats>,
}

impl CountingFactory {
	pub fn new(label: &str) -> (Self, Arc<FactoryStats>) {
		let stats = Arc::new(FactoryStats::default());
		(
			Self {
				label: label.to_string(),
				stats: Arc::clone(&stats),
			},
			stats,
		)
	}
}

impl PrototypeServiceFactory for CountingFactory {
	fn get_service(&self, module: &Module, _registration: &ServiceRegistration) -> anyhow::Result<InterfaceMap> {
		if self.stats.fail_get.load(Ordering::SeqCst) {
			anyhow::bail!("{} refused {}", self.label, module.name());
		}
		let n = self.stats.created.fetch_add(1, Ordering::SeqCst) + 1;
		Ok(InterfaceMap::single::<dyn Reader>(reader(&format!("{}#{n}@{}", self.label, module.name()))))
	}

	fn unget_service(&self, module: &Module, _registration: &ServiceRegistration, service: InterfaceMap) -> anyhow::Result<()> {
		if self.stats.fail_unget.load(Ordering::SeqCst) {
			anyhow::bail!("{} cannot release", self.label);
		}
		let name = service.get::<dyn Reader>().map(|r| r.name()).unwrap_or_default();
		self.stats.released.fetch_add(1, Ordering::SeqCst);
		self.stats.releases.lock().push((module.name().to_string(), name));
		Ok(())
	}
}
