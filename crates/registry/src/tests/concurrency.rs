use std::thread;

use super::*;
use crate::{ServiceEvent, ServiceReferenceBase};

const THREADS: usize = 8;
const ROUNDS: usize = 200;

#[test]
fn concurrent_get_service_creates_one_instance_per_module() {
	let (registry, ctx) = registry_with(&["provider"]);
	let (factory, stats) = CountingFactory::new("f");
	ctx[0].register_factory::<dyn Reader>(factory, PropertyMap::new()).unwrap();
	let consumers: Vec<ModuleContext> = ["a", "b"]
		.iter()
		.map(|name| registry.install_module(*name, Version::new(1, 0, 0)))
		.collect();

	let names: Vec<Vec<String>> = thread::scope(|scope| {
		let handles: Vec<_> = (0..THREADS)
			.map(|i| {
				let consumer = &consumers[i % consumers.len()];
				scope.spawn(move || {
					let reference = consumer.get_service_reference::<dyn Reader>().unwrap();
					(0..ROUNDS)
						.map(|_| consumer.get_service(&reference).unwrap().unwrap().name())
						.collect::<Vec<_>>()
				})
			})
			.collect();
		handles.into_iter().map(|handle| handle.join().unwrap()).collect()
	});

	assert_eq!(stats.created(), consumers.len());
	for (i, thread_names) in names.iter().enumerate() {
		let module = consumers[i % consumers.len()].module().name();
		assert!(thread_names.iter().all(|name| name.ends_with(&format!("@{module}"))));
		assert!(thread_names.windows(2).all(|w| w[0] == w[1]));
	}

	let reference = consumers[0].get_service_reference::<dyn Reader>().unwrap();
	let core = reference.core().unwrap();
	for consumer in &consumers {
		assert_eq!(core.usage_count(consumer.module().id()), THREADS / consumers.len() * ROUNDS);
	}
	assert_eq!(stats.released(), 0);
}

#[test]
fn registration_churn_with_listeners_and_lookups() {
	let (registry, ctx) = registry_with(&["provider", "viewer"]);
	let events = Arc::new(AtomicUsize::new(0));
	let counter = Arc::clone(&events);
	ctx[1]
		.add_service_listener(
			move |_: &ServiceEvent| {
				counter.fetch_add(1, Ordering::SeqCst);
			},
			None,
		)
		.unwrap();

	thread::scope(|scope| {
		for _ in 0..THREADS / 2 {
			let provider = &ctx[0];
			scope.spawn(move || {
				for round in 0..ROUNDS {
					let reg = provider.register_service(reader("churn"), ranked(round as i32)).unwrap();
					reg.set_properties(ranked(-(round as i32))).unwrap();
					reg.unregister().unwrap();
				}
			});
		}
		for _ in 0..THREADS / 2 {
			let viewer = &ctx[1];
			scope.spawn(move || {
				for _ in 0..ROUNDS {
					let reference = viewer.get_service_reference::<dyn Reader>().unwrap();
					// May race with unregister; a stale reference yields `None`.
					if let Some(service) = viewer.get_service(&reference).unwrap() {
						assert_eq!(service.name(), "churn");
						viewer.unget_service(&reference).unwrap();
					}
				}
			});
		}
	});

	assert_eq!(registry.service_count(), 0);
	assert_eq!(events.load(Ordering::SeqCst), THREADS / 2 * ROUNDS * 3);
	assert!(ctx[1].services_in_use().unwrap().is_empty());
}

#[test]
fn stop_racing_registrations_leaves_nothing_behind() {
	let (registry, ctx) = registry_with(&["provider"]);
	let published = AtomicUsize::new(0);

	thread::scope(|scope| {
		for _ in 0..THREADS {
			let provider = &ctx[0];
			let published = &published;
			scope.spawn(move || {
				while provider.register_service(reader("racer"), PropertyMap::new()).is_ok() {
					published.fetch_add(1, Ordering::SeqCst);
				}
			});
		}
		while published.load(Ordering::SeqCst) < ROUNDS {
			thread::yield_now();
		}
		ctx[0].stop().unwrap();
	});

	assert_eq!(registry.service_count(), 0);
	assert!(!ctx[0].module().is_active());
}

#[test]
fn cached_key_sort_tolerates_concurrent_reranking() {
	let (_registry, ctx) = registry_with(&["provider", "viewer"]);
	let regs: Vec<_> = (0..32)
		.map(|rank| ctx[0].register_service(reader("r"), ranked(rank)).unwrap())
		.collect();
	let mut refs = ctx[1].get_service_references_by_id(None, None).unwrap();

	thread::scope(|scope| {
		let regs = &regs;
		scope.spawn(move || {
			for round in 0..ROUNDS {
				for (i, reg) in regs.iter().enumerate() {
					let rank = if round % 2 == 0 { -(i as i32) } else { i as i32 };
					reg.set_properties(ranked(rank)).unwrap();
				}
			}
		});
		for _ in 0..ROUNDS {
			refs.sort_by_cached_key(ServiceReferenceBase::sort_key);
		}
	});

	assert_eq!(refs.len(), regs.len());
	refs.sort();
	assert!(refs.windows(2).all(|w| w[0].sort_key() <= w[1].sort_key()));
}
