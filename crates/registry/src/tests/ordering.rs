use plexus_primitives::{PropertyMap, SERVICE_ID, SERVICE_RANKING, Value};
use proptest::prelude::*;

use super::*;
use crate::ServiceReferenceBase;

#[test]
fn newest_of_equal_rank_wins() {
	let (_registry, ctx) = registry_with(&["provider", "consumer"]);
	let _r1 = ctx[0].register_service(reader("first"), ranked(5)).unwrap();
	let r2 = ctx[0].register_service(reader("second"), ranked(5)).unwrap();

	let best = ctx[1].get_service_reference::<dyn Reader>().unwrap();
	assert_eq!(best, r2.reference());
	assert_eq!(ctx[1].get_service(&best).unwrap().unwrap().name(), "second");
}

#[test]
fn highest_rank_wins_regardless_of_order() {
	let (_registry, ctx) = registry_with(&["provider", "consumer"]);
	let high = ctx[0].register_service(reader("high"), ranked(10)).unwrap();
	let _low = ctx[0].register_service(reader("low"), ranked(-3)).unwrap();
	let _none = ctx[0].register_service(reader("default"), PropertyMap::new()).unwrap();

	let best = ctx[1].get_service_reference::<dyn Reader>().unwrap();
	assert_eq!(best, high.reference());
	assert_eq!(best.ranking(), 10);
}

#[test]
fn set_properties_reranks_lookup() {
	let (_registry, ctx) = registry_with(&["provider"]);
	let a = ctx[0].register_service(reader("a"), ranked(1)).unwrap();
	let b = ctx[0].register_service(reader("b"), ranked(0)).unwrap();
	assert_eq!(ctx[0].get_service_reference::<dyn Reader>().unwrap(), a.reference());

	b.set_properties(ranked(2)).unwrap();
	assert_eq!(ctx[0].get_service_reference::<dyn Reader>().unwrap(), b.reference());
}

#[test]
fn non_integer_ranking_counts_as_zero() {
	let (_registry, ctx) = registry_with(&["provider"]);
	let a = ctx[0].register_service(reader("a"), ranked(0)).unwrap();
	let b = ctx[0]
		.register_service(reader("b"), PropertyMap::new().with(SERVICE_RANKING, "high"))
		.unwrap();
	assert_eq!(b.reference().ranking(), 0);
	// Same rank as `a`, newer, so it still wins the tie.
	assert_eq!(ctx[0].get_service_reference::<dyn Reader>().unwrap(), b.reference());
	assert!(a.reference() < b.reference());
}

#[test]
fn cached_key_sort_matches_ord() {
	let (_registry, ctx) = registry_with(&["provider"]);
	let regs: Vec<_> = [3, -1, 3, 0]
		.into_iter()
		.map(|rank| ctx[0].register_service(reader("r"), ranked(rank)).unwrap())
		.collect();
	regs[3].unregister().unwrap();

	let mut by_ord: Vec<ServiceReferenceBase> = regs.iter().map(ServiceRegistration::reference).collect();
	let mut by_key = by_ord.clone();
	by_ord.sort();
	by_key.sort_by_cached_key(ServiceReferenceBase::sort_key);
	assert_eq!(by_ord, by_key);

	let keys: Vec<_> = by_key.iter().map(ServiceReferenceBase::sort_key).collect();
	assert_eq!(keys, [(false, i32::MIN, 4), (true, -1, 2), (true, 3, 1), (true, 3, 3)]);
	assert_eq!(ServiceReferenceBase::default().sort_key(), (false, i32::MIN, i64::MIN));
}

#[test]
fn invalid_references_sort_first() {
	let (_registry, ctx) = registry_with(&["provider"]);
	let live = ctx[0].register_service(reader("live"), ranked(-100)).unwrap();
	let gone = ctx[0].register_service(reader("gone"), ranked(100)).unwrap();
	let gone_ref = gone.reference();
	gone.unregister().unwrap();

	assert!(ServiceReferenceBase::default() < live.reference());
	assert!(gone_ref < live.reference());
	assert_eq!(ServiceReferenceBase::default(), ServiceReferenceBase::default());
	assert_ne!(ServiceReferenceBase::default(), live.reference());
}

#[test]
fn independent_lookups_yield_equal_references() {
	let (_registry, ctx) = registry_with(&["provider", "consumer"]);
	let reg = ctx[0]
		.register_service(reader("x"), props(&[("mimetype", "image/png"), ("description", "PNG")]))
		.unwrap();

	let a = ctx[1].get_service_reference::<dyn Reader>().unwrap();
	let b = ctx[1].get_service_references::<dyn Reader>(Some("(mimetype=image/png)")).unwrap().remove(0);
	assert_eq!(a, b);
	assert_eq!(a, reg.reference());
	for key in a.property_keys() {
		assert_eq!(a.property(&key), b.property(&key));
	}
}

#[test]
fn registered_properties_round_trip_with_injected_keys() {
	let (_registry, ctx) = registry_with(&["provider"]);
	let reg = ctx[0]
		.register_service(
			reader("x"),
			props(&[("mimetype", "image/png"), (SERVICE_ID, "forged"), ("description", "PNG")]),
		)
		.unwrap();
	let other = ctx[0].register_service(reader("y"), PropertyMap::new()).unwrap();
	other.set_properties(props(&[("mimetype", "text/plain")])).unwrap();

	let reference = ctx[0].get_service_references_by_id(Some(<dyn Reader as ServiceInterface>::ID), Some("(description=PNG)")).unwrap();
	assert_eq!(reference.len(), 1);
	let reference = &reference[0];
	assert_eq!(reference.property("mimetype"), Some(Value::from("image/png")));
	assert_eq!(reference.property("description"), Some(Value::from("PNG")));
	assert_eq!(reference.property(SERVICE_ID), Some(Value::Long(reg.service_id().get())));
	assert_eq!(reference.property(SERVICE_RANKING), Some(Value::Int(0)));
	assert_eq!(
		reference.property_keys(),
		["objectclass", "service.id", "mimetype", "description", "service.ranking"]
	);
	assert_eq!(reference.property("missing"), None);
}

#[test]
fn service_ids_increase_and_are_not_reused() {
	let (registry, ctx) = registry_with(&["provider"]);
	let a = ctx[0].register_service(reader("a"), PropertyMap::new()).unwrap();
	let a_id = a.service_id();
	a.unregister().unwrap();
	let b = ctx[0].register_service(reader("b"), PropertyMap::new()).unwrap();
	assert_eq!(a_id.get(), 1);
	assert!(b.service_id() > a_id);
	assert_eq!(registry.service_count(), 1);
}

proptest! {
	#[test]
	fn best_reference_is_max_rank_then_newest(rankings in proptest::collection::vec(-3i32..4, 1..12)) {
		let (_registry, ctx) = registry_with(&["provider"]);
		let registrations: Vec<_> = rankings
			.iter()
			.map(|rank| ctx[0].register_service(reader("r"), ranked(*rank)).unwrap())
			.collect();

		let top = *rankings.iter().max().unwrap();
		let expected = rankings.iter().rposition(|rank| *rank == top).unwrap();
		let best = ctx[0].get_service_reference::<dyn Reader>().unwrap();
		prop_assert_eq!(best.as_base(), &registrations[expected].reference());

		let mut sorted = ctx[0].get_service_references::<dyn Reader>(None).unwrap();
		sorted.sort();
		for pair in sorted.windows(2) {
			let (lo, hi) = (&pair[0], &pair[1]);
			prop_assert!(
				lo.ranking() < hi.ranking()
					|| (lo.ranking() == hi.ranking() && lo.service_id() < hi.service_id())
			);
		}
	}
}
