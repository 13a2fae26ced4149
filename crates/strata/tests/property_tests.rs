//! Property-based tests for composite round trips and range scans.

mod common;

use std::collections::{BTreeMap, BTreeSet};

use proptest::prelude::*;

use common::{Person, PersonSchema, Phone};
use strata::backends::MemoryEngine;
use strata::{CompositeStore, Range, StorageEngine, Transaction};

fn arb_phone() -> impl Strategy<Value = Phone> {
    ("[0-9]{3}-[0-9]{4}", any::<bool>()).prop_map(|(number, mobile)| Phone { number, mobile })
}

fn arb_person() -> impl Strategy<Value = Person> {
    (
        any::<u64>(),
        "[a-zA-Z ]{0,16}",
        proptest::option::of("[a-z0-9.]{1,12}@[a-z]{1,8}"),
        proptest::option::of(prop::collection::btree_map(
            "[a-z0-9_-]{1,8}",
            arb_phone().prop_map(Some),
            0..6,
        )),
    )
        .prop_map(|(id, name, email, phones)| Person { id, name, email, phones })
}

proptest! {
    #[test]
    fn prop_composite_round_trip(original in arb_person()) {
        let engine = MemoryEngine::new();
        let store = CompositeStore::new();

        let mut tx = engine.begin_write().expect("failed to begin write");
        store.put_composite::<PersonSchema>(&mut tx, &original).expect("failed to put");
        tx.commit().expect("failed to commit");

        let tx = engine.begin_read().expect("failed to begin read");
        let composite = store
            .get_composite::<PersonSchema>(&tx, &original.id)
            .expect("failed to get")
            .expect("composite not found");

        // An empty container writes no rows and reads back as no container.
        let mut expected = original;
        if expected.phones.as_ref().is_some_and(BTreeMap::is_empty) {
            expected.phones = None;
        }
        prop_assert!(composite.is_complete());
        prop_assert_eq!(composite.value, expected);
    }

    #[test]
    fn prop_range_matches_filtered_identities(
        ids in prop::collection::btree_set(0u64..1000, 0..40),
        first in 0u64..1000,
        last in 0u64..1000,
    ) {
        let engine = MemoryEngine::new();
        let store = CompositeStore::new();

        let mut tx = engine.begin_write().expect("failed to begin write");
        for id in &ids {
            let person = Person { id: *id, ..Person::default() };
            store.put_composite::<PersonSchema>(&mut tx, &person).expect("failed to put");
        }
        tx.commit().expect("failed to commit");

        let tx = engine.begin_read().expect("failed to begin read");
        let got: Vec<u64> = store
            .get_composite_range::<PersonSchema>(&tx, &Range::new(first, last))
            .expect("failed to read range")
            .into_iter()
            .map(|c| c.value.id)
            .collect();
        let expected: Vec<u64> =
            ids.iter().copied().filter(|id| (first..=last).contains(id)).collect();
        prop_assert_eq!(got, expected);
    }

    #[test]
    fn prop_del_range_removes_exactly_the_range(
        ids in prop::collection::btree_set(0u64..200, 1..30),
        first in 0u64..200,
        width in 0u64..100,
    ) {
        let engine = MemoryEngine::new();
        let store = CompositeStore::new();
        let last = first + width;

        let mut tx = engine.begin_write().expect("failed to begin write");
        for id in &ids {
            let person = Person { id: *id, ..Person::default() };
            store.put_composite::<PersonSchema>(&mut tx, &person).expect("failed to put");
        }
        let deleted = store
            .del_composite_range::<PersonSchema>(&mut tx, &Range::new(first, last))
            .expect("failed to delete range");
        tx.commit().expect("failed to commit");

        let in_range: BTreeSet<u64> =
            ids.iter().copied().filter(|id| (first..=last).contains(id)).collect();
        prop_assert_eq!(deleted, in_range.iter().copied().collect::<Vec<_>>());

        let tx = engine.begin_read().expect("failed to begin read");
        for id in &ids {
            let present = store.has_composite::<PersonSchema>(&tx, id).expect("has composite");
            prop_assert_eq!(present, !in_range.contains(id));
        }
    }
}
