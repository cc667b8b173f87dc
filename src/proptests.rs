use std::collections::BTreeMap;

use proptest::prelude::*;
use proptest_derive::Arbitrary;

use crate::art::{ArtIndex, Visitor};
use crate::rowid::RowIdChain;

/// Actions to run against the tree and the reference model.
#[derive(Arbitrary, Debug, Clone)]
enum Action {
    Insert(Key),
    InsertNull,
    Reset,
}

/// Wrapper for key generation with a custom strategy.
#[derive(Debug, Clone)]
struct Key(Vec<u8>);

impl Arbitrary for Key {
    type Parameters = ();
    type Strategy = BoxedStrategy<Self>;

    fn arbitrary_with(_: Self::Parameters) -> Self::Strategy {
        prop_oneof![
            // Tiny alphabet maximises shared prefixes and duplicates.
            prop::collection::vec(prop::sample::select(vec![b'a', b'b', b'c']), 1..10)
                .prop_map(Key),
            // Arbitrary bytes, including 0x00 and the 0x80 sign-flip
            // boundary the F16 layout is sensitive to.
            prop::collection::vec(any::<u8>(), 1..24).prop_map(Key),
            // Delimited shapes to exercise prefix carving.
            "[ab]{1,6}/[ab]{1,6}".prop_map(|s| Key(s.into_bytes())),
        ]
        .boxed()
    }
}

/// Collects `(key, chain)` pairs in traversal order.
#[derive(Default)]
struct Collect(Vec<(Vec<u8>, Vec<u32>)>);

impl Visitor for Collect {
    fn visit_key(&mut self, key: &[u8], rows: RowIdChain<'_>) {
        self.0.push((key.to_vec(), rows.collect()));
    }
}

/// Executes actions against both the tree and a `BTreeMap` model,
/// assigning each insertion the next fresh row-id.
struct Test {
    tree: ArtIndex,
    keys: BTreeMap<Vec<u8>, Vec<u32>>,
    nulls: Vec<u32>,
    next_row: u32,
    total: usize,
    max_len: usize,
}

impl Test {
    fn new(capacity: usize) -> Self {
        Self {
            tree: ArtIndex::new(capacity),
            keys: BTreeMap::new(),
            nulls: Vec::new(),
            next_row: 0,
            total: 0,
            max_len: 0,
        }
    }

    fn execute(&mut self, action: Action) {
        match action {
            Action::Insert(key) => {
                self.tree.add_entry(&key.0, self.next_row);
                self.keys.entry(key.0.clone()).or_default().push(self.next_row);
                self.total += key.0.len();
                self.max_len = self.max_len.max(key.0.len());
                self.next_row += 1;
            }
            Action::InsertNull => {
                self.tree.add_null(self.next_row);
                self.nulls.push(self.next_row);
                self.next_row += 1;
            }
            Action::Reset => {
                self.tree.reset();
                self.keys.clear();
                self.nulls.clear();
                self.total = 0;
                self.max_len = 0;
            }
        }
    }

    fn check(&self) {
        let mut out = Collect::default();
        self.tree.traverse(&mut out);

        // Lexicographic key order with most-recent-first chains.
        let expected: Vec<(Vec<u8>, Vec<u32>)> = self
            .keys
            .iter()
            .map(|(key, rows)| (key.clone(), rows.iter().rev().copied().collect()))
            .collect();
        assert_eq!(out.0, expected);

        let expected_nulls: Vec<u32> = self.nulls.iter().rev().copied().collect();
        assert_eq!(self.tree.null_rows().collect::<Vec<u32>>(), expected_nulls);
        assert_eq!(self.tree.null_count() as usize, self.nulls.len());

        assert_eq!(
            self.tree.unique_key_count(),
            self.keys.len() + usize::from(!self.nulls.is_empty())
        );
        assert_eq!(self.tree.total_key_bytes(), self.total);
        assert_eq!(self.tree.max_key_length(), self.max_len);

        let issues = self.tree.verify();
        assert!(issues.is_empty(), "integrity issues: {issues:?}");
    }
}

proptest! {
    #![proptest_config(ProptestConfig {
        cases: 256,
        failure_persistence: None,
        ..ProptestConfig::default()
    })]

    #[test]
    fn proptest_vs_btreemap(actions in prop::collection::vec(any::<Action>(), 1..64)) {
        let mut test = Test::new(actions.len());
        for action in actions {
            test.execute(action);
        }
        test.check();
    }

    #[test]
    fn proptest_join_equals_model(
        entries in prop::collection::vec((any::<Key>(), any::<bool>()), 1..80),
    ) {
        let mut recipient = ArtIndex::new(entries.len());
        let mut donor = recipient.split();

        let mut recipient_rows: BTreeMap<Vec<u8>, Vec<u32>> = BTreeMap::new();
        let mut donor_rows: BTreeMap<Vec<u8>, Vec<u32>> = BTreeMap::new();

        for (row, (key, to_donor)) in entries.iter().enumerate() {
            let row = row as u32;
            if *to_donor {
                donor.add_entry(&key.0, row);
                donor_rows.entry(key.0.clone()).or_default().push(row);
            } else {
                recipient.add_entry(&key.0, row);
                recipient_rows.entry(key.0.clone()).or_default().push(row);
            }
        }

        recipient.join(donor);

        // Per key: the donor's run is more recent than the recipient's,
        // and each run stays most-recent-first.
        let mut expected: BTreeMap<Vec<u8>, Vec<u32>> = BTreeMap::new();
        for (key, rows) in &recipient_rows {
            expected.entry(key.clone()).or_default().extend(rows.iter().rev());
        }
        for (key, rows) in &donor_rows {
            let chain = expected.entry(key.clone()).or_default();
            let mut merged: Vec<u32> = rows.iter().rev().copied().collect();
            merged.extend(chain.iter().copied());
            *chain = merged;
        }

        let mut out = Collect::default();
        recipient.traverse(&mut out);
        let expected: Vec<(Vec<u8>, Vec<u32>)> = expected.into_iter().collect();
        assert_eq!(out.0, expected);
        assert_eq!(recipient.unique_key_count(), expected.len());

        let issues = recipient.verify();
        assert!(issues.is_empty(), "integrity issues: {issues:?}");
    }
}
