//! Property tests for the snapshot history.
//!
//! 1. N adds then N undos reach the initial state, N redos reach the last
//! 2. Undo/redo disabled predicates track the current index exactly
//! 3. Index 0 survives any amount of eviction and length stays bounded
//! 4. Arbitrary operation sequences keep the index in range

use proptest::prelude::*;
use textcomposer_core::{HistoryManager, Snapshot, TextElement, snapshot_of};

// ── Strategies ──────────────────────────────────────────────────────────

#[derive(Debug, Clone)]
enum Op {
    Add(u32),
    Undo,
    Redo,
    Reset,
}

fn op_strategy() -> impl Strategy<Value = Op> {
    prop_oneof![
        3 => any::<u32>().prop_map(Op::Add),
        2 => Just(Op::Undo),
        2 => Just(Op::Redo),
        1 => Just(Op::Reset),
    ]
}

fn marker(tag: u32) -> Snapshot {
    snapshot_of(&[TextElement::with_id(format!("el-{tag}"), tag as f64, 0.0)])
}

fn tag_of(snapshot: &Snapshot) -> Option<String> {
    snapshot.first().map(|el| el.id.to_string())
}

// ═══════════════════════════════════════════════════════════════════════
// 1. Round trip
// ═══════════════════════════════════════════════════════════════════════

proptest! {
    #[test]
    fn undo_all_then_redo_all_round_trips(n in 1usize..19) {
        let mut history = HistoryManager::default();
        history.initialize(snapshot_of(&[]));
        for i in 0..n {
            history.add(marker(i as u32));
        }

        let mut last = None;
        for _ in 0..n {
            last = history.undo();
            prop_assert!(last.is_some());
        }
        prop_assert!(last.unwrap().is_empty());
        prop_assert!(history.is_undo_disabled());

        let mut top = None;
        for _ in 0..n {
            top = history.redo();
        }
        prop_assert_eq!(tag_of(&top.unwrap()), Some(format!("el-{}", n - 1)));
        prop_assert!(history.is_redo_disabled());
    }
}

// ═══════════════════════════════════════════════════════════════════════
// 2. Disabled predicates
// ═══════════════════════════════════════════════════════════════════════

proptest! {
    #[test]
    fn predicates_match_index(ops in prop::collection::vec(op_strategy(), 0..80)) {
        let mut history = HistoryManager::default();
        history.initialize(snapshot_of(&[]));
        prop_assert!(history.is_undo_disabled());
        prop_assert!(history.is_redo_disabled());

        for op in ops {
            match op {
                Op::Add(tag) => history.add(marker(tag)),
                Op::Undo => { history.undo(); }
                Op::Redo => { history.redo(); }
                Op::Reset => { history.reset_to_initial(); }
            }
            prop_assert_eq!(history.is_undo_disabled(), history.current_index() == 0);
            prop_assert_eq!(
                history.is_redo_disabled(),
                history.current_index() == history.len() - 1
            );
        }
    }
}

// ═══════════════════════════════════════════════════════════════════════
// 3. Eviction never touches index 0
// ═══════════════════════════════════════════════════════════════════════

proptest! {
    #[test]
    fn initial_state_survives_eviction(extra in 0usize..40, capacity in 2usize..30) {
        let mut history = HistoryManager::new(capacity);
        history.initialize(marker(u32::MAX));
        for i in 0..(capacity + extra) {
            history.add(marker(i as u32));
            prop_assert!(history.len() <= capacity);
        }
        while history.undo().is_some() {}
        prop_assert_eq!(tag_of(&history.current().unwrap()), Some(format!("el-{}", u32::MAX)));
    }

    #[test]
    fn index_stays_in_range(ops in prop::collection::vec(op_strategy(), 0..120)) {
        let mut history = HistoryManager::new(6);
        for op in ops {
            match op {
                Op::Add(tag) => history.add(marker(tag)),
                Op::Undo => { history.undo(); }
                Op::Redo => { history.redo(); }
                Op::Reset => { history.reset_to_initial(); }
            }
            if history.is_initialized() {
                prop_assert!(history.current_index() < history.len());
                prop_assert!(history.len() <= 6);
            }
        }
    }
}

#[test]
fn twenty_five_edits_with_capacity_twenty() {
    let mut history = HistoryManager::new(20);
    history.initialize(snapshot_of(&[]));
    for i in 0..25 {
        history.add(marker(i));
        assert!(history.len() <= 20);
    }
    assert_eq!(history.len(), 20);
    assert_eq!(history.current_index(), 19);

    let mut steps = 0;
    while history.undo().is_some() {
        steps += 1;
    }
    assert_eq!(steps, 19);
    assert!(history.current().unwrap().is_empty());
}
