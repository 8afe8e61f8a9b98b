//! Property-based tests for the member tree
//!
//! These hold for any sequence of distinct member names:
//!  - level-order labels are gapless and unique
//!  - every member stays reachable through its root-to-node path
//!  - deleting a member removes it and nothing else
//!  - the persisted tree reloads to the same structure

use kemtree::{index, MemberTree, NodeKind, StoreConfig, Timestamp, TreeStore};
use proptest::prelude::*;
use std::collections::HashSet;
use tempfile::tempdir;

/// Distinct member names in arbitrary order
fn member_names(max: usize) -> impl Strategy<Value = Vec<String>> {
    prop::collection::btree_set("m[a-z]{1,6}", 1..max)
        .prop_flat_map(|names| Just(names.into_iter().collect::<Vec<_>>()).prop_shuffle())
}

fn build(names: &[String]) -> MemberTree {
    let mut tree = MemberTree::new();
    for name in names {
        tree.insert(name.clone(), name.as_bytes().to_vec()).unwrap();
    }
    tree
}

fn fast_config(dir: &std::path::Path) -> StoreConfig {
    StoreConfig {
        sync_writes: false,
        ..StoreConfig::with_data_dir(dir)
    }
}

fn assert_gapless(tree: &MemberTree) {
    let mut labels: Vec<usize> = tree.breadth_first().map(|node| node.index()).collect();
    let in_bfs_order = labels.clone();
    labels.sort_unstable();
    assert_eq!(labels, (0..tree.len()).collect::<Vec<_>>());
    assert_eq!(in_bfs_order, labels, "labels must follow breadth-first order");
}

proptest! {
    #[test]
    fn prop_indices_are_gapless(names in member_names(40)) {
        let tree = build(&names);
        assert_gapless(&tree);
        prop_assert_eq!(tree.leaf_count(), names.len());
        prop_assert_eq!(tree.len(), 2 * names.len() - 1);
    }

    #[test]
    fn prop_every_member_reachable(names in member_names(30)) {
        let tree = build(&names);
        let root = tree.root().unwrap().name().to_string();
        for name in &names {
            let path = tree.path(name).unwrap();
            prop_assert_eq!(path.first().unwrap().name(), root.as_str());
            prop_assert_eq!(path.last().unwrap().name(), name.as_str());
            for pair in path.windows(2) {
                let parent = tree.parent_of(pair[1].id()).unwrap();
                prop_assert_eq!(parent.id(), pair[0].id());
            }
        }
    }

    #[test]
    fn prop_structure_parents_are_actual(names in member_names(30)) {
        let tree = build(&names);
        let structure = tree.structure();
        prop_assert_eq!(structure.len(), tree.len());
        for info in structure.values() {
            for child in [&info.left_child, &info.right_child].into_iter().flatten() {
                prop_assert_eq!(structure[child].parent_index, Some(info.node_index));
            }
        }
    }

    #[test]
    fn prop_delete_member_keeps_others(
        names in member_names(30),
        pick in any::<prop::sample::Index>(),
    ) {
        let mut tree = build(&names);
        let victim = pick.get(&names).clone();
        let before = tree.len();

        tree.delete(&victim).unwrap();

        prop_assert!(tree.find(&victim).is_none());
        let expected = if names.len() == 1 { 0 } else { before - 2 };
        prop_assert_eq!(tree.len(), expected);
        for name in names.iter().filter(|n| **n != victim) {
            prop_assert!(tree.find(name).is_some(), "{} lost", name);
        }
        assert_gapless(&tree);
    }

    #[test]
    fn prop_intermediate_names_unique(names in member_names(30)) {
        let mut tree = build(&names);
        tree.delete(&names[0]).unwrap();
        let mut seen = HashSet::new();
        for node in tree.breadth_first() {
            prop_assert!(seen.insert(node.name().to_string()), "duplicate {}", node.name());
        }
    }
}

proptest! {
    #![proptest_config(ProptestConfig::with_cases(16))]

    #[test]
    fn prop_reopen_restores_structure(names in member_names(16)) {
        let dir = tempdir().unwrap();
        let config = fast_config(dir.path());
        let before = {
            let mut store = TreeStore::open(config.clone()).unwrap();
            for name in &names {
                store.insert(name.as_str(), name.as_bytes().to_vec()).unwrap();
            }
            store.tree_structure()
        };

        let store = TreeStore::open(config).unwrap();
        prop_assert_eq!(store.tree_structure(), before);
        prop_assert_eq!(store.store().record_count().unwrap(), store.len());
    }
}

#[test]
fn test_three_members() {
    let names: Vec<String> = ["alice", "bob", "charlie"].map(String::from).to_vec();
    let tree = build(&names);

    assert_eq!(tree.len(), 5);
    let path: Vec<&str> = tree.path("alice").unwrap().iter().map(|n| n.name()).collect();
    assert_eq!(
        path,
        vec!["intermediate_alice_bob", "intermediate_alice_charlie", "alice"]
    );
}

#[test]
fn test_arithmetic_matches_complete_shapes() {
    for members in [1usize, 2, 3, 4, 5, 8, 9] {
        let names: Vec<String> = (0..members).map(|i| format!("member{i}")).collect();
        let structure = build(&names).structure();

        for info in structure.values() {
            assert_eq!(
                info.parent_index,
                index::parent(info.node_index),
                "{} members, node {}",
                members,
                info.name
            );
            if let Some(left) = &info.left_child {
                assert_eq!(structure[left].node_index, index::left_child(info.node_index));
            }
            if let Some(right) = &info.right_child {
                assert_eq!(structure[right].node_index, index::right_child(info.node_index));
            }
        }
    }
}

#[test]
fn test_arithmetic_diverges_for_six_members() {
    let names: Vec<String> = (0..6).map(|i| format!("member{i}")).collect();
    let structure = build(&names).structure();

    let diverging = structure
        .values()
        .filter(|info| info.parent_index != index::parent(info.node_index))
        .count();
    assert!(diverging > 0);
}

#[test]
fn test_modification_after_check_is_isolated() {
    let dir = tempdir().unwrap();
    let mut store = TreeStore::open(fast_config(dir.path())).unwrap();
    for name in ["alice", "bob", "charlie", "david"] {
        store.insert(name, name.as_bytes().to_vec()).unwrap();
    }

    store.mark_all_checked().unwrap();
    assert!(store.needing_update().is_empty());
    let checkpoint = Timestamp::now();

    store.update_leaf_key("charlie", b"rotated".to_vec()).unwrap();

    let dirty: Vec<&str> = store.needing_update().iter().map(|n| n.name()).collect();
    assert_eq!(dirty, vec!["charlie"]);
    let modified: Vec<&str> = store
        .modified_since(checkpoint)
        .iter()
        .map(|n| n.name())
        .collect();
    assert_eq!(modified, vec!["charlie"]);
    assert_eq!(
        store.changes_since(checkpoint).into_keys().collect::<Vec<_>>(),
        vec!["charlie".to_string()]
    );
}

#[test]
fn test_delete_every_other_member() {
    for members in [2usize, 6, 10, 16] {
        let dir = tempdir().unwrap();
        let mut store = TreeStore::open(fast_config(dir.path())).unwrap();
        let names: Vec<String> = (0..members).map(|i| format!("member{i}")).collect();
        for name in &names {
            store.insert(name.as_str(), vec![1, 2, 3]).unwrap();
        }

        for name in names.iter().step_by(2) {
            store.delete(name).unwrap();
        }

        assert_eq!(store.leaf_count(), members / 2);
        for (i, name) in names.iter().enumerate() {
            assert_eq!(store.contains(name), i % 2 == 1, "{}", name);
            assert_eq!(store.store().contains(name), i % 2 == 1, "{} record", name);
        }
        assert_eq!(store.store().record_count().unwrap(), store.len());

        let reopened = TreeStore::open(fast_config(dir.path())).unwrap();
        let kinds: Vec<NodeKind> = reopened.leaves().iter().map(|n| n.kind()).collect();
        assert_eq!(kinds.len(), members / 2);
        assert!(kinds.iter().all(|kind| *kind == NodeKind::Leaf));
    }
}
