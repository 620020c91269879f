//! Property tests: codec round trips and random edit sequences
//!
//! Edit sequences run against a write handle and an arena side by side;
//! both must accept and reject the same edits and end with the same shape.

#![allow(clippy::unwrap_used, clippy::expect_used)]

use proptest::prelude::*;
use trellis_core::{
    ArenaTree, Handle, NodeData, NodeKind, TreeRead, TreeStore, TreeWrite,
};

fn name() -> impl Strategy<Value = String> {
    "[a-z][a-z0-9:_-]{0,8}"
}

fn text() -> impl Strategy<Value = String> {
    "[ -~]{0,16}"
}

fn node_data() -> impl Strategy<Value = NodeData> {
    let element = (
        name(),
        prop::collection::btree_map(name(), text(), 0..4),
        prop::collection::btree_map("[a-z]{0,4}", "urn:[a-z]{1,8}", 0..3),
    )
        .prop_map(|(n, attrs, nss)| {
            let mut data = NodeData::element(n);
            for (k, v) in attrs {
                data = data.with_attribute(k, v);
            }
            for (p, u) in nss {
                data = data.with_namespace(p, u);
            }
            data
        });
    prop_oneof![
        Just(NodeData::document()),
        element,
        text().prop_map(NodeData::text),
        text().prop_map(NodeData::comment),
        (name(), text()).prop_map(|(t, d)| NodeData::processing_instruction(t, d)),
    ]
}

#[derive(Debug, Clone)]
enum Edit {
    Create { element: bool },
    Append(usize, usize),
    Prepend(usize, usize),
    InsertBefore(usize, usize),
    InsertAfter(usize, usize),
    Detach(usize),
    Remove(usize),
    RemoveSubtree(usize),
}

fn edit() -> impl Strategy<Value = Edit> {
    let ix = 0usize..64;
    prop_oneof![
        3 => any::<bool>().prop_map(|element| Edit::Create { element }),
        4 => (ix.clone(), ix.clone()).prop_map(|(p, c)| Edit::Append(p, c)),
        2 => (ix.clone(), ix.clone()).prop_map(|(p, c)| Edit::Prepend(p, c)),
        2 => (ix.clone(), ix.clone()).prop_map(|(r, c)| Edit::InsertBefore(r, c)),
        2 => (ix.clone(), ix.clone()).prop_map(|(r, c)| Edit::InsertAfter(r, c)),
        1 => ix.clone().prop_map(Edit::Detach),
        1 => ix.clone().prop_map(Edit::Remove),
        1 => ix.prop_map(Edit::RemoveSubtree),
    ]
}

/// Apply `edit`, resolving indices into `made`; returns the error code
fn apply<T: TreeWrite>(tree: &mut T, made: &mut Vec<Handle>, edit: &Edit) -> Option<&'static str> {
    if let Edit::Create { element } = *edit {
        let data = if element {
            NodeData::element(format!("e{}", made.len()))
        } else {
            NodeData::text(format!("t{}", made.len()))
        };
        made.push(tree.create(data).unwrap());
        return None;
    }
    if made.is_empty() {
        return None;
    }
    let pick = |i: usize| made[i % made.len()];
    let result = match *edit {
        Edit::Create { .. } => Ok(()),
        Edit::Append(p, c) => tree.append(pick(p), pick(c)),
        Edit::Prepend(p, c) => tree.prepend(pick(p), pick(c)),
        Edit::InsertBefore(r, c) => tree.insert_before(pick(r), pick(c)),
        Edit::InsertAfter(r, c) => tree.insert_after(pick(r), pick(c)),
        Edit::Detach(n) => tree.detach(pick(n)),
        Edit::Remove(n) => tree.remove(pick(n)),
        Edit::RemoveSubtree(n) => tree.remove_subtree(pick(n)),
    };
    result.err().map(|e| e.kind().code())
}

/// Shape of every created node: kind, parent index, child indices
fn shape<T: TreeRead>(tree: &T, made: &[Handle]) -> Vec<Option<(NodeKind, Option<usize>, Vec<usize>)>> {
    let index = |h: Handle| made.iter().position(|m| m.node == h.node);
    made.iter()
        .map(|h| {
            let kind = tree.kind(*h).ok()?;
            let parent = tree.parent(*h).unwrap().and_then(index);
            let children = tree.children(*h).unwrap().filter_map(index).collect();
            Some((kind, parent, children))
        })
        .collect()
}

fn check_invariants<T: TreeRead>(tree: &T, made: &[Handle]) {
    for h in made {
        if tree.kind(*h).is_err() {
            continue;
        }
        for (i, c) in tree.children(*h).unwrap().enumerate() {
            assert_eq!(tree.ordinal(c).unwrap(), Some(i as u32));
            assert_eq!(tree.parent(c).unwrap(), Some(*h));
        }
        let ancestors = tree.ancestors(*h).unwrap();
        assert!(!ancestors.contains(h), "{h} is its own ancestor");
    }
}

proptest! {
    #[test]
    fn prop_decode_inverts_create(data in node_data()) {
        let mut w = TreeStore::new().open_layer(None).unwrap();
        let h = w.create(data.clone()).unwrap();
        prop_assert_eq!(w.decode(h).unwrap(), data.clone().normalized());

        let snap = w.commit();
        prop_assert_eq!(snap.decode(h).unwrap(), data.normalized());
    }

    #[test]
    fn prop_backends_agree_on_edit_sequences(edits in prop::collection::vec(edit(), 1..80)) {
        let mut layer = TreeStore::new().open_layer(None).unwrap();
        let mut arena = ArenaTree::new();
        let mut in_layer = Vec::new();
        let mut in_arena = Vec::new();

        for edit in &edits {
            let a = apply(&mut layer, &mut in_layer, edit);
            let b = apply(&mut arena, &mut in_arena, edit);
            prop_assert_eq!(a, b, "outcome differs for {:?}", edit);
        }

        check_invariants(&layer, &in_layer);
        check_invariants(&arena, &in_arena);
        prop_assert_eq!(shape(&layer, &in_layer), shape(&arena, &in_arena));
    }

    #[test]
    fn prop_committed_snapshot_survives_child_edits(edits in prop::collection::vec(edit(), 1..40)) {
        // GIVEN a committed random tree
        let store = TreeStore::new();
        let mut w = store.open_layer(None).unwrap();
        let mut made = Vec::new();
        for edit in &edits {
            apply(&mut w, &mut made, edit);
        }
        let v1 = w.commit();
        let before = v1.digest().unwrap();
        let shape_before = shape(&v1, &made);

        // WHEN a child layer removes everything
        let mut child = v1.open_child();
        for h in &made {
            if let Ok(h) = child.adopt(*h) {
                if child.parent(h).unwrap().is_none() {
                    child.remove_subtree(h).unwrap();
                }
            }
        }
        let v2 = child.commit();

        // THEN v1 is untouched and v2 is empty
        prop_assert_eq!(v1.digest().unwrap(), before);
        prop_assert_eq!(shape(&v1, &made), shape_before);
        prop_assert!(v2.triples().is_empty());
    }
}
