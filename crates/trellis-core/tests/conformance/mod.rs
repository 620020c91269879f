//! Backend conformance suite
//!
//! Each check is generic over `TreeWrite` and takes a constructor for an
//! empty tree. `conformance_suite!` expands to one `#[test]` per check for a
//! given backend.

use trellis_core::{Handle, NodeData, NodeId, NodeKind, TreeError, TreeRead, TreeWrite};

use crate::common::{assert_dense, build_book, child_names, element, names};

macro_rules! conformance_suite {
    ($make:expr) => {
        conformance_suite!(@each $make;
            book_scenario,
            append_rejects_cycle,
            append_rejects_self,
            append_rejects_attached_child,
            kind_rules,
            insert_positions,
            insert_next_to_root_is_not_attached,
            detach_twice,
            detached_subtree_is_reattachable,
            remove_promotes_children,
            remove_root_is_not_attached,
            remove_subtree_discards_everything,
            remove_subtree_of_orphan,
            removed_node_is_stale_for_writes,
            sibling_axes,
            descendants_in_document_order,
            elements_named_in_document_order,
            attributes,
            attributes_only_on_elements,
            create_rejects_malformed_nodes,
            decode_round_trip,
            string_value,
            foreign_handle_is_stale,
            owned_nodes_are_not_addressable,
            documents_are_listed,
        );
    };
    (@each $make:expr; $($check:ident),* $(,)?) => {
        $(
            #[test]
            fn $check() {
                crate::conformance::$check($make);
            }
        )*
    };
}

pub fn book_scenario<T: TreeWrite>(make: fn() -> T) {
    // GIVEN doc -> book -> title -> "XPath Guide"
    let mut tree = make();
    let b = build_book(&mut tree);

    // THEN the structure reads back as built
    assert_eq!(tree.children(b.doc).unwrap().collect::<Vec<_>>(), vec![b.book]);
    let first = tree.first_child(b.title).unwrap().unwrap();
    let data = tree.decode(first).unwrap();
    assert_eq!(data.kind, NodeKind::Text);
    assert_eq!(data.value.as_deref(), Some("XPath Guide"));
    assert_eq!(tree.parent(b.book).unwrap(), Some(b.doc));
    assert_eq!(tree.parent(b.doc).unwrap(), None);
    assert_eq!(tree.ordinal(b.doc).unwrap(), None);
    assert_eq!(tree.ancestors(b.text).unwrap(), vec![b.title, b.book, b.doc]);
    assert_eq!(tree.root(b.text).unwrap(), b.doc);
}

pub fn append_rejects_cycle<T: TreeWrite>(make: fn() -> T) {
    // GIVEN the book tree
    let mut tree = make();
    let b = build_book(&mut tree);
    let before = child_names(&tree, b.doc);

    // WHEN appending an ancestor under its descendant
    let result = tree.append(b.title, b.book);

    // THEN it fails with Cycle and nothing changes
    assert_eq!(
        result,
        Err(TreeError::Cycle {
            parent_id: b.title.node,
            child_id: b.book.node
        })
    );
    assert_eq!(
        tree.append(b.book, b.doc),
        Err(TreeError::Cycle {
            parent_id: b.book.node,
            child_id: b.doc.node
        })
    );
    assert_eq!(child_names(&tree, b.doc), before);
    assert_eq!(tree.parent(b.book).unwrap(), Some(b.doc));
}

pub fn append_rejects_self<T: TreeWrite>(make: fn() -> T) {
    let mut tree = make();
    let e = tree.create(NodeData::element("e")).unwrap();
    assert!(matches!(tree.append(e, e), Err(TreeError::Cycle { .. })));
}

pub fn append_rejects_attached_child<T: TreeWrite>(make: fn() -> T) {
    // GIVEN title attached under book
    let mut tree = make();
    let b = build_book(&mut tree);
    let other = tree.create(NodeData::element("shelf")).unwrap();

    // WHEN attaching it elsewhere without detaching
    let result = tree.append(other, b.title);

    // THEN AlreadyAttached names the current parent
    assert_eq!(
        result,
        Err(TreeError::AlreadyAttached {
            child_id: b.title.node,
            current_parent_id: b.book.node
        })
    );
    assert_eq!(tree.child_count(other).unwrap(), 0);
}

pub fn kind_rules<T: TreeWrite>(make: fn() -> T) {
    let mut tree = make();
    let doc = tree.create(NodeData::document()).unwrap();
    let other_doc = tree.create(NodeData::document()).unwrap();
    let text = tree.create(NodeData::text("t")).unwrap();
    let el = tree.create(NodeData::element("e")).unwrap();

    assert_eq!(
        tree.append(text, el),
        Err(TreeError::InvalidChild {
            parent_kind: NodeKind::Text,
            child_kind: NodeKind::Element
        })
    );
    assert_eq!(
        tree.append(doc, other_doc),
        Err(TreeError::InvalidChild {
            parent_kind: NodeKind::Document,
            child_kind: NodeKind::Document
        })
    );
    // Documents accept any child kind that may be a child.
    let comment = tree.create(NodeData::comment("c")).unwrap();
    let pi = tree.create(NodeData::processing_instruction("go", "now")).unwrap();
    tree.append(doc, comment).unwrap();
    tree.append(doc, pi).unwrap();
    tree.append(doc, el).unwrap();
    assert_eq!(tree.child_count(doc).unwrap(), 3);
}

pub fn insert_positions<T: TreeWrite>(make: fn() -> T) {
    // GIVEN root with children a, b, c
    let mut tree = make();
    let root = tree.create(NodeData::element("root")).unwrap();
    let _a = element(&mut tree, root, "a");
    let b = element(&mut tree, root, "b");
    let c = element(&mut tree, root, "c");

    // WHEN inserting around them
    let x = tree.create(NodeData::element("x")).unwrap();
    tree.insert_before(b, x).unwrap();
    let y = tree.create(NodeData::element("y")).unwrap();
    tree.insert_after(c, y).unwrap();
    let z = tree.create(NodeData::element("z")).unwrap();
    tree.prepend(root, z).unwrap();
    let w = tree.create(NodeData::element("w")).unwrap();
    tree.insert_after(x, w).unwrap();

    // THEN the order is insertion-implied and ordinals are dense
    assert_eq!(child_names(&tree, root), ["z", "a", "x", "w", "b", "c", "y"]);
    assert_dense(&tree, root);
    assert_eq!(tree.child_at(root, 4).unwrap(), Some(b));
    assert_eq!(tree.child_at(root, 7).unwrap(), None);
    assert_eq!(tree.last_child(root).unwrap(), Some(y));
}

pub fn insert_next_to_root_is_not_attached<T: TreeWrite>(make: fn() -> T) {
    let mut tree = make();
    let root = tree.create(NodeData::element("root")).unwrap();
    let x = tree.create(NodeData::element("x")).unwrap();
    assert_eq!(
        tree.insert_before(root, x),
        Err(TreeError::NotAttached { node_id: root.node })
    );
    assert_eq!(
        tree.insert_after(root, x),
        Err(TreeError::NotAttached { node_id: root.node })
    );
    assert_eq!(tree.parent(x).unwrap(), None);
}

pub fn detach_twice<T: TreeWrite>(make: fn() -> T) {
    // GIVEN root with a, b, c
    let mut tree = make();
    let root = tree.create(NodeData::element("root")).unwrap();
    element(&mut tree, root, "a");
    let b = element(&mut tree, root, "b");
    element(&mut tree, root, "c");

    // WHEN detaching b twice
    tree.detach(b).unwrap();
    let second = tree.detach(b);

    // THEN the second detach fails and the tree stays as after the first
    assert_eq!(second, Err(TreeError::NotAttached { node_id: b.node }));
    assert_eq!(child_names(&tree, root), ["a", "c"]);
    assert_dense(&tree, root);
    assert_eq!(tree.parent(b).unwrap(), None);
    assert_eq!(tree.ordinal(b).unwrap(), None);
}

pub fn detached_subtree_is_reattachable<T: TreeWrite>(make: fn() -> T) {
    let mut tree = make();
    let b = build_book(&mut tree);
    tree.detach(b.book).unwrap();

    assert_eq!(tree.child_count(b.doc).unwrap(), 0);
    assert_eq!(tree.descendants(b.book).unwrap(), vec![b.title, b.text]);

    tree.append(b.doc, b.book).unwrap();
    assert_eq!(tree.string_value(b.doc).unwrap(), "XPath Guide");
}

pub fn remove_promotes_children<T: TreeWrite>(make: fn() -> T) {
    // GIVEN doc -> [intro, book -> [title, author], outro]
    let mut tree = make();
    let b = build_book(&mut tree);
    let intro = tree.create(NodeData::element("intro")).unwrap();
    tree.prepend(b.doc, intro).unwrap();
    element(&mut tree, b.doc, "outro");
    let author = element(&mut tree, b.book, "author");

    // WHEN removing book
    tree.remove(b.book).unwrap();

    // THEN its children take its place, in order
    assert_eq!(child_names(&tree, b.doc), ["intro", "title", "author", "outro"]);
    assert_dense(&tree, b.doc);
    assert_eq!(tree.parent(b.title).unwrap(), Some(b.doc));
    assert_eq!(tree.ordinal(b.title).unwrap(), Some(1));
    assert_eq!(tree.parent(author).unwrap(), Some(b.doc));
    assert_eq!(tree.children(b.title).unwrap().collect::<Vec<_>>(), vec![b.text]);
    assert!(matches!(tree.decode(b.book), Err(TreeError::NotFound { .. })));
    assert!(tree.elements_named("book").unwrap().is_empty());
}

pub fn remove_root_is_not_attached<T: TreeWrite>(make: fn() -> T) {
    let mut tree = make();
    let b = build_book(&mut tree);
    assert_eq!(
        tree.remove(b.doc),
        Err(TreeError::NotAttached { node_id: b.doc.node })
    );
    assert_eq!(tree.child_count(b.doc).unwrap(), 1);
}

pub fn remove_subtree_discards_everything<T: TreeWrite>(make: fn() -> T) {
    // GIVEN the book tree with a sibling after book
    let mut tree = make();
    let b = build_book(&mut tree);
    let appendix = element(&mut tree, b.doc, "appendix");

    // WHEN removing the book subtree
    tree.remove_subtree(b.book).unwrap();

    // THEN title and its text are unreachable and gone
    assert_eq!(tree.children(b.doc).unwrap().collect::<Vec<_>>(), vec![appendix]);
    assert_dense(&tree, b.doc);
    assert!(tree.descendants(b.doc).unwrap().iter().all(|h| *h != b.title));
    for gone in [b.book, b.title, b.text] {
        assert!(matches!(tree.decode(gone), Err(TreeError::NotFound { .. })));
    }
    assert_eq!(tree.string_value(b.doc).unwrap(), "");
}

pub fn remove_subtree_of_orphan<T: TreeWrite>(make: fn() -> T) {
    let mut tree = make();
    let root = tree.create(NodeData::element("root")).unwrap();
    let leaf = element(&mut tree, root, "leaf");
    tree.remove_subtree(root).unwrap();
    assert!(tree.node(root.node).is_err());
    assert!(tree.node(leaf.node).is_err());
}

pub fn removed_node_is_stale_for_writes<T: TreeWrite>(make: fn() -> T) {
    let mut tree = make();
    let b = build_book(&mut tree);
    tree.remove(b.book).unwrap();

    assert!(matches!(
        tree.remove(b.book),
        Err(TreeError::StaleHandle { .. })
    ));
    assert!(matches!(
        tree.append(b.book, b.title),
        Err(TreeError::StaleHandle { .. })
    ));
    assert!(matches!(
        tree.set_attribute(b.book, "id", "1"),
        Err(TreeError::StaleHandle { .. })
    ));
}

pub fn sibling_axes<T: TreeWrite>(make: fn() -> T) {
    let mut tree = make();
    let root = tree.create(NodeData::element("root")).unwrap();
    let a = element(&mut tree, root, "a");
    let b = element(&mut tree, root, "b");
    let c = element(&mut tree, root, "c");
    let d = element(&mut tree, root, "d");

    assert_eq!(tree.following_siblings(b).unwrap(), vec![c, d]);
    assert_eq!(tree.preceding_siblings(c).unwrap(), vec![b, a]);
    assert_eq!(tree.next_sibling(a).unwrap(), Some(b));
    assert_eq!(tree.next_sibling(d).unwrap(), None);
    assert_eq!(tree.previous_sibling(a).unwrap(), None);
    assert_eq!(tree.previous_sibling(d).unwrap(), Some(c));
    assert!(tree.following_siblings(root).unwrap().is_empty());
    assert!(tree.preceding_siblings(root).unwrap().is_empty());

    // Cloning the iterator restarts the walk.
    let children = tree.children(root).unwrap();
    let again = children.clone();
    assert_eq!(children.count(), 4);
    assert_eq!(again.collect::<Vec<_>>(), vec![a, b, c, d]);
}

pub fn descendants_in_document_order<T: TreeWrite>(make: fn() -> T) {
    let mut tree = make();
    let root = tree.create(NodeData::element("r")).unwrap();
    let a = element(&mut tree, root, "a");
    element(&mut tree, a, "a1");
    element(&mut tree, a, "a2");
    let b = element(&mut tree, root, "b");
    element(&mut tree, b, "b1");

    let all = tree.descendants(root).unwrap();
    assert_eq!(names(&tree, &all), ["a", "a1", "a2", "b", "b1"]);
    let with_self = tree.descendants_or_self(root).unwrap();
    assert_eq!(with_self[0], root);
    assert_eq!(with_self.len(), 6);
}

pub fn elements_named_in_document_order<T: TreeWrite>(make: fn() -> T) {
    // GIVEN items created out of document order
    let mut tree = make();
    let doc = tree.create(NodeData::document()).unwrap();
    let list = element(&mut tree, doc, "list");
    let late = tree.create(NodeData::element("item").with_attribute("n", "2")).unwrap();
    let early = tree.create(NodeData::element("item").with_attribute("n", "1")).unwrap();
    tree.append(list, late).unwrap();
    tree.prepend(list, early).unwrap();
    let nested = tree.create(NodeData::element("item").with_attribute("n", "1.1")).unwrap();
    tree.append(early, nested).unwrap();

    // THEN the name lookup returns them in document order
    assert_eq!(tree.elements_named("item").unwrap(), vec![early, nested, late]);
    assert!(tree.elements_named("missing").unwrap().is_empty());
}

pub fn attributes<T: TreeWrite>(make: fn() -> T) {
    let mut tree = make();
    let e = tree
        .create(NodeData::element("book").with_attribute("lang", "en"))
        .unwrap();

    tree.set_attribute(e, "id", "b1").unwrap();
    tree.set_attribute(e, "lang", "fr").unwrap();
    tree.set_attribute(e, "lang", "fr").unwrap();

    assert_eq!(tree.attribute(e, "lang").unwrap().as_deref(), Some("fr"));
    assert_eq!(tree.attribute(e, "id").unwrap().as_deref(), Some("b1"));
    let data = tree.decode(e).unwrap();
    assert_eq!(
        data,
        NodeData::element("book")
            .with_attribute("id", "b1")
            .with_attribute("lang", "fr")
    );

    assert!(tree.remove_attribute(e, "id").unwrap());
    assert!(!tree.remove_attribute(e, "id").unwrap());
    assert_eq!(tree.attribute(e, "id").unwrap(), None);
}

pub fn attributes_only_on_elements<T: TreeWrite>(make: fn() -> T) {
    let mut tree = make();
    let text = tree.create(NodeData::text("t")).unwrap();
    let e = tree.create(NodeData::element("e")).unwrap();
    assert!(matches!(
        tree.set_attribute(text, "a", "b"),
        Err(TreeError::InvalidInput { .. })
    ));
    assert!(matches!(
        tree.set_attribute(e, "", "b"),
        Err(TreeError::InvalidInput { .. })
    ));
    assert!(matches!(
        tree.remove_attribute(text, "a"),
        Err(TreeError::InvalidInput { .. })
    ));
}

pub fn create_rejects_malformed_nodes<T: TreeWrite>(make: fn() -> T) {
    let mut tree = make();
    let attr = NodeData {
        kind: NodeKind::Attribute,
        name: Some("a".into()),
        value: Some("b".into()),
        attributes: vec![],
        namespaces: vec![],
    };
    assert!(matches!(tree.create(attr), Err(TreeError::InvalidInput { .. })));
    assert!(matches!(
        tree.create(NodeData::element("")),
        Err(TreeError::InvalidInput { .. })
    ));
    assert_eq!(
        tree.create(NodeData::element("e").with_attribute("a", "1").with_attribute("a", "2")),
        Err(TreeError::DuplicateAttribute { name: "a".into() })
    );
    assert!(tree.documents().is_empty());
}

pub fn decode_round_trip<T: TreeWrite>(make: fn() -> T) {
    let mut tree = make();
    let samples = [
        NodeData::document(),
        NodeData::element("svg:rect")
            .with_attribute("width", "10")
            .with_attribute("height", "")
            .with_namespace("svg", "http://www.w3.org/2000/svg")
            .with_namespace("", "urn:default"),
        NodeData::text(""),
        NodeData::comment(" note "),
        NodeData::processing_instruction("xml-stylesheet", "href=\"a.xsl\""),
    ];
    for data in samples {
        let h = tree.create(data.clone()).unwrap();
        assert_eq!(tree.decode(h).unwrap(), data.normalized());
    }
}

pub fn string_value<T: TreeWrite>(make: fn() -> T) {
    let mut tree = make();
    let p = tree.create(NodeData::element("p")).unwrap();
    let hello = tree.create(NodeData::text("Hello, ")).unwrap();
    let em = element(&mut tree, p, "em");
    let world = tree.create(NodeData::text("world")).unwrap();
    let note = tree.create(NodeData::comment("ignored")).unwrap();
    tree.prepend(p, hello).unwrap();
    tree.append(em, world).unwrap();
    tree.append(p, note).unwrap();

    assert_eq!(tree.string_value(p).unwrap(), "Hello, world");
    assert_eq!(tree.string_value(note).unwrap(), "ignored");
}

pub fn foreign_handle_is_stale<T: TreeWrite>(make: fn() -> T) {
    let mut one = make();
    let mut two = make();
    let doc = one.create(NodeData::document()).unwrap();
    let e = two.create(NodeData::element("e")).unwrap();

    assert!(matches!(one.append(doc, e), Err(TreeError::StaleHandle { .. })));
    assert!(matches!(one.decode(e), Err(TreeError::StaleHandle { .. })));
    assert!(matches!(one.parent(e), Err(TreeError::StaleHandle { .. })));

    // Both trees numbered their first node alike; the handles still differ
    assert_ne!(one.layer_id(), two.layer_id());
    assert_eq!(doc.node, e.node);
    assert_ne!(doc, e);
    assert_eq!(one.node(e.node).unwrap(), doc);
    assert_eq!(two.decode(e).unwrap().kind, NodeKind::Element);
}

pub fn owned_nodes_are_not_addressable<T: TreeWrite>(make: fn() -> T) {
    // GIVEN an element with one attribute and one namespace binding
    let mut tree = make();
    let doc = tree.create(NodeData::document()).unwrap();
    let data = NodeData::element("e")
        .with_attribute("id", "x")
        .with_namespace("p", "urn:p");
    let e = tree.create(data.clone()).unwrap();
    tree.append(doc, e).unwrap();

    // WHEN the ids right after the element are addressed directly
    for offset in 1..=2 {
        let id = NodeId(e.node.get() + offset);
        let h = Handle::new(tree.layer_id(), id);

        // THEN no read or write reaches them
        assert!(matches!(tree.node(id), Err(TreeError::NotFound { .. })));
        assert!(matches!(tree.decode(h), Err(TreeError::NotFound { .. })));
        assert!(matches!(tree.remove_subtree(h), Err(TreeError::StaleHandle { .. })));
        assert!(matches!(tree.append(doc, h), Err(TreeError::StaleHandle { .. })));
    }

    // AND the owner is intact
    assert_eq!(tree.decode(e).unwrap(), data.normalized());
    assert_eq!(tree.attribute(e, "id").unwrap().as_deref(), Some("x"));
    assert_eq!(tree.children(doc).unwrap().collect::<Vec<_>>(), vec![e]);
}

pub fn documents_are_listed<T: TreeWrite>(make: fn() -> T) {
    let mut tree = make();
    let first = tree.create(NodeData::document()).unwrap();
    tree.create(NodeData::element("loose")).unwrap();
    let second = tree.create(NodeData::document()).unwrap();
    assert_eq!(tree.documents(), vec![first, second]);
}
