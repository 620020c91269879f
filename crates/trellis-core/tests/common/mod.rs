use trellis_core::{Handle, NodeData, TreeRead, TreeStore, TreeWrite, WriteHandle};

/// Handles of the `doc -> book -> title -> "XPath Guide"` tree
#[allow(dead_code)]
#[derive(Debug, Clone, Copy)]
pub struct Book {
    pub doc: Handle,
    pub book: Handle,
    pub title: Handle,
    pub text: Handle,
}

/// Build the book tree through the parser-facing operations
#[allow(dead_code)]
pub fn build_book<T: TreeWrite + ?Sized>(tree: &mut T) -> Book {
    let doc = tree.create(NodeData::document()).unwrap();
    let book = tree.create(NodeData::element("book")).unwrap();
    let title = tree.create(NodeData::element("title")).unwrap();
    let text = tree.create(NodeData::text("XPath Guide")).unwrap();
    tree.append(doc, book).unwrap();
    tree.append(book, title).unwrap();
    tree.append(title, text).unwrap();
    Book {
        doc,
        book,
        title,
        text,
    }
}

/// Create an element and append it under `parent`
#[allow(dead_code)]
pub fn element<T: TreeWrite + ?Sized>(tree: &mut T, parent: Handle, name: &str) -> Handle {
    let h = tree.create(NodeData::element(name)).unwrap();
    tree.append(parent, h).unwrap();
    h
}

/// Element names (or kind names for other nodes) of `handles`
#[allow(dead_code)]
pub fn names<T: TreeRead + ?Sized>(tree: &T, handles: &[Handle]) -> Vec<String> {
    handles
        .iter()
        .map(|h| {
            let data = tree.decode(*h).unwrap();
            data.name.unwrap_or_else(|| data.kind.as_str().to_string())
        })
        .collect()
}

/// Names of the children of `h`
#[allow(dead_code)]
pub fn child_names<T: TreeRead + ?Sized>(tree: &T, h: Handle) -> Vec<String> {
    let children: Vec<Handle> = tree.children(h).unwrap().collect();
    names(tree, &children)
}

/// Assert ordinals of `h`'s children are exactly `0..k` and parents agree
#[allow(dead_code)]
pub fn assert_dense<T: TreeRead + ?Sized>(tree: &T, h: Handle) {
    for (i, c) in tree.children(h).unwrap().enumerate() {
        assert_eq!(tree.ordinal(c).unwrap(), Some(i as u32), "ordinal of {c}");
        assert_eq!(tree.parent(c).unwrap(), Some(h), "parent of {c}");
    }
}

/// Fresh open layer on an empty store
#[allow(dead_code)]
pub fn fresh_layer() -> WriteHandle {
    TreeStore::new().open_layer(None).unwrap()
}
