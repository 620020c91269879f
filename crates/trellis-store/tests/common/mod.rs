use rusqlite::Connection;
use trellis_core::{Handle, NodeData, Snapshot, TreeStore, TreeWrite};

/// In-memory database with the schema applied
#[allow(dead_code)]
pub fn setup_test_db() -> Connection {
    let mut conn = trellis_store::db::open_in_memory().unwrap();
    trellis_store::db::configure(&conn).unwrap();
    trellis_store::migrations::apply_migrations(&mut conn).unwrap();
    conn
}

/// `v1`: doc -> book -> title -> "XPath Guide"; `v2`: adds an author
#[allow(dead_code)]
pub struct History {
    pub store: TreeStore,
    pub v1: Snapshot,
    pub v2: Snapshot,
    pub book: Handle,
}

#[allow(dead_code)]
pub fn two_versions() -> History {
    let store = TreeStore::new();
    let mut w = store.open_layer(None).unwrap();
    let doc = w.create(NodeData::document()).unwrap();
    let book = w
        .create(NodeData::element("book").with_attribute("lang", "en"))
        .unwrap();
    let title = w.create(NodeData::element("title")).unwrap();
    let text = w.create(NodeData::text("XPath Guide")).unwrap();
    w.append(doc, book).unwrap();
    w.append(book, title).unwrap();
    w.append(title, text).unwrap();
    let v1 = w.commit();

    let mut w = v1.open_child();
    let book2 = w.adopt(book).unwrap();
    let author = w.create(NodeData::element("author")).unwrap();
    w.prepend(book2, author).unwrap();
    let name = w.create(NodeData::text("M. Kay")).unwrap();
    w.append(author, name).unwrap();
    let v2 = w.commit();

    History {
        store,
        v1,
        v2,
        book,
    }
}
