//! Fixed predicate vocabulary
//!
//! The predicate names below are the wire format: any encoder or decoder
//! that wants to read a store produced by Trellis has to agree on them.
//! They are interned first, in this order, so their surrogates are the same
//! in every store.

use serde::{Deserialize, Serialize};
use trellis_core_types::Sym;

use crate::registry::Registry;

pub const KIND: &str = "kind";
pub const NAME: &str = "name";
pub const TEXT_VALUE: &str = "textValue";
pub const HAS_CHILD: &str = "hasChild";
pub const CHILD_INDEX: &str = "childIndex";
pub const HAS_ATTRIBUTE: &str = "hasAttribute";
pub const ATTRIBUTE_NAME: &str = "attributeName";
pub const ATTRIBUTE_VALUE: &str = "attributeValue";
pub const HAS_NAMESPACE: &str = "hasNamespace";
pub const PARENT_OF: &str = "parentOf";

/// Predicate names in interning order
pub const PREDICATES: [&str; 10] = [
    KIND,
    NAME,
    TEXT_VALUE,
    HAS_CHILD,
    CHILD_INDEX,
    HAS_ATTRIBUTE,
    ATTRIBUTE_NAME,
    ATTRIBUTE_VALUE,
    HAS_NAMESPACE,
    PARENT_OF,
];

/// Classification of a node, stored as the object of its `kind` triple
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum NodeKind {
    Document,
    Element,
    Text,
    Comment,
    ProcessingInstruction,
    Attribute,
    Namespace,
}

impl NodeKind {
    /// Every kind, in interning order
    pub const ALL: [NodeKind; 7] = [
        NodeKind::Document,
        NodeKind::Element,
        NodeKind::Text,
        NodeKind::Comment,
        NodeKind::ProcessingInstruction,
        NodeKind::Attribute,
        NodeKind::Namespace,
    ];

    /// Stored name of the kind
    pub fn as_str(&self) -> &'static str {
        match self {
            NodeKind::Document => "document",
            NodeKind::Element => "element",
            NodeKind::Text => "text",
            NodeKind::Comment => "comment",
            NodeKind::ProcessingInstruction => "processingInstruction",
            NodeKind::Attribute => "attribute",
            NodeKind::Namespace => "namespace",
        }
    }

    /// Whether nodes of this kind may have children
    pub fn can_have_children(&self) -> bool {
        matches!(self, NodeKind::Document | NodeKind::Element)
    }

    /// Whether nodes of this kind may be attached under a parent
    pub fn can_be_child(&self) -> bool {
        matches!(
            self,
            NodeKind::Element | NodeKind::Text | NodeKind::Comment | NodeKind::ProcessingInstruction
        )
    }

    /// Whether nodes of this kind only exist as part of an owning element
    ///
    /// Attribute and namespace nodes have ids of their own but are never
    /// handed out as handles.
    pub fn is_owned(&self) -> bool {
        matches!(self, NodeKind::Attribute | NodeKind::Namespace)
    }

    fn index(&self) -> usize {
        match self {
            NodeKind::Document => 0,
            NodeKind::Element => 1,
            NodeKind::Text => 2,
            NodeKind::Comment => 3,
            NodeKind::ProcessingInstruction => 4,
            NodeKind::Attribute => 5,
            NodeKind::Namespace => 6,
        }
    }
}

/// Surrogates of the predicate vocabulary and of the kind names
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Vocabulary {
    pub kind: Sym,
    pub name: Sym,
    pub text_value: Sym,
    pub has_child: Sym,
    pub child_index: Sym,
    pub has_attribute: Sym,
    pub attribute_name: Sym,
    pub attribute_value: Sym,
    pub has_namespace: Sym,
    pub parent_of: Sym,
    kinds: [Sym; 7],
}

impl Vocabulary {
    /// Intern the vocabulary into `registry`
    ///
    /// On a fresh registry this assigns `#0..=#9` to the predicates and
    /// `#10..=#16` to the kind names. On a restored registry it finds the
    /// surrogates that are already there.
    pub fn seed(registry: &Registry) -> Self {
        let [kind, name, text_value, has_child, child_index, has_attribute, attribute_name, attribute_value, has_namespace, parent_of] =
            PREDICATES.map(|p| registry.intern(p));
        let kinds = NodeKind::ALL.map(|k| registry.intern(k.as_str()));
        Self {
            kind,
            name,
            text_value,
            has_child,
            child_index,
            has_attribute,
            attribute_name,
            attribute_value,
            has_namespace,
            parent_of,
            kinds,
        }
    }

    /// Surrogate stored as the object of a `kind` triple
    pub fn kind_sym(&self, kind: NodeKind) -> Sym {
        self.kinds[kind.index()]
    }

    /// Kind named by a `kind` triple object
    pub fn kind_of(&self, sym: Sym) -> Option<NodeKind> {
        NodeKind::ALL
            .into_iter()
            .find(|k| self.kinds[k.index()] == sym)
    }
}
