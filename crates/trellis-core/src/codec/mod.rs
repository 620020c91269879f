//! Node codec
//!
//! Maps a logical node description (`NodeData`) to the triples that encode
//! it and back. The codec never touches structural triples (`hasChild`,
//! `parentOf`, `childIndex`); those belong to the mutation engine.

pub mod vocab;

pub use vocab::{NodeKind, Vocabulary};

use std::collections::HashSet;

use serde::{Deserialize, Serialize};
use trellis_core_types::{LayerId, NodeId, Sym};

use crate::errors::{Result, TreeError};
use crate::registry::Registry;
use crate::triple::{Object, Pattern, Triple, TripleSource};

/// One attribute of an element
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct Attribute {
    pub name: String,
    pub value: String,
}

/// One namespace binding of an element (empty prefix = default namespace)
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct Namespace {
    pub prefix: String,
    pub uri: String,
}

/// Logical description of a node
///
/// Input of node creation and output of decode. `name` holds the element
/// name or the processing-instruction target; `value` holds text, comment
/// or processing-instruction data.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct NodeData {
    pub kind: NodeKind,
    pub name: Option<String>,
    pub value: Option<String>,
    pub attributes: Vec<Attribute>,
    pub namespaces: Vec<Namespace>,
}

impl NodeData {
    fn bare(kind: NodeKind, name: Option<String>, value: Option<String>) -> Self {
        Self {
            kind,
            name,
            value,
            attributes: Vec::new(),
            namespaces: Vec::new(),
        }
    }

    pub fn document() -> Self {
        Self::bare(NodeKind::Document, None, None)
    }

    pub fn element(name: impl Into<String>) -> Self {
        Self::bare(NodeKind::Element, Some(name.into()), None)
    }

    pub fn text(value: impl Into<String>) -> Self {
        Self::bare(NodeKind::Text, None, Some(value.into()))
    }

    pub fn comment(value: impl Into<String>) -> Self {
        Self::bare(NodeKind::Comment, None, Some(value.into()))
    }

    pub fn processing_instruction(target: impl Into<String>, data: impl Into<String>) -> Self {
        Self::bare(
            NodeKind::ProcessingInstruction,
            Some(target.into()),
            Some(data.into()),
        )
    }

    pub fn with_attribute(mut self, name: impl Into<String>, value: impl Into<String>) -> Self {
        self.attributes.push(Attribute {
            name: name.into(),
            value: value.into(),
        });
        self
    }

    pub fn with_namespace(mut self, prefix: impl Into<String>, uri: impl Into<String>) -> Self {
        self.namespaces.push(Namespace {
            prefix: prefix.into(),
            uri: uri.into(),
        });
        self
    }

    /// Value of the attribute called `name`
    pub fn attribute(&self, name: &str) -> Option<&str> {
        self.attributes
            .iter()
            .find(|a| a.name == name)
            .map(|a| a.value.as_str())
    }

    /// Canonical form: attributes sorted by name, namespaces by prefix
    ///
    /// This is what decode returns, so `decode(create(d)) == d.normalized()`.
    pub fn normalized(mut self) -> Self {
        self.attributes.sort_by(|a, b| a.name.cmp(&b.name));
        self.namespaces.sort_by(|a, b| a.prefix.cmp(&b.prefix));
        self
    }

    /// Check that the description is well formed for its kind
    ///
    /// # Errors
    ///
    /// - `InvalidInput` if a required field is missing, a field is set that
    ///   the kind does not carry, or the kind cannot be created standalone
    /// - `DuplicateAttribute` if an attribute name repeats
    pub fn validate(&self) -> Result<()> {
        let invalid = |reason: &str| {
            Err(TreeError::InvalidInput {
                reason: format!("{} node: {reason}", self.kind.as_str()),
            })
        };

        match self.kind {
            NodeKind::Document => {
                if self.name.is_some() || self.value.is_some() {
                    return invalid("must not carry a name or value");
                }
            }
            NodeKind::Element => {
                if self.name.as_deref().map_or(true, str::is_empty) {
                    return invalid("requires a non-empty name");
                }
                if self.value.is_some() {
                    return invalid("must not carry a value");
                }
            }
            NodeKind::Text | NodeKind::Comment => {
                if self.name.is_some() {
                    return invalid("must not carry a name");
                }
                if self.value.is_none() {
                    return invalid("requires a value");
                }
            }
            NodeKind::ProcessingInstruction => {
                if self.name.as_deref().map_or(true, str::is_empty) {
                    return invalid("requires a non-empty target");
                }
                if self.value.is_none() {
                    return invalid("requires data");
                }
            }
            NodeKind::Attribute | NodeKind::Namespace => {
                return invalid("cannot be created standalone; attach it to an element");
            }
        }

        if self.kind != NodeKind::Element
            && (!self.attributes.is_empty() || !self.namespaces.is_empty())
        {
            return invalid("only elements carry attributes or namespaces");
        }

        let mut names = HashSet::new();
        for attr in &self.attributes {
            if attr.name.is_empty() {
                return invalid("attribute names must not be empty");
            }
            if !names.insert(attr.name.as_str()) {
                return Err(TreeError::DuplicateAttribute {
                    name: attr.name.clone(),
                });
            }
        }

        let mut prefixes = HashSet::new();
        for ns in &self.namespaces {
            if !prefixes.insert(ns.prefix.as_str()) {
                return invalid(&format!("namespace prefix '{}' bound twice", ns.prefix));
            }
        }

        Ok(())
    }
}

/// Encoder/decoder bound to one store's registry and vocabulary
#[derive(Clone, Copy)]
pub struct Codec<'a> {
    registry: &'a Registry,
    vocab: &'a Vocabulary,
}

impl<'a> Codec<'a> {
    pub fn new(registry: &'a Registry, vocab: &'a Vocabulary) -> Self {
        Self { registry, vocab }
    }

    pub fn vocab(&self) -> &'a Vocabulary {
        self.vocab
    }

    fn literal(&self, text: &str) -> Object {
        Object::Sym(self.registry.intern(text))
    }

    /// Encode a new, unattached node
    ///
    /// `next_id` is called once for the node and once per attribute and
    /// namespace node, in that order.
    ///
    /// # Errors
    ///
    /// Returns the validation errors of [`NodeData::validate`]; nothing is
    /// allocated or interned when validation fails.
    pub fn encode_new(
        &self,
        data: &NodeData,
        mut next_id: impl FnMut() -> NodeId,
    ) -> Result<(NodeId, Vec<Triple>)> {
        data.validate()?;

        let v = self.vocab;
        let node = next_id();
        let mut triples = vec![Triple::new(
            node,
            v.kind,
            Object::Sym(v.kind_sym(data.kind)),
        )];
        if let Some(name) = &data.name {
            triples.push(Triple::new(node, v.name, self.literal(name)));
        }
        if let Some(value) = &data.value {
            triples.push(Triple::new(node, v.text_value, self.literal(value)));
        }
        for attr in &data.attributes {
            let id = next_id();
            triples.extend(self.attribute_triples(node, id, &attr.name, &attr.value));
        }
        for ns in &data.namespaces {
            let id = next_id();
            triples.push(Triple::new(node, v.has_namespace, Object::Node(id)));
            triples.push(Triple::new(
                id,
                v.kind,
                Object::Sym(v.kind_sym(NodeKind::Namespace)),
            ));
            triples.push(Triple::new(id, v.name, self.literal(&ns.prefix)));
            triples.push(Triple::new(id, v.text_value, self.literal(&ns.uri)));
        }
        Ok((node, triples))
    }

    /// Triples of one attribute node `attr` owned by `owner`
    pub fn attribute_triples(&self, owner: NodeId, attr: NodeId, name: &str, value: &str) -> [Triple; 4] {
        let v = self.vocab;
        [
            Triple::new(owner, v.has_attribute, Object::Node(attr)),
            Triple::new(attr, v.kind, Object::Sym(v.kind_sym(NodeKind::Attribute))),
            Triple::new(attr, v.attribute_name, self.literal(name)),
            Triple::new(attr, v.attribute_value, self.literal(value)),
        ]
    }

    /// Kind of `node`, or `None` if it has no `kind` triple
    ///
    /// # Errors
    ///
    /// Returns `Internal` if the `kind` object is not a known kind name.
    pub fn kind<S: TripleSource + ?Sized>(&self, src: &S, node: NodeId) -> Result<Option<NodeKind>> {
        match src.object(node, self.vocab.kind) {
            None => Ok(None),
            Some(object) => object
                .as_sym()
                .and_then(|sym| self.vocab.kind_of(sym))
                .map(Some)
                .ok_or_else(|| TreeError::Internal {
                    message: format!("node {node} has malformed kind {object:?}"),
                }),
        }
    }

    fn text_of<S: TripleSource + ?Sized>(&self, src: &S, node: NodeId, predicate: Sym) -> Result<Option<String>> {
        match src.object(node, predicate) {
            None => Ok(None),
            Some(Object::Sym(sym)) => Ok(Some(self.registry.try_resolve(sym)?.to_string())),
            Some(other) => Err(TreeError::Internal {
                message: format!("node {node} has non-literal {other:?} for {predicate}"),
            }),
        }
    }

    fn required_text<S: TripleSource + ?Sized>(&self, src: &S, node: NodeId, predicate: Sym) -> Result<String> {
        self.text_of(src, node, predicate)?
            .ok_or_else(|| TreeError::Internal {
                message: format!("node {node} is missing {predicate}"),
            })
    }

    /// Reconstruct the logical description of `node`
    ///
    /// # Errors
    ///
    /// - `NotFound` if `node` has no `kind` triple in `src`
    /// - `Resolution` if a literal surrogate is not in the registry
    /// - `Internal` if the stored triples are malformed
    pub fn decode<S: TripleSource + ?Sized>(&self, src: &S, node: NodeId, layer: LayerId) -> Result<NodeData> {
        let v = self.vocab;
        let kind = self.kind(src, node)?.ok_or(TreeError::NotFound {
            node_id: node,
            layer_id: layer,
        })?;

        // Attribute nodes keep their name and value under their own predicates.
        let (name, value) = match kind {
            NodeKind::Attribute => (v.attribute_name, v.attribute_value),
            _ => (v.name, v.text_value),
        };
        let mut data = NodeData::bare(
            kind,
            self.text_of(src, node, name)?,
            self.text_of(src, node, value)?,
        );

        for attr in self.owned(src, node, v.has_attribute) {
            data.attributes.push(Attribute {
                name: self.required_text(src, attr, v.attribute_name)?,
                value: self.required_text(src, attr, v.attribute_value)?,
            });
        }
        for ns in self.owned(src, node, v.has_namespace) {
            data.namespaces.push(Namespace {
                prefix: self.required_text(src, ns, v.name)?,
                uri: self.required_text(src, ns, v.text_value)?,
            });
        }

        Ok(data.normalized())
    }

    /// Attribute node of `owner` named `name`, with its current value
    pub fn find_attribute<S: TripleSource + ?Sized>(
        &self,
        src: &S,
        owner: NodeId,
        name: &str,
    ) -> Result<Option<(NodeId, String)>> {
        let Some(name_sym) = self.registry.lookup(name) else {
            return Ok(None);
        };
        let v = self.vocab;
        for attr in self.owned(src, owner, v.has_attribute) {
            let named = Triple::new(attr, v.attribute_name, Object::Sym(name_sym));
            if src.contains(&named) {
                let value = self.required_text(src, attr, v.attribute_value)?;
                return Ok(Some((attr, value)));
            }
        }
        Ok(None)
    }

    fn owned<S: TripleSource + ?Sized>(&self, src: &S, owner: NodeId, link: Sym) -> Vec<NodeId> {
        src.objects(owner, link)
            .into_iter()
            .filter_map(|o| o.as_node())
            .collect()
    }

    /// Every triple that belongs to `node` itself
    ///
    /// All triples with `node` as subject plus the triples of its attribute
    /// and namespace nodes. Structural triples of `node`'s children are not
    /// included.
    pub fn footprint<S: TripleSource + ?Sized>(&self, src: &S, node: NodeId) -> Vec<Triple> {
        let v = self.vocab;
        let mut triples = src.scan(&Pattern::any().subject(node));
        let owned: Vec<NodeId> = triples
            .iter()
            .filter(|t| t.predicate == v.has_attribute || t.predicate == v.has_namespace)
            .filter_map(|t| t.object.as_node())
            .collect();
        for id in owned {
            triples.extend(src.scan(&Pattern::any().subject(id)));
        }
        triples
    }
}
