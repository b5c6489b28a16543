//! jQuery-style node sets.
//!
//! A [`Selection`] is an immutable ordered set of nodes. Every traversal returns a new
//! Selection that remembers the one it was derived from, see [`Selection::end`].
//!
//! The nodes themselves are shared with the tree, so [`Selection::set_attr`] and friends
//! modify the tree in place.

mod filter;
mod property;
mod traversal;

use std::{collections::HashSet, rc::Rc};

use crate::{
    dom::NodeRef,
    html::{self, ParseError, ParseOptions},
};

struct DocumentInner {
    root: NodeRef,
    url: Option<String>,
}

/// A tree with its root node.
///
/// Holding a `Document` (or a [`Selection`] derived from it) keeps the whole tree alive.
#[derive(Clone)]
pub struct Document(Rc<DocumentInner>);

impl Document {
    /// Wrap an already built tree.
    pub fn from_node(root: NodeRef) -> Self {
        Self(Rc::new(DocumentInner { root, url: None }))
    }

    pub fn from_node_with_url(root: NodeRef, url: impl Into<String>) -> Self {
        Self(Rc::new(DocumentInner {
            root,
            url: Some(url.into()),
        }))
    }

    /// Build a tree from markup with the default [`ParseOptions`].
    pub fn parse(source: &str) -> Result<Self, ParseError> {
        Self::parse_with(source, &ParseOptions::default())
    }

    pub fn parse_with(source: &str, options: &ParseOptions) -> Result<Self, ParseError> {
        Ok(Self::from_node(html::parse_with(source, options)?))
    }

    /// Decode `bytes` and build a tree from them.
    ///
    /// `label` is the encoding used when `bytes` has no byte order mark.
    /// UTF-8 is assumed when it is `None`.
    pub fn parse_bytes(bytes: &[u8], label: Option<&str>) -> Result<Self, ParseError> {
        let source = html::decode(bytes, label)?;
        Self::parse(&source)
    }

    pub fn root(&self) -> NodeRef {
        self.0.root.clone()
    }

    pub fn url(&self) -> Option<&str> {
        self.0.url.as_deref()
    }

    /// Return the Selection containing only the root node.
    pub fn selection(&self) -> Selection {
        Selection {
            nodes: Rc::from(vec![self.root()]),
            document: Some(self.clone()),
            prev: None,
        }
    }

    /// Same as `self.selection().find(selector)`.
    pub fn find(&self, selector: &str) -> Result<Selection, crate::selector::SelectorError> {
        self.selection().find(selector)
    }
}

/// An ordered set of nodes without duplicates.
#[derive(Clone)]
pub struct Selection {
    nodes: Rc<[NodeRef]>,
    document: Option<Document>,
    prev: Option<Rc<Selection>>,
}

impl Selection {
    /// Create a Selection that belongs to no document.
    ///
    /// Duplicated nodes are removed, keeping the first occurrence.
    pub fn from_nodes(nodes: impl IntoIterator<Item = NodeRef>) -> Self {
        let mut res = vec![];
        let mut seen = HashSet::new();
        append_without_duplicates(&mut res, &mut seen, nodes);
        Self {
            nodes: Rc::from(res),
            document: None,
            prev: None,
        }
    }

    pub fn from_node(node: NodeRef) -> Self {
        Self::from_nodes([node])
    }

    /// Create a new Selection derived from `self`.
    fn push_stack(&self, nodes: Vec<NodeRef>) -> Selection {
        Selection {
            nodes: Rc::from(nodes),
            document: self.document.clone(),
            prev: Some(Rc::new(self.clone())),
        }
    }

    fn empty(&self) -> Selection {
        self.push_stack(vec![])
    }

    pub fn document(&self) -> Option<&Document> {
        self.document.as_ref()
    }

    /// Return the Selection this one was derived from.\
    /// At the start of a chain, an empty Selection is returned.
    pub fn end(&self) -> Selection {
        match &self.prev {
            Some(prev) => prev.as_ref().clone(),
            None => Selection {
                nodes: Rc::from(vec![]),
                document: self.document.clone(),
                prev: None,
            },
        }
    }

    /// The number of Selections this one was derived through.
    pub fn depth(&self) -> usize {
        let mut depth = 0;
        let mut prev = self.prev.as_deref();
        while let Some(sel) = prev {
            depth += 1;
            prev = sel.prev.as_deref();
        }
        depth
    }

    pub fn nodes(&self) -> &[NodeRef] {
        &self.nodes
    }

    pub fn iter(&self) -> std::slice::Iter<'_, NodeRef> {
        self.nodes.iter()
    }

    pub fn get(&self, index: usize) -> Option<&NodeRef> {
        self.nodes.get(index)
    }

    pub fn len(&self) -> usize {
        self.nodes.len()
    }

    /// Same as [`Selection::len`].
    pub fn size(&self) -> usize {
        self.len()
    }

    pub fn is_empty(&self) -> bool {
        self.nodes.is_empty()
    }

    /// Reduce the set to its first node.
    pub fn first(&self) -> Selection {
        self.eq(0)
    }

    /// Reduce the set to its last node.
    pub fn last(&self) -> Selection {
        self.eq(-1)
    }

    /// Reduce the set to the node at `index`.\
    /// A negative index counts from the end.
    pub fn eq(&self, index: isize) -> Selection {
        let len = self.nodes.len() as isize;
        let index = if index < 0 { index + len } else { index };
        if (0..len).contains(&index) {
            self.push_stack(vec![self.nodes[index as usize].clone()])
        } else {
            self.empty()
        }
    }

    /// Call `f` with the index and a single-node Selection of each node.
    pub fn each(&self, mut f: impl FnMut(usize, Selection)) -> &Self {
        for (i, node) in self.nodes.iter().enumerate() {
            f(i, self.push_stack(vec![node.clone()]));
        }
        self
    }

    /// Collect `f` applied to the index and a single-node Selection of each node.
    pub fn map<T>(&self, mut f: impl FnMut(usize, Selection) -> T) -> Vec<T> {
        self.nodes
            .iter()
            .enumerate()
            .map(|(i, node)| f(i, self.push_stack(vec![node.clone()])))
            .collect()
    }
}

impl<'a> IntoIterator for &'a Selection {
    type Item = &'a NodeRef;
    type IntoIter = std::slice::Iter<'a, NodeRef>;

    fn into_iter(self) -> Self::IntoIter {
        self.nodes.iter()
    }
}

/// Append the nodes of `nodes` that are not in `seen` yet.
fn append_without_duplicates(
    target: &mut Vec<NodeRef>,
    seen: &mut HashSet<NodeRef>,
    nodes: impl IntoIterator<Item = NodeRef>,
) {
    for node in nodes {
        if seen.insert(node.clone()) {
            target.push(node);
        }
    }
}

/// Apply `f` to every node and merge the results.
///
/// The merge keeps the first occurrence of each node and does not reorder anything.
fn map_nodes(nodes: &[NodeRef], mut f: impl FnMut(&NodeRef) -> Vec<NodeRef>) -> Vec<NodeRef> {
    let mut res = vec![];
    let mut seen = HashSet::new();
    for node in nodes {
        append_without_duplicates(&mut res, &mut seen, f(node));
    }
    res
}

fn is_in_slice(nodes: &[NodeRef], node: &NodeRef) -> bool {
    nodes.iter().any(|n| n.is_same_node(node))
}
