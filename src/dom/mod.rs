//! The mutable node tree that every other part of the crate works on.
//!
//! Nodes are shared through `Rc<RefCell<_>>`. A parent owns its children through the
//! `first_child` -> `next_sibling` chain and the `last_child` handle, while `parent` and
//! `prev_sibling` are weak back references.
//!
//! # Note
//! - No iterator over the live tree is provided.\
//!   Any node handle can restructure the whole tree, so an iterator could be invalidated
//!   at any time. Accessors such as [`NodeRef::children`] return snapshots instead.

pub mod attr;
pub mod consistency;
pub mod node;
pub mod registry;

use std::fmt;

pub use attr::Attribute;
pub use consistency::{ConsistencyError, Inconsistency, Link, check_node, check_tree};
pub use node::{NodeData, NodeRef, NodeWeakRef};
pub use registry::{TagCapability, TagRegistry, init_tree, prerender_tree};

/// Upper bound of the parent chain and of the nesting level.\
/// Walks that go beyond this assume the tree contains a cycle.
pub const MAX_TREE_DEPTH: usize = 10_000;
/// Upper bound of a single run of siblings.
pub const MAX_SIBLINGS: usize = 1_000_000;

/// The kind of a node.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub enum NodeType {
    Error,
    Text,
    Document,
    Element,
    Comment,
    Doctype,
    /// Internal marker used by tree builders.\
    /// Traversal never yields it and serialization refuses it.
    ScopeMarker,
}

impl NodeType {
    pub fn as_str(self) -> &'static str {
        match self {
            NodeType::Error => "error",
            NodeType::Text => "text",
            NodeType::Document => "document",
            NodeType::Element => "element",
            NodeType::Comment => "comment",
            NodeType::Doctype => "doctype",
            NodeType::ScopeMarker => "scope marker",
        }
    }
}

impl fmt::Display for NodeType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Contract violations of the mutation API.
///
/// When one of these is returned, the tree has not been modified.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum TreeError {
    /// The node to be inserted already has a parent or siblings.
    AlreadyAttached,
    /// The reference node is not a child of the node being modified.
    NotAChild,
    /// The insertion would make a node its own ancestor.
    HierarchyRequest,
}

impl fmt::Display for TreeError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            TreeError::AlreadyAttached => {
                f.write_str("the node already has a parent or siblings")
            }
            TreeError::NotAChild => f.write_str("the node is not a child of this node"),
            TreeError::HierarchyRequest => {
                f.write_str("a node cannot be inserted into itself or its descendants")
            }
        }
    }
}

impl std::error::Error for TreeError {}
