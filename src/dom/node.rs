use std::{
    cell::RefCell,
    collections::HashSet,
    fmt,
    hash::{Hash, Hasher},
    rc::{Rc, Weak},
};

use super::{Attribute, NodeType, TagCapability, TreeError};

/// A single node of the tree.
///
/// Fields are only reachable through [`NodeRef`].
pub struct Node {
    /// Non-owning, so a subtree does not keep its ancestors alive.
    parent: Option<NodeWeakRef>,
    /// Owning head of the child chain.
    first_child: Option<NodeRef>,
    last_child: Option<NodeRef>,
    /// Non-owning, the previous sibling owns this node through its `next_sibling`.
    prev_sibling: Option<NodeWeakRef>,
    next_sibling: Option<NodeRef>,

    node_type: NodeType,
    /// Tag name of an element. Empty for other kinds.
    tag: Rc<str>,
    /// Raw text of Text, Comment and Doctype nodes.
    data: String,
    namespace: Option<Rc<str>>,
    /// Keys are not unique at this level.
    /// Accessors treat the first match as authoritative.
    attributes: Vec<Attribute>,
    capability: Option<Rc<dyn TagCapability>>,
}

impl Drop for Node {
    fn drop(&mut self) {
        // Free the subtree from a local stack.
        // Otherwise every level and every sibling costs one nested call to `drop`.
        self.last_child.take();
        let mut pending = self.first_child.take().into_iter().collect::<Vec<_>>();
        while let Some(node) = pending.pop() {
            // still owned elsewhere, so releasing our handle frees nothing
            if Rc::strong_count(&node.0) > 1 {
                continue;
            }
            let mut inner = node.0.borrow_mut();
            // `last_child` is also reachable from `first_child`, so this never frees it
            inner.last_child.take();
            pending.extend(inner.next_sibling.take());
            pending.extend(inner.first_child.take());
        }
    }
}

/// The description of a node that has not been allocated yet.
///
/// This is what an allocation hook receives, see [`NodeRef::clone_with`] and
/// [`TagRegistry::lookup`](super::TagRegistry::lookup).
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct NodeData {
    pub node_type: NodeType,
    pub tag: String,
    pub data: String,
    pub namespace: Option<String>,
    pub attributes: Vec<Attribute>,
}

impl NodeData {
    fn new(node_type: NodeType) -> Self {
        Self {
            node_type,
            tag: String::new(),
            data: String::new(),
            namespace: None,
            attributes: vec![],
        }
    }

    pub fn document() -> Self {
        Self::new(NodeType::Document)
    }

    pub fn element(tag: impl Into<String>, attributes: Vec<Attribute>) -> Self {
        Self {
            tag: tag.into(),
            attributes,
            ..Self::new(NodeType::Element)
        }
    }

    pub fn text(data: impl Into<String>) -> Self {
        Self {
            data: data.into(),
            ..Self::new(NodeType::Text)
        }
    }

    pub fn comment(data: impl Into<String>) -> Self {
        Self {
            data: data.into(),
            ..Self::new(NodeType::Comment)
        }
    }

    /// `name` is stored as data. The public and system identifiers are
    /// the `public` and `system` attributes.
    pub fn doctype(name: impl Into<String>, attributes: Vec<Attribute>) -> Self {
        Self {
            data: name.into(),
            attributes,
            ..Self::new(NodeType::Doctype)
        }
    }
}

/// A shared handle to a [`Node`].
///
/// Equality and hashing are by identity.
#[derive(Clone)]
pub struct NodeRef(pub(super) Rc<RefCell<Node>>);

impl NodeRef {
    /// Allocate a node without a capability.\
    /// This is the default allocation hook.
    pub fn from_data(data: NodeData) -> Self {
        Self::with_capability(data, None)
    }

    pub fn with_capability(data: NodeData, capability: Option<Rc<dyn TagCapability>>) -> Self {
        Self(Rc::new(RefCell::new(Node {
            parent: None,
            first_child: None,
            last_child: None,
            prev_sibling: None,
            next_sibling: None,
            node_type: data.node_type,
            tag: data.tag.into(),
            data: data.data,
            namespace: data.namespace.map(Rc::from),
            attributes: data.attributes,
            capability,
        })))
    }

    pub fn new_document() -> Self {
        Self::from_data(NodeData::document())
    }

    pub fn new_element(tag: &str) -> Self {
        Self::from_data(NodeData::element(tag, vec![]))
    }

    pub fn new_element_with_attributes(tag: &str, attributes: Vec<Attribute>) -> Self {
        Self::from_data(NodeData::element(tag, attributes))
    }

    pub fn new_text(data: &str) -> Self {
        Self::from_data(NodeData::text(data))
    }

    pub fn new_comment(data: &str) -> Self {
        Self::from_data(NodeData::comment(data))
    }

    pub fn new_doctype(name: &str) -> Self {
        Self::from_data(NodeData::doctype(name, vec![]))
    }

    pub fn downgrade(&self) -> NodeWeakRef {
        NodeWeakRef(Rc::downgrade(&self.0))
    }

    /// Check if `self` and `other` are the same node.
    pub fn is_same_node(&self, other: &NodeRef) -> bool {
        Rc::ptr_eq(&self.0, &other.0)
    }

    pub fn node_type(&self) -> NodeType {
        self.0.borrow().node_type
    }

    pub fn is_element(&self) -> bool {
        self.node_type() == NodeType::Element
    }

    pub fn tag(&self) -> Rc<str> {
        self.0.borrow().tag.clone()
    }

    pub fn set_tag(&self, tag: &str) {
        self.0.borrow_mut().tag = tag.into();
    }

    pub fn data(&self) -> String {
        self.0.borrow().data.clone()
    }

    pub fn set_data(&self, data: impl Into<String>) {
        self.0.borrow_mut().data = data.into();
    }

    pub fn namespace(&self) -> Option<Rc<str>> {
        self.0.borrow().namespace.clone()
    }

    pub fn set_namespace(&self, namespace: Option<&str>) {
        self.0.borrow_mut().namespace = namespace.map(Rc::from);
    }

    /// Return a copy of the attribute sequence.
    pub fn attributes(&self) -> Vec<Attribute> {
        self.0.borrow().attributes.clone()
    }

    pub fn set_attributes(&self, attributes: Vec<Attribute>) {
        self.0.borrow_mut().attributes = attributes;
    }

    pub(super) fn with_attributes<R>(&self, f: impl FnOnce(&[Attribute]) -> R) -> R {
        f(&self.0.borrow().attributes)
    }

    pub(super) fn with_attributes_mut<R>(&self, f: impl FnOnce(&mut Vec<Attribute>) -> R) -> R {
        f(&mut self.0.borrow_mut().attributes)
    }

    pub fn capability(&self) -> Option<Rc<dyn TagCapability>> {
        self.0.borrow().capability.clone()
    }

    pub fn parent(&self) -> Option<NodeRef> {
        self.0.borrow().parent.as_ref().and_then(|p| p.upgrade())
    }

    pub fn first_child(&self) -> Option<NodeRef> {
        self.0.borrow().first_child.clone()
    }

    pub fn last_child(&self) -> Option<NodeRef> {
        self.0.borrow().last_child.clone()
    }

    pub fn prev_sibling(&self) -> Option<NodeRef> {
        self.0.borrow().prev_sibling.as_ref().and_then(|p| p.upgrade())
    }

    pub fn next_sibling(&self) -> Option<NodeRef> {
        self.0.borrow().next_sibling.clone()
    }

    pub fn has_child_nodes(&self) -> bool {
        self.0.borrow().first_child.is_some()
    }

    /// Return a snapshot of the children in document order.
    pub fn children(&self) -> Vec<NodeRef> {
        let mut res = vec![];
        let mut children = self.first_child();
        while let Some(child) = children {
            children = child.next_sibling();
            res.push(child);
        }
        res
    }

    /// Check if `other` is a strict descendant of `self`.
    pub fn contains(&self, other: &NodeRef) -> bool {
        if !self.has_child_nodes() {
            return false;
        }
        let mut parent = other.parent();
        while let Some(par) = parent {
            if par.is_same_node(self) {
                return true;
            }
            parent = par.parent();
        }
        false
    }

    /// Insert `new_child` immediately before `old_child`.\
    /// If `old_child` is `None`, `new_child` is appended as the last child.
    ///
    /// # Errors
    /// - `AlreadyAttached` if `new_child` has a parent or siblings.
    /// - `NotAChild` if `old_child` is not a child of `self`.
    /// - `HierarchyRequest` if `new_child` is `self` or one of its ancestors.
    pub fn insert_before(
        &self,
        new_child: NodeRef,
        old_child: Option<&NodeRef>,
    ) -> Result<NodeRef, TreeError> {
        if new_child.parent().is_some()
            || new_child.prev_sibling().is_some()
            || new_child.next_sibling().is_some()
        {
            return Err(TreeError::AlreadyAttached);
        }
        if let Some(old) = old_child {
            if old.parent().is_none_or(|par| !par.is_same_node(self)) {
                return Err(TreeError::NotAChild);
            }
        }
        if new_child.is_same_node(self) || new_child.contains(self) {
            return Err(TreeError::HierarchyRequest);
        }

        let (prev, next) = match old_child {
            Some(old) => (old.prev_sibling(), Some(old.clone())),
            None => (self.last_child(), None),
        };
        match &prev {
            Some(prev) => prev.set_next_sibling(Some(new_child.clone())),
            None => self.set_first_child(Some(new_child.clone())),
        };
        match &next {
            Some(next) => next.set_prev_sibling(Some(new_child.clone())),
            None => self.set_last_child(Some(new_child.clone())),
        };
        new_child.set_parent(Some(self.clone()));
        new_child.set_prev_sibling(prev);
        new_child.set_next_sibling(next);
        Ok(new_child)
    }

    /// Append `new_child` as the last child of `self`.
    ///
    /// The preconditions are the same as [`NodeRef::insert_before`].
    pub fn append_child(&self, new_child: NodeRef) -> Result<NodeRef, TreeError> {
        self.insert_before(new_child, None)
    }

    /// Append all of `nodes` in order.
    ///
    /// Every node is checked before the first one is appended,
    /// so nothing is appended if an error is returned.
    pub fn append_children(
        &self,
        nodes: impl IntoIterator<Item = NodeRef>,
    ) -> Result<(), TreeError> {
        let nodes = nodes.into_iter().collect::<Vec<_>>();
        let mut seen = HashSet::new();
        for node in &nodes {
            if node.parent().is_some()
                || node.prev_sibling().is_some()
                || node.next_sibling().is_some()
                || !seen.insert(node.clone())
            {
                return Err(TreeError::AlreadyAttached);
            }
            if node.is_same_node(self) || node.contains(self) {
                return Err(TreeError::HierarchyRequest);
            }
        }
        for node in nodes {
            self.insert_before(node, None)?;
        }
        Ok(())
    }

    /// Remove `child` from the children of `self`.
    ///
    /// The removed node keeps its own subtree and can be attached elsewhere.
    pub fn remove_child(&self, child: &NodeRef) -> Result<NodeRef, TreeError> {
        if child.parent().is_none_or(|par| !par.is_same_node(self)) {
            return Err(TreeError::NotAChild);
        }
        let prev = child.set_prev_sibling(None);
        let next = child.set_next_sibling(None);
        child.set_parent(None);

        if self.first_child().is_some_and(|first| first.is_same_node(child)) {
            self.set_first_child(next.clone());
        }
        if self.last_child().is_some_and(|last| last.is_same_node(child)) {
            self.set_last_child(prev.clone());
        }
        if let Some(next) = &next {
            next.set_prev_sibling(prev.clone());
        }
        if let Some(prev) = prev {
            prev.set_next_sibling(next);
        }
        Ok(child.clone())
    }

    /// Move all children of `src` to the end of the children of `self`, keeping their order.
    pub fn reparent_children(&self, src: &NodeRef) -> Result<(), TreeError> {
        if src.is_same_node(self) {
            return Ok(());
        }
        if src.contains(self) {
            return Err(TreeError::HierarchyRequest);
        }
        while let Some(child) = src.first_child() {
            src.remove_child(&child)?;
            self.append_child(child)?;
        }
        Ok(())
    }

    /// Return the description of this node, without links and without children.
    pub fn to_data(&self) -> NodeData {
        let node = self.0.borrow();
        NodeData {
            node_type: node.node_type,
            tag: node.tag.to_string(),
            data: node.data.clone(),
            namespace: node.namespace.as_deref().map(str::to_owned),
            attributes: node.attributes.clone(),
        }
    }

    /// Clone this node through the allocation hook `lookup`.
    ///
    /// The clone is unattached and has no children.
    /// The attribute sequence is copied, so the clone does not share it with `self`.
    pub fn clone_with(&self, lookup: impl FnOnce(NodeData) -> NodeRef) -> NodeRef {
        lookup(self.to_data())
    }

    /// Clone this node keeping its capability.
    pub fn clone_node(&self) -> NodeRef {
        let capability = self.capability();
        self.clone_with(|data| NodeRef::with_capability(data, capability))
    }

    /// A short human-readable summary of the node.
    pub fn describe(&self) -> String {
        const EXCERPT: usize = 20;
        let node = self.0.borrow();
        let excerpt = || {
            let mut s = node.data.chars().take(EXCERPT).collect::<String>();
            if node.data.chars().nth(EXCERPT).is_some() {
                s.push_str("...");
            }
            s
        };
        match node.node_type {
            NodeType::Element => format!("<{}>", node.tag),
            NodeType::Text => format!("#text {:?}", excerpt()),
            NodeType::Comment => format!("<!--{}-->", excerpt()),
            NodeType::Doctype => format!("<!DOCTYPE {}>", node.data),
            NodeType::Document => "#document".to_owned(),
            NodeType::Error => "#error".to_owned(),
            NodeType::ScopeMarker => "#scope-marker".to_owned(),
        }
    }
}

impl PartialEq for NodeRef {
    fn eq(&self, other: &Self) -> bool {
        self.is_same_node(other)
    }
}

impl Eq for NodeRef {}

impl Hash for NodeRef {
    fn hash<H: Hasher>(&self, state: &mut H) {
        Rc::as_ptr(&self.0).hash(state);
    }
}

impl fmt::Debug for NodeRef {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.describe())
    }
}

/// A non-owning handle to a [`Node`].
#[derive(Clone)]
pub struct NodeWeakRef(Weak<RefCell<Node>>);

impl NodeWeakRef {
    pub fn upgrade(&self) -> Option<NodeRef> {
        self.0.upgrade().map(NodeRef)
    }
}

/// Raw link setters.
///
/// They set the given node and check nothing, so they may break the invariants of the tree.
/// Mutations must go through [`NodeRef::insert_before`] and friends.
pub(crate) trait NodeConnection {
    /// Set new parent node.\
    /// Return old parent node if exists.
    fn set_parent(&self, new_parent: Option<NodeRef>) -> Option<NodeRef>;
    /// Set new first child node.\
    /// Return old first child node if exists.
    fn set_first_child(&self, new_child: Option<NodeRef>) -> Option<NodeRef>;
    /// Set new last child node.\
    /// Return old last child node if exists.
    fn set_last_child(&self, new_child: Option<NodeRef>) -> Option<NodeRef>;
    /// Set new previous sibling node.\
    /// Return old previous sibling node if exists.
    fn set_prev_sibling(&self, new_sibling: Option<NodeRef>) -> Option<NodeRef>;
    /// Set new next sibling node.\
    /// Return old next sibling node if exists.
    fn set_next_sibling(&self, new_sibling: Option<NodeRef>) -> Option<NodeRef>;
}

impl NodeConnection for NodeRef {
    fn set_parent(&self, new_parent: Option<NodeRef>) -> Option<NodeRef> {
        let new = new_parent.map(|p| p.downgrade());
        let old = std::mem::replace(&mut self.0.borrow_mut().parent, new);
        old.and_then(|p| p.upgrade())
    }

    fn set_first_child(&self, new_child: Option<NodeRef>) -> Option<NodeRef> {
        std::mem::replace(&mut self.0.borrow_mut().first_child, new_child)
    }

    fn set_last_child(&self, new_child: Option<NodeRef>) -> Option<NodeRef> {
        std::mem::replace(&mut self.0.borrow_mut().last_child, new_child)
    }

    fn set_prev_sibling(&self, new_sibling: Option<NodeRef>) -> Option<NodeRef> {
        let new = new_sibling.map(|p| p.downgrade());
        let old = std::mem::replace(&mut self.0.borrow_mut().prev_sibling, new);
        old.and_then(|p| p.upgrade())
    }

    fn set_next_sibling(&self, new_sibling: Option<NodeRef>) -> Option<NodeRef> {
        std::mem::replace(&mut self.0.borrow_mut().next_sibling, new_sibling)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn tags(node: &NodeRef) -> Vec<String> {
        node.children().iter().map(|c| c.tag().to_string()).collect()
    }

    #[test]
    fn test_append_and_insert() {
        let div = NodeRef::new_element("div");
        let a = div.append_child(NodeRef::new_element("a")).unwrap();
        let c = div.append_child(NodeRef::new_element("c")).unwrap();
        let b = div.insert_before(NodeRef::new_element("b"), Some(&c)).unwrap();
        let z = div.insert_before(NodeRef::new_element("z"), Some(&a)).unwrap();
        assert_eq!(tags(&div), ["z", "a", "b", "c"]);
        assert!(div.first_child().unwrap().is_same_node(&z));
        assert!(div.last_child().unwrap().is_same_node(&c));
        assert!(b.prev_sibling().unwrap().is_same_node(&a));
        assert!(b.next_sibling().unwrap().is_same_node(&c));
        assert!(z.prev_sibling().is_none());
        assert!(b.parent().unwrap().is_same_node(&div));
    }

    #[test]
    fn test_insert_contract_violations() {
        let div = NodeRef::new_element("div");
        let span = div.append_child(NodeRef::new_element("span")).unwrap();
        let other = NodeRef::new_element("p");

        assert_eq!(
            div.append_child(span.clone()).unwrap_err(),
            TreeError::AlreadyAttached
        );
        let stray = NodeRef::new_element("i");
        assert_eq!(
            div.insert_before(NodeRef::new_text("x"), Some(&stray))
                .unwrap_err(),
            TreeError::NotAChild
        );
        assert_eq!(
            div.append_child(div.clone()).unwrap_err(),
            TreeError::HierarchyRequest
        );
        let root = NodeRef::new_element("root");
        root.append_child(other.clone()).unwrap();
        let detached = root.remove_child(&other).unwrap();
        other.append_child(div.clone()).unwrap();
        assert_eq!(
            span.append_child(detached).unwrap_err(),
            TreeError::HierarchyRequest
        );
        // nothing changed
        assert_eq!(tags(&div), ["span"]);
    }

    #[test]
    fn test_remove_child() {
        let div = NodeRef::new_element("div");
        let a = div.append_child(NodeRef::new_element("a")).unwrap();
        let b = div.append_child(NodeRef::new_element("b")).unwrap();
        let c = div.append_child(NodeRef::new_element("c")).unwrap();
        b.append_child(NodeRef::new_text("inner")).unwrap();

        div.remove_child(&b).unwrap();
        assert_eq!(tags(&div), ["a", "c"]);
        assert!(a.next_sibling().unwrap().is_same_node(&c));
        assert!(c.prev_sibling().unwrap().is_same_node(&a));
        assert!(b.parent().is_none());
        assert!(b.prev_sibling().is_none() && b.next_sibling().is_none());
        assert_eq!(b.children().len(), 1);
        assert_eq!(div.remove_child(&b).unwrap_err(), TreeError::NotAChild);

        div.remove_child(&a).unwrap();
        div.remove_child(&c).unwrap();
        assert!(div.first_child().is_none());
        assert!(div.last_child().is_none());
    }

    #[test]
    fn test_remove_then_append_restores_last_position() {
        let div = NodeRef::new_element("div");
        let a = div.append_child(NodeRef::new_element("a")).unwrap();
        div.append_child(NodeRef::new_element("b")).unwrap();
        div.remove_child(&a).unwrap();
        div.append_child(a.clone()).unwrap();
        assert_eq!(tags(&div), ["b", "a"]);
        assert!(div.last_child().unwrap().is_same_node(&a));
        assert!(a.next_sibling().is_none());
    }

    #[test]
    fn test_reparent_children() {
        let src = NodeRef::new_element("src");
        let dst = NodeRef::new_element("dst");
        dst.append_child(NodeRef::new_element("x")).unwrap();
        for tag in ["a", "b", "c"] {
            src.append_child(NodeRef::new_element(tag)).unwrap();
        }
        dst.reparent_children(&src).unwrap();
        assert!(!src.has_child_nodes());
        assert_eq!(tags(&dst), ["x", "a", "b", "c"]);
        assert!(
            dst.last_child()
                .unwrap()
                .parent()
                .unwrap()
                .is_same_node(&dst)
        );

        let inner = dst.first_child().unwrap();
        assert_eq!(
            inner.reparent_children(&dst).unwrap_err(),
            TreeError::HierarchyRequest
        );
    }

    #[test]
    fn test_append_children_is_all_or_nothing() {
        let div = NodeRef::new_element("div");
        let a = NodeRef::new_element("a");
        let attached = NodeRef::new_element("b");
        // the parent must stay alive, or `attached` counts as detached again
        let other = NodeRef::new_element("other");
        other.append_child(attached.clone()).unwrap();
        assert_eq!(
            div.append_children([a.clone(), attached.clone()]).unwrap_err(),
            TreeError::AlreadyAttached
        );
        assert!(!div.has_child_nodes());
        assert_eq!(attached.parent(), Some(other));
        assert_eq!(
            div.append_children([a.clone(), a.clone()]).unwrap_err(),
            TreeError::AlreadyAttached
        );
        div.append_children([a, NodeRef::new_element("c")]).unwrap();
        assert_eq!(tags(&div), ["a", "c"]);
    }

    #[test]
    fn test_clone_copies_attributes() {
        let img =
            NodeRef::new_element_with_attributes("img", vec![Attribute::new("src", "a.png")]);
        let cloned = img.clone_node();
        cloned.set_attributes(vec![Attribute::new("src", "b.png")]);
        assert_eq!(img.attributes()[0].value, "a.png");
        assert!(!cloned.is_same_node(&img));
        assert!(cloned.parent().is_none());

        let div = NodeRef::new_element("div");
        div.append_child(NodeRef::new_text("child")).unwrap();
        let mut seen = None;
        let shallow = div.clone_with(|data| {
            seen = Some(data.clone());
            NodeRef::from_data(data)
        });
        assert_eq!(seen.unwrap().tag, "div");
        assert!(!shallow.has_child_nodes());
    }

    #[test]
    fn test_contains_is_strict() {
        let div = NodeRef::new_element("div");
        let p = div.append_child(NodeRef::new_element("p")).unwrap();
        let t = p.append_child(NodeRef::new_text("t")).unwrap();
        assert!(div.contains(&t));
        assert!(div.contains(&p));
        assert!(!div.contains(&div));
        assert!(!t.contains(&div));
    }

    #[test]
    fn test_drop_wide_subtree() {
        let div = NodeRef::new_element("div");
        for _ in 0..200_000 {
            div.append_child(NodeRef::new_text("x")).unwrap();
        }
        let kept = div.last_child().unwrap();
        drop(div);
        assert!(kept.parent().is_none());
        assert_eq!(kept.data(), "x");
    }

    #[test]
    fn test_drop_deep_subtree() {
        let root = NodeRef::new_element("div");
        let mut cur = root.clone();
        for _ in 0..100_000 {
            cur = cur.append_child(NodeRef::new_element("i")).unwrap();
        }
        let leaf = cur;
        let kept = leaf.parent().unwrap();
        drop(root);
        assert!(kept.parent().is_none());
        assert_eq!(kept.first_child(), Some(leaf));
    }

    #[test]
    fn test_describe() {
        assert_eq!(NodeRef::new_element("div").describe(), "<div>");
        assert_eq!(NodeRef::new_text("hi").describe(), "#text \"hi\"");
        assert_eq!(NodeRef::new_document().describe(), "#document");
    }
}
