//! Offline verification of the structural invariants of a tree.
//!
//! Nothing on the mutation path calls into this module.
//! It exists for tests and for the `--check` flag of `mqlint`.

use std::{collections::HashSet, fmt};

use super::{MAX_SIBLINGS, MAX_TREE_DEPTH, NodeRef};

/// One of the structural links of a node.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Link {
    Parent,
    FirstChild,
    LastChild,
    PrevSibling,
    NextSibling,
}

impl Link {
    fn as_str(self) -> &'static str {
        match self {
            Link::Parent => "parent",
            Link::FirstChild => "first child",
            Link::LastChild => "last child",
            Link::PrevSibling => "previous sibling",
            Link::NextSibling => "next sibling",
        }
    }
}

/// The relationship a checked node violates.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Inconsistency {
    /// The tree is nested deeper than [`MAX_TREE_DEPTH`].
    TreeTooDeep,
    /// The parent chain is longer than [`MAX_TREE_DEPTH`].
    ParentChainTooLong,
    /// Walking `first_child` -> `next_sibling` did not end within [`MAX_SIBLINGS`].
    ForwardChildrenTooLong,
    /// Walking `last_child` -> `prev_sibling` did not end within [`MAX_SIBLINGS`].
    BackwardChildrenTooLong,
    /// A child does not point back to the node as its parent.
    ChildParent,
    /// The node links to itself.
    SelfLink(Link),
    /// The parent of the node is also linked as another relative.
    ParentIsRelative(Link),
    /// The parent does not have the node among its children.
    NotAChildOfParent,
    /// `prev_sibling.next_sibling` is not the node.
    PrevNext,
    /// `next_sibling.prev_sibling` is not the node.
    NextPrev,
    /// Exactly one of `first_child` and `last_child` is set.
    FirstLast,
    /// The only child has a sibling.
    SoleChildSiblings,
    /// A child appears twice in the forward walk.
    RepeatedChild,
    /// The forward walk does not end at `last_child`.
    LastChild,
    /// The backward walk reaches a node the forward walk did not.
    MissingChild,
    /// The backward walk does not end at `first_child`.
    FirstChild,
    /// The forward walk reaches a node the backward walk did not.
    ForwardsBackwards,
}

impl fmt::Display for Inconsistency {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        use Inconsistency::*;
        match self {
            TreeTooDeep => f.write_str("tree looks like it contains a cycle"),
            ParentChainTooLong => f.write_str("parent list looks like an infinite loop"),
            ForwardChildrenTooLong => {
                f.write_str("forward list of children looks like an infinite loop")
            }
            BackwardChildrenTooLong => {
                f.write_str("backward list of children looks like an infinite loop")
            }
            ChildParent => f.write_str("inconsistent child/parent relationship"),
            SelfLink(link) => write!(f, "node is its own {}", link.as_str()),
            ParentIsRelative(link) => {
                write!(f, "inconsistent parent relationship: parent is also the {}", link.as_str())
            }
            NotAChildOfParent => f.write_str("inconsistent parent relationship"),
            PrevNext => f.write_str("inconsistent prev/next sibling relationship"),
            NextPrev => f.write_str("inconsistent next/prev sibling relationship"),
            FirstLast => f.write_str("inconsistent first/last relationship"),
            SoleChildSiblings => f.write_str("inconsistent sole child's sibling relationship"),
            RepeatedChild => f.write_str("inconsistent repeated child"),
            LastChild => f.write_str("inconsistent last relationship"),
            MissingChild => f.write_str("inconsistent missing child"),
            FirstChild => f.write_str("inconsistent first relationship"),
            ForwardsBackwards => f.write_str("inconsistent forwards/backwards child list"),
        }
    }
}

/// The first invariant violation found by [`check_tree`] or [`check_node`].
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ConsistencyError {
    pub kind: Inconsistency,
    /// Summary of the offending node, see [`NodeRef::describe`].
    pub node: String,
}

impl ConsistencyError {
    fn new(kind: Inconsistency, node: &NodeRef) -> Self {
        Self {
            kind,
            node: node.describe(),
        }
    }
}

impl fmt::Display for ConsistencyError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{} at {}", self.kind, self.node)
    }
}

impl std::error::Error for ConsistencyError {}

fn same(left: &Option<NodeRef>, right: &Option<NodeRef>) -> bool {
    match (left, right) {
        (Some(l), Some(r)) => l.is_same_node(r),
        (None, None) => true,
        _ => false,
    }
}

/// Check every node of the subtree rooted at `root`.
pub fn check_tree(root: &NodeRef) -> Result<(), ConsistencyError> {
    let mut stack = vec![(root.clone(), 0)];
    while let Some((node, depth)) = stack.pop() {
        if depth == MAX_TREE_DEPTH {
            return Err(ConsistencyError::new(Inconsistency::TreeTooDeep, &node));
        }
        check_node(&node)?;
        let mut children = node.last_child();
        while let Some(child) = children {
            children = child.prev_sibling();
            stack.push((child, depth + 1));
        }
    }
    Ok(())
}

/// Check the links between `node` and its parent, siblings and children.
pub fn check_node(node: &NodeRef) -> Result<(), ConsistencyError> {
    use Inconsistency::*;

    let err = |kind| Err(ConsistencyError::new(kind, node));

    let mut depth = 0;
    let mut parent = node.parent();
    while let Some(par) = parent {
        depth += 1;
        if depth == MAX_TREE_DEPTH {
            return err(ParentChainTooLong);
        }
        parent = par.parent();
    }

    let links = [
        (Link::Parent, node.parent()),
        (Link::FirstChild, node.first_child()),
        (Link::LastChild, node.last_child()),
        (Link::PrevSibling, node.prev_sibling()),
        (Link::NextSibling, node.next_sibling()),
    ];
    for (link, target) in &links {
        if target.as_ref().is_some_and(|t| t.is_same_node(node)) {
            return err(SelfLink(*link));
        }
    }

    let mut forward = 0;
    let mut children = node.first_child();
    while let Some(child) = children {
        forward += 1;
        if forward == MAX_SIBLINGS {
            return err(ForwardChildrenTooLong);
        }
        if child.parent().is_none_or(|p| !p.is_same_node(node)) {
            return err(ChildParent);
        }
        children = child.next_sibling();
    }
    let mut backward = 0;
    let mut children = node.last_child();
    while let Some(child) = children {
        backward += 1;
        if backward == MAX_SIBLINGS {
            return err(BackwardChildrenTooLong);
        }
        if child.parent().is_none_or(|p| !p.is_same_node(node)) {
            return err(ChildParent);
        }
        children = child.prev_sibling();
    }

    if let Some(par) = node.parent() {
        for (link, target) in &links[1..] {
            if target.as_ref().is_some_and(|t| t.is_same_node(&par)) {
                return err(ParentIsRelative(*link));
            }
        }
        let mut steps = 0;
        let mut found = false;
        let mut siblings = par.first_child();
        while let Some(sibling) = siblings {
            if sibling.is_same_node(node) {
                found = true;
                break;
            }
            steps += 1;
            if steps == MAX_SIBLINGS {
                return err(ForwardChildrenTooLong);
            }
            siblings = sibling.next_sibling();
        }
        if !found {
            return err(NotAChildOfParent);
        }
        if let Some(prev) = node.prev_sibling() {
            if prev.next_sibling().is_none_or(|n| !n.is_same_node(node)) {
                return err(PrevNext);
            }
        }
        if let Some(next) = node.next_sibling() {
            if next.prev_sibling().is_none_or(|p| !p.is_same_node(node)) {
                return err(NextPrev);
            }
        }
    }

    let first = node.first_child();
    let last = node.last_child();
    if first.is_none() != last.is_none() {
        return err(FirstLast);
    }
    if let Some(sole) = first
        .as_ref()
        .filter(|f| last.as_ref().is_some_and(|l| l.is_same_node(f)))
    {
        if sole.prev_sibling().is_some() || sole.next_sibling().is_some() {
            return err(SoleChildSiblings);
        }
    }

    let mut seen = HashSet::new();
    let mut tail = None;
    let mut children = node.first_child();
    while let Some(child) = children {
        if !seen.insert(child.clone()) {
            return err(RepeatedChild);
        }
        children = child.next_sibling();
        tail = Some(child);
    }
    if !same(&tail, &last) {
        return err(LastChild);
    }
    let mut head = None;
    let mut children = node.last_child();
    while let Some(child) = children {
        if !seen.remove(&child) {
            return err(MissingChild);
        }
        children = child.prev_sibling();
        head = Some(child);
    }
    if !same(&head, &first) {
        return err(FirstChild);
    }
    if !seen.is_empty() {
        return err(ForwardsBackwards);
    }
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::dom::node::NodeConnection;

    fn sample() -> (NodeRef, Vec<NodeRef>) {
        let root = NodeRef::new_document();
        let div = root.append_child(NodeRef::new_element("div")).unwrap();
        let children = ["a", "b", "c"]
            .into_iter()
            .map(|tag| div.append_child(NodeRef::new_element(tag)).unwrap())
            .collect::<Vec<_>>();
        children[1].append_child(NodeRef::new_text("text")).unwrap();
        (root, children)
    }

    #[test]
    fn test_consistent_tree() {
        let (root, children) = sample();
        check_tree(&root).unwrap();
        let div = children[0].parent().unwrap();
        div.remove_child(&children[1]).unwrap();
        check_tree(&root).unwrap();
        check_tree(&children[1]).unwrap();
    }

    #[test]
    fn test_broken_prev_link() {
        let (root, children) = sample();
        children[2].set_prev_sibling(None);
        let err = check_node(&children[1]).unwrap_err();
        assert_eq!(err.kind, Inconsistency::NextPrev);
        assert_eq!(err.node, "<b>");
        // the parent is visited first and its backward walk stops early
        let err = check_tree(&root).unwrap_err();
        assert_eq!(err.kind, Inconsistency::FirstChild);
        assert_eq!(err.node, "<div>");
    }

    #[test]
    fn test_broken_last_child() {
        let (root, children) = sample();
        let div = children[0].parent().unwrap();
        div.set_last_child(Some(children[1].clone()));
        assert_eq!(check_tree(&root).unwrap_err().kind, Inconsistency::LastChild);

        div.set_last_child(None);
        assert_eq!(check_tree(&root).unwrap_err().kind, Inconsistency::FirstLast);
    }

    #[test]
    fn test_child_parent_mismatch() {
        let (root, children) = sample();
        let div = children[1].parent().unwrap();
        let other = NodeRef::new_element("other");
        children[0].set_parent(Some(other.clone()));
        let err = check_node(&div).unwrap_err();
        assert_eq!(err.kind, Inconsistency::ChildParent);
        assert!(check_tree(&root).is_err());
    }

    #[test]
    fn test_self_link() {
        let (_root, children) = sample();
        children[0].set_next_sibling(Some(children[0].clone()));
        let err = check_node(&children[0]).unwrap_err();
        assert_eq!(err.kind, Inconsistency::SelfLink(Link::NextSibling));
        // break the cycle so the nodes can be freed
        children[0].set_next_sibling(None);
    }

    #[test]
    fn test_sole_child_with_sibling() {
        let p = NodeRef::new_element("p");
        let only = p.append_child(NodeRef::new_text("x")).unwrap();
        let stray = NodeRef::new_text("y");
        stray.set_parent(Some(p.clone()));
        only.set_next_sibling(Some(stray));
        assert_eq!(
            check_node(&p).unwrap_err().kind,
            Inconsistency::SoleChildSiblings
        );
    }

    #[test]
    fn test_cyclic_sibling_list_of_parent() {
        let p = NodeRef::new_element("p");
        let a = p.append_child(NodeRef::new_element("a")).unwrap();
        let b = p.append_child(NodeRef::new_element("b")).unwrap();
        b.set_next_sibling(Some(a.clone()));
        // claims `p` as parent but is not reachable from it
        let stray = NodeRef::new_element("x");
        stray.set_parent(Some(p.clone()));

        let err = check_node(&stray).unwrap_err();
        assert_eq!(err.kind, Inconsistency::ForwardChildrenTooLong);
        assert_eq!(err.node, "<x>");
        assert_eq!(
            check_tree(&p).unwrap_err().kind,
            Inconsistency::ForwardChildrenTooLong
        );
        b.set_next_sibling(None);
    }

    #[test]
    fn test_cyclic_prev_links() {
        let p = NodeRef::new_element("p");
        let a = p.append_child(NodeRef::new_element("a")).unwrap();
        let b = p.append_child(NodeRef::new_element("b")).unwrap();
        a.set_prev_sibling(Some(b));
        assert_eq!(
            check_node(&p).unwrap_err().kind,
            Inconsistency::BackwardChildrenTooLong
        );
    }

    #[test]
    fn test_cyclic_parent_chain() {
        let x = NodeRef::new_element("x");
        let y = NodeRef::new_element("y");
        x.set_parent(Some(y.clone()));
        y.set_parent(Some(x.clone()));
        let err = check_node(&x).unwrap_err();
        assert_eq!(err.kind, Inconsistency::ParentChainTooLong);
        assert_eq!(err.node, "<x>");
    }

    #[test]
    fn test_tree_too_deep() {
        let root = NodeRef::new_element("div");
        let mut cur = root.clone();
        for _ in 0..MAX_TREE_DEPTH - 1 {
            cur = cur.append_child(NodeRef::new_element("i")).unwrap();
        }
        check_tree(&root).unwrap();

        cur.append_child(NodeRef::new_element("b")).unwrap();
        let err = check_tree(&root).unwrap_err();
        assert_eq!(err.kind, Inconsistency::TreeTooDeep);
        assert_eq!(err.node, "<b>");
    }

    #[test]
    fn test_error_message() {
        let err = ConsistencyError {
            kind: Inconsistency::TreeTooDeep,
            node: "<div>".to_owned(),
        };
        assert_eq!(err.to_string(), "tree looks like it contains a cycle at <div>");
    }
}
