use crate::{
    dom::{NodeRef, NodeType},
    selector::{self, CompiledSelector, Matcher, SelectorError},
};

use super::{Selection, is_in_slice, map_nodes};

/// Which nodes at the same level are requested.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum SiblingType {
    PrevUntil,
    PrevAll,
    Prev,
    All,
    Next,
    NextAll,
    NextUntil,
    AllIncludingNonElements,
}

impl SiblingType {
    fn is_until(self) -> bool {
        matches!(self, SiblingType::PrevUntil | SiblingType::NextUntil)
    }

    fn is_single(self) -> bool {
        matches!(self, SiblingType::Prev | SiblingType::Next)
    }
}

/// The condition that ends an `...Until` walk.\
/// The node satisfying it is not part of the result.
#[derive(Clone, Copy)]
enum Until<'a> {
    Never,
    Matcher(&'a dyn Matcher),
    Nodes(&'a [NodeRef]),
}

impl<'a> Until<'a> {
    fn selector(compiled: &'a Option<CompiledSelector>) -> Self {
        compiled.as_ref().map_or(Until::Never, |m| Until::Matcher(m))
    }

    fn reached(&self, node: &NodeRef) -> bool {
        match self {
            Until::Never => false,
            Until::Matcher(m) => m.matches(node),
            Until::Nodes(nodes) => is_in_slice(nodes, node),
        }
    }
}

/// An empty boundary selector never stops the walk.
fn compile_until(selector: &str) -> Result<Option<CompiledSelector>, SelectorError> {
    if selector.is_empty() {
        return Ok(None);
    }
    selector::compile(selector).map(Some)
}

/// Walk the children of `parent`, or the siblings of `skip`, according to `st`.
///
/// For `All` modes the walk starts at the first child of `parent` and `skip` is excluded.
/// For `Prev*` and `Next*` modes the walk starts next to `skip`.
fn children_with_sibling_type(
    parent: Option<&NodeRef>,
    st: SiblingType,
    skip: Option<&NodeRef>,
    until: Until,
) -> Vec<NodeRef> {
    use SiblingType::*;

    let backward = matches!(st, Prev | PrevAll | PrevUntil);
    let mut cur = match st {
        All | AllIncludingNonElements => parent.and_then(|p| p.first_child()),
        Prev | PrevAll | PrevUntil => skip.and_then(|s| s.prev_sibling()),
        Next | NextAll | NextUntil => skip.and_then(|s| s.next_sibling()),
    };

    let mut res = vec![];
    while let Some(node) = cur {
        cur = if backward {
            node.prev_sibling()
        } else {
            node.next_sibling()
        };
        if skip.is_some_and(|s| s.is_same_node(&node)) {
            continue;
        }
        match node.node_type() {
            NodeType::Element => {}
            NodeType::ScopeMarker => continue,
            _ if st == AllIncludingNonElements => {}
            _ => continue,
        }
        if st.is_until() && until.reached(&node) {
            break;
        }
        res.push(node);
        if st.is_single() {
            break;
        }
    }
    res
}

fn children_nodes(nodes: &[NodeRef], st: SiblingType) -> Vec<NodeRef> {
    map_nodes(nodes, |n| {
        children_with_sibling_type(Some(n), st, None, Until::Never)
    })
}

fn sibling_nodes(nodes: &[NodeRef], st: SiblingType, until: Until) -> Vec<NodeRef> {
    map_nodes(nodes, |n| {
        children_with_sibling_type(n.parent().as_ref(), st, Some(n), until)
    })
}

fn parent_nodes(nodes: &[NodeRef]) -> Vec<NodeRef> {
    map_nodes(nodes, |n| n.parent().filter(|p| p.is_element()).into_iter().collect())
}

/// Return the Element ancestors of each node, nearest first,
/// stopping before the first ancestor that satisfies `until`.
fn parents_nodes(nodes: &[NodeRef], until: Until) -> Vec<NodeRef> {
    map_nodes(nodes, |n| {
        let mut res = vec![];
        let mut parent = n.parent();
        while let Some(par) = parent {
            if until.reached(&par) {
                break;
            }
            if par.is_element() {
                res.push(par.clone());
            }
            parent = par.parent();
        }
        res
    })
}

fn find_with_matcher(nodes: &[NodeRef], matcher: &dyn Matcher) -> Vec<NodeRef> {
    map_nodes(nodes, |n| matcher.match_all(n))
}

impl Selection {
    /// Keep the nodes of `nodes` that match `selector` and push them.
    fn filter_and_push(
        &self,
        nodes: Vec<NodeRef>,
        selector: &str,
    ) -> Result<Selection, SelectorError> {
        let matcher = selector::compile(selector)?;
        Ok(self.push_stack(matcher.filter(&nodes)))
    }

    /// Get the Element descendants of each node matching `selector`.
    pub fn find(&self, selector: &str) -> Result<Selection, SelectorError> {
        let matcher = selector::compile(selector)?;
        Ok(self.find_matcher(&matcher))
    }

    pub fn find_matcher(&self, matcher: &dyn Matcher) -> Selection {
        self.push_stack(find_with_matcher(&self.nodes, matcher))
    }

    /// Keep the nodes of `nodes` that are descendants of some node of this Selection.
    pub fn find_nodes(&self, nodes: &[NodeRef]) -> Selection {
        self.push_stack(map_nodes(nodes, |n| {
            if self.nodes.iter().any(|s| s.contains(n)) {
                vec![n.clone()]
            } else {
                vec![]
            }
        }))
    }

    /// Same as [`Selection::find_nodes`] with the nodes of `sel`.\
    /// `None` results in an empty Selection.
    pub fn find_selection(&self, sel: Option<&Selection>) -> Selection {
        match sel {
            Some(sel) => self.find_nodes(&sel.nodes),
            None => self.empty(),
        }
    }

    /// Get the children of each node, including Text and Comment nodes.
    pub fn contents(&self) -> Selection {
        self.push_stack(children_nodes(
            &self.nodes,
            SiblingType::AllIncludingNonElements,
        ))
    }

    /// Same as [`Selection::children_filtered`],
    /// except that an empty `selector` results in [`Selection::contents`].
    pub fn contents_filtered(&self, selector: &str) -> Result<Selection, SelectorError> {
        if selector.is_empty() {
            Ok(self.contents())
        } else {
            self.children_filtered(selector)
        }
    }

    /// Get the Element children of each node.
    pub fn children(&self) -> Selection {
        self.push_stack(children_nodes(&self.nodes, SiblingType::All))
    }

    pub fn children_filtered(&self, selector: &str) -> Result<Selection, SelectorError> {
        self.filter_and_push(children_nodes(&self.nodes, SiblingType::All), selector)
    }

    /// Get the parent of each node if it is an Element.
    pub fn parent(&self) -> Selection {
        self.push_stack(parent_nodes(&self.nodes))
    }

    pub fn parent_filtered(&self, selector: &str) -> Result<Selection, SelectorError> {
        self.filter_and_push(parent_nodes(&self.nodes), selector)
    }

    /// Get the first node matching `selector`, testing each node itself and then its ancestors.
    pub fn closest(&self, selector: &str) -> Result<Selection, SelectorError> {
        let matcher = selector::compile(selector)?;
        Ok(self.closest_matcher(&matcher))
    }

    pub fn closest_matcher(&self, matcher: &dyn Matcher) -> Selection {
        self.push_stack(map_nodes(&self.nodes, |n| {
            let mut cur = Some(n.clone());
            while let Some(node) = cur {
                if node.is_element() && matcher.matches(&node) {
                    return vec![node];
                }
                cur = node.parent();
            }
            vec![]
        }))
    }

    /// Get the first node contained in `nodes`, testing each node itself and then its ancestors.
    pub fn closest_nodes(&self, nodes: &[NodeRef]) -> Selection {
        self.push_stack(map_nodes(&self.nodes, |n| {
            let mut cur = Some(n.clone());
            while let Some(node) = cur {
                if is_in_slice(nodes, &node) {
                    return vec![node];
                }
                cur = node.parent();
            }
            vec![]
        }))
    }

    /// Same as [`Selection::closest_nodes`] with the nodes of `sel`.\
    /// `None` results in an empty Selection.
    pub fn closest_selection(&self, sel: Option<&Selection>) -> Selection {
        match sel {
            Some(sel) => self.closest_nodes(&sel.nodes),
            None => self.empty(),
        }
    }

    /// Get the Element ancestors of each node, nearest first.
    pub fn parents(&self) -> Selection {
        self.push_stack(parents_nodes(&self.nodes, Until::Never))
    }

    pub fn parents_filtered(&self, selector: &str) -> Result<Selection, SelectorError> {
        self.filter_and_push(parents_nodes(&self.nodes, Until::Never), selector)
    }

    /// Get the Element ancestors of each node up to, but not including,
    /// the first one matching `selector`.
    pub fn parents_until(&self, selector: &str) -> Result<Selection, SelectorError> {
        let until = compile_until(selector)?;
        Ok(self.push_stack(parents_nodes(&self.nodes, Until::selector(&until))))
    }

    /// `None` results in [`Selection::parents`].
    pub fn parents_until_selection(&self, sel: Option<&Selection>) -> Selection {
        match sel {
            Some(sel) => self.parents_until_nodes(&sel.nodes),
            None => self.parents(),
        }
    }

    pub fn parents_until_nodes(&self, nodes: &[NodeRef]) -> Selection {
        self.push_stack(parents_nodes(&self.nodes, Until::Nodes(nodes)))
    }

    /// [`Selection::parents_until`] filtered by `filter`.
    pub fn parents_filtered_until(
        &self,
        filter: &str,
        until: &str,
    ) -> Result<Selection, SelectorError> {
        let until = compile_until(until)?;
        self.filter_and_push(parents_nodes(&self.nodes, Until::selector(&until)), filter)
    }

    /// `None` results in [`Selection::parents_filtered`].
    pub fn parents_filtered_until_selection(
        &self,
        filter: &str,
        sel: Option<&Selection>,
    ) -> Result<Selection, SelectorError> {
        match sel {
            Some(sel) => self.parents_filtered_until_nodes(filter, &sel.nodes),
            None => self.parents_filtered(filter),
        }
    }

    pub fn parents_filtered_until_nodes(
        &self,
        filter: &str,
        nodes: &[NodeRef],
    ) -> Result<Selection, SelectorError> {
        self.filter_and_push(parents_nodes(&self.nodes, Until::Nodes(nodes)), filter)
    }

    /// Get the Element siblings of each node, the node itself excluded.
    pub fn siblings(&self) -> Selection {
        self.push_stack(sibling_nodes(&self.nodes, SiblingType::All, Until::Never))
    }

    pub fn siblings_filtered(&self, selector: &str) -> Result<Selection, SelectorError> {
        self.filter_and_push(
            sibling_nodes(&self.nodes, SiblingType::All, Until::Never),
            selector,
        )
    }

    /// Get the immediately following Element sibling of each node.
    pub fn next(&self) -> Selection {
        self.push_stack(sibling_nodes(&self.nodes, SiblingType::Next, Until::Never))
    }

    pub fn next_filtered(&self, selector: &str) -> Result<Selection, SelectorError> {
        self.filter_and_push(
            sibling_nodes(&self.nodes, SiblingType::Next, Until::Never),
            selector,
        )
    }

    /// Get all following Element siblings of each node in document order.
    pub fn next_all(&self) -> Selection {
        self.push_stack(sibling_nodes(&self.nodes, SiblingType::NextAll, Until::Never))
    }

    pub fn next_all_filtered(&self, selector: &str) -> Result<Selection, SelectorError> {
        self.filter_and_push(
            sibling_nodes(&self.nodes, SiblingType::NextAll, Until::Never),
            selector,
        )
    }

    /// Get the immediately preceding Element sibling of each node.
    pub fn prev(&self) -> Selection {
        self.push_stack(sibling_nodes(&self.nodes, SiblingType::Prev, Until::Never))
    }

    pub fn prev_filtered(&self, selector: &str) -> Result<Selection, SelectorError> {
        self.filter_and_push(
            sibling_nodes(&self.nodes, SiblingType::Prev, Until::Never),
            selector,
        )
    }

    /// Get all preceding Element siblings of each node, nearest first.
    pub fn prev_all(&self) -> Selection {
        self.push_stack(sibling_nodes(&self.nodes, SiblingType::PrevAll, Until::Never))
    }

    pub fn prev_all_filtered(&self, selector: &str) -> Result<Selection, SelectorError> {
        self.filter_and_push(
            sibling_nodes(&self.nodes, SiblingType::PrevAll, Until::Never),
            selector,
        )
    }

    /// Get the following Element siblings of each node up to,
    /// but not including, the first one matching `selector`.
    pub fn next_until(&self, selector: &str) -> Result<Selection, SelectorError> {
        let until = compile_until(selector)?;
        Ok(self.push_stack(sibling_nodes(
            &self.nodes,
            SiblingType::NextUntil,
            Until::selector(&until),
        )))
    }

    /// `None` results in [`Selection::next_all`].
    pub fn next_until_selection(&self, sel: Option<&Selection>) -> Selection {
        match sel {
            Some(sel) => self.next_until_nodes(&sel.nodes),
            None => self.next_all(),
        }
    }

    pub fn next_until_nodes(&self, nodes: &[NodeRef]) -> Selection {
        self.push_stack(sibling_nodes(
            &self.nodes,
            SiblingType::NextUntil,
            Until::Nodes(nodes),
        ))
    }

    /// Get the preceding Element siblings of each node, nearest first, up to,
    /// but not including, the first one matching `selector`.
    pub fn prev_until(&self, selector: &str) -> Result<Selection, SelectorError> {
        let until = compile_until(selector)?;
        Ok(self.push_stack(sibling_nodes(
            &self.nodes,
            SiblingType::PrevUntil,
            Until::selector(&until),
        )))
    }

    /// `None` results in [`Selection::prev_all`].
    pub fn prev_until_selection(&self, sel: Option<&Selection>) -> Selection {
        match sel {
            Some(sel) => self.prev_until_nodes(&sel.nodes),
            None => self.prev_all(),
        }
    }

    pub fn prev_until_nodes(&self, nodes: &[NodeRef]) -> Selection {
        self.push_stack(sibling_nodes(
            &self.nodes,
            SiblingType::PrevUntil,
            Until::Nodes(nodes),
        ))
    }

    /// [`Selection::next_until`] filtered by `filter`.
    pub fn next_filtered_until(
        &self,
        filter: &str,
        until: &str,
    ) -> Result<Selection, SelectorError> {
        let until = compile_until(until)?;
        self.filter_and_push(
            sibling_nodes(&self.nodes, SiblingType::NextUntil, Until::selector(&until)),
            filter,
        )
    }

    /// `None` results in [`Selection::next_filtered`].
    pub fn next_filtered_until_selection(
        &self,
        filter: &str,
        sel: Option<&Selection>,
    ) -> Result<Selection, SelectorError> {
        match sel {
            Some(sel) => self.next_filtered_until_nodes(filter, &sel.nodes),
            None => self.next_filtered(filter),
        }
    }

    pub fn next_filtered_until_nodes(
        &self,
        filter: &str,
        nodes: &[NodeRef],
    ) -> Result<Selection, SelectorError> {
        self.filter_and_push(
            sibling_nodes(&self.nodes, SiblingType::NextUntil, Until::Nodes(nodes)),
            filter,
        )
    }

    /// [`Selection::prev_until`] filtered by `filter`.
    pub fn prev_filtered_until(
        &self,
        filter: &str,
        until: &str,
    ) -> Result<Selection, SelectorError> {
        let until = compile_until(until)?;
        self.filter_and_push(
            sibling_nodes(&self.nodes, SiblingType::PrevUntil, Until::selector(&until)),
            filter,
        )
    }

    /// `None` results in [`Selection::prev_filtered`].
    pub fn prev_filtered_until_selection(
        &self,
        filter: &str,
        sel: Option<&Selection>,
    ) -> Result<Selection, SelectorError> {
        match sel {
            Some(sel) => self.prev_filtered_until_nodes(filter, &sel.nodes),
            None => self.prev_filtered(filter),
        }
    }

    pub fn prev_filtered_until_nodes(
        &self,
        filter: &str,
        nodes: &[NodeRef],
    ) -> Result<Selection, SelectorError> {
        self.filter_and_push(
            sibling_nodes(&self.nodes, SiblingType::PrevUntil, Until::Nodes(nodes)),
            filter,
        )
    }
}
