use std::{collections::HashMap, fmt, rc::Rc};

use super::{NodeData, NodeRef, NodeType, TreeError};

/// Per-tag behavior attached to an element when it is allocated.
pub trait TagCapability {
    /// The name used in diagnostics.
    fn name(&self) -> &str;

    /// Called by [`init_tree`] after the whole tree has been built.\
    /// The node may rewrite its own subtree here.
    fn init(&self, node: &NodeRef) -> Result<(), TreeError> {
        let _ = node;
        Ok(())
    }

    /// Called by [`prerender_tree`] right before the tree is serialized.\
    /// Typically sets presentation attributes such as `style`.
    fn prerender(&self, node: &NodeRef) -> Result<(), TreeError> {
        let _ = node;
        Ok(())
    }
}

/// A table from tag names to capabilities.
///
/// [`TagRegistry::lookup`] is the allocation hook used by the tree builder
/// and by [`NodeRef::clone_with`].
#[derive(Clone, Default)]
pub struct TagRegistry {
    tags: HashMap<String, Rc<dyn TagCapability>>,
    fallback: Option<Rc<dyn TagCapability>>,
}

impl TagRegistry {
    pub fn new() -> Self {
        Self::default()
    }

    /// Register `capability` for elements named `tag`.\
    /// Return the capability previously registered for `tag` if exists.
    pub fn register(
        &mut self,
        tag: &str,
        capability: Rc<dyn TagCapability>,
    ) -> Option<Rc<dyn TagCapability>> {
        self.tags.insert(tag.to_ascii_lowercase(), capability)
    }

    /// Set the capability of elements whose tag is not registered.
    pub fn set_fallback(&mut self, capability: Option<Rc<dyn TagCapability>>) {
        self.fallback = capability;
    }

    pub fn resolve(&self, tag: &str) -> Option<Rc<dyn TagCapability>> {
        self.tags
            .get(tag)
            .or_else(|| {
                self.tags
                    .iter()
                    .find(|(key, _)| key.eq_ignore_ascii_case(tag))
                    .map(|(_, cap)| cap)
            })
            .or(self.fallback.as_ref())
            .cloned()
    }

    /// Allocate a node for `data`.\
    /// Elements receive the capability registered for their tag.
    pub fn lookup(&self, data: NodeData) -> NodeRef {
        let capability = if data.node_type == NodeType::Element {
            self.resolve(&data.tag)
        } else {
            None
        };
        NodeRef::with_capability(data, capability)
    }

    pub fn is_empty(&self) -> bool {
        self.tags.is_empty() && self.fallback.is_none()
    }
}

impl fmt::Debug for TagRegistry {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let mut tags = self.tags.keys().collect::<Vec<_>>();
        tags.sort();
        f.debug_struct("TagRegistry")
            .field("tags", &tags)
            .field("fallback", &self.fallback.as_ref().map(|cap| cap.name()))
            .finish()
    }
}

/// Run the `init` hook of every node under `root`, `root` included.
///
/// Children are initialized before their parent, so the deepest nodes run first.
/// The children are snapshotted before descending, so a hook may restructure its own subtree.
pub fn init_tree(root: &NodeRef) -> Result<(), TreeError> {
    // (node, children already pushed)
    let mut stack = vec![(root.clone(), false)];
    while let Some((node, expanded)) = stack.pop() {
        if expanded {
            if let Some(cap) = node.capability() {
                cap.init(&node)?;
            }
            continue;
        }
        stack.push((node.clone(), true));
        for child in node.children().into_iter().rev() {
            stack.push((child, false));
        }
    }
    Ok(())
}

/// Run the `prerender` hook of every node under `root`, `root` included.
///
/// A parent runs before its children, in document order.
/// The children are read after the parent's hook returns, so nodes it adds are visited too.
pub fn prerender_tree(root: &NodeRef) -> Result<(), TreeError> {
    let mut stack = vec![root.clone()];
    while let Some(node) = stack.pop() {
        if let Some(cap) = node.capability() {
            cap.prerender(&node)?;
        }
        stack.extend(node.children().into_iter().rev());
    }
    Ok(())
}

#[cfg(test)]
mod tests {
    use std::cell::RefCell;

    use super::*;

    struct Recorder {
        name: &'static str,
        log: Rc<RefCell<Vec<String>>>,
    }

    impl TagCapability for Recorder {
        fn name(&self) -> &str {
            self.name
        }

        fn init(&self, node: &NodeRef) -> Result<(), TreeError> {
            self.log.borrow_mut().push(node.tag().to_string());
            if &*node.tag() == "my-bio" {
                node.append_child(NodeRef::new_text("bio"))?;
            }
            Ok(())
        }

        fn prerender(&self, node: &NodeRef) -> Result<(), TreeError> {
            self.log.borrow_mut().push(format!("render {}", node.tag()));
            if &*node.tag() == "my-bio" {
                node.set_attribute("style", "color:red;");
                node.append_child(NodeRef::new_element("note"))?;
            }
            Ok(())
        }
    }

    #[test]
    fn test_lookup_resolves_capability() {
        let log = Rc::new(RefCell::new(vec![]));
        let mut registry = TagRegistry::new();
        registry.register("my-tag", Rc::new(Recorder { name: "my-tag", log: log.clone() }));
        let node = registry.lookup(NodeData::element("my-tag", vec![]));
        assert_eq!(node.capability().unwrap().name(), "my-tag");
        assert!(
            registry
                .lookup(NodeData::element("div", vec![]))
                .capability()
                .is_none()
        );
        assert!(registry.lookup(NodeData::text("my-tag")).capability().is_none());

        registry.set_fallback(Some(Rc::new(Recorder { name: "default", log })));
        let div = registry.lookup(NodeData::element("div", vec![]));
        assert_eq!(div.capability().unwrap().name(), "default");

        let cloned = node.clone_with(|data| registry.lookup(data));
        assert_eq!(cloned.capability().unwrap().name(), "my-tag");
    }

    #[test]
    fn test_init_tree_runs_deepest_first() {
        let log = Rc::new(RefCell::new(vec![]));
        let mut registry = TagRegistry::new();
        registry.set_fallback(Some(Rc::new(Recorder { name: "default", log: log.clone() })));

        let root = registry.lookup(NodeData::element("root", vec![]));
        let outer = root
            .append_child(registry.lookup(NodeData::element("outer", vec![])))
            .unwrap();
        let bio = outer
            .append_child(registry.lookup(NodeData::element("my-bio", vec![])))
            .unwrap();
        root.append_child(registry.lookup(NodeData::element("side", vec![])))
            .unwrap();

        init_tree(&root).unwrap();
        assert_eq!(*log.borrow(), ["my-bio", "outer", "side", "root"]);
        assert_eq!(bio.text_content(), "bio");
    }

    #[test]
    fn test_prerender_tree_runs_parents_first() {
        let log = Rc::new(RefCell::new(vec![]));
        let mut registry = TagRegistry::new();
        registry.set_fallback(Some(Rc::new(Recorder { name: "default", log: log.clone() })));

        let root = registry.lookup(NodeData::element("root", vec![]));
        let bio = root
            .append_child(registry.lookup(NodeData::element("my-bio", vec![])))
            .unwrap();
        bio.append_child(registry.lookup(NodeData::element("inner", vec![])))
            .unwrap();
        root.append_child(registry.lookup(NodeData::element("side", vec![])))
            .unwrap();
        // nodes without a capability are walked but have no hook
        root.append_child(NodeRef::new_text("x")).unwrap();

        prerender_tree(&root).unwrap();
        assert_eq!(
            *log.borrow(),
            ["render root", "render my-bio", "render inner", "render side"]
        );
        assert_eq!(bio.get_attribute("style").as_deref(), Some("color:red;"));
        assert_eq!(&*bio.last_child().unwrap().tag(), "note");
    }
}
