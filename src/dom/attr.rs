use super::{NodeRef, NodeType};

/// An attribute of an element or a doctype.
///
/// `namespace` is `None` (or empty) for attributes in the default namespace.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct Attribute {
    pub namespace: Option<String>,
    pub key: String,
    pub value: String,
}

impl Attribute {
    pub fn new(key: impl Into<String>, value: impl Into<String>) -> Self {
        Self {
            namespace: None,
            key: key.into(),
            value: value.into(),
        }
    }

    pub fn with_namespace(
        namespace: impl Into<String>,
        key: impl Into<String>,
        value: impl Into<String>,
    ) -> Self {
        Self {
            namespace: Some(namespace.into()),
            ..Self::new(key, value)
        }
    }
}

impl NodeRef {
    /// Return the value of the first attribute whose key is `key`.
    pub fn get_attribute(&self, key: &str) -> Option<String> {
        self.with_attributes(|attrs| {
            attrs
                .iter()
                .find(|attr| attr.key == key)
                .map(|attr| attr.value.clone())
        })
    }

    pub fn has_attribute(&self, key: &str) -> bool {
        self.with_attributes(|attrs| attrs.iter().any(|attr| attr.key == key))
    }

    /// Overwrite the value of the first attribute whose key is `key`.\
    /// If there is no such attribute, a new one is appended.
    ///
    /// Later attributes with the same key are left untouched.
    pub fn set_attribute(&self, key: &str, value: &str) {
        self.with_attributes_mut(|attrs| {
            if let Some(attr) = attrs.iter_mut().find(|attr| attr.key == key) {
                attr.value = value.to_owned();
            } else {
                attrs.push(Attribute::new(key, value));
            }
        })
    }

    /// Remove the first attribute whose key is `key` and return it.
    pub fn remove_attribute(&self, key: &str) -> Option<Attribute> {
        self.with_attributes_mut(|attrs| {
            let pos = attrs.iter().position(|attr| attr.key == key)?;
            Some(attrs.remove(pos))
        })
    }

    /// Return the concatenation of all Text descendants in document order.\
    /// A Text node returns its own data.
    pub fn text_content(&self) -> String {
        let mut res = String::new();
        let mut stack = vec![self.clone()];
        while let Some(node) = stack.pop() {
            if node.node_type() == NodeType::Text {
                res.push_str(&node.data());
                continue;
            }
            let mut children = node.last_child();
            while let Some(child) = children {
                children = child.prev_sibling();
                stack.push(child);
            }
        }
        res
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_set_attribute_overwrites_first_match() {
        let div = NodeRef::new_element_with_attributes(
            "div",
            vec![Attribute::new("class", "a"), Attribute::new("class", "stale")],
        );
        assert_eq!(div.get_attribute("class").as_deref(), Some("a"));
        div.set_attribute("class", "b");
        div.set_attribute("id", "main");
        let attrs = div.attributes();
        assert_eq!(attrs.len(), 3);
        assert_eq!(attrs[0].value, "b");
        assert_eq!(attrs[1].value, "stale");
        assert_eq!(attrs[2], Attribute::new("id", "main"));
    }

    #[test]
    fn test_remove_attribute() {
        let div = NodeRef::new_element_with_attributes(
            "div",
            vec![Attribute::new("x", "1"), Attribute::new("x", "2")],
        );
        assert_eq!(div.remove_attribute("x").unwrap().value, "1");
        assert_eq!(div.get_attribute("x").as_deref(), Some("2"));
        assert!(div.remove_attribute("y").is_none());
        div.remove_attribute("x");
        assert!(!div.has_attribute("x"));
    }

    #[test]
    fn test_text_content() {
        let div = NodeRef::new_element("div");
        div.append_child(NodeRef::new_text("A")).unwrap();
        let span = div.append_child(NodeRef::new_element("span")).unwrap();
        span.append_child(NodeRef::new_text("B")).unwrap();
        div.append_child(NodeRef::new_comment("ignored")).unwrap();
        div.append_child(NodeRef::new_text("C")).unwrap();
        assert_eq!(div.text_content(), "ABC");
        assert_eq!(span.text_content(), "B");
        assert_eq!(NodeRef::new_element("br").text_content(), "");
        assert_eq!(NodeRef::new_text("raw &amp;").text_content(), "raw &amp;");
    }
}
