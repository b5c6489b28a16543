use crate::html::{RenderError, render_children, render_to_string};

use super::Selection;

impl Selection {
    /// Get the value of `key` on the first node.
    pub fn attr(&self, key: &str) -> Option<String> {
        self.nodes.first()?.get_attribute(key)
    }

    /// Same as [`Selection::attr`], with a fallback value.
    pub fn attr_or(&self, key: &str, default: &str) -> String {
        self.attr(key).unwrap_or_else(|| default.to_owned())
    }

    /// Set `key` to `value` on every node.
    pub fn set_attr(&self, key: &str, value: &str) -> &Self {
        for node in self.nodes.iter() {
            node.set_attribute(key, value);
        }
        self
    }

    /// Remove the first `key` attribute of every node.
    pub fn remove_attr(&self, key: &str) -> &Self {
        for node in self.nodes.iter() {
            node.remove_attribute(key);
        }
        self
    }

    /// Get the combined text content of all nodes, descendants included.
    pub fn text(&self) -> String {
        self.nodes.iter().map(|n| n.text_content()).collect()
    }

    /// Get the markup of the children of the first node.\
    /// An empty Selection results in an empty string.
    pub fn html(&self) -> Result<String, RenderError> {
        let Some(node) = self.nodes.first() else {
            return Ok(String::new());
        };
        let mut buf = vec![];
        render_children(&mut buf, node)?;
        Ok(String::from_utf8_lossy(&buf).into_owned())
    }

    /// Get the markup of the first node itself.
    pub fn outer_html(&self) -> Result<String, RenderError> {
        match self.nodes.first() {
            Some(node) => render_to_string(node),
            None => Ok(String::new()),
        }
    }
}
