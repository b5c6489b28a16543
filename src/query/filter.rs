use crate::{
    dom::NodeRef,
    selector::{self, Matcher, SelectorError},
};

use super::{Selection, is_in_slice};

impl Selection {
    /// Check if at least one node matches `selector`.
    pub fn is(&self, selector: &str) -> Result<bool, SelectorError> {
        let matcher = selector::compile(selector)?;
        Ok(self.is_matcher(&matcher))
    }

    pub fn is_matcher(&self, matcher: &dyn Matcher) -> bool {
        self.nodes
            .iter()
            .any(|n| n.is_element() && matcher.matches(n))
    }

    /// Check if at least one node is contained in `nodes`.
    pub fn is_nodes(&self, nodes: &[NodeRef]) -> bool {
        self.nodes.iter().any(|n| is_in_slice(nodes, n))
    }

    pub fn is_selection(&self, sel: &Selection) -> bool {
        self.is_nodes(&sel.nodes)
    }

    /// Keep the nodes matching `selector`.
    pub fn filter(&self, selector: &str) -> Result<Selection, SelectorError> {
        let matcher = selector::compile(selector)?;
        Ok(self.filter_matcher(&matcher))
    }

    pub fn filter_matcher(&self, matcher: &dyn Matcher) -> Selection {
        self.push_stack(self.winnow(|n| n.is_element() && matcher.matches(n), true))
    }

    /// Keep the nodes contained in `nodes`.
    pub fn filter_nodes(&self, nodes: &[NodeRef]) -> Selection {
        self.push_stack(self.winnow(|n| is_in_slice(nodes, n), true))
    }

    pub fn filter_selection(&self, sel: &Selection) -> Selection {
        self.filter_nodes(&sel.nodes)
    }

    /// Remove the nodes matching `selector`.
    pub fn not(&self, selector: &str) -> Result<Selection, SelectorError> {
        let matcher = selector::compile(selector)?;
        Ok(self.push_stack(
            self.winnow(|n| n.is_element() && matcher.matches(n), false),
        ))
    }

    /// Remove the nodes contained in `nodes`.
    pub fn not_nodes(&self, nodes: &[NodeRef]) -> Selection {
        self.push_stack(self.winnow(|n| is_in_slice(nodes, n), false))
    }

    /// Keep the nodes that have a descendant matching `selector`.
    pub fn has(&self, selector: &str) -> Result<Selection, SelectorError> {
        let matcher = selector::compile(selector)?;
        Ok(self.push_stack(self.winnow(|n| !matcher.match_all(n).is_empty(), true)))
    }

    /// Keep the nodes that contain `node`.
    pub fn has_node(&self, node: &NodeRef) -> Selection {
        self.push_stack(self.winnow(|n| n.contains(node), true))
    }

    /// Check if some node of this Selection contains `node`.
    pub fn contains(&self, node: &NodeRef) -> bool {
        self.nodes.iter().any(|n| n.contains(node))
    }

    fn winnow(&self, mut pred: impl FnMut(&NodeRef) -> bool, keep: bool) -> Vec<NodeRef> {
        self.nodes
            .iter()
            .filter(|n| pred(*n) == keep)
            .cloned()
            .collect()
    }
}

#[cfg(test)]
mod tests {
    use crate::query::Document;

    fn doc() -> Document {
        Document::parse(
            r#"<ul><li class="a">1</li><li class="b"><em>2</em></li><li class="a b">3</li></ul>"#,
        )
        .unwrap()
    }

    #[test]
    fn test_is() {
        let doc = doc();
        let items = doc.find("li").unwrap();
        assert!(items.is(".b").unwrap());
        assert!(!items.is("ul").unwrap());
        assert!(items.is("li:first").is_err());
        let ul = doc.find("ul").unwrap();
        assert!(ul.is_selection(&ul));
        assert!(!items.is_nodes(ul.nodes()));
        assert!(!doc.selection().is("*").unwrap());
    }

    #[test]
    fn test_filter_and_not() {
        let items = doc().find("li").unwrap();
        assert_eq!(items.filter(".a").unwrap().len(), 2);
        assert_eq!(items.not(".a").unwrap().text(), "2");
        let first = items.first();
        assert_eq!(items.filter_selection(&first).text(), "1");
        assert_eq!(items.not_nodes(first.nodes()).text(), "23");
        assert_eq!(
            items.filter_matcher(&|n: &crate::dom::NodeRef| n.text_content() == "3").len(),
            1
        );
        assert_eq!(items.filter(".a").unwrap().end().len(), 3);
    }

    #[test]
    fn test_has_and_contains() {
        let doc = doc();
        let items = doc.find("li").unwrap();
        assert_eq!(items.has("em").unwrap().text(), "2");
        let em = doc.find("em").unwrap().get(0).unwrap().clone();
        assert_eq!(items.has_node(&em).len(), 1);
        assert!(items.contains(&em));
        assert!(!doc.find("em").unwrap().contains(&em));
    }
}
