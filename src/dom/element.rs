use std::collections::HashMap;
use std::sync::{Arc, OnceLock, Weak};

/// A read-only snapshot of one element of a rendered page.
///
/// Children are owned through `Arc`; the parent link is a `Weak` back-reference
/// so a tree never forms an ownership cycle. Trees are built bottom-up, so the
/// parent link is filled in once, when the parent itself is created.
#[derive(Debug)]
pub struct ElementNode {
    /// Lower-cased tag name (e.g., "div", "a", "p")
    pub tag_name: String,

    /// Element attributes (e.g., id, class, href)
    pub attributes: HashMap<String, String>,

    /// Text nodes and child elements in document order
    content: Vec<NodeContent>,

    parent: OnceLock<Weak<ElementNode>>,
}

/// One entry of an element's content
#[derive(Debug)]
pub(crate) enum NodeContent {
    Text(String),
    Element(Arc<ElementNode>),
}

/// Hand-written description of an element subtree, turned into an [`ElementNode`] tree by
/// [`ElementSpec::build`].
#[derive(Debug, Clone, PartialEq)]
pub struct ElementSpec {
    /// HTML tag name
    pub tag_name: String,

    pub attributes: HashMap<String, String>,

    /// Text nodes and child elements in document order
    pub content: Vec<ContentSpec>,
}

/// Content entry of an [`ElementSpec`]
#[derive(Debug, Clone, PartialEq)]
pub enum ContentSpec {
    Text(String),
    Element(ElementSpec),
}

/// An element whose content is still being collected
struct PendingElement {
    tag_name: String,
    attributes: HashMap<String, String>,
    remaining: std::vec::IntoIter<ContentSpec>,
    built: Vec<NodeContent>,
}

impl From<ElementSpec> for PendingElement {
    fn from(spec: ElementSpec) -> Self {
        Self {
            tag_name: spec.tag_name,
            attributes: spec.attributes,
            remaining: spec.content.into_iter(),
            built: Vec::new(),
        }
    }
}

impl PendingElement {
    fn finish(self) -> Arc<ElementNode> {
        ElementNode::with_content(&self.tag_name, self.attributes, self.built)
    }
}

impl ElementSpec {
    /// Create a new ElementSpec
    pub fn new(tag_name: impl Into<String>) -> Self {
        Self {
            tag_name: tag_name.into(),
            attributes: HashMap::new(),
            content: Vec::new(),
        }
    }

    /// Builder method: add a single attribute
    pub fn with_attribute(mut self, key: impl Into<String>, value: impl Into<String>) -> Self {
        self.attributes.insert(key.into(), value.into());
        self
    }

    /// Builder method: append a text node
    pub fn with_text(mut self, text: impl Into<String>) -> Self {
        self.content.push(ContentSpec::Text(text.into()));
        self
    }

    /// Builder method: append a child element
    pub fn with_child(mut self, child: ElementSpec) -> Self {
        self.content.push(ContentSpec::Element(child));
        self
    }

    /// Build a detached tree rooted at this element.
    ///
    /// Uses an explicit stack, so nesting depth is bounded by memory only.
    pub fn build(self) -> Arc<ElementNode> {
        let mut current = PendingElement::from(self);
        let mut ancestors: Vec<PendingElement> = Vec::new();

        loop {
            match current.remaining.next() {
                Some(ContentSpec::Text(text)) => current.built.push(NodeContent::Text(text)),
                Some(ContentSpec::Element(child)) => {
                    ancestors.push(std::mem::replace(&mut current, PendingElement::from(child)));
                }
                None => match ancestors.pop() {
                    Some(parent) => {
                        let done = std::mem::replace(&mut current, parent);
                        current.built.push(NodeContent::Element(done.finish()));
                    }
                    None => return current.finish(),
                },
            }
        }
    }
}

impl ElementNode {
    /// Create an element over already built content and link each child element back to it
    pub(crate) fn with_content(
        tag_name: &str,
        attributes: HashMap<String, String>,
        content: Vec<NodeContent>,
    ) -> Arc<Self> {
        let node = Arc::new(Self {
            tag_name: tag_name.to_ascii_lowercase(),
            attributes,
            content,
            parent: OnceLock::new(),
        });

        for child in node.children() {
            // Children are fresh, so the link is always unset here
            let _ = child.parent.set(Arc::downgrade(&node));
        }

        node
    }

    /// Parent element, if this is not the snapshot root
    pub fn parent(&self) -> Option<Arc<ElementNode>> {
        self.parent.get().and_then(Weak::upgrade)
    }

    /// Child elements in document order
    pub fn children(&self) -> impl DoubleEndedIterator<Item = &Arc<ElementNode>> {
        self.content.iter().filter_map(|entry| match entry {
            NodeContent::Element(child) => Some(child),
            NodeContent::Text(_) => None,
        })
    }

    /// Get attribute value by key
    pub fn get_attribute(&self, key: &str) -> Option<&String> {
        self.attributes.get(key)
    }

    /// Get element ID
    pub fn id(&self) -> Option<&String> {
        self.attributes.get("id")
    }

    /// Check if element is a specific tag
    pub fn is_tag(&self, tag: &str) -> bool {
        self.tag_name.eq_ignore_ascii_case(tag)
    }

    /// All descendant text nodes in document order
    pub fn text_nodes(&self) -> Vec<&str> {
        let mut texts = Vec::new();
        let mut stack = vec![self.content.iter()];

        while let Some(entries) = stack.last_mut() {
            match entries.next() {
                Some(NodeContent::Text(text)) => texts.push(text.as_str()),
                Some(NodeContent::Element(child)) => stack.push(child.content.iter()),
                None => {
                    stack.pop();
                }
            }
        }

        texts
    }

    /// Concatenation of every descendant text node, separated by single spaces
    pub fn flattened_text(&self) -> String {
        self.text_nodes().join(" ")
    }

    /// Count this element and all of its descendants
    pub fn count_elements(&self) -> usize {
        let mut count = 0;
        let mut stack: Vec<&ElementNode> = vec![self];
        while let Some(node) = stack.pop() {
            count += 1;
            stack.extend(node.children().map(|c| c.as_ref()));
        }
        count
    }
}

impl Drop for ElementNode {
    fn drop(&mut self) {
        // Unlink uniquely owned descendants one by one instead of recursing per level
        let mut stack: Vec<Arc<ElementNode>> = Vec::new();
        collect_children(&mut self.content, &mut stack);

        while let Some(node) = stack.pop() {
            if let Some(mut node) = Arc::into_inner(node) {
                collect_children(&mut node.content, &mut stack);
            }
        }
    }
}

fn collect_children(content: &mut Vec<NodeContent>, stack: &mut Vec<Arc<ElementNode>>) {
    stack.extend(std::mem::take(content).into_iter().filter_map(|entry| match entry {
        NodeContent::Element(child) => Some(child),
        NodeContent::Text(_) => None,
    }));
}

#[cfg(test)]
mod tests {
    use super::*;

    fn product_list() -> Arc<ElementNode> {
        ElementSpec::new("UL")
            .with_attribute("class", "products")
            .with_child(ElementSpec::new("li").with_text("Alpha"))
            .with_text("between")
            .with_child(
                ElementSpec::new("li")
                    .with_text("Beta")
                    .with_child(ElementSpec::new("b").with_text("sale")),
            )
            .build()
    }

    fn nested(depth: usize) -> ElementSpec {
        let mut spec = ElementSpec::new("span").with_text("bottom");
        for _ in 1..depth {
            spec = ElementSpec::new("div").with_child(spec);
        }
        spec
    }

    #[test]
    fn test_tag_name_is_lower_cased() {
        let list = product_list();
        assert_eq!(list.tag_name, "ul");
        assert!(list.is_tag("UL"));
    }

    #[test]
    fn test_children_and_parent_links() {
        let list = product_list();
        let children: Vec<_> = list.children().collect();
        assert_eq!(children.len(), 2);

        let parent = children[0].parent().expect("child should have a parent");
        assert!(Arc::ptr_eq(&parent, &list));
        assert!(list.parent().is_none());

        let bold = children[1].children().next().unwrap();
        assert!(Arc::ptr_eq(&bold.parent().unwrap(), children[1]));
    }

    #[test]
    fn test_flattened_text_keeps_document_order() {
        let list = product_list();
        assert_eq!(list.text_nodes(), vec!["Alpha", "between", "Beta", "sale"]);
        assert_eq!(list.flattened_text(), "Alpha between Beta sale");
    }

    #[test]
    fn test_empty_element_has_empty_text() {
        let node = ElementSpec::new("div").build();
        assert_eq!(node.flattened_text(), "");
        assert_eq!(node.count_elements(), 1);
    }

    #[test]
    fn test_count_elements() {
        assert_eq!(product_list().count_elements(), 4);
    }

    #[test]
    fn test_subtree_outlives_dropped_root() {
        let list = product_list();
        let second = list.children().nth(1).cloned().unwrap();
        drop(list);

        assert!(second.parent().is_none());
        assert_eq!(second.flattened_text(), "Beta sale");
    }

    #[test]
    fn test_very_deep_tree_builds_and_drops() {
        let root = nested(100_000).build();
        assert_eq!(root.count_elements(), 100_000);
        assert_eq!(root.flattened_text(), "bottom");

        let mut leaf = root.clone();
        loop {
            let next = leaf.children().next().cloned();
            match next {
                Some(child) => leaf = child,
                None => break,
            }
        }
        assert!(leaf.is_tag("span"));
        drop(leaf);
        drop(root);
    }
}
