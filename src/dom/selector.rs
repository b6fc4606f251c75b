use crate::dom::element::ElementNode;
use serde::{Deserialize, Serialize};
use std::fmt;

/// Tag at which the ancestor walk stops; it always opens the selector.
const ROOT_TAG: &str = "html";

/// Separator between components: the descendant combinator.
const DESCENDANT: &str = " ";

/// A CSS selector synthesized from an element's ancestor chain.
///
/// Components read from the document root down to the matched element. The
/// selector is deliberately coarse so that it also matches siblings of the
/// same kind as the element it was built from.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
pub struct CssSelector {
    components: Vec<String>,
}

impl CssSelector {
    /// Components from root to target
    pub fn components(&self) -> &[String] {
        &self.components
    }

    /// Rightmost component, describing the element itself
    pub fn target(&self) -> &str {
        self.components.last().map(String::as_str).unwrap_or(ROOT_TAG)
    }

    /// Render the selector string
    pub fn as_css(&self) -> String {
        self.components.join(DESCENDANT)
    }
}

impl fmt::Display for CssSelector {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.as_css())
    }
}

/// Selector component for a single element.
///
/// A non-empty `#id` wins; exactly one class token gives `tag.class`; anything
/// else (no class, an empty class, several classes) falls back to the bare tag
/// name. Identifiers are CSS-escaped, so the component always parses.
pub fn component_for(element: &ElementNode) -> String {
    let tag = escape_identifier(&element.tag_name.to_ascii_lowercase());

    if let Some(id) = element.id().filter(|id| !id.is_empty()) {
        format!("#{}", escape_identifier(id))
    } else if let Some(class) = single_class(element) {
        format!("{}.{}", tag, escape_identifier(class))
    } else {
        tag
    }
}

fn single_class(element: &ElementNode) -> Option<&str> {
    let mut tokens = element.get_attribute("class")?.split_whitespace();
    match (tokens.next(), tokens.next()) {
        (Some(class), None) => Some(class),
        _ => None,
    }
}

fn escape_identifier(value: &str) -> String {
    let mut escaped = String::with_capacity(value.len());
    // Writing into a String never fails
    let _ = cssparser::serialize_identifier(value, &mut escaped);
    escaped
}

/// Walk from `element` up to the `html` element and build a re-queryable selector
pub fn synthesize(element: &ElementNode) -> CssSelector {
    let mut components = Vec::new();

    if !element.is_tag(ROOT_TAG) {
        components.push(component_for(element));

        let mut current = element.parent();
        while let Some(node) = current.filter(|node| !node.is_tag(ROOT_TAG)) {
            components.push(component_for(&node));
            current = node.parent();
        }
    }

    components.push(ROOT_TAG.to_string());
    components.reverse();

    CssSelector { components }
}
