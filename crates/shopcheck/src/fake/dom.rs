//! Minimal element tree rendered by the fake shop.

use std::collections::BTreeMap;

/// Index of a node in the arena
pub type NodeId = usize;

/// What clicking an element does in the fake application
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Action {
    ToggleSize(String),
    AddToCart(u32),
    OpenCart,
    CloseCart,
    Increase(u32),
    Decrease(u32),
    Remove(u32),
    Checkout,
    Navigate(String),
    OpenCodeMenu,
    DownloadZip,
}

/// One rendered element
#[derive(Debug, Clone, Default)]
pub struct Element {
    pub tag: String,
    pub classes: Vec<String>,
    pub attrs: BTreeMap<String, String>,
    pub text: String,
    pub style: BTreeMap<String, String>,
    pub hidden: bool,
    pub disabled: bool,
    pub checked: bool,
    pub action: Option<Action>,
    /// Catalog id this element belongs to, for hover tracking
    pub product: Option<u32>,
    parent: Option<NodeId>,
    children: Vec<NodeId>,
}

impl Element {
    pub fn new(tag: &str) -> Self {
        Self {
            tag: tag.to_string(),
            ..Self::default()
        }
    }

    /// Space-separated class list
    pub fn class(mut self, classes: &str) -> Self {
        self.classes
            .extend(classes.split_whitespace().map(str::to_string));
        self
    }

    pub fn attr(mut self, name: &str, value: impl Into<String>) -> Self {
        self.attrs.insert(name.to_string(), value.into());
        self
    }

    pub fn text(mut self, text: impl Into<String>) -> Self {
        self.text = text.into();
        self
    }

    pub fn style(mut self, property: &str, value: impl Into<String>) -> Self {
        self.style.insert(property.to_string(), value.into());
        self
    }

    pub const fn disabled(mut self, disabled: bool) -> Self {
        self.disabled = disabled;
        self
    }

    pub const fn checked(mut self, checked: bool) -> Self {
        self.checked = checked;
        self
    }

    pub fn action(mut self, action: Action) -> Self {
        self.action = Some(action);
        self
    }

    pub const fn product(mut self, id: u32) -> Self {
        self.product = Some(id);
        self
    }

    pub fn has_class(&self, class: &str) -> bool {
        self.classes.iter().any(|c| c == class)
    }
}

/// Arena of elements; node 0 is the document
#[derive(Debug, Clone)]
pub struct Dom {
    nodes: Vec<Element>,
}

impl Default for Dom {
    fn default() -> Self {
        Self::new()
    }
}

impl Dom {
    pub const ROOT: NodeId = 0;

    pub fn new() -> Self {
        Self {
            nodes: vec![Element::new("#document")],
        }
    }

    /// Append `element` as the last child of `parent`
    pub fn append(&mut self, parent: NodeId, mut element: Element) -> NodeId {
        let id = self.nodes.len();
        element.parent = Some(parent);
        element.children.clear();
        self.nodes.push(element);
        self.nodes[parent].children.push(id);
        id
    }

    pub fn get(&self, id: NodeId) -> &Element {
        &self.nodes[id]
    }

    pub fn parent(&self, id: NodeId) -> Option<NodeId> {
        self.nodes[id].parent
    }

    pub fn children(&self, id: NodeId) -> &[NodeId] {
        &self.nodes[id].children
    }

    /// Descendants of `id` in document order, excluding `id`
    pub fn descendants(&self, id: NodeId) -> Vec<NodeId> {
        let mut out = Vec::new();
        let mut stack: Vec<NodeId> = self.children(id).iter().rev().copied().collect();
        while let Some(next) = stack.pop() {
            out.push(next);
            stack.extend(self.children(next).iter().rev());
        }
        out
    }

    /// Position of every node in document order, indexed by node id
    pub fn document_order(&self) -> Vec<usize> {
        let mut order = vec![0; self.nodes.len()];
        for (pos, id) in self.descendants(Self::ROOT).into_iter().enumerate() {
            order[id] = pos + 1;
        }
        order
    }

    /// Ancestors from the parent upwards, excluding the document
    pub fn ancestors(&self, id: NodeId) -> Vec<NodeId> {
        let mut out = Vec::new();
        let mut cur = self.parent(id);
        while let Some(p) = cur {
            if p == Self::ROOT {
                break;
            }
            out.push(p);
            cur = self.parent(p);
        }
        out
    }

    /// All text under the node, whitespace-collapsed
    pub fn text_content(&self, id: NodeId) -> String {
        let mut parts = Vec::new();
        self.collect_text(id, &mut parts, false);
        parts.join(" ").split_whitespace().collect::<Vec<_>>().join(" ")
    }

    /// Rendered text of visible nodes, one line per text-bearing node
    pub fn inner_text(&self, id: NodeId) -> String {
        let mut parts = Vec::new();
        self.collect_text(id, &mut parts, true);
        parts.join("\n")
    }

    fn collect_text(&self, id: NodeId, parts: &mut Vec<String>, visible_only: bool) {
        let el = self.get(id);
        if visible_only && el.hidden {
            return;
        }
        if !el.text.is_empty() {
            parts.push(el.text.clone());
        }
        for &child in self.children(id) {
            self.collect_text(child, parts, visible_only);
        }
    }

    pub fn is_visible(&self, id: NodeId) -> bool {
        id != Self::ROOT
            && !self.get(id).hidden
            && self.ancestors(id).iter().all(|a| !self.get(*a).hidden)
    }

    pub fn is_enabled(&self, id: NodeId) -> bool {
        !self.get(id).disabled
    }

    /// Nearest element (self or ancestor) carrying an action
    pub fn action_target(&self, id: NodeId) -> Option<(NodeId, Action)> {
        std::iter::once(id)
            .chain(self.ancestors(id))
            .find_map(|n| self.get(n).action.clone().map(|a| (n, a)))
    }

    /// Nearest catalog id (self or ancestor)
    pub fn product_of(&self, id: NodeId) -> Option<u32> {
        std::iter::once(id)
            .chain(self.ancestors(id))
            .find_map(|n| self.get(n).product)
    }

    /// ARIA role, explicit or implied by the tag
    pub fn role(&self, id: NodeId) -> Option<String> {
        let el = self.get(id);
        if let Some(role) = el.attrs.get("role") {
            return Some(role.clone());
        }
        let implied = match el.tag.as_str() {
            "button" => "button",
            "a" if el.attrs.contains_key("href") => "link",
            "input" if el.attrs.get("type").map(String::as_str) == Some("checkbox") => "checkbox",
            "h1" | "h2" | "h3" | "h4" | "h5" | "h6" => "heading",
            "img" => "img",
            "main" => "main",
            _ => return None,
        };
        Some(implied.to_string())
    }

    /// Accessible name: aria-label, then text, then alt/title
    pub fn accessible_name(&self, id: NodeId) -> String {
        let el = self.get(id);
        if let Some(label) = el.attrs.get("aria-label") {
            return label.clone();
        }
        let text = self.text_content(id);
        if !text.is_empty() {
            return text;
        }
        el.attrs
            .get("alt")
            .or_else(|| el.attrs.get("title"))
            .cloned()
            .unwrap_or_default()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn sample() -> (Dom, NodeId, NodeId, NodeId) {
        let mut dom = Dom::new();
        let main = dom.append(Dom::ROOT, Element::new("main").class("shop"));
        let p = dom.append(main, Element::new("p").text("Blue   Shirt"));
        let button = dom.append(main, Element::new("button").text("Add to cart").action(Action::AddToCart(1)));
        (dom, main, p, button)
    }

    #[test]
    fn test_descendants_in_document_order() {
        let (dom, main, p, button) = sample();
        assert_eq!(dom.descendants(Dom::ROOT), vec![main, p, button]);
        let order = dom.document_order();
        assert!(order[main] < order[p] && order[p] < order[button]);
    }

    #[test]
    fn test_text_content_collapses_whitespace() {
        let (dom, main, ..) = sample();
        assert_eq!(dom.text_content(main), "Blue Shirt Add to cart");
    }

    #[test]
    fn test_hidden_ancestor_hides_child() {
        let mut dom = Dom::new();
        let mut hidden = Element::new("div");
        hidden.hidden = true;
        let wrapper = dom.append(Dom::ROOT, hidden);
        let child = dom.append(wrapper, Element::new("span").text("x"));
        assert!(!dom.is_visible(child));
        assert_eq!(dom.inner_text(wrapper), "");
    }

    #[test]
    fn test_action_target_walks_up() {
        let mut dom = Dom::new();
        let button = dom.append(Dom::ROOT, Element::new("button").action(Action::OpenCart));
        let badge = dom.append(button, Element::new("div").text("3"));
        assert_eq!(dom.action_target(badge), Some((button, Action::OpenCart)));
    }

    #[test]
    fn test_roles_and_names() {
        let (dom, _, p, button) = sample();
        assert_eq!(dom.role(button).as_deref(), Some("button"));
        assert_eq!(dom.role(p), None);
        assert_eq!(dom.accessible_name(button), "Add to cart");
    }
}
