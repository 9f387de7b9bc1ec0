use std::cell::RefCell;
use std::collections::BTreeMap;
use std::fmt;
use std::rc::{Rc, Weak};

use crate::error::{EngineError, Result};

/// Event delivered to node listeners.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct DomEvent {
    pub event_type: String,
}

impl DomEvent {
    pub fn new(event_type: impl Into<String>) -> Self {
        Self {
            event_type: event_type.into(),
        }
    }
}

pub type Listener = Rc<dyn Fn(&DomEvent)>;

pub fn listener(handler: impl Fn(&DomEvent) + 'static) -> Listener {
    Rc::new(handler)
}

#[derive(Default)]
struct ElementData {
    tag: String,
    attributes: BTreeMap<String, String>,
    style: BTreeMap<String, String>,
    listeners: Vec<(String, Listener)>,
}

enum NodeKind {
    Element(ElementData),
    Text(String),
}

struct NodeData {
    kind: NodeKind,
    parent: Weak<RefCell<NodeData>>,
    children: Vec<Node>,
}

/// Shared handle to a host node. Clones refer to the same node.
#[derive(Clone)]
pub struct Node(Rc<RefCell<NodeData>>);

impl Node {
    pub fn element(tag: impl Into<String>) -> Self {
        Self::from_kind(NodeKind::Element(ElementData {
            tag: tag.into(),
            ..ElementData::default()
        }))
    }

    pub fn text(content: impl Into<String>) -> Self {
        Self::from_kind(NodeKind::Text(content.into()))
    }

    fn from_kind(kind: NodeKind) -> Self {
        Self(Rc::new(RefCell::new(NodeData {
            kind,
            parent: Weak::new(),
            children: Vec::new(),
        })))
    }

    pub fn is_element(&self) -> bool {
        matches!(self.0.borrow().kind, NodeKind::Element(_))
    }

    pub fn tag_name(&self) -> Option<String> {
        match &self.0.borrow().kind {
            NodeKind::Element(el) => Some(el.tag.clone()),
            NodeKind::Text(_) => None,
        }
    }

    pub fn set_attribute(&self, name: impl Into<String>, value: impl Into<String>) {
        if let NodeKind::Element(el) = &mut self.0.borrow_mut().kind {
            el.attributes.insert(name.into(), value.into());
        }
    }

    pub fn attribute(&self, name: &str) -> Option<String> {
        match &self.0.borrow().kind {
            NodeKind::Element(el) => el.attributes.get(name).cloned(),
            NodeKind::Text(_) => None,
        }
    }

    pub fn id(&self) -> Option<String> {
        self.attribute("id")
    }

    pub fn set_style(&self, property: impl Into<String>, value: impl Into<String>) {
        if let NodeKind::Element(el) = &mut self.0.borrow_mut().kind {
            el.style.insert(property.into(), value.into());
        }
    }

    pub fn style(&self, property: &str) -> Option<String> {
        match &self.0.borrow().kind {
            NodeKind::Element(el) => el.style.get(property).cloned(),
            NodeKind::Text(_) => None,
        }
    }

    pub fn add_event_listener(&self, event_type: impl Into<String>, listener: Listener) {
        if let NodeKind::Element(el) = &mut self.0.borrow_mut().kind {
            el.listeners.push((event_type.into(), listener));
        }
    }

    pub fn listener_count(&self, event_type: &str) -> usize {
        match &self.0.borrow().kind {
            NodeKind::Element(el) => el
                .listeners
                .iter()
                .filter(|(kind, _)| kind == event_type)
                .count(),
            NodeKind::Text(_) => 0,
        }
    }

    /// Invokes every listener registered for `event_type`, in registration
    /// order. Listeners are collected first so they may freely mutate the tree.
    pub fn dispatch_event(&self, event_type: &str) -> usize {
        let listeners: Vec<Listener> = match &self.0.borrow().kind {
            NodeKind::Element(el) => el
                .listeners
                .iter()
                .filter(|(kind, _)| kind == event_type)
                .map(|(_, listener)| Rc::clone(listener))
                .collect(),
            NodeKind::Text(_) => Vec::new(),
        };
        let event = DomEvent::new(event_type);
        for listener in &listeners {
            listener(&event);
        }
        listeners.len()
    }

    pub fn parent(&self) -> Option<Node> {
        self.0.borrow().parent.upgrade().map(Node)
    }

    pub fn children(&self) -> Vec<Node> {
        self.0.borrow().children.clone()
    }

    /// Appends `child`, detaching it from any previous parent first.
    pub fn append_child(&self, child: &Node) -> Result<()> {
        if !self.is_element() {
            return Err(EngineError::Dom("text nodes cannot have children".into()));
        }
        if self.is_inclusive_descendant_of(child) {
            return Err(EngineError::Dom(
                "the new child is an ancestor of the parent".into(),
            ));
        }
        child.detach();
        child.0.borrow_mut().parent = Rc::downgrade(&self.0);
        self.0.borrow_mut().children.push(child.clone());
        Ok(())
    }

    pub fn remove_child(&self, child: &Node) -> bool {
        let removed = {
            let mut data = self.0.borrow_mut();
            let before = data.children.len();
            data.children.retain(|existing| existing != child);
            before != data.children.len()
        };
        if removed {
            child.0.borrow_mut().parent = Weak::new();
        }
        removed
    }

    pub fn detach(&self) {
        if let Some(parent) = self.parent() {
            parent.remove_child(self);
        }
    }

    pub fn clear_children(&self) {
        let children = std::mem::take(&mut self.0.borrow_mut().children);
        for child in children {
            child.0.borrow_mut().parent = Weak::new();
        }
    }

    pub fn text_content(&self) -> String {
        let data = self.0.borrow();
        match &data.kind {
            NodeKind::Text(content) => content.clone(),
            NodeKind::Element(_) => data.children.iter().map(Node::text_content).collect(),
        }
    }

    pub fn set_text_content(&self, content: impl Into<String>) {
        let content = content.into();
        let mut data = self.0.borrow_mut();
        if let NodeKind::Text(existing) = &mut data.kind {
            *existing = content;
            return;
        }
        for child in data.children.drain(..) {
            child.0.borrow_mut().parent = Weak::new();
        }
        let leaf = Node::text(content);
        leaf.0.borrow_mut().parent = Rc::downgrade(&self.0);
        data.children.push(leaf);
    }

    /// Depth-first search over this node and its descendants.
    pub fn find(&self, predicate: &dyn Fn(&Node) -> bool) -> Option<Node> {
        if predicate(self) {
            return Some(self.clone());
        }
        self.children()
            .iter()
            .find_map(|child| child.find(predicate))
    }

    pub fn find_by_id(&self, id: &str) -> Option<Node> {
        self.find(&|node| node.id().as_deref() == Some(id))
    }

    pub fn find_by_tag(&self, tag: &str) -> Option<Node> {
        self.find(&|node| node.tag_name().as_deref() == Some(tag))
    }

    fn is_inclusive_descendant_of(&self, candidate: &Node) -> bool {
        let mut cursor = Some(self.clone());
        while let Some(node) = cursor {
            if &node == candidate {
                return true;
            }
            cursor = node.parent();
        }
        false
    }

    /// Deterministic markup: attributes and style properties are sorted.
    pub fn to_html(&self) -> String {
        let mut out = String::new();
        self.write_html(&mut out);
        out
    }

    fn write_html(&self, out: &mut String) {
        let data = self.0.borrow();
        match &data.kind {
            NodeKind::Text(content) => out.push_str(&escape(content, false)),
            NodeKind::Element(el) => {
                out.push('<');
                out.push_str(&el.tag);
                for (name, value) in &el.attributes {
                    out.push_str(&format!(" {name}=\"{}\"", escape(value, true)));
                }
                if !el.style.is_empty() {
                    let style = el
                        .style
                        .iter()
                        .map(|(prop, value)| format!("{prop}: {value};"))
                        .collect::<Vec<_>>()
                        .join(" ");
                    out.push_str(&format!(" style=\"{}\"", escape(&style, true)));
                }
                out.push('>');
                for child in &data.children {
                    child.write_html(out);
                }
                out.push_str(&format!("</{}>", el.tag));
            }
        }
    }
}

impl PartialEq for Node {
    fn eq(&self, other: &Self) -> bool {
        Rc::ptr_eq(&self.0, &other.0)
    }
}

impl Eq for Node {}

impl fmt::Debug for Node {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.to_html())
    }
}

fn escape(raw: &str, attribute: bool) -> String {
    let mut out = String::with_capacity(raw.len());
    for ch in raw.chars() {
        match ch {
            '&' => out.push_str("&amp;"),
            '<' => out.push_str("&lt;"),
            '>' => out.push_str("&gt;"),
            '"' if attribute => out.push_str("&quot;"),
            other => out.push(other),
        }
    }
    out
}
