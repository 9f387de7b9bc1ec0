use std::cell::RefCell;

use super::Node;

/// Owns the attachment point (`body`) once it exists.
#[derive(Debug, Default)]
pub struct Document {
    body: RefCell<Option<Node>>,
}

impl Document {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with_body() -> Self {
        let document = Self::new();
        document.attach_body();
        document
    }

    pub fn body(&self) -> Option<Node> {
        self.body.borrow().clone()
    }

    /// Creates `<body>` if missing and returns it.
    pub fn attach_body(&self) -> Node {
        self.body
            .borrow_mut()
            .get_or_insert_with(|| Node::element("body"))
            .clone()
    }

    pub fn create_element(&self, tag: &str) -> Node {
        Node::element(tag)
    }

    pub fn create_text_node(&self, content: &str) -> Node {
        Node::text(content)
    }

    pub fn get_element_by_id(&self, id: &str) -> Option<Node> {
        self.body().and_then(|body| body.find_by_id(id))
    }
}
