//! Minimal in-memory host tree standing in for the browser DOM.
//!
//! Nodes are shared `Rc` handles with interior mutability; the runtime is
//! single-threaded, so nothing here is `Send`.

mod document;
mod node;

pub use document::Document;
pub use node::{DomEvent, Listener, Node, listener};
