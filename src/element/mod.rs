//! Element constructor: turns `(tag, props, children)` into host nodes, or
//! delegates to a render function when the tag is a component.

use std::any::Any;
use std::fmt;
use std::rc::Rc;

use crate::dom::{DomEvent, Listener, Node};
use crate::router::RouteParams;
use crate::window;

/// A named render function.
#[derive(Clone)]
pub struct Component {
    name: Rc<str>,
    render: Rc<dyn Fn(Props) -> Child>,
}

impl Component {
    pub fn new(name: impl AsRef<str>, render: impl Fn(Props) -> Child + 'static) -> Self {
        Self {
            name: Rc::from(name.as_ref()),
            render: Rc::new(render),
        }
    }

    /// Names the component after the function's path, e.g. `app::counter`
    /// becomes `counter`.
    pub fn from_fn<F>(render: F) -> Self
    where
        F: Fn(Props) -> Child + 'static,
    {
        let name = std::any::type_name::<F>()
            .rsplit("::")
            .find(|segment| !segment.starts_with('{'))
            .unwrap_or("Anonymous");
        Self::new(name, render)
    }

    pub fn name(&self) -> &str {
        &self.name
    }

    pub fn render(&self, props: Props) -> Child {
        (self.render)(props)
    }

    pub fn ptr_eq(&self, other: &Component) -> bool {
        Rc::ptr_eq(&self.render, &other.render)
    }
}

impl<F> From<F> for Component
where
    F: Fn(Props) -> Child + 'static,
{
    fn from(render: F) -> Self {
        Component::from_fn(render)
    }
}

impl fmt::Debug for Component {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "Component({})", self.name)
    }
}

#[derive(Clone, Debug)]
pub enum Tag {
    Native(String),
    Component(Component),
}

impl Tag {
    pub fn fragment() -> Tag {
        Tag::Component(Component::new("Fragment", fragment))
    }
}

impl From<&str> for Tag {
    fn from(name: &str) -> Self {
        Tag::Native(name.to_string())
    }
}

impl From<String> for Tag {
    fn from(name: String) -> Self {
        Tag::Native(name)
    }
}

impl From<Component> for Tag {
    fn from(component: Component) -> Self {
        Tag::Component(component)
    }
}

impl From<&Component> for Tag {
    fn from(component: &Component) -> Self {
        Tag::Component(component.clone())
    }
}

impl<F> From<F> for Tag
where
    F: Fn(Props) -> Child + 'static,
{
    fn from(render: F) -> Self {
        Tag::Component(Component::from_fn(render))
    }
}

#[derive(Clone)]
pub enum PropValue {
    Str(String),
    Int(i64),
    Float(f64),
    Bool(bool),
    Handler(Listener),
    Style(Vec<(String, String)>),
    Children(Vec<Child>),
    Params(RouteParams),
    Shared(Rc<dyn Any>),
}

impl PropValue {
    /// Stringified form used when the value lands in an attribute.
    pub fn attribute_value(&self) -> String {
        match self {
            PropValue::Str(value) => value.clone(),
            PropValue::Int(value) => value.to_string(),
            PropValue::Float(value) => value.to_string(),
            PropValue::Bool(value) => value.to_string(),
            PropValue::Handler(_) => "function".to_string(),
            PropValue::Style(pairs) => pairs
                .iter()
                .map(|(key, value)| format!("{key}: {value};"))
                .collect::<Vec<_>>()
                .join(" "),
            PropValue::Children(children) => children
                .iter()
                .map(Child::text_content)
                .collect::<Vec<_>>()
                .join(","),
            PropValue::Params(params) => params
                .iter()
                .map(|(key, value)| format!("{key}={value}"))
                .collect::<Vec<_>>()
                .join("&"),
            PropValue::Shared(_) => "[object]".to_string(),
        }
    }

    pub fn as_str(&self) -> Option<&str> {
        match self {
            PropValue::Str(value) => Some(value),
            _ => None,
        }
    }
}

impl fmt::Debug for PropValue {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            PropValue::Handler(_) => f.write_str("Handler"),
            PropValue::Shared(_) => f.write_str("Shared"),
            PropValue::Children(children) => write!(f, "Children({})", children.len()),
            other => write!(f, "{:?}", other.attribute_value()),
        }
    }
}

impl From<&str> for PropValue {
    fn from(value: &str) -> Self {
        PropValue::Str(value.to_string())
    }
}

impl From<String> for PropValue {
    fn from(value: String) -> Self {
        PropValue::Str(value)
    }
}

impl From<i64> for PropValue {
    fn from(value: i64) -> Self {
        PropValue::Int(value)
    }
}

impl From<i32> for PropValue {
    fn from(value: i32) -> Self {
        PropValue::Int(value.into())
    }
}

impl From<u32> for PropValue {
    fn from(value: u32) -> Self {
        PropValue::Int(value.into())
    }
}

impl From<f64> for PropValue {
    fn from(value: f64) -> Self {
        PropValue::Float(value)
    }
}

impl From<bool> for PropValue {
    fn from(value: bool) -> Self {
        PropValue::Bool(value)
    }
}

impl From<Listener> for PropValue {
    fn from(handler: Listener) -> Self {
        PropValue::Handler(handler)
    }
}

impl From<RouteParams> for PropValue {
    fn from(params: RouteParams) -> Self {
        PropValue::Params(params)
    }
}

impl From<Vec<Child>> for PropValue {
    fn from(children: Vec<Child>) -> Self {
        PropValue::Children(children)
    }
}

/// Builds a `style` prop from property/value pairs.
pub fn style<I, K, V>(pairs: I) -> PropValue
where
    I: IntoIterator<Item = (K, V)>,
    K: Into<String>,
    V: Into<String>,
{
    PropValue::Style(
        pairs
            .into_iter()
            .map(|(key, value)| (key.into(), value.into()))
            .collect(),
    )
}

/// Wraps an arbitrary value so it can travel through props untouched.
pub fn shared<T: 'static>(value: T) -> PropValue {
    PropValue::Shared(Rc::new(value))
}

/// Ordered property bag; iteration follows insertion order.
#[derive(Clone, Default, Debug)]
pub struct Props {
    entries: Vec<(String, PropValue)>,
}

impl Props {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with(mut self, key: impl Into<String>, value: impl Into<PropValue>) -> Self {
        self.set(key, value);
        self
    }

    /// Registers an event handler under `key` (e.g. `onClick`).
    pub fn on(self, key: impl Into<String>, handler: impl Fn(&DomEvent) + 'static) -> Self {
        let handler: Listener = Rc::new(handler);
        self.with(key, PropValue::Handler(handler))
    }

    /// Overwrites an existing key in place, like assigning an object field.
    pub fn set(&mut self, key: impl Into<String>, value: impl Into<PropValue>) {
        let key = key.into();
        let value = value.into();
        match self.entries.iter_mut().find(|(existing, _)| *existing == key) {
            Some((_, slot)) => *slot = value,
            None => self.entries.push((key, value)),
        }
    }

    pub fn get(&self, key: &str) -> Option<&PropValue> {
        self.entries
            .iter()
            .find(|(existing, _)| existing == key)
            .map(|(_, value)| value)
    }

    pub fn str(&self, key: &str) -> Option<&str> {
        self.get(key).and_then(PropValue::as_str)
    }

    pub fn children(&self) -> Vec<Child> {
        match self.get("children") {
            Some(PropValue::Children(children)) => children.clone(),
            _ => Vec::new(),
        }
    }

    pub fn params(&self) -> RouteParams {
        match self.get("params") {
            Some(PropValue::Params(params)) => params.clone(),
            _ => RouteParams::new(),
        }
    }

    pub fn shared<T: 'static>(&self, key: &str) -> Option<Rc<T>> {
        match self.get(key) {
            Some(PropValue::Shared(value)) => value.clone().downcast::<T>().ok(),
            _ => None,
        }
    }

    pub fn iter(&self) -> impl Iterator<Item = (&str, &PropValue)> {
        self.entries.iter().map(|(key, value)| (key.as_str(), value))
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }
}

/// Render output: a host node, a text leaf, a nested list, or nothing.
#[derive(Clone, Default)]
pub enum Child {
    Node(Node),
    Text(String),
    List(Vec<Child>),
    #[default]
    Empty,
}

impl Child {
    /// Flattens into host nodes in order, skipping `Empty` and turning text
    /// into text leaves.
    pub fn into_nodes(self) -> Vec<Node> {
        let mut nodes = Vec::new();
        self.collect_nodes(&mut nodes);
        nodes
    }

    fn collect_nodes(self, out: &mut Vec<Node>) {
        match self {
            Child::Node(node) => out.push(node),
            Child::Text(text) => out.push(Node::text(text)),
            Child::List(children) => {
                for child in children {
                    child.collect_nodes(out);
                }
            }
            Child::Empty => {}
        }
    }

    pub fn as_node(&self) -> Option<&Node> {
        match self {
            Child::Node(node) => Some(node),
            _ => None,
        }
    }

    pub fn text_content(&self) -> String {
        match self {
            Child::Node(node) => node.text_content(),
            Child::Text(text) => text.clone(),
            Child::List(children) => children.iter().map(Child::text_content).collect(),
            Child::Empty => String::new(),
        }
    }
}

impl fmt::Debug for Child {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Child::Node(node) => write!(f, "Node({node:?})"),
            Child::Text(text) => write!(f, "Text({text:?})"),
            Child::List(children) => f.debug_list().entries(children).finish(),
            Child::Empty => f.write_str("Empty"),
        }
    }
}

impl From<Node> for Child {
    fn from(node: Node) -> Self {
        Child::Node(node)
    }
}

impl From<&str> for Child {
    fn from(text: &str) -> Self {
        Child::Text(text.to_string())
    }
}

impl From<String> for Child {
    fn from(text: String) -> Self {
        Child::Text(text)
    }
}

macro_rules! child_from_display {
    ($($ty:ty),*) => {
        $(impl From<$ty> for Child {
            fn from(value: $ty) -> Self {
                Child::Text(value.to_string())
            }
        })*
    };
}

child_from_display!(i32, i64, u32, u64, usize, f64);

impl From<Vec<Child>> for Child {
    fn from(children: Vec<Child>) -> Self {
        Child::List(children)
    }
}

impl<C: Into<Child>> From<Option<C>> for Child {
    fn from(value: Option<C>) -> Self {
        value.map_or(Child::Empty, Into::into)
    }
}

impl<C: Into<Child>> FromIterator<C> for Child {
    fn from_iter<I: IntoIterator<Item = C>>(iter: I) -> Self {
        Child::List(iter.into_iter().map(Into::into).collect())
    }
}

/// Builds renderable output from a tag, its props and its children.
///
/// Component tags receive `props` plus a `children` entry and their return
/// value is passed through unchanged. Native tags become a fresh element:
/// `on*` handlers turn into listeners (`onClick` -> `click`), `class` and
/// `className` set the class attribute, `style` fills the style map, and any
/// other key becomes an attribute. Children are flattened and appended in
/// order.
pub fn create_element(tag: impl Into<Tag>, props: Props, children: Vec<Child>) -> Child {
    match tag.into() {
        Tag::Component(component) => {
            component.render(props.with("children", PropValue::Children(children)))
        }
        Tag::Native(name) => {
            let element = Node::element(name);
            for (key, value) in props.iter() {
                apply_prop(&element, key, value);
            }
            for node in Child::List(children).into_nodes() {
                if let Err(error) = element.append_child(&node) {
                    if let Some(window) = window::current() {
                        window.report(error);
                    }
                }
            }
            Child::Node(element)
        }
    }
}

/// Returns its children untouched; renders as a flat sibling list.
pub fn fragment(props: Props) -> Child {
    Child::List(props.children())
}

fn apply_prop(element: &Node, key: &str, value: &PropValue) {
    match (key, value) {
        (_, PropValue::Handler(handler)) if key.starts_with("on") => {
            element.add_event_listener(key[2..].to_lowercase(), Rc::clone(handler));
        }
        ("class" | "className", value) => element.set_attribute("class", value.attribute_value()),
        ("style", PropValue::Style(pairs)) => {
            for (property, value) in pairs {
                element.set_style(property.clone(), value.clone());
            }
        }
        ("style", PropValue::Str(inline)) => {
            for declaration in inline.split(';') {
                if let Some((property, value)) = declaration.split_once(':') {
                    element.set_style(property.trim(), value.trim());
                }
            }
        }
        ("style" | "children", _) => {}
        (key, value) => element.set_attribute(key, value.attribute_value()),
    }
}

/// `element!(tag, props, children...)`: literal element syntax expanded into
/// [`create_element`] calls.
#[macro_export]
macro_rules! element {
    ($tag:expr) => {
        $crate::element::create_element($tag, $crate::element::Props::new(), ::std::vec::Vec::new())
    };
    ($tag:expr, $props:expr $(, $child:expr)* $(,)?) => {
        $crate::element::create_element(
            $tag,
            $props,
            ::std::vec![$($crate::element::Child::from($child)),*],
        )
    };
}
