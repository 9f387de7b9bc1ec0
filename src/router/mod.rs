//! Path routing on top of the hooks: the `router` component keeps the current
//! path in state and re-renders on every `popstate`.

use std::cell::RefCell;
use std::collections::BTreeMap;

use crate::element::{Child, Component, Props, create_element, shared};
use crate::hooks::{Setter, use_state, use_window};
use crate::logging::{LogLevel, ROUTER_TARGET, json_kv};
use crate::registry::{InstanceId, current_instance};
use crate::window::{self, SharedStateError, Window, WindowEventKind};

mod matcher;

pub use matcher::{FALLBACK_PATTERNS, Route, RouteMatch, RouteParams, match_route, select_route};

/// Ordered routing table; converts into the props `router` expects.
#[derive(Debug, Clone, Default)]
pub struct Routes(Vec<Route>);

impl Routes {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn route(mut self, pattern: impl Into<String>, component: impl Into<Component>) -> Self {
        self.0.push(Route::new(pattern, component));
        self
    }

    pub fn into_props(self) -> Props {
        Props::new().with("routes", shared(self.0))
    }
}

impl From<Routes> for Props {
    fn from(routes: Routes) -> Self {
        routes.into_props()
    }
}

impl FromIterator<Route> for Routes {
    fn from_iter<I: IntoIterator<Item = Route>>(iter: I) -> Self {
        Routes(iter.into_iter().collect())
    }
}

/// Path setters of mounted routers, keyed by instance and state slot. A
/// single window-level `popstate` listener fans out to them.
#[derive(Default)]
struct PopStateSubscriptions(RefCell<BTreeMap<(InstanceId, usize), Setter<String>>>);

impl PopStateSubscriptions {
    fn subscribe(&self, key: (InstanceId, usize), setter: Setter<String>) {
        let mut setters = self.0.borrow_mut();
        setters.retain(|_, setter| setter.is_live());
        setters.entry(key).or_insert(setter);
    }

    /// Drops setters of unmounted routers and returns the rest.
    fn live(&self) -> Vec<Setter<String>> {
        let mut setters = self.0.borrow_mut();
        setters.retain(|_, setter| setter.is_live());
        setters.values().cloned().collect()
    }
}

fn notify_routers(window: &Window) {
    let Ok(subscriptions) = window.shared().get::<PopStateSubscriptions>() else {
        return;
    };
    let path = window.pathname();
    for setter in subscriptions.live() {
        setter.set(path.clone());
    }
}

fn subscribe_to_popstate(window: &Window, key: (InstanceId, usize), setter: Setter<String>) {
    let first = matches!(
        window.shared().get::<PopStateSubscriptions>(),
        Err(SharedStateError::Missing)
    );
    match window
        .shared()
        .get_or_insert_with(PopStateSubscriptions::default)
    {
        Ok(subscriptions) => {
            subscriptions.subscribe(key, setter);
            if first {
                window.add_event_listener(WindowEventKind::PopState, notify_routers);
            }
        }
        Err(error) => window.report(error.into()),
    }
}

/// Renders the first route matching the current path, passing it `params`.
/// Falls back to the `*`/`/404` entry, or to `<div>404 Not Found</div>`.
pub fn router(props: Props) -> Child {
    let routes = props.shared::<Vec<Route>>("routes").unwrap_or_default();
    let window = use_window();
    let initial = window
        .as_ref()
        .map_or_else(|| "/".to_string(), |window| window.pathname());
    let (path, set_path) = use_state(initial);

    if let (Some(window), Ok(instance)) = (window.as_ref(), current_instance("router")) {
        let key = (instance.id(), set_path.slot());
        subscribe_to_popstate(window, key, set_path);
    }

    let selected = select_route(&routes, &path);
    if let Some(window) = window.as_ref() {
        let pattern = match &selected {
            RouteMatch::Matched { route, .. } | RouteMatch::Fallback(route) => route.pattern(),
            RouteMatch::NotFound => "",
        };
        window.log(
            LogLevel::Debug,
            ROUTER_TARGET,
            "route_resolved",
            [json_kv("path", path.as_str()), json_kv("pattern", pattern)],
        );
    }

    match selected {
        RouteMatch::Matched { route, params } => create_element(
            route.component(),
            Props::new().with("params", params),
            Vec::new(),
        ),
        RouteMatch::Fallback(route) => create_element(route.component(), Props::new(), Vec::new()),
        RouteMatch::NotFound => create_element("div", Props::new(), vec![Child::from("404 Not Found")]),
    }
}

/// Pushes `to` onto the current window's history and fires `popstate`.
pub fn navigate(to: &str) {
    if let Some(window) = window::current() {
        window.navigate(to);
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::element;
    use crate::runtime::create_app;
    use crate::window::Window;

    fn home(_: Props) -> Child {
        element!("h1", Props::new(), "home")
    }

    fn user(props: Props) -> Child {
        let id = props.params().get("id").cloned().unwrap_or_default();
        element!("p", Props::new(), format!("user {id}"))
    }

    fn app(_: Props) -> Child {
        element!(
            router,
            Routes::new().route("/", home).route("/users/:id", user).into()
        )
    }

    #[test]
    fn renders_route_for_initial_path_with_params() {
        let window = Window::open("http://localhost/users/42");
        let handle = create_app(&window, app);
        assert_eq!(handle.container().text_content(), "user 42");
    }

    #[test]
    fn unknown_path_without_fallback_renders_not_found() {
        let window = Window::open("http://localhost/nowhere");
        let handle = create_app(&window, app);
        assert_eq!(handle.container().to_html(), "<div><div>404 Not Found</div></div>");
    }

    #[test]
    fn popstate_listener_registers_once_per_router() {
        let window = Window::open("http://localhost/");
        create_app(&window, app);
        navigate("/users/1");
        navigate("/users/2");
        assert_eq!(window.listener_count(WindowEventKind::PopState), 1);
    }

    #[test]
    fn remounting_routers_keeps_one_listener_and_prunes_dead_setters() {
        let window = Window::open("http://localhost/");
        for _ in 0..5 {
            let handle = create_app(&window, app);
            navigate("/users/3");
            assert_eq!(handle.container().text_content(), "user 3");
            assert!(handle.unmount());
        }
        let handle = create_app(&window, app);
        navigate("/users/9");

        assert_eq!(handle.container().text_content(), "user 9");
        assert_eq!(window.listener_count(WindowEventKind::PopState), 1);
        let subscriptions = window
            .shared()
            .get::<PopStateSubscriptions>()
            .expect("subscriptions");
        assert_eq!(subscriptions.live().len(), 1);
    }

    #[test]
    fn navigate_then_back_restores_previous_view() {
        let window = Window::open("http://localhost/");
        let handle = create_app(&window, app);
        navigate("/users/7");
        assert_eq!(handle.container().text_content(), "user 7");

        assert!(window.back());
        assert_eq!(handle.container().text_content(), "home");
    }
}
