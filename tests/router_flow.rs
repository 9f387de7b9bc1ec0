use msga::prelude::*;
use msga::{LogLevel, Logger, MemorySink, RuntimeConfig, WindowEventKind, WindowOptions, match_route};
use msga::logging::ROUTER_TARGET;

fn home(_: Props) -> Child {
    element!("h1", Props::new(), "Home")
}

fn about(_: Props) -> Child {
    element!("h1", Props::new(), "About")
}

fn profile(props: Props) -> Child {
    let params = props.params();
    let id = params.get("id").map(String::as_str).unwrap_or("?");
    element!("h1", Props::new().with("class", "profile"), "User ", id.to_string())
}

fn missing(_: Props) -> Child {
    element!("h1", Props::new(), "Lost")
}

fn site(_: Props) -> Child {
    element!(
        "main",
        Props::new(),
        element!(
            router,
            Routes::new()
                .route("/", home)
                .route("*", missing)
                .route("/about", about)
                .route("/users/:id", profile)
                .into()
        )
    )
}

fn text(window: &Window) -> String {
    window
        .document()
        .body()
        .map(|body| body.text_content())
        .unwrap_or_default()
}

#[test]
fn match_route_examples() {
    let params = match_route("/users/:id", "/users/42").expect("match");
    assert_eq!(params.get("id").map(String::as_str), Some("42"));
    assert!(match_route("/users/:id", "/users/42/extra").is_none());
    assert!(match_route("/a/b", "/a/b").is_some_and(|params| params.is_empty()));
}

#[test]
fn navigate_then_back_restores_the_earlier_route() {
    let window = Window::open("http://localhost/about");
    create_app(&window, site);
    assert_eq!(text(&window), "About");

    navigate("/users/42");
    assert_eq!(text(&window), "User 42");
    assert_eq!(window.pathname(), "/users/42");

    assert!(window.back());
    assert_eq!(text(&window), "About");

    assert!(window.forward());
    assert_eq!(text(&window), "User 42");
}

#[test]
fn concrete_routes_after_the_wildcard_still_match() {
    let window = Window::open("http://localhost/about");
    create_app(&window, site);
    assert_eq!(text(&window), "About");

    navigate("/nope/nope");
    assert_eq!(text(&window), "Lost");
}

#[test]
fn matched_component_receives_params() {
    let window = Window::open("http://localhost/users/ada");
    let app = create_app(&window, site);
    assert_eq!(
        app.container().to_html(),
        "<div><main><h1 class=\"profile\">User ada</h1></main></div>"
    );
}

#[test]
fn one_popstate_listener_across_rerenders() {
    let window = Window::open("http://localhost/");
    let app = create_app(&window, site);
    for path in ["/about", "/users/1", "/"] {
        navigate(path);
    }
    app.rerender();
    assert_eq!(window.listener_count(WindowEventKind::PopState), 1);
}

#[test]
fn navigation_is_logged_on_the_router_target() {
    let sink = MemorySink::new();
    let config = RuntimeConfig::default().with_logger(Logger::new(sink.clone()));
    let window = Window::new(WindowOptions::default().with_config(config));
    create_app(&window, site);

    navigate("/about");

    let events: Vec<_> = sink
        .events()
        .into_iter()
        .filter(|event| event.target == ROUTER_TARGET)
        .collect();
    assert!(events.iter().all(|event| event.level == LogLevel::Debug));
    assert!(events.iter().any(|event| event.message == "navigate"));
    assert!(events.iter().any(|event| {
        event.message == "route_resolved"
            && event.field("pattern").and_then(|value| value.as_str()) == Some("/about")
    }));
}

#[test]
fn mount_unmount_cycles_leave_a_single_popstate_listener() {
    let window = Window::open("http://localhost/");
    for _ in 0..5 {
        let app = create_app(&window, site);
        assert!(app.unmount());
    }
    assert!(window.listener_count(WindowEventKind::PopState) <= 1);

    let app = create_app(&window, site);
    navigate("/about");
    assert_eq!(app.container().text_content(), "About");
    assert_eq!(window.listener_count(WindowEventKind::PopState), 1);
}
