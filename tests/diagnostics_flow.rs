use msga::prelude::*;
use msga::logging::DIAGNOSTICS_TARGET;
use msga::{EngineError, LogLevel, Logger, MemorySink, RuntimeConfig, WindowOptions};

fn exploding(_: Props) -> Child {
    element!(
        "button",
        Props::new()
            .with("id", "boom")
            .on("onClick", |_| panic!("click handler failed"))
    )
}

fn logged_window(url: &str) -> (Window, MemorySink) {
    let sink = MemorySink::new();
    let config = RuntimeConfig::default()
        .with_logger(Logger::new(sink.clone()))
        .with_metrics_enabled();
    let window = Window::new(WindowOptions::default().with_url(url).with_config(config));
    (window, sink)
}

#[test]
fn panicking_handler_shows_overlay_and_page_keeps_working() {
    let (window, sink) = logged_window("http://localhost:5173/");
    let app = create_app(&window, exploding);
    let boom = window.document().get_element_by_id("boom").expect("button");

    window.dispatch_event(&boom, "click");
    window.dispatch_event(&boom, "click");

    let overlay = window
        .document()
        .get_element_by_id("error-overlay")
        .expect("overlay");
    assert_eq!(overlay.text_content(), "Runtime error: click handler failed");
    assert_eq!(window.diagnostics().len(), 2);
    assert!(app.is_mounted());

    let errors: Vec<_> = sink
        .events()
        .into_iter()
        .filter(|event| event.target == DIAGNOSTICS_TARGET)
        .collect();
    assert_eq!(errors.len(), 2);
    assert!(errors.iter().all(|event| event.level == LogLevel::Error));
    assert_eq!(
        errors[0].field("kind").and_then(|kind| kind.as_str()),
        Some("runtime_error")
    );
}

#[test]
fn panicking_render_is_contained() {
    let window = Window::open("http://localhost/");
    let app = create_app(&window, |_: Props| -> Child { panic!("render failed") });

    assert_eq!(
        window.diagnostics(),
        vec![EngineError::Runtime {
            message: "render failed".into()
        }]
    );
    assert_eq!(app.stats().render_count, 0);
    assert!(!msga::registry::has_current_instance());
}

#[test]
fn failed_effect_job_becomes_unhandled_rejection() {
    let window = Window::open("http://localhost/");
    create_app(&window, |_: Props| {
        use_effect(
            || {
                if let Some(window) = msga::window::current() {
                    window.spawn_fallible(|| Err::<(), _>("fetch failed"));
                }
                None
            },
            deps![],
        );
        Child::Empty
    });
    window.run_microtasks();

    let overlay = window.document().get_element_by_id("error-overlay");
    assert_eq!(
        overlay.map(|node| node.text_content()).as_deref(),
        Some("Unhandled promise rejection: fetch failed")
    );
}

#[test]
fn remote_hosts_suppress_overlay_and_console() {
    let (window, sink) = logged_window("https://app.example.com/");
    create_app(&window, exploding);
    let boom = window.document().get_element_by_id("boom").expect("button");
    let contained = msga::window::contained_panics();

    window.dispatch_event(&boom, "click");
    window.dispatch_event(&boom, "click");

    assert!(window.document().get_element_by_id("error-overlay").is_none());
    assert!(window.diagnostics().is_empty());
    assert!(sink.messages(DIAGNOSTICS_TARGET).is_empty());
    assert_eq!(msga::window::contained_panics(), contained + 2);
    let snapshot = msga::emit_metrics_snapshot(&window).expect("metrics");
    assert_eq!(snapshot.diagnostics_suppressed, 2);
    assert_eq!(snapshot.diagnostics_emitted, 0);
}
