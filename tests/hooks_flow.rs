use std::cell::RefCell;
use std::rc::Rc;
use std::time::Duration;

use msga::prelude::*;
use msga::{
    BufferedAudit, Clock, EngineError, Node, RenderLimits, RerenderOutcome, RuntimeAuditStage,
    RuntimeConfig, WindowOptions,
};

type Log = Rc<RefCell<Vec<String>>>;

fn button(window: &Window, id: &str) -> Node {
    window
        .document()
        .get_element_by_id(id)
        .unwrap_or_else(|| panic!("#{id} rendered"))
}

fn counter(log: &Log) -> Component {
    let log = Rc::clone(log);
    Component::new("Counter", move |_| {
        let (count, set_count) = use_state(0);

        let once = Rc::clone(&log);
        use_effect(
            move || {
                once.borrow_mut().push("mounted".into());
                None
            },
            deps![],
        );
        let every = Rc::clone(&log);
        use_effect(
            move || {
                every.borrow_mut().push(format!("rendered {count}"));
                None
            },
            None,
        );

        element!(
            "button",
            Props::new()
                .with("id", "inc")
                .on("onClick", move |_| set_count.update(|n| n + 1)),
            format!("Count: {count}")
        )
    })
}

#[test]
fn click_rerenders_and_empty_deps_effect_runs_once() {
    let window = Window::open("http://localhost:5173/");
    let log: Log = Rc::default();
    let app = create_app(&window, counter(&log));
    assert_eq!(app.container().text_content(), "Count: 0");

    window.dispatch_event(&button(&window, "inc"), "click");

    assert_eq!(app.container().text_content(), "Count: 1");
    assert_eq!(
        *log.borrow(),
        vec!["mounted", "rendered 0", "rendered 1"]
    );
    assert!(window.diagnostics().is_empty());
}

#[test]
fn each_render_rebuilds_the_subtree() {
    let window = Window::open("http://localhost/");
    let log: Log = Rc::default();
    create_app(&window, counter(&log));
    let before = button(&window, "inc");

    window.dispatch_event(&before, "click");

    let after = button(&window, "inc");
    assert_ne!(before, after);
    assert!(before.parent().is_none());
}

#[test]
fn slots_keep_their_position_across_passes() {
    let window = Window::open("http://localhost/");
    let app = create_app(&window, |_: Props| {
        let (name, _) = use_state(String::from("ada"));
        let (age, set_age) = use_state(36_u32);
        let (flag, _) = use_state(false);
        element!(
            "p",
            Props::new()
                .with("id", "who")
                .on("onClick", move |_| set_age.set(age + 1)),
            format!("{name} {age} {flag}")
        )
    });

    window.dispatch_event(&button(&window, "who"), "click");
    window.dispatch_event(&button(&window, "who"), "click");

    assert_eq!(app.container().text_content(), "ada 38 false");
    assert_eq!(app.stats().state_slots, 3);
}

#[test]
fn setting_an_equal_value_still_rerenders() {
    let window = Window::open("http://localhost/");
    let app = create_app(&window, |_: Props| {
        let (value, set_value) = use_state(1);
        element!(
            "span",
            Props::new()
                .with("id", "same")
                .on("onClick", move |_| set_value.set(value)),
            value
        )
    });
    assert_eq!(app.stats().render_count, 1);

    window.dispatch_event(&button(&window, "same"), "click");

    assert_eq!(app.stats().render_count, 2);
}

#[test]
fn changed_deps_run_cleanup_before_the_next_run() {
    let window = Window::open("http://localhost/");
    let log: Log = Rc::default();
    let sink = Rc::clone(&log);
    create_app(&window, move |_: Props| {
        let (n, set_n) = use_state(0);
        let (tick, set_tick) = use_state(0);
        let runs = Rc::clone(&sink);
        use_effect(
            move || {
                runs.borrow_mut().push(format!("run {n}"));
                let cleanups = Rc::clone(&runs);
                cleanup(move || cleanups.borrow_mut().push(format!("cleanup {n}")))
            },
            deps![n],
        );
        element!(
            "div",
            Props::new(),
            element!(
                "button",
                Props::new()
                    .with("id", "bump")
                    .on("onClick", move |_| set_n.set(n + 1))
            ),
            element!(
                "button",
                Props::new()
                    .with("id", "tick")
                    .on("onClick", move |_| set_tick.set(tick + 1))
            )
        )
    });

    window.dispatch_event(&button(&window, "tick"), "click");
    assert_eq!(*log.borrow(), vec!["run 0"]);

    window.dispatch_event(&button(&window, "bump"), "click");
    assert_eq!(*log.borrow(), vec!["run 0", "cleanup 0", "run 1"]);
}

#[test]
fn by_ref_deps_follow_pointer_identity() {
    let window = Window::open("http://localhost/");
    let runs = Rc::new(RefCell::new(0));
    let counted = Rc::clone(&runs);
    let stable = Rc::new(vec![1, 2, 3]);
    create_app(&window, move |_: Props| {
        let (fresh, set_fresh) = use_state(false);
        let dep = if fresh {
            Rc::new(vec![1, 2, 3])
        } else {
            Rc::clone(&stable)
        };
        let counted = Rc::clone(&counted);
        use_effect(
            move || {
                *counted.borrow_mut() += 1;
                None
            },
            Some(vec![Dep::by_ref(dep)]),
        );
        element!(
            "i",
            Props::new()
                .with("id", "flip")
                .on("onClick", move |_| set_fresh.set(true))
        )
    });

    window.dispatch_event(&button(&window, "flip"), "click");
    assert_eq!(*runs.borrow(), 2);
    window.dispatch_event(&button(&window, "flip"), "click");
    assert_eq!(*runs.borrow(), 3);
}

#[test]
fn fifty_first_rerender_in_a_second_is_throttled() {
    let clock = Clock::manual();
    let window = Window::new(WindowOptions::default().with_clock(clock.clone()));
    let app = create_app(&window, |_: Props| {
        let (count, set_count) = use_state(0);
        element!(
            "button",
            Props::new().with("id", "burst").on("onClick", move |_| {
                for _ in 0..60 {
                    set_count.update(|n| n + 1);
                }
            }),
            count
        )
    });

    window.dispatch_event(&button(&window, "burst"), "click");

    assert_eq!(app.container().text_content(), "50");
    let throttled: Vec<u32> = window
        .diagnostics()
        .into_iter()
        .filter_map(|error| match error {
            EngineError::TooManyRerenders { component, count } => {
                assert_eq!(component, "fifty_first_rerender_in_a_second_is_throttled");
                Some(count)
            }
            _ => None,
        })
        .collect();
    assert_eq!(throttled, (51..=60).collect::<Vec<_>>());

    clock.advance(Duration::from_millis(1001));
    assert_eq!(app.rerender(), RerenderOutcome::Rendered);
    assert_eq!(app.container().text_content(), "60");
}

#[test]
fn custom_limits_are_honoured() {
    let config = RuntimeConfig::default().with_limits(RenderLimits {
        max_rerenders: 1,
        window_ms: 1000,
    });
    let window = Window::new(
        WindowOptions::default()
            .with_clock(Clock::manual())
            .with_config(config),
    );
    let app = create_app(&window, |_: Props| Child::from("static"));

    assert_eq!(app.rerender(), RerenderOutcome::Rendered);
    assert_eq!(app.rerender(), RerenderOutcome::Throttled);
}

#[test]
fn set_state_during_render_is_reported_and_applied() {
    let window = Window::open("http://localhost/");
    let app = create_app(&window, |_: Props| {
        let (value, set_value) = use_state(0);
        if value == 0 {
            set_value.set(1);
        }
        Child::from(value)
    });

    assert_eq!(app.container().text_content(), "0");
    assert_eq!(
        window.diagnostics(),
        vec![EngineError::SetStateDuringRender {
            component: "set_state_during_render_is_reported_and_applied".into()
        }]
    );

    assert_eq!(app.rerender(), RerenderOutcome::Rendered);
    assert_eq!(app.container().text_content(), "1");
}

#[test]
fn mount_waits_for_body_across_frames() {
    let audit = BufferedAudit::new();
    let config = RuntimeConfig::default().with_audit(audit.clone());
    let window = Window::new(
        WindowOptions::default()
            .with_config(config)
            .without_body(),
    );
    let log: Log = Rc::default();
    let app = create_app(&window, counter(&log));

    assert_eq!(app.stats().render_count, 0);
    assert_eq!(window.tick_frame(), 1);
    assert_eq!(window.pending_frames(), 1);

    let body = window.document().attach_body();
    window.tick_frame();

    assert_eq!(window.pending_frames(), 0);
    assert_eq!(app.container().parent(), Some(body));
    assert_eq!(*log.borrow(), vec!["mounted", "rendered 0"]);
    assert_eq!(audit.count(RuntimeAuditStage::MountDeferred), 2);
    assert_eq!(audit.count(RuntimeAuditStage::Mounted), 1);
}

#[test]
fn unmount_tears_down_and_silences_setters() {
    let window = Window::open("http://localhost/");
    let log: Log = Rc::default();
    let captured: Rc<RefCell<Option<Setter<i32>>>> = Rc::default();
    let slot = Rc::clone(&captured);
    let sink = Rc::clone(&log);
    let app = create_app(&window, move |_: Props| {
        let (value, set_value) = use_state(0);
        *slot.borrow_mut() = Some(set_value);
        let first = Rc::clone(&sink);
        use_effect(
            move || {
                let done = Rc::clone(&first);
                cleanup(move || done.borrow_mut().push("first".into()))
            },
            deps![],
        );
        let second = Rc::clone(&sink);
        use_effect(
            move || {
                let done = Rc::clone(&second);
                cleanup(move || done.borrow_mut().push("second".into()))
            },
            deps![],
        );
        Child::from(value)
    });

    assert!(app.unmount());
    assert_eq!(*log.borrow(), vec!["first", "second"]);
    assert!(!app.is_mounted());
    assert!(window.document().body().is_some_and(|body| body.children().is_empty()));

    let setter = captured.borrow().clone().expect("setter captured");
    assert!(!setter.is_live());
    setter.set(9);
    assert_eq!(app.stats().render_count, 1);
}

#[test]
fn hooks_outside_components_degrade_to_diagnostics() {
    let window = Window::open("http://127.0.0.1/");
    let (value, setter) = use_state("fallback");
    setter.set("ignored");
    use_effect(|| None, None);

    assert_eq!(value, "fallback");
    let messages: Vec<String> = window.diagnostics().iter().map(ToString::to_string).collect();
    assert_eq!(
        messages,
        vec![
            "use_state must be called inside a component",
            "use_effect must be called inside a component",
        ]
    );
}
