//! Render passes, the re-render gate and the deferred effect flush.

use std::rc::Rc;

use serde_json::json;

use super::RerenderOutcome;
use super::audit::{RuntimeAuditEventBuilder, RuntimeAuditStage};
use crate::element::Props;
use crate::error::EngineError;
use crate::hooks::Cleanup;
use crate::logging::{LogLevel, RUNTIME_TARGET, json_kv};
use crate::registry::{Instance, RenderScope};
use crate::window::Window;

enum Gate {
    Render,
    Dropped,
    Throttled(u32),
}

/// Waits for `body`, then renders and attaches the container.
pub(super) fn mount(instance: &Rc<Instance>, window: &Window) {
    if !instance.is_mounted() {
        return;
    }

    let Some(body) = window.document().body() else {
        window.audit(
            RuntimeAuditEventBuilder::new(RuntimeAuditStage::MountDeferred)
                .detail("instance", instance.id().to_string())
                .finish(),
        );
        let pending = Rc::downgrade(instance);
        let host = window.downgrade();
        window.request_animation_frame(move || {
            if let (Some(instance), Some(window)) = (pending.upgrade(), host.upgrade()) {
                mount(&instance, &window);
            }
        });
        return;
    };

    render_pass(instance, window);
    if let Err(error) = body.append_child(instance.container()) {
        window.report(error);
        return;
    }

    window.log(
        LogLevel::Info,
        RUNTIME_TARGET,
        "app_mounted",
        [
            json_kv("component", instance.name()),
            json_kv("instance", instance.id().to_string()),
        ],
    );
    window.audit(
        RuntimeAuditEventBuilder::new(RuntimeAuditStage::Mounted)
            .detail("instance", instance.id().to_string())
            .finish(),
    );
}

/// The re-render trigger shared by setters and [`super::AppHandle::rerender`].
pub(crate) fn rerender(instance: &Rc<Instance>) -> RerenderOutcome {
    if !instance.is_mounted() {
        return RerenderOutcome::Unmounted;
    }
    let Some(window) = instance.window() else {
        return RerenderOutcome::Unmounted;
    };

    let limits = window.config().limits;
    let now = window.now();
    let gate = {
        let mut record = instance.record.borrow_mut();
        if record.is_rendering {
            Gate::Dropped
        } else {
            let quiet = record
                .last_render_timestamp
                .is_none_or(|last| now.saturating_sub(last) > limits.window());
            if quiet {
                record.rerender_count = 0;
            }
            record.rerender_count = record.rerender_count.saturating_add(1);
            record.last_render_timestamp = Some(now);
            if record.rerender_count > limits.max_rerenders {
                Gate::Throttled(record.rerender_count)
            } else {
                Gate::Render
            }
        }
    };

    match gate {
        Gate::Render => {
            render_pass(instance, &window);
            RerenderOutcome::Rendered
        }
        Gate::Dropped => {
            window.with_metrics(|metrics| metrics.record_rerender_dropped());
            window.log(
                LogLevel::Debug,
                RUNTIME_TARGET,
                "rerender_dropped",
                [json_kv("instance", instance.id().to_string())],
            );
            window.audit(
                RuntimeAuditEventBuilder::new(RuntimeAuditStage::RerenderDropped)
                    .detail("instance", instance.id().to_string())
                    .finish(),
            );
            RerenderOutcome::Dropped
        }
        Gate::Throttled(count) => {
            window.with_metrics(|metrics| metrics.record_rerender_throttled());
            window.audit(
                RuntimeAuditEventBuilder::new(RuntimeAuditStage::RerenderThrottled)
                    .detail("instance", instance.id().to_string())
                    .detail("count", count)
                    .finish(),
            );
            window.report(EngineError::TooManyRerenders {
                component: instance.name().to_string(),
                count,
            });
            RerenderOutcome::Throttled
        }
    }
}

/// Runs the render function under a [`RenderScope`], replaces the container's
/// children with the result and queues the effect flush.
fn render_pass(instance: &Rc<Instance>, window: &Window) {
    let output = {
        let _scope = RenderScope::enter(instance);
        instance.component().render(Props::new())
    };

    let container = instance.container();
    container.clear_children();
    for node in output.into_nodes() {
        if let Err(error) = container.append_child(&node) {
            window.report(error);
        }
    }

    let (hash, unchanged) = instance
        .record
        .borrow_mut()
        .note_commit(&container.to_html());
    window.with_metrics(|metrics| metrics.record_render(unchanged));
    window.log(
        LogLevel::Debug,
        RUNTIME_TARGET,
        "render_committed",
        [
            json_kv("instance", instance.id().to_string()),
            json_kv("hash", hash.to_hex().to_string()),
            json_kv("unchanged", unchanged),
        ],
    );
    window.audit(
        RuntimeAuditEventBuilder::new(RuntimeAuditStage::RenderCommitted)
            .detail("instance", instance.id().to_string())
            .detail("unchanged", unchanged)
            .finish(),
    );

    let pending = Rc::downgrade(instance);
    window.queue_microtask(move || {
        if let Some(instance) = pending.upgrade() {
            flush_effects(&instance);
        }
    });
}

/// Runs pending effects in slot order, each preceded by its previous cleanup.
/// No borrow of the record is held while user code runs.
fn flush_effects(instance: &Rc<Instance>) {
    if !instance.is_mounted() {
        return;
    }

    let mut effects = 0;
    let mut cleanups = 0;
    let mut idx = 0;
    loop {
        let (cleanup, callback) = {
            let mut record = instance.record.borrow_mut();
            let Some(effect) = record.effect_slots.get_mut(idx) else {
                break;
            };
            if !effect.run_pending {
                idx += 1;
                continue;
            }
            effect.run_pending = false;
            (effect.cleanup.take(), effect.callback.take())
        };

        if let Some(cleanup) = cleanup {
            cleanup();
            cleanups += 1;
        }
        if let Some(callback) = callback {
            let next = callback();
            effects += 1;
            if let Some(effect) = instance.record.borrow_mut().effect_slots.get_mut(idx) {
                effect.cleanup = next;
            }
        }
        idx += 1;
    }

    if effects == 0 && cleanups == 0 {
        return;
    }
    let Some(window) = instance.window() else {
        return;
    };
    window.with_metrics(|metrics| metrics.record_effects(effects, cleanups));
    window.log(
        LogLevel::Debug,
        RUNTIME_TARGET,
        "effects_flushed",
        [
            json_kv("instance", instance.id().to_string()),
            json_kv("effects", json!(effects)),
            json_kv("cleanups", json!(cleanups)),
        ],
    );
    window.audit(
        RuntimeAuditEventBuilder::new(RuntimeAuditStage::EffectsFlushed)
            .detail("instance", instance.id().to_string())
            .detail("effects", effects)
            .finish(),
    );
}

/// Tears an instance down: cleanups in slot order, subtree removed, registry
/// entry dropped. Every setter bound to it goes inert.
pub(super) fn unmount(instance: &Rc<Instance>) -> bool {
    if !instance.is_mounted() {
        return false;
    }
    instance.set_mounted(false);

    let cleanups: Vec<Cleanup> = {
        let mut record = instance.record.borrow_mut();
        record
            .effect_slots
            .iter_mut()
            .filter_map(|effect| {
                effect.run_pending = false;
                effect.callback = None;
                effect.cleanup.take()
            })
            .collect()
    };
    let count = cleanups.len();
    let window = instance.window();
    for cleanup in cleanups {
        match window.as_ref() {
            Some(window) => {
                window.guarded(cleanup);
            }
            None => cleanup(),
        }
    }

    let container = instance.container();
    container.clear_children();
    container.detach();

    if let Some(window) = window {
        window.registry().remove(instance.id());
        window.with_metrics(|metrics| metrics.record_effects(0, count));
        window.log(
            LogLevel::Info,
            RUNTIME_TARGET,
            "app_unmounted",
            [
                json_kv("instance", instance.id().to_string()),
                json_kv("cleanups", json!(count)),
            ],
        );
        window.audit(
            RuntimeAuditEventBuilder::new(RuntimeAuditStage::Unmounted)
                .detail("instance", instance.id().to_string())
                .detail("cleanups", count)
                .finish(),
        );
    }
    true
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::element::{Child, Component};
    use crate::hooks::{cleanup, use_effect, use_state};
    use crate::runtime::{RenderLimits, RuntimeConfig, create_app};
    use crate::window::{Clock, WindowOptions};
    use std::cell::RefCell;
    use std::time::Duration;

    type Log = Rc<RefCell<Vec<String>>>;

    fn tracked(log: &Log, label: &'static str) -> impl Fn(Props) -> Child + 'static {
        let log = Rc::clone(log);
        move |_| {
            let (n, _) = use_state(0);
            let seen = Rc::clone(&log);
            let teardown = Rc::clone(&log);
            use_effect(
                move || {
                    seen.borrow_mut().push(format!("{label} run"));
                    cleanup(move || teardown.borrow_mut().push(format!("{label} cleanup")))
                },
                None,
            );
            Child::from(n)
        }
    }

    #[test]
    fn effects_wait_for_the_microtask_after_commit() {
        let window = Window::open("http://localhost/");
        let log: Log = Rc::default();
        let app = create_app(&window, Component::new("Tracked", tracked(&log, "a")));
        assert_eq!(*log.borrow(), vec!["a run"]);

        assert_eq!(app.rerender(), RerenderOutcome::Rendered);
        assert_eq!(*log.borrow(), vec!["a run"]);
        assert_eq!(app.stats().pending_effects, 1);

        window.run_microtasks();
        assert_eq!(*log.borrow(), vec!["a run", "a cleanup", "a run"]);
    }

    #[test]
    fn throttle_window_resets_after_quiet_period() {
        let clock = Clock::manual();
        let config = RuntimeConfig::default().with_limits(RenderLimits {
            max_rerenders: 2,
            window_ms: 1000,
        });
        let window = Window::new(
            WindowOptions::default()
                .with_clock(clock.clone())
                .with_config(config),
        );
        let app = create_app(&window, |_: Props| Child::from("x"));

        assert_eq!(app.rerender(), RerenderOutcome::Rendered);
        assert_eq!(app.rerender(), RerenderOutcome::Rendered);
        assert_eq!(app.rerender(), RerenderOutcome::Throttled);

        clock.advance(Duration::from_millis(1001));
        assert_eq!(app.rerender(), RerenderOutcome::Rendered);
        assert_eq!(app.stats().rerender_count, 1);
    }

    #[test]
    fn rerender_during_render_is_dropped() {
        let window = Window::open("http://localhost/");
        let outcomes = Rc::new(RefCell::new(Vec::new()));
        let sink = Rc::clone(&outcomes);
        let app = create_app(&window, move |_: Props| {
            if let Ok(instance) = crate::registry::current_instance("test") {
                sink.borrow_mut().push(rerender(&instance));
            }
            Child::Empty
        });

        assert_eq!(*outcomes.borrow(), vec![RerenderOutcome::Dropped]);
        assert_eq!(app.stats().render_count, 1);
    }

    #[test]
    fn unmount_runs_cleanups_and_retires_instance() {
        let window = Window::open("http://localhost/");
        let log: Log = Rc::default();
        let app = create_app(&window, Component::new("Tracked", tracked(&log, "a")));
        assert_eq!(window.registry().len(), 1);

        assert!(app.unmount());
        assert!(!app.unmount());
        assert_eq!(*log.borrow(), vec!["a run", "a cleanup"]);
        assert!(app.container().parent().is_none());
        assert!(window.registry().is_empty());
        assert_eq!(app.rerender(), RerenderOutcome::Unmounted);
    }
}
