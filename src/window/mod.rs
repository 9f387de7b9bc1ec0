//! Page-level host: document, location/history, event loop and clock.
//!
//! Every callback the host runs (node listeners, window listeners,
//! microtasks, animation frames) goes through [`Window::guarded`], which turns
//! an escaping panic into a `Runtime error` diagnostic instead of unwinding
//! through the loop.

use std::any::Any;
use std::cell::{Cell, RefCell};
use std::collections::VecDeque;
use std::fmt::Display;
use std::panic::{self, AssertUnwindSafe};
use std::rc::{Rc, Weak};
use std::sync::Once;
use std::time::Duration;

use serde_json::Value;

mod clock;
mod shared_state;

pub use clock::Clock;
pub use shared_state::{SharedState, SharedStateError};

use crate::dom::{Document, Node};
use crate::error::EngineError;
use crate::logging::{LogLevel, event_with_fields};
use crate::metrics::RuntimeMetrics;
use crate::registry::ComponentRegistry;
use crate::runtime::audit::RuntimeAuditEvent;
use crate::runtime::{RuntimeConfig, diagnostics};

type Task = Box<dyn FnOnce()>;

pub type WindowListener = Rc<dyn Fn(&Window)>;

thread_local! {
    /// The page this thread is driving; the equivalent of the global `window`.
    static CURRENT_WINDOW: RefCell<Weak<WindowInner>> = const { RefCell::new(Weak::new()) };
    /// Nesting depth of [`Window::guarded`] on this thread.
    static GUARD_DEPTH: Cell<u32> = const { Cell::new(0) };
    static CONTAINED_PANICS: Cell<usize> = const { Cell::new(0) };
}

static QUIET_PANIC_HOOK: Once = Once::new();

/// Chains a panic hook that stays silent while a guarded callback runs on the
/// panicking thread. Other panics reach the previously installed hook.
fn install_quiet_panic_hook() {
    QUIET_PANIC_HOOK.call_once(|| {
        let previous = panic::take_hook();
        panic::set_hook(Box::new(move |info| {
            if GUARD_DEPTH.try_with(Cell::get).unwrap_or(0) > 0 {
                let _ = CONTAINED_PANICS.try_with(|count| count.set(count.get() + 1));
            } else {
                previous(info);
            }
        }));
    });
}

/// Panics this thread has contained inside guarded callbacks. They reach the
/// console only through the diagnostics channel.
pub fn contained_panics() -> usize {
    CONTAINED_PANICS.with(Cell::get)
}

/// Returns the window most recently opened (or installed) on this thread.
pub fn current() -> Option<Window> {
    CURRENT_WINDOW.with(|slot| slot.borrow().upgrade().map(|inner| Window { inner }))
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Location {
    pub hostname: String,
    pub pathname: String,
}

impl Location {
    /// Accepts `scheme://host[:port]/path` or a bare path.
    pub fn parse(url: &str) -> Self {
        let rest = match url.split_once("://") {
            Some((_, rest)) => rest,
            None => {
                return Self {
                    hostname: String::new(),
                    pathname: normalize_path(url),
                };
            }
        };
        let (authority, path) = match rest.find('/') {
            Some(idx) => (&rest[..idx], &rest[idx..]),
            None => (rest, "/"),
        };
        let hostname = authority.split(':').next().unwrap_or_default().to_string();
        Self {
            hostname,
            pathname: normalize_path(path),
        }
    }
}

fn normalize_path(path: &str) -> String {
    let path = path.split(['?', '#']).next().unwrap_or_default();
    if path.starts_with('/') {
        path.to_string()
    } else {
        format!("/{path}")
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum WindowEventKind {
    PopState,
}

#[derive(Debug)]
struct History {
    entries: Vec<String>,
    index: usize,
}

impl History {
    fn new(initial: String) -> Self {
        Self {
            entries: vec![initial],
            index: 0,
        }
    }

    fn push(&mut self, path: String) {
        self.entries.truncate(self.index + 1);
        self.entries.push(path);
        self.index = self.entries.len() - 1;
    }

    fn step(&mut self, delta: isize) -> Option<String> {
        let target = self.index.checked_add_signed(delta)?;
        let path = self.entries.get(target)?.clone();
        self.index = target;
        Some(path)
    }
}

/// Construction parameters for a [`Window`].
#[derive(Clone)]
pub struct WindowOptions {
    pub url: String,
    pub config: RuntimeConfig,
    pub clock: Clock,
    pub inner_width: u32,
    /// When false the document starts without `body`, so mounting has to wait.
    pub attach_body: bool,
}

impl Default for WindowOptions {
    fn default() -> Self {
        Self {
            url: "http://localhost:5173/".to_string(),
            config: RuntimeConfig::default(),
            clock: Clock::system(),
            inner_width: 1280,
            attach_body: true,
        }
    }
}

impl WindowOptions {
    pub fn with_url(mut self, url: impl Into<String>) -> Self {
        self.url = url.into();
        self
    }

    pub fn with_config(mut self, config: RuntimeConfig) -> Self {
        self.config = config;
        self
    }

    pub fn with_clock(mut self, clock: Clock) -> Self {
        self.clock = clock;
        self
    }

    pub fn with_inner_width(mut self, width: u32) -> Self {
        self.inner_width = width;
        self
    }

    pub fn without_body(mut self) -> Self {
        self.attach_body = false;
        self
    }
}

struct WindowInner {
    document: Document,
    location: RefCell<Location>,
    history: RefCell<History>,
    listeners: RefCell<Vec<(WindowEventKind, WindowListener)>>,
    microtasks: RefCell<VecDeque<Task>>,
    frames: RefCell<Vec<Task>>,
    task_depth: Cell<u32>,
    draining: Cell<bool>,
    clock: Clock,
    inner_width: Cell<u32>,
    config: RuntimeConfig,
    registry: ComponentRegistry,
    shared: SharedState,
    reports: RefCell<Vec<EngineError>>,
}

/// Shared handle to the page. Clones refer to the same window.
#[derive(Clone)]
pub struct Window {
    inner: Rc<WindowInner>,
}

/// Non-owning window handle for closures stored inside the page itself.
#[derive(Clone, Default)]
pub struct WeakWindow(Weak<WindowInner>);

impl WeakWindow {
    pub fn upgrade(&self) -> Option<Window> {
        self.0.upgrade().map(|inner| Window { inner })
    }
}

impl Window {
    /// Opens a page at `url` with a body and the default configuration.
    pub fn open(url: &str) -> Self {
        Self::new(WindowOptions::default().with_url(url))
    }

    pub fn new(options: WindowOptions) -> Self {
        let location = Location::parse(&options.url);
        let document = if options.attach_body {
            Document::with_body()
        } else {
            Document::new()
        };
        let window = Self {
            inner: Rc::new(WindowInner {
                document,
                history: RefCell::new(History::new(location.pathname.clone())),
                location: RefCell::new(location),
                listeners: RefCell::new(Vec::new()),
                microtasks: RefCell::new(VecDeque::new()),
                frames: RefCell::new(Vec::new()),
                task_depth: Cell::new(0),
                draining: Cell::new(false),
                clock: options.clock,
                inner_width: Cell::new(options.inner_width),
                config: options.config,
                registry: ComponentRegistry::new(),
                shared: SharedState::new(),
                reports: RefCell::new(Vec::new()),
            }),
        };
        window.install();
        window
    }

    /// Makes this the thread's current window.
    pub fn install(&self) {
        CURRENT_WINDOW.with(|slot| *slot.borrow_mut() = Rc::downgrade(&self.inner));
    }

    pub fn downgrade(&self) -> WeakWindow {
        WeakWindow(Rc::downgrade(&self.inner))
    }

    pub fn document(&self) -> &Document {
        &self.inner.document
    }

    pub fn location(&self) -> Location {
        self.inner.location.borrow().clone()
    }

    pub fn pathname(&self) -> String {
        self.inner.location.borrow().pathname.clone()
    }

    pub fn config(&self) -> &RuntimeConfig {
        &self.inner.config
    }

    pub fn clock(&self) -> &Clock {
        &self.inner.clock
    }

    pub fn now(&self) -> Duration {
        self.inner.clock.now()
    }

    pub fn inner_width(&self) -> u32 {
        self.inner.inner_width.get()
    }

    pub fn set_inner_width(&self, width: u32) {
        self.inner.inner_width.set(width);
    }

    pub fn shared(&self) -> &SharedState {
        &self.inner.shared
    }

    pub(crate) fn registry(&self) -> &ComponentRegistry {
        &self.inner.registry
    }

    pub fn add_event_listener(&self, kind: WindowEventKind, listener: impl Fn(&Window) + 'static) {
        self.inner
            .listeners
            .borrow_mut()
            .push((kind, Rc::new(listener)));
    }

    pub fn listener_count(&self, kind: WindowEventKind) -> usize {
        self.inner
            .listeners
            .borrow()
            .iter()
            .filter(|(registered, _)| *registered == kind)
            .count()
    }

    /// Fires a window-level event as a host task.
    pub fn dispatch_window_event(&self, kind: WindowEventKind) {
        let listeners: Vec<WindowListener> = self
            .inner
            .listeners
            .borrow()
            .iter()
            .filter(|(registered, _)| *registered == kind)
            .map(|(_, listener)| Rc::clone(listener))
            .collect();
        self.run_task(|| {
            for listener in listeners {
                self.guarded(|| listener(self));
            }
        });
    }

    /// Adds a history entry and updates the location without firing `popstate`.
    pub fn push_state(&self, path: &str) {
        let path = normalize_path(path);
        self.inner.history.borrow_mut().push(path.clone());
        self.inner.location.borrow_mut().pathname = path;
    }

    /// `pushState` followed by a synthetic `popstate`, so programmatic and
    /// back/forward navigation share one code path.
    pub fn navigate(&self, to: &str) {
        self.log(
            LogLevel::Debug,
            crate::logging::ROUTER_TARGET,
            "navigate",
            [crate::logging::json_kv("to", to)],
        );
        self.push_state(to);
        self.dispatch_window_event(WindowEventKind::PopState);
    }

    pub fn back(&self) -> bool {
        self.traverse(-1)
    }

    pub fn forward(&self) -> bool {
        self.traverse(1)
    }

    fn traverse(&self, delta: isize) -> bool {
        let Some(path) = self.inner.history.borrow_mut().step(delta) else {
            return false;
        };
        self.inner.location.borrow_mut().pathname = path;
        self.dispatch_window_event(WindowEventKind::PopState);
        true
    }

    pub fn history_len(&self) -> usize {
        self.inner.history.borrow().entries.len()
    }

    /// Dispatches a node event as a host task and returns the listener count.
    pub fn dispatch_event(&self, node: &Node, event_type: &str) -> usize {
        let mut invoked = 0;
        self.run_task(|| invoked = node.dispatch_event(event_type));
        invoked
    }

    pub fn queue_microtask(&self, task: impl FnOnce() + 'static) {
        self.inner.microtasks.borrow_mut().push_back(Box::new(task));
    }

    /// Queues a fallible job; an `Err` nobody handled becomes an
    /// `Unhandled promise rejection` diagnostic.
    pub fn spawn_fallible<E>(&self, job: impl FnOnce() -> std::result::Result<(), E> + 'static)
    where
        E: Display,
    {
        let window = self.downgrade();
        self.queue_microtask(move || {
            if let Err(reason) = job() {
                if let Some(window) = window.upgrade() {
                    window.report(EngineError::UnhandledRejection {
                        reason: reason.to_string(),
                    });
                }
            }
        });
    }

    pub fn pending_microtasks(&self) -> usize {
        self.inner.microtasks.borrow().len()
    }

    /// Drains the microtask queue, including tasks queued while draining.
    pub fn run_microtasks(&self) -> usize {
        if self.inner.draining.replace(true) {
            return 0;
        }
        let mut ran = 0;
        loop {
            let next = self.inner.microtasks.borrow_mut().pop_front();
            let Some(task) = next else { break };
            self.guarded(task);
            ran += 1;
        }
        self.inner.draining.set(false);
        ran
    }

    pub fn request_animation_frame(&self, callback: impl FnOnce() + 'static) {
        self.inner.frames.borrow_mut().push(Box::new(callback));
    }

    pub fn pending_frames(&self) -> usize {
        self.inner.frames.borrow().len()
    }

    /// Runs the callbacks queued before this frame; callbacks they queue wait
    /// for the next tick.
    pub fn tick_frame(&self) -> usize {
        let callbacks = std::mem::take(&mut *self.inner.frames.borrow_mut());
        let count = callbacks.len();
        self.run_task(|| {
            for callback in callbacks {
                self.guarded(callback);
            }
        });
        count
    }

    /// Funnels an engine error into the diagnostics channel.
    pub fn report(&self, error: EngineError) {
        diagnostics::report(self, error);
    }

    /// Reports emitted so far (suppressed reports are not kept).
    pub fn diagnostics(&self) -> Vec<EngineError> {
        self.inner.reports.borrow().clone()
    }

    pub(crate) fn push_report(&self, error: EngineError) {
        self.inner.reports.borrow_mut().push(error);
    }

    /// Runs `f`, converting an escaping panic into a runtime diagnostic.
    pub fn guarded(&self, f: impl FnOnce()) -> bool {
        install_quiet_panic_hook();
        GUARD_DEPTH.with(|depth| depth.set(depth.get() + 1));
        let outcome = panic::catch_unwind(AssertUnwindSafe(f));
        GUARD_DEPTH.with(|depth| depth.set(depth.get() - 1));
        match outcome {
            Ok(()) => true,
            Err(payload) => {
                self.report(EngineError::Runtime {
                    message: panic_message(payload.as_ref()),
                });
                false
            }
        }
    }

    /// Runs `task` as one host task. At the outermost depth a microtask
    /// checkpoint follows, so effects queued by the task have run on return.
    pub fn run_task(&self, task: impl FnOnce()) {
        let depth = self.inner.task_depth.get();
        self.inner.task_depth.set(depth + 1);
        self.guarded(task);
        self.inner.task_depth.set(depth);
        if depth == 0 {
            self.run_microtasks();
        }
    }

    pub(crate) fn log<I>(&self, level: LogLevel, target: &str, message: &str, fields: I)
    where
        I: IntoIterator<Item = (String, Value)>,
    {
        if let Some(logger) = self.inner.config.logger.as_ref() {
            let _ = logger.log_event(event_with_fields(level, target, message, fields));
        }
    }

    pub(crate) fn with_metrics(&self, record: impl FnOnce(&mut RuntimeMetrics)) {
        if let Some(metrics) = self.inner.config.metrics.as_ref() {
            if let Ok(mut guard) = metrics.lock() {
                record(&mut guard);
            }
        }
    }

    pub(crate) fn audit(&self, event: RuntimeAuditEvent) {
        if let Some(audit) = self.inner.config.audit.as_ref() {
            audit.record(event);
        }
    }
}

impl std::fmt::Debug for Window {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Window")
            .field("location", &*self.inner.location.borrow())
            .field("pending_microtasks", &self.pending_microtasks())
            .field("pending_frames", &self.pending_frames())
            .finish_non_exhaustive()
    }
}

fn panic_message(payload: &(dyn Any + Send)) -> String {
    if let Some(message) = payload.downcast_ref::<&str>() {
        (*message).to_string()
    } else if let Some(message) = payload.downcast_ref::<String>() {
        message.clone()
    } else {
        "unknown panic payload".to_string()
    }
}
