//! `use_state` / `use_effect`: positional slots on the rendering instance.
//!
//! Both hooks address the slot under the instance's cursor and advance it by
//! one, so the n-th call of every pass lands on slot n. Misuse is reported to
//! the diagnostics channel and the hook degrades instead of failing.

use std::any::Any;
use std::fmt;
use std::marker::PhantomData;
use std::rc::{Rc, Weak};

use serde_json::json;

use crate::error::EngineError;
use crate::logging::{LogLevel, RUNTIME_TARGET, json_kv};
use crate::registry::{EffectRecord, Instance, current_instance};
use crate::runtime;
use crate::window::{self, Window};

/// Teardown returned by an effect; runs before the effect's next run and on
/// unmount.
pub type Cleanup = Box<dyn FnOnce()>;

pub(crate) type EffectFn = Box<dyn FnOnce() -> Option<Cleanup>>;

/// Wraps `f` as an effect's return value.
pub fn cleanup(f: impl FnOnce() + 'static) -> Option<Cleanup> {
    Some(Box::new(f))
}

trait DepValue: Any {
    fn same(&self, other: &dyn DepValue) -> bool;
    fn as_any(&self) -> &dyn Any;
}

impl<T: PartialEq + 'static> DepValue for T {
    fn same(&self, other: &dyn DepValue) -> bool {
        other
            .as_any()
            .downcast_ref::<T>()
            .is_some_and(|other| self == other)
    }

    fn as_any(&self) -> &dyn Any {
        self
    }
}

/// Compares by pointer, never by contents.
struct ByRef<T>(Rc<T>);

impl<T> PartialEq for ByRef<T> {
    fn eq(&self, other: &Self) -> bool {
        Rc::ptr_eq(&self.0, &other.0)
    }
}

/// One entry of an effect dependency list. Values of different types never
/// compare equal.
pub struct Dep(Box<dyn DepValue>);

impl Dep {
    pub fn new<T: PartialEq + 'static>(value: T) -> Self {
        Dep(Box::new(value))
    }

    /// Identity dependency: unchanged only while it is the same allocation.
    pub fn by_ref<T: 'static>(value: Rc<T>) -> Self {
        Dep::new(ByRef(value))
    }

    pub fn same(&self, other: &Dep) -> bool {
        self.0.same(other.0.as_ref())
    }
}

impl fmt::Debug for Dep {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str("Dep")
    }
}

/// `deps![a, b]` is `Some(vec![Dep::new(a), Dep::new(b)])`; `deps![]` is an
/// empty list (run once). Pass `None` to run after every render.
#[macro_export]
macro_rules! deps {
    () => {
        ::std::option::Option::Some(::std::vec::Vec::<$crate::hooks::Dep>::new())
    };
    ($($dep:expr),+ $(,)?) => {
        ::std::option::Option::Some(::std::vec![$($crate::hooks::Dep::new($dep)),+])
    };
}

/// Whether an effect with `next` deps must run given the previous pass's deps.
pub(crate) fn deps_changed(previous: Option<&[Dep]>, next: Option<&[Dep]>) -> bool {
    let Some(next) = next else {
        return true;
    };
    next.iter().enumerate().any(|(idx, dep)| {
        previous
            .and_then(|previous| previous.get(idx))
            .is_none_or(|previous| !dep.same(previous))
    })
}

fn report_outside_component(error: EngineError) {
    if let Some(window) = window::current() {
        window.report(error);
    }
}

/// Returns the slot's current value and a setter bound to it. Outside a
/// render pass this reports `NoActiveComponent` and hands back `initial` with
/// an inert setter.
pub fn use_state<T: Clone + 'static>(initial: T) -> (T, Setter<T>) {
    let instance = match current_instance("use_state") {
        Ok(instance) => instance,
        Err(error) => {
            report_outside_component(error);
            return (initial, Setter::detached());
        }
    };

    let (value, slot, realigned) = {
        let mut record = instance.record.borrow_mut();
        let slot = record.next_state_slot();
        let existing = record
            .state_slots
            .get(slot)
            .map(|stored| stored.downcast_ref::<T>().cloned());
        match existing {
            Some(Some(value)) => (value, slot, false),
            Some(None) => {
                record.state_slots[slot] = Box::new(initial.clone());
                (initial, slot, true)
            }
            None => {
                record.state_slots.push(Box::new(initial.clone()));
                (initial, slot, false)
            }
        }
    };

    if realigned {
        if let Some(window) = instance.window() {
            window.log(
                LogLevel::Warn,
                RUNTIME_TARGET,
                "state_slot_reset",
                [
                    json_kv("component", instance.name()),
                    json_kv("slot", json!(slot)),
                ],
            );
        }
    }

    let setter = Setter {
        instance: Rc::downgrade(&instance),
        slot,
        _value: PhantomData,
    };
    (value, setter)
}

/// Writes one state slot and schedules a re-render of its instance.
pub struct Setter<T> {
    instance: Weak<Instance>,
    slot: usize,
    _value: PhantomData<fn(T)>,
}

impl<T> Clone for Setter<T> {
    fn clone(&self) -> Self {
        Self {
            instance: Weak::clone(&self.instance),
            slot: self.slot,
            _value: PhantomData,
        }
    }
}

impl<T> fmt::Debug for Setter<T> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Setter")
            .field("slot", &self.slot)
            .field("live", &self.is_live())
            .finish()
    }
}

impl<T: Clone + 'static> Setter<T> {
    fn detached() -> Self {
        Self {
            instance: Weak::new(),
            slot: 0,
            _value: PhantomData,
        }
    }

    pub fn set(&self, value: T) {
        self.write(|_| Some(value));
    }

    /// Computes the next value from the current one.
    pub fn update(&self, next: impl FnOnce(&T) -> T) {
        self.write(|current| current.map(|current| next(&current)));
    }

    fn write(&self, next: impl FnOnce(Option<T>) -> Option<T>) {
        let Some(instance) = self.live_instance() else {
            return;
        };

        if instance.record.borrow().is_rendering {
            if let Some(window) = instance.window() {
                window.report(EngineError::SetStateDuringRender {
                    component: instance.name().to_string(),
                });
            }
        }

        let current = instance
            .record
            .borrow()
            .state_slots
            .get(self.slot)
            .and_then(|stored| stored.downcast_ref::<T>())
            .cloned();
        let Some(value) = next(current) else {
            return;
        };
        {
            let mut record = instance.record.borrow_mut();
            match record.state_slots.get_mut(self.slot) {
                Some(stored) => *stored = Box::new(value),
                None => return,
            }
        }

        runtime::rerender(&instance);
    }
}

impl<T> Setter<T> {
    pub(crate) fn slot(&self) -> usize {
        self.slot
    }

    /// False once the owning instance has been unmounted (or never existed).
    pub fn is_live(&self) -> bool {
        self.live_instance().is_some()
    }

    fn live_instance(&self) -> Option<Rc<Instance>> {
        self.instance
            .upgrade()
            .filter(|instance| instance.is_mounted())
    }
}

/// Registers an effect for the current slot. It runs in the flush after the
/// render commits, and again after any later pass whose `deps` differ.
pub fn use_effect<F>(callback: F, deps: Option<Vec<Dep>>)
where
    F: FnOnce() -> Option<Cleanup> + 'static,
{
    let instance = match current_instance("use_effect") {
        Ok(instance) => instance,
        Err(error) => {
            report_outside_component(error);
            return;
        }
    };

    let mut record = instance.record.borrow_mut();
    let slot = record.next_effect_slot();
    match record.effect_slots.get_mut(slot) {
        Some(previous) => {
            let changed = deps_changed(previous.deps.as_deref(), deps.as_deref());
            previous.callback = Some(Box::new(callback));
            previous.deps = deps;
            previous.run_pending = previous.run_pending || changed;
        }
        None => record.effect_slots.push(EffectRecord {
            callback: Some(Box::new(callback)),
            deps,
            cleanup: None,
            run_pending: true,
        }),
    }
}

/// The window hosting the component that is rendering right now.
pub fn use_window() -> Option<Window> {
    current_instance("use_window")
        .ok()
        .and_then(|instance| instance.window())
}
