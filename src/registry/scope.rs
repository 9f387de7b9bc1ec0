//! The "current instance" pointer hooks use to find their slots.

use std::cell::RefCell;
use std::rc::Rc;

use super::Instance;
use crate::error::{EngineError, Result};

thread_local! {
    static CURRENT: RefCell<Option<Rc<Instance>>> = const { RefCell::new(None) };
}

/// The instance whose render function is executing right now.
pub fn current_instance(hook: &'static str) -> Result<Rc<Instance>> {
    CURRENT
        .with(|slot| slot.borrow().clone())
        .ok_or(EngineError::NoActiveComponent { hook })
}

pub fn has_current_instance() -> bool {
    CURRENT.with(|slot| slot.borrow().is_some())
}

/// Marks `instance` as rendering and current for the guard's lifetime. Drop
/// restores the previous pointer and clears `is_rendering`, panics included.
pub(crate) struct RenderScope {
    instance: Rc<Instance>,
    previous: Option<Rc<Instance>>,
}

impl RenderScope {
    pub(crate) fn enter(instance: &Rc<Instance>) -> Self {
        instance.record.borrow_mut().begin_pass();
        let previous = CURRENT.with(|slot| slot.replace(Some(Rc::clone(instance))));
        Self {
            instance: Rc::clone(instance),
            previous,
        }
    }
}

impl Drop for RenderScope {
    fn drop(&mut self) {
        if let Ok(mut record) = self.instance.record.try_borrow_mut() {
            record.is_rendering = false;
        }
        let previous = self.previous.take();
        CURRENT.with(|slot| *slot.borrow_mut() = previous);
    }
}
