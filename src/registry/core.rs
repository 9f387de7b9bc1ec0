use std::any::Any;
use std::cell::{Cell, RefCell};
use std::collections::HashMap;
use std::fmt;
use std::rc::Rc;
use std::time::Duration;

use blake3::Hash;

use crate::dom::Node;
use crate::element::Component;
use crate::hooks::{Cleanup, Dep, EffectFn};
use crate::window::{WeakWindow, Window};

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct InstanceId(u64);

impl fmt::Display for InstanceId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "c{}", self.0)
    }
}

/// One `use_effect` slot.
pub(crate) struct EffectRecord {
    pub(crate) callback: Option<EffectFn>,
    pub(crate) deps: Option<Vec<Dep>>,
    pub(crate) cleanup: Option<Cleanup>,
    pub(crate) run_pending: bool,
}

/// Hook storage for one mounted instance. Cursors reset at the start of every
/// render pass; the n-th hook call of a pass addresses slot n.
#[derive(Default)]
pub(crate) struct InstanceRecord {
    pub(crate) state_slots: Vec<Box<dyn Any>>,
    pub(crate) effect_slots: Vec<EffectRecord>,
    pub(crate) state_cursor: usize,
    pub(crate) effect_cursor: usize,
    pub(crate) is_rendering: bool,
    pub(crate) rerender_count: u32,
    pub(crate) last_render_timestamp: Option<Duration>,
    pub(crate) render_count: u64,
    pub(crate) last_commit: Option<Hash>,
}

impl InstanceRecord {
    pub(crate) fn begin_pass(&mut self) {
        self.state_cursor = 0;
        self.effect_cursor = 0;
        self.is_rendering = true;
    }

    pub(crate) fn next_state_slot(&mut self) -> usize {
        let idx = self.state_cursor;
        self.state_cursor += 1;
        idx
    }

    pub(crate) fn next_effect_slot(&mut self) -> usize {
        let idx = self.effect_cursor;
        self.effect_cursor += 1;
        idx
    }

    /// Records a commit and reports whether its markup matches the previous one.
    pub(crate) fn note_commit(&mut self, markup: &str) -> (Hash, bool) {
        let hash = blake3::hash(markup.as_bytes());
        let unchanged = self.last_commit == Some(hash);
        self.last_commit = Some(hash);
        self.render_count += 1;
        (hash, unchanged)
    }
}

/// Read-only view of an instance's bookkeeping.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct InstanceStats {
    pub id: InstanceId,
    pub component: String,
    pub state_slots: usize,
    pub effect_slots: usize,
    pub pending_effects: usize,
    pub rerender_count: u32,
    pub render_count: u64,
    pub mounted: bool,
}

/// Persistent identity of one mounted render function.
pub struct Instance {
    id: InstanceId,
    component: Component,
    container: Node,
    window: WeakWindow,
    mounted: Cell<bool>,
    pub(crate) record: RefCell<InstanceRecord>,
}

impl Instance {
    pub fn id(&self) -> InstanceId {
        self.id
    }

    pub fn component(&self) -> &Component {
        &self.component
    }

    pub fn name(&self) -> &str {
        self.component.name()
    }

    pub fn container(&self) -> &Node {
        &self.container
    }

    pub fn window(&self) -> Option<Window> {
        self.window.upgrade()
    }

    pub fn is_mounted(&self) -> bool {
        self.mounted.get()
    }

    pub(crate) fn set_mounted(&self, mounted: bool) {
        self.mounted.set(mounted);
    }

    pub fn stats(&self) -> InstanceStats {
        let record = self.record.borrow();
        InstanceStats {
            id: self.id,
            component: self.name().to_string(),
            state_slots: record.state_slots.len(),
            effect_slots: record.effect_slots.len(),
            pending_effects: record
                .effect_slots
                .iter()
                .filter(|effect| effect.run_pending)
                .count(),
            rerender_count: record.rerender_count,
            render_count: record.render_count,
            mounted: self.mounted.get(),
        }
    }
}

impl fmt::Debug for Instance {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Instance")
            .field("id", &self.id)
            .field("component", &self.name())
            .field("mounted", &self.mounted.get())
            .finish_non_exhaustive()
    }
}

/// Owns every live instance of a window. Hook call sites and setters only
/// ever hold `Weak` references, so removing an entry ends the instance.
#[derive(Default)]
pub struct ComponentRegistry {
    next_id: Cell<u64>,
    entries: RefCell<HashMap<InstanceId, Rc<Instance>>>,
}

impl ComponentRegistry {
    pub fn new() -> Self {
        Self::default()
    }

    /// Allocates a fresh instance with empty slots and zeroed cursors.
    pub fn create(&self, component: Component, container: Node, window: &Window) -> Rc<Instance> {
        let id = InstanceId(self.next_id.get());
        self.next_id.set(id.0 + 1);
        let instance = Rc::new(Instance {
            id,
            component,
            container,
            window: window.downgrade(),
            mounted: Cell::new(true),
            record: RefCell::new(InstanceRecord::default()),
        });
        self.entries.borrow_mut().insert(id, Rc::clone(&instance));
        instance
    }

    pub fn get(&self, id: InstanceId) -> Option<Rc<Instance>> {
        self.entries.borrow().get(&id).cloned()
    }

    pub fn remove(&self, id: InstanceId) -> Option<Rc<Instance>> {
        self.entries.borrow_mut().remove(&id)
    }

    pub fn len(&self) -> usize {
        self.entries.borrow().len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.borrow().is_empty()
    }
}
