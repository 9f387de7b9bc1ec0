use std::any::{Any, TypeId};
use std::cell::RefCell;
use std::collections::HashMap;
use std::rc::Rc;

use thiserror::Error;

/// Per-window resource map keyed by [`TypeId`]; each type appears at most
/// once. Clones share the same map.
#[derive(Clone, Default)]
pub struct SharedState {
    inner: Rc<RefCell<HashMap<TypeId, Rc<dyn Any>>>>,
}

impl SharedState {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn insert<T: 'static>(&self, value: T) -> Result<Rc<T>, SharedStateError> {
        let mut guard = self
            .inner
            .try_borrow_mut()
            .map_err(|_| SharedStateError::Busy)?;
        let type_id = TypeId::of::<T>();
        if guard.contains_key(&type_id) {
            return Err(SharedStateError::AlreadyExists);
        }
        let value = Rc::new(value);
        guard.insert(type_id, value.clone());
        Ok(value)
    }

    pub fn get<T: 'static>(&self) -> Result<Rc<T>, SharedStateError> {
        let guard = self
            .inner
            .try_borrow()
            .map_err(|_| SharedStateError::Busy)?;
        let entry = guard
            .get(&TypeId::of::<T>())
            .cloned()
            .ok_or(SharedStateError::Missing)?;
        entry
            .downcast::<T>()
            .map_err(|_| SharedStateError::TypeMismatch)
    }

    pub fn contains<T: 'static>(&self) -> bool {
        self.inner
            .try_borrow()
            .map(|guard| guard.contains_key(&TypeId::of::<T>()))
            .unwrap_or(false)
    }

    /// `make` runs without the map borrowed, so it may use the map itself.
    pub fn get_or_insert_with<T, F>(&self, make: F) -> Result<Rc<T>, SharedStateError>
    where
        T: 'static,
        F: FnOnce() -> T,
    {
        match self.get::<T>() {
            Ok(value) => return Ok(value),
            Err(SharedStateError::Missing) => {}
            Err(other) => return Err(other),
        }
        let value: Rc<dyn Any> = Rc::new(make());
        let mut guard = self
            .inner
            .try_borrow_mut()
            .map_err(|_| SharedStateError::Busy)?;
        let stored = guard.entry(TypeId::of::<T>()).or_insert(value).clone();
        stored
            .downcast::<T>()
            .map_err(|_| SharedStateError::TypeMismatch)
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum SharedStateError {
    #[error("resource already exists")]
    AlreadyExists,
    #[error("resource missing")]
    Missing,
    #[error("resource type mismatch")]
    TypeMismatch,
    #[error("shared state is borrowed")]
    Busy,
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::cell::Cell;

    #[derive(Debug)]
    struct Thing(u32);

    #[test]
    fn duplicate_insert_fails() {
        let state = SharedState::new();
        state.insert(Thing(1)).unwrap();
        let err = state.insert(Thing(2)).unwrap_err();
        assert_eq!(err, SharedStateError::AlreadyExists);
        assert_eq!(state.get::<Thing>().unwrap().0, 1);
    }

    #[test]
    fn get_missing() {
        let state = SharedState::new();
        assert_eq!(state.get::<Thing>().unwrap_err(), SharedStateError::Missing);
        assert!(!state.contains::<Thing>());
    }

    #[test]
    fn lazy_init_runs_once() {
        let state = SharedState::new();
        let calls = Cell::new(0);
        let first = state
            .get_or_insert_with(|| {
                calls.set(calls.get() + 1);
                Thing(9)
            })
            .unwrap();
        let second = state
            .get_or_insert_with(|| {
                calls.set(calls.get() + 1);
                Thing(10)
            })
            .unwrap();

        assert!(Rc::ptr_eq(&first, &second));
        assert_eq!(second.0, 9);
        assert_eq!(calls.get(), 1);
    }
}
