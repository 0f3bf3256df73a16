//! Collects values handed to continuations.

use std::cell::RefCell;
use std::rc::Rc;

/// Shared, single-threaded log of everything a continuation received.
///
/// Clones share the same log, so one clone can move into a continuation while
/// the test inspects another.
#[derive(Debug)]
pub struct Recorder<T> {
    items: Rc<RefCell<Vec<T>>>,
}

impl<T> Clone for Recorder<T> {
    fn clone(&self) -> Self {
        Self {
            items: Rc::clone(&self.items),
        }
    }
}

impl<T> Default for Recorder<T> {
    fn default() -> Self {
        Self {
            items: Rc::new(RefCell::new(Vec::new())),
        }
    }
}

impl<T: 'static> Recorder<T> {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn push(&self, item: T) {
        self.items.borrow_mut().push(item);
    }

    /// A repeatable continuation that records every value.
    pub fn sink(&self) -> impl FnMut(T) + 'static {
        let recorder = self.clone();
        move |item| recorder.push(item)
    }

    /// A one-shot continuation that records its value.
    pub fn once_sink(&self) -> impl FnOnce(T) + 'static {
        let recorder = self.clone();
        move |item| recorder.push(item)
    }

    pub fn len(&self) -> usize {
        self.items.borrow().len()
    }

    pub fn is_empty(&self) -> bool {
        self.items.borrow().is_empty()
    }

    /// Remove and return everything recorded so far.
    pub fn take(&self) -> Vec<T> {
        std::mem::take(&mut *self.items.borrow_mut())
    }
}

impl<T: Clone + 'static> Recorder<T> {
    pub fn items(&self) -> Vec<T> {
        self.items.borrow().clone()
    }
}
