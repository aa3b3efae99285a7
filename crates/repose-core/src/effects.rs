use std::cell::{Cell, RefCell};
use std::rc::Rc;

/// Cleanup callback that runs at most once, however many clones call it.
#[derive(Clone)]
pub struct Dispose(Rc<Cell<Option<Box<dyn FnOnce()>>>>);

impl Dispose {
    pub fn new(f: impl FnOnce() + 'static) -> Self {
        Self(Rc::new(Cell::new(Some(Box::new(f)))))
    }

    /// A guard with nothing to clean up.
    pub fn noop() -> Self {
        Self(Rc::new(Cell::new(None)))
    }

    pub fn run(&self) {
        if let Some(f) = self.0.take() {
            f()
        }
    }

    pub fn is_disposed(&self) -> bool {
        // Take and put back: Cell has no borrow-free peek for non-Copy values.
        let f = self.0.take();
        let done = f.is_none();
        self.0.set(f);
        done
    }
}

/// Ordered set of cleanups for one owner. Disposal runs them last-in,
/// first-out; anything added after disposal runs immediately.
#[derive(Default)]
pub struct DisposeBag {
    items: RefCell<Vec<Dispose>>,
    disposed: Cell<bool>,
}

impl DisposeBag {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn add(&self, d: Dispose) {
        if self.disposed.get() {
            d.run();
        } else {
            self.items.borrow_mut().push(d);
        }
    }

    pub fn add_fn(&self, f: impl FnOnce() + 'static) {
        self.add(Dispose::new(f));
    }

    pub fn len(&self) -> usize {
        self.items.borrow().len()
    }

    pub fn is_empty(&self) -> bool {
        self.items.borrow().is_empty()
    }

    pub fn is_disposed(&self) -> bool {
        self.disposed.get()
    }

    pub fn dispose(&self) {
        if self.disposed.replace(true) {
            return;
        }
        // Cleanups may add more cleanups; those run immediately.
        let items = std::mem::take(&mut *self.items.borrow_mut());
        for d in items.into_iter().rev() {
            d.run();
        }
    }
}
