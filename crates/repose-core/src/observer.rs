//! # Observable state
//!
//! A scene owns one [`ObserverRegistry`]. Compositions create [`State<T>`]
//! cells through it and register observers that rerun when those cells
//! change. Writes are not published immediately: they are recorded as
//! pending and published in one batch by [`ObserverRegistry::apply_changes`],
//! which the scene calls at the start of every render pass.
//!
//! Two kinds of observers exist:
//!
//! - explicit ones (`observe`) are bound to a fixed state cell;
//! - tracking ones (`observe_reads`) run once immediately and depend on
//!   whatever cells they read, recomputed on every run.
//!
//! ```rust
//! use repose_core::*;
//! use std::cell::Cell;
//! use std::rc::Rc;
//!
//! let registry = ObserverRegistry::new();
//! registry.start();
//! let count = registry.state(0);
//! let seen = Rc::new(Cell::new(0));
//! {
//!     let (count, seen) = (count.clone(), seen.clone());
//!     registry.observe_reads(move || seen.set(count.get()));
//! }
//! count.set(3);
//! assert_eq!(seen.get(), 0);
//! registry.apply_changes();
//! assert_eq!(seen.get(), 3);
//! ```

use std::cell::RefCell;
use std::collections::{HashMap, HashSet};
use std::rc::{Rc, Weak};

pub type StateId = u64;
pub type ObserverId = u64;

struct Observer {
    f: Rc<dyn Fn()>,
    tracks_reads: bool,
}

#[derive(Default)]
struct Registry {
    running: bool,
    next_id: u64,
    observers: HashMap<ObserverId, Observer>,
    // state -> observers that depend on it
    edges: HashMap<StateId, HashSet<ObserverId>>,
    // observer -> states it depends on
    back: HashMap<ObserverId, HashSet<StateId>>,
    pending: Vec<StateId>,
    tracking: Option<ObserverId>,
    on_pending: Option<Rc<dyn Fn()>>,
}

impl Registry {
    fn next_id(&mut self) -> u64 {
        let id = self.next_id;
        self.next_id += 1;
        id
    }

    fn link(&mut self, state: StateId, obs: ObserverId) {
        self.edges.entry(state).or_default().insert(obs);
        self.back.entry(obs).or_default().insert(state);
    }

    fn unlink_all(&mut self, obs: ObserverId) {
        if let Some(states) = self.back.remove(&obs) {
            for s in states {
                if let Some(set) = self.edges.get_mut(&s) {
                    set.remove(&obs);
                }
            }
        }
    }
}

/// Scene-owned handle to the observation system. Clones share the registry.
#[derive(Clone, Default)]
pub struct ObserverRegistry {
    inner: Rc<RefCell<Registry>>,
}

impl ObserverRegistry {
    pub fn new() -> Self {
        Self::default()
    }

    /// Starts recording state changes.
    pub fn start(&self) {
        self.inner.borrow_mut().running = true;
    }

    /// Stops recording and drops every observer and pending change.
    pub fn stop(&self) {
        let mut r = self.inner.borrow_mut();
        r.running = false;
        r.observers.clear();
        r.edges.clear();
        r.back.clear();
        r.pending.clear();
        r.tracking = None;
    }

    pub fn is_running(&self) -> bool {
        self.inner.borrow().running
    }

    /// Called once each time the pending set goes from empty to non-empty.
    pub fn set_on_pending(&self, f: impl Fn() + 'static) {
        self.inner.borrow_mut().on_pending = Some(Rc::new(f));
    }

    pub fn state<T: 'static>(&self, initial: T) -> State<T> {
        let id = self.inner.borrow_mut().next_id();
        State {
            id,
            value: Rc::new(RefCell::new(initial)),
            registry: Rc::downgrade(&self.inner),
        }
    }

    /// Runs `f` whenever `state` changes.
    pub fn observe<T: 'static>(&self, state: &State<T>, f: impl Fn() + 'static) -> ObserverId {
        let mut r = self.inner.borrow_mut();
        let id = r.next_id();
        r.observers.insert(
            id,
            Observer {
                f: Rc::new(f),
                tracks_reads: false,
            },
        );
        r.link(state.id, id);
        id
    }

    /// Runs `f` now and again whenever any state it read during its last run
    /// changes.
    pub fn observe_reads(&self, f: impl Fn() + 'static) -> ObserverId {
        let id = {
            let mut r = self.inner.borrow_mut();
            let id = r.next_id();
            r.observers.insert(
                id,
                Observer {
                    f: Rc::new(f),
                    tracks_reads: true,
                },
            );
            id
        };
        self.run_observer(id);
        id
    }

    pub fn remove_observer(&self, id: ObserverId) {
        let mut r = self.inner.borrow_mut();
        r.observers.remove(&id);
        r.unlink_all(id);
    }

    pub fn observer_count(&self) -> usize {
        self.inner.borrow().observers.len()
    }

    pub fn has_pending_changes(&self) -> bool {
        !self.inner.borrow().pending.is_empty()
    }

    /// Publishes the changes recorded so far. Observers run outside the
    /// registry borrow; writes they make are published by the next call.
    /// Returns how many observers ran.
    pub fn apply_changes(&self) -> usize {
        let to_run: Vec<ObserverId> = {
            let mut r = self.inner.borrow_mut();
            let pending = std::mem::take(&mut r.pending);
            let mut seen = HashSet::new();
            let mut out = Vec::new();
            for state in pending {
                if let Some(obs) = r.edges.get(&state) {
                    let mut ids: Vec<_> = obs.iter().copied().collect();
                    ids.sort_unstable();
                    for id in ids {
                        if seen.insert(id) {
                            out.push(id);
                        }
                    }
                }
            }
            out
        };
        let mut ran = 0;
        for id in to_run {
            if self.run_observer(id) {
                ran += 1;
            }
        }
        ran
    }

    fn run_observer(&self, id: ObserverId) -> bool {
        let (f, tracks) = {
            let mut r = self.inner.borrow_mut();
            let Some(o) = r.observers.get(&id) else {
                return false;
            };
            let f = o.f.clone();
            let tracks = o.tracks_reads;
            if tracks {
                // clear previous deps before recompute
                r.unlink_all(id);
            }
            (f, tracks)
        };
        if !tracks {
            f();
            return true;
        }

        struct Restore<'a> {
            inner: &'a RefCell<Registry>,
            prev: Option<ObserverId>,
        }
        impl Drop for Restore<'_> {
            fn drop(&mut self) {
                self.inner.borrow_mut().tracking = self.prev;
            }
        }
        let prev = self.inner.borrow_mut().tracking.replace(id);
        let _restore = Restore {
            inner: &self.inner,
            prev,
        };
        f();
        true
    }
}

/// Observable value cell created by an [`ObserverRegistry`].
pub struct State<T: 'static> {
    id: StateId,
    value: Rc<RefCell<T>>,
    registry: Weak<RefCell<Registry>>,
}

impl<T: 'static> Clone for State<T> {
    fn clone(&self) -> Self {
        Self {
            id: self.id,
            value: self.value.clone(),
            registry: self.registry.clone(),
        }
    }
}

impl<T: 'static> State<T> {
    pub fn id(&self) -> StateId {
        self.id
    }

    pub fn get(&self) -> T
    where
        T: Clone,
    {
        self.record_read();
        self.value.borrow().clone()
    }

    pub fn with<R>(&self, f: impl FnOnce(&T) -> R) -> R {
        self.record_read();
        f(&self.value.borrow())
    }

    pub fn set(&self, v: T) {
        *self.value.borrow_mut() = v;
        self.record_write();
    }

    pub fn update(&self, f: impl FnOnce(&mut T)) {
        f(&mut self.value.borrow_mut());
        self.record_write();
    }

    fn record_read(&self) {
        let Some(reg) = self.registry.upgrade() else {
            return;
        };
        let mut r = reg.borrow_mut();
        if let Some(obs) = r.tracking {
            r.link(self.id, obs);
        }
    }

    fn record_write(&self) {
        let Some(reg) = self.registry.upgrade() else {
            return;
        };
        let notify = {
            let mut r = reg.borrow_mut();
            if !r.running {
                log::warn!("state {} written while its registry is stopped", self.id);
                return;
            }
            if r.pending.contains(&self.id) {
                None
            } else {
                let was_empty = r.pending.is_empty();
                r.pending.push(self.id);
                if was_empty { r.on_pending.clone() } else { None }
            }
        };
        if let Some(cb) = notify {
            cb();
        }
    }
}

impl<T: std::fmt::Debug + 'static> std::fmt::Debug for State<T> {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("State")
            .field("id", &self.id)
            .field("value", &self.value.borrow())
            .finish()
    }
}
