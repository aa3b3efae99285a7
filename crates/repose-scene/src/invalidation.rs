//! Redraw coalescing.
//!
//! Everything that can make the next frame differ (a state write, a queued
//! command, a woken task, a frame waiter, a dirty owner) ends in
//! [`RedrawSignal::request`]. The host callback fires once per render: the
//! flag is cleared when `render` starts and set again by the first request
//! after that.
//!
//! While the scene is inside one of its own entry points (`render`,
//! `send_pointer_event`, `send_key_event`) requests are postponed and the
//! scene checks once, on the way out, whether a redraw is needed.

use std::cell::Cell;
use std::sync::Arc;
use std::sync::atomic::{AtomicBool, Ordering};

struct SignalInner {
    requested: AtomicBool,
    postponing: AtomicBool,
    postponed: AtomicBool,
    on_redraw: Box<dyn Fn() + Send + Sync>,
}

impl SignalInner {
    fn fire(&self) {
        if !self.requested.swap(true, Ordering::AcqRel) {
            (self.on_redraw)();
        }
    }

    fn request(&self) {
        if self.postponing.load(Ordering::Acquire) {
            self.postponed.store(true, Ordering::Release);
            // The scene may have stopped postponing in between; if it did,
            // whoever clears `postponed` first fires.
            if self.postponing.load(Ordering::Acquire) || !self.postponed.swap(false, Ordering::AcqRel)
            {
                return;
            }
        }
        self.fire();
    }
}

/// Cloneable, `Send` handle to the host redraw callback.
#[derive(Clone)]
pub struct RedrawSignal {
    inner: Arc<SignalInner>,
}

impl RedrawSignal {
    pub fn new(on_redraw: impl Fn() + Send + Sync + 'static) -> Self {
        Self {
            inner: Arc::new(SignalInner {
                requested: AtomicBool::new(false),
                postponing: AtomicBool::new(false),
                postponed: AtomicBool::new(false),
                on_redraw: Box::new(on_redraw),
            }),
        }
    }

    /// Asks the host for a redraw; a no-op if one is already outstanding.
    pub fn request(&self) {
        self.inner.request();
    }

    /// Marks the outstanding request as served.
    pub fn reset(&self) {
        self.inner.requested.store(false, Ordering::Release);
    }

    pub fn is_requested(&self) -> bool {
        self.inner.requested.load(Ordering::Acquire) || self.inner.postponed.load(Ordering::Acquire)
    }

    pub fn watcher(&self) -> InvalidationWatcher {
        InvalidationWatcher {
            inner: self.inner.clone(),
        }
    }
}

/// Read-only view of a [`RedrawSignal`], pollable from any thread.
#[derive(Clone)]
pub struct InvalidationWatcher {
    inner: Arc<SignalInner>,
}

impl InvalidationWatcher {
    /// Whether a redraw was requested and not yet served by `render`.
    pub fn has_invalidations(&self) -> bool {
        self.inner.requested.load(Ordering::Acquire) || self.inner.postponed.load(Ordering::Acquire)
    }
}

/// Scene-thread front of a [`RedrawSignal`] that knows how deeply the scene
/// is nested in its own entry points.
pub struct Invalidator {
    signal: RedrawSignal,
    depth: Cell<u32>,
}

impl Invalidator {
    pub fn new(signal: RedrawSignal) -> Self {
        Self {
            signal,
            depth: Cell::new(0),
        }
    }

    pub fn signal(&self) -> &RedrawSignal {
        &self.signal
    }

    pub fn request(&self) {
        self.signal.request();
    }

    pub fn is_postponing(&self) -> bool {
        self.depth.get() > 0
    }

    /// Postpones requests until the returned guard and every guard taken
    /// while it is alive are dropped. Restored on unwind.
    pub fn postpone(&self) -> Postpone<'_> {
        let depth = self.depth.get();
        if depth == 0 {
            self.signal.inner.postponing.store(true, Ordering::Release);
        }
        self.depth.set(depth + 1);
        Postpone { owner: self }
    }
}

pub struct Postpone<'a> {
    owner: &'a Invalidator,
}

impl Drop for Postpone<'_> {
    fn drop(&mut self) {
        let depth = self.owner.depth.get() - 1;
        self.owner.depth.set(depth);
        if depth > 0 {
            return;
        }
        let inner = &self.owner.signal.inner;
        inner.postponing.store(false, Ordering::Release);
        if inner.postponed.swap(false, Ordering::AcqRel) {
            inner.fire();
        }
    }
}
