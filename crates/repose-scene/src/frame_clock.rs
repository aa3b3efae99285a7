//! Broadcast frame clock.
//!
//! Work that wants to run "on the next frame" registers a waiter, either a
//! future ([`FrameClock::await_frame`]) or a callback
//! ([`FrameClock::with_frame`]). The render driver calls
//! [`FrameClock::send_frame`] once per tick: the waiter set is swapped out
//! first and every waiter in it is resumed with the same timestamp, so
//! waiters registered while resuming wait for the following frame.

use std::cell::{Cell, RefCell};
use std::future::Future;
use std::pin::Pin;
use std::rc::{Rc, Weak};
use std::task::{Context, Poll, Waker};

use crate::error::SceneError;

type FrameCallback = Box<dyn FnOnce(i64)>;

#[derive(Default)]
struct FrameSlot {
    result: Cell<Option<Result<i64, SceneError>>>,
    waker: RefCell<Option<Waker>>,
}

impl FrameSlot {
    fn resolve(&self, r: Result<i64, SceneError>) {
        self.result.set(Some(r));
        if let Some(w) = self.waker.borrow_mut().take() {
            w.wake();
        }
    }
}

enum Waiter {
    Future { id: u64, slot: Rc<FrameSlot> },
    Callback(FrameCallback),
}

#[derive(Default)]
struct ClockInner {
    waiters: Vec<Waiter>,
    next_id: u64,
    closed: bool,
    last_frame: Option<i64>,
    on_new_awaiters: Option<Rc<dyn Fn()>>,
}

/// Cloneable handle; clones share one waiter set.
#[derive(Clone, Default)]
pub struct FrameClock {
    inner: Rc<RefCell<ClockInner>>,
}

impl FrameClock {
    pub fn new() -> Self {
        Self::default()
    }

    /// Called whenever the waiter set goes from empty to non-empty.
    pub fn set_on_new_awaiters(&self, f: impl Fn() + 'static) {
        self.inner.borrow_mut().on_new_awaiters = Some(Rc::new(f));
    }

    pub fn has_awaiters(&self) -> bool {
        !self.inner.borrow().waiters.is_empty()
    }

    pub fn awaiter_count(&self) -> usize {
        self.inner.borrow().waiters.len()
    }

    /// Timestamp of the last frame sent, if any.
    pub fn last_frame_nanos(&self) -> Option<i64> {
        self.inner.borrow().last_frame
    }

    pub fn is_closed(&self) -> bool {
        self.inner.borrow().closed
    }

    /// Resolves with the timestamp of the next frame. Dropping the future
    /// before then removes it from the waiter set.
    pub fn await_frame(&self) -> FrameFuture {
        FrameFuture {
            clock: Rc::downgrade(&self.inner),
            registered: None,
        }
    }

    /// Runs `f` with the timestamp of the next frame.
    pub fn with_frame(&self, f: impl FnOnce(i64) + 'static) -> Result<(), SceneError> {
        self.push(Waiter::Callback(Box::new(f)))
    }

    fn push(&self, waiter: Waiter) -> Result<(), SceneError> {
        let notify = {
            let mut inner = self.inner.borrow_mut();
            if inner.closed {
                return Err(SceneError::Closed);
            }
            let was_empty = inner.waiters.is_empty();
            inner.waiters.push(waiter);
            if was_empty {
                inner.on_new_awaiters.clone()
            } else {
                None
            }
        };
        if let Some(f) = notify {
            f();
        }
        Ok(())
    }

    /// Resumes every waiter registered so far with `timestamp_nanos`.
    /// Returns how many were resumed; zero is not an error.
    pub fn send_frame(&self, timestamp_nanos: i64) -> usize {
        let waiters = {
            let mut inner = self.inner.borrow_mut();
            inner.last_frame = Some(timestamp_nanos);
            std::mem::take(&mut inner.waiters)
        };
        let n = waiters.len();
        for w in waiters {
            match w {
                Waiter::Future { slot, .. } => slot.resolve(Ok(timestamp_nanos)),
                Waiter::Callback(f) => f(timestamp_nanos),
            }
        }
        n
    }

    /// Refuses new waiters and fails pending futures with
    /// [`SceneError::Closed`]. Pending callbacks are dropped.
    pub fn close(&self) {
        let waiters = {
            let mut inner = self.inner.borrow_mut();
            inner.closed = true;
            std::mem::take(&mut inner.waiters)
        };
        for w in waiters {
            if let Waiter::Future { slot, .. } = w {
                slot.resolve(Err(SceneError::Closed));
            }
        }
    }
}

/// Future returned by [`FrameClock::await_frame`]. It joins the waiter set
/// on first poll.
pub struct FrameFuture {
    clock: Weak<RefCell<ClockInner>>,
    registered: Option<(u64, Rc<FrameSlot>)>,
}

impl Future for FrameFuture {
    type Output = Result<i64, SceneError>;

    fn poll(self: Pin<&mut Self>, cx: &mut Context<'_>) -> Poll<Self::Output> {
        let this = self.get_mut();
        if let Some((_, slot)) = &this.registered {
            if let Some(r) = slot.result.take() {
                this.registered = None;
                return Poll::Ready(r);
            }
            *slot.waker.borrow_mut() = Some(cx.waker().clone());
            return Poll::Pending;
        }

        let Some(inner) = this.clock.upgrade() else {
            return Poll::Ready(Err(SceneError::Closed));
        };
        let id = {
            let mut i = inner.borrow_mut();
            let id = i.next_id;
            i.next_id += 1;
            id
        };
        let slot = Rc::new(FrameSlot::default());
        *slot.waker.borrow_mut() = Some(cx.waker().clone());
        let clock = FrameClock { inner };
        match clock.push(Waiter::Future {
            id,
            slot: slot.clone(),
        }) {
            Ok(()) => {
                this.registered = Some((id, slot));
                Poll::Pending
            }
            Err(e) => Poll::Ready(Err(e)),
        }
    }
}

impl Drop for FrameFuture {
    fn drop(&mut self) {
        let Some((id, _)) = self.registered.take() else {
            return;
        };
        if let Some(inner) = self.clock.upgrade()
            && let Ok(mut inner) = inner.try_borrow_mut()
        {
            inner
                .waiters
                .retain(|w| !matches!(w, Waiter::Future { id: wid, .. } if *wid == id));
        }
    }
}
