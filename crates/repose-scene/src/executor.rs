//! Single-threaded task executor.
//!
//! Compositions launch effects as futures. They run on the scene thread,
//! cooperatively, and are polled only by [`Executor::run_until_stalled`],
//! which the scene calls right after sending a frame and after installing
//! content. Wakers are `Send`, so I/O completions on other threads can wake a
//! task; the first wake after the ready queue drains notifies the host.

use std::cell::{Cell, RefCell};
use std::collections::VecDeque;
use std::future::Future;
use std::panic::{AssertUnwindSafe, catch_unwind};
use std::pin::Pin;
use std::rc::{Rc, Weak};
use std::sync::Arc;
use std::task::{Context, Poll, Wake, Waker};

use parking_lot::Mutex;
use slotmap::{SlotMap, new_key_type};

new_key_type! {
    pub struct TaskId;
}

type LocalTask = Pin<Box<dyn Future<Output = ()>>>;
type WakeNotify = Arc<dyn Fn() + Send + Sync>;

#[derive(Default)]
struct ReadyQueue {
    ids: VecDeque<TaskId>,
}

struct TaskWaker {
    id: TaskId,
    ready: Arc<Mutex<ReadyQueue>>,
    notify: Option<WakeNotify>,
}

impl Wake for TaskWaker {
    fn wake(self: Arc<Self>) {
        self.wake_by_ref();
    }

    fn wake_by_ref(self: &Arc<Self>) {
        let was_empty = {
            let mut q = self.ready.lock();
            if q.ids.contains(&self.id) {
                return;
            }
            let was_empty = q.ids.is_empty();
            q.ids.push_back(self.id);
            was_empty
        };
        if was_empty && let Some(n) = &self.notify {
            n();
        }
    }
}

/// A panic that escaped a task's `poll`. The task is dropped.
pub struct TaskPanic {
    pub payload: Box<dyn std::any::Any + Send>,
}

impl std::fmt::Debug for TaskPanic {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("TaskPanic").finish_non_exhaustive()
    }
}

#[derive(Default)]
pub struct Executor {
    // A slot is `None` while its future is being polled.
    tasks: RefCell<SlotMap<TaskId, Option<LocalTask>>>,
    ready: Arc<Mutex<ReadyQueue>>,
    notify: RefCell<Option<WakeNotify>>,
    closed: Cell<bool>,
}

impl Executor {
    pub fn new() -> Rc<Self> {
        Rc::new(Self::default())
    }

    pub(crate) fn new_closed() -> Rc<Self> {
        let ex = Self::new();
        ex.closed.set(true);
        ex
    }

    /// Called from any thread when the ready queue goes from empty to
    /// non-empty.
    pub fn set_wake_notify(&self, f: impl Fn() + Send + Sync + 'static) {
        *self.notify.borrow_mut() = Some(Arc::new(f));
    }

    /// Queues `future`; it is first polled by the next
    /// [`Executor::run_until_stalled`]. After close the future is dropped
    /// and the returned handle is already finished.
    pub fn spawn(self: &Rc<Self>, future: impl Future<Output = ()> + 'static) -> TaskHandle {
        if self.closed.get() {
            log::debug!("spawn after executor close ignored");
            return TaskHandle {
                id: TaskId::default(),
                executor: Weak::new(),
            };
        }
        let id = self.tasks.borrow_mut().insert(Some(Box::pin(future)));
        self.waker_for(id).wake_by_ref();
        TaskHandle {
            id,
            executor: Rc::downgrade(self),
        }
    }

    fn waker_for(&self, id: TaskId) -> Waker {
        Waker::from(Arc::new(TaskWaker {
            id,
            ready: self.ready.clone(),
            notify: self.notify.borrow().clone(),
        }))
    }

    pub fn task_count(&self) -> usize {
        self.tasks.borrow().len()
    }

    pub fn has_tasks(&self) -> bool {
        !self.tasks.borrow().is_empty()
    }

    pub fn has_ready(&self) -> bool {
        !self.ready.lock().ids.is_empty()
    }

    /// Polls ready tasks until none is ready. Returns how many polls ran.
    /// A panicking task is dropped and its panic returned; tasks still in
    /// the queue run on the next call.
    pub fn run_until_stalled(&self) -> Result<usize, TaskPanic> {
        let mut polls = 0;
        loop {
            let Some(id) = self.ready.lock().ids.pop_front() else {
                return Ok(polls);
            };
            let Some(mut fut) = self.tasks.borrow_mut().get_mut(id).and_then(Option::take) else {
                continue;
            };
            let waker = self.waker_for(id);
            let mut cx = Context::from_waker(&waker);
            polls += 1;
            match catch_unwind(AssertUnwindSafe(|| fut.as_mut().poll(&mut cx))) {
                Ok(Poll::Pending) => {
                    // Cancelled while polling: the slot is gone, drop the future.
                    if let Some(slot) = self.tasks.borrow_mut().get_mut(id) {
                        *slot = Some(fut);
                        continue;
                    }
                    drop(fut);
                }
                Ok(Poll::Ready(())) => {
                    self.tasks.borrow_mut().remove(id);
                    drop(fut);
                }
                Err(payload) => {
                    self.tasks.borrow_mut().remove(id);
                    drop(fut);
                    return Err(TaskPanic { payload });
                }
            }
        }
    }

    fn cancel(&self, id: TaskId) -> bool {
        let removed = self.tasks.borrow_mut().remove(id);
        // Drop outside the borrow: a future's destructor may cancel others.
        let found = removed.is_some();
        drop(removed);
        found
    }

    fn is_live(&self, id: TaskId) -> bool {
        self.tasks.borrow().contains_key(id)
    }

    /// Drops every task and refuses new ones.
    pub fn close(&self) {
        self.closed.set(true);
        let tasks = std::mem::take(&mut *self.tasks.borrow_mut());
        self.ready.lock().ids.clear();
        drop(tasks);
    }
}

/// Handle to a launched task. Dropping it does not cancel the task.
#[derive(Clone, Debug)]
pub struct TaskHandle {
    id: TaskId,
    executor: Weak<Executor>,
}

impl TaskHandle {
    /// Removes the task. Returns whether it was still running.
    pub fn cancel(&self) -> bool {
        self.executor
            .upgrade()
            .is_some_and(|e| e.cancel(self.id))
    }

    pub fn is_finished(&self) -> bool {
        !self
            .executor
            .upgrade()
            .is_some_and(|e| e.is_live(self.id))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::frame_clock::FrameClock;
    use std::sync::atomic::{AtomicUsize, Ordering};

    fn boom() {
        panic!("boom")
    }

    #[test]
    fn spawned_task_runs_on_flush() {
        let ex = Executor::new();
        let ran = Rc::new(Cell::new(false));
        let r = ran.clone();
        let h = ex.spawn(async move { r.set(true) });
        assert!(!ran.get());
        assert!(ex.has_ready());
        ex.run_until_stalled().unwrap();
        assert!(ran.get());
        assert!(h.is_finished());
        assert!(!ex.has_tasks());
    }

    #[test]
    fn frame_waits_resume_after_send_frame() {
        let ex = Executor::new();
        let clock = FrameClock::new();
        let frames = Rc::new(RefCell::new(Vec::new()));
        {
            let (clock, frames) = (clock.clone(), frames.clone());
            ex.spawn(async move {
                for _ in 0..2 {
                    if let Ok(t) = clock.await_frame().await {
                        frames.borrow_mut().push(t);
                    }
                }
            });
        }
        ex.run_until_stalled().unwrap();
        assert!(clock.has_awaiters());

        clock.send_frame(100);
        ex.run_until_stalled().unwrap();
        clock.send_frame(200);
        ex.run_until_stalled().unwrap();
        assert_eq!(*frames.borrow(), vec![100, 200]);
        assert!(!ex.has_tasks());
    }

    #[test]
    fn cancel_removes_task_and_its_frame_wait() {
        let ex = Executor::new();
        let clock = FrameClock::new();
        let c = clock.clone();
        let h = ex.spawn(async move {
            let _ = c.await_frame().await;
            boom();
        });
        ex.run_until_stalled().unwrap();
        assert!(clock.has_awaiters());
        assert!(h.cancel());
        assert!(!h.cancel());
        assert!(!clock.has_awaiters());
        clock.send_frame(1);
        assert_eq!(ex.run_until_stalled().unwrap(), 0);
    }

    #[test]
    fn wake_notify_fires_on_empty_to_non_empty() {
        let ex = Executor::new();
        let hits = Arc::new(AtomicUsize::new(0));
        {
            let hits = hits.clone();
            ex.set_wake_notify(move || {
                hits.fetch_add(1, Ordering::SeqCst);
            });
        }
        ex.spawn(async {});
        ex.spawn(async {});
        assert_eq!(hits.load(Ordering::SeqCst), 1);
        ex.run_until_stalled().unwrap();
        ex.spawn(async {});
        assert_eq!(hits.load(Ordering::SeqCst), 2);
    }

    #[test]
    fn panicking_task_is_reported_and_dropped() {
        let ex = Executor::new();
        ex.spawn(async { boom() });
        let ok = Rc::new(Cell::new(false));
        let o = ok.clone();
        ex.spawn(async move { o.set(true) });

        let err = ex.run_until_stalled().unwrap_err();
        assert_eq!(err.payload.downcast_ref::<&str>(), Some(&"boom"));
        ex.run_until_stalled().unwrap();
        assert!(ok.get());
        assert!(!ex.has_tasks());
    }

    #[test]
    fn close_drops_tasks_and_refuses_spawn() {
        let ex = Executor::new();
        ex.spawn(std::future::pending::<()>());
        ex.run_until_stalled().unwrap();
        assert_eq!(ex.task_count(), 1);
        ex.close();
        assert!(!ex.has_tasks());
        let h = ex.spawn(async {});
        assert!(h.is_finished());
        assert!(!ex.has_ready());
    }
}
