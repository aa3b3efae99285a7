//! Thread-safe FIFO of deferred work, drained before each render pass.

use std::sync::Arc;

use parking_lot::Mutex;

use crate::error::SceneError;

pub type Command<T> = Box<dyn FnOnce(&mut T) + Send>;
type Notify = Arc<dyn Fn() + Send + Sync>;

struct Pending<T> {
    commands: Vec<Command<T>>,
    closed: bool,
}

struct Shared<T> {
    // The only lock in the scene; user code never runs under it.
    pending: Mutex<Pending<T>>,
    notify: Mutex<Option<Notify>>,
}

/// Queue of commands applied to a `T` on its owning thread.
pub struct CommandQueue<T: 'static> {
    shared: Arc<Shared<T>>,
}

/// Cloneable `Send` handle for adding commands from any thread.
pub struct CommandSender<T: 'static> {
    shared: Arc<Shared<T>>,
}

impl<T: 'static> Clone for CommandQueue<T> {
    fn clone(&self) -> Self {
        Self {
            shared: self.shared.clone(),
        }
    }
}

impl<T: 'static> Clone for CommandSender<T> {
    fn clone(&self) -> Self {
        Self {
            shared: self.shared.clone(),
        }
    }
}

impl<T: 'static> Default for CommandQueue<T> {
    fn default() -> Self {
        Self::new()
    }
}

fn add<T>(shared: &Shared<T>, command: Command<T>) -> Result<(), SceneError> {
    let was_empty = {
        let mut p = shared.pending.lock();
        if p.closed {
            return Err(SceneError::Closed);
        }
        let was_empty = p.commands.is_empty();
        p.commands.push(command);
        was_empty
    };
    if was_empty {
        let notify = shared.notify.lock().clone();
        if let Some(n) = notify {
            n();
        }
    }
    Ok(())
}

impl<T: 'static> CommandQueue<T> {
    pub fn new() -> Self {
        Self {
            shared: Arc::new(Shared {
                pending: Mutex::new(Pending {
                    commands: Vec::new(),
                    closed: false,
                }),
                notify: Mutex::new(None),
            }),
        }
    }

    /// Called once per empty→non-empty transition, on the adding thread.
    pub fn set_notify(&self, f: impl Fn() + Send + Sync + 'static) {
        *self.shared.notify.lock() = Some(Arc::new(f));
    }

    pub fn sender(&self) -> CommandSender<T> {
        CommandSender {
            shared: self.shared.clone(),
        }
    }

    pub fn add(&self, command: impl FnOnce(&mut T) + Send + 'static) -> Result<(), SceneError> {
        add(&self.shared, Box::new(command))
    }

    pub fn has_commands(&self) -> bool {
        !self.shared.pending.lock().commands.is_empty()
    }

    /// Runs every command queued so far against `target`. Commands added
    /// while this runs wait for the next call. Returns how many ran.
    pub fn perform(&self, target: &mut T) -> usize {
        let batch = std::mem::take(&mut self.shared.pending.lock().commands);
        let n = batch.len();
        for command in batch {
            command(target);
        }
        if n > 0 {
            log::trace!("performed {n} commands");
        }
        n
    }

    /// Takes every queued command without running it, for callers that
    /// run each one under their own guard.
    pub fn drain(&self) -> Vec<Command<T>> {
        std::mem::take(&mut self.shared.pending.lock().commands)
    }

    /// Drops pending commands; later adds fail with [`SceneError::Closed`].
    pub fn close(&self) {
        let dropped = {
            let mut p = self.shared.pending.lock();
            p.closed = true;
            std::mem::take(&mut p.commands)
        };
        drop(dropped);
    }

    pub fn is_closed(&self) -> bool {
        self.shared.pending.lock().closed
    }
}

impl<T: 'static> CommandSender<T> {
    pub fn add(&self, command: impl FnOnce(&mut T) + Send + 'static) -> Result<(), SceneError> {
        add(&self.shared, Box::new(command))
    }
}
