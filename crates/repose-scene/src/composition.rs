//! The seam between the scene and whatever builds UI content.
//!
//! A composition is an opaque, owner-rooted piece of content. The scene
//! drives it through [`Composition`] and the composition talks back through
//! the [`OwnerContext`] it was created with.

use std::cell::RefCell;
use std::future::Future;
use std::rc::{Rc, Weak};

use repose_core::{
    Canvas, CompositionLocalContext, Constraints, Density, ImeEvent, IntSize, KeyEvent,
    LayoutDirection, ObserverRegistry, PointerInputEvent, Rect, SemanticsAction, SemanticsId,
    SemanticsNode, State, Vec2, with_density, with_layout_direction,
};

use crate::command_queue::{CommandQueue, CommandSender};
use crate::executor::{Executor, TaskHandle};
use crate::frame_clock::FrameClock;
use crate::invalidation::Invalidator;
use crate::owner::{OwnerId, OwnerState};
use crate::scene::Scene;

/// Capabilities a piece of content offers its owner. Every method is called
/// on the scene thread, with the scene's locals in scope.
pub trait Composition {
    /// Rebuilds content after state it observes changed. Also called once
    /// when the content is installed.
    fn recompose(&mut self, cx: &OwnerContext);

    fn measure(&mut self, constraints: Constraints, env: &Environment) -> IntSize;

    fn layout(&mut self, _size: IntSize, _env: &Environment) {}

    fn draw(&mut self, canvas: &mut dyn Canvas, env: &Environment);

    /// Whether `position` (owner coordinates) hits this content. Layers
    /// that return false let the press through to what is below.
    fn contains(&self, _position: Vec2) -> bool {
        true
    }

    /// Returns whether the event was consumed.
    fn on_pointer_event(&mut self, event: &PointerInputEvent) -> bool;

    fn on_key_event(&mut self, _event: &KeyEvent) -> bool {
        false
    }

    fn on_input_method_event(&mut self, _event: &ImeEvent) -> bool {
        false
    }

    fn semantics(&self) -> Option<SemanticsNode> {
        None
    }

    fn perform_semantics_action(&mut self, _id: SemanticsId, _action: &SemanticsAction) -> bool {
        false
    }

    fn dispose(&mut self) {}
}

/// Scene-wide parameters as seen by one owner.
#[derive(Clone, Debug)]
pub struct Environment {
    pub density: Density,
    pub layout_direction: LayoutDirection,
    pub constraints: Constraints,
    pub locals: CompositionLocalContext,
    /// Owner bounds in scene coordinates.
    pub bounds: Rect,
}

impl Environment {
    /// Runs `f` with density, layout direction and locals readable through
    /// the `repose_core` getters.
    pub fn provide<R>(&self, f: impl FnOnce() -> R) -> R {
        self.locals.provide(|| {
            with_density(self.density, || {
                with_layout_direction(self.layout_direction, f)
            })
        })
    }
}

#[derive(Clone, Debug)]
pub(crate) struct SceneParams {
    pub density: Density,
    pub layout_direction: LayoutDirection,
    pub constraints: Constraints,
    pub locals: CompositionLocalContext,
}

/// Scene-thread services shared by the scene and every owner context.
pub(crate) struct SceneServices {
    pub invalidator: Invalidator,
    pub frame_clock: FrameClock,
    pub executor: Rc<Executor>,
    pub observers: ObserverRegistry,
    pub commands: CommandQueue<Scene>,
    pub params: RefCell<SceneParams>,
}

impl SceneServices {
    pub fn environment(&self, bounds: Rect) -> Environment {
        let p = self.params.borrow();
        Environment {
            density: p.density,
            layout_direction: p.layout_direction,
            constraints: p.constraints,
            locals: p.locals.clone(),
            bounds,
        }
    }
}

/// Handle a composition uses to reach its owner and the scene.
#[derive(Clone)]
pub struct OwnerContext {
    services: Weak<SceneServices>,
    owner: Rc<OwnerState>,
}

impl OwnerContext {
    pub(crate) fn new(services: &Rc<SceneServices>, owner: Rc<OwnerState>) -> Self {
        Self {
            services: Rc::downgrade(services),
            owner,
        }
    }

    pub fn owner_id(&self) -> OwnerId {
        self.owner.id
    }

    fn invalidate(&self) {
        if let Some(s) = self.services.upgrade() {
            s.invalidator.request();
        }
    }

    pub fn request_redraw(&self) {
        self.owner.needs_draw.set(true);
        self.invalidate();
    }

    pub fn request_layout(&self) {
        self.owner.needs_layout.set(true);
        self.invalidate();
    }

    pub fn request_recompose(&self) {
        self.owner.needs_recompose.set(true);
        self.invalidate();
    }

    /// Semantics of this owner changed; the next accessibility sync
    /// re-projects everything.
    pub fn semantics_changed(&self) {
        self.owner.mediator.borrow_mut().on_semantics_change();
    }

    /// Semantics node `id` moved without changing otherwise.
    pub fn layout_changed(&self, id: SemanticsId) {
        self.owner.mediator.borrow_mut().on_layout_change(id);
    }

    pub fn frame_clock(&self) -> FrameClock {
        self.services
            .upgrade()
            .map(|s| s.frame_clock.clone())
            .unwrap_or_else(closed_clock)
    }

    /// Runs `future` on the scene thread. It is cancelled when the owner is
    /// disposed.
    pub fn launch(&self, future: impl Future<Output = ()> + 'static) -> TaskHandle {
        let Some(services) = self.services.upgrade() else {
            return Executor::new_closed().spawn(future);
        };
        let handle = services.executor.spawn(future);
        let h = handle.clone();
        self.owner.disposables.add_fn(move || {
            h.cancel();
        });
        handle
    }

    pub fn state<T: 'static>(&self, initial: T) -> State<T> {
        match self.services.upgrade() {
            Some(s) => s.observers.state(initial),
            None => ObserverRegistry::new().state(initial),
        }
    }

    /// Recomposes this owner whenever `state` changes. Observing the same
    /// state again is a no-op.
    pub fn observe<T: 'static>(&self, state: &State<T>) {
        let Some(services) = self.services.upgrade() else {
            return;
        };
        if !self.owner.observed.borrow_mut().insert(state.id()) {
            return;
        }
        let owner = Rc::downgrade(&self.owner);
        let weak = self.services.clone();
        let id = services.observers.observe(state, move || {
            if let Some(owner) = owner.upgrade() {
                owner.needs_recompose.set(true);
            }
            if let Some(s) = weak.upgrade() {
                s.invalidator.request();
            }
        });
        let registry = services.observers.clone();
        self.owner
            .disposables
            .add_fn(move || registry.remove_observer(id));
    }

    /// Sender for work that must run against the scene, from any thread.
    pub fn commands(&self) -> Option<CommandSender<Scene>> {
        self.services.upgrade().map(|s| s.commands.sender())
    }

    pub fn environment(&self) -> Environment {
        let bounds = self.owner.bounds.get();
        match self.services.upgrade() {
            Some(s) => s.environment(bounds),
            None => Environment {
                density: Density::default(),
                layout_direction: LayoutDirection::Ltr,
                constraints: Constraints::default(),
                locals: CompositionLocalContext::new(),
                bounds,
            },
        }
    }

    /// Runs `f` when the owner is disposed.
    pub fn on_dispose(&self, f: impl FnOnce() + 'static) {
        self.owner.disposables.add_fn(f);
    }

    pub fn is_disposed(&self) -> bool {
        self.owner.disposables.is_disposed()
    }
}

fn closed_clock() -> FrameClock {
    let clock = FrameClock::new();
    clock.close();
    clock
}
