//! Owners: one per root of renderable content (the main content and every
//! overlay layer).

use std::cell::{Cell, RefCell};
use std::collections::HashSet;
use std::rc::Rc;

use repose_core::{DisposeBag, IntSize, Rect, StateId, Vec2};
use slotmap::new_key_type;

use crate::accessibility::AccessibilityMediator;
use crate::composition::{Composition, OwnerContext};

new_key_type! {
    pub struct LayerId;
}

#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash)]
pub enum OwnerId {
    Main,
    Layer(LayerId),
}

/// Owner state shared with its [`OwnerContext`].
pub(crate) struct OwnerState {
    pub id: OwnerId,
    /// Scene coordinates. The main owner starts at the origin.
    pub bounds: Cell<Rect>,
    pub size: Cell<IntSize>,
    pub needs_recompose: Cell<bool>,
    pub needs_layout: Cell<bool>,
    pub needs_draw: Cell<bool>,
    pub mediator: RefCell<AccessibilityMediator>,
    pub disposables: DisposeBag,
    pub observed: RefCell<HashSet<StateId>>,
}

impl OwnerState {
    pub fn new(id: OwnerId, bounds: Rect, mediator: AccessibilityMediator) -> Self {
        Self {
            id,
            bounds: Cell::new(bounds),
            size: Cell::new(IntSize::ZERO),
            needs_recompose: Cell::new(false),
            needs_layout: Cell::new(true),
            needs_draw: Cell::new(true),
            mediator: RefCell::new(mediator),
            disposables: DisposeBag::new(),
            observed: RefCell::new(HashSet::new()),
        }
    }

    pub fn origin(&self) -> Vec2 {
        self.bounds.get().origin()
    }

    pub fn is_dirty(&self) -> bool {
        self.needs_recompose.get() || self.needs_layout.get() || self.needs_draw.get()
    }
}

pub(crate) struct Owner {
    pub state: Rc<OwnerState>,
    pub cx: OwnerContext,
    pub composition: Box<dyn Composition>,
    /// Whether key and IME input may be routed here.
    pub focusable: bool,
    pub on_outside_press: Option<Box<dyn FnMut()>>,
}

impl Owner {
    pub fn id(&self) -> OwnerId {
        self.state.id
    }

    /// Whether a press at `position` (scene coordinates) belongs to this
    /// owner.
    pub fn hit(&self, position: Vec2) -> bool {
        let bounds = self.state.bounds.get();
        match self.state.id {
            OwnerId::Main => self.composition.contains(position),
            OwnerId::Layer(_) => {
                bounds.contains(position) && self.composition.contains(position - bounds.origin())
            }
        }
    }
}
