//! Normalized input values shared by the scene and the platform adapters.
//!
//! Platform adapters translate native window/view events into these types.
//! Nothing here knows about hit-testing or owners; they are plain values.

use std::any::Any;
use std::rc::Rc;

use bitflags::bitflags;
use smallvec::SmallVec;

use crate::Vec2;

#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct PointerId(pub u64);

#[derive(Clone, Copy, Debug, Default, PartialEq, Eq, Hash)]
pub enum PointerType {
    #[default]
    Unknown,
    Mouse,
    Touch,
    Stylus,
    Eraser,
}

#[derive(Clone, Copy, Debug, Default, PartialEq, Eq, Hash)]
pub enum PointerEventType {
    #[default]
    Unknown,
    Press,
    Release,
    Move,
    Enter,
    Exit,
    Scroll,
}

impl PointerEventType {
    /// Move-like events drive hover bookkeeping and never need a synthetic
    /// move in front of them.
    pub fn is_move(self) -> bool {
        matches!(
            self,
            PointerEventType::Move | PointerEventType::Enter | PointerEventType::Exit
        )
    }
}

bitflags! {
    /// Pointer buttons held while an event was produced.
    #[derive(Clone, Copy, Debug, Default, PartialEq, Eq, Hash)]
    pub struct PointerButtons: u8 {
        const PRIMARY = 1 << 0;
        const SECONDARY = 1 << 1;
        const TERTIARY = 1 << 2;
        const BACK = 1 << 3;
        const FORWARD = 1 << 4;
    }
}

bitflags! {
    /// Modifier and lock keys held while an event was produced.
    #[derive(Clone, Copy, Debug, Default, PartialEq, Eq, Hash)]
    pub struct KeyboardModifiers: u8 {
        const SHIFT = 1 << 0;
        const CTRL = 1 << 1;
        const ALT = 1 << 2;
        const META = 1 << 3; // Cmd on Mac, Win key on Windows
        const CAPS_LOCK = 1 << 4;
        const NUM_LOCK = 1 << 5;
    }
}

/// Opaque back-reference to the host event an input value was built from.
pub type NativeEvent = Rc<dyn Any>;

/// One pointer inside a [`PointerInputEvent`].
#[derive(Clone, Copy, Debug, PartialEq)]
pub struct PointerInputData {
    pub id: PointerId,
    pub position: Vec2,
    pub pressed: bool,
    pub pointer_type: PointerType,
    pub pressure: f32,
    pub scroll_delta: Vec2,
}

impl PointerInputData {
    pub fn new(id: PointerId, position: Vec2, pressed: bool, pointer_type: PointerType) -> Self {
        Self {
            id,
            position,
            pressed,
            pointer_type,
            pressure: if pressed { 1.0 } else { 0.0 },
            scroll_delta: Vec2::ZERO,
        }
    }
}

/// An immutable, normalized pointer event.
#[derive(Clone, Debug)]
pub struct PointerInputEvent {
    pub event_type: PointerEventType,
    pub pointers: SmallVec<[PointerInputData; 1]>,
    pub buttons: PointerButtons,
    pub modifiers: KeyboardModifiers,
    /// Monotonic host time in milliseconds.
    pub timestamp_millis: u64,
    pub native_event: Option<NativeEvent>,
}

impl PointerInputEvent {
    pub fn new(
        event_type: PointerEventType,
        pointers: impl IntoIterator<Item = PointerInputData>,
        timestamp_millis: u64,
    ) -> Self {
        Self {
            event_type,
            pointers: pointers.into_iter().collect(),
            buttons: PointerButtons::empty(),
            modifiers: KeyboardModifiers::empty(),
            timestamp_millis,
            native_event: None,
        }
    }

    pub fn with_buttons(mut self, buttons: PointerButtons) -> Self {
        self.buttons = buttons;
        self
    }

    pub fn with_modifiers(mut self, modifiers: KeyboardModifiers) -> Self {
        self.modifiers = modifiers;
        self
    }

    pub fn with_native_event(mut self, native_event: Option<NativeEvent>) -> Self {
        self.native_event = native_event;
        self
    }

    pub fn pointer(&self, id: PointerId) -> Option<&PointerInputData> {
        self.pointers.iter().find(|p| p.id == id)
    }

    /// Position of the first pointer, which is the only one for mouse input.
    pub fn position(&self) -> Option<Vec2> {
        self.pointers.first().map(|p| p.position)
    }

    pub fn scroll_delta(&self) -> Vec2 {
        self.pointers
            .first()
            .map(|p| p.scroll_delta)
            .unwrap_or(Vec2::ZERO)
    }

    pub fn pressed_ids(&self) -> SmallVec<[PointerId; 4]> {
        self.pointers
            .iter()
            .filter(|p| p.pressed)
            .map(|p| p.id)
            .collect()
    }

    pub fn is_move(&self) -> bool {
        self.event_type.is_move()
    }

    /// Copy suitable for caching: the native back-reference is dropped so a
    /// retained event never pins host objects.
    pub fn detached(&self) -> Self {
        Self {
            native_event: None,
            ..self.clone()
        }
    }

    /// Copy with every pointer shifted by `-origin`, for delivery into an
    /// owner whose bounds start at `origin`.
    pub fn localized(&self, origin: Vec2) -> Self {
        let mut out = self.clone();
        for p in out.pointers.iter_mut() {
            p.position = p.position - origin;
        }
        out
    }
}

#[derive(Clone, Debug, PartialEq, Eq, Hash)]
pub enum Key {
    Character(char),
    Enter,
    Tab,
    Backspace,
    Delete,
    Escape,
    ArrowLeft,
    ArrowRight,
    ArrowUp,
    ArrowDown,
    Home,
    End,
    PageUp,
    PageDown,
    Space,
    F(u8), // F1-F12
    Unidentified,
}

#[derive(Clone, Copy, Debug, Default, PartialEq, Eq, Hash)]
pub enum KeyEventType {
    #[default]
    KeyDown,
    KeyUp,
}

#[derive(Clone, Debug)]
pub struct KeyEvent {
    pub key: Key,
    pub event_type: KeyEventType,
    pub modifiers: KeyboardModifiers,
    pub is_repeat: bool,
    /// Text produced by the key press, if any.
    pub text: Option<String>,
    pub timestamp_millis: u64,
}

impl KeyEvent {
    pub fn down(key: Key) -> Self {
        Self {
            key,
            event_type: KeyEventType::KeyDown,
            modifiers: KeyboardModifiers::empty(),
            is_repeat: false,
            text: None,
            timestamp_millis: 0,
        }
    }

    pub fn up(key: Key) -> Self {
        Self {
            event_type: KeyEventType::KeyUp,
            ..Self::down(key)
        }
    }

    pub fn with_modifiers(mut self, modifiers: KeyboardModifiers) -> Self {
        self.modifiers = modifiers;
        self
    }
}

#[derive(Clone, Debug, PartialEq, Eq)]
pub enum ImeEvent {
    /// IME composition started
    Start,
    /// Composition text updated
    Update {
        text: String,
        cursor: Option<(usize, usize)>, // (start, end) of composition range
    },
    /// Composition committed (finalized)
    Commit(String),
    /// Composition cancelled
    Cancel,
}
