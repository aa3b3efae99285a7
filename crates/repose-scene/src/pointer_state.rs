use repose_core::{KeyboardModifiers, PointerButtons, PointerEventType};

/// Default button and modifier state for hosts that do not report it on
/// every event. Explicit values from the host always win.
#[derive(Clone, Copy, Debug, Default)]
pub struct PointerStateTracker {
    buttons: PointerButtons,
    modifiers: KeyboardModifiers,
}

impl PointerStateTracker {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn on_pointer_event(&mut self, event_type: PointerEventType) {
        match event_type {
            PointerEventType::Press => self.buttons = PointerButtons::PRIMARY,
            PointerEventType::Release => self.buttons = PointerButtons::empty(),
            _ => {}
        }
    }

    /// Key events carry authoritative modifier state; remember it for
    /// pointer events that come without any.
    pub fn on_modifiers(&mut self, modifiers: KeyboardModifiers) {
        self.modifiers = modifiers;
    }

    pub fn current_buttons(&self) -> PointerButtons {
        self.buttons
    }

    pub fn current_modifiers(&self) -> KeyboardModifiers {
        self.modifiers
    }

    pub fn resolve_buttons(&self, explicit: Option<PointerButtons>) -> PointerButtons {
        explicit.unwrap_or(self.buttons)
    }

    pub fn resolve_modifiers(&self, explicit: Option<KeyboardModifiers>) -> KeyboardModifiers {
        explicit.unwrap_or(self.modifiers)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn press_latches_primary_and_release_clears() {
        let mut t = PointerStateTracker::new();
        assert!(t.current_buttons().is_empty());
        t.on_pointer_event(PointerEventType::Press);
        assert_eq!(t.current_buttons(), PointerButtons::PRIMARY);
        t.on_pointer_event(PointerEventType::Move);
        assert_eq!(t.current_buttons(), PointerButtons::PRIMARY);
        t.on_pointer_event(PointerEventType::Release);
        assert!(t.current_buttons().is_empty());
    }

    #[test]
    fn explicit_values_are_never_overridden() {
        let mut t = PointerStateTracker::new();
        t.on_pointer_event(PointerEventType::Press);
        t.on_modifiers(KeyboardModifiers::SHIFT);
        assert_eq!(
            t.resolve_buttons(Some(PointerButtons::SECONDARY)),
            PointerButtons::SECONDARY
        );
        assert_eq!(
            t.resolve_modifiers(Some(KeyboardModifiers::empty())),
            KeyboardModifiers::empty()
        );
        assert_eq!(t.resolve_buttons(None), PointerButtons::PRIMARY);
        assert_eq!(t.resolve_modifiers(None), KeyboardModifiers::SHIFT);
    }
}
