// Accessibility host that only logs (no platform bridge wired up yet)

use std::cell::Cell;

use repose_scene::{
    AccessibilityElement, AccessibilityHost, AccessibilityNotification, AccessibilityTree, OwnerId,
};

#[derive(Debug, Default)]
pub struct LoggingAccessibilityHost {
    published: Cell<usize>,
}

impl LoggingAccessibilityHost {
    pub fn new() -> Self {
        Self::default()
    }

    /// Snapshots received so far.
    pub fn published(&self) -> usize {
        self.published.get()
    }
}

impl AccessibilityHost for LoggingAccessibilityHost {
    fn publish_tree(&self, owner: OwnerId, tree: &AccessibilityTree) {
        self.published.set(self.published.get() + 1);
        log::debug!("A11y publish {owner:?}: {} elements", tree.len());
    }

    fn notify(&self, owner: OwnerId, notification: &AccessibilityNotification) {
        log::debug!("A11y {owner:?}: {notification:?}");
    }

    fn focus_changed(&self, _owner: OwnerId, element: Option<&AccessibilityElement>) {
        if let Some(e) = element {
            log::info!("A11y focus: {:?} {:?}", e.role, e.label);
        } else {
            log::info!("A11y focus: None");
        }
    }

    fn announce(&self, message: &str) {
        log::info!("A11y announce: {message}");
    }
}
