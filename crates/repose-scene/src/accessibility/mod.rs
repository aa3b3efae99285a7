//! Accessibility projection.
//!
//! Each owner has an [`AccessibilityMediator`]. Compositions report semantics
//! and layout changes; the mediator marks itself dirty and, on the next sync,
//! projects the composition's semantics tree into an [`AccessibilityTree`],
//! diffs it against the previous one and hands the host one
//! [`AccessibilityNotification`] per changed property.
//!
//! Syncs happen either on demand (the host asks for the tree) or from the
//! scene's periodic pass, which only runs while the host has been asking
//! recently.

mod diff;
mod mediator;
mod tree;

pub use diff::diff_trees;
pub use mediator::{AccessibilityMediator, Invalidation, SyncOutcome};
pub use tree::{AccessibilityElement, AccessibilityTree, AccessibleRole, ElementActions, Traits};

use repose_core::{SemanticsId, SemanticsKey};

use crate::owner::OwnerId;

/// When the scene keeps the accessibility tree up to date.
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq, Hash)]
pub enum AccessibilitySyncOptions {
    /// Never project; queries fail with `Disabled`.
    Never,
    /// Only while the host reports assistive services running.
    #[default]
    WhenRequiredByServices,
    Always,
}

#[derive(Clone, Debug, PartialEq, Eq)]
pub enum AccessibilityNotification {
    Added(SemanticsId),
    Removed(SemanticsId),
    TextChanged(SemanticsId),
    CaretMoved(SemanticsId),
    FocusGained(SemanticsId),
    FocusLost(SemanticsId),
    CheckedChanged(SemanticsId),
    BoundsChanged(SemanticsId),
    PropertyChanged { id: SemanticsId, key: SemanticsKey },
}

impl AccessibilityNotification {
    pub fn id(&self) -> SemanticsId {
        match self {
            AccessibilityNotification::Added(id)
            | AccessibilityNotification::Removed(id)
            | AccessibilityNotification::TextChanged(id)
            | AccessibilityNotification::CaretMoved(id)
            | AccessibilityNotification::FocusGained(id)
            | AccessibilityNotification::FocusLost(id)
            | AccessibilityNotification::CheckedChanged(id)
            | AccessibilityNotification::BoundsChanged(id) => *id,
            AccessibilityNotification::PropertyChanged { id, .. } => *id,
        }
    }
}

/// Platform side of the accessibility projection.
pub trait AccessibilityHost {
    /// A fresh snapshot after a sync that changed something.
    fn publish_tree(&self, owner: OwnerId, tree: &AccessibilityTree);
    fn notify(&self, owner: OwnerId, notification: &AccessibilityNotification);
    /// Proposed focus after the focused element disappeared, or on first sync.
    fn focus_changed(&self, owner: OwnerId, element: Option<&AccessibilityElement>);
    fn announce(&self, message: &str);
}
