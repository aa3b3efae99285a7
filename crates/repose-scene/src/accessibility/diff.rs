use std::collections::BTreeSet;

use repose_core::{SemanticsConfig, SemanticsKey, SemanticsProperty};

use super::{AccessibilityElement, AccessibilityNotification, AccessibilityTree};

/// Notifications turning `old` into `new`: removals, then additions, then
/// one notification per changed property key of every surviving element.
/// With `bounds_only` set, surviving elements are compared by bounds alone.
pub fn diff_trees(
    old: &AccessibilityTree,
    new: &AccessibilityTree,
    bounds_only: bool,
) -> Vec<AccessibilityNotification> {
    let mut removed: Vec<_> = old.ids().filter(|id| !new.contains(*id)).collect();
    let mut added: Vec<_> = new.ids().filter(|id| !old.contains(*id)).collect();
    let mut kept: Vec<_> = new.ids().filter(|id| old.contains(*id)).collect();
    removed.sort_unstable();
    added.sort_unstable();
    kept.sort_unstable();

    let mut out: Vec<AccessibilityNotification> = removed
        .into_iter()
        .map(AccessibilityNotification::Removed)
        .chain(added.into_iter().map(AccessibilityNotification::Added))
        .collect();

    for id in kept {
        let (Some(before), Some(after)) = (old.get(id), new.get(id)) else {
            continue;
        };
        if !bounds_only {
            diff_properties(before, after, &mut out);
        }
        if before.bounds_in_window != after.bounds_in_window {
            out.push(AccessibilityNotification::BoundsChanged(id));
        }
    }
    out
}

fn diff_properties(
    before: &AccessibilityElement,
    after: &AccessibilityElement,
    out: &mut Vec<AccessibilityNotification>,
) {
    let keys: BTreeSet<SemanticsKey> = before
        .config
        .iter()
        .chain(after.config.iter())
        .map(SemanticsProperty::key)
        .collect();
    for key in keys {
        let (a, b) = (before.config.get(key), after.config.get(key));
        if a != b {
            out.push(notification_for(after.id, key, &after.config));
        }
    }
}

fn notification_for(
    id: repose_core::SemanticsId,
    key: SemanticsKey,
    now: &SemanticsConfig,
) -> AccessibilityNotification {
    match key {
        SemanticsKey::Text | SemanticsKey::EditableText | SemanticsKey::ContentDescription => {
            AccessibilityNotification::TextChanged(id)
        }
        SemanticsKey::TextSelectionRange => AccessibilityNotification::CaretMoved(id),
        SemanticsKey::Focused if now.is_focused() => AccessibilityNotification::FocusGained(id),
        SemanticsKey::Focused => AccessibilityNotification::FocusLost(id),
        SemanticsKey::ToggleableState => AccessibilityNotification::CheckedChanged(id),
        key => AccessibilityNotification::PropertyChanged { id, key },
    }
}
