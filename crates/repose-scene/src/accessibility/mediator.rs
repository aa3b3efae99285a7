use std::rc::Rc;
use std::time::Duration;

use repose_core::{LayoutDirection, SemanticsId, SemanticsNode, Vec2};
use web_time::Instant;

use super::{AccessibilityNotification, AccessibilitySyncOptions, AccessibilityTree, diff_trees};
use crate::error::AccessibilityQueryError;

/// How much of the projection a sync has to redo.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum Invalidation {
    Clean,
    /// Only positions changed; properties are not compared.
    Bounds,
    Complete,
}

#[derive(Debug, Default)]
pub struct SyncOutcome {
    pub notifications: Vec<AccessibilityNotification>,
    /// Whether a new snapshot replaced the previous one.
    pub synced: bool,
    /// Element the host should move accessibility focus to.
    pub refocus: Option<SemanticsId>,
}

/// Keeps one owner's accessibility projection in step with its semantics.
pub struct AccessibilityMediator {
    options: AccessibilitySyncOptions,
    period: Duration,
    activity_window: Duration,
    services_active: bool,
    invalidation: Invalidation,
    tree: Rc<AccessibilityTree>,
    last_sync: Option<Instant>,
    last_activity: Option<Instant>,
    focused: Option<SemanticsId>,
    synced_once: bool,
}

impl AccessibilityMediator {
    pub fn new(options: AccessibilitySyncOptions, period: Duration, activity_window: Duration) -> Self {
        Self {
            options,
            period,
            activity_window,
            services_active: false,
            invalidation: Invalidation::Complete,
            tree: Rc::new(AccessibilityTree::empty()),
            last_sync: None,
            last_activity: None,
            focused: None,
            synced_once: false,
        }
    }

    pub fn set_options(&mut self, options: AccessibilitySyncOptions) {
        self.options = options;
    }

    pub fn set_services_active(&mut self, active: bool) {
        self.services_active = active;
    }

    pub fn is_enabled(&self) -> bool {
        match self.options {
            AccessibilitySyncOptions::Never => false,
            AccessibilitySyncOptions::WhenRequiredByServices => self.services_active,
            AccessibilitySyncOptions::Always => true,
        }
    }

    pub fn invalidation(&self) -> Invalidation {
        self.invalidation
    }

    pub fn is_dirty(&self) -> bool {
        self.invalidation != Invalidation::Clean
    }

    pub fn on_semantics_change(&mut self) {
        self.invalidation = Invalidation::Complete;
    }

    /// A node we have never projected may have become meaningful, so that
    /// needs a complete sync; a known node only moved.
    pub fn on_layout_change(&mut self, id: SemanticsId) {
        self.invalidation = match self.invalidation {
            Invalidation::Complete => Invalidation::Complete,
            _ if !self.tree.contains(id) => Invalidation::Complete,
            _ => Invalidation::Bounds,
        };
    }

    /// Layout of the whole owner changed without a specific node.
    pub fn on_bounds_change(&mut self) {
        if self.invalidation == Invalidation::Clean {
            self.invalidation = Invalidation::Bounds;
        }
    }

    pub fn record_activity(&mut self, now: Instant) {
        self.last_activity = Some(now);
    }

    /// Whether the periodic pass should sync now.
    pub fn is_due(&self, now: Instant) -> bool {
        if !self.is_enabled() || !self.is_dirty() {
            return false;
        }
        let active = self
            .last_activity
            .is_some_and(|t| now.saturating_duration_since(t) <= self.activity_window);
        let period_elapsed = self
            .last_sync
            .is_none_or(|t| now.saturating_duration_since(t) >= self.period);
        active && period_elapsed
    }

    /// Current snapshot, as of the last sync.
    pub fn tree(&self) -> Result<Rc<AccessibilityTree>, AccessibilityQueryError> {
        if !self.is_enabled() {
            return Err(AccessibilityQueryError::Disabled);
        }
        Ok(self.tree.clone())
    }

    pub fn focused(&self) -> Option<SemanticsId> {
        self.focused
    }

    /// Re-projects `root` if anything changed since the last sync.
    pub fn sync(
        &mut self,
        root: Option<&SemanticsNode>,
        origin: Vec2,
        direction: LayoutDirection,
        now: Instant,
    ) -> SyncOutcome {
        if !self.is_enabled() || !self.is_dirty() {
            return SyncOutcome::default();
        }
        let started = Instant::now();
        let new = match root {
            Some(root) => AccessibilityTree::build(root, origin, direction),
            None => AccessibilityTree::empty(),
        };
        let bounds_only = self.invalidation == Invalidation::Bounds;
        let notifications = diff_trees(&self.tree, &new, bounds_only);

        let previous = self.focused;
        let current = new
            .focused()
            .map(|e| e.id)
            .or(previous.filter(|id| new.contains(*id)));
        let lost = previous.is_some() && current.is_none();
        let refocus = if current.is_none() && (!self.synced_once || lost) {
            new.find_focusable().map(|e| e.id)
        } else {
            None
        };
        self.focused = current.or(refocus);

        self.tree = Rc::new(new);
        self.invalidation = Invalidation::Clean;
        self.last_sync = Some(now);
        self.synced_once = true;
        log::debug!(
            "accessibility sync: {} elements, {} notifications in {:?}",
            self.tree.len(),
            notifications.len(),
            started.elapsed()
        );
        SyncOutcome {
            notifications,
            synced: true,
            refocus,
        }
    }
}
