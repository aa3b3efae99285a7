use std::time::Duration;

use repose_core::{CompositionLocalContext, Constraints, Density, LayoutDirection};

use crate::accessibility::AccessibilitySyncOptions;

/// Initial parameters of a [`Scene`](crate::Scene). Everything except the
/// accessibility timings can be changed later through the scene's setters.
#[derive(Clone, Debug)]
pub struct SceneConfig {
    pub density: Density,
    pub layout_direction: LayoutDirection,
    pub constraints: Constraints,
    pub locals: CompositionLocalContext,
    pub accessibility: AccessibilitySyncOptions,
    /// Minimum time between two background accessibility syncs.
    pub accessibility_sync_period: Duration,
    /// Background syncs stop once the host has not queried the tree for
    /// this long.
    pub accessibility_activity_window: Duration,
}

impl Default for SceneConfig {
    fn default() -> Self {
        Self {
            density: Density::default(),
            layout_direction: LayoutDirection::Ltr,
            constraints: Constraints::default(),
            locals: CompositionLocalContext::new(),
            accessibility: AccessibilitySyncOptions::WhenRequiredByServices,
            accessibility_sync_period: Duration::from_millis(100),
            accessibility_activity_window: Duration::from_secs(5 * 60),
        }
    }
}

impl SceneConfig {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with_density(mut self, density: Density) -> Self {
        self.density = density;
        self
    }

    pub fn with_layout_direction(mut self, dir: LayoutDirection) -> Self {
        self.layout_direction = dir;
        self
    }

    pub fn with_size(mut self, width: u32, height: u32) -> Self {
        self.constraints = Constraints::fixed(width, height);
        self
    }

    pub fn with_locals(mut self, locals: CompositionLocalContext) -> Self {
        self.locals = locals;
        self
    }

    pub fn with_accessibility(mut self, options: AccessibilitySyncOptions) -> Self {
        self.accessibility = options;
        self
    }

    pub fn with_accessibility_sync_period(mut self, period: Duration) -> Self {
        self.accessibility_sync_period = period;
        self
    }

    pub fn with_accessibility_activity_window(mut self, window: Duration) -> Self {
        self.accessibility_activity_window = window;
        self
    }
}
