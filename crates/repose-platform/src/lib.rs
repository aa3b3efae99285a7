//! Platform input adapters (desktop via winit; platform-neutral touch)
//!
//! An adapter owns whatever per-window input state the host does not report
//! on every event (held buttons, active touches, the last cursor position)
//! and turns native events into calls on a [`Scene`].

use repose_scene::Scene;

pub mod a11y;
#[cfg(feature = "desktop")]
pub mod desktop;
pub mod tests;
pub mod touch;

pub use a11y::LoggingAccessibilityHost;
#[cfg(feature = "desktop")]
pub use desktop::{DesktopInput, run_desktop_app};
pub use touch::{TouchEvent, TouchInput, TouchPhase, TouchPoint};

/// Feeds one kind of native event into a scene.
pub trait InputAdapter {
    type Native<'a>;

    /// Returns whether the scene consumed the event.
    fn handle(&mut self, scene: &mut Scene, native: Self::Native<'_>) -> anyhow::Result<bool>;
}

/// Pixels scrolled per wheel line, before density scaling.
pub const LINE_SCROLL_PX: f32 = 40.0;
