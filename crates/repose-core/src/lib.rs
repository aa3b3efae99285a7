//! # Repose core values
//!
//! The types every other Repose crate speaks in. Nothing here owns a window,
//! a thread or a render loop; it is the vocabulary shared by the scene
//! (`repose-scene`) and the platform adapters (`repose-platform`):
//!
//! - geometry (`Vec2`, `Rect`, `IntSize`, `Constraints`) and `Color`;
//! - normalized input (`PointerInputEvent`, `KeyEvent`, `ImeEvent`);
//! - the semantics tree compositions describe themselves with;
//! - scene-wide locals (`Density`, `LayoutDirection`,
//!   `CompositionLocalContext`);
//! - observable `State<T>` and its `ObserverRegistry`;
//! - the `Canvas` draw-command sink and frame-driven `AnimatedValue`.
//!
//! ```rust
//! use repose_core::*;
//!
//! let node = SemanticsNode::new(1, Rect::new(0.0, 0.0, 40.0, 20.0))
//!     .with(SemanticsProperty::Role(Role::Button))
//!     .with(SemanticsProperty::Text("OK".into()));
//! assert!(node.config.is_meaningful());
//! assert_eq!(node.config.text(), Some("OK"));
//! ```

pub mod animation;
pub mod canvas;
pub mod color;
pub mod effects;
pub mod geometry;
pub mod input;
pub mod locals;
pub mod observer;
pub mod prelude;
pub mod semantics;

pub use animation::*;
pub use canvas::*;
pub use color::*;
pub use effects::*;
pub use geometry::*;
pub use input::*;
pub use locals::*;
pub use observer::*;
pub use semantics::*;
