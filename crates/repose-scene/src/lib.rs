//! # Repose scene
//!
//! A [`Scene`] owns the content of one host window: a main owner plus any
//! number of overlay layers, each backed by a [`Composition`]. The host
//! feeds it platform-neutral input and calls [`Scene::render`] whenever the
//! redraw callback fires; the scene does the rest:
//!
//! - pointer streams are repaired by the [`SyntheticEventSequencer`] before
//!   delivery (missing moves, presses and releases are synthesized);
//! - a [`FrameClock`] suspends effects until the next frame;
//! - a thread-safe [`CommandQueue`] runs deferred work at the start of a
//!   render;
//! - an [`AccessibilityMediator`] per owner keeps an accessibility projection
//!   in step with the owner's semantics and reports changes to an
//!   [`AccessibilityHost`].
//!
//! ```rust
//! use repose_core::*;
//! use repose_scene::*;
//! use std::cell::Cell;
//! use std::rc::Rc;
//!
//! let mut scene = Scene::new(SceneConfig::new().with_size(100, 100), || {});
//! let clicks = Rc::new(Cell::new(0));
//! let c = clicks.clone();
//! scene
//!     .set_content(move |_| {
//!         let c = c.clone();
//!         RegionComposition::new(move |_| {
//!             let c = c.clone();
//!             vec![HitRegion::new(1, Rect::new(0.0, 0.0, 50.0, 50.0))
//!                 .clickable(move || c.set(c.get() + 1))]
//!         })
//!     })
//!     .unwrap();
//!
//! let mut canvas = RecordingCanvas::new();
//! scene.render(&mut canvas, 0).unwrap();
//! let at = |t| PointerInput::new(t, Vec2::new(10.0, 10.0), PointerType::Mouse, 0);
//! scene.send_pointer_event(at(PointerEventType::Press)).unwrap();
//! scene.send_pointer_event(at(PointerEventType::Release)).unwrap();
//! assert_eq!(clicks.get(), 1);
//! ```

pub mod accessibility;
pub mod command_queue;
pub mod composition;
pub mod config;
pub mod error;
pub mod executor;
pub mod frame_clock;
pub mod input_graph;
pub mod invalidation;
mod owner;
pub mod pointer_state;
pub mod scene;
pub mod sequencer;
pub mod tests;

pub use accessibility::{
    AccessibilityElement, AccessibilityHost, AccessibilityMediator, AccessibilityNotification,
    AccessibilitySyncOptions, AccessibilityTree, AccessibleRole, ElementActions, Traits,
};
pub use command_queue::{Command, CommandQueue, CommandSender};
pub use composition::{Composition, Environment, OwnerContext};
pub use config::SceneConfig;
pub use error::{AccessibilityQueryError, CallbackPanic, ExceptionHandler, SceneError};
pub use executor::{Executor, TaskHandle};
pub use frame_clock::{FrameClock, FrameFuture};
pub use input_graph::{HitRegion, InputGraph, RegionComposition};
pub use invalidation::InvalidationWatcher;
pub use owner::{LayerId, OwnerId};
pub use pointer_state::PointerStateTracker;
pub use scene::{PointerInput, Scene};
pub use sequencer::{SyntheticEventSequencer, should_insert_move};
