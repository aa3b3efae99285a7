//! # Scene-wide parameters and composition locals
//!
//! A scene exposes a few values to everything composed inside it:
//!
//! - `Density`: dp→px scale factor.
//! - `LayoutDirection`: LTR or RTL.
//! - `CompositionLocalContext`: an opaque snapshot of inherited values the
//!   host wants compositions to see (theme, locale, anything `'static`).
//!
//! Values live on a thread‑local stack of frames. The scene pushes a frame
//! around every recompose/layout/draw pass, so content reads them with the
//! plain getters:
//!
//! ```rust
//! use repose_core::*;
//!
//! with_density(Density::new(2.0), || {
//!     assert_eq!(Dp(8.0).to_px(), 16.0);
//! });
//! assert_eq!(density().scale, 1.0);
//! ```

use std::any::{Any, TypeId};
use std::cell::RefCell;
use std::collections::HashMap;
use std::rc::Rc;

type LocalsFrame = HashMap<TypeId, Rc<dyn Any>>;

thread_local! {
    static LOCALS_STACK: RefCell<Vec<LocalsFrame>> = const { RefCell::new(Vec::new()) };
}

#[derive(Clone, Copy, Debug, PartialEq)]
pub struct Density {
    pub scale: f32, // dp→px multiplier
}

impl Density {
    /// Non-finite or non-positive scales are a transient host state (a window
    /// being created or moved between monitors) and are coerced to 1.0.
    pub fn new(scale: f32) -> Self {
        if scale.is_finite() && scale > 0.0 {
            Self { scale }
        } else {
            log::warn!("density scale {scale} is not usable, falling back to 1.0");
            Self { scale: 1.0 }
        }
    }
}

impl Default for Density {
    fn default() -> Self {
        Self { scale: 1.0 }
    }
}

#[derive(Clone, Copy, Debug, Default, PartialEq, Eq, Hash)]
pub enum LayoutDirection {
    #[default]
    Ltr,
    Rtl,
}

/// density‑independent pixels (dp)
#[derive(Clone, Copy, Debug, PartialEq)]
pub struct Dp(pub f32);

impl Dp {
    /// Converts this dp value into physical pixels using the current Density.
    pub fn to_px(self) -> f32 {
        self.0 * density().scale
    }
}

/// Snapshot of inherited values handed to a scene by its host.
///
/// Cheap to clone; adding a value copies the map only when it is shared.
#[derive(Clone, Default)]
pub struct CompositionLocalContext {
    values: Rc<LocalsFrame>,
}

impl CompositionLocalContext {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with_value<T: Any>(mut self, value: T) -> Self {
        Rc::make_mut(&mut self.values).insert(TypeId::of::<T>(), Rc::new(value));
        self
    }

    pub fn get<T: Any + Clone>(&self) -> Option<T> {
        self.values
            .get(&TypeId::of::<T>())
            .and_then(|v| v.downcast_ref::<T>())
            .cloned()
    }

    pub fn len(&self) -> usize {
        self.values.len()
    }

    pub fn is_empty(&self) -> bool {
        self.values.is_empty()
    }

    /// Runs `f` with every value of this context visible through [`local`].
    pub fn provide<R>(&self, f: impl FnOnce() -> R) -> R {
        with_locals_frame(self.values.as_ref().clone(), f)
    }
}

impl std::fmt::Debug for CompositionLocalContext {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("CompositionLocalContext")
            .field("len", &self.values.len())
            .finish()
    }
}

fn with_locals_frame<R>(frame: LocalsFrame, f: impl FnOnce() -> R) -> R {
    // Non-panicking frame guard (ensures pop on unwind)
    struct Guard;
    impl Drop for Guard {
        fn drop(&mut self) {
            LOCALS_STACK.with(|st| {
                st.borrow_mut().pop();
            });
        }
    }
    LOCALS_STACK.with(|st| st.borrow_mut().push(frame));
    let _guard = Guard;
    f()
}

fn with_single_local<T: Any, R>(value: T, f: impl FnOnce() -> R) -> R {
    let mut frame = LocalsFrame::new();
    frame.insert(TypeId::of::<T>(), Rc::new(value));
    with_locals_frame(frame, f)
}

/// Innermost provided value of type `T`, if any frame carries one.
pub fn local<T: Any + Clone>() -> Option<T> {
    LOCALS_STACK.with(|st| {
        st.borrow().iter().rev().find_map(|frame| {
            frame
                .get(&TypeId::of::<T>())
                .and_then(|v| v.downcast_ref::<T>())
                .cloned()
        })
    })
}

pub fn with_density<R>(density: Density, f: impl FnOnce() -> R) -> R {
    with_single_local(density, f)
}

pub fn with_layout_direction<R>(dir: LayoutDirection, f: impl FnOnce() -> R) -> R {
    with_single_local(dir, f)
}

pub fn density() -> Density {
    local::<Density>().unwrap_or_default()
}

pub fn layout_direction() -> LayoutDirection {
    local::<LayoutDirection>().unwrap_or_default()
}
