pub use crate::animation::{AnimatedValue, AnimationSpec, Easing, Interpolate};
pub use crate::canvas::{Canvas, DrawCommand, RecordingCanvas};
pub use crate::color::Color;
pub use crate::effects::{Dispose, DisposeBag};
pub use crate::geometry::{Constraints, IntSize, Rect, Size, Vec2};
pub use crate::input::*;
pub use crate::locals::{
    CompositionLocalContext, Density, Dp, LayoutDirection, density, layout_direction, local,
    with_density, with_layout_direction,
};
pub use crate::observer::{ObserverId, ObserverRegistry, State};
pub use crate::semantics::{
    Role, SemanticsAction, SemanticsConfig, SemanticsId, SemanticsKey, SemanticsNode,
    SemanticsProperty, ToggleableState,
};
