//! Frame-driven animation.
//!
//! Animations here have no clock of their own. They are advanced with the
//! timestamps a scene's frame clock hands to frame waiters, so every value
//! animated in one frame sees the same time, and tests drive time by sending
//! frames.

use std::time::Duration;

/// Maps linear progress in `0..=1` to eased progress.
#[derive(Clone, Copy, Debug, PartialEq)]
pub enum Easing {
    Linear,
    /// Quadratic acceleration from rest.
    Accelerate,
    /// Quadratic deceleration to rest.
    Decelerate,
    /// Smoothstep: slow at both ends.
    Standard,
    /// Damped oscillation around the target. `damping_ratio` below 1 overshoots.
    Spring { damping_ratio: f32, oscillations: f32 },
}

impl Easing {
    pub fn transform(self, progress: f32) -> f32 {
        let t = progress.clamp(0.0, 1.0);
        match self {
            Self::Linear => t,
            Self::Accelerate => t.powi(2),
            Self::Decelerate => 1.0 - (1.0 - t).powi(2),
            Self::Standard => t * t * (3.0 - 2.0 * t),
            Self::Spring {
                damping_ratio,
                oscillations,
            } => {
                if t >= 1.0 {
                    return 1.0;
                }
                let decay = (-damping_ratio.max(0.0) * 6.0 * t).exp();
                let phase = std::f32::consts::TAU * oscillations.max(0.0) * t;
                1.0 - decay * phase.cos()
            }
        }
    }
}

#[derive(Clone, Copy, Debug, PartialEq)]
pub struct AnimationSpec {
    pub duration: Duration,
    pub easing: Easing,
    pub delay: Duration,
}

impl Default for AnimationSpec {
    fn default() -> Self {
        Self::tween(Duration::from_millis(250), Easing::Standard)
    }
}

impl AnimationSpec {
    pub fn tween(duration: Duration, easing: Easing) -> Self {
        AnimationSpec {
            duration,
            easing,
            delay: Duration::ZERO,
        }
    }

    pub fn spring(duration: Duration) -> Self {
        Self::tween(
            duration,
            Easing::Spring {
                damping_ratio: 0.6,
                oscillations: 1.5,
            },
        )
    }

    pub fn with_delay(self, delay: Duration) -> Self {
        AnimationSpec { delay, ..self }
    }

    /// Eased progress `elapsed` after the animation started, or `None` once
    /// the delay and duration have both passed.
    fn progress_at(&self, elapsed: Duration) -> Option<f32> {
        let Some(active) = elapsed.checked_sub(self.delay) else {
            return Some(0.0);
        };
        if active >= self.duration {
            return None;
        }
        Some(self.easing.transform(active.as_secs_f32() / self.duration.as_secs_f32()))
    }
}

/// Values that can be blended linearly.
pub trait Interpolate: Clone {
    fn lerp(&self, to: &Self, fraction: f32) -> Self;
}

impl Interpolate for f32 {
    fn lerp(&self, to: &Self, fraction: f32) -> Self {
        self + (to - self) * fraction
    }
}

impl Interpolate for crate::Vec2 {
    fn lerp(&self, to: &Self, fraction: f32) -> Self {
        crate::Vec2::new(self.x.lerp(&to.x, fraction), self.y.lerp(&to.y, fraction))
    }
}

impl Interpolate for crate::Color {
    fn lerp(&self, to: &Self, fraction: f32) -> Self {
        let [a, b] = [self.channels(), to.channels()];
        let mix = |i: usize| (a[i] as f32).lerp(&(b[i] as f32), fraction).round().clamp(0.0, 255.0) as u8;
        crate::Color(mix(0), mix(1), mix(2), mix(3))
    }
}

/// Value that moves toward a target over frames.
///
/// The first frame after [`AnimatedValue::set_target`] becomes the start
/// time, so a target set between frames does not skip ahead.
#[derive(Clone, Debug)]
pub struct AnimatedValue<T: Interpolate> {
    value: T,
    from: T,
    to: T,
    spec: AnimationSpec,
    /// `Some` while running; the inner option is the first frame seen.
    run: Option<Option<i64>>,
}

impl<T: Interpolate> AnimatedValue<T> {
    pub fn new(initial: T, spec: AnimationSpec) -> Self {
        AnimatedValue {
            from: initial.clone(),
            to: initial.clone(),
            value: initial,
            spec,
            run: None,
        }
    }

    pub fn set_target(&mut self, target: T) {
        self.from = self.value.clone();
        self.to = target;
        self.run = Some(None);
    }

    /// Jumps to `value` and stops any running animation.
    pub fn snap_to(&mut self, value: T) {
        self.from = value.clone();
        self.to = value.clone();
        self.value = value;
        self.run = None;
    }

    /// Advances to the frame at `frame_nanos`. Returns whether the animation
    /// still needs frames.
    pub fn advance(&mut self, frame_nanos: i64) -> bool {
        let Some(started) = self.run.as_mut() else {
            return false;
        };
        let start = *started.get_or_insert(frame_nanos);
        let elapsed = Duration::from_nanos(u64::try_from(frame_nanos.saturating_sub(start)).unwrap_or(0));
        match self.spec.progress_at(elapsed) {
            Some(fraction) => {
                self.value = self.from.lerp(&self.to, fraction);
                true
            }
            None => {
                self.value = self.to.clone();
                self.run = None;
                false
            }
        }
    }

    pub fn get(&self) -> &T {
        &self.value
    }

    pub fn target(&self) -> &T {
        &self.to
    }

    pub fn is_animating(&self) -> bool {
        self.run.is_some()
    }
}
