//! Touch input from hosts that report per-finger changes (mobile views).
//!
//! A host event may carry several changed touches at once. The adapter keeps
//! every finger that is down and sends one multi-pointer event per host
//! event; the scene's sequencer splits simultaneous presses and releases.

use std::collections::BTreeMap;

use anyhow::Context;
use repose_core::{PointerEventType, PointerId, PointerInputData, PointerType, Vec2};
use repose_scene::{PointerInput, Scene};

use crate::InputAdapter;

#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum TouchPhase {
    Started,
    Moved,
    Ended,
    Cancelled,
}

#[derive(Clone, Copy, Debug, PartialEq)]
pub struct TouchPoint {
    pub id: u64,
    pub phase: TouchPhase,
    /// Device pixels, window relative.
    pub position: Vec2,
    /// Normalized to 0..=1 when the host reports it.
    pub pressure: Option<f32>,
}

impl TouchPoint {
    pub fn new(id: u64, phase: TouchPhase, position: Vec2) -> Self {
        Self {
            id,
            phase,
            position,
            pressure: None,
        }
    }
}

/// Changed touches of one host event.
#[derive(Clone, Debug, PartialEq)]
pub struct TouchEvent {
    pub changes: Vec<TouchPoint>,
    pub timestamp_millis: u64,
}

impl TouchEvent {
    pub fn single(point: TouchPoint, timestamp_millis: u64) -> Self {
        Self {
            changes: vec![point],
            timestamp_millis,
        }
    }
}

#[derive(Debug, Default)]
pub struct TouchInput {
    active: BTreeMap<u64, PointerInputData>,
}

impl TouchInput {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn active_count(&self) -> usize {
        self.active.len()
    }

    /// Forgets every finger, e.g. when the host view loses its window.
    pub fn reset(&mut self) {
        self.active.clear();
    }

    fn event_type(changes: &[TouchPoint]) -> PointerEventType {
        let any = |f: fn(TouchPhase) -> bool| changes.iter().any(|c| f(c.phase));
        if any(|p| p == TouchPhase::Started) {
            PointerEventType::Press
        } else if any(|p| matches!(p, TouchPhase::Ended | TouchPhase::Cancelled)) {
            PointerEventType::Release
        } else {
            PointerEventType::Move
        }
    }
}

impl InputAdapter for TouchInput {
    type Native<'a> = TouchEvent;

    fn handle(&mut self, scene: &mut Scene, native: TouchEvent) -> anyhow::Result<bool> {
        if native.changes.is_empty() {
            return Ok(false);
        }
        let event_type = Self::event_type(&native.changes);
        let mut lifted = Vec::new();
        let mut cancelled = false;
        for change in &native.changes {
            let down = matches!(change.phase, TouchPhase::Started | TouchPhase::Moved);
            let mut data = PointerInputData::new(PointerId(change.id), change.position, down, PointerType::Touch);
            if let Some(p) = change.pressure {
                data.pressure = p.clamp(0.0, 1.0);
            }
            if !down {
                lifted.push(change.id);
                cancelled |= change.phase == TouchPhase::Cancelled;
            }
            if change.phase != TouchPhase::Started && !self.active.contains_key(&change.id) {
                log::trace!("touch {} changed before it started", change.id);
            }
            self.active.insert(change.id, data);
        }

        let pointers: Vec<PointerInputData> = self.active.values().copied().collect();
        let lifted: Vec<PointerInputData> =
            lifted.iter().filter_map(|id| self.active.remove(id)).collect();
        let input = PointerInput::multi(event_type, pointers, native.timestamp_millis);
        let consumed = scene
            .send_pointer_event(input)
            .context("delivering touch event")?;

        // The scene ends hover for lifted fingers itself; a cancelled gesture
        // also leaves the scene so the next touch starts without lookback.
        if cancelled && self.active.is_empty() {
            let exit = PointerInput::multi(PointerEventType::Exit, lifted, native.timestamp_millis);
            scene.send_pointer_event(exit).context("delivering touch cancel")?;
        }
        Ok(consumed)
    }
}
