//! Synthetic pointer events.
//!
//! Hosts skip, merge and reorder low-level pointer signals. Content cannot
//! cope with that: a press at a position it never saw a move to leaves hover
//! state on the wrong target, and two fingers landing in one host event look
//! like a single gesture. The sequencer compares each event with the last one
//! it let through and emits the missing events in front of it:
//!
//! 1. a Move to the new positions, when a non-move event moved a pointer;
//! 2. one Release per extra pointer lifted in the same event;
//! 3. one Press per extra pointer put down in the same event;
//! 4. the event itself.
//!
//! It also remembers a "pending move": after content moves under a stationary
//! pointer the scene re-sends the last position so hover follows the content.

use std::collections::HashSet;

use repose_core::{PointerEventType, PointerId, PointerInputData, PointerInputEvent, Vec2};
use smallvec::SmallVec;

pub type SequencedEvents = SmallVec<[PointerInputEvent; 4]>;

/// True iff `current` is not Move/Enter/Exit and at least one of its
/// pointers sits somewhere other than where `previous` had it. Pointers that
/// `previous` does not know about never count as moved.
pub fn should_insert_move(previous: Option<&PointerInputEvent>, current: &PointerInputEvent) -> bool {
    let Some(previous) = previous else {
        return false;
    };
    !current.is_move() && !same_positions(previous, current)
}

fn same_positions(previous: &PointerInputEvent, current: &PointerInputEvent) -> bool {
    current.pointers.iter().all(|p| match previous.pointer(p.id) {
        Some(prev) => prev.position == p.position,
        None => true,
    })
}

/// Copy of `source` as a synthetic event: no native back-reference and no
/// scroll delta.
fn synthetic(
    source: &PointerInputEvent,
    event_type: PointerEventType,
    pointer: impl Fn(&PointerInputData) -> PointerInputData,
) -> PointerInputEvent {
    PointerInputEvent {
        event_type,
        pointers: source
            .pointers
            .iter()
            .map(|p| PointerInputData {
                scroll_delta: Vec2::ZERO,
                ..pointer(p)
            })
            .collect(),
        buttons: source.buttons,
        modifiers: source.modifiers,
        timestamp_millis: source.timestamp_millis,
        native_event: None,
    }
}

#[derive(Default)]
pub struct SyntheticEventSequencer {
    previous: Option<PointerInputEvent>,
    needs_move: bool,
}

impl SyntheticEventSequencer {
    pub fn new() -> Self {
        Self::default()
    }

    /// Forgets the previous event and any pending move.
    pub fn reset(&mut self) {
        self.previous = None;
        self.needs_move = false;
    }

    /// Last event let through, without its native back-reference.
    pub fn previous(&self) -> Option<&PointerInputEvent> {
        self.previous.as_ref()
    }

    /// Events to deliver for `current`, synthetic ones first, `current` last.
    pub fn sequence(&mut self, current: PointerInputEvent) -> SequencedEvents {
        let mut out = SequencedEvents::new();
        self.push_missing_move(&current, &mut out);
        self.push_missing_releases(&current, &mut out);
        self.push_missing_presses(&current, &mut out);
        self.remember(&current);
        out.push(current);
        out
    }

    /// Asks for the last pointer position to be re-sent before the next draw.
    pub fn request_pending_move(&mut self) {
        if self.previous.is_some() {
            self.needs_move = true;
        }
    }

    pub fn has_pending_move(&self) -> bool {
        self.needs_move
    }

    /// The pending move, if one was requested and a pointer position is known.
    pub fn take_pending_move(&mut self) -> Option<PointerInputEvent> {
        if !std::mem::take(&mut self.needs_move) {
            return None;
        }
        let previous = self.previous.as_ref()?;
        if previous.pointers.is_empty() {
            return None;
        }
        let ev = synthetic(previous, PointerEventType::Move, |p| *p);
        self.remember(&ev);
        Some(ev)
    }

    fn remember(&mut self, ev: &PointerInputEvent) {
        self.previous = Some(ev.detached());
    }

    fn push_missing_move(&mut self, current: &PointerInputEvent, out: &mut SequencedEvents) {
        let pending = std::mem::take(&mut self.needs_move);
        let Some(previous) = self.previous.as_ref() else {
            return;
        };
        if !(should_insert_move(Some(previous), current) || (pending && !current.is_move())) {
            return;
        }
        // Previous pointers and pressed state, current positions, buttons,
        // modifiers and time.
        let mut ev = synthetic(previous, PointerEventType::Move, |p| PointerInputData {
            position: current.pointer(p.id).map(|c| c.position).unwrap_or(p.position),
            ..*p
        });
        ev.buttons = current.buttons;
        ev.modifiers = current.modifiers;
        ev.timestamp_millis = current.timestamp_millis;
        log::trace!("synthetic move inserted before {:?}", current.event_type);
        self.remember(&ev);
        out.push(ev);
    }

    fn push_missing_releases(&mut self, current: &PointerInputEvent, out: &mut SequencedEvents) {
        let Some(previous) = self.previous.clone() else {
            return;
        };
        let now_pressed: HashSet<PointerId> = current.pressed_ids().into_iter().collect();
        let released: Vec<PointerId> = previous
            .pressed_ids()
            .into_iter()
            .filter(|id| !now_pressed.contains(id))
            .collect();
        if released.len() < 2 {
            return;
        }
        // The last released pointer is delivered by the real event.
        let mut lifted = HashSet::new();
        for id in released[..released.len() - 1].iter().rev() {
            lifted.insert(*id);
            let ev = synthetic(&previous, PointerEventType::Release, |p| PointerInputData {
                pressed: p.pressed && !lifted.contains(&p.id),
                ..*p
            });
            log::trace!("synthetic release for {id:?}");
            self.remember(&ev);
            out.push(ev);
        }
    }

    fn push_missing_presses(&mut self, current: &PointerInputEvent, out: &mut SequencedEvents) {
        let was_pressed: HashSet<PointerId> = self
            .previous
            .as_ref()
            .map(|p| p.pressed_ids().into_iter().collect())
            .unwrap_or_default();
        let pressed: Vec<PointerId> = current
            .pressed_ids()
            .into_iter()
            .filter(|id| !was_pressed.contains(id))
            .collect();
        if pressed.len() < 2 {
            return;
        }
        // The last pressed pointer is delivered by the real event.
        let mut down = HashSet::new();
        for id in &pressed[..pressed.len() - 1] {
            down.insert(*id);
            let ev = synthetic(current, PointerEventType::Press, |p| PointerInputData {
                pressed: if pressed.contains(&p.id) {
                    down.contains(&p.id)
                } else {
                    p.pressed
                },
                ..*p
            });
            log::trace!("synthetic press for {id:?}");
            self.remember(&ev);
            out.push(ev);
        }
    }
}
