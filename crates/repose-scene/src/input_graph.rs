//! Hit-region input graph.
//!
//! The simplest useful [`Composition`]: content is a flat list of
//! rectangular [`HitRegion`]s in paint order (parents before children), each
//! with optional callbacks. The graph keeps per-pointer hover sets, pointer
//! capture and keyboard focus, and derives a semantics tree from region
//! containment.

use std::collections::HashMap;
use std::rc::Rc;

use repose_core::{
    Canvas, Color, Constraints, IntSize, Key, KeyEvent, KeyEventType, PointerEventType, PointerId,
    PointerInputEvent, Rect, SemanticsAction, SemanticsConfig, SemanticsId, SemanticsNode,
    SemanticsProperty, Vec2,
};

use crate::composition::{Composition, Environment, OwnerContext};

pub type PointerCallback = Rc<dyn Fn(&PointerInputEvent)>;

/// Id of the synthetic semantics root a region graph reports.
pub const ROOT_SEMANTICS_ID: SemanticsId = 0;

#[derive(Clone, Default)]
pub struct HitRegion {
    pub id: u64,
    pub rect: Rect,
    pub focusable: bool,
    pub background: Option<Color>,
    pub on_click: Option<Rc<dyn Fn()>>,
    pub on_pointer_down: Option<PointerCallback>,
    pub on_pointer_up: Option<PointerCallback>,
    pub on_pointer_move: Option<PointerCallback>,
    pub on_pointer_enter: Option<PointerCallback>,
    pub on_pointer_leave: Option<PointerCallback>,
    /// Receives a delta and returns what it did not consume.
    pub on_scroll: Option<Rc<dyn Fn(Vec2) -> Vec2>>,
    pub on_key: Option<Rc<dyn Fn(&KeyEvent) -> bool>>,
    pub semantics: Option<SemanticsConfig>,
}

impl HitRegion {
    pub fn new(id: u64, rect: Rect) -> Self {
        Self {
            id,
            rect,
            ..Default::default()
        }
    }

    pub fn clickable(mut self, f: impl Fn() + 'static) -> Self {
        self.on_click = Some(Rc::new(f));
        self
    }

    pub fn focusable(mut self) -> Self {
        self.focusable = true;
        self
    }

    pub fn background(mut self, color: Color) -> Self {
        self.background = Some(color);
        self
    }

    pub fn on_pointer_down(mut self, f: impl Fn(&PointerInputEvent) + 'static) -> Self {
        self.on_pointer_down = Some(Rc::new(f));
        self
    }

    pub fn on_pointer_up(mut self, f: impl Fn(&PointerInputEvent) + 'static) -> Self {
        self.on_pointer_up = Some(Rc::new(f));
        self
    }

    pub fn on_pointer_move(mut self, f: impl Fn(&PointerInputEvent) + 'static) -> Self {
        self.on_pointer_move = Some(Rc::new(f));
        self
    }

    pub fn on_pointer_enter(mut self, f: impl Fn(&PointerInputEvent) + 'static) -> Self {
        self.on_pointer_enter = Some(Rc::new(f));
        self
    }

    pub fn on_pointer_leave(mut self, f: impl Fn(&PointerInputEvent) + 'static) -> Self {
        self.on_pointer_leave = Some(Rc::new(f));
        self
    }

    pub fn on_scroll(mut self, f: impl Fn(Vec2) -> Vec2 + 'static) -> Self {
        self.on_scroll = Some(Rc::new(f));
        self
    }

    pub fn on_key(mut self, f: impl Fn(&KeyEvent) -> bool + 'static) -> Self {
        self.on_key = Some(Rc::new(f));
        self
    }

    pub fn semantics(mut self, config: SemanticsConfig) -> Self {
        self.semantics = Some(config);
        self
    }

    fn handles_press(&self) -> bool {
        self.on_click.is_some() || self.on_pointer_down.is_some() || self.on_pointer_up.is_some()
    }
}

#[derive(Default)]
pub struct InputGraph {
    regions: Vec<HitRegion>,
    hovered: HashMap<PointerId, Vec<u64>>,
    captured: HashMap<PointerId, u64>,
    focused: Option<u64>,
}

impl InputGraph {
    pub fn new() -> Self {
        Self::default()
    }

    /// Replaces the content. Hover, capture and focus on regions that are
    /// gone are dropped silently.
    pub fn set_regions(&mut self, regions: Vec<HitRegion>) {
        self.regions = regions;
        let live: Vec<u64> = self.regions.iter().map(|r| r.id).collect();
        for ids in self.hovered.values_mut() {
            ids.retain(|id| live.contains(id));
        }
        self.captured.retain(|_, id| live.contains(id));
        if self.focused.is_some_and(|id| !live.contains(&id)) {
            self.focused = None;
        }
    }

    pub fn regions(&self) -> &[HitRegion] {
        &self.regions
    }

    pub fn focused(&self) -> Option<u64> {
        self.focused
    }

    pub fn set_focused(&mut self, id: Option<u64>) {
        self.focused = id;
    }

    pub fn hovered(&self, pointer: PointerId) -> &[u64] {
        self.hovered.get(&pointer).map(Vec::as_slice).unwrap_or(&[])
    }

    fn region(&self, id: u64) -> Option<&HitRegion> {
        self.regions.iter().find(|r| r.id == id)
    }

    /// Regions under `pos`, topmost first.
    pub fn hit_path(&self, pos: Vec2) -> Vec<&HitRegion> {
        self.regions.iter().rev().filter(|r| r.rect.contains(pos)).collect()
    }

    pub fn contains(&self, pos: Vec2) -> bool {
        self.regions.iter().any(|r| r.rect.contains(pos))
    }

    /// Bounding size of all regions.
    pub fn extent(&self) -> IntSize {
        let (w, h) = self.regions.iter().fold((0.0f32, 0.0f32), |(w, h), r| {
            (w.max(r.rect.x + r.rect.w), h.max(r.rect.y + r.rect.h))
        });
        IntSize::new(w.max(0.0).ceil() as u32, h.max(0.0).ceil() as u32)
    }

    /// Returns whether anything handled the event.
    pub fn dispatch(&mut self, event: &PointerInputEvent) -> bool {
        match event.event_type {
            PointerEventType::Move | PointerEventType::Enter => {
                let hover_changed = self.update_hover(event);
                self.deliver_move(event) || hover_changed
            }
            PointerEventType::Exit => self.exit_all(event),
            PointerEventType::Press => self.press(event),
            PointerEventType::Release => self.release(event),
            PointerEventType::Scroll => self.scroll(event),
            PointerEventType::Unknown => false,
        }
    }

    fn update_hover(&mut self, event: &PointerInputEvent) -> bool {
        let mut changed = false;
        for p in &event.pointers {
            let now: Vec<u64> = self.hit_path(p.position).iter().map(|r| r.id).collect();
            let before = self.hovered.remove(&p.id).unwrap_or_default();
            let left: Vec<u64> = before.iter().copied().filter(|id| !now.contains(id)).collect();
            let entered: Vec<u64> = now.iter().copied().filter(|id| !before.contains(id)).collect();
            for id in &left {
                if let Some(cb) = self.region(*id).and_then(|r| r.on_pointer_leave.clone()) {
                    cb(event);
                }
            }
            for id in &entered {
                if let Some(cb) = self.region(*id).and_then(|r| r.on_pointer_enter.clone()) {
                    cb(event);
                }
            }
            changed |= !left.is_empty() || !entered.is_empty();
            if !now.is_empty() {
                self.hovered.insert(p.id, now);
            }
        }
        changed
    }

    fn exit_all(&mut self, event: &PointerInputEvent) -> bool {
        let mut changed = false;
        for p in &event.pointers {
            for id in self.hovered.remove(&p.id).unwrap_or_default() {
                changed = true;
                if let Some(cb) = self.region(id).and_then(|r| r.on_pointer_leave.clone()) {
                    cb(event);
                }
            }
        }
        changed
    }

    fn deliver_move(&self, event: &PointerInputEvent) -> bool {
        let mut handled = false;
        for p in &event.pointers {
            let target = match self.captured.get(&p.id) {
                Some(id) => self.region(*id),
                None => self
                    .hit_path(p.position)
                    .into_iter()
                    .find(|r| r.on_pointer_move.is_some()),
            };
            if let Some(cb) = target.and_then(|r| r.on_pointer_move.clone()) {
                cb(event);
                handled = true;
            }
        }
        handled
    }

    fn press(&mut self, event: &PointerInputEvent) -> bool {
        let mut handled = false;
        for p in event.pointers.iter().filter(|p| p.pressed) {
            if self.captured.contains_key(&p.id) {
                continue;
            }
            let path = self.hit_path(p.position);
            let focus = path.iter().find(|r| r.focusable).map(|r| r.id);
            let target = path
                .iter()
                .find(|r| r.handles_press())
                .map(|r| (r.id, r.on_pointer_down.clone()));
            self.focused = focus;
            if let Some((id, on_down)) = target {
                self.captured.insert(p.id, id);
                if let Some(cb) = on_down {
                    cb(event);
                }
                handled = true;
            }
        }
        handled
    }

    fn release(&mut self, event: &PointerInputEvent) -> bool {
        let mut handled = false;
        for p in event.pointers.iter().filter(|p| !p.pressed) {
            let Some(id) = self.captured.remove(&p.id) else {
                continue;
            };
            let Some(region) = self.region(id).cloned() else {
                continue;
            };
            handled = true;
            if let Some(cb) = &region.on_pointer_up {
                cb(event);
            }
            // Click on release if the pointer is still over the captured region.
            if region.rect.contains(p.position)
                && let Some(cb) = &region.on_click
            {
                cb();
            }
        }
        handled
    }

    fn scroll(&self, event: &PointerInputEvent) -> bool {
        let Some(pos) = event.position() else {
            return false;
        };
        let delta = event.scroll_delta();
        for region in self.hit_path(pos) {
            if let Some(cb) = &region.on_scroll {
                let leftover = cb(delta);
                let consumed_x = (delta.x - leftover.x).abs() > 0.001;
                let consumed_y = (delta.y - leftover.y).abs() > 0.001;
                if consumed_x || consumed_y {
                    return true;
                }
            }
        }
        false
    }

    /// Keys go to the focused region; Enter and Space activate a focused
    /// clickable region that does not handle them itself.
    pub fn key(&self, event: &KeyEvent) -> bool {
        let Some(region) = self.focused.and_then(|id| self.region(id)) else {
            return false;
        };
        if let Some(cb) = &region.on_key
            && cb(event)
        {
            return true;
        }
        if event.event_type == KeyEventType::KeyDown
            && !event.is_repeat
            && matches!(event.key, Key::Enter | Key::Space)
            && let Some(cb) = &region.on_click
        {
            cb();
            return true;
        }
        false
    }

    /// Semantics tree by containment: each region hangs under the last
    /// earlier region that fully contains it.
    pub fn semantics(&self, size: IntSize) -> SemanticsNode {
        let mut parents: Vec<Option<usize>> = Vec::with_capacity(self.regions.len());
        for (i, r) in self.regions.iter().enumerate() {
            let parent = (0..i).rev().find(|&j| encloses(self.regions[j].rect, r.rect));
            parents.push(parent);
        }
        let mut root = SemanticsNode::new(ROOT_SEMANTICS_ID, size.to_rect());
        root.children = self.semantics_children(None, &parents);
        root
    }

    fn semantics_children(&self, parent: Option<usize>, parents: &[Option<usize>]) -> Vec<SemanticsNode> {
        (0..self.regions.len())
            .filter(|&i| parents[i] == parent)
            .map(|i| {
                let r = &self.regions[i];
                let mut node = SemanticsNode::new(r.id, r.rect);
                if let Some(config) = &r.semantics {
                    node.config = config.clone();
                }
                if r.on_click.is_some() && !node.config.is_clickable() {
                    node.config.set(SemanticsProperty::OnClick(None));
                }
                if r.focusable {
                    node.config.set(SemanticsProperty::Focusable);
                    node.config
                        .set(SemanticsProperty::Focused(self.focused == Some(r.id)));
                }
                node.children = self.semantics_children(Some(i), parents);
                node
            })
            .collect()
    }

    pub fn perform_action(&mut self, id: SemanticsId, action: &SemanticsAction) -> bool {
        let Some(region) = self.region(id).cloned() else {
            return false;
        };
        match action {
            SemanticsAction::Click => match &region.on_click {
                Some(cb) => {
                    cb();
                    true
                }
                None => false,
            },
            SemanticsAction::Focus if region.focusable => {
                self.focused = Some(id);
                true
            }
            SemanticsAction::ScrollForward | SemanticsAction::ScrollBackward => {
                let Some(cb) = &region.on_scroll else {
                    return false;
                };
                let sign = if *action == SemanticsAction::ScrollForward {
                    1.0
                } else {
                    -1.0
                };
                let delta = Vec2::new(0.0, sign * region.rect.h);
                cb(delta) != delta
            }
            _ => false,
        }
    }
}

fn encloses(outer: Rect, inner: Rect) -> bool {
    inner.x >= outer.x
        && inner.y >= outer.y
        && inner.x + inner.w <= outer.x + outer.w
        && inner.y + inner.h <= outer.y + outer.h
}

type RegionBuilder = Box<dyn Fn(&OwnerContext) -> Vec<HitRegion>>;

/// A [`Composition`] whose content is rebuilt from a region list on every
/// recompose.
pub struct RegionComposition {
    build: RegionBuilder,
    graph: InputGraph,
    size: IntSize,
    cx: Option<OwnerContext>,
}

impl RegionComposition {
    pub fn new(build: impl Fn(&OwnerContext) -> Vec<HitRegion> + 'static) -> Self {
        Self {
            build: Box::new(build),
            graph: InputGraph::new(),
            size: IntSize::ZERO,
            cx: None,
        }
    }

    pub fn graph(&self) -> &InputGraph {
        &self.graph
    }

    fn focus_may_have_changed(&self, before: Option<u64>) {
        if self.graph.focused() != before
            && let Some(cx) = &self.cx
        {
            cx.semantics_changed();
            cx.request_redraw();
        }
    }
}

impl Composition for RegionComposition {
    fn recompose(&mut self, cx: &OwnerContext) {
        self.graph.set_regions((self.build)(cx));
        self.cx = Some(cx.clone());
    }

    fn measure(&mut self, constraints: Constraints, _env: &Environment) -> IntSize {
        constraints.constrain(self.graph.extent())
    }

    fn layout(&mut self, size: IntSize, _env: &Environment) {
        self.size = size;
    }

    fn draw(&mut self, canvas: &mut dyn Canvas, _env: &Environment) {
        for r in self.graph.regions() {
            if let Some(color) = r.background {
                canvas.fill_rect(r.rect, color);
            }
        }
    }

    fn contains(&self, position: Vec2) -> bool {
        self.graph.contains(position)
    }

    fn on_pointer_event(&mut self, event: &PointerInputEvent) -> bool {
        let before = self.graph.focused();
        let handled = self.graph.dispatch(event);
        self.focus_may_have_changed(before);
        handled
    }

    fn on_key_event(&mut self, event: &KeyEvent) -> bool {
        self.graph.key(event)
    }

    fn semantics(&self) -> Option<SemanticsNode> {
        Some(self.graph.semantics(self.size))
    }

    fn perform_semantics_action(&mut self, id: SemanticsId, action: &SemanticsAction) -> bool {
        let before = self.graph.focused();
        let done = self.graph.perform_action(id, action);
        self.focus_may_have_changed(before);
        done
    }

    fn dispose(&mut self) {
        self.graph.set_regions(Vec::new());
        self.cx = None;
    }
}
