//! The scene: owner tree, input routing and the render pass.

use std::cell::RefCell;
use std::collections::HashMap;
use std::rc::Rc;

use repose_core::{
    Canvas, CompositionLocalContext, Constraints, Density, ImeEvent, IntSize, KeyEvent,
    KeyboardModifiers, LayoutDirection, NativeEvent, ObserverRegistry, PointerButtons,
    PointerEventType, PointerId, PointerInputData, PointerInputEvent, PointerType, Rect,
    SemanticsAction, SemanticsId, Vec2,
};
use slotmap::SlotMap;
use web_time::Instant;

use crate::accessibility::{
    AccessibilityHost, AccessibilityMediator, AccessibilitySyncOptions, AccessibilityTree,
};
use crate::command_queue::{CommandQueue, CommandSender};
use crate::composition::{Composition, OwnerContext, SceneParams, SceneServices};
use crate::config::SceneConfig;
use crate::error::{ExceptionHandler, SceneError, report_panic, run_guarded};
use crate::executor::Executor;
use crate::frame_clock::FrameClock;
use crate::invalidation::{InvalidationWatcher, Invalidator, RedrawSignal};
use crate::owner::{LayerId, Owner, OwnerId, OwnerState};
use crate::pointer_state::PointerStateTracker;
use crate::sequencer::SyntheticEventSequencer;

/// A pointer event as a platform adapter reports it. Buttons and modifiers
/// left as `None` are filled in from the scene's pointer state.
#[derive(Clone, Debug)]
pub struct PointerInput {
    pub event_type: PointerEventType,
    pub pointers: Vec<PointerInputData>,
    pub timestamp_millis: u64,
    pub buttons: Option<PointerButtons>,
    pub modifiers: Option<KeyboardModifiers>,
    pub native_event: Option<NativeEvent>,
    // Single-pointer events take `pressed` from the event type and buttons.
    derive_pressed: bool,
}

impl PointerInput {
    /// A single-pointer event. The pointer is pressed for Press, released
    /// for Release and otherwise pressed while any button is held.
    pub fn new(
        event_type: PointerEventType,
        position: Vec2,
        pointer_type: PointerType,
        timestamp_millis: u64,
    ) -> Self {
        Self {
            event_type,
            pointers: vec![PointerInputData::new(
                PointerId(0),
                position,
                event_type == PointerEventType::Press,
                pointer_type,
            )],
            timestamp_millis,
            buttons: None,
            modifiers: None,
            native_event: None,
            derive_pressed: true,
        }
    }

    /// A multi-pointer event; every pointer's `pressed` is taken as given.
    pub fn multi(
        event_type: PointerEventType,
        pointers: Vec<PointerInputData>,
        timestamp_millis: u64,
    ) -> Self {
        Self {
            event_type,
            pointers,
            timestamp_millis,
            buttons: None,
            modifiers: None,
            native_event: None,
            derive_pressed: false,
        }
    }

    pub fn with_scroll_delta(mut self, delta: Vec2) -> Self {
        if let Some(p) = self.pointers.first_mut() {
            p.scroll_delta = delta;
        }
        self
    }

    pub fn with_buttons(mut self, buttons: PointerButtons) -> Self {
        self.buttons = Some(buttons);
        self
    }

    pub fn with_modifiers(mut self, modifiers: KeyboardModifiers) -> Self {
        self.modifiers = Some(modifiers);
        self
    }

    pub fn with_native_event(mut self, native: NativeEvent) -> Self {
        self.native_event = Some(native);
        self
    }
}

/// Owns the content of one host window or view.
///
/// A scene is single-threaded: every method must be called on the thread
/// that created it. The only cross-thread surfaces are the senders from
/// [`Scene::commands`] and [`Scene::invalidation_watcher`].
///
/// After [`Scene::close`] every fallible method returns
/// [`SceneError::Closed`] and does nothing.
pub struct Scene {
    services: Rc<SceneServices>,
    main: Option<Owner>,
    layers: SlotMap<LayerId, Owner>,
    // bottom to top
    layer_order: Vec<LayerId>,
    sequencer: SyntheticEventSequencer,
    pointer_state: PointerStateTracker,
    capture: Option<OwnerId>,
    // owner that last received each pointer's moves
    hovered: HashMap<PointerId, OwnerId>,
    exception_handler: Option<ExceptionHandler>,
    accessibility_host: Option<Rc<dyn AccessibilityHost>>,
    accessibility_services_active: bool,
    config: SceneConfig,
    closed: bool,
}

impl Scene {
    /// `on_redraw` is called, possibly from another thread, whenever the
    /// scene wants [`Scene::render`] to run again.
    pub fn new(config: SceneConfig, on_redraw: impl Fn() + Send + Sync + 'static) -> Self {
        let signal = RedrawSignal::new(on_redraw);
        let observers = ObserverRegistry::new();
        observers.start();

        let frame_clock = FrameClock::new();
        let executor = Executor::new();
        let commands = CommandQueue::new();
        {
            let s = signal.clone();
            frame_clock.set_on_new_awaiters(move || s.request());
            let s = signal.clone();
            executor.set_wake_notify(move || s.request());
            let s = signal.clone();
            commands.set_notify(move || s.request());
            let s = signal.clone();
            observers.set_on_pending(move || s.request());
        }

        let services = Rc::new(SceneServices {
            invalidator: Invalidator::new(signal),
            frame_clock,
            executor,
            observers,
            commands,
            params: RefCell::new(SceneParams {
                density: config.density,
                layout_direction: config.layout_direction,
                constraints: config.constraints,
                locals: config.locals.clone(),
            }),
        });
        log::debug!("scene created with {:?}", config.constraints);
        Self {
            services,
            main: None,
            layers: SlotMap::with_key(),
            layer_order: Vec::new(),
            sequencer: SyntheticEventSequencer::new(),
            pointer_state: PointerStateTracker::new(),
            capture: None,
            hovered: HashMap::new(),
            exception_handler: None,
            accessibility_host: None,
            accessibility_services_active: false,
            config,
            closed: false,
        }
    }

    fn check_open(&self) -> Result<(), SceneError> {
        if self.closed {
            Err(SceneError::Closed)
        } else {
            Ok(())
        }
    }

    pub fn is_closed(&self) -> bool {
        self.closed
    }

    /// Routes panics from content callbacks to `handler` instead of letting
    /// them unwind into the caller.
    pub fn set_exception_handler(&mut self, handler: Option<ExceptionHandler>) -> Result<(), SceneError> {
        self.check_open()?;
        self.exception_handler = handler;
        Ok(())
    }

    fn new_mediator(&self) -> AccessibilityMediator {
        let mut m = AccessibilityMediator::new(
            self.config.accessibility,
            self.config.accessibility_sync_period,
            self.config.accessibility_activity_window,
        );
        m.set_services_active(self.accessibility_services_active);
        m
    }

    // ---- content & layers ----

    /// Installs `content` as the main owner, disposing the previous one.
    /// Effects launched while composing have run up to their first
    /// suspension when this returns.
    ///
    /// If `content` panics and an exception handler is installed, the scene
    /// is left without content and [`SceneError::NoContent`] is returned.
    pub fn set_content<C: Composition + 'static>(
        &mut self,
        content: impl FnOnce(&OwnerContext) -> C,
    ) -> Result<(), SceneError> {
        self.check_open()?;
        let services = self.services.clone();
        let handler = self.exception_handler.clone();
        {
            let _postpone = services.invalidator.postpone();
            if let Some(mut old) = self.main.take() {
                dispose_owner(handler.as_ref(), &mut old);
            }
            self.sequencer.reset();
            self.capture = None;
            self.hovered.clear();

            let bounds = services.params.borrow().constraints.max_size().to_rect();
            let mediator = self.new_mediator();
            let Some(mut owner) =
                build_owner(&services, handler.as_ref(), OwnerId::Main, bounds, mediator, content)
            else {
                log::warn!("content factory failed; scene has no content");
                return Err(SceneError::NoContent);
            };
            owner.focusable = true;
            recompose_owner(&services, handler.as_ref(), &mut owner);
            self.main = Some(owner);
            log::debug!("main owner attached");
            self.flush_effects();
            services.invalidator.request();
        }
        Ok(())
    }

    pub fn has_content(&self) -> bool {
        self.main.is_some()
    }

    /// Adds an overlay above every existing layer. `bounds` are in scene
    /// coordinates; a focusable layer takes key and IME input.
    pub fn add_layer<C: Composition + 'static>(
        &mut self,
        bounds: Rect,
        focusable: bool,
        content: impl FnOnce(&OwnerContext) -> C,
    ) -> Result<LayerId, SceneError> {
        self.check_open()?;
        let services = self.services.clone();
        let handler = self.exception_handler.clone();
        let _postpone = services.invalidator.postpone();

        let mediator = self.new_mediator();
        let id = self.layers.try_insert_with_key(|key| {
            let owner = build_owner(&services, handler.as_ref(), OwnerId::Layer(key), bounds, mediator, content);
            owner
                .map(|mut owner| {
                    owner.focusable = focusable;
                    owner
                })
                .ok_or(SceneError::NoContent)
        })?;
        if let Some(owner) = self.layers.get_mut(id) {
            recompose_owner(&services, handler.as_ref(), owner);
        }
        self.layer_order.push(id);
        log::debug!("layer {id:?} added at {bounds:?}");
        self.flush_effects();
        services.invalidator.request();
        Ok(id)
    }

    pub fn remove_layer(&mut self, id: LayerId) -> Result<(), SceneError> {
        self.check_open()?;
        let mut owner = self.layers.remove(id).ok_or(SceneError::UnknownLayer(id))?;
        self.layer_order.retain(|l| *l != id);
        let gone = Some(OwnerId::Layer(id));
        if self.capture == gone {
            self.capture = None;
        }
        self.hovered.retain(|_, owner| Some(*owner) != gone);
        dispose_owner(self.exception_handler.as_ref(), &mut owner);
        self.mark_all_draw();
        self.sequencer.request_pending_move();
        self.services.invalidator.request();
        log::debug!("layer {id:?} removed");
        Ok(())
    }

    pub fn set_layer_bounds(&mut self, id: LayerId, bounds: Rect) -> Result<(), SceneError> {
        self.check_open()?;
        let owner = self.layers.get(id).ok_or(SceneError::UnknownLayer(id))?;
        owner.state.bounds.set(bounds);
        owner.state.needs_layout.set(true);
        self.mark_all_draw();
        self.services.invalidator.request();
        Ok(())
    }

    /// `f` runs whenever a press lands outside the layer, before the press
    /// is delivered to whatever is below.
    pub fn set_layer_outside_press(
        &mut self,
        id: LayerId,
        f: impl FnMut() + 'static,
    ) -> Result<(), SceneError> {
        self.check_open()?;
        let owner = self.layers.get_mut(id).ok_or(SceneError::UnknownLayer(id))?;
        owner.on_outside_press = Some(Box::new(f));
        Ok(())
    }

    /// Layers, bottom to top.
    pub fn layers(&self) -> &[LayerId] {
        &self.layer_order
    }

    fn owner_ids(&self) -> Vec<OwnerId> {
        self.main
            .iter()
            .map(|_| OwnerId::Main)
            .chain(self.layer_order.iter().map(|l| OwnerId::Layer(*l)))
            .collect()
    }

    fn owner(&self, id: OwnerId) -> Option<&Owner> {
        match id {
            OwnerId::Main => self.main.as_ref(),
            OwnerId::Layer(l) => self.layers.get(l),
        }
    }

    fn owner_mut(&mut self, id: OwnerId) -> Option<&mut Owner> {
        match id {
            OwnerId::Main => self.main.as_mut(),
            OwnerId::Layer(l) => self.layers.get_mut(l),
        }
    }

    fn owner_or_err(&self, id: OwnerId) -> Result<&Owner, SceneError> {
        self.owner(id).ok_or(match id {
            OwnerId::Main => SceneError::NoContent,
            OwnerId::Layer(l) => SceneError::UnknownLayer(l),
        })
    }

    fn mark_all_draw(&self) {
        for id in self.owner_ids() {
            if let Some(o) = self.owner(id) {
                o.state.needs_draw.set(true);
            }
        }
    }

    fn mark_all_layout(&self) {
        for id in self.owner_ids() {
            if let Some(o) = self.owner(id) {
                o.state.needs_layout.set(true);
            }
        }
    }

    // ---- scene-wide parameters ----

    pub fn density(&self) -> Density {
        self.services.params.borrow().density
    }

    pub fn set_density(&mut self, density: Density) -> Result<(), SceneError> {
        self.check_open()?;
        self.services.params.borrow_mut().density = density;
        self.mark_all_layout();
        self.services.invalidator.request();
        Ok(())
    }

    pub fn layout_direction(&self) -> LayoutDirection {
        self.services.params.borrow().layout_direction
    }

    pub fn set_layout_direction(&mut self, dir: LayoutDirection) -> Result<(), SceneError> {
        self.check_open()?;
        self.services.params.borrow_mut().layout_direction = dir;
        self.mark_all_layout();
        for id in self.owner_ids() {
            if let Some(o) = self.owner(id) {
                o.state.mediator.borrow_mut().on_semantics_change();
            }
        }
        self.services.invalidator.request();
        Ok(())
    }

    pub fn constraints(&self) -> Constraints {
        self.services.params.borrow().constraints
    }

    /// Resizes the root. Zero-size constraints are accepted; layout and
    /// drawing of the main owner are skipped until they become non-zero.
    pub fn set_constraints(&mut self, constraints: Constraints) -> Result<(), SceneError> {
        self.check_open()?;
        self.services.params.borrow_mut().constraints = constraints;
        if let Some(main) = &self.main {
            main.state.bounds.set(constraints.max_size().to_rect());
        }
        self.mark_all_layout();
        self.services.invalidator.request();
        Ok(())
    }

    pub fn locals(&self) -> CompositionLocalContext {
        self.services.params.borrow().locals.clone()
    }

    /// Replaces the inherited values; every owner recomposes.
    pub fn set_locals(&mut self, locals: CompositionLocalContext) -> Result<(), SceneError> {
        self.check_open()?;
        self.services.params.borrow_mut().locals = locals;
        for id in self.owner_ids() {
            if let Some(o) = self.owner(id) {
                o.state.needs_recompose.set(true);
            }
        }
        self.services.invalidator.request();
        Ok(())
    }

    /// Measures the main owner against the current constraints.
    pub fn content_size(&mut self) -> Result<IntSize, SceneError> {
        self.check_open()?;
        let services = self.services.clone();
        let handler = self.exception_handler.clone();
        let main = self.main.as_mut().ok_or(SceneError::NoContent)?;
        let env = services.environment(main.state.bounds.get());
        let constraints = env.constraints;
        let composition = &mut main.composition;
        let size = run_guarded(handler.as_ref(), "measure", || {
            env.provide(|| composition.measure(constraints, &env))
        });
        Ok(constraints.constrain(size.unwrap_or(IntSize::ZERO)))
    }

    // ---- scheduling ----

    pub fn frame_clock(&self) -> FrameClock {
        self.services.frame_clock.clone()
    }

    /// Sender for work that must run against the scene; usable from any
    /// thread. Commands run at the start of the next render.
    pub fn commands(&self) -> CommandSender<Scene> {
        self.services.commands.sender()
    }

    pub fn invalidation_watcher(&self) -> InvalidationWatcher {
        self.services.invalidator.signal().watcher()
    }

    /// Whether the next render would do anything.
    pub fn has_invalidations(&self) -> Result<bool, SceneError> {
        self.check_open()?;
        Ok(self.services.invalidator.signal().is_requested() || self.has_pending_work())
    }

    fn has_pending_work(&self) -> bool {
        let s = &self.services;
        s.frame_clock.has_awaiters()
            || s.commands.has_commands()
            || s.observers.has_pending_changes()
            || s.executor.has_ready()
            || self.sequencer.has_pending_move()
            || self
                .owner_ids()
                .into_iter()
                .any(|id| self.owner(id).is_some_and(|o| o.state.is_dirty()))
    }

    /// Re-sends the last pointer position before the next draw, so hover
    /// state follows content that moved under a stationary pointer.
    pub fn request_pointer_update(&mut self) -> Result<(), SceneError> {
        self.check_open()?;
        self.sequencer.request_pending_move();
        self.services.invalidator.request();
        Ok(())
    }

    fn flush_effects(&mut self) {
        while let Err(panic) = self.services.executor.run_until_stalled() {
            report_panic(self.exception_handler.as_ref(), "effect", panic.payload);
        }
    }

    fn perform_commands(&mut self) {
        let handler = self.exception_handler.clone();
        let batch = self.services.commands.drain();
        if !batch.is_empty() {
            log::trace!("performing {} commands", batch.len());
        }
        for command in batch {
            if self.closed {
                break;
            }
            run_guarded(handler.as_ref(), "command", || command(self));
        }
    }

    // ---- render ----

    /// Runs one frame: publishes state writes, performs queued commands,
    /// sends the frame to waiters, then recomposes, lays out and draws
    /// whatever is dirty. Returns whether anything was drawn.
    pub fn render(&mut self, canvas: &mut dyn Canvas, timestamp_nanos: i64) -> Result<bool, SceneError> {
        self.check_open()?;
        let services = self.services.clone();
        let drew = {
            let _postpone = services.invalidator.postpone();
            services.invalidator.signal().reset();
            self.render_frame(canvas, timestamp_nanos)
        };
        if !self.closed && self.has_pending_work() {
            services.invalidator.request();
        }
        Ok(drew)
    }

    fn render_frame(&mut self, canvas: &mut dyn Canvas, timestamp_nanos: i64) -> bool {
        let services = self.services.clone();
        let handler = self.exception_handler.clone();
        let h = handler.as_ref();

        run_guarded(h, "state observer", || services.observers.apply_changes());
        self.perform_commands();
        if self.closed {
            return false;
        }
        run_guarded(h, "frame callback", || {
            services.frame_clock.send_frame(timestamp_nanos)
        });
        self.flush_effects();
        // Writes made by frame-driven effects land in this frame.
        run_guarded(h, "state observer", || services.observers.apply_changes());

        let ids = self.owner_ids();
        let mut laid_out = false;
        for id in &ids {
            let Some(owner) = self.owner_mut(*id) else {
                continue;
            };
            if owner.state.needs_recompose.get() {
                recompose_owner(&services, h, owner);
            }
            if owner.state.needs_layout.get() {
                laid_out |= layout_owner(&services, h, owner);
            }
        }
        if laid_out {
            self.sequencer.request_pending_move();
        }
        if let Some(ev) = self.sequencer.take_pending_move() {
            self.dispatch_pointer(ev);
        }

        let needs_draw = ids
            .iter()
            .any(|id| self.owner(*id).is_some_and(|o| o.state.needs_draw.get()));
        if needs_draw {
            for id in &ids {
                if let Some(owner) = self.owner_mut(*id) {
                    draw_owner(&services, h, owner, canvas);
                }
            }
        }
        self.sync_accessibility(Instant::now(), false);
        needs_draw
    }

    // ---- input ----

    /// Delivers a pointer event, preceded by whatever synthetic events keep
    /// the stream consistent. Returns whether the event itself was consumed.
    pub fn send_pointer_event(&mut self, input: PointerInput) -> Result<bool, SceneError> {
        self.check_open()?;
        let services = self.services.clone();
        let consumed = {
            let _postpone = services.invalidator.postpone();
            self.pointer_state.on_pointer_event(input.event_type);
            let buttons = self.pointer_state.resolve_buttons(input.buttons);
            let modifiers = self.pointer_state.resolve_modifiers(input.modifiers);
            let mut pointers = input.pointers;
            if input.derive_pressed {
                let pressed = match input.event_type {
                    PointerEventType::Press => true,
                    PointerEventType::Release => false,
                    _ => !buttons.is_empty(),
                };
                for p in &mut pointers {
                    p.pressed = pressed;
                    p.pressure = if pressed { 1.0 } else { 0.0 };
                }
            }
            let event = PointerInputEvent {
                event_type: input.event_type,
                pointers: pointers.into_iter().collect(),
                buttons,
                modifiers,
                timestamp_millis: input.timestamp_millis,
                native_event: input.native_event,
            };
            let is_exit = event.event_type == PointerEventType::Exit;
            let mut consumed = false;
            for ev in self.sequencer.sequence(event) {
                consumed = self.dispatch_pointer(ev);
            }
            if is_exit {
                self.sequencer.reset();
            }
            consumed
        };
        if !self.closed && self.has_pending_work() {
            services.invalidator.request();
        }
        Ok(consumed)
    }

    fn hit_owner(&self, position: Vec2) -> Option<OwnerId> {
        self.layer_order
            .iter()
            .rev()
            .find(|l| self.layers.get(**l).is_some_and(|o| o.hit(position)))
            .map(|l| OwnerId::Layer(*l))
            .or(self.main.as_ref().map(|_| OwnerId::Main))
    }

    fn dispatch_pointer(&mut self, event: PointerInputEvent) -> bool {
        let hit = event.position().and_then(|p| self.hit_owner(p));
        match event.event_type {
            PointerEventType::Move | PointerEventType::Enter => {
                // A lifted finger has no position to hover at; this drops the
                // replayed moves of touches that already ended.
                let mut event = event;
                event
                    .pointers
                    .retain(|p| p.pressed || p.pointer_type != PointerType::Touch);
                if event.pointers.is_empty() {
                    return false;
                }
                let hit = event.position().and_then(|p| self.hit_owner(p));
                // A captured pointer hovers only its capturing owner.
                let target = self.capture.or(hit);
                self.move_hover(&event, target);
                target.is_some_and(|id| self.deliver(id, &event))
            }
            PointerEventType::Exit => {
                let mut targets: Vec<OwnerId> = Vec::new();
                let owners = event
                    .pointers
                    .iter()
                    .filter_map(|p| self.hovered.remove(&p.id))
                    .chain(self.capture);
                for id in owners {
                    if !targets.contains(&id) {
                        targets.push(id);
                    }
                }
                let mut consumed = false;
                for id in targets {
                    consumed |= self.deliver(id, &event);
                }
                consumed
            }
            PointerEventType::Press => {
                let target = match self.capture {
                    Some(c) => Some(c),
                    None => {
                        self.notify_outside_press(hit);
                        self.capture = hit;
                        hit
                    }
                };
                target.is_some_and(|id| self.deliver(id, &event))
            }
            PointerEventType::Release => {
                let target = self.capture.or(hit);
                let consumed = target.is_some_and(|id| self.deliver(id, &event));
                if event.pressed_ids().is_empty() {
                    self.capture = None;
                }
                self.end_touch_hover(&event);
                consumed
            }
            PointerEventType::Scroll | PointerEventType::Unknown => {
                let target = self.capture.or(hit);
                target.is_some_and(|id| self.deliver(id, &event))
            }
        }
    }

    /// Sends an Exit for every pointer of `event` whose moves went to an
    /// owner other than `target`.
    fn move_hover(&mut self, event: &PointerInputEvent, target: Option<OwnerId>) {
        for p in &event.pointers {
            let previous = match target {
                Some(t) => self.hovered.insert(p.id, t),
                None => self.hovered.remove(&p.id),
            };
            if let Some(old) = previous
                && Some(old) != target
            {
                self.deliver(old, &exit_for(event, p.id));
            }
        }
    }

    /// A lifted finger stops hovering; mouse pointers keep hovering after a
    /// release.
    fn end_touch_hover(&mut self, event: &PointerInputEvent) {
        let lifted: Vec<PointerId> = event
            .pointers
            .iter()
            .filter(|p| !p.pressed && p.pointer_type == PointerType::Touch)
            .map(|p| p.id)
            .collect();
        for id in lifted {
            if let Some(owner) = self.hovered.remove(&id) {
                self.deliver(owner, &exit_for(event, id));
            }
        }
    }

    /// Layers above `target` did not get the press.
    fn notify_outside_press(&mut self, target: Option<OwnerId>) {
        let start = match target {
            Some(OwnerId::Layer(l)) => self
                .layer_order
                .iter()
                .position(|x| *x == l)
                .map_or(self.layer_order.len(), |i| i + 1),
            _ => 0,
        };
        let above: Vec<LayerId> = self.layer_order[start..].to_vec();
        let handler = self.exception_handler.clone();
        for l in above {
            if let Some(f) = self.layers.get_mut(l).and_then(|o| o.on_outside_press.as_mut()) {
                run_guarded(handler.as_ref(), "outside press", f);
            }
        }
    }

    fn deliver(&mut self, id: OwnerId, event: &PointerInputEvent) -> bool {
        let services = self.services.clone();
        let handler = self.exception_handler.clone();
        let Some(owner) = self.owner_mut(id) else {
            return false;
        };
        let local = event.localized(owner.state.origin());
        let env = services.environment(owner.state.bounds.get());
        let composition = &mut owner.composition;
        run_guarded(handler.as_ref(), "pointer input", || {
            env.provide(|| composition.on_pointer_event(&local))
        })
        .unwrap_or(false)
    }

    fn focused_owner(&self) -> Option<OwnerId> {
        self.layer_order
            .iter()
            .rev()
            .find(|l| self.layers.get(**l).is_some_and(|o| o.focusable))
            .map(|l| OwnerId::Layer(*l))
            .or(self.main.as_ref().map(|_| OwnerId::Main))
    }

    /// Delivers a key event to the topmost focusable layer, else the main
    /// owner. Returns whether it was consumed.
    pub fn send_key_event(&mut self, event: &KeyEvent) -> Result<bool, SceneError> {
        self.check_open()?;
        self.pointer_state.on_modifiers(event.modifiers);
        self.deliver_focused("key input", |c| c.on_key_event(event))
    }

    pub fn send_input_method_event(&mut self, event: &ImeEvent) -> Result<bool, SceneError> {
        self.check_open()?;
        self.deliver_focused("input method", |c| c.on_input_method_event(event))
    }

    fn deliver_focused(
        &mut self,
        origin: &'static str,
        f: impl FnOnce(&mut dyn Composition) -> bool,
    ) -> Result<bool, SceneError> {
        let services = self.services.clone();
        let handler = self.exception_handler.clone();
        let consumed = {
            let _postpone = services.invalidator.postpone();
            let target = self.focused_owner();
            match target.and_then(|id| self.owner_mut(id)) {
                Some(owner) => {
                    let env = services.environment(owner.state.bounds.get());
                    let composition = &mut owner.composition;
                    run_guarded(handler.as_ref(), origin, || {
                        env.provide(|| f(composition.as_mut()))
                    })
                    .unwrap_or(false)
                }
                None => false,
            }
        };
        if !self.closed && self.has_pending_work() {
            services.invalidator.request();
        }
        Ok(consumed)
    }

    // ---- accessibility ----

    pub fn set_accessibility_host(
        &mut self,
        host: Option<Rc<dyn AccessibilityHost>>,
    ) -> Result<(), SceneError> {
        self.check_open()?;
        self.accessibility_host = host;
        Ok(())
    }

    pub fn set_accessibility_sync_options(
        &mut self,
        options: AccessibilitySyncOptions,
    ) -> Result<(), SceneError> {
        self.check_open()?;
        self.config.accessibility = options;
        for id in self.owner_ids() {
            if let Some(o) = self.owner(id) {
                o.state.mediator.borrow_mut().set_options(options);
            }
        }
        Ok(())
    }

    /// Host reports whether assistive services (a screen reader) are running.
    pub fn set_accessibility_services_active(&mut self, active: bool) -> Result<(), SceneError> {
        self.check_open()?;
        self.accessibility_services_active = active;
        for id in self.owner_ids() {
            if let Some(o) = self.owner(id) {
                o.state.mediator.borrow_mut().set_services_active(active);
            }
        }
        Ok(())
    }

    /// The owner's accessibility tree, synced first if it is stale. Counts
    /// as host activity for the periodic sync.
    pub fn accessibility_tree(&mut self, id: OwnerId) -> Result<Rc<AccessibilityTree>, SceneError> {
        self.check_open()?;
        let now = Instant::now();
        let owner = self.owner_or_err(id)?;
        owner.state.mediator.borrow_mut().record_activity(now);
        self.sync_owner(id, now);
        let owner = self.owner_or_err(id)?;
        let tree = owner.state.mediator.borrow().tree()?;
        Ok(tree)
    }

    /// Runs the periodic sync for every owner that is due. Returns how many
    /// owners synced.
    pub fn accessibility_tick(&mut self, now: Instant) -> Result<usize, SceneError> {
        self.check_open()?;
        Ok(self.sync_accessibility(now, false))
    }

    /// Performs `action` on semantics node `node` of owner `id`.
    pub fn perform_accessibility_action(
        &mut self,
        id: OwnerId,
        node: SemanticsId,
        action: SemanticsAction,
    ) -> Result<bool, SceneError> {
        self.check_open()?;
        let tree = self.owner_or_err(id)?.state.mediator.borrow().tree()?;
        if !tree.contains(node) {
            return Err(crate::error::AccessibilityQueryError::UnknownElement(node).into());
        }
        let handler = self.exception_handler.clone();
        let services = self.services.clone();
        let _postpone = services.invalidator.postpone();
        let Some(owner) = self.owner_mut(id) else {
            return Ok(false);
        };
        let composition = &mut owner.composition;
        let done = run_guarded(handler.as_ref(), "accessibility action", || {
            composition.perform_semantics_action(node, &action)
        })
        .unwrap_or(false);
        if done {
            owner.state.mediator.borrow_mut().on_semantics_change();
        }
        Ok(done)
    }

    fn sync_accessibility(&mut self, now: Instant, force: bool) -> usize {
        let mut synced = 0;
        for id in self.owner_ids() {
            let due = self.owner(id).is_some_and(|o| {
                let m = o.state.mediator.borrow();
                if force {
                    m.is_enabled() && m.is_dirty()
                } else {
                    m.is_due(now)
                }
            });
            if due && self.sync_owner(id, now) {
                synced += 1;
            }
        }
        synced
    }

    fn sync_owner(&mut self, id: OwnerId, now: Instant) -> bool {
        let direction = self.layout_direction();
        let handler = self.exception_handler.clone();
        let host = self.accessibility_host.clone();
        let Some(owner) = self.owner(id) else {
            return false;
        };
        {
            let m = owner.state.mediator.borrow();
            if !m.is_enabled() || !m.is_dirty() {
                return false;
            }
        }
        let composition = &owner.composition;
        let root = run_guarded(handler.as_ref(), "semantics", || composition.semantics()).flatten();
        let outcome = owner
            .state
            .mediator
            .borrow_mut()
            .sync(root.as_ref(), owner.state.origin(), direction, now);
        if !outcome.synced {
            return false;
        }
        if let Some(host) = host
            && let Ok(tree) = owner.state.mediator.borrow().tree()
        {
            if !outcome.notifications.is_empty() {
                host.publish_tree(id, &tree);
            }
            for n in &outcome.notifications {
                host.notify(id, n);
            }
            if let Some(focus) = outcome.refocus {
                host.focus_changed(id, tree.get(focus));
            }
        }
        true
    }

    // ---- teardown ----

    /// Disposes every layer (topmost first), then the main owner, cancels
    /// all tasks and frame waiters and stops state observation. Closing
    /// twice is an error.
    pub fn close(&mut self) -> Result<(), SceneError> {
        if self.closed {
            return Err(SceneError::AlreadyClosed);
        }
        self.closed = true;
        let handler = self.exception_handler.clone();
        for id in std::mem::take(&mut self.layer_order).into_iter().rev() {
            if let Some(mut owner) = self.layers.remove(id) {
                dispose_owner(handler.as_ref(), &mut owner);
            }
        }
        if let Some(mut main) = self.main.take() {
            dispose_owner(handler.as_ref(), &mut main);
        }
        self.services.executor.close();
        self.services.frame_clock.close();
        self.services.commands.close();
        self.services.observers.stop();
        self.sequencer.reset();
        self.capture = None;
        self.hovered.clear();
        log::debug!("scene closed");
        Ok(())
    }
}

impl Drop for Scene {
    fn drop(&mut self) {
        if !self.closed {
            let _ = self.close();
        }
    }
}

/// Exit carrying only pointer `id` of `event`.
fn exit_for(event: &PointerInputEvent, id: PointerId) -> PointerInputEvent {
    PointerInputEvent {
        event_type: PointerEventType::Exit,
        pointers: event.pointers.iter().filter(|p| p.id == id).copied().collect(),
        ..event.clone()
    }
}

/// `None` when `content` panicked into the handler.
fn build_owner<C: Composition + 'static>(
    services: &Rc<SceneServices>,
    handler: Option<&ExceptionHandler>,
    id: OwnerId,
    bounds: Rect,
    mediator: AccessibilityMediator,
    content: impl FnOnce(&OwnerContext) -> C,
) -> Option<Owner> {
    let state = Rc::new(OwnerState::new(id, bounds, mediator));
    let cx = OwnerContext::new(services, state.clone());
    let Some(composition) = run_guarded(handler, "content", || content(&cx)) else {
        state.disposables.dispose();
        return None;
    };
    Some(Owner {
        state,
        cx,
        composition: Box::new(composition),
        focusable: false,
        on_outside_press: None,
    })
}

fn recompose_owner(services: &SceneServices, handler: Option<&ExceptionHandler>, owner: &mut Owner) {
    owner.state.needs_recompose.set(false);
    let env = services.environment(owner.state.bounds.get());
    let Owner {
        composition, cx, ..
    } = &mut *owner;
    run_guarded(handler, "recompose", || env.provide(|| composition.recompose(cx)));
    owner.state.needs_layout.set(true);
    owner.state.mediator.borrow_mut().on_semantics_change();
}

/// Returns whether the owner was laid out.
fn layout_owner(services: &SceneServices, handler: Option<&ExceptionHandler>, owner: &mut Owner) -> bool {
    owner.state.needs_layout.set(false);
    let bounds = owner.state.bounds.get();
    let env = services.environment(bounds);
    let constraints = match owner.id() {
        OwnerId::Main => env.constraints,
        OwnerId::Layer(_) => Constraints::fixed(bounds.w.max(0.0) as u32, bounds.h.max(0.0) as u32),
    };
    if constraints.is_zero() {
        log::warn!("{:?} has zero-size constraints; skipping layout", owner.id());
        return false;
    }
    let composition = &mut owner.composition;
    let size = run_guarded(handler, "layout", || {
        env.provide(|| {
            let size = constraints.constrain(composition.measure(constraints, &env));
            composition.layout(size, &env);
            size
        })
    });
    if let Some(size) = size {
        owner.state.size.set(size);
    }
    owner.state.needs_draw.set(true);
    owner.state.mediator.borrow_mut().on_bounds_change();
    true
}

fn draw_owner(
    services: &SceneServices,
    handler: Option<&ExceptionHandler>,
    owner: &mut Owner,
    canvas: &mut dyn Canvas,
) {
    owner.state.needs_draw.set(false);
    if owner.state.size.get().is_empty() {
        return;
    }
    let bounds = owner.state.bounds.get();
    let env = services.environment(bounds);
    let is_layer = matches!(owner.id(), OwnerId::Layer(_));
    if is_layer {
        canvas.push_translate(bounds.origin());
    }
    let composition = &mut owner.composition;
    {
        let canvas = &mut *canvas;
        run_guarded(handler, "draw", || env.provide(|| composition.draw(canvas, &env)));
    }
    if is_layer {
        canvas.pop_translate();
    }
}

fn dispose_owner(handler: Option<&ExceptionHandler>, owner: &mut Owner) {
    let composition = &mut owner.composition;
    run_guarded(handler, "dispose", || composition.dispose());
    owner.state.disposables.dispose();
    log::debug!("owner {:?} disposed", owner.id());
}
