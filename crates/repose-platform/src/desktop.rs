//! Desktop input via winit.
//!
//! [`DesktopInput`] maps winit `WindowEvent`s onto scene calls. winit
//! reports positions in physical pixels, which is what the scene works in;
//! line-based wheel deltas are converted with the scene density.
//! [`run_desktop_app`] is a minimal runner around it.

use std::rc::Rc;
use std::sync::{Arc, OnceLock};

use anyhow::Context;
use repose_core::{
    Canvas, Constraints, Density, ImeEvent, Key, KeyEvent, KeyEventType, KeyboardModifiers,
    PointerButtons, PointerEventType, PointerType, Vec2,
};
use repose_scene::{
    AccessibilitySyncOptions, Composition, OwnerContext, PointerInput, Scene, SceneConfig, SceneError,
};
use web_time::Instant;
use winit::application::ApplicationHandler;
use winit::event::{ElementState, Ime, MouseButton, MouseScrollDelta, WindowEvent};
use winit::event_loop::{ActiveEventLoop, ControlFlow, EventLoop};
use winit::keyboard::{self, ModifiersState, NamedKey};
use winit::window::{Window, WindowAttributes, WindowId};

use crate::touch::{TouchEvent, TouchInput, TouchPhase, TouchPoint};
use crate::{InputAdapter, LINE_SCROLL_PX, LoggingAccessibilityHost};

pub fn map_button(button: MouseButton) -> PointerButtons {
    match button {
        MouseButton::Left => PointerButtons::PRIMARY,
        MouseButton::Right => PointerButtons::SECONDARY,
        MouseButton::Middle => PointerButtons::TERTIARY,
        MouseButton::Back => PointerButtons::BACK,
        MouseButton::Forward => PointerButtons::FORWARD,
        MouseButton::Other(_) => PointerButtons::empty(),
    }
}

pub fn map_modifiers(state: ModifiersState) -> KeyboardModifiers {
    let mut m = KeyboardModifiers::empty();
    m.set(KeyboardModifiers::SHIFT, state.shift_key());
    m.set(KeyboardModifiers::CTRL, state.control_key());
    m.set(KeyboardModifiers::ALT, state.alt_key());
    m.set(KeyboardModifiers::META, state.super_key());
    m
}

pub fn map_key(key: &keyboard::Key) -> Key {
    match key {
        keyboard::Key::Named(named) => match named {
            NamedKey::Enter => Key::Enter,
            NamedKey::Tab => Key::Tab,
            NamedKey::Backspace => Key::Backspace,
            NamedKey::Delete => Key::Delete,
            NamedKey::Escape => Key::Escape,
            NamedKey::ArrowLeft => Key::ArrowLeft,
            NamedKey::ArrowRight => Key::ArrowRight,
            NamedKey::ArrowUp => Key::ArrowUp,
            NamedKey::ArrowDown => Key::ArrowDown,
            NamedKey::Home => Key::Home,
            NamedKey::End => Key::End,
            NamedKey::PageUp => Key::PageUp,
            NamedKey::PageDown => Key::PageDown,
            NamedKey::Space => Key::Space,
            NamedKey::F1 => Key::F(1),
            NamedKey::F2 => Key::F(2),
            NamedKey::F3 => Key::F(3),
            NamedKey::F4 => Key::F(4),
            NamedKey::F5 => Key::F(5),
            NamedKey::F6 => Key::F(6),
            NamedKey::F7 => Key::F(7),
            NamedKey::F8 => Key::F(8),
            NamedKey::F9 => Key::F(9),
            NamedKey::F10 => Key::F(10),
            NamedKey::F11 => Key::F(11),
            NamedKey::F12 => Key::F(12),
            _ => Key::Unidentified,
        },
        keyboard::Key::Character(s) => {
            let mut chars = s.chars();
            match (chars.next(), chars.next()) {
                (Some(' '), None) => Key::Space,
                (Some(c), None) => Key::Character(c),
                _ => Key::Unidentified,
            }
        }
        _ => Key::Unidentified,
    }
}

/// Wheel delta in device pixels. Positive y scrolls content forward (down).
pub fn scroll_delta(delta: MouseScrollDelta, density: Density) -> Vec2 {
    match delta {
        MouseScrollDelta::LineDelta(x, y) => {
            let px = LINE_SCROLL_PX * density.scale;
            Vec2::new(-x * px, -y * px)
        }
        MouseScrollDelta::PixelDelta(p) => Vec2::new(-(p.x as f32), -(p.y as f32)),
    }
}

pub fn map_ime(ime: &Ime) -> ImeEvent {
    match ime {
        Ime::Enabled => ImeEvent::Start,
        Ime::Preedit(text, cursor) => ImeEvent::Update {
            text: text.clone(),
            cursor: *cursor,
        },
        Ime::Commit(text) => ImeEvent::Commit(text.clone()),
        Ime::Disabled => ImeEvent::Cancel,
    }
}

/// Per-window mouse, keyboard and touch state.
pub struct DesktopInput {
    start: Instant,
    cursor: Option<Vec2>,
    entered: bool,
    buttons: PointerButtons,
    modifiers: KeyboardModifiers,
    touch: TouchInput,
}

impl Default for DesktopInput {
    fn default() -> Self {
        Self::new()
    }
}

impl DesktopInput {
    pub fn new() -> Self {
        Self {
            start: Instant::now(),
            cursor: None,
            entered: false,
            buttons: PointerButtons::empty(),
            modifiers: KeyboardModifiers::empty(),
            touch: TouchInput::new(),
        }
    }

    pub fn cursor(&self) -> Option<Vec2> {
        self.cursor
    }

    pub fn buttons(&self) -> PointerButtons {
        self.buttons
    }

    pub fn modifiers(&self) -> KeyboardModifiers {
        self.modifiers
    }

    fn now_millis(&self) -> u64 {
        self.start.elapsed().as_millis() as u64
    }

    fn pointer(&self, event_type: PointerEventType, position: Vec2) -> PointerInput {
        PointerInput::new(event_type, position, PointerType::Mouse, self.now_millis())
            .with_buttons(self.buttons)
            .with_modifiers(self.modifiers)
    }

    pub fn cursor_entered(&mut self) {
        self.entered = true;
    }

    pub fn cursor_moved(&mut self, scene: &mut Scene, position: Vec2) -> Result<bool, SceneError> {
        self.cursor = Some(position);
        let event_type = if std::mem::take(&mut self.entered) {
            PointerEventType::Enter
        } else {
            PointerEventType::Move
        };
        scene.send_pointer_event(self.pointer(event_type, position))
    }

    pub fn cursor_left(&mut self, scene: &mut Scene) -> Result<bool, SceneError> {
        self.entered = false;
        let Some(position) = self.cursor.take() else {
            return Ok(false);
        };
        scene.send_pointer_event(self.pointer(PointerEventType::Exit, position))
    }

    pub fn mouse_input(
        &mut self,
        scene: &mut Scene,
        state: ElementState,
        button: MouseButton,
    ) -> Result<bool, SceneError> {
        let flag = map_button(button);
        let event_type = match state {
            ElementState::Pressed => {
                self.buttons.insert(flag);
                PointerEventType::Press
            }
            ElementState::Released => {
                self.buttons.remove(flag);
                PointerEventType::Release
            }
        };
        let Some(position) = self.cursor else {
            log::trace!("mouse {event_type:?} before any cursor position; dropped");
            return Ok(false);
        };
        scene.send_pointer_event(self.pointer(event_type, position))
    }

    pub fn wheel(&mut self, scene: &mut Scene, delta: MouseScrollDelta) -> Result<bool, SceneError> {
        let Some(position) = self.cursor else {
            return Ok(false);
        };
        let delta = scroll_delta(delta, scene.density());
        scene.send_pointer_event(self.pointer(PointerEventType::Scroll, position).with_scroll_delta(delta))
    }

    pub fn modifiers_changed(&mut self, state: ModifiersState) {
        self.modifiers = map_modifiers(state);
    }

    pub fn key(&mut self, scene: &mut Scene, event: &winit::event::KeyEvent) -> Result<bool, SceneError> {
        let key = KeyEvent {
            key: map_key(&event.logical_key),
            event_type: match event.state {
                ElementState::Pressed => KeyEventType::KeyDown,
                ElementState::Released => KeyEventType::KeyUp,
            },
            modifiers: self.modifiers,
            is_repeat: event.repeat,
            text: event.text.as_ref().map(|t| t.to_string()),
            timestamp_millis: self.now_millis(),
        };
        scene.send_key_event(&key)
    }
}

impl InputAdapter for DesktopInput {
    type Native<'a> = &'a WindowEvent;

    fn handle(&mut self, scene: &mut Scene, native: &WindowEvent) -> anyhow::Result<bool> {
        let consumed = match native {
            WindowEvent::CursorEntered { .. } => {
                self.cursor_entered();
                false
            }
            WindowEvent::CursorMoved { position, .. } => {
                let pos = Vec2::new(position.x as f32, position.y as f32);
                self.cursor_moved(scene, pos).context("cursor moved")?
            }
            WindowEvent::CursorLeft { .. } => self.cursor_left(scene).context("cursor left")?,
            WindowEvent::MouseInput { state, button, .. } => self
                .mouse_input(scene, *state, *button)
                .context("mouse input")?,
            WindowEvent::MouseWheel { delta, .. } => self.wheel(scene, *delta).context("mouse wheel")?,
            WindowEvent::Touch(t) => {
                let phase = match t.phase {
                    winit::event::TouchPhase::Started => TouchPhase::Started,
                    winit::event::TouchPhase::Moved => TouchPhase::Moved,
                    winit::event::TouchPhase::Ended => TouchPhase::Ended,
                    winit::event::TouchPhase::Cancelled => TouchPhase::Cancelled,
                };
                let mut point = TouchPoint::new(
                    t.id,
                    phase,
                    Vec2::new(t.location.x as f32, t.location.y as f32),
                );
                point.pressure = t.force.map(|f| f.normalized() as f32);
                let ts = self.now_millis();
                self.touch.handle(scene, TouchEvent::single(point, ts))?
            }
            WindowEvent::ModifiersChanged(m) => {
                self.modifiers_changed(m.state());
                false
            }
            WindowEvent::KeyboardInput { event, .. } => self.key(scene, event).context("keyboard input")?,
            WindowEvent::Ime(ime) => scene
                .send_input_method_event(&map_ime(ime))
                .context("input method")?,
            WindowEvent::ScaleFactorChanged { scale_factor, .. } => {
                scene
                    .set_density(Density::new(*scale_factor as f32))
                    .context("scale factor changed")?;
                false
            }
            WindowEvent::Resized(size) => {
                scene
                    .set_constraints(Constraints::fixed(size.width, size.height))
                    .context("resized")?;
                false
            }
            WindowEvent::Focused(false) => {
                self.buttons = PointerButtons::empty();
                self.touch.reset();
                false
            }
            _ => false,
        };
        Ok(consumed)
    }
}

type Install = Box<dyn FnOnce(&mut Scene) -> Result<(), SceneError>>;

struct App {
    config: SceneConfig,
    install: Option<Install>,
    canvas: Box<dyn Canvas>,
    window: Arc<OnceLock<Arc<Window>>>,
    scene: Option<Scene>,
    input: DesktopInput,
    start: Instant,
}

impl App {
    fn create(&mut self, el: &ActiveEventLoop) -> anyhow::Result<()> {
        let window = Arc::new(
            el.create_window(WindowAttributes::default().with_title("Repose"))
                .context("creating window")?,
        );
        let size = window.inner_size();
        let config = self
            .config
            .clone()
            .with_density(Density::new(window.scale_factor() as f32))
            .with_size(size.width, size.height);
        let _ = self.window.set(window.clone());

        let slot = self.window.clone();
        let mut scene = Scene::new(config, move || {
            if let Some(w) = slot.get() {
                w.request_redraw();
            }
        });
        scene
            .set_accessibility_host(Some(Rc::new(LoggingAccessibilityHost::new())))
            .context("installing accessibility host")?;
        if let Some(install) = self.install.take() {
            install(&mut scene).context("installing content")?;
        }
        self.scene = Some(scene);
        window.request_redraw();
        log::debug!("desktop window created at {}x{}", size.width, size.height);
        Ok(())
    }
}

impl ApplicationHandler for App {
    fn resumed(&mut self, el: &ActiveEventLoop) {
        if self.scene.is_some() {
            return;
        }
        if let Err(e) = self.create(el) {
            log::error!("{e:#}");
            el.exit();
        }
    }

    fn window_event(&mut self, el: &ActiveEventLoop, _id: WindowId, event: WindowEvent) {
        let Some(scene) = self.scene.as_mut() else {
            return;
        };
        match event {
            WindowEvent::CloseRequested => {
                if let Err(e) = scene.close() {
                    log::warn!("closing scene: {e}");
                }
                el.exit();
            }
            WindowEvent::RedrawRequested => {
                let nanos = self.start.elapsed().as_nanos() as i64;
                if let Err(e) = scene.render(self.canvas.as_mut(), nanos) {
                    log::warn!("render: {e}");
                }
            }
            other => {
                if let Err(e) = self.input.handle(scene, &other) {
                    log::warn!("{e:#}");
                }
            }
        }
    }

    fn about_to_wait(&mut self, el: &ActiveEventLoop) {
        let Some(scene) = self.scene.as_mut().filter(|s| !s.is_closed()) else {
            return;
        };
        let now = Instant::now();
        if let Err(e) = scene.accessibility_tick(now) {
            log::warn!("accessibility tick: {e}");
        }
        el.set_control_flow(idle_control_flow(&self.config, now));
    }
}

/// Wakes the loop for the next background accessibility sync even when no
/// input arrives.
pub(crate) fn idle_control_flow(config: &SceneConfig, now: Instant) -> ControlFlow {
    if config.accessibility == AccessibilitySyncOptions::Never {
        ControlFlow::Wait
    } else {
        ControlFlow::WaitUntil(now + config.accessibility_sync_period)
    }
}

/// Opens a window, installs `content` as its main owner and runs the event
/// loop until the window is closed. Frames are drawn into `canvas`.
pub fn run_desktop_app<C: Composition + 'static>(
    config: SceneConfig,
    canvas: impl Canvas + 'static,
    content: impl FnOnce(&OwnerContext) -> C + 'static,
) -> anyhow::Result<()> {
    let event_loop = EventLoop::new().context("creating event loop")?;
    let mut app = App {
        config,
        install: Some(Box::new(move |scene: &mut Scene| scene.set_content(content))),
        canvas: Box::new(canvas),
        window: Arc::new(OnceLock::new()),
        scene: None,
        input: DesktopInput::new(),
        start: Instant::now(),
    };
    event_loop.run_app(&mut app)?;
    Ok(())
}
