#[cfg(test)]
mod tests {
    use crate::*;
    use repose_core::prelude::*;
    use repose_scene::{
        AccessibilitySyncOptions, HitRegion, OwnerId, RegionComposition, Scene, SceneConfig,
    };
    use std::cell::RefCell;
    use std::rc::Rc;

    type Log = Rc<RefCell<Vec<String>>>;

    fn init_logger() {
        let _ = env_logger::builder().is_test(true).try_init();
    }

    fn logging_scene(log: &Log) -> Scene {
        let mut scene = Scene::new(SceneConfig::new().with_size(100, 100), || {});
        let l = log.clone();
        scene
            .set_content(move |_| {
                RegionComposition::new(move |_| {
                    let (down, up, click) = (l.clone(), l.clone(), l.clone());
                    let (enter, leave) = (l.clone(), l.clone());
                    let ids = |e: &PointerInputEvent| e.pressed_ids().len();
                    vec![
                        HitRegion::new(1, Rect::new(0.0, 0.0, 100.0, 100.0))
                            .on_pointer_down(move |e| down.borrow_mut().push(format!("down {}", ids(e))))
                            .on_pointer_up(move |e| up.borrow_mut().push(format!("up {}", ids(e))))
                            .on_pointer_enter(move |_| enter.borrow_mut().push("enter".into()))
                            .on_pointer_leave(move |_| leave.borrow_mut().push("leave".into()))
                            .clickable(move || click.borrow_mut().push("click".into())),
                    ]
                })
            })
            .unwrap();
        scene
    }

    #[test]
    fn test_two_fingers_in_one_event_press_one_at_a_time() {
        init_logger();
        let log: Log = Rc::new(RefCell::new(Vec::new()));
        let mut scene = logging_scene(&log);
        let mut touch = TouchInput::new();

        let down = TouchEvent {
            changes: vec![
                TouchPoint::new(0, TouchPhase::Started, Vec2::new(10.0, 10.0)),
                TouchPoint::new(1, TouchPhase::Started, Vec2::new(20.0, 20.0)),
            ],
            timestamp_millis: 1,
        };
        assert!(touch.handle(&mut scene, down).unwrap());
        assert_eq!(touch.active_count(), 2);
        assert_eq!(*log.borrow(), vec!["down 1", "down 2"]);
        log.borrow_mut().clear();

        let up = TouchEvent {
            changes: vec![
                TouchPoint::new(0, TouchPhase::Ended, Vec2::new(10.0, 10.0)),
                TouchPoint::new(1, TouchPhase::Ended, Vec2::new(20.0, 20.0)),
            ],
            timestamp_millis: 2,
        };
        touch.handle(&mut scene, up).unwrap();
        assert_eq!(touch.active_count(), 0);
        assert_eq!(*log.borrow(), vec!["up 1", "click", "up 0", "click"]);
    }

    #[test]
    fn test_single_touch_tap_clicks() {
        let log: Log = Rc::new(RefCell::new(Vec::new()));
        let mut scene = logging_scene(&log);
        let mut touch = TouchInput::new();
        let at = |phase| TouchEvent::single(TouchPoint::new(7, phase, Vec2::new(5.0, 5.0)), 0);

        touch.handle(&mut scene, at(TouchPhase::Started)).unwrap();
        touch.handle(&mut scene, at(TouchPhase::Moved)).unwrap();
        touch.handle(&mut scene, at(TouchPhase::Ended)).unwrap();
        assert_eq!(log.borrow().iter().filter(|s| *s == "click").count(), 1);
        assert!(!touch.handle(&mut scene, TouchEvent { changes: Vec::new(), timestamp_millis: 0 }).unwrap());
    }

    #[test]
    fn test_each_touch_gesture_enters_and_leaves_once() {
        for end in [TouchPhase::Ended, TouchPhase::Cancelled] {
            let log: Log = Rc::new(RefCell::new(Vec::new()));
            let mut scene = logging_scene(&log);
            let mut touch = TouchInput::new();
            let mut ts = 0;
            for (finger, id) in [(1, 1), (2, 2), (3, 2)] {
                for (phase, x) in [(TouchPhase::Started, 10.0), (TouchPhase::Moved, 20.0), (end, 20.0)] {
                    ts += 1;
                    touch
                        .handle(&mut scene, TouchEvent::single(TouchPoint::new(id, phase, Vec2::new(x, x)), ts))
                        .unwrap();
                }
                let hover: Vec<String> = log
                    .borrow()
                    .iter()
                    .filter(|s| *s == "enter" || *s == "leave")
                    .cloned()
                    .collect();
                assert_eq!(hover.len(), 2 * finger, "{end:?} after gesture {finger}: {hover:?}");
                assert!(
                    hover.chunks(2).all(|pair| pair == ["enter", "leave"]),
                    "{end:?} after gesture {finger}: {hover:?}"
                );
            }
            assert_eq!(touch.active_count(), 0);
        }
    }

    #[test]
    fn test_touch_after_close_is_an_error() {
        let log: Log = Rc::new(RefCell::new(Vec::new()));
        let mut scene = logging_scene(&log);
        scene.close().unwrap();
        let mut touch = TouchInput::new();
        let ev = TouchEvent::single(TouchPoint::new(0, TouchPhase::Started, Vec2::ZERO), 0);
        let err = touch.handle(&mut scene, ev).unwrap_err();
        assert!(format!("{err:#}").contains("Scene is closed"));
    }

    #[test]
    fn test_logging_host_receives_snapshots() {
        init_logger();
        let mut scene = Scene::new(
            SceneConfig::new()
                .with_size(100, 100)
                .with_accessibility(AccessibilitySyncOptions::Always),
            || {},
        );
        scene
            .set_content(|_| {
                RegionComposition::new(|_| {
                    vec![
                        HitRegion::new(1, Rect::new(0.0, 0.0, 40.0, 20.0)).clickable(|| {}).semantics(
                            SemanticsConfig::new()
                                .with(SemanticsProperty::Role(Role::Button))
                                .with(SemanticsProperty::Text("OK".into())),
                        ),
                    ]
                })
            })
            .unwrap();
        let host = Rc::new(LoggingAccessibilityHost::new());
        scene.set_accessibility_host(Some(host.clone())).unwrap();
        let tree = scene.accessibility_tree(OwnerId::Main).unwrap();
        assert_eq!(tree.get(1).and_then(|e| e.label.clone()), Some("OK".to_string()));
        assert_eq!(host.published(), 1);
    }

    #[cfg(feature = "desktop")]
    mod desktop {
        use super::*;
        use crate::desktop::*;
        use repose_core::{Density, Key, KeyboardModifiers, PointerButtons};
        use std::time::Duration;
        use winit::event::{ElementState, MouseButton, MouseScrollDelta};
        use winit::event_loop::ControlFlow;
        use winit::keyboard::{self, ModifiersState, NamedKey};

        #[test]
        fn test_native_values_map_to_scene_values() {
            assert_eq!(map_button(MouseButton::Left), PointerButtons::PRIMARY);
            assert_eq!(map_button(MouseButton::Right), PointerButtons::SECONDARY);
            assert_eq!(
                map_modifiers(ModifiersState::SHIFT | ModifiersState::CONTROL),
                KeyboardModifiers::SHIFT | KeyboardModifiers::CTRL
            );
            assert_eq!(map_key(&keyboard::Key::Named(NamedKey::Enter)), Key::Enter);
            assert_eq!(map_key(&keyboard::Key::Named(NamedKey::F5)), Key::F(5));
            assert_eq!(map_key(&keyboard::Key::Character("a".into())), Key::Character('a'));
            assert_eq!(map_key(&keyboard::Key::Character(" ".into())), Key::Space);
        }

        #[test]
        fn test_line_scroll_scales_with_density() {
            let d = scroll_delta(MouseScrollDelta::LineDelta(0.0, 1.0), Density::new(2.0));
            assert_eq!(d, Vec2::new(0.0, -80.0));
        }

        #[test]
        fn test_cursor_enter_then_click() {
            let log: Log = Rc::new(RefCell::new(Vec::new()));
            let mut scene = logging_scene(&log);
            let mut input = DesktopInput::new();

            assert!(!input.mouse_input(&mut scene, ElementState::Pressed, MouseButton::Left).unwrap());
            assert_eq!(input.buttons(), PointerButtons::PRIMARY);
            input.mouse_input(&mut scene, ElementState::Released, MouseButton::Left).unwrap();
            assert!(input.buttons().is_empty());

            input.cursor_entered();
            input.cursor_moved(&mut scene, Vec2::new(10.0, 10.0)).unwrap();
            input.mouse_input(&mut scene, ElementState::Pressed, MouseButton::Left).unwrap();
            assert_eq!(input.buttons(), PointerButtons::PRIMARY);
            input.mouse_input(&mut scene, ElementState::Released, MouseButton::Left).unwrap();

            let log = log.borrow();
            assert_eq!(log.first().map(String::as_str), Some("enter"));
            assert_eq!(log.iter().filter(|s| *s == "click").count(), 1);

            drop(log);
            input.cursor_left(&mut scene).unwrap();
            assert_eq!(input.cursor(), None);
            assert_eq!(log.borrow().last().map(String::as_str), Some("leave"));
        }

        #[test]
        fn test_idle_loop_wakes_for_accessibility_sync() {
            let now = web_time::Instant::now();
            let config = SceneConfig::new().with_accessibility_sync_period(Duration::from_millis(250));
            assert_eq!(
                idle_control_flow(&config, now),
                ControlFlow::WaitUntil(now + Duration::from_millis(250))
            );
            let config = config.with_accessibility(AccessibilitySyncOptions::Never);
            assert_eq!(idle_control_flow(&config, now), ControlFlow::Wait);
        }
    }
}
