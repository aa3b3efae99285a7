#[cfg(test)]
mod tests {
    use crate::*;
    use repose_core::*;
    use std::cell::{Cell, RefCell};
    use std::collections::{HashMap, HashSet};
    use std::rc::Rc;
    use std::sync::Arc;
    use std::sync::atomic::{AtomicUsize, Ordering};
    use std::time::Duration;
    use web_time::Instant;

    type Log = Rc<RefCell<Vec<String>>>;

    fn init_logger() {
        let _ = env_logger::builder().is_test(true).try_init();
    }

    fn boom() {
        panic!("boom")
    }

    fn scene() -> Scene {
        Scene::new(SceneConfig::new().with_size(100, 100), || {})
    }

    fn counted_scene() -> (Scene, Arc<AtomicUsize>) {
        let redraws = Arc::new(AtomicUsize::new(0));
        let r = redraws.clone();
        let scene = Scene::new(SceneConfig::new().with_size(100, 100), move || {
            r.fetch_add(1, Ordering::SeqCst);
        });
        (scene, redraws)
    }

    fn at(t: PointerEventType, x: f32, y: f32) -> PointerInput {
        PointerInput::new(t, Vec2::new(x, y), PointerType::Mouse, 0)
    }

    fn tap(scene: &mut Scene, x: f32, y: f32) {
        scene.send_pointer_event(at(PointerEventType::Press, x, y)).unwrap();
        scene.send_pointer_event(at(PointerEventType::Release, x, y)).unwrap();
    }

    fn regions(
        scene: &mut Scene,
        build: impl Fn(&OwnerContext) -> Vec<HitRegion> + Clone + 'static,
    ) {
        scene
            .set_content(move |_| RegionComposition::new(build.clone()))
            .unwrap();
    }

    fn logged(id: u64, rect: Rect, log: &Log) -> HitRegion {
        let (l1, l2, l3, l4) = (log.clone(), log.clone(), log.clone(), log.clone());
        HitRegion::new(id, rect)
            .clickable(move || l1.borrow_mut().push(format!("click {id}")))
            .on_pointer_enter(move |_| l2.borrow_mut().push(format!("enter {id}")))
            .on_pointer_leave(move |_| l3.borrow_mut().push(format!("leave {id}")))
            .on_pointer_move(move |e| {
                if let Some(p) = e.position() {
                    l4.borrow_mut().push(format!("move {id} {},{}", p.x, p.y));
                }
            })
    }

    fn render(scene: &mut Scene, t: i64) -> bool {
        let mut canvas = RecordingCanvas::new();
        scene.render(&mut canvas, t).unwrap()
    }

    #[test]
    fn test_move_press_release_clicks_once_after_hover() {
        let mut scene = scene();
        let log: Log = Rc::new(RefCell::new(Vec::new()));
        let l = log.clone();
        regions(&mut scene, move |_| {
            vec![logged(1, Rect::new(0.0, 0.0, 50.0, 50.0), &l)]
        });
        render(&mut scene, 0);

        scene.send_pointer_event(at(PointerEventType::Move, 0.0, 0.0)).unwrap();
        tap(&mut scene, 0.0, 0.0);

        let log = log.borrow();
        let clicks = log.iter().filter(|s| s.starts_with("click")).count();
        assert_eq!(clicks, 1);
        let enter = log.iter().position(|s| s == "enter 1").unwrap();
        let click = log.iter().position(|s| s == "click 1").unwrap();
        assert!(enter < click);
    }

    #[test]
    fn test_press_without_move_gets_synthetic_move_first() {
        let mut scene = scene();
        let log: Log = Rc::new(RefCell::new(Vec::new()));
        let l = log.clone();
        regions(&mut scene, move |_| {
            let l2 = l.clone();
            vec![
                logged(1, Rect::new(0.0, 0.0, 50.0, 50.0), &l).on_pointer_down(move |e| {
                    if let Some(p) = e.position() {
                        l2.borrow_mut().push(format!("down {},{}", p.x, p.y));
                    }
                }),
            ]
        });

        scene.send_pointer_event(at(PointerEventType::Move, 0.0, 0.0)).unwrap();
        tap(&mut scene, 0.0, 0.0);
        log.borrow_mut().clear();

        scene.send_pointer_event(at(PointerEventType::Press, 5.0, 5.0)).unwrap();
        assert_eq!(*log.borrow(), vec!["move 1 5,5", "down 5,5"]);
    }

    #[test]
    fn test_nested_clickables_click_innermost_only() {
        let mut scene = scene();
        let outer = Rc::new(Cell::new(0));
        let inner = Rc::new(Cell::new(0));
        let (o, i) = (outer.clone(), inner.clone());
        regions(&mut scene, move |_| {
            let (o, i) = (o.clone(), i.clone());
            vec![
                HitRegion::new(1, Rect::new(0.0, 0.0, 40.0, 40.0)).clickable(move || o.set(o.get() + 1)),
                HitRegion::new(2, Rect::new(0.0, 0.0, 10.0, 20.0)).clickable(move || i.set(i.get() + 1)),
            ]
        });

        tap(&mut scene, 0.0, 0.0);
        assert_eq!((outer.get(), inner.get()), (0, 1));

        tap(&mut scene, 30.0, 30.0);
        assert_eq!((outer.get(), inner.get()), (1, 1));
    }

    #[test]
    fn test_close_is_terminal() {
        let mut scene = scene();
        let disposed = Rc::new(Cell::new(0));
        let d = disposed.clone();
        scene
            .set_content(move |cx| {
                let d = d.clone();
                cx.on_dispose(move || d.set(d.get() + 1));
                RegionComposition::new(|_| Vec::new())
            })
            .unwrap();
        let sender = scene.commands();
        let clock = scene.frame_clock();

        scene.close().unwrap();
        assert!(scene.is_closed());
        assert_eq!(disposed.get(), 1);

        assert_eq!(scene.close(), Err(SceneError::AlreadyClosed));
        let mut canvas = RecordingCanvas::new();
        assert_eq!(scene.render(&mut canvas, 0), Err(SceneError::Closed));
        assert!(canvas.is_empty());
        assert_eq!(
            scene.send_pointer_event(at(PointerEventType::Move, 1.0, 1.0)),
            Err(SceneError::Closed)
        );
        assert_eq!(
            scene.send_key_event(&KeyEvent::down(Key::Enter)),
            Err(SceneError::Closed)
        );
        assert_eq!(scene.set_density(Density::new(2.0)), Err(SceneError::Closed));
        assert_eq!(
            scene.set_content(|_| RegionComposition::new(|_| Vec::new())).err(),
            Some(SceneError::Closed)
        );
        assert_eq!(sender.add(|_| {}), Err(SceneError::Closed));
        assert_eq!(clock.with_frame(|_| {}), Err(SceneError::Closed));
        assert_eq!(scene.has_invalidations(), Err(SceneError::Closed));
        assert_eq!(scene.set_exception_handler(None), Err(SceneError::Closed));
        assert_eq!(scene.set_accessibility_host(None), Err(SceneError::Closed));
        assert_eq!(disposed.get(), 1);
    }

    #[test]
    fn test_commands_run_in_order_at_render() {
        let mut scene = scene();
        regions(&mut scene, |_| Vec::new());
        render(&mut scene, 0);

        let sender = scene.commands();
        let worker = std::thread::spawn(move || {
            sender.add(|s: &mut Scene| {
                s.set_density(Density::new(2.0)).unwrap();
            })
        });
        worker.join().unwrap().unwrap();
        let order = Arc::new(AtomicUsize::new(0));
        for n in 0..3 {
            let o = order.clone();
            scene
                .commands()
                .add(move |_| {
                    o.fetch_add(1, Ordering::SeqCst);
                    assert_eq!(o.load(Ordering::SeqCst), n + 1);
                })
                .unwrap();
        }
        assert!(scene.has_invalidations().unwrap());
        assert_eq!(scene.density(), Density::new(1.0));

        render(&mut scene, 16);
        assert_eq!(scene.density(), Density::new(2.0));
        assert_eq!(order.load(Ordering::SeqCst), 3);
    }

    #[test]
    fn test_command_added_while_rendering_runs_next_frame() {
        let mut scene = scene();
        regions(&mut scene, |_| Vec::new());
        let hits = Arc::new(AtomicUsize::new(0));
        let h = hits.clone();
        scene
            .commands()
            .add(move |s: &mut Scene| {
                let h = h.clone();
                s.commands()
                    .add(move |_| {
                        h.fetch_add(1, Ordering::SeqCst);
                    })
                    .unwrap();
            })
            .unwrap();

        render(&mut scene, 0);
        assert_eq!(hits.load(Ordering::SeqCst), 0);
        assert!(scene.has_invalidations().unwrap());
        render(&mut scene, 16);
        assert_eq!(hits.load(Ordering::SeqCst), 1);
    }

    #[test]
    fn test_redraw_requests_coalesce_until_render() {
        let (mut scene, redraws) = counted_scene();
        regions(&mut scene, |_| Vec::new());
        assert_eq!(redraws.load(Ordering::SeqCst), 1);

        render(&mut scene, 0);
        assert!(!scene.has_invalidations().unwrap());
        let watcher = scene.invalidation_watcher();
        assert!(!watcher.has_invalidations());

        scene.set_density(Density::new(2.0)).unwrap();
        scene.set_layout_direction(LayoutDirection::Rtl).unwrap();
        scene.request_pointer_update().unwrap();
        assert_eq!(redraws.load(Ordering::SeqCst), 2);
        assert!(watcher.has_invalidations());

        render(&mut scene, 16);
        assert!(!watcher.has_invalidations());
    }

    #[test]
    fn test_state_write_recomposes_owner() {
        let (mut scene, redraws) = counted_scene();
        let holder: Rc<RefCell<Option<State<u32>>>> = Rc::new(RefCell::new(None));
        let builds = Rc::new(Cell::new(0));
        let (h, b) = (holder.clone(), builds.clone());
        scene
            .set_content(move |cx| {
                let count = cx.state(0u32);
                cx.observe(&count);
                *h.borrow_mut() = Some(count.clone());
                let b = b.clone();
                RegionComposition::new(move |_| {
                    b.set(b.get() + 1);
                    vec![HitRegion::new(1, Rect::new(0.0, 0.0, (count.get() * 10 + 10) as f32, 10.0))]
                })
            })
            .unwrap();
        render(&mut scene, 0);
        assert_eq!(builds.get(), 1);
        assert_eq!(scene.content_size().unwrap(), IntSize::new(10, 10));

        let state = holder.borrow().clone().unwrap();
        state.set(1);
        state.set(2);
        assert_eq!(redraws.load(Ordering::SeqCst), 2);

        render(&mut scene, 16);
        assert_eq!(builds.get(), 2);
        assert_eq!(scene.content_size().unwrap(), IntSize::new(30, 10));
    }

    #[test]
    fn test_layer_takes_presses_inside_and_reports_outside() {
        let mut scene = scene();
        let main_clicks = Rc::new(Cell::new(0));
        let layer_clicks = Rc::new(Cell::new(0));
        let outside = Rc::new(Cell::new(0));
        let m = main_clicks.clone();
        regions(&mut scene, move |_| {
            let m = m.clone();
            vec![HitRegion::new(1, Rect::new(0.0, 0.0, 100.0, 100.0)).clickable(move || m.set(m.get() + 1))]
        });
        let l = layer_clicks.clone();
        let layer = scene
            .add_layer(Rect::new(10.0, 10.0, 30.0, 30.0), false, move |_| {
                RegionComposition::new(move |_| {
                    let l = l.clone();
                    vec![HitRegion::new(1, Rect::new(0.0, 0.0, 30.0, 30.0)).clickable(move || l.set(l.get() + 1))]
                })
            })
            .unwrap();
        let o = outside.clone();
        scene.set_layer_outside_press(layer, move || o.set(o.get() + 1)).unwrap();
        render(&mut scene, 0);
        assert_eq!(scene.layers(), &[layer]);

        tap(&mut scene, 15.0, 15.0);
        assert_eq!((main_clicks.get(), layer_clicks.get(), outside.get()), (0, 1, 0));

        tap(&mut scene, 80.0, 80.0);
        assert_eq!((main_clicks.get(), layer_clicks.get(), outside.get()), (1, 1, 1));

        scene.remove_layer(layer).unwrap();
        assert_eq!(scene.remove_layer(layer), Err(SceneError::UnknownLayer(layer)));
        tap(&mut scene, 15.0, 15.0);
        assert_eq!((main_clicks.get(), layer_clicks.get(), outside.get()), (2, 1, 1));
    }

    #[test]
    fn test_layer_draws_translated_above_main() {
        let mut scene = scene();
        regions(&mut scene, |_| {
            vec![HitRegion::new(1, Rect::new(0.0, 0.0, 100.0, 100.0)).background(Color::WHITE)]
        });
        scene
            .add_layer(Rect::new(20.0, 20.0, 10.0, 10.0), true, |_| {
                RegionComposition::new(|_| {
                    vec![HitRegion::new(1, Rect::new(0.0, 0.0, 10.0, 10.0)).background(Color::BLACK)]
                })
            })
            .unwrap();

        let mut canvas = RecordingCanvas::new();
        assert!(scene.render(&mut canvas, 0).unwrap());
        assert_eq!(canvas.paint_count(), 2);
        assert!(matches!(
            canvas.commands.get(1),
            Some(DrawCommand::PushTranslate(v)) if *v == Vec2::new(20.0, 20.0)
        ));
        assert!(matches!(canvas.commands.last(), Some(DrawCommand::PopTranslate)));

        let mut canvas = RecordingCanvas::new();
        assert!(!scene.render(&mut canvas, 16).unwrap());
        assert!(canvas.is_empty());
    }

    #[test]
    fn test_keys_go_to_topmost_focusable_owner() {
        let mut scene = scene();
        let main_keys = Rc::new(Cell::new(0));
        let layer_clicks = Rc::new(Cell::new(0));
        let mk = main_keys.clone();
        regions(&mut scene, move |_| {
            let mk = mk.clone();
            vec![
                HitRegion::new(1, Rect::new(0.0, 0.0, 100.0, 100.0))
                    .focusable()
                    .on_key(move |_| {
                        mk.set(mk.get() + 1);
                        true
                    }),
            ]
        });
        tap(&mut scene, 50.0, 50.0);
        assert!(scene.send_key_event(&KeyEvent::down(Key::Tab)).unwrap());
        assert_eq!(main_keys.get(), 1);

        let l = layer_clicks.clone();
        scene
            .add_layer(Rect::new(0.0, 0.0, 20.0, 20.0), true, move |_| {
                RegionComposition::new(move |_| {
                    let l = l.clone();
                    vec![
                        HitRegion::new(1, Rect::new(0.0, 0.0, 20.0, 20.0))
                            .focusable()
                            .clickable(move || l.set(l.get() + 1)),
                    ]
                })
            })
            .unwrap();
        tap(&mut scene, 5.0, 5.0);
        assert_eq!(layer_clicks.get(), 1);

        assert!(scene.send_key_event(&KeyEvent::down(Key::Enter)).unwrap());
        assert_eq!(layer_clicks.get(), 2);
        assert_eq!(main_keys.get(), 1);
        assert!(!scene.send_input_method_event(&ImeEvent::Start).unwrap());
    }

    #[test]
    fn test_modifiers_from_keys_fill_pointer_events() {
        let mut scene = scene();
        let seen = Rc::new(Cell::new(KeyboardModifiers::empty()));
        let s = seen.clone();
        regions(&mut scene, move |_| {
            let s = s.clone();
            vec![HitRegion::new(1, Rect::new(0.0, 0.0, 100.0, 100.0)).on_pointer_down(move |e| s.set(e.modifiers))]
        });
        scene
            .send_key_event(&KeyEvent::down(Key::Unidentified).with_modifiers(KeyboardModifiers::SHIFT))
            .unwrap();
        scene.send_pointer_event(at(PointerEventType::Press, 1.0, 1.0)).unwrap();
        assert_eq!(seen.get(), KeyboardModifiers::SHIFT);

        scene.send_pointer_event(at(PointerEventType::Release, 1.0, 1.0)).unwrap();
        scene
            .send_pointer_event(at(PointerEventType::Press, 1.0, 1.0).with_modifiers(KeyboardModifiers::ALT))
            .unwrap();
        assert_eq!(seen.get(), KeyboardModifiers::ALT);
    }

    #[test]
    fn test_exception_handler_receives_callback_panics() {
        init_logger();
        let mut scene = scene();
        let caught: Rc<RefCell<Vec<CallbackPanic>>> = Rc::new(RefCell::new(Vec::new()));
        let c = caught.clone();
        scene
            .set_exception_handler(Some(Rc::new(move |p: &CallbackPanic| c.borrow_mut().push(p.clone()))))
            .unwrap();
        regions(&mut scene, |_| {
            vec![HitRegion::new(1, Rect::new(0.0, 0.0, 100.0, 100.0)).clickable(boom)]
        });

        tap(&mut scene, 10.0, 10.0);
        scene.commands().add(|_| boom()).unwrap();
        render(&mut scene, 0);

        let caught = caught.borrow();
        assert_eq!(caught.len(), 2);
        assert_eq!(caught[0].origin, "pointer input");
        assert_eq!(caught[0].message, "boom");
        assert_eq!(caught[1].origin, "command");
        assert!(!scene.is_closed());
    }

    #[test]
    #[should_panic(expected = "boom")]
    fn test_panic_without_handler_propagates() {
        let mut scene = scene();
        regions(&mut scene, |_| Vec::new());
        scene.commands().add(|_| boom()).unwrap();
        render(&mut scene, 0);
    }

    #[test]
    fn test_content_factory_panic_leaves_scene_without_content() {
        init_logger();
        let mut scene = scene();
        let caught: Rc<RefCell<Vec<CallbackPanic>>> = Rc::new(RefCell::new(Vec::new()));
        let c = caught.clone();
        scene
            .set_exception_handler(Some(Rc::new(move |p: &CallbackPanic| c.borrow_mut().push(p.clone()))))
            .unwrap();
        let disposed = Rc::new(Cell::new(0));
        let d = disposed.clone();
        scene
            .set_content(move |cx| {
                let d = d.clone();
                cx.on_dispose(move || d.set(d.get() + 1));
                RegionComposition::new(|_| Vec::new())
            })
            .unwrap();

        let d = disposed.clone();
        let result = scene.set_content(move |cx| -> RegionComposition {
            let d = d.clone();
            cx.on_dispose(move || d.set(d.get() + 10));
            panic!("boom")
        });
        assert_eq!(result.err(), Some(SceneError::NoContent));
        assert!(!scene.has_content());
        assert_eq!(disposed.get(), 11);

        let layer = scene.add_layer(Rect::new(0.0, 0.0, 10.0, 10.0), false, |_| -> RegionComposition {
            panic!("boom")
        });
        assert_eq!(layer.err(), Some(SceneError::NoContent));
        assert!(scene.layers().is_empty());

        let caught = caught.borrow();
        assert_eq!(caught.len(), 2);
        assert!(caught.iter().all(|p| p.origin == "content" && p.message == "boom"));
        assert!(!scene.is_closed());
        render(&mut scene, 0);
    }

    struct Ticker {
        frames: Rc<RefCell<Vec<i64>>>,
        launched: bool,
    }

    impl Composition for Ticker {
        fn recompose(&mut self, cx: &OwnerContext) {
            if self.launched {
                return;
            }
            self.launched = true;
            let clock = cx.frame_clock();
            let frames = self.frames.clone();
            cx.launch(async move {
                while let Ok(t) = clock.await_frame().await {
                    frames.borrow_mut().push(t);
                }
            });
        }

        fn measure(&mut self, constraints: Constraints, _env: &Environment) -> IntSize {
            constraints.max_size()
        }

        fn draw(&mut self, _canvas: &mut dyn Canvas, _env: &Environment) {}

        fn on_pointer_event(&mut self, _event: &PointerInputEvent) -> bool {
            false
        }
    }

    #[test]
    fn test_effects_resume_on_each_frame_and_stop_on_close() {
        let mut scene = scene();
        let frames = Rc::new(RefCell::new(Vec::new()));
        let f = frames.clone();
        scene
            .set_content(move |_| Ticker {
                frames: f,
                launched: false,
            })
            .unwrap();
        assert!(scene.frame_clock().has_awaiters());
        assert!(scene.has_invalidations().unwrap());

        render(&mut scene, 16);
        render(&mut scene, 32);
        assert_eq!(*frames.borrow(), vec![16, 32]);
        assert!(scene.has_invalidations().unwrap());

        scene.close().unwrap();
        assert!(!scene.frame_clock().has_awaiters());
        assert_eq!(*frames.borrow(), vec![16, 32]);
    }

    struct Fader {
        alpha: Rc<RefCell<Vec<f32>>>,
        launched: bool,
    }

    impl Composition for Fader {
        fn recompose(&mut self, cx: &OwnerContext) {
            if std::mem::replace(&mut self.launched, true) {
                return;
            }
            let clock = cx.frame_clock();
            let alpha = self.alpha.clone();
            cx.launch(async move {
                let mut value = AnimatedValue::new(
                    0.0f32,
                    AnimationSpec::tween(Duration::from_millis(100), Easing::Linear),
                );
                value.set_target(1.0);
                while let Ok(t) = clock.await_frame().await {
                    let running = value.advance(t);
                    alpha.borrow_mut().push(*value.get());
                    if !running {
                        break;
                    }
                }
            });
        }

        fn measure(&mut self, constraints: Constraints, _env: &Environment) -> IntSize {
            constraints.max_size()
        }

        fn draw(&mut self, _canvas: &mut dyn Canvas, _env: &Environment) {}

        fn on_pointer_event(&mut self, _event: &PointerInputEvent) -> bool {
            false
        }
    }

    #[test]
    fn test_animation_follows_frame_timestamps_then_stops_asking() {
        let mut scene = scene();
        let alpha = Rc::new(RefCell::new(Vec::new()));
        let a = alpha.clone();
        scene
            .set_content(move |_| Fader {
                alpha: a,
                launched: false,
            })
            .unwrap();

        render(&mut scene, 1_000_000_000);
        render(&mut scene, 1_050_000_000);
        render(&mut scene, 1_100_000_000);
        assert_eq!(*alpha.borrow(), vec![0.0, 0.5, 1.0]);
        assert!(!scene.frame_clock().has_awaiters());

        render(&mut scene, 1_150_000_000);
        assert_eq!(alpha.borrow().len(), 3);
    }

    #[test]
    fn test_replacing_content_disposes_previous_owner() {
        let mut scene = scene();
        let frames = Rc::new(RefCell::new(Vec::new()));
        let f = frames.clone();
        scene
            .set_content(move |_| Ticker {
                frames: f,
                launched: false,
            })
            .unwrap();
        regions(&mut scene, |_| Vec::new());
        assert!(!scene.frame_clock().has_awaiters());
        render(&mut scene, 16);
        assert!(frames.borrow().is_empty());
    }

    #[test]
    fn test_zero_constraints_skip_layout_without_error() {
        init_logger();
        let mut scene = Scene::new(SceneConfig::new(), || {});
        regions(&mut scene, |_| {
            vec![HitRegion::new(1, Rect::new(0.0, 0.0, 10.0, 10.0)).background(Color::WHITE)]
        });
        let mut canvas = RecordingCanvas::new();
        scene.render(&mut canvas, 0).unwrap();
        assert_eq!(canvas.paint_count(), 0);

        scene.set_constraints(Constraints::fixed(50, 50)).unwrap();
        let mut canvas = RecordingCanvas::new();
        scene.render(&mut canvas, 16).unwrap();
        assert_eq!(canvas.paint_count(), 1);
    }

    #[test]
    fn test_content_size_needs_content() {
        let mut scene = scene();
        assert_eq!(scene.content_size(), Err(SceneError::NoContent));
        regions(&mut scene, |_| {
            vec![HitRegion::new(1, Rect::new(0.0, 0.0, 140.0, 30.0))]
        });
        assert_eq!(scene.content_size().unwrap(), IntSize::new(100, 30));
    }

    #[derive(Default)]
    struct RecordingHost {
        published: Cell<usize>,
        notifications: RefCell<Vec<AccessibilityNotification>>,
        focus: RefCell<Vec<Option<SemanticsId>>>,
    }

    impl AccessibilityHost for RecordingHost {
        fn publish_tree(&self, _owner: OwnerId, _tree: &AccessibilityTree) {
            self.published.set(self.published.get() + 1);
        }

        fn notify(&self, _owner: OwnerId, notification: &AccessibilityNotification) {
            self.notifications.borrow_mut().push(notification.clone());
        }

        fn focus_changed(&self, _owner: OwnerId, element: Option<&AccessibilityElement>) {
            self.focus.borrow_mut().push(element.map(|e| e.id));
        }

        fn announce(&self, _message: &str) {}
    }

    fn button_scene(options: AccessibilitySyncOptions, clicks: Rc<Cell<u32>>) -> Scene {
        let mut scene = Scene::new(
            SceneConfig::new().with_size(100, 100).with_accessibility(options),
            || {},
        );
        regions(&mut scene, move |_| {
            let c = clicks.clone();
            vec![
                HitRegion::new(1, Rect::new(10.0, 10.0, 40.0, 20.0))
                    .clickable(move || c.set(c.get() + 1))
                    .semantics(
                        SemanticsConfig::new()
                            .with(SemanticsProperty::Role(Role::Button))
                            .with(SemanticsProperty::Text("OK".into())),
                    ),
            ]
        });
        render(&mut scene, 0);
        scene
    }

    #[test]
    fn test_accessibility_tree_projects_main_owner() {
        let clicks = Rc::new(Cell::new(0));
        let mut scene = button_scene(AccessibilitySyncOptions::Always, clicks.clone());
        let host = Rc::new(RecordingHost::default());
        scene.set_accessibility_host(Some(host.clone())).unwrap();

        let tree = scene.accessibility_tree(OwnerId::Main).unwrap();
        assert_eq!(tree.len(), 2);
        let button = tree.get(1).unwrap();
        assert_eq!(button.role, AccessibleRole::PushButton);
        assert_eq!(button.bounds_in_window, Rect::new(10.0, 10.0, 40.0, 20.0));
        assert_eq!(tree.hit_test(Vec2::new(15.0, 15.0)).map(|e| e.id), Some(1));

        assert_eq!(host.published.get(), 1);
        assert!(
            host.notifications
                .borrow()
                .contains(&AccessibilityNotification::Added(1))
        );
        assert_eq!(*host.focus.borrow(), vec![Some(1)]);

        assert!(
            scene
                .perform_accessibility_action(OwnerId::Main, 1, SemanticsAction::Click)
                .unwrap()
        );
        assert_eq!(clicks.get(), 1);
        assert_eq!(
            scene.perform_accessibility_action(OwnerId::Main, 99, SemanticsAction::Click),
            Err(SceneError::Accessibility(AccessibilityQueryError::UnknownElement(99)))
        );
    }

    #[test]
    fn test_accessibility_follows_services_and_options() {
        let clicks = Rc::new(Cell::new(0));
        let mut scene = button_scene(AccessibilitySyncOptions::WhenRequiredByServices, clicks.clone());
        assert_eq!(
            scene.accessibility_tree(OwnerId::Main).err(),
            Some(SceneError::Accessibility(AccessibilityQueryError::Disabled))
        );

        scene.set_accessibility_services_active(true).unwrap();
        assert_eq!(scene.accessibility_tree(OwnerId::Main).unwrap().len(), 2);

        scene.set_accessibility_sync_options(AccessibilitySyncOptions::Never).unwrap();
        assert_eq!(
            scene.accessibility_tree(OwnerId::Main).err(),
            Some(SceneError::Accessibility(AccessibilityQueryError::Disabled))
        );
        let layer = scene
            .add_layer(Rect::new(0.0, 0.0, 1.0, 1.0), false, |_| {
                RegionComposition::new(|_| Vec::new())
            })
            .unwrap();
        scene.remove_layer(layer).unwrap();
        assert_eq!(
            scene.accessibility_tree(OwnerId::Layer(layer)).err(),
            Some(SceneError::UnknownLayer(layer))
        );
    }

    #[test]
    fn test_accessibility_tick_syncs_changes_after_period() {
        let clicks = Rc::new(Cell::new(0));
        let mut scene = button_scene(AccessibilitySyncOptions::Always, clicks);
        let host = Rc::new(RecordingHost::default());
        scene.set_accessibility_host(Some(host.clone())).unwrap();
        scene.accessibility_tree(OwnerId::Main).unwrap();
        host.notifications.borrow_mut().clear();

        scene.set_layout_direction(LayoutDirection::Rtl).unwrap();
        render(&mut scene, 16);
        let later = Instant::now() + Duration::from_millis(200);
        assert_eq!(scene.accessibility_tick(later).unwrap(), 1);
        assert_eq!(scene.accessibility_tick(later).unwrap(), 0);
    }

    type HoverLog = Rc<RefCell<Vec<(u64, u64, bool)>>>;

    fn hover_region(id: u64, rect: Rect, log: &HoverLog) -> HitRegion {
        let (l1, l2) = (log.clone(), log.clone());
        HitRegion::new(id, rect)
            .on_pointer_enter(move |e| l1.borrow_mut().push((id, e.pointers[0].id.0, true)))
            .on_pointer_leave(move |e| l2.borrow_mut().push((id, e.pointers[0].id.0, false)))
    }

    fn finger(t: PointerEventType, id: u64, pos: Vec2, pressed: bool, ts: u64) -> PointerInput {
        PointerInput::multi(
            t,
            vec![PointerInputData::new(PointerId(id), pos, pressed, PointerType::Touch)],
            ts,
        )
    }

    fn mouse(t: PointerEventType, pos: Vec2, ts: u64) -> PointerInput {
        PointerInput::new(t, pos, PointerType::Mouse, ts)
    }

    struct Lcg(u64);

    impl Lcg {
        fn below(&mut self, n: u64) -> u64 {
            self.0 = self.0.wrapping_mul(6364136223846793005).wrapping_add(1442695040888963407);
            (self.0 >> 33) % n
        }
    }

    #[test]
    fn test_generated_pointer_sequences_alternate_enter_and_leave() {
        use PointerEventType::*;
        let mut seen = HashSet::new();
        for seed in 1..=8u64 {
            let log: HoverLog = Rc::new(RefCell::new(Vec::new()));
            let mut scene = scene();
            let l = log.clone();
            regions(&mut scene, move |_| {
                vec![
                    hover_region(1, Rect::new(0.0, 0.0, 60.0, 60.0), &l).clickable(|| {}),
                    hover_region(2, Rect::new(20.0, 20.0, 20.0, 20.0), &l),
                    hover_region(3, Rect::new(60.0, 0.0, 40.0, 100.0), &l),
                ]
            });
            let l = log.clone();
            scene
                .add_layer(Rect::new(50.0, 50.0, 50.0, 50.0), false, move |_| {
                    RegionComposition::new(move |_| {
                        vec![
                            hover_region(11, Rect::new(0.0, 0.0, 50.0, 50.0), &l),
                            hover_region(12, Rect::new(10.0, 10.0, 20.0, 20.0), &l).clickable(|| {}),
                        ]
                    })
                })
                .unwrap();
            render(&mut scene, 0);

            let mut rng = Lcg(seed);
            let mut ts = 0;
            let mut mouse_down = false;
            let mut touch: Option<u64> = None;
            let mut gestures = 0;
            for _ in 0..400 {
                ts += 1;
                let pos = Vec2::new(rng.below(21) as f32 * 5.0, rng.below(21) as f32 * 5.0);
                let mut send = |input: PointerInput| {
                    scene.send_pointer_event(input).unwrap();
                };
                match touch {
                    Some(id) => match rng.below(10) {
                        0..=5 => send(finger(Move, id, pos, true, ts)),
                        6..=8 => {
                            send(finger(Release, id, pos, false, ts));
                            touch = None;
                        }
                        _ => {
                            send(finger(Release, id, pos, false, ts));
                            send(finger(Exit, id, pos, false, ts));
                            touch = None;
                        }
                    },
                    None => match rng.below(12) {
                        5 => send(mouse(Enter, pos, ts)),
                        6 if !mouse_down => {
                            send(mouse(Press, pos, ts));
                            mouse_down = true;
                        }
                        7 if mouse_down => {
                            send(mouse(Release, pos, ts));
                            mouse_down = false;
                        }
                        8 => {
                            if mouse_down {
                                send(mouse(Release, pos, ts));
                                mouse_down = false;
                            }
                            send(mouse(Exit, pos, ts));
                        }
                        9 if !mouse_down => {
                            gestures += 1;
                            let id = 1 + gestures % 3;
                            send(finger(Press, id, pos, true, ts));
                            touch = Some(id);
                        }
                        10 => {
                            scene.request_pointer_update().unwrap();
                            render(&mut scene, ts as i64 * 16_000_000);
                        }
                        _ => send(mouse(Move, pos, ts)),
                    },
                }
            }
            ts += 1;
            let pos = Vec2::new(99.0, 99.0);
            if let Some(id) = touch {
                scene.send_pointer_event(finger(Release, id, pos, false, ts)).unwrap();
            }
            if mouse_down {
                scene.send_pointer_event(mouse(Release, pos, ts)).unwrap();
            }
            scene.send_pointer_event(mouse(Exit, pos, ts)).unwrap();

            let mut inside: HashMap<(u64, u64), bool> = HashMap::new();
            for (i, &(region, pointer, entered)) in log.borrow().iter().enumerate() {
                let was = inside.insert((region, pointer), entered).unwrap_or(false);
                assert_ne!(
                    was, entered,
                    "seed {seed}, event {i}: region {region} pointer {pointer} repeated {}",
                    if entered { "enter" } else { "leave" }
                );
                seen.insert((region, pointer > 0));
            }
            assert!(
                inside.values().all(|entered| !entered),
                "seed {seed}: hover still open {inside:?}"
            );
        }
        for region in [1, 2, 3, 11, 12] {
            assert!(seen.contains(&(region, false)), "mouse never reached region {region}");
            assert!(seen.contains(&(region, true)), "touch never reached region {region}");
        }
    }
}
