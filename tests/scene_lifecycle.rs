use comet_stage::motion::MotionClass;
use comet_stage::populate::{class_histogram, generate, ClassSpec, PopulationSpec};
use comet_stage::scene::{HeadlessSurface, ManualScheduler, SurfaceError};
use comet_stage::{
    Property, PropValue, Rect, SceneStopReason, Stage, StageConfig, StageEvent, Threshold, TweenSpec,
};

fn small_config(seed: Option<u64>) -> StageConfig {
    let mut config = StageConfig::default();
    config.population = PopulationSpec {
        classes: vec![
            ClassSpec::new(MotionClass::DebrisShape, 40),
            ClassSpec::new(MotionClass::WarmComet, 12),
            ClassSpec::new(MotionClass::IceComet, 8),
        ],
    };
    config.scene.seed = seed;
    config
}

fn mounted(seed: Option<u64>) -> (Stage, ManualScheduler, HeadlessSurface) {
    let mut stage = Stage::new(small_config(seed));
    let scheduler = ManualScheduler::new();
    let surface = HeadlessSurface::new();
    stage.mount_scene(Box::new(scheduler.clone()), Box::new(surface.clone()));
    (stage, scheduler, surface)
}

#[test]
fn two_mounts_share_structure_but_not_values() {
    let spec = small_config(None).population;
    let first = generate(1, &spec);
    let second = generate(2, &spec);
    assert_eq!(first.len(), 60);
    assert_eq!(second.len(), 60);
    assert_eq!(class_histogram(&first), class_histogram(&second));
    assert!(first.iter().zip(&second).all(|(a, b)| a.class == b.class));
    assert!(first.iter().zip(&second).any(|(a, b)| a.path != b.path || a.scale != b.scale));
}

#[test]
fn fixed_seed_mounts_are_identical() {
    let (mut first, _, _) = mounted(Some(99));
    let (mut second, _, _) = mounted(Some(99));
    let a = first.scene_mut().map(|driver| driver.objects()).unwrap_or_default();
    let b = second.scene_mut().map(|driver| driver.objects()).unwrap_or_default();
    assert_eq!(a.len(), 60);
    assert_eq!(a, b);
}

#[test]
fn each_frame_requests_exactly_one_more() {
    let (mut stage, scheduler, surface) = mounted(Some(3));
    assert_eq!(scheduler.pending(), 1);
    for _ in 0..10 {
        stage.frame(1.0 / 60.0);
    }
    assert_eq!(surface.frames(), 10);
    assert_eq!(surface.last_instances(), 60);
    assert_eq!(scheduler.pending(), 1);
    assert!(stage.scene().is_some_and(|driver| driver.has_pending_frame()));
    assert_eq!(scheduler.requested(), 11);
}

#[test]
fn disposing_the_owning_scope_cancels_the_pending_frame() {
    let mut stage = Stage::new(small_config(Some(5)));
    let scheduler = ManualScheduler::new();
    let surface = HeadlessSurface::new();
    let disposer = stage.scope("hero", |stage| {
        stage.mount_scene(Box::new(scheduler.clone()), Box::new(surface.clone()));
        Ok(())
    });
    stage.frame(1.0 / 60.0);
    assert_eq!(scheduler.pending(), 1);

    assert!(disposer.dispose(&mut stage));
    assert_eq!(scheduler.pending(), 0);
    assert_eq!(scheduler.cancelled(), 1);
    assert!(stage.scene().is_none());
    assert!(stage
        .drain_events()
        .contains(&StageEvent::SceneStopped { reason: SceneStopReason::Unmounted }));

    stage.frame(1.0 / 60.0);
    assert_eq!(surface.frames(), 1);
    assert!(!disposer.dispose(&mut stage));
}

#[test]
fn a_lost_surface_stops_the_loop_and_a_remount_recovers() {
    let (mut stage, scheduler, surface) = mounted(Some(8));
    stage.frame(1.0 / 60.0);
    surface.inject_error(SurfaceError::Lost);
    stage.frame(1.0 / 60.0);

    let events = stage.drain_events();
    assert!(events.iter().any(|event| matches!(
        event,
        StageEvent::SceneStopped { reason: SceneStopReason::SurfaceLost(_) }
    )));
    assert!(stage.scene().is_some_and(|driver| !driver.is_running() && !driver.has_pending_frame()));
    assert_eq!(scheduler.pending(), 0);
    stage.frame(1.0 / 60.0);
    assert_eq!(surface.frames(), 1);

    let fresh = HeadlessSurface::new();
    let retry = ManualScheduler::new();
    stage.mount_scene(Box::new(retry.clone()), Box::new(fresh.clone()));
    stage.frame(1.0 / 60.0);
    assert!(stage.scene().is_some_and(|driver| driver.is_running()));
    assert_eq!(fresh.frames(), 1);
    assert_eq!(retry.pending(), 1);
}

#[test]
fn layer_opacity_follows_the_bound_node() {
    let (mut stage, _, surface) = mounted(Some(13));
    stage.set_viewport(800.0);
    let hero = stage.add_node("hero", Rect::new(0.0, 800.0));
    stage
        .build_scrub_on(
            hero,
            Threshold::new(0.4, 0.0),
            Threshold::BOTTOM_TOP,
            &[TweenSpec::to([hero], &[(Property::Opacity, PropValue::Number(0.0))])
                .ease(comet_stage::easing::Easing::Linear)],
        )
        .expect("hero is laid out");
    assert!(stage.bind_scene_opacity(hero));

    stage.frame(1.0 / 60.0);
    assert_eq!(surface.last_layer_opacity(), 1.0);
    // fade range is 320..800
    stage.scroll_to(560.0);
    stage.frame(1.0 / 60.0);
    assert!((surface.last_layer_opacity() - 0.5).abs() < 1e-3);
    stage.scroll_to(2000.0);
    stage.frame(1.0 / 60.0);
    assert_eq!(surface.last_layer_opacity(), 0.0);
}

#[test]
fn unmounting_by_hand_releases_scope_ownership() {
    let mut stage = Stage::new(small_config(Some(21)));
    let scheduler = ManualScheduler::new();
    let surface = HeadlessSurface::new();
    let disposer = stage.scope("hero", |stage| {
        stage.mount_scene(Box::new(scheduler.clone()), Box::new(surface.clone()));
        Ok(())
    });
    assert!(stage.unmount_scene());
    assert!(!stage.unmount_scene());

    let replacement = ManualScheduler::new();
    stage.mount_scene(Box::new(replacement.clone()), Box::new(HeadlessSurface::new()));
    disposer.dispose(&mut stage);
    assert!(stage.scene().is_some());
    assert_eq!(replacement.pending(), 1);
}
